use serde::{Deserialize, Deserializer, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chart {
    pub graph_type: String,
    #[serde(default, alias = "column_names", deserialize_with = "null_as_empty")]
    pub columns: Vec<String>,
    /// Server-relative image path; resolve against the API base for display.
    #[serde(default, alias = "graph_url")]
    pub image_url: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl Chart {
    pub fn involves(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }

    /// Caption in the form `"<type> • <col>, <col>"`.
    pub fn caption(&self) -> String {
        if self.columns.is_empty() {
            self.graph_type.clone()
        } else {
            format!("{} • {}", self.graph_type, self.columns.join(", "))
        }
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<String>>::deserialize(deserializer)?.unwrap_or_default())
}
