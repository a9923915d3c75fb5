use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};

/// A single metric value attached to an insight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetricValue {
    Number(f64),
    Text(String),
    Flag(bool),
    Structured(serde_json::Value),
}

impl std::fmt::Display for MetricValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MetricValue::Number(n) => write!(f, "{}", n),
            MetricValue::Text(s) => f.write_str(s),
            MetricValue::Flag(b) => write!(f, "{}", b),
            MetricValue::Structured(v) => write!(f, "{}", v),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Insight {
    /// `None` for dataset-level insights.
    #[serde(default)]
    pub column_name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, alias = "value", deserialize_with = "lenient_metrics")]
    pub metrics: Option<BTreeMap<String, MetricValue>>,
    #[serde(default)]
    pub insight_type: Option<String>,
    #[serde(default)]
    pub importance_score: Option<f64>,
}

impl Insight {
    pub fn heading(&self) -> &str {
        self.column_name
            .as_deref()
            .filter(|c| !c.is_empty())
            .unwrap_or("General Insight")
    }
}

/// Metrics arrive as free-form JSON; anything other than an object is dropped
/// rather than failing the whole collection.
fn lenient_metrics<'de, D>(deserializer: D) -> Result<Option<BTreeMap<String, MetricValue>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match raw {
        Some(serde_json::Value::Object(map)) => Some(
            map.into_iter()
                .map(|(k, v)| {
                    let value = match v {
                        serde_json::Value::Number(n) => match n.as_f64() {
                            Some(f) => MetricValue::Number(f),
                            None => MetricValue::Structured(serde_json::Value::Number(n)),
                        },
                        serde_json::Value::String(s) => MetricValue::Text(s),
                        serde_json::Value::Bool(b) => MetricValue::Flag(b),
                        other => MetricValue::Structured(other),
                    };
                    (k, value)
                })
                .collect(),
        ),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_field_is_read_as_metrics() {
        let insight: Insight = serde_json::from_value(serde_json::json!({
            "id": 3,
            "analysis": "7b5c24ab-1234-5678-9abc-def012345678",
            "insight_type": "outlier",
            "column_name": "income",
            "description": "12 outliers detected",
            "value": {"count": 12, "method": "iqr"},
            "importance_score": 0.7
        }))
        .unwrap();

        let metrics = insight.metrics.unwrap();
        assert_eq!(metrics["count"], MetricValue::Number(12.0));
        assert_eq!(metrics["method"], MetricValue::Text("iqr".into()));
        assert_eq!(insight.column_name.as_deref(), Some("income"));
    }

    #[test]
    fn test_non_object_metrics_are_ignored() {
        let insight: Insight = serde_json::from_value(serde_json::json!({
            "column_name": null,
            "description": "Dataset has 3 duplicate rows",
            "value": [1, 2, 3]
        }))
        .unwrap();

        assert!(insight.metrics.is_none());
        assert_eq!(insight.heading(), "General Insight");
    }
}
