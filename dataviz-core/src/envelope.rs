//! Collection response adapter.
//!
//! List endpoints answer either with a bare JSON array or with a paginated
//! envelope `{ "results": [...] }`. Both shapes are normalized here so no
//! caller ever branches on shape.

use serde::de::DeserializeOwned;
use serde::Deserialize;

/// Field name under which enveloped collections expose their items.
pub const ENVELOPE_FIELD: &str = "results";

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Listing<T> {
    Bare(Vec<T>),
    Enveloped { results: Vec<T> },
}

impl<T> Listing<T> {
    fn into_vec(self) -> Vec<T> {
        match self {
            Listing::Bare(items) => items,
            Listing::Enveloped { results } => results,
        }
    }
}

/// Decode a collection body that may be bare or enveloped.
///
/// Returns a description of the mismatch when the body matches neither shape.
pub fn decode_collection<T: DeserializeOwned>(body: &[u8]) -> Result<Vec<T>, String> {
    serde_json::from_slice::<Listing<T>>(body)
        .map(Listing::into_vec)
        .map_err(|_| describe_mismatch(body))
}

fn describe_mismatch(body: &[u8]) -> String {
    match serde_json::from_slice::<serde_json::Value>(body) {
        Err(e) => format!("body is not JSON: {}", e),
        Ok(serde_json::Value::Array(_)) => "array items do not match the expected record".into(),
        Ok(serde_json::Value::Object(map)) if map.contains_key(ENVELOPE_FIELD) => {
            format!("'{}' does not hold a list of expected records", ENVELOPE_FIELD)
        }
        Ok(_) => format!("expected an array or an object with '{}'", ENVELOPE_FIELD),
    }
}
