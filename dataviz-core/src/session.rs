//! Session resolver
//!
//! The bearer credential lives in a persisted key-value store scoped to one
//! API origin. Its claims are decoded (never verified) to learn the owning
//! user. Absence and decode failure are both the normal anonymous state.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::Deserialize;
use serde_json::{Map, Value};
use tokio::sync::RwLock;

use crate::models::UserId;

// ============================================================================
// CredentialStore trait
// ============================================================================

/// Persisted, origin-scoped key-value store holding the session credential.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn get(&self, key: &str) -> Option<String>;

    async fn set(&self, key: &str, value: &str) -> std::io::Result<()>;

    async fn remove(&self, key: &str) -> std::io::Result<()>;
}

/// JSON-object file store. A missing or unreadable file reads as empty.
/// Writes keep every other entry in the file, whatever its value type, and
/// refuse to replace a file that is not a JSON object.
#[derive(Debug, Clone)]
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    async fn read_entries(&self) -> std::io::Result<Map<String, Value>> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(std::io::Error::from),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Map::new()),
            Err(e) => Err(e),
        }
    }

    async fn write_entries(&self, entries: &Map<String, Value>) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let bytes = serde_json::to_vec_pretty(entries)?;
        tokio::fs::write(&self.path, bytes).await
    }
}

#[async_trait]
impl CredentialStore for FileCredentialStore {
    async fn get(&self, key: &str) -> Option<String> {
        let mut entries = match self.read_entries().await {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "Credential store unreadable, treating as empty");
                return None;
            }
        };
        match entries.remove(key) {
            Some(Value::String(value)) => Some(value),
            _ => None,
        }
    }

    async fn set(&self, key: &str, value: &str) -> std::io::Result<()> {
        let mut entries = self.read_entries().await?;
        entries.insert(key.to_string(), Value::String(value.to_string()));
        self.write_entries(&entries).await
    }

    async fn remove(&self, key: &str) -> std::io::Result<()> {
        let mut entries = self.read_entries().await?;
        if entries.remove(key).is_some() {
            self.write_entries(&entries).await?;
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    entries: RwLock<BTreeMap<String, String>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn get(&self, key: &str) -> Option<String> {
        self.entries.read().await.get(key).cloned()
    }

    async fn set(&self, key: &str, value: &str) -> std::io::Result<()> {
        self.entries
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> std::io::Result<()> {
        self.entries.write().await.remove(key);
        Ok(())
    }
}

// ============================================================================
// Credential + claims
// ============================================================================

/// Opaque bearer token.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn token(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Credential(***)")
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Claims {
    #[serde(default)]
    pub user_id: Option<UserId>,
}

/// Decode the payload segment of a JWT-shaped token. No signature check.
pub fn decode_claims(token: &str) -> Option<Claims> {
    let mut segments = token.split('.');
    let (_header, payload) = (segments.next()?, segments.next()?);
    let payload = payload.trim_end_matches('=');
    let bytes = URL_SAFE_NO_PAD.decode(payload).ok()?;
    serde_json::from_slice(&bytes).ok()
}

/// Resolved session: both fields are present or both absent.
#[derive(Debug, Clone, Default)]
pub struct Session {
    pub user_id: Option<UserId>,
    pub credential: Option<Credential>,
}

impl Session {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn is_anonymous(&self) -> bool {
        self.user_id.is_none()
    }
}

// ============================================================================
// SessionService
// ============================================================================

#[derive(Clone)]
pub struct SessionService {
    store: Arc<dyn CredentialStore>,
    token_key: String,
}

impl SessionService {
    pub fn new(store: Arc<dyn CredentialStore>, token_key: impl Into<String>) -> Self {
        Self {
            store,
            token_key: token_key.into(),
        }
    }

    /// The single decode path. Anything short of a decodable token carrying
    /// a `user_id` claim is anonymous.
    pub async fn session(&self) -> Session {
        let Some(token) = self.store.get(&self.token_key).await else {
            return Session::anonymous();
        };
        match decode_claims(&token).and_then(|c| c.user_id) {
            Some(user_id) => Session {
                user_id: Some(user_id),
                credential: Some(Credential(token)),
            },
            None => {
                tracing::debug!("Stored credential did not decode to a user, treating session as anonymous");
                Session::anonymous()
            }
        }
    }

    pub async fn current_user(&self) -> Option<UserId> {
        self.session().await.user_id
    }

    pub async fn credential(&self) -> Option<Credential> {
        self.session().await.credential
    }

    pub async fn sign_in(&self, token: &str) -> std::io::Result<()> {
        self.store.set(&self.token_key, token).await
    }

    pub async fn sign_out(&self) -> std::io::Result<()> {
        self.store.remove(&self.token_key).await
    }
}

impl std::fmt::Debug for SessionService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionService")
            .field("token_key", &self.token_key)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Build an unsigned JWT-shaped token around the given claims.
    fn make_token(claims: serde_json::Value) -> String {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
        let payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&claims).unwrap());
        format!("{}.{}.signature", header, payload)
    }

    fn service_with(store: Arc<dyn CredentialStore>) -> SessionService {
        SessionService::new(store, "token")
    }

    #[tokio::test]
    async fn test_no_credential_is_anonymous() {
        let session = service_with(Arc::new(MemoryCredentialStore::new()));
        assert!(session.current_user().await.is_none());
        assert!(session.credential().await.is_none());
    }

    #[tokio::test]
    async fn test_numeric_user_id_claim_resolves() {
        let store = Arc::new(MemoryCredentialStore::new());
        let token = make_token(serde_json::json!({"user_id": 42, "exp": 1_900_000_000}));
        store.set("token", &token).await.unwrap();

        let session = service_with(store).session().await;
        assert_eq!(session.user_id, Some(UserId::from(42)));
        assert_eq!(session.credential.unwrap().token(), token);
    }

    #[tokio::test]
    async fn test_garbage_credential_is_anonymous_not_error() {
        let store = Arc::new(MemoryCredentialStore::new());
        store.set("token", "not-a-jwt").await.unwrap();
        let session = service_with(store.clone());
        assert!(session.session().await.is_anonymous());

        store.set("token", "aaa.!!!.ccc").await.unwrap();
        assert!(session.current_user().await.is_none());
    }

    #[tokio::test]
    async fn test_token_without_user_claim_is_anonymous() {
        let store = Arc::new(MemoryCredentialStore::new());
        store
            .set("token", &make_token(serde_json::json!({"sub": "x"})))
            .await
            .unwrap();
        assert!(service_with(store).current_user().await.is_none());
    }

    #[test]
    fn test_padded_payload_still_decodes() {
        let payload = base64::engine::general_purpose::URL_SAFE.encode(br#"{"user_id":"u-1"}"#);
        let token = format!("h.{}.s", payload);
        let claims = decode_claims(&token).unwrap();
        assert_eq!(claims.user_id, Some(UserId::from("u-1")));
    }

    #[tokio::test]
    async fn test_file_store_persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("session.json");

        let first = service_with(Arc::new(FileCredentialStore::new(&path)));
        first
            .sign_in(&make_token(serde_json::json!({"user_id": 7})))
            .await
            .unwrap();

        let second = service_with(Arc::new(FileCredentialStore::new(&path)));
        assert_eq!(second.current_user().await, Some(UserId::from(7)));

        second.sign_out().await.unwrap();
        assert!(first.current_user().await.is_none());
    }

    #[tokio::test]
    async fn test_corrupt_store_file_reads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        tokio::fs::write(&path, b"{not json").await.unwrap();

        let store = FileCredentialStore::new(&path);
        assert!(store.get("token").await.is_none());
        assert!(store.set("token", "abc").await.is_err());
        assert_eq!(tokio::fs::read(&path).await.unwrap(), b"{not json");
    }

    #[tokio::test]
    async fn test_file_store_keeps_non_string_entries() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        tokio::fs::write(&path, br#"{"theme": {"dark": true}, "visits": 3}"#)
            .await
            .unwrap();

        let store = FileCredentialStore::new(&path);
        store.set("token", "abc").await.unwrap();
        assert_eq!(store.get("token").await.as_deref(), Some("abc"));
        assert!(store.get("visits").await.is_none());

        let saved: serde_json::Value = serde_json::from_slice(&tokio::fs::read(&path).await.unwrap()).unwrap();
        assert_eq!(saved["theme"]["dark"], true);
        assert_eq!(saved["visits"], 3);
        assert_eq!(saved["token"], "abc");

        store.remove("token").await.unwrap();
        let saved: serde_json::Value = serde_json::from_slice(&tokio::fs::read(&path).await.unwrap()).unwrap();
        assert!(saved.get("token").is_none());
        assert_eq!(saved["visits"], 3);
    }
}
