//! Durable session storage
//!
//! Holds the single access/refresh pair for this client in memory and in a
//! JSON file next to the configuration. Every mutation replaces the whole
//! session in one step: there is no way to update the access token without
//! also deciding the refresh token, so no reader ever sees a mixed pair.
//!
//! Writes use temp-file + rename so a crash mid-write leaves the previous
//! session intact. The write lock is held across the file write, which keeps
//! the on-disk order identical to the in-memory order.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::error::{Error, Result};

/// Access and refresh token issued together by the backend.
///
/// Debug output is redacted; neither token ever reaches the logs.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialPair {
    /// Short-lived bearer token sent on every request
    pub access: String,
    /// Long-lived token sent only to the refresh endpoint
    pub refresh: String,
}

impl CredentialPair {
    pub fn new(access: impl Into<String>, refresh: impl Into<String>) -> Self {
        Self {
            access: access.into(),
            refresh: refresh.into(),
        }
    }
}

impl fmt::Debug for CredentialPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialPair")
            .field("access", &"[REDACTED]")
            .field("refresh", &"[REDACTED]")
            .finish()
    }
}

/// Current login state of the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Session {
    Authenticated(CredentialPair),
    Anonymous,
}

impl Session {
    /// Access token to attach to outbound requests, if any.
    pub fn access_token(&self) -> Option<&str> {
        match self {
            Session::Authenticated(pair) => Some(&pair.access),
            Session::Anonymous => None,
        }
    }

    pub fn credentials(&self) -> Option<&CredentialPair> {
        match self {
            Session::Authenticated(pair) => Some(pair),
            Session::Anonymous => None,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, Session::Authenticated(_))
    }

    /// Status label for logging.
    pub fn label(&self) -> &'static str {
        match self {
            Session::Authenticated(_) => "authenticated",
            Session::Anonymous => "anonymous",
        }
    }

    fn to_stored(&self) -> Option<CredentialPair> {
        self.credentials().cloned()
    }

    fn from_stored(stored: Option<CredentialPair>) -> Self {
        match stored {
            Some(pair) => Session::Authenticated(pair),
            None => Session::Anonymous,
        }
    }
}

/// File-backed holder of the current session.
///
/// The file holds either `{"access": "...", "refresh": "..."}` or `null`.
/// Reads clone the in-memory session under a read lock, so concurrent
/// dispatches never wait on each other, only on an in-progress write.
pub struct CredentialStore {
    path: PathBuf,
    state: RwLock<Session>,
}

impl CredentialStore {
    /// Load the session from the given file path.
    ///
    /// A missing file means nobody has logged in yet: the store starts
    /// Anonymous and writes `null` so later loads take the normal path.
    pub async fn load(path: PathBuf) -> Result<Self> {
        let session = if path.exists() {
            let contents = tokio::fs::read_to_string(&path)
                .await
                .map_err(|e| Error::Io(format!("reading session file: {e}")))?;
            let stored: Option<CredentialPair> = serde_json::from_str(&contents)
                .map_err(|e| Error::CredentialParse(format!("parsing session file: {e}")))?;
            let session = Session::from_stored(stored);
            info!(path = %path.display(), session = session.label(), "loaded session");
            session
        } else {
            info!(path = %path.display(), "session file not found, starting anonymous");
            write_atomic(&path, None).await?;
            Session::Anonymous
        };

        Ok(Self {
            path,
            state: RwLock::new(session),
        })
    }

    /// Snapshot of the current session.
    pub async fn get(&self) -> Session {
        self.state.read().await.clone()
    }

    /// Replace the whole session with the given pair and persist it.
    pub async fn set(&self, pair: CredentialPair) -> Result<()> {
        let mut state = self.state.write().await;
        *state = Session::Authenticated(pair);
        debug!("stored credential pair");
        write_atomic(&self.path, state.credentials()).await
    }

    /// Drop both tokens and persist the anonymous state.
    pub async fn clear(&self) -> Result<()> {
        let mut state = self.state.write().await;
        *state = Session::Anonymous;
        debug!("cleared session");
        write_atomic(&self.path, None).await
    }

    /// Replace the session only if it still holds `expected_refresh`.
    ///
    /// Returns `Ok(false)` without touching memory or disk when the session
    /// changed underneath the caller (a login or logout happened while a
    /// refresh was in flight). The check and the write happen under one
    /// write lock.
    pub async fn replace_if(&self, expected_refresh: &str, next: Session) -> Result<bool> {
        let mut state = self.state.write().await;
        let current = state.credentials().map(|pair| pair.refresh.as_str());
        if current != Some(expected_refresh) {
            debug!(session = state.label(), "session changed during refresh, not replacing");
            return Ok(false);
        }
        *state = next;
        debug!(session = state.label(), "replaced session");
        write_atomic(&self.path, state.to_stored().as_ref()).await?;
        Ok(true)
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Write the session to a file atomically.
///
/// Writes a temporary file in the same directory, then renames it over the
/// target. Permissions are 0600 since the file holds bearer tokens.
async fn write_atomic(path: &Path, data: Option<&CredentialPair>) -> Result<()> {
    let json = serde_json::to_string_pretty(&data)
        .map_err(|e| Error::CredentialParse(format!("serializing session: {e}")))?;

    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };

    let tmp_path = dir.join(format!(".session.tmp.{}", std::process::id()));

    tokio::fs::write(&tmp_path, json.as_bytes())
        .await
        .map_err(|e| Error::Io(format!("writing temp session file: {e}")))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        tokio::fs::set_permissions(&tmp_path, perms)
            .await
            .map_err(|e| Error::Io(format!("setting session file permissions: {e}")))?;
    }

    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|e| Error::Io(format!("renaming temp session file: {e}")))?;

    debug!(path = %path.display(), "persisted session");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn pair(suffix: &str) -> CredentialPair {
        CredentialPair::new(format!("at_{suffix}"), format!("rt_{suffix}"))
    }

    #[tokio::test]
    async fn session_survives_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");

        let store = CredentialStore::load(path.clone()).await.unwrap();
        store.set(pair("1")).await.unwrap();

        let reloaded = CredentialStore::load(path).await.unwrap();
        assert_eq!(reloaded.get().await, Session::Authenticated(pair("1")));
    }

    #[tokio::test]
    async fn missing_file_starts_anonymous_and_creates_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");

        assert!(!path.exists());
        let store = CredentialStore::load(path.clone()).await.unwrap();
        assert_eq!(store.get().await, Session::Anonymous);
        assert!(path.exists());

        let contents = tokio::fs::read_to_string(&path).await.unwrap();
        assert_eq!(contents.trim(), "null");
    }

    #[tokio::test]
    async fn corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        tokio::fs::write(&path, "{\"access\": ").await.unwrap();

        let result = CredentialStore::load(path).await;
        assert!(matches!(result, Err(Error::CredentialParse(_))));
    }

    #[tokio::test]
    async fn clear_persists_anonymous() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");

        let store = CredentialStore::load(path.clone()).await.unwrap();
        store.set(pair("1")).await.unwrap();
        store.clear().await.unwrap();
        assert_eq!(store.get().await, Session::Anonymous);

        let reloaded = CredentialStore::load(path).await.unwrap();
        assert_eq!(reloaded.get().await, Session::Anonymous);
    }

    #[tokio::test]
    async fn replace_if_swaps_when_refresh_token_matches() {
        let dir = tempfile::tempdir().unwrap();
        let store = CredentialStore::load(dir.path().join("session.json"))
            .await
            .unwrap();
        store.set(pair("1")).await.unwrap();

        let next = CredentialPair::new("at_2", "rt_1");
        let replaced = store
            .replace_if("rt_1", Session::Authenticated(next.clone()))
            .await
            .unwrap();

        assert!(replaced);
        assert_eq!(store.get().await, Session::Authenticated(next));
    }

    #[tokio::test]
    async fn replace_if_leaves_newer_login_alone() {
        let dir = tempfile::tempdir().unwrap();
        let store = CredentialStore::load(dir.path().join("session.json"))
            .await
            .unwrap();
        store.set(pair("relogin")).await.unwrap();

        let replaced = store.replace_if("rt_old", Session::Anonymous).await.unwrap();

        assert!(!replaced);
        assert_eq!(store.get().await, Session::Authenticated(pair("relogin")));
    }

    #[tokio::test]
    async fn replace_if_on_anonymous_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let store = CredentialStore::load(dir.path().join("session.json"))
            .await
            .unwrap();

        let replaced = store
            .replace_if("rt_1", Session::Authenticated(pair("2")))
            .await
            .unwrap();

        assert!(!replaced);
        assert_eq!(store.get().await, Session::Anonymous);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn file_permissions_are_0600() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");

        let store = CredentialStore::load(path.clone()).await.unwrap();
        store.set(pair("1")).await.unwrap();

        let metadata = tokio::fs::metadata(&path).await.unwrap();
        let mode = metadata.permissions().mode() & 0o777;
        assert_eq!(mode, 0o600, "session file must be 0600, got {mode:o}");
    }

    #[test]
    fn debug_output_hides_tokens() {
        let debug = format!("{:?}", Session::Authenticated(pair("secret")));
        assert!(!debug.contains("at_secret"), "leaked access token: {debug}");
        assert!(!debug.contains("rt_secret"), "leaked refresh token: {debug}");
    }

    #[tokio::test]
    async fn concurrent_readers_never_see_mixed_pair() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        let store = Arc::new(CredentialStore::load(path.clone()).await.unwrap());
        store.set(pair("0")).await.unwrap();

        let writer = {
            let store = store.clone();
            tokio::spawn(async move {
                for i in 1..20 {
                    store.set(pair(&i.to_string())).await.unwrap();
                }
            })
        };

        let mut readers = vec![];
        for _ in 0..8 {
            let store = store.clone();
            readers.push(tokio::spawn(async move {
                for _ in 0..50 {
                    if let Session::Authenticated(p) = store.get().await {
                        let access = p.access.strip_prefix("at_").unwrap();
                        let refresh = p.refresh.strip_prefix("rt_").unwrap();
                        assert_eq!(access, refresh, "observed mixed pair");
                    }
                    tokio::task::yield_now().await;
                }
            }));
        }

        writer.await.unwrap();
        for r in readers {
            r.await.unwrap();
        }

        let contents = tokio::fs::read_to_string(&path).await.unwrap();
        let on_disk: Option<CredentialPair> = serde_json::from_str(&contents).unwrap();
        assert_eq!(on_disk, Some(pair("19")));
    }
}
