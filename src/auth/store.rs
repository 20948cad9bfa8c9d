use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::auth::session::{Session, UserIdentity};

/// Fixed key for the persisted access token
pub const ACCESS_TOKEN_KEY: &str = "auth.access_token";
/// Fixed key for the persisted refresh token
pub const REFRESH_TOKEN_KEY: &str = "auth.refresh_token";
/// Fixed key for the serialized user identity
pub const USER_KEY: &str = "auth.user";

/// Durable key/value persistence for session credentials.
///
/// Pure get/set/delete with no business logic. Only the token authority
/// writes; anything may read at process start, after which the in-memory
/// session is authoritative.
#[async_trait::async_trait]
pub trait CredentialStore: Send + Sync {
    /// Read a value, `None` when the key is absent
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Write a value
    async fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Remove a value; removing an absent key is not an error
    async fn delete(&self, key: &str) -> Result<()>;
}

/// Persist a session's three credentials under the fixed keys
pub async fn persist_session(store: &dyn CredentialStore, session: &Session) -> Result<()> {
    store.set(ACCESS_TOKEN_KEY, &session.access_token).await?;
    store.set(REFRESH_TOKEN_KEY, &session.refresh_token).await?;
    let user_json = serde_json::to_string(&session.user).context("serializing user identity")?;
    store.set(USER_KEY, &user_json).await?;
    debug!(user_id = %session.user.id, "Session mirrored to credential store");
    Ok(())
}

/// Load a previously persisted session. Returns `None` when any of the
/// three keys is missing or the user payload does not parse; partial
/// state is not a session.
pub async fn load_session(store: &dyn CredentialStore) -> Result<Option<Session>> {
    let access_token = store.get(ACCESS_TOKEN_KEY).await?;
    let refresh_token = store.get(REFRESH_TOKEN_KEY).await?;
    let user_json = store.get(USER_KEY).await?;

    let (access_token, refresh_token, user_json) = match (access_token, refresh_token, user_json) {
        (Some(a), Some(r), Some(u)) => (a, r, u),
        _ => return Ok(None),
    };

    let user: UserIdentity = match serde_json::from_str(&user_json) {
        Ok(user) => user,
        Err(e) => {
            warn!(error = %e, "Persisted user identity is unreadable, discarding session");
            return Ok(None);
        }
    };

    Ok(Some(Session {
        user,
        access_token,
        refresh_token,
        expiry_hint: None,
    }))
}

/// Remove all session keys
pub async fn clear_session(store: &dyn CredentialStore) -> Result<()> {
    store.delete(ACCESS_TOKEN_KEY).await?;
    store.delete(REFRESH_TOKEN_KEY).await?;
    store.delete(USER_KEY).await?;
    Ok(())
}

/// Credential store backed by a single JSON file on disk.
///
/// The whole file is loaded at construction and rewritten on every
/// mutation; credential payloads are three small strings, so this stays
/// cheap and keeps the on-disk state consistent after a crash.
pub struct JsonFileStore {
    path: PathBuf,
    entries: Arc<Mutex<HashMap<String, String>>>,
}

impl JsonFileStore {
    /// Open the store at `path`, reading existing contents when present.
    /// A missing file starts empty; a corrupt file is discarded with a
    /// warning rather than failing startup.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let entries = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => match serde_json::from_str::<HashMap<String, String>>(&raw) {
                Ok(map) => map,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Credential file is corrupt, starting empty");
                    HashMap::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => {
                return Err(anyhow!(e)).context(format!(
                    "reading credential store at {}",
                    path.display()
                ))
            }
        };

        info!(path = %path.display(), entries = entries.len(), "Opened credential store");

        Ok(Self {
            path,
            entries: Arc::new(Mutex::new(entries)),
        })
    }

    async fn save(&self, entries: &HashMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .context("creating credential store directory")?;
            }
        }
        let raw = serde_json::to_string_pretty(entries).context("serializing credential store")?;
        tokio::fs::write(&self.path, raw)
            .await
            .with_context(|| format!("writing credential store at {}", self.path.display()))?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl CredentialStore for JsonFileStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let entries = self.entries.lock().await;
        Ok(entries.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self.entries.lock().await;
        entries.insert(key.to_string(), value.to_string());
        self.save(&entries).await
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut entries = self.entries.lock().await;
        if entries.remove(key).is_some() {
            self.save(&entries).await?;
        }
        Ok(())
    }
}

/// In-memory credential store. Sessions do not survive a restart; useful
/// for tests and for embedders that opt out of persistence.
#[derive(Default)]
pub struct MemoryStore {
    entries: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl CredentialStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.lock().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entries
            .lock()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.entries.lock().await.remove(key);
        Ok(())
    }
}
