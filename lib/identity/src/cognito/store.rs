//! Persistent storage for provider-issued tokens.
//!
//! The store keeps one token set per user plus a marker naming the last
//! user who authenticated. That marker is what lets a restarted process
//! restore its session without prompting.

use async_trait::async_trait;
use rootcause::prelude::Report;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::error::ProviderError;
use crate::provider::ProviderSession;
use crate::token::IdToken;

/// File name used by [`FileTokenStore`] inside its directory.
pub const TOKEN_FILE_NAME: &str = "tokens.json";

/// A persisted token set.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredTokens {
    pub id_token: String,
    pub access_token: String,
    pub refresh_token: String,
}

impl StoredTokens {
    /// Converts the stored tokens into a provider session.
    #[must_use]
    pub fn to_session(&self) -> ProviderSession {
        ProviderSession::new(
            IdToken::new(self.id_token.clone()),
            self.access_token.clone(),
            self.refresh_token.clone(),
        )
    }
}

impl From<&ProviderSession> for StoredTokens {
    fn from(session: &ProviderSession) -> Self {
        Self {
            id_token: session.id_token().as_str().to_string(),
            access_token: session.access_token().to_string(),
            refresh_token: session.refresh_token().to_string(),
        }
    }
}

impl fmt::Debug for StoredTokens {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoredTokens").finish_non_exhaustive()
    }
}

/// On-disk layout of the token store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
struct TokenDocument {
    #[serde(default)]
    last_user: Option<String>,
    #[serde(default)]
    users: BTreeMap<String, StoredTokens>,
}

impl TokenDocument {
    fn save(&mut self, username: &str, tokens: StoredTokens) {
        self.users.insert(username.to_string(), tokens);
        self.last_user = Some(username.to_string());
    }

    fn clear(&mut self, username: &str) {
        self.users.remove(username);
        if self.last_user.as_deref() == Some(username) {
            self.last_user = None;
        }
    }
}

/// Storage for provider tokens.
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Returns the last user to authenticate, if their tokens are still stored.
    async fn last_user(&self) -> Result<Option<String>, Report<ProviderError>>;

    /// Loads the tokens stored for `username`.
    async fn load(&self, username: &str) -> Result<Option<StoredTokens>, Report<ProviderError>>;

    /// Stores tokens for `username` and marks them as the last user.
    async fn save(&self, username: &str, tokens: StoredTokens)
    -> Result<(), Report<ProviderError>>;

    /// Removes the tokens stored for `username`.
    async fn clear(&self, username: &str) -> Result<(), Report<ProviderError>>;
}

/// Token store backed by a single JSON file.
#[derive(Debug)]
pub struct FileTokenStore {
    path: PathBuf,
    // Serializes read-modify-write cycles within this process.
    lock: Mutex<()>,
}

impl FileTokenStore {
    /// Creates a store keeping its file in `dir`.
    ///
    /// The directory is created on first write.
    #[must_use]
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            path: dir.as_ref().join(TOKEN_FILE_NAME),
            lock: Mutex::new(()),
        }
    }

    /// Returns the path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read(&self) -> Result<TokenDocument, Report<ProviderError>> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(TokenDocument::default());
            }
            Err(e) => {
                return Err(ProviderError::Storage {
                    reason: format!("failed to read {}: {e}", self.path.display()),
                }
                .into());
            }
        };
        serde_json::from_slice(&bytes).map_err(|e| {
            ProviderError::Storage {
                reason: format!("failed to parse {}: {e}", self.path.display()),
            }
            .into()
        })
    }

    async fn write(&self, document: &TokenDocument) -> Result<(), Report<ProviderError>> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| ProviderError::Storage {
                    reason: format!("failed to create {}: {e}", parent.display()),
                })?;
        }
        let bytes = serde_json::to_vec_pretty(document).map_err(|e| ProviderError::Storage {
            reason: format!("failed to serialize tokens: {e}"),
        })?;
        let staging = self.staging_path();
        write_private(&staging, &bytes)
            .await
            .map_err(|e| ProviderError::Storage {
                reason: format!("failed to write {}: {e}", staging.display()),
            })?;
        if let Err(e) = tokio::fs::rename(&staging, &self.path).await {
            if let Err(cleanup) = tokio::fs::remove_file(&staging).await {
                warn!(path = %staging.display(), error = %cleanup, "failed to remove staging file");
            }
            return Err(ProviderError::Storage {
                reason: format!("failed to replace {}: {e}", self.path.display()),
            }
            .into());
        }
        debug!(path = %self.path.display(), "wrote token store");
        Ok(())
    }

    fn staging_path(&self) -> PathBuf {
        self.path.with_extension("json.tmp")
    }
}

/// Writes `bytes` to a fresh file at `path` readable only by its owner.
async fn write_private(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(e),
    }
    let mut options = tokio::fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    options.mode(0o600);
    let mut file = options.open(path).await?;
    file.write_all(bytes).await?;
    file.sync_all().await
}

#[async_trait]
impl TokenStore for FileTokenStore {
    async fn last_user(&self) -> Result<Option<String>, Report<ProviderError>> {
        let _guard = self.lock.lock().await;
        let document = self.read().await?;
        Ok(document
            .last_user
            .filter(|user| document.users.contains_key(user)))
    }

    async fn load(&self, username: &str) -> Result<Option<StoredTokens>, Report<ProviderError>> {
        let _guard = self.lock.lock().await;
        let mut document = self.read().await?;
        Ok(document.users.remove(username))
    }

    async fn save(
        &self,
        username: &str,
        tokens: StoredTokens,
    ) -> Result<(), Report<ProviderError>> {
        let _guard = self.lock.lock().await;
        let mut document = self.read().await?;
        document.save(username, tokens);
        self.write(&document).await
    }

    async fn clear(&self, username: &str) -> Result<(), Report<ProviderError>> {
        let _guard = self.lock.lock().await;
        let mut document = self.read().await?;
        document.clear(username);
        self.write(&document).await
    }
}

/// Token store that lives only as long as the process.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    document: Mutex<TokenDocument>,
}

impl MemoryTokenStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TokenStore for MemoryTokenStore {
    async fn last_user(&self) -> Result<Option<String>, Report<ProviderError>> {
        let document = self.document.lock().await;
        Ok(document
            .last_user
            .clone()
            .filter(|user| document.users.contains_key(user)))
    }

    async fn load(&self, username: &str) -> Result<Option<StoredTokens>, Report<ProviderError>> {
        Ok(self.document.lock().await.users.get(username).cloned())
    }

    async fn save(
        &self,
        username: &str,
        tokens: StoredTokens,
    ) -> Result<(), Report<ProviderError>> {
        self.document.lock().await.save(username, tokens);
        Ok(())
    }

    async fn clear(&self, username: &str) -> Result<(), Report<ProviderError>> {
        self.document.lock().await.clear(username);
        Ok(())
    }
}
