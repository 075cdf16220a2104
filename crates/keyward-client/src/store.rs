//! Token persistence.
//!
//! A [`TokenStore`] is a dumb key/value surface for the two session tokens.
//! It performs no validation; expiry and correctness checks belong to the
//! caller. The gateway and guard read and write exclusively through it.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use keyward_common::models::TokenPair;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

use crate::error::{ClientError, Result};

/// Persisted state for one session.
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Persist both tokens, overwriting any existing pair.
    async fn set_tokens(&self, pair: &TokenPair) -> Result<()>;

    /// Overwrite the access token only, keeping the stored refresh token.
    async fn set_access_token(&self, access: &str) -> Result<()>;

    async fn access_token(&self) -> Result<Option<String>>;

    async fn refresh_token(&self) -> Result<Option<String>>;

    /// Remove both tokens.
    async fn clear(&self) -> Result<()>;
}

/// On-disk layout: two string values under fixed keys.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
struct StoredTokens {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    access_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    refresh_token: Option<String>,
}

// ── In-memory ─────────────────────────────────────────────────────────────────

/// Process-local store. Nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    tokens: RwLock<StoredTokens>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store pre-seeded with a token pair.
    pub fn with_tokens(pair: &TokenPair) -> Self {
        Self {
            tokens: RwLock::new(StoredTokens {
                access_token: Some(pair.access.clone()),
                refresh_token: Some(pair.refresh.clone()),
            }),
        }
    }
}

#[async_trait]
impl TokenStore for MemoryTokenStore {
    async fn set_tokens(&self, pair: &TokenPair) -> Result<()> {
        let mut tokens = self.tokens.write().await;
        tokens.access_token = Some(pair.access.clone());
        tokens.refresh_token = Some(pair.refresh.clone());
        Ok(())
    }

    async fn set_access_token(&self, access: &str) -> Result<()> {
        self.tokens.write().await.access_token = Some(access.to_owned());
        Ok(())
    }

    async fn access_token(&self) -> Result<Option<String>> {
        Ok(self.tokens.read().await.access_token.clone())
    }

    async fn refresh_token(&self) -> Result<Option<String>> {
        Ok(self.tokens.read().await.refresh_token.clone())
    }

    async fn clear(&self) -> Result<()> {
        *self.tokens.write().await = StoredTokens::default();
        Ok(())
    }
}

// ── File-backed ───────────────────────────────────────────────────────────────

/// JSON file store that survives process restarts.
///
/// A missing file reads as an empty store. Writes go to a sibling temp file
/// and are renamed into place so a crash never leaves half a document.
#[derive(Debug)]
pub struct FileTokenStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileTokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<StoredTokens> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(StoredTokens::default()),
            Err(e) => Err(store_error(&self.path, e)),
        }
    }

    async fn save(&self, tokens: &StoredTokens) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| store_error(parent, e))?;
        }

        let tmp = self.path.with_extension("tmp");
        let body = serde_json::to_vec_pretty(tokens)?;
        write_private(&tmp, &body)
            .await
            .map_err(|e| store_error(&tmp, e))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| store_error(&self.path, e))?;

        debug!(path = %self.path.display(), "token store written");
        Ok(())
    }
}

/// Write `body` to `path` readable by the owner only.
async fn write_private(path: &Path, body: &[u8]) -> std::io::Result<()> {
    let mut options = tokio::fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    options.mode(0o600);

    let mut file = options.open(path).await?;
    // `mode` only applies on creation; a leftover temp file keeps its old bits.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(std::fs::Permissions::from_mode(0o600))
            .await?;
    }
    file.write_all(body).await?;
    file.sync_all().await
}

fn store_error(path: &Path, e: std::io::Error) -> ClientError {
    ClientError::Store(format!("{}: {e}", path.display()))
}

#[async_trait]
impl TokenStore for FileTokenStore {
    async fn set_tokens(&self, pair: &TokenPair) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        self.save(&StoredTokens {
            access_token: Some(pair.access.clone()),
            refresh_token: Some(pair.refresh.clone()),
        })
        .await
    }

    async fn set_access_token(&self, access: &str) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut tokens = self.load().await?;
        tokens.access_token = Some(access.to_owned());
        self.save(&tokens).await
    }

    async fn access_token(&self) -> Result<Option<String>> {
        Ok(self.load().await?.access_token)
    }

    async fn refresh_token(&self) -> Result<Option<String>> {
        Ok(self.load().await?.refresh_token)
    }

    async fn clear(&self) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(store_error(&self.path, e)),
        }
    }
}
