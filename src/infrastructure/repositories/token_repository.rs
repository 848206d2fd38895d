use crate::domain::auth::TokenRecord;
use crate::error::{AppError, AppResult};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;

/// Durable storage for the current token record.
///
/// Implementations must never expose a partially written record: a reader
/// sees either the previous record or the new one.
#[async_trait]
pub trait TokenRepository: Send + Sync {
    /// Load the stored record, `None` when nothing has been stored yet
    async fn load(&self) -> AppResult<Option<TokenRecord>>;

    /// Replace the stored record
    async fn save(&self, record: &TokenRecord) -> AppResult<()>;
}

/// JSON token file, rewritten through a temp file and an atomic rename.
///
/// There is no locking: concurrent runs against the same file must be
/// serialized by the caller.
pub struct FileTokenRepository {
    path: PathBuf,
}

impl FileTokenRepository {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut file_name = self
            .path
            .file_name()
            .map(|name| name.to_os_string())
            .unwrap_or_else(|| "tokens.json".into());
        file_name.push(".tmp");
        self.path.with_file_name(file_name)
    }
}

#[async_trait]
impl TokenRepository for FileTokenRepository {
    async fn load(&self) -> AppResult<Option<TokenRecord>> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %self.path.display(), "No token file found");
                return Ok(None);
            }
            Err(e) => {
                return Err(AppError::Storage(format!(
                    "Failed to read {}: {}",
                    self.path.display(),
                    e
                )))
            }
        };

        let record = serde_json::from_str::<TokenRecord>(&content).map_err(|e| {
            AppError::Storage(format!("Failed to parse {}: {}", self.path.display(), e))
        })?;

        tracing::info!(path = %self.path.display(), "Loaded existing tokens");
        Ok(Some(record))
    }

    async fn save(&self, record: &TokenRecord) -> AppResult<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                AppError::Storage(format!("Failed to create {}: {}", parent.display(), e))
            })?;
        }

        let content = serde_json::to_string_pretty(record)
            .map_err(|e| AppError::Storage(format!("Failed to serialize tokens: {}", e)))?;

        let temp_path = self.temp_path();
        if let Err(e) = write_private(&temp_path, content.as_bytes()).await {
            let _ = tokio::fs::remove_file(&temp_path).await;
            return Err(AppError::Storage(format!(
                "Failed to write temp token file: {}",
                e
            )));
        }

        if let Err(e) = tokio::fs::rename(&temp_path, &self.path).await {
            let _ = tokio::fs::remove_file(&temp_path).await;
            return Err(AppError::Storage(format!(
                "Failed to replace {}: {}",
                self.path.display(),
                e
            )));
        }

        tracing::info!(path = %self.path.display(), "Updated tokens");
        Ok(())
    }
}

async fn write_private(path: &Path, content: &[u8]) -> std::io::Result<()> {
    tokio::fs::write(path, content).await?;

    // Token files hold secrets
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600)).await?;
    }

    Ok(())
}

/// Process-local storage, for tests and runs that should not touch disk
#[derive(Default)]
pub struct InMemoryTokenRepository {
    record: RwLock<Option<TokenRecord>>,
}

impl InMemoryTokenRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_record(record: TokenRecord) -> Self {
        Self {
            record: RwLock::new(Some(record)),
        }
    }
}

#[async_trait]
impl TokenRepository for InMemoryTokenRepository {
    async fn load(&self) -> AppResult<Option<TokenRecord>> {
        Ok(self.record.read().await.clone())
    }

    async fn save(&self, record: &TokenRecord) -> AppResult<()> {
        *self.record.write().await = Some(record.clone());
        Ok(())
    }
}
