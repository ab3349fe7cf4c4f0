//! Passkeeper server configuration

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::auth::{AuthGate, AuthService};
use crate::keeper::Keeper;

/// Configuration for the Passkeeper Server
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Address the HTTP listener binds to
    pub listen_addr: SocketAddr,
    /// SQLite connection string
    pub database_url: String,
    /// Directory holding uploaded file contents
    pub blob_dir: PathBuf,
    /// HMAC secret for identity tokens
    pub token_secret: String,
    /// Token lifetime; `None` issues tokens without `exp`
    pub token_ttl: Option<Duration>,
    /// bcrypt cost factor
    pub hash_cost: u32,
    /// Database pool size
    pub max_connections: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::with_base_dir("passkeeper_data")
    }
}

impl ServerConfig {
    /// Create config with custom base directory
    pub fn with_base_dir(base_dir: impl Into<PathBuf>) -> Self {
        let base = base_dir.into();
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 3200)),
            database_url: format!(
                "sqlite://{}",
                base.join("passkeeper.sqlite")
                    .to_string_lossy()
                    .replace('\\', "/")
            ),
            blob_dir: base.join("blobs"),
            token_secret: String::new(),
            token_ttl: Some(Duration::from_secs(24 * 60 * 60)),
            hash_cost: bcrypt::DEFAULT_COST,
            max_connections: 5,
        }
    }

    /// Rejects settings the server cannot start with.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.token_secret.is_empty() {
            anyhow::bail!("token secret must not be empty");
        }
        if !(4..=31).contains(&self.hash_cost) {
            anyhow::bail!("hash cost must be between 4 and 31, got {}", self.hash_cost);
        }
        if self.max_connections == 0 {
            anyhow::bail!("max connections must be at least 1");
        }
        Ok(())
    }

    /// Ensure all directories exist
    pub async fn ensure_dirs(&self) -> anyhow::Result<()> {
        tokio::fs::create_dir_all(&self.blob_dir).await?;
        if let Some(parent) = self.database_path().and_then(|p| p.parent().map(PathBuf::from)) {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        Ok(())
    }

    fn database_path(&self) -> Option<PathBuf> {
        let path = self.database_url.strip_prefix("sqlite://")?;
        let path = path.split('?').next().unwrap_or(path);
        if path.is_empty() || path == ":memory:" {
            return None;
        }
        Some(PathBuf::from(path))
    }
}

/// App state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<AuthService>,
    pub keeper: Arc<Keeper>,
    pub gate: Arc<AuthGate>,
}
