use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use passkeeper_server::config::ServerConfig;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "passkeeper-server")]
#[command(about = "Passkeeper secret storage server")]
struct Cli {
    /// Base directory for the default database and blob locations
    #[arg(long, env = "PASSKEEPER_DATA_DIR", default_value = "passkeeper_data")]
    data_dir: PathBuf,

    #[arg(short, long, env = "PASSKEEPER_LISTEN", default_value = "0.0.0.0:3200")]
    listen: SocketAddr,

    /// Overrides the database under the data directory
    #[arg(long, env = "PASSKEEPER_DATABASE_URL")]
    database_url: Option<String>,

    /// Overrides the blob directory under the data directory
    #[arg(long, env = "PASSKEEPER_BLOB_DIR")]
    blob_dir: Option<PathBuf>,

    #[arg(long, env = "PASSKEEPER_TOKEN_SECRET", hide_env_values = true)]
    token_secret: String,

    /// Token lifetime in seconds; 0 issues tokens that never expire
    #[arg(long, env = "PASSKEEPER_TOKEN_TTL_SECS", default_value_t = 86_400)]
    token_ttl_secs: u64,

    #[arg(long, env = "PASSKEEPER_HASH_COST", default_value_t = bcrypt::DEFAULT_COST)]
    hash_cost: u32,

    #[arg(long, env = "PASSKEEPER_MAX_CONNECTIONS", default_value_t = 5)]
    max_connections: u32,
}

impl Cli {
    fn into_config(self) -> ServerConfig {
        let mut config = ServerConfig::with_base_dir(self.data_dir);
        config.listen_addr = self.listen;
        if let Some(url) = self.database_url {
            config.database_url = url;
        }
        if let Some(dir) = self.blob_dir {
            config.blob_dir = dir;
        }
        config.token_secret = self.token_secret;
        config.token_ttl = (self.token_ttl_secs > 0).then(|| Duration::from_secs(self.token_ttl_secs));
        config.hash_cost = self.hash_cost;
        config.max_connections = self.max_connections;
        config
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    passkeeper_server::run(cli.into_config()).await
}
