//! # Bazaar Notification Dispatcher
//!
//! ## Usage
//! ```bash
//! # Platform config dir, then BAZAAR_* environment overrides
//! cargo run -p bazaar-notify --bin bazaar-dispatcher
//!
//! # Explicit config file
//! cargo run -p bazaar-notify --bin bazaar-dispatcher -- --config ./notify.toml
//!
//! # More output
//! RUST_LOG=debug cargo run -p bazaar-notify --bin bazaar-dispatcher
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use bazaar_db::{Database, DbConfig};
use bazaar_notify::{NotificationDispatcher, NotifyConfig, TracingSink};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let config = Arc::new(NotifyConfig::load(config_path_arg())?);
    info!(
        database = %config.database.path.display(),
        domain = %config.mail.domain,
        "Configuration loaded"
    );

    let db = Arc::new(Database::new(DbConfig::new(config.database.path.clone())).await?);
    info!("Connected to database");

    let (dispatcher, handle) = NotificationDispatcher::new(db.clone(), config, Arc::new(TracingSink));
    let task = tokio::spawn(dispatcher.run());

    tokio::signal::ctrl_c().await?;
    info!("Received ctrl-c");

    handle.shutdown().await?;
    task.await?;
    db.close().await;

    Ok(())
}

/// `RUST_LOG` wins; otherwise info with quiet sqlx.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn"));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn config_path_arg() -> Option<PathBuf> {
    let args: Vec<String> = std::env::args().collect();
    args.iter()
        .position(|a| a == "--config" || a == "-c")
        .and_then(|i| args.get(i + 1))
        .map(PathBuf::from)
}
