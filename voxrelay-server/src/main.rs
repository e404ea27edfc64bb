//! voxrelay signaling server -- resolves configuration, opens the store,
//! and serves the signaling hub's HTTP + WebSocket surface.
//!
//! # Usage
//!
//! ```bash
//! # Run with defaults (SQLite at ./voxrelay.db, media under ./media)
//! cargo run --bin voxrelay-server
//!
//! # Or configure through the documented environment variables
//! HOST=127.0.0.1 PORT=8080 MAX_CHAT_MESSAGES=500 cargo run --bin voxrelay-server
//! ```

use std::sync::Arc;

use clap::Parser;
use voxrelay_server::config::{RelayCliArgs, RelayConfig};
use voxrelay_server::hub::HubState;
use voxrelay_server::state::AppState;
use voxrelay_server::store::{SqliteStore, Store};

#[tokio::main]
async fn main() {
    let cli = RelayCliArgs::parse();

    let config = match RelayConfig::load(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    init_logging(&config);

    if let Err(e) = run(config).await {
        tracing::error!(error = %e, "voxrelay server failed");
        std::process::exit(1);
    }
}

fn init_logging(config: &RelayConfig) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    match &config.log_filepath {
        Some(path) => {
            let directory = path.parent().filter(|p| !p.as_os_str().is_empty());
            let file_name = path.file_name().map_or_else(
                || "voxrelay.log".to_string(),
                |n| n.to_string_lossy().into_owned(),
            );
            let appender = tracing_appender::rolling::never(
                directory.unwrap_or_else(|| std::path::Path::new(".")),
                file_name,
            );
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(appender)
                .init();
        }
        None => {
            tracing_subscriber::fmt().with_env_filter(filter).init();
        }
    }
}

async fn run(config: RelayConfig) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing::info!(addr = %config.bind_addr(), "starting voxrelay signaling server");

    std::fs::create_dir_all(&config.media_dir)?;
    std::fs::create_dir_all(config.media_dir.join("avatars"))?;

    let store = SqliteStore::open(&config.db_path, config.max_chat_messages, &config.media_dir)?;
    store.init_default_rooms()?;

    if let (Some(uuid), Some(username)) = (&config.admin_uuid, &config.admin_username) {
        if store.get_user_by_uuid(uuid)?.is_none() {
            match store.add_user(uuid, username, true) {
                Ok(_) => tracing::info!(%username, "provisioned admin account"),
                Err(e) => tracing::warn!(error = %e, "failed to provision admin account"),
            }
        }
    }

    let hub = Arc::new(HubState::new(Arc::new(store)));
    let app = AppState {
        hub,
        config: Arc::new(config.clone()),
    };

    let (bound_addr, handle) =
        voxrelay_server::start_server_with_state(&config.bind_addr(), app).await?;
    tracing::info!(addr = %bound_addr, "voxrelay listening");
    handle.await?;
    Ok(())
}
