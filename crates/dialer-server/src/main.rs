//! dialer-server binary.
//!
//! Reads `config.toml` (or the path specified with `--config`) layered under
//! `DIALER_*` environment variables, opens the SQLite call store, starts the
//! configured campaign schedulers and serves the webhook and admin API.
//!
//! # Minimal configuration
//!
//! ```toml
//! webhook_base_url = "https://dialer.example.com"
//! voice_api_key    = "..."
//! voice_service    = "retell"
//! vicidial_url     = "https://vicidial.example.com"
//! vicidial_user    = "api"
//! vicidial_pass    = "..."
//!
//! [[campaigns]]
//! campaign_id    = "spring"
//! script_id      = "script-1"
//! max_concurrent = 5
//! interval_secs  = 60
//! ```

use std::{
  path::{Path, PathBuf},
  sync::Arc,
};

use anyhow::Context as _;
use clap::Parser;
use dialer_gateway::{VicidialClient, VoiceClient, VoiceService};
use dialer_server::{AppState, ServerConfig, scheduler};
use dialer_store_sqlite::SqliteCallStore;
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "AI voice-call campaign bridge")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  // Initialise tracing.
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  // Load configuration: defaults, then the file, then the environment.
  let settings = config::Config::builder()
    .set_default("host", "0.0.0.0")?
    .set_default("port", 5000)?
    .set_default("store_path", "calls.db")?
    .set_default("voice_service", "retell")?
    .add_source(config::File::from(cli.config).required(false))
    .add_source(config::Environment::with_prefix("DIALER"))
    .build()
    .context("failed to read config file")?;

  let server_cfg: ServerConfig = settings
    .try_deserialize()
    .context("failed to deserialise ServerConfig")?;

  // Expand `~` in store path.
  let store_path = expand_tilde(&server_cfg.store_path);

  // Open SQLite store.
  let store = SqliteCallStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;

  // External systems.
  let service = VoiceService::from_name(&server_cfg.voice_service);
  let mut voice = VoiceClient::new(service, server_cfg.voice_api_key.clone())
    .context("failed to build voice provider client")?;
  if let Some(base_url) = &server_cfg.voice_base_url {
    voice = voice.with_base_url(base_url.clone());
  }
  let call_center = VicidialClient::new(
    &server_cfg.vicidial_url,
    server_cfg.vicidial_user.clone(),
    server_cfg.vicidial_pass.clone(),
  )
  .context("failed to build call-center client")?;

  tracing::info!(service = ?service, "voice provider configured");

  // Build application state.
  let state = AppState::new(
    Arc::new(store),
    Arc::new(voice),
    Arc::new(call_center),
    &server_cfg.webhook_base_url,
  );
  tracing::info!(webhook_url = state.dispatcher.webhook_url(), "provider callbacks configured");

  let _schedulers = scheduler::spawn(state.dispatcher.clone(), &server_cfg.campaigns);

  let app = dialer_server::router(state);
  let address = format!("{}:{}", server_cfg.host, server_cfg.port);

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app).await.context("server error")?;

  Ok(())
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
