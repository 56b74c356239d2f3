//! restock-server binary.
//!
//! Reads `config.toml` (or the path given with `--config`), opens an
//! in-process SQLite store, starts the stock-event reactor and the mail
//! consumer, and serves the JSON API over HTTP.
//!
//! # Password hash generation
//!
//! To generate the argon2 PHC string for `admin_password_hash`:
//!
//! ```
//! cargo run -p restock-server -- --hash-password
//! ```

mod mailer;
mod settings;

use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::Context as _;
use argon2::{Argon2, PasswordHasher, password_hash::SaltString};
use clap::Parser;
use rand_core::OsRng;
use restock_api::{AppState, AuthConfig};
use restock_notify::{EventBus, Reactor};
use restock_store_sqlite::SqliteStore;
use tokio::{net::TcpListener, task::JoinHandle};
use tower_http::trace::TraceLayer;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use crate::settings::ServerConfig;

#[derive(Parser)]
#[command(author, version, about = "Back-in-stock notification server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,

  /// Print the argon2 hash for a password entered on stdin and exit.
  #[arg(long)]
  hash_password: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  if cli.hash_password {
    let password = read_password()?;
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
      .hash_password(password.as_bytes(), &salt)
      .map_err(|e| anyhow::anyhow!("argon2 error: {e}"))?
      .to_string();
    println!("{hash}");
    return Ok(());
  }

  let cfg = ServerConfig::load(&cli.config)?;
  let store_path = cfg.resolved_store_path();

  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;

  let bus = EventBus::new(cfg.bus_capacity);
  // Subscribe before anything can publish so no notification is lost.
  let mailer = mailer::spawn(bus.back_in_stock.subscribe());

  let state = AppState::new(
    Arc::new(store),
    bus.clone(),
    cfg.notifier.clone(),
    cfg.default_channel.as_str(),
    AuthConfig {
      username:      cfg.admin_username.clone(),
      password_hash: cfg.admin_password_hash.clone(),
    },
  );
  let reactor = Reactor::new(state.lifecycle.clone()).start(&bus);
  tracing::info!(
    enable_email = cfg.notifier.enable_email,
    limit_email_to_stock = cfg.notifier.limit_email_to_stock,
    allow_subscription_without_session = cfg.notifier.allow_subscription_without_session,
    reactor = reactor.is_some(),
    "notifier configured"
  );

  let app = restock_api::router(state).layer(TraceLayer::new_for_http());
  let address = format!("{}:{}", cfg.host, cfg.port);

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app)
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("server error")?;

  // The router and its state are gone; dropping the last bus handle closes
  // both topics, so the reactor drains what it received and then the mailer
  // drains what the reactor published.
  drop(bus);
  if let Some(reactor) = reactor {
    drain("reactor", reactor).await;
  }
  drain("mailer", mailer).await;
  Ok(())
}

const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

async fn drain(name: &'static str, mut task: JoinHandle<()>) {
  match tokio::time::timeout(SHUTDOWN_GRACE, &mut task).await {
    Ok(Ok(())) => tracing::debug!(task = name, "drained"),
    Ok(Err(e)) => tracing::error!(task = name, error = %e, "task failed during shutdown"),
    Err(_) => {
      tracing::warn!(task = name, "did not drain in time; aborting");
      task.abort();
    }
  }
}

async fn shutdown_signal() {
  if let Err(e) = tokio::signal::ctrl_c().await {
    tracing::error!(error = %e, "failed to listen for ctrl-c");
    std::future::pending::<()>().await;
  }
  tracing::info!("shutting down");
}

/// Read a password from stdin.
fn read_password() -> anyhow::Result<String> {
  use std::io::{self, BufRead, Write};
  print!("Password: ");
  io::stdout().flush().ok();
  let mut line = String::new();
  io::stdin().lock().read_line(&mut line)?;
  Ok(line.trim_end_matches(['\n', '\r']).to_string())
}
