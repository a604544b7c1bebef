mod api;
mod app;
mod cache;
mod commands;
mod config;
mod context;
mod controllers;
mod event;
mod hardware;
mod license;
mod nav;
mod notifications;
mod query;
mod schedule;
mod storage;
mod ui;

use clap::Parser;
use color_eyre::{eyre::eyre, Result};
use nav::TabId;
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "licdeck")]
#[command(about = "A terminal console for administering a license server")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/licdeck/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// License server base URL, overrides the config file
  #[arg(short, long)]
  url: Option<String>,

  /// Tab to open instead of the last one used
  #[arg(short, long, value_parser = parse_tab)]
  tab: Option<TabId>,
}

fn parse_tab(value: &str) -> std::result::Result<TabId, String> {
  TabId::parse(value).ok_or_else(|| {
    let known: Vec<&str> = TabId::all().iter().map(|t| t.as_str()).collect();
    format!("unknown tab '{}', expected one of: {}", value, known.join(", "))
  })
}

/// Log to a file; the terminal belongs to the UI
fn init_logging() -> Result<WorkerGuard> {
  let dir = dirs::data_dir()
    .ok_or_else(|| eyre!("Could not determine data directory"))?
    .join("licdeck");
  std::fs::create_dir_all(&dir)
    .map_err(|e| eyre!("Failed to create log directory {}: {}", dir.display(), e))?;

  let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::never(
    &dir,
    "licdeck.log",
  ));
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_ansi(false)
    .with_writer(writer)
    .try_init()
    .map_err(|e| eyre!("Failed to install logger: {}", e))?;

  Ok(guard)
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();
  let _log_guard = init_logging()?;

  let config = config::Config::load(args.config.as_deref())?.with_url_override(args.url);

  let mut events = event::EventHandler::new(app::TICK_RATE);
  let mut app = app::App::new(config, args.tab, events.sender())?;
  app.run(&mut events).await?;

  Ok(())
}
