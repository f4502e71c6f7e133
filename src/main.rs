mod app;
mod catalog;
mod config;
mod constants;
mod input;
mod media;
mod playback;
mod playlist;
mod ui;
mod upload;

use anyhow::{Context, Result};
use clap::Parser;
use directories::ProjectDirs;
use ratatui::{
  DefaultTerminal,
  crossterm::event::{self, Event, KeyEventKind},
};
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

use app::App;
use catalog::{CatalogStore, JsonFileStore, MemoryStore};
use config::Config;
use constants::constants;

// --- CLI ---

#[derive(Parser, Debug)]
#[command(author, version = env!("CARGO_PKG_VERSION"), about, long_about = None)]
struct Args {
  /// Directory holding the catalog file (default: platform data dir)
  #[arg(long)]
  data_dir: Option<PathBuf>,

  /// Keep the catalog in memory only; nothing is written to disk
  #[arg(long)]
  no_persist: bool,

  /// Start with loop mode disabled, overriding the saved preference
  #[arg(long)]
  no_loop: bool,
}

// --- Setup ---

/// Log to a file in the data directory — the terminal belongs to the UI.
/// The returned guard must live for the duration of the program.
fn init_logging() -> Option<tracing_appender::non_blocking::WorkerGuard> {
  let proj_dirs = ProjectDirs::from("", "", "vidshelf")?;
  let log_dir = proj_dirs.data_dir();
  std::fs::create_dir_all(log_dir).ok()?;
  let appender = tracing_appender::rolling::never(log_dir, "vidshelf.log");
  let (writer, guard) = tracing_appender::non_blocking(appender);
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .with_writer(writer)
    .with_ansi(false)
    .init();
  Some(guard)
}

fn open_store(args: &Args) -> Result<Box<dyn CatalogStore>> {
  if args.no_persist {
    return Ok(Box::new(MemoryStore::new()));
  }
  let dir = match &args.data_dir {
    Some(dir) => dir.clone(),
    None => ProjectDirs::from("", "", "vidshelf")
      .context("Could not determine a data directory; pass --data-dir")?
      .data_dir()
      .to_path_buf(),
  };
  Ok(Box::new(JsonFileStore::open(dir.join(&constants().catalog_file))?))
}

// --- Main ---

#[tokio::main]
async fn main() -> Result<()> {
  let args = Args::parse();
  let _log_guard = init_logging();

  let default_hook = std::panic::take_hook();
  std::panic::set_hook(Box::new(move |info| {
    ratatui::restore();
    default_hook(info);
  }));

  let mut terminal = ratatui::init();
  let result = run(&mut terminal, args).await;
  ratatui::restore();
  result
}

async fn run(terminal: &mut DefaultTerminal, args: Args) -> Result<()> {
  let mut config = Config::load();
  if args.no_loop {
    config.loop_enabled = Some(false);
  }
  let store = open_store(&args)?;
  let mut app = App::new(store, config)?;
  info!(videos = app.controller.playlist.len(), "vidshelf started");

  loop {
    app.check_pending().await?;
    app.pump_media().await?;
    app.tick().await?;

    terminal.draw(|frame| ui::ui(frame, &mut app))?;

    if event::poll(Duration::from_millis(100))? {
      match event::read()? {
        Event::Key(key) if key.kind == KeyEventKind::Press => {
          input::handle_key_event(&mut app, key).await?;
        }
        _ => {}
      }
    }

    if app.should_quit {
      break;
    }
  }

  app.controller.shutdown().await?;
  Ok(())
}
