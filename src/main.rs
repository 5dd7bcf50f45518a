mod app;
mod client;
mod domain;
mod repo;
mod server;
mod ui;
mod view;

use std::fs::OpenOptions;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::runtime::Runtime;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use app::App;
use client::HttpTodoApi;
use repo::memory::InMemoryTodoRepo;
use repo::sqlite::SqliteTodoRepo;
use server::AppState;

const DEFAULT_LOG_FILTER: &str = "tasklist=info,tower_http=info";

#[derive(Parser, Debug)]
#[command(author, version, about = "tasklist: a small task list service and terminal client", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the task API over HTTP
    Serve(ServeArgs),
    /// Open the task list in the terminal
    Tui(TuiArgs),
}

#[derive(clap::Args, Debug)]
struct ServeArgs {
    /// Address to listen on
    #[arg(long, env = "TASKLIST_ADDR", default_value = "127.0.0.1:3000")]
    addr: SocketAddr,

    /// Start with demo tasks (implies --memory)
    #[arg(long, default_value_t = false)]
    demo: bool,

    /// Use in-memory store instead of SQLite
    #[arg(long, default_value_t = false)]
    memory: bool,

    /// Path to SQLite DB file (default: OS data dir)
    #[arg(long, env = "TASKLIST_DB")]
    db_path: Option<PathBuf>,
}

#[derive(clap::Args, Debug)]
struct TuiArgs {
    /// Task API endpoint
    #[arg(long, env = "TASKLIST_URL", default_value = client::DEFAULT_URL)]
    url: String,

    /// Tick interval of render loop in milliseconds
    #[arg(long, default_value_t = 120)]
    tick_ms: u64,

    /// Write logs to this file (the terminal is busy drawing)
    #[arg(long)]
    log_file: Option<PathBuf>,
}

fn main() -> Result<()> {
    let args = Args::parse();
    match args.command {
        Command::Serve(args) => serve(args),
        Command::Tui(args) => tui(args),
    }
}

fn serve(args: ServeArgs) -> Result<()> {
    init_tracing(None)?;

    let state = if args.demo {
        AppState::new(InMemoryTodoRepo::with_seed(seed_todos()))
    } else if args.memory {
        AppState::new(InMemoryTodoRepo::default())
    } else if let Some(path) = args.db_path.as_ref() {
        AppState::new(SqliteTodoRepo::open(path)?)
    } else {
        AppState::new(SqliteTodoRepo::open_default()?)
    };

    runtime()?.block_on(server::serve(args.addr, state))
}

fn tui(args: TuiArgs) -> Result<()> {
    if let Some(path) = args.log_file.as_deref() {
        init_tracing(Some(path))?;
    }

    let rt = runtime()?;
    let api = Arc::new(HttpTodoApi::new(args.url));
    tracing::info!(url = api.url(), "starting terminal client");
    let app = App::new(api, rt.handle().clone());
    ui::run(app, Duration::from_millis(args.tick_ms))
}

fn runtime() -> Result<Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to build tokio runtime")
}

fn init_tracing(log_file: Option<&Path>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let registry = tracing_subscriber::registry().with(filter);

    match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("failed to open log file {}", path.display()))?;
            registry
                .with(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
                .try_init()?;
        }
        None => registry
            .with(fmt::layer().with_writer(std::io::stderr))
            .try_init()?,
    }
    Ok(())
}

fn seed_todos() -> Vec<&'static str> {
    vec![
        "Write documentation",
        "Check PRs waiting for review",
        "Draft release notes",
    ]
}
