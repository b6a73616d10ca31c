//! BasicSQL host binary: owns the config surface (CLI flags), the
//! `--create-user` administrative action, and starting the TCP server.
//! The engine and wire protocol are specified; this binary is the
//! out-of-scope host collaborator that wires them together (spec §1, §6).

use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Result;
use basicsql_auth::{AuthStore, Error as AuthError};
use basicsql_engine::Engine;
use basicsql_server::{Server, DEFAULT_BIND};
use clap::Parser;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "basicsql", about = "A small relational database engine and TCP server")]
struct Args {
    /// Root directory for the database files (created if missing). Defaults
    /// to `$BASICSQL_HOME`, falling back to `./basicsql-data`.
    #[arg(long)]
    root: Option<PathBuf>,

    /// TCP address to bind the server to.
    #[arg(long, default_value = DEFAULT_BIND)]
    bind: String,

    /// Create a user and exit: `--create-user <name> <password>`.
    #[arg(long, num_args = 2, value_names = ["NAME", "PASSWORD"])]
    create_user: Option<Vec<String>>,

    /// Log verbosity (error, warn, info, debug, trace).
    #[arg(long, default_value = "info")]
    log_level: String,
}

/// Resolve the persisted-layout root: `--root`, else `$BASICSQL_HOME`, else
/// `./basicsql-data`.
fn resolve_root(explicit: Option<PathBuf>) -> PathBuf {
    explicit
        .or_else(|| std::env::var_os("BASICSQL_HOME").map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("basicsql-data"))
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(&args.log_level))
        .init();

    let root = resolve_root(args.root.clone());
    if let Err(err) = std::fs::create_dir_all(&root) {
        error!("failed to create root directory: {err}");
        return ExitCode::from(1);
    }

    if let Some(values) = &args.create_user {
        return create_user(&root, &values[0], &values[1]);
    }

    match run_server(&args, &root).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("server exited with error: {err}");
            ExitCode::from(1)
        }
    }
}

fn create_user(root: &PathBuf, name: &str, password: &str) -> ExitCode {
    let store = match AuthStore::open(root) {
        Ok(store) => store,
        Err(err) => {
            error!("failed to open user store: {err}");
            return ExitCode::from(1);
        }
    };
    match store.create_user(name, password) {
        Ok(()) => {
            info!(username = name, "user created");
            ExitCode::SUCCESS
        }
        Err(AuthError::AlreadyExists(_)) => {
            error!("user {name} already exists");
            ExitCode::from(2)
        }
        Err(err) => {
            error!("failed to create user: {err}");
            ExitCode::from(1)
        }
    }
}

async fn run_server(args: &Args, root: &PathBuf) -> Result<()> {
    let engine = Arc::new(Engine::open(root)?);
    let auth = Arc::new(AuthStore::open(root)?);
    let bind_addr: SocketAddr = args.bind.parse()?;

    info!(root = %root.display(), bind = %bind_addr, "starting BasicSQL server");
    let server = Server::new(bind_addr, engine, auth);
    server.run().await
}
