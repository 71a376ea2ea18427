//! Exam sniper entry point.
//!
//! `shell` (default) reads `use` / `destroy` / `exit` commands from stdin
//! and snipes on an interval; `serve` exposes a cron endpoint that runs one
//! cycle per request.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use secrecy::SecretString;
use std::sync::Arc;
use tokio::io::BufReader;
use tracing::info;

use exam_sniper::config::{self, Credentials, PortalSettings};
use exam_sniper::runner::{BrowserRunner, CycleRunner};
use exam_sniper::server::{self, routes::ServerState};
use exam_sniper::shell::Shell;

const BANNER: &str = r#"
  ___                       ___      _
 | __|_ ____ _ _ __    ___ / __|_ _ (_)_ __  ___ _ _
 | _|\ \ / _` | '  \  |___|\__ \ ' \| | '_ \/ -_) '_|
 |___/_\_\__,_|_|_|_|      |___/_||_|_| .__/\___|_|
                                      |_|
"#;

#[derive(Parser)]
#[command(name = "exam-sniper", version, about = "Claim exam slots the moment they open")]
struct Cli {
    #[command(subcommand)]
    command: Option<Mode>,
}

#[derive(Subcommand)]
enum Mode {
    /// Interactive shell: `use <config> <interval>`, `destroy`, `exit`
    Shell,
    /// HTTP cron endpoint; credentials and token come from the environment
    Serve {
        /// Port to listen on (falls back to $PORT, then 3000)
        #[arg(long)]
        port: Option<u16>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    init_logging();

    let cli = Cli::parse();
    println!("{BANNER}");

    match cli.command.unwrap_or(Mode::Shell) {
        Mode::Shell => run_shell().await,
        Mode::Serve { port } => run_server(port).await,
    }
}

async fn run_shell() -> Result<()> {
    let mut shell = Shell::new(Box::new(|portal: &PortalSettings| {
        Arc::new(BrowserRunner::new(portal.clone())) as Arc<dyn CycleRunner>
    }));

    shell
        .run(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
        .await
        .context("Shell I/O failed")
}

async fn run_server(port: Option<u16>) -> Result<()> {
    let port = match port {
        Some(port) => port,
        None => std::env::var("PORT")
            .ok()
            .map(|p| p.parse::<u16>())
            .transpose()
            .context("PORT is not a valid port number")?
            .unwrap_or(3000),
    };

    let credentials = Credentials::from_env()?;
    credentials.validate()?;
    let token = SecretString::new(config::resolve_env("SNIPER_CRON_TOKEN")?);

    info!(port, username = %credentials.username, "Starting cron endpoint");

    let state = Arc::new(ServerState {
        runner: Arc::new(BrowserRunner::new(PortalSettings::default())),
        credentials,
        token,
    });

    tokio::select! {
        result = server::serve(state, port) => result,
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received.");
            Ok(())
        }
    }
}

/// Initialise the `tracing` subscriber.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("exam_sniper=info"));

    let json_logging = std::env::var("SNIPER_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        fmt().with_env_filter(env_filter).with_target(true).init();
    }
}
