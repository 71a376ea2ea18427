//! Line-oriented command shell.
//!
//! Commands:
//! - `use <config> <interval-seconds>`: load a config and start sniping
//!   on an interval (replacing any running loop)
//! - `destroy`: stop the running loop
//! - `exit`: stop everything and leave

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{error, info, warn};

use crate::config::{AppConfig, PortalSettings};
use crate::runner::CycleRunner;
use crate::scheduler::Scheduler;

const PROMPT: &str = "$ ";
const USAGE: &str = "Usage: use <config> <interval>";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Use { config_path: PathBuf, interval_secs: u64 },
    Destroy,
    Exit,
    Empty,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ShellError {
    #[error("Usage: use <config> <interval>")]
    Usage,

    #[error("Unknown command: {0}")]
    Unknown(String),
}

/// Parse one input line.
pub fn parse_command(line: &str) -> Result<Command, ShellError> {
    let mut parts = line.split_whitespace();
    let Some(cmd) = parts.next() else {
        return Ok(Command::Empty);
    };

    match cmd {
        "use" => {
            let config_path = parts.next().ok_or(ShellError::Usage)?;
            let interval_secs = parts
                .next()
                .and_then(|s| s.parse::<u64>().ok())
                .filter(|&secs| secs > 0)
                .ok_or(ShellError::Usage)?;
            Ok(Command::Use {
                config_path: PathBuf::from(config_path),
                interval_secs,
            })
        }
        "destroy" => Ok(Command::Destroy),
        "exit" => Ok(Command::Exit),
        other => Err(ShellError::Unknown(other.to_string())),
    }
}

/// Builds the runner for a freshly loaded config's portal settings.
pub type RunnerFactory = Box<dyn Fn(&PortalSettings) -> Arc<dyn CycleRunner> + Send + Sync>;

/// Interactive shell driving a [`Scheduler`] with a [`CycleRunner`].
pub struct Shell {
    make_runner: RunnerFactory,
    scheduler: Scheduler,
}

impl Shell {
    pub fn new(make_runner: RunnerFactory) -> Self {
        Self {
            make_runner,
            scheduler: Scheduler::new(),
        }
    }

    pub fn is_running(&self) -> bool {
        self.scheduler.is_running()
    }

    /// Execute one command. Returns `false` once the shell should exit.
    pub fn execute(&mut self, command: Command) -> bool {
        match command {
            Command::Use {
                config_path,
                interval_secs,
            } => {
                self.start(&config_path, interval_secs);
                true
            }
            Command::Destroy => {
                self.scheduler.stop();
                true
            }
            Command::Exit => {
                if self.scheduler.is_running() {
                    self.scheduler.stop();
                }
                false
            }
            Command::Empty => true,
        }
    }

    fn start(&mut self, config_path: &Path, interval_secs: u64) {
        let absolute = std::env::current_dir()
            .map(|cwd| cwd.join(config_path))
            .unwrap_or_else(|_| config_path.to_path_buf());

        let config = match AppConfig::load(&absolute) {
            Ok(config) => Arc::new(config),
            Err(e) => {
                error!(path = %absolute.display(), error = %e, "Cannot use config");
                return;
            }
        };

        info!(
            path = %absolute.display(),
            targets = config.targets.len(),
            "Running sniper every {interval_secs} seconds..."
        );

        let runner = (self.make_runner)(&config.portal);
        self.scheduler
            .start(Duration::from_secs(interval_secs), move || {
                let runner = Arc::clone(&runner);
                let config = Arc::clone(&config);
                async move {
                    match runner.run_cycle(&config.credentials, &config.targets).await {
                        Ok(outcome) => info!(outcome = %outcome, "Cycle complete"),
                        Err(e) => error!(error = %e, "Cycle failed, continuing to next"),
                    }
                }
            });
    }

    /// Read commands from `input` until `exit` or end of input.
    pub async fn run<R, W>(&mut self, input: R, mut output: W) -> std::io::Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut lines = input.lines();

        info!("Ready to snipe your exam date");
        info!("I think you wanted to -> use <config> <interval>");

        loop {
            if !self.scheduler.is_running() {
                output.write_all(PROMPT.as_bytes()).await?;
                output.flush().await?;
            }

            let Some(line) = lines.next_line().await? else {
                break;
            };

            match parse_command(&line) {
                Ok(command) => {
                    if !self.execute(command) {
                        break;
                    }
                }
                Err(ShellError::Usage) => warn!("{}", USAGE),
                Err(e) => error!("{e}"),
            }
        }

        if self.scheduler.is_running() {
            self.scheduler.stop();
        }
        info!("Goodbye!");
        Ok(())
    }
}
