//! Interval scheduler.
//!
//! Replaces a free-floating interval handle with an owned lifecycle:
//! `start` spawns one loop task that runs the injected cycle every
//! interval, `stop` cancels it. Cycles run one at a time; ticks missed
//! while a cycle is still running are skipped.

use std::future::Future;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

struct Running {
    stop_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
    interval: Duration,
}

#[derive(Default)]
pub struct Scheduler {
    running: Option<Running>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_running(&self) -> bool {
        self.running
            .as_ref()
            .map(|r| !r.task.is_finished())
            .unwrap_or(false)
    }

    pub fn interval(&self) -> Option<Duration> {
        self.running.as_ref().map(|r| r.interval)
    }

    /// Run `cycle` every `interval`, first after one full interval.
    /// A loop that is already running is stopped first.
    pub fn start<F, Fut>(&mut self, interval: Duration, cycle: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        if self.running.is_some() {
            info!("Found existing service, stopping it first");
            self.stop();
        }

        let (stop_tx, mut stop_rx) = watch::channel(false);
        let task = tokio::spawn(async move {
            let mut ticker = time::interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        debug!("Scheduler tick");
                        cycle().await;
                    }
                    _ = stop_rx.changed() => break,
                }
            }
        });

        info!(interval_secs = interval.as_secs_f64(), "Running sniper on an interval");
        self.running = Some(Running {
            stop_tx,
            task,
            interval,
        });
    }

    /// Stop the loop. Returns `false` when nothing was running.
    pub fn stop(&mut self) -> bool {
        match self.running.take() {
            Some(running) => {
                let _ = running.stop_tx.send(true);
                running.task.abort();
                info!("Service has been stopped");
                true
            }
            None => {
                warn!("There's nothing running yet");
                false
            }
        }
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        if let Some(running) = self.running.take() {
            running.task.abort();
        }
    }
}
