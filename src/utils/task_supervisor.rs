use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use crate::error::{Error, Result};

/// Task Supervisor - Tracks the background monitor loops and owns their
/// shutdown signal.
///
/// Each monitor loop subscribes to the shutdown channel and exits its
/// interval loop when the signal flips. `shutdown_all` flips the signal,
/// grants every task a grace period to drain, then aborts stragglers.
pub struct TaskSupervisor {
    tasks: HashMap<String, JoinHandle<()>>,
    shutdown_tx: watch::Sender<bool>,
    grace_period: Duration,
}

impl TaskSupervisor {
    pub fn new() -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        TaskSupervisor {
            tasks: HashMap::new(),
            shutdown_tx,
            grace_period: Duration::from_secs(2),
        }
    }

    /// Receiver for the shutdown signal; loops select on this against
    /// their interval tick.
    pub fn shutdown_signal(&self) -> watch::Receiver<bool> {
        self.shutdown_tx.subscribe()
    }

    /// Spawn a new background task and register it for supervision
    pub fn spawn<F>(&mut self, name: impl Into<String>, future: F) -> &mut Self
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let name = name.into();
        let handle = tokio::spawn(future);

        info!("Spawned background task: {}", name);
        self.tasks.insert(name, handle);
        self
    }

    /// Returns an error if any supervised task has terminated on its own;
    /// a monitor loop exiting outside shutdown means its state is going
    /// stale.
    pub fn check_health(&mut self) -> Result<()> {
        let failed: Vec<String> = self
            .tasks
            .iter()
            .filter(|(_, handle)| handle.is_finished())
            .map(|(name, _)| name.clone())
            .collect();

        if failed.is_empty() {
            return Ok(());
        }

        for name in &failed {
            self.tasks.remove(name);
        }
        let message = format!("Tasks terminated unexpectedly: {:?}", failed);
        error!("{}", message);
        Err(Error::TaskError(message))
    }

    pub fn active_task_count(&self) -> usize {
        self.tasks.len()
    }

    /// Signal shutdown and wait for every task, aborting any that outlive
    /// the grace period.
    pub async fn shutdown_all(&mut self) {
        info!("Shutting down {} background tasks", self.tasks.len());
        let _ = self.shutdown_tx.send(true);

        for (name, handle) in self.tasks.drain() {
            match tokio::time::timeout(self.grace_period, handle).await {
                Ok(Ok(())) => info!("Task {} stopped cleanly", name),
                Ok(Err(e)) => warn!("Task {} ended with join error: {:?}", name, e),
                Err(_) => {
                    warn!("Task {} did not stop within grace period, aborting", name);
                }
            }
        }
    }
}

impl Default for TaskSupervisor {
    fn default() -> Self {
        Self::new()
    }
}
