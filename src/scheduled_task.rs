//! Cancellable background tasks that run on a fixed cadence.

use std::time::Duration;

use tokio::{
    sync::oneshot,
    task::JoinHandle,
    time::{Instant, MissedTickBehavior, interval_at},
};

/// A tokio task that calls a function every period until it is stopped.
///
/// Dropping a [ScheduledTask] also stops the task, but only [ScheduledTask::stop]
/// waits for it to finish.
#[derive(Debug)]
pub struct ScheduledTask {
    name: &'static str,
    stop: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

impl ScheduledTask {
    /// Spawn a task that calls `tick` at `start` and then every `period`.
    ///
    /// Ticks that fall behind are delayed rather than run back to back.
    ///
    /// # Panics
    ///
    /// Panics if `period` is zero or if called outside a tokio runtime.
    pub fn spawn<F>(name: &'static str, start: Instant, period: Duration, mut tick: F) -> Self
    where
        F: FnMut() + Send + 'static,
    {
        let (stop, mut stop_signal) = oneshot::channel::<()>();

        let handle = tokio::spawn(async move {
            let mut interval = interval_at(start, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;
                    // Resolves on an explicit stop and when the sender is dropped.
                    _ = &mut stop_signal => break,
                    _ = interval.tick() => {
                        tracing::debug!("Running scheduled task {name}");
                        tick();
                    }
                }
            }

            tracing::debug!("Stopped scheduled task {name}");
        });

        Self { name, stop, handle }
    }

    /// Whether the task has exited.
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Stop the task and wait for it to exit.
    ///
    /// A tick that is already running finishes first.
    pub async fn stop(self) {
        // The receiver is gone if the task already exited.
        let _ = self.stop.send(());

        if let Err(error) = self.handle.await {
            tracing::error!("Scheduled task {} did not exit cleanly: {error}", self.name);
        }
    }
}
