//! Cancellable recurring tasks.

use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// A recurring callback on the tokio runtime.
///
/// The first run happens one `period` after start. Stopping, or dropping the
/// handle, prevents future runs. Work the callback already spawned is not
/// affected.
#[derive(Debug)]
pub struct ScheduledTask {
  handle: JoinHandle<()>,
  period: Duration,
}

impl ScheduledTask {
  pub fn every<F>(period: Duration, mut tick: F) -> Self
  where
    F: FnMut() + Send + 'static,
  {
    let handle = tokio::spawn(async move {
      let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
      interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
      loop {
        interval.tick().await;
        tick();
      }
    });

    Self { handle, period }
  }

  pub fn period(&self) -> Duration {
    self.period
  }

  pub fn stop(self) {
    // Drop aborts
  }
}

impl Drop for ScheduledTask {
  fn drop(&mut self) {
    self.handle.abort();
  }
}

/// At most one running [`ScheduledTask`]; starting again replaces it.
#[derive(Debug, Default)]
pub struct AutoRefresh {
  task: Option<ScheduledTask>,
}

impl AutoRefresh {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn start<F>(&mut self, period: Duration, tick: F)
  where
    F: FnMut() + Send + 'static,
  {
    self.stop();
    self.task = Some(ScheduledTask::every(period, tick));
  }

  pub fn stop(&mut self) {
    if let Some(task) = self.task.take() {
      task.stop();
    }
  }

  pub fn is_running(&self) -> bool {
    self.task.is_some()
  }
}
