//! Bounded polling.
//!
//! Both long-running waits in this crate (file ingestion, analysis jobs)
//! are instances of the same loop: check, and if not settled, sleep for
//! the interval and check again until the budget is spent. They stay two
//! separate call sites because the endpoints have different terminal-state
//! vocabularies and different default schedules.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::ClientError;

/// How long to keep polling, and how long to sleep between polls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSchedule {
  pub max_wait: Duration,
  pub interval: Duration,
}

impl PollSchedule {
  pub const fn new(max_wait: Duration, interval: Duration) -> Self {
    Self { max_wait, interval }
  }

  /// Default schedule for file ingestion waits.
  pub const INGEST: Self = Self::new(Duration::from_secs(300), Duration::from_secs(2));

  /// Default schedule for analysis job waits.
  pub const ANALYSIS: Self = Self::new(Duration::from_secs(300), Duration::from_secs(5));
}

/// Sleep dependency for polling loops. Injected so tests can observe and
/// skip the waits.
#[async_trait]
pub trait Sleeper: Send + Sync {
  async fn sleep(&self, duration: Duration);
}

/// Production sleeper backed by the tokio timer.
#[derive(Debug, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
  async fn sleep(&self, duration: Duration) {
    tokio::time::sleep(duration).await;
  }
}

/// Outcome of a single poll check.
pub enum PollState<T> {
  /// The operation reached a terminal state with this value.
  Settled(T),
  /// Still in flight; poll again after the interval.
  Pending,
}

/// Poll `check` until it settles or the schedule's budget is spent.
///
/// The check runs first, so a zero budget still performs exactly one
/// check before reporting a timeout. Elapsed time is accounted in whole
/// intervals; the loop never busy-spins.
pub async fn poll_until<T, F, Fut>(
  what: &str,
  schedule: PollSchedule,
  sleeper: &dyn Sleeper,
  mut check: F,
) -> Result<T, ClientError>
where
  F: FnMut() -> Fut,
  Fut: Future<Output = Result<PollState<T>, ClientError>>,
{
  let mut elapsed = Duration::ZERO;
  loop {
    if let PollState::Settled(value) = check().await? {
      return Ok(value);
    }
    if elapsed >= schedule.max_wait {
      return Err(ClientError::Timeout {
        what: what.to_string(),
        waited_secs: schedule.max_wait.as_secs(),
      });
    }
    sleeper.sleep(schedule.interval).await;
    elapsed += schedule.interval;
  }
}

#[cfg(test)]
mod tests {
  use std::sync::Mutex;

  use super::*;

  /// Records requested sleeps and returns immediately.
  struct RecordingSleeper {
    slept: Mutex<Vec<Duration>>,
  }

  impl RecordingSleeper {
    fn new() -> Self {
      Self {
        slept: Mutex::new(Vec::new()),
      }
    }

    fn sleeps(&self) -> Vec<Duration> {
      self.slept.lock().unwrap().clone()
    }
  }

  #[async_trait]
  impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
      self.slept.lock().unwrap().push(duration);
    }
  }

  #[tokio::test]
  async fn settles_after_pending_checks() {
    let sleeper = RecordingSleeper::new();
    let schedule = PollSchedule::new(Duration::from_secs(300), Duration::from_secs(5));
    let checks = Mutex::new(0u32);
    let checks_ref = &checks;

    let result: Result<&str, _> = poll_until("analysis", schedule, &sleeper, move || async move {
      let mut checks = checks_ref.lock().unwrap();
      *checks += 1;
      if *checks < 3 {
        Ok(PollState::Pending)
      } else {
        Ok(PollState::Settled("X"))
      }
    })
    .await;

    assert_eq!(result.unwrap(), "X");
    assert_eq!(*checks.lock().unwrap(), 3);
    assert_eq!(
      sleeper.sleeps(),
      vec![Duration::from_secs(5), Duration::from_secs(5)]
    );
  }

  #[tokio::test]
  async fn zero_budget_times_out_after_one_check() {
    let sleeper = RecordingSleeper::new();
    let schedule = PollSchedule::new(Duration::ZERO, Duration::from_secs(2));
    let checks = Mutex::new(0u32);
    let checks_ref = &checks;

    let result: Result<(), _> = poll_until("file ingestion", schedule, &sleeper, move || async move {
      *checks_ref.lock().unwrap() += 1;
      Ok(PollState::Pending)
    })
    .await;

    let err = result.unwrap_err();
    assert!(err.is_timeout());
    assert_eq!(*checks.lock().unwrap(), 1);
    assert!(sleeper.sleeps().is_empty());
  }

  #[tokio::test]
  async fn check_errors_abort_the_loop() {
    let sleeper = RecordingSleeper::new();
    let schedule = PollSchedule::INGEST;

    let result: Result<(), _> = poll_until("file ingestion", schedule, &sleeper, || async {
      Err(ClientError::Transport {
        status: 500,
        body: "boom".to_string(),
      })
    })
    .await;

    assert!(matches!(
      result.unwrap_err(),
      ClientError::Transport { status: 500, .. }
    ));
    assert!(sleeper.sleeps().is_empty());
  }
}
