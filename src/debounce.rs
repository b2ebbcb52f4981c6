//! Trailing-edge debouncer for rapid repeated triggers (scroll, momentum).

use std::future::Future;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::debug;

/// Coalesces calls arriving within `delay` of each other into one run of
/// the last action, fired `delay` after the last call.
///
/// Cancelling (or dropping) the debouncer discards a pending run. An action
/// that already started is detached and not interrupted.
pub struct Debouncer {
  delay: Duration,
  pending: Mutex<Option<JoinHandle<()>>>,
}

impl Debouncer {
  pub fn new(delay: Duration) -> Self {
    Self {
      delay,
      pending: Mutex::new(None),
    }
  }

  pub fn delay(&self) -> Duration {
    self.delay
  }

  /// Schedule `action`, replacing any run not yet fired.
  pub fn call<F, Fut>(&self, action: F)
  where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
  {
    let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
    if let Some(previous) = pending.take() {
      previous.abort();
    }

    let delay = self.delay;
    *pending = Some(tokio::spawn(async move {
      tokio::time::sleep(delay).await;
      debug!(?delay, "Debounced action fired");
      // Detach so a later call or cancel cannot abort the action midway
      tokio::spawn(action());
    }));
  }

  /// Discard the pending run, if any.
  pub fn cancel(&self) {
    let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
    if let Some(handle) = pending.take() {
      handle.abort();
    }
  }

  /// Whether a run is scheduled but has not fired yet.
  pub fn is_pending(&self) -> bool {
    let pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
    pending.as_ref().is_some_and(|h| !h.is_finished())
  }
}

impl Drop for Debouncer {
  fn drop(&mut self) {
    self.cancel();
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::atomic::{AtomicUsize, Ordering};
  use std::sync::Arc;

  fn counting(counter: &Arc<AtomicUsize>) -> impl FnOnce() -> std::future::Ready<()> {
    let counter = counter.clone();
    move || {
      counter.fetch_add(1, Ordering::SeqCst);
      std::future::ready(())
    }
  }

  #[tokio::test]
  async fn test_burst_runs_once() {
    let counter = Arc::new(AtomicUsize::new(0));
    let debouncer = Debouncer::new(Duration::from_millis(50));

    for _ in 0..5 {
      debouncer.call(counting(&counter));
      tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert_eq!(counter.load(Ordering::SeqCst), 0);
    assert!(debouncer.is_pending());

    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(counter.load(Ordering::SeqCst), 1);
    assert!(!debouncer.is_pending());
  }

  #[tokio::test]
  async fn test_spaced_calls_each_run() {
    let counter = Arc::new(AtomicUsize::new(0));
    let debouncer = Debouncer::new(Duration::from_millis(20));

    debouncer.call(counting(&counter));
    tokio::time::sleep(Duration::from_millis(100)).await;
    debouncer.call(counting(&counter));
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert_eq!(counter.load(Ordering::SeqCst), 2);
  }

  #[tokio::test]
  async fn test_cancel_discards_pending() {
    let counter = Arc::new(AtomicUsize::new(0));
    let debouncer = Debouncer::new(Duration::from_millis(30));

    debouncer.call(counting(&counter));
    debouncer.cancel();
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert_eq!(counter.load(Ordering::SeqCst), 0);
  }

  #[tokio::test]
  async fn test_drop_discards_pending() {
    let counter = Arc::new(AtomicUsize::new(0));
    {
      let debouncer = Debouncer::new(Duration::from_millis(30));
      debouncer.call(counting(&counter));
    }
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert_eq!(counter.load(Ordering::SeqCst), 0);
  }
}
