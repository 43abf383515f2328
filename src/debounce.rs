use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Coalescing single-slot delayed task. Arming the debouncer replaces any
/// pending callback and restarts the timer, so a burst of calls results in
/// exactly one execution after the quiet interval.
pub struct Debouncer {
    timeout: Duration,
    slot: Mutex<Option<JoinHandle<()>>>,
}

impl Debouncer {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            slot: Mutex::new(None),
        }
    }

    pub fn debounce<F>(&self, callback: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let timeout = self.timeout;
        let handle = tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            callback.await;
        });

        let mut slot = self.slot.lock().expect("debounce slot poisoned");
        if let Some(previous) = slot.replace(handle) {
            previous.abort();
        }
    }

    /// Drops the pending callback without running it.
    pub fn cancel(&self) {
        let mut slot = self.slot.lock().expect("debounce slot poisoned");
        if let Some(previous) = slot.take() {
            previous.abort();
        }
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        self.cancel();
    }
}
