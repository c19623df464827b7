//! Shared backoff state for all fetches of a crawl
//!
//! Every request goes to the same origin, so a transient rejection of one
//! request is taken as a sign that the server is struggling. The coordinator
//! then closes a pause gate for all callers, sleeps a cooldown, and reopens
//! it. It also owns the permit pool bounding the number of requests in flight.

use crate::HarvestError;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::{watch, Semaphore, SemaphorePermit};

/// Pause gate plus global concurrency limit
#[derive(Debug)]
pub struct BackoffCoordinator {
    /// `true` while requests may flow
    gate: watch::Sender<bool>,

    /// Permits for requests in flight
    permits: Semaphore,

    /// How long the gate stays closed after a failure
    cooldown: Duration,

    /// Number of cooldowns paid so far
    episodes: AtomicUsize,
}

impl BackoffCoordinator {
    /// Creates a coordinator with an open gate
    ///
    /// # Arguments
    ///
    /// * `max_in_flight` - Capacity of the permit pool
    /// * `cooldown` - Pause applied after a transient failure
    pub fn new(max_in_flight: usize, cooldown: Duration) -> Self {
        let (gate, _) = watch::channel(true);
        Self {
            gate,
            permits: Semaphore::new(max_in_flight),
            cooldown,
            episodes: AtomicUsize::new(0),
        }
    }

    /// Waits until the gate is open
    pub async fn wait_until_open(&self) {
        let mut rx = self.gate.subscribe();
        // The sender lives in `self`, so the channel cannot close here
        let _ = rx.wait_for(|open| *open).await;
    }

    /// Waits for an open gate and a free permit
    ///
    /// A permit obtained while a cooldown started is handed back and the
    /// wait starts over, so no request leaves during a closed window.
    pub async fn acquire(&self) -> Result<SemaphorePermit<'_>, HarvestError> {
        loop {
            self.wait_until_open().await;
            let permit = self
                .permits
                .acquire()
                .await
                .map_err(|e| HarvestError::Task(format!("permit pool closed: {}", e)))?;

            if self.is_open() {
                return Ok(permit);
            }
            tracing::trace!("Gate closed while waiting for a permit, waiting again");
        }
    }

    /// Reports a transient failure on `url`
    ///
    /// The first report while the gate is open closes it, sleeps the
    /// cooldown, and reopens it. Reports arriving while it is already closed
    /// return immediately. The gate also reopens if this future is dropped
    /// during the cooldown, e.g. when its task is aborted.
    ///
    /// # Returns
    ///
    /// `true` if this call paid the cooldown
    pub async fn report_failure(&self, url: &str, error: &HarvestError) -> bool {
        let closed_now = self.gate.send_if_modified(|open| {
            if *open {
                *open = false;
                true
            } else {
                false
            }
        });

        if !closed_now {
            tracing::trace!("Gate already closed, not pausing again for {}", url);
            return false;
        }

        self.episodes.fetch_add(1, Ordering::SeqCst);
        tracing::warn!(
            "Received {} on {}. Pausing all requests for {:?}",
            error,
            url,
            self.cooldown
        );

        let reopen = ReopenOnDrop { gate: &self.gate };
        tokio::time::sleep(self.cooldown).await;
        drop(reopen);
        tracing::debug!("Cooldown over, resuming requests");
        true
    }

    /// Whether requests may currently flow
    pub fn is_open(&self) -> bool {
        *self.gate.borrow()
    }

    /// Permits not currently held
    pub fn available_permits(&self) -> usize {
        self.permits.available_permits()
    }

    /// Number of cooldowns paid so far
    pub fn cooldown_episodes(&self) -> usize {
        self.episodes.load(Ordering::SeqCst)
    }
}

/// Opens the gate when dropped
struct ReopenOnDrop<'a> {
    gate: &'a watch::Sender<bool>,
}

impl Drop for ReopenOnDrop<'_> {
    fn drop(&mut self) {
        self.gate.send_replace(true);
    }
}
