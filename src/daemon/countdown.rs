//! Restartable one-shot countdown for long-press detection.
//!
//! The countdown does not call back into the classifier directly. When it
//! elapses it posts a `PressEvent::TimerExpiry` into the daemon's event
//! queue, tagged with the generation it was armed under. Every `arm()` and
//! `disarm()` bumps the generation, so an expiry that was already queued
//! when the countdown was cancelled or restarted is recognised as stale by
//! [`CountdownTimer::accept_expiry`].

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Duration, Instant};
use tracing::debug;

use crate::types::PressEvent;

/// One-shot countdown posting its expiry into an event queue.
pub struct CountdownTimer {
    /// Time from `arm()` to expiry
    threshold: Duration,
    /// Event queue the expiry is posted to
    event_tx: mpsc::UnboundedSender<PressEvent>,
    /// Bumped on every arm/disarm
    generation: u64,
    /// Sleeping task for the current arm, if any
    pending: Option<JoinHandle<()>>,
    /// When the current arm elapses
    deadline: Option<Instant>,
}

impl CountdownTimer {
    /// Creates a disarmed countdown.
    pub fn new(threshold: Duration, event_tx: mpsc::UnboundedSender<PressEvent>) -> Self {
        Self {
            threshold,
            event_tx,
            generation: 0,
            pending: None,
            deadline: None,
        }
    }

    /// Starts the countdown, or restarts it from a full threshold if it is
    /// already running. Only the most recent arm can produce an accepted
    /// expiry.
    ///
    /// Must be called from within a tokio runtime.
    pub fn arm(&mut self) {
        self.cancel_pending();
        self.generation = self.generation.wrapping_add(1);

        let generation = self.generation;
        let deadline = Instant::now() + self.threshold;
        let event_tx = self.event_tx.clone();

        self.pending = Some(tokio::spawn(async move {
            sleep_until(deadline).await;
            if event_tx.send(PressEvent::TimerExpiry { generation }).is_err() {
                debug!("Event queue closed; dropping countdown expiry");
            }
        }));
        self.deadline = Some(deadline);

        debug!("Countdown armed (generation {})", generation);
    }

    /// Cancels a pending expiry. Returns false if nothing was armed.
    pub fn disarm(&mut self) -> bool {
        if !self.is_armed() {
            return false;
        }
        self.cancel_pending();
        self.generation = self.generation.wrapping_add(1);
        debug!("Countdown disarmed");
        true
    }

    /// Consumes an expiry event.
    ///
    /// Returns true only for the expiry of the current arm; the countdown is
    /// then disarmed. Expiries from earlier arms, or posted before a
    /// `disarm()` that has since been processed, return false.
    pub fn accept_expiry(&mut self, generation: u64) -> bool {
        if !self.is_armed() || generation != self.generation {
            debug!(
                "Ignoring stale countdown expiry (generation {}, current {})",
                generation, self.generation
            );
            return false;
        }
        self.pending = None;
        self.deadline = None;
        true
    }

    /// Returns true while an expiry is pending.
    pub fn is_armed(&self) -> bool {
        self.pending.is_some()
    }

    /// Returns when the current arm elapses.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Returns the configured threshold.
    pub fn threshold(&self) -> Duration {
        self.threshold
    }

    /// Returns the current arm generation.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    fn cancel_pending(&mut self) {
        if let Some(task) = self.pending.take() {
            task.abort();
        }
        self.deadline = None;
    }
}

impl Drop for CountdownTimer {
    fn drop(&mut self) {
        self.cancel_pending();
    }
}

// ============================================================================
// Tests
// ============================================================================
