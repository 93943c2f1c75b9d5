//! The shutdown button daemon.
//!
//! `PressDaemon` is the single serialization point for everything that can
//! change press state. Edge callbacks (on the GPIO driver's threads) and the
//! countdown (on a tokio task) only post [`PressEvent`]s into one unbounded
//! queue; the daemon drains that queue on one task and applies events one
//! at a time to the classifier, the countdown and the pins.
//!
//! Events already waiting in the queue are handled as a batch with timer
//! expiries first. A release that races the threshold therefore resolves as
//! a long press whenever both events are queued together.

use std::future::Future;

use tokio::sync::mpsc;
use tokio::time::Duration;
use tracing::{debug, error, info};

use super::classifier::{PressAction, PressClassifier};
use super::countdown::CountdownTimer;
use crate::gpio::lifecycle::StartupReport;
use crate::gpio::{GpioLifecycle, GpioPort};
use crate::shutdown::ShutdownInvoker;
use crate::types::{PressEvent, PressState, LONG_PRESS_THRESHOLD};

/// Long-press shutdown daemon over a GPIO port and a shutdown invoker.
pub struct PressDaemon<P: GpioPort, S: ShutdownInvoker> {
    lifecycle: GpioLifecycle<P>,
    classifier: PressClassifier,
    countdown: CountdownTimer,
    shutdown: S,
    /// Sender side of the event queue, cloned into callbacks
    event_tx: mpsc::UnboundedSender<PressEvent>,
    /// The event queue
    event_rx: mpsc::UnboundedReceiver<PressEvent>,
    /// Number of shutdown requests issued
    shutdown_requests: usize,
}

impl<P: GpioPort, S: ShutdownInvoker> PressDaemon<P, S> {
    /// Creates a daemon with the standard long-press threshold.
    pub fn new(port: P, shutdown: S) -> Self {
        Self::with_threshold(port, shutdown, LONG_PRESS_THRESHOLD)
    }

    /// Creates a daemon with a custom long-press threshold.
    pub fn with_threshold(port: P, shutdown: S, threshold: Duration) -> Self {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        Self {
            lifecycle: GpioLifecycle::new(port),
            classifier: PressClassifier::new(),
            countdown: CountdownTimer::new(threshold, event_tx.clone()),
            shutdown,
            event_tx,
            event_rx,
            shutdown_requests: 0,
        }
    }

    /// Brings up the pins and hooks the button edges to the event queue.
    pub fn start(&mut self) -> StartupReport {
        let event_tx = self.event_tx.clone();
        self.lifecycle.startup(move |edge| {
            info!("Pin {}", edge);
            if event_tx.send(PressEvent::from_edge(edge)).is_err() {
                debug!("Event queue closed; dropping {} edge", edge);
            }
        })
    }

    /// Returns a sender into the event queue.
    pub fn event_sender(&self) -> mpsc::UnboundedSender<PressEvent> {
        self.event_tx.clone()
    }

    /// Applies a single event.
    ///
    /// Must be called from within a tokio runtime.
    pub fn handle_event(&mut self, event: PressEvent) -> PressAction {
        if let PressEvent::TimerExpiry { generation } = event {
            if !self.countdown.accept_expiry(generation) {
                return PressAction::None;
            }
        }

        let action = self.classifier.handle(event);
        if let Some(outcome) = action.outcome() {
            debug!("Press classified as {}", outcome);
        }
        match action {
            PressAction::ArmCountdown => self.countdown.arm(),
            PressAction::ShortPress => {
                self.countdown.disarm();
            }
            PressAction::LongPress => self.power_off(),
            PressAction::Release | PressAction::None => {}
        }
        action
    }

    /// Drains every queued event and applies them as one batch.
    pub fn process_pending(&mut self) -> Vec<PressAction> {
        let mut batch = Vec::new();
        while let Ok(event) = self.event_rx.try_recv() {
            batch.push(event);
        }
        self.process_batch(batch)
    }

    fn process_batch(&mut self, mut batch: Vec<PressEvent>) -> Vec<PressAction> {
        // Stable: edges keep their arrival order.
        batch.sort_by_key(|event| !event.is_expiry());
        batch
            .into_iter()
            .map(|event| self.handle_event(event))
            .collect()
    }

    /// Runs the event loop until `signal` completes, then stops the daemon.
    pub async fn run<F>(&mut self, signal: F)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(signal);

        loop {
            let next = tokio::select! {
                biased;
                _ = &mut signal => None,
                event = self.event_rx.recv() => event,
            };
            let Some(first) = next else {
                break;
            };

            let mut batch = vec![first];
            while let Ok(event) = self.event_rx.try_recv() {
                batch.push(event);
            }
            self.process_batch(batch);
        }

        self.stop();
    }

    /// Cancels the countdown and releases the pins. Safe to call repeatedly.
    pub fn stop(&mut self) {
        info!("Stopping daemon");
        self.countdown.disarm();
        self.lifecycle.shutdown();
    }

    fn power_off(&mut self) {
        // Release the pins before the host starts going down.
        self.countdown.disarm();
        self.lifecycle.shutdown();

        self.shutdown_requests += 1;
        match self.shutdown.request_shutdown() {
            Ok(()) => info!("Shutdown requested"),
            Err(e) => error!("Shutdown request failed: {}", e),
        }
    }

    /// Returns the classifier state.
    pub fn state(&self) -> PressState {
        self.classifier.state()
    }

    pub fn classifier(&self) -> &PressClassifier {
        &self.classifier
    }

    /// Returns true while the long-press countdown is running.
    pub fn is_countdown_armed(&self) -> bool {
        self.countdown.is_armed()
    }

    pub fn lifecycle(&self) -> &GpioLifecycle<P> {
        &self.lifecycle
    }

    pub fn shutdown_requests(&self) -> usize {
        self.shutdown_requests
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tokio::time::advance;

    use crate::gpio::MockGpioPort;
    use crate::shutdown::MockShutdown;
    use crate::types::{Edge, BUTTON_PIN};

    type TestDaemon = PressDaemon<Arc<MockGpioPort>, Arc<MockShutdown>>;

    fn create_daemon() -> (TestDaemon, Arc<MockGpioPort>, Arc<MockShutdown>) {
        let port = Arc::new(MockGpioPort::new());
        let shutdown = Arc::new(MockShutdown::new());
        let daemon = PressDaemon::new(port.clone(), shutdown.clone());
        (daemon, port, shutdown)
    }

    async fn settle() {
        for _ in 0..4 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_edge_callbacks_feed_queue() {
        let (mut daemon, port, _shutdown) = create_daemon();
        daemon.start();

        port.trigger(BUTTON_PIN, Edge::Rising);
        let actions = daemon.process_pending();

        assert_eq!(actions, vec![PressAction::ArmCountdown]);
        assert_eq!(daemon.state(), PressState::PressedUnclassified);
        assert!(daemon.is_countdown_armed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_short_press_disarms() {
        let (mut daemon, port, shutdown) = create_daemon();
        daemon.start();

        port.trigger(BUTTON_PIN, Edge::Rising);
        daemon.process_pending();
        advance(Duration::from_millis(4999)).await;
        port.trigger(BUTTON_PIN, Edge::Falling);
        let actions = daemon.process_pending();

        assert_eq!(actions, vec![PressAction::ShortPress]);
        assert!(!daemon.is_countdown_armed());
        assert_eq!(shutdown.call_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expiry_wins_over_queued_release() {
        let (mut daemon, port, shutdown) = create_daemon();
        daemon.start();

        port.trigger(BUTTON_PIN, Edge::Rising);
        daemon.process_pending();

        // Release arrives first, but both are queued before processing.
        port.trigger(BUTTON_PIN, Edge::Falling);
        advance(Duration::from_millis(5000)).await;
        settle().await;
        let actions = daemon.process_pending();

        assert_eq!(actions, vec![PressAction::LongPress, PressAction::Release]);
        assert_eq!(shutdown.call_count(), 1);
        assert_eq!(daemon.state(), PressState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_processed_release_beats_later_expiry() {
        let (mut daemon, _port, shutdown) = create_daemon();
        let tx = daemon.event_sender();

        tx.send(PressEvent::RisingEdge).unwrap();
        daemon.process_pending();
        let generation = daemon.countdown.generation();

        tx.send(PressEvent::FallingEdge).unwrap();
        daemon.process_pending();
        tx.send(PressEvent::TimerExpiry { generation }).unwrap();
        let actions = daemon.process_pending();

        assert_eq!(actions, vec![PressAction::None]);
        assert_eq!(shutdown.call_count(), 0);
        assert_eq!(daemon.state(), PressState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_failure_is_logged_not_retried() {
        let (mut daemon, port, shutdown) = create_daemon();
        shutdown.set_should_fail(true);
        daemon.start();

        port.trigger(BUTTON_PIN, Edge::Rising);
        daemon.process_pending();
        advance(Duration::from_millis(5000)).await;
        settle().await;
        daemon.process_pending();

        assert_eq!(shutdown.call_count(), 1);
        assert_eq!(daemon.shutdown_requests(), 1);
        assert!(daemon.lifecycle().is_closed());
        assert_eq!(daemon.classifier().long_presses(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_stops_on_signal() {
        let (mut daemon, port, _shutdown) = create_daemon();
        daemon.start();
        assert!(!daemon.lifecycle().is_closed());

        daemon.run(async {}).await;

        assert!(daemon.lifecycle().is_closed());
        assert!(!port.trigger(BUTTON_PIN, Edge::Rising));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_is_idempotent() {
        let (mut daemon, _port, _shutdown) = create_daemon();
        daemon.start();

        daemon.stop();
        daemon.stop();

        assert!(daemon.lifecycle().is_closed());
        assert!(!daemon.is_countdown_armed());
    }
}
