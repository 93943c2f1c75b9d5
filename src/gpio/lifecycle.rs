//! Startup and teardown of the button and LED pins.
//!
//! The lifecycle manager is the only code that opens or closes pins. Both
//! sequences log every step and never return an error: a failed step is
//! logged and the rest of that pin's sequence is abandoned. A button that
//! fails partway is released again so no half-registered edge stays live.

use std::sync::Arc;

use tracing::{error, info, warn};

use super::{EdgeCallback, GpioError, GpioPort};
use crate::types::{Edge, PinLevel, PinMode, BUTTON_PIN, LED_PIN};

/// What came up during [`GpioLifecycle::startup`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StartupReport {
    /// LED opened and driven high
    pub led_active: bool,
    /// Button opened with both edge callbacks registered
    pub button_active: bool,
}

impl StartupReport {
    /// Returns true if the daemon cannot detect presses.
    pub fn is_degraded(&self) -> bool {
        !self.button_active
    }
}

/// Owns the GPIO port and the pin lifecycle.
pub struct GpioLifecycle<P: GpioPort> {
    port: P,
}

impl<P: GpioPort> GpioLifecycle<P> {
    pub fn new(port: P) -> Self {
        Self { port }
    }

    /// Returns the underlying port.
    pub fn port(&self) -> &P {
        &self.port
    }

    /// Opens the LED and the button and hooks `on_edge` to both button edges.
    ///
    /// The LED and the button come up independently, so a dead button line
    /// still leaves the status LED lit.
    pub fn startup<F>(&mut self, on_edge: F) -> StartupReport
    where
        F: Fn(Edge) + Send + Sync + 'static,
    {
        let on_edge = Arc::new(on_edge);

        let led_active = match self.start_led() {
            Ok(()) => true,
            Err(e) => {
                error!("LED startup failed: {} ({})", e, e.suggestion());
                false
            }
        };

        let button_active = match self.start_button(on_edge) {
            Ok(()) => true,
            Err(e) => {
                error!("button startup failed: {} ({})", e, e.suggestion());
                // A half-wired button could report presses but never releases.
                self.teardown_button();
                false
            }
        };

        let report = StartupReport {
            led_active,
            button_active,
        };
        if report.is_degraded() {
            warn!("button input unavailable; daemon running without press detection");
        }
        report
    }

    fn start_led(&self) -> Result<(), GpioError> {
        info!("Opening LED pin ({})", LED_PIN);
        self.port.open_pin(LED_PIN, PinMode::Output)?;

        info!("Writing LED pin {}", PinLevel::High);
        self.port.write(LED_PIN, PinLevel::High)
    }

    fn start_button<F>(&self, on_edge: Arc<F>) -> Result<(), GpioError>
    where
        F: Fn(Edge) + Send + Sync + 'static,
    {
        info!("Opening button pin ({})", BUTTON_PIN);
        self.port.open_pin(BUTTON_PIN, PinMode::InputPullDown)?;

        for edge in [Edge::Rising, Edge::Falling] {
            info!("Registering button {} callback", edge);
            let on_edge = on_edge.clone();
            let callback: EdgeCallback = Arc::new(move || on_edge(edge));
            self.port.register_callback(BUTTON_PIN, edge, callback)?;
        }
        Ok(())
    }

    /// Unregisters the button callbacks and closes both pins.
    ///
    /// Safe to call any number of times and after a partial startup: pins
    /// that are not open are skipped. Returns the failures that were logged.
    pub fn shutdown(&mut self) -> Vec<GpioError> {
        let mut failures = Vec::new();

        if self.port.is_open(LED_PIN) {
            info!("Closing LED pin");
            record(&mut failures, self.port.close_pin(LED_PIN));
        }

        failures.extend(self.teardown_button());
        failures
    }

    /// Unregisters both button callbacks and closes the button pin.
    ///
    /// The LED is left alone. Returns the failures that were logged.
    fn teardown_button(&self) -> Vec<GpioError> {
        let mut failures = Vec::new();
        if !self.port.is_open(BUTTON_PIN) {
            return failures;
        }

        for edge in [Edge::Rising, Edge::Falling] {
            info!("Unregistering button {} callback", edge);
            record(&mut failures, self.port.unregister_callback(BUTTON_PIN, edge));
        }

        info!("Closing button pin");
        record(&mut failures, self.port.close_pin(BUTTON_PIN));
        failures
    }

    /// Returns true if neither pin is open.
    pub fn is_closed(&self) -> bool {
        !self.port.is_open(LED_PIN) && !self.port.is_open(BUTTON_PIN)
    }
}

fn record(failures: &mut Vec<GpioError>, result: Result<(), GpioError>) {
    match result {
        Ok(()) => {}
        Err(e) if e.is_not_open() => {}
        Err(e) => {
            error!("GPIO teardown step failed: {}", e);
            failures.push(e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use crate::gpio::MockGpioPort;

    fn lifecycle() -> (GpioLifecycle<Arc<MockGpioPort>>, Arc<MockGpioPort>) {
        let port = Arc::new(MockGpioPort::new());
        (GpioLifecycle::new(port.clone()), port)
    }

    fn recorder() -> (impl Fn(Edge) + Send + Sync + 'static, Arc<Mutex<Vec<Edge>>>) {
        let edges = Arc::new(Mutex::new(Vec::new()));
        let sink = edges.clone();
        (move |edge| sink.lock().unwrap().push(edge), edges)
    }

    #[test]
    fn test_startup_opens_both_pins() {
        let (mut lifecycle, port) = lifecycle();
        let (on_edge, _edges) = recorder();

        let report = lifecycle.startup(on_edge);

        assert!(report.led_active);
        assert!(report.button_active);
        assert!(!report.is_degraded());
        assert_eq!(port.mode(LED_PIN), Some(PinMode::Output));
        assert_eq!(port.level(LED_PIN), Some(PinLevel::High));
        assert_eq!(port.mode(BUTTON_PIN), Some(PinMode::InputPullDown));
        assert!(port.has_callback(BUTTON_PIN, Edge::Rising));
        assert!(port.has_callback(BUTTON_PIN, Edge::Falling));
        assert_eq!(port.callback_count(), 2);
    }

    #[test]
    fn test_callbacks_forward_edges() {
        let (mut lifecycle, port) = lifecycle();
        let (on_edge, edges) = recorder();
        lifecycle.startup(on_edge);

        port.trigger(BUTTON_PIN, Edge::Rising);
        port.trigger(BUTTON_PIN, Edge::Falling);

        assert_eq!(*edges.lock().unwrap(), vec![Edge::Rising, Edge::Falling]);
    }

    #[test]
    fn test_button_failure_leaves_led_running() {
        let (mut lifecycle, port) = lifecycle();
        port.set_fail_open(BUTTON_PIN, true);
        let (on_edge, _edges) = recorder();

        let report = lifecycle.startup(on_edge);

        assert!(report.led_active);
        assert!(!report.button_active);
        assert!(report.is_degraded());
        assert_eq!(port.level(LED_PIN), Some(PinLevel::High));
        assert_eq!(port.callback_count(), 0);
    }

    #[test]
    fn test_callback_failure_releases_button_only() {
        let (mut lifecycle, port) = lifecycle();
        port.set_fail_register(Edge::Falling, true);
        let (on_edge, edges) = recorder();

        let report = lifecycle.startup(on_edge);

        assert!(report.led_active);
        assert!(report.is_degraded());
        assert!(!port.is_open(BUTTON_PIN));
        assert!(!port.has_callback(BUTTON_PIN, Edge::Rising));
        assert_eq!(port.callback_count(), 0);
        assert_eq!(port.level(LED_PIN), Some(PinLevel::High));

        assert!(!port.trigger(BUTTON_PIN, Edge::Rising));
        assert!(edges.lock().unwrap().is_empty());
    }

    #[test]
    fn test_rising_callback_failure_releases_button() {
        let (mut lifecycle, port) = lifecycle();
        port.set_fail_register(Edge::Rising, true);
        let (on_edge, _edges) = recorder();

        let report = lifecycle.startup(on_edge);

        assert!(report.is_degraded());
        assert!(!port.is_open(BUTTON_PIN));
        assert!(port.is_open(LED_PIN));
        assert_eq!(port.callback_count(), 0);
    }

    #[test]
    fn test_led_failure_leaves_button_running() {
        let (mut lifecycle, port) = lifecycle();
        port.set_fail_write(true);
        let (on_edge, _edges) = recorder();

        let report = lifecycle.startup(on_edge);

        assert!(!report.led_active);
        assert!(report.button_active);
        assert!(port.is_open(LED_PIN));
    }

    #[test]
    fn test_shutdown_closes_everything() {
        let (mut lifecycle, port) = lifecycle();
        let (on_edge, _edges) = recorder();
        lifecycle.startup(on_edge);

        let failures = lifecycle.shutdown();

        assert!(failures.is_empty());
        assert!(lifecycle.is_closed());
        assert_eq!(port.callback_count(), 0);
    }

    #[test]
    fn test_shutdown_is_idempotent() {
        let (mut lifecycle, _port) = lifecycle();
        let (on_edge, _edges) = recorder();
        lifecycle.startup(on_edge);

        assert!(lifecycle.shutdown().is_empty());
        assert!(lifecycle.shutdown().is_empty());
        assert!(lifecycle.is_closed());
    }

    #[test]
    fn test_shutdown_without_startup() {
        let (mut lifecycle, port) = lifecycle();

        assert!(lifecycle.shutdown().is_empty());
        assert_eq!(port.close_call_count(), 0);
    }

    #[test]
    fn test_shutdown_after_partial_startup() {
        let (mut lifecycle, port) = lifecycle();
        port.set_fail_open(BUTTON_PIN, true);
        let (on_edge, _edges) = recorder();
        lifecycle.startup(on_edge);

        assert!(lifecycle.shutdown().is_empty());
        assert!(lifecycle.is_closed());
    }

    #[test]
    fn test_shutdown_reports_close_failures() {
        let (mut lifecycle, port) = lifecycle();
        let (on_edge, _edges) = recorder();
        lifecycle.startup(on_edge);
        port.set_fail_close(true);

        let failures = lifecycle.shutdown();

        assert_eq!(failures.len(), 2);
        assert!(matches!(failures[0], GpioError::CloseFailed(pin, _) if pin == LED_PIN));
        assert!(matches!(failures[1], GpioError::CloseFailed(pin, _) if pin == BUTTON_PIN));
    }
}
