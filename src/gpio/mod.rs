//! GPIO port abstraction.
//!
//! The daemon talks to the pin controller only through the narrow
//! [`GpioPort`] capability set: open a pin with a mode, write a level,
//! (un)register an edge callback, close the pin.
//!
//! Implementations:
//! - [`RppalGpioPort`]: real hardware through `rppal` (Linux only)
//! - [`MockGpioPort`]: in-memory port with failure injection for tests
//!
//! [`GpioLifecycle`] owns a port and performs the startup and teardown
//! sequences for the button and LED pins.

pub mod error;
pub mod lifecycle;
#[cfg(target_os = "linux")]
pub mod rppal_port;

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

pub use error::GpioError;
pub use lifecycle::GpioLifecycle;
#[cfg(target_os = "linux")]
pub use rppal_port::RppalGpioPort;

use crate::types::{Edge, PinId, PinLevel, PinMode};

/// Callback invoked from the port's notification thread on an edge.
pub type EdgeCallback = Arc<dyn Fn() + Send + Sync + 'static>;

/// Capability set the daemon needs from a GPIO controller.
///
/// All methods take `&self`; implementations synchronize internally because
/// edge callbacks are delivered on threads owned by the implementation.
pub trait GpioPort: Send + Sync {
    /// Opens `pin` in `mode`.
    fn open_pin(&self, pin: PinId, mode: PinMode) -> Result<(), GpioError>;

    /// Drives an output pin to `level`.
    fn write(&self, pin: PinId, level: PinLevel) -> Result<(), GpioError>;

    /// Registers the callback for `edge` on an input pin, replacing any
    /// callback previously registered for the same edge.
    fn register_callback(
        &self,
        pin: PinId,
        edge: Edge,
        callback: EdgeCallback,
    ) -> Result<(), GpioError>;

    /// Removes the callback for `edge`.
    fn unregister_callback(&self, pin: PinId, edge: Edge) -> Result<(), GpioError>;

    /// Closes the pin and drops any callbacks attached to it.
    fn close_pin(&self, pin: PinId) -> Result<(), GpioError>;

    /// Returns true if the pin is currently open.
    fn is_open(&self, pin: PinId) -> bool;
}

impl<T: GpioPort + ?Sized> GpioPort for Arc<T> {
    fn open_pin(&self, pin: PinId, mode: PinMode) -> Result<(), GpioError> {
        (**self).open_pin(pin, mode)
    }

    fn write(&self, pin: PinId, level: PinLevel) -> Result<(), GpioError> {
        (**self).write(pin, level)
    }

    fn register_callback(
        &self,
        pin: PinId,
        edge: Edge,
        callback: EdgeCallback,
    ) -> Result<(), GpioError> {
        (**self).register_callback(pin, edge, callback)
    }

    fn unregister_callback(&self, pin: PinId, edge: Edge) -> Result<(), GpioError> {
        (**self).unregister_callback(pin, edge)
    }

    fn close_pin(&self, pin: PinId) -> Result<(), GpioError> {
        (**self).close_pin(pin)
    }

    fn is_open(&self, pin: PinId) -> bool {
        (**self).is_open(pin)
    }
}

/// Locks a mutex, recovering the data if a callback thread panicked.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ============================================================================
// MockGpioPort
// ============================================================================

#[derive(Default)]
struct MockState {
    open: HashMap<PinId, PinMode>,
    levels: HashMap<PinId, PinLevel>,
    callbacks: HashMap<(PinId, Edge), EdgeCallback>,
    fail_open: HashSet<PinId>,
    fail_register: HashSet<Edge>,
    fail_write: bool,
    fail_close: bool,
    close_calls: usize,
}

/// In-memory GPIO port.
///
/// Tracks open pins, driven levels and registered callbacks, lets tests
/// inject failures, and simulates edges with [`MockGpioPort::trigger`].
#[derive(Default)]
pub struct MockGpioPort {
    state: Mutex<MockState>,
}

impl MockGpioPort {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every later `open_pin` on `pin` fail.
    pub fn set_fail_open(&self, pin: PinId, should_fail: bool) {
        let mut state = lock(&self.state);
        if should_fail {
            state.fail_open.insert(pin);
        } else {
            state.fail_open.remove(&pin);
        }
    }

    /// Makes every later `register_callback` for `edge` fail.
    pub fn set_fail_register(&self, edge: Edge, should_fail: bool) {
        let mut state = lock(&self.state);
        if should_fail {
            state.fail_register.insert(edge);
        } else {
            state.fail_register.remove(&edge);
        }
    }

    pub fn set_fail_write(&self, should_fail: bool) {
        lock(&self.state).fail_write = should_fail;
    }

    pub fn set_fail_close(&self, should_fail: bool) {
        lock(&self.state).fail_close = should_fail;
    }

    /// Returns the mode `pin` is open with, if any.
    #[must_use]
    pub fn mode(&self, pin: PinId) -> Option<PinMode> {
        lock(&self.state).open.get(&pin).copied()
    }

    /// Returns the last level written to `pin` while it was open.
    #[must_use]
    pub fn level(&self, pin: PinId) -> Option<PinLevel> {
        lock(&self.state).levels.get(&pin).copied()
    }

    #[must_use]
    pub fn has_callback(&self, pin: PinId, edge: Edge) -> bool {
        lock(&self.state).callbacks.contains_key(&(pin, edge))
    }

    #[must_use]
    pub fn callback_count(&self) -> usize {
        lock(&self.state).callbacks.len()
    }

    #[must_use]
    pub fn close_call_count(&self) -> usize {
        lock(&self.state).close_calls
    }

    /// Simulates an edge on `pin`.
    ///
    /// Returns false if no callback is registered for it, which is what
    /// hardware does after teardown: the edge is simply not reported.
    pub fn trigger(&self, pin: PinId, edge: Edge) -> bool {
        let callback = lock(&self.state).callbacks.get(&(pin, edge)).cloned();
        match callback {
            Some(callback) => {
                callback();
                true
            }
            None => false,
        }
    }
}

impl GpioPort for MockGpioPort {
    fn open_pin(&self, pin: PinId, mode: PinMode) -> Result<(), GpioError> {
        let mut state = lock(&self.state);
        if state.fail_open.contains(&pin) {
            return Err(GpioError::OpenFailed(pin, "simulated failure".to_string()));
        }
        if pin.bcm().is_none() {
            return Err(GpioError::InvalidPin(pin));
        }
        state.open.insert(pin, mode);
        state.levels.insert(pin, PinLevel::Low);
        Ok(())
    }

    fn write(&self, pin: PinId, level: PinLevel) -> Result<(), GpioError> {
        let mut state = lock(&self.state);
        match state.open.get(&pin) {
            None => return Err(GpioError::PinNotOpen(pin)),
            Some(PinMode::InputPullDown) => return Err(GpioError::WrongMode(pin)),
            Some(PinMode::Output) => {}
        }
        if state.fail_write {
            return Err(GpioError::WriteFailed(pin, "simulated failure".to_string()));
        }
        state.levels.insert(pin, level);
        Ok(())
    }

    fn register_callback(
        &self,
        pin: PinId,
        edge: Edge,
        callback: EdgeCallback,
    ) -> Result<(), GpioError> {
        let mut state = lock(&self.state);
        match state.open.get(&pin) {
            None => return Err(GpioError::PinNotOpen(pin)),
            Some(PinMode::Output) => return Err(GpioError::WrongMode(pin)),
            Some(PinMode::InputPullDown) => {}
        }
        if state.fail_register.contains(&edge) {
            return Err(GpioError::CallbackFailed(
                pin,
                edge,
                "simulated failure".to_string(),
            ));
        }
        state.callbacks.insert((pin, edge), callback);
        Ok(())
    }

    fn unregister_callback(&self, pin: PinId, edge: Edge) -> Result<(), GpioError> {
        let mut state = lock(&self.state);
        if !state.open.contains_key(&pin) {
            return Err(GpioError::PinNotOpen(pin));
        }
        state.callbacks.remove(&(pin, edge));
        Ok(())
    }

    fn close_pin(&self, pin: PinId) -> Result<(), GpioError> {
        let mut state = lock(&self.state);
        state.close_calls += 1;
        if !state.open.contains_key(&pin) {
            return Err(GpioError::PinNotOpen(pin));
        }
        if state.fail_close {
            return Err(GpioError::CloseFailed(pin, "simulated failure".to_string()));
        }
        state.open.remove(&pin);
        state.levels.remove(&pin);
        state.callbacks.retain(|(owner, _), _| *owner != pin);
        Ok(())
    }

    fn is_open(&self, pin: PinId) -> bool {
        lock(&self.state).open.contains_key(&pin)
    }
}

// ============================================================================
// Tests
// ============================================================================
