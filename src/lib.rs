//! Raspberry Pi Shutdown Button Library
//!
//! This library provides the core functionality for the shutdown button
//! daemon. It includes:
//! - Press classifier distinguishing short from long presses
//! - Restartable long-press countdown
//! - Event loop serializing GPIO edges and countdown expiries
//! - GPIO port abstraction with an `rppal` backend (Linux only)
//! - Fire-and-forget operating-system shutdown
//! - CLI command parsing

pub mod cli;
pub mod daemon;
pub mod gpio;
pub mod shutdown;
pub mod types;

// Re-export commonly used types for convenience
pub use types::{
    Edge, PinId, PinLevel, PinMode, PressEvent, PressOutcome, PressState, BUTTON_PIN, LED_PIN,
    LONG_PRESS_THRESHOLD,
};

pub use daemon::{CountdownTimer, PressAction, PressClassifier, PressDaemon};

pub use gpio::{GpioError, GpioLifecycle, GpioPort, MockGpioPort};

#[cfg(target_os = "linux")]
pub use gpio::RppalGpioPort;

pub use shutdown::{DryRunShutdown, MockShutdown, ShutdownError, ShutdownInvoker, SystemShutdown};
