//! GPIO error types.
//!
//! Every failure here is a resource error: it is logged at the boundary and
//! the daemon keeps running in whatever state the failure left it in.

use thiserror::Error;

use crate::types::{Edge, PinId};

/// Errors that can occur while talking to the GPIO controller.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GpioError {
    /// The GPIO controller itself could not be opened.
    #[error("GPIO controller unavailable: {0}")]
    ControllerUnavailable(String),

    /// The pin has no GPIO line behind it (power, ground, out of range).
    #[error("{0} is not a GPIO line")]
    InvalidPin(PinId),

    /// Opening the pin failed.
    #[error("failed to open {0}: {1}")]
    OpenFailed(PinId, String),

    /// The pin was used before being opened.
    #[error("{0} is not open")]
    PinNotOpen(PinId),

    /// The operation does not match the mode the pin was opened with.
    #[error("{0} was opened with the wrong mode for this operation")]
    WrongMode(PinId),

    /// Writing a level to the pin failed.
    #[error("failed to write {0}: {1}")]
    WriteFailed(PinId, String),

    /// Registering or unregistering an edge callback failed.
    #[error("failed to update {1} edge callback on {0}: {2}")]
    CallbackFailed(PinId, Edge, String),

    /// Closing the pin failed.
    #[error("failed to close {0}: {1}")]
    CloseFailed(PinId, String),
}

impl GpioError {
    /// Returns true if the pin was simply never opened.
    ///
    /// Teardown treats this as success so it can run after a partial startup.
    #[must_use]
    pub fn is_not_open(&self) -> bool {
        matches!(self, Self::PinNotOpen(_))
    }

    /// Returns true if the whole controller is missing rather than one pin.
    #[must_use]
    pub fn is_controller_error(&self) -> bool {
        matches!(self, Self::ControllerUnavailable(_))
    }

    /// Returns a short hint for the operator.
    #[must_use]
    pub fn suggestion(&self) -> &'static str {
        match self {
            Self::ControllerUnavailable(_) => {
                "check that /dev/gpiomem exists and the daemon may access it"
            }
            Self::InvalidPin(_) => "use a header position wired to a GPIO line",
            Self::OpenFailed(_, _) => "check that no other process holds the pin",
            Self::PinNotOpen(_) | Self::WrongMode(_) => "restart the daemon",
            Self::WriteFailed(_, _) | Self::CallbackFailed(_, _, _) | Self::CloseFailed(_, _) => {
                "check the kernel log for GPIO driver errors"
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BUTTON_PIN, LED_PIN};

    #[test]
    fn test_error_display_open_failed() {
        let err = GpioError::OpenFailed(BUTTON_PIN, "busy".to_string());
        assert_eq!(err.to_string(), "failed to open board pin 12: busy");
    }

    #[test]
    fn test_error_display_callback_failed() {
        let err = GpioError::CallbackFailed(BUTTON_PIN, Edge::Falling, "denied".to_string());
        assert!(err.to_string().contains("falling"));
        assert!(err.to_string().contains("board pin 12"));
        assert!(err.to_string().contains("denied"));
    }

    #[test]
    fn test_is_not_open() {
        assert!(GpioError::PinNotOpen(LED_PIN).is_not_open());
        assert!(!GpioError::WrongMode(LED_PIN).is_not_open());
        assert!(!GpioError::CloseFailed(LED_PIN, "x".into()).is_not_open());
    }

    #[test]
    fn test_is_controller_error() {
        assert!(GpioError::ControllerUnavailable("x".into()).is_controller_error());
        assert!(!GpioError::InvalidPin(LED_PIN).is_controller_error());
    }

    #[test]
    fn test_suggestion_not_empty() {
        let errors = vec![
            GpioError::ControllerUnavailable("x".into()),
            GpioError::InvalidPin(LED_PIN),
            GpioError::OpenFailed(LED_PIN, "x".into()),
            GpioError::PinNotOpen(LED_PIN),
            GpioError::WrongMode(LED_PIN),
            GpioError::WriteFailed(LED_PIN, "x".into()),
            GpioError::CallbackFailed(BUTTON_PIN, Edge::Rising, "x".into()),
            GpioError::CloseFailed(LED_PIN, "x".into()),
        ];

        for error in errors {
            assert!(!error.suggestion().is_empty());
        }
    }
}
