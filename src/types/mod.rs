//! Core data types for the shutdown button daemon.
//!
//! This module defines the data structures used for:
//! - Pin identification (board numbering) and pin configuration
//! - Edge and timer events flowing through the daemon's event queue
//! - Press classification state and outcomes

use std::fmt;
use std::time::Duration;

// ============================================================================
// Constants
// ============================================================================

/// Time the button must be held before a press counts as long.
pub const LONG_PRESS_THRESHOLD: Duration = Duration::from_millis(5000);

/// Push-button input (physical header pin 12).
pub const BUTTON_PIN: PinId = PinId::board(12);

/// Status LED output (physical header pin 16).
pub const LED_PIN: PinId = PinId::board(16);

// ============================================================================
// PinId
// ============================================================================

/// A GPIO line identified by its physical position on the 40-pin header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PinId(u8);

impl PinId {
    /// Creates a pin identifier from a physical header position.
    pub const fn board(number: u8) -> Self {
        Self(number)
    }

    /// Returns the physical header position.
    pub fn number(&self) -> u8 {
        self.0
    }

    /// Translates the header position to the SoC (BCM) GPIO number.
    ///
    /// Returns `None` for power, ground and ID EEPROM positions.
    pub fn bcm(&self) -> Option<u8> {
        let bcm = match self.0 {
            3 => 2,
            5 => 3,
            7 => 4,
            8 => 14,
            10 => 15,
            11 => 17,
            12 => 18,
            13 => 27,
            15 => 22,
            16 => 23,
            18 => 24,
            19 => 10,
            21 => 9,
            22 => 25,
            23 => 11,
            24 => 8,
            26 => 7,
            29 => 5,
            31 => 6,
            32 => 12,
            33 => 13,
            35 => 19,
            36 => 16,
            37 => 26,
            38 => 20,
            40 => 21,
            _ => return None,
        };
        Some(bcm)
    }
}

impl fmt::Display for PinId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "board pin {}", self.0)
    }
}

// ============================================================================
// Pin configuration
// ============================================================================

/// Direction and bias a pin is opened with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PinMode {
    /// Driven output
    Output,
    /// Input with the internal pull-down resistor enabled
    InputPullDown,
}

/// Digital level of a pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PinLevel {
    #[default]
    Low,
    High,
}

impl fmt::Display for PinLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PinLevel::Low => write!(f, "low"),
            PinLevel::High => write!(f, "high"),
        }
    }
}

/// Direction of a level transition on an input pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Edge {
    /// Low to high (button pressed down)
    Rising,
    /// High to low (button released)
    Falling,
}

impl fmt::Display for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Edge::Rising => write!(f, "rising"),
            Edge::Falling => write!(f, "falling"),
        }
    }
}

// ============================================================================
// PressEvent
// ============================================================================

/// Events funneled through the daemon's single event queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PressEvent {
    /// Button went down
    RisingEdge,
    /// Button went up
    FallingEdge,
    /// Countdown elapsed
    TimerExpiry {
        /// Arm generation the expiry belongs to
        generation: u64,
    },
}

impl PressEvent {
    /// Maps a pin edge to the matching press event.
    pub fn from_edge(edge: Edge) -> Self {
        match edge {
            Edge::Rising => PressEvent::RisingEdge,
            Edge::Falling => PressEvent::FallingEdge,
        }
    }

    /// Returns true for countdown expiries.
    pub fn is_expiry(&self) -> bool {
        matches!(self, PressEvent::TimerExpiry { .. })
    }
}

// ============================================================================
// PressState / PressOutcome
// ============================================================================

/// State of the press classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PressState {
    /// Button is up
    #[default]
    Idle,
    /// Button is down, threshold not reached yet
    PressedUnclassified,
    /// Button is down and the press was classified as long
    PressedClassifiedLong,
}

impl PressState {
    /// Returns the string representation of the state.
    pub fn as_str(&self) -> &'static str {
        match self {
            PressState::Idle => "idle",
            PressState::PressedUnclassified => "pressed",
            PressState::PressedClassifiedLong => "pressed_long",
        }
    }

    /// Returns true while the button is held down.
    pub fn is_pressed(&self) -> bool {
        !matches!(self, PressState::Idle)
    }
}

/// Classified result of a completed or in-progress press.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PressOutcome {
    /// Released before the threshold elapsed
    ShortPress,
    /// Held for at least the threshold
    LongPress,
}

impl fmt::Display for PressOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PressOutcome::ShortPress => write!(f, "short press"),
            PressOutcome::LongPress => write!(f, "long press"),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
