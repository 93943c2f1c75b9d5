//! Press classification state machine.
//!
//! The classifier is pure: it consumes one [`PressEvent`] at a time and
//! answers with the [`PressAction`] the daemon must carry out. It never
//! touches the timer, the pins, or the shutdown command itself.
//!
//! ```text
//!            rising                      expiry
//!   Idle ───────────────▶ Pressed ───────────────▶ PressedLong
//!    ▲                      │                          │
//!    │   falling (short)    │                          │
//!    ├──────────────────────┘                          │
//!    │                 falling (release)               │
//!    └─────────────────────────────────────────────────┘
//! ```
//!
//! Expiry events handed to the classifier must already be checked against
//! the countdown's current generation.

use tracing::{debug, info};

use crate::types::{PressEvent, PressOutcome, PressState};

/// What the daemon must do in response to an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PressAction {
    /// Nothing to do (duplicate or out-of-order event)
    None,
    /// Button went down: start the countdown
    ArmCountdown,
    /// Released before the threshold: cancel the countdown
    ShortPress,
    /// Held past the threshold: tear down GPIO and shut down
    LongPress,
    /// Released after a long press: back to rest, nothing else
    Release,
}

impl PressAction {
    /// Returns the classified outcome carried by this action, if any.
    pub fn outcome(&self) -> Option<PressOutcome> {
        match self {
            PressAction::ShortPress => Some(PressOutcome::ShortPress),
            PressAction::LongPress => Some(PressOutcome::LongPress),
            _ => None,
        }
    }
}

/// Single-owner press state machine.
#[derive(Debug, Default)]
pub struct PressClassifier {
    state: PressState,
    /// Whether the press in progress was already classified long
    long_press: bool,
    /// Completed short presses since start
    short_presses: u64,
    /// Long presses since start
    long_presses: u64,
}

impl PressClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies one event and returns the resulting action.
    pub fn handle(&mut self, event: PressEvent) -> PressAction {
        match (self.state, event) {
            (PressState::Idle, PressEvent::RisingEdge) => {
                self.long_press = false;
                self.state = PressState::PressedUnclassified;
                PressAction::ArmCountdown
            }
            (PressState::PressedUnclassified, PressEvent::TimerExpiry { .. }) => {
                self.long_press = true;
                self.long_presses += 1;
                self.state = PressState::PressedClassifiedLong;
                info!("Long press detected, shutting down");
                PressAction::LongPress
            }
            (PressState::PressedUnclassified, PressEvent::FallingEdge) => {
                self.short_presses += 1;
                self.state = PressState::Idle;
                info!("Short press detected; no action bound");
                PressAction::ShortPress
            }
            (PressState::PressedClassifiedLong, PressEvent::FallingEdge) => {
                self.state = PressState::Idle;
                debug!("Button released after long press");
                PressAction::Release
            }
            (state, event) => {
                debug!("Ignoring {:?} in state {}", event, state.as_str());
                PressAction::None
            }
        }
    }

    /// Returns the current state.
    pub fn state(&self) -> PressState {
        self.state
    }

    /// Returns true if the press in progress (or the last press) was long.
    pub fn is_long_press(&self) -> bool {
        self.long_press
    }

    pub fn short_presses(&self) -> u64 {
        self.short_presses
    }

    pub fn long_presses(&self) -> u64 {
        self.long_presses
    }
}

// ============================================================================
// Tests
// ============================================================================
