//! Daemon module for the shutdown button.
//!
//! This module contains the core daemon functionality:
//! - `classifier`: short/long press state machine
//! - `countdown`: restartable one-shot long-press countdown
//! - `service`: the event loop serializing edges and expiries

pub mod classifier;
pub mod countdown;
pub mod service;

pub use classifier::{PressAction, PressClassifier};
pub use countdown::CountdownTimer;
pub use service::PressDaemon;
