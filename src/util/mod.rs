//! Shared utility helpers.

pub mod clock;
pub mod error;

pub use clock::{Sleeper, ThreadSleeper};
pub use error::{AutoSceneError, AutoSceneResult, ConfigIssue, ControlError, ControlResult};
