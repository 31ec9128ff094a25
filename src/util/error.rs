//! Error types for autoscene.

use thiserror::Error;

/// Result alias for engine, image and configuration operations.
pub type AutoSceneResult<T> = std::result::Result<T, AutoSceneError>;

/// Result alias for control-surface operations.
pub type ControlResult<T> = std::result::Result<T, ControlError>;

/// What is wrong with a configuration field.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum ConfigIssue {
    /// The field is required and empty or absent.
    #[error("missing")]
    Missing,
    /// The field is present but its value is not accepted.
    #[error("out of range: {detail}")]
    OutOfRange { detail: String },
}

/// Errors raised while preparing or running the detection loop.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum AutoSceneError {
    /// A required configuration field is missing or out of range.
    #[error("invalid configuration field `{field}`: {issue}")]
    ConfigInvalid {
        field: &'static str,
        issue: ConfigIssue,
    },
    /// The template directory produced no usable template.
    #[error("no usable templates found in {dir}")]
    NoTemplatesAvailable { dir: String },
    /// One frame could not be captured.
    #[error("screen capture failed: {reason}")]
    CaptureFailed { reason: String },
    /// Image dimensions are zero or overflow.
    #[error("invalid dimensions {width}x{height}")]
    InvalidDimensions { width: usize, height: usize },
    /// Stride is smaller than the row width.
    #[error("invalid stride {stride} for width {width}")]
    InvalidStride { width: usize, stride: usize },
    /// The backing buffer is shorter than the described image.
    #[error("buffer too small: needed {needed}, got {got}")]
    BufferTooSmall { needed: usize, got: usize },
    /// A template has no usable pyramid level.
    #[error("degenerate template: {reason}")]
    DegenerateTemplate { reason: &'static str },
    /// An image file could not be read or decoded.
    #[error("image io error: {reason}")]
    ImageIo { reason: String },
    /// The matcher worker pool could not be created.
    #[error("worker pool error: {reason}")]
    WorkerPool { reason: String },
    /// The detection loop thread could not be spawned.
    #[error("cannot spawn detection loop: {reason}")]
    ThreadSpawn { reason: String },
}

/// Errors raised by the control-surface connector.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum ControlError {
    /// Opening or handshaking a session failed.
    #[error("failed to connect to control surface: {reason}")]
    ConnectFailed { reason: String },
    /// The reconnection budget was exhausted.
    #[error("failed to reconnect after {attempts} attempts")]
    ReconnectFailed { attempts: u32 },
    /// A single request on an open session failed.
    #[error("{request} failed: {reason}")]
    CallFailed {
        request: &'static str,
        reason: String,
    },
    /// A mutation was requested while no session is connected.
    #[error("control surface is not connected")]
    NotConnected,
}
