//! AutoScene watches the screen for reference images and drives OBS.
//!
//! Frames are normalized to stretched luma and scored against every template
//! with exact-statistics ZNCC over a small scale band. Per-template verdicts
//! are combined on a bounded worker pool, debounced into an application state
//! and applied over obs-websocket, either by toggling one overlay source or by
//! switching between two scenes.

pub mod candidate;
pub mod capture;
pub mod config;
pub mod control;
pub mod decision;
pub mod engine;
pub mod image;
pub mod kernel;
pub mod schedule;
pub mod search;
pub mod template;
pub mod util;

pub use capture::FrameSource;
#[cfg(feature = "screen-capture")]
pub use capture::ScreenCapture;
pub use config::{ControlMode, EngineConfig, Settings};
pub use control::obs::{ObsDialer, ObsSession};
pub use control::{
    ConnectionState, ControlConnector, ControlSurface, ControlTarget, ReconnectPolicy,
    SurfaceDialer,
};
pub use decision::{ApplicationState, DecisionPolicy, Transition};
pub use engine::{ControlLoop, Engine, EngineHandle, Status};
pub use image::preprocess::{normalize, Frame};
pub use image::pyramid::ScaleBand;
pub use image::{ImageView, OwnedImage};
pub use kernel::{zncc_score_map, ScoreMap};
pub use schedule::{Cadence, PollScheduler};
pub use search::{
    Aggregation, CancelToken, GlobalVerdict, MatchConfig, Matcher, TemplateOutcome,
    TemplateVerdict, VerdictPolicy,
};
pub use template::{Template, TemplatePlan, TemplateSet};
pub use util::{
    AutoSceneError, AutoSceneResult, ConfigIssue, ControlError, ControlResult, Sleeper,
    ThreadSleeper,
};
