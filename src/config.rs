//! Engine configuration.
//!
//! `EngineConfig` mirrors the on-disk `config.json`; every field has a default
//! so partial files parse. `validate` turns it into [`Settings`], reporting
//! the first missing or out-of-range field.

use crate::control::{ControlTarget, ReconnectPolicy};
use crate::image::pyramid::ScaleBand;
use crate::schedule::Cadence;
use crate::search::{Aggregation, MatchConfig, VerdictPolicy, MAX_WORKERS};
use crate::util::{AutoSceneError, AutoSceneResult, ConfigIssue};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Highest accepted fixed polling rate.
pub const MAX_TICKS_PER_SECOND: u32 = 20;

/// What the detection drives on the control surface.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ControlMode {
    /// Show/hide one source in one scene.
    #[default]
    Overlay,
    /// Switch between a base scene and an overlay scene.
    SceneSwitch,
}

/// Scale band as written in the configuration file.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct PyramidConfig {
    pub levels: usize,
    pub min_scale: f32,
    pub max_scale: f32,
}

impl Default for PyramidConfig {
    fn default() -> Self {
        let band = ScaleBand::default();
        Self {
            levels: band.levels,
            min_scale: band.min_scale,
            max_scale: band.max_scale,
        }
    }
}

/// Raw configuration.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    pub mode: ControlMode,
    pub obs_websocket_host: String,
    pub obs_websocket_port: u16,
    pub obs_websocket_password: String,
    /// Overlay mode: scene holding the overlay source.
    pub obs_scene_name: String,
    /// Overlay mode: source toggled on detection.
    pub obs_overlay_source_name: String,
    /// Scene-switch mode: scene shown while nothing is detected.
    pub obs_base_scene_name: String,
    /// Scene-switch mode: scene shown while a template is detected.
    pub obs_overlay_scene_name: String,
    /// Match threshold in `[0, 1]`.
    pub similarity_accuracy: f32,
    /// Fixed polling rate; absent means uncapped.
    pub ticks_per_second: Option<u32>,
    pub templates_path: PathBuf,
    /// 1-based monitor index.
    pub monitor_index: usize,
    pub aggregation: Aggregation,
    /// Defaults to any-match in overlay mode and first-decisive in
    /// scene-switch mode.
    pub verdict_policy: Option<VerdictPolicy>,
    pub pyramid: PyramidConfig,
    pub workers: Option<usize>,
    pub health_check_interval_secs: u64,
    /// Connect, read and write timeout of the obs-websocket socket.
    pub obs_io_timeout_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            mode: ControlMode::Overlay,
            obs_websocket_host: "localhost".to_string(),
            obs_websocket_port: 4455,
            obs_websocket_password: String::new(),
            obs_scene_name: String::new(),
            obs_overlay_source_name: String::new(),
            obs_base_scene_name: String::new(),
            obs_overlay_scene_name: String::new(),
            similarity_accuracy: 0.8,
            ticks_per_second: None,
            templates_path: PathBuf::from("detection_templates"),
            monitor_index: 1,
            aggregation: Aggregation::Max,
            verdict_policy: None,
            pyramid: PyramidConfig::default(),
            workers: None,
            health_check_interval_secs: 5,
            obs_io_timeout_secs: 5,
        }
    }
}

/// Validated configuration consumed by the engine.
#[derive(Clone, Debug, PartialEq)]
pub struct Settings {
    pub host: String,
    pub port: u16,
    pub password: String,
    pub target: ControlTarget,
    pub matching: MatchConfig,
    pub band: ScaleBand,
    pub cadence: Cadence,
    pub templates_path: PathBuf,
    pub monitor_index: usize,
    pub workers: Option<usize>,
    pub health_check_interval: Duration,
    pub io_timeout: Duration,
    pub reconnect: ReconnectPolicy,
}

impl EngineConfig {
    /// Parses a JSON document.
    pub fn from_json_str(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }

    /// Checks every field and builds [`Settings`].
    pub fn validate(&self) -> AutoSceneResult<Settings> {
        require("obs_websocket_host", &self.obs_websocket_host)?;
        if self.obs_websocket_port == 0 {
            return Err(out_of_range("obs_websocket_port", "port must be non-zero"));
        }
        require("obs_websocket_password", &self.obs_websocket_password)?;

        let target = match self.mode {
            ControlMode::Overlay => {
                require("obs_scene_name", &self.obs_scene_name)?;
                require("obs_overlay_source_name", &self.obs_overlay_source_name)?;
                ControlTarget::Overlay {
                    scene: self.obs_scene_name.clone(),
                    source: self.obs_overlay_source_name.clone(),
                }
            }
            ControlMode::SceneSwitch => {
                require("obs_base_scene_name", &self.obs_base_scene_name)?;
                require("obs_overlay_scene_name", &self.obs_overlay_scene_name)?;
                ControlTarget::SceneSwitch {
                    base_scene: self.obs_base_scene_name.clone(),
                    overlay_scene: self.obs_overlay_scene_name.clone(),
                }
            }
        };

        let threshold = self.similarity_accuracy;
        if !(threshold.is_finite() && (0.0..=1.0).contains(&threshold)) {
            return Err(out_of_range(
                "similarity_accuracy",
                "must be a decimal between 0.0 and 1.0",
            ));
        }
        let threshold = match self.mode {
            ControlMode::Overlay => threshold,
            ControlMode::SceneSwitch => (threshold * 10.0).round() / 10.0,
        };

        let cadence = match self.ticks_per_second {
            None => Cadence::Uncapped,
            Some(rate) if (1..=MAX_TICKS_PER_SECOND).contains(&rate) => Cadence::FixedRate {
                ticks_per_second: rate,
            },
            Some(_) => {
                return Err(out_of_range(
                    "ticks_per_second",
                    "must be between 1 and 20",
                ))
            }
        };

        if self.templates_path.as_os_str().is_empty() {
            return Err(missing("templates_path"));
        }
        if self.monitor_index == 0 {
            return Err(out_of_range("monitor_index", "monitors are numbered from 1"));
        }

        let pyramid = &self.pyramid;
        if pyramid.levels == 0 || pyramid.levels > 8 {
            return Err(out_of_range("pyramid.levels", "must be between 1 and 8"));
        }
        if !(pyramid.min_scale > 0.0
            && pyramid.min_scale <= pyramid.max_scale
            && pyramid.max_scale <= 1.0)
        {
            return Err(out_of_range(
                "pyramid",
                "scales must satisfy 0 < min_scale <= max_scale <= 1",
            ));
        }

        if let Some(workers) = self.workers {
            if workers == 0 || workers > MAX_WORKERS {
                return Err(out_of_range("workers", "must be between 1 and 4"));
            }
        }
        if self.health_check_interval_secs == 0 {
            return Err(out_of_range(
                "health_check_interval_secs",
                "must be at least one second",
            ));
        }
        if self.obs_io_timeout_secs == 0 {
            return Err(out_of_range(
                "obs_io_timeout_secs",
                "must be at least one second",
            ));
        }

        let policy = self.verdict_policy.unwrap_or(match self.mode {
            ControlMode::Overlay => VerdictPolicy::AnyMatch,
            ControlMode::SceneSwitch => VerdictPolicy::FirstDecisive,
        });

        Ok(Settings {
            host: self.obs_websocket_host.clone(),
            port: self.obs_websocket_port,
            password: self.obs_websocket_password.clone(),
            target,
            matching: MatchConfig {
                threshold,
                aggregation: self.aggregation,
                policy,
            },
            band: ScaleBand {
                levels: pyramid.levels,
                min_scale: pyramid.min_scale,
                max_scale: pyramid.max_scale,
            },
            cadence,
            templates_path: self.templates_path.clone(),
            monitor_index: self.monitor_index,
            workers: self.workers,
            health_check_interval: Duration::from_secs(self.health_check_interval_secs),
            io_timeout: Duration::from_secs(self.obs_io_timeout_secs),
            reconnect: ReconnectPolicy::default(),
        })
    }
}

fn require(field: &'static str, value: &str) -> AutoSceneResult<()> {
    if value.trim().is_empty() {
        return Err(missing(field));
    }
    Ok(())
}

fn missing(field: &'static str) -> AutoSceneError {
    AutoSceneError::ConfigInvalid {
        field,
        issue: ConfigIssue::Missing,
    }
}

fn out_of_range(field: &'static str, detail: &str) -> AutoSceneError {
    AutoSceneError::ConfigInvalid {
        field,
        issue: ConfigIssue::OutOfRange {
            detail: detail.to_string(),
        },
    }
}
