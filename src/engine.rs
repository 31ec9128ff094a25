//! Detection loop and its start/stop surface.
//!
//! [`ControlLoop`] runs one tick per scheduler iteration: capture, normalize,
//! evaluate, feed the decision policy and apply accepted transitions to the
//! control surface. [`Engine::start`] validates the configuration, loads the
//! templates and runs the loop on its own thread until the returned
//! [`EngineHandle`] is stopped.

use crate::capture::FrameSource;
use crate::config::{EngineConfig, Settings};
use crate::control::{ConnectionState, ControlConnector, SurfaceDialer};
use crate::decision::{DecisionPolicy, Transition};
use crate::image::preprocess::normalize;
use crate::schedule::PollScheduler;
use crate::search::{worker_count, Matcher};
use crate::template::TemplateSet;
use crate::util::{AutoSceneError, AutoSceneResult, ConfigIssue, ControlError};
use crossbeam_channel::Sender;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{debug, info, info_span, warn};

/// Situations reported to the display side.
#[derive(Clone, Debug, PartialEq)]
pub enum Status {
    Running,
    Stopped,
    MissingConfig { field: &'static str },
    InvalidConfig { field: &'static str, detail: String },
    NoTemplates { dir: String },
    /// Start failed for a reason other than configuration or templates.
    StartFailed { reason: String },
    Connected,
    ConnectFailed { reason: String },
    ReconnectFailed { attempts: u32 },
    Reconnected,
}

impl Status {
    /// Maps a start-up error to the status shown for it.
    pub fn from_start_error(err: &AutoSceneError) -> Self {
        match err {
            AutoSceneError::ConfigInvalid {
                field,
                issue: ConfigIssue::Missing,
            } => Status::MissingConfig { field: *field },
            AutoSceneError::ConfigInvalid {
                field,
                issue: ConfigIssue::OutOfRange { detail },
            } => Status::InvalidConfig {
                field: *field,
                detail: detail.clone(),
            },
            AutoSceneError::NoTemplatesAvailable { dir } => Status::NoTemplates { dir: dir.clone() },
            other => Status::StartFailed {
                reason: other.to_string(),
            },
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Running => f.write_str("running"),
            Status::Stopped => f.write_str("stopped"),
            Status::MissingConfig { field } => write!(f, "missing configuration: {field}"),
            Status::InvalidConfig { field, detail } => {
                write!(f, "invalid configuration: {field} {detail}")
            }
            Status::NoTemplates { dir } => write!(f, "no templates found in {dir}"),
            Status::StartFailed { reason } => write!(f, "cannot start: {reason}"),
            Status::Connected => f.write_str("connected to OBS"),
            Status::ConnectFailed { reason } => write!(f, "cannot connect to OBS: {reason}"),
            Status::ReconnectFailed { attempts } => {
                write!(f, "lost OBS connection, {attempts} reconnect attempts failed")
            }
            Status::Reconnected => f.write_str("reconnected to OBS"),
        }
    }
}

/// One detection loop: frame source, matcher, policy and control session.
pub struct ControlLoop<S, D: SurfaceDialer> {
    source: S,
    matcher: Matcher,
    policy: DecisionPolicy,
    connector: ControlConnector<D>,
    status: Sender<Status>,
    health_interval: Duration,
    last_health: Instant,
    epoch: u64,
}

impl<S: FrameSource, D: SurfaceDialer> ControlLoop<S, D> {
    pub fn new(
        source: S,
        matcher: Matcher,
        connector: ControlConnector<D>,
        status: Sender<Status>,
        health_interval: Duration,
    ) -> Self {
        Self {
            source,
            matcher,
            policy: DecisionPolicy::new(),
            connector,
            status,
            health_interval,
            last_health: Instant::now(),
            epoch: 0,
        }
    }

    pub fn policy(&self) -> &DecisionPolicy {
        &self.policy
    }

    pub fn connector(&self) -> &ControlConnector<D> {
        &self.connector
    }

    /// Opens the first session. A failure is reported but does not stop the
    /// loop; the health check keeps retrying.
    pub fn startup(&mut self) {
        match self.connector.connect() {
            Ok(_) => self.sync_session(),
            Err(err) => {
                warn!(%err, "initial connection failed");
                self.report(Status::ConnectFailed {
                    reason: err.to_string(),
                });
            }
        }
        self.last_health = Instant::now();
    }

    /// Runs one iteration and returns the committed transition, if any.
    pub fn tick(&mut self) -> Option<Transition> {
        let frame = match self.source.capture() {
            Ok(frame) => frame,
            Err(err) => {
                warn!(%err, "skipping tick");
                self.maintain_connection();
                return None;
            }
        };
        let normalized = match normalize(&frame) {
            Ok(image) => image,
            Err(err) => {
                warn!(%err, "skipping tick");
                self.maintain_connection();
                return None;
            }
        };

        let assumption = self.policy.state().is_overlay();
        let verdict = self.matcher.evaluate(normalized.view(), assumption);
        self.maintain_connection();

        let connector = &mut self.connector;
        let result = self
            .policy
            .update(verdict.matched, |state| connector.apply_state(state));
        let transition = match result {
            Ok(transition) => transition,
            Err(ControlError::NotConnected) => {
                debug!(matched = verdict.matched, "not connected, decision not applied");
                None
            }
            Err(err @ ControlError::ReconnectFailed { attempts }) => {
                warn!(%err, "decision not applied");
                self.report(Status::ReconnectFailed { attempts });
                None
            }
            Err(err) => {
                warn!(%err, "decision not applied");
                None
            }
        };
        if let Some(t) = transition {
            info!(from = %t.from, to = %t.to, decided_by = ?verdict.decided_by, "transition");
        }
        self.sync_session();
        transition
    }

    /// Runs ticks until `running` clears, then closes the session.
    pub fn run(&mut self, running: &AtomicBool, scheduler: &mut PollScheduler) {
        let _span = info_span!("control_loop").entered();
        info!(
            templates = self.matcher.templates().len(),
            threshold = self.matcher.config().threshold,
            workers = self.matcher.workers(),
            cadence = ?scheduler.cadence(),
            "detection loop started"
        );
        self.startup();
        self.report(Status::Running);
        let ticks = scheduler.run(running, || {
            self.tick();
        });
        self.connector.disconnect();
        info!(ticks, "detection loop stopped");
        self.report(Status::Stopped);
    }

    /// Periodic probe of the control session.
    fn maintain_connection(&mut self) {
        if self.last_health.elapsed() < self.health_interval {
            return;
        }
        let was_connected = self.connector.state() == ConnectionState::Connected;
        let healthy = self.connector.health_check();
        self.last_health = Instant::now();
        if !healthy && was_connected {
            self.report(Status::ReconnectFailed {
                attempts: self.connector.retry().max_attempts,
            });
        }
        self.sync_session();
    }

    /// Adopts the baseline of a newly established session.
    ///
    /// A session that was opened and lost again within the same call is not
    /// reported; the next successful connection is.
    fn sync_session(&mut self) {
        let epoch = self.connector.session_epoch();
        if epoch == self.epoch || self.connector.state() != ConnectionState::Connected {
            return;
        }
        let first = self.epoch == 0;
        self.epoch = epoch;
        if let Some(applied) = self.connector.applied() {
            self.policy.resync(applied);
        }
        self.report(if first {
            Status::Connected
        } else {
            Status::Reconnected
        });
    }

    fn report(&self, status: Status) {
        debug!(%status, "status");
        let _ = self.status.send(status);
    }
}

/// Entry point for running the detection loop on a background thread.
pub struct Engine;

impl Engine {
    /// Validates `config`, loads templates and spawns the loop with the given
    /// frame source and dialer.
    ///
    /// Start-up failures are returned and also pushed on `status`.
    pub fn start<S, D>(
        config: &EngineConfig,
        source: S,
        dialer: D,
        status: Sender<Status>,
    ) -> AutoSceneResult<EngineHandle>
    where
        S: FrameSource + Send + 'static,
        D: SurfaceDialer + Send + 'static,
        D::Surface: Send,
    {
        Self::start_with(config, move |_| Ok((source, dialer)), status)
    }

    /// Like [`Engine::start`], but builds the frame source and dialer from the
    /// validated [`Settings`]. `open` is only called once the configuration
    /// is valid and templates are loaded.
    pub fn start_with<S, D, F>(
        config: &EngineConfig,
        open: F,
        status: Sender<Status>,
    ) -> AutoSceneResult<EngineHandle>
    where
        S: FrameSource + Send + 'static,
        D: SurfaceDialer + Send + 'static,
        D::Surface: Send,
        F: FnOnce(&Settings) -> AutoSceneResult<(S, D)>,
    {
        Self::spawn(config, open, status.clone()).map_err(|err| {
            warn!(%err, "engine failed to start");
            let _ = status.send(Status::from_start_error(&err));
            err
        })
    }

    fn spawn<S, D, F>(
        config: &EngineConfig,
        open: F,
        status: Sender<Status>,
    ) -> AutoSceneResult<EngineHandle>
    where
        S: FrameSource + Send + 'static,
        D: SurfaceDialer + Send + 'static,
        D::Surface: Send,
        F: FnOnce(&Settings) -> AutoSceneResult<(S, D)>,
    {
        let settings = config.validate()?;
        let templates = Arc::new(TemplateSet::load_dir(&settings.templates_path, &settings.band)?);
        let (source, dialer) = open(&settings)?;
        let workers = worker_count(templates.len(), settings.workers);
        let matcher = Matcher::new(templates, settings.matching.clone(), workers)?;
        let connector = ControlConnector::new(dialer, settings.target.clone())
            .with_retry(settings.reconnect.clone());
        let mut scheduler = PollScheduler::new(settings.cadence);
        let mut control = ControlLoop::new(
            source,
            matcher,
            connector,
            status,
            settings.health_check_interval,
        );

        let running = Arc::new(AtomicBool::new(true));
        let flag = running.clone();
        let join = std::thread::Builder::new()
            .name("autoscene-loop".to_string())
            .spawn(move || control.run(&flag, &mut scheduler))
            .map_err(|err| AutoSceneError::ThreadSpawn {
                reason: err.to_string(),
            })?;
        Ok(EngineHandle {
            running,
            join: Some(join),
        })
    }
}

/// Owner of a running loop thread. Dropping it stops the loop.
pub struct EngineHandle {
    running: Arc<AtomicBool>,
    join: Option<JoinHandle<()>>,
}

impl EngineHandle {
    /// Returns true while the loop thread is alive and not asked to stop.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
            && self.join.as_ref().is_some_and(|join| !join.is_finished())
    }

    /// Requests a stop and waits for the current tick to finish.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.running.store(false, Ordering::Release);
        if let Some(join) = self.join.take() {
            if join.join().is_err() {
                warn!("detection loop panicked");
            }
        }
    }
}

impl Drop for EngineHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}
