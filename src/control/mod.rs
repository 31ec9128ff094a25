//! Control-surface session management.
//!
//! A [`SurfaceDialer`] opens sessions; a [`ControlSurface`] is one open
//! session answering synchronous requests. [`ControlConnector`] owns at most
//! one session, performs the baseline handshake, makes state application
//! idempotent and runs the bounded reconnection protocol.

pub mod obs;
pub mod protocol;

use crate::decision::ApplicationState;
use crate::util::{ControlError, ControlResult, Sleeper, ThreadSleeper};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Requests the connector needs from a presentation-control service.
pub trait ControlSurface {
    /// Makes `scene` the program (live) scene.
    fn set_current_program_scene(&mut self, scene: &str) -> ControlResult<()>;
    /// Resolves the scene item id of `source` inside `scene`.
    fn scene_item_id(&mut self, scene: &str, source: &str) -> ControlResult<i64>;
    /// Shows or hides a scene item.
    fn set_scene_item_enabled(&mut self, scene: &str, item_id: i64, enabled: bool) -> ControlResult<()>;
    /// Round trip used as a health probe; returns the service version.
    fn version(&mut self) -> ControlResult<String>;
}

/// Opens new sessions to the control surface.
pub trait SurfaceDialer {
    type Surface: ControlSurface;

    fn dial(&mut self) -> ControlResult<Self::Surface>;
}

/// What the application state drives on the surface.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ControlTarget {
    /// Toggle the visibility of one source inside a fixed scene.
    Overlay { scene: String, source: String },
    /// Switch the program scene between two named scenes.
    SceneSwitch {
        base_scene: String,
        overlay_scene: String,
    },
}

impl ControlTarget {
    /// Human-readable rendering of a state for this target.
    pub fn describe(&self, state: ApplicationState) -> String {
        match (self, state) {
            (Self::Overlay { source, .. }, ApplicationState::Base) => format!("{source} hidden"),
            (Self::Overlay { source, .. }, ApplicationState::Overlay) => format!("{source} visible"),
            (Self::SceneSwitch { base_scene, .. }, ApplicationState::Base) => {
                format!("scene {base_scene}")
            }
            (Self::SceneSwitch { overlay_scene, .. }, ApplicationState::Overlay) => {
                format!("scene {overlay_scene}")
            }
        }
    }
}

/// Connection lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connected,
    Reconnecting,
}

/// Bounded fixed-delay reconnection budget.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Connect attempts per reconnection.
    pub max_attempts: u32,
    /// Delay before every attempt.
    pub delay: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_secs(5),
        }
    }
}

struct Session<S> {
    surface: S,
    item_id: Option<i64>,
}

/// Owns the session to the control surface.
pub struct ControlConnector<D: SurfaceDialer> {
    dialer: D,
    target: ControlTarget,
    retry: ReconnectPolicy,
    sleeper: Box<dyn Sleeper>,
    session: Option<Session<D::Surface>>,
    state: ConnectionState,
    applied: Option<ApplicationState>,
    epoch: u64,
}

impl<D: SurfaceDialer> ControlConnector<D> {
    /// Creates a disconnected connector with the default retry budget.
    pub fn new(dialer: D, target: ControlTarget) -> Self {
        Self {
            dialer,
            target,
            retry: ReconnectPolicy::default(),
            sleeper: Box::new(ThreadSleeper),
            session: None,
            state: ConnectionState::Disconnected,
            applied: None,
            epoch: 0,
        }
    }

    /// Replaces the reconnection budget.
    pub fn with_retry(mut self, retry: ReconnectPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Replaces the sleeper used between reconnection attempts.
    pub fn with_sleeper(mut self, sleeper: impl Sleeper + 'static) -> Self {
        self.sleeper = Box::new(sleeper);
        self
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn retry(&self) -> &ReconnectPolicy {
        &self.retry
    }

    /// Returns the state last accepted by the surface in this session.
    pub fn applied(&self) -> Option<ApplicationState> {
        self.applied
    }

    /// Counter bumped every time a session is established.
    pub fn session_epoch(&self) -> u64 {
        self.epoch
    }

    /// Opens a session unless one is already connected.
    pub fn connect(&mut self) -> ControlResult<ConnectionState> {
        if self.state == ConnectionState::Connected && self.session.is_some() {
            return Ok(self.state);
        }
        match self.establish() {
            Ok(()) => Ok(self.state),
            Err(err) => {
                self.state = ConnectionState::Disconnected;
                Err(err)
            }
        }
    }

    /// Applies `state` to the surface.
    ///
    /// Re-applying the current state is a no-op. A failed call runs the
    /// reconnection protocol and, once reconnected, tries the call once more.
    pub fn apply_state(&mut self, state: ApplicationState) -> ControlResult<()> {
        if self.state != ConnectionState::Connected {
            return Err(ControlError::NotConnected);
        }
        if self.applied == Some(state) {
            return Ok(());
        }
        let session = self.session.as_mut().ok_or(ControlError::NotConnected)?;
        match send_state(session, &self.target, state) {
            Ok(()) => {
                self.applied = Some(state);
                info!(state = %self.target.describe(state), "applied state");
                Ok(())
            }
            Err(err) => {
                warn!(%err, "control call failed, reconnecting");
                self.reconnect()?;
                if self.applied == Some(state) {
                    return Ok(());
                }
                let session = self.session.as_mut().ok_or(ControlError::NotConnected)?;
                match send_state(session, &self.target, state) {
                    Ok(()) => {
                        self.applied = Some(state);
                        info!(state = %self.target.describe(state), "applied state after reconnect");
                        Ok(())
                    }
                    Err(err) => {
                        self.drop_session();
                        Err(err)
                    }
                }
            }
        }
    }

    /// Probes the session.
    ///
    /// Connected: a version round trip, falling back to the reconnection
    /// protocol on failure. Otherwise: one connect attempt without delay.
    pub fn health_check(&mut self) -> bool {
        match self.state {
            ConnectionState::Connected => {
                let probe = match self.session.as_mut() {
                    Some(session) => session.surface.version(),
                    None => Err(ControlError::NotConnected),
                };
                match probe {
                    Ok(version) => {
                        debug!(%version, "health check ok");
                        true
                    }
                    Err(err) => {
                        warn!(%err, "health check failed, reconnecting");
                        self.reconnect().is_ok()
                    }
                }
            }
            ConnectionState::Disconnected | ConnectionState::Reconnecting => self.connect().is_ok(),
        }
    }

    /// Drops the session and retries `connect` up to the retry budget,
    /// sleeping the fixed delay before every attempt.
    pub fn reconnect(&mut self) -> ControlResult<ConnectionState> {
        self.session = None;
        self.applied = None;
        self.state = ConnectionState::Reconnecting;
        let max = self.retry.max_attempts;
        for attempt in 1..=max {
            self.sleeper.sleep(self.retry.delay);
            match self.establish() {
                Ok(()) => {
                    info!(attempt, "reconnected to control surface");
                    return Ok(self.state);
                }
                Err(err) => warn!(attempt, max, %err, "reconnect attempt failed"),
            }
        }
        self.state = ConnectionState::Disconnected;
        warn!(attempts = max, "giving up on reconnection");
        Err(ControlError::ReconnectFailed { attempts: max })
    }

    /// Closes the session.
    pub fn disconnect(&mut self) {
        if self.session.is_some() {
            info!("disconnecting from control surface");
        }
        self.drop_session();
    }

    fn drop_session(&mut self) {
        self.session = None;
        self.applied = None;
        self.state = ConnectionState::Disconnected;
    }

    fn establish(&mut self) -> ControlResult<()> {
        let mut surface = self.dialer.dial()?;
        let item_id = handshake(&mut surface, &self.target).map_err(|err| ControlError::ConnectFailed {
            reason: err.to_string(),
        })?;
        self.session = Some(Session { surface, item_id });
        self.state = ConnectionState::Connected;
        self.applied = Some(ApplicationState::Base);
        self.epoch += 1;
        Ok(())
    }
}

/// Selects the scene, resolves the overlay item and forces the baseline.
fn handshake<S: ControlSurface>(surface: &mut S, target: &ControlTarget) -> ControlResult<Option<i64>> {
    match target {
        ControlTarget::Overlay { scene, source } => {
            surface.set_current_program_scene(scene)?;
            let item_id = surface.scene_item_id(scene, source)?;
            surface.set_scene_item_enabled(scene, item_id, false)?;
            Ok(Some(item_id))
        }
        ControlTarget::SceneSwitch { base_scene, .. } => {
            surface.set_current_program_scene(base_scene)?;
            Ok(None)
        }
    }
}

fn send_state<S: ControlSurface>(
    session: &mut Session<S>,
    target: &ControlTarget,
    state: ApplicationState,
) -> ControlResult<()> {
    match target {
        ControlTarget::Overlay { scene, .. } => {
            let item_id = session.item_id.ok_or(ControlError::CallFailed {
                request: "SetSceneItemEnabled",
                reason: "scene item id was not resolved".to_string(),
            })?;
            session
                .surface
                .set_scene_item_enabled(scene, item_id, state.is_overlay())
        }
        ControlTarget::SceneSwitch {
            base_scene,
            overlay_scene,
        } => {
            let scene = if state.is_overlay() {
                overlay_scene
            } else {
                base_scene
            };
            session.surface.set_current_program_scene(scene)
        }
    }
}
