//! Debounced application state.
//!
//! The policy remembers the last state the control surface accepted and
//! proposes a transition only when the verdict disagrees with it. The
//! transition is committed only if the apply callback succeeds, so a failed or
//! deferred mutation is recomputed on the next tick instead of being queued.

use std::fmt;

/// Externally observable decision.
///
/// In overlay mode `Base` means the overlay source is hidden and `Overlay`
/// that it is visible; in scene-switch mode they name the base and overlay
/// scenes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ApplicationState {
    #[default]
    Base,
    Overlay,
}

impl ApplicationState {
    /// Maps a verdict to the state it calls for.
    pub fn from_verdict(matched: bool) -> Self {
        if matched {
            Self::Overlay
        } else {
            Self::Base
        }
    }

    /// Returns true for [`ApplicationState::Overlay`].
    pub fn is_overlay(self) -> bool {
        matches!(self, Self::Overlay)
    }
}

impl fmt::Display for ApplicationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Base => f.write_str("base"),
            Self::Overlay => f.write_str("overlay"),
        }
    }
}

/// A committed state change.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Transition {
    pub from: ApplicationState,
    pub to: ApplicationState,
}

/// Two-state debounce machine.
#[derive(Clone, Debug, Default)]
pub struct DecisionPolicy {
    state: ApplicationState,
}

impl DecisionPolicy {
    /// Starts in [`ApplicationState::Base`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the last committed state.
    pub fn state(&self) -> ApplicationState {
        self.state
    }

    /// Returns the state the verdict calls for, if it differs from the
    /// committed one.
    fn pending(&self, matched: bool) -> Option<ApplicationState> {
        let target = ApplicationState::from_verdict(matched);
        (target != self.state).then_some(target)
    }

    /// Feeds one verdict.
    ///
    /// When the verdict flips relative to the committed state, `apply` is
    /// called with the new state; the transition is committed only if it
    /// returns `Ok`. Identical verdicts never call `apply`.
    pub fn update<E, F>(&mut self, matched: bool, apply: F) -> Result<Option<Transition>, E>
    where
        F: FnOnce(ApplicationState) -> Result<(), E>,
    {
        let Some(target) = self.pending(matched) else {
            return Ok(None);
        };
        apply(target)?;
        let transition = Transition {
            from: self.state,
            to: target,
        };
        self.state = target;
        Ok(Some(transition))
    }

    /// Adopts the baseline a fresh control session established.
    pub fn resync(&mut self, applied: ApplicationState) {
        self.state = applied;
    }
}

#[cfg(test)]
mod tests {
    use super::{ApplicationState, DecisionPolicy, Transition};

    fn ok(_: ApplicationState) -> Result<(), ()> {
        Ok(())
    }

    #[test]
    fn verdict_sequence_yields_three_transitions() {
        let mut policy = DecisionPolicy::new();
        let mut transitions = Vec::new();
        for verdict in [true, true, false, false, true] {
            if let Some(t) = policy.update(verdict, ok).unwrap() {
                transitions.push(t);
            }
        }
        use ApplicationState::{Base, Overlay};
        assert_eq!(
            transitions,
            vec![
                Transition { from: Base, to: Overlay },
                Transition { from: Overlay, to: Base },
                Transition { from: Base, to: Overlay },
            ]
        );
    }

    #[test]
    fn failed_apply_leaves_state_uncommitted() {
        let mut policy = DecisionPolicy::new();
        let err = policy.update(true, |_| Err("offline")).unwrap_err();
        assert_eq!(err, "offline");
        assert_eq!(policy.state(), ApplicationState::Base);

        let mut calls = 0;
        let t = policy
            .update(true, |_| {
                calls += 1;
                Ok::<(), ()>(())
            })
            .unwrap();
        assert_eq!(calls, 1);
        assert_eq!(t.unwrap().to, ApplicationState::Overlay);
    }

    #[test]
    fn repeated_verdicts_do_not_call_apply() {
        let mut policy = DecisionPolicy::new();
        let mut calls = 0;
        for _ in 0..5 {
            policy
                .update(false, |_| {
                    calls += 1;
                    Ok::<(), ()>(())
                })
                .unwrap();
        }
        assert_eq!(calls, 0);
    }
}
