use std::{
    fmt,
    sync::{Arc, Mutex},
};

use crate::{log::log_sink::LogSink, sink_debug};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallState {
    Idle,
    /// Caller dialed and waits for accept/decline.
    Connecting,
    /// Callee holds a request awaiting the local decision.
    Ringing,
    Active,
    Terminated,
}

impl CallState {
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Idle, Self::Connecting | Self::Ringing)
                | (Self::Connecting, Self::Active | Self::Idle | Self::Terminated)
                | (Self::Ringing, Self::Active | Self::Terminated)
                | (Self::Active, Self::Terminated)
        )
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "IDLE",
            Self::Connecting => "CONNECTING",
            Self::Ringing => "RINGING",
            Self::Active => "ACTIVE",
            Self::Terminated => "TERMINATED",
        }
    }
}

impl fmt::Display for CallState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Shared, validated call state for one peer.
pub struct CallStateCell {
    state: Mutex<CallState>,
    label: String,
    logger: Arc<dyn LogSink>,
}

impl fmt::Debug for CallStateCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallStateCell")
            .field("state", &self.get())
            .field("label", &self.label)
            .finish_non_exhaustive()
    }
}

impl CallStateCell {
    #[must_use]
    pub fn new(initial: CallState, label: impl Into<String>, logger: Arc<dyn LogSink>) -> Self {
        Self {
            state: Mutex::new(initial),
            label: label.into(),
            logger,
        }
    }

    #[must_use]
    pub fn get(&self) -> CallState {
        self.state
            .lock()
            .map_or(CallState::Terminated, |s| *s)
    }

    /// Moves to `next` if that is a legal step. Returns whether it moved.
    pub fn transition(&self, next: CallState) -> bool {
        let Ok(mut state) = self.state.lock() else {
            return false;
        };
        if !state.can_transition_to(next) {
            sink_debug!(
                self.logger,
                "[call {}] ignored {} -> {}",
                self.label,
                *state,
                next
            );
            return false;
        }
        sink_debug!(self.logger, "[call {}] {} -> {}", self.label, *state, next);
        *state = next;
        true
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;
    use crate::log::NoopLogSink;

    #[test]
    fn caller_and_callee_paths_are_legal() {
        use CallState::*;
        assert!(Idle.can_transition_to(Connecting));
        assert!(Connecting.can_transition_to(Active));
        assert!(Connecting.can_transition_to(Idle));
        assert!(Idle.can_transition_to(Ringing));
        assert!(Ringing.can_transition_to(Active));
        assert!(Ringing.can_transition_to(Terminated));
        assert!(Active.can_transition_to(Terminated));
    }

    #[test]
    fn terminated_is_final_and_active_cannot_rewind() {
        use CallState::*;
        for s in [Idle, Connecting, Ringing, Active, Terminated] {
            assert!(!Terminated.can_transition_to(s));
        }
        assert!(!Active.can_transition_to(Idle));
        assert!(!Active.can_transition_to(Active));
    }

    #[test]
    fn cell_rejects_illegal_steps() {
        let cell = CallStateCell::new(CallState::Active, "10.0.0.2", Arc::new(NoopLogSink));
        assert!(!cell.transition(CallState::Ringing));
        assert_eq!(cell.get(), CallState::Active);
        assert!(cell.transition(CallState::Terminated));
        assert!(!cell.transition(CallState::Terminated));
        assert_eq!(cell.get(), CallState::Terminated);
    }
}
