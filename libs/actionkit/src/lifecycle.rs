//! Per-request handler lifecycle.
//!
//! `Constructed -> ContextInjected -> [Initialized] -> MethodInvoked -> ResponseEmitted`
//! with `ErrorForwarded` reachable from any non-terminal phase.

use std::fmt;

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Constructed,
    ContextInjected,
    Initialized,
    MethodInvoked,
    ResponseEmitted,
    ErrorForwarded,
}

impl Phase {
    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Constructed => "constructed",
            Phase::ContextInjected => "context_injected",
            Phase::Initialized => "initialized",
            Phase::MethodInvoked => "method_invoked",
            Phase::ResponseEmitted => "response_emitted",
            Phase::ErrorForwarded => "error_forwarded",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Phase::ResponseEmitted | Phase::ErrorForwarded)
    }

    pub fn can_advance_to(self, next: Phase) -> bool {
        use Phase::*;
        match (self, next) {
            (Constructed, ContextInjected)
            | (ContextInjected, Initialized)
            | (ContextInjected, MethodInvoked)
            | (Initialized, MethodInvoked)
            | (MethodInvoked, ResponseEmitted) => true,
            (from, ErrorForwarded) => !from.is_terminal(),
            _ => false,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid lifecycle transition for '{handler}': {from} -> {to}")]
pub struct PhaseError {
    pub handler: String,
    pub from: Phase,
    pub to: Phase,
}

/// Tracks the phase of one handler instance.
#[derive(Debug)]
pub struct Lifecycle {
    handler: String,
    phase: Phase,
}

impl Lifecycle {
    /// A freshly constructed handler.
    pub fn constructed(handler: impl Into<String>) -> Self {
        Self {
            handler: handler.into(),
            phase: Phase::Constructed,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn advance(&mut self, next: Phase) -> Result<(), PhaseError> {
        if !self.phase.can_advance_to(next) {
            return Err(PhaseError {
                handler: self.handler.clone(),
                from: self.phase,
                to: next,
            });
        }
        tracing::trace!(handler = %self.handler, from = %self.phase, to = %next, "lifecycle");
        self.phase = next;
        Ok(())
    }

    /// Mark the instance as failed unless it already reached a terminal phase.
    pub fn fail(&mut self) {
        if !self.phase.is_terminal() {
            self.phase = Phase::ErrorForwarded;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_with_and_without_init() {
        let mut lc = Lifecycle::constructed("Home");
        lc.advance(Phase::ContextInjected).unwrap();
        lc.advance(Phase::Initialized).unwrap();
        lc.advance(Phase::MethodInvoked).unwrap();
        lc.advance(Phase::ResponseEmitted).unwrap();
        assert!(lc.phase().is_terminal());

        let mut lc = Lifecycle::constructed("Home");
        lc.advance(Phase::ContextInjected).unwrap();
        lc.advance(Phase::MethodInvoked).unwrap();
    }

    #[test]
    fn cannot_skip_injection() {
        let mut lc = Lifecycle::constructed("Home");
        let err = lc.advance(Phase::MethodInvoked).unwrap_err();
        assert_eq!(err.from, Phase::Constructed);
        assert_eq!(err.to, Phase::MethodInvoked);
        assert!(err.to_string().contains("constructed -> method_invoked"));
    }

    #[test]
    fn terminal_phases_are_final() {
        let mut lc = Lifecycle::constructed("Home");
        lc.fail();
        assert_eq!(lc.phase(), Phase::ErrorForwarded);
        assert!(lc.advance(Phase::ContextInjected).is_err());
        assert!(lc.advance(Phase::ErrorForwarded).is_err());
        lc.fail();
        assert_eq!(lc.phase(), Phase::ErrorForwarded);
    }
}
