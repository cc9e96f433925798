//! Session lifecycle state machine.

/// Lifecycle state of a persistent shell session.
///
/// Exactly one state holds at any time. `Stopped` is both the initial
/// state and the end of every lifecycle; a stopped session may be started
/// again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    /// No process is attached.
    #[default]
    Stopped,
    /// The process is being spawned.
    Starting,
    /// The process is alive and accepting commands.
    Running,
    /// Teardown has begun (or is pending after a broken input pipe).
    Stopping,
}

impl SessionState {
    /// Check if transition to target state is valid.
    ///
    /// Valid transitions:
    /// - Stopped -> Starting
    /// - Starting -> Running
    /// - Starting -> Stopped (spawn failed)
    /// - Running -> Stopping
    /// - Stopping -> Stopped
    pub fn can_transition_to(&self, target: SessionState) -> bool {
        use SessionState::*;
        matches!(
            (*self, target),
            (Stopped, Starting)
                | (Starting, Running)
                | (Starting, Stopped)
                | (Running, Stopping)
                | (Stopping, Stopped)
        )
    }

    /// Attempt to transition to a new state.
    ///
    /// Returns `Ok(())` if the transition is valid, or an error otherwise.
    pub fn transition_to(&mut self, target: SessionState) -> crate::Result<()> {
        if self.can_transition_to(target) {
            *self = target;
            Ok(())
        } else {
            Err(crate::error::PipeShellError::InvalidStateTransition {
                from: *self,
                to: target,
            })
        }
    }

    /// Check if session can accept commands.
    pub fn can_execute(&self) -> bool {
        matches!(self, SessionState::Running)
    }

    /// Whether a process may still be attached in this state.
    pub fn has_process(&self) -> bool {
        !matches!(self, SessionState::Stopped)
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SessionState::Stopped => "stopped",
            SessionState::Starting => "starting",
            SessionState::Running => "running",
            SessionState::Stopping => "stopping",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_lifecycle() {
        let mut state = SessionState::Stopped;
        assert!(state.transition_to(SessionState::Starting).is_ok());
        assert!(state.transition_to(SessionState::Running).is_ok());
        assert!(state.transition_to(SessionState::Stopping).is_ok());
        assert!(state.transition_to(SessionState::Stopped).is_ok());

        // Restartable from Stopped
        assert!(state.transition_to(SessionState::Starting).is_ok());
        assert_eq!(state, SessionState::Starting);
    }

    #[test]
    fn test_spawn_failure_returns_to_stopped() {
        let mut state = SessionState::Starting;
        assert!(state.transition_to(SessionState::Stopped).is_ok());
    }

    #[test]
    fn test_invalid_stopped_to_running() {
        let mut state = SessionState::Stopped;
        assert!(state.transition_to(SessionState::Running).is_err());
        // State should remain unchanged
        assert_eq!(state, SessionState::Stopped);
    }

    #[test]
    fn test_invalid_running_to_starting() {
        let mut state = SessionState::Running;
        assert!(state.transition_to(SessionState::Starting).is_err());
        assert!(state.transition_to(SessionState::Stopped).is_err());
        assert_eq!(state, SessionState::Running);
    }

    #[test]
    fn test_can_execute() {
        assert!(!SessionState::Stopped.can_execute());
        assert!(!SessionState::Starting.can_execute());
        assert!(SessionState::Running.can_execute());
        assert!(!SessionState::Stopping.can_execute());
    }

    #[test]
    fn test_default_and_display() {
        let state = SessionState::default();
        assert_eq!(state, SessionState::Stopped);
        assert_eq!(state.to_string(), "stopped");
        assert_eq!(SessionState::Running.to_string(), "running");
    }
}
