// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The run session's state machine (spec.md §4.5):
//! `INIT -> STARTING -> RUNNING -> DRAINING -> FINALIZING -> DONE`, with
//! `ABORTED` as the other terminal state. Transitions are driven only by
//! the orchestrator; event ingestion never moves this machine.

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SessionState {
    Init,
    Starting,
    Running,
    Draining,
    Finalizing,
    Done,
    Aborted,
}

impl SessionState {
    fn allowed_next(self) -> &'static [SessionState] {
        use SessionState::*;
        match self {
            Init => &[Starting, Aborted],
            Starting => &[Running, Aborted],
            Running => &[Draining, Aborted],
            Draining => &[Finalizing, Aborted],
            Finalizing => &[Done, Aborted],
            Done | Aborted => &[],
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, SessionState::Done | SessionState::Aborted)
    }
}

/// A small guard around [`SessionState`] that panics on an illegal
/// transition rather than silently corrupting the run — the state machine
/// is internal to the orchestrator and a bad transition is a programming
/// error, not a runtime condition to recover from.
#[derive(Debug)]
pub struct Session {
    state: SessionState,
}

impl Session {
    pub fn new() -> Self {
        Self {
            state: SessionState::Init,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn transition(&mut self, next: SessionState) {
        assert!(
            self.state.allowed_next().contains(&next),
            "illegal session transition: {:?} -> {:?}",
            self.state,
            next
        );
        tracing::debug!(from = ?self.state, to = ?next, "session state transition");
        self.state = next;
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn walks_the_happy_path() {
        let mut session = Session::new();
        session.transition(SessionState::Starting);
        session.transition(SessionState::Running);
        session.transition(SessionState::Draining);
        session.transition(SessionState::Finalizing);
        session.transition(SessionState::Done);
        assert!(session.state().is_terminal());
    }

    #[test]
    #[should_panic(expected = "illegal session transition")]
    fn rejects_skipping_states() {
        let mut session = Session::new();
        session.transition(SessionState::Running);
    }

    #[test]
    fn can_abort_from_any_non_terminal_state() {
        let mut session = Session::new();
        session.transition(SessionState::Starting);
        session.transition(SessionState::Aborted);
        assert!(session.state().is_terminal());
    }
}
