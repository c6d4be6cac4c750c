//! Session - one end-to-end exchange with the upstream backend.

use serde::Serialize;

use super::Mode;
use crate::domain::foundation::{
    ConversationId, SessionId, StateMachine, Timestamp, ValidationError,
};

/// Lifecycle of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Created,
    ConversationEstablished,
    Streaming,
    Completed,
    Failed,
    TimedOut,
}

impl StateMachine for SessionState {
    fn can_transition_to(&self, target: &Self) -> bool {
        use SessionState::*;
        matches!(
            (self, target),
            (Created, ConversationEstablished)
                | (ConversationEstablished, Streaming)
                | (ConversationEstablished, Failed)
                | (Streaming, Completed)
                | (Streaming, Failed)
                | (Streaming, TimedOut)
        )
    }

    fn valid_transitions(&self) -> Vec<Self> {
        use SessionState::*;
        match self {
            Created => vec![ConversationEstablished],
            ConversationEstablished => vec![Streaming, Failed],
            Streaming => vec![Completed, Failed, TimedOut],
            Completed | Failed | TimedOut => vec![],
        }
    }
}

/// State of a single relay session.
///
/// Owned by the invocation that created it and never reused.
#[derive(Debug, Clone)]
pub struct Session {
    id: SessionId,
    conversation_id: Option<ConversationId>,
    mode: Mode,
    started_at: Timestamp,
    state: SessionState,
}

impl Session {
    /// Creates a session in the `Created` state.
    pub fn new(mode: Mode) -> Self {
        Self {
            id: SessionId::new(),
            conversation_id: None,
            mode,
            started_at: Timestamp::now(),
            state: SessionState::Created,
        }
    }

    /// Records the conversation the session is addressed to.
    pub fn establish(&mut self, conversation_id: ConversationId) -> Result<(), ValidationError> {
        self.state = self.state.transition_to(SessionState::ConversationEstablished)?;
        self.conversation_id = Some(conversation_id);
        Ok(())
    }

    /// Marks the streaming connection as open.
    pub fn begin_streaming(&mut self) -> Result<(), ValidationError> {
        self.state = self.state.transition_to(SessionState::Streaming)?;
        Ok(())
    }

    /// Moves the session into a terminal state.
    pub fn finish(&mut self, outcome: SessionState) -> Result<(), ValidationError> {
        if !outcome.is_terminal() {
            return Err(ValidationError::invalid_format(
                "state_transition",
                format!("{:?} is not a terminal state", outcome),
            ));
        }
        self.state = self.state.transition_to(outcome)?;
        Ok(())
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn conversation_id(&self) -> Option<&ConversationId> {
        self.conversation_id.as_ref()
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Mode string sent upstream.
    pub fn protocol_mode(&self) -> &'static str {
        self.mode.protocol_name()
    }

    pub fn started_at(&self) -> &Timestamp {
        &self.started_at
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// True when the session runs on a locally generated conversation id.
    pub fn is_degraded(&self) -> bool {
        self.conversation_id
            .as_ref()
            .is_some_and(ConversationId::is_placeholder)
    }
}
