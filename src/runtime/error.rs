use thiserror::Error;

/// Machine-readable failure kinds returned by the hub.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiErrorKind {
    TimeoutTooLarge,
    WaitAlreadyActive,
    ThreadClosed,
    NotAParticipant,
    MentionNotParticipant,
    UnknownAgent,
    UnknownThread,
    DuplicateAgent,
    Unauthorized,
    BadRequest,
    Other,
}

impl ApiErrorKind {
    pub fn from_wire(kind: &str) -> Self {
        match kind {
            "timeout_too_large" => Self::TimeoutTooLarge,
            "wait_already_active" => Self::WaitAlreadyActive,
            "thread_closed" => Self::ThreadClosed,
            "not_a_participant" => Self::NotAParticipant,
            "mention_not_participant" => Self::MentionNotParticipant,
            "unknown_agent" => Self::UnknownAgent,
            "unknown_thread" => Self::UnknownThread,
            "duplicate_agent" => Self::DuplicateAgent,
            "unauthorized" => Self::Unauthorized,
            "bad_request" => Self::BadRequest,
            _ => Self::Other,
        }
    }
}

#[derive(Debug, Error)]
pub enum ClientError {
    /// Channel-level failure: retried with backoff, session may be reopened.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The hub rejected the request; surfaced to the caller as-is.
    #[error("hub rejected request ({kind:?}): {message}")]
    Api {
        kind: ApiErrorKind,
        message: String,
        /// Populated on `timeout_too_large` so callers can clamp.
        max_wait_ms: Option<u64>,
    },

    /// Malformed frame or response body.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The session is gone and could not be reopened.
    #[error("session closed")]
    SessionClosed,
}

impl ClientError {
    pub fn is_transport(&self) -> bool {
        matches!(self, ClientError::Transport(_))
    }

    pub fn api_kind(&self) -> Option<ApiErrorKind> {
        match self {
            ClientError::Api { kind, .. } => Some(*kind),
            _ => None,
        }
    }
}
