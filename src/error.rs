use thiserror::Error;

/// Errors surfaced by the session layer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// The session actor stopped before it could handle the request.
    #[error("session {0} is closed")]
    Closed(String),

    /// Every join attempt raced with a terminating session.
    #[error("session {id} unavailable after {attempts} attempts")]
    Unavailable { id: String, attempts: usize },
}

pub type SessionResult<T> = Result<T, SessionError>;
