use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum UniverseError {
    /// The storage collaborator handed back no identifier.
    InvalidContent,
    UnknownBubble(String),
    /// A remote entry that cannot be applied. Callers log and drop these.
    MalformedRecord(String),
}

impl fmt::Display for UniverseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UniverseError::InvalidContent => write!(f, "invalid content: empty identifier"),
            UniverseError::UnknownBubble(id) => write!(f, "unknown bubble: {id}"),
            UniverseError::MalformedRecord(msg) => write!(f, "malformed record: {msg}"),
        }
    }
}

impl std::error::Error for UniverseError {}

pub type Result<T> = std::result::Result<T, UniverseError>;
