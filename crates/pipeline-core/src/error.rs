//! The job's error taxonomy.
//!
//! Every fatal condition in this crate is one of five kinds, each tagged
//! with the role that raised it. There is no local recovery: any of these
//! reaching a role's main loop ends that role's run and the job reports a
//! non-zero exit.

use thiserror::Error;

/// Which of the job's four roles raised an error, and which instance of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Dealer,
    Worker(usize),
    Farmer,
    Outputter,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Dealer => write!(f, "dealer"),
            Role::Worker(rank) => write!(f, "worker[{rank}]"),
            Role::Farmer => write!(f, "farmer"),
            Role::Outputter => write!(f, "outputter"),
        }
    }
}

/// The five fatal error kinds a role can raise. None of these is locally
/// recoverable; the first one raised terminates the job.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A send/receive over the role-to-role transport failed: a peer hung
    /// up, a channel disconnected, or an expected message never arrived.
    #[error("[{role}] transport error: {message}")]
    Transport { role: Role, message: String },

    /// A decoded record or message violated the wire format: a bad type
    /// code, a truncated body, a length field that does not add up.
    #[error("[{role}] structural error: {message}")]
    Structural { role: Role, message: String },

    /// A role observed data out of sequence with what its own state
    /// machine expects (e.g. a trigger number that moved backwards).
    #[error("[{role}] state error: {message}")]
    State { role: Role, message: String },

    /// A filesystem or stream I/O operation failed.
    #[error("[{role}] i/o error: {message}")]
    Io { role: Role, message: String },

    /// A configuration value was missing, malformed, or out of range.
    #[error("[{role}] configuration error: {message}")]
    Config { role: Role, message: String },
}

impl PipelineError {
    pub fn transport(role: Role, message: impl Into<String>) -> Self {
        Self::Transport { role, message: message.into() }
    }

    pub fn structural(role: Role, message: impl Into<String>) -> Self {
        Self::Structural { role, message: message.into() }
    }

    pub fn state(role: Role, message: impl Into<String>) -> Self {
        Self::State { role, message: message.into() }
    }

    pub fn io(role: Role, message: impl Into<String>) -> Self {
        Self::Io { role, message: message.into() }
    }

    pub fn config(role: Role, message: impl Into<String>) -> Self {
        Self::Config { role, message: message.into() }
    }

    /// The role that raised this error.
    pub fn role(&self) -> Role {
        match self {
            PipelineError::Transport { role, .. }
            | PipelineError::Structural { role, .. }
            | PipelineError::State { role, .. }
            | PipelineError::Io { role, .. }
            | PipelineError::Config { role, .. } => *role,
        }
    }
}
