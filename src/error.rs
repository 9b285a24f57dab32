//! Unified error types for periphctl.
//!
//! A single `Error` enum that every subsystem converts into, with one
//! variant per failure category:
//!
//! | Variant           | Raised by                         | Handling                          |
//! |-------------------|-----------------------------------|-----------------------------------|
//! | `Connection`      | link open / read / write          | returned to caller; loops back off|
//! | `Parse`           | status-line classification        | logged, line dropped              |
//! | `Validation`      | registration / direct commands    | returned, nothing queued          |
//! | `ActionExecution` | a fired rule's command send       | logged, rule stays consumed       |
//! | `Spawn`           | background thread creation        | returned, nothing started         |

use core::fmt;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// The serial link is unreachable, closed, or failed mid-transfer.
    Connection(ConnectionError),
    /// A device status line could not be decoded.
    Parse(ParseError),
    /// Caller-supplied parameters were rejected.
    Validation(ValidationError),
    /// A matched rule's action could not be delivered.
    ActionExecution(ActionExecutionError),
    /// The OS refused to start a background thread.
    Spawn(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connection(e) => write!(f, "connection: {e}"),
            Self::Parse(e) => write!(f, "parse: {e}"),
            Self::Validation(e) => write!(f, "validation: {e}"),
            Self::ActionExecution(e) => write!(f, "action: {e}"),
            Self::Spawn(reason) => write!(f, "spawn: {reason}"),
        }
    }
}

impl std::error::Error for Error {}

impl Error {
    /// Shorthand for a [`ValidationError`] carrying `reason`.
    pub fn invalid(reason: impl Into<String>) -> Self {
        Self::Validation(ValidationError(reason.into()))
    }

    pub fn is_connection(&self) -> bool {
        matches!(self, Self::Connection(_))
    }
}

// ---------------------------------------------------------------------------
// Connection errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionError {
    /// The port could not be opened.
    OpenFailed { port: String, reason: String },
    /// The link was closed and no reconnect was possible.
    Closed,
    /// A read or write on an open port failed.
    Io(String),
    /// Another thread panicked while holding the link.
    LockPoisoned,
}

impl fmt::Display for ConnectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OpenFailed { port, reason } => write!(f, "failed to open {port}: {reason}"),
            Self::Closed => write!(f, "link closed"),
            Self::Io(reason) => write!(f, "I/O error: {reason}"),
            Self::LockPoisoned => write!(f, "link lock poisoned"),
        }
    }
}

impl From<ConnectionError> for Error {
    fn from(e: ConnectionError) -> Self {
        Self::Connection(e)
    }
}

// ---------------------------------------------------------------------------
// Parse errors
// ---------------------------------------------------------------------------

/// A status line whose prefix was recognised but whose payload was not.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub line: String,
    pub reason: &'static str,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} in {:?}", self.reason, self.line)
    }
}

impl From<ParseError> for Error {
    fn from(e: ParseError) -> Self {
        Self::Parse(e)
    }
}

// ---------------------------------------------------------------------------
// Validation errors
// ---------------------------------------------------------------------------

/// Human-readable reason a request was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError(pub String);

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<ValidationError> for Error {
    fn from(e: ValidationError) -> Self {
        Self::Validation(e)
    }
}

// ---------------------------------------------------------------------------
// Action execution errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct ActionExecutionError {
    /// Short description of the action that failed (e.g. `beep 500ms`).
    pub action: String,
    /// The underlying failure.
    pub cause: Box<Error>,
}

impl fmt::Display for ActionExecutionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} failed: {}", self.action, self.cause)
    }
}

impl From<ActionExecutionError> for Error {
    fn from(e: ActionExecutionError) -> Self {
        Self::ActionExecution(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Crate-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
