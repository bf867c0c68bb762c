/*!
 * Error types for headcut
 */

use std::fmt;
use std::io;
use std::path::PathBuf;

use crate::core::Stage;

pub type Result<T> = std::result::Result<T, HeadcutError>;

/// Exit code constants for structured process exit
pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_FAILURE: i32 = 1;
pub const EXIT_SOURCE_NOT_FOUND: i32 = 2;
pub const EXIT_SINK_UNAVAILABLE: i32 = 3;
pub const EXIT_TRANSPORT: i32 = 32;
pub const EXIT_FORCED: i32 = 130;

#[derive(Debug)]
pub enum HeadcutError {
    /// Row source does not exist
    SourceNotFound(PathBuf),

    /// Row source exists but could not be opened
    SourceUnreadable { path: PathBuf, source: io::Error },

    /// Output sink could not be created
    SinkUnavailable { path: PathBuf, source: io::Error },

    /// Configuration error
    Config(String),

    /// Transport, thread or other pre-start resource could not be created
    Setup(String),

    /// Reading a row from the source failed
    SourceRead(io::Error),

    /// Writing to or reading from the row transport failed
    Transport(io::Error),

    /// Transport delivered a frame that could not be decoded
    MalformedFrame(String),

    /// Shared slot handoff broke the one-row-in-flight rule
    SlotViolation(String),

    /// Writing to the output sink failed
    SinkWrite(io::Error),

    /// A stage thread panicked
    StagePanicked(Stage),

    /// Generic error with message
    Other(String),
}

impl HeadcutError {
    /// Get the process exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            HeadcutError::SourceNotFound(_) | HeadcutError::SourceUnreadable { .. } => {
                EXIT_SOURCE_NOT_FOUND
            }
            HeadcutError::SinkUnavailable { .. } => EXIT_SINK_UNAVAILABLE,
            HeadcutError::Setup(_)
            | HeadcutError::SourceRead(_)
            | HeadcutError::Transport(_)
            | HeadcutError::MalformedFrame(_)
            | HeadcutError::SlotViolation(_)
            | HeadcutError::SinkWrite(_) => EXIT_TRANSPORT,
            HeadcutError::Config(_) | HeadcutError::StagePanicked(_) | HeadcutError::Other(_) => {
                EXIT_FAILURE
            }
        }
    }

    /// Get error category for logging
    pub fn category(&self) -> ErrorCategory {
        match self {
            HeadcutError::SourceNotFound(_)
            | HeadcutError::SourceUnreadable { .. }
            | HeadcutError::SourceRead(_) => ErrorCategory::Source,
            HeadcutError::SinkUnavailable { .. } | HeadcutError::SinkWrite(_) => {
                ErrorCategory::Sink
            }
            HeadcutError::Config(_) => ErrorCategory::Configuration,
            HeadcutError::Setup(_) => ErrorCategory::Setup,
            HeadcutError::Transport(_)
            | HeadcutError::MalformedFrame(_)
            | HeadcutError::SlotViolation(_) => ErrorCategory::Transport,
            HeadcutError::StagePanicked(_) | HeadcutError::Other(_) => ErrorCategory::Internal,
        }
    }
}

/// Error category for classification and reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Row source errors
    Source,
    /// Output sink errors
    Sink,
    /// Configuration errors
    Configuration,
    /// Resource creation before the pipeline starts
    Setup,
    /// Inter-stage handoff errors
    Transport,
    /// Panics and uncategorized errors
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCategory::Source => write!(f, "source"),
            ErrorCategory::Sink => write!(f, "sink"),
            ErrorCategory::Configuration => write!(f, "configuration"),
            ErrorCategory::Setup => write!(f, "setup"),
            ErrorCategory::Transport => write!(f, "transport"),
            ErrorCategory::Internal => write!(f, "internal"),
        }
    }
}

impl fmt::Display for HeadcutError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HeadcutError::SourceNotFound(path) => {
                write!(f, "Could not find {}", path.display())
            }
            HeadcutError::SourceUnreadable { path, source } => {
                write!(f, "Could not open {}: {}", path.display(), source)
            }
            HeadcutError::SinkUnavailable { path, source } => {
                write!(f, "Could not create output file {}: {}", path.display(), source)
            }
            HeadcutError::Config(msg) => {
                write!(f, "Configuration error: {}", msg)
            }
            HeadcutError::Setup(msg) => {
                write!(f, "Pipeline setup failed: {}", msg)
            }
            HeadcutError::SourceRead(err) => {
                write!(f, "Error reading from source: {}", err)
            }
            HeadcutError::Transport(err) => {
                write!(f, "Row transport error: {}", err)
            }
            HeadcutError::MalformedFrame(msg) => {
                write!(f, "Malformed transport frame: {}", msg)
            }
            HeadcutError::SlotViolation(msg) => {
                write!(f, "Shared slot violation: {}", msg)
            }
            HeadcutError::SinkWrite(err) => {
                write!(f, "Error writing to output: {}", err)
            }
            HeadcutError::StagePanicked(stage) => {
                write!(f, "{} thread panicked", stage)
            }
            HeadcutError::Other(msg) => {
                write!(f, "{}", msg)
            }
        }
    }
}

impl std::error::Error for HeadcutError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            HeadcutError::SourceUnreadable { source, .. }
            | HeadcutError::SinkUnavailable { source, .. } => Some(source),
            HeadcutError::SourceRead(err)
            | HeadcutError::Transport(err)
            | HeadcutError::SinkWrite(err) => Some(err),
            _ => None,
        }
    }
}

impl From<toml::de::Error> for HeadcutError {
    fn from(err: toml::de::Error) -> Self {
        HeadcutError::Config(format!("TOML parse error: {}", err))
    }
}

impl From<toml::ser::Error> for HeadcutError {
    fn from(err: toml::ser::Error) -> Self {
        HeadcutError::Config(format!("TOML encode error: {}", err))
    }
}

impl From<regex::Error> for HeadcutError {
    fn from(err: regex::Error) -> Self {
        HeadcutError::Config(format!("Invalid sentinel pattern: {}", err))
    }
}
