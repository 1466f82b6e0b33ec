/*!
 * Error types for the desktop flow report
 */

use std::fmt;
use std::io;
use std::path::PathBuf;

use crate::protocol::dataverse::DataverseError;

pub type Result<T> = std::result::Result<T, FlowError>;

/// Exit code constants for structured process exit
pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_FATAL: i32 = 2;
pub const EXIT_INTEGRITY: i32 = 3;

#[derive(Debug)]
pub enum FlowError {
    /// Configuration error (bad flags, missing service URI, bad config file)
    Config(String),

    /// Invalid service endpoint
    InvalidEndpoint(String),

    /// Authentication or session establishment failed
    Authentication(String),

    /// Transport or service failure while fetching a page
    Fetch { page: u32, source: DataverseError },

    /// A returned record has no owner value despite the inner join
    MissingOwner { record_id: String },

    /// The session could not be established (token or organization lookup)
    Connect(DataverseError),

    /// The configured page cap was reached while more records remained
    PageLimitExceeded { max_pages: u32 },

    /// The run was cancelled between page fetches
    Cancelled { pages_fetched: u32 },

    /// I/O error writing the CSV report
    Io { path: Option<PathBuf>, source: io::Error },

    /// Generic error with message
    Other(String),
}

impl FlowError {
    /// Get the process exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            FlowError::MissingOwner { .. } => EXIT_INTEGRITY,
            _ => EXIT_FATAL,
        }
    }

    /// Wrap an I/O error with the path it concerns
    pub fn io_at(path: impl Into<PathBuf>, source: io::Error) -> Self {
        FlowError::Io {
            path: Some(path.into()),
            source,
        }
    }

    /// Get error category for logging
    pub fn category(&self) -> ErrorCategory {
        match self {
            FlowError::Config(_) | FlowError::InvalidEndpoint(_) => ErrorCategory::Configuration,
            FlowError::Authentication(_) => ErrorCategory::Security,
            FlowError::Fetch { source, .. } if source.is_auth() => ErrorCategory::Security,
            FlowError::Fetch { .. } | FlowError::Connect(_) => ErrorCategory::Network,
            FlowError::MissingOwner { .. } => ErrorCategory::Integrity,
            FlowError::PageLimitExceeded { .. } | FlowError::Cancelled { .. } => {
                ErrorCategory::Interrupted
            }
            FlowError::Io { .. } => ErrorCategory::IoError,
            FlowError::Other(_) => ErrorCategory::Unknown,
        }
    }
}

/// Error category for classification and reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Flag, config file or endpoint errors
    Configuration,
    /// Authentication/authorization errors
    Security,
    /// Network/protocol errors
    Network,
    /// Data integrity errors (records violating the join contract)
    Integrity,
    /// Run stopped before the listing was exhausted
    Interrupted,
    /// I/O operation errors
    IoError,
    /// Uncategorized errors
    Unknown,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCategory::Configuration => write!(f, "configuration"),
            ErrorCategory::Security => write!(f, "security"),
            ErrorCategory::Network => write!(f, "network"),
            ErrorCategory::Integrity => write!(f, "integrity"),
            ErrorCategory::Interrupted => write!(f, "interrupted"),
            ErrorCategory::IoError => write!(f, "io"),
            ErrorCategory::Unknown => write!(f, "unknown"),
        }
    }
}

impl fmt::Display for FlowError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlowError::Config(msg) => write!(f, "Configuration error: {}", msg),
            FlowError::InvalidEndpoint(msg) => write!(f, "Invalid service URI: {}", msg),
            FlowError::Authentication(msg) => write!(f, "Authentication error: {}", msg),
            FlowError::Fetch { page, source } => {
                write!(f, "Failed to retrieve page {}: {}", page, source)
            }
            FlowError::MissingOwner { record_id } => {
                write!(f, "Record {} has no owner value", record_id)
            }
            FlowError::Connect(source) => write!(f, "Failed to connect: {}", source),
            FlowError::PageLimitExceeded { max_pages } => write!(
                f,
                "More records remain after {} pages (raise --max-pages)",
                max_pages
            ),
            FlowError::Cancelled { pages_fetched } => {
                write!(f, "Cancelled after {} pages", pages_fetched)
            }
            FlowError::Io {
                path: Some(path),
                source,
            } => write!(f, "I/O error on {}: {}", path.display(), source),
            FlowError::Io { path: None, source } => write!(f, "I/O error: {}", source),
            FlowError::Other(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for FlowError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FlowError::Io { source, .. } => Some(source),
            FlowError::Fetch { source, .. } | FlowError::Connect(source) => Some(source),
            _ => None,
        }
    }
}

impl From<io::Error> for FlowError {
    fn from(err: io::Error) -> Self {
        FlowError::Io {
            path: None,
            source: err,
        }
    }
}

impl From<toml::de::Error> for FlowError {
    fn from(err: toml::de::Error) -> Self {
        FlowError::Config(format!("TOML parse error: {}", err))
    }
}

impl From<DataverseError> for FlowError {
    fn from(err: DataverseError) -> Self {
        match err {
            DataverseError::InvalidConfig(msg) => FlowError::Config(msg),
            err if err.is_auth() => FlowError::Authentication(err.to_string()),
            err => FlowError::Connect(err),
        }
    }
}
