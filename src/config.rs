/*!
 * Configuration types for the desktop flow report
 */

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{FlowError, Result};

/// Workflow category code of desktop flows. The only category the report covers.
pub const DESKTOP_FLOW_CATEGORY: i32 = 6;

/// Default CSV output file
pub const DEFAULT_OUTPUT_PATH: &str = "desktopflow.csv";

/// Main configuration for a report run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Environment URL, e.g. https://contoso.crm.dynamics.com
    #[serde(default)]
    pub service_uri: Option<String>,

    /// Drop flows whose payload is smaller than this many bytes
    #[serde(default)]
    pub min_size: u64,

    /// CSV output path
    #[serde(default = "default_output_path")]
    pub output_path: PathBuf,

    /// Write the CSV report at all
    #[serde(default = "default_true")]
    pub write_csv: bool,

    /// Records requested per page
    #[serde(default = "default_page_size")]
    pub page_size: u32,

    /// Final sort direction by size
    #[serde(default)]
    pub sort_order: SortOrder,

    /// Which owner column labels each row
    #[serde(default)]
    pub owner_label: OwnerLabel,

    /// Select and report the last-modified timestamp
    #[serde(default = "default_true")]
    pub include_modified: bool,

    /// Stop with an error if more than this many pages would be fetched
    #[serde(default)]
    pub max_pages: Option<u32>,

    /// HTTP request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Web API version segment
    #[serde(default = "default_api_version")]
    pub api_version: String,

    /// Entra ID tenant for the client-credentials grant
    #[serde(default)]
    pub tenant_id: Option<String>,

    /// Application (client) id for the client-credentials grant
    #[serde(default)]
    pub client_id: Option<String>,

    /// Token authority host
    #[serde(default = "default_authority_host")]
    pub authority_host: String,

    /// Log level for diagnostic output
    #[serde(default)]
    pub log_level: LogLevel,

    /// Log file path (None = stderr)
    #[serde(default)]
    pub log_file: Option<PathBuf>,

    /// Enable verbose logging (shorthand for log_level = debug)
    #[serde(default)]
    pub verbose: bool,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            service_uri: None,
            min_size: 0,
            output_path: default_output_path(),
            write_csv: true,
            page_size: default_page_size(),
            sort_order: SortOrder::Descending,
            owner_label: OwnerLabel::Email,
            include_modified: true,
            max_pages: None,
            timeout_secs: default_timeout_secs(),
            api_version: default_api_version(),
            tenant_id: None,
            client_id: None,
            authority_host: default_authority_host(),
            log_level: LogLevel::Info,
            log_file: None,
            verbose: false,
        }
    }
}

impl ReportConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents =
            std::fs::read_to_string(path).map_err(|e| FlowError::io_at(path, e))?;
        let config: ReportConfig = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Default config file location, `<config dir>/desktopflow/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("desktopflow").join("config.toml"))
    }

    /// Load the explicit file if given, else the default file if it exists, else defaults
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }
        match Self::default_path() {
            Some(path) if path.is_file() => Self::from_file(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Check values that cannot be expressed in the types
    pub fn validate(&self) -> Result<()> {
        if self.page_size == 0 {
            return Err(FlowError::Config("page size must be at least 1".to_string()));
        }
        if self.max_pages == Some(0) {
            return Err(FlowError::Config("max pages must be at least 1".to_string()));
        }
        match self.service_uri.as_deref() {
            Some(uri) if !uri.trim().is_empty() => Ok(()),
            _ => Err(FlowError::Config(
                "a service URI is required (--service-uri or service_uri in the config file)"
                    .to_string(),
            )),
        }
    }

    /// CSV path when file output is enabled
    pub fn csv_path(&self) -> Option<&Path> {
        self.write_csv.then_some(self.output_path.as_path())
    }
}

/// Direction of the final size sort
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    /// Smallest first
    #[serde(alias = "asc")]
    Ascending,

    /// Largest first
    #[default]
    #[serde(alias = "desc")]
    Descending,
}

/// Owner column used to label each row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OwnerLabel {
    /// Owner's primary email address
    #[default]
    Email,

    /// Owner's full display name
    Name,
}

/// Log level for diagnostic output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Only errors
    Error,

    /// Warnings and errors
    Warn,

    /// Info, warnings, and errors
    #[default]
    Info,

    /// Debug and above
    Debug,

    /// All messages including traces
    Trace,
}

impl LogLevel {
    /// Convert to tracing::Level
    pub fn to_tracing_level(&self) -> tracing::Level {
        match self {
            LogLevel::Error => tracing::Level::ERROR,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Trace => tracing::Level::TRACE,
        }
    }
}

// Default value functions for serde
fn default_true() -> bool {
    true
}

fn default_output_path() -> PathBuf {
    PathBuf::from(DEFAULT_OUTPUT_PATH)
}

fn default_page_size() -> u32 {
    10
}

fn default_timeout_secs() -> u64 {
    120
}

fn default_api_version() -> String {
    "v9.2".to_string()
}

fn default_authority_host() -> String {
    "https://login.microsoftonline.com".to_string()
}
