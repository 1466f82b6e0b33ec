/*!
 * desktopflow - payload size report for Power Automate desktop flows
 *
 * Lists every desktop flow in a Dataverse environment page by page, measures
 * the stored definition of each flow, and reports the flows sorted by size:
 * - FetchXML query with paging-cookie continuation
 * - Incremental CSV output, flushed after every page
 * - Console or JSON Lines report
 */

pub mod cli_progress;
pub mod cli_style;
pub mod config;
pub mod core;
pub mod error;
pub mod logging;
pub mod output;
pub mod protocol;

// Re-export commonly used types
pub use config::{OwnerLabel, ReportConfig, SortOrder};
pub use core::{run_report, ReportOptions, ReportRow, ReportSummary};
pub use error::{FlowError, Result};
pub use protocol::dataverse::{Credentials, DataverseClient};
pub use protocol::ServiceEndpoint;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
