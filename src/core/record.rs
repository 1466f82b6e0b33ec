/*!
 * Raw desktop flow records and the report rows derived from them
 */

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;

/// A workflow record as returned by the platform, already joined with its owner.
///
/// Only the selected columns are present. The payload is usually the largest
/// field by far and is consumed by the transformer.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRecord {
    pub id: String,
    pub name: Option<String>,
    pub payload: Option<String>,
    pub owner: Option<String>,
    pub modified_on: Option<DateTime<Utc>>,
}

impl RawRecord {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
            payload: None,
            owner: None,
            modified_on: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_payload(mut self, payload: impl Into<String>) -> Self {
        self.payload = Some(payload.into());
        self
    }

    pub fn with_owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = Some(owner.into());
        self
    }

    pub fn with_modified_on(mut self, modified_on: DateTime<Utc>) -> Self {
        self.modified_on = Some(modified_on);
        self
    }
}

/// One line of the report. Built once by the transformer, never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportRow {
    pub id: String,
    pub name: String,
    pub size_bytes: u64,
    pub owner: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified_on: Option<DateTime<Utc>>,
}

impl ReportRow {
    /// Modification timestamp as written to the report, if known
    pub fn modified_on_display(&self) -> Option<String> {
        self.modified_on
            .map(|ts| ts.to_rfc3339_opts(SecondsFormat::Secs, true))
    }
}
