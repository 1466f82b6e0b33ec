/*!
 * Record transformer: measure, filter and project raw records
 */

use tracing::warn;

use super::record::{RawRecord, ReportRow};
use super::size::utf16_byte_len;
use crate::error::{FlowError, Result};

/// Converts raw records into report rows, dropping those below `min_size`.
#[derive(Debug, Clone, Copy, Default)]
pub struct RecordTransformer {
    min_size: u64,
}

impl RecordTransformer {
    pub fn new(min_size: u64) -> Self {
        Self { min_size }
    }

    /// Transform one record. Returns `Ok(None)` when the record is filtered out.
    ///
    /// The record is taken by value: its payload is measured and released
    /// before the row is built, so at most one payload is alive at a time.
    pub fn transform(&self, record: RawRecord) -> Result<Option<ReportRow>> {
        let RawRecord {
            id,
            name,
            payload,
            owner,
            modified_on,
        } = record;

        let size_bytes = match payload {
            Some(text) => utf16_byte_len(&text),
            None => {
                warn!(record_id = %id, "record has no payload; measuring as 0 bytes");
                0
            }
        };

        if size_bytes < self.min_size {
            return Ok(None);
        }

        let owner = owner.ok_or_else(|| FlowError::MissingOwner {
            record_id: id.clone(),
        })?;

        Ok(Some(ReportRow {
            id,
            name: name.unwrap_or_default(),
            size_bytes,
            owner,
            modified_on,
        }))
    }
}
