//! Core data types for the KOEN generation-data collection service.
//!
//! This module defines the shared domain model imported by all other
//! modules: date windows, fetch filters, tabular batches, merge outcomes,
//! and the error taxonomy. It contains no I/O; the only logic here is the
//! small amount of construction and parsing the types themselves need.

use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;
use std::fmt;

// ---------------------------------------------------------------------------
// Identity columns
// ---------------------------------------------------------------------------

/// Column holding the observation timestamp.
pub const COL_DATE: &str = "date";

/// Column holding the station / plant name.
pub const COL_STATION: &str = "station_name";

/// Optional column holding the intra-day sub-period.
pub const COL_HOUR: &str = "hour";

// ---------------------------------------------------------------------------
// Date windows
// ---------------------------------------------------------------------------

/// An inclusive sub-range of the overall collection range, sized to the
/// portal's one-month-per-request limit.
///
/// Windows produced by `windows::plan` are ordered, contiguous and cover
/// the requested range exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DateWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateWindow {
    /// Window bounds in the portal's compact form, e.g. "20251101-20251130".
    /// Used in artifact filenames.
    pub fn label(&self) -> String {
        format!(
            "{}-{}",
            self.start.format("%Y%m%d"),
            self.end.format("%Y%m%d")
        )
    }
}

impl fmt::Display for DateWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}~{}",
            self.start.format("%Y%m%d"),
            self.end.format("%Y%m%d")
        )
    }
}

// ---------------------------------------------------------------------------
// Fetch filters
// ---------------------------------------------------------------------------

/// Identity of what to request from the portal, minus the date window.
///
/// Each filter is either a concrete value or `None`, the portal's
/// "all" sentinel (transmitted as an empty form value).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchFilters {
    pub page_index: String,
    /// Plant org code, e.g. "84S1". `None` requests every plant.
    pub org_no: Option<String>,
    /// First unit of the unit range. `None` requests every unit.
    pub hoki_s: Option<String>,
    /// Last unit of the unit range. `None` requests every unit.
    pub hoki_e: Option<String>,
}

impl FetchFilters {
    /// Filters that request everything the portal has.
    pub fn all() -> Self {
        FetchFilters {
            page_index: "1".to_string(),
            org_no: None,
            hoki_s: None,
            hoki_e: None,
        }
    }

    /// Filters restricted to a single plant, all units.
    pub fn for_plant(org_code: &str) -> Self {
        FetchFilters {
            org_no: Some(org_code.to_string()),
            ..FetchFilters::all()
        }
    }

    pub fn org_value(&self) -> &str {
        self.org_no.as_deref().unwrap_or("")
    }

    pub fn hoki_s_value(&self) -> &str {
        self.hoki_s.as_deref().unwrap_or("")
    }

    pub fn hoki_e_value(&self) -> &str {
        self.hoki_e.as_deref().unwrap_or("")
    }
}

// ---------------------------------------------------------------------------
// Fetch results
// ---------------------------------------------------------------------------

/// Raw per-window fetch result, consumed immediately by the validator.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub body: Vec<u8>,
    /// Declared Content-Type header, verbatim.
    pub content_type: String,
}

// ---------------------------------------------------------------------------
// Tabular batches
// ---------------------------------------------------------------------------

/// Column layout of a tabular batch: the full header row plus the
/// positions of the recognized identity columns, when present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    pub headers: Vec<String>,
    pub date_col: Option<usize>,
    pub station_col: Option<usize>,
    pub hour_col: Option<usize>,
}

impl Schema {
    pub fn from_headers(headers: Vec<String>) -> Self {
        let find = |name: &str| headers.iter().position(|h| h.trim() == name);
        Schema {
            date_col: find(COL_DATE),
            station_col: find(COL_STATION),
            hour_col: find(COL_HOUR),
            headers,
        }
    }
}

/// One observation row. `cells` round-trips to CSV verbatim, in header
/// order; unrecognized measured columns pass through untouched.
/// `timestamp` is the cached parse of the date cell, used for ordering.
#[derive(Debug, Clone)]
pub struct Record {
    pub timestamp: Option<NaiveDateTime>,
    pub cells: Vec<String>,
}

impl Record {
    pub fn new(cells: Vec<String>, schema: &Schema) -> Self {
        let timestamp = schema
            .date_col
            .and_then(|i| cells.get(i))
            .and_then(|cell| parse_mixed_timestamp(cell));
        Record { timestamp, cells }
    }
}

/// A parsed tabular batch: either freshly collected rows or the master
/// table read back from disk.
#[derive(Debug, Clone)]
pub struct Batch {
    pub schema: Schema,
    pub records: Vec<Record>,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Parses a timestamp cell in any of the formats the upstream files have
/// been observed to use. Date-only values resolve to midnight so that
/// "2024-01-01" and "2024-01-01 00:00:00" key and sort identically.
pub fn parse_mixed_timestamp(cell: &str) -> Option<NaiveDateTime> {
    let s = cell.trim();
    if s.is_empty() {
        return None;
    }
    for fmt in [
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%d %H:%M",
        "%Y-%m-%dT%H:%M:%S",
        "%Y/%m/%d %H:%M",
    ] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt);
        }
    }
    for fmt in ["%Y-%m-%d", "%Y/%m/%d", "%Y%m%d"] {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return d.and_hms_opt(0, 0, 0);
        }
    }
    None
}

// ---------------------------------------------------------------------------
// Merge outcome
// ---------------------------------------------------------------------------

/// Counts reported after folding a batch into the master table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MergeOutcome {
    /// Rows appended to the master table.
    pub added: usize,
    /// Rows discarded because their identity key was already present.
    pub skipped: usize,
    /// Rows in the master table after the merge.
    pub total: usize,
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors that abort a collection run. Window-local conditions (content
/// rejection, unparseable payloads) are not errors; they are reported
/// outcomes that let the run continue.
#[derive(Debug, PartialEq, Eq)]
pub enum CollectError {
    /// The requested range has `end` before `start`.
    InvalidRange { start: NaiveDate, end: NaiveDate },
    /// A target-date argument that is not a calendar date in any
    /// accepted form.
    InvalidDate(String),
    /// Network or session failure mid-run. Fatal: remaining windows are
    /// not attempted, already-persisted artifacts are kept.
    Transport { window: DateWindow, detail: String },
    /// Artifact or report persistence failure.
    Io(String),
}

impl fmt::Display for CollectError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CollectError::InvalidRange { start, end } => {
                write!(f, "invalid range: end {} is before start {}", end, start)
            }
            CollectError::InvalidDate(input) => {
                write!(
                    f,
                    "invalid date '{}': expected YYYYMMDD, YYYY-MM-DD or YYYY/MM/DD",
                    input
                )
            }
            CollectError::Transport { window, detail } => {
                write!(f, "transport failure on window {}: {}", window, detail)
            }
            CollectError::Io(detail) => write!(f, "I/O failure: {}", detail),
        }
    }
}

impl std::error::Error for CollectError {}

/// Errors that abort a merge call.
#[derive(Debug)]
pub enum MergeError {
    /// The new-batch file does not exist.
    MissingBatch(String),
    Io(String),
    Csv(String),
}

impl fmt::Display for MergeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MergeError::MissingBatch(path) => write!(f, "new batch file not found: {}", path),
            MergeError::Io(detail) => write!(f, "I/O failure: {}", detail),
            MergeError::Csv(detail) => write!(f, "CSV failure: {}", detail),
        }
    }
}

impl std::error::Error for MergeError {}

impl From<std::io::Error> for MergeError {
    fn from(e: std::io::Error) -> Self {
        MergeError::Io(e.to_string())
    }
}

impl From<csv::Error> for MergeError {
    fn from(e: csv::Error) -> Self {
        MergeError::Csv(e.to_string())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
