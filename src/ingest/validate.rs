//! Response classification and coarse parsing.
//!
//! The portal signals "no data / session problem" by answering the CSV
//! endpoint with an HTML page, so the declared Content-Type is the first
//! gate: anything that does not declare CSV is rejected with a diagnostic
//! and the run moves on. Accepted payloads are then parsed; a payload
//! that declares CSV but fails to parse yields an empty batch for its
//! window instead of aborting the run.

use crate::model::{Batch, DateWindow, RawResponse, Record, Schema};

/// Case-insensitive substring the declared Content-Type must contain.
pub const EXPECTED_FORMAT: &str = "csv";

/// How much of a rejected body to quote in the diagnostic.
pub const PREVIEW_BYTES: usize = 300;

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

/// What a window's fetch turned into after validation.
#[derive(Debug)]
pub enum WindowPayload {
    /// Declared format matched and the body parsed into rows.
    Accepted(Batch),
    /// Declared format did not match. Non-fatal; the diagnostic carries
    /// the window bounds, the actual content type and a body preview.
    Rejected {
        content_type: String,
        diagnostic: String,
    },
    /// Declared format matched but the body is not parseable as CSV.
    /// The window contributes an empty batch; the run continues.
    Unparseable { detail: String },
}

/// Classifies a raw fetch result for one window.
pub fn classify(window: &DateWindow, raw: &RawResponse) -> WindowPayload {
    if !raw
        .content_type
        .to_ascii_lowercase()
        .contains(EXPECTED_FORMAT)
    {
        let diagnostic = format!(
            "window {} rejected: Content-Type '{}' does not declare {}; body starts: {}",
            window,
            raw.content_type,
            EXPECTED_FORMAT,
            body_preview(&raw.body)
        );
        return WindowPayload::Rejected {
            content_type: raw.content_type.clone(),
            diagnostic,
        };
    }

    match parse_batch(&raw.body) {
        Ok(batch) => WindowPayload::Accepted(batch),
        Err(detail) => WindowPayload::Unparseable {
            detail: format!("window {}: {}", window, detail),
        },
    }
}

/// First `PREVIEW_BYTES` of a body, lossily decoded for logging. A
/// multi-byte character cut at the boundary shows up as a replacement
/// character, which is good enough for a diagnostic.
pub fn body_preview(body: &[u8]) -> String {
    let end = body.len().min(PREVIEW_BYTES);
    String::from_utf8_lossy(&body[..end]).into_owned()
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// Parses CSV bytes into a batch. The header row defines the schema;
/// every data row must have the same width. Also used by the merge
/// engine to read batch files and the master table back from disk.
pub fn parse_batch(bytes: &[u8]) -> Result<Batch, String> {
    let data = strip_bom(bytes);
    let mut reader = csv::ReaderBuilder::new().flexible(false).from_reader(data);

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| format!("parse failure in header row: {}", e))?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();
    if headers.is_empty() || (headers.len() == 1 && headers[0].is_empty()) {
        return Err("empty response body".to_string());
    }

    let schema = Schema::from_headers(headers);
    let mut records = Vec::new();
    for row in reader.records() {
        let row = row.map_err(|e| format!("parse failure in data rows: {}", e))?;
        let cells: Vec<String> = row.iter().map(|c| c.to_string()).collect();
        records.push(Record::new(cells, &schema));
    }

    Ok(Batch { schema, records })
}

/// Strips a leading UTF-8 byte-order marker, which the portal and the
/// master table both carry.
pub fn strip_bom(bytes: &[u8]) -> &[u8] {
    bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
