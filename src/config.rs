//! Run configuration for the collector.
//!
//! All tunable state (portal address, output locations, pacing) lives in
//! one structure, loaded from `koenergy.toml` with env-var overrides and
//! constructed once per run. Nothing here is solicited interactively and
//! nothing is process-global.

use chrono::{Days, NaiveDate};
use serde::Deserialize;
use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};

use crate::ingest::koenergy::{DEFAULT_BASE_URL, DEFAULT_MENU_CD};
use crate::model::CollectError;

// ---------------------------------------------------------------------------
// Collector configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CollectorConfig {
    /// Portal origin, no trailing slash.
    pub base_url: String,
    /// Portal menu code identifying the generation-data download page.
    pub menu_cd: String,
    /// Directory receiving per-window artifacts and the run report.
    pub output_dir: String,
    /// Artifact filename prefix, e.g. "south_pv".
    pub file_prefix: String,
    /// Master table filename, resolved inside `output_dir` unless absolute.
    pub master_file: String,
    /// Fixed delay between window requests. The portal's rate limit is
    /// undocumented; 5 seconds is known to stay under it.
    pub pacing_secs: u64,
    /// Timeout for the priming page request.
    pub prime_timeout_secs: u64,
    /// Timeout for the data download request.
    pub data_timeout_secs: u64,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        CollectorConfig {
            base_url: DEFAULT_BASE_URL.to_string(),
            menu_cd: DEFAULT_MENU_CD.to_string(),
            output_dir: "./data".to_string(),
            file_prefix: "south_pv".to_string(),
            master_file: "south_pv_all_merged.csv".to_string(),
            pacing_secs: 5,
            prime_timeout_secs: 30,
            data_timeout_secs: 120,
        }
    }
}

impl CollectorConfig {
    /// Loads configuration from a TOML file. Missing keys fall back to
    /// the defaults above.
    pub fn load(path: &str) -> Result<Self, Box<dyn Error>> {
        let text = fs::read_to_string(path)?;
        let cfg: CollectorConfig = toml::from_str(&text)?;
        Ok(cfg)
    }

    /// Environment overrides, highest precedence. Read after `dotenv` so
    /// a `.env` file works the same as real environment variables.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("KOEN_BASE_URL") {
            self.base_url = v;
        }
        if let Ok(v) = std::env::var("KOEN_OUTPUT_DIR") {
            self.output_dir = v;
        }
        if let Ok(v) = std::env::var("KOEN_MASTER_FILE") {
            self.master_file = v;
        }
    }

    /// Absolute or output-dir-relative location of the master table.
    pub fn master_path(&self) -> PathBuf {
        let p = Path::new(&self.master_file);
        if p.is_absolute() {
            p.to_path_buf()
        } else {
            Path::new(&self.output_dir).join(p)
        }
    }
}

// ---------------------------------------------------------------------------
// Target-date handling
// ---------------------------------------------------------------------------

/// Normalizes a target-date argument to the portal's 8-digit form.
/// Accepts `YYYYMMDD`, `YYYY-MM-DD` and `YYYY/MM/DD`; anything else is
/// an `InvalidDate`, including well-formed strings that are not real
/// calendar dates.
pub fn normalize_target_date(input: &str) -> Result<String, CollectError> {
    let compact: String = input
        .trim()
        .chars()
        .filter(|c| *c != '-' && *c != '/')
        .collect();
    if compact.len() != 8 || !compact.chars().all(|c| c.is_ascii_digit()) {
        return Err(CollectError::InvalidDate(input.to_string()));
    }
    // Reject e.g. 20240230 up front rather than at the portal.
    parse_compact_date(&compact)?;
    Ok(compact)
}

/// Parses a compact `YYYYMMDD` string into a date.
pub fn parse_compact_date(compact: &str) -> Result<NaiveDate, CollectError> {
    NaiveDate::parse_from_str(compact, "%Y%m%d")
        .map_err(|_| CollectError::InvalidDate(compact.to_string()))
}

/// Resolves the collection target: an explicit date argument in any
/// accepted form, or yesterday relative to `today` when absent.
///
/// `today` is injected rather than read from the clock so the daily
/// default is deterministic in tests.
pub fn resolve_target_date(
    arg: Option<&str>,
    today: NaiveDate,
) -> Result<NaiveDate, CollectError> {
    match arg {
        Some(raw) => {
            let compact = normalize_target_date(raw)?;
            parse_compact_date(&compact)
        }
        None => today
            .checked_sub_days(Days::new(1))
            .ok_or_else(|| CollectError::InvalidDate("today underflowed".to_string())),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
