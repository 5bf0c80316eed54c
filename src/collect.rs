//! Paced, sessioned collection across planned windows.
//!
//! Drives planner -> fetcher -> validator for each window in order,
//! persists accepted payloads as per-window CSV artifacts, and pauses
//! between windows to stay under the portal's undocumented rate limit.
//! Windows are strictly sequential: the fetcher's session continuity
//! depends on the previous window's requests having completed.
//!
//! Transport failures abort the remaining windows; content rejections
//! and unparseable payloads are reported and skipped so a run can make
//! partial progress.

use chrono::NaiveDate;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::config::CollectorConfig;
use crate::ingest::koenergy::WindowFetcher;
use crate::ingest::validate::{self, WindowPayload};
use crate::logging::{self, Component};
use crate::model::{CollectError, DateWindow, FetchFilters};
use crate::plants;
use crate::windows;

// ---------------------------------------------------------------------------
// Delay abstraction
// ---------------------------------------------------------------------------

/// Injectable pacing seam so tests never actually sleep.
pub trait Delay {
    fn pause(&mut self, duration: Duration);
}

/// Real pacing: blocks the collection thread.
pub struct StdDelay;

impl Delay for StdDelay {
    fn pause(&mut self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

// ---------------------------------------------------------------------------
// Run outcomes
// ---------------------------------------------------------------------------

/// What one window produced.
#[derive(Debug, Clone, Serialize)]
pub enum WindowOutcome {
    /// Accepted and persisted.
    Saved {
        path: String,
        rows: usize,
        bytes: usize,
    },
    /// Wrong declared format; nothing persisted.
    Rejected { content_type: String },
    /// Declared CSV but did not parse; nothing persisted.
    Unparseable { detail: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct WindowReport {
    pub window: DateWindow,
    pub outcome: WindowOutcome,
}

/// Serializable summary of a whole run, for the observability boundary.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub windows_planned: usize,
    pub saved: usize,
    pub rejected: usize,
    pub unparseable: usize,
    pub reports: Vec<WindowReport>,
}

impl RunSummary {
    fn from_reports(reports: Vec<WindowReport>) -> Self {
        let mut summary = RunSummary {
            windows_planned: reports.len(),
            saved: 0,
            rejected: 0,
            unparseable: 0,
            reports,
        };
        for report in &summary.reports {
            match report.outcome {
                WindowOutcome::Saved { .. } => summary.saved += 1,
                WindowOutcome::Rejected { .. } => summary.rejected += 1,
                WindowOutcome::Unparseable { .. } => summary.unparseable += 1,
            }
        }
        summary
    }

    pub fn all_saved(&self) -> bool {
        self.saved == self.windows_planned
    }

    /// Paths of the artifacts this run persisted, in window order.
    pub fn artifact_paths(&self) -> Vec<&str> {
        self.reports
            .iter()
            .filter_map(|r| match &r.outcome {
                WindowOutcome::Saved { path, .. } => Some(path.as_str()),
                _ => None,
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Artifact naming
// ---------------------------------------------------------------------------

/// Filter tag for artifact filenames: `전체` when nothing is filtered,
/// otherwise the org code (or `ALLORG`) plus the unit range.
pub fn file_tag(filters: &FetchFilters) -> String {
    if filters.org_no.is_none() && filters.hoki_s.is_none() && filters.hoki_e.is_none() {
        return "전체".to_string();
    }
    let mut parts = vec![filters
        .org_no
        .clone()
        .unwrap_or_else(|| "ALLORG".to_string())];
    if filters.hoki_s.is_some() || filters.hoki_e.is_some() {
        let hs = filters.hoki_s.as_deref().unwrap_or("ALL");
        let he = filters.hoki_e.as_deref().unwrap_or("ALL");
        parts.push(format!("H{}-{}", hs, he));
    }
    parts.join("_")
}

/// Collapses anything outside `[alphanumeric _ - . ]` (Hangul counts as
/// alphanumeric) into single underscores and caps the length, so filter
/// values can never escape the output directory or exceed filesystem
/// limits.
pub fn sanitize_filename(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut pending_sep = false;
    for c in name.trim().chars() {
        if c.is_alphanumeric() || matches!(c, '-' | '.' | '_') {
            if pending_sep && !out.is_empty() {
                out.push('_');
            }
            pending_sep = false;
            out.push(c);
        } else {
            pending_sep = true;
        }
    }
    out.chars().take(180).collect()
}

fn artifact_name(prefix: &str, tag: &str, window: &DateWindow) -> String {
    sanitize_filename(&format!("{}_{}_{}.csv", prefix, tag, window.label()))
}

// ---------------------------------------------------------------------------
// Collection run
// ---------------------------------------------------------------------------

/// Collects every window of `[start, end]` in order through `fetcher`,
/// pausing `cfg.pacing_secs` between windows (not after the last).
///
/// Returns the run summary, or the first fatal error. Artifacts already
/// persisted before a fatal error are kept.
pub fn run_collection(
    cfg: &CollectorConfig,
    filters: &FetchFilters,
    start: NaiveDate,
    end: NaiveDate,
    fetcher: &mut dyn WindowFetcher,
    delay: &mut dyn Delay,
) -> Result<RunSummary, CollectError> {
    let planned = windows::plan(start, end)?;
    let total = planned.len();

    logging::info(
        Component::Collector,
        None,
        &format!("{} window(s) planned for {}~{}", total, start, end),
    );
    for (i, window) in planned.iter().enumerate() {
        logging::debug(
            Component::Collector,
            None,
            &format!("  {:>2}. {}", i + 1, window),
        );
    }

    if let Some(code) = &filters.org_no {
        if !plants::is_known_code(code) {
            logging::warn(
                Component::Collector,
                None,
                &format!(
                    "org code '{}' is not in the plant registry; sending it anyway",
                    code
                ),
            );
        }
    }

    fs::create_dir_all(&cfg.output_dir).map_err(|e| {
        CollectError::Io(format!(
            "failed to create output dir {}: {}",
            cfg.output_dir, e
        ))
    })?;

    let tag = file_tag(filters);
    let mut reports = Vec::with_capacity(total);

    for (idx, window) in planned.iter().enumerate() {
        let raw = fetcher.fetch_window(filters, window)?;

        let outcome = match validate::classify(window, &raw) {
            WindowPayload::Accepted(batch) => {
                let path = Path::new(&cfg.output_dir).join(artifact_name(
                    &cfg.file_prefix,
                    &tag,
                    window,
                ));
                fs::write(&path, &raw.body).map_err(|e| {
                    CollectError::Io(format!("failed to write {}: {}", path.display(), e))
                })?;
                logging::info(
                    Component::Collector,
                    Some(&window.to_string()),
                    &format!(
                        "({}/{}) saved {} ({} rows, {} bytes)",
                        idx + 1,
                        total,
                        path.display(),
                        batch.len(),
                        raw.body.len()
                    ),
                );
                WindowOutcome::Saved {
                    path: path.to_string_lossy().into_owned(),
                    rows: batch.len(),
                    bytes: raw.body.len(),
                }
            }
            WindowPayload::Rejected {
                content_type,
                diagnostic,
            } => {
                logging::log_window_failure(&window.to_string(), "fetch", &diagnostic);
                WindowOutcome::Rejected { content_type }
            }
            WindowPayload::Unparseable { detail } => {
                logging::log_window_failure(&window.to_string(), "parse", &detail);
                WindowOutcome::Unparseable { detail }
            }
        };
        reports.push(WindowReport {
            window: *window,
            outcome,
        });

        if idx + 1 < total {
            logging::debug(
                Component::Collector,
                None,
                &format!("pacing {}s before next window", cfg.pacing_secs),
            );
            delay.pause(Duration::from_secs(cfg.pacing_secs));
        }
    }

    let summary = RunSummary::from_reports(reports);
    logging::log_run_summary(
        summary.windows_planned,
        summary.saved,
        summary.rejected,
        summary.unparseable,
    );
    Ok(summary)
}

/// Writes the run summary as JSON next to the artifacts, named after the
/// run's overall bounds.
pub fn write_report(cfg: &CollectorConfig, summary: &RunSummary) -> Result<PathBuf, CollectError> {
    let label = match (summary.reports.first(), summary.reports.last()) {
        (Some(first), Some(last)) => DateWindow {
            start: first.window.start,
            end: last.window.end,
        }
        .label(),
        _ => "empty".to_string(),
    };
    let path = Path::new(&cfg.output_dir)
        .join(sanitize_filename(&format!("{}_report_{}.json", cfg.file_prefix, label)));
    let json = serde_json::to_string_pretty(summary)
        .map_err(|e| CollectError::Io(format!("failed to encode run report: {}", e)))?;
    fs::write(&path, json)
        .map_err(|e| CollectError::Io(format!("failed to write {}: {}", path.display(), e)))?;
    Ok(path)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
