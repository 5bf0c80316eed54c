//! Windowed collection of KOEN plant-generation data and idempotent
//! merging into a single master dataset.
//!
//! A run plans calendar-month windows over the requested range, fetches
//! each window through one cookie-carrying session with fixed pacing,
//! validates and persists per-window CSV artifacts, then folds them into
//! the deduplicated, time-sorted master table.

pub mod collect;
pub mod config;
pub mod ingest;
pub mod logging;
pub mod merge;
pub mod model;
pub mod plants;
pub mod windows;
