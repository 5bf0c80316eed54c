//! Idempotent master-table merge.
//!
//! Folds a freshly collected batch into the accumulated master table
//! without duplicating rows seen on earlier runs. Identity is a
//! composite key resolved once per merge from the columns both tables
//! actually have: `date + station_name + hour` when all three are
//! present on both sides, `date + station_name` as the fallback, and no
//! dedup at all (with a logged warning) when even those are missing.
//!
//! Dedup is set membership on the key, not value equality: a row whose
//! key exists in the master is skipped even if its measured values
//! differ, so re-running a collection is a no-op. The master is kept
//! sorted ascending by timestamp and persisted with a UTF-8 BOM so
//! Korean station names survive round-trips through spreadsheet tools.
//!
//! The engine assumes a single writer per master table; concurrent
//! merges into the same file are the caller's race to serialize.

use std::collections::HashSet;
use std::fs;
use std::io::Write;
use std::path::Path;

use crate::ingest::validate::parse_batch;
use crate::logging::{self, Component};
use crate::model::{Batch, MergeError, MergeOutcome, Record, Schema};

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

/// Key-component separator; never appears in cell data.
const KEY_SEP: char = '\u{1f}';

// ---------------------------------------------------------------------------
// Key resolution
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KeyColumns {
    DateStationHour,
    DateStation,
    None,
}

/// Resolves the identity-key columns available on BOTH tables,
/// evaluated once per merge call.
fn resolve_key_columns(batch: &Schema, master: &Schema) -> KeyColumns {
    let date_both = batch.date_col.is_some() && master.date_col.is_some();
    let station_both = batch.station_col.is_some() && master.station_col.is_some();
    let hour_both = batch.hour_col.is_some() && master.hour_col.is_some();

    if date_both && station_both && hour_both {
        KeyColumns::DateStationHour
    } else if date_both && station_both {
        KeyColumns::DateStation
    } else {
        KeyColumns::None
    }
}

/// Composite identity key for one record, `None` when dedup is bypassed.
///
/// The date component uses the cached timestamp parse when available so
/// that `2024-01-01` and `2024-01-01 00:00:00` produce the same key;
/// digit-only hour values normalize numerically for the same reason
/// (`01` and `1` are one hour).
fn key_of(record: &Record, schema: &Schema, cols: KeyColumns) -> Option<String> {
    let cell = |idx: Option<usize>| {
        idx.and_then(|i| record.cells.get(i))
            .map(|s| s.trim())
            .unwrap_or("")
    };
    let date_part = match record.timestamp {
        Some(ts) => ts.format("%Y-%m-%d %H:%M:%S").to_string(),
        None => cell(schema.date_col).to_string(),
    };

    match cols {
        KeyColumns::DateStationHour => Some(format!(
            "{}{}{}{}{}",
            date_part,
            KEY_SEP,
            cell(schema.station_col),
            KEY_SEP,
            normalize_hour(cell(schema.hour_col)),
        )),
        KeyColumns::DateStation => {
            Some(format!("{}{}{}", date_part, KEY_SEP, cell(schema.station_col)))
        }
        KeyColumns::None => None,
    }
}

fn normalize_hour(cell: &str) -> String {
    match cell.parse::<u32>() {
        Ok(h) => h.to_string(),
        Err(_) => cell.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Column alignment
// ---------------------------------------------------------------------------

/// Master columns first, batch-only columns appended on the right.
/// Returns the combined schema and, for each combined column, where it
/// lives in the batch.
fn align_columns(master: &Schema, batch: &Schema) -> (Schema, Vec<Option<usize>>) {
    let mut headers = master.headers.clone();
    for h in &batch.headers {
        if !headers.iter().any(|m| m == h) {
            headers.push(h.clone());
        }
    }
    let batch_pos = headers
        .iter()
        .map(|h| batch.headers.iter().position(|b| b == h))
        .collect();
    (Schema::from_headers(headers), batch_pos)
}

// ---------------------------------------------------------------------------
// Merge
// ---------------------------------------------------------------------------

/// Folds `batch` into `master`. With no master, the batch itself (sorted)
/// becomes the master. Applying the same batch twice yields `added = 0`
/// the second time.
pub fn merge_batches(batch: Batch, master: Option<Batch>) -> (Batch, MergeOutcome) {
    let mut result = match master {
        None => {
            let added = batch.len();
            let mut table = batch;
            sort_by_timestamp(&mut table.records);
            let outcome = MergeOutcome {
                added,
                skipped: 0,
                total: table.len(),
            };
            return (table, outcome);
        }
        Some(m) => m,
    };

    let cols = resolve_key_columns(&batch.schema, &result.schema);
    if cols == KeyColumns::None {
        logging::warn(
            Component::Merge,
            None,
            "identity columns missing on one side; dedup bypassed, every incoming row treated as new",
        );
    }

    let seen: HashSet<String> = result
        .records
        .iter()
        .filter_map(|r| key_of(r, &result.schema, cols))
        .collect();

    let (merged_schema, batch_pos) = align_columns(&result.schema, &batch.schema);
    if merged_schema.headers.len() > result.schema.headers.len() {
        let extra = merged_schema.headers.len() - result.schema.headers.len();
        for rec in &mut result.records {
            rec.cells.extend(std::iter::repeat(String::new()).take(extra));
        }
    }

    let mut added = 0usize;
    let mut skipped = 0usize;
    for rec in batch.records {
        match key_of(&rec, &batch.schema, cols) {
            // Set membership, not value equality: the existing row wins.
            Some(key) if seen.contains(&key) => skipped += 1,
            _ => {
                let cells = batch_pos
                    .iter()
                    .map(|pos| {
                        pos.and_then(|i| rec.cells.get(i).cloned())
                            .unwrap_or_default()
                    })
                    .collect();
                result.records.push(Record {
                    timestamp: rec.timestamp,
                    cells,
                });
                added += 1;
            }
        }
    }

    result.schema = merged_schema;
    sort_by_timestamp(&mut result.records);
    let outcome = MergeOutcome {
        added,
        skipped,
        total: result.len(),
    };
    (result, outcome)
}

/// Stable ascending sort by parsed timestamp. Ties keep their relative
/// order; rows with no parseable timestamp go last, order preserved.
fn sort_by_timestamp(records: &mut [Record]) {
    records.sort_by(|a, b| match (a.timestamp, b.timestamp) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    });
}

// ---------------------------------------------------------------------------
// File boundary
// ---------------------------------------------------------------------------

/// Reads a CSV table (batch or master) from disk.
pub fn read_table(path: &Path) -> Result<Batch, MergeError> {
    let bytes = fs::read(path)?;
    parse_batch(&bytes).map_err(MergeError::Csv)
}

/// Persists a table with a leading UTF-8 BOM.
pub fn write_table(path: &Path, table: &Batch) -> Result<(), MergeError> {
    let mut file = fs::File::create(path)?;
    file.write_all(UTF8_BOM)?;
    let mut writer = csv::Writer::from_writer(file);
    writer.write_record(&table.schema.headers)?;
    for rec in &table.records {
        writer.write_record(&rec.cells)?;
    }
    writer.flush()?;
    Ok(())
}

/// Merges the batch at `new_path` into the master table at `master_path`,
/// creating the master if absent, and persists the result as the new
/// ground truth.
pub fn merge_files(new_path: &Path, master_path: &Path) -> Result<MergeOutcome, MergeError> {
    if !new_path.exists() {
        return Err(MergeError::MissingBatch(new_path.display().to_string()));
    }
    let batch = read_table(new_path)?;
    logging::info(
        Component::Merge,
        None,
        &format!("new batch {}: {} rows", new_path.display(), batch.len()),
    );

    let master = if master_path.exists() {
        let m = read_table(master_path)?;
        logging::info(
            Component::Merge,
            None,
            &format!("existing master {}: {} rows", master_path.display(), m.len()),
        );
        Some(m)
    } else {
        logging::info(
            Component::Merge,
            None,
            &format!("master {} does not exist; creating it", master_path.display()),
        );
        None
    };

    let (table, outcome) = merge_batches(batch, master);
    write_table(master_path, &table)?;

    if outcome.skipped > 0 {
        // Skipped rows may carry corrected values that are being
        // discarded in favor of what the master already holds. Keep
        // that visible without re-running.
        logging::warn(
            Component::Merge,
            None,
            &format!(
                "{} duplicate row(s) skipped; existing master values retained",
                outcome.skipped
            ),
        );
    }
    logging::info(
        Component::Merge,
        None,
        &format!(
            "merge complete: {} added, {} skipped, {} total",
            outcome.added, outcome.skipped, outcome.total
        ),
    );
    Ok(outcome)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn batch(text: &str) -> Batch {
        parse_batch(text.as_bytes()).expect("test CSV should parse")
    }

    fn timestamps(table: &Batch) -> Vec<String> {
        let date_col = table.schema.date_col.unwrap();
        table
            .records
            .iter()
            .map(|r| r.cells[date_col].clone())
            .collect()
    }

    #[test]
    fn test_first_merge_without_master_keeps_everything() {
        let b = batch("date,station_name,hour,mwh\n2024-01-02,A,1,5\n2024-01-01,A,1,3\n");
        let (table, outcome) = merge_batches(b, None);
        assert_eq!(outcome.added, 2);
        assert_eq!(outcome.skipped, 0);
        assert_eq!(outcome.total, 2);
        assert_eq!(
            timestamps(&table),
            vec!["2024-01-01", "2024-01-02"],
            "first merge must still establish the sort invariant"
        );
    }

    #[test]
    fn test_duplicate_key_skipped_new_key_added() {
        let master = batch("date,station_name,hour,mwh\n2024-01-01,A,1,3\n");
        let new = batch("date,station_name,hour,mwh\n2024-01-01,A,1,3\n2024-01-01,A,2,4\n");
        let (_, outcome) = merge_batches(new, Some(master));
        assert_eq!(outcome.added, 1);
        assert_eq!(outcome.skipped, 1);
        assert_eq!(outcome.total, 2);
    }

    #[test]
    fn test_duplicate_key_with_changed_value_keeps_existing_row() {
        let master = batch("date,station_name,hour,mwh\n2024-01-01,A,1,3\n");
        let new = batch("date,station_name,hour,mwh\n2024-01-01,A,1,999\n");
        let (table, outcome) = merge_batches(new, Some(master));
        assert_eq!(outcome.added, 0);
        assert_eq!(outcome.skipped, 1);
        assert_eq!(
            table.records[0].cells[3], "3",
            "dedup is key membership, not value equality; the master's value wins"
        );
    }

    #[test]
    fn test_merging_the_same_batch_twice_adds_nothing() {
        let b1 = batch("date,station_name,hour,mwh\n2024-01-01,A,1,3\n2024-01-01,B,1,7\n");
        let b2 = b1.clone();
        let (master, first) = merge_batches(b1, None);
        assert_eq!(first.added, 2);
        let (_, second) = merge_batches(b2, Some(master));
        assert_eq!(second.added, 0, "re-applying a batch must be a no-op");
        assert_eq!(second.skipped, 2);
        assert_eq!(second.total, 2);
    }

    #[test]
    fn test_disjoint_batches_accumulate() {
        let b1 = batch("date,station_name,hour,mwh\n2024-01-01,A,1,3\n");
        let b2 = batch("date,station_name,hour,mwh\n2024-01-02,A,1,4\n2024-01-02,B,1,5\n");
        let (master, _) = merge_batches(b1, None);
        let (_, outcome) = merge_batches(b2, Some(master));
        assert_eq!(outcome.added, 2);
        assert_eq!(outcome.total, 3);
    }

    #[test]
    fn test_fallback_to_date_station_when_hour_missing_on_one_side() {
        // Master has no hour column, so the key degrades to
        // date + station_name and the batch's two hours collapse into
        // one already-present key.
        let master = batch("date,station_name,mwh\n2024-01-01,A,3\n");
        let new = batch("date,station_name,hour,mwh\n2024-01-01,A,1,4\n2024-01-01,A,2,5\n");
        let (_, outcome) = merge_batches(new, Some(master));
        assert_eq!(outcome.added, 0);
        assert_eq!(outcome.skipped, 2);
    }

    #[test]
    fn test_dedup_bypassed_when_station_column_missing() {
        let master = batch("date,mwh\n2024-01-01,3\n");
        let new = batch("date,mwh\n2024-01-01,3\n2024-01-01,3\n");
        let (_, outcome) = merge_batches(new, Some(master));
        assert_eq!(
            outcome.added, 2,
            "without identity columns every incoming row is treated as new"
        );
        assert_eq!(outcome.skipped, 0);
    }

    #[test]
    fn test_date_only_and_midnight_forms_collide() {
        let master = batch("date,station_name,mwh\n2024-01-01,A,3\n");
        let new = batch("date,station_name,mwh\n2024-01-01 00:00:00,A,3\n");
        let (_, outcome) = merge_batches(new, Some(master));
        assert_eq!(outcome.skipped, 1, "mixed datetime formats must key identically");
    }

    #[test]
    fn test_zero_padded_hour_collides_with_plain_hour() {
        let master = batch("date,station_name,hour,mwh\n2024-01-01,A,01,3\n");
        let new = batch("date,station_name,hour,mwh\n2024-01-01,A,1,3\n");
        let (_, outcome) = merge_batches(new, Some(master));
        assert_eq!(outcome.skipped, 1);
    }

    #[test]
    fn test_master_stays_sorted_by_timestamp() {
        let master = batch(
            "date,station_name,mwh\n2024-01-01,A,1\n2024-03-01,A,3\n",
        );
        let new = batch("date,station_name,mwh\n2024-02-01,A,2\n2023-12-31,A,0\n");
        let (table, _) = merge_batches(new, Some(master));
        assert_eq!(
            timestamps(&table),
            vec!["2023-12-31", "2024-01-01", "2024-02-01", "2024-03-01"]
        );
    }

    #[test]
    fn test_equal_timestamps_keep_relative_input_order() {
        let master = batch("date,station_name,mwh\n2024-01-01,first,1\n2024-01-01,second,2\n");
        let new = batch("date,station_name,mwh\n2024-01-01,third,3\n");
        let (table, _) = merge_batches(new, Some(master));
        let station = table.schema.station_col.unwrap();
        let names: Vec<_> = table.records.iter().map(|r| r.cells[station].as_str()).collect();
        assert_eq!(names, vec!["first", "second", "third"], "sort must be stable");
    }

    #[test]
    fn test_unparseable_dates_sort_last_in_input_order() {
        let master = batch("date,station_name,mwh\n2024-01-01,A,1\n");
        let new = batch("date,station_name,mwh\nbogus-a,A,1\nbogus-b,A,2\n");
        let (table, _) = merge_batches(new, Some(master));
        assert_eq!(timestamps(&table), vec!["2024-01-01", "bogus-a", "bogus-b"]);
    }

    #[test]
    fn test_batch_only_columns_are_appended_and_backfilled() {
        let master = batch("date,station_name,mwh\n2024-01-01,A,3\n");
        let new = batch("date,station_name,mwh,temp\n2024-01-02,A,4,21.5\n");
        let (table, outcome) = merge_batches(new, Some(master));
        assert_eq!(outcome.added, 1);
        assert_eq!(table.schema.headers, vec!["date", "station_name", "mwh", "temp"]);
        assert_eq!(table.records[0].cells, vec!["2024-01-01", "A", "3", ""]);
        assert_eq!(table.records[1].cells, vec!["2024-01-02", "A", "4", "21.5"]);
    }

    #[test]
    fn test_batch_cells_are_reordered_to_master_columns() {
        let master = batch("date,station_name,mwh\n2024-01-01,A,3\n");
        let new = batch("station_name,mwh,date\nB,9,2024-01-02\n");
        let (table, _) = merge_batches(new, Some(master));
        assert_eq!(table.records[1].cells, vec!["2024-01-02", "B", "9"]);
    }
}
