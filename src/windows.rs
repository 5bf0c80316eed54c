//! Calendar-month window planning.
//!
//! The portal serves at most one month of data per request, so an
//! arbitrary date range must be split into month-aligned windows before
//! the network phase. Planning is pure and deterministic: no clock, no
//! I/O, safe to unit test in isolation.

use chrono::{Datelike, NaiveDate};

use crate::model::{CollectError, DateWindow};

// ---------------------------------------------------------------------------
// Planner
// ---------------------------------------------------------------------------

/// Splits `[start, end]` into ordered, contiguous, calendar-month-aligned
/// windows covering the range exactly once.
///
/// The first and last windows may be partial months; every interior
/// window is a whole calendar month. Fails with `InvalidRange` when
/// `end` is before `start`.
pub fn plan(start: NaiveDate, end: NaiveDate) -> Result<Vec<DateWindow>, CollectError> {
    if end < start {
        return Err(CollectError::InvalidRange { start, end });
    }

    let mut windows = Vec::new();
    let mut cursor = start;
    while cursor <= end {
        let me = month_end(cursor);
        let window_end = if me <= end { me } else { end };
        windows.push(DateWindow {
            start: cursor,
            end: window_end,
        });
        match window_end.succ_opt() {
            Some(next) => cursor = next,
            None => break, // end of the calendar; range is fully covered
        }
    }
    Ok(windows)
}

/// Last day of the month containing `day`.
fn month_end(day: NaiveDate) -> NaiveDate {
    let first_of_next = if day.month() == 12 {
        NaiveDate::from_ymd_opt(day.year() + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(day.year(), day.month() + 1, 1)
    };
    // The first of a month always exists; fall back to the input so the
    // planner cannot loop backwards even if it somehow did not.
    first_of_next.and_then(|d| d.pred_opt()).unwrap_or(day)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_single_month_range_is_one_window() {
        let windows = plan(d(2025, 11, 1), d(2025, 11, 30)).unwrap();
        assert_eq!(windows.len(), 1);
        assert_eq!(windows[0].start, d(2025, 11, 1));
        assert_eq!(windows[0].end, d(2025, 11, 30));
    }

    #[test]
    fn test_range_spilling_one_day_into_next_month() {
        // The documented reference case: one full month plus one day.
        let windows = plan(d(2025, 11, 1), d(2025, 12, 1)).unwrap();
        assert_eq!(windows.len(), 2);
        assert_eq!(windows[0].start, d(2025, 11, 1));
        assert_eq!(windows[0].end, d(2025, 11, 30));
        assert_eq!(windows[1].start, d(2025, 12, 1));
        assert_eq!(windows[1].end, d(2025, 12, 1));
    }

    #[test]
    fn test_single_day_range_is_one_window() {
        let windows = plan(d(2024, 6, 15), d(2024, 6, 15)).unwrap();
        assert_eq!(windows.len(), 1);
        assert_eq!(windows[0].start, windows[0].end);
    }

    #[test]
    fn test_mid_month_start_and_end() {
        // Partial first and last windows, whole months in between.
        let windows = plan(d(2024, 1, 15), d(2024, 3, 10)).unwrap();
        assert_eq!(windows.len(), 3);
        assert_eq!(windows[0].start, d(2024, 1, 15));
        assert_eq!(windows[0].end, d(2024, 1, 31));
        assert_eq!(windows[1].start, d(2024, 2, 1));
        assert_eq!(windows[1].end, d(2024, 2, 29), "2024 is a leap year");
        assert_eq!(windows[2].start, d(2024, 3, 1));
        assert_eq!(windows[2].end, d(2024, 3, 10));
    }

    #[test]
    fn test_december_to_january_crossing() {
        let windows = plan(d(2023, 12, 20), d(2024, 1, 5)).unwrap();
        assert_eq!(windows.len(), 2);
        assert_eq!(windows[0].end, d(2023, 12, 31));
        assert_eq!(windows[1].start, d(2024, 1, 1));
        assert_eq!(windows[1].end, d(2024, 1, 5));
    }

    #[test]
    fn test_windows_are_contiguous_and_cover_the_range() {
        // Contiguity: next.start is exactly one day after previous.end.
        // Coverage: total day count equals the span of the range.
        let start = d(2023, 2, 17);
        let end = d(2024, 5, 3);
        let windows = plan(start, end).unwrap();

        assert_eq!(windows.first().unwrap().start, start);
        assert_eq!(windows.last().unwrap().end, end);
        for pair in windows.windows(2) {
            assert_eq!(
                pair[1].start,
                pair[0].end.succ_opt().unwrap(),
                "windows must be contiguous with no gap or overlap"
            );
        }

        let covered: i64 = windows
            .iter()
            .map(|w| (w.end - w.start).num_days() + 1)
            .sum();
        assert_eq!(covered, (end - start).num_days() + 1);
    }

    #[test]
    fn test_every_interior_window_is_a_whole_month() {
        let windows = plan(d(2023, 1, 10), d(2023, 6, 20)).unwrap();
        for w in &windows[1..windows.len() - 1] {
            assert_eq!(w.start.day(), 1, "interior window must start on the 1st");
            assert_eq!(
                w.end,
                month_end(w.start),
                "interior window must run to month end"
            );
        }
    }

    #[test]
    fn test_inverted_range_fails_with_invalid_range() {
        let err = plan(d(2025, 12, 1), d(2025, 11, 1)).unwrap_err();
        assert_eq!(
            err,
            CollectError::InvalidRange {
                start: d(2025, 12, 1),
                end: d(2025, 11, 1),
            }
        );
    }

    #[test]
    fn test_month_end_handles_december_and_february() {
        assert_eq!(month_end(d(2023, 12, 5)), d(2023, 12, 31));
        assert_eq!(month_end(d(2023, 2, 1)), d(2023, 2, 28));
        assert_eq!(month_end(d(2024, 2, 1)), d(2024, 2, 29));
        assert_eq!(month_end(d(2024, 4, 30)), d(2024, 4, 30));
    }
}
