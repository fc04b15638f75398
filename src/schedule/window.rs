//! Time window filtering and "most recently ended" marking.
//!
//! Both operations are pure: they take "now" as an argument and never touch
//! the clock, the store or the network.

use super::types::Program;
use chrono::round::RoundingError;
use chrono::{DateTime, DurationRound, TimeDelta, Utc};
use thiserror::Error;

/// Hours of schedule kept on each side of "now".
pub const WINDOW_HOURS: u32 = 11;

/// Failure to bring a timestamp down to whole-second resolution.
#[derive(Debug, Error)]
pub enum MarkingError {
    #[error("Failed to normalize current time: {0}")]
    Now(#[source] RoundingError),

    #[error("Failed to normalize timestamps of program #{index} '{title}': {source}")]
    Program {
        index: usize,
        title: String,
        #[source]
        source: RoundingError,
    },
}

fn whole_seconds(ts: DateTime<Utc>) -> Result<DateTime<Utc>, RoundingError> {
    ts.duration_trunc(TimeDelta::seconds(1))
}

/// Keeps the programs that start inside the window around `now`.
///
/// The distance from `now` to a program's start is counted in whole hours,
/// truncated toward zero. A program is kept when that count lies between
/// `-(window_hours + 1)` and `window_hours`, both inclusive, so a start
/// 11h59m ahead still counts as 11 hours. Relative order is preserved.
pub fn filter_window(programs: Vec<Program>, window_hours: u32, now: DateTime<Utc>) -> Vec<Program> {
    let ahead = i64::from(window_hours);
    let behind = -(i64::from(window_hours) + 1);

    let before = programs.len();
    let kept: Vec<Program> = programs
        .into_iter()
        .filter(|p| {
            let hours = (p.start_time - now).num_hours();
            (behind..=ahead).contains(&hours)
        })
        .collect();

    tracing::trace!(before, kept = kept.len(), window_hours, "Filtered schedule window");
    kept
}

/// Finds the program that ended most recently, at or before `now`.
///
/// The latest end time wins; equal end times fall back to the later start
/// time, then to the later position in the list. Returns `Ok(None)` for an
/// empty list or when nothing has ended yet.
///
/// # Errors
///
/// [`MarkingError`] if any timestamp cannot be truncated to whole seconds.
/// No index is guessed in that case.
pub fn mark_most_recently_ended(
    programs: &[Program],
    now: DateTime<Utc>,
) -> Result<Option<usize>, MarkingError> {
    let now = whole_seconds(now).map_err(MarkingError::Now)?;

    let mut best: Option<(usize, DateTime<Utc>, DateTime<Utc>)> = None;
    for (index, program) in programs.iter().enumerate() {
        let normalize = |ts| {
            whole_seconds(ts).map_err(|source| MarkingError::Program {
                index,
                title: program.title.clone(),
                source,
            })
        };
        let end = normalize(program.end_time)?;
        let start = normalize(program.start_time)?;

        if end > now {
            continue;
        }
        let replaces = match best {
            None => true,
            Some((_, best_end, best_start)) => (end, start) >= (best_end, best_start),
        };
        if replaces {
            best = Some((index, end, start));
        }
    }

    Ok(best.map(|(index, _, _)| index))
}
