//! Merging per-contract series into one continuous series.
//!
//! Sources are always given newest contract first. On a roll overlap the
//! newest contract's bar for an instant is the one that survives.

use crate::domain::bar::{sort_by_time, Bar};
use chrono::{DateTime, Duration, Utc};

/// Oldest instant kept for a lookback of `days_back` days, if any.
pub fn lookback_cutoff(now: DateTime<Utc>, days_back: Option<u32>) -> Option<DateTime<Utc>> {
    days_back.map(|days| now - Duration::days(i64::from(days)))
}

/// Drop bars strictly older than `cutoff`.
pub fn trim_to_cutoff(bars: &mut Vec<Bar>, cutoff: Option<DateTime<Utc>>) {
    if let Some(cutoff) = cutoff {
        bars.retain(|b| b.timestamp >= cutoff);
    }
}

/// Keep at most `target` bars, dropping from the oldest end.
pub fn cap_to_recent(bars: &mut Vec<Bar>, target: Option<usize>) {
    if let Some(target) = target {
        if bars.len() > target {
            bars.drain(..bars.len() - target);
        }
    }
}

/// Concatenate newest-first, sort ascending, keep the first bar per instant.
pub fn merge_newest_first<'a, I>(sources: I) -> Vec<Bar>
where
    I: IntoIterator<Item = &'a [Bar]>,
{
    let mut merged: Vec<Bar> = sources.into_iter().flatten().cloned().collect();
    sort_by_time(&mut merged);
    merged.dedup_by_key(|b| b.timestamp);
    merged
}

/// Full stitch for one timeframe: merge, apply the lookback, cap to target.
pub fn stitch<'a, I>(sources: I, cutoff: Option<DateTime<Utc>>, target: Option<usize>) -> Vec<Bar>
where
    I: IntoIterator<Item = &'a [Bar]>,
{
    let mut merged = merge_newest_first(sources);
    trim_to_cutoff(&mut merged, cutoff);
    cap_to_recent(&mut merged, target);
    merged
}
