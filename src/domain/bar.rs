//! OHLCV bar representation and the per-timeframe series built from it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Timeframe label → bars for one contract, ascending by timestamp.
pub type ContractSeries = BTreeMap<String, Vec<Bar>>;

/// Timeframe label → bars for the continuous instrument across rolls.
pub type StitchedSeries = BTreeMap<String, Vec<Bar>>;

/// Contract id → that contract's series.
pub type ContractFrames = BTreeMap<String, ContractSeries>;

/// First/last timestamps and row count of a bar slice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesSpan {
    pub rows: usize,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl SeriesSpan {
    pub fn of(bars: &[Bar]) -> Self {
        Self {
            rows: bars.len(),
            start: bars.iter().map(|b| b.timestamp).min(),
            end: bars.iter().map(|b| b.timestamp).max(),
        }
    }
}

/// Sort ascending by timestamp. Stable, so equal instants keep input order.
pub fn sort_by_time(bars: &mut [Bar]) {
    bars.sort_by_key(|b| b.timestamp);
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn bar_at(hour: u32, close: f64) -> Bar {
        Bar {
            timestamp: Utc.with_ymd_and_hms(2025, 3, 10, hour, 0, 0).unwrap(),
            open: close,
            high: close + 1.0,
            low: close - 1.0,
            close,
            volume: 100.0,
        }
    }

    #[test]
    fn span_of_unsorted_bars() {
        let bars = vec![bar_at(5, 1.0), bar_at(2, 2.0), bar_at(9, 3.0)];
        let span = SeriesSpan::of(&bars);
        assert_eq!(span.rows, 3);
        assert_eq!(span.start, Some(bars[1].timestamp));
        assert_eq!(span.end, Some(bars[2].timestamp));
    }

    #[test]
    fn span_of_empty() {
        let span = SeriesSpan::of(&[]);
        assert_eq!(span.rows, 0);
        assert!(span.start.is_none());
        assert!(span.end.is_none());
    }

    #[test]
    fn sort_is_stable_for_equal_instants() {
        let mut bars = vec![bar_at(4, 1.0), bar_at(1, 2.0), bar_at(4, 3.0)];
        sort_by_time(&mut bars);
        assert_eq!(bars[0].close, 2.0);
        assert_eq!(bars[1].close, 1.0);
        assert_eq!(bars[2].close, 3.0);
    }
}
