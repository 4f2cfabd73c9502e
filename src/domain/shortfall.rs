//! Coverage accounting: actual row counts against configured targets.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShortfallEntry {
    pub actual: usize,
    pub target: usize,
    pub met: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ShortfallReport {
    pub timeframes: BTreeMap<String, ShortfallEntry>,
    /// Contracts that returned no data, so later runs can skip them.
    pub empty_contracts: BTreeSet<String>,
}

impl ShortfallReport {
    /// Timeframes whose actual count fell below target.
    pub fn shortfalls(&self) -> impl Iterator<Item = (&String, &ShortfallEntry)> {
        self.timeframes.iter().filter(|(_, e)| !e.met)
    }

    pub fn all_met(&self) -> bool {
        self.timeframes.values().all(|e| e.met)
    }
}

/// Compare final row counts with targets.
///
/// Timeframes without a target get no entry.
pub fn build_shortfall_report<I>(
    counts: &BTreeMap<String, usize>,
    targets: &BTreeMap<String, usize>,
    empty_contracts: I,
) -> ShortfallReport
where
    I: IntoIterator<Item = String>,
{
    let timeframes = counts
        .iter()
        .filter_map(|(tf, &actual)| {
            targets.get(tf).map(|&target| {
                (
                    tf.clone(),
                    ShortfallEntry {
                        actual,
                        target,
                        met: actual >= target,
                    },
                )
            })
        })
        .collect();

    ShortfallReport {
        timeframes,
        empty_contracts: empty_contracts.into_iter().collect(),
    }
}
