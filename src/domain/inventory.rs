//! Data inventory: what a stitch run produced, checked against targets and
//! against the previous run.

use crate::domain::bar::{ContractFrames, SeriesSpan, StitchedSeries};
use crate::domain::shortfall::ShortfallReport;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

pub const DEFAULT_WARN_THRESHOLD: f64 = 0.9;

/// Timeframe → contract id → span.
pub type ContractSummary = BTreeMap<String, BTreeMap<String, SeriesSpan>>;

/// Spans of every per-contract series, keyed by timeframe first.
pub fn summarize_contracts(frames: &ContractFrames) -> ContractSummary {
    let mut summary = ContractSummary::new();
    for (contract_id, series) in frames {
        for (tf, bars) in series {
            summary
                .entry(tf.clone())
                .or_default()
                .insert(contract_id.clone(), SeriesSpan::of(bars));
        }
    }
    summary
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataInventory {
    pub as_of: DateTime<Utc>,
    pub days_back: Option<u32>,
    pub warn_threshold: f64,
    /// Stitched series spans. Empty timeframes are left out.
    pub timeframes: BTreeMap<String, SeriesSpan>,
    pub contracts: ContractSummary,
    pub shortfalls: ShortfallReport,
}

impl DataInventory {
    pub fn from_run(
        as_of: DateTime<Utc>,
        days_back: Option<u32>,
        warn_threshold: f64,
        stitched: &StitchedSeries,
        contracts: ContractSummary,
        shortfalls: &ShortfallReport,
    ) -> Self {
        let timeframes = stitched
            .iter()
            .filter(|(_, bars)| !bars.is_empty())
            .map(|(tf, bars)| (tf.clone(), SeriesSpan::of(bars)))
            .collect();

        Self {
            as_of,
            days_back,
            warn_threshold,
            timeframes,
            contracts,
            shortfalls: shortfalls.clone(),
        }
    }

    pub fn rows(&self, timeframe: &str) -> usize {
        self.timeframes.get(timeframe).map_or(0, |s| s.rows)
    }

    fn contract_pairs(&self) -> BTreeSet<(String, String)> {
        self.contracts
            .iter()
            .flat_map(|(tf, ids)| ids.keys().map(move |id| (tf.clone(), id.clone())))
            .collect()
    }
}

/// Previous inventory kept as the baseline for the next validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryHistory {
    pub captured_at: DateTime<Utc>,
    pub timeframes: BTreeMap<String, usize>,
    /// Sorted (timeframe, contract id) pairs.
    pub contracts: Vec<(String, String)>,
}

impl InventoryHistory {
    pub fn from_inventory(inventory: &DataInventory, captured_at: DateTime<Utc>) -> Self {
        Self {
            captured_at,
            timeframes: inventory
                .timeframes
                .iter()
                .map(|(tf, span)| (tf.clone(), span.rows))
                .collect(),
            contracts: inventory.contract_pairs().into_iter().collect(),
        }
    }
}

/// Human-readable inventory problems. Empty means healthy.
pub fn validate_inventory(
    inventory: &DataInventory,
    target_bars: &BTreeMap<String, usize>,
    warn_threshold: f64,
    baseline: Option<&InventoryHistory>,
) -> Vec<String> {
    let mut issues = Vec::new();

    for (tf, &target) in target_bars {
        let actual = inventory.rows(tf);
        let threshold = (target as f64 * warn_threshold).floor() as usize;
        if actual < threshold {
            issues.push(format!(
                "Timeframe {tf}: {actual} bars below threshold {threshold} (target {target})"
            ));
        }

        if let Some(previous) = baseline.and_then(|b| b.timeframes.get(tf)).copied() {
            if previous > 0 && actual < previous {
                issues.push(format!(
                    "Timeframe {tf}: bar count {actual} dropped below previous {previous}"
                ));
            }
        }
    }

    if let Some(baseline) = baseline {
        let current = inventory.contract_pairs();
        let previous: BTreeSet<(String, String)> = baseline.contracts.iter().cloned().collect();

        let added: Vec<String> = current
            .difference(&previous)
            .map(|(tf, id)| format!("{tf}:{id}"))
            .collect();
        let missing: Vec<String> = previous
            .difference(&current)
            .map(|(tf, id)| format!("{tf}:{id}"))
            .collect();

        if !added.is_empty() {
            issues.push(format!("New contracts detected: {}", added.join(", ")));
        }
        if !missing.is_empty() {
            issues.push(format!("Contracts missing: {}", missing.join(", ")));
        }
    }

    issues
}

/// Multi-line summary for logs and notifications.
pub fn format_status_message(inventory: &DataInventory) -> String {
    let mut lines = vec!["TopStepAi Data Inventory".to_string()];

    for (tf, span) in &inventory.timeframes {
        lines.push(format!(
            " • {tf}: {} rows ({} → {})",
            span.rows,
            fmt_instant(span.start),
            fmt_instant(span.end)
        ));
    }

    // The header marks that targets were checked; only unmet ones are listed.
    if !inventory.shortfalls.timeframes.is_empty() {
        lines.push("Shortfalls:".to_string());
        lines.extend(
            inventory
                .shortfalls
                .shortfalls()
                .filter(|(_, e)| e.target > 0)
                .map(|(tf, e)| format!("    - {tf}: {}/{}", e.actual, e.target)),
        );
    }

    lines.join("\n")
}

fn fmt_instant(instant: Option<DateTime<Utc>>) -> String {
    instant.map_or_else(
        || "n/a".to_string(),
        |t| t.to_rfc3339_opts(SecondsFormat::Secs, true),
    )
}
