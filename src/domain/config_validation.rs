//! Configuration validation.
//!
//! Validates the `[stitch]`, `[collector]` and `[broker]` sections before a
//! collection run touches the network.

use crate::domain::error::RollstitchError;
use crate::domain::timeframe::Timeframe;
use crate::ports::config_port::ConfigPort;
use std::collections::BTreeSet;

pub const DEFAULT_TIMEFRAMES: &str = "1min,5min,15min,1hour,1day";

pub fn validate_stitch_config(config: &dyn ConfigPort) -> Result<(), RollstitchError> {
    let timeframes = validate_timeframes(config)?;
    validate_bars_per_contract(config)?;
    validate_contracts_to_pull(config)?;
    validate_min_year(config)?;
    validate_days_back(config)?;
    validate_warn_threshold(config)?;
    validate_targets(config, &timeframes)?;
    Ok(())
}

pub fn validate_collector_config(config: &dyn ConfigPort) -> Result<(), RollstitchError> {
    match config.get_string("collector", "symbol") {
        Some(s) if !s.trim().is_empty() => {}
        _ => {
            return Err(RollstitchError::ConfigMissing {
                section: "collector".to_string(),
                key: "symbol".to_string(),
            })
        }
    }
    let bars = config.get_int("collector", "bars", 1);
    if bars < 1 {
        return Err(RollstitchError::ConfigInvalid {
            section: "collector".to_string(),
            key: "bars".to_string(),
            reason: "bars must be at least 1".to_string(),
        });
    }
    Ok(())
}

pub fn validate_broker_config(config: &dyn ConfigPort) -> Result<(), RollstitchError> {
    for key in ["base_url", "username"] {
        match config.get_string("broker", key) {
            Some(s) if !s.trim().is_empty() => {}
            _ => {
                return Err(RollstitchError::ConfigMissing {
                    section: "broker".to_string(),
                    key: key.to_string(),
                })
            }
        }
    }
    Ok(())
}

/// Timeframes from `[stitch] timeframes`, falling back to the defaults.
pub fn configured_timeframes(config: &dyn ConfigPort) -> Result<Vec<Timeframe>, RollstitchError> {
    let raw = config
        .get_string("stitch", "timeframes")
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_TIMEFRAMES.to_string());
    Timeframe::parse_list(&raw)
}

fn validate_timeframes(config: &dyn ConfigPort) -> Result<Vec<Timeframe>, RollstitchError> {
    let timeframes = configured_timeframes(config).map_err(|e| RollstitchError::ConfigInvalid {
        section: "stitch".to_string(),
        key: "timeframes".to_string(),
        reason: e.to_string(),
    })?;
    if timeframes.is_empty() {
        return Err(RollstitchError::ConfigInvalid {
            section: "stitch".to_string(),
            key: "timeframes".to_string(),
            reason: "at least one timeframe is required".to_string(),
        });
    }
    // Config keys are case-folded, so `1M` and `1m` would share a target.
    let mut seen = BTreeSet::new();
    for tf in &timeframes {
        if !seen.insert(tf.label.to_lowercase()) {
            return Err(RollstitchError::ConfigInvalid {
                section: "stitch".to_string(),
                key: "timeframes".to_string(),
                reason: format!("timeframe {} repeats another label ignoring case", tf.label),
            });
        }
    }
    Ok(timeframes)
}

fn validate_bars_per_contract(config: &dyn ConfigPort) -> Result<(), RollstitchError> {
    let value = config.get_int("stitch", "bars_per_contract", 1);
    if value < 1 {
        return Err(RollstitchError::ConfigInvalid {
            section: "stitch".to_string(),
            key: "bars_per_contract".to_string(),
            reason: "bars_per_contract must be at least 1".to_string(),
        });
    }
    Ok(())
}

fn validate_contracts_to_pull(config: &dyn ConfigPort) -> Result<(), RollstitchError> {
    let value = config.get_int("stitch", "contracts_to_pull", 0);
    if value < 0 {
        return Err(RollstitchError::ConfigInvalid {
            section: "stitch".to_string(),
            key: "contracts_to_pull".to_string(),
            reason: "contracts_to_pull must be non-negative".to_string(),
        });
    }
    Ok(())
}

fn validate_min_year(config: &dyn ConfigPort) -> Result<(), RollstitchError> {
    let value = config.get_int("stitch", "min_year", 20);
    if !(0..=99).contains(&value) {
        return Err(RollstitchError::ConfigInvalid {
            section: "stitch".to_string(),
            key: "min_year".to_string(),
            reason: "min_year must be a two-digit year (0-99)".to_string(),
        });
    }
    Ok(())
}

fn validate_days_back(config: &dyn ConfigPort) -> Result<(), RollstitchError> {
    let value = config.get_int("stitch", "days_back", 0);
    if value < 0 || value > i64::from(u32::MAX) {
        return Err(RollstitchError::ConfigInvalid {
            section: "stitch".to_string(),
            key: "days_back".to_string(),
            reason: "days_back must be non-negative (0 disables trimming)".to_string(),
        });
    }
    Ok(())
}

fn validate_warn_threshold(config: &dyn ConfigPort) -> Result<(), RollstitchError> {
    let value = config.get_double("stitch", "warn_threshold", 0.9);
    if value <= 0.0 || value > 1.0 {
        return Err(RollstitchError::ConfigInvalid {
            section: "stitch".to_string(),
            key: "warn_threshold".to_string(),
            reason: "warn_threshold must be in (0, 1]".to_string(),
        });
    }
    Ok(())
}

fn validate_targets(config: &dyn ConfigPort, timeframes: &[Timeframe]) -> Result<(), RollstitchError> {
    for tf in timeframes {
        let key = target_key(&tf.label);
        if let Some(raw) = config.get_string("stitch", &key) {
            match raw.trim().parse::<usize>() {
                Ok(n) if n > 0 => {}
                _ => {
                    return Err(RollstitchError::ConfigInvalid {
                        section: "stitch".to_string(),
                        key,
                        reason: "target must be a positive integer".to_string(),
                    })
                }
            }
        }
    }
    Ok(())
}

/// Config key holding the target row count for a timeframe.
pub fn target_key(timeframe: &str) -> String {
    format!("target_bars.{timeframe}")
}
