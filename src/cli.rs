//! CLI definition and dispatch.

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{error, info, warn};

use crate::adapters::csv_adapter::CsvSeriesWriter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::json_status_adapter::{read_json, write_json, JsonStatusAdapter, DATA_INVENTORY_KEY};
use crate::adapters::topstepx_adapter::{TopstepXAdapter, TopstepXSettings};
use crate::domain::bar::ContractSeries;
use crate::domain::collector::{CandleRequest, ChainPuller, StitchRequest, DEFAULT_BARS};
use crate::domain::config_validation::{
    configured_timeframes, target_key, validate_broker_config, validate_collector_config,
    validate_stitch_config,
};
use crate::domain::contract_chain::generate_chain;
use crate::domain::error::RollstitchError;
use crate::domain::inventory::{
    format_status_message, validate_inventory, DataInventory, InventoryHistory,
    DEFAULT_WARN_THRESHOLD,
};
use crate::domain::timeframe::Timeframe;
use crate::ports::broker_port::BrokerPort;
use crate::ports::config_port::ConfigPort;
use crate::ports::status_port::StatusPort;

pub const DEFAULT_STATUS_PATH: &str = "config/status.json";
pub const DEFAULT_HISTORY_PATH: &str = "monitoring/data_inventory_history.json";
pub const DEFAULT_OUTPUT_DIR: &str = "data";

#[derive(Parser, Debug)]
#[command(name = "rollstitch", about = "Futures contract-chain bar collector and stitcher")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Collect front-contract candles and stitch the contract chain
    Collect {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        symbol: Option<String>,
    },
    /// Print the contract chain walking back from a contract id
    Chain {
        contract_id: String,
        #[arg(long, default_value_t = 8)]
        count: usize,
        #[arg(long)]
        all_months: bool,
        #[arg(long, default_value_t = 20)]
        min_year: u8,
    },
    /// Check the published data inventory against targets and the last run
    ValidateInventory {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        status: Option<PathBuf>,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Collect { config, symbol } => run_collect(&config, symbol.as_deref()),
        Command::Chain {
            contract_id,
            count,
            all_months,
            min_year,
        } => run_chain(&contract_id, count, all_months, min_year),
        Command::ValidateInventory { config, status } => {
            run_validate_inventory(&config, status.as_ref())
        }
    }
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(|err| {
        error!(path = %path.display(), error = %err, "failed to load config");
        ExitCode::from(&err)
    })
}

/// Output locations from `[status]`.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusPaths {
    pub status: PathBuf,
    pub history: PathBuf,
    pub output_dir: PathBuf,
}

pub fn build_status_paths(config: &dyn ConfigPort) -> StatusPaths {
    let path = |key: &str, default: &str| {
        PathBuf::from(
            config
                .get_string("status", key)
                .filter(|p| !p.trim().is_empty())
                .unwrap_or_else(|| default.to_string()),
        )
    };
    StatusPaths {
        status: path("path", DEFAULT_STATUS_PATH),
        history: path("history_path", DEFAULT_HISTORY_PATH),
        output_dir: path("output_dir", DEFAULT_OUTPUT_DIR),
    }
}

/// `target_bars.<tf>` entries for the configured timeframes.
pub fn build_target_bars(
    config: &dyn ConfigPort,
    timeframes: &[Timeframe],
) -> Result<BTreeMap<String, usize>, RollstitchError> {
    let mut targets = BTreeMap::new();
    for tf in timeframes {
        let key = target_key(&tf.label);
        if let Some(raw) = config.get_string("stitch", &key) {
            let target = raw
                .trim()
                .parse::<usize>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or_else(|| RollstitchError::ConfigInvalid {
                    section: "stitch".into(),
                    key: key.clone(),
                    reason: "target must be a positive integer".into(),
                })?;
            targets.insert(tf.label.clone(), target);
        }
    }
    Ok(targets)
}

pub fn build_stitch_request(config: &dyn ConfigPort) -> Result<StitchRequest, RollstitchError> {
    validate_stitch_config(config)?;
    let timeframes = configured_timeframes(config)?;
    let target_bars = build_target_bars(config, &timeframes)?;
    let defaults = StitchRequest::default();

    let days_back = config.get_int("stitch", "days_back", 240);

    Ok(StitchRequest {
        bars_per_contract: usize::try_from(config.get_int(
            "stitch",
            "bars_per_contract",
            defaults.bars_per_contract as i64,
        ))
        .unwrap_or(defaults.bars_per_contract),
        contracts_to_pull: usize::try_from(config.get_int(
            "stitch",
            "contracts_to_pull",
            defaults.contracts_to_pull as i64,
        ))
        .unwrap_or(defaults.contracts_to_pull),
        include_partial_bar: config.get_bool("stitch", "include_partial_bar", true),
        include_current: config.get_bool("stitch", "include_current", true),
        min_year: u8::try_from(config.get_int("stitch", "min_year", i64::from(defaults.min_year)))
            .unwrap_or(defaults.min_year),
        use_all_month_codes: config.get_bool("stitch", "use_all_month_codes", false),
        days_back: u32::try_from(days_back).ok().filter(|d| *d > 0),
        timeframes,
        target_bars,
    })
}

pub fn build_candle_request(
    config: &dyn ConfigPort,
    timeframes: &[Timeframe],
) -> Result<CandleRequest, RollstitchError> {
    validate_collector_config(config)?;
    let bars = usize::try_from(config.get_int("collector", "bars", DEFAULT_BARS as i64))
        .unwrap_or(DEFAULT_BARS);
    Ok(CandleRequest {
        timeframes: timeframes.to_vec(),
        bars: timeframes.iter().map(|tf| (tf.label.clone(), bars)).collect(),
        live: config.get_bool("collector", "live", false),
        include_partial_bar: config.get_bool("collector", "include_partial_bar", true),
        fallback_to_live: config.get_bool("collector", "fallback_to_live", true),
    })
}

/// Result of one collection run.
#[derive(Debug)]
pub struct CollectOutcome {
    pub candles: ContractSeries,
    pub inventory: DataInventory,
    pub message: String,
}

/// Authenticate, collect, stitch, write series files and publish the
/// inventory under the status snapshot's `data_inventory` key.
#[allow(clippy::too_many_arguments)]
pub fn run_collect_pipeline(
    broker: &dyn BrokerPort,
    status: &dyn StatusPort,
    writer: &CsvSeriesWriter,
    symbol: &str,
    candle_request: &CandleRequest,
    stitch_request: &StitchRequest,
    warn_threshold: f64,
    now: DateTime<Utc>,
) -> Result<CollectOutcome, RollstitchError> {
    broker.authenticate()?;

    let mut puller = ChainPuller::new(broker).pinned_at(now);
    puller
        .find_front_contract(symbol)
        .ok_or_else(|| RollstitchError::NoFrontContract {
            symbol: symbol.to_string(),
        })?;

    let candles = puller.collect_candles(candle_request)?;
    writer.write_candles(&candles)?;

    let (stitched, frames) = puller.collect_stitched_candles(stitch_request)?;
    let contracts = writer.write_stitched(&stitched, &frames)?;

    let inventory = DataInventory::from_run(
        now,
        stitch_request.days_back,
        warn_threshold,
        &stitched,
        contracts,
        puller.last_shortfall(),
    );
    let value = serde_json::to_value(&inventory).map_err(|e| RollstitchError::Status {
        reason: format!("failed to serialise inventory: {e}"),
    })?;
    status.update_key(DATA_INVENTORY_KEY, value)?;

    let message = format_status_message(&inventory);
    Ok(CollectOutcome {
        candles,
        inventory,
        message,
    })
}

fn run_collect(config_path: &Path, symbol_override: Option<&str>) -> ExitCode {
    info!(path = %config_path.display(), "loading config");
    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };

    let prepared = validate_broker_config(&config)
        .and_then(|_| build_stitch_request(&config))
        .and_then(|stitch| {
            build_candle_request(&config, &stitch.timeframes).map(|candles| (candles, stitch))
        });
    let (candle_request, stitch_request) = match prepared {
        Ok(r) => r,
        Err(e) => {
            error!(error = %e, "invalid configuration");
            return (&e).into();
        }
    };

    let symbol = symbol_override
        .map(str::to_string)
        .or_else(|| config.get_string("collector", "symbol"))
        .unwrap_or_default();
    let paths = build_status_paths(&config);
    let warn_threshold = config.get_double("stitch", "warn_threshold", DEFAULT_WARN_THRESHOLD);

    let broker = match TopstepXSettings::from_config(&config).and_then(TopstepXAdapter::new) {
        Ok(b) => b,
        Err(e) => {
            error!(error = %e, "failed to set up broker client");
            return (&e).into();
        }
    };
    let status = JsonStatusAdapter::new(paths.status.clone());
    let writer = CsvSeriesWriter::new(paths.output_dir.clone());

    match run_collect_pipeline(
        &broker,
        &status,
        &writer,
        &symbol,
        &candle_request,
        &stitch_request,
        warn_threshold,
        Utc::now(),
    ) {
        Ok(outcome) => {
            for line in outcome.message.lines() {
                info!("{line}");
            }
            info!(status = %status.path().display(), "inventory published");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(symbol = %symbol, error = %e, "collection failed");
            (&e).into()
        }
    }
}

fn run_chain(contract_id: &str, count: usize, all_months: bool, min_year: u8) -> ExitCode {
    match generate_chain(contract_id, count, all_months, min_year) {
        Ok(chain) => {
            for id in chain {
                println!("{id}");
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "cannot generate chain");
            (&e).into()
        }
    }
}

/// Validate the published inventory and roll the baseline forward.
///
/// The history file is rewritten whether or not issues were found.
pub fn run_inventory_check(
    status: &dyn StatusPort,
    history_path: &Path,
    targets: &BTreeMap<String, usize>,
    warn_threshold: f64,
    now: DateTime<Utc>,
) -> Result<Vec<String>, RollstitchError> {
    let snapshot = status.load()?;
    let raw = snapshot
        .get(DATA_INVENTORY_KEY)
        .cloned()
        .ok_or_else(|| RollstitchError::Status {
            reason: format!("status snapshot has no '{DATA_INVENTORY_KEY}'"),
        })?;
    let inventory: DataInventory =
        serde_json::from_value(raw).map_err(|e| RollstitchError::Status {
            reason: format!("malformed '{DATA_INVENTORY_KEY}': {e}"),
        })?;

    let baseline: Option<InventoryHistory> = read_json(history_path)?;
    let issues = validate_inventory(&inventory, targets, warn_threshold, baseline.as_ref());

    write_json(history_path, &InventoryHistory::from_inventory(&inventory, now))?;
    Ok(issues)
}

fn run_validate_inventory(config_path: &Path, status_override: Option<&PathBuf>) -> ExitCode {
    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };

    let targets = match validate_stitch_config(&config)
        .and_then(|_| configured_timeframes(&config))
        .and_then(|tfs| build_target_bars(&config, &tfs))
    {
        Ok(t) => t,
        Err(e) => {
            error!(error = %e, "invalid configuration");
            return (&e).into();
        }
    };
    let warn_threshold = config.get_double("stitch", "warn_threshold", DEFAULT_WARN_THRESHOLD);

    let mut paths = build_status_paths(&config);
    if let Some(p) = status_override {
        paths.status = p.clone();
    }
    if !paths.status.exists() {
        let err = RollstitchError::Status {
            reason: format!("status file not found: {}", paths.status.display()),
        };
        error!(error = %err, "cannot validate inventory");
        return (&err).into();
    }

    let status = JsonStatusAdapter::new(paths.status);
    match run_inventory_check(&status, &paths.history, &targets, warn_threshold, Utc::now()) {
        Ok(issues) if issues.is_empty() => {
            println!("Data inventory validation passed");
            ExitCode::SUCCESS
        }
        Ok(issues) => {
            println!("Data inventory validation failed:");
            for issue in &issues {
                println!(" - {issue}");
            }
            warn!(issues = issues.len(), "data inventory validation failed");
            ExitCode::from(1)
        }
        Err(e) => {
            error!(error = %e, "inventory validation aborted");
            (&e).into()
        }
    }
}
