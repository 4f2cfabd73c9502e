//! Bar collection for the front contract and for the contract chain.
//!
//! [`ChainPuller`] issues one history request at a time, contract then
//! timeframe. Missing data never fails a run: lookup misses and empty or
//! failed retrievals are recorded in the [`EmptyContractCache`] and the walk
//! moves on. Only malformed input (bad contract id, no front contract) is
//! returned as an error.

use crate::domain::bar::{sort_by_time, Bar, ContractFrames, ContractSeries, StitchedSeries};
use crate::domain::contract::Contract;
use crate::domain::contract_chain::{generate_chain, month_codes};
use crate::domain::contract_resolver::ContractResolver;
use crate::domain::empty_contracts::EmptyContractCache;
use crate::domain::error::RollstitchError;
use crate::domain::shortfall::{build_shortfall_report, ShortfallReport};
use crate::domain::stitch::{lookback_cutoff, stitch, trim_to_cutoff};
use crate::domain::timeframe::Timeframe;
use crate::ports::broker_port::{BarsRequest, BrokerPort};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

pub const DEFAULT_BARS: usize = 20_000;

/// Extra bars requested beyond the limit so the window is never short.
const WINDOW_PADDING_BARS: usize = 5;

/// Front-contract candle request.
#[derive(Debug, Clone)]
pub struct CandleRequest {
    pub timeframes: Vec<Timeframe>,
    /// Bars per timeframe label; missing labels use `DEFAULT_BARS`.
    pub bars: BTreeMap<String, usize>,
    pub live: bool,
    pub include_partial_bar: bool,
    /// Retry once against the live feed when the non-live request is empty.
    pub fallback_to_live: bool,
}

/// Chain stitch request.
#[derive(Debug, Clone)]
pub struct StitchRequest {
    pub timeframes: Vec<Timeframe>,
    pub bars_per_contract: usize,
    /// Contracts with data to collect. The front counts towards this only
    /// when `include_current` is off.
    pub contracts_to_pull: usize,
    pub include_partial_bar: bool,
    /// Always collect the front contract, on top of `contracts_to_pull`.
    pub include_current: bool,
    pub min_year: u8,
    pub use_all_month_codes: bool,
    pub days_back: Option<u32>,
    pub target_bars: BTreeMap<String, usize>,
}

impl Default for StitchRequest {
    fn default() -> Self {
        Self {
            timeframes: Vec::new(),
            bars_per_contract: DEFAULT_BARS,
            contracts_to_pull: 4,
            include_partial_bar: true,
            include_current: true,
            min_year: 20,
            use_all_month_codes: false,
            days_back: Some(240),
            target_bars: BTreeMap::new(),
        }
    }
}

pub struct ChainPuller<'a> {
    broker: &'a dyn BrokerPort,
    resolver: ContractResolver<'a>,
    contract_id: Option<String>,
    empty: EmptyContractCache,
    candles: ContractSeries,
    stitched: StitchedSeries,
    last_shortfall: ShortfallReport,
    now: Option<DateTime<Utc>>,
}

impl<'a> ChainPuller<'a> {
    pub fn new(broker: &'a dyn BrokerPort) -> Self {
        Self::with_empty_cache(broker, EmptyContractCache::new())
    }

    pub fn with_empty_cache(broker: &'a dyn BrokerPort, empty: EmptyContractCache) -> Self {
        Self {
            broker,
            resolver: ContractResolver::new(broker),
            contract_id: None,
            empty,
            candles: ContractSeries::new(),
            stitched: StitchedSeries::new(),
            last_shortfall: ShortfallReport::default(),
            now: None,
        }
    }

    /// Pin the clock used for request windows and the lookback cutoff.
    pub fn pinned_at(mut self, now: DateTime<Utc>) -> Self {
        self.now = Some(now);
        self
    }

    pub fn set_contract_id(&mut self, contract_id: &str) {
        self.contract_id = Some(contract_id.trim().to_string());
    }

    pub fn contract_id(&self) -> Option<&str> {
        self.contract_id.as_deref()
    }

    pub fn empty_contracts(&self) -> &EmptyContractCache {
        &self.empty
    }

    pub fn into_empty_cache(self) -> EmptyContractCache {
        self.empty
    }

    /// Front-contract series from the last `collect_candles` call.
    pub fn candles(&self) -> &ContractSeries {
        &self.candles
    }

    /// Stitched series from the last `collect_stitched_candles` call.
    pub fn stitched(&self) -> &StitchedSeries {
        &self.stitched
    }

    pub fn last_shortfall(&self) -> &ShortfallReport {
        &self.last_shortfall
    }

    /// Resolve `symbol` and make it the front contract.
    pub fn find_front_contract(&mut self, symbol: &str) -> Option<Contract> {
        let contract = self.resolver.resolve(symbol)?;
        info!(symbol, contract_id = %contract.id, "front contract resolved");
        self.contract_id = Some(contract.id.clone());
        Some(contract)
    }

    /// Collect the front contract's bars for each timeframe.
    ///
    /// Timeframes that stay empty after the optional live fallback are absent
    /// from the result.
    pub fn collect_candles(&mut self, request: &CandleRequest) -> Result<ContractSeries, RollstitchError> {
        let front = self.front_contract()?;
        let now = self.now();
        let mut series = ContractSeries::new();

        for tf in &request.timeframes {
            let limit = request.bars.get(&tf.label).copied().unwrap_or(DEFAULT_BARS);
            let mut bars = self.fetch(&front, tf, limit, request.include_partial_bar, request.live, now, None);

            if bars.is_empty() && request.fallback_to_live && !request.live {
                info!(contract_id = %front, timeframe = %tf, "no historical bars, falling back to live feed");
                bars = self.fetch(&front, tf, limit, request.include_partial_bar, true, now, None);
            }

            if bars.is_empty() {
                warn!(contract_id = %front, timeframe = %tf, "no bars for front contract");
                continue;
            }
            info!(contract_id = %front, timeframe = %tf, rows = bars.len(), "collected candles");
            series.insert(tf.label.clone(), bars);
        }

        self.candles = series.clone();
        Ok(series)
    }

    /// Collect the contract chain and stitch it into one series per timeframe.
    ///
    /// Returns the stitched series and the per-contract series it was built
    /// from. Both are trimmed to the lookback window; only the stitched series
    /// is capped to `target_bars`. The shortfall report is available from
    /// [`last_shortfall`](Self::last_shortfall) afterwards.
    pub fn collect_stitched_candles(
        &mut self,
        request: &StitchRequest,
    ) -> Result<(StitchedSeries, ContractFrames), RollstitchError> {
        let front = self.front_contract()?;
        let now = self.now();
        let cutoff = lookback_cutoff(now, request.days_back);

        let walk = 1 + request
            .contracts_to_pull
            .saturating_mul(month_codes(request.use_all_month_codes).len());
        let chain = generate_chain(&front, walk, request.use_all_month_codes, request.min_year)?;
        debug!(front = %front, candidates = chain.len(), "generated contract chain");

        // Newest contract first; merge precedence follows this order.
        let mut collected: Vec<(String, ContractSeries)> = Vec::new();

        let mut candidates = chain.iter();
        if request.include_current {
            if let Some(current) = candidates.next() {
                let (series, _) = self.collect_contract(current, request, now, cutoff);
                if !series.is_empty() {
                    collected.push((current.clone(), series));
                }
            }
        }

        let mut pulled = 0;
        for contract_id in candidates {
            if pulled >= request.contracts_to_pull {
                break;
            }
            let (series, had_data) = self.collect_contract(contract_id, request, now, cutoff);
            if had_data {
                pulled += 1;
            }
            if !series.is_empty() {
                collected.push((contract_id.clone(), series));
            }
        }

        if pulled < request.contracts_to_pull {
            warn!(
                wanted = request.contracts_to_pull,
                found = pulled,
                "chain exhausted before enough contracts returned data"
            );
        }

        let mut stitched = StitchedSeries::new();
        let mut counts = BTreeMap::new();
        for tf in &request.timeframes {
            let sources = collected
                .iter()
                .filter_map(|(_, series)| series.get(&tf.label))
                .map(Vec::as_slice);
            let bars = stitch(sources, cutoff, request.target_bars.get(&tf.label).copied());
            info!(timeframe = %tf, rows = bars.len(), "stitched series");
            counts.insert(tf.label.clone(), bars.len());
            stitched.insert(tf.label.clone(), bars);
        }

        self.last_shortfall =
            build_shortfall_report(&counts, &request.target_bars, self.empty.contract_ids());
        for (tf, entry) in self.last_shortfall.shortfalls() {
            warn!(timeframe = %tf, actual = entry.actual, target = entry.target, "bar count below target");
        }

        let frames: ContractFrames = collected.into_iter().collect();
        self.stitched = stitched.clone();
        Ok((stitched, frames))
    }

    /// Collect one chain contract. Returns its trimmed series and whether any
    /// timeframe returned bars before trimming.
    fn collect_contract(
        &mut self,
        contract_id: &str,
        request: &StitchRequest,
        now: DateTime<Utc>,
        cutoff: Option<DateTime<Utc>>,
    ) -> (ContractSeries, bool) {
        let mut series = ContractSeries::new();

        if self.empty.contains_contract(contract_id) {
            debug!(contract_id, "skipping contract known to be empty");
            return (series, false);
        }

        let contract = match self.resolver.resolve_by_id(contract_id, None) {
            Some(c) => c,
            None => {
                debug!(contract_id, "contract lookup missed, marking empty");
                self.empty.mark_contract(contract_id);
                return (series, false);
            }
        };

        let mut had_data = false;
        for tf in &request.timeframes {
            if self.empty.should_skip(contract_id, &tf.label) {
                continue;
            }

            let mut bars = self.fetch(
                &contract.id,
                tf,
                request.bars_per_contract,
                request.include_partial_bar,
                false,
                now,
                cutoff,
            );
            if bars.is_empty() {
                debug!(contract_id, timeframe = %tf, "no bars, marking empty");
                self.empty.mark_empty(contract_id, &tf.label);
                continue;
            }

            had_data = true;
            trim_to_cutoff(&mut bars, cutoff);
            if !bars.is_empty() {
                series.insert(tf.label.clone(), bars);
            }
        }

        (series, had_data)
    }

    #[allow(clippy::too_many_arguments)]
    fn fetch(
        &self,
        contract_id: &str,
        tf: &Timeframe,
        limit: usize,
        include_partial_bar: bool,
        live: bool,
        now: DateTime<Utc>,
        cutoff: Option<DateTime<Utc>>,
    ) -> Vec<Bar> {
        let (start, end) = request_window(now, tf, limit, cutoff);
        let request = BarsRequest {
            contract_id: contract_id.to_string(),
            start,
            end,
            unit: tf.unit,
            unit_number: tf.unit_number,
            limit,
            include_partial_bar,
            live,
        };

        match self.broker.retrieve_bars(&request) {
            Ok(mut bars) => {
                sort_by_time(&mut bars);
                bars
            }
            Err(e) => {
                warn!(contract_id, timeframe = %tf, error = %e, "bar retrieval failed");
                Vec::new()
            }
        }
    }

    fn front_contract(&self) -> Result<String, RollstitchError> {
        self.contract_id
            .clone()
            .ok_or_else(|| RollstitchError::NoFrontContract {
                symbol: "<unset>".to_string(),
            })
    }

    fn now(&self) -> DateTime<Utc> {
        self.now.unwrap_or_else(Utc::now)
    }
}

/// History window for `limit` bars ending at `now`, widened to reach the
/// lookback cutoff when one is set.
pub fn request_window(
    now: DateTime<Utc>,
    tf: &Timeframe,
    limit: usize,
    cutoff: Option<DateTime<Utc>>,
) -> (DateTime<Utc>, DateTime<Utc>) {
    let bars = i32::try_from(limit.saturating_add(WINDOW_PADDING_BARS)).unwrap_or(i32::MAX);
    let start = tf
        .bar_duration()
        .checked_mul(bars)
        .and_then(|span| now.checked_sub_signed(span))
        .unwrap_or(DateTime::<Utc>::MIN_UTC);
    let start = cutoff.map_or(start, |c| start.min(c));
    (start, now)
}
