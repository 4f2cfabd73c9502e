#![allow(dead_code)]

use chrono::{DateTime, Duration, TimeZone, Utc};
pub use rollstitch::domain::bar::Bar;
use rollstitch::domain::contract::Contract;
use rollstitch::domain::error::RollstitchError;
use rollstitch::domain::timeframe::{TimeUnit, Timeframe};
use rollstitch::ports::broker_port::{BarsRequest, BrokerPort};
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};

type SeriesKey = (String, TimeUnit, u32);

/// In-memory broker. Bars are keyed by contract id and timeframe; a request
/// gets the first `limit` stored bars, like the real endpoint's cap.
pub struct MockBroker {
    pub contracts: HashMap<String, Contract>,
    pub searches: HashMap<String, Vec<Contract>>,
    pub bars: HashMap<SeriesKey, Vec<Bar>>,
    pub live_bars: HashMap<SeriesKey, Vec<Bar>>,
    pub failing: HashSet<String>,
    pub auth_error: Option<String>,
    pub requests: RefCell<Vec<BarsRequest>>,
    pub lookups: RefCell<Vec<String>>,
}

impl MockBroker {
    pub fn new() -> Self {
        Self {
            contracts: HashMap::new(),
            searches: HashMap::new(),
            bars: HashMap::new(),
            live_bars: HashMap::new(),
            failing: HashSet::new(),
            auth_error: None,
            requests: RefCell::new(Vec::new()),
            lookups: RefCell::new(Vec::new()),
        }
    }

    /// Register a contract so id lookups resolve it.
    pub fn with_contract(mut self, id: &str) -> Self {
        self.contracts.insert(id.to_string(), Contract::with_id(id));
        self
    }

    pub fn with_bars(mut self, id: &str, timeframe: &str, bars: Vec<Bar>) -> Self {
        self.contracts
            .entry(id.to_string())
            .or_insert_with(|| Contract::with_id(id));
        self.bars.insert(series_key(id, timeframe), bars);
        self
    }

    pub fn with_live_bars(mut self, id: &str, timeframe: &str, bars: Vec<Bar>) -> Self {
        self.live_bars.insert(series_key(id, timeframe), bars);
        self
    }

    pub fn with_search(mut self, text: &str, id: &str) -> Self {
        let contract = Contract {
            symbol: Some(text.to_string()),
            ..Contract::with_id(id)
        };
        self.contracts.insert(id.to_string(), contract.clone());
        self.searches.insert(text.to_string(), vec![contract]);
        self
    }

    /// Bar retrieval for `id` fails with a broker error.
    pub fn with_failure(mut self, id: &str) -> Self {
        self.contracts
            .entry(id.to_string())
            .or_insert_with(|| Contract::with_id(id));
        self.failing.insert(id.to_string());
        self
    }

    pub fn with_auth_error(mut self, reason: &str) -> Self {
        self.auth_error = Some(reason.to_string());
        self
    }

    pub fn requests_for(&self, id: &str) -> usize {
        self.requests
            .borrow()
            .iter()
            .filter(|r| r.contract_id == id)
            .count()
    }

    pub fn lookups_for(&self, id: &str) -> usize {
        self.lookups.borrow().iter().filter(|l| *l == id).count()
    }
}

fn series_key(id: &str, timeframe: &str) -> SeriesKey {
    let tf = Timeframe::parse(timeframe).unwrap();
    (id.to_string(), tf.unit, tf.unit_number)
}

impl BrokerPort for MockBroker {
    fn authenticate(&self) -> Result<(), RollstitchError> {
        match &self.auth_error {
            Some(reason) => Err(RollstitchError::Auth {
                reason: reason.clone(),
            }),
            None => Ok(()),
        }
    }

    fn search_contracts(&self, text: &str, live: bool) -> Result<Vec<Contract>, RollstitchError> {
        if !live {
            return Ok(Vec::new());
        }
        Ok(self.searches.get(text).cloned().unwrap_or_default())
    }

    fn contract_by_id(&self, id: &str) -> Result<Option<Contract>, RollstitchError> {
        self.lookups.borrow_mut().push(id.to_string());
        Ok(self.contracts.get(id).cloned())
    }

    fn retrieve_bars(&self, request: &BarsRequest) -> Result<Vec<Bar>, RollstitchError> {
        self.requests.borrow_mut().push(request.clone());
        if self.failing.contains(&request.contract_id) {
            return Err(RollstitchError::Broker {
                reason: format!("history unavailable for {}", request.contract_id),
            });
        }
        let key = (request.contract_id.clone(), request.unit, request.unit_number);
        let stored = if request.live {
            self.live_bars.get(&key).or_else(|| self.bars.get(&key))
        } else {
            self.bars.get(&key)
        };
        Ok(stored
            .map(|bars| bars.iter().take(request.limit).cloned().collect())
            .unwrap_or_default())
    }
}

pub fn fixed_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 11, 20, 12, 0, 0).unwrap()
}

pub fn make_bar(timestamp: DateTime<Utc>, price: f64) -> Bar {
    Bar {
        timestamp,
        open: price,
        high: price + 1.0,
        low: price - 1.0,
        close: price + 0.5,
        volume: 100.0,
    }
}

/// Bar stamped `hours_ago` hours before [`fixed_now`].
pub fn bar_hours_ago(hours_ago: i64, price: f64) -> Bar {
    make_bar(fixed_now() - Duration::hours(hours_ago), price)
}

/// `count` consecutive hourly bars, oldest first, the newest at `newest_hours_ago`.
pub fn hourly_run(newest_hours_ago: i64, count: i64, price: f64) -> Vec<Bar> {
    (0..count)
        .rev()
        .map(|i| bar_hours_ago(newest_hours_ago + i, price))
        .collect()
}

/// Gold roll: `CON.F.US.MGC.Z25` front, `CON.F.US.MGC.Q25` the only older
/// contract with data, overlapping at 30 hours ago.
pub fn gold_broker() -> MockBroker {
    MockBroker::new()
        .with_bars(
            "CON.F.US.MGC.Z25",
            "1hour",
            vec![bar_hours_ago(80, 12.0), bar_hours_ago(30, 11.0), bar_hours_ago(2, 10.0)],
        )
        .with_bars(
            "CON.F.US.MGC.Q25",
            "1hour",
            vec![bar_hours_ago(400, 22.0), bar_hours_ago(90, 21.0), bar_hours_ago(30, 20.0)],
        )
}
