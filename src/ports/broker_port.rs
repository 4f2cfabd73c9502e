//! Broker access port trait.

use crate::domain::bar::Bar;
use crate::domain::contract::Contract;
use crate::domain::error::RollstitchError;
use crate::domain::timeframe::TimeUnit;
use chrono::{DateTime, Utc};

/// One history request. The adapter owns wire encoding of every field.
#[derive(Debug, Clone, PartialEq)]
pub struct BarsRequest {
    pub contract_id: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub unit: TimeUnit,
    pub unit_number: u32,
    pub limit: usize,
    pub include_partial_bar: bool,
    pub live: bool,
}

pub trait BrokerPort {
    fn authenticate(&self) -> Result<(), RollstitchError>;

    fn search_contracts(&self, text: &str, live: bool) -> Result<Vec<Contract>, RollstitchError>;

    /// `Ok(None)` when the broker does not know the id.
    fn contract_by_id(&self, id: &str) -> Result<Option<Contract>, RollstitchError>;

    /// Bars in any order. An unsuccessful response may be `Err` or an empty vec;
    /// callers treat both the same.
    fn retrieve_bars(&self, request: &BarsRequest) -> Result<Vec<Bar>, RollstitchError>;
}
