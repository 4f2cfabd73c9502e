//! Record of contracts known to return no data.

use std::collections::BTreeSet;

/// Contracts (or single contract/timeframe pairs) that came back empty.
///
/// Owned by the collector and handed in by the caller, so one cache can
/// span several collection runs in the same process. Anything that touches
/// it from more than one thread must wrap it in a mutex.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EmptyContractCache {
    contracts: BTreeSet<String>,
    pairs: BTreeSet<(String, String)>,
}

impl EmptyContractCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The whole contract is unusable (lookup miss).
    pub fn mark_contract(&mut self, contract_id: &str) {
        self.contracts.insert(contract_id.to_string());
    }

    /// One timeframe of the contract returned nothing.
    pub fn mark_empty(&mut self, contract_id: &str, timeframe: &str) {
        self.pairs
            .insert((contract_id.to_string(), timeframe.to_string()));
    }

    pub fn contains_contract(&self, contract_id: &str) -> bool {
        self.contracts.contains(contract_id)
    }

    pub fn should_skip(&self, contract_id: &str, timeframe: &str) -> bool {
        self.contains_contract(contract_id)
            || self
                .pairs
                .contains(&(contract_id.to_string(), timeframe.to_string()))
    }

    /// Every contract id with at least one empty result.
    pub fn contract_ids(&self) -> BTreeSet<String> {
        self.contracts
            .iter()
            .cloned()
            .chain(self.pairs.iter().map(|(id, _)| id.clone()))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.contracts.is_empty() && self.pairs.is_empty()
    }
}
