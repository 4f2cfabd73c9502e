//! Symbol and id resolution with a process-lifetime identity cache.

use crate::domain::contract::{looks_like_contract_id, Contract};
use crate::ports::broker_port::BrokerPort;
use std::collections::HashMap;
use tracing::{debug, warn};

/// Resolves symbols (`MGCZ25`) and contract ids to broker contracts.
///
/// Every resolved contract is cached under its id, its symbol and the alias
/// it was asked for. Entries are never evicted.
pub struct ContractResolver<'a> {
    broker: &'a dyn BrokerPort,
    cache: HashMap<String, Contract>,
}

impl<'a> ContractResolver<'a> {
    pub fn new(broker: &'a dyn BrokerPort) -> Self {
        Self {
            broker,
            cache: HashMap::new(),
        }
    }

    pub fn cached(&self, key: &str) -> Option<&Contract> {
        self.cache.get(&key.trim().to_uppercase())
    }

    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }

    /// Resolve a symbol: live search, then non-live search, then id lookup
    /// when the text is shaped like a contract id.
    pub fn resolve(&mut self, symbol: &str) -> Option<Contract> {
        let normalized = symbol.trim().to_uppercase();
        if normalized.is_empty() {
            return None;
        }
        if let Some(hit) = self.cache.get(&normalized) {
            return Some(hit.clone());
        }

        let mut candidates = self.search(&normalized, true);
        if candidates.is_empty() {
            candidates = self.search(&normalized, false);
        }

        if let Some(contract) = candidates.into_iter().find(|c| !c.id.trim().is_empty()) {
            return Some(self.remember(contract, Some(&normalized)));
        }

        if looks_like_contract_id(&normalized) {
            return self.resolve_by_id(&normalized, None);
        }

        None
    }

    /// Resolve a contract id, from cache when possible.
    ///
    /// A broker failure is treated as a miss.
    pub fn resolve_by_id(&mut self, contract_id: &str, alias: Option<&str>) -> Option<Contract> {
        let normalized = contract_id.trim().to_uppercase();
        if let Some(hit) = self.cache.get(&normalized).cloned() {
            if let Some(alias) = alias {
                self.cache.insert(alias.trim().to_uppercase(), hit.clone());
            }
            return Some(hit);
        }

        match self.broker.contract_by_id(&normalized) {
            Ok(Some(contract)) => Some(self.remember(contract, alias)),
            Ok(None) => {
                debug!(contract_id = %normalized, "contract not found");
                None
            }
            Err(e) => {
                warn!(contract_id = %normalized, error = %e, "contract lookup failed");
                None
            }
        }
    }

    fn search(&self, text: &str, live: bool) -> Vec<Contract> {
        match self.broker.search_contracts(text, live) {
            Ok(found) => found,
            Err(e) => {
                warn!(query = text, live, error = %e, "contract search failed");
                Vec::new()
            }
        }
    }

    fn remember(&mut self, contract: Contract, alias: Option<&str>) -> Contract {
        self.cache
            .insert(contract.id.trim().to_uppercase(), contract.clone());
        if let Some(symbol) = contract.symbol.as_deref().filter(|s| !s.trim().is_empty()) {
            self.cache
                .insert(symbol.trim().to_uppercase(), contract.clone());
        }
        if let Some(alias) = alias.filter(|a| !a.trim().is_empty()) {
            self.cache.insert(alias.trim().to_uppercase(), contract.clone());
        }
        contract
    }
}
