//! Core domain types and logic.

pub mod bar;
pub mod timeframe;
pub mod contract;
pub mod contract_chain;
pub mod contract_resolver;
pub mod empty_contracts;
pub mod stitch;
pub mod shortfall;
pub mod collector;
pub mod inventory;
pub mod config_validation;
pub mod error;
