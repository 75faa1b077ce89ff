//! Issuance sinks that receive the units an authorization grants.
//!
//! The gate calls [`IssuanceSink::issue_units`] after the identifier has been
//! reserved and before it is committed. A sink that refuses causes the
//! reservation to be released, so a refused issuance leaves no trace.

use gate_types::{
	Address, ConfigSchema, Field, FieldType, ImplementationRegistry, Schema, ValidationError, U256,
};
use std::collections::HashMap;
use std::sync::Mutex;
use thiserror::Error;

/// Errors that can occur while issuing units.
#[derive(Debug, Error)]
pub enum IssuanceError {
	/// The sink declined the issuance.
	#[error("Issuance rejected: {0}")]
	Rejected(String),
	/// Error that occurs during configuration validation.
	#[error("Configuration error: {0}")]
	Configuration(String),
}

/// Receiver of issued units.
pub trait IssuanceSink: Send + Sync {
	/// Credits `count` units to `beneficiary`. Must be all-or-nothing.
	fn issue_units(&self, beneficiary: Address, count: U256) -> Result<(), IssuanceError>;

	/// Units held by `account`, for sinks that track balances.
	fn balance_of(&self, _account: Address) -> Option<U256> {
		None
	}

	/// Returns the configuration schema for validation.
	fn config_schema(&self) -> Box<dyn ConfigSchema>;
}

/// Type alias for issuance factory functions.
pub type IssuanceFactory = fn(&toml::Value) -> Result<Box<dyn IssuanceSink>, IssuanceError>;

/// Registry trait for issuance implementations.
pub trait IssuanceRegistry: ImplementationRegistry<Factory = IssuanceFactory> {}

/// Get all registered issuance implementations.
pub fn get_all_implementations() -> Vec<(&'static str, IssuanceFactory)> {
	vec![(Registry::NAME, Registry::factory())]
}

#[derive(Debug, Default)]
struct Ledger {
	balances: HashMap<Address, U256>,
	total: U256,
}

/// Balance-keeping sink held in memory.
///
/// With `max_supply` set, issuances that would push the total past it are
/// rejected.
#[derive(Debug, Default)]
pub struct MemoryIssuance {
	state: Mutex<Ledger>,
	max_supply: Option<U256>,
}

impl MemoryIssuance {
	pub fn new(max_supply: Option<U256>) -> Self {
		Self {
			state: Mutex::new(Ledger::default()),
			max_supply,
		}
	}

	/// Total units issued across all accounts.
	pub fn total_issued(&self) -> U256 {
		self.state
			.lock()
			.map(|state| state.total)
			.unwrap_or_default()
	}
}

impl IssuanceSink for MemoryIssuance {
	fn issue_units(&self, beneficiary: Address, count: U256) -> Result<(), IssuanceError> {
		let mut state = self
			.state
			.lock()
			.map_err(|_| IssuanceError::Rejected("issuance state poisoned".to_string()))?;

		let total = state
			.total
			.checked_add(count)
			.ok_or_else(|| IssuanceError::Rejected("total supply overflow".to_string()))?;
		if let Some(max) = self.max_supply {
			if total > max {
				return Err(IssuanceError::Rejected(format!(
					"issuing {} would exceed max supply {}",
					count, max
				)));
			}
		}

		let balance = state.balances.get(&beneficiary).copied().unwrap_or_default();
		// Cannot overflow: balance <= total.
		state.balances.insert(beneficiary, balance + count);
		state.total = total;
		Ok(())
	}

	fn balance_of(&self, account: Address) -> Option<U256> {
		let state = self.state.lock().ok()?;
		Some(state.balances.get(&account).copied().unwrap_or_default())
	}

	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(MemoryIssuanceSchema)
	}
}

/// Configuration schema for MemoryIssuance.
pub struct MemoryIssuanceSchema;

impl ConfigSchema for MemoryIssuanceSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		Schema::new(vec![], vec![Field::new("max_supply", FieldType::Identifier)]).validate(config)
	}
}

/// Factory function to create a memory issuance sink from configuration.
///
/// Configuration parameters:
/// - `max_supply`: optional cap on total issued units, decimal or 0x hex string
pub fn create_issuance(config: &toml::Value) -> Result<Box<dyn IssuanceSink>, IssuanceError> {
	MemoryIssuanceSchema
		.validate(config)
		.map_err(|e| IssuanceError::Configuration(e.to_string()))?;

	let max_supply = config
		.get("max_supply")
		.and_then(|v| v.as_str())
		.map(gate_types::parse_identifier)
		.transpose()
		.map_err(IssuanceError::Configuration)?;

	Ok(Box::new(MemoryIssuance::new(max_supply)))
}

/// Registry for the memory issuance implementation.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "memory";
	type Factory = IssuanceFactory;

	fn factory() -> Self::Factory {
		create_issuance
	}
}

impl IssuanceRegistry for Registry {}
