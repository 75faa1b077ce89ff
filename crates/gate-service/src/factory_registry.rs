//! Registry of the pluggable implementations compiled into the service.
//!
//! Each component crate exposes `get_all_implementations()`; the registry
//! collects them once and resolves the names a configuration asks for.

use gate_account::AccountFactory;
use gate_config::Config;
use gate_core::issuance::IssuanceFactory;
use gate_core::{AllowanceSigner, GateBuilder, GateComponents, GateFactories};
use gate_storage::LedgerFactory;
use std::collections::HashMap;
use std::sync::OnceLock;

/// Factories for every implementation this binary ships.
pub struct FactoryRegistry {
	pub ledger: HashMap<String, LedgerFactory>,
	pub issuance: HashMap<String, IssuanceFactory>,
	pub account: HashMap<String, AccountFactory>,
}

impl FactoryRegistry {
	pub fn new() -> Self {
		Self {
			ledger: HashMap::new(),
			issuance: HashMap::new(),
			account: HashMap::new(),
		}
	}

	pub fn register_ledger(&mut self, name: impl Into<String>, factory: LedgerFactory) {
		self.ledger.insert(name.into(), factory);
	}

	pub fn register_issuance(&mut self, name: impl Into<String>, factory: IssuanceFactory) {
		self.issuance.insert(name.into(), factory);
	}

	pub fn register_account(&mut self, name: impl Into<String>, factory: AccountFactory) {
		self.account.insert(name.into(), factory);
	}
}

impl Default for FactoryRegistry {
	fn default() -> Self {
		Self::new()
	}
}

static REGISTRY: OnceLock<FactoryRegistry> = OnceLock::new();

/// Returns the process-wide registry, populating it on first use.
pub fn get_registry() -> &'static FactoryRegistry {
	REGISTRY.get_or_init(|| {
		let mut registry = FactoryRegistry::new();

		for (name, factory) in gate_storage::get_all_implementations() {
			tracing::debug!("Registering ledger implementation: {}", name);
			registry.register_ledger(name, factory);
		}

		for (name, factory) in gate_core::issuance::get_all_implementations() {
			tracing::debug!("Registering issuance implementation: {}", name);
			registry.register_issuance(name, factory);
		}

		for (name, factory) in gate_account::get_all_implementations() {
			tracing::debug!("Registering account implementation: {}", name);
			registry.register_account(name, factory);
		}

		registry
	})
}

/// Picks the factories named in a config section, failing on unknown names.
macro_rules! build_factories {
	($registry:expr, $config_impls:expr, $registry_field:ident, $type_name:literal) => {{
		let mut factories = HashMap::new();
		for name in $config_impls.keys() {
			if let Some(factory) = $registry.$registry_field.get(name) {
				factories.insert(name.clone(), *factory);
			} else {
				let mut available: Vec<_> = $registry.$registry_field.keys().cloned().collect();
				available.sort();
				return Err(format!(
					"Unknown {} implementation '{}'. Available: [{}]",
					$type_name,
					name,
					available.join(", ")
				)
				.into());
			}
		}
		factories
	}};
}

/// Builds the gate described by `config`.
pub fn build_gate_from_config(
	config: Config,
) -> Result<GateComponents, Box<dyn std::error::Error>> {
	let registry = get_registry();

	let ledger_factories = build_factories!(registry, config.ledger.implementations, ledger, "ledger");
	let issuance_factories = build_factories!(
		registry,
		config.issuance.implementations,
		issuance,
		"issuance"
	);

	let factories = GateFactories {
		ledger_factories,
		issuance_factories,
	};

	Ok(GateBuilder::new(config).build(factories)?)
}

/// Builds the allowance signer from the `[account]` section of `config`.
pub fn build_signer_from_config(
	config: Config,
) -> Result<AllowanceSigner, Box<dyn std::error::Error>> {
	let registry = get_registry();
	let account = config
		.account
		.as_ref()
		.ok_or("Signing requires an [account] section")?;

	let account_factories = build_factories!(registry, account.implementations, account, "account");

	Ok(GateBuilder::new(config).build_signer(&account_factories)?)
}
