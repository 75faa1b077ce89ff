//! Configuration builder for creating test and development configurations.

use crate::{AccountConfig, ApiConfig, Config, GateConfig, IssuanceConfig, LedgerConfig};
use gate_types::{Address, MessageLayout, NonceScope};
use std::collections::HashMap;

/// Builder for creating `Config` instances with a fluent API.
///
/// Defaults to in-memory ledger and issuance so the result is usable without
/// touching the filesystem.
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
	gate_id: String,
	context: Address,
	trusted_signer: Address,
	initial_tier: u64,
	nonce_scope: NonceScope,
	message_layout: MessageLayout,
	ledger_primary: String,
	ledger_implementations: HashMap<String, toml::Value>,
	account: Option<AccountConfig>,
	api: Option<ApiConfig>,
}

impl Default for ConfigBuilder {
	fn default() -> Self {
		Self::new()
	}
}

fn empty_table() -> toml::Value {
	toml::Value::Table(toml::map::Map::new())
}

impl ConfigBuilder {
	/// Creates a new `ConfigBuilder` with default values suitable for testing.
	pub fn new() -> Self {
		Self {
			gate_id: "test-gate".to_string(),
			context: Address::repeat_byte(0xcc),
			trusted_signer: Address::repeat_byte(0x5a),
			initial_tier: 0,
			nonce_scope: NonceScope::Global,
			message_layout: MessageLayout::Packed,
			ledger_primary: "memory".to_string(),
			ledger_implementations: HashMap::from([("memory".to_string(), empty_table())]),
			account: None,
			api: None,
		}
	}

	/// Sets the gate ID.
	pub fn gate_id(mut self, id: impl Into<String>) -> Self {
		self.gate_id = id.into();
		self
	}

	/// Sets the verifying context.
	pub fn context(mut self, context: Address) -> Self {
		self.context = context;
		self
	}

	/// Sets the trusted signer.
	pub fn trusted_signer(mut self, signer: Address) -> Self {
		self.trusted_signer = signer;
		self
	}

	/// Sets the initial tier.
	pub fn initial_tier(mut self, tier: u64) -> Self {
		self.initial_tier = tier;
		self
	}

	/// Sets how consumed identifiers are keyed.
	pub fn nonce_scope(mut self, scope: NonceScope) -> Self {
		self.nonce_scope = scope;
		self
	}

	/// Sets the signed message layout.
	pub fn message_layout(mut self, layout: MessageLayout) -> Self {
		self.message_layout = layout;
		self
	}

	/// Uses the file ledger at `path` as primary.
	pub fn file_ledger(mut self, path: impl Into<String>) -> Self {
		let mut table = toml::map::Map::new();
		table.insert("path".to_string(), toml::Value::String(path.into()));
		self.ledger_implementations
			.insert("file".to_string(), toml::Value::Table(table));
		self.ledger_primary = "file".to_string();
		self
	}

	/// Configures the local authorizer key.
	pub fn private_key(mut self, private_key: impl Into<String>) -> Self {
		let mut table = toml::map::Map::new();
		table.insert(
			"private_key".to_string(),
			toml::Value::String(private_key.into()),
		);
		self.account = Some(AccountConfig {
			primary: "local".to_string(),
			implementations: HashMap::from([("local".to_string(), toml::Value::Table(table))]),
		});
		self
	}

	/// Sets the API configuration.
	pub fn api(mut self, api: Option<ApiConfig>) -> Self {
		self.api = api;
		self
	}

	/// Builds the `Config` with the configured values.
	pub fn build(self) -> Config {
		Config {
			gate: GateConfig {
				id: self.gate_id,
				context: self.context,
				trusted_signer: self.trusted_signer,
				initial_tier: self.initial_tier,
				nonce_scope: self.nonce_scope,
				message_layout: self.message_layout,
			},
			ledger: LedgerConfig {
				primary: self.ledger_primary,
				implementations: self.ledger_implementations,
			},
			issuance: IssuanceConfig {
				primary: "memory".to_string(),
				implementations: HashMap::from([("memory".to_string(), empty_table())]),
			},
			account: self.account,
			api: self.api,
		}
	}
}
