//! Builder for constructing gates from configuration.
//!
//! Composes an `AuthorizationGate` from the configured ledger backend and
//! issuance sink using factory functions, so the binary and the tests can
//! plug in whichever implementations they register.

use crate::encoder::MessageEncoder;
use crate::gate::{AuthorizationGate, GateAdmin};
use crate::issuance::{IssuanceError, IssuanceSink};
use crate::signing::AllowanceSigner;
use gate_account::{AccountError, AccountService, SignerInterface};
use gate_config::Config;
use gate_storage::{LedgerError, NonceLedger, NonceLedgerInterface};
use gate_types::GateParameters;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

/// Errors that can occur during gate construction.
#[derive(Debug, Error)]
pub enum BuilderError {
	#[error("Configuration error: {0}")]
	Config(String),
	#[error("Missing required component: {0}")]
	MissingComponent(String),
}

/// Factory functions available for each pluggable component.
pub struct GateFactories<LF, IF> {
	pub ledger_factories: HashMap<String, LF>,
	pub issuance_factories: HashMap<String, IF>,
}

/// A built gate with everything needed to serve it.
pub struct GateComponents {
	pub gate: Arc<AuthorizationGate>,
	pub admin: GateAdmin,
}

/// Looks up the primary implementation's factory and runs it.
fn build_primary<F, T, E>(
	component: &str,
	primary: &str,
	implementations: &HashMap<String, toml::Value>,
	factories: &HashMap<String, F>,
) -> Result<T, BuilderError>
where
	F: Fn(&toml::Value) -> Result<T, E>,
	E: std::fmt::Display,
{
	let config = implementations.get(primary).ok_or_else(|| {
		BuilderError::Config(format!(
			"Primary {} '{}' not found in implementations",
			component, primary
		))
	})?;
	let factory = factories.get(primary).ok_or_else(|| {
		BuilderError::MissingComponent(format!(
			"No {} implementation registered as '{}'",
			component, primary
		))
	})?;

	match factory(config) {
		Ok(implementation) => {
			tracing::info!(component = component, implementation = %primary, "Loaded");
			Ok(implementation)
		},
		Err(e) => {
			tracing::error!(
				component = component,
				implementation = %primary,
				error = %e,
				"Failed to create implementation"
			);
			Err(BuilderError::Config(format!(
				"Failed to create {} implementation '{}': {}",
				component, primary, e
			)))
		},
	}
}

/// Builder for constructing an `AuthorizationGate` with pluggable implementations.
pub struct GateBuilder {
	config: Config,
}

impl GateBuilder {
	/// Creates a new GateBuilder with the given configuration.
	pub fn new(config: Config) -> Self {
		Self { config }
	}

	fn encoder(&self) -> MessageEncoder {
		MessageEncoder::new(self.config.gate.context, self.config.gate.message_layout)
	}

	/// Builds the gate from the primary ledger and issuance implementations.
	///
	/// Only primaries are instantiated; file-backed ledgers lock their log on
	/// creation.
	pub fn build<LF, IF>(
		&self,
		factories: GateFactories<LF, IF>,
	) -> Result<GateComponents, BuilderError>
	where
		LF: Fn(&toml::Value) -> Result<Box<dyn NonceLedgerInterface>, LedgerError>,
		IF: Fn(&toml::Value) -> Result<Box<dyn IssuanceSink>, IssuanceError>,
	{
		let ledger = build_primary(
			"ledger",
			&self.config.ledger.primary,
			&self.config.ledger.implementations,
			&factories.ledger_factories,
		)?;
		let issuance = build_primary(
			"issuance",
			&self.config.issuance.primary,
			&self.config.issuance.implementations,
			&factories.issuance_factories,
		)?;

		let gate_config = &self.config.gate;
		let parameters = GateParameters {
			trusted_signer: gate_config.trusted_signer,
			current_tier: u128::from(gate_config.initial_tier),
		};
		let (gate, admin) = AuthorizationGate::new(
			gate_config.id.clone(),
			self.encoder(),
			gate_config.nonce_scope,
			parameters,
			Arc::new(NonceLedger::new(ledger)),
			Arc::from(issuance),
		);

		tracing::info!(
			gate = %gate_config.id,
			context = %gate_config.context,
			trusted_signer = %parameters.trusted_signer,
			current_tier = parameters.current_tier,
			nonce_scope = gate_config.nonce_scope.as_str(),
			message_layout = gate_config.message_layout.as_str(),
			"Gate ready"
		);

		Ok(GateComponents {
			gate: Arc::new(gate),
			admin,
		})
	}

	/// Builds the allowance signer from the `[account]` section.
	pub fn build_signer<AF>(
		&self,
		account_factories: &HashMap<String, AF>,
	) -> Result<AllowanceSigner, BuilderError>
	where
		AF: Fn(&toml::Value) -> Result<Box<dyn SignerInterface>, AccountError>,
	{
		let account = self
			.config
			.account
			.as_ref()
			.ok_or_else(|| BuilderError::MissingComponent("[account] section".to_string()))?;
		let signer = build_primary(
			"account",
			&account.primary,
			&account.implementations,
			account_factories,
		)?;

		Ok(AllowanceSigner::new(
			Arc::new(AccountService::new(signer)),
			self.encoder(),
		))
	}
}
