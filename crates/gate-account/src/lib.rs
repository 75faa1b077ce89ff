//! Authorizer key management for the allowance gate.
//!
//! This module provides abstractions over the key that signs allowances. The
//! gate itself never holds this key; it only needs the signer's address. The
//! signing side is used by the off-core tooling that issues allowances.

use async_trait::async_trait;
use gate_types::{Address, Bytes, ConfigSchema, ImplementationRegistry};
use thiserror::Error;

/// Re-export implementations
pub mod implementations {
	pub mod local;
}

/// Errors that can occur during account operations.
#[derive(Debug, Error)]
pub enum AccountError {
	/// Error that occurs when signing operations fail.
	#[error("Signing failed: {0}")]
	SigningFailed(String),
	/// Error that occurs when a cryptographic key is invalid or malformed.
	#[error("Invalid key: {0}")]
	InvalidKey(String),
	/// Error that occurs when interacting with the account implementation.
	#[error("Implementation error: {0}")]
	Implementation(String),
}

/// Trait defining the interface for authorizer signers.
#[async_trait]
pub trait SignerInterface: Send + Sync {
	/// Returns the configuration schema for this signer implementation.
	fn config_schema(&self) -> Box<dyn ConfigSchema>;

	/// Retrieves the address whose signatures this signer produces.
	async fn address(&self) -> Result<Address, AccountError>;

	/// Signs `message` with the EIP-191 personal-message prefix.
	///
	/// Returns the 65-byte `r || s || v` signature with `v` in {27, 28}.
	async fn sign_message(&self, message: &[u8]) -> Result<Bytes, AccountError>;
}

/// Type alias for signer factory functions.
pub type AccountFactory = fn(&toml::Value) -> Result<Box<dyn SignerInterface>, AccountError>;

/// Registry trait for signer implementations.
pub trait AccountRegistry: ImplementationRegistry<Factory = AccountFactory> {}

/// Get all registered signer implementations.
pub fn get_all_implementations() -> Vec<(&'static str, AccountFactory)> {
	use implementations::local;

	vec![(local::Registry::NAME, local::Registry::factory())]
}

/// Service that manages the authorizer account.
pub struct AccountService {
	/// The underlying signer implementation.
	implementation: Box<dyn SignerInterface>,
}

impl AccountService {
	/// Creates a new AccountService with the specified implementation.
	pub fn new(implementation: Box<dyn SignerInterface>) -> Self {
		Self { implementation }
	}

	/// Retrieves the address associated with the managed account.
	pub async fn get_address(&self) -> Result<Address, AccountError> {
		self.implementation.address().await
	}

	/// Signs a message with the managed account.
	pub async fn sign_message(&self, message: &[u8]) -> Result<Bytes, AccountError> {
		self.implementation.sign_message(message).await
	}
}
