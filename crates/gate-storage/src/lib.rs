//! Nonce ledger for the allowance gate.
//!
//! This module provides the set of consumed authorization identifiers behind
//! a pluggable backend trait, with in-memory and append-only file
//! implementations. Every key moves through
//! `Unused -> Reserved -> Consumed`; `Consumed` is terminal and a reservation
//! only goes back to `Unused` through an explicit release.

use gate_types::{ConfigSchema, ConsumeRecord, ImplementationRegistry, NonceKey};
use thiserror::Error;

/// Re-export implementations
pub mod implementations {
	pub mod file;
	pub mod memory;
}

/// Errors that can occur during ledger operations.
#[derive(Debug, Error)]
pub enum LedgerError {
	/// The key is already reserved or consumed.
	#[error("Identifier already used: {0}")]
	AlreadyUsed(NonceKey),
	/// Commit or release was called for a key that holds no reservation.
	#[error("Identifier not reserved: {0}")]
	NotReserved(NonceKey),
	/// The persisted log could not be parsed.
	#[error("Corrupt ledger log at line {line}: {reason}")]
	Corrupt { line: usize, reason: String },
	/// Error that occurs in the ledger backend.
	#[error("Backend error: {0}")]
	Backend(String),
	/// Error that occurs during configuration validation.
	#[error("Configuration error: {0}")]
	Configuration(String),
}

/// Trait defining the interface for nonce ledger backends.
///
/// `reserve` must be an atomic check-and-claim: of any number of concurrent
/// reservations of one key exactly one succeeds.
pub trait NonceLedgerInterface: Send + Sync {
	/// Claims an unused key, failing with `AlreadyUsed` if it is reserved or consumed.
	fn reserve(&self, key: NonceKey) -> Result<(), LedgerError>;

	/// Makes a reservation permanent. Persistent backends are durable on return.
	fn commit(&self, key: NonceKey, record: ConsumeRecord) -> Result<(), LedgerError>;

	/// Drops a reservation that was never committed.
	fn release(&self, key: NonceKey) -> Result<(), LedgerError>;

	/// Returns true if the key has been consumed.
	fn contains(&self, key: &NonceKey) -> Result<bool, LedgerError>;

	/// Number of consumed keys.
	fn len(&self) -> usize;

	fn is_empty(&self) -> bool {
		self.len() == 0
	}

	/// Returns the configuration schema for validation.
	fn config_schema(&self) -> Box<dyn ConfigSchema>;
}

/// Type alias for ledger factory functions.
pub type LedgerFactory = fn(&toml::Value) -> Result<Box<dyn NonceLedgerInterface>, LedgerError>;

/// Registry trait for ledger implementations.
pub trait LedgerRegistry: ImplementationRegistry<Factory = LedgerFactory> {}

/// Get all registered ledger implementations.
///
/// Returns a vector of (name, factory) tuples for all available backends.
pub fn get_all_implementations() -> Vec<(&'static str, LedgerFactory)> {
	use implementations::{file, memory};

	vec![
		(file::Registry::NAME, file::Registry::factory()),
		(memory::Registry::NAME, memory::Registry::factory()),
	]
}

/// High-level ledger service used by the gate.
pub struct NonceLedger {
	/// The underlying ledger backend implementation.
	backend: Box<dyn NonceLedgerInterface>,
}

impl NonceLedger {
	/// Creates a new NonceLedger with the specified backend.
	pub fn new(backend: Box<dyn NonceLedgerInterface>) -> Self {
		Self { backend }
	}

	/// Atomically checks that `key` is unused and marks it consumed.
	pub fn consume(&self, key: NonceKey, record: ConsumeRecord) -> Result<(), LedgerError> {
		self.backend.reserve(key)?;
		self.backend.commit(key, record)
	}

	pub fn reserve(&self, key: NonceKey) -> Result<(), LedgerError> {
		self.backend.reserve(key)
	}

	pub fn commit(&self, key: NonceKey, record: ConsumeRecord) -> Result<(), LedgerError> {
		self.backend.commit(key, record)?;
		tracing::debug!(key = %key, beneficiary = %record.beneficiary, "Identifier consumed");
		Ok(())
	}

	pub fn release(&self, key: NonceKey) -> Result<(), LedgerError> {
		self.backend.release(key)?;
		tracing::debug!(key = %key, "Reservation released");
		Ok(())
	}

	pub fn contains(&self, key: &NonceKey) -> Result<bool, LedgerError> {
		self.backend.contains(key)
	}

	pub fn len(&self) -> usize {
		self.backend.len()
	}

	pub fn is_empty(&self) -> bool {
		self.backend.is_empty()
	}
}
