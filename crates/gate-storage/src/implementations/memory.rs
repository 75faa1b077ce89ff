//! In-memory ledger backend.
//!
//! Keys live in a `DashMap`; the entry API holds the shard lock for the key
//! while it is checked and claimed. State is lost on restart, so this backend
//! suits tests and development.

use crate::{LedgerError, LedgerRegistry, NonceLedgerInterface};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use gate_types::{
	ConfigSchema, ConsumeRecord, ImplementationRegistry, NonceKey, Schema, ValidationError,
};

/// State of a key that has left `Unused`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Slot {
	Reserved,
	Consumed(ConsumeRecord),
}

/// Claims `key` in `slots` if it is absent.
pub(crate) fn reserve_slot(
	slots: &DashMap<NonceKey, Slot>,
	key: NonceKey,
) -> Result<(), LedgerError> {
	match slots.entry(key) {
		Entry::Occupied(_) => Err(LedgerError::AlreadyUsed(key)),
		Entry::Vacant(entry) => {
			entry.insert(Slot::Reserved);
			Ok(())
		},
	}
}

/// Removes a reservation, leaving consumed keys untouched.
pub(crate) fn release_slot(
	slots: &DashMap<NonceKey, Slot>,
	key: NonceKey,
) -> Result<(), LedgerError> {
	slots
		.remove_if(&key, |_, slot| *slot == Slot::Reserved)
		.map(|_| ())
		.ok_or(LedgerError::NotReserved(key))
}

/// Checks that `key` holds a reservation.
pub(crate) fn ensure_reserved(
	slots: &DashMap<NonceKey, Slot>,
	key: NonceKey,
) -> Result<(), LedgerError> {
	match slots.get(&key).map(|slot| *slot) {
		Some(Slot::Reserved) => Ok(()),
		_ => Err(LedgerError::NotReserved(key)),
	}
}

pub(crate) fn count_consumed(slots: &DashMap<NonceKey, Slot>) -> usize {
	slots
		.iter()
		.filter(|entry| matches!(entry.value(), Slot::Consumed(_)))
		.count()
}

/// In-memory ledger implementation.
pub struct MemoryLedger {
	slots: DashMap<NonceKey, Slot>,
}

impl MemoryLedger {
	/// Creates a new empty MemoryLedger.
	pub fn new() -> Self {
		Self {
			slots: DashMap::new(),
		}
	}
}

impl Default for MemoryLedger {
	fn default() -> Self {
		Self::new()
	}
}

impl NonceLedgerInterface for MemoryLedger {
	fn reserve(&self, key: NonceKey) -> Result<(), LedgerError> {
		reserve_slot(&self.slots, key)
	}

	fn commit(&self, key: NonceKey, record: ConsumeRecord) -> Result<(), LedgerError> {
		match self.slots.get_mut(&key) {
			Some(mut slot) if *slot == Slot::Reserved => {
				*slot = Slot::Consumed(record);
				Ok(())
			},
			_ => Err(LedgerError::NotReserved(key)),
		}
	}

	fn release(&self, key: NonceKey) -> Result<(), LedgerError> {
		release_slot(&self.slots, key)
	}

	fn contains(&self, key: &NonceKey) -> Result<bool, LedgerError> {
		Ok(matches!(
			self.slots.get(key).map(|slot| *slot),
			Some(Slot::Consumed(_))
		))
	}

	fn len(&self) -> usize {
		count_consumed(&self.slots)
	}

	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(MemoryLedgerSchema)
	}
}

/// Configuration schema for MemoryLedger.
pub struct MemoryLedgerSchema;

impl ConfigSchema for MemoryLedgerSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		// No configuration keys
		Schema::new(vec![], vec![]).validate(config)
	}
}

/// Factory function to create a memory ledger from configuration.
pub fn create_ledger(config: &toml::Value) -> Result<Box<dyn NonceLedgerInterface>, LedgerError> {
	MemoryLedgerSchema
		.validate(config)
		.map_err(|e| LedgerError::Configuration(e.to_string()))?;
	Ok(Box::new(MemoryLedger::new()))
}

/// Registry for the memory ledger implementation.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "memory";
	type Factory = crate::LedgerFactory;

	fn factory() -> Self::Factory {
		create_ledger
	}
}

impl LedgerRegistry for Registry {}
