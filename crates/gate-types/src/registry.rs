//! Registry trait for self-registering implementations.
//!
//! Every pluggable implementation (ledger backend, issuance sink, signer)
//! exposes a `Registry` type naming the configuration key it answers to and
//! the factory that builds it.

/// Base trait for implementation registries.
pub trait ImplementationRegistry {
	/// The name used in configuration files to reference this implementation.
	///
	/// For example `"memory"` for `[ledger.implementations.memory]` or
	/// `"local"` for `[account.implementations.local]`.
	const NAME: &'static str;

	/// The factory function type this implementation provides.
	type Factory;

	/// Returns the factory that builds this implementation from its TOML table.
	fn factory() -> Self::Factory;
}
