//! Common types for the allowance gate.
//!
//! This module defines the data types shared by the gate core, the nonce
//! ledger, the signing tools and the HTTP service.

/// API types for HTTP endpoints and request/response structures.
pub mod api;
/// Authorization tokens, receipts and gate parameters.
pub mod authorization;
/// Ledger keys and consumption records.
pub mod ledger;
/// Registry trait for self-registering implementations.
pub mod registry;
/// Secure string type for handling sensitive data.
pub mod secret_string;
/// Tier encoding of authorization identifiers.
pub mod tier;
/// Utility functions for common type conversions.
pub mod utils;
/// Configuration validation types for ensuring type-safe configurations.
pub mod validation;

pub use alloy_primitives::{Address, Bytes, B256, U256};
pub use api::*;
pub use authorization::*;
pub use ledger::*;
pub use registry::ImplementationRegistry;
pub use secret_string::SecretString;
pub use tier::{TierCodecError, TierNonce, SEQUENCE_BITS};
pub use utils::{
	current_timestamp, parse_address, parse_identifier, parse_signature, truncate_id,
	without_0x_prefix,
};
pub use validation::*;
