//! Conversion utilities for textual gate inputs.
//!
//! Addresses, identifiers and signatures arrive as strings from TOML, JSON and
//! the command line. These helpers produce the typed values or a readable
//! error message.

use super::formatting::without_0x_prefix;
use alloy_primitives::{hex, Address, Bytes, U256};

/// Parses a 20-byte hex address, with or without "0x" prefix.
///
/// Checksums are not enforced; mixed-case input is accepted as-is.
pub fn parse_address(value: &str) -> Result<Address, String> {
	let raw = without_0x_prefix(value.trim());
	if raw.len() != 40 {
		return Err(format!(
			"address must be 20 bytes (40 hex characters), got {} characters",
			raw.len()
		));
	}
	let bytes = hex::decode(raw).map_err(|e| format!("invalid address hex: {}", e))?;
	Ok(Address::from_slice(&bytes))
}

/// Parses an authorization identifier.
///
/// Values starting with "0x" are read as hex, everything else as decimal.
pub fn parse_identifier(value: &str) -> Result<U256, String> {
	let value = value.trim();
	if value.is_empty() {
		return Err("identifier cannot be empty".to_string());
	}
	let parsed = if value.starts_with("0x") || value.starts_with("0X") {
		U256::from_str_radix(without_0x_prefix(value), 16)
	} else {
		U256::from_str_radix(value, 10)
	};
	parsed.map_err(|e| format!("invalid identifier '{}': {}", value, e))
}

/// Parses hex-encoded signature bytes. Length is checked by the verifier.
pub fn parse_signature(value: &str) -> Result<Bytes, String> {
	hex::decode(without_0x_prefix(value.trim()))
		.map(Bytes::from)
		.map_err(|e| format!("invalid signature hex: {}", e))
}
