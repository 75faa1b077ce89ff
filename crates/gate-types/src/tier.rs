//! Tier encoding for authorization identifiers.
//!
//! A tiered identifier packs two independent fields into one 256-bit word:
//!
//! ```text
//! identifier = tier * 2^128 + sequence
//!              |-- bits 128..256 --|-- bits 0..128 --|
//! ```
//!
//! All bit arithmetic for this packing lives here. Call sites work with
//! [`TierNonce`] and never shift or mask identifiers themselves.

use alloy_primitives::U256;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Number of low bits reserved for the per-tier sequence.
pub const SEQUENCE_BITS: usize = 128;

/// Errors that can occur while encoding a tiered identifier.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TierCodecError {
	/// The sequence does not fit below bit 128 and would carry into the tier field.
	#[error("Sequence {0} does not fit in {SEQUENCE_BITS} bits")]
	SequenceOverflow(U256),
}

/// An authorization identifier split into its tier and per-tier sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TierNonce {
	/// Tier the authorization is valid for.
	pub tier: u128,
	/// Sequence number within the tier.
	pub sequence: u128,
}

impl TierNonce {
	/// Creates a tier nonce from already-bounded parts.
	pub const fn new(tier: u128, sequence: u128) -> Self {
		Self { tier, sequence }
	}

	/// Encodes `tier * 2^128 + sequence`.
	///
	/// Fails with [`TierCodecError::SequenceOverflow`] when `sequence >= 2^128`.
	pub fn encode(tier: u128, sequence: U256) -> Result<U256, TierCodecError> {
		let sequence: u128 = sequence
			.try_into()
			.map_err(|_| TierCodecError::SequenceOverflow(sequence))?;
		Ok(Self::new(tier, sequence).to_identifier())
	}

	/// Splits an identifier into tier and sequence. Total over all 256-bit values.
	pub fn decode(identifier: U256) -> Self {
		let tier = identifier >> SEQUENCE_BITS;
		let sequence = identifier & sequence_mask();

		// Both halves are < 2^128 after the shift and mask.
		Self {
			tier: tier.to::<u128>(),
			sequence: sequence.to::<u128>(),
		}
	}

	/// Packs this pair back into a single identifier.
	pub fn to_identifier(self) -> U256 {
		(U256::from(self.tier) << SEQUENCE_BITS) | U256::from(self.sequence)
	}

	/// Returns the sequence as a 256-bit quantity.
	pub fn sequence_u256(self) -> U256 {
		U256::from(self.sequence)
	}
}

impl From<TierNonce> for U256 {
	fn from(nonce: TierNonce) -> Self {
		nonce.to_identifier()
	}
}

fn sequence_mask() -> U256 {
	(U256::from(1u8) << SEQUENCE_BITS) - U256::from(1u8)
}

#[cfg(test)]
mod tests {
	use super::*;

	fn two_pow_128() -> U256 {
		U256::from(1u8) << 128
	}

	#[test]
	fn test_encode_places_tier_above_bit_128() {
		let id = TierNonce::encode(1, U256::from(1u8)).unwrap();
		assert_eq!(id, two_pow_128() + U256::from(1u8));

		let id = TierNonce::encode(2, U256::from(3u8)).unwrap();
		assert_eq!(id, two_pow_128() * U256::from(2u8) + U256::from(3u8));
	}

	#[test]
	fn test_decode_roundtrip_at_boundaries() {
		let cases = [
			(0u128, 0u128),
			(0, u128::MAX),
			(1, 0),
			(7, 42),
			(u128::MAX, u128::MAX),
		];
		for (tier, sequence) in cases {
			let id = TierNonce::encode(tier, U256::from(sequence)).unwrap();
			assert_eq!(TierNonce::decode(id), TierNonce::new(tier, sequence));
		}
	}

	#[test]
	fn test_sequence_overflow_rejected() {
		let result = TierNonce::encode(1, two_pow_128());
		assert_eq!(result, Err(TierCodecError::SequenceOverflow(two_pow_128())));
	}

	#[test]
	fn test_decode_is_total() {
		let decoded = TierNonce::decode(U256::MAX);
		assert_eq!(decoded.tier, u128::MAX);
		assert_eq!(decoded.sequence, u128::MAX);

		// Untiered identifiers decode to tier 0.
		let decoded = TierNonce::decode(U256::from(5u8));
		assert_eq!(decoded, TierNonce::new(0, 5));
	}
}
