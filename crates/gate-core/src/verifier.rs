//! Recovery of the signing address from an authorization signature.
//!
//! Accepts the 65-byte `r || s || v` form with `v` in {0, 1, 27, 28} and the
//! 64-byte EIP-2098 compact form `r || (yParity << 255 | s)`. Signatures with
//! a zero component or an upper-half `s` are rejected so every accepted
//! signature has exactly one encoding.

use alloy_primitives::{uint, Address, PrimitiveSignature, B256, U256};
use thiserror::Error;

/// `secp256k1n / 2`; larger `s` values are the malleable twin of a valid signature.
const HALF_CURVE_ORDER: U256 =
	uint!(0x7FFFFFFFFFFFFFFFFFFFFFFFFFFFFFFF5D576E7357A4501DDFE92F46681B20A0_U256);

/// Errors that can occur while checking a signature.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignatureError {
	#[error("Invalid signature length: {0} bytes")]
	InvalidLength(usize),
	#[error("Invalid recovery id: {0}")]
	InvalidRecoveryId(u8),
	#[error("Signature component {0} is zero")]
	ZeroComponent(&'static str),
	#[error("Signature s value is in the upper half of the curve order")]
	NonCanonicalS,
	#[error("Public key recovery failed: {0}")]
	RecoveryFailed(String),
	/// The signature is well formed but made by a different key.
	#[error("Signer mismatch: expected {expected}, recovered {recovered}")]
	SignerMismatch { expected: Address, recovered: Address },
}

impl SignatureError {
	/// True for malformed signatures, false for a valid signature from the wrong key.
	pub fn is_encoding_error(&self) -> bool {
		!matches!(self, SignatureError::SignerMismatch { .. })
	}
}

/// Stateless signature checks.
#[derive(Debug, Clone, Copy, Default)]
pub struct SignatureVerifier;

impl SignatureVerifier {
	/// Recovers the address that signed `prehash`.
	///
	/// `prehash` is the exact 32-byte value that was signed, i.e. after any
	/// EIP-191 wrapping.
	pub fn recover(prehash: &B256, signature: &[u8]) -> Result<Address, SignatureError> {
		let (r, s, y_parity) = split(signature)?;

		if r.is_zero() {
			return Err(SignatureError::ZeroComponent("r"));
		}
		if s.is_zero() {
			return Err(SignatureError::ZeroComponent("s"));
		}
		if s > HALF_CURVE_ORDER {
			return Err(SignatureError::NonCanonicalS);
		}

		PrimitiveSignature::new(r, s, y_parity)
			.recover_address_from_prehash(prehash)
			.map_err(|e| SignatureError::RecoveryFailed(e.to_string()))
	}

	/// Recovers the signer and checks it equals `expected`.
	pub fn verify(
		prehash: &B256,
		signature: &[u8],
		expected: Address,
	) -> Result<(), SignatureError> {
		let recovered = Self::recover(prehash, signature)?;
		if recovered != expected {
			return Err(SignatureError::SignerMismatch {
				expected,
				recovered,
			});
		}
		Ok(())
	}
}

/// Splits raw bytes into `(r, s, y_parity)`.
fn split(signature: &[u8]) -> Result<(U256, U256, bool), SignatureError> {
	match signature.len() {
		65 => {
			let r = U256::from_be_slice(&signature[..32]);
			let s = U256::from_be_slice(&signature[32..64]);
			let y_parity = match signature[64] {
				0 | 27 => false,
				1 | 28 => true,
				v => return Err(SignatureError::InvalidRecoveryId(v)),
			};
			Ok((r, s, y_parity))
		},
		64 => {
			let r = U256::from_be_slice(&signature[..32]);
			let vs = U256::from_be_slice(&signature[32..]);
			let y_parity = vs.bit(255);
			let s = vs & (U256::MAX >> 1);
			Ok((r, s, y_parity))
		},
		len => Err(SignatureError::InvalidLength(len)),
	}
}
