//! Authorization types shared by the gate, the ledger and the signing tools.

use crate::utils::serde_helpers::{identifier_serde, signature_serde};
use alloy_primitives::{Address, Bytes, B256, U256};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A caller-presented authorization: who benefits, which identifier, and the
/// authorizer's signature over both (bound to the verifying context).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationToken {
	/// Account credited by the issuance.
	pub beneficiary: Address,
	/// Authorization identifier (nonce), possibly tier-encoded.
	#[serde(with = "identifier_serde")]
	pub identifier: U256,
	/// Signature bytes as produced by the off-core signer.
	#[serde(with = "signature_serde")]
	pub signature: Bytes,
}

/// Selects one of the calling conventions.
///
/// Self and delegated variants are distinguished by whether a beneficiary is
/// supplied with the request, not by the kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct AuthorizationKind {
	/// Require the identifier's tier to equal the current tier.
	#[serde(default)]
	pub tiered: bool,
	/// Issue a quantity encoded in the identifier instead of a single unit.
	#[serde(default)]
	pub batch: bool,
}

impl AuthorizationKind {
	pub const SINGLE: Self = Self {
		tiered: false,
		batch: false,
	};
	pub const BATCH: Self = Self {
		tiered: false,
		batch: true,
	};
	pub const TIERED: Self = Self {
		tiered: true,
		batch: false,
	};
	pub const TIERED_BATCH: Self = Self {
		tiered: true,
		batch: true,
	};
}

impl fmt::Display for AuthorizationKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let name = match (self.tiered, self.batch) {
			(false, false) => "single",
			(false, true) => "batch",
			(true, false) => "tiered",
			(true, true) => "tiered_batch",
		};
		f.write_str(name)
	}
}

/// Result of a successful authorization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationReceipt {
	/// Account that submitted the authorization.
	pub caller: Address,
	/// Account that received the issued units.
	pub beneficiary: Address,
	/// Consumed identifier.
	#[serde(with = "identifier_serde")]
	pub identifier: U256,
	/// Tier the identifier was checked against, for tiered calls.
	pub tier: Option<u128>,
	/// Number of units issued.
	#[serde(with = "identifier_serde")]
	pub quantity: U256,
	/// Digest the signature was verified over.
	pub digest: B256,
}

/// How consumed identifiers are keyed in the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NonceScope {
	/// One identifier can be consumed once across all beneficiaries.
	#[default]
	Global,
	/// Each beneficiary has an independent identifier space.
	Beneficiary,
}

impl NonceScope {
	pub fn as_str(&self) -> &'static str {
		match self {
			NonceScope::Global => "global",
			NonceScope::Beneficiary => "beneficiary",
		}
	}
}

impl FromStr for NonceScope {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"global" => Ok(Self::Global),
			"beneficiary" => Ok(Self::Beneficiary),
			other => Err(format!(
				"unknown nonce scope '{}', expected 'global' or 'beneficiary'",
				other
			)),
		}
	}
}

/// Byte layout of the signed authorization message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageLayout {
	/// `beneficiary(20) || identifier(32) || context(20)`.
	#[default]
	Packed,
	/// Three 32-byte ABI words, addresses left-padded with zeros.
	AbiEncoded,
}

impl MessageLayout {
	pub fn as_str(&self) -> &'static str {
		match self {
			MessageLayout::Packed => "packed",
			MessageLayout::AbiEncoded => "abi_encoded",
		}
	}

	/// Length in bytes of an encoded message.
	pub const fn encoded_len(&self) -> usize {
		match self {
			MessageLayout::Packed => 20 + 32 + 20,
			MessageLayout::AbiEncoded => 32 * 3,
		}
	}
}

impl FromStr for MessageLayout {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"packed" => Ok(Self::Packed),
			"abi_encoded" => Ok(Self::AbiEncoded),
			other => Err(format!(
				"unknown message layout '{}', expected 'packed' or 'abi_encoded'",
				other
			)),
		}
	}
}

/// Parameters read by every authorization check.
///
/// The gate holds one of these as an immutable snapshot and swaps it as a
/// whole, so a single authorization never observes a signer from one update
/// and a tier from another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateParameters {
	/// Address whose signatures are accepted.
	pub trusted_signer: Address,
	/// Tier that tiered identifiers must carry.
	pub current_tier: u128,
}
