//! Keys and records stored by the nonce ledger.

use crate::authorization::NonceScope;
use alloy_primitives::{hex, Address, U256};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Ledger key of one authorization identifier.
///
/// Under [`NonceScope::Global`] the owner is always `None`, so the same raw
/// identifier collides across beneficiaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NonceKey {
	/// Beneficiary the identifier is scoped to, if scoping is per beneficiary.
	pub owner: Option<Address>,
	/// The raw identifier.
	pub identifier: U256,
}

impl NonceKey {
	pub fn new(scope: NonceScope, beneficiary: Address, identifier: U256) -> Self {
		let owner = match scope {
			NonceScope::Global => None,
			NonceScope::Beneficiary => Some(beneficiary),
		};
		Self { owner, identifier }
	}

	pub const fn global(identifier: U256) -> Self {
		Self {
			owner: None,
			identifier,
		}
	}
}

/// Text form used by the append-only log: `*:<hex id>` or `<address>:<hex id>`.
impl fmt::Display for NonceKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self.owner {
			Some(owner) => write!(f, "{}:{:#x}", hex::encode_prefixed(owner), self.identifier),
			None => write!(f, "*:{:#x}", self.identifier),
		}
	}
}

impl FromStr for NonceKey {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let (owner, identifier) = s
			.split_once(':')
			.ok_or_else(|| format!("nonce key '{}' is missing ':' separator", s))?;
		let owner = match owner {
			"*" => None,
			other => Some(crate::utils::parse_address(other)?),
		};
		let identifier = crate::utils::parse_identifier(identifier)?;
		Ok(Self { owner, identifier })
	}
}

/// Facts recorded alongside a consumed key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsumeRecord {
	/// Beneficiary credited when the key was consumed.
	pub beneficiary: Address,
	/// UNIX seconds at consumption.
	pub consumed_at: u64,
}
