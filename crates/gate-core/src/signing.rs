//! Allowance signing for the off-core issuer.
//!
//! Produces signatures the gate accepts, using the same encoder the gate
//! verifies with.

use crate::encoder::MessageEncoder;
use gate_account::{AccountError, AccountService};
use gate_types::utils::serde_helpers::{identifier_serde, signature_serde};
use gate_types::{
	truncate_id, Address, AuthorizationToken, Bytes, TierCodecError, TierNonce, B256, U256,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;

/// Errors that can occur while signing allowances.
#[derive(Debug, Error)]
pub enum SigningError {
	#[error("Account error: {0}")]
	Account(#[from] AccountError),
	#[error("Tier encoding error: {0}")]
	Tier(#[from] TierCodecError),
}

/// A signed allowance as handed to a beneficiary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedAllowance {
	/// Units or sequence the allowance was requested for.
	#[serde(with = "identifier_serde")]
	pub allowance: U256,
	/// Identifier to submit; equals `allowance` unless tier-encoded.
	#[serde(with = "identifier_serde")]
	pub identifier: U256,
	/// Message digest before the EIP-191 wrap.
	pub message: B256,
	#[serde(with = "signature_serde")]
	pub signature: Bytes,
}

impl SignedAllowance {
	/// Token form for delegated submission on behalf of `beneficiary`.
	pub fn to_token(&self, beneficiary: Address) -> AuthorizationToken {
		AuthorizationToken {
			beneficiary,
			identifier: self.identifier,
			signature: self.signature.clone(),
		}
	}
}

/// Signs allowances with the authorizer account.
pub struct AllowanceSigner {
	account: Arc<AccountService>,
	encoder: MessageEncoder,
}

impl AllowanceSigner {
	pub fn new(account: Arc<AccountService>, encoder: MessageEncoder) -> Self {
		Self { account, encoder }
	}

	/// Address the gate must trust for these signatures to verify.
	pub async fn signer_address(&self) -> Result<Address, SigningError> {
		Ok(self.account.get_address().await?)
	}

	/// Signs `identifier` for `beneficiary`.
	pub async fn sign_allowance(
		&self,
		beneficiary: Address,
		identifier: U256,
	) -> Result<SignedAllowance, SigningError> {
		self.sign(beneficiary, identifier, identifier).await
	}

	/// Signs sequence `sequence` of `tier` for `beneficiary`.
	pub async fn sign_tier_allowance(
		&self,
		beneficiary: Address,
		tier: u128,
		sequence: U256,
	) -> Result<SignedAllowance, SigningError> {
		let identifier = TierNonce::encode(tier, sequence)?;
		self.sign(beneficiary, sequence, identifier).await
	}

	/// Signs one allowance per beneficiary, tier-encoding each value when
	/// `tier` is given.
	pub async fn sign_allowances(
		&self,
		allowances: &BTreeMap<Address, U256>,
		tier: Option<u128>,
	) -> Result<BTreeMap<Address, SignedAllowance>, SigningError> {
		let mut signed = BTreeMap::new();
		for (beneficiary, allowance) in allowances {
			let entry = match tier {
				Some(tier) => self.sign_tier_allowance(*beneficiary, tier, *allowance).await?,
				None => self.sign_allowance(*beneficiary, *allowance).await?,
			};
			signed.insert(*beneficiary, entry);
		}
		Ok(signed)
	}

	async fn sign(
		&self,
		beneficiary: Address,
		allowance: U256,
		identifier: U256,
	) -> Result<SignedAllowance, SigningError> {
		let message = self.encoder.digest(beneficiary, identifier);
		let signature = self.account.sign_message(message.as_slice()).await?;
		tracing::debug!(
			beneficiary = %beneficiary,
			identifier = %identifier,
			signature = %truncate_id(&alloy_primitives::hex::encode_prefixed(&signature)),
			"Signed allowance"
		);
		Ok(SignedAllowance {
			allowance,
			identifier,
			message,
			signature,
		})
	}
}
