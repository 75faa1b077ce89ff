//! The authorization gate.
//!
//! Verifies a signed allowance, enforces the tier rule, consumes the
//! identifier exactly once and triggers issuance. All checks happen before any
//! state changes, and a failed issuance hands the identifier back, so a
//! rejected call leaves the ledger and the sink as they were.

use crate::encoder::MessageEncoder;
use crate::issuance::IssuanceSink;
use crate::verifier::{SignatureError, SignatureVerifier};
use arc_swap::ArcSwap;
use gate_storage::{LedgerError, NonceLedger};
use gate_types::{
	current_timestamp, Address, AuthorizationKind, AuthorizationReceipt,
	AuthorizationToken, ConsumeRecord, GateParameters, NonceKey, NonceScope, TierNonce, U256,
};
use std::sync::Arc;
use thiserror::Error;
use tracing::instrument;

/// Errors returned by the gate. Every variant rejects the whole call.
#[derive(Debug, Error)]
pub enum GateError {
	/// Malformed signature, or a valid one from a key other than the trusted signer.
	#[error("Invalid signature: {reason}")]
	InvalidSignature {
		#[source]
		reason: SignatureError,
	},
	/// Tiered identifier carries a tier other than the current one.
	#[error("Wrong tier: expected {expected}, got {actual}")]
	WrongTier { expected: u128, actual: u128 },
	/// Identifier was consumed before.
	#[error("Identifier already used: {identifier}")]
	AlreadyUsed { identifier: U256 },
	/// The identifier grants zero units.
	#[error("Authorization grants zero units")]
	ZeroQuantity,
	/// The issuance sink refused; the identifier was not consumed.
	#[error("Issuance failed: {0}")]
	IssuanceFailed(String),
	/// The ledger backend failed.
	#[error("Ledger error: {0}")]
	Ledger(String),
}

impl GateError {
	/// Stable machine-readable code.
	pub fn code(&self) -> &'static str {
		match self {
			GateError::InvalidSignature { .. } => "INVALID_SIGNATURE",
			GateError::WrongTier { .. } => "WRONG_TIER",
			GateError::AlreadyUsed { .. } => "ALREADY_USED",
			GateError::ZeroQuantity => "ZERO_QUANTITY",
			GateError::IssuanceFailed(_) => "ISSUANCE_FAILED",
			GateError::Ledger(_) => "LEDGER_ERROR",
		}
	}
}

/// One authorization attempt.
#[derive(Debug, Clone, Copy)]
pub struct AuthorizationRequest<'a> {
	/// Account submitting the allowance.
	pub caller: Address,
	/// Account to credit; the caller when `None`.
	pub beneficiary: Option<Address>,
	pub identifier: U256,
	pub signature: &'a [u8],
	pub kind: AuthorizationKind,
}

impl<'a> AuthorizationRequest<'a> {
	/// Builds a delegated request from a token handed to `caller`.
	pub fn from_token(
		caller: Address,
		token: &'a AuthorizationToken,
		kind: AuthorizationKind,
	) -> Self {
		Self {
			caller,
			beneficiary: Some(token.beneficiary),
			identifier: token.identifier,
			signature: token.signature.as_ref(),
			kind,
		}
	}

	/// Account that will be credited.
	pub fn beneficiary(&self) -> Address {
		self.beneficiary.unwrap_or(self.caller)
	}
}

/// Administrative handle over the gate parameters.
///
/// Whoever holds this can rotate the trusted signer and change the tier.
/// Updates replace the whole parameter snapshot; an authorization in flight
/// finishes against the snapshot it started with.
#[derive(Clone)]
pub struct GateAdmin {
	gate_id: String,
	parameters: Arc<ArcSwap<GateParameters>>,
}

impl GateAdmin {
	/// Replaces the trusted signer, invalidating every signature of the old one.
	pub fn set_trusted_signer(&self, signer: Address) -> GateParameters {
		let previous = self.parameters.rcu(|current| GateParameters {
			trusted_signer: signer,
			..**current
		});
		tracing::info!(
			gate = %self.gate_id,
			previous = %previous.trusted_signer,
			current = %signer,
			"Trusted signer rotated"
		);
		self.parameters()
	}

	/// Sets the tier that tiered identifiers must carry.
	pub fn set_current_tier(&self, tier: u128) -> GateParameters {
		let previous = self.parameters.rcu(|current| GateParameters {
			current_tier: tier,
			..**current
		});
		tracing::info!(
			gate = %self.gate_id,
			previous = previous.current_tier,
			current = tier,
			"Current tier changed"
		);
		self.parameters()
	}

	pub fn parameters(&self) -> GateParameters {
		**self.parameters.load()
	}
}

/// Verifies signed allowances and issues what they grant.
pub struct AuthorizationGate {
	id: String,
	encoder: MessageEncoder,
	scope: NonceScope,
	parameters: Arc<ArcSwap<GateParameters>>,
	ledger: Arc<NonceLedger>,
	issuance: Arc<dyn IssuanceSink>,
}

impl AuthorizationGate {
	/// Creates a gate and the administrative handle over its parameters.
	pub fn new(
		id: impl Into<String>,
		encoder: MessageEncoder,
		scope: NonceScope,
		parameters: GateParameters,
		ledger: Arc<NonceLedger>,
		issuance: Arc<dyn IssuanceSink>,
	) -> (Self, GateAdmin) {
		let id = id.into();
		let parameters = Arc::new(ArcSwap::from_pointee(parameters));
		let admin = GateAdmin {
			gate_id: id.clone(),
			parameters: parameters.clone(),
		};
		let gate = Self {
			id,
			encoder,
			scope,
			parameters,
			ledger,
			issuance,
		};
		(gate, admin)
	}

	pub fn id(&self) -> &str {
		&self.id
	}

	pub fn encoder(&self) -> &MessageEncoder {
		&self.encoder
	}

	pub fn nonce_scope(&self) -> NonceScope {
		self.scope
	}

	/// Current parameter snapshot.
	pub fn parameters(&self) -> GateParameters {
		**self.parameters.load()
	}

	/// Ledger key an identifier is tracked under for `beneficiary`.
	pub fn nonce_key(&self, beneficiary: Address, identifier: U256) -> NonceKey {
		NonceKey::new(self.scope, beneficiary, identifier)
	}

	/// Whether `identifier` has been consumed.
	///
	/// `beneficiary` is only consulted under per-beneficiary scoping.
	pub fn is_consumed(&self, beneficiary: Address, identifier: U256) -> Result<bool, GateError> {
		self.ledger
			.contains(&self.nonce_key(beneficiary, identifier))
			.map_err(|e| GateError::Ledger(e.to_string()))
	}

	/// Issued balance of `account`, if the sink tracks balances.
	pub fn balance_of(&self, account: Address) -> Option<U256> {
		self.issuance.balance_of(account)
	}

	/// Runs one authorization through signature, tier, quantity, ledger and
	/// issuance, in that order.
	///
	/// The identifier is reserved before issuance and committed after it. While
	/// the reservation is held, any other attempt on the same key fails with
	/// [`GateError::AlreadyUsed`]. If the sink then refuses, the reservation is
	/// released and the identifier becomes redeemable again, so a caller turned
	/// away during that window may retry and succeed.
	#[instrument(
		skip_all,
		fields(
			gate = %self.id,
			kind = %request.kind,
			identifier = %request.identifier,
		)
	)]
	pub fn redeem(
		&self,
		request: &AuthorizationRequest<'_>,
	) -> Result<AuthorizationReceipt, GateError> {
		let params = self.parameters();
		let beneficiary = request.beneficiary();
		let identifier = request.identifier;

		let digest = self.encoder.digest(beneficiary, identifier);
		let prehash = MessageEncoder::signed_message_hash(&digest);
		if let Err(reason) =
			SignatureVerifier::verify(&prehash, request.signature, params.trusted_signer)
		{
			tracing::warn!(
				caller = %request.caller,
				beneficiary = %beneficiary,
				error = %reason,
				"Rejected authorization with invalid signature"
			);
			return Err(GateError::InvalidSignature { reason });
		}

		let tier = if request.kind.tiered {
			let decoded = TierNonce::decode(identifier);
			if decoded.tier != params.current_tier {
				tracing::warn!(
					expected = params.current_tier,
					actual = decoded.tier,
					"Rejected authorization for wrong tier"
				);
				return Err(GateError::WrongTier {
					expected: params.current_tier,
					actual: decoded.tier,
				});
			}
			Some(decoded)
		} else {
			None
		};

		let quantity = match (request.kind.batch, tier) {
			(false, _) => U256::from(1u8),
			(true, Some(tier)) => tier.sequence_u256(),
			(true, None) => identifier,
		};
		if quantity.is_zero() {
			tracing::warn!("Rejected authorization granting zero units");
			return Err(GateError::ZeroQuantity);
		}

		let key = self.nonce_key(beneficiary, identifier);
		self.ledger.reserve(key).map_err(|e| match e {
			LedgerError::AlreadyUsed(_) => {
				tracing::warn!(key = %key, "Rejected reused identifier");
				GateError::AlreadyUsed { identifier }
			},
			other => {
				tracing::error!(key = %key, error = %other, "Ledger reservation failed");
				GateError::Ledger(other.to_string())
			},
		})?;

		if let Err(e) = self.issuance.issue_units(beneficiary, quantity) {
			tracing::warn!(
				beneficiary = %beneficiary,
				quantity = %quantity,
				error = %e,
				"Issuance refused"
			);
			if let Err(release_err) = self.ledger.release(key) {
				tracing::error!(key = %key, error = %release_err, "Failed to release reservation");
			}
			return Err(GateError::IssuanceFailed(e.to_string()));
		}

		let record = ConsumeRecord {
			beneficiary,
			consumed_at: current_timestamp(),
		};
		if let Err(e) = self.ledger.commit(key, record) {
			// Units are issued; the reservation stays held so the key cannot be reused here.
			tracing::error!(key = %key, error = %e, "Failed to persist consumed identifier");
			return Err(GateError::Ledger(e.to_string()));
		}

		tracing::info!(
			caller = %request.caller,
			beneficiary = %beneficiary,
			quantity = %quantity,
			"Authorization redeemed"
		);

		Ok(AuthorizationReceipt {
			caller: request.caller,
			beneficiary,
			identifier,
			tier: tier.map(|t| t.tier),
			quantity,
			digest,
		})
	}

	fn redeem_with(
		&self,
		caller: Address,
		beneficiary: Option<Address>,
		identifier: U256,
		signature: &[u8],
		kind: AuthorizationKind,
	) -> Result<AuthorizationReceipt, GateError> {
		self.redeem(&AuthorizationRequest {
			caller,
			beneficiary,
			identifier,
			signature,
			kind,
		})
	}

	/// One unit to the caller.
	pub fn authorize(
		&self,
		caller: Address,
		identifier: U256,
		signature: &[u8],
	) -> Result<AuthorizationReceipt, GateError> {
		self.redeem_with(caller, None, identifier, signature, AuthorizationKind::SINGLE)
	}

	/// One unit to `beneficiary`, submitted by `caller`.
	pub fn authorize_for(
		&self,
		caller: Address,
		beneficiary: Address,
		identifier: U256,
		signature: &[u8],
	) -> Result<AuthorizationReceipt, GateError> {
		self.redeem_with(
			caller,
			Some(beneficiary),
			identifier,
			signature,
			AuthorizationKind::SINGLE,
		)
	}

	/// `identifier` units to the caller.
	pub fn authorize_batch(
		&self,
		caller: Address,
		identifier: U256,
		signature: &[u8],
	) -> Result<AuthorizationReceipt, GateError> {
		self.redeem_with(caller, None, identifier, signature, AuthorizationKind::BATCH)
	}

	/// `identifier` units to `beneficiary`.
	pub fn authorize_batch_for(
		&self,
		caller: Address,
		beneficiary: Address,
		identifier: U256,
		signature: &[u8],
	) -> Result<AuthorizationReceipt, GateError> {
		self.redeem_with(
			caller,
			Some(beneficiary),
			identifier,
			signature,
			AuthorizationKind::BATCH,
		)
	}

	/// One unit to the caller if the identifier's tier is current.
	pub fn authorize_tiered(
		&self,
		caller: Address,
		identifier: U256,
		signature: &[u8],
	) -> Result<AuthorizationReceipt, GateError> {
		self.redeem_with(caller, None, identifier, signature, AuthorizationKind::TIERED)
	}

	/// One unit to `beneficiary` if the identifier's tier is current.
	pub fn authorize_tiered_for(
		&self,
		caller: Address,
		beneficiary: Address,
		identifier: U256,
		signature: &[u8],
	) -> Result<AuthorizationReceipt, GateError> {
		self.redeem_with(
			caller,
			Some(beneficiary),
			identifier,
			signature,
			AuthorizationKind::TIERED,
		)
	}

	/// Sequence-many units to the caller if the identifier's tier is current.
	pub fn authorize_tiered_batch(
		&self,
		caller: Address,
		identifier: U256,
		signature: &[u8],
	) -> Result<AuthorizationReceipt, GateError> {
		self.redeem_with(
			caller,
			None,
			identifier,
			signature,
			AuthorizationKind::TIERED_BATCH,
		)
	}

	/// Sequence-many units to `beneficiary` if the identifier's tier is current.
	pub fn authorize_tiered_batch_for(
		&self,
		caller: Address,
		beneficiary: Address,
		identifier: U256,
		signature: &[u8],
	) -> Result<AuthorizationReceipt, GateError> {
		self.redeem_with(
			caller,
			Some(beneficiary),
			identifier,
			signature,
			AuthorizationKind::TIERED_BATCH,
		)
	}
}
