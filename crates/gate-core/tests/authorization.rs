//! End-to-end authorization flows against an in-process gate.

use alloy_primitives::address;
use alloy_signer::SignerSync;
use alloy_signer_local::PrivateKeySigner;
use gate_account::implementations::local::LocalWallet;
use gate_account::AccountService;
use gate_core::{
	AllowanceSigner, AuthorizationGate, AuthorizationRequest, GateAdmin, GateError,
	IssuanceError, IssuanceSink, MemoryIssuance, MessageEncoder, SignatureError, SignatureVerifier,
};
use gate_storage::implementations::{file::FileLedger, memory::MemoryLedger};
use gate_storage::{NonceLedger, NonceLedgerInterface};
use gate_types::{
	Address, AuthorizationKind, ConfigSchema, GateParameters, MessageLayout, NonceScope,
	SecretString, U256,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock};

const CONTEXT: Address = address!("5fbdb2315678afecb367f032d93f642f64180aa3");
const SIGNER_KEY: &str = "0x59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d";
const SIGNER: Address = address!("70997970c51812dc3a010c7d01b50e0d17dc79c8");
const OTHER_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
const OTHER: Address = address!("f39fd6e51aad88f6f4ce6ab8827279cfffb92266");

const RANDOM: Address = address!("a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1");
const RANDOM2: Address = address!("a2a2a2a2a2a2a2a2a2a2a2a2a2a2a2a2a2a2a2a2");

struct Harness {
	gate: AuthorizationGate,
	admin: GateAdmin,
	signer: AllowanceSigner,
}

fn allowance_signer(key: &str, context: Address, layout: MessageLayout) -> AllowanceSigner {
	let wallet = LocalWallet::new(&SecretString::from(key)).unwrap();
	AllowanceSigner::new(
		Arc::new(AccountService::new(Box::new(wallet))),
		MessageEncoder::new(context, layout),
	)
}

fn gate_with(
	scope: NonceScope,
	layout: MessageLayout,
	ledger: Box<dyn NonceLedgerInterface>,
	issuance: MemoryIssuance,
) -> Harness {
	let (gate, admin) = AuthorizationGate::new(
		"test-gate",
		MessageEncoder::new(CONTEXT, layout),
		scope,
		GateParameters {
			trusted_signer: SIGNER,
			current_tier: 0,
		},
		Arc::new(NonceLedger::new(ledger)),
		Arc::new(issuance),
	);
	Harness {
		gate,
		admin,
		signer: allowance_signer(SIGNER_KEY, CONTEXT, layout),
	}
}

fn harness() -> Harness {
	gate_with(
		NonceScope::Global,
		MessageLayout::Packed,
		Box::new(MemoryLedger::new()),
		MemoryIssuance::default(),
	)
}

impl Harness {
	async fn sign(&self, beneficiary: Address, identifier: u64) -> (U256, Vec<u8>) {
		let signed = self
			.signer
			.sign_allowance(beneficiary, U256::from(identifier))
			.await
			.unwrap();
		(signed.identifier, signed.signature.to_vec())
	}

	async fn sign_tier(&self, beneficiary: Address, sequence: u64, tier: u128) -> (U256, Vec<u8>) {
		let signed = self
			.signer
			.sign_tier_allowance(beneficiary, tier, U256::from(sequence))
			.await
			.unwrap();
		(signed.identifier, signed.signature.to_vec())
	}

	fn balance(&self, account: Address) -> U256 {
		self.gate.balance_of(account).unwrap()
	}
}

#[tokio::test]
async fn can_authorize_with_signature() {
	let h = harness();
	let (id, sig) = h.sign(RANDOM, 1).await;

	let receipt = h.gate.authorize(RANDOM, id, &sig).unwrap();

	assert_eq!(receipt.beneficiary, RANDOM);
	assert_eq!(receipt.quantity, U256::from(1u8));
	assert_eq!(receipt.tier, None);
	assert_eq!(h.balance(RANDOM), U256::from(1u8));
}

#[tokio::test]
async fn can_authorize_for_another_account() {
	let h = harness();
	let (id, sig) = h.sign(RANDOM2, 1).await;

	let receipt = h.gate.authorize_for(RANDOM, RANDOM2, id, &sig).unwrap();

	assert_eq!(receipt.caller, RANDOM);
	assert_eq!(h.balance(RANDOM2), U256::from(1u8));
	assert_eq!(h.balance(RANDOM), U256::ZERO);
}

#[tokio::test]
async fn can_authorize_batch() {
	let h = harness();
	let (id, sig) = h.sign(RANDOM, 5).await;

	let receipt = h.gate.authorize_batch(RANDOM, id, &sig).unwrap();

	assert_eq!(receipt.quantity, U256::from(5u8));
	assert_eq!(h.balance(RANDOM), U256::from(5u8));
}

#[tokio::test]
async fn can_authorize_batch_for_another_account() {
	let h = harness();
	let (id, sig) = h.sign(RANDOM2, 4).await;

	h.gate.authorize_batch_for(RANDOM, RANDOM2, id, &sig).unwrap();

	assert_eq!(h.balance(RANDOM2), U256::from(4u8));
}

#[tokio::test]
async fn can_authorize_in_current_tier() {
	let h = harness();

	h.admin.set_current_tier(1);
	let (id, sig) = h.sign_tier(RANDOM, 1, 1).await;
	let receipt = h.gate.authorize_tiered(RANDOM, id, &sig).unwrap();
	assert_eq!(receipt.tier, Some(1));
	assert_eq!(h.balance(RANDOM), U256::from(1u8));

	// Same sequence in the next tier is a different identifier.
	h.admin.set_current_tier(2);
	let (id, sig) = h.sign_tier(RANDOM, 1, 2).await;
	h.gate.authorize_tiered(RANDOM, id, &sig).unwrap();
	assert_eq!(h.balance(RANDOM), U256::from(2u8));
}

#[tokio::test]
async fn can_authorize_in_current_tier_for_another_account() {
	let h = harness();

	for tier in 1..=2u128 {
		h.admin.set_current_tier(tier);
		let (id, sig) = h.sign_tier(RANDOM2, 1, tier).await;
		h.gate.authorize_tiered_for(RANDOM, RANDOM2, id, &sig).unwrap();
	}

	assert_eq!(h.balance(RANDOM2), U256::from(2u8));
	assert_eq!(h.balance(RANDOM), U256::ZERO);
}

#[tokio::test]
async fn can_authorize_batch_in_current_tier() {
	let h = harness();

	h.admin.set_current_tier(1);
	let (id, sig) = h.sign_tier(RANDOM, 3, 1).await;
	let receipt = h.gate.authorize_tiered_batch(RANDOM, id, &sig).unwrap();
	assert_eq!(receipt.quantity, U256::from(3u8));
	assert_eq!(h.balance(RANDOM), U256::from(3u8));

	h.admin.set_current_tier(2);
	let (id, sig) = h.sign_tier(RANDOM, 3, 2).await;
	h.gate.authorize_tiered_batch(RANDOM, id, &sig).unwrap();
	assert_eq!(h.balance(RANDOM), U256::from(6u8));
}

#[tokio::test]
async fn can_authorize_batch_in_current_tier_for_another_account() {
	let h = harness();

	for tier in 1..=2u128 {
		h.admin.set_current_tier(tier);
		let (id, sig) = h.sign_tier(RANDOM2, 2, tier).await;
		h.gate
			.authorize_tiered_batch_for(RANDOM, RANDOM2, id, &sig)
			.unwrap();
	}

	assert_eq!(h.balance(RANDOM2), U256::from(4u8));
}

#[tokio::test]
async fn cannot_reuse_a_signature() {
	let h = harness();
	let (id, sig) = h.sign(RANDOM, 1).await;

	h.gate.authorize(RANDOM, id, &sig).unwrap();
	let err = h.gate.authorize(RANDOM, id, &sig).unwrap_err();

	assert!(matches!(err, GateError::AlreadyUsed { identifier } if identifier == id));
	assert_eq!(h.balance(RANDOM), U256::from(1u8));
}

#[tokio::test]
async fn cannot_tamper_with_a_signature() {
	let h = harness();
	let (id, mut sig) = h.sign(RANDOM, 1).await;
	sig[..4].fill(0);

	let err = h.gate.authorize(RANDOM, id, &sig).unwrap_err();

	assert!(matches!(err, GateError::InvalidSignature { .. }));
	assert!(!h.gate.is_consumed(RANDOM, id).unwrap());
	assert_eq!(h.balance(RANDOM), U256::ZERO);
}

#[tokio::test]
async fn cannot_authorize_with_unprefixed_signature() {
	let h = harness();
	let id = U256::from(1u8);
	let digest = h.gate.encoder().digest(RANDOM, id);

	// Signed over the bare digest, without the personal-message prefix.
	let key: PrivateKeySigner = SIGNER_KEY.parse().unwrap();
	let sig = key.sign_hash_sync(&digest).unwrap().as_bytes().to_vec();
	assert_eq!(SignatureVerifier::recover(&digest, &sig), Ok(SIGNER));

	let err = h.gate.authorize(RANDOM, id, &sig).unwrap_err();

	assert!(matches!(
		err,
		GateError::InvalidSignature {
			reason: SignatureError::SignerMismatch { expected, recovered }
		} if expected == SIGNER && recovered != SIGNER
	));
	assert!(!h.gate.is_consumed(RANDOM, id).unwrap());
	assert_eq!(h.balance(RANDOM), U256::ZERO);
}

#[tokio::test]
async fn cannot_use_signature_after_signer_rotation() {
	let h = harness();
	let (id, sig) = h.sign(RANDOM, 1).await;

	let params = h.admin.set_trusted_signer(OTHER);
	assert_eq!(params.trusted_signer, OTHER);

	let err = h.gate.authorize(RANDOM, id, &sig).unwrap_err();
	assert!(matches!(
		err,
		GateError::InvalidSignature {
			reason: SignatureError::SignerMismatch { expected, recovered }
		} if expected == OTHER && recovered == SIGNER
	));

	// The new signer's allowances verify.
	let rotated = allowance_signer(OTHER_KEY, CONTEXT, MessageLayout::Packed);
	let signed = rotated.sign_allowance(RANDOM, id).await.unwrap();
	h.gate.authorize(RANDOM, id, &signed.signature).unwrap();
}

#[tokio::test]
async fn cannot_use_another_accounts_allowance() {
	let h = harness();
	let (id, sig) = h.sign(RANDOM2, 1).await;

	let err = h.gate.authorize(RANDOM, id, &sig).unwrap_err();
	assert!(matches!(err, GateError::InvalidSignature { .. }));

	let err = h.gate.authorize_for(RANDOM, RANDOM, id, &sig).unwrap_err();
	assert!(matches!(err, GateError::InvalidSignature { .. }));

	assert!(!h.gate.is_consumed(RANDOM2, id).unwrap());
}

#[tokio::test]
async fn cannot_use_another_tier_signature() {
	let h = harness();
	let (id, sig) = h.sign_tier(RANDOM, 1, 1).await;

	h.admin.set_current_tier(2);
	let err = h.gate.authorize_tiered(RANDOM, id, &sig).unwrap_err();

	assert!(matches!(err, GateError::WrongTier { expected: 2, actual: 1 }));
	assert!(!h.gate.is_consumed(RANDOM, id).unwrap());
}

#[tokio::test]
async fn global_scope_blocks_identifier_across_beneficiaries() {
	let h = harness();
	let (id, sig) = h.sign(RANDOM, 1).await;
	let (id2, sig2) = h.sign(RANDOM2, 1).await;

	h.gate.authorize(RANDOM, id, &sig).unwrap();
	let err = h.gate.authorize(RANDOM2, id2, &sig2).unwrap_err();

	assert!(matches!(err, GateError::AlreadyUsed { .. }));
}

#[tokio::test]
async fn beneficiary_scope_separates_identifier_spaces() {
	let h = gate_with(
		NonceScope::Beneficiary,
		MessageLayout::Packed,
		Box::new(MemoryLedger::new()),
		MemoryIssuance::default(),
	);
	let (id, sig) = h.sign(RANDOM, 1).await;
	let (id2, sig2) = h.sign(RANDOM2, 1).await;

	h.gate.authorize(RANDOM, id, &sig).unwrap();
	h.gate.authorize(RANDOM2, id2, &sig2).unwrap();

	assert!(matches!(
		h.gate.authorize(RANDOM, id, &sig),
		Err(GateError::AlreadyUsed { .. })
	));
}

#[tokio::test]
async fn zero_quantity_rejected_without_consuming() {
	let h = harness();
	let (id, sig) = h.sign(RANDOM, 0).await;

	let err = h.gate.authorize_batch(RANDOM, id, &sig).unwrap_err();
	assert!(matches!(err, GateError::ZeroQuantity));
	assert!(!h.gate.is_consumed(RANDOM, id).unwrap());

	// Tier-encoded identifiers with sequence zero grant nothing in batch form.
	h.admin.set_current_tier(1);
	let (id, sig) = h.sign_tier(RANDOM, 0, 1).await;
	assert!(matches!(
		h.gate.authorize_tiered_batch(RANDOM, id, &sig),
		Err(GateError::ZeroQuantity)
	));
}

#[tokio::test]
async fn refused_issuance_releases_identifier() {
	let h = gate_with(
		NonceScope::Global,
		MessageLayout::Packed,
		Box::new(MemoryLedger::new()),
		MemoryIssuance::new(Some(U256::from(2u8))),
	);
	let (id, sig) = h.sign(RANDOM, 5).await;

	let err = h.gate.authorize_batch(RANDOM, id, &sig).unwrap_err();
	assert!(matches!(err, GateError::IssuanceFailed(_)));
	assert!(!h.gate.is_consumed(RANDOM, id).unwrap());

	// The same allowance is still usable in its single-unit form.
	h.gate.authorize(RANDOM, id, &sig).unwrap();
	assert_eq!(h.balance(RANDOM), U256::from(1u8));
}

/// Refuses its first issuance, after resubmitting the same allowance while the
/// outer call still holds the reservation.
struct ResubmittingSink {
	gate: OnceLock<Arc<AuthorizationGate>>,
	signature: Vec<u8>,
	calls: AtomicUsize,
	nested: Mutex<Option<Result<(), GateError>>>,
}

impl IssuanceSink for ResubmittingSink {
	fn issue_units(&self, beneficiary: Address, _count: U256) -> Result<(), IssuanceError> {
		if self.calls.fetch_add(1, Ordering::SeqCst) > 0 {
			return Ok(());
		}
		if let Some(gate) = self.gate.get() {
			let nested = gate
				.authorize(beneficiary, U256::from(1u8), &self.signature)
				.map(|_| ());
			*self.nested.lock().unwrap() = Some(nested);
		}
		Err(IssuanceError::Rejected("first issuance refused".to_string()))
	}

	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		MemoryIssuance::default().config_schema()
	}
}

#[tokio::test]
async fn attempt_during_refused_issuance_sees_already_used() {
	let (id, sig) = harness().sign(RANDOM, 1).await;
	let sink = Arc::new(ResubmittingSink {
		gate: OnceLock::new(),
		signature: sig.clone(),
		calls: AtomicUsize::new(0),
		nested: Mutex::new(None),
	});
	let (gate, _admin) = AuthorizationGate::new(
		"test-gate",
		MessageEncoder::new(CONTEXT, MessageLayout::Packed),
		NonceScope::Global,
		GateParameters {
			trusted_signer: SIGNER,
			current_tier: 0,
		},
		Arc::new(NonceLedger::new(Box::new(MemoryLedger::new()))),
		sink.clone(),
	);
	let gate = Arc::new(gate);
	assert!(sink.gate.set(gate.clone()).is_ok());

	let err = gate.authorize(RANDOM, id, &sig).unwrap_err();
	assert!(matches!(err, GateError::IssuanceFailed(_)));

	// The overlapping attempt was refused while the reservation was held.
	let nested = sink.nested.lock().unwrap().take();
	assert!(matches!(nested, Some(Err(GateError::AlreadyUsed { .. }))));

	// The released identifier is redeemable again afterwards.
	assert!(!gate.is_consumed(RANDOM, id).unwrap());
	gate.authorize(RANDOM, id, &sig).unwrap();
	assert!(gate.is_consumed(RANDOM, id).unwrap());
}

#[tokio::test]
async fn signature_is_bound_to_context() {
	let h = harness();
	let foreign = allowance_signer(SIGNER_KEY, Address::repeat_byte(0xee), MessageLayout::Packed);
	let signed = foreign.sign_allowance(RANDOM, U256::from(1u8)).await.unwrap();

	let err = h
		.gate
		.authorize(RANDOM, signed.identifier, &signed.signature)
		.unwrap_err();
	assert!(matches!(err, GateError::InvalidSignature { .. }));
}

#[tokio::test]
async fn abi_layout_round_trip() {
	let h = gate_with(
		NonceScope::Global,
		MessageLayout::AbiEncoded,
		Box::new(MemoryLedger::new()),
		MemoryIssuance::default(),
	);
	let (id, sig) = h.sign(RANDOM, 1).await;
	h.gate.authorize(RANDOM, id, &sig).unwrap();

	// A packed-layout signature does not verify under the ABI layout.
	let packed = allowance_signer(SIGNER_KEY, CONTEXT, MessageLayout::Packed);
	let signed = packed.sign_allowance(RANDOM, U256::from(2u8)).await.unwrap();
	assert!(matches!(
		h.gate.authorize(RANDOM, signed.identifier, &signed.signature),
		Err(GateError::InvalidSignature { .. })
	));
}

#[tokio::test]
async fn token_redeemed_through_request() {
	let h = harness();
	let signed = h.signer.sign_allowance(RANDOM2, U256::from(3u8)).await.unwrap();
	let token = signed.to_token(RANDOM2);

	let request = AuthorizationRequest::from_token(RANDOM, &token, AuthorizationKind::BATCH);
	let receipt = h.gate.redeem(&request).unwrap();

	assert_eq!(receipt.digest, signed.message);
	assert_eq!(h.balance(RANDOM2), U256::from(3u8));
}

#[tokio::test]
async fn file_ledger_survives_restart() {
	let dir = tempfile::TempDir::new().unwrap();
	let path = dir.path().join("ledger.log");

	let (id, sig) = {
		let h = gate_with(
			NonceScope::Global,
			MessageLayout::Packed,
			Box::new(FileLedger::open(&path).unwrap()),
			MemoryIssuance::default(),
		);
		let (id, sig) = h.sign(RANDOM, 1).await;
		h.gate.authorize(RANDOM, id, &sig).unwrap();
		(id, sig)
	};

	let h = gate_with(
		NonceScope::Global,
		MessageLayout::Packed,
		Box::new(FileLedger::open(&path).unwrap()),
		MemoryIssuance::default(),
	);
	assert!(h.gate.is_consumed(RANDOM, id).unwrap());
	assert!(matches!(
		h.gate.authorize(RANDOM, id, &sig),
		Err(GateError::AlreadyUsed { .. })
	));
}

#[tokio::test]
async fn concurrent_submissions_consume_once() {
	let h = harness();
	let (id, sig) = h.sign(RANDOM, 7).await;
	let successes = AtomicUsize::new(0);
	let already_used = AtomicUsize::new(0);

	std::thread::scope(|s| {
		for _ in 0..8 {
			s.spawn(|| match h.gate.authorize_batch(RANDOM, id, &sig) {
				Ok(_) => {
					successes.fetch_add(1, Ordering::SeqCst);
				},
				Err(GateError::AlreadyUsed { .. }) => {
					already_used.fetch_add(1, Ordering::SeqCst);
				},
				Err(e) => panic!("unexpected error: {e}"),
			});
		}
	});

	assert_eq!(successes.load(Ordering::SeqCst), 1);
	assert_eq!(already_used.load(Ordering::SeqCst), 7);
	assert_eq!(h.balance(RANDOM), U256::from(7u8));
}
