//! Canonical byte encoding and hashing of authorization messages.
//!
//! The off-core signer and the gate must agree on every byte hashed here; any
//! change invalidates all outstanding signatures.

use alloy_primitives::{eip191_hash_message, keccak256, Address, B256, U256};
use gate_types::MessageLayout;

/// Encodes `(beneficiary, identifier, context)` and derives its digests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageEncoder {
	context: Address,
	layout: MessageLayout,
}

impl MessageEncoder {
	pub fn new(context: Address, layout: MessageLayout) -> Self {
		Self { context, layout }
	}

	/// Verifying context bound into every message.
	pub fn context(&self) -> Address {
		self.context
	}

	pub fn layout(&self) -> MessageLayout {
		self.layout
	}

	/// Fixed-width, fixed-order message bytes.
	///
	/// `Packed` is `beneficiary(20) || identifier(32, big-endian) || context(20)`.
	/// `AbiEncoded` is the same three values as 32-byte words with the
	/// addresses left-padded with zeros.
	pub fn encode(&self, beneficiary: Address, identifier: U256) -> Vec<u8> {
		let mut out = Vec::with_capacity(self.layout.encoded_len());
		match self.layout {
			MessageLayout::Packed => {
				out.extend_from_slice(beneficiary.as_slice());
				out.extend_from_slice(&identifier.to_be_bytes::<32>());
				out.extend_from_slice(self.context.as_slice());
			},
			MessageLayout::AbiEncoded => {
				out.extend_from_slice(beneficiary.into_word().as_slice());
				out.extend_from_slice(&identifier.to_be_bytes::<32>());
				out.extend_from_slice(self.context.into_word().as_slice());
			},
		}
		out
	}

	/// Keccak-256 of the encoded message.
	pub fn digest(&self, beneficiary: Address, identifier: U256) -> B256 {
		keccak256(self.encode(beneficiary, identifier))
	}

	/// EIP-191 personal-message hash of a digest:
	/// `keccak256("\x19Ethereum Signed Message:\n32" || digest)`.
	///
	/// This is the value the authorizer's key actually signs.
	pub fn signed_message_hash(digest: &B256) -> B256 {
		eip191_hash_message(digest)
	}

	/// Digest followed by the EIP-191 wrap.
	pub fn authorization_hash(&self, beneficiary: Address, identifier: U256) -> B256 {
		Self::signed_message_hash(&self.digest(beneficiary, identifier))
	}
}
