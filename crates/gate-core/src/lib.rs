//! Core of the allowance gate.
//!
//! This module ties message encoding, signature recovery, the nonce ledger and
//! issuance together into the `AuthorizationGate`, and provides the builder
//! that assembles a gate from configuration.

pub mod builder;
pub mod encoder;
pub mod gate;
pub mod issuance;
pub mod signing;
pub mod verifier;

pub use builder::{BuilderError, GateBuilder, GateComponents, GateFactories};
pub use encoder::MessageEncoder;
pub use gate::{AuthorizationGate, AuthorizationRequest, GateAdmin, GateError};
pub use issuance::{IssuanceError, IssuanceSink, MemoryIssuance};
pub use signing::{AllowanceSigner, SignedAllowance, SigningError};
pub use verifier::{SignatureError, SignatureVerifier};
