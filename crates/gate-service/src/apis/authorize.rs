//! Redemption endpoint.
//!
//! Runs a submitted allowance through the gate on the blocking pool, since a
//! file-backed ledger syncs to disk before the call returns.

use gate_core::{AuthorizationGate, AuthorizationRequest, GateError};
use gate_types::{APIError, AuthorizeRequest, AuthorizeResponse};
use std::sync::Arc;

/// Maps a gate rejection onto the HTTP error it is reported as.
pub fn gate_error_to_api(error: GateError) -> APIError {
	let error_type = error.code().to_string();
	let message = error.to_string();
	match error {
		GateError::InvalidSignature { reason } => APIError::Unauthorized {
			error_type,
			message: if reason.is_encoding_error() {
				message
			} else {
				"Signature was not produced by the trusted signer".to_string()
			},
		},
		GateError::AlreadyUsed { identifier } => APIError::Conflict {
			error_type,
			message,
			details: Some(serde_json::json!({ "identifier": identifier.to_string() })),
		},
		GateError::WrongTier { expected, actual } => APIError::UnprocessableEntity {
			error_type,
			message,
			details: Some(serde_json::json!({
				"expected": expected.to_string(),
				"actual": actual.to_string(),
			})),
		},
		GateError::ZeroQuantity => APIError::UnprocessableEntity {
			error_type,
			message,
			details: None,
		},
		GateError::IssuanceFailed(_) | GateError::Ledger(_) => {
			APIError::InternalServerError { error_type, message }
		},
	}
}

/// Redeems one allowance.
pub async fn process_authorize_request(
	request: AuthorizeRequest,
	gate: Arc<AuthorizationGate>,
) -> Result<AuthorizeResponse, APIError> {
	let kind = request.kind();
	tracing::debug!(
		caller = %request.caller,
		identifier = %request.identifier,
		kind = %kind,
		"Processing authorization request"
	);

	let outcome = tokio::task::spawn_blocking(move || {
		gate.redeem(&AuthorizationRequest {
			caller: request.caller,
			beneficiary: request.beneficiary,
			identifier: request.identifier,
			signature: &request.signature,
			kind,
		})
	})
	.await
	.map_err(|e| APIError::InternalServerError {
		error_type: "INTERNAL_ERROR".to_string(),
		message: format!("Authorization task failed: {}", e),
	})?;

	let receipt = outcome.map_err(gate_error_to_api)?;
	Ok(AuthorizeResponse {
		kind: kind.to_string(),
		receipt,
	})
}
