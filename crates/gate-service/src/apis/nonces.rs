//! Read-only lookups: identifier status and issued balances.

use gate_core::AuthorizationGate;
use gate_types::{
	parse_address, parse_identifier, APIError, BalanceResponse, NonceScope, NonceStatusResponse,
	TierNonce,
};

fn bad_request(error_type: &str, message: String) -> APIError {
	APIError::BadRequest {
		error_type: error_type.to_string(),
		message,
		details: None,
	}
}

/// Reports whether an identifier has been consumed, with its tier split.
///
/// Under per-beneficiary scoping the lookup needs the beneficiary.
pub fn get_nonce_status(
	identifier: &str,
	beneficiary: Option<&str>,
	gate: &AuthorizationGate,
) -> Result<NonceStatusResponse, APIError> {
	let identifier = parse_identifier(identifier)
		.map_err(|e| bad_request("INVALID_IDENTIFIER", e))?;
	let beneficiary = beneficiary
		.map(parse_address)
		.transpose()
		.map_err(|e| bad_request("INVALID_ADDRESS", e))?;

	let owner = match (gate.nonce_scope(), beneficiary) {
		(NonceScope::Global, _) => None,
		(NonceScope::Beneficiary, Some(owner)) => Some(owner),
		(NonceScope::Beneficiary, None) => {
			return Err(bad_request(
				"MISSING_BENEFICIARY",
				"Identifiers are scoped per beneficiary; pass ?beneficiary=".to_string(),
			));
		},
	};

	let consumed = gate
		.is_consumed(owner.unwrap_or_default(), identifier)
		.map_err(|e| APIError::InternalServerError {
			error_type: e.code().to_string(),
			message: e.to_string(),
		})?;
	let split = TierNonce::decode(identifier);

	Ok(NonceStatusResponse {
		identifier,
		owner,
		consumed,
		tier: split.tier,
		sequence: split.sequence,
	})
}

/// Issued balance of `account`.
pub fn get_balance(account: &str, gate: &AuthorizationGate) -> Result<BalanceResponse, APIError> {
	let account = parse_address(account).map_err(|e| bad_request("INVALID_ADDRESS", e))?;
	let balance = gate.balance_of(account).ok_or_else(|| APIError::NotFound {
		error_type: "BALANCES_UNAVAILABLE".to_string(),
		message: "The configured issuance sink does not track balances".to_string(),
	})?;
	Ok(BalanceResponse { account, balance })
}
