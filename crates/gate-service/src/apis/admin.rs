//! Gate parameters: the public view and the administrative updates.

use gate_core::{AuthorizationGate, GateAdmin};
use gate_types::{
	APIError, Address, GateParameters, ParametersResponse, SetSignerRequest, SetTierRequest,
};

/// Current parameters together with the fixed settings of the gate.
pub fn parameters_response(gate: &AuthorizationGate, params: GateParameters) -> ParametersResponse {
	ParametersResponse {
		context: gate.encoder().context(),
		trusted_signer: params.trusted_signer,
		current_tier: params.current_tier,
		nonce_scope: gate.nonce_scope(),
		message_layout: gate.encoder().layout(),
	}
}

/// Rotates the trusted signer.
pub fn set_trusted_signer(
	request: SetSignerRequest,
	gate: &AuthorizationGate,
	admin: &GateAdmin,
) -> Result<ParametersResponse, APIError> {
	if request.trusted_signer == Address::ZERO {
		return Err(APIError::BadRequest {
			error_type: "INVALID_SIGNER".to_string(),
			message: "Trusted signer cannot be the zero address".to_string(),
			details: None,
		});
	}
	let params = admin.set_trusted_signer(request.trusted_signer);
	Ok(parameters_response(gate, params))
}

/// Changes the tier tiered identifiers must carry.
pub fn set_current_tier(
	request: SetTierRequest,
	gate: &AuthorizationGate,
	admin: &GateAdmin,
) -> ParametersResponse {
	let params = admin.set_current_tier(request.current_tier);
	parameters_response(gate, params)
}
