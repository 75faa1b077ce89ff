//! API types for the allowance gate HTTP API.
//!
//! This module defines the request and response bodies of the gate endpoints
//! and the structured error type every handler returns.

use crate::authorization::{AuthorizationKind, AuthorizationReceipt, MessageLayout, NonceScope};
use crate::utils::serde_helpers::{identifier_serde, signature_serde};
use alloy_primitives::{Address, Bytes, U256};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Request to redeem a signed allowance.
///
/// When `beneficiary` is omitted the caller is credited.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorizeRequest {
	/// Account submitting the allowance.
	pub caller: Address,
	/// Account to credit, for delegated redemption.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub beneficiary: Option<Address>,
	/// Authorization identifier, decimal or 0x hex.
	#[serde(with = "identifier_serde")]
	pub identifier: U256,
	/// Authorizer signature, 0x hex.
	#[serde(with = "signature_serde")]
	pub signature: Bytes,
	#[serde(default)]
	pub tiered: bool,
	#[serde(default)]
	pub batch: bool,
}

impl AuthorizeRequest {
	pub fn kind(&self) -> AuthorizationKind {
		AuthorizationKind {
			tiered: self.tiered,
			batch: self.batch,
		}
	}
}

/// Response to a successful redemption.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorizeResponse {
	/// Calling convention that was applied.
	pub kind: String,
	pub receipt: AuthorizationReceipt,
}

/// Consumption status of one identifier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NonceStatusResponse {
	#[serde(with = "identifier_serde")]
	pub identifier: U256,
	/// Beneficiary the lookup was scoped to, when scoping is per beneficiary.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub owner: Option<Address>,
	pub consumed: bool,
	/// Tier field of the identifier.
	pub tier: u128,
	/// Sequence field of the identifier.
	pub sequence: u128,
}

/// Current gate parameters and fixed settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParametersResponse {
	/// Verifying context bound into every message.
	pub context: Address,
	#[serde(rename = "trustedSigner")]
	pub trusted_signer: Address,
	#[serde(rename = "currentTier")]
	pub current_tier: u128,
	#[serde(rename = "nonceScope")]
	pub nonce_scope: NonceScope,
	#[serde(rename = "messageLayout")]
	pub message_layout: MessageLayout,
}

/// Issued balance of one account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalanceResponse {
	pub account: Address,
	#[serde(with = "identifier_serde")]
	pub balance: U256,
}

/// Request to rotate the trusted signer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetSignerRequest {
	#[serde(rename = "trustedSigner")]
	pub trusted_signer: Address,
}

/// Request to change the current tier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetTierRequest {
	#[serde(rename = "currentTier")]
	pub current_tier: u128,
}

/// API error response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
	/// Error type/code
	pub error: String,
	/// Human-readable description
	pub message: String,
	/// Additional error context
	pub details: Option<serde_json::Value>,
	/// Suggested retry delay in seconds
	#[serde(rename = "retryAfter")]
	pub retry_after: Option<u64>,
}

/// Structured API error type with appropriate HTTP status mapping.
#[derive(Debug)]
pub enum APIError {
	/// Malformed request (400)
	BadRequest {
		error_type: String,
		message: String,
		details: Option<serde_json::Value>,
	},
	/// Signature does not come from the trusted signer (401)
	Unauthorized { error_type: String, message: String },
	/// Route disabled or resource missing (404)
	NotFound { error_type: String, message: String },
	/// Identifier already consumed (409)
	Conflict {
		error_type: String,
		message: String,
		details: Option<serde_json::Value>,
	},
	/// Well-formed request rejected by gate rules (422)
	UnprocessableEntity {
		error_type: String,
		message: String,
		details: Option<serde_json::Value>,
	},
	/// Service unavailable with optional retry information (503)
	ServiceUnavailable {
		error_type: String,
		message: String,
		retry_after: Option<u64>,
	},
	/// Internal server error (500)
	InternalServerError { error_type: String, message: String },
}

impl APIError {
	/// Get the HTTP status code for this error.
	pub fn status_code(&self) -> u16 {
		match self {
			APIError::BadRequest { .. } => 400,
			APIError::Unauthorized { .. } => 401,
			APIError::NotFound { .. } => 404,
			APIError::Conflict { .. } => 409,
			APIError::UnprocessableEntity { .. } => 422,
			APIError::ServiceUnavailable { .. } => 503,
			APIError::InternalServerError { .. } => 500,
		}
	}

	/// Convert to ErrorResponse for JSON serialization.
	pub fn to_error_response(&self) -> ErrorResponse {
		let (error, message, details, retry_after) = match self {
			APIError::BadRequest {
				error_type,
				message,
				details,
			}
			| APIError::Conflict {
				error_type,
				message,
				details,
			}
			| APIError::UnprocessableEntity {
				error_type,
				message,
				details,
			} => (error_type, message, details.clone(), None),
			APIError::Unauthorized {
				error_type,
				message,
			}
			| APIError::NotFound {
				error_type,
				message,
			}
			| APIError::InternalServerError {
				error_type,
				message,
			} => (error_type, message, None, None),
			APIError::ServiceUnavailable {
				error_type,
				message,
				retry_after,
			} => (error_type, message, None, *retry_after),
		};
		ErrorResponse {
			error: error.clone(),
			message: message.clone(),
			details,
			retry_after,
		}
	}
}

impl fmt::Display for APIError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			APIError::BadRequest { message, .. } => write!(f, "Bad Request: {}", message),
			APIError::Unauthorized { message, .. } => write!(f, "Unauthorized: {}", message),
			APIError::NotFound { message, .. } => write!(f, "Not Found: {}", message),
			APIError::Conflict { message, .. } => write!(f, "Conflict: {}", message),
			APIError::UnprocessableEntity { message, .. } => {
				write!(f, "Unprocessable Entity: {}", message)
			},
			APIError::ServiceUnavailable { message, .. } => {
				write!(f, "Service Unavailable: {}", message)
			},
			APIError::InternalServerError { message, .. } => {
				write!(f, "Internal Server Error: {}", message)
			},
		}
	}
}

impl std::error::Error for APIError {}

#[cfg(feature = "axum")]
impl axum::response::IntoResponse for APIError {
	fn into_response(self) -> axum::response::Response {
		use axum::{http::StatusCode, response::Json};

		let status =
			StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
		let error_response = self.to_error_response();
		(status, Json(error_response)).into_response()
	}
}
