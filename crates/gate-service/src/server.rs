//! HTTP server for the allowance gate API.
//!
//! Exposes redemption, identifier and balance lookups, the parameter view
//! and, when enabled, the administrative parameter updates.

use axum::{
	extract::{DefaultBodyLimit, Path, Query, State},
	http::StatusCode,
	response::Json,
	routing::{get, post, put},
	Router,
};
use gate_config::ApiConfig;
use gate_core::{AuthorizationGate, GateAdmin};
use gate_types::{
	APIError, AuthorizeRequest, AuthorizeResponse, BalanceResponse, NonceStatusResponse,
	ParametersResponse, SetSignerRequest, SetTierRequest,
};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer};

/// Shared application state for the API server.
#[derive(Clone)]
pub struct AppState {
	pub gate: Arc<AuthorizationGate>,
	pub admin: GateAdmin,
}

/// Query string of the identifier lookup.
#[derive(Debug, Deserialize)]
pub struct NonceQuery {
	pub beneficiary: Option<String>,
}

/// Builds the router with every route mounted under `/api`.
pub fn router(api_config: &ApiConfig, state: AppState) -> Router {
	let mut api = Router::new()
		.route("/authorize", post(handle_authorize))
		.route("/nonces/{identifier}", get(handle_nonce_status))
		.route("/balances/{address}", get(handle_balance))
		.route("/parameters", get(handle_parameters));

	if api_config.admin_enabled {
		tracing::warn!("Admin routes enabled; they must be protected by the host");
		api = api
			.route("/admin/signer", put(handle_set_signer))
			.route("/admin/tier", put(handle_set_tier));
	}

	Router::new()
		.nest("/api", api)
		.layer(
			ServiceBuilder::new()
				.layer(TraceLayer::new_for_http())
				.layer(CorsLayer::permissive())
				.layer(TimeoutLayer::with_status_code(
					StatusCode::REQUEST_TIMEOUT,
					Duration::from_secs(api_config.timeout_seconds),
				)),
		)
		.layer(DefaultBodyLimit::max(api_config.max_request_size))
		.with_state(state)
}

/// Serves the API until `shutdown` resolves.
pub async fn start_server(
	api_config: ApiConfig,
	state: AppState,
	shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> Result<(), Box<dyn std::error::Error>> {
	let app = router(&api_config, state);

	let bind_address = format!("{}:{}", api_config.host, api_config.port);
	let listener = TcpListener::bind(&bind_address).await?;

	tracing::info!("Allowance gate API server starting on {}", bind_address);

	axum::serve(listener, app)
		.with_graceful_shutdown(shutdown)
		.await?;

	Ok(())
}

/// Handles POST /api/authorize requests.
async fn handle_authorize(
	State(state): State<AppState>,
	Json(request): Json<AuthorizeRequest>,
) -> Result<Json<AuthorizeResponse>, APIError> {
	match crate::apis::authorize::process_authorize_request(request, state.gate).await {
		Ok(response) => Ok(Json(response)),
		Err(e) => {
			tracing::warn!("Authorization request failed: {}", e);
			Err(e)
		},
	}
}

/// Handles GET /api/nonces/{identifier} requests.
async fn handle_nonce_status(
	Path(identifier): Path<String>,
	Query(query): Query<NonceQuery>,
	State(state): State<AppState>,
) -> Result<Json<NonceStatusResponse>, APIError> {
	crate::apis::nonces::get_nonce_status(&identifier, query.beneficiary.as_deref(), &state.gate)
		.map(Json)
}

/// Handles GET /api/balances/{address} requests.
async fn handle_balance(
	Path(address): Path<String>,
	State(state): State<AppState>,
) -> Result<Json<BalanceResponse>, APIError> {
	crate::apis::nonces::get_balance(&address, &state.gate).map(Json)
}

/// Handles GET /api/parameters requests.
async fn handle_parameters(State(state): State<AppState>) -> Json<ParametersResponse> {
	Json(crate::apis::admin::parameters_response(
		&state.gate,
		state.gate.parameters(),
	))
}

/// Handles PUT /api/admin/signer requests.
async fn handle_set_signer(
	State(state): State<AppState>,
	Json(request): Json<SetSignerRequest>,
) -> Result<Json<ParametersResponse>, APIError> {
	crate::apis::admin::set_trusted_signer(request, &state.gate, &state.admin).map(Json)
}

/// Handles PUT /api/admin/tier requests.
async fn handle_set_tier(
	State(state): State<AppState>,
	Json(request): Json<SetTierRequest>,
) -> Json<ParametersResponse> {
	Json(crate::apis::admin::set_current_tier(
		request,
		&state.gate,
		&state.admin,
	))
}
