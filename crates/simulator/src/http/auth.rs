//! `api-key` header authentication, matching the header the real Azure
//! OpenAI API expects on every simulated operation. The liveness probe and
//! metrics scrape are exempt.

use axum::extract::State;
use axum::http::Request;
use axum::middleware::Next;
use axum::response::Response;

use crate::error::SimError;
use crate::state::AppState;

pub async fn require_api_key(State(state): State<AppState>, request: Request<axum::body::Body>, next: Next) -> Response {
	let config = state.0.config.load();
	let provided = request
		.headers()
		.get("api-key")
		.and_then(|value| value.to_str().ok());

	match provided {
		Some(key) if key == config.simulator_api_key => next.run(request).await,
		_ => {
			use axum::response::IntoResponse;
			SimError::Unauthorized.into_response()
		}
	}
}
