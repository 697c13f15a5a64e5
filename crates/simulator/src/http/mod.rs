//! Router assembly: wires `AppState` into every handler and applies the
//! `api-key` auth layer to everything except the liveness probe and the
//! metrics scrape.

pub mod auth;

use axum::Router;
use axum::body::{Body, Bytes};
use axum::extract::{OriginalUri, Path, State};
use axum::http::{HeaderMap, Method, Request, Uri, header};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use tower_http::trace::TraceLayer;

use crate::control;
use crate::error::{SimError, SimResult};
use crate::generator::{chat, completions, embeddings, translation};
use crate::pipeline;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
	let protected = Router::new()
		.route("/++/config", get(control::get_config).patch(control::patch_config))
		.route("/++/save-recordings", post(control::save_recordings))
		.route(
			"/openai/deployments/{deployment}/chat/completions",
			post(chat_completions),
		)
		.route("/openai/deployments/{deployment}/completions", post(text_completions))
		.route("/openai/deployments/{deployment}/embeddings", post(embeddings_handler))
		.route(
			"/openai/deployments/{deployment}/audio/translations",
			post(audio_translations),
		)
		.route_layer(middleware::from_fn_with_state(state.clone(), auth::require_api_key));

	let public = Router::new()
		.route("/", get(control::liveness))
		.route("/metrics", get(metrics));

	Router::new()
		.merge(public)
		.merge(protected)
		.layer(middleware::from_fn(normalize_path))
		.layer(TraceLayer::new_for_http())
		.with_state(state)
}

async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
	let body = state.0.telemetry.encode();
	([(header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")], body)
}

/// Collapse runs of repeated `/` in the request path before routing, so
/// `//openai//deployments//x//chat/completions` still matches.
async fn normalize_path(mut request: Request<Body>, next: Next) -> Response {
	let uri = request.uri();
	let path = uri.path();
	if path.contains("//") {
		let collapsed = collapse_slashes(path);
		let rebuilt = match uri.query() {
			Some(query) => format!("{collapsed}?{query}"),
			None => collapsed,
		};
		if let Ok(path_and_query) = rebuilt.parse() {
			let mut parts = uri.clone().into_parts();
			parts.path_and_query = Some(path_and_query);
			if let Ok(new_uri) = Uri::from_parts(parts) {
				*request.uri_mut() = new_uri;
			}
		}
	}
	next.run(request).await
}

fn collapse_slashes(path: &str) -> String {
	let mut out = String::with_capacity(path.len());
	let mut last_was_slash = false;
	for c in path.chars() {
		if c == '/' {
			if last_was_slash {
				continue;
			}
			last_was_slash = true;
		} else {
			last_was_slash = false;
		}
		out.push(c);
	}
	out
}

fn parse_json<T: serde::de::DeserializeOwned>(body: &Bytes) -> SimResult<T> {
	serde_json::from_slice(body).map_err(|err| SimError::BadRequest(err.to_string()))
}

async fn chat_completions(
	State(state): State<AppState>,
	Path(deployment): Path<String>,
	method: Method,
	uri: OriginalUri,
	headers: HeaderMap,
	body: Bytes,
) -> Response {
	let path = uri.0.path().to_string();
	let body_for_pipeline = body.clone();
	pipeline::run(&state, &method, &path, &headers, body_for_pipeline, move |config, annotations| {
		let request = parse_json(&body)?;
		chat::handle(config, &deployment, request, annotations)
	})
	.await
}

async fn text_completions(
	State(state): State<AppState>,
	Path(deployment): Path<String>,
	method: Method,
	uri: OriginalUri,
	headers: HeaderMap,
	body: Bytes,
) -> Response {
	let path = uri.0.path().to_string();
	let body_for_pipeline = body.clone();
	pipeline::run(&state, &method, &path, &headers, body_for_pipeline, move |config, annotations| {
		let request = parse_json(&body)?;
		completions::handle(config, &deployment, request, annotations)
	})
	.await
}

async fn embeddings_handler(
	State(state): State<AppState>,
	Path(deployment): Path<String>,
	method: Method,
	uri: OriginalUri,
	headers: HeaderMap,
	body: Bytes,
) -> Response {
	let path = uri.0.path().to_string();
	let body_for_pipeline = body.clone();
	pipeline::run(&state, &method, &path, &headers, body_for_pipeline, move |config, annotations| {
		let request = parse_json(&body)?;
		embeddings::handle(config, &deployment, request, annotations)
	})
	.await
}

async fn audio_translations(
	State(state): State<AppState>,
	Path(deployment): Path<String>,
	method: Method,
	uri: OriginalUri,
	headers: HeaderMap,
	body: Bytes,
) -> Response {
	let path = uri.0.path().to_string();
	let content_type = headers
		.get(header::CONTENT_TYPE)
		.and_then(|v| v.to_str().ok())
		.unwrap_or_default()
		.to_string();
	let fields = translation::parse_multipart(&content_type, body.clone()).await;

	pipeline::run(&state, &method, &path, &headers, body, move |config, annotations| {
		fields.and_then(|fields| translation::handle(config, &deployment, fields, annotations))
	})
	.await
}
