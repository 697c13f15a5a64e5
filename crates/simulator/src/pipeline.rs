//! Orders the steps common to every simulated operation: path
//! normalization already happened in middleware by the time a handler
//! calls here; this module owns mode dispatch, limiter application, and
//! latency/metrics bookkeeping.

use axum::body::Bytes;
use axum::http::{HeaderMap, Method, StatusCode, header};
use axum::response::{IntoResponse, Json, Response};
use serde_json::json;

use crate::config::{Config, SimulatorMode};
use crate::context::{Annotations, LimiterName, Operation, RequestContext};
use crate::error::{SimError, SimResult};
use crate::fingerprint;
use crate::forwarder::{self, ForwardedResponse};
use crate::latency::{self, LatencyEnvelope};
use crate::limiter::{Decision, RejectReason};
use crate::recordreplay::{RecordedResponse, RequestSummary};
use crate::state::AppState;

/// Run the full pipeline around a closure that performs mode-specific
/// dispatch in `generate` mode. `record`/`replay` are handled uniformly
/// here since they don't depend on which operation was requested.
pub async fn run<F>(
	state: &AppState,
	method: &Method,
	path: &str,
	headers: &HeaderMap,
	body: Bytes,
	generate: F,
) -> Response
where
	F: FnOnce(&Config, &mut Annotations) -> SimResult<Response>,
{
	let config = state.0.config.load();
	let envelope = LatencyEnvelope::begin();
	let mut ctx = RequestContext::new(config.clone());

	let result = dispatch(state, &config, method, path, headers, body, generate, &mut ctx.annotations).await;

	let (response, status) = match result {
		Ok(response) => {
			let status = response.status();
			(response, status)
		}
		Err(err) => {
			let response = err.into_response();
			let status = response.status();
			(response, status)
		}
	};

	let response = if status.as_u16() < 300 {
		apply_limiter(state, &ctx.annotations, response)
	} else {
		response
	};
	let status = response.status();
	let base_ms = envelope.elapsed_ms();

	close_latency_envelope(state, &config, &ctx.annotations, &envelope, status).await;
	let full_ms = envelope.elapsed_ms();
	let deployment = ctx.annotations.deployment_name.as_deref().unwrap_or("unknown");
	state.0.telemetry.observe_latency(deployment, status.as_u16(), base_ms, full_ms);

	response
}

async fn dispatch<F>(
	state: &AppState,
	config: &Config,
	method: &Method,
	path: &str,
	headers: &HeaderMap,
	body: Bytes,
	generate: F,
	annotations: &mut Annotations,
) -> SimResult<Response>
where
	F: FnOnce(&Config, &mut Annotations) -> SimResult<Response>,
{
	match config.simulator_mode {
		SimulatorMode::Generate => generate(config, annotations),
		SimulatorMode::Record => record_or_replay(state, method, path, headers, body, annotations, true).await,
		SimulatorMode::Replay => record_or_replay(state, method, path, headers, body, annotations, false).await,
	}
}

#[allow(clippy::too_many_arguments)]
async fn record_or_replay(
	state: &AppState,
	method: &Method,
	path: &str,
	headers: &HeaderMap,
	body: Bytes,
	annotations: &mut Annotations,
	recording: bool,
) -> SimResult<Response> {
	let content_type = headers.get(header::CONTENT_TYPE).and_then(|v| v.to_str().ok());
	let fp = fingerprint::fingerprint(method.as_str(), path, content_type, &body)?;

	if let Some(cached) = state.0.recordings.lookup(path, &fp)? {
		annotate_from_cache(&cached, annotations);
		return Ok(recorded_to_response(cached));
	}

	if !recording {
		return Err(SimError::RecordingMissing);
	}

	let Some(forwarder) = &state.0.forwarder else {
		tracing::warn!(path, "record mode with no upstream configured");
		return Err(SimError::Internal("no upstream configured for record mode".to_string()));
	};

	let forwarded = forwarder.forward(method.clone(), path, headers, body.clone()).await?;
	annotate_from_forward(path, &forwarded, annotations);

	let response = forwarded_to_response(&forwarded);
	if forwarded.status < 300 {
		let request_headers = headers
			.iter()
			.filter_map(|(k, v)| v.to_str().ok().map(|v| (k.as_str().to_string(), v.to_string())))
			.collect();
		let response_headers = forwarded
			.headers
			.iter()
			.filter_map(|(k, v)| v.to_str().ok().map(|v| (k.as_str().to_string(), v.to_string())))
			.collect();
		let recorded = RecordedResponse {
			status_code: forwarded.status,
			headers: response_headers,
			body: String::from_utf8(forwarded.body.to_vec()).ok(),
			duration_ms: 0.0,
			context_annotations: Default::default(),
			request: RequestSummary {
				method: method.to_string(),
				uri: path.to_string(),
				headers: request_headers,
				body: (body.len() <= 1024).then(|| String::from_utf8_lossy(&body).to_string()),
				body_hash: None,
			},
		};
		state.0.recordings.insert_if_absent(path, &fp, recorded)?;
	}

	Ok(response)
}

/// Derive `(operation, limiter_name)` from a request path, the same way a
/// live route is resolved, so a cached/forwarded response is billed against
/// the right window instead of always assuming a token-limited operation.
fn classify_operation(path: &str) -> (Operation, LimiterName) {
	if path.ends_with("/audio/translations") {
		(Operation::Translation, LimiterName::OpenAiRequests)
	} else if path.ends_with("/chat/completions") {
		(Operation::ChatCompletions, LimiterName::OpenAiTokens)
	} else if path.ends_with("/completions") {
		(Operation::Completions, LimiterName::OpenAiTokens)
	} else {
		(Operation::Embeddings, LimiterName::OpenAiTokens)
	}
}

fn annotate_from_cache(cached: &RecordedResponse, annotations: &mut Annotations) {
	let path = cached.request.uri.split('?').next().unwrap_or(&cached.request.uri);
	if let Some(name) = forwarder::deployment_name_from_path(path) {
		annotations.deployment_name = Some(name.to_string());
	}
	if let Some(body) = &cached.body {
		if let Some((prompt, completion, total)) = forwarder::extract_usage(body.as_bytes()) {
			annotations.prompt_tokens = Some(prompt);
			annotations.completion_tokens = Some(completion);
			annotations.total_tokens = Some(total);
			annotations.token_cost = Some(total);
		}
	}
	let (operation, limiter_name) = classify_operation(path);
	annotations.operation = Some(operation);
	annotations.limiter_name = Some(limiter_name);
}

fn annotate_from_forward(path: &str, forwarded: &ForwardedResponse, annotations: &mut Annotations) {
	annotations.deployment_name = forwarder::deployment_name_from_path(path).map(str::to_string);
	if let Some((prompt, completion, total)) = forwarder::extract_usage(&forwarded.body) {
		annotations.prompt_tokens = Some(prompt);
		annotations.completion_tokens = Some(completion);
		annotations.total_tokens = Some(total);
		annotations.token_cost = Some(total);
	}
	let (operation, limiter_name) = classify_operation(path);
	annotations.operation = Some(operation);
	annotations.limiter_name = Some(limiter_name);
}

fn recorded_to_response(recorded: RecordedResponse) -> Response {
	let status = StatusCode::from_u16(recorded.status_code).unwrap_or(StatusCode::OK);
	let body = recorded.body.unwrap_or_default();
	(status, body).into_response()
}

fn forwarded_to_response(forwarded: &ForwardedResponse) -> Response {
	let status = StatusCode::from_u16(forwarded.status).unwrap_or(StatusCode::OK);
	(status, forwarded.body.clone()).into_response()
}

fn apply_limiter(state: &AppState, annotations: &Annotations, response: Response) -> Response {
	let Some(deployment_name) = &annotations.deployment_name else {
		return response;
	};
	let Some(limiter_name) = annotations.limiter_name else {
		return response;
	};

	let limiters = state.0.limiters.load();
	let now = crate::limiter::now_seconds();
	let decision = match limiter_name {
		LimiterName::OpenAiTokens => {
			let cost = annotations.token_cost.unwrap_or(0);
			limiters.add_token_request(deployment_name, cost, now)
		}
		LimiterName::OpenAiRequests => limiters.add_plain_request(deployment_name, now),
	};

	match decision {
		None | Some(Decision::Admitted { .. }) => response,
		Some(Decision::Rejected { retry_after_seconds, reason }) => {
			state.0.telemetry.observe_rate_limit_event(deployment_name, reason.as_str());
			rate_limited_response(retry_after_seconds, reason)
		}
	}
}

fn rate_limited_response(retry_after_seconds: u64, reason: RejectReason) -> Response {
	let body = json!({
		"error": {
			"code": "429",
			"message": format!(
				"Requests to the OpenAI API Simulator have exceeded call rate limit. Please retry after {retry_after_seconds} seconds."
			),
		}
	});
	let mut response = (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response();
	let headers = response.headers_mut();
	headers.insert(header::RETRY_AFTER, retry_after_seconds.into());
	if let Ok(value) = retry_after_seconds.to_string().parse() {
		headers.insert(reason.reset_header(), value);
	}
	response
}

async fn close_latency_envelope(
	state: &AppState,
	config: &Config,
	annotations: &Annotations,
	envelope: &LatencyEnvelope,
	status: StatusCode,
) {
	if status.as_u16() >= 300 {
		return;
	}
	let Some(operation) = annotations.operation else { return };
	let profile = match operation {
		Operation::ChatCompletions => &config.latency.chat_completions,
		Operation::Completions => &config.latency.completions,
		Operation::Embeddings => &config.latency.embeddings,
		Operation::Translation => &config.latency.translations,
	};
	let target = latency::target_duration_ms(operation, profile, annotations.completion_tokens, annotations.file_size_bytes);
	envelope.pad_to(target).await;

	if let Some(deployment) = &annotations.deployment_name {
		state.0.telemetry.observe_tokens(
			deployment,
			status.as_u16(),
			annotations.total_tokens.unwrap_or(0) as f64,
			annotations.max_tokens_requested.unwrap_or(0) as f64,
		);
	}
}
