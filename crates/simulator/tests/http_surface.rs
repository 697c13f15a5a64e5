//! Drives the real axum router with `tower::ServiceExt::oneshot()` rather
//! than calling handlers directly, so auth middleware, path normalization,
//! and the pipeline's status-code/latency wiring are all exercised together.

use std::time::{Duration, Instant};

use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use llm_api_simulator::config::{Config, LatencyProfile, SimulatorMode};
use llm_api_simulator::fingerprint;
use llm_api_simulator::http::build_router;
use llm_api_simulator::recordreplay::{RecordedResponse, RequestSummary};
use llm_api_simulator::state::AppState;
use tower::ServiceExt;

fn router_with_api_key() -> (axum::Router, String) {
	let config = Config::default();
	let api_key = config.simulator_api_key.clone();
	let state = AppState::new(config);
	(build_router(state), api_key)
}

fn router_in_mode(mode: SimulatorMode) -> (axum::Router, String) {
	let mut config = Config::default();
	config.simulator_mode = mode;
	let api_key = config.simulator_api_key.clone();
	let state = AppState::new(config);
	(build_router(state), api_key)
}

#[tokio::test]
async fn liveness_probe_requires_no_api_key() {
	let (router, _api_key) = router_with_api_key();
	let response = router
		.oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
		.await
		.unwrap();
	assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn missing_api_key_is_rejected() {
	let (router, _api_key) = router_with_api_key();
	let body = serde_json::json!({ "messages": [{"role": "user", "content": "hi"}] }).to_string();
	let request = Request::builder()
		.method("POST")
		.uri("/openai/deployments/gpt-35-turbo-1k-token/chat/completions")
		.header(header::CONTENT_TYPE, "application/json")
		.body(Body::from(body))
		.unwrap();
	let response = router.oneshot(request).await.unwrap();
	assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

/// S5: a chat-completions request against an embedding deployment is a 400,
/// not a panic or a 500, reaching the handler through the live router.
#[tokio::test]
async fn chat_completions_against_embedding_deployment_is_bad_request() {
	let (router, api_key) = router_with_api_key();
	let body = serde_json::json!({ "messages": [{"role": "user", "content": "hi"}] }).to_string();
	let request = Request::builder()
		.method("POST")
		.uri("/openai/deployments/embedding/chat/completions")
		.header(header::CONTENT_TYPE, "application/json")
		.header("api-key", api_key)
		.body(Body::from(body))
		.unwrap();
	let response = router.oneshot(request).await.unwrap();
	assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

/// S4: an oversized audio upload is rejected with 413 before any synthetic
/// transcription is generated.
#[tokio::test]
async fn oversize_audio_upload_is_rejected_with_413() {
	let (router, api_key) = router_with_api_key();
	let boundary = "simulator-test-boundary";
	let oversized = vec![0u8; 26_214_401];
	let mut body = Vec::new();
	body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
	body.extend_from_slice(b"Content-Disposition: form-data; name=\"file\"; filename=\"a.wav\"\r\n\r\n");
	body.extend_from_slice(&oversized);
	body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());

	let request = Request::builder()
		.method("POST")
		.uri("/openai/deployments/whisper/audio/translations")
		.header(
			header::CONTENT_TYPE,
			format!("multipart/form-data; boundary={boundary}"),
		)
		.header("api-key", api_key)
		.body(Body::from(body))
		.unwrap();
	let response = router.oneshot(request).await.unwrap();
	assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
}

/// A request path with doubled slashes still routes correctly.
#[tokio::test]
async fn doubled_slashes_in_path_are_normalized() {
	let (router, api_key) = router_with_api_key();
	let body = serde_json::json!({ "input": "hello" }).to_string();
	let request = Request::builder()
		.method("POST")
		.uri("/openai//deployments/embedding//embeddings")
		.header(header::CONTENT_TYPE, "application/json")
		.header("api-key", api_key)
		.body(Body::from(body))
		.unwrap();
	let response = router.oneshot(request).await.unwrap();
	assert_eq!(response.status(), StatusCode::OK);
}

/// S1: hammering a low-TPM deployment's chat-completions endpoint eventually
/// yields a 429 with a Retry-After header.
#[tokio::test]
async fn exhausting_token_budget_yields_429() {
	let (router, api_key) = router_with_api_key();
	let body = serde_json::json!({
		"messages": [{"role": "user", "content": "word ".repeat(200)}],
		"max_tokens": 200,
	})
	.to_string();

	let mut saw_rate_limited = false;
	for _ in 0..20 {
		let request = Request::builder()
			.method("POST")
			.uri("/openai/deployments/gpt-35-turbo-1k-token/chat/completions")
			.header(header::CONTENT_TYPE, "application/json")
			.header("api-key", api_key.clone())
			.body(Body::from(body.clone()))
			.unwrap();
		let response = router.clone().oneshot(request).await.unwrap();
		if response.status() == StatusCode::TOO_MANY_REQUESTS {
			assert!(response.headers().get(header::RETRY_AFTER).is_some());
			saw_rate_limited = true;
			break;
		}
	}
	assert!(saw_rate_limited, "expected the 1k-token deployment to eventually rate limit");
}

/// S6: replay mode with no matching recording returns 500, never forwards.
#[tokio::test]
async fn replay_miss_returns_500() {
	let (router, api_key) = router_in_mode(SimulatorMode::Replay);
	let body = serde_json::json!({ "input": "hello, never recorded" }).to_string();
	let request = Request::builder()
		.method("POST")
		.uri("/openai/deployments/embedding/embeddings")
		.header(header::CONTENT_TYPE, "application/json")
		.header("api-key", api_key)
		.body(Body::from(body))
		.unwrap();
	let response = router.oneshot(request).await.unwrap();
	assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

/// S7-style: an RPM-limited (non-token) deployment that saturates its window
/// gets a 429 carrying the requests reset header, not the tokens one.
#[tokio::test]
async fn rpm_deployment_429_carries_requests_reset_header() {
	let mut config = Config::default();
	config.deployments.insert(
		"whisper-rpm-2".to_string(),
		llm_api_simulator::deployment::Deployment::new(
			"whisper-rpm-2",
			"whisper",
			llm_api_simulator::model::lookup_model("whisper").unwrap(),
		)
		.with_requests_per_minute(1),
	);
	let api_key = config.simulator_api_key.clone();
	let state = AppState::new(config);
	let router = build_router(state);

	let boundary = "rpm-test-boundary";
	let mut body = Vec::new();
	body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
	body.extend_from_slice(b"Content-Disposition: form-data; name=\"file\"; filename=\"a.wav\"\r\n\r\n");
	body.extend_from_slice(b"not-really-audio-but-non-empty");
	body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());

	let make_request = || {
		Request::builder()
			.method("POST")
			.uri("/openai/deployments/whisper-rpm-2/audio/translations")
			.header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={boundary}"))
			.header("api-key", api_key.clone())
			.body(Body::from(body.clone()))
			.unwrap()
	};

	let first = router.clone().oneshot(make_request()).await.unwrap();
	assert_eq!(first.status(), StatusCode::OK);

	let second = router.oneshot(make_request()).await.unwrap();
	assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
	assert!(second.headers().get("x-ratelimit-reset-requests").is_some());
	assert!(second.headers().get(header::RETRY_AFTER).is_some());
}

/// A replay-mode cache hit still goes through the latency envelope: the
/// handler never runs the embeddings generator, but `annotate_from_cache`
/// must set `operation` so the pipeline knows which profile to pad with.
#[tokio::test]
async fn replay_cache_hit_is_latency_padded() {
	let dir = tempfile::tempdir().unwrap();
	let mut config = Config::default();
	config.simulator_mode = SimulatorMode::Replay;
	config.recording.dir = dir.path().to_path_buf();
	config.recording.autosave = false;
	config.latency.embeddings = LatencyProfile { mean: 200.0, std_dev: 1.0 };
	let api_key = config.simulator_api_key.clone();

	let path = "/openai/deployments/embedding/embeddings";
	let body = serde_json::json!({ "input": "hello" }).to_string();
	let fp = fingerprint::fingerprint("POST", path, Some("application/json"), body.as_bytes()).unwrap();

	let state = AppState::new(config);
	state
		.0
		.recordings
		.insert_if_absent(
			path,
			&fp,
			RecordedResponse {
				status_code: 200,
				headers: std::collections::HashMap::new(),
				body: Some(serde_json::json!({ "object": "list", "data": [] }).to_string()),
				duration_ms: 0.0,
				context_annotations: Default::default(),
				request: RequestSummary {
					method: "POST".to_string(),
					uri: path.to_string(),
					headers: std::collections::HashMap::new(),
					body: Some(body.clone()),
					body_hash: None,
				},
			},
		)
		.unwrap();
	let router = build_router(state);

	let request = Request::builder()
		.method("POST")
		.uri(path)
		.header(header::CONTENT_TYPE, "application/json")
		.header("api-key", api_key)
		.body(Body::from(body))
		.unwrap();

	let start = Instant::now();
	let response = router.oneshot(request).await.unwrap();
	let elapsed = start.elapsed();

	assert_eq!(response.status(), StatusCode::OK);
	assert!(elapsed >= Duration::from_millis(150), "expected cache hit to be latency-padded, took {elapsed:?}");
}

/// A replay-mode cache hit against a translation deployment still goes
/// through the requests-per-minute limiter: `annotate_from_cache` must
/// derive `limiter_name` from the cached request's path instead of always
/// assuming a token-limited operation, or a saturated deployment would
/// silently admit every replayed request.
#[tokio::test]
async fn replay_cache_hit_against_saturated_rpm_deployment_is_rate_limited() {
	let dir = tempfile::tempdir().unwrap();
	let mut config = Config::default();
	config.simulator_mode = SimulatorMode::Replay;
	config.recording.dir = dir.path().to_path_buf();
	config.recording.autosave = false;
	config.deployments.insert(
		"whisper-replay-rpm".to_string(),
		llm_api_simulator::deployment::Deployment::new(
			"whisper-replay-rpm",
			"whisper",
			llm_api_simulator::model::lookup_model("whisper").unwrap(),
		)
		.with_requests_per_minute(1),
	);
	let api_key = config.simulator_api_key.clone();

	let path = "/openai/deployments/whisper-replay-rpm/audio/translations";
	let boundary = "replay-rpm-boundary";
	let content_type = format!("multipart/form-data; boundary={boundary}");
	let mut body = Vec::new();
	body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
	body.extend_from_slice(b"Content-Disposition: form-data; name=\"file\"; filename=\"a.wav\"\r\n\r\n");
	body.extend_from_slice(b"not-really-audio-but-non-empty");
	body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());
	body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
	body.extend_from_slice(b"Content-Disposition: form-data; name=\"response_format\"\r\n\r\n");
	body.extend_from_slice(b"text");
	body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());
	let fp = fingerprint::fingerprint("POST", path, Some(&content_type), &body).unwrap();

	let state = AppState::new(config);
	state
		.0
		.recordings
		.insert_if_absent(
			path,
			&fp,
			RecordedResponse {
				status_code: 200,
				headers: std::collections::HashMap::new(),
				body: Some("cached translation".to_string()),
				duration_ms: 0.0,
				context_annotations: Default::default(),
				request: RequestSummary {
					method: "POST".to_string(),
					uri: path.to_string(),
					headers: std::collections::HashMap::new(),
					body: None,
					body_hash: None,
				},
			},
		)
		.unwrap();
	let router = build_router(state);

	let make_request = || {
		Request::builder()
			.method("POST")
			.uri(path)
			.header(header::CONTENT_TYPE, content_type.clone())
			.header("api-key", api_key.clone())
			.body(Body::from(body.clone()))
			.unwrap()
	};

	let first = router.clone().oneshot(make_request()).await.unwrap();
	assert_eq!(first.status(), StatusCode::OK);

	let second = router.oneshot(make_request()).await.unwrap();
	assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
	assert!(second.headers().get("x-ratelimit-reset-requests").is_some());
}
