//! Outbound forwarder used in record mode: replays the incoming request
//! against the real upstream and reports back enough to annotate the
//! context and decide whether to persist the response.

use std::time::Duration;

use reqwest::Client;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::Deserialize;

use crate::error::{SimError, SimResult};

const FORWARD_TIMEOUT: Duration = Duration::from_secs(30);

/// Response headers stripped before a forwarded response is returned to the
/// caller or persisted, to keep recordings compact and hermetic.
const RESPONSE_HEADER_DENYLIST: &[&str] = &[
	"apim-request-id",
	"azureml-model-session",
	"x-accel-buffering",
	"x-content-type-options",
	"x-ms-client-request-id",
	"x-ms-region",
	"x-request-id",
	"cache-control",
	"content-length",
	"date",
	"strict-transport-security",
	"access-control-allow-origin",
];

const REQUEST_HEADER_DENYLIST: &[&str] = &["content-length", "host", "authorization"];

pub struct Forwarder {
	client: Client,
	base_url: String,
	api_key: String,
}

pub struct ForwardedResponse {
	pub status: u16,
	pub headers: HeaderMap,
	pub body: bytes::Bytes,
}

#[derive(Debug, Deserialize)]
struct UsageBody {
	usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Usage {
	prompt_tokens: Option<u64>,
	completion_tokens: Option<u64>,
	total_tokens: Option<u64>,
}

impl Forwarder {
	pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
		Forwarder {
			client: Client::builder()
				.timeout(FORWARD_TIMEOUT)
				.build()
				.expect("reqwest client builds with default TLS config"),
			base_url: base_url.into(),
			api_key: api_key.into(),
		}
	}

	/// Forward `method path_and_query` with `headers`/`body` to the upstream,
	/// substituting the upstream API key for the original `authorization`.
	pub async fn forward(
		&self,
		method: reqwest::Method,
		path_and_query: &str,
		headers: &HeaderMap,
		body: bytes::Bytes,
	) -> SimResult<ForwardedResponse> {
		let url = format!("{}{}", self.base_url.trim_end_matches('/'), path_and_query);

		let mut forwarded_headers = HeaderMap::new();
		for (name, value) in headers.iter() {
			if REQUEST_HEADER_DENYLIST.contains(&name.as_str().to_ascii_lowercase().as_str()) {
				continue;
			}
			forwarded_headers.insert(name.clone(), value.clone());
		}
		forwarded_headers.insert(
			HeaderName::from_static("api-key"),
			HeaderValue::from_str(&self.api_key).map_err(|_| SimError::Internal("invalid upstream api key".into()))?,
		);

		let upstream_response = self
			.client
			.request(method, &url)
			.headers(forwarded_headers)
			.body(body)
			.send()
			.await?;

		let status = upstream_response.status().as_u16();
		let mut response_headers = upstream_response.headers().clone();
		for header in RESPONSE_HEADER_DENYLIST {
			response_headers.remove(*header);
		}
		let body = upstream_response.bytes().await?;

		Ok(ForwardedResponse {
			status,
			headers: response_headers,
			body,
		})
	}
}

/// Parse `usage.{prompt_tokens, completion_tokens, total_tokens}` out of a
/// JSON response body, if present. Returns `None` on a non-JSON or
/// usage-less body rather than erroring -- not every forwarded response
/// carries usage (e.g. a translation's plain-text body).
pub fn extract_usage(body: &[u8]) -> Option<(u64, u64, u64)> {
	let parsed: UsageBody = serde_json::from_slice(body).ok()?;
	let usage = parsed.usage?;
	Some((
		usage.prompt_tokens.unwrap_or(0),
		usage.completion_tokens.unwrap_or(0),
		usage.total_tokens.unwrap_or(0),
	))
}

/// `/openai/deployments/{name}/...` -> `{name}`.
pub fn deployment_name_from_path(path: &str) -> Option<&str> {
	path.strip_prefix("/openai/deployments/")?.split('/').next()
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn deployment_name_is_extracted_from_path() {
		assert_eq!(
			deployment_name_from_path("/openai/deployments/gpt-4/chat/completions"),
			Some("gpt-4")
		);
		assert_eq!(deployment_name_from_path("/healthz"), None);
	}

	#[test]
	fn extracts_usage_from_json_body() {
		let body = br#"{"usage": {"prompt_tokens": 3, "completion_tokens": 5, "total_tokens": 8}}"#;
		assert_eq!(extract_usage(body), Some((3, 5, 8)));
	}

	#[test]
	fn missing_usage_returns_none() {
		assert_eq!(extract_usage(b"{}"), None);
		assert_eq!(extract_usage(b"not json"), None);
	}
}
