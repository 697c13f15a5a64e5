//! Per-request annotation bag threaded through the pipeline.

use std::sync::Arc;

use crate::config::Config;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
	ChatCompletions,
	Completions,
	Embeddings,
	Translation,
}

impl Operation {
	pub fn as_str(&self) -> &'static str {
		match self {
			Operation::ChatCompletions => "chat_completions",
			Operation::Completions => "completions",
			Operation::Embeddings => "embeddings",
			Operation::Translation => "translation",
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimiterName {
	OpenAiTokens,
	OpenAiRequests,
}

impl LimiterName {
	pub fn as_str(&self) -> &'static str {
		match self {
			LimiterName::OpenAiTokens => "openai_tokens",
			LimiterName::OpenAiRequests => "openai_requests",
		}
	}
}

/// Annotations accumulated as the pipeline advances. Required by the time
/// limiters run: `operation`, `deployment_name`, `limiter_name`, and (for
/// token-limited operations) the three token counts.
#[derive(Debug, Clone, Default)]
pub struct Annotations {
	pub operation: Option<Operation>,
	pub deployment_name: Option<String>,
	pub limiter_name: Option<LimiterName>,
	pub prompt_tokens: Option<u64>,
	pub completion_tokens: Option<u64>,
	pub total_tokens: Option<u64>,
	/// The amount billed against the TPM limiter for this request (§4.2.3):
	/// the request's explicit `max_tokens`, else a fixed per-operation
	/// default. Distinct from `total_tokens`, which is the post-generation
	/// usage reported back to the caller.
	pub token_cost: Option<u64>,
	pub max_tokens_requested: Option<u64>,
	pub max_tokens_effective: Option<u64>,
	pub file_size_bytes: Option<u64>,
	pub target_duration_ms: Option<f64>,
}

/// Per-request bag: the active configuration snapshot plus the annotations
/// the pipeline fills in as it runs. Discarded once the response is sent.
pub struct RequestContext {
	pub config: Arc<Config>,
	pub annotations: Annotations,
}

impl RequestContext {
	pub fn new(config: Arc<Config>) -> Self {
		RequestContext {
			config,
			annotations: Annotations::default(),
		}
	}
}
