//! Response body shapes shared by the chat/completions/embeddings generators.
//! Field names and nesting mirror the real service so clients built against
//! it parse these responses without modification.

use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct ContentFilterCategory {
	pub filtered: bool,
	pub severity: &'static str,
}

impl Default for ContentFilterCategory {
	fn default() -> Self {
		ContentFilterCategory {
			filtered: false,
			severity: "safe",
		}
	}
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct ContentFilterResults {
	pub hate: ContentFilterCategory,
	pub self_harm: ContentFilterCategory,
	pub sexual: ContentFilterCategory,
	pub violence: ContentFilterCategory,
}

#[derive(Debug, Clone, Serialize)]
pub struct PromptFilterResult {
	pub prompt_index: u32,
	pub content_filter_results: ContentFilterResults,
}

#[derive(Debug, Clone, Serialize)]
pub struct Usage {
	pub prompt_tokens: u64,
	pub completion_tokens: u64,
	pub total_tokens: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
	pub role: &'static str,
	pub content: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatChoice {
	pub finish_reason: &'static str,
	pub index: u32,
	pub message: ChatMessage,
	pub content_filter_results: ContentFilterResults,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatCompletionResponse {
	pub id: String,
	pub object: &'static str,
	pub created: i64,
	pub model: String,
	pub prompt_filter_results: Vec<PromptFilterResult>,
	pub choices: Vec<ChatChoice>,
	pub usage: Usage,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatDelta {
	pub content: Option<String>,
	pub function_call: Option<()>,
	pub role: Option<&'static str>,
	pub tool_calls: Option<()>,
	pub finish_reason: Option<&'static str>,
	pub index: u32,
	pub logprobs: Option<()>,
	pub content_filter_results: ContentFilterResults,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatChunkChoice {
	pub delta: ChatDelta,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatCompletionChunk {
	pub id: String,
	pub object: &'static str,
	pub created: i64,
	pub model: String,
	pub system_fingerprint: Option<()>,
	pub choices: Vec<ChatChunkChoice>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CompletionChoice {
	pub text: String,
	pub index: u32,
	pub finish_reason: &'static str,
	pub logprobs: Option<()>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CompletionResponse {
	pub id: String,
	pub object: &'static str,
	pub created: i64,
	pub model: String,
	pub choices: Vec<CompletionChoice>,
	pub usage: Usage,
}

#[derive(Debug, Clone, Serialize)]
pub struct EmbeddingObject {
	pub object: &'static str,
	pub index: u32,
	pub embedding: Vec<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EmbeddingUsage {
	pub prompt_tokens: u64,
	pub total_tokens: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct EmbeddingsResponse {
	pub object: &'static str,
	pub data: Vec<EmbeddingObject>,
	pub model: String,
	pub usage: EmbeddingUsage,
}

/// Generate a response/object id in the shape of the real service's
/// `nanoid`-derived ids (`{prefix}-{21 random alphanumeric chars}`).
pub fn generate_id(prefix: &str) -> String {
	format!("{prefix}-{}", uuid::Uuid::new_v4().simple())
}

pub fn now_unix() -> i64 {
	std::time::SystemTime::now()
		.duration_since(std::time::UNIX_EPOCH)
		.map(|d| d.as_secs() as i64)
		.unwrap_or(0)
}
