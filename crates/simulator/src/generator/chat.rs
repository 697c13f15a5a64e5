//! `POST /openai/deployments/{deployment}/chat/completions`

use std::convert::Infallible;
use std::time::Duration;

use axum::body::Body;
use axum::http::{HeaderValue, header};
use axum::response::{IntoResponse, Json, Response};
use futures::stream;
use serde::Deserialize;

use crate::config::Config;
use crate::context::{Annotations, LimiterName, Operation};
use crate::error::SimResult;
use crate::tokens::{approx_token_count, effective_max_tokens, token_cost};

use super::lorem::generate_lorem_text;
use super::responses::{
	ChatChoice, ChatChunkChoice, ChatCompletionChunk, ChatCompletionResponse, ChatDelta, ChatMessage,
	ContentFilterResults, PromptFilterResult, Usage, generate_id, now_unix,
};
use super::resolve_chat_deployment;

#[derive(Debug, Deserialize)]
pub struct ChatMessageIn {
	#[allow(dead_code)]
	pub role: String,
	pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct ChatCompletionRequest {
	pub messages: Vec<ChatMessageIn>,
	pub max_tokens: Option<u32>,
	#[serde(default)]
	pub stream: bool,
}

fn prompt_tokens(messages: &[ChatMessageIn]) -> u32 {
	messages.iter().map(|m| approx_token_count(&m.content)).sum()
}

pub fn handle(
	config: &Config,
	deployment_name: &str,
	request: ChatCompletionRequest,
	annotations: &mut Annotations,
) -> SimResult<Response> {
	let deployment = resolve_chat_deployment(config, deployment_name, "chatCompletion")?;
	let model_token_limit = deployment.model.token_limit();

	let prompt_tokens = prompt_tokens(&request.messages);
	let max_tokens = effective_max_tokens(request.max_tokens, model_token_limit, prompt_tokens);

	annotations.operation = Some(Operation::ChatCompletions);
	annotations.deployment_name = Some(deployment_name.to_string());
	annotations.limiter_name = Some(LimiterName::OpenAiTokens);
	annotations.max_tokens_requested = request.max_tokens.map(|v| v as u64);
	annotations.max_tokens_effective = Some(max_tokens as u64);
	annotations.prompt_tokens = Some(prompt_tokens as u64);
	annotations.token_cost = Some(token_cost(
		Operation::ChatCompletions,
		request.max_tokens.map(|v| v as u64),
		&[],
	));

	let text = generate_lorem_text(max_tokens, &deployment.model_name);
	let completion_tokens = approx_token_count(&text);
	annotations.completion_tokens = Some(completion_tokens as u64);
	annotations.total_tokens = Some((prompt_tokens + completion_tokens) as u64);

	if request.stream {
		return Ok(stream_response(deployment.model_name.clone(), text));
	}

	let body = ChatCompletionResponse {
		id: generate_id("chatcmpl"),
		object: "chat.completion",
		created: now_unix(),
		model: deployment.model_name,
		prompt_filter_results: vec![PromptFilterResult {
			prompt_index: 0,
			content_filter_results: ContentFilterResults::default(),
		}],
		choices: vec![ChatChoice {
			finish_reason: "length",
			index: 0,
			message: ChatMessage {
				role: "assistant",
				content: text,
			},
			content_filter_results: ContentFilterResults::default(),
		}],
		usage: Usage {
			prompt_tokens: prompt_tokens as u64,
			completion_tokens: completion_tokens as u64,
			total_tokens: (prompt_tokens + completion_tokens) as u64,
		},
	};
	Ok(Json(body).into_response())
}

/// Stream one SSE frame per whitespace-delimited word, 50ms apart, then a
/// closing frame and the `[DONE]` sentinel.
fn stream_response(model_name: String, text: String) -> Response {
	let words: Vec<String> = text.split(' ').map(str::to_string).collect();

	let frames = stream::unfold((0usize, words, true), move |(index, words, first)| {
		let model_name = model_name.clone();
		async move {
			if index > words.len() {
				return None;
			}
			if index == words.len() {
				let chunk = ChatCompletionChunk {
					id: generate_id("chatcmpl"),
					object: "chat.completion.chunk",
					created: now_unix(),
					model: model_name,
					system_fingerprint: None,
					choices: vec![ChatChunkChoice {
						delta: ChatDelta {
							content: None,
							function_call: None,
							role: None,
							tool_calls: None,
							finish_reason: Some("length"),
							index: 0,
							logprobs: None,
							content_filter_results: ContentFilterResults::default(),
						},
					}],
				};
				let frame = format!("data: {}\n\n", serde_json::to_string(&chunk).unwrap_or_default());
				return Some((Ok::<_, Infallible>(frame), (index + 1, words, false)));
			}
			if index == words.len() + 1 {
				return Some((Ok::<_, Infallible>("data: [DONE]\n\n".to_string()), (index + 1, words, false)));
			}

			tokio::time::sleep(Duration::from_millis(50)).await;
			let word = &words[index];
			let content = if first {
				word.clone()
			} else {
				format!(" {word}")
			};
			let chunk = ChatCompletionChunk {
				id: generate_id("chatcmpl"),
				object: "chat.completion.chunk",
				created: now_unix(),
				model: model_name.clone(),
				system_fingerprint: None,
				choices: vec![ChatChunkChoice {
					delta: ChatDelta {
						content: Some(content),
						function_call: None,
						role: if first { Some("assistant") } else { None },
						tool_calls: None,
						finish_reason: None,
						index: 0,
						logprobs: None,
						content_filter_results: ContentFilterResults::default(),
					},
				}],
			};
			let frame = format!("data: {}\n\n", serde_json::to_string(&chunk).unwrap_or_default());
			Some((Ok::<_, Infallible>(frame), (index + 1, words, false)))
		}
	});

	let mut response = Response::new(Body::from_stream(frames));
	response
		.headers_mut()
		.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/event-stream"));
	response
}
