//! `POST /openai/deployments/{deployment}/completions`

use axum::response::{IntoResponse, Json, Response};
use serde::Deserialize;

use crate::config::Config;
use crate::context::{Annotations, LimiterName, Operation};
use crate::error::SimResult;
use crate::tokens::{approx_token_count, effective_max_tokens, token_cost};

use super::lorem::generate_lorem_text;
use super::resolve_chat_deployment;
use super::responses::{CompletionChoice, CompletionResponse, Usage, generate_id, now_unix};

#[derive(Debug, Deserialize)]
pub struct CompletionRequest {
	pub prompt: String,
	pub max_tokens: Option<u32>,
}

pub fn handle(
	config: &Config,
	deployment_name: &str,
	request: CompletionRequest,
	annotations: &mut Annotations,
) -> SimResult<Response> {
	let deployment = resolve_chat_deployment(config, deployment_name, "completions")?;
	let model_token_limit = deployment.model.token_limit();

	let prompt_tokens = approx_token_count(&request.prompt);
	let max_tokens = effective_max_tokens(request.max_tokens, model_token_limit, prompt_tokens);

	annotations.operation = Some(Operation::Completions);
	annotations.deployment_name = Some(deployment_name.to_string());
	annotations.limiter_name = Some(LimiterName::OpenAiTokens);
	annotations.max_tokens_requested = request.max_tokens.map(|v| v as u64);
	annotations.max_tokens_effective = Some(max_tokens as u64);
	annotations.prompt_tokens = Some(prompt_tokens as u64);
	annotations.token_cost = Some(token_cost(
		Operation::Completions,
		request.max_tokens.map(|v| v as u64),
		&[],
	));

	let text = generate_lorem_text(max_tokens, &deployment.model_name);
	let completion_tokens = approx_token_count(&text);
	annotations.completion_tokens = Some(completion_tokens as u64);
	annotations.total_tokens = Some((prompt_tokens + completion_tokens) as u64);

	let body = CompletionResponse {
		id: generate_id("cmpl"),
		object: "text_completion",
		created: now_unix(),
		model: deployment.model_name,
		choices: vec![CompletionChoice {
			text,
			index: 0,
			finish_reason: "length",
			logprobs: None,
		}],
		usage: Usage {
			prompt_tokens: prompt_tokens as u64,
			completion_tokens: completion_tokens as u64,
			total_tokens: (prompt_tokens + completion_tokens) as u64,
		},
	};
	Ok(Json(body).into_response())
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::config::Config;

	#[test]
	fn completion_respects_max_tokens() {
		let config = Config::default();
		let deployment_name = config
			.deployments
			.keys()
			.find(|k| config.deployments[*k].model.as_chat().is_some())
			.unwrap()
			.clone();
		let mut annotations = Annotations::default();
		let request = CompletionRequest {
			prompt: "tell me a story".to_string(),
			max_tokens: Some(15),
		};
		handle(&config, &deployment_name, request, &mut annotations).unwrap();
		assert!(annotations.completion_tokens.unwrap() <= 15);
	}
}
