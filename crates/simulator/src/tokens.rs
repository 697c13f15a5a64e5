//! Token-count approximation shared by the limiter's cost computation and
//! the generators' effective-max-tokens calculation.
//!
//! Exact upstream tokenizer fidelity is out of scope; `ceil(chars / 4)` is
//! close enough for load-testing purposes and is trivially cheap.

use crate::context::Operation;

pub const DEFAULT_COMPLETION_COST: u64 = 16;

pub fn approx_token_count(text: &str) -> u32 {
	text.chars().count().div_ceil(4) as u32
}

/// Token cost billed against the TPM limiter for one request, before the
/// limiter runs. `explicit_max_tokens` takes priority when present.
pub fn token_cost(operation: Operation, explicit_max_tokens: Option<u64>, embedding_inputs: &[String]) -> u64 {
	if let Some(max_tokens) = explicit_max_tokens {
		return max_tokens;
	}
	match operation {
		Operation::ChatCompletions | Operation::Completions => DEFAULT_COMPLETION_COST,
		Operation::Embeddings => embedding_inputs
			.iter()
			.map(|s| approx_token_count(s) as u64)
			.sum(),
		Operation::Translation => 0,
	}
}

/// Effective completion budget: the caller's request clamped to what the
/// model's context window has left after the prompt, floored so a near-full
/// prompt still gets a short completion.
pub fn effective_max_tokens(requested_max: Option<u32>, model_token_limit: u32, prompt_tokens: u32) -> u32 {
	let requested = requested_max.unwrap_or(DEFAULT_COMPLETION_COST as u32);
	let remaining = model_token_limit.saturating_sub(prompt_tokens);
	requested.min(remaining).max(1)
}
