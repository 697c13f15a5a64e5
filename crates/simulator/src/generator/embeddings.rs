//! `POST /openai/deployments/{deployment}/embeddings`

use axum::response::{IntoResponse, Json, Response};
use rand::Rng;
use serde::Deserialize;
use serde::de::{self, Deserializer};

use crate::config::Config;
use crate::context::{Annotations, LimiterName, Operation};
use crate::error::SimResult;
use crate::tokens::{approx_token_count, token_cost};

use super::resolve_embedding_deployment;
use super::responses::{EmbeddingObject, EmbeddingUsage, EmbeddingsResponse};

#[derive(Debug, Deserialize)]
pub struct EmbeddingsRequest {
	#[serde(deserialize_with = "input_as_list")]
	pub input: Vec<String>,
	pub dimensions: Option<u32>,
}

/// `input` may be a single string or a list of strings; normalize to a list.
fn input_as_list<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
	#[derive(Deserialize)]
	#[serde(untagged)]
	enum OneOrMany {
		One(String),
		Many(Vec<String>),
	}
	match OneOrMany::deserialize(deserializer)? {
		OneOrMany::One(s) => Ok(vec![s]),
		OneOrMany::Many(v) if v.is_empty() => Err(de::Error::custom("input must not be empty")),
		OneOrMany::Many(v) => Ok(v),
	}
}

fn random_embedding(size: u32) -> Vec<f64> {
	let mut rng = rand::rng();
	(0..size).map(|_| (rng.random::<f64>() - 0.5) * 4.0).collect()
}

pub fn handle(
	config: &Config,
	deployment_name: &str,
	request: EmbeddingsRequest,
	annotations: &mut Annotations,
) -> SimResult<Response> {
	let deployment = resolve_embedding_deployment(config, deployment_name)?;

	let mut embedding_size = deployment.embedding_size;
	if let Some(dimensions) = request.dimensions {
		if deployment.model.supports_custom_dimensions() {
			embedding_size = dimensions;
		}
	}

	let tokens: u32 = request.input.iter().map(|s| approx_token_count(s)).sum();

	annotations.operation = Some(Operation::Embeddings);
	annotations.deployment_name = Some(deployment_name.to_string());
	annotations.limiter_name = Some(LimiterName::OpenAiTokens);
	annotations.prompt_tokens = Some(tokens as u64);
	annotations.total_tokens = Some(tokens as u64);
	annotations.token_cost = Some(token_cost(Operation::Embeddings, None, &request.input));

	let data = request
		.input
		.iter()
		.enumerate()
		.map(|(index, _)| EmbeddingObject {
			object: "embedding",
			index: index as u32,
			embedding: random_embedding(embedding_size),
		})
		.collect();

	let body = EmbeddingsResponse {
		object: "list",
		data,
		model: deployment.model_name,
		usage: EmbeddingUsage {
			prompt_tokens: tokens as u64,
			total_tokens: tokens as u64,
		},
	};
	Ok(Json(body).into_response())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn embedding_size_defaults_to_deployment_value() {
		let config = Config::default();
		let mut annotations = Annotations::default();
		let request = EmbeddingsRequest {
			input: vec!["hello".to_string()],
			dimensions: None,
		};
		let response = handle(&config, "embedding", request, &mut annotations).unwrap();
		assert_eq!(response.status(), axum::http::StatusCode::OK);
	}

	#[test]
	fn dimensions_ignored_when_unsupported() {
		let config = Config::default();
		let mut annotations = Annotations::default();
		// "embedding" -> text-embedding-ada-002, supports_custom_dimensions = false
		let request = EmbeddingsRequest {
			input: vec!["hello".to_string()],
			dimensions: Some(16),
		};
		handle(&config, "embedding", request, &mut annotations).unwrap();
		assert_eq!(annotations.operation, Some(Operation::Embeddings));
	}
}
