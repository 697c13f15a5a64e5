//! Model descriptors and the built-in catalogue mapping model names to them.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

/// Sum type describing what kind of model a deployment points at.
///
/// Chat and embedding models are billed against a tokens-per-minute window;
/// Whisper (translation) is billed against a plain requests-per-minute
/// window instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModelDescriptor {
	Chat {
		supports_json_schema: bool,
		/// Approximate context window, used to bound effective max_tokens.
		token_limit: u32,
	},
	Embedding {
		supports_custom_dimensions: bool,
	},
	Whisper,
}

impl ModelDescriptor {
	pub fn is_token_limited(&self) -> bool {
		match self {
			ModelDescriptor::Chat { .. } | ModelDescriptor::Embedding { .. } => true,
			ModelDescriptor::Whisper => false,
		}
	}

	pub fn as_chat(&self) -> Option<&ModelDescriptor> {
		matches!(self, ModelDescriptor::Chat { .. }).then_some(self)
	}

	pub fn as_embedding(&self) -> Option<&ModelDescriptor> {
		matches!(self, ModelDescriptor::Embedding { .. }).then_some(self)
	}

	pub fn token_limit(&self) -> u32 {
		match self {
			ModelDescriptor::Chat { token_limit, .. } => *token_limit,
			// Embeddings/whisper aren't completion-bounded; use a generous ceiling.
			_ => u32::MAX,
		}
	}

	pub fn supports_custom_dimensions(&self) -> bool {
		matches!(
			self,
			ModelDescriptor::Embedding {
				supports_custom_dimensions: true
			}
		)
	}
}

/// Built-in name -> descriptor table, standing in for the real provider's
/// model registry. Names that aren't listed here are a hard configuration
/// error when referenced by a deployment (see `Deployment::load_catalogue`).
pub static MODEL_CATALOGUE: Lazy<HashMap<&'static str, ModelDescriptor>> = Lazy::new(|| {
	let mut m = HashMap::new();
	m.insert(
		"gpt-3.5-turbo",
		ModelDescriptor::Chat {
			supports_json_schema: false,
			token_limit: 4096,
		},
	);
	m.insert(
		"gpt-3.5-turbo-0613",
		ModelDescriptor::Chat {
			supports_json_schema: false,
			token_limit: 4096,
		},
	);
	m.insert(
		"gpt-4",
		ModelDescriptor::Chat {
			supports_json_schema: false,
			token_limit: 8192,
		},
	);
	m.insert(
		"gpt-4o",
		ModelDescriptor::Chat {
			supports_json_schema: true,
			token_limit: 128_000,
		},
	);
	m.insert(
		"text-embedding-ada-002",
		ModelDescriptor::Embedding {
			supports_custom_dimensions: false,
		},
	);
	m.insert(
		"text-embedding-3-small",
		ModelDescriptor::Embedding {
			supports_custom_dimensions: true,
		},
	);
	m.insert(
		"text-embedding-3-large",
		ModelDescriptor::Embedding {
			supports_custom_dimensions: true,
		},
	);
	m.insert("whisper", ModelDescriptor::Whisper);
	m
});

pub fn lookup_model(name: &str) -> Option<ModelDescriptor> {
	MODEL_CATALOGUE.get(name).cloned()
}

/// Default model used for an unknown chat deployment when
/// `allow_undefined_openai_deployments` is set.
pub const DEFAULT_CHAT_MODEL: &str = "gpt-3.5-turbo-0613";
/// Default model used for an unknown embedding deployment.
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-ada-002";
/// Default model used for an unknown whisper deployment.
pub const DEFAULT_WHISPER_MODEL: &str = "whisper";
