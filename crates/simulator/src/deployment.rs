//! The deployment catalogue: named logical endpoints mapped to a model and a
//! quota.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{SimError, SimResult};
use crate::model::{self, ModelDescriptor};

/// A named logical endpoint. Exactly one of `tokens_per_minute` /
/// `requests_per_minute` is meaningful, depending on
/// `model.is_token_limited()`.
#[derive(Debug, Clone, Serialize)]
pub struct Deployment {
	pub name: String,
	pub model_name: String,
	pub model: ModelDescriptor,
	pub tokens_per_minute: u64,
	pub requests_per_minute: u64,
	pub embedding_size: u32,
}

impl Deployment {
	pub fn new(name: impl Into<String>, model_name: impl Into<String>, model: ModelDescriptor) -> Self {
		Deployment {
			name: name.into(),
			model_name: model_name.into(),
			model,
			tokens_per_minute: 0,
			requests_per_minute: 0,
			embedding_size: 1536,
		}
	}

	pub fn with_tokens_per_minute(mut self, tpm: u64) -> Self {
		self.tokens_per_minute = tpm;
		self
	}

	pub fn with_requests_per_minute(mut self, rpm: u64) -> Self {
		self.requests_per_minute = rpm;
		self
	}

	pub fn with_embedding_size(mut self, size: u32) -> Self {
		self.embedding_size = size;
		self
	}
}

/// Shape of one entry in the JSON deployment catalogue file
/// (`OPENAI_DEPLOYMENT_CONFIG_PATH`) and in a `PATCH /++/config` deployment
/// upsert.
#[derive(Debug, Clone, Deserialize)]
pub struct DeploymentEntry {
	pub model: String,
	#[serde(rename = "tokensPerMinute", default)]
	pub tokens_per_minute: u64,
	#[serde(rename = "requestsPerMinute", default)]
	pub requests_per_minute: u64,
	#[serde(rename = "embeddingSize", default = "default_embedding_size")]
	pub embedding_size: u32,
}

fn default_embedding_size() -> u32 {
	1536
}

pub type DeploymentMap = HashMap<String, Deployment>;

/// Resolve one catalogue-file/patch entry into a `Deployment`. An unknown
/// model name is a fatal configuration error (at startup) or a 400-shaped
/// patch rejection (at runtime) -- both surface as `SimError::UnknownModel`.
pub fn deployment_from_entry(name: &str, entry: DeploymentEntry) -> SimResult<Deployment> {
	let model = model::lookup_model(&entry.model).ok_or_else(|| SimError::UnknownModel {
		deployment: name.to_string(),
		model: entry.model.clone(),
	})?;
	let is_token_limited = model.is_token_limited();
	let mut deployment = Deployment::new(name, entry.model, model);
	if is_token_limited {
		deployment = deployment.with_tokens_per_minute(entry.tokens_per_minute);
	} else {
		// Whisper deployments use requests-per-minute; fall back to the
		// tokensPerMinute field for catalogues authored before the
		// distinction existed.
		let rpm = if entry.requests_per_minute > 0 {
			entry.requests_per_minute
		} else {
			entry.tokens_per_minute
		};
		deployment = deployment.with_requests_per_minute(rpm);
	}
	deployment = deployment.with_embedding_size(entry.embedding_size);
	Ok(deployment)
}

/// Load the deployment catalogue from a JSON file. An unknown model name
/// referenced by an entry is a fatal configuration error.
pub fn load_catalogue_file(path: &Path) -> SimResult<DeploymentMap> {
	let text = std::fs::read_to_string(path).map_err(|source| SimError::CatalogueIo {
		path: path.display().to_string(),
		source,
	})?;
	let raw: HashMap<String, DeploymentEntry> = serde_json::from_str(&text)?;

	let mut deployments = DeploymentMap::new();
	for (name, entry) in raw {
		deployments.insert(name.clone(), deployment_from_entry(&name, entry)?);
	}
	Ok(deployments)
}

/// Fallback catalogue used when no `OPENAI_DEPLOYMENT_CONFIG_PATH` is
/// configured, so `generate` mode works out of the box.
pub fn default_catalogue() -> DeploymentMap {
	let mut deployments = DeploymentMap::new();
	deployments.insert(
		"embedding".to_string(),
		Deployment::new(
			"embedding",
			"text-embedding-ada-002",
			model::lookup_model("text-embedding-ada-002").expect("builtin model"),
		)
		.with_tokens_per_minute(20_000)
		.with_embedding_size(1536),
	);

	for tpm in [1_000, 2_000, 5_000, 10_000, 20_000, 50_000, 100_000, 100_000_000] {
		let name = format!("gpt-35-turbo-{}", human_rate(tpm));
		deployments.insert(
			name.clone(),
			Deployment::new(
				name,
				"gpt-3.5-turbo",
				model::lookup_model("gpt-3.5-turbo").expect("builtin model"),
			)
			.with_tokens_per_minute(tpm),
		);
	}
	deployments
}

fn human_rate(tpm: u64) -> String {
	if tpm >= 1_000_000 {
		format!("{}m-token", tpm / 1_000_000)
	} else {
		format!("{}k-token", tpm / 1_000)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn default_catalogue_has_embedding_and_chat_deployments() {
		let deployments = default_catalogue();
		assert!(deployments.contains_key("embedding"));
		assert!(deployments.get("embedding").unwrap().model.is_token_limited());
		assert_eq!(deployments.len(), 9);
	}

	#[test]
	fn load_catalogue_file_rejects_unknown_model() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("deployments.json");
		std::fs::write(&path, r#"{"bad": {"model": "not-a-real-model", "tokensPerMinute": 10}}"#).unwrap();
		let err = load_catalogue_file(&path).unwrap_err();
		assert!(matches!(err, SimError::UnknownModel { .. }));
	}

	#[test]
	fn load_catalogue_file_parses_entries() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("deployments.json");
		std::fs::write(
			&path,
			r#"{"chat": {"model": "gpt-3.5-turbo", "tokensPerMinute": 1000}}"#,
		)
		.unwrap();
		let deployments = load_catalogue_file(&path).unwrap();
		assert_eq!(deployments["chat"].tokens_per_minute, 1000);
		assert_eq!(deployments["chat"].embedding_size, 1536);
	}
}
