//! Synthetic response generators for the four simulated operations.
//!
//! Each generator resolves a deployment, validates the model kind matches
//! the operation, and builds a response shaped like the real service's.
//! Axum's router is the handler-list equivalent here: each operation has its
//! own route registered once in [`crate::http`], rather than walking an
//! ordered list of "does this match?" closures.

pub mod chat;
pub mod completions;
pub mod embeddings;
pub mod lorem;
pub mod responses;
pub mod translation;

use std::collections::HashSet;
use std::sync::Mutex;

use once_cell::sync::Lazy;

use crate::config::Config;
use crate::deployment::Deployment;
use crate::error::{SimError, SimResult};
use crate::model::{self, ModelDescriptor};

static WARNED_DEPLOYMENTS: Lazy<Mutex<HashSet<String>>> = Lazy::new(|| Mutex::new(HashSet::new()));

fn warn_once_missing_deployment(deployment_name: &str, allow_undefined: bool, default_model: &str) {
	let mut warned = WARNED_DEPLOYMENTS.lock().expect("warn-once set poisoned");
	if !warned.insert(deployment_name.to_string()) {
		return;
	}
	if allow_undefined {
		tracing::warn!(deployment = deployment_name, default_model, "deployment not found in config; using default model");
	} else {
		tracing::warn!(deployment = deployment_name, "deployment not found in config");
	}
}

/// Resolve a deployment by name against the configured catalogue, falling
/// back to a synthetic default of `default_model_name` when
/// `allow_undefined_openai_deployments` is set. Returns
/// `SimError::UnknownDeployment` otherwise.
fn resolve_deployment(config: &Config, deployment_name: &str, default_model_name: &str) -> SimResult<Deployment> {
	if let Some(deployment) = config.deployments.get(deployment_name) {
		return Ok(deployment.clone());
	}

	if config.allow_undefined_openai_deployments {
		warn_once_missing_deployment(deployment_name, true, default_model_name);
		let model = model::lookup_model(default_model_name).expect("builtin default model name is valid");
		let mut deployment = Deployment::new(deployment_name, default_model_name, model.clone());
		deployment = match model {
			ModelDescriptor::Whisper => deployment.with_requests_per_minute(1000),
			_ => deployment.with_tokens_per_minute(10_000),
		};
		return Ok(deployment);
	}

	warn_once_missing_deployment(deployment_name, false, default_model_name);
	Err(SimError::UnknownDeployment(deployment_name.to_string()))
}

pub(crate) fn resolve_chat_deployment(
	config: &Config,
	deployment_name: &str,
	operation: &'static str,
) -> SimResult<Deployment> {
	let deployment = resolve_deployment(config, deployment_name, model::DEFAULT_CHAT_MODEL)?;
	if deployment.model.as_chat().is_none() {
		return Err(SimError::OperationNotSupported {
			operation,
			deployment: deployment_name.to_string(),
		});
	}
	Ok(deployment)
}

pub(crate) fn resolve_embedding_deployment(config: &Config, deployment_name: &str) -> SimResult<Deployment> {
	let deployment = resolve_deployment(config, deployment_name, model::DEFAULT_EMBEDDING_MODEL)?;
	if deployment.model.as_embedding().is_none() {
		return Err(SimError::OperationNotSupported {
			operation: "embeddings",
			deployment: deployment_name.to_string(),
		});
	}
	Ok(deployment)
}

pub(crate) fn resolve_whisper_deployment(config: &Config, deployment_name: &str) -> SimResult<Deployment> {
	let deployment = resolve_deployment(config, deployment_name, model::DEFAULT_WHISPER_MODEL)?;
	if deployment.model.is_token_limited() {
		return Err(SimError::OperationNotSupported {
			operation: "translation",
			deployment: deployment_name.to_string(),
		});
	}
	Ok(deployment)
}
