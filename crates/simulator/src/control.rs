//! Control-plane surface: live config inspection/patching and a manual
//! recordings flush. Guarded by the same `api-key` header as the simulated
//! operations, except `/` (liveness) which is open.

use std::collections::HashMap;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::{Deserialize, Serialize};

use crate::config::{LatencyConfig, SimulatorMode};
use crate::deployment::{self, DeploymentEntry, DeploymentMap};
use crate::error::SimError;
use crate::state::AppState;

pub async fn liveness() -> impl IntoResponse {
	Json(serde_json::json!({ "message": "true" }))
}

#[derive(Debug, Serialize)]
pub struct ConfigView {
	pub simulator_mode: SimulatorMode,
	pub recording_dir: String,
	pub recording_autosave: bool,
	pub allow_undefined_openai_deployments: bool,
	pub deployments: DeploymentMap,
	pub latency: LatencyConfig,
}

pub async fn get_config(State(state): State<AppState>) -> impl IntoResponse {
	let config = state.0.config.load();
	Json(ConfigView {
		simulator_mode: config.simulator_mode,
		recording_dir: config.recording.dir.display().to_string(),
		recording_autosave: config.recording.autosave,
		allow_undefined_openai_deployments: config.allow_undefined_openai_deployments,
		deployments: config.deployments.clone(),
		latency: config.latency.clone(),
	})
}

#[derive(Debug, Deserialize, Default)]
pub struct ConfigPatch {
	pub simulator_mode: Option<SimulatorMode>,
	pub allow_undefined_openai_deployments: Option<bool>,
	pub latency: Option<LatencyConfig>,
	/// Upserted by name; an entry naming an unknown model rejects the whole
	/// patch rather than publishing a partially-applied catalogue.
	pub deployments: Option<HashMap<String, DeploymentEntry>>,
}

pub async fn patch_config(State(state): State<AppState>, Json(patch): Json<ConfigPatch>) -> axum::response::Response {
	let mut config = (*state.0.config.load()).clone();
	if let Some(mode) = patch.simulator_mode {
		config.simulator_mode = mode;
	}
	if let Some(allow) = patch.allow_undefined_openai_deployments {
		config.allow_undefined_openai_deployments = allow;
	}
	if let Some(latency) = patch.latency {
		config.latency = latency;
	}
	if let Some(entries) = patch.deployments {
		for (name, entry) in entries {
			let deployment = match deployment::deployment_from_entry(&name, entry) {
				Ok(deployment) => deployment,
				Err(err) => return err.into_response(),
			};
			config.deployments.insert(name, deployment);
		}
	}
	state.publish_config(config);
	get_config(State(state)).await.into_response()
}

pub async fn save_recordings(State(state): State<AppState>) -> axum::response::Response {
	let config = state.0.config.load();
	if config.simulator_mode != SimulatorMode::Record {
		return SimError::NotRecording.into_response();
	}
	match state.0.recordings.save_all() {
		Ok(()) => (StatusCode::OK, "Recordings saved").into_response(),
		Err(err) => err.into_response(),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::config::Config;

	#[tokio::test]
	async fn patch_updates_mode() {
		let state = AppState::new(Config::default());
		let patch = ConfigPatch {
			simulator_mode: Some(SimulatorMode::Record),
			..Default::default()
		};
		patch_config(State(state.clone()), Json(patch)).await;
		assert_eq!(state.0.config.load().simulator_mode, SimulatorMode::Record);
	}
}
