//! Process-wide configuration, published as an immutable snapshot behind an
//! `ArcSwap` so in-flight requests never observe a torn mid-patch state.

use std::path::PathBuf;
use std::sync::Arc;

use arc_swap::ArcSwap;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

use crate::deployment::{self, DeploymentMap};

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct LatencyProfile {
	pub mean: f64,
	pub std_dev: f64,
}

impl LatencyProfile {
	fn new(mean: f64, std_dev: f64) -> Self {
		LatencyProfile { mean, std_dev }
	}

	/// Draw a simulated duration in milliseconds, clamped to be non-negative.
	pub fn sample_ms(&self) -> f64 {
		let normal = Normal::new(self.mean, self.std_dev.max(0.0001)).expect("valid normal params");
		normal.sample(&mut rand::rng()).max(0.0)
	}
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LatencyConfig {
	pub completions: LatencyProfile,
	pub chat_completions: LatencyProfile,
	pub embeddings: LatencyProfile,
	pub translations: LatencyProfile,
}

impl Default for LatencyConfig {
	fn default() -> Self {
		LatencyConfig {
			completions: LatencyProfile::new(15.0, 2.0),
			chat_completions: LatencyProfile::new(19.0, 6.0),
			embeddings: LatencyProfile::new(100.0, 30.0),
			translations: LatencyProfile::new(100.0, 30.0),
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SimulatorMode {
	Generate,
	Record,
	Replay,
}

impl std::str::FromStr for SimulatorMode {
	type Err = anyhow::Error;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"generate" => Ok(SimulatorMode::Generate),
			"record" => Ok(SimulatorMode::Record),
			"replay" => Ok(SimulatorMode::Replay),
			other => anyhow::bail!("invalid SIMULATOR_MODE {other:?}, expected generate|record|replay"),
		}
	}
}

#[derive(Debug, Clone)]
pub struct RecordingConfig {
	pub dir: PathBuf,
	pub autosave: bool,
	pub upstream_endpoint: Option<String>,
	pub upstream_api_key: Option<String>,
}

impl Default for RecordingConfig {
	fn default() -> Self {
		RecordingConfig {
			dir: PathBuf::from(".recording"),
			autosave: true,
			upstream_endpoint: None,
			upstream_api_key: None,
		}
	}
}

/// Immutable configuration snapshot. A `PATCH /++/config` request builds a
/// new `Config` from the old one and swaps it in atomically; in-flight
/// requests keep the snapshot they captured at request start.
#[derive(Debug, Clone)]
pub struct Config {
	pub simulator_mode: SimulatorMode,
	pub simulator_api_key: String,
	pub recording: RecordingConfig,
	pub deployments: DeploymentMap,
	pub latency: LatencyConfig,
	pub allow_undefined_openai_deployments: bool,
}

impl Default for Config {
	fn default() -> Self {
		Config {
			simulator_mode: SimulatorMode::Generate,
			simulator_api_key: uuid::Uuid::new_v4().to_string(),
			recording: RecordingConfig::default(),
			deployments: deployment::default_catalogue(),
			latency: LatencyConfig::default(),
			allow_undefined_openai_deployments: true,
		}
	}
}

impl Config {
	/// Build a `Config` from environment variables.
	pub fn from_env() -> anyhow::Result<Self> {
		let mut config = Config::default();

		if let Ok(mode) = std::env::var("SIMULATOR_MODE") {
			config.simulator_mode = mode.parse()?;
		}
		if let Ok(key) = std::env::var("SIMULATOR_API_KEY") {
			config.simulator_api_key = key;
		}
		if let Ok(dir) = std::env::var("RECORDING_DIR") {
			config.recording.dir = PathBuf::from(dir);
		}
		if let Ok(autosave) = std::env::var("RECORDING_AUTOSAVE") {
			config.recording.autosave = parse_bool(&autosave).unwrap_or(true);
		}
		config.recording.upstream_endpoint = std::env::var("AZURE_OPENAI_ENDPOINT").ok();
		config.recording.upstream_api_key = std::env::var("AZURE_OPENAI_KEY").ok();

		if let Ok(allow) = std::env::var("ALLOW_UNDEFINED_OPENAI_DEPLOYMENTS") {
			config.allow_undefined_openai_deployments = parse_bool(&allow).unwrap_or(true);
		}

		if let Ok(path) = std::env::var("OPENAI_DEPLOYMENT_CONFIG_PATH") {
			config.deployments = deployment::load_catalogue_file(&PathBuf::from(path))?;
		}

		apply_latency_env(&mut config.latency.completions, "LATENCY_OPENAI_COMPLETIONS");
		apply_latency_env(
			&mut config.latency.chat_completions,
			"LATENCY_OPENAI_CHAT_COMPLETIONS",
		);
		apply_latency_env(&mut config.latency.embeddings, "LATENCY_OPENAI_EMBEDDINGS");
		apply_latency_env(&mut config.latency.translations, "LATENCY_OPENAI_TRANSLATIONS");

		Ok(config)
	}
}

fn apply_latency_env(profile: &mut LatencyProfile, prefix: &str) {
	if let Ok(v) = std::env::var(format!("{prefix}_MEAN")) {
		if let Ok(v) = v.parse() {
			profile.mean = v;
		}
	}
	if let Ok(v) = std::env::var(format!("{prefix}_STD_DEV")) {
		if let Ok(v) = v.parse() {
			profile.std_dev = v;
		}
	}
}

fn parse_bool(s: &str) -> Option<bool> {
	match s.to_ascii_lowercase().as_str() {
		"1" | "true" | "yes" => Some(true),
		"0" | "false" | "no" => Some(false),
		_ => None,
	}
}

/// Process-wide published configuration handle. Readers call `load()` once
/// at the start of a request and hold that `Arc` for the request's lifetime.
#[derive(Clone)]
pub struct ConfigHandle(Arc<ArcSwap<Config>>);

impl ConfigHandle {
	pub fn new(config: Config) -> Self {
		ConfigHandle(Arc::new(ArcSwap::from_pointee(config)))
	}

	pub fn load(&self) -> Arc<Config> {
		self.0.load_full()
	}

	pub fn publish(&self, config: Config) {
		self.0.store(Arc::new(config));
	}
}
