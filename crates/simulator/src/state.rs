//! Process-wide shared state handed to every axum handler.

use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::config::{Config, ConfigHandle};
use crate::forwarder::Forwarder;
use crate::limiter::LimiterRegistry;
use crate::recordreplay::RecordReplayStore;
use crate::telemetry::Telemetry;

#[derive(Clone)]
pub struct AppState(pub Arc<AppStateInner>);

pub struct AppStateInner {
	pub config: ConfigHandle,
	pub limiters: ArcSwap<LimiterRegistry>,
	pub recordings: RecordReplayStore,
	pub forwarder: Option<Forwarder>,
	pub telemetry: Telemetry,
}

impl AppState {
	pub fn new(config: Config) -> Self {
		let limiters = LimiterRegistry::from_deployments(&config.deployments);
		let recordings = RecordReplayStore::new(config.recording.dir.clone(), config.recording.autosave);
		let forwarder = match (&config.recording.upstream_endpoint, &config.recording.upstream_api_key) {
			(Some(endpoint), Some(key)) => Some(Forwarder::new(endpoint.clone(), key.clone())),
			_ => None,
		};
		let state = AppStateInner {
			config: ConfigHandle::new(config),
			limiters: ArcSwap::from_pointee(limiters),
			recordings,
			forwarder,
			telemetry: Telemetry::new(),
		};
		AppState(Arc::new(state))
	}

	/// Publish a patched configuration, rebuilding the limiter registry so
	/// new/changed deployment quotas take effect immediately.
	pub fn publish_config(&self, config: Config) {
		let limiters = LimiterRegistry::from_deployments(&config.deployments);
		self.0.limiters.store(Arc::new(limiters));
		self.0.config.publish(config);
	}
}
