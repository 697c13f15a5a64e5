//! Prometheus-client histograms and counters backing `GET /metrics`.

use prometheus_client::encoding::{EncodeLabelSet, text::encode};
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::histogram::{Histogram, exponential_buckets};
use prometheus_client::registry::Registry;

#[derive(Debug, Clone, PartialEq, Eq, Hash, EncodeLabelSet)]
pub struct LatencyLabels {
	pub deployment: String,
	pub status: u16,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, EncodeLabelSet)]
pub struct RateLimitLabels {
	pub deployment: String,
	pub reason: String,
}

pub struct Telemetry {
	registry: Registry,
	latency_base: Family<LatencyLabels, Histogram>,
	latency_full: Family<LatencyLabels, Histogram>,
	tokens_used: Family<LatencyLabels, Histogram>,
	tokens_requested: Family<LatencyLabels, Histogram>,
	rate_limit_events: Family<RateLimitLabels, Histogram>,
}

fn ms_histogram() -> Histogram {
	Histogram::new(exponential_buckets(1.0, 2.0, 16))
}

fn token_histogram() -> Histogram {
	Histogram::new(exponential_buckets(1.0, 2.0, 20))
}

impl Telemetry {
	pub fn new() -> Self {
		let mut registry = Registry::default();

		let latency_base = Family::<LatencyLabels, Histogram>::new_with_constructor(ms_histogram);
		let latency_full = Family::<LatencyLabels, Histogram>::new_with_constructor(ms_histogram);
		let tokens_used = Family::<LatencyLabels, Histogram>::new_with_constructor(token_histogram);
		let tokens_requested = Family::<LatencyLabels, Histogram>::new_with_constructor(token_histogram);
		let rate_limit_events = Family::<RateLimitLabels, Histogram>::new_with_constructor(token_histogram);

		registry.register("latency_base_ms", "Time to produce a response before padding", latency_base.clone());
		registry.register("latency_full_ms", "Total request duration including latency padding", latency_full.clone());
		registry.register("tokens_used", "Tokens actually billed per request", tokens_used.clone());
		registry.register("tokens_requested", "Tokens requested per request", tokens_requested.clone());
		registry.register("rate_limit_events", "Rejected requests by reason", rate_limit_events.clone());

		Telemetry {
			registry,
			latency_base,
			latency_full,
			tokens_used,
			tokens_requested,
			rate_limit_events,
		}
	}

	pub fn observe_latency(&self, deployment: &str, status: u16, base_ms: f64, full_ms: f64) {
		let labels = LatencyLabels {
			deployment: deployment.to_string(),
			status,
		};
		self.latency_base.get_or_create(&labels).observe(base_ms);
		self.latency_full.get_or_create(&labels).observe(full_ms);
	}

	pub fn observe_tokens(&self, deployment: &str, status: u16, used: f64, requested: f64) {
		let labels = LatencyLabels {
			deployment: deployment.to_string(),
			status,
		};
		self.tokens_used.get_or_create(&labels).observe(used);
		self.tokens_requested.get_or_create(&labels).observe(requested);
	}

	pub fn observe_rate_limit_event(&self, deployment: &str, reason: &str) {
		let labels = RateLimitLabels {
			deployment: deployment.to_string(),
			reason: reason.to_string(),
		};
		self.rate_limit_events.get_or_create(&labels).observe(1.0);
	}

	pub fn encode(&self) -> String {
		let mut buffer = String::new();
		encode(&mut buffer, &self.registry).expect("prometheus text encoding never fails for a well-formed registry");
		buffer
	}
}

impl Default for Telemetry {
	fn default() -> Self {
		Telemetry::new()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn encode_includes_registered_metric_names() {
		let telemetry = Telemetry::new();
		telemetry.observe_latency("gpt-35-turbo-1k-token", 200, 5.0, 12.0);
		telemetry.observe_rate_limit_event("gpt-35-turbo-1k-token", "tokens");
		let text = telemetry.encode();
		assert!(text.contains("latency_base_ms"));
		assert!(text.contains("rate_limit_events"));
	}
}
