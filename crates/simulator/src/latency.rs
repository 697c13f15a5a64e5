//! Scoped latency padding: measures how long the generator/cache actually
//! took and sleeps out the remainder of a simulated target duration.

use std::time::Instant;

use crate::config::LatencyProfile;
use crate::context::Operation;

pub struct LatencyEnvelope {
	start: Instant,
}

impl LatencyEnvelope {
	pub fn begin() -> Self {
		LatencyEnvelope { start: Instant::now() }
	}

	pub fn elapsed_ms(&self) -> f64 {
		self.start.elapsed().as_secs_f64() * 1000.0
	}

	/// Sleep out whatever's left of `target_duration_ms` beyond what's
	/// already elapsed. A cancelled request (client disconnect) drops this
	/// future without completing the sleep -- nothing further to clean up.
	pub async fn pad_to(&self, target_duration_ms: f64) {
		let remaining = target_duration_ms - self.elapsed_ms();
		if remaining > 0.0 {
			tokio::time::sleep(std::time::Duration::from_millis(remaining as u64)).await;
		}
	}
}

/// Compute `target_duration_ms` for a completed request per operation, from
/// the configured per-operation normal distribution.
pub fn target_duration_ms(
	operation: Operation,
	profile: &LatencyProfile,
	completion_tokens: Option<u64>,
	file_size_bytes: Option<u64>,
) -> f64 {
	let sampled = profile.sample_ms();
	match operation {
		Operation::Embeddings => sampled,
		Operation::Completions | Operation::ChatCompletions => sampled * completion_tokens.unwrap_or(0) as f64,
		Operation::Translation => {
			let mib = file_size_bytes.unwrap_or(0) as f64 / (1024.0 * 1024.0);
			sampled * mib
		}
	}
}
