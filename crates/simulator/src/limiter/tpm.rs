//! Token-per-minute sliding window, coupled with a derived
//! requests-per-10-seconds cap.

use std::collections::VecDeque;

use super::{Decision, RejectReason, WindowEntry};

pub struct TokensPerMinuteWindow {
	entries: VecDeque<WindowEntry>,
	tokens_per_minute: u64,
	requests_per_10_seconds: u64,
}

impl TokensPerMinuteWindow {
	pub fn new(tokens_per_minute: u64) -> Self {
		let requests_per_10_seconds = tokens_per_minute.div_ceil(1000).max(1);
		TokensPerMinuteWindow {
			entries: VecDeque::new(),
			tokens_per_minute,
			requests_per_10_seconds,
		}
	}

	fn purge(&mut self, cut_off: f64) {
		while matches!(self.entries.front(), Some(e) if e.timestamp <= cut_off) {
			self.entries.pop_front();
		}
	}

	/// Walk entries in reverse chronological order, computing the four
	/// accumulators (all of which already include the candidate request).
	fn window_counts(&self, cost: u64, now: f64) -> (u64, u64, f64, f64) {
		let mut request_count_in_10s = 1u64;
		let mut token_count_in_60s = cost;
		let mut requests_count = 1u64;
		let mut tokens_count = cost;
		let mut requests_full_time = f64::NEG_INFINITY;
		let mut tokens_full_time = f64::NEG_INFINITY;

		for entry in self.entries.iter().rev() {
			if requests_count <= self.requests_per_10_seconds {
				requests_count += 1;
			}
			if tokens_count <= self.tokens_per_minute {
				tokens_count += entry.token_cost;
			}
			if requests_full_time.is_infinite() && requests_count > self.requests_per_10_seconds {
				requests_full_time = entry.timestamp;
			}
			if tokens_full_time.is_infinite() && tokens_count > self.tokens_per_minute {
				tokens_full_time = entry.timestamp;
			}
			if entry.timestamp > now - 10.0 {
				request_count_in_10s += 1;
			}
			token_count_in_60s += entry.token_cost;
		}

		(
			request_count_in_10s,
			token_count_in_60s,
			requests_full_time,
			tokens_full_time,
		)
	}

	pub fn add_request(&mut self, cost: u64, now: f64) -> Decision {
		self.purge(now - 60.0);

		let (request_count_in_10s, token_count_in_60s, mut requests_full_time, mut tokens_full_time) =
			self.window_counts(cost, now);

		if token_count_in_60s > self.tokens_per_minute || request_count_in_10s > self.requests_per_10_seconds {
			// A single request whose cost alone saturates the token budget,
			// with no prior history forcing either full-time marker: pin the
			// token reset to the most recent existing entry.
			if cost == self.tokens_per_minute && requests_full_time.is_infinite() && tokens_full_time.is_infinite() {
				tokens_full_time = self
					.entries
					.back()
					.map(|e| e.timestamp)
					.unwrap_or(f64::NEG_INFINITY);
			}

			let time_to_reset_requests = 10.0 - (now - requests_full_time);
			let time_to_reset_tokens = 60.0 - (now - tokens_full_time);

			let (reason, retry_after) = if time_to_reset_requests > time_to_reset_tokens {
				debug_assert!(time_to_reset_requests > 0.0, "time_to_reset_requests must be positive");
				(RejectReason::Requests, time_to_reset_requests.ceil().max(1.0))
			} else {
				debug_assert!(time_to_reset_tokens > 0.0, "time_to_reset_tokens must be positive");
				(RejectReason::Tokens, time_to_reset_tokens.ceil().max(1.0))
			};

			return Decision::Rejected {
				retry_after_seconds: retry_after as u64,
				reason,
			};
		}

		self.entries.push_back(WindowEntry {
			timestamp: now,
			token_cost: cost,
		});
		Decision::Admitted {
			remaining_tokens: Some(self.tokens_per_minute.saturating_sub(token_count_in_60s)),
			remaining_requests: Some(self.requests_per_10_seconds.saturating_sub(request_count_in_10s)),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	// S1/S2: TPM=600 -> R=1 req/10s. One request admitted at t=0, a second
	// at t=1 is rejected on the request cap with retry_after=10; at t=11 it
	// succeeds.
	#[test]
	fn s1_s2_tpm_rejection_and_drain() {
		let mut window = TokensPerMinuteWindow::new(600);
		assert!(matches!(window.add_request(50, 0.0), Decision::Admitted { .. }));

		match window.add_request(50, 1.0) {
			Decision::Rejected {
				retry_after_seconds,
				reason,
			} => {
				assert_eq!(reason, RejectReason::Requests);
				assert_eq!(retry_after_seconds, 10);
			}
			other => panic!("expected rejection, got {other:?}"),
		}

		assert!(matches!(window.add_request(50, 11.0), Decision::Admitted { .. }));
	}

	#[test]
	fn tokens_per_minute_invariant_holds_under_load() {
		let mut window = TokensPerMinuteWindow::new(10_000);
		let mut admitted_total = 0u64;
		for i in 0..200 {
			let now = i as f64 * 0.05; // 10 requests/sec
			if let Decision::Admitted { .. } = window.add_request(50, now) {
				admitted_total += 50;
			}
			// Any 60s trailing window must never exceed the token budget.
			assert!(window.entries.iter().map(|e| e.token_cost).sum::<u64>() <= 10_000);
		}
		assert!(admitted_total > 0);
	}

	#[test]
	fn requests_per_10s_invariant_holds() {
		let mut window = TokensPerMinuteWindow::new(6000); // R = 6
		for i in 0..100 {
			let now = i as f64 * 0.1;
			window.add_request(1, now);
			let in_last_10s = window.entries.iter().filter(|e| e.timestamp > now - 10.0).count();
			assert!(in_last_10s <= 6);
		}
	}

	#[test]
	fn rejection_retry_after_is_at_least_one_second() {
		let mut window = TokensPerMinuteWindow::new(1); // R = 1
		window.add_request(1, 0.0);
		match window.add_request(1, 0.5) {
			Decision::Rejected { retry_after_seconds, .. } => assert!(retry_after_seconds >= 1),
			other => panic!("expected rejection, got {other:?}"),
		}
	}
}
