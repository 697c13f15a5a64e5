//! Plain requests-per-minute sliding window for deployments whose model
//! isn't token-limited (e.g. whisper transcription/translation).

use std::collections::VecDeque;

use super::{Decision, RejectReason, WindowEntry};

pub struct RequestsPerMinuteWindow {
	entries: VecDeque<WindowEntry>,
	requests_per_minute: u64,
}

impl RequestsPerMinuteWindow {
	pub fn new(requests_per_minute: u64) -> Self {
		RequestsPerMinuteWindow {
			entries: VecDeque::new(),
			requests_per_minute,
		}
	}

	fn purge(&mut self, cut_off: f64) {
		while matches!(self.entries.front(), Some(e) if e.timestamp <= cut_off) {
			self.entries.pop_front();
		}
	}

	pub fn add_request(&mut self, now: f64) -> Decision {
		self.purge(now - 60.0);

		if self.entries.len() as u64 >= self.requests_per_minute {
			let oldest = self
				.entries
				.front()
				.map(|e| e.timestamp)
				.unwrap_or(now);
			let time_to_reset = (60.0 - (now - oldest)).ceil().max(1.0);
			return Decision::Rejected {
				retry_after_seconds: time_to_reset as u64,
				reason: RejectReason::Requests,
			};
		}

		self.entries.push_back(WindowEntry {
			timestamp: now,
			token_cost: 0,
		});
		Decision::Admitted {
			remaining_tokens: None,
			remaining_requests: Some(self.requests_per_minute - self.entries.len() as u64),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	// S7: RPM=2. Two requests admitted back to back, a third is rejected.
	#[test]
	fn s7_rpm_admits_then_rejects() {
		let mut window = RequestsPerMinuteWindow::new(2);
		assert!(matches!(window.add_request(0.0), Decision::Admitted { .. }));
		assert!(matches!(window.add_request(0.1), Decision::Admitted { .. }));

		match window.add_request(0.2) {
			Decision::Rejected { reason, retry_after_seconds } => {
				assert_eq!(reason, RejectReason::Requests);
				assert!(retry_after_seconds >= 1);
			}
			other => panic!("expected rejection, got {other:?}"),
		}
	}

	#[test]
	fn drains_after_a_minute() {
		let mut window = RequestsPerMinuteWindow::new(1);
		assert!(matches!(window.add_request(0.0), Decision::Admitted { .. }));
		assert!(matches!(window.add_request(30.0), Decision::Rejected { .. }));
		assert!(matches!(window.add_request(60.1), Decision::Admitted { .. }));
	}

	#[test]
	fn requests_per_minute_invariant_holds() {
		let mut window = RequestsPerMinuteWindow::new(5);
		for i in 0..300 {
			let now = i as f64 * 0.2;
			window.add_request(now);
			assert!(window.entries.len() as u64 <= 5);
		}
	}
}
