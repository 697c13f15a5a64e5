//! Sliding-window rate limiters.
//!
//! Two independent window types share the same admission contract:
//! `add_request(cost, now) -> Decision`. Deque-backed: entries rarely exceed
//! a few thousand within a minute under realistic quotas, so front-popping a
//! `VecDeque` is plenty fast.

mod rpm;
mod tpm;

use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;

pub use rpm::RequestsPerMinuteWindow;
pub use tpm::TokensPerMinuteWindow;

use crate::deployment::DeploymentMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
	Tokens,
	Requests,
}

impl RejectReason {
	pub fn as_str(&self) -> &'static str {
		match self {
			RejectReason::Tokens => "tokens",
			RejectReason::Requests => "requests",
		}
	}

	/// Header name carrying the reset estimate for this rejection reason.
	pub fn reset_header(&self) -> &'static str {
		match self {
			RejectReason::Tokens => "x-ratelimit-reset-tokens",
			RejectReason::Requests => "x-ratelimit-reset-requests",
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
	Admitted {
		remaining_tokens: Option<u64>,
		remaining_requests: Option<u64>,
	},
	Rejected {
		retry_after_seconds: u64,
		reason: RejectReason,
	},
}

/// Current wall-clock time as seconds since the epoch, as an `f64` so
/// sub-second precision survives (tests inject explicit timestamps instead).
pub fn now_seconds() -> f64 {
	SystemTime::now()
		.duration_since(UNIX_EPOCH)
		.expect("system clock before epoch")
		.as_secs_f64()
}

enum Window {
	Tokens(TokensPerMinuteWindow),
	Requests(RequestsPerMinuteWindow),
}

/// One window per deployment, built once from the catalogue. Each window is
/// independently locked so unrelated deployments never contend.
pub struct LimiterRegistry {
	windows: HashMap<String, Mutex<Window>>,
}

impl LimiterRegistry {
	/// Build token-per-minute windows for every token-limited deployment and
	/// request-per-minute windows for every other deployment.
	pub fn from_deployments(deployments: &DeploymentMap) -> Self {
		let mut windows = HashMap::new();
		for deployment in deployments.values() {
			let window = if deployment.model.is_token_limited() {
				Window::Tokens(TokensPerMinuteWindow::new(deployment.tokens_per_minute))
			} else {
				Window::Requests(RequestsPerMinuteWindow::new(deployment.requests_per_minute))
			};
			windows.insert(deployment.name.clone(), Mutex::new(window));
		}
		LimiterRegistry { windows }
	}

	pub fn contains(&self, deployment_name: &str) -> bool {
		self.windows.contains_key(deployment_name)
	}

	/// Admit a token-limited request. Returns `None` if `deployment_name`
	/// isn't registered as a token-limited deployment (caller should skip
	/// limiting and warn once).
	pub fn add_token_request(&self, deployment_name: &str, cost: u64, now: f64) -> Option<Decision> {
		let window = self.windows.get(deployment_name)?;
		let mut window = window.lock();
		match &mut *window {
			Window::Tokens(w) => Some(w.add_request(cost, now)),
			Window::Requests(_) => None,
		}
	}

	/// Admit a plain request against a requests-per-minute window.
	pub fn add_plain_request(&self, deployment_name: &str, now: f64) -> Option<Decision> {
		let window = self.windows.get(deployment_name)?;
		let mut window = window.lock();
		match &mut *window {
			Window::Requests(w) => Some(w.add_request(now)),
			Window::Tokens(_) => None,
		}
	}
}

#[derive(Debug, Clone)]
pub(crate) struct WindowEntry {
	pub timestamp: f64,
	pub token_cost: u64,
}
