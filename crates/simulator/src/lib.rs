//! Simulator for a hosted large-language-model HTTP API: chat completions,
//! text completions, embeddings, and audio translations, each servable in
//! `generate`, `record`, or `replay` mode.
//!
//! The request-handling pipeline (module [`pipeline`]) and its two
//! non-trivial subsystems -- the sliding-window rate limiters
//! ([`limiter`]) and the record/replay cache ([`recordreplay`]) -- are the
//! substantive logic. Everything else (HTTP routing, synthetic response
//! generation, latency injection, telemetry, control plane) is a thin
//! collaborator wired up here and in `http`.

pub mod config;
pub mod context;
pub mod control;
pub mod deployment;
pub mod error;
pub mod fingerprint;
pub mod forwarder;
pub mod generator;
pub mod http;
pub mod latency;
pub mod limiter;
pub mod model;
pub mod pipeline;
pub mod recordreplay;
pub mod state;
pub mod telemetry;
pub mod tokens;

pub use config::{Config, SimulatorMode};
pub use state::AppState;
