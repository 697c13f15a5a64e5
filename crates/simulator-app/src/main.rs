//! Process bootstrap for the simulator: parses CLI flags/environment, wires
//! up tracing, builds the initial `Config` snapshot, and serves the axum
//! router until a shutdown signal arrives.

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use llm_api_simulator::config::{Config, RecordingConfig};
use llm_api_simulator::{AppState, http};
use tracing::info;

#[derive(Parser, Debug)]
#[command(about = "Simulator for a hosted LLM HTTP API", long_about = None)]
struct Args {
	/// Address to bind the HTTP server to.
	#[arg(long, env = "SIMULATOR_LISTEN_ADDR", default_value = "0.0.0.0:8000")]
	listen_addr: SocketAddr,

	/// Operating mode: generate, record, or replay.
	#[arg(long, env = "SIMULATOR_MODE")]
	mode: Option<String>,

	/// api-key clients must present; a random key is used if omitted.
	#[arg(long, env = "SIMULATOR_API_KEY")]
	api_key: Option<String>,

	/// Directory recordings are loaded from / saved to.
	#[arg(long, env = "RECORDING_DIR")]
	recording_dir: Option<PathBuf>,

	/// Persist every successful record-mode response immediately.
	#[arg(long, env = "RECORDING_AUTOSAVE")]
	recording_autosave: Option<bool>,

	/// JSON file describing the deployment catalogue.
	#[arg(long, env = "OPENAI_DEPLOYMENT_CONFIG_PATH")]
	deployment_config_path: Option<PathBuf>,

	/// Serve undefined deployments with a default model instead of 404ing.
	#[arg(long, env = "ALLOW_UNDEFINED_OPENAI_DEPLOYMENTS")]
	allow_undefined_openai_deployments: Option<bool>,

	/// Upstream base URL to forward to in record mode.
	#[arg(long, env = "AZURE_OPENAI_ENDPOINT")]
	upstream_endpoint: Option<String>,

	/// Upstream api-key substituted into forwarded requests.
	#[arg(long, env = "AZURE_OPENAI_KEY")]
	upstream_api_key: Option<String>,

	/// Emit logs as JSON lines instead of human-readable text.
	#[arg(long, env = "LOG_FORMAT", default_value = "text")]
	log_format: LogFormat,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum LogFormat {
	Text,
	Json,
}

fn init_tracing(format: LogFormat) {
	use tracing_subscriber::EnvFilter;

	let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
	let subscriber = tracing_subscriber::fmt().with_env_filter(filter);
	match format {
		LogFormat::Json => subscriber.json().init(),
		LogFormat::Text => subscriber.init(),
	}
}

fn build_config(args: &Args) -> anyhow::Result<Config> {
	// Start from the environment-derived config (this also picks up the
	// latency-tuning variables clap doesn't model as flags), then overlay the
	// CLI-specific fields -- each of which clap has already resolved from its
	// own `env = "..."` fallback, so this overlay is idempotent when a value
	// came from the environment rather than an explicit flag.
	let mut config = Config::from_env()?;

	if let Some(mode) = &args.mode {
		config.simulator_mode = mode.parse()?;
	}
	if let Some(key) = &args.api_key {
		config.simulator_api_key = key.clone();
	}
	if let Some(allow) = args.allow_undefined_openai_deployments {
		config.allow_undefined_openai_deployments = allow;
	}
	if let Some(path) = &args.deployment_config_path {
		config.deployments = llm_api_simulator::deployment::load_catalogue_file(path)?;
	}

	let mut recording = RecordingConfig::default();
	if let Some(dir) = &args.recording_dir {
		recording.dir = dir.clone();
	}
	if let Some(autosave) = args.recording_autosave {
		recording.autosave = autosave;
	}
	recording.upstream_endpoint = args.upstream_endpoint.clone();
	recording.upstream_api_key = args.upstream_api_key.clone();
	config.recording = recording;

	Ok(config)
}

async fn shutdown_signal() {
	let ctrl_c = async {
		tokio::signal::ctrl_c()
			.await
			.expect("failed to install Ctrl+C handler");
	};

	#[cfg(unix)]
	let terminate = async {
		tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
			.expect("failed to install SIGTERM handler")
			.recv()
			.await;
	};

	#[cfg(not(unix))]
	let terminate = std::future::pending::<()>();

	tokio::select! {
		_ = ctrl_c => info!("received Ctrl+C, starting graceful shutdown"),
		_ = terminate => info!("received SIGTERM, starting graceful shutdown"),
	}
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
	let args = Args::parse();
	init_tracing(args.log_format);

	let config = build_config(&args)?;
	info!(
		mode = ?config.simulator_mode,
		deployments = config.deployments.len(),
		api_key = %config.simulator_api_key,
		"starting simulator"
	);

	let state = AppState::new(config);
	let router = http::build_router(state.clone());

	let listener = tokio::net::TcpListener::bind(args.listen_addr).await?;
	info!(addr = %args.listen_addr, "listening");

	axum::serve(listener, router)
		.with_graceful_shutdown(shutdown_signal())
		.await?;

	if let Err(err) = state.0.recordings.save_all() {
		tracing::warn!(error = %err, "failed to autosave recordings on shutdown");
	}

	Ok(())
}
