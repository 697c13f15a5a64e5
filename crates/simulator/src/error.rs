use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

/// Unified error type for the simulator's core subsystems.
///
/// Variants that can surface directly to an HTTP client implement
/// [`IntoResponse`] with a shape matching the real service's error bodies;
/// everything else is an internal failure that collapses to a 500.
#[derive(Debug, thiserror::Error)]
pub enum SimError {
	#[error("multipart/form-data content type missing boundary parameter")]
	MissingMultipartBoundary,

	#[error("deployment {0} not found")]
	UnknownDeployment(String),

	#[error("model {model} referenced by deployment {deployment} is not in the catalogue")]
	UnknownModel { deployment: String, model: String },

	#[error("operation {operation} is not supported by deployment {deployment}")]
	OperationNotSupported {
		operation: &'static str,
		deployment: String,
	},

	#[error("missing or incorrect API Key")]
	Unauthorized,

	#[error("audio file too large or empty ({size} bytes)")]
	PayloadTooLarge { size: usize },

	#[error("not in record mode")]
	NotRecording,

	#[error("no recording found for this request")]
	RecordingMissing,

	#[error("failed to read deployment catalogue at {path}: {source}")]
	CatalogueIo {
		path: String,
		#[source]
		source: std::io::Error,
	},

	#[error("failed to parse deployment catalogue: {0}")]
	CatalogueParse(#[from] serde_json::Error),

	#[error("recording I/O error: {0}")]
	RecordingIo(#[from] std::io::Error),

	#[error("recording (de)serialization error: {0}")]
	RecordingFormat(#[from] serde_yaml::Error),

	#[error("upstream forward failed: {0}")]
	Forward(#[from] reqwest::Error),

	#[error("bad multipart body: {0}")]
	Multipart(#[from] multer::Error),

	#[error("internal error: {0}")]
	Internal(String),

	#[error("invalid request body: {0}")]
	BadRequest(String),
}

impl IntoResponse for SimError {
	fn into_response(self) -> Response {
		let (status, body) = match &self {
			SimError::Unauthorized => (
				StatusCode::UNAUTHORIZED,
				json!({ "detail": "Missing or incorrect API Key" }),
			),
			SimError::UnknownDeployment(name) => (
				StatusCode::NOT_FOUND,
				json!({ "error": format!("Deployment {name} not found") }),
			),
			SimError::OperationNotSupported {
				operation,
				deployment,
			} => (
				StatusCode::BAD_REQUEST,
				json!({
					"error": {
						"code": "OperationNotSupported",
						"message": format!(
							"The {operation} operation does not work with the specified model, {deployment}. \
							 Please choose different model and try again.",
						),
					}
				}),
			),
			SimError::PayloadTooLarge { size } => (
				StatusCode::PAYLOAD_TOO_LARGE,
				json!({
					"error": {
						"message": format!("Maximum content size limit (26214400) exceeded ({size} bytes read)"),
						"type": "server_error",
						"param": "null",
						"code": "null",
					}
				}),
			),
			SimError::NotRecording => (
				StatusCode::BAD_REQUEST,
				json!({ "error": "not in record mode" }),
			),
			SimError::RecordingMissing => (
				StatusCode::INTERNAL_SERVER_ERROR,
				json!({ "error": "no recording found for this request" }),
			),
			SimError::MissingMultipartBoundary => (
				StatusCode::INTERNAL_SERVER_ERROR,
				json!({ "error": self.to_string() }),
			),
			SimError::BadRequest(message) => (
				StatusCode::BAD_REQUEST,
				json!({ "error": message }),
			),
			_ => {
				tracing::error!(error = %self, "internal error");
				(
					StatusCode::INTERNAL_SERVER_ERROR,
					json!({ "error": "internal error" }),
				)
			}
		};
		(status, Json(body)).into_response()
	}
}

pub type SimResult<T> = Result<T, SimError>;
