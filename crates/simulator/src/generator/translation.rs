//! `POST /openai/deployments/{deployment}/audio/translations`

use axum::http::header;
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use multer::Multipart;
use serde_json::json;

use crate::config::Config;
use crate::context::{Annotations, LimiterName, Operation};
use crate::error::{SimError, SimResult};

use super::lorem::generate_lorem_text;
use super::resolve_whisper_deployment;

const MAX_FILE_SIZE_BYTES: u64 = 26_214_400;

pub struct TranslationFields {
	pub file_size: u64,
	pub response_format: String,
}

/// Parse the `file` and `response_format` multipart fields, reading only
/// the byte length of `file` (its content never appears in the response).
pub async fn parse_multipart(content_type: &str, body: Bytes) -> SimResult<TranslationFields> {
	let boundary = multer::parse_boundary(content_type).map_err(SimError::Multipart)?;
	let stream = futures::stream::once(async move { Ok::<_, std::io::Error>(body) });
	let mut multipart = Multipart::new(stream, boundary);

	let mut file_size: Option<u64> = None;
	let mut response_format: Option<String> = None;

	while let Some(field) = multipart.next_field().await.map_err(SimError::Multipart)? {
		match field.name() {
			Some("file") => {
				let bytes = field.bytes().await.map_err(SimError::Multipart)?;
				file_size = Some(bytes.len() as u64);
			}
			Some("response_format") => {
				response_format = Some(field.text().await.map_err(SimError::Multipart)?);
			}
			_ => {}
		}
	}

	Ok(TranslationFields {
		file_size: file_size.ok_or_else(|| SimError::BadRequest("missing required 'file' field".to_string()))?,
		response_format: response_format
			.ok_or_else(|| SimError::BadRequest("missing required 'response_format' field".to_string()))?,
	})
}

pub fn handle(
	config: &Config,
	deployment_name: &str,
	fields: TranslationFields,
	annotations: &mut Annotations,
) -> SimResult<Response> {
	let deployment = resolve_whisper_deployment(config, deployment_name)?;

	if fields.file_size == 0 || fields.file_size > MAX_FILE_SIZE_BYTES {
		return Err(SimError::PayloadTooLarge {
			size: fields.file_size as usize,
		});
	}

	let max_tokens_to_generate = if fields.file_size < 1000 {
		10
	} else {
		(fields.file_size / 1000) * 10
	};

	annotations.operation = Some(Operation::Translation);
	annotations.deployment_name = Some(deployment_name.to_string());
	annotations.limiter_name = Some(LimiterName::OpenAiRequests);
	annotations.file_size_bytes = Some(fields.file_size);

	let text = generate_lorem_text(max_tokens_to_generate as u32, &deployment.model_name);

	let response = if fields.response_format == "json" {
		(
			[(header::CONTENT_TYPE, "application/json")],
			serde_json::to_vec(&json!({ "text": text })).unwrap_or_default(),
		)
			.into_response()
	} else {
		([(header::CONTENT_TYPE, "text/plain")], text).into_response()
	};
	Ok(response)
}

#[cfg(test)]
mod tests {
	use super::*;

	fn build_multipart_body(boundary: &str, file_bytes: &[u8], response_format: &str) -> Vec<u8> {
		let mut body = Vec::new();
		body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
		body.extend_from_slice(b"Content-Disposition: form-data; name=\"file\"; filename=\"a.wav\"\r\n\r\n");
		body.extend_from_slice(file_bytes);
		body.extend_from_slice(b"\r\n");
		body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
		body.extend_from_slice(b"Content-Disposition: form-data; name=\"response_format\"\r\n\r\n");
		body.extend_from_slice(response_format.as_bytes());
		body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());
		body
	}

	#[tokio::test]
	async fn parses_file_size_and_response_format() {
		let boundary = "test-boundary";
		let content_type = format!("multipart/form-data; boundary={boundary}");
		let body = build_multipart_body(boundary, &[0u8; 2048], "json");
		let fields = parse_multipart(&content_type, Bytes::from(body)).await.unwrap();
		assert_eq!(fields.file_size, 2048);
		assert_eq!(fields.response_format, "json");
	}

	#[test]
	fn s4_oversize_file_is_rejected() {
		let config = Config::default();
		let mut annotations = Annotations::default();
		let fields = TranslationFields {
			file_size: 26_214_401,
			response_format: "text".to_string(),
		};
		let err = handle(&config, "whisper", fields, &mut annotations).unwrap_err();
		assert!(matches!(err, SimError::PayloadTooLarge { .. }));
	}

	#[test]
	fn empty_file_is_rejected() {
		let config = Config::default();
		let mut annotations = Annotations::default();
		let fields = TranslationFields {
			file_size: 0,
			response_format: "text".to_string(),
		};
		let err = handle(&config, "whisper", fields, &mut annotations).unwrap_err();
		assert!(matches!(err, SimError::PayloadTooLarge { .. }));
	}
}
