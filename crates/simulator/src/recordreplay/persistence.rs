//! YAML (de)serialization of one endpoint path's recording file.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::SimResult;
use crate::fingerprint;

use super::{RecordedResponse, RequestSummary};

const MAX_INLINE_BODY_BYTES: usize = 1024;

#[derive(Debug, Serialize, Deserialize)]
struct RecordingFile {
	version: u32,
	interactions: Vec<Interaction>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Interaction {
	request: RequestSummary,
	response: ResponseSection,
	#[serde(default)]
	context_annotations: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ResponseSection {
	status: StatusSection,
	headers: HashMap<String, String>,
	body: BodySection,
	duration_ms: f64,
}

#[derive(Debug, Serialize, Deserialize)]
struct StatusSection {
	code: u16,
}

#[derive(Debug, Serialize, Deserialize)]
struct BodySection {
	string: Option<String>,
}

/// `/a/b/c` -> `a_b_c.yaml`, matching the original's path-derived file name.
pub fn path_to_file_name(path: &str) -> String {
	format!("{}.yaml", path.trim_matches('/').replace('/', "_"))
}

pub fn save_recordings_file(file_path: &Path, responses: &HashMap<String, RecordedResponse>) -> SimResult<()> {
	let interactions = responses
		.values()
		.map(|recorded| {
			let mut request = recorded.request.clone();
			if let Some(body) = &request.body {
				if request.body_hash.is_none() {
					request.body_hash = fingerprint::hash_body(
						request.headers.get("content-type").map(String::as_str),
						body.as_bytes(),
					)
					.ok();
				}
				if body.len() > MAX_INLINE_BODY_BYTES {
					request.body = None;
				}
			}
			Interaction {
				request,
				response: ResponseSection {
					status: StatusSection { code: recorded.status_code },
					headers: recorded.headers.clone(),
					body: BodySection {
						string: recorded.body.clone(),
					},
					duration_ms: recorded.duration_ms,
				},
				context_annotations: recorded.context_annotations.clone(),
			}
		})
		.collect();

	let file = RecordingFile { version: 1, interactions };
	let contents = serde_yaml::to_string(&file)?;
	std::fs::write(file_path, contents)?;
	tracing::info!(path = %file_path.display(), "recording saved");
	Ok(())
}

pub fn load_recordings_file(file_path: &Path) -> SimResult<HashMap<String, RecordedResponse>> {
	let contents = std::fs::read_to_string(file_path)?;
	let file: RecordingFile = serde_yaml::from_str(&contents)?;

	let mut responses = HashMap::new();
	for interaction in file.interactions {
		let mut request = interaction.request;
		let body_hash = match (&request.body_hash, &request.body) {
			(Some(hash), _) => hash.clone(),
			(None, Some(body)) => {
				let hash = fingerprint::hash_body(
					request.headers.get("content-type").map(String::as_str),
					body.as_bytes(),
				)?;
				request.body_hash = Some(hash.clone());
				hash
			}
			(None, None) => continue,
		};

		let path = request.uri.split('?').next().unwrap_or(&request.uri);
		let fingerprint = fingerprint::fingerprint_from_body_hash(&request.method, path, &body_hash);

		responses.insert(
			fingerprint,
			RecordedResponse {
				status_code: interaction.response.status.code,
				headers: interaction.response.headers,
				body: interaction.response.body.string,
				duration_ms: interaction.response.duration_ms,
				context_annotations: interaction.context_annotations,
				request,
			},
		);
	}
	Ok(responses)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn path_to_file_name_replaces_slashes() {
		assert_eq!(
			path_to_file_name("/openai/deployments/x/chat/completions"),
			"openai_deployments_x_chat_completions.yaml"
		);
	}

	#[test]
	fn save_then_load_round_trips() {
		let dir = tempfile::tempdir().unwrap();
		let file_path = dir.path().join("test.yaml");

		let mut responses = HashMap::new();
		let request = RequestSummary {
			method: "POST".to_string(),
			uri: "/openai/deployments/x/embeddings".to_string(),
			headers: HashMap::new(),
			body: Some("{}".to_string()),
			body_hash: None,
		};
		let fp = fingerprint::fingerprint("POST", "/openai/deployments/x/embeddings", None, b"{}").unwrap();
		responses.insert(
			fp.clone(),
			RecordedResponse {
				status_code: 200,
				headers: HashMap::new(),
				body: Some("ok".to_string()),
				duration_ms: 3.0,
				context_annotations: HashMap::new(),
				request,
			},
		);

		save_recordings_file(&file_path, &responses).unwrap();
		let loaded = load_recordings_file(&file_path).unwrap();
		assert!(loaded.contains_key(&fp));
	}
}
