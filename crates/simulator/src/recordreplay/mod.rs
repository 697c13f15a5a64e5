//! Fingerprint -> recorded response cache, persisted one YAML file per
//! logical endpoint path.

mod persistence;

use std::collections::HashMap;
use std::path::PathBuf;

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};

use crate::error::SimResult;

pub use persistence::{path_to_file_name, save_recordings_file, load_recordings_file};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestSummary {
	pub method: String,
	pub uri: String,
	pub headers: HashMap<String, String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub body: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub body_hash: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordedResponse {
	pub status_code: u16,
	pub headers: HashMap<String, String>,
	pub body: Option<String>,
	pub duration_ms: f64,
	#[serde(default)]
	pub context_annotations: HashMap<String, serde_json::Value>,
	pub request: RequestSummary,
}

/// A single endpoint path's fingerprint -> response map, locked
/// independently so a forward in flight for one path never blocks lookups
/// against another.
struct PathCache {
	loaded: bool,
	responses: HashMap<String, RecordedResponse>,
}

pub struct RecordReplayStore {
	dir: PathBuf,
	autosave: bool,
	paths: RwLock<HashMap<String, Mutex<PathCache>>>,
}

impl RecordReplayStore {
	pub fn new(dir: PathBuf, autosave: bool) -> Self {
		RecordReplayStore {
			dir,
			autosave,
			paths: RwLock::new(HashMap::new()),
		}
	}

	/// Look up a fingerprint for `path`, lazily loading the path's on-disk
	/// recording file on first access.
	pub fn lookup(&self, path: &str, fingerprint: &str) -> SimResult<Option<RecordedResponse>> {
		self.ensure_loaded(path)?;
		let paths = self.paths.read();
		let cache = paths.get(path).expect("path inserted by ensure_loaded");
		let cache = cache.lock();
		Ok(cache.responses.get(fingerprint).cloned())
	}

	/// Insert a freshly-recorded response if no entry for this fingerprint
	/// already exists (idempotent under concurrent at-least-once forwards).
	pub fn insert_if_absent(&self, path: &str, fingerprint: &str, response: RecordedResponse) -> SimResult<()> {
		self.ensure_loaded(path)?;
		{
			let paths = self.paths.read();
			let cache = paths.get(path).expect("path inserted by ensure_loaded");
			let mut cache = cache.lock();
			cache.responses.entry(fingerprint.to_string()).or_insert(response);
		}
		if self.autosave {
			self.save_path(path)?;
		}
		Ok(())
	}

	fn ensure_loaded(&self, path: &str) -> SimResult<()> {
		if self.paths.read().contains_key(path) {
			return Ok(());
		}
		let mut paths = self.paths.write();
		if paths.contains_key(path) {
			return Ok(());
		}
		let file_path = self.dir.join(path_to_file_name(path));
		let responses = if file_path.exists() {
			load_recordings_file(&file_path)?
		} else {
			HashMap::new()
		};
		paths.insert(
			path.to_string(),
			Mutex::new(PathCache {
				loaded: true,
				responses,
			}),
		);
		Ok(())
	}

	fn save_path(&self, path: &str) -> SimResult<()> {
		let paths = self.paths.read();
		let Some(cache) = paths.get(path) else { return Ok(()) };
		let cache = cache.lock();
		if !cache.loaded {
			return Ok(());
		}
		std::fs::create_dir_all(&self.dir)?;
		let file_path = self.dir.join(path_to_file_name(path));
		save_recordings_file(&file_path, &cache.responses)
	}

	/// Flush every loaded path to disk, for `POST /++/save-recordings` and
	/// on graceful shutdown.
	pub fn save_all(&self) -> SimResult<()> {
		let paths_snapshot: Vec<String> = self.paths.read().keys().cloned().collect();
		for path in paths_snapshot {
			self.save_path(&path)?;
		}
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn insert_then_lookup_round_trips() {
		let dir = tempfile::tempdir().unwrap();
		let store = RecordReplayStore::new(dir.path().to_path_buf(), false);
		let response = RecordedResponse {
			status_code: 200,
			headers: HashMap::new(),
			body: Some("{}".to_string()),
			duration_ms: 1.0,
			context_annotations: HashMap::new(),
			request: RequestSummary {
				method: "POST".to_string(),
				uri: "/openai/deployments/x/chat/completions".to_string(),
				headers: HashMap::new(),
				body: Some("{}".to_string()),
				body_hash: None,
			},
		};
		store
			.insert_if_absent("/openai/deployments/x/chat/completions", "fp1", response)
			.unwrap();
		let found = store
			.lookup("/openai/deployments/x/chat/completions", "fp1")
			.unwrap();
		assert!(found.is_some());
	}

	#[test]
	fn miss_returns_none_without_touching_disk() {
		let dir = tempfile::tempdir().unwrap();
		let store = RecordReplayStore::new(dir.path().to_path_buf(), false);
		let found = store.lookup("/openai/deployments/x/embeddings", "nope").unwrap();
		assert!(found.is_none());
	}

	#[test]
	fn autosave_persists_to_disk_immediately() {
		let dir = tempfile::tempdir().unwrap();
		let store = RecordReplayStore::new(dir.path().to_path_buf(), true);
		let response = RecordedResponse {
			status_code: 200,
			headers: HashMap::new(),
			body: Some("ok".to_string()),
			duration_ms: 1.0,
			context_annotations: HashMap::new(),
			request: RequestSummary {
				method: "GET".to_string(),
				uri: "/openai/deployments/x/embeddings".to_string(),
				headers: HashMap::new(),
				body: None,
				body_hash: Some("abc".to_string()),
			},
		};
		store
			.insert_if_absent("/openai/deployments/x/embeddings", "fp2", response)
			.unwrap();
		assert!(dir.path().join("openai_deployments_x_embeddings.yaml").exists());
	}
}
