//! Canonical request fingerprinting for the record/replay cache.
//!
//! Two semantically-identical multipart requests carry different boundary
//! tokens on the wire; the fingerprint must erase that difference while
//! preserving everything else, or replay would never hit.

use md5::{Digest, Md5};

use crate::error::{SimError, SimResult};

const STATIC_BOUNDARY: &[u8] = b"--AOAI-API-SIMULATOR-BOUNDARY";

/// Replace the live multipart boundary with a fixed sentinel so otherwise
/// identical bodies hash identically.
pub fn normalize_multipart_body(content_type: &str, body: &[u8]) -> SimResult<Vec<u8>> {
	let boundary_index = content_type
		.find("boundary=")
		.ok_or(SimError::MissingMultipartBoundary)?;
	let mut boundary = b"--".to_vec();
	boundary.extend_from_slice(content_type[boundary_index + "boundary=".len()..].as_bytes());

	let mut normalized = body.to_vec();
	if normalized.starts_with(&boundary) {
		let mut replaced = STATIC_BOUNDARY.to_vec();
		replaced.extend_from_slice(&normalized[boundary.len()..]);
		normalized = replaced;
	}

	let mut needle = b"\n".to_vec();
	needle.extend_from_slice(&boundary);
	let mut replacement = b"\n".to_vec();
	replacement.extend_from_slice(STATIC_BOUNDARY);
	normalized = replace_all(&normalized, &needle, &replacement);

	Ok(normalized)
}

fn replace_all(haystack: &[u8], needle: &[u8], replacement: &[u8]) -> Vec<u8> {
	if needle.is_empty() {
		return haystack.to_vec();
	}
	let mut out = Vec::with_capacity(haystack.len());
	let mut i = 0;
	while i < haystack.len() {
		if haystack[i..].starts_with(needle) {
			out.extend_from_slice(replacement);
			i += needle.len();
		} else {
			out.push(haystack[i]);
			i += 1;
		}
	}
	out
}

/// Hash the (possibly multipart-normalized) body, returning a hex MD5
/// digest. `content_type` is the raw header value, if present.
pub fn hash_body(content_type: Option<&str>, body: &[u8]) -> SimResult<String> {
	let canonical = match content_type {
		Some(ct) if ct.starts_with("multipart/form-data") => normalize_multipart_body(ct, body)?,
		_ => body.to_vec(),
	};
	let mut hasher = Md5::new();
	hasher.update(&canonical);
	Ok(hex::encode(hasher.finalize()))
}

/// Combine `method | path | hash(body)` into the final fingerprint. `path`
/// must already have its query string stripped.
pub fn fingerprint_from_body_hash(method: &str, path: &str, body_hash: &str) -> String {
	let mut hasher = Md5::new();
	hasher.update(format!("{method}|{path}|{body_hash}").as_bytes());
	hex::encode(hasher.finalize())
}

/// Full fingerprint contract: `(method, path, headers, body) -> hex string`.
pub fn fingerprint(method: &str, path: &str, content_type: Option<&str>, body: &[u8]) -> SimResult<String> {
	let body_hash = hash_body(content_type, body)?;
	Ok(fingerprint_from_body_hash(method, path, &body_hash))
}
