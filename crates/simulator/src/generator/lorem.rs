//! Pre-generated filler text, so satisfying a request for a few thousand
//! tokens of completion doesn't mean generating them one word at a time.

use std::collections::HashMap;
use std::sync::Mutex;

use once_cell::sync::Lazy;
use rand::seq::IndexedRandom;

use crate::tokens::approx_token_count;

const REFERENCE_TOKEN_SIZES: [u32; 11] = [2, 5, 10, 20, 50, 100, 200, 500, 1000, 2000, 4000];
const REFERENCE_VALUES_PER_SIZE: usize = 5;

const LOREM_WORDS: &[&str] = &[
	"ullamco", "labore", "cupidatat", "ipsum", "elit,", "esse", "officia", "aliquip", "do", "magna",
	"duis", "consequat", "exercitation", "occaecat", "ea", "laboris", "sit", "reprehenderit", "velit",
	"dolor", "enim", "irure", "anim", "nisi", "amet,", "culpa", "commodo", "consectetur", "eiusmod",
	"minim", "mollit", "fugiat", "cillum", "non", "deserunt", "veniam,", "est", "eu", "qui", "tempor",
	"adipiscing", "aliqua", "et", "nostrud", "ex", "incididunt", "aute", "nulla", "in", "proident,",
	"sunt", "id", "lorem", "pariatur", "excepteur", "ut", "ad", "sed", "sint", "laborum", "voluptate",
	"dolore", "quis",
];

fn random_words(count: usize) -> String {
	let mut rng = rand::rng();
	(0..count)
		.map(|_| *LOREM_WORDS.choose(&mut rng).expect("non-empty word list"))
		.collect::<Vec<_>>()
		.join(" ")
}

fn lorem_factor(target: u32) -> f64 {
	if target > 500 {
		0.72
	} else if target > 100 {
		0.6
	} else {
		0.5
	}
}

/// Generate one filler string of roughly `max_tokens` tokens, word at a time
/// near the boundary to land under the limit exactly.
fn raw_generate(max_tokens: u32) -> String {
	let mut target = max_tokens;
	let mut full_text = String::new();

	while target > 5 {
		let factor = lorem_factor(target);
		let word_count = ((factor * target as f64) as usize).max(1);
		let candidate = random_words(word_count);
		let used = approx_token_count(&candidate);
		if used > target {
			break;
		}
		if !full_text.is_empty() {
			full_text.push(' ');
		}
		full_text.push_str(&candidate);
		target = target.saturating_sub(used).saturating_sub(2);
	}

	loop {
		let mut candidate = full_text.clone();
		if !candidate.is_empty() {
			candidate.push(' ');
		}
		candidate.push_str(&random_words(1));
		if approx_token_count(&candidate) > max_tokens {
			break;
		}
		full_text = candidate;
	}

	full_text
}

struct ReferenceSet {
	/// Sorted descending so the greedy fill always tries the largest fit first.
	sizes: Vec<u32>,
	values: HashMap<u32, Vec<String>>,
}

impl ReferenceSet {
	fn generate() -> Self {
		let mut values = HashMap::new();
		for &size in &REFERENCE_TOKEN_SIZES {
			let generated = (0..REFERENCE_VALUES_PER_SIZE).map(|_| raw_generate(size)).collect();
			values.insert(size, generated);
		}
		let mut sizes: Vec<u32> = REFERENCE_TOKEN_SIZES.to_vec();
		sizes.sort_unstable_by(|a, b| b.cmp(a));
		ReferenceSet { sizes, values }
	}

	fn pick_for_budget(&self, remaining: u32) -> Option<(&str, u32)> {
		for &size in &self.sizes {
			if size <= remaining {
				let candidates = &self.values[&size];
				let chosen = candidates.choose(&mut rand::rng()).expect("non-empty reference set");
				return Some((chosen.as_str(), size));
			}
		}
		None
	}
}

static REFERENCE_CACHE: Lazy<Mutex<HashMap<String, ReferenceSet>>> = Lazy::new(|| Mutex::new(HashMap::new()));

/// Produce filler text of at most `max_tokens` tokens for `model_name`,
/// populating (once, per model) the reference set used to build it.
pub fn generate_lorem_text(max_tokens: u32, model_name: &str) -> String {
	let mut cache = REFERENCE_CACHE.lock().expect("lorem reference cache poisoned");
	let reference = cache
		.entry(model_name.to_string())
		.or_insert_with(ReferenceSet::generate);

	let mut text = String::new();
	let mut target = max_tokens;
	while target > 0 {
		let Some((value, size)) = reference.pick_for_budget(target) else {
			break;
		};
		if !text.is_empty() {
			text.push(' ');
		}
		text.push_str(value);
		target = target.saturating_sub(size);
	}

	while approx_token_count(&text) > max_tokens {
		match text.rfind(' ') {
			Some(idx) => text.truncate(idx),
			None => {
				text.clear();
				break;
			}
		}
	}

	text
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn generated_text_never_exceeds_requested_tokens() {
		for &max_tokens in &[1, 3, 7, 50, 523] {
			let text = generate_lorem_text(max_tokens, "test-model");
			assert!(approx_token_count(&text) <= max_tokens, "{max_tokens} -> {text:?}");
		}
	}

	#[test]
	fn reuses_cache_across_calls_for_same_model() {
		generate_lorem_text(10, "shared-model");
		let cache = REFERENCE_CACHE.lock().unwrap();
		assert!(cache.contains_key("shared-model"));
	}

	#[test]
	fn zero_tokens_yields_empty_text() {
		assert_eq!(generate_lorem_text(0, "zero-model"), "");
	}
}
