use std::collections::HashMap;

/// Start-of-sentence marker.
pub const START_TOKEN: &str = "<s>";
/// End-of-sentence marker.
pub const END_TOKEN: &str = "</s>";
/// Marker every out-of-vocabulary token resolves to.
pub const UNK_TOKEN: &str = "<UNK>";

/// Dense integer identifier of a vocabulary entry.
pub type WordId = u64;

/// Id of the start marker.
pub const START_ID: WordId = 1;
/// Id of the end marker.
pub const END_ID: WordId = 2;
/// Id of the unknown marker.
pub const UNK_ID: WordId = 3;

/// Bidirectional mapping between tokens and dense integer ids.
///
/// Entry 0 is a padding slot that is never assigned to a token, so every
/// real id is non-zero and the order of a packed n-gram key stays
/// recoverable from its bit length. The reserved markers follow
/// (`<s>` = 1, `</s>` = 2, `<UNK>` = 3); corpus tokens start at id 4.
///
/// # Invariants
/// - The token list is duplicate-free; an id is its position in the list.
/// - `bit_width` is fixed at construction and never changes for the
///   lifetime of a model.
/// - Lookups never mutate the index; unknown tokens resolve to the
///   reserved unknown id, never an error.
#[derive(Clone, Debug)]
pub struct Vocabulary {
	tokens: Vec<String>,
	ids: HashMap<String, WordId>,
	bit_width: u32,
}

impl Vocabulary {
	/// Builds an index from corpus tokens, reserved entries first.
	///
	/// Duplicates and tokens colliding with a reserved entry are skipped,
	/// preserving first-seen order for the rest.
	pub fn new<I, S>(corpus_tokens: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		let mut tokens: Vec<String> = vec![
			String::new(),
			START_TOKEN.to_owned(),
			END_TOKEN.to_owned(),
			UNK_TOKEN.to_owned(),
		];
		let mut ids: HashMap<String, WordId> = tokens
			.iter()
			.enumerate()
			.skip(1)
			.map(|(id, token)| (token.clone(), id as WordId))
			.collect();

		for token in corpus_tokens {
			let token = token.into();
			if token.is_empty() || ids.contains_key(&token) {
				continue;
			}
			ids.insert(token.clone(), tokens.len() as WordId);
			tokens.push(token);
		}

		let bit_width = Self::compute_bit_width(tokens.len());
		Self { tokens, ids, bit_width }
	}

	/// Rebuilds an index verbatim from a persisted token list.
	///
	/// # Errors
	/// Returns an error if the list does not start with the padding slot
	/// and the reserved markers, or contains duplicates.
	pub fn from_tokens(tokens: Vec<String>) -> Result<Self, String> {
		let reserved = ["", START_TOKEN, END_TOKEN, UNK_TOKEN];
		if tokens.len() < reserved.len() {
			return Err("Vocabulary is missing its reserved entries".to_owned());
		}
		for (position, expected) in reserved.iter().enumerate() {
			if tokens[position] != *expected {
				return Err(format!(
					"Vocabulary entry {} must be {:?}, got {:?}",
					position, expected, tokens[position]
				));
			}
		}

		let mut ids = HashMap::with_capacity(tokens.len());
		for (id, token) in tokens.iter().enumerate().skip(1) {
			if ids.insert(token.clone(), id as WordId).is_some() {
				return Err(format!("Duplicate vocabulary entry {token:?}"));
			}
		}

		let bit_width = Self::compute_bit_width(tokens.len());
		Ok(Self { tokens, ids, bit_width })
	}

	/// Id of a token; unknown tokens resolve to [`UNK_ID`].
	pub fn id_of(&self, token: &str) -> WordId {
		self.ids.get(token).copied().unwrap_or(UNK_ID)
	}

	/// Token behind an id, if the id names one.
	///
	/// The padding slot holds no token, so `token_of(0)` is `None`.
	pub fn token_of(&self, id: WordId) -> Option<&str> {
		if id == 0 {
			return None;
		}
		self.tokens.get(id as usize).map(String::as_str)
	}

	/// Number of entries, reserved slots included.
	pub fn len(&self) -> usize {
		self.tokens.len()
	}

	pub fn is_empty(&self) -> bool {
		self.tokens.is_empty()
	}

	/// Number of entries that can surface as a scored word: everything
	/// but the padding slot and the start/end markers (`<UNK>` counts).
	pub fn content_len(&self) -> usize {
		self.tokens.len().saturating_sub(3)
	}

	/// Bits needed to represent any single id.
	pub fn bit_width(&self) -> u32 {
		self.bit_width
	}

	/// The ordered token list, as persisted.
	pub fn tokens(&self) -> &[String] {
		&self.tokens
	}

	fn compute_bit_width(len: usize) -> u32 {
		// ceil(log2(len)); len is at least the 4 reserved entries
		usize::BITS - (len - 1).leading_zeros()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn reserved_ids_come_first() {
		let vocab = Vocabulary::new(["the", "cat"]);
		assert_eq!(vocab.id_of(START_TOKEN), START_ID);
		assert_eq!(vocab.id_of(END_TOKEN), END_ID);
		assert_eq!(vocab.id_of(UNK_TOKEN), UNK_ID);
		assert_eq!(vocab.id_of("the"), 4);
		assert_eq!(vocab.id_of("cat"), 5);
		assert_eq!(vocab.token_of(0), None);
		assert_eq!(vocab.token_of(4), Some("the"));
	}

	#[test]
	fn unknown_tokens_resolve_to_unk() {
		let vocab = Vocabulary::new(["the"]);
		assert_eq!(vocab.id_of("zzz"), UNK_ID);
		assert_eq!(vocab.id_of(""), UNK_ID);
	}

	#[test]
	fn duplicates_are_skipped() {
		let vocab = Vocabulary::new(["the", "the", "<s>", "cat"]);
		assert_eq!(vocab.len(), 6);
		assert_eq!(vocab.id_of("cat"), 5);
	}

	#[test]
	fn bit_width_is_ceil_log2() {
		// 6 content-ish entries -> 7 total -> 3 bits
		let vocab = Vocabulary::new(["the", "cat", "sat"]);
		assert_eq!(vocab.len(), 7);
		assert_eq!(vocab.bit_width(), 3);
		// exactly 8 entries still fit in 3 bits (ids 0..=7)
		let vocab = Vocabulary::new(["a", "b", "c", "d"]);
		assert_eq!(vocab.len(), 8);
		assert_eq!(vocab.bit_width(), 3);
		let vocab = Vocabulary::new(["a", "b", "c", "d", "e"]);
		assert_eq!(vocab.len(), 9);
		assert_eq!(vocab.bit_width(), 4);
	}

	#[test]
	fn from_tokens_round_trips() {
		let built = Vocabulary::new(["the", "cat", "sat"]);
		let restored = Vocabulary::from_tokens(built.tokens().to_vec()).unwrap();
		assert_eq!(restored.id_of("sat"), built.id_of("sat"));
		assert_eq!(restored.bit_width(), built.bit_width());
	}

	#[test]
	fn from_tokens_rejects_malformed_lists() {
		assert!(Vocabulary::from_tokens(vec![]).is_err());
		assert!(Vocabulary::from_tokens(vec![
			"<s>".to_owned(),
			"</s>".to_owned(),
			"<UNK>".to_owned(),
		])
		.is_err());
		assert!(Vocabulary::from_tokens(vec![
			String::new(),
			START_TOKEN.to_owned(),
			END_TOKEN.to_owned(),
			UNK_TOKEN.to_owned(),
			"the".to_owned(),
			"the".to_owned(),
		])
		.is_err());
	}
}
