use std::collections::HashSet;

use regex::Regex;

use crate::model::decoder::BeamDecoder;
use crate::model::language_model::LanguageModel;
use crate::model::scorer::CandidateScorer;

/// Sentence-level knobs around the decoder.
///
/// # Responsibilities
/// - Hold the beam width used for full-sentence translation
/// - Hold the token skip sets (emotes and similar non-language tokens)
/// - Hold the ordered phrase rewrites applied after decoding
pub struct TranslatorOptions {
	/// Number of hypotheses kept at each decoding step.
	pub beam_width: usize,
	/// Source tokens dropped before decoding.
	pub skip_source: HashSet<String>,
	/// Target tokens dropped from the winning hypothesis.
	pub skip_target: HashSet<String>,
	/// `(pattern, replacement)` rewrites applied to the joined sentence,
	/// in order.
	pub phrase_rules: Vec<(Regex, String)>,
}

impl Default for TranslatorOptions {
	fn default() -> Self {
		Self {
			beam_width: 4,
			skip_source: HashSet::new(),
			skip_target: HashSet::new(),
			phrase_rules: Vec::new(),
		}
	}
}

/// Full sentence pipeline: tokenize, filter, decode, filter, rewrite.
///
/// Owns the trained model and the scorer; every table is an explicit
/// constructor input, nothing is read from disk behind the caller's
/// back. The translator only reads its state, so one instance can serve
/// concurrent callers.
pub struct Translator {
	model: LanguageModel,
	scorer: Box<dyn CandidateScorer>,
	options: TranslatorOptions,
}

impl Translator {
	/// # Errors
	/// Returns an error for a zero beam width.
	pub fn new(
		model: LanguageModel,
		scorer: Box<dyn CandidateScorer>,
		options: TranslatorOptions,
	) -> Result<Self, String> {
		if options.beam_width == 0 {
			return Err("Beam width must be at least 1".to_owned());
		}
		Ok(Self { model, scorer, options })
	}

	pub fn model(&self) -> &LanguageModel {
		&self.model
	}

	/// The caller contract of the decoder: lowercased, whitespace-split.
	pub fn tokenize(sentence: &str) -> Vec<String> {
		sentence
			.to_lowercase()
			.split_whitespace()
			.map(str::to_owned)
			.collect()
	}

	/// Best translation of one sentence, with skip sets and phrase rules
	/// applied.
	pub fn translate(&self, sentence: &str) -> Result<String, String> {
		let ranked = self.translate_n(sentence)?;
		let (_, tokens) = ranked
			.into_iter()
			.next()
			.ok_or_else(|| "Decoder returned no hypotheses".to_owned())?;

		let kept: Vec<String> = tokens
			.into_iter()
			.filter(|token| !self.options.skip_target.contains(token))
			.collect();
		let mut sentence = kept.join(" ");
		for (pattern, replacement) in &self.options.phrase_rules {
			sentence = pattern.replace_all(&sentence, replacement.as_str()).into_owned();
		}
		Ok(sentence)
	}

	/// Ranked `(score, tokens)` translations, source skip set applied,
	/// best first.
	pub fn translate_n(&self, sentence: &str) -> Result<Vec<(f64, Vec<String>)>, String> {
		let tokens: Vec<String> = Self::tokenize(sentence)
			.into_iter()
			.filter(|token| !self.options.skip_source.contains(token))
			.collect();
		let decoder = BeamDecoder::new(&self.model, self.scorer.as_ref());
		decoder.decode(&tokens, self.options.beam_width)
	}
}
