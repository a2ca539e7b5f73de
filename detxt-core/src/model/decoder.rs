use std::collections::HashMap;

use regex::Regex;

use super::language_model::{LOG_FLOOR, LanguageModel};
use super::scorer::CandidateScorer;
use super::vocab::{END_TOKEN, START_TOKEN};

/// One partial translation: the emitted target tokens so far and the
/// accumulated sum of per-step combined log-scores.
///
/// Hypotheses are immutable value objects; extending one produces a new
/// hypothesis, so beams can be compared and pruned safely.
#[derive(Clone, Debug)]
pub struct Hypothesis {
	score: f64,
	tokens: Vec<String>,
}

impl Hypothesis {
	fn seed() -> Self {
		Self { score: 0.0, tokens: Vec::new() }
	}

	#[must_use]
	fn extend<I>(&self, step_tokens: I, step_score: f64) -> Self
	where
		I: IntoIterator<Item = String>,
	{
		let mut tokens = self.tokens.clone();
		tokens.extend(step_tokens);
		Self { score: self.score + step_score, tokens }
	}

	pub fn score(&self) -> f64 {
		self.score
	}

	pub fn tokens(&self) -> &[String] {
		&self.tokens
	}

	/// Accumulated score divided by emitted length, the ranking used at
	/// every pruning step and for the final ordering.
	fn normalized(&self) -> f64 {
		self.score / self.tokens.len().max(1) as f64
	}

	fn into_result(mut self) -> (f64, Vec<String>) {
		if self.tokens.first().is_some_and(|t| t == START_TOKEN) {
			self.tokens.remove(0);
		}
		if self.tokens.last().is_some_and(|t| t == END_TOKEN) {
			self.tokens.pop();
		}
		(self.score, self.tokens)
	}
}

/// Beam-search decoder fusing candidate-scorer weights with
/// language-model likelihood.
///
/// # Responsibilities
/// - Query the scorer once per source token and log-normalize its weights
/// - Score every candidate against every live hypothesis's context
/// - Prune to the beam width by length-normalized score at each step
///
/// # Invariants
/// - The model and scorer are only read; a decoder borrowing a shared
///   model can run on any number of threads at once.
/// - The beam never empties: the scorer contract guarantees at least a
///   pass-through candidate per token.
pub struct BeamDecoder<'a> {
	model: &'a LanguageModel,
	scorer: &'a dyn CandidateScorer,
	punctuation_re: Regex,
}

impl<'a> BeamDecoder<'a> {
	pub fn new(model: &'a LanguageModel, scorer: &'a dyn CandidateScorer) -> Self {
		Self {
			model,
			scorer,
			// word with trailing sentence punctuation, e.g. "hey!!"
			punctuation_re: Regex::new(r"^([a-z][a-z'&]+)([?.!,]+)$").expect("static pattern"),
		}
	}

	/// Top `beam_width` translations of a tokenized sentence, best first.
	///
	/// Input tokens are expected pre-lowercased and whitespace-split; a
	/// start and end sentinel are added internally and stripped from the
	/// results. Each result pairs the accumulated log-score with the
	/// emitted tokens; ordering is by length-normalized score, ties kept
	/// in encounter order.
	///
	/// # Errors
	/// Returns an error for a zero beam width, or if the beam empties
	/// mid-search (an internal invariant violation).
	pub fn decode(
		&self,
		tokens: &[String],
		beam_width: usize,
	) -> Result<Vec<(f64, Vec<String>)>, String> {
		if beam_width == 0 {
			return Err("Beam width must be at least 1".to_owned());
		}

		let mut padded = Vec::with_capacity(tokens.len() + 2);
		padded.push(START_TOKEN.to_owned());
		padded.extend(tokens.iter().cloned());
		padded.push(END_TOKEN.to_owned());

		let mut beams = vec![Hypothesis::seed()];
		for token in &padded {
			let (word, punctuation) = self.split_punctuation(token);
			let candidates = Self::log_normalize(self.scorer.score_candidates(word));
			if candidates.is_empty() {
				// scorer broke its never-empty contract; let the token through
				continue;
			}

			let mut expanded = Vec::with_capacity(beams.len() * candidates.len());
			for beam in &beams {
				let context = self.context_of(beam);
				for (candidate, candidate_log) in &candidates {
					let model_log = self.phrase_log_score(candidate, &context);
					let step = format!("{candidate}{punctuation}");
					expanded.push(beam.extend(
						step.split_whitespace().map(str::to_owned),
						candidate_log + model_log,
					));
				}
			}

			expanded.sort_by(|a, b| b.normalized().total_cmp(&a.normalized()));
			expanded.truncate(beam_width);
			beams = expanded;

			if let Some(best) = beams.first() {
				log::debug!(
					"token {token:?}: best beam {:?} ({:.4})",
					best.tokens(),
					best.normalized()
				);
			}
		}

		if beams.is_empty() {
			return Err("Beam search ended with no hypotheses".to_owned());
		}
		Ok(beams.into_iter().map(Hypothesis::into_result).collect())
	}

	/// Splits a token into its word and trailing punctuation.
	fn split_punctuation<'t>(&self, token: &'t str) -> (&'t str, &'t str) {
		match self.punctuation_re.captures(token) {
			Some(captures) => {
				let word = captures.get(1).map_or(token, |m| m.as_str());
				let punctuation = captures.get(2).map_or("", |m| m.as_str());
				(word, punctuation)
			}
			None => (token, ""),
		}
	}

	/// Raw scorer weights to log-probabilities, in a deterministic
	/// expansion order (weight descending, then lexicographic).
	fn log_normalize(raw: HashMap<String, f64>) -> Vec<(String, f64)> {
		let total: f64 = raw.values().sum();
		let uniform = -(raw.len().max(1) as f64).ln();
		let mut scored: Vec<(String, f64)> = raw
			.into_iter()
			.map(|(candidate, weight)| {
				let log_weight = if total > 0.0 && weight > 0.0 {
					(weight / total).ln()
				} else if total > 0.0 {
					LOG_FLOOR
				} else {
					uniform
				};
				(candidate, log_weight)
			})
			.collect();
		scored.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
		scored
	}

	/// The hypothesis's trailing `order - 1` tokens, punctuation
	/// stripped, ready for context lookup.
	fn context_of(&self, beam: &Hypothesis) -> Vec<String> {
		let tokens = beam.tokens();
		let window = tokens.len().min(self.model.order() - 1);
		tokens[tokens.len() - window..]
			.iter()
			.map(|token| self.split_punctuation(token).0.to_owned())
			.collect()
	}

	/// Language-model log-score of a candidate, word by word for phrase
	/// candidates, sliding the context window as it goes.
	fn phrase_log_score(&self, candidate: &str, context: &[String]) -> f64 {
		let mut context = context.to_vec();
		let mut total = 0.0;
		for word in candidate.split_whitespace() {
			let window: Vec<&str> = context.iter().map(String::as_str).collect();
			total += self.model.log_score(word, &window);
			if !context.is_empty() {
				context.remove(0);
			}
			context.push(word.to_owned());
		}
		total
	}
}

#[cfg(test)]
mod tests {
	use std::sync::Arc;

	use super::*;
	use crate::model::language_model::{DEFAULT_DISCOUNT, Smoothing, TrainingSet};
	use crate::model::scorer::{TableScorer, TranslationScorer};
	use crate::model::vocab::Vocabulary;

	fn tokenize(line: &str) -> Vec<String> {
		line.split_whitespace().map(str::to_owned).collect()
	}

	fn toy_model() -> LanguageModel {
		let vocab = Vocabulary::new(["the", "cat", "sat", "what", "is", "that"]);
		LanguageModel::train(
			2,
			Smoothing::Absolute(DEFAULT_DISCOUNT),
			vocab,
			&[TrainingSet::new(vec![
				tokenize("the cat sat"),
				tokenize("what is that"),
			])],
		)
		.unwrap()
	}

	fn pass_through_scorer() -> TableScorer {
		TableScorer::new(HashMap::new())
	}

	#[test]
	fn pass_through_reproduces_the_input() {
		let model = toy_model();
		let scorer = pass_through_scorer();
		let decoder = BeamDecoder::new(&model, &scorer);

		let tokens = tokenize("the cat sat");
		for beam_width in [1, 4] {
			let results = decoder.decode(&tokens, beam_width).unwrap();
			assert_eq!(results[0].1, tokens, "beam width {beam_width}");
		}
	}

	#[test]
	fn pass_through_score_is_the_summed_model_score() {
		let model = toy_model();
		let scorer = pass_through_scorer();
		let decoder = BeamDecoder::new(&model, &scorer);

		let results = decoder.decode(&tokenize("the cat sat"), 1).unwrap();
		// every candidate set is {token: 1}, whose normalized log is 0,
		// so the accumulated score is pure language model
		let expected = model.log_score("<s>", &[])
			+ model.log_score("the", &["<s>"])
			+ model.log_score("cat", &["the"])
			+ model.log_score("sat", &["cat"])
			+ model.log_score("</s>", &["sat"]);
		assert!((results[0].0 - expected).abs() < 1e-12);
	}

	#[test]
	fn replacements_are_applied() {
		let model = toy_model();
		let scorer = TranslationScorer::new(
			HashMap::from([
				("teh".to_owned(), vec!["the".to_owned()]),
				("kat".to_owned(), vec!["cat".to_owned(), "what".to_owned()]),
			]),
			None,
		);
		let decoder = BeamDecoder::new(&model, &scorer);

		let results = decoder.decode(&tokenize("teh kat sat"), 4).unwrap();
		assert_eq!(results[0].1, tokenize("the cat sat"));
	}

	#[test]
	fn punctuation_is_split_and_reattached() {
		let model = toy_model();
		let scorer = TranslationScorer::new(
			HashMap::from([("teh".to_owned(), vec!["the".to_owned()])]),
			None,
		);
		let decoder = BeamDecoder::new(&model, &scorer);

		let results = decoder.decode(&tokenize("teh cat!!"), 1).unwrap();
		assert_eq!(results[0].1, tokenize("the cat!!"));
	}

	#[test]
	fn unknown_tokens_are_emitted_unchanged() {
		let model = toy_model();
		let scorer = pass_through_scorer();
		let decoder = BeamDecoder::new(&model, &scorer);

		let results = decoder.decode(&tokenize("the zorbl sat"), 2).unwrap();
		assert_eq!(results[0].1, tokenize("the zorbl sat"));
	}

	#[test]
	fn phrase_candidates_expand_to_multiple_tokens() {
		let model = toy_model();
		let scorer = TranslationScorer::new(
			HashMap::from([("wassat".to_owned(), vec!["what is that".to_owned()])]),
			None,
		);
		let decoder = BeamDecoder::new(&model, &scorer);

		let results = decoder.decode(&tokenize("wassat?"), 1).unwrap();
		assert_eq!(results[0].1, tokenize("what is that?"));
	}

	#[test]
	fn widening_the_beam_never_hurts_the_top_result() {
		let model = toy_model();
		let scorer = TranslationScorer::new(
			HashMap::from([
				("teh".to_owned(), vec!["the".to_owned(), "that".to_owned()]),
				("kat".to_owned(), vec!["cat".to_owned(), "what".to_owned()]),
				("sta".to_owned(), vec!["sat".to_owned(), "is".to_owned()]),
			]),
			None,
		);
		let decoder = BeamDecoder::new(&model, &scorer);
		let tokens = tokenize("teh kat sta");

		let normalized_top = |beam_width: usize| {
			let results = decoder.decode(&tokens, beam_width).unwrap();
			let (score, tokens) = &results[0];
			score / (tokens.len() + 2).max(1) as f64 // sentinels counted during search
		};
		let mut previous = f64::NEG_INFINITY;
		for beam_width in 1..=6 {
			let top = normalized_top(beam_width);
			assert!(
				top >= previous - 1e-12,
				"beam {beam_width}: {top} < {previous}"
			);
			previous = top;
		}
	}

	#[test]
	fn results_are_ranked_and_bounded() {
		let model = toy_model();
		let scorer = TranslationScorer::new(
			HashMap::from([("kat".to_owned(), vec!["cat".to_owned(), "what".to_owned()])]),
			None,
		);
		let decoder = BeamDecoder::new(&model, &scorer);

		let results = decoder.decode(&tokenize("the kat"), 2).unwrap();
		assert_eq!(results.len(), 2);
		let normalized = |(score, tokens): &(f64, Vec<String>)| {
			score / (tokens.len() + 2).max(1) as f64
		};
		assert!(normalized(&results[0]) >= normalized(&results[1]));
	}

	#[test]
	fn zero_beam_width_is_rejected() {
		let model = toy_model();
		let scorer = pass_through_scorer();
		let decoder = BeamDecoder::new(&model, &scorer);
		assert!(decoder.decode(&tokenize("the cat"), 0).is_err());
	}

	#[test]
	fn empty_input_decodes_to_nothing() {
		let model = toy_model();
		let scorer = pass_through_scorer();
		let decoder = BeamDecoder::new(&model, &scorer);
		let results = decoder.decode(&[], 1).unwrap();
		assert_eq!(results[0].1, Vec::<String>::new());
	}

	#[test]
	fn one_shared_model_serves_parallel_decodes() {
		let model = Arc::new(toy_model());
		let mut handles = Vec::new();
		for _ in 0..4 {
			let model = Arc::clone(&model);
			handles.push(std::thread::spawn(move || {
				let scorer = pass_through_scorer();
				let decoder = BeamDecoder::new(&model, &scorer);
				decoder.decode(&tokenize("the cat sat"), 2).unwrap()
			}));
		}
		let mut outcomes = Vec::new();
		for handle in handles {
			outcomes.push(handle.join().unwrap());
		}
		for outcome in &outcomes[1..] {
			assert_eq!(outcome[0].1, outcomes[0][0].1);
		}
	}
}
