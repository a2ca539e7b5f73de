use std::collections::HashMap;

use regex::Regex;

use super::vocab::{END_TOKEN, START_TOKEN};

/// Proposes target-language candidates for one source token.
///
/// Implementations return raw non-negative weights (probabilities or
/// unnormalized scores); the decoder normalizes and takes logs before
/// combining them with language-model scores. Exact-table lookup, fuzzy
/// nearest-neighbor search and learned pairwise scorers all sit behind
/// this one interface, so the decoder never branches on the strategy.
///
/// Contract: the returned map is never empty. Sentinels and tokens with
/// no candidate above the implementation's acceptance bar come back as
/// `{token: 1}`, so the decoder always has at least one expansion. A
/// call may block on external computation; callers needing timeouts or
/// retries wrap the scorer themselves.
pub trait CandidateScorer: Send + Sync {
	fn score_candidates(&self, word: &str) -> HashMap<String, f64>;
}

/// The pass-through result: the token translates to itself.
fn pass_through(word: &str) -> HashMap<String, f64> {
	HashMap::from([(word.to_owned(), 1.0)])
}

/// Collapses runs of one character down to at most `max_run` repeats,
/// e.g. `squash_runs("sooooo", 2) == "soo"`.
fn squash_runs(word: &str, max_run: usize) -> String {
	let mut out = String::with_capacity(word.len());
	let mut previous = None;
	let mut run = 0;
	for c in word.chars() {
		if previous == Some(c) {
			run += 1;
		} else {
			previous = Some(c);
			run = 1;
		}
		if run <= max_run {
			out.push(c);
		}
	}
	out
}

/// Damerau-Levenshtein distance (adjacent transpositions allowed), or
/// `None` once the distance is guaranteed to exceed `budget`.
fn damerau_levenshtein(source: &str, target: &str, budget: usize) -> Option<usize> {
	let source: Vec<char> = source.chars().collect();
	let target: Vec<char> = target.chars().collect();
	if source.len().abs_diff(target.len()) > budget {
		return None;
	}
	if source.is_empty() {
		return Some(target.len());
	}
	if target.is_empty() {
		return Some(source.len());
	}

	let mut matrix = vec![vec![0usize; target.len() + 1]; source.len() + 1];
	for (i, row) in matrix.iter_mut().enumerate() {
		row[0] = i;
	}
	for j in 0..=target.len() {
		matrix[0][j] = j;
	}

	for i in 1..=source.len() {
		let mut row_minimum = usize::MAX;
		for j in 1..=target.len() {
			let cost = usize::from(source[i - 1] != target[j - 1]);
			let mut best = (matrix[i - 1][j] + 1)
				.min(matrix[i][j - 1] + 1)
				.min(matrix[i - 1][j - 1] + cost);
			if i > 1
				&& j > 1
				&& source[i - 1] == target[j - 2]
				&& source[i - 2] == target[j - 1]
			{
				best = best.min(matrix[i - 2][j - 2] + cost);
			}
			matrix[i][j] = best;
			row_minimum = row_minimum.min(best);
		}
		// every later row can only grow past the budget
		if row_minimum > budget {
			return None;
		}
	}

	let distance = matrix[source.len()][target.len()];
	(distance <= budget).then_some(distance)
}

/// Exact replacement-table lookup.
///
/// Values may be multi-word phrases; hits are weighted uniformly and the
/// decoder's normalization turns them into equal probabilities.
pub struct TableScorer {
	replacements: HashMap<String, Vec<String>>,
}

impl TableScorer {
	pub fn new(replacements: HashMap<String, Vec<String>>) -> Self {
		Self { replacements }
	}

	/// Candidates for the word or its fully-squashed form ("yesss" also
	/// tries "yes"); `None` when neither has an entry.
	pub fn lookup(&self, word: &str) -> Option<HashMap<String, f64>> {
		let entry = self.replacements.get(word).or_else(|| {
			let squashed = squash_runs(word, 1);
			self.replacements.get(squashed.as_str())
		})?;
		if entry.is_empty() {
			return None;
		}
		Some(entry.iter().map(|candidate| (candidate.clone(), 1.0)).collect())
	}
}

impl CandidateScorer for TableScorer {
	fn score_candidates(&self, word: &str) -> HashMap<String, f64> {
		self.lookup(word).unwrap_or_else(|| pass_through(word))
	}
}

/// Nearest-neighbor search over a target vocabulary by normalized
/// Damerau-Levenshtein similarity.
pub struct FuzzyScorer {
	vocabulary: Vec<String>,
	threshold: f64,
}

impl FuzzyScorer {
	/// # Errors
	/// Returns an error if the acceptance threshold is outside (0, 1].
	pub fn new(vocabulary: Vec<String>, threshold: f64) -> Result<Self, String> {
		if !(threshold > 0.0 && threshold <= 1.0) {
			return Err(format!("Threshold must be in (0, 1], got {threshold}"));
		}
		Ok(Self { vocabulary, threshold })
	}

	/// Vocabulary entries at or above the threshold, weighted by
	/// similarity; `None` when nothing qualifies.
	pub fn matches(&self, word: &str) -> Option<HashMap<String, f64>> {
		let mut scores = HashMap::new();
		for target in &self.vocabulary {
			if let Some(similarity) = self.similarity(word, target) {
				scores.insert(target.clone(), similarity);
			}
		}
		if scores.is_empty() { None } else { Some(scores) }
	}

	fn similarity(&self, word: &str, target: &str) -> Option<f64> {
		let longest = word.chars().count().max(target.chars().count());
		if longest == 0 {
			return None;
		}
		// similarity >= threshold bounds the distance we need to compute
		let budget = ((1.0 - self.threshold) * longest as f64).floor() as usize;
		let distance = damerau_levenshtein(word, target, budget)?;
		let similarity = 1.0 - distance as f64 / longest as f64;
		(similarity >= self.threshold).then_some(similarity)
	}
}

impl CandidateScorer for FuzzyScorer {
	fn score_candidates(&self, word: &str) -> HashMap<String, f64> {
		self.matches(word).unwrap_or_else(|| pass_through(word))
	}
}

/// The production scorer: replacement table first, then an optional
/// fallback strategy, then pass-through.
///
/// Sentinels and tokens that do not look like words (emotes, urls, bare
/// numbers) short-circuit untouched. Letter runs of three or more are
/// squashed to two before lookup, so "yesssss" and "yesss" share
/// candidates. The fallback slot takes any [`CandidateScorer`], from
/// fuzzy search to a learned pairwise model.
pub struct TranslationScorer {
	table: TableScorer,
	fallback: Option<Box<dyn CandidateScorer>>,
	word_re: Regex,
}

impl TranslationScorer {
	pub fn new(
		replacements: HashMap<String, Vec<String>>,
		fallback: Option<Box<dyn CandidateScorer>>,
	) -> Self {
		Self {
			table: TableScorer::new(replacements),
			fallback,
			// a word: letters, or digits mixed with at least one letter
			word_re: Regex::new(r"^(?:[a-z][a-z0-9'&]*|\d[a-z0-9'&]*[a-z][a-z0-9'&]*)$")
				.expect("static pattern"),
		}
	}
}

impl CandidateScorer for TranslationScorer {
	fn score_candidates(&self, word: &str) -> HashMap<String, f64> {
		if word == START_TOKEN || word == END_TOKEN || !self.word_re.is_match(word) {
			return pass_through(word);
		}
		let cleaned = squash_runs(word, 2);
		if let Some(scores) = self.table.lookup(&cleaned) {
			return scores;
		}
		match &self.fallback {
			Some(scorer) => scorer.score_candidates(&cleaned),
			None => pass_through(&cleaned),
		}
	}
}
