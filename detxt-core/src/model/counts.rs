use std::collections::HashMap;

use super::codec::{EMPTY_KEY, NgramCodec, NgramKey};
use super::vocab::{END_ID, START_ID, Vocabulary, WordId};

/// Raw n-gram counts plus the derived tables discount smoothing needs.
///
/// Raw counts cover every n-gram actually observed up to the configured
/// maximum order (start/end padded, every window length tallied), with
/// the aggregate unigram total stored under the empty key. Raw counts are
/// `f64` because corpora are combined with fractional weights; the
/// derived tables are integer distinct-key tallies.
///
/// # Responsibilities
/// - Tally padded n-gram windows of a tokenized corpus
/// - Combine per-corpus tallies with size-proportional weights, once
/// - Derive continuation, context and follower tables deterministically
///   from the combined raw counts
///
/// # Invariants
/// - No count is ever negative.
/// - Derived tables are a pure function of the raw counts; rebuilding
///   them from persisted raw counts reproduces them exactly.
#[derive(Clone, Debug)]
pub struct NgramCountStore {
	order: usize,
	/// Weighted raw counts, `EMPTY_KEY` holding the unigram total.
	counts: HashMap<NgramKey, f64>,
	/// Distinct left-extensions of each suffix n-gram.
	continuations: HashMap<NgramKey, u64>,
	/// Sum of continuation counts over each context.
	context_totals: HashMap<NgramKey, u64>,
	/// Distinct words observed to complete each context.
	follower_counts: HashMap<NgramKey, u64>,
	/// How many distinct n-grams have (rounded) raw count 1, 2, 3, >= 4.
	count_histogram: [u64; 4],
}

impl NgramCountStore {
	/// Tallies every padded n-gram window of the given lines.
	///
	/// Each line is padded with `order - 1` start markers and `order - 1`
	/// end markers; every window of length 1..=order is counted. Unknown
	/// tokens are tallied under the unknown id.
	pub(crate) fn tally_lines(
		order: usize,
		codec: &NgramCodec,
		vocab: &Vocabulary,
		lines: &[Vec<String>],
	) -> HashMap<NgramKey, u64> {
		let padding = order - 1;
		let mut tally = HashMap::new();
		let mut ids: Vec<WordId> = Vec::new();

		for line in lines {
			ids.clear();
			ids.resize(padding, START_ID);
			ids.extend(line.iter().map(|token| vocab.id_of(token)));
			ids.resize(ids.len() + padding, END_ID);

			for start in 0..ids.len() {
				let mut key = EMPTY_KEY;
				for &id in ids.iter().skip(start).take(order) {
					key = codec.extend(key, id);
					*tally.entry(key).or_insert(0) += 1;
				}
			}
		}

		tally
	}

	/// Combines per-corpus tallies and derives the smoothing tables.
	///
	/// Every corpus is scaled by `min_weight / weight` (the smallest
	/// corpus keeps weight 1) before summing. This happens exactly once;
	/// the store is read-only afterwards.
	///
	/// # Errors
	/// Returns an error when no tallies are given or a weight is not a
	/// positive finite number.
	pub(crate) fn from_weighted(
		order: usize,
		codec: &NgramCodec,
		tallies: &[(f64, HashMap<NgramKey, u64>)],
	) -> Result<Self, String> {
		if tallies.is_empty() {
			return Err("At least one training corpus is required".to_owned());
		}
		for (weight, _) in tallies {
			if !weight.is_finite() || *weight <= 0.0 {
				return Err(format!("Corpus weight must be positive, got {weight}"));
			}
		}

		let min_weight = tallies
			.iter()
			.map(|(weight, _)| *weight)
			.fold(f64::INFINITY, f64::min);

		let mut counts: HashMap<NgramKey, f64> = HashMap::new();
		for (weight, tally) in tallies {
			let scale = min_weight / weight;
			for (&key, &count) in tally {
				*counts.entry(key).or_insert(0.0) += scale * count as f64;
			}
		}

		let unigram_total: f64 = counts
			.iter()
			.filter(|&(&key, _)| codec.order_of(key) == 1)
			.map(|(_, &count)| count)
			.sum();
		counts.insert(EMPTY_KEY, unigram_total);

		Self::with_raw_counts(order, codec, counts)
	}

	/// Builds a store around already-combined raw counts, rebuilding the
	/// derived tables. This is the load path for persisted models.
	///
	/// # Errors
	/// Returns an error when the counts are empty, negative or not
	/// finite.
	pub(crate) fn with_raw_counts(
		order: usize,
		codec: &NgramCodec,
		counts: HashMap<NgramKey, f64>,
	) -> Result<Self, String> {
		if order < 1 {
			return Err("N-gram order must be at least 1".to_owned());
		}
		if !counts.keys().any(|&key| key != EMPTY_KEY) {
			return Err("N-gram counts are empty".to_owned());
		}

		let mut continuations: HashMap<NgramKey, u64> = HashMap::new();
		let mut follower_counts: HashMap<NgramKey, u64> = HashMap::new();
		let mut count_histogram = [0u64; 4];

		for (&key, &count) in &counts {
			if !count.is_finite() || count < 0.0 {
				return Err(format!("Invalid n-gram count {count}"));
			}
			if key == EMPTY_KEY {
				continue;
			}
			if codec.order_of(key) > order {
				return Err("N-gram key exceeds the model order".to_owned());
			}
			if codec.order_of(key) >= 2 {
				*continuations.entry(codec.drop_leading(key)).or_insert(0) += 1;
			}
			*follower_counts
				.entry(codec.shrink_context(key))
				.or_insert(0) += 1;
			let bucket = (count.round() as u64).clamp(0, 4);
			if bucket >= 1 {
				count_histogram[bucket as usize - 1] += 1;
			}
		}

		let mut context_totals: HashMap<NgramKey, u64> = HashMap::new();
		for (&suffix, &count) in &continuations {
			*context_totals
				.entry(codec.shrink_context(suffix))
				.or_insert(0) += count;
		}

		Ok(Self {
			order,
			counts,
			continuations,
			context_totals,
			follower_counts,
			count_histogram,
		})
	}

	pub fn order(&self) -> usize {
		self.order
	}

	/// Weighted raw count of an n-gram; the empty key returns the
	/// unigram total.
	pub fn raw_count(&self, key: NgramKey) -> f64 {
		self.counts.get(&key).copied().unwrap_or(0.0)
	}

	/// Distinct left contexts in which this suffix n-gram appears.
	pub fn continuation_count(&self, key: NgramKey) -> f64 {
		self.continuations.get(&key).copied().unwrap_or(0) as f64
	}

	/// Sum of continuation counts over everything completing a context.
	pub fn context_total(&self, key: NgramKey) -> f64 {
		self.context_totals.get(&key).copied().unwrap_or(0) as f64
	}

	/// Distinct words observed to complete a context.
	pub fn follower_count(&self, key: NgramKey) -> f64 {
		self.follower_counts.get(&key).copied().unwrap_or(0) as f64
	}

	/// Counts-of-counts histogram: distinct n-grams with rounded raw
	/// count 1, 2, 3 and >= 4.
	pub fn count_histogram(&self) -> [u64; 4] {
		self.count_histogram
	}

	/// Number of distinct observed n-grams (the empty key excluded).
	pub fn len(&self) -> usize {
		self.counts.len().saturating_sub(1)
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	pub(crate) fn raw_counts(&self) -> &HashMap<NgramKey, f64> {
		&self.counts
	}
}
