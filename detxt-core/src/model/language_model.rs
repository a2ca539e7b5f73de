use std::collections::HashMap;
use std::path::Path;
use std::sync::mpsc;
use std::thread;

use serde::{Deserialize, Serialize};

use super::codec::{EMPTY_KEY, NgramCodec, NgramKey};
use super::counts::NgramCountStore;
use super::vocab::{Vocabulary, WordId};

/// Log-probability stand-in for `ln(0)`; never a domain error.
pub const LOG_FLOOR: f64 = -1.0e4;

/// Default absolute discount.
pub const DEFAULT_DISCOUNT: f64 = 0.05;

/// Discount selection plugged into the shared smoothing evaluator.
///
/// Resolved once at training time and persisted verbatim, so a reloaded
/// model applies exactly the discounts it was trained with.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub enum DiscountSchedule {
	/// One fixed discount for every observed count.
	Absolute { discount: f64 },
	/// Modified Kneser-Ney discounts, bucketed by `min(count, 3)`.
	PerCount { d1: f64, d2: f64, d3: f64 },
}

impl DiscountSchedule {
	fn for_count(&self, count: f64) -> f64 {
		match self {
			Self::Absolute { discount } => *discount,
			Self::PerCount { d1, d2, d3 } => match count.round() as u64 {
				0 | 1 => *d1,
				2 => *d2,
				_ => *d3,
			},
		}
	}

	fn validate(&self) -> Result<(), String> {
		let values = match self {
			Self::Absolute { discount } => vec![*discount],
			Self::PerCount { d1, d2, d3 } => vec![*d1, *d2, *d3],
		};
		for value in values {
			if !value.is_finite() || value < 0.0 {
				return Err(format!("Invalid discount {value}"));
			}
		}
		Ok(())
	}
}

/// Smoothing variant requested at training time.
pub enum Smoothing {
	/// Absolute discounting with a fixed constant in (0, 1).
	Absolute(f64),
	/// Modified Kneser-Ney: derive per-count discounts from the
	/// counts-of-counts histogram, falling back to
	/// [`DEFAULT_DISCOUNT`] when the histogram is too sparse.
	ModifiedKneserNey,
}

/// One training corpus: pre-tokenized lines plus an optional weight.
///
/// When `weight` is `None` the corpus token count is used, so combining
/// corpora downweights the larger ones to the size of the smallest.
pub struct TrainingSet {
	pub lines: Vec<Vec<String>>,
	pub weight: Option<f64>,
}

impl TrainingSet {
	pub fn new(lines: Vec<Vec<String>>) -> Self {
		Self { lines, weight: None }
	}

	fn effective_weight(&self) -> f64 {
		self.weight
			.unwrap_or_else(|| self.lines.iter().map(Vec::len).sum::<usize>() as f64)
	}
}

/// Serialized model record: everything needed to rebuild the derived
/// tables deterministically.
#[derive(Serialize, Deserialize)]
struct ModelRecord {
	order: usize,
	discounts: DiscountSchedule,
	tokens: Vec<String>,
	counts: Vec<(NgramKey, f64)>,
}

/// N-gram language model with Kneser-Ney smoothing.
///
/// Owns exactly one [`NgramCountStore`] and one [`Vocabulary`], plus the
/// resolved discount schedule. Immutable once trained or loaded: any
/// number of decode threads may score against one shared instance with
/// no locking.
pub struct LanguageModel {
	order: usize,
	discounts: DiscountSchedule,
	vocab: Vocabulary,
	codec: NgramCodec,
	counts: NgramCountStore,
}

impl LanguageModel {
	/// Trains a model over one or more corpora.
	///
	/// Corpus lines are tallied in parallel chunks, combined with
	/// size-proportional weights, and the derived tables are built once
	/// before the model is published.
	///
	/// # Errors
	/// Returns an error if `order < 2`, the vocabulary is too wide for
	/// the key width, a discount is out of range, or no corpus data is
	/// given.
	pub fn train(
		order: usize,
		smoothing: Smoothing,
		vocab: Vocabulary,
		corpora: &[TrainingSet],
	) -> Result<Self, String> {
		if order < 2 {
			return Err("Model order must be at least 2".to_owned());
		}
		let codec = NgramCodec::new(vocab.bit_width());
		if order > codec.max_order() {
			return Err(format!(
				"Order {} does not fit the key width ({} ids of {} bits)",
				order,
				codec.max_order(),
				vocab.bit_width()
			));
		}

		let mut tallies = Vec::with_capacity(corpora.len());
		for corpus in corpora {
			let weight = corpus.effective_weight();
			let tally = Self::tally_parallel(order, codec, &vocab, &corpus.lines);
			tallies.push((weight, tally));
		}
		let counts = NgramCountStore::from_weighted(order, &codec, &tallies)?;

		let discounts = match smoothing {
			Smoothing::Absolute(discount) => {
				if !(0.0..1.0).contains(&discount) || discount == 0.0 {
					return Err(format!("Discount must be in (0, 1), got {discount}"));
				}
				DiscountSchedule::Absolute { discount }
			}
			Smoothing::ModifiedKneserNey => Self::derive_discounts(counts.count_histogram()),
		};

		log::info!(
			"trained order-{} model: {} distinct n-grams over {} corpora",
			order,
			counts.len(),
			corpora.len()
		);

		Ok(Self { order, discounts, vocab, codec, counts })
	}

	/// Splits the lines into `cpus * 8` chunks, tallies each on its own
	/// thread and merges the partial integer tallies. Integer addition
	/// commutes, so the merge order does not affect the result.
	fn tally_parallel(
		order: usize,
		codec: NgramCodec,
		vocab: &Vocabulary,
		lines: &[Vec<String>],
	) -> HashMap<NgramKey, u64> {
		let mut merged: HashMap<NgramKey, u64> = HashMap::new();
		if lines.is_empty() {
			return merged;
		}

		let chunks = num_cpus::get() * 8;
		let chunk_size = lines.len().div_ceil(chunks);

		thread::scope(|scope| {
			let (tx, rx) = mpsc::channel();
			for chunk in lines.chunks(chunk_size) {
				let tx = tx.clone();
				scope.spawn(move || {
					let partial = NgramCountStore::tally_lines(order, &codec, vocab, chunk);
					// the receiver outlives every sender
					let _ = tx.send(partial);
				});
			}
			drop(tx);

			for partial in rx {
				for (key, count) in partial {
					*merged.entry(key).or_insert(0) += count;
				}
			}
		});

		merged
	}

	/// Standard modified Kneser-Ney closed form over the
	/// counts-of-counts histogram.
	fn derive_discounts(histogram: [u64; 4]) -> DiscountSchedule {
		let [n1, n2, n3, n4] = histogram.map(|n| n as f64);
		if n1 == 0.0 || n2 == 0.0 || n3 == 0.0 || n4 == 0.0 {
			log::warn!(
				"counts-of-counts histogram {histogram:?} too sparse, \
				 falling back to absolute discounting"
			);
			return DiscountSchedule::Absolute { discount: DEFAULT_DISCOUNT };
		}
		let y = n1 / (n1 + 2.0 * n2);
		DiscountSchedule::PerCount {
			d1: (1.0 - 2.0 * y * n2 / n1).max(0.0),
			d2: (2.0 - 3.0 * y * n3 / n2).max(0.0),
			d3: (3.0 - 4.0 * y * n4 / n3).max(0.0),
		}
	}

	pub fn order(&self) -> usize {
		self.order
	}

	pub fn vocabulary(&self) -> &Vocabulary {
		&self.vocab
	}

	pub fn discounts(&self) -> DiscountSchedule {
		self.discounts
	}

	/// Probability of `word` given the preceding context, in `[0, 1]`.
	///
	/// Contexts longer than `order - 1` tokens are truncated to their
	/// trailing window; unknown tokens resolve to the unknown id.
	pub fn score(&self, word: &str, context: &[&str]) -> f64 {
		let word_key = NgramKey::from(self.vocab.id_of(word));
		self.kneser_ney(word_key, self.context_key(context))
	}

	/// `ln(score)`, floored to [`LOG_FLOOR`] when the probability
	/// underflows to zero.
	pub fn log_score(&self, word: &str, context: &[&str]) -> f64 {
		let probability = self.score(word, context);
		if probability > 0.0 {
			probability.ln()
		} else {
			LOG_FLOOR
		}
	}

	fn context_key(&self, context: &[&str]) -> NgramKey {
		let window = context.len().min(self.order - 1);
		let ids: Vec<WordId> = context[context.len() - window..]
			.iter()
			.map(|token| self.vocab.id_of(token))
			.collect();
		self.codec.encode(&ids)
	}

	/// Recursive discounted interpolation, written as a loop over
	/// decreasing orders.
	///
	/// Each pass consumes one context word (back-off keeps the most
	/// recent ones); once the context is empty the word key is forced to
	/// the empty sentinel and the next pass returns the uniform floor,
	/// so the loop runs at most `order + 1` passes for any input.
	fn kneser_ney(&self, mut word: NgramKey, mut context: NgramKey) -> f64 {
		let mut probability = 0.0;
		// product of the normalization weights accumulated so far
		let mut backoff_mass = 1.0;
		let mut highest_order = true;

		loop {
			if word == EMPTY_KEY {
				return probability + backoff_mass * self.uniform_floor();
			}

			let ngram = self.codec.extend(context, word as WordId);
			let (word_count, context_count) = if highest_order {
				(self.counts.raw_count(ngram), self.counts.raw_count(context))
			} else {
				(
					self.counts.continuation_count(ngram),
					self.counts.context_total(context),
				)
			};

			let discount = self.discounts.for_count(word_count);
			let denominator = context_count + 1.0;
			probability += backoff_mass * (word_count - discount).max(0.0) / denominator;

			let epsilon = if highest_order { 1.0 } else { 0.0 };
			backoff_mass *=
				(discount * self.counts.follower_count(context) + epsilon) / denominator;

			if context == EMPTY_KEY {
				word = EMPTY_KEY;
			} else {
				context = self.codec.drop_leading(context);
			}
			highest_order = false;
		}
	}

	/// Uniform base of the back-off recursion: the padding slot and the
	/// start/end markers never surface as predictions, `<UNK>` does.
	fn uniform_floor(&self) -> f64 {
		1.0 / self.vocab.content_len().max(1) as f64
	}

	/// Writes the model as a compact binary record.
	///
	/// Raw counts are sorted by key so identical models serialize to
	/// identical bytes.
	pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), Box<dyn std::error::Error>> {
		let mut counts: Vec<(NgramKey, f64)> = self
			.counts
			.raw_counts()
			.iter()
			.map(|(&key, &count)| (key, count))
			.collect();
		counts.sort_unstable_by_key(|(key, _)| *key);

		let record = ModelRecord {
			order: self.order,
			discounts: self.discounts,
			tokens: self.vocab.tokens().to_vec(),
			counts,
		};
		let bytes = postcard::to_stdvec(&record)?;
		std::fs::write(path.as_ref(), bytes)?;
		log::info!("saved model to {}", path.as_ref().display());
		Ok(())
	}

	/// Loads a persisted model, validating the record and rebuilding the
	/// derived tables. Scores computed after loading equal the scores
	/// computed before saving.
	///
	/// # Errors
	/// A missing file, undecodable bytes or an inconsistent record
	/// (order, vocabulary, discounts, counts) are all fatal.
	pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, Box<dyn std::error::Error>> {
		let bytes = std::fs::read(path.as_ref())?;
		let record: ModelRecord = postcard::from_bytes(&bytes)?;
		let model = Self::from_record(record)?;
		log::info!(
			"loaded order-{} model from {}",
			model.order,
			path.as_ref().display()
		);
		Ok(model)
	}

	fn from_record(record: ModelRecord) -> Result<Self, String> {
		if record.order < 2 {
			return Err("Persisted model order must be at least 2".to_owned());
		}
		record.discounts.validate()?;
		let vocab = Vocabulary::from_tokens(record.tokens)?;
		let codec = NgramCodec::new(vocab.bit_width());
		if record.order > codec.max_order() {
			return Err("Persisted order does not fit the key width".to_owned());
		}
		let counts =
			NgramCountStore::with_raw_counts(record.order, &codec, record.counts.into_iter().collect())?;
		Ok(Self {
			order: record.order,
			discounts: record.discounts,
			vocab,
			codec,
			counts,
		})
	}
}
