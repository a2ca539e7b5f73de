use std::collections::HashMap;

use detxt_core::model::decoder::BeamDecoder;
use detxt_core::model::language_model::{LanguageModel, Smoothing, TrainingSet};
use detxt_core::model::scorer::{FuzzyScorer, TranslationScorer};
use detxt_core::model::vocab::Vocabulary;
use detxt_core::translator::{Translator, TranslatorOptions};

fn main() -> Result<(), Box<dyn std::error::Error>> {
	env_logger::init();

	// A miniature English corpus; real deployments train on chat logs
	// loaded with detxt_core::io::read_corpus.
	let corpus: Vec<Vec<String>> = [
		"what are you doing",
		"what are you doing today",
		"are you okay",
		"i am doing well",
		"the cat sat on the mat",
		"what is that",
		"see you later",
	]
	.iter()
	.map(|line| line.split_whitespace().map(str::to_owned).collect())
	.collect();

	// The vocabulary is finalized before training; its size fixes the
	// bit width of every n-gram key.
	let vocab = Vocabulary::new(
		corpus.iter().flatten().cloned().collect::<Vec<String>>(),
	);

	// Train an order-3 model with a fixed absolute discount. Multiple
	// corpora may be passed; they are combined by size-proportional
	// weights before the derived tables are built.
	let model = LanguageModel::train(
		3,
		Smoothing::Absolute(0.05),
		vocab,
		&[TrainingSet::new(corpus)],
	)?;

	// Candidate generation: an exact replacement table backed by fuzzy
	// nearest-neighbor search over the target vocabulary. A learned
	// scorer would slot into the same fallback position.
	let fuzzy = FuzzyScorer::new(
		model
			.vocabulary()
			.tokens()
			.iter()
			.skip(4) // padding and sentinel entries are not targets
			.cloned()
			.collect(),
		0.7,
	)?;
	let replacements = HashMap::from([
		("wut".to_owned(), vec!["what".to_owned()]),
		("r".to_owned(), vec!["are".to_owned()]),
		("u".to_owned(), vec!["you".to_owned()]),
		("doin".to_owned(), vec!["doing".to_owned()]),
		("cya".to_owned(), vec!["see you".to_owned()]),
		("l8r".to_owned(), vec!["later".to_owned()]),
	]);
	let scorer = TranslationScorer::new(replacements, Some(Box::new(fuzzy)));

	// Decode a sentence directly and show the ranked beams.
	let decoder = BeamDecoder::new(&model, &scorer);
	let tokens: Vec<String> = "wut r u doin"
		.split_whitespace()
		.map(str::to_owned)
		.collect();
	println!("source: wut r u doin");
	for (score, tokens) in decoder.decode(&tokens, 4)? {
		println!("  {score:>8.4}  {}", tokens.join(" "));
	}

	// The translator wraps the same decoder with skip sets and phrase
	// rewriting for whole sentences.
	let translator = Translator::new(
		model,
		Box::new(scorer),
		TranslatorOptions::default(),
	)?;
	println!("translated: {}", translator.translate("cya l8r")?);

	// Models persist as compact binary records; scores survive the
	// round trip unchanged.
	let path = std::env::temp_dir().join("detxt-example.lm");
	translator.model().save(&path)?;
	let reloaded = LanguageModel::load(&path)?;
	println!(
		"round trip: p(doing | you) = {:.6} before, {:.6} after",
		translator.model().score("doing", &["you"]),
		reloaded.score("doing", &["you"]),
	);

	Ok(())
}
