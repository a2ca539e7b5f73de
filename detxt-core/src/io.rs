use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use regex::Regex;

/// Reads a text file and returns all its lines as a `Vec<String>`.
///
/// - Reads the entire file into memory
/// - Splits on `\n` / `\r\n`
pub fn read_lines<P: AsRef<Path>>(path: P) -> io::Result<Vec<String>> {
	let mut contents = String::new();
	File::open(path)?.read_to_string(&mut contents)?;
	Ok(contents.lines().map(str::to_owned).collect())
}

/// Reads a corpus file into lowercased, whitespace-tokenized lines,
/// skipping empty ones.
pub fn read_corpus<P: AsRef<Path>>(path: P) -> io::Result<Vec<Vec<String>>> {
	Ok(read_lines(path)?
		.iter()
		.map(|line| {
			line.to_lowercase()
				.split_whitespace()
				.map(str::to_owned)
				.collect::<Vec<String>>()
		})
		.filter(|tokens| !tokens.is_empty())
		.collect())
}

/// Reads a token set, one token per line.
///
/// Blank lines and `#` comments are skipped.
pub fn read_token_set<P: AsRef<Path>>(path: P) -> io::Result<HashSet<String>> {
	Ok(read_lines(path)?
		.iter()
		.map(|line| line.trim())
		.filter(|line| !line.is_empty() && !line.starts_with('#'))
		.map(str::to_owned)
		.collect())
}

/// Reads a TSV replacement table: `source<TAB>candidate1,candidate2`.
///
/// Blank lines and `#` comments are skipped; anything else without both
/// columns is an error naming the offending line.
pub fn read_replacement_table<P: AsRef<Path>>(
	path: P,
) -> io::Result<HashMap<String, Vec<String>>> {
	let mut table = HashMap::new();
	for (index, line) in read_lines(&path)?.iter().enumerate() {
		let line = line.trim();
		if line.is_empty() || line.starts_with('#') {
			continue;
		}
		let (source, candidates) = line.split_once('\t').ok_or_else(|| {
			io::Error::new(
				io::ErrorKind::InvalidData,
				format!("line {}: expected `source<TAB>candidates`", index + 1),
			)
		})?;
		let candidates: Vec<String> = candidates
			.split(',')
			.map(|candidate| candidate.trim().to_owned())
			.filter(|candidate| !candidate.is_empty())
			.collect();
		if candidates.is_empty() {
			return Err(io::Error::new(
				io::ErrorKind::InvalidData,
				format!("line {}: no candidates for {source:?}", index + 1),
			));
		}
		table.insert(source.trim().to_owned(), candidates);
	}
	Ok(table)
}

/// Reads TSV phrase rules: `pattern<TAB>replacement`, compiled in file
/// order.
pub fn read_phrase_rules<P: AsRef<Path>>(
	path: P,
) -> Result<Vec<(Regex, String)>, Box<dyn std::error::Error>> {
	let mut rules = Vec::new();
	for (index, line) in read_lines(&path)?.iter().enumerate() {
		let line = line.trim();
		if line.is_empty() || line.starts_with('#') {
			continue;
		}
		let (pattern, replacement) = line
			.split_once('\t')
			.ok_or_else(|| format!("line {}: expected `pattern<TAB>replacement`", index + 1))?;
		let pattern = Regex::new(pattern)
			.map_err(|error| format!("line {}: {error}", index + 1))?;
		rules.push((pattern, replacement.to_owned()));
	}
	Ok(rules)
}

#[cfg(test)]
mod tests {
	use std::io::Write;

	use super::*;

	fn temp_file(contents: &str) -> tempfile::NamedTempFile {
		let mut file = tempfile::NamedTempFile::new().unwrap();
		file.write_all(contents.as_bytes()).unwrap();
		file
	}

	#[test]
	fn corpus_lines_are_lowercased_and_tokenized() {
		let file = temp_file("The Cat Sat\n\nOK then\n");
		let corpus = read_corpus(file.path()).unwrap();
		assert_eq!(corpus.len(), 2);
		assert_eq!(corpus[0], vec!["the", "cat", "sat"]);
		assert_eq!(corpus[1], vec!["ok", "then"]);
	}

	#[test]
	fn token_sets_skip_comments() {
		let file = temp_file("# emotes\n:wave:\n\n:smile:\n");
		let set = read_token_set(file.path()).unwrap();
		assert_eq!(set, HashSet::from([":wave:".to_owned(), ":smile:".to_owned()]));
	}

	#[test]
	fn replacement_tables_parse_and_report_errors() {
		let file = temp_file("wut\twhat\nrly\treally, rarely\n");
		let table = read_replacement_table(file.path()).unwrap();
		assert_eq!(table["wut"], vec!["what"]);
		assert_eq!(table["rly"], vec!["really", "rarely"]);

		let broken = temp_file("no tab here\n");
		let error = read_replacement_table(broken.path()).unwrap_err();
		assert!(error.to_string().contains("line 1"));
	}

	#[test]
	fn phrase_rules_compile_in_order() {
		let file = temp_file("\\bgonna\\b\tgoing to\n\\bwanna\\b\twant to\n");
		let rules = read_phrase_rules(file.path()).unwrap();
		assert_eq!(rules.len(), 2);
		assert_eq!(rules[0].0.replace_all("i gonna go", &rules[0].1), "i going to go");

		let broken = temp_file("([unclosed\tx\n");
		assert!(read_phrase_rules(broken.path()).is_err());
	}
}
