//! Top-level module for the translation engine.
//!
//! Components, leaves first:
//! - Token/id mapping (`Vocabulary`)
//! - Bit-packed n-gram keys (`NgramCodec`)
//! - Raw and derived n-gram statistics (`NgramCountStore`)
//! - Kneser-Ney smoothed scoring (`LanguageModel`)
//! - Translation-candidate proposals (`CandidateScorer`)
//! - Beam-search decoding (`BeamDecoder`)

/// Bit-packed n-gram key encoding and the order-reduction operations.
pub mod codec;

/// Raw n-gram counts and the derived tables discount smoothing needs.
pub mod counts;

/// Beam-search decoder combining candidate and language-model scores.
pub mod decoder;

/// Kneser-Ney smoothed n-gram language model: training, scoring,
/// persistence.
pub mod language_model;

/// Candidate scorer interface and its table/fuzzy implementations.
pub mod scorer;

/// Token to dense-id mapping with reserved sentinel entries.
pub mod vocab;
