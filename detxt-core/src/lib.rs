//! Statistical webspeak-to-English translation core.
//!
//! This crate provides the decoding engine of the translator:
//! - A smoothed n-gram language model over English, with bit-packed
//!   n-gram keys and Kneser-Ney discounting
//! - Candidate scorers proposing target words for source tokens
//! - A beam-search decoder fusing both score streams
//! - A sentence-level translation pipeline around the decoder
//!
//! Models are immutable once trained or loaded; any number of decodes
//! may run concurrently against one shared instance.

/// Core model components: vocabulary, key codec, count store, smoothed
/// language model, candidate scorers and the beam decoder.
pub mod model;

/// Sentence-level translation pipeline around the decoder.
pub mod translator;

/// I/O utilities (corpus and table loaders).
pub mod io;
