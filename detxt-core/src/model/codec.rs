use super::vocab::WordId;

/// A packed n-gram: word ids in fixed-width bit fields, oldest word in
/// the most significant field.
pub type NgramKey = u128;

/// The empty (order-0) n-gram.
pub const EMPTY_KEY: NgramKey = 0;

/// Packs and unpacks ordered id sequences into single integer keys.
///
/// Encoding `[w0..wk]` places `w0` in the most significant `B`-bit field
/// and `wk` in the least significant one, so a key's order is recoverable
/// purely from its bit length. This only works because id 0 is a padding
/// slot no token ever occupies.
///
/// # Invariants
/// - `bit_width` matches the owning vocabulary and never changes.
/// - Callers keep sequences within [`NgramCodec::max_order`]; longer
///   sequences would shift the oldest ids out of the key.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NgramCodec {
	bit_width: u32,
}

impl NgramCodec {
	pub fn new(bit_width: u32) -> Self {
		Self { bit_width }
	}

	/// Longest sequence this key width can hold.
	pub fn max_order(&self) -> usize {
		(NgramKey::BITS / self.bit_width) as usize
	}

	/// Packs an ordered id sequence; the empty sequence encodes to
	/// [`EMPTY_KEY`].
	pub fn encode(&self, ids: &[WordId]) -> NgramKey {
		ids.iter()
			.fold(EMPTY_KEY, |key, &id| self.extend(key, id))
	}

	/// Appends a word to an existing context key.
	pub fn extend(&self, context: NgramKey, word: WordId) -> NgramKey {
		(context << self.bit_width) + NgramKey::from(word)
	}

	/// Number of ids packed into a key: `ceil(bitlength / B)`.
	pub fn order_of(&self, key: NgramKey) -> usize {
		let bits = NgramKey::BITS - key.leading_zeros();
		bits.div_ceil(self.bit_width) as usize
	}

	/// Removes the oldest (leftmost) id by masking off the high field.
	///
	/// `drop_leading(encode([a, b, c])) == encode([b, c])`. Returns
	/// [`EMPTY_KEY`] for order-0 and order-1 keys.
	pub fn drop_leading(&self, key: NgramKey) -> NgramKey {
		let order = self.order_of(key);
		if order <= 1 {
			return EMPTY_KEY;
		}
		key & self.mask(order - 1)
	}

	/// Removes the newest (rightmost) id; the exact inverse of
	/// [`NgramCodec::extend`].
	///
	/// `shrink_context(encode([a, b, c])) == encode([a, b])`. Returns
	/// [`EMPTY_KEY`] for order-0 and order-1 keys.
	pub fn shrink_context(&self, key: NgramKey) -> NgramKey {
		key >> self.bit_width
	}

	fn mask(&self, order: usize) -> NgramKey {
		(1 << (order as u32 * self.bit_width)) - 1
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn codec() -> NgramCodec {
		NgramCodec::new(3)
	}

	#[test]
	fn encode_packs_oldest_first() {
		let codec = codec();
		assert_eq!(codec.encode(&[]), EMPTY_KEY);
		assert_eq!(codec.encode(&[4]), 4);
		assert_eq!(codec.encode(&[4, 5]), (4 << 3) + 5);
		assert_eq!(codec.encode(&[1, 4, 5]), (1 << 6) + (4 << 3) + 5);
	}

	#[test]
	fn extend_matches_encode() {
		let codec = codec();
		let context = codec.encode(&[4, 5]);
		assert_eq!(codec.extend(context, 6), codec.encode(&[4, 5, 6]));
		assert_eq!(codec.extend(EMPTY_KEY, 6), codec.encode(&[6]));
	}

	#[test]
	fn order_is_recovered_from_bit_length() {
		let codec = codec();
		assert_eq!(codec.order_of(EMPTY_KEY), 0);
		assert_eq!(codec.order_of(codec.encode(&[1])), 1);
		assert_eq!(codec.order_of(codec.encode(&[7])), 1);
		assert_eq!(codec.order_of(codec.encode(&[1, 1])), 2);
		assert_eq!(codec.order_of(codec.encode(&[7, 7, 7])), 3);
	}

	#[test]
	fn reductions_invert_extension() {
		let codec = codec();
		let key = codec.encode(&[4, 5, 6]);
		assert_eq!(codec.shrink_context(key), codec.encode(&[4, 5]));
		assert_eq!(codec.drop_leading(key), codec.encode(&[5, 6]));
	}

	#[test]
	fn reductions_bottom_out_at_empty() {
		let codec = codec();
		assert_eq!(codec.drop_leading(EMPTY_KEY), EMPTY_KEY);
		assert_eq!(codec.shrink_context(EMPTY_KEY), EMPTY_KEY);
		let unigram = codec.encode(&[5]);
		assert_eq!(codec.drop_leading(unigram), EMPTY_KEY);
		assert_eq!(codec.shrink_context(unigram), EMPTY_KEY);
	}

	#[test]
	fn max_order_respects_key_width() {
		assert_eq!(NgramCodec::new(3).max_order(), 42);
		assert_eq!(NgramCodec::new(32).max_order(), 4);
	}
}
