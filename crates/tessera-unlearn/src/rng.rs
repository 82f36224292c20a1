//! Small deterministic PRNG for eviction choices.
//!
//! splitmix64: fast, seedable, and reproducible across platforms, which is
//! all a random eviction policy needs.

/// Deterministic PRNG based on splitmix64.
///
/// # Example
///
/// ```
/// use tessera_unlearn::rng::SimpleRng;
///
/// let mut rng = SimpleRng::new(42);
/// let i = rng.next_index(10);
/// assert!(i < 10);
/// ```
#[derive(Debug, Clone)]
pub struct SimpleRng(u64);

impl SimpleRng {
    /// Creates a new PRNG with the given seed.
    pub fn new(seed: u64) -> Self {
        Self(seed)
    }

    /// Returns the next pseudo-random u64.
    pub fn next_u64(&mut self) -> u64 {
        self.0 = self.0.wrapping_add(0x9e3779b97f4a7c15);
        let mut z = self.0;
        z = (z ^ (z >> 30)).wrapping_mul(0xbf58476d1ce4e5b9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94d049bb133111eb);
        z ^ (z >> 31)
    }

    /// Returns an index in `0..len`. `len` must be non-zero.
    pub fn next_index(&mut self, len: usize) -> usize {
        debug_assert!(len > 0);
        // Multiply-shift keeps the bias below 2^-64 * len.
        ((u128::from(self.next_u64()) * len as u128) >> 64) as usize
    }

    /// Returns `len` characters drawn from `[a-zA-Z0-9]`.
    pub fn next_alnum(&mut self, len: usize) -> String {
        const ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
        (0..len)
            .map(|_| char::from(ALPHABET[self.next_index(ALPHABET.len())]))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic() {
        let mut r1 = SimpleRng::new(42);
        let mut r2 = SimpleRng::new(42);
        for _ in 0..100 {
            assert_eq!(r1.next_u64(), r2.next_u64());
        }
    }

    #[test]
    fn index_in_range() {
        let mut rng = SimpleRng::new(7);
        for len in 1..50 {
            for _ in 0..20 {
                assert!(rng.next_index(len) < len);
            }
        }
    }

    #[test]
    fn alnum_has_requested_length_and_charset() {
        let mut rng = SimpleRng::new(1);
        let s = rng.next_alnum(8);
        assert_eq!(s.len(), 8);
        assert!(s.chars().all(|c| c.is_ascii_alphanumeric()));
    }
}
