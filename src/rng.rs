//! Randomness helpers. Callers inject the generator, so tests can pass a seeded `StdRng`.

use rand::Rng;

/// Uniform random integer in the inclusive range `[min, max]`.
/// Bounds given in the wrong order are swapped.
pub fn random_int<R: Rng + ?Sized>(rng: &mut R, min: u64, max: u64) -> u64 {
  let (lo, hi) = if min <= max { (min, max) } else { (max, min) };
  rng.gen_range(lo..=hi)
}

/// Uniform random index into a collection of `len` items. None when empty.
pub fn random_index<R: Rng + ?Sized>(rng: &mut R, len: usize) -> Option<usize> {
  if len == 0 { None } else { Some(rng.gen_range(0..len)) }
}
