use rand_chacha::ChaCha8Rng;
use rand_core::SeedableRng;

/// Creates the random source for one flip session.
///
/// With a seed the session is reproducible; without one it is seeded from the
/// thread-local generator, which draws from OS entropy.
pub fn session_rng(seed: Option<u64>) -> ChaCha8Rng {
    match seed {
        Some(seed) => ChaCha8Rng::seed_from_u64(seed),
        None => ChaCha8Rng::from_rng(&mut rand::rng()),
    }
}
