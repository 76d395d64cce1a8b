use rand::{SeedableRng, rngs::StdRng, seq::IndexedRandom};

/// Source of randomness for label subsampling.
///
/// Implementations pick `count` distinct entries of `indices` uniformly at random.
/// `count` never exceeds `indices.len()`.
pub trait IndexSampler {
    fn choose_without_replacement(&mut self, indices: &[usize], count: usize) -> Vec<usize>;
}

/// [`IndexSampler`] backed by a [`rand::Rng`].
///
/// Give every worker its own sampler; seeding them makes subsampling reproducible.
#[derive(Clone, Debug)]
pub struct RandomSampler<R = StdRng>
where
    R: rand::Rng,
{
    rng: R,
}

impl<R: rand::Rng> RandomSampler<R> {
    pub fn new(rng: R) -> Self {
        Self { rng }
    }
}

impl RandomSampler {
    /// Deterministic sampler, the same seed always disables the same anchors.
    pub fn seeded(seed: u64) -> Self {
        Self::new(StdRng::seed_from_u64(seed))
    }

    pub fn from_os_rng() -> Self {
        Self::new(StdRng::from_os_rng())
    }
}

impl<R: rand::Rng> IndexSampler for RandomSampler<R> {
    fn choose_without_replacement(&mut self, indices: &[usize], count: usize) -> Vec<usize> {
        indices
            .choose_multiple(&mut self.rng, count.min(indices.len()))
            .copied()
            .collect()
    }
}
