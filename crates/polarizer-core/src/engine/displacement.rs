use nalgebra::Vector3;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Supplies the offset of each new shadow particle from its core.
pub trait DisplacementSource {
    fn next_offset(&mut self) -> Vector3<f64>;
}

/// Uniform per-axis offsets in `[-max_offset, max_offset]` from a seeded generator, so
/// that repeated runs with the same seed place shadow particles identically.
#[derive(Debug, Clone)]
pub struct SeededDisplacement {
    rng: StdRng,
    max_offset: f64,
}

impl SeededDisplacement {
    pub fn new(seed: u64, max_offset: f64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            max_offset: max_offset.abs(),
        }
    }
}

impl DisplacementSource for SeededDisplacement {
    fn next_offset(&mut self) -> Vector3<f64> {
        if self.max_offset == 0.0 {
            return Vector3::zeros();
        }
        let max = self.max_offset;
        Vector3::new(
            self.rng.gen_range(-max..=max),
            self.rng.gen_range(-max..=max),
            self.rng.gen_range(-max..=max),
        )
    }
}

/// Places every shadow particle exactly on its core.
#[derive(Debug, Clone, Copy, Default)]
pub struct ZeroDisplacement;

impl DisplacementSource for ZeroDisplacement {
    fn next_offset(&mut self) -> Vector3<f64> {
        Vector3::zeros()
    }
}
