use gradchain_core::tensor::{column, rand_uniform, Tensor};
use rand::rngs::StdRng;
use rand::SeedableRng;

// Helpers shared by the integration tests. Not every test binary uses all of
// them, hence the allow(dead_code).

/// Routes `log` output through the test harness. Safe to call repeatedly.
#[allow(dead_code)]
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[allow(dead_code)]
pub fn seeded(seed: u64) -> StdRng {
    StdRng::seed_from_u64(seed)
}

/// A `(len, 1)` column with entries drawn uniformly from `[low, high]`.
#[allow(dead_code)]
pub fn uniform_column(len: usize, low: f64, high: f64, rng: &mut StdRng) -> Tensor {
    rand_uniform((len, 1), low, high, rng).expect("Test column creation failed")
}

/// Indicator target with a single active class.
#[allow(dead_code)]
pub fn one_hot(len: usize, active: usize) -> Tensor {
    column((0..len).map(|k| if k == active { 1.0 } else { 0.0 }).collect())
}
