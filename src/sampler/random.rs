//! Random sampler implementation.

use parking_lot::Mutex;

use crate::distribution::Distribution;
use crate::error::Result;
use crate::param::ParamValue;
use crate::rng_util;
use crate::sampler::Sampler;
use crate::study::StudyHistory;
use crate::trial::FrozenTrial;

/// A simple random sampler that samples uniformly from distributions.
///
/// This sampler ignores the trial history. It is the default fallback of
/// [`BoSampler`](super::BoSampler) for parameters outside the joint search
/// space.
///
/// # Examples
///
/// ```
/// use optimizer_bo::sampler::random::RandomSampler;
///
/// // Create with default RNG
/// let sampler = RandomSampler::new();
///
/// // Create with a fixed seed for reproducibility
/// let sampler = RandomSampler::with_seed(42);
/// ```
pub struct RandomSampler {
    rng: Mutex<fastrand::Rng>,
}

impl RandomSampler {
    /// Creates a new random sampler with a default random seed.
    #[must_use]
    pub fn new() -> Self {
        Self {
            rng: Mutex::new(fastrand::Rng::new()),
        }
    }

    /// Creates a new random sampler with a fixed seed for reproducibility.
    ///
    /// Using the same seed will produce the same sequence of sampled values.
    #[must_use]
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: Mutex::new(fastrand::Rng::with_seed(seed)),
        }
    }

    /// Draws one value from `distribution`.
    #[must_use]
    pub fn draw(&self, distribution: &Distribution) -> ParamValue {
        let mut rng = self.rng.lock();

        match distribution {
            Distribution::Uniform(d) => {
                let v = rng_util::f64_range(&mut rng, d.low, d.high);
                ParamValue::Float(rng_util::below(v, d.low, d.high))
            }
            Distribution::LogUniform(d) => {
                // Sample uniformly in log space
                let v = rng_util::f64_range(&mut rng, d.low.ln(), d.high.ln()).exp();
                ParamValue::Float(rng_util::below(v, d.low, d.high))
            }
            Distribution::IntUniform(d) => ParamValue::Int(rng.i64(d.low..=d.high)),
            Distribution::DiscreteUniform(d) => {
                // Sample from step grid
                let k = rng.i64(0..=d.count());
                ParamValue::Float(d.value_at(k))
            }
            Distribution::Categorical(d) => {
                let index = rng.usize(0..d.choices.len());
                ParamValue::Choice(d.choices[index].clone())
            }
            Distribution::Custom(d) => d.sample(rng.f64()),
        }
    }
}

impl Default for RandomSampler {
    fn default() -> Self {
        Self::new()
    }
}

impl Sampler for RandomSampler {
    fn sample_independent(
        &self,
        _study: &dyn StudyHistory,
        _trial: &FrozenTrial,
        _name: &str,
        distribution: &Distribution,
    ) -> Result<ParamValue> {
        Ok(self.draw(distribution))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::param::ChoiceValue;

    #[test]
    fn test_random_sampler_uniform() {
        let sampler = RandomSampler::with_seed(42);
        let dist = Distribution::uniform(0.0, 1.0).unwrap();

        for _ in 0..100 {
            let ParamValue::Float(v) = sampler.draw(&dist) else {
                panic!("Expected Float value");
            };
            assert!(dist.contains(v));
        }
    }

    #[test]
    fn test_random_sampler_log_uniform() {
        let sampler = RandomSampler::with_seed(42);
        let dist = Distribution::log_uniform(1e-5, 1.0).unwrap();

        for _ in 0..100 {
            let ParamValue::Float(v) = sampler.draw(&dist) else {
                panic!("Expected Float value");
            };
            assert!((1e-5..=1.0).contains(&v));
        }
    }

    #[test]
    fn test_random_sampler_discrete_uniform() {
        let sampler = RandomSampler::with_seed(42);
        let dist = Distribution::discrete_uniform(0.0, 1.0, 0.25).unwrap();

        for _ in 0..100 {
            let ParamValue::Float(v) = sampler.draw(&dist) else {
                panic!("Expected Float value");
            };
            assert!(dist.contains(v), "{v} is not on the 0.25 grid");
        }
    }

    #[test]
    fn test_random_sampler_int_uniform() {
        let sampler = RandomSampler::with_seed(42);
        let dist = Distribution::int_uniform(0, 10).unwrap();

        for _ in 0..100 {
            let ParamValue::Int(v) = sampler.draw(&dist) else {
                panic!("Expected Int value");
            };
            assert!((0..=10).contains(&v));
        }
    }

    #[test]
    fn test_random_sampler_categorical() {
        let sampler = RandomSampler::with_seed(42);
        let dist = Distribution::categorical(["a", "b", "c"]).unwrap();

        for _ in 0..100 {
            let ParamValue::Choice(ChoiceValue::Str(s)) = sampler.draw(&dist) else {
                panic!("Expected a string choice");
            };
            assert!(["a", "b", "c"].contains(&s.as_str()));
        }
    }

    #[test]
    fn test_random_sampler_single_value() {
        let sampler = RandomSampler::with_seed(42);
        assert_eq!(
            sampler.draw(&Distribution::uniform(2.0, 2.0).unwrap()),
            ParamValue::Float(2.0)
        );
        assert_eq!(
            sampler.draw(&Distribution::int_uniform(5, 5).unwrap()),
            ParamValue::Int(5)
        );
    }

    #[test]
    fn test_random_sampler_reproducibility() {
        let sampler1 = RandomSampler::with_seed(42);
        let sampler2 = RandomSampler::with_seed(42);
        let dist = Distribution::uniform(0.0, 1.0).unwrap();

        for _ in 0..10 {
            assert_eq!(sampler1.draw(&dist), sampler2.draw(&dist));
        }
    }
}
