//! Continuous hyper-torus environment driven by the `env` section.

pub mod htorus;
pub mod reward;
pub mod vonmises;

pub use htorus::{HybridTorus, SamplingMethod, TorusAction, TorusState, Trajectory};
pub use reward::{RewardFunc, RewardTransform};
pub use vonmises::VonMises;

/// Energy model scored on proxy inputs (angles). Lower energy is better.
pub trait Proxy {
    fn energy(&self, angles: &[f64]) -> f64;

    /// Lowest attainable energy; bounds the reward in rejection sampling.
    fn min(&self) -> f64;
}
