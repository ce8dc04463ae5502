//! Reward transforms from proxy values.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Transform applied to proxy values to obtain (positive) rewards.
///
/// Proxy values are energies: lower is better.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RewardFunc {
    Identity,
    Boltzmann,
    Power,
    LinearShift,
}

/// Reward transform with its parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RewardTransform {
    pub func: RewardFunc,
    pub beta: f64,
    pub norm: f64,
    pub min_reward: f64,
}

impl RewardTransform {
    pub fn proxy_to_reward(&self, proxy: f64) -> f64 {
        let reward = match self.func {
            RewardFunc::Identity => -proxy,
            RewardFunc::Boltzmann => (-self.beta * proxy).exp(),
            RewardFunc::Power => (-proxy / self.norm).powf(self.beta),
            RewardFunc::LinearShift => self.beta + proxy,
        };
        if reward.is_nan() {
            self.min_reward
        } else {
            reward.max(self.min_reward)
        }
    }

    /// Inverse of [`proxy_to_reward`](Self::proxy_to_reward) above the clamp.
    pub fn reward_to_proxy(&self, reward: f64) -> f64 {
        match self.func {
            RewardFunc::Identity => -reward,
            RewardFunc::Boltzmann => -reward.ln() / self.beta,
            RewardFunc::Power => -reward.powf(1.0 / self.beta) * self.norm,
            RewardFunc::LinearShift => reward - self.beta,
        }
    }
}

impl fmt::Display for RewardFunc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RewardFunc::Identity => "identity",
            RewardFunc::Boltzmann => "boltzmann",
            RewardFunc::Power => "power",
            RewardFunc::LinearShift => "linear_shift",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transform(func: RewardFunc) -> RewardTransform {
        RewardTransform {
            func,
            beta: 2.0,
            norm: 4.0,
            min_reward: 1e-8,
        }
    }

    #[test]
    fn test_transforms() {
        assert_eq!(transform(RewardFunc::Identity).proxy_to_reward(-3.0), 3.0);
        assert!((transform(RewardFunc::Boltzmann).proxy_to_reward(-1.0) - 2f64.exp()).abs() < 1e-12);
        assert!((transform(RewardFunc::Power).proxy_to_reward(-8.0) - 4.0).abs() < 1e-12);
        assert_eq!(transform(RewardFunc::LinearShift).proxy_to_reward(1.0), 3.0);
    }

    #[test]
    fn test_clamped_below() {
        assert_eq!(transform(RewardFunc::Identity).proxy_to_reward(5.0), 1e-8);
        assert_eq!(transform(RewardFunc::Power).proxy_to_reward(f64::NAN), 1e-8);
    }

    #[test]
    fn test_inverse() {
        for func in [
            RewardFunc::Identity,
            RewardFunc::Boltzmann,
            RewardFunc::Power,
            RewardFunc::LinearShift,
        ] {
            let t = transform(func);
            let proxy = -1.5;
            let back = t.reward_to_proxy(t.proxy_to_reward(proxy));
            assert!((back - proxy).abs() < 1e-9, "{func}: {back}");
        }
    }

    #[test]
    fn test_serde_names() {
        let f: RewardFunc = serde_yaml::from_str("linear_shift").unwrap();
        assert_eq!(f, RewardFunc::LinearShift);
        assert_eq!(f.to_string(), "linear_shift");
    }
}
