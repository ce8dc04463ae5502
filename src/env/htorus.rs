//! Hybrid hyper-torus environment.
//!
//! Actions pick a dimension (discrete) and an angle increment (continuous).
//! Trajectories have a fixed length: after `length_traj` increments the only
//! valid action is the stop action (eos).

use super::reward::RewardTransform;
use super::vonmises::VonMises;
use super::Proxy;
use crate::error::EnvError;
use crate::schema::{DistributionParams, EnvConfig};
use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;
use std::f64::consts::PI;
use tracing::{debug, warn};

const TWO_PI: f64 = 2.0 * PI;

/// Logit assigned to masked actions.
pub const LOGINF: f64 = 1000.0;

/// Margin added to the maximum reward in rejection sampling.
const REJECTION_EPSILON: f64 = 1e-4;

/// Candidates drawn per requested sample before rejection sampling gives up.
pub const MAX_REJECTIONS_PER_SAMPLE: usize = 10_000;

/// Angles in `[0, 2π)` per dimension plus the number of increments so far.
#[derive(Debug, Clone, PartialEq)]
pub struct TorusState {
    pub angles: Vec<f64>,
    pub n_actions: usize,
}

impl TorusState {
    pub fn source(n_dim: usize) -> Self {
        Self {
            angles: vec![0.0; n_dim],
            n_actions: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TorusAction {
    /// Add `angle` radians to dimension `dim`.
    Increment { dim: usize, angle: f64 },
    /// End the trajectory.
    Stop,
}

impl TorusAction {
    /// Index in the discrete part of the action space; eos is `n_dim`.
    pub fn index(&self, n_dim: usize) -> usize {
        match self {
            TorusAction::Increment { dim, .. } => *dim,
            TorusAction::Stop => n_dim,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamplingMethod {
    /// Sample from the policy output.
    Policy,
    /// Uniform over dimensions and angles, ignoring the policy output.
    Uniform,
}

/// A complete forward trajectory from the source.
#[derive(Debug, Clone)]
pub struct Trajectory {
    pub states: Vec<TorusState>,
    pub actions: Vec<TorusAction>,
    pub logprob: f64,
}

impl Trajectory {
    pub fn terminal(&self) -> Option<&TorusState> {
        self.states.last()
    }
}

#[derive(Debug, Clone)]
pub struct HybridTorus {
    n_dim: usize,
    length_traj: usize,
    n_params_per_dim: usize,
    vonmises_min_concentration: f64,
    reward: RewardTransform,
    source: TorusState,
    state: TorusState,
    n_actions: usize,
    done: bool,
    fixed_policy_output: Vec<f64>,
    random_policy_output: Vec<f64>,
}

impl HybridTorus {
    pub fn from_config(config: &EnvConfig) -> Result<Self, EnvError> {
        if config.n_dim == 0 {
            return Err(EnvError::InvalidConfig("n_dim must be at least 1".to_string()));
        }
        let n_params_per_dim = if config.do_nonzero_source_prob { 4 } else { 3 };
        let source = TorusState::source(config.n_dim);
        let mut env = Self {
            n_dim: config.n_dim,
            length_traj: config.length_traj,
            n_params_per_dim,
            vonmises_min_concentration: config.vonmises_min_concentration,
            reward: config.reward_transform(),
            state: source.clone(),
            source,
            n_actions: 0,
            done: false,
            fixed_policy_output: Vec::new(),
            random_policy_output: Vec::new(),
        };
        env.fixed_policy_output = env.policy_output(&config.fixed_distribution);
        env.random_policy_output = env.policy_output(&config.random_distribution);
        Ok(env)
    }

    pub fn n_dim(&self) -> usize {
        self.n_dim
    }

    pub fn length_traj(&self) -> usize {
        self.length_traj
    }

    /// Index of the stop action.
    pub fn eos(&self) -> usize {
        self.n_dim
    }

    pub fn state(&self) -> &TorusState {
        &self.state
    }

    pub fn source(&self) -> &TorusState {
        &self.source
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    pub fn n_params_per_dim(&self) -> usize {
        self.n_params_per_dim
    }

    /// Discrete action space: one entry per dimension plus eos.
    pub fn action_space_len(&self) -> usize {
        self.n_dim + 1
    }

    pub fn policy_output_dim(&self) -> usize {
        self.n_dim * self.n_params_per_dim + 1
    }

    pub fn policy_input_dim(&self) -> usize {
        self.n_dim + 1
    }

    pub fn fixed_policy_output(&self) -> &[f64] {
        &self.fixed_policy_output
    }

    pub fn random_policy_output(&self) -> &[f64] {
        &self.random_policy_output
    }

    pub fn reward_transform(&self) -> &RewardTransform {
        &self.reward
    }

    /// Policy output layout for a fixed distribution.
    ///
    /// Per dimension `d` with `p` parameters per dimension:
    /// - `d*p`: logit of choosing `d`
    /// - `d*p + 1`: von Mises location
    /// - `d*p + 2`: log von Mises concentration
    /// - `d*p + 3`: logit of leaving the source angle (backward), if `p == 4`
    ///
    /// The last element is the logit of eos.
    pub fn policy_output(&self, params: &DistributionParams) -> Vec<f64> {
        let mut output = vec![1.0; self.policy_output_dim()];
        for d in 0..self.n_dim {
            output[d * self.n_params_per_dim + 1] = params.vonmises_mean;
            output[d * self.n_params_per_dim + 2] = params.vonmises_concentration;
        }
        output
    }

    pub fn reset(&mut self) {
        self.state = self.source.clone();
        self.n_actions = 0;
        self.done = false;
    }

    /// Forward validity mask over the discrete action space; `true` is invalid.
    pub fn mask_invalid_actions_forward(&self, state: &TorusState, done: bool) -> Vec<bool> {
        let len = self.action_space_len();
        if done {
            return vec![true; len];
        }
        let mut mask = if state.n_actions >= self.length_traj {
            vec![true; len]
        } else {
            vec![false; len]
        };
        mask[self.eos()] = state.n_actions < self.length_traj;
        mask
    }

    /// Backward validity mask over the discrete action space; `true` is invalid.
    pub fn mask_invalid_actions_backward(&self, state: &TorusState, done: bool) -> Vec<bool> {
        let len = self.action_space_len();
        let mut mask = if done {
            vec![true; len]
        } else {
            vec![false; len]
        };
        mask[self.eos()] = !done;

        let n_moved = self.n_moved(state);
        if n_moved > state.n_actions {
            warn!(
                n_moved,
                n_actions = state.n_actions,
                "State has more moved dimensions than actions"
            );
        } else if n_moved == state.n_actions {
            // Every remaining step must undo a moved dimension.
            for (d, (angle, source)) in state.angles.iter().zip(&self.source.angles).enumerate() {
                if angle == source {
                    mask[d] = true;
                }
            }
        }
        mask
    }

    fn n_moved(&self, state: &TorusState) -> usize {
        state
            .angles
            .iter()
            .zip(&self.source.angles)
            .filter(|(a, s)| a != s)
            .count()
    }

    /// Execute `action`. Returns the action actually executed and whether it was valid.
    pub fn step(&mut self, action: TorusAction) -> (TorusAction, bool) {
        if self.done {
            return (action, false);
        }
        if self.n_actions == self.length_traj {
            self.done = true;
            self.n_actions += 1;
            return (TorusAction::Stop, true);
        }
        match action {
            TorusAction::Increment { dim, angle } if dim < self.n_dim => {
                self.n_actions += 1;
                self.state.angles[dim] = (self.state.angles[dim] + angle).rem_euclid(TWO_PI);
                self.state.n_actions = self.n_actions;
                (action, true)
            }
            _ => (action, false),
        }
    }

    /// Parents of `state` and the actions leading from them to `state`.
    pub fn parents(
        &self,
        state: &TorusState,
        done: bool,
        action: TorusAction,
    ) -> Result<(Vec<TorusState>, Vec<TorusAction>), EnvError> {
        if done {
            return Ok((vec![state.clone()], vec![TorusAction::Stop]));
        }
        match action {
            TorusAction::Increment { dim, angle } if dim < self.n_dim => {
                if state.n_actions == 0 {
                    return Err(EnvError::InvalidAction(
                        "the source state has no parents".to_string(),
                    ));
                }
                let mut parent = state.clone();
                parent.angles[dim] = (parent.angles[dim] - angle).rem_euclid(TWO_PI);
                parent.n_actions -= 1;
                Ok((vec![parent], vec![action]))
            }
            TorusAction::Increment { dim, .. } => Err(EnvError::InvalidAction(format!(
                "dimension {} out of range for a {}-torus",
                dim, self.n_dim
            ))),
            TorusAction::Stop => Err(EnvError::InvalidAction(
                "eos cannot lead to a state that is not done".to_string(),
            )),
        }
    }

    fn check_outputs(&self, outputs: &[Vec<f64>]) -> Result<(), EnvError> {
        match outputs.iter().find(|o| o.len() != self.policy_output_dim()) {
            Some(bad) => Err(EnvError::DimensionMismatch {
                expected: self.policy_output_dim(),
                actual: bad.len(),
            }),
            None => Ok(()),
        }
    }

    fn check_masks(&self, masks: Option<&[Vec<bool>]>) -> Result<(), EnvError> {
        let bad = masks.and_then(|m| m.iter().find(|m| m.len() != self.action_space_len()));
        match bad {
            Some(bad) => Err(EnvError::DimensionMismatch {
                expected: self.action_space_len(),
                actual: bad.len(),
            }),
            None => Ok(()),
        }
    }

    fn dimension_logits(&self, output: &[f64], mask: Option<&Vec<bool>>, scale: f64) -> Vec<f64> {
        (0..self.action_space_len())
            .map(|d| {
                if mask.map(|m| m[d]).unwrap_or(false) {
                    -LOGINF
                } else {
                    output[d * self.n_params_per_dim] / scale
                }
            })
            .collect()
    }

    fn angle_distribution(&self, output: &[f64], dim: usize) -> VonMises {
        let base = dim * self.n_params_per_dim;
        VonMises::new(
            output[base + 1],
            output[base + 2].exp() + self.vonmises_min_concentration,
        )
    }

    /// Sample one action per policy output row. Returns each action with its
    /// log-probability.
    pub fn sample_actions<R: Rng + ?Sized>(
        &self,
        outputs: &[Vec<f64>],
        method: SamplingMethod,
        masks: Option<&[Vec<bool>]>,
        temperature_logits: f64,
        rng: &mut R,
    ) -> Result<Vec<(TorusAction, f64)>, EnvError> {
        self.check_outputs(outputs)?;
        self.check_masks(masks)?;
        let mut sampled = Vec::with_capacity(outputs.len());
        for (i, output) in outputs.iter().enumerate() {
            let mask = masks.and_then(|m| m.get(i));
            let logits = match method {
                SamplingMethod::Policy => self.dimension_logits(output, mask, temperature_logits),
                SamplingMethod::Uniform => {
                    let ones = vec![1.0; self.policy_output_dim()];
                    self.dimension_logits(&ones, mask, 1.0)
                }
            };
            let logprobs_dim = log_softmax(&logits);
            let weights: Vec<f64> = logprobs_dim.iter().map(|lp| lp.exp()).collect();
            let dim = WeightedIndex::new(&weights)
                .map_err(|e| EnvError::InvalidAction(format!("cannot sample a dimension: {}", e)))?
                .sample(rng);

            if dim == self.eos() {
                sampled.push((TorusAction::Stop, logprobs_dim[dim]));
                continue;
            }

            let (angle, logprob_angle) = match method {
                SamplingMethod::Uniform => (rng.gen_range(0.0..TWO_PI), -TWO_PI.ln()),
                SamplingMethod::Policy => {
                    let distr = self.angle_distribution(output, dim);
                    let angle = distr.sample(rng);
                    (angle, distr.log_prob(angle))
                }
            };
            sampled.push((
                TorusAction::Increment { dim, angle },
                logprobs_dim[dim] + logprob_angle,
            ));
        }
        Ok(sampled)
    }

    /// Log-probabilities of `actions` under `outputs`, given the states the
    /// actions lead to (`targets`).
    ///
    /// Going backward, an angle returning exactly to the source value is a
    /// discrete event: its probability comes from the Bernoulli "not source"
    /// logit instead of the von Mises density.
    pub fn logprobs(
        &self,
        outputs: &[Vec<f64>],
        is_forward: bool,
        actions: &[TorusAction],
        targets: &[TorusState],
        masks: Option<&[Vec<bool>]>,
    ) -> Result<Vec<f64>, EnvError> {
        self.check_outputs(outputs)?;
        self.check_masks(masks)?;
        if actions.len() != outputs.len() || targets.len() != outputs.len() {
            return Err(EnvError::DimensionMismatch {
                expected: outputs.len(),
                actual: actions.len().min(targets.len()),
            });
        }

        let mut logprobs = Vec::with_capacity(outputs.len());
        for (i, ((output, action), target)) in outputs.iter().zip(actions).zip(targets).enumerate() {
            if let TorusAction::Increment { dim, .. } = *action {
                if dim >= self.n_dim {
                    return Err(EnvError::InvalidAction(format!(
                        "dimension {} out of range for a {}-torus",
                        dim, self.n_dim
                    )));
                }
            }
            if target.angles.len() != self.n_dim {
                return Err(EnvError::DimensionMismatch {
                    expected: self.n_dim,
                    actual: target.angles.len(),
                });
            }
            let mask = masks.and_then(|m| m.get(i));
            let logits = self.dimension_logits(output, mask, 1.0);
            let dim = action.index(self.n_dim);
            let mut logprob = log_softmax(&logits)[dim];

            if let TorusAction::Increment { dim, angle } = *action {
                let nsource_ne_nsteps = self.n_moved(target) != target.n_actions;
                let angle_ne_source = target.angles[dim] != self.source.angles[dim];
                if is_forward || nsource_ne_nsteps || angle_ne_source {
                    logprob += self.angle_distribution(output, dim).log_prob(angle);
                    if self.n_params_per_dim == 4 && !is_forward {
                        let logit = output[dim * self.n_params_per_dim + 3];
                        logprob += if angle_ne_source {
                            log_sigmoid(logit)
                        } else {
                            log_sigmoid(-logit)
                        };
                    }
                }
            }
            logprobs.push(logprob);
        }
        Ok(logprobs)
    }

    /// Sample a full forward trajectory from the source with a single policy
    /// output used at every step.
    pub fn sample_trajectory<R: Rng + ?Sized>(
        &mut self,
        policy_output: &[f64],
        method: SamplingMethod,
        temperature_logits: f64,
        rng: &mut R,
    ) -> Result<Trajectory, EnvError> {
        self.reset();
        let outputs = vec![policy_output.to_vec()];
        let mut states = vec![self.state.clone()];
        let mut actions = Vec::new();
        let mut logprob = 0.0;

        while !self.done {
            let mask = vec![self.mask_invalid_actions_forward(&self.state, self.done)];
            let (action, lp) = self
                .sample_actions(&outputs, method, Some(&mask), temperature_logits, rng)?
                .remove(0);
            let (executed, valid) = self.step(action);
            if !valid {
                return Err(EnvError::InvalidAction(format!(
                    "sampled {:?} in state {:?}",
                    action, self.state
                )));
            }
            logprob += lp;
            actions.push(executed);
            states.push(self.state.clone());
        }

        Ok(Trajectory {
            states,
            actions,
            logprob,
        })
    }

    /// Proxy input: the angles only.
    pub fn state_to_proxy(&self, state: &TorusState) -> Vec<f64> {
        state.angles.clone()
    }

    pub fn statebatch_to_proxy(&self, states: &[TorusState]) -> Vec<Vec<f64>> {
        states.iter().map(|s| self.state_to_proxy(s)).collect()
    }

    /// Policy input: the angles followed by the number of actions.
    pub fn state_to_policy(&self, state: &TorusState) -> Vec<f64> {
        let mut input = state.angles.clone();
        input.push(state.n_actions as f64);
        input
    }

    /// `"[a1 a2 ...] | n"`, angles in degrees.
    pub fn state_to_readable(&self, state: &TorusState) -> String {
        let angles: Vec<String> = state
            .angles
            .iter()
            .map(|a| a.to_degrees().to_string())
            .collect();
        format!("[{}] | {}", angles.join(" "), state.n_actions)
    }

    pub fn readable_to_state(&self, readable: &str) -> Result<TorusState, EnvError> {
        let invalid = || EnvError::InvalidReadable(readable.to_string());
        let (angles, n_actions) = readable.split_once(" | ").ok_or_else(invalid)?;
        let angles = angles
            .trim()
            .strip_prefix('[')
            .and_then(|s| s.strip_suffix(']'))
            .ok_or_else(invalid)?
            .split_whitespace()
            .map(|a| a.parse::<f64>().map(f64::to_radians))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| invalid())?;
        if angles.len() != self.n_dim {
            return Err(EnvError::DimensionMismatch {
                expected: self.n_dim,
                actual: angles.len(),
            });
        }
        let n_actions = n_actions.trim().parse::<usize>().map_err(|_| invalid())?;
        Ok(TorusState { angles, n_actions })
    }

    /// Regular grid of terminating states with at least `n_states` points.
    pub fn grid_terminating_states(&self, n_states: usize) -> Vec<TorusState> {
        if n_states == 0 {
            return Vec::new();
        }
        let n_per_dim = points_per_dim(n_states, self.n_dim);
        let axis = linspace(0.0, TWO_PI, n_per_dim);

        let mut states = Vec::with_capacity(n_per_dim.pow(self.n_dim as u32));
        let mut index = vec![0usize; self.n_dim];
        loop {
            states.push(TorusState {
                angles: index.iter().map(|&i| axis[i]).collect(),
                n_actions: self.length_traj,
            });
            // Odometer over the Cartesian product, last dimension fastest.
            let mut d = self.n_dim;
            loop {
                if d == 0 {
                    return states;
                }
                d -= 1;
                index[d] += 1;
                if index[d] < n_per_dim {
                    break;
                }
                index[d] = 0;
            }
        }
    }

    pub fn reward(&self, proxy: &dyn Proxy, state: &TorusState) -> f64 {
        self.reward
            .proxy_to_reward(proxy.energy(&self.state_to_proxy(state)))
    }

    /// Rejection sampling of terminating states from the reward, with a
    /// uniform proposal on the torus.
    ///
    /// Gives up after `MAX_REJECTIONS_PER_SAMPLE * n_samples` candidates.
    pub fn sample_from_reward<R: Rng + ?Sized>(
        &self,
        proxy: &dyn Proxy,
        n_samples: usize,
        rng: &mut R,
    ) -> Result<Vec<TorusState>, EnvError> {
        let max_reward = self.reward.proxy_to_reward(proxy.min());
        if !max_reward.is_finite() || max_reward <= 0.0 {
            return Err(EnvError::Rejection(format!(
                "maximum reward {} is not finite and positive",
                max_reward
            )));
        }

        let max_attempts = n_samples.saturating_mul(MAX_REJECTIONS_PER_SAMPLE);
        let mut samples = Vec::with_capacity(n_samples);
        let mut attempts = 0usize;
        while samples.len() < n_samples {
            if attempts == max_attempts {
                return Err(EnvError::Rejection(format!(
                    "accepted {} of {} samples after {} candidates",
                    samples.len(),
                    n_samples,
                    attempts
                )));
            }
            attempts += 1;
            let candidate = TorusState {
                angles: (0..self.n_dim).map(|_| rng.gen_range(0.0..TWO_PI)).collect(),
                n_actions: self.length_traj,
            };
            let threshold = rng.gen::<f64>() * (max_reward + REJECTION_EPSILON);
            if threshold < self.reward(proxy, &candidate) {
                samples.push(candidate);
            }
        }
        debug!(n_samples, attempts, "Sampled terminating states from the reward");
        Ok(samples)
    }
}

fn log_softmax(logits: &[f64]) -> Vec<f64> {
    let max = logits.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let log_sum = logits.iter().map(|l| (l - max).exp()).sum::<f64>().ln() + max;
    logits.iter().map(|l| l - log_sum).collect()
}

fn log_sigmoid(x: f64) -> f64 {
    if x >= 0.0 {
        -(-x).exp().ln_1p()
    } else {
        x - x.exp().ln_1p()
    }
}

fn points_per_dim(n_states: usize, n_dim: usize) -> usize {
    let mut k = (n_states as f64).powf(1.0 / n_dim as f64).floor().max(1.0) as usize;
    while (k as f64).powi(n_dim as i32) < n_states as f64 {
        k += 1;
    }
    k
}

fn linspace(start: f64, end: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (end - start) / (n - 1) as f64;
            (0..n).map(|i| start + step * i as f64).collect()
        }
    }
}
