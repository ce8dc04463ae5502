//! The hyper-torus environment built from composed profiles

use rand::rngs::StdRng;
use rand::SeedableRng;
use std::f64::consts::PI;
use torusflow::env::{HybridTorus, SamplingMethod, TorusAction};
use torusflow::schema::ExperimentConfig;

use crate::integration::composer;

fn env_for(overrides: &[&str]) -> (HybridTorus, ExperimentConfig) {
    let composed = composer().compose(overrides).unwrap();
    let config = ExperimentConfig::from_composed(&composed).unwrap();
    (HybridTorus::from_config(&config.env).unwrap(), config)
}

#[test]
fn test_dryrun_trajectories_have_profile_length() {
    let (mut env, config) = env_for(&["experiments=ctorus_dryrun"]);
    assert_eq!(env.length_traj(), 5);
    assert_eq!(env.policy_output_dim(), 2 * 4 + 1);

    let mut rng = StdRng::seed_from_u64(config.seed);
    let output = env.fixed_policy_output().to_vec();
    for _ in 0..10 {
        let traj = env
            .sample_trajectory(&output, SamplingMethod::Policy, 1.0, &mut rng)
            .unwrap();
        assert_eq!(traj.actions.len(), 6);
        assert_eq!(traj.actions.last(), Some(&TorusAction::Stop));
        assert!(traj
            .actions
            .iter()
            .take(5)
            .all(|a| matches!(a, TorusAction::Increment { .. })));
        let terminal = traj.terminal().unwrap();
        assert!(terminal.angles.iter().all(|a| (0.0..2.0 * PI).contains(a)));
    }
}

#[test]
fn test_rollouts_are_reproducible() {
    let (mut env, _) = env_for(&["experiments=ctorus"]);
    let output = env.random_policy_output().to_vec();

    let mut sample = |seed: u64| {
        let mut rng = StdRng::seed_from_u64(seed);
        env.sample_trajectory(&output, SamplingMethod::Policy, 1.0, &mut rng)
            .unwrap()
    };
    let a = sample(11);
    let b = sample(11);
    let c = sample(12);
    assert_eq!(a.states, b.states);
    assert_eq!(a.logprob, b.logprob);
    assert_ne!(a.states, c.states);
}

#[test]
fn test_parents_walk_back_to_source() {
    let (mut env, _) = env_for(&["env.length_traj=4"]);
    let output = env.fixed_policy_output().to_vec();
    let mut rng = StdRng::seed_from_u64(0);
    let traj = env
        .sample_trajectory(&output, SamplingMethod::Uniform, 1.0, &mut rng)
        .unwrap();

    // Skip the final eos, then undo each increment.
    let mut state = traj.states[traj.states.len() - 2].clone();
    for action in traj.actions.iter().rev().skip(1) {
        let (parents, _) = env.parents(&state, false, *action).unwrap();
        state = parents[0].clone();
    }
    assert_eq!(state.n_actions, 0);
    for angle in &state.angles {
        let wrapped = angle.rem_euclid(2.0 * PI);
        assert!(wrapped < 1e-9 || (2.0 * PI - wrapped) < 1e-9, "{angle}");
    }
}

#[test]
fn test_grid_from_config() {
    let (env, _) = env_for(&["env.n_dim=3", "env.length_traj=2"]);
    let grid = env.grid_terminating_states(27);
    assert_eq!(grid.len(), 27);
    assert!(grid.iter().all(|s| s.angles.len() == 3 && s.n_actions == 2));
}
