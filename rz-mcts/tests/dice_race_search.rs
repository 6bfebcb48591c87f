use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rz_core::config::RankedRewardsConfig;
use rz_core::{Action, DiceRace, DiceRaceParams, Environment};
use rz_mcts::{Mcts, MctsConfig, Model, NodeId, UniformModel};
use rz_ranked::RankedRewardsEnv;

fn params() -> DiceRaceParams {
    DiceRaceParams {
        goal: 12,
        max_steps: 20,
        step_cost: 0.01,
    }
}

/// Play one episode by repeated history lookups; returns the final node and the history.
fn play<E: Environment, M: Model>(mcts: &mut Mcts<E, M>) -> (NodeId, Vec<Action>) {
    let mut history = Vec::new();
    loop {
        let d = mcts.compute_action_for_history(&history).unwrap();
        let at = mcts.get_node(&history).unwrap();
        assert!(
            mcts.node(at).valid_actions[d.action],
            "illegal action {} chosen",
            d.action
        );
        assert!((d.tree_policy.iter().sum::<f32>() - 1.0).abs() < 1e-5);
        history.push(d.action);

        let node = mcts.get_node(&history).unwrap();
        if mcts.node(node).is_episode_end() {
            return (node, history);
        }
        assert!(history.len() < 64, "episode did not end");
    }
}

#[test]
fn full_episode_on_dice_race() {
    let cfg = MctsConfig {
        num_simulations: 32,
        ..MctsConfig::default()
    };
    let mut mcts = Mcts::new(DiceRace::new(params(), 7), UniformModel, cfg, 7).unwrap();
    let (end, history) = play(&mut mcts);

    let node = mcts.node(end);
    assert!(history.len() <= 20);
    assert_eq!(node.action_history, history);
    assert!(node.done || node.truncated);
    // Step costs alone bound the return from below; the goal bonus plus a bank bounds it above.
    assert!(node.reward >= -0.2 - 1e-5);
    assert!(node.reward <= 1.0);
}

#[test]
fn replaying_history_reaches_identical_snapshots() {
    let cfg = MctsConfig {
        num_simulations: 16,
        ..MctsConfig::default()
    };
    let mut a = Mcts::new(DiceRace::new(params(), 3), UniformModel, cfg, 11).unwrap();
    let (end_a, history) = play(&mut a);

    // A fresh tree with the same env seed lands on the same stochastic outcomes.
    let mut b = Mcts::new(DiceRace::new(params(), 3), UniformModel, cfg, 99).unwrap();
    let end_b = b.get_node(&history).unwrap();
    assert_eq!(a.node(end_a).state, b.node(end_b).state);
    assert_eq!(a.node(end_a).reward, b.node(end_b).reward);
}

#[test]
fn ranked_dice_race_episode_ends_at_plus_or_minus_one() {
    let rr = RankedRewardsConfig {
        initialize_buffer: true,
        num_init_rewards: 20,
        buffer_max_length: 50,
        ..RankedRewardsConfig::default()
    };
    let mut rng = ChaCha8Rng::seed_from_u64(5);
    let env = RankedRewardsEnv::from_config(DiceRace::new(params(), 5), &rr, &mut rng).unwrap();
    assert_eq!(env.buffer().len(), 20);

    let cfg = MctsConfig {
        num_simulations: 24,
        add_dirichlet_noise: true,
        ..MctsConfig::default()
    };
    let mut mcts = Mcts::new(env, UniformModel, cfg, 5).unwrap();
    let (end, _) = play(&mut mcts);
    let node = mcts.node(end);
    assert!(node.reward == 1.0 || node.reward == -1.0);
    assert_eq!(node.state.buffer_state.len(), 21);
}
