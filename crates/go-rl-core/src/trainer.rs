//! Drives a [`crate::learning`] rule over recorded [`crate::history::History`]
//! episodes. The trainer never touches a board or evaluator directly — it
//! only walks `(t, t+k)` pairs of already-recorded [`crate::history::State`]s
//! and hands each pair to a learning rule.

use rand::Rng;

use crate::history::{History, PolicyKind, State};
use crate::weight::WeightSet;

/// Which episode(s) a replay pass draws from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EpisodeChoice {
    /// The episode currently being played (`n = 0`).
    Current,
    /// Pick uniformly among the last `window` episodes.
    MostRecent { window: usize },
    /// Pick uniformly among every episode in history.
    Random,
}

fn pick_episode_index(history: &History, choice: EpisodeChoice, rng: &mut impl Rng) -> Option<usize> {
    if history.is_empty() {
        return None;
    }
    match choice {
        EpisodeChoice::Current => Some(0),
        EpisodeChoice::MostRecent { window } => Some(rng.random_range(0..window.min(history.len()))),
        EpisodeChoice::Random => Some(rng.random_range(0..history.len())),
    }
}

/// A step pairs timestep `t` with `t + k`, which may land in a frozen
/// `return_value`-terminal region; `off_policy` is true if either endpoint's
/// recorded move came from an off-policy sampling step.
fn is_off_policy(a: &State, b: &State) -> bool {
    a.policy_type == PolicyKind::Off || b.policy_type == PolicyKind::Off
}

/// Something that can consume one `(old_state, new_state)` pair. Implemented
/// by thin closures over the four learning rules so the three trainers below
/// don't need to be generic over which rule they drive.
pub trait LearnStep {
    fn learn_pair(&mut self, weights: &mut WeightSet, old: &State, new: &State) -> f32;
}

/// Walks episode `episode`'s timesteps pairing `t` with `t + k`, in either
/// direction, calling `step.learn_pair` for every in-range pair. Returns the
/// number of pairs learned.
fn walk_pairs(
    history: &History,
    episode: usize,
    k: usize,
    interleave: bool,
    backward: bool,
    step: &mut impl LearnStep,
    weights: &mut WeightSet,
    rng: &mut impl Rng,
) -> usize {
    let Some(ep) = history.get_episode(episode) else { return 0 };
    let len = ep.len();
    if len <= k {
        return 0;
    }
    let start = if interleave { 0 } else { rng.random_range(0..k) };
    let mut ts: Vec<usize> = (start..len - k).step_by(k.max(1)).collect();
    if backward {
        ts.reverse();
    }
    let mut count = 0;
    for t in ts.drain(..) {
        let (Some(old), Some(new)) = (ep.get(t), ep.get(t + k)) else { continue };
        step.learn_pair(weights, old, new);
        count += 1;
    }
    count
}

/// Replays episodes forward, `t = start .. T-1` paired with `t + k`.
/// Non-interleaved mode draws one random starting offset in `0..k` per
/// episode rather than covering every timestep.
pub struct ForwardTrainer {
    pub episode_choice: EpisodeChoice,
    pub replays: usize,
    pub k: usize,
    pub interleave: bool,
}

impl ForwardTrainer {
    pub fn train(
        &self,
        history: &History,
        weights: &mut WeightSet,
        step: &mut impl LearnStep,
        rng: &mut impl Rng,
    ) -> usize {
        let mut total = 0;
        for _ in 0..self.replays {
            let Some(episode) = pick_episode_index(history, self.episode_choice, rng) else { break };
            total += walk_pairs(history, episode, self.k, self.interleave, false, step, weights, rng);
        }
        total
    }
}

/// Same pairing as [`ForwardTrainer`], walked from the last timestep back to
/// the first — the direction [`crate::learning::LambdaReturnRule`] requires.
pub struct BackwardTrainer {
    pub episode_choice: EpisodeChoice,
    pub replays: usize,
    pub k: usize,
    pub interleave: bool,
}

impl BackwardTrainer {
    pub fn train(
        &self,
        history: &History,
        weights: &mut WeightSet,
        step: &mut impl LearnStep,
        rng: &mut impl Rng,
    ) -> usize {
        let mut total = 0;
        for _ in 0..self.replays {
            let Some(episode) = pick_episode_index(history, self.episode_choice, rng) else { break };
            total += walk_pairs(history, episode, self.k, self.interleave, true, step, weights, rng);
        }
        total
    }
}

/// Draws `t` uniformly within each chosen episode rather than sweeping every
/// timestep, pairing it with `t + k`.
pub struct RandomTrainer {
    pub episode_choice: EpisodeChoice,
    pub replays: usize,
    pub k: usize,
}

impl RandomTrainer {
    pub fn train(
        &self,
        history: &History,
        weights: &mut WeightSet,
        step: &mut impl LearnStep,
        rng: &mut impl Rng,
    ) -> usize {
        let mut total = 0;
        for _ in 0..self.replays {
            let Some(episode) = pick_episode_index(history, self.episode_choice, rng) else { break };
            let Some(ep) = history.get_episode(episode) else { continue };
            if ep.len() <= self.k {
                continue;
            }
            let t = rng.random_range(0..ep.len() - self.k);
            let (Some(old), Some(new)) = (ep.get(t), ep.get(t + self.k)) else { continue };
            step.learn_pair(weights, old, new);
            total += 1;
        }
        total
    }
}

/// Adapts a [`crate::learning::Td0Rule`] to [`LearnStep`], applying the
/// off-policy guard from the state pair itself rather than the rule's own
/// `allow_off_policy` flag (the trainer is what sees both endpoints).
pub struct Td0Step<'a> {
    pub rule: &'a mut crate::learning::Td0Rule,
}

impl LearnStep for Td0Step<'_> {
    fn learn_pair(&mut self, weights: &mut WeightSet, old: &State, new: &State) -> f32 {
        let Some(active) = &old.active_set else { return 0.0 };
        let off_policy = is_off_policy(old, new);
        self.rule.learn(weights, active, old.eval, new.eval, new.reward, off_policy)
    }
}

pub struct MonteCarloStep<'a> {
    pub rule: &'a mut crate::learning::MonteCarloRule,
    pub episode_return: f32,
}

impl LearnStep for MonteCarloStep<'_> {
    fn learn_pair(&mut self, weights: &mut WeightSet, old: &State, new: &State) -> f32 {
        let Some(active) = &old.active_set else { return 0.0 };
        let off_policy = is_off_policy(old, new);
        self.rule.learn(weights, active, old.eval, self.episode_return, off_policy)
    }
}

pub struct LambdaReturnStep<'a> {
    pub rule: &'a mut crate::learning::LambdaReturnRule,
}

impl LearnStep for LambdaReturnStep<'_> {
    fn learn_pair(&mut self, weights: &mut WeightSet, old: &State, new: &State) -> f32 {
        let Some(active) = &old.active_set else { return 0.0 };
        let off_policy = is_off_policy(old, new);
        self.rule.learn(weights, active, old.eval, new.eval, new.reward, new.terminal, off_policy)
    }
}

pub struct TdLambdaStep<'a> {
    pub rule: &'a mut crate::learning::TdLambdaRule,
}

impl LearnStep for TdLambdaStep<'_> {
    fn learn_pair(&mut self, weights: &mut WeightSet, old: &State, new: &State) -> f32 {
        let Some(active) = &old.active_set else { return 0.0 };
        let off_policy = is_off_policy(old, new);
        self.rule.learn(weights, active, old.eval, new.eval, new.reward, new.terminal, off_policy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::learning::{StepSizeMode, Td0Rule};
    use crate::point::Color;

    fn dummy_state(timestep: usize, eval: f32, reward: f32, terminal: bool) -> State {
        State {
            timestep,
            color_to_play: Color::Black,
            move_played: None,
            policy_type: PolicyKind::On,
            evaluated: true,
            terminal,
            active_set: Some(vec![(0, 1)]),
            reward,
            eval,
            best_move: None,
            best_value: None,
        }
    }

    fn history_with_ramp(len: usize) -> History {
        let mut history = History::new(4, 32);
        history.new_episode();
        for t in 0..len {
            let terminal = t + 1 == len;
            history.push_state(dummy_state(t, t as f32, 0.0, terminal)).unwrap();
        }
        history
    }

    #[test]
    fn forward_trainer_learns_every_pair_when_interleaved() {
        let history = history_with_ramp(6);
        let mut weights = WeightSet::new("test", 1, 0.0);
        let mut rule = Td0Rule::new(StepSizeMode::Constant(0.1));
        let mut step = Td0Step { rule: &mut rule };
        let trainer = ForwardTrainer { episode_choice: EpisodeChoice::Current, replays: 1, k: 1, interleave: true };
        let mut rng = rand::rng();
        let count = trainer.train(&history, &mut weights, &mut step, &mut rng);
        assert_eq!(count, 5);
    }

    #[test]
    fn backward_trainer_visits_same_pair_count_as_forward() {
        let history = history_with_ramp(6);
        let mut weights_f = WeightSet::new("test", 1, 0.0);
        let mut weights_b = WeightSet::new("test", 1, 0.0);
        let mut rule_f = Td0Rule::new(StepSizeMode::Constant(0.1));
        let mut rule_b = Td0Rule::new(StepSizeMode::Constant(0.1));
        let mut rng = rand::rng();

        let forward = ForwardTrainer { episode_choice: EpisodeChoice::Current, replays: 1, k: 1, interleave: true };
        let backward = BackwardTrainer { episode_choice: EpisodeChoice::Current, replays: 1, k: 1, interleave: true };

        let count_f = forward.train(&history, &mut weights_f, &mut Td0Step { rule: &mut rule_f }, &mut rng);
        let count_b = backward.train(&history, &mut weights_b, &mut Td0Step { rule: &mut rule_b }, &mut rng);
        assert_eq!(count_f, count_b);
    }

    #[test]
    fn random_trainer_learns_at_most_replays_pairs() {
        let history = history_with_ramp(6);
        let mut weights = WeightSet::new("test", 1, 0.0);
        let mut rule = Td0Rule::new(StepSizeMode::Constant(0.1));
        let mut step = Td0Step { rule: &mut rule };
        let trainer = RandomTrainer { episode_choice: EpisodeChoice::Current, replays: 10, k: 1 };
        let mut rng = rand::rng();
        let count = trainer.train(&history, &mut weights, &mut step, &mut rng);
        assert_eq!(count, 10);
    }

    #[test]
    fn off_policy_state_pair_is_skipped_when_rule_disallows() {
        let mut history = History::new(1, 16);
        history.new_episode();
        let mut old = dummy_state(0, 0.0, 0.0, false);
        old.policy_type = PolicyKind::Off;
        history.push_state(old).unwrap();
        history.push_state(dummy_state(1, 1.0, 0.0, true)).unwrap();

        let mut weights = WeightSet::new("test", 1, 0.0);
        let mut rule = Td0Rule::new(StepSizeMode::Constant(1.0));
        rule.allow_off_policy = false;
        let mut step = Td0Step { rule: &mut rule };
        let trainer = ForwardTrainer { episode_choice: EpisodeChoice::Current, replays: 1, k: 1, interleave: true };
        let mut rng = rand::rng();
        trainer.train(&history, &mut weights, &mut step, &mut rng);
        assert_eq!(weights.value_of(0), 0.0);
    }
}
