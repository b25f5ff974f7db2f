//! Temporal-difference learning rules: each computes a scalar `delta` from
//! `(old_value, new_value, reward, terminal)` and applies it to the active
//! features' weights.

use crate::weight::WeightSet;

/// How the scalar step size for one update is derived.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StepSizeMode {
    Constant(f32),
    /// `alpha / sum(occurrences^2)` over the active set.
    NormalizedBySumSquares(f32),
    /// `alpha / num_active_features`.
    NormalizedByActiveCount(f32),
    /// `alpha / (games_played + 1)`.
    Reciprocal(f32),
}

fn step_size(mode: StepSizeMode, active_set: &[(u32, i32)], games_played: u64) -> f32 {
    match mode {
        StepSizeMode::Constant(alpha) => alpha,
        StepSizeMode::NormalizedBySumSquares(alpha) => {
            let sum_sq: f32 = active_set.iter().map(|&(_, n)| (n * n) as f32).sum();
            if sum_sq > 0.0 {
                alpha / sum_sq
            } else {
                0.0
            }
        }
        StepSizeMode::NormalizedByActiveCount(alpha) => {
            let count = active_set.len() as f32;
            if count > 0.0 {
                alpha / count
            } else {
                0.0
            }
        }
        StepSizeMode::Reciprocal(alpha) => alpha / (games_played as f32 + 1.0),
    }
}

#[inline]
fn logistic(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

/// §4.13's logistic option: squash the pre-squash value through `sigma`, and
/// scale the raw TD error by the clipped gradient `sigma(1-sigma)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Squash {
    pub min_gradient: f32,
}

impl Squash {
    /// Applies the squash to a pre-squash value, returning `(squashed,
    /// clipped_gradient)`.
    fn apply(self, x: f32) -> (f32, f32) {
        let sigma = logistic(x);
        let gradient = (sigma * (1.0 - sigma)).max(self.min_gradient);
        (sigma, gradient)
    }
}

/// Applies `step * delta * occurrences` to every active feature's weight,
/// clamping into `[MIN_WEIGHT, MAX_WEIGHT]`.
fn apply_update(weights: &mut WeightSet, active_set: &[(u32, i32)], step: f32, delta: f32) {
    for &(feature, occurrences) in active_set {
        let w = weights.get_mut(feature as usize);
        w.value += step * delta * occurrences as f32;
        w.clamp_in_place();
        w.update_count += 1;
    }
}

/// One-step TD: `target = reward + new_value`.
#[derive(Debug, Clone, Copy)]
pub struct Td0Rule {
    pub step_mode: StepSizeMode,
    pub games_played: u64,
    pub allow_off_policy: bool,
    pub squash: Option<Squash>,
}

impl Td0Rule {
    pub fn new(step_mode: StepSizeMode) -> Td0Rule {
        Td0Rule { step_mode, games_played: 0, allow_off_policy: true, squash: None }
    }

    /// Returns the raw `delta` applied (0 if the update was skipped as
    /// off-policy).
    pub fn learn(
        &mut self,
        weights: &mut WeightSet,
        active_set: &[(u32, i32)],
        old_value: f32,
        new_value: f32,
        reward: f32,
        off_policy: bool,
    ) -> f32 {
        if off_policy && !self.allow_off_policy {
            return 0.0;
        }
        let (delta, gradient) = match self.squash {
            None => (reward + new_value - old_value, 1.0),
            Some(squash) => {
                let (squashed_old, gradient) = squash.apply(old_value);
                let (squashed_new, _) = squash.apply(new_value);
                (reward + squashed_new - squashed_old, gradient)
            }
        };
        let step = step_size(self.step_mode, active_set, self.games_played);
        apply_update(weights, active_set, step * gradient, delta);
        delta
    }
}

/// Full-return Monte-Carlo update: `target = episode_return`.
#[derive(Debug, Clone, Copy)]
pub struct MonteCarloRule {
    pub step_mode: StepSizeMode,
    pub games_played: u64,
    pub allow_off_policy: bool,
    pub squash: Option<Squash>,
}

impl MonteCarloRule {
    pub fn new(step_mode: StepSizeMode) -> MonteCarloRule {
        MonteCarloRule { step_mode, games_played: 0, allow_off_policy: true, squash: None }
    }

    pub fn learn(
        &mut self,
        weights: &mut WeightSet,
        active_set: &[(u32, i32)],
        old_value: f32,
        episode_return: f32,
        off_policy: bool,
    ) -> f32 {
        if off_policy && !self.allow_off_policy {
            return 0.0;
        }
        let (delta, gradient) = match self.squash {
            None => (episode_return - old_value, 1.0),
            Some(squash) => {
                let (squashed_old, gradient) = squash.apply(old_value);
                (episode_return - squashed_old, gradient)
            }
        };
        let step = step_size(self.step_mode, active_set, self.games_played);
        apply_update(weights, active_set, step * gradient, delta);
        delta
    }
}

/// Backward-sweep-only λ-return rule. Carries `Λ` as state across successive
/// calls within one episode, walked from the last timestep to the first —
/// the recursive `Λ_t = reward_{t+1} + λ·Λ_{t+1} + (1−λ)·new_value`
/// definition falls out naturally from that call order rather than needing
/// the whole episode passed in at once.
#[derive(Debug, Clone)]
pub struct LambdaReturnRule {
    pub lambda: f32,
    pub step_mode: StepSizeMode,
    pub games_played: u64,
    pub allow_off_policy: bool,
    lambda_state: Option<f32>,
}

impl LambdaReturnRule {
    pub fn new(lambda: f32, step_mode: StepSizeMode) -> LambdaReturnRule {
        LambdaReturnRule { lambda, step_mode, games_played: 0, allow_off_policy: true, lambda_state: None }
    }

    /// Call once per episode before the first (backward) `learn` call.
    pub fn reset_episode(&mut self) {
        self.lambda_state = None;
    }

    /// `reward`/`new_value` belong to the *later* timestep of the pair being
    /// learned; `terminal` marks that later timestep as the episode's end.
    pub fn learn(
        &mut self,
        weights: &mut WeightSet,
        active_set: &[(u32, i32)],
        old_value: f32,
        new_value: f32,
        reward: f32,
        terminal: bool,
        off_policy: bool,
    ) -> f32 {
        if off_policy && !self.allow_off_policy {
            self.lambda_state = Some(old_value);
            return 0.0;
        }
        let big_lambda = if terminal {
            reward
        } else {
            let next = self.lambda_state.unwrap_or(new_value);
            reward + self.lambda * next + (1.0 - self.lambda) * new_value
        };
        self.lambda_state = Some(big_lambda);
        let delta = big_lambda - old_value;
        let step = step_size(self.step_mode, active_set, self.games_played);
        apply_update(weights, active_set, step, delta);
        delta
    }
}

/// Forward-sweep-only TD(λ) with eligibility traces, stored directly on each
/// feature's [`crate::weight::Weight`] rather than in a side table. The rule
/// keeps its own sparse list of which feature indices currently carry a
/// non-zero trace so decay/update only ever touch those, not the whole
/// table.
#[derive(Debug, Clone)]
pub struct TdLambdaRule {
    pub lambda: f32,
    pub replacing: bool,
    pub trace_threshold: f32,
    pub step_mode: StepSizeMode,
    pub games_played: u64,
    pub allow_off_policy: bool,
    active_traces: Vec<u32>,
}

impl TdLambdaRule {
    pub fn new(lambda: f32, replacing: bool, trace_threshold: f32, step_mode: StepSizeMode) -> TdLambdaRule {
        TdLambdaRule {
            lambda,
            replacing,
            trace_threshold,
            step_mode,
            games_played: 0,
            allow_off_policy: true,
            active_traces: Vec::new(),
        }
    }

    /// Clears every currently-active trace. Call at the start of each
    /// episode, and whenever an off-policy step forces a reset.
    pub fn reset_episode(&mut self, weights: &mut WeightSet) {
        for &f in &self.active_traces {
            let w = weights.get_mut(f as usize);
            w.trace = 0.0;
            w.trace_active = false;
        }
        self.active_traces.clear();
    }

    pub fn learn(
        &mut self,
        weights: &mut WeightSet,
        active_set: &[(u32, i32)],
        old_value: f32,
        new_value: f32,
        reward: f32,
        terminal: bool,
        off_policy: bool,
    ) -> f32 {
        if off_policy && !self.allow_off_policy {
            self.reset_episode(weights);
            return 0.0;
        }
        let delta = reward + new_value - old_value;

        let mut still_active = Vec::with_capacity(self.active_traces.len());
        for &f in &self.active_traces {
            let w = weights.get_mut(f as usize);
            w.trace *= self.lambda;
            if w.trace.abs() < self.trace_threshold {
                w.trace = 0.0;
                w.trace_active = false;
            } else {
                still_active.push(f);
            }
        }
        self.active_traces = still_active;

        for &(feature, occurrences) in active_set {
            let w = weights.get_mut(feature as usize);
            if self.replacing {
                w.trace = 0.0;
            }
            w.trace += occurrences as f32;
            if !w.trace_active {
                w.trace_active = true;
                self.active_traces.push(feature);
            }
        }

        let step = step_size(self.step_mode, active_set, self.games_played);
        for &f in &self.active_traces {
            let w = weights.get_mut(f as usize);
            w.value += step * delta * w.trace;
            w.clamp_in_place();
            w.update_count += 1;
        }

        if terminal {
            self.reset_episode(weights);
        }
        delta
    }
}

/// Mean/RMS delta, cross-entropy, and Monte-Carlo error accumulated by a
/// trainer across one episode's worth of updates, reported instead of going
/// through a separate logging crate (§9 — the host stack carries none).
#[derive(Debug, Clone, Copy, Default)]
pub struct LearningStats {
    count: u64,
    sum_delta: f64,
    sum_delta_sq: f64,
}

impl LearningStats {
    pub fn new() -> LearningStats {
        LearningStats::default()
    }

    pub fn record(&mut self, delta: f32) {
        self.count += 1;
        self.sum_delta += delta as f64;
        self.sum_delta_sq += (delta as f64) * (delta as f64);
    }

    pub fn reset(&mut self) {
        *self = LearningStats::default();
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean_delta(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum_delta / self.count as f64
        }
    }

    pub fn rms_delta(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            (self.sum_delta_sq / self.count as f64).sqrt()
        }
    }
}
