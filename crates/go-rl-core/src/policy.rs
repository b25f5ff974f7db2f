//! Move-selection policies, all driven through one [`Evaluator`] so every
//! candidate move is scored by the same incremental machinery real play
//! uses.

use rand::{Rng, RngCore};

use crate::board::{area_score, GoBoard};
use crate::evaluator::Evaluator;
use crate::history::PolicyKind;
use crate::move_filter::{orthogonal_neighbors, MoveFilter};
use crate::point::{Color, Move, Point};

/// What a policy selected, shaped to drop straight into a
/// [`crate::history::State`].
#[derive(Debug, Clone, Copy)]
pub struct PolicyChoice {
    pub mv: Move,
    pub kind: PolicyKind,
    /// The move's evaluated value, when the policy happened to compute one.
    pub value: Option<f32>,
}

/// A move-selection strategy. Takes `&mut dyn RngCore` rather than a generic
/// `Rng` bound so policies compose as trait objects (ε-greedy and priority
/// both hold a boxed fallback).
pub trait Policy {
    fn select(
        &mut self,
        evaluator: &mut Evaluator,
        board: &mut dyn GoBoard,
        color: Color,
        ply: usize,
        rng: &mut dyn RngCore,
    ) -> Option<PolicyChoice>;
}

/// Always the evaluator's argmax/argmin move.
#[derive(Debug, Clone, Copy, Default)]
pub struct GreedyPolicy;

impl Policy for GreedyPolicy {
    fn select(
        &mut self,
        evaluator: &mut Evaluator,
        board: &mut dyn GoBoard,
        color: Color,
        _ply: usize,
        rng: &mut dyn RngCore,
    ) -> Option<PolicyChoice> {
        let (mv, value) = evaluator.find_best(board, color, rng)?;
        Some(PolicyChoice { mv, kind: PolicyKind::Best, value: Some(value) })
    }
}

/// Draws uniformly from the move filter's currently vacant points.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomPolicy;

impl Policy for RandomPolicy {
    fn select(
        &mut self,
        evaluator: &mut Evaluator,
        _board: &mut dyn GoBoard,
        _color: Color,
        _ply: usize,
        rng: &mut dyn RngCore,
    ) -> Option<PolicyChoice> {
        let len = evaluator.filter.len();
        if len == 0 {
            return None;
        }
        let idx = rng.random_range(0..len);
        let p = evaluator.filter.iter().nth(idx)?;
        Some(PolicyChoice { mv: Move::Play(p), kind: PolicyKind::On, value: None })
    }
}

/// How an [`EpsilonGreedyPolicy`] derives its per-move exploration
/// probability.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EpsilonSchedule {
    Constant(f32),
    /// Per-move exploration probability `(1 - epsilon)^(ply + 1)`.
    Decay(f32),
}

impl EpsilonSchedule {
    fn probability(self, ply: usize) -> f32 {
        match self {
            EpsilonSchedule::Constant(epsilon) => epsilon,
            EpsilonSchedule::Decay(epsilon) => (1.0 - epsilon).powi(ply as i32 + 1),
        }
    }
}

/// With probability `schedule.probability(ply)`, defers to `explore`
/// (labelled off-policy); otherwise to `exploit` (labelled on-policy).
pub struct EpsilonGreedyPolicy {
    pub schedule: EpsilonSchedule,
    pub explore: Box<dyn Policy>,
    pub exploit: Box<dyn Policy>,
}

impl Policy for EpsilonGreedyPolicy {
    fn select(
        &mut self,
        evaluator: &mut Evaluator,
        board: &mut dyn GoBoard,
        color: Color,
        ply: usize,
        rng: &mut dyn RngCore,
    ) -> Option<PolicyChoice> {
        let p = self.schedule.probability(ply);
        if rng.random_bool(p as f64) {
            let choice = self.explore.select(evaluator, board, color, ply, rng)?;
            Some(PolicyChoice { kind: PolicyKind::Off, ..choice })
        } else {
            let choice = self.exploit.select(evaluator, board, color, ply, rng)?;
            Some(PolicyChoice { kind: PolicyKind::On, ..choice })
        }
    }
}

/// Softmax over every allowed move's evaluated value.
pub struct GibbsPolicy {
    pub temperature: f32,
    pub subtract_mean: bool,
    /// Pass is included in the candidate set when true.
    pub allow_pass: bool,
    /// If any `exponent` exceeds this, probability collapses entirely onto
    /// the argmax move instead of computing a softmax (guards against
    /// `exp` overflow at low temperature).
    pub exponent_cap: f32,
}

impl Policy for GibbsPolicy {
    fn select(
        &mut self,
        evaluator: &mut Evaluator,
        board: &mut dyn GoBoard,
        color: Color,
        _ply: usize,
        rng: &mut dyn RngCore,
    ) -> Option<PolicyChoice> {
        let sign = color.sign();
        let mut candidates: Vec<Move> = evaluator.filter.iter().map(Move::Play).collect();
        if self.allow_pass {
            candidates.push(Move::Pass);
        }
        if candidates.is_empty() {
            return None;
        }
        let mut scored = Vec::with_capacity(candidates.len());
        for mv in candidates {
            let value = evaluator.evaluate_move(board, mv, color).ok()?;
            scored.push((mv, value * sign));
        }
        let mean = if self.subtract_mean {
            scored.iter().map(|&(_, v)| v).sum::<f32>() / scored.len() as f32
        } else {
            0.0
        };

        let exponents: Vec<f32> = scored.iter().map(|&(_, v)| (v - mean) / self.temperature).collect();
        let overflowed = exponents.iter().any(|&e| e > self.exponent_cap);

        let (mv, value) = if overflowed {
            scored
                .iter()
                .copied()
                .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))?
        } else {
            let weights: Vec<f32> = exponents.iter().map(|&e| e.exp()).collect();
            let total: f32 = weights.iter().sum();
            let mut draw = rng.random::<f32>() * total;
            let mut chosen = scored.len() - 1;
            for (i, &w) in weights.iter().enumerate() {
                if draw < w {
                    chosen = i;
                    break;
                }
                draw -= w;
            }
            scored[chosen]
        };
        Some(PolicyChoice { mv, kind: PolicyKind::On, value: Some(value * sign) })
    }
}

/// Largest capture, or capture-saving, move by stone count. `None` if the
/// board has no atari on either side right now.
#[derive(Debug, Clone, Copy, Default)]
pub struct AtariPolicy;

impl AtariPolicy {
    /// Scans every legal candidate in `filter`: a move is a *capture*
    /// candidate if it sits on the last liberty of an enemy block (scored by
    /// that block's size), or a *save* candidate if it sits on the last
    /// liberty of a friendly block and raises that block's liberties to at
    /// least two afterwards (scored by the rescued block's size). Returns
    /// the largest by that count.
    pub fn best_move(&self, board: &mut dyn GoBoard, filter: &MoveFilter, color: Color) -> Option<(Move, usize)> {
        let opponent = color.opposite();
        let mut best: Option<(Point, usize)> = None;
        for p in filter.iter() {
            if !board.is_legal(Move::Play(p), color) {
                continue;
            }
            let mut capture_count = 0usize;
            let mut save_candidate = false;
            for n in orthogonal_neighbors(p, board.size()) {
                match board.disc_at(n).color() {
                    Some(c) if c == opponent && board.liberties_of(n) == 1 => {
                        capture_count = capture_count.max(board.block_points(n).len());
                    }
                    Some(c) if c == color && board.liberties_of(n) == 1 => {
                        save_candidate = true;
                    }
                    _ => {}
                }
            }
            let stones = if capture_count > 0 {
                capture_count
            } else if save_candidate {
                if board.play(Move::Play(p), color).is_err() {
                    continue;
                }
                let raised = board.num_liberties_at_most(p, 2) >= 2;
                let block_size = board.block_points(p).len();
                let _ = board.undo();
                if !raised {
                    continue;
                }
                block_size
            } else {
                continue;
            };
            if best.is_none_or(|(_, b)| stones > b) {
                best = Some((p, stones));
            }
        }
        best.map(|(p, stones)| (Move::Play(p), stones))
    }
}

/// Tries [`AtariPolicy`] first; falls back to a normal policy when it finds
/// nothing.
pub struct PriorityPolicy {
    pub atari: AtariPolicy,
    pub fallback: Box<dyn Policy>,
}

impl Policy for PriorityPolicy {
    fn select(
        &mut self,
        evaluator: &mut Evaluator,
        board: &mut dyn GoBoard,
        color: Color,
        ply: usize,
        rng: &mut dyn RngCore,
    ) -> Option<PolicyChoice> {
        if let Some((mv, _stones)) = self.atari.best_move(board, &evaluator.filter, color) {
            return Some(PolicyChoice { mv, kind: PolicyKind::On, value: None });
        }
        self.fallback.select(evaluator, board, color, ply, rng)
    }
}

/// Uniform-random playout to a move cap or until the filter runs dry, driven
/// through the evaluator/tracker machinery so simulated games obey the same
/// incremental invariants real play does. Returns the terminal area score.
pub struct Simulator {
    pub max_moves: usize,
}

impl Simulator {
    /// Plays a random game forward from the current position, then undoes
    /// every move it played so `evaluator`/`board` are left exactly as found
    /// — callers (the Monte-Carlo policy) use this to probe a candidate
    /// move without leaving any trace.
    pub fn run(&self, evaluator: &mut Evaluator, board: &mut dyn GoBoard, to_play: Color, rng: &mut dyn RngCore) -> f32 {
        let mut color = to_play;
        let mut played = 0usize;
        while played < self.max_moves && !evaluator.filter.is_empty() {
            let len = evaluator.filter.len();
            let idx = rng.random_range(0..len);
            let Some(p) = evaluator.filter.iter().nth(idx) else { break };
            if evaluator.play_execute(board, Move::Play(p), color).is_err() {
                break;
            }
            played += 1;
            color = color.opposite();
        }
        let score = area_score(board);
        for _ in 0..played {
            let _ = evaluator.take_back_undo(board);
        }
        score
    }
}

/// For each allowed move, plays it, runs `simulations` simulator playouts
/// from the resulting position, averages their score, and picks the best
/// for `color`.
pub struct MonteCarloPolicy {
    pub simulator: Simulator,
    pub simulations: usize,
}

impl Policy for MonteCarloPolicy {
    fn select(
        &mut self,
        evaluator: &mut Evaluator,
        board: &mut dyn GoBoard,
        color: Color,
        _ply: usize,
        rng: &mut dyn RngCore,
    ) -> Option<PolicyChoice> {
        let sign = color.sign();
        let candidates: Vec<Point> = evaluator.filter.iter().collect();
        if candidates.is_empty() {
            return None;
        }
        let mut best: Option<(Move, f32)> = None;
        for p in candidates {
            if evaluator.play_execute(board, Move::Play(p), color).is_err() {
                continue;
            }
            let mut total = 0.0f32;
            for _ in 0..self.simulations.max(1) {
                total += self.simulator.run(evaluator, board, color.opposite(), rng);
            }
            let mean = total / self.simulations.max(1) as f32;
            let _ = evaluator.take_back_undo(board);

            if best.is_none_or(|(_, b)| mean * sign > b * sign) {
                best = Some((Move::Play(p), mean));
            }
        }
        best.map(|(mv, value)| PolicyChoice { mv, kind: PolicyKind::On, value: Some(value) })
    }
}

/// How [`TwoStagePolicy`] derives the (possibly fractional) switch point
/// from the number of episodes played so far.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SwitchSchedule {
    Fixed(f32),
    /// `switch = base + rate * ln(1 + episodes)`.
    Logarithmic { base: f32, rate: f32 },
    /// `switch = base + rate * episodes`.
    Linear { base: f32, rate: f32 },
}

impl SwitchSchedule {
    fn switch_at(self, episodes_played: u64) -> f32 {
        match self {
            SwitchSchedule::Fixed(s) => s,
            SwitchSchedule::Logarithmic { base, rate } => base + rate * (1.0 + episodes_played as f32).ln(),
            SwitchSchedule::Linear { base, rate } => base + rate * episodes_played as f32,
        }
    }
}

/// Policy 1 while `ply < floor(switch)`, policy 2 after. On the boundary ply
/// itself, the fractional part of `switch` is the probability of already
/// having switched to policy 2.
pub struct TwoStagePolicy {
    pub schedule: SwitchSchedule,
    pub episodes_played: u64,
    pub first: Box<dyn Policy>,
    pub second: Box<dyn Policy>,
}

impl Policy for TwoStagePolicy {
    fn select(
        &mut self,
        evaluator: &mut Evaluator,
        board: &mut dyn GoBoard,
        color: Color,
        ply: usize,
        rng: &mut dyn RngCore,
    ) -> Option<PolicyChoice> {
        let switch = self.schedule.switch_at(self.episodes_played);
        let floor = switch.floor();
        let fraction = switch - floor;
        let use_second = if (ply as f32) < floor {
            false
        } else if (ply as f32) > floor {
            true
        } else {
            rng.random_bool(fraction as f64)
        };
        if use_second {
            self.second.select(evaluator, board, color, ply, rng)
        } else {
            self.first.select(evaluator, board, color, ply, rng)
        }
    }
}

/// Interface-only stub for an external Monte-Carlo playout engine (e.g. a
/// UCT tree search) — no default implementation, matching its scope cut.
pub trait FuegoPlayoutPolicy: Policy {}

/// Interface-only stub for an alpha-beta search policy returning its
/// principal-variation first move — no default implementation, matching its
/// scope cut.
pub trait SearchPolicy: Policy {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::SimpleBoard;
    use crate::features::FeatureSetArena;
    use crate::trackers::TrackerArena;
    use crate::weight::WeightSet;

    fn material_evaluator(size: usize) -> Evaluator {
        let mut arena = FeatureSetArena::new();
        let ls = arena.add_local_shape(1, 1, size);
        let shared = arena.add_shared(ls, crate::features::shared::ShareKind::Ci, true, true).unwrap();
        let trackers = TrackerArena::build(&arena).unwrap();
        let mut weights = WeightSet::new("material", arena.num_features(shared), 0.0);
        weights.get_mut(0).value = 1.0;
        let filter = MoveFilter::new(size);
        Evaluator::new(trackers, weights, filter, shared)
    }

    #[test]
    fn greedy_policy_matches_find_best() {
        let mut evaluator = material_evaluator(5);
        let mut board = SimpleBoard::new(5, 6.5);
        evaluator.reset(&board);
        let mut rng = rand::rng();
        let mut policy = GreedyPolicy;
        let choice = policy.select(&mut evaluator, &mut board, Color::Black, 0, &mut rng).unwrap();
        assert!(choice.mv.is_play());
        assert_eq!(choice.kind, PolicyKind::Best);
    }

    #[test]
    fn random_policy_always_picks_a_vacant_point() {
        let mut evaluator = material_evaluator(5);
        let mut board = SimpleBoard::new(5, 6.5);
        evaluator.reset(&board);
        let mut rng = rand::rng();
        let mut policy = RandomPolicy;
        let choice = policy.select(&mut evaluator, &mut board, Color::Black, 0, &mut rng).unwrap();
        let Move::Play(p) = choice.mv else { panic!("expected a play") };
        assert!(evaluator.filter.contains(p));
    }

    #[test]
    fn epsilon_greedy_labels_branch_taken() {
        let mut evaluator = material_evaluator(5);
        let mut board = SimpleBoard::new(5, 6.5);
        evaluator.reset(&board);
        let mut rng = rand::rng();

        let mut always_explore = EpsilonGreedyPolicy {
            schedule: EpsilonSchedule::Constant(1.0),
            explore: Box::new(RandomPolicy),
            exploit: Box::new(GreedyPolicy),
        };
        let choice = always_explore.select(&mut evaluator, &mut board, Color::Black, 0, &mut rng).unwrap();
        assert_eq!(choice.kind, PolicyKind::Off);

        let mut always_exploit = EpsilonGreedyPolicy {
            schedule: EpsilonSchedule::Constant(0.0),
            explore: Box::new(RandomPolicy),
            exploit: Box::new(GreedyPolicy),
        };
        let choice = always_exploit.select(&mut evaluator, &mut board, Color::Black, 0, &mut rng).unwrap();
        assert_eq!(choice.kind, PolicyKind::On);
    }

    #[test]
    fn epsilon_decay_schedule_shrinks_toward_zero() {
        let schedule = EpsilonSchedule::Decay(0.5);
        let early = schedule.probability(0);
        let later = schedule.probability(10);
        assert!(later < early);
    }

    #[test]
    fn gibbs_collapses_to_argmax_when_exponent_cap_exceeded() {
        let mut evaluator = material_evaluator(5);
        let mut board = SimpleBoard::new(5, 6.5);
        evaluator.reset(&board);
        let mut rng = rand::rng();
        let mut policy =
            GibbsPolicy { temperature: 0.0001, subtract_mean: false, allow_pass: false, exponent_cap: 1.0 };
        let choice = policy.select(&mut evaluator, &mut board, Color::Black, 0, &mut rng).unwrap();
        assert_eq!(choice.value, Some(1.0));
    }

    #[test]
    fn atari_policy_finds_the_capturing_move() {
        let mut board = SimpleBoard::new(5, 6.5);
        let lone = Point::from_xy(2, 2, 5);
        board.play(Move::Play(lone), Color::White).unwrap();
        for (x, y) in [(1, 2), (3, 2), (2, 1)] {
            board.play(Move::Play(Point::from_xy(x, y, 5)), Color::Black).unwrap();
            board.play(Move::Pass, Color::White).unwrap();
        }
        let mut filter = MoveFilter::new(5);
        filter.reset(&board);
        let atari = AtariPolicy;
        let (mv, stones) = atari.best_move(&mut board, &filter, Color::Black).unwrap();
        assert_eq!(mv, Move::Play(Point::from_xy(2, 3, 5)));
        assert_eq!(stones, 1);
    }

    #[test]
    fn priority_policy_falls_back_when_no_atari_exists() {
        let mut evaluator = material_evaluator(5);
        let mut board = SimpleBoard::new(5, 6.5);
        evaluator.reset(&board);
        let mut rng = rand::rng();
        let mut policy = PriorityPolicy { atari: AtariPolicy, fallback: Box::new(GreedyPolicy) };
        let choice = policy.select(&mut evaluator, &mut board, Color::Black, 0, &mut rng).unwrap();
        assert_eq!(choice.kind, PolicyKind::Best);
    }

    #[test]
    fn simulator_run_leaves_board_and_evaluator_untouched() {
        let mut evaluator = material_evaluator(5);
        let mut board = SimpleBoard::new(5, 6.5);
        evaluator.reset(&board);
        let before_eval = evaluator.eval();
        let mut rng = rand::rng();
        let simulator = Simulator { max_moves: 6 };
        simulator.run(&mut evaluator, &mut board, Color::Black, &mut rng);
        assert_eq!(evaluator.eval(), before_eval);
        assert_eq!(board.move_number(), 0);
    }

    #[test]
    fn two_stage_policy_switches_at_the_boundary() {
        let mut evaluator = material_evaluator(5);
        let mut board = SimpleBoard::new(5, 6.5);
        evaluator.reset(&board);
        let mut rng = rand::rng();
        let mut policy = TwoStagePolicy {
            schedule: SwitchSchedule::Fixed(2.0),
            episodes_played: 0,
            first: Box::new(GreedyPolicy),
            second: Box::new(RandomPolicy),
        };
        let before = policy.select(&mut evaluator, &mut board, Color::Black, 0, &mut rng).unwrap();
        assert_eq!(before.kind, PolicyKind::Best);
        let after = policy.select(&mut evaluator, &mut board, Color::Black, 3, &mut rng).unwrap();
        assert_eq!(after.kind, PolicyKind::On);
    }
}
