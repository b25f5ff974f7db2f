//! The linear evaluator: drives a tracker, keeps a running dot-product
//! value, and scores candidate moves for the policies in [`crate::policy`].

use std::collections::HashMap;

use rand::Rng;

use crate::board::GoBoard;
use crate::error::RuntimeError;
use crate::move_filter::{orthogonal_neighbors, MoveFilter};
use crate::point::{Color, Move, Point};
use crate::trackers::active_set::Change;
use crate::trackers::{TrackerArena, TrackerId};
use crate::weight::WeightSet;

/// Owns one root tracker, a weight set, and the move filter it scores
/// candidates against. `eval` is always `Σ occurrences * weight` over the
/// root tracker's active set, maintained incrementally rather than
/// recomputed from scratch except on [`Evaluator::reset`].
pub struct Evaluator {
    pub trackers: TrackerArena,
    pub weights: WeightSet,
    pub filter: MoveFilter,
    root: TrackerId,
    eval: f32,
    /// Per-(point, color) cached `evaluate_move` delta. A point's entries
    /// for both colors are dropped together whenever that point (or a
    /// played/captured point's local-shape window) changes, so membership
    /// in this map *is* the "dirty bit" from §4.7 — there is no separate
    /// flag to keep in sync with it.
    cache: HashMap<(Point, Color), f32>,
    /// Whether the most recently committed ply (for `take_back_undo`) was an
    /// on-board play (needing a matching tracker/filter undo) or a pass.
    played_log: Vec<bool>,
}

impl Evaluator {
    pub fn new(trackers: TrackerArena, weights: WeightSet, filter: MoveFilter, root: TrackerId) -> Evaluator {
        Evaluator { trackers, weights, filter, root, eval: 0.0, cache: HashMap::new(), played_log: Vec::new() }
    }

    pub fn root(&self) -> TrackerId {
        self.root
    }

    pub fn eval(&self) -> f32 {
        self.eval
    }

    fn weighted_sum(&self, changes: &[Change]) -> f32 {
        changes.iter().map(|c| c.delta as f32 * self.weights.value_of(c.feature_index as usize)).sum()
    }

    /// Rebuilds tracker and move-filter state from scratch and recomputes
    /// `eval` as the dot product over the freshly reset active set.
    pub fn reset(&mut self, board: &dyn GoBoard) {
        let changes = self.trackers.reset(self.root, board);
        self.filter.reset(board);
        self.eval = self.weighted_sum(&changes);
        self.cache.clear();
        self.played_log.clear();
    }

    /// Incremental update for a stone of `color` already placed at `point`
    /// on `board`, with `captured` removed. `real` forces a full reset
    /// instead (used when the caller wants to resynchronise from the board
    /// rather than trust the incremental path, e.g. after loading a new
    /// position).
    fn execute(&mut self, board: &dyn GoBoard, point: Point, color: Color, captured: &[Point], real: bool) {
        if real {
            self.reset(board);
            return;
        }
        let changes = self.trackers.execute(self.root, point, color, captured);
        self.eval += self.weighted_sum(&changes);
        self.filter.execute(point, captured);
        self.invalidate(board, point, captured);
    }

    /// Plays `mv` as `color` on `board` and updates the evaluator to match.
    pub fn play_execute(&mut self, board: &mut dyn GoBoard, mv: Move, color: Color) -> Result<Vec<Point>, RuntimeError> {
        let captured = board.play(mv, color)?;
        if let Move::Play(p) = mv {
            self.execute(board, p, color, &captured, false);
            self.played_log.push(true);
        } else {
            self.played_log.push(false);
        }
        Ok(captured)
    }

    /// Reverses the most recent [`Evaluator::play_execute`], board included.
    pub fn take_back_undo(&mut self, board: &mut dyn GoBoard) -> Result<(), RuntimeError> {
        let was_play = self.played_log.pop().ok_or(RuntimeError::NothingToUndo)?;
        if was_play {
            let changes = self.trackers.undo(self.root);
            self.eval += self.weighted_sum(&changes);
            self.filter.undo();
        }
        board.undo()?;
        // A point's window could be clean under the post-undo position but
        // dirty under the position the cache was built against (or vice
        // versa); the cheap, always-correct move is to drop everything.
        self.cache.clear();
        Ok(())
    }

    /// Scores `mv` as `color` without committing: plays it on `board`,
    /// measures the tracker delta via a scoped mark/clear-mark round trip
    /// (§9 design note — this is the "evaluate" half of §4.5's tracker
    /// interface, reusing `with_mark` rather than threading a separate
    /// uncommitted code path through every tracker kind), then undoes the
    /// board play. Returns the post-move `eval` a real `execute` would
    /// produce, from cache if a prior call already computed it and nothing
    /// has touched that point since.
    pub fn evaluate_move(&mut self, board: &mut dyn GoBoard, mv: Move, color: Color) -> Result<f32, RuntimeError> {
        let p = match mv {
            Move::Play(p) => p,
            Move::Pass | Move::Resign => return Ok(self.eval),
        };
        if let Some(&delta) = self.cache.get(&(p, color)) {
            return Ok(self.eval + delta);
        }
        let captured = board.play(mv, color)?;
        let root = self.root;
        let changes = self.trackers.with_mark(root, |t| t.execute(root, p, color, &captured));
        let delta = self.weighted_sum(&changes);
        board.undo()?;
        self.cache.insert((p, color), delta);
        Ok(self.eval + delta)
    }

    /// Marks every cache entry touched by a just-committed move dirty: every
    /// point whose local-shape window overlaps the played point or a
    /// captured point, plus — for each enemy block left in atari by the
    /// move — that block's one remaining liberty (§4.7; a move landing
    /// *there* next would see a different successor than it would have a
    /// ply earlier).
    fn invalidate(&mut self, board: &dyn GoBoard, played: Point, captured: &[Point]) {
        let mut touched = Vec::with_capacity(1 + captured.len());
        touched.push(played);
        touched.extend_from_slice(captured);
        for p in self.trackers.touched_points(&touched) {
            self.cache.remove(&(p, Color::Black));
            self.cache.remove(&(p, Color::White));
        }
        for n in orthogonal_neighbors(played, board.size()) {
            if board.occupied(n) && board.liberties_of(n) == 1 {
                for stone in board.block_points(n) {
                    for lib in orthogonal_neighbors(stone, board.size()) {
                        if !board.occupied(lib) {
                            self.cache.remove(&(lib, Color::Black));
                            self.cache.remove(&(lib, Color::White));
                        }
                    }
                }
            }
        }
    }

    /// Iterates the move filter, scoring every candidate with
    /// [`Evaluator::evaluate_move`], and returns the argmax for black /
    /// argmin for white, breaking ties uniformly at random. `None` if the
    /// filter has no candidates (caller decides whether to fall back to
    /// pass). A vacant point the filter still lists but that is not
    /// actually playable (suicide, ko) is skipped rather than aborting the
    /// whole scan — the filter only tracks vacancy, not legality.
    pub fn find_best(&mut self, board: &mut dyn GoBoard, color: Color, rng: &mut impl Rng) -> Option<(Move, f32)> {
        let candidates: Vec<Point> = self.filter.iter().collect();
        let sign = color.sign();
        let mut best: Option<(Move, f32)> = None;
        let mut ties = 1u32;
        for p in candidates {
            let Ok(score) = self.evaluate_move(board, Move::Play(p), color) else { continue };
            match &best {
                None => best = Some((Move::Play(p), score)),
                Some((_, best_score)) => {
                    let challenger = score * sign;
                    let incumbent = *best_score * sign;
                    if challenger > incumbent {
                        best = Some((Move::Play(p), score));
                        ties = 1;
                    } else if challenger == incumbent {
                        ties += 1;
                        if rng.random_range(0..ties) == 0 {
                            best = Some((Move::Play(p), score));
                        }
                    }
                }
            }
        }
        best
    }
}

/// Scores every move in `moves` once and keeps them sorted best-first for
/// `color` (descending for black, ascending for white) — used by the
/// two-stage and priority policies to ask "what's the n-th best move"
/// without re-evaluating.
pub struct MoveSorter {
    scored: Vec<(Move, f32)>,
}

impl MoveSorter {
    pub fn build(evaluator: &mut Evaluator, board: &mut dyn GoBoard, color: Color, moves: impl Iterator<Item = Move>) -> MoveSorter {
        let mut scored = Vec::new();
        for mv in moves {
            if let Ok(score) = evaluator.evaluate_move(board, mv, color) {
                scored.push((mv, score));
            }
        }
        let sign = color.sign();
        scored.sort_by(|a, b| (b.1 * sign).partial_cmp(&(a.1 * sign)).unwrap_or(std::cmp::Ordering::Equal));
        MoveSorter { scored }
    }

    pub fn len(&self) -> usize {
        self.scored.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scored.is_empty()
    }

    pub fn best(&self) -> Option<(Move, f32)> {
        self.scored.first().copied()
    }

    pub fn rank(&self, n: usize) -> Option<(Move, f32)> {
        self.scored.get(n).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::SimpleBoard;
    use crate::features::FeatureSetArena;
    use crate::trackers::TrackerArena as Trackers;

    fn material_evaluator(size: usize) -> Evaluator {
        let mut arena = FeatureSetArena::new();
        let ls = arena.add_local_shape(1, 1, size);
        let shared = arena.add_shared(ls, crate::features::shared::ShareKind::Ci, true, true).unwrap();
        let trackers = Trackers::build(&arena).unwrap();
        let mut weights = WeightSet::new("material", arena.num_features(shared), 0.0);
        weights.get_mut(0).value = 1.0; // the single CI-shared output: +1 black, -1 white
        let filter = MoveFilter::new(size);
        Evaluator::new(trackers, weights, filter, shared)
    }

    #[test]
    fn eval_identity_holds_after_reset() {
        let mut evaluator = material_evaluator(5);
        let board = SimpleBoard::new(5, 6.5);
        evaluator.reset(&board);
        assert_eq!(evaluator.eval(), 0.0);
    }

    #[test]
    fn play_execute_and_take_back_undo_round_trip_eval() {
        let mut evaluator = material_evaluator(5);
        let mut board = SimpleBoard::new(5, 6.5);
        evaluator.reset(&board);
        let before = evaluator.eval();

        evaluator.play_execute(&mut board, Move::Play(Point::from_xy(2, 2, 5)), Color::Black).unwrap();
        assert_eq!(evaluator.eval(), before + 1.0);

        evaluator.take_back_undo(&mut board).unwrap();
        assert_eq!(evaluator.eval(), before);
    }

    #[test]
    fn evaluate_move_does_not_commit() {
        let mut evaluator = material_evaluator(5);
        let mut board = SimpleBoard::new(5, 6.5);
        evaluator.reset(&board);
        let before = evaluator.eval();

        let p = Point::from_xy(2, 2, 5);
        let scored = evaluator.evaluate_move(&mut board, Move::Play(p), Color::Black).unwrap();
        assert_eq!(scored, before + 1.0);
        // Not committed: board and evaluator both unchanged.
        assert!(!board.occupied(p));
        assert_eq!(evaluator.eval(), before);
    }

    #[test]
    fn find_best_prefers_black_material_gain() {
        let mut evaluator = material_evaluator(5);
        let mut board = SimpleBoard::new(5, 6.5);
        evaluator.reset(&board);
        let mut rng = rand::rng();
        let (mv, score) = evaluator.find_best(&mut board, Color::Black, &mut rng).unwrap();
        assert!(mv.is_play());
        assert_eq!(score, evaluator.eval() + 1.0);
    }
}
