//! Incremental tracker for a [`LocalShapeFeatureSet`].
//!
//! Precomputes a successor table (`(feature_index, local_move) -> new
//! feature_index`) and a stone -> affected-anchors table at construction, so
//! that playing or removing a stone touches only the handful of anchors
//! whose window contains that point.

use std::rc::Rc;

use crate::board::{Disc, GoBoard};
use crate::features::local_shape::{color_code, digit_of, LocalShapeFeatureSet};
use crate::point::{Color, Point};
use crate::trackers::active_set::Change;

/// Sentinel successor value for an incompatible local move (writing empty
/// on empty, or a stone on a stone). Never produced by a well-formed caller.
pub const INVALID: u32 = u32::MAX;

/// Precomputed, never-mutated tables shared (via `Rc`) across clones of a
/// [`LocalShapeTrackerState`] — cloning the state (needed to thread it
/// through [`crate::trackers::TrackerArena`]'s node storage) must not
/// re-copy these on every move.
#[derive(Debug)]
struct Tables {
    /// `successor[idx * (w*h*3) + local_move]`.
    successor: Vec<u32>,
    /// Per-feature "is this the empty shape" bit, as persisted in the
    /// on-disk successor cache (see `persistence::successor_cache`).
    ignore_bits: Vec<bool>,
    /// Per-point: which `(anchor, lx, ly)` windows contain that point.
    anchor_membership: Vec<Vec<(usize, u8, u8)>>,
}

#[derive(Debug, Clone)]
pub struct LocalShapeTrackerState {
    pub fs: LocalShapeFeatureSet,
    tables: Rc<Tables>,
    index: Vec<u32>,
    mark_index: Option<Vec<u32>>,
    changes: Vec<(u64, usize, u32)>,
    step: u64,
}

impl LocalShapeTrackerState {
    pub fn build(fs: LocalShapeFeatureSet) -> LocalShapeTrackerState {
        let (successor, ignore_bits) = build_successor_table(&fs);
        let anchor_membership = build_anchor_membership(&fs);
        let active_size = fs.xnum * fs.ynum;
        LocalShapeTrackerState {
            fs,
            tables: Rc::new(Tables { successor, ignore_bits, anchor_membership }),
            index: vec![0u32; active_size],
            mark_index: None,
            changes: Vec::new(),
            step: 0,
        }
    }

    /// Rebuilds from precomputed tables (used when loading from the
    /// on-disk successor cache, see §6.4).
    pub fn from_parts(
        fs: LocalShapeFeatureSet,
        successor: Vec<u32>,
        ignore_bits: Vec<bool>,
    ) -> LocalShapeTrackerState {
        let anchor_membership = build_anchor_membership(&fs);
        let active_size = fs.xnum * fs.ynum;
        LocalShapeTrackerState {
            fs,
            tables: Rc::new(Tables { successor, ignore_bits, anchor_membership }),
            index: vec![0u32; active_size],
            mark_index: None,
            changes: Vec::new(),
            step: 0,
        }
    }

    pub fn successor_table(&self) -> &[u32] {
        &self.tables.successor
    }

    pub fn ignore_bits(&self) -> &[bool] {
        &self.tables.ignore_bits
    }

    pub fn active_size(&self) -> usize {
        self.fs.xnum * self.fs.ynum
    }

    /// Current feature index held at anchor slot `anchor`, for diffing two
    /// snapshots of the same tracker (used by undo propagation in the
    /// tracker DAG).
    pub fn peek(&self, anchor: usize) -> u32 {
        self.index[anchor]
    }

    fn successor_of(&self, idx: u32, lx: usize, ly: usize, color: Disc) -> u32 {
        let local_move = (ly * self.fs.w + lx) * 3 + digit_of(color) as usize;
        let entry = self.tables.successor[idx as usize * (self.fs.w * self.fs.h * 3) + local_move];
        debug_assert_ne!(entry, INVALID, "board/tracker desynchronised: invalid local move replayed");
        entry
    }

    pub fn reset(&mut self, board: &dyn GoBoard) -> Vec<Change> {
        self.changes.clear();
        self.step = 0;
        let mut out = Vec::with_capacity(self.active_size());
        for ay in 0..self.fs.ynum {
            for ax in 0..self.fs.xnum {
                let anchor = self.fs.anchor_index(ax, ay);
                let idx = self.fs.read_from_board(&|p| board.disc_at(p), ax, ay) as u32;
                self.index[anchor] = idx;
                out.push(Change { slot: anchor as u32, feature_index: idx, delta: 1 });
            }
        }
        out
    }

    fn update_stone(&mut self, point: Point, color: Disc, committed: bool, out: &mut Vec<Change>) {
        let entries = self.tables.anchor_membership[point.index()].clone();
        for (anchor, lx, ly) in entries {
            let old = self.index[anchor];
            if committed {
                self.changes.push((self.step, anchor, old));
            }
            out.push(Change { slot: anchor as u32, feature_index: old, delta: -1 });
            let new = self.successor_of(old, lx as usize, ly as usize, color);
            out.push(Change { slot: anchor as u32, feature_index: new, delta: 1 });
            if committed {
                self.index[anchor] = new;
            }
        }
    }

    /// Runs the incremental update for playing `color` at `point`, then
    /// removing `captured` stones. `committed` selects whether the
    /// persistent `index[]` (and hence future `reset`/`verify` agreement)
    /// is actually mutated, or whether this is a trial evaluation.
    pub fn execute(
        &mut self,
        point: Point,
        color: Color,
        captured: &[Point],
        committed: bool,
    ) -> Vec<Change> {
        let mut out = Vec::new();
        self.update_stone(point, Disc::of(color), committed, &mut out);
        for &c in captured {
            self.update_stone(c, Disc::Empty, committed, &mut out);
        }
        if committed {
            self.step += 1;
        }
        out
    }

    pub fn undo(&mut self) {
        if self.step == 0 {
            return;
        }
        let target = self.step - 1;
        while let Some(&(step, anchor, prev)) = self.changes.last() {
            if step != target {
                break;
            }
            self.changes.pop();
            self.index[anchor] = prev;
        }
        self.step -= 1;
    }

    /// Recomputes every anchor from the board and compares against the
    /// incrementally maintained `index[]`. Debug/test tool only.
    pub fn verify(&self, board: &dyn GoBoard) -> bool {
        for ay in 0..self.fs.ynum {
            for ax in 0..self.fs.xnum {
                let anchor = self.fs.anchor_index(ax, ay);
                let computed = self.fs.read_from_board(&|p| board.disc_at(p), ax, ay) as u32;
                if computed != self.index[anchor] {
                    return false;
                }
            }
        }
        true
    }

    pub fn set_mark(&mut self) {
        self.mark_index = Some(self.index.clone());
    }

    pub fn clear_mark(&mut self) -> Vec<Change> {
        let mark = self.mark_index.take().expect("clear_mark called without set_mark");
        let mut out = Vec::new();
        for anchor in 0..self.index.len() {
            if self.index[anchor] != mark[anchor] {
                out.push(Change { slot: anchor as u32, feature_index: self.index[anchor], delta: -1 });
                out.push(Change { slot: anchor as u32, feature_index: mark[anchor], delta: 1 });
                self.index[anchor] = mark[anchor];
            }
        }
        out
    }

    /// All board points whose anchor window overlaps the window of `point`
    /// (i.e. could share a feature with it) — used for the evaluator's
    /// per-move dirty-set cache (§4.7).
    pub fn touched_points(&self, points: &[Point]) -> Vec<Point> {
        let mut anchors = std::collections::HashSet::new();
        for &p in points {
            for &(anchor, _, _) in &self.tables.anchor_membership[p.index()] {
                anchors.insert(anchor);
            }
        }
        let mut out = Vec::new();
        for &anchor in &anchors {
            let (ax, ay) = self.fs.anchor_xy(anchor);
            for ly in 0..self.fs.h {
                for lx in 0..self.fs.w {
                    out.push(Point::from_xy(ax + lx, ay + ly, self.fs.s));
                }
            }
        }
        out
    }
}

fn build_successor_table(fs: &LocalShapeFeatureSet) -> (Vec<u32>, Vec<bool>) {
    let n = fs.num_features();
    let moves_per_feature = fs.w * fs.h * 3;
    let mut successor = vec![INVALID; n * moves_per_feature];
    let mut ignore_bits = vec![false; n];
    for idx in 0..n {
        ignore_bits[idx] = fs.is_empty_shape(idx);
        for ly in 0..fs.h {
            for lx in 0..fs.w {
                for color in [Disc::Empty, Disc::Black, Disc::White] {
                    let local_move = (ly * fs.w + lx) * 3 + digit_of(color) as usize;
                    if let Some(next) = fs.local_move(idx, lx, ly, color) {
                        successor[idx * moves_per_feature + local_move] = next as u32;
                    }
                }
            }
        }
    }
    (successor, ignore_bits)
}

fn build_anchor_membership(fs: &LocalShapeFeatureSet) -> Vec<Vec<(usize, u8, u8)>> {
    let mut table = vec![Vec::new(); fs.s * fs.s];
    for ay in 0..fs.ynum {
        for ax in 0..fs.xnum {
            let anchor = fs.anchor_index(ax, ay);
            for ly in 0..fs.h {
                for lx in 0..fs.w {
                    let p = Point::from_xy(ax + lx, ay + ly, fs.s);
                    table[p.index()].push((anchor, lx as u8, ly as u8));
                }
            }
        }
    }
    table
}

#[inline]
pub fn color_local_move_index(lx: usize, ly: usize, w: usize, color: Color) -> usize {
    (ly * w + lx) * 3 + color_code(color) as usize
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::SimpleBoard;
    use crate::point::Move;

    #[test]
    fn scenario_1x1_tracker_on_5x5() {
        let fs = LocalShapeFeatureSet::new(1, 1, 5);
        let mut tracker = LocalShapeTrackerState::build(fs);
        let mut board = SimpleBoard::new(5, 6.5);

        let reset_changes = tracker.reset(&board);
        assert_eq!(reset_changes.len(), 25);
        assert!(tracker.verify(&board));

        let d3 = Point::from_coord("D3", 5).unwrap();
        board.play(Move::Play(d3), Color::Black).unwrap();
        let changes = tracker.execute(d3, Color::Black, &[], true);
        assert_eq!(changes.len(), 2);
        assert_eq!(changes[0].delta, -1);
        assert_eq!(changes[1].delta, 1);
        assert!(tracker.verify(&board));

        let e3 = Point::from_coord("E3", 5).unwrap();
        board.play(Move::Play(e3), Color::White).unwrap();
        let changes = tracker.execute(e3, Color::White, &[], true);
        assert_eq!(changes.len(), 2);
        assert!(tracker.verify(&board));

        board.undo().unwrap();
        tracker.undo();
        board.undo().unwrap();
        tracker.undo();
        assert!(tracker.verify(&board));
        for ay in 0..tracker.fs.ynum {
            for ax in 0..tracker.fs.xnum {
                let anchor = tracker.fs.anchor_index(ax, ay);
                assert_eq!(tracker.index[anchor], tracker.fs.empty_at(ax, ay) as u32);
            }
        }
    }

    #[test]
    fn mark_and_clear_mark_restores_state() {
        let fs = LocalShapeFeatureSet::new(1, 1, 5);
        let mut tracker = LocalShapeTrackerState::build(fs);
        let board = SimpleBoard::new(5, 6.5);
        tracker.reset(&board);
        tracker.set_mark();

        let mut board2 = SimpleBoard::new(5, 6.5);
        let p = Point::from_xy(2, 2, 5);
        board2.play(Move::Play(p), Color::Black).unwrap();
        tracker.execute(p, Color::Black, &[], true);
        assert!(!tracker.verify(&board));

        tracker.clear_mark();
        assert!(tracker.verify(&board));
    }
}
