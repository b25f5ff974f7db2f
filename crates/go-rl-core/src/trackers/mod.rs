//! Trackers: the incremental machinery that keeps an [`ActiveSet`] in sync
//! with the board for every node of a feature-set DAG.
//!
//! Mirrors [`crate::features::FeatureSetArena`] node-for-node (one
//! [`TrackerNode`] per [`FeatureSetId`]), but a `Sum`/`Product` node may
//! share a child with another node elsewhere in the DAG. A single external
//! `execute`/`undo` call must still visit that shared child only once, so
//! each node carries a "tock": a counter stamped with the arena-wide `tick`
//! the last time it was touched. A child already stamped with the current
//! tick during this call is skipped on subsequent paths to it.

pub mod active_set;
pub mod local_shape_tracker;

use crate::board::GoBoard;
use crate::error::ConfigError;
use crate::features::local_shape::LocalShapeFeatureSet;
use crate::features::shared::ShareTable;
use crate::features::{FeatureSetArena, FeatureSetId, FeatureSetNode};
use crate::point::{Color, Point};

use active_set::{ActiveSet, Change};
use local_shape_tracker::LocalShapeTrackerState;

pub type TrackerId = usize;

#[derive(Debug, Clone)]
enum TrackerKind {
    LocalShape(LocalShapeTrackerState),
    Shared { child: TrackerId, table: ShareTable },
    Sum { children: Vec<TrackerId>, offsets: Vec<usize> },
    Product { a: TrackerId, b: TrackerId, size_a: usize },
}

#[derive(Debug, Clone)]
struct TrackerNode {
    kind: TrackerKind,
    active: ActiveSet,
    /// The tick this node was last visited on. A node reachable from the
    /// root along more than one path (a shared child of two `Sum`/`Product`
    /// parents) must still report the same change list to every parent, but
    /// must only recompute it once per external call — so a repeat visit
    /// within the same tick replays `last_changes` instead of redoing the
    /// work.
    last_tick: u64,
    last_changes: Vec<Change>,
    /// Snapshot of `active` taken the instant this node was first visited
    /// this tick, before its own update was applied. A `Product` parent
    /// needs its operand's pre-update state for the Cartesian derivative;
    /// reading `active` directly would see post-update state if some other
    /// parent reached the same child earlier in the same tick.
    last_before: ActiveSet,
    /// Saved active-set *and* kind snapshot for `set_mark`/`clear_mark`, used
    /// by search to explore and back out of a speculative line. A local-shape
    /// node's `TrackerKind` carries its own mutable `index[]`/undo-stack
    /// state, not just the externally visible `active` set — restoring
    /// `active` alone would leave that inner state pointed at whatever
    /// speculative line was last explored, so both must be snapshotted and
    /// restored together.
    mark: Option<(ActiveSet, TrackerKind)>,
}

/// Owns one [`TrackerNode`] per node of a [`FeatureSetArena`], in the same
/// index space (`TrackerId == FeatureSetId`).
#[derive(Debug, Clone)]
pub struct TrackerArena {
    nodes: Vec<TrackerNode>,
    tick: u64,
}

impl TrackerArena {
    /// Builds trackers for every node in `arena`. Node `i` of the arena maps
    /// to tracker `i`; nodes must therefore already be topologically ordered
    /// by construction (every child precedes its parent), which
    /// `FeatureSetArena::add_*` guarantees by construction order.
    pub fn build(arena: &FeatureSetArena) -> Result<TrackerArena, ConfigError> {
        let mut nodes = Vec::new();
        for id in 0..arena.len() {
            let active_size = arena.num_features(id);
            let kind = match arena.node(id) {
                FeatureSetNode::LocalShape(ls) => {
                    TrackerKind::LocalShape(LocalShapeTrackerState::build(ls.clone()))
                }
                FeatureSetNode::Shared { child, table, .. } => {
                    require_local_shape(arena, *child)?;
                    TrackerKind::Shared { child: *child, table: table.clone() }
                }
                FeatureSetNode::Sum { children, offsets, .. } => {
                    TrackerKind::Sum { children: children.clone(), offsets: offsets.clone() }
                }
                FeatureSetNode::Product { a, b, .. } => {
                    TrackerKind::Product { a: *a, b: *b, size_a: arena.num_features(*a) }
                }
            };
            nodes.push(TrackerNode {
                kind,
                active: ActiveSet::new(active_size),
                last_tick: 0,
                last_changes: Vec::new(),
                last_before: ActiveSet::new(active_size),
                mark: None,
            });
        }
        Ok(TrackerArena { nodes, tick: 0 })
    }

    pub fn active_set(&self, id: TrackerId) -> &ActiveSet {
        &self.nodes[id].active
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Every point whose feature window overlaps any of `points`, across
    /// every local-shape leaf in the DAG — used by the evaluator's per-move
    /// evaluation cache to know which cached deltas a move invalidates.
    pub fn touched_points(&self, points: &[Point]) -> Vec<Point> {
        let mut set = std::collections::HashSet::new();
        for node in &self.nodes {
            if let TrackerKind::LocalShape(state) = &node.kind {
                set.extend(state.touched_points(points));
            }
        }
        set.into_iter().collect()
    }

    /// `LocalShapeFeatureSet` a leaf tracker was built from, for callers that
    /// need window geometry (e.g. the dirty-point cache in the evaluator).
    pub fn local_shape(&self, id: TrackerId) -> Option<&LocalShapeFeatureSet> {
        match &self.nodes[id].kind {
            TrackerKind::LocalShape(state) => Some(&state.fs),
            _ => None,
        }
    }

    /// Resets every tracker to match `board`'s current position. Must be
    /// called once after construction (or after loading a new position)
    /// before `execute`/`undo` are used.
    pub fn reset(&mut self, root: TrackerId, board: &dyn GoBoard) {
        self.tick += 1;
        let tick = self.tick;
        self.reset_node(root, board, tick);
    }

    fn reset_node(&mut self, id: TrackerId, board: &dyn GoBoard, tick: u64) -> Vec<Change> {
        if self.nodes[id].last_tick == tick {
            return self.nodes[id].last_changes.clone();
        }
        self.nodes[id].last_tick = tick;
        // A reset must reproduce "recompute from scratch" (§3.8), not diff
        // against whatever this node held before — clear first so a second
        // reset on an unchanged board doesn't double every occurrence count.
        // `last_before` is taken *after* clearing so a `Product` parent's
        // Cartesian derivative sees an empty operand rather than stale state.
        self.nodes[id].active.clear();
        self.nodes[id].last_before = self.nodes[id].active.clone();
        let changes = match self.nodes[id].kind.clone() {
            TrackerKind::LocalShape(mut state) => {
                let changes = state.reset(board);
                self.nodes[id].kind = TrackerKind::LocalShape(state);
                changes
            }
            TrackerKind::Shared { child, table } => {
                let child_changes = self.reset_node(child, board, tick);
                remap_shared(&child_changes, &table)
            }
            TrackerKind::Sum { children, offsets } => {
                let mut out = Vec::new();
                for (child, offset) in children.iter().zip(offsets.iter()) {
                    let child_changes = self.reset_node(*child, board, tick);
                    out.extend(remap_sum(&child_changes, *offset));
                }
                out
            }
            TrackerKind::Product { a, b, size_a } => {
                let a_changes = self.reset_node(a, board, tick);
                let b_changes = self.reset_node(b, board, tick);
                let a_before = self.nodes[a].last_before.clone();
                let b_before = self.nodes[b].last_before.clone();
                self.product_delta(a, b, size_a, &a_before, &b_before, &a_changes, &b_changes)
            }
        };
        self.nodes[id].active.apply_all(&changes);
        self.nodes[id].last_changes = changes.clone();
        changes
    }

    /// Runs the incremental update for a stone of `color` played at `point`
    /// (with `captured` stones removed), propagating through the whole DAG
    /// rooted at `root`. Returns the active-set deltas for `root` only;
    /// every descendant's [`ActiveSet`] is updated as a side effect.
    pub fn execute(
        &mut self,
        root: TrackerId,
        point: Point,
        color: Color,
        captured: &[Point],
    ) -> Vec<Change> {
        self.tick += 1;
        let tick = self.tick;
        self.execute_node(root, point, color, captured, tick)
    }

    fn execute_node(
        &mut self,
        id: TrackerId,
        point: Point,
        color: Color,
        captured: &[Point],
        tick: u64,
    ) -> Vec<Change> {
        if self.nodes[id].last_tick == tick {
            return self.nodes[id].last_changes.clone();
        }
        self.nodes[id].last_tick = tick;
        self.nodes[id].last_before = self.nodes[id].active.clone();
        let changes = match self.nodes[id].kind.clone() {
            TrackerKind::LocalShape(mut state) => {
                let changes = state.execute(point, color, captured, true);
                self.nodes[id].kind = TrackerKind::LocalShape(state);
                changes
            }
            TrackerKind::Shared { child, table } => {
                let child_changes = self.execute_node(child, point, color, captured, tick);
                remap_shared(&child_changes, &table)
            }
            TrackerKind::Sum { children, offsets } => {
                let mut out = Vec::new();
                for (child, offset) in children.iter().zip(offsets.iter()) {
                    let child_changes = self.execute_node(*child, point, color, captured, tick);
                    out.extend(remap_sum(&child_changes, *offset));
                }
                out
            }
            TrackerKind::Product { a, b, size_a } => {
                let a_changes = self.execute_node(a, point, color, captured, tick);
                let b_changes = self.execute_node(b, point, color, captured, tick);
                let a_before = self.nodes[a].last_before.clone();
                let b_before = self.nodes[b].last_before.clone();
                self.product_delta(a, b, size_a, &a_before, &b_before, &a_changes, &b_changes)
            }
        };
        self.nodes[id].active.apply_all(&changes);
        self.nodes[id].last_changes = changes.clone();
        changes
    }

    /// Reverses the most recent `execute` through the whole DAG.
    pub fn undo(&mut self, root: TrackerId) -> Vec<Change> {
        self.tick += 1;
        let tick = self.tick;
        self.undo_node(root, tick)
    }

    fn undo_node(&mut self, id: TrackerId, tick: u64) -> Vec<Change> {
        if self.nodes[id].last_tick == tick {
            return self.nodes[id].last_changes.clone();
        }
        self.nodes[id].last_tick = tick;
        self.nodes[id].last_before = self.nodes[id].active.clone();
        let changes = match self.nodes[id].kind.clone() {
            TrackerKind::LocalShape(mut state) => {
                let before = state.clone();
                state.undo();
                let changes = diff_local_shape(&before, &state);
                self.nodes[id].kind = TrackerKind::LocalShape(state);
                changes
            }
            TrackerKind::Shared { child, table } => {
                let child_changes = self.undo_node(child, tick);
                remap_shared(&child_changes, &table)
            }
            TrackerKind::Sum { children, offsets } => {
                let mut out = Vec::new();
                for (child, offset) in children.iter().zip(offsets.iter()) {
                    let child_changes = self.undo_node(*child, tick);
                    out.extend(remap_sum(&child_changes, *offset));
                }
                out
            }
            TrackerKind::Product { a, b, size_a } => {
                let a_changes = self.undo_node(a, tick);
                let b_changes = self.undo_node(b, tick);
                let a_before = self.nodes[a].last_before.clone();
                let b_before = self.nodes[b].last_before.clone();
                self.product_delta(a, b, size_a, &a_before, &b_before, &a_changes, &b_changes)
            }
        };
        self.nodes[id].active.apply_all(&changes);
        self.nodes[id].last_changes = changes.clone();
        changes
    }

    /// Cartesian derivative for a product node, from explicit before-states
    /// and child deltas: `d(A*B) = A_active . dB + dA . B_active + dA . dB`.
    /// The product feature-set's dense index is `ia + na*ib`, so a change at
    /// `(ia, ib)` lands at that single slot with `slot == feature_index`.
    fn product_delta(
        &self,
        _a: TrackerId,
        _b: TrackerId,
        size_a: usize,
        a_before: &ActiveSet,
        b_before: &ActiveSet,
        a_changes: &[Change],
        b_changes: &[Change],
    ) -> Vec<Change> {
        let mut out = Vec::new();
        let push = |out: &mut Vec<Change>, ia: usize, ib: usize, delta: i32| {
            if delta == 0 {
                return;
            }
            let slot = (ib * size_a + ia) as u32;
            out.push(Change { slot, feature_index: slot, delta });
        };
        for (_, a_entry) in a_before.iter() {
            for &bc in b_changes {
                push(&mut out, a_entry.feature_index as usize, bc.feature_index as usize, bc.delta * a_entry.occurrences);
            }
        }
        for &ac in a_changes {
            for (_, b_entry) in b_before.iter() {
                push(&mut out, ac.feature_index as usize, b_entry.feature_index as usize, ac.delta * b_entry.occurrences);
            }
        }
        for &ac in a_changes {
            for &bc in b_changes {
                push(&mut out, ac.feature_index as usize, bc.feature_index as usize, ac.delta * bc.delta);
            }
        }
        out
    }

    pub fn set_mark(&mut self, root: TrackerId) {
        self.tick += 1;
        let tick = self.tick;
        self.set_mark_node(root, tick);
    }

    fn set_mark_node(&mut self, id: TrackerId, tick: u64) {
        if self.nodes[id].last_tick == tick {
            return;
        }
        self.nodes[id].last_tick = tick;
        self.nodes[id].mark = Some((self.nodes[id].active.clone(), self.nodes[id].kind.clone()));
        let children = self.children_of(id);
        for child in children {
            self.set_mark_node(child, tick);
        }
    }

    pub fn clear_mark(&mut self, root: TrackerId) {
        self.tick += 1;
        let tick = self.tick;
        self.clear_mark_node(root, tick);
    }

    fn clear_mark_node(&mut self, id: TrackerId, tick: u64) {
        if self.nodes[id].last_tick == tick {
            return;
        }
        self.nodes[id].last_tick = tick;
        if let Some((active, kind)) = self.nodes[id].mark.take() {
            self.nodes[id].active = active;
            self.nodes[id].kind = kind;
        }
        let children = self.children_of(id);
        for child in children {
            self.clear_mark_node(child, tick);
        }
    }

    /// Runs `f` with this tracker marked at `root`, clearing the mark back
    /// afterwards regardless of which value `f` returns — the caller never
    /// has to remember to pair `set_mark`/`clear_mark` itself. Does not
    /// protect against a panic unwinding through `f`; see DESIGN.md.
    pub fn with_mark<R>(&mut self, root: TrackerId, f: impl FnOnce(&mut TrackerArena) -> R) -> R {
        self.set_mark(root);
        let result = f(self);
        self.clear_mark(root);
        result
    }

    fn children_of(&self, id: TrackerId) -> Vec<TrackerId> {
        match &self.nodes[id].kind {
            TrackerKind::LocalShape(_) => Vec::new(),
            TrackerKind::Shared { child, .. } => vec![*child],
            TrackerKind::Sum { children, .. } => children.clone(),
            TrackerKind::Product { a, b, .. } => vec![*a, *b],
        }
    }
}

fn remap_shared(changes: &[Change], table: &ShareTable) -> Vec<Change> {
    let mut out = Vec::with_capacity(changes.len());
    for &c in changes {
        let (out_index, sign) = table.lookup[c.feature_index as usize];
        if sign == 0 {
            continue;
        }
        out.push(Change {
            slot: out_index,
            feature_index: out_index,
            delta: c.delta * sign as i32,
        });
    }
    out
}

fn remap_sum(changes: &[Change], offset: usize) -> Vec<Change> {
    changes
        .iter()
        .map(|c| Change {
            slot: c.slot + offset as u32,
            feature_index: c.feature_index + offset as u32,
            delta: c.delta,
        })
        .collect()
}

/// `LocalShapeTrackerState::undo` doesn't report a change list of its own,
/// so the DAG layer recovers one by diffing the anchor snapshots before and
/// after.
fn diff_local_shape(
    before: &LocalShapeTrackerState,
    after: &LocalShapeTrackerState,
) -> Vec<Change> {
    let mut out = Vec::new();
    for anchor in 0..before.active_size() {
        let old = before.peek(anchor);
        let new = after.peek(anchor);
        if old != new {
            out.push(Change { slot: anchor as u32, feature_index: old, delta: -1 });
            out.push(Change { slot: anchor as u32, feature_index: new, delta: 1 });
        }
    }
    out
}

fn require_local_shape(arena: &FeatureSetArena, id: FeatureSetId) -> Result<(), ConfigError> {
    match arena.node(id) {
        FeatureSetNode::LocalShape(_) => Ok(()),
        _ => Err(ConfigError::InvalidValue {
            setting: "shared.child",
            reason: "shared feature sets may only wrap a local-shape child".to_string(),
        }),
    }
}
