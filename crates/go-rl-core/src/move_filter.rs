//! Incrementally maintained vacant-point set, plus predicates used to narrow
//! it for policies and simulators (eye detection, proximity to the last
//! move, arbitrary point sets, and boolean combinators over those).

use std::collections::HashSet;

use crate::board::GoBoard;
use crate::point::{Color, Point};

/// Vacant points on the board, removable/insertable in O(1) via a by-point
/// position array; removal swaps the target to the end and pops, so
/// iteration order is not stable across `execute`/`undo`.
#[derive(Debug, Clone)]
pub struct MoveFilter {
    size: usize,
    points: Vec<Point>,
    position: Vec<Option<u32>>,
    history: Vec<(Point, Vec<Point>)>,
}

impl MoveFilter {
    pub fn new(size: usize) -> MoveFilter {
        MoveFilter { size, points: Vec::new(), position: vec![None; size * size], history: Vec::new() }
    }

    /// Rebuilds the vacant set from the board's current position.
    pub fn reset(&mut self, board: &dyn GoBoard) {
        self.points.clear();
        self.position.iter_mut().for_each(|p| *p = None);
        self.history.clear();
        for y in 0..self.size {
            for x in 0..self.size {
                let p = Point::from_xy(x, y, self.size);
                if !board.occupied(p) {
                    self.insert(p);
                }
            }
        }
    }

    fn insert(&mut self, p: Point) {
        if self.position[p.index()].is_some() {
            return;
        }
        self.position[p.index()] = Some(self.points.len() as u32);
        self.points.push(p);
    }

    fn remove(&mut self, p: Point) {
        let idx = self.position[p.index()].take().expect("removing a point not in the vacant set") as usize;
        let last = self.points.len() - 1;
        self.points.swap(idx, last);
        self.points.pop();
        if idx < self.points.len() {
            let moved = self.points[idx];
            self.position[moved.index()] = Some(idx as u32);
        }
    }

    /// Removes the played point, re-inserts each captured point.
    pub fn execute(&mut self, played: Point, captured: &[Point]) {
        self.remove(played);
        for &c in captured {
            self.insert(c);
        }
        self.history.push((played, captured.to_vec()));
    }

    /// Reverses the most recent `execute`.
    pub fn undo(&mut self) {
        let (played, captured) = self.history.pop().expect("undo called with no matching execute");
        for &c in &captured {
            self.remove(c);
        }
        self.insert(played);
    }

    pub fn contains(&self, p: Point) -> bool {
        self.position[p.index()].is_some()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = Point> + '_ {
        self.points.iter().copied()
    }
}

pub(crate) fn orthogonal_neighbors(p: Point, size: usize) -> arrayvec::ArrayVec<Point, 4> {
    let (x, y) = p.xy(size);
    let mut out = arrayvec::ArrayVec::new();
    if x > 0 {
        out.push(Point::from_xy(x - 1, y, size));
    }
    if x + 1 < size {
        out.push(Point::from_xy(x + 1, y, size));
    }
    if y > 0 {
        out.push(Point::from_xy(x, y - 1, size));
    }
    if y + 1 < size {
        out.push(Point::from_xy(x, y + 1, size));
    }
    out
}

fn diagonal_neighbors(p: Point, size: usize) -> arrayvec::ArrayVec<Point, 4> {
    let (x, y) = p.xy(size);
    let mut out = arrayvec::ArrayVec::new();
    let xs = [x.checked_sub(1), Some(x + 1).filter(|&v| v < size)];
    let ys = [y.checked_sub(1), Some(y + 1).filter(|&v| v < size)];
    for ox in xs.into_iter().flatten() {
        for oy in ys.into_iter().flatten() {
            out.push(Point::from_xy(ox, oy, size));
        }
    }
    out
}

/// A point is an eye for `color` if every orthogonal neighbour (and the
/// point itself is vacant) is a `color` stone or the board edge.
pub fn is_single_eye(board: &dyn GoBoard, p: Point, color: Color) -> bool {
    if board.occupied(p) {
        return false;
    }
    orthogonal_neighbors(p, board.size())
        .iter()
        .all(|&n| board.disc_at(n).color() == Some(color))
}

/// A single eye that also rejects the false-eye case: too many diagonal
/// points controlled by the opponent. Corner points require all diagonals
/// friendly, edge points allow none opposing, and interior points allow at
/// most one.
pub fn is_simple_eye(board: &dyn GoBoard, p: Point, color: Color) -> bool {
    if !is_single_eye(board, p, color) {
        return false;
    }
    let diagonals = diagonal_neighbors(p, board.size());
    let opponent = color.opposite();
    let enemy_diagonals = diagonals.iter().filter(|&&d| board.disc_at(d).color() == Some(opponent)).count();
    let max_enemy_diagonals = if diagonals.len() == 4 { 1 } else { 0 };
    enemy_diagonals <= max_enemy_diagonals
}

fn manhattan_distance(a: Point, b: Point, size: usize) -> usize {
    let (ax, ay) = a.xy(size);
    let (bx, by) = b.xy(size);
    ax.abs_diff(bx) + ay.abs_diff(by)
}

/// Narrows a candidate list to points other than `p` within a filter's
/// predicate; used to compose the building blocks policies are built from.
pub trait MovePredicate {
    fn allows(&self, board: &dyn GoBoard, p: Point, color: Color) -> bool;
}

pub struct NotEye;
impl MovePredicate for NotEye {
    fn allows(&self, board: &dyn GoBoard, p: Point, color: Color) -> bool {
        !is_simple_eye(board, p, color)
    }
}

/// Within Manhattan distance `max_distance` of a fixed reference point (the
/// last move played), used by playout policies that bias toward local play.
pub struct NearPoint {
    pub reference: Point,
    pub max_distance: usize,
    pub board_size: usize,
}
impl MovePredicate for NearPoint {
    fn allows(&self, _board: &dyn GoBoard, p: Point, _color: Color) -> bool {
        manhattan_distance(p, self.reference, self.board_size) <= self.max_distance
    }
}

pub struct InSet(pub HashSet<Point>);
impl MovePredicate for InSet {
    fn allows(&self, _board: &dyn GoBoard, p: Point, _color: Color) -> bool {
        self.0.contains(&p)
    }
}

pub struct Union<A, B>(pub A, pub B);
impl<A: MovePredicate, B: MovePredicate> MovePredicate for Union<A, B> {
    fn allows(&self, board: &dyn GoBoard, p: Point, color: Color) -> bool {
        self.0.allows(board, p, color) || self.1.allows(board, p, color)
    }
}

pub struct Intersection<A, B>(pub A, pub B);
impl<A: MovePredicate, B: MovePredicate> MovePredicate for Intersection<A, B> {
    fn allows(&self, board: &dyn GoBoard, p: Point, color: Color) -> bool {
        self.0.allows(board, p, color) && self.1.allows(board, p, color)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::SimpleBoard;
    use crate::point::Move;

    #[test]
    fn reset_collects_every_vacant_point() {
        let board = SimpleBoard::new(5, 6.5);
        let mut filter = MoveFilter::new(5);
        filter.reset(&board);
        assert_eq!(filter.len(), 25);
    }

    #[test]
    fn execute_removes_played_point_and_reinserts_captures() {
        let board = SimpleBoard::new(5, 6.5);
        let mut filter = MoveFilter::new(5);
        filter.reset(&board);

        let center = Point::from_xy(2, 2, 5);
        let edge = Point::from_xy(0, 0, 5);
        filter.execute(edge, &[]);
        assert!(!filter.contains(edge));
        assert_eq!(filter.len(), 24);

        // A later move at a different point captures `center`, which was
        // already vacant in this synthetic scenario — exercise the general
        // insert-on-capture path with an already-vacant point instead.
        let other = Point::from_xy(4, 4, 5);
        filter.execute(other, &[center]);
        assert!(filter.contains(center));
        assert!(!filter.contains(other));

        filter.undo();
        assert!(!filter.contains(center));
        assert!(filter.contains(other));

        filter.undo();
        assert!(filter.contains(edge));
        assert_eq!(filter.len(), 25);
    }

    #[test]
    fn captured_point_must_already_be_vacant() {
        // `insert` is idempotent: re-inserting a point that is already
        // tracked as vacant (e.g. the played point itself when a caller
        // passes it in `captured` by mistake) is a silent no-op rather than
        // corrupting the position index.
        let board = SimpleBoard::new(5, 6.5);
        let mut filter = MoveFilter::new(5);
        filter.reset(&board);
        let p = Point::from_xy(1, 1, 5);
        let before = filter.len();
        filter.insert(p);
        assert_eq!(filter.len(), before);
    }

    #[test]
    fn corner_point_is_a_simple_eye_only_with_friendly_diagonal() {
        let mut board = SimpleBoard::new(5, 6.5);
        let corner = Point::from_xy(0, 0, 5);
        for (x, y) in [(1, 0), (0, 1)] {
            board.play(Move::Play(Point::from_xy(x, y, 5)), Color::Black).unwrap();
            board.play(Move::Pass, Color::White).unwrap();
        }
        assert!(is_single_eye(&board, corner, Color::Black));
        // Diagonal (1,1) still empty: not a real eye until it's friendly too.
        assert!(!is_simple_eye(&board, corner, Color::Black));
        board.play(Move::Play(Point::from_xy(1, 1, 5)), Color::Black).unwrap();
        assert!(is_simple_eye(&board, corner, Color::Black));
    }
}
