//! A minimal, concrete Go board.
//!
//! This is not the focus of the system — the feature/tracker/evaluator/
//! learning pipeline is — so it is kept deliberately small: no superko
//! (simple positional ko only), no scoring beyond area count, no handicap
//! stones. It exists so the rest of the crate has something real to run
//! against in tests and the CLI, behind the [`GoBoard`] trait so upstream
//! code never depends on the concrete representation.

use std::fmt;

use crate::error::RuntimeError;
use crate::point::{Color, Move, Point};

/// What occupies a single point on the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Disc {
    Empty,
    Black,
    White,
}

impl Disc {
    #[inline]
    pub fn of(color: Color) -> Disc {
        match color {
            Color::Black => Disc::Black,
            Color::White => Disc::White,
        }
    }

    #[inline]
    pub fn color(self) -> Option<Color> {
        match self {
            Disc::Empty => None,
            Disc::Black => Some(Color::Black),
            Disc::White => Some(Color::White),
        }
    }
}

/// The operations the feature/tracker/evaluator layers require from a board.
///
/// Everything above this trait is written against `dyn GoBoard` / `impl
/// GoBoard`, never against [`SimpleBoard`] directly.
pub trait GoBoard {
    fn size(&self) -> usize;
    fn to_play(&self) -> Color;
    fn move_number(&self) -> usize;
    fn komi(&self) -> f32;

    fn disc_at(&self, p: Point) -> Disc;
    #[inline]
    fn occupied(&self, p: Point) -> bool {
        !matches!(self.disc_at(p), Disc::Empty)
    }

    fn is_legal(&self, mv: Move, color: Color) -> bool;
    /// Whether playing `mv` as `color` would capture at least one enemy stone.
    fn is_capturing_move(&self, mv: Move, color: Color) -> bool;

    /// Plays a move, mutating the board. Returns the points captured, if any.
    fn play(&mut self, mv: Move, color: Color) -> Result<Vec<Point>, RuntimeError>;
    /// Reverses the most recent `play`.
    fn undo(&mut self) -> Result<(), RuntimeError>;

    /// The anchor (lowest-index point) of the chain containing `p`. Panics
    /// if `p` is empty.
    fn block_anchor(&self, p: Point) -> Point;
    /// All stones in the same chain as `p`.
    fn block_points(&self, p: Point) -> Vec<Point>;
    fn liberties_of(&self, p: Point) -> usize;
    /// Liberty count capped at `k` — cheaper than `liberties_of` when the
    /// caller only needs to distinguish "at most k" from "more than k".
    fn num_liberties_at_most(&self, p: Point, k: usize) -> usize {
        self.liberties_of(p).min(k)
    }

    /// A hash of the full position, including whose turn it is to play.
    fn hashcode_including_to_play(&self) -> u64;
}

#[derive(Debug, Clone)]
struct UndoEntry {
    mv: Move,
    prior_cells: Vec<(Point, Disc)>,
    prior_ko: Option<Point>,
    captured: Vec<Point>,
}

/// Concrete [`GoBoard`] for a square board of side `size`.
#[derive(Debug, Clone)]
pub struct SimpleBoard {
    size: usize,
    cells: Vec<Disc>,
    to_play: Color,
    move_number: usize,
    komi: f32,
    /// Point forbidden to recapture into on the very next move (simple ko).
    ko_point: Option<Point>,
    history: Vec<UndoEntry>,
}

impl SimpleBoard {
    pub fn new(size: usize, komi: f32) -> SimpleBoard {
        SimpleBoard {
            size,
            cells: vec![Disc::Empty; size * size],
            to_play: Color::Black,
            move_number: 0,
            komi,
            ko_point: None,
            history: Vec::new(),
        }
    }

    #[inline]
    fn idx(&self, p: Point) -> usize {
        p.index()
    }

    fn neighbors(&self, p: Point) -> arrayvec::ArrayVec<Point, 4> {
        let (x, y) = p.xy(self.size);
        let mut out = arrayvec::ArrayVec::new();
        if x > 0 {
            out.push(Point::from_xy(x - 1, y, self.size));
        }
        if x + 1 < self.size {
            out.push(Point::from_xy(x + 1, y, self.size));
        }
        if y > 0 {
            out.push(Point::from_xy(x, y - 1, self.size));
        }
        if y + 1 < self.size {
            out.push(Point::from_xy(x, y + 1, self.size));
        }
        out
    }

    /// Flood-fills the chain containing `p`, returning its stones and the
    /// set of liberty points. `p` must be occupied.
    fn chain_and_liberties(&self, p: Point) -> (Vec<Point>, Vec<Point>) {
        let color = self.disc_at(p).color().expect("chain_and_liberties on empty point");
        let mut visited = vec![false; self.cells.len()];
        let mut liberty_seen = vec![false; self.cells.len()];
        let mut stones = Vec::new();
        let mut liberties = Vec::new();
        let mut stack = vec![p];
        visited[self.idx(p)] = true;
        while let Some(cur) = stack.pop() {
            stones.push(cur);
            for n in self.neighbors(cur) {
                match self.disc_at(n) {
                    Disc::Empty => {
                        if !liberty_seen[self.idx(n)] {
                            liberty_seen[self.idx(n)] = true;
                            liberties.push(n);
                        }
                    }
                    other if other.color() == Some(color) => {
                        if !visited[self.idx(n)] {
                            visited[self.idx(n)] = true;
                            stack.push(n);
                        }
                    }
                    _ => {}
                }
            }
        }
        (stones, liberties)
    }

    fn would_be_legal(&self, p: Point, color: Color) -> (bool, Vec<Point>) {
        if self.occupied(p) {
            return (false, Vec::new());
        }
        if self.ko_point == Some(p) {
            return (false, Vec::new());
        }
        // Simulate: place stone, then remove any enemy chains left with
        // zero liberties, then check our own chain for liberties (suicide).
        let mut sim = self.cells.clone();
        sim[self.idx(p)] = Disc::of(color);
        let opponent = color.opposite();
        let mut captured = Vec::new();
        for n in self.neighbors(p) {
            if sim[self.idx(n)].color() == Some(opponent) {
                let (chain, libs) = self.chain_and_liberties_on(&sim, n);
                if libs.is_empty() {
                    captured.extend(chain);
                }
            }
        }
        for &c in &captured {
            sim[self.idx(c)] = Disc::Empty;
        }
        let (_, own_libs) = self.chain_and_liberties_on(&sim, p);
        if own_libs.is_empty() {
            return (false, Vec::new()); // suicide
        }
        (true, captured)
    }

    fn chain_and_liberties_on(&self, cells: &[Disc], p: Point) -> (Vec<Point>, Vec<Point>) {
        let color = cells[self.idx(p)].color().expect("empty point");
        let mut visited = vec![false; cells.len()];
        let mut liberty_seen = vec![false; cells.len()];
        let mut stones = Vec::new();
        let mut liberties = Vec::new();
        let mut stack = vec![p];
        visited[self.idx(p)] = true;
        while let Some(cur) = stack.pop() {
            stones.push(cur);
            for n in self.neighbors(cur) {
                match cells[self.idx(n)] {
                    Disc::Empty => {
                        if !liberty_seen[self.idx(n)] {
                            liberty_seen[self.idx(n)] = true;
                            liberties.push(n);
                        }
                    }
                    other if other.color() == Some(color) => {
                        if !visited[self.idx(n)] {
                            visited[self.idx(n)] = true;
                            stack.push(n);
                        }
                    }
                    _ => {}
                }
            }
        }
        (stones, liberties)
    }
}

impl GoBoard for SimpleBoard {
    fn size(&self) -> usize {
        self.size
    }

    fn to_play(&self) -> Color {
        self.to_play
    }

    fn move_number(&self) -> usize {
        self.move_number
    }

    fn komi(&self) -> f32 {
        self.komi
    }

    fn disc_at(&self, p: Point) -> Disc {
        self.cells[self.idx(p)]
    }

    fn is_legal(&self, mv: Move, color: Color) -> bool {
        match mv {
            Move::Pass | Move::Resign => true,
            Move::Play(p) => self.would_be_legal(p, color).0,
        }
    }

    fn is_capturing_move(&self, mv: Move, color: Color) -> bool {
        match mv {
            Move::Pass | Move::Resign => false,
            Move::Play(p) => !self.would_be_legal(p, color).1.is_empty(),
        }
    }

    fn play(&mut self, mv: Move, color: Color) -> Result<Vec<Point>, RuntimeError> {
        let (prior_cells, captured, new_ko);
        match mv {
            Move::Pass | Move::Resign => {
                prior_cells = Vec::new();
                captured = Vec::new();
                new_ko = None;
            }
            Move::Play(p) => {
                let (legal, caps) = self.would_be_legal(p, color);
                if !legal {
                    return Err(RuntimeError::IllegalMove);
                }
                let mut prior = Vec::with_capacity(caps.len() + 1);
                prior.push((p, self.disc_at(p)));
                self.cells[self.idx(p)] = Disc::of(color);
                for &c in &caps {
                    prior.push((c, self.disc_at(c)));
                    self.cells[self.idx(c)] = Disc::Empty;
                }
                // Simple ko: exactly one stone captured, and the played
                // stone is a lone stone with exactly one liberty (which is
                // necessarily the just-vacated point).
                let (own_chain, own_libs) = self.chain_and_liberties(p);
                new_ko = if caps.len() == 1 && own_chain.len() == 1 && own_libs.len() == 1 {
                    Some(caps[0])
                } else {
                    None
                };
                prior_cells = prior;
                captured = caps;
            }
        }
        self.history.push(UndoEntry {
            mv,
            prior_cells,
            prior_ko: self.ko_point,
            captured: captured.clone(),
        });
        self.ko_point = new_ko;
        self.to_play = color.opposite();
        self.move_number += 1;
        Ok(captured)
    }

    fn undo(&mut self) -> Result<(), RuntimeError> {
        let entry = self.history.pop().ok_or(RuntimeError::NothingToUndo)?;
        for (p, disc) in entry.prior_cells {
            self.cells[self.idx(p)] = disc;
        }
        self.ko_point = entry.prior_ko;
        self.to_play = self.to_play.opposite();
        self.move_number -= 1;
        let _ = entry.mv;
        Ok(())
    }

    fn block_anchor(&self, p: Point) -> Point {
        let (chain, _) = self.chain_and_liberties(p);
        *chain.iter().min().expect("non-empty chain")
    }

    fn block_points(&self, p: Point) -> Vec<Point> {
        self.chain_and_liberties(p).0
    }

    fn liberties_of(&self, p: Point) -> usize {
        self.chain_and_liberties(p).1.len()
    }

    fn hashcode_including_to_play(&self) -> u64 {
        use rapidhash::RapidHasher;
        use std::hash::{Hash, Hasher};
        let mut hasher = RapidHasher::default();
        for disc in &self.cells {
            (*disc == Disc::Empty, *disc == Disc::Black).hash(&mut hasher);
        }
        self.to_play.hash(&mut hasher);
        hasher.finish()
    }
}

/// Chinese-style area score from black's perspective: occupied points of
/// each color plus surrounded empty territory, minus komi. Works against any
/// `GoBoard` impl since it only needs `size`/`disc_at`/`komi`.
pub fn area_score(board: &dyn GoBoard) -> f32 {
    let size = board.size();
    let mut visited = vec![false; size * size];
    let mut black_area = 0i32;
    let mut white_area = 0i32;
    for y in 0..size {
        for x in 0..size {
            let p = Point::from_xy(x, y, size);
            match board.disc_at(p).color() {
                Some(Color::Black) => black_area += 1,
                Some(Color::White) => white_area += 1,
                None => {
                    if visited[p.index()] {
                        continue;
                    }
                    if let Some((region_size, owner)) = flood_territory(board, p, &mut visited) {
                        match owner {
                            Color::Black => black_area += region_size as i32,
                            Color::White => white_area += region_size as i32,
                        }
                    }
                }
            }
        }
    }
    black_area as f32 - white_area as f32 - board.komi()
}

/// Flood-fills the empty region containing `p`, marking every point in it
/// visited. Returns the region's size and bordering color if the region
/// touches exactly one color; dame (bordering both colors, or neither)
/// scores as neutral territory and returns `None`.
fn flood_territory(board: &dyn GoBoard, p: Point, visited: &mut [bool]) -> Option<(usize, Color)> {
    let size = board.size();
    let mut stack = vec![p];
    visited[p.index()] = true;
    let mut region = 0usize;
    let mut border: Option<Color> = None;
    let mut mixed = false;
    while let Some(cur) = stack.pop() {
        region += 1;
        let (x, y) = cur.xy(size);
        let neighbors = [
            x.checked_sub(1).map(|nx| Point::from_xy(nx, y, size)),
            Some(x + 1).filter(|&v| v < size).map(|nx| Point::from_xy(nx, y, size)),
            y.checked_sub(1).map(|ny| Point::from_xy(x, ny, size)),
            Some(y + 1).filter(|&v| v < size).map(|ny| Point::from_xy(x, ny, size)),
        ];
        for n in neighbors.into_iter().flatten() {
            match board.disc_at(n).color() {
                None => {
                    if !visited[n.index()] {
                        visited[n.index()] = true;
                        stack.push(n);
                    }
                }
                Some(c) if !mixed => match border {
                    None => border = Some(c),
                    Some(existing) if existing != c => mixed = true,
                    _ => {}
                },
                Some(_) => {}
            }
        }
    }
    if mixed {
        None
    } else {
        border.map(|c| (region, c))
    }
}

impl fmt::Display for SimpleBoard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for y in (0..self.size).rev() {
            for x in 0..self.size {
                let c = match self.disc_at(Point::from_xy(x, y, self.size)) {
                    Disc::Empty => '.',
                    Disc::Black => 'X',
                    Disc::White => 'O',
                };
                write!(f, "{c} ")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn play_and_undo_round_trip() {
        let mut board = SimpleBoard::new(5, 6.5);
        let p = Point::from_xy(2, 2, 5);
        board.play(Move::Play(p), Color::Black).unwrap();
        assert_eq!(board.disc_at(p), Disc::Black);
        board.undo().unwrap();
        assert_eq!(board.disc_at(p), Disc::Empty);
        assert_eq!(board.to_play(), Color::Black);
        assert_eq!(board.move_number(), 0);
    }

    #[test]
    fn simple_capture() {
        let mut board = SimpleBoard::new(5, 6.5);
        // Surround a single white stone at (2,2) with black.
        let center = Point::from_xy(2, 2, 5);
        board.play(Move::Play(center), Color::White).unwrap();
        for (x, y) in [(1, 2), (3, 2), (2, 1), (2, 3)] {
            board.play(Move::Play(Point::from_xy(x, y, 5)), Color::Black).unwrap();
        }
        assert_eq!(board.disc_at(center), Disc::Empty);
    }

    #[test]
    fn suicide_is_illegal() {
        let mut board = SimpleBoard::new(5, 6.5);
        for (x, y) in [(1, 2), (3, 2), (2, 1), (2, 3)] {
            board.play(Move::Play(Point::from_xy(x, y, 5)), Color::Black).unwrap();
        }
        let center = Point::from_xy(2, 2, 5);
        assert!(!board.is_legal(Move::Play(center), Color::White));
    }

    #[test]
    fn area_score_counts_stones_and_surrounded_territory() {
        let mut board = SimpleBoard::new(5, 6.5);
        // A wall of black across the middle row, with no white stones
        // anywhere: both empty regions it separates border black only, so
        // every point on the board ends up black's.
        for x in 0..5 {
            board.play(Move::Play(Point::from_xy(x, 2, 5)), Color::Black).unwrap();
            board.play(Move::Pass, Color::White).unwrap();
        }
        assert_eq!(area_score(&board), 25.0 - 6.5);
    }

    #[test]
    fn area_score_treats_a_region_touching_both_colors_as_neutral() {
        let mut board = SimpleBoard::new(5, 6.5);
        board.play(Move::Play(Point::from_xy(0, 0, 5)), Color::Black).unwrap();
        board.play(Move::Play(Point::from_xy(4, 4, 5)), Color::White).unwrap();
        // The other 23 points form one connected empty region touching both
        // colors: dame, not counted as either side's territory.
        assert_eq!(area_score(&board), 1.0 - 1.0 - 6.5);
    }

    #[test]
    fn area_score_on_empty_board_is_just_negative_komi() {
        let board = SimpleBoard::new(5, 6.5);
        assert_eq!(area_score(&board), -6.5);
    }

    #[test]
    fn simple_ko_forbids_immediate_recapture() {
        // A lone white stone at (2,2) with its only liberty at (2,1); the
        // other three neighbours of (2,1) are white, so when black captures
        // by playing (2,1), black's own stone is left with exactly one
        // liberty too (the just-vacated point) — the classic ko shape.
        let mut board = SimpleBoard::new(5, 6.5);
        let lone = Point::from_xy(2, 2, 5);
        for (x, y) in [(2, 2), (1, 1), (3, 1), (2, 0)] {
            board.play(Move::Play(Point::from_xy(x, y, 5)), Color::White).unwrap();
        }
        for (x, y) in [(1, 2), (3, 2), (2, 3)] {
            board.play(Move::Play(Point::from_xy(x, y, 5)), Color::Black).unwrap();
        }
        board.play(Move::Play(Point::from_xy(2, 1, 5)), Color::Black).unwrap();
        assert_eq!(board.disc_at(lone), Disc::Empty);
        // White may not immediately recapture at `lone`.
        assert!(!board.is_legal(Move::Play(lone), Color::White));
        // But after an intervening pass the point is open again.
        board.play(Move::Pass, Color::White).unwrap();
        assert!(board.is_legal(Move::Play(lone), Color::Black));
    }
}
