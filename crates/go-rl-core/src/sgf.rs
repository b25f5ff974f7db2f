//! Minimal write-only SGF emission: `(;FF[4]KM[komi]SZ[size] ;B[xy] ;W[xy] …)`.
//! No parser — nothing in this crate ever needs to read an SGF file back in.

use std::fmt::Write as _;

use crate::point::{Color, Move, Point};

/// One played node in a game record; a pass/resign has no coordinate.
#[derive(Debug, Clone, Copy)]
pub struct SgfMove {
    pub color: Color,
    pub mv: Move,
}

fn coord_pair(p: Point, size: usize) -> String {
    let (x, y) = p.xy(size);
    let letter = |v: usize| (b'a' + v as u8) as char;
    format!("{}{}", letter(x), letter(y))
}

fn append_node(out: &mut String, size: usize, sgf_move: SgfMove) {
    let tag = match sgf_move.color {
        Color::Black => 'B',
        Color::White => 'W',
    };
    match sgf_move.mv {
        Move::Play(p) => {
            let _ = write!(out, ";{tag}[{}]", coord_pair(p, size));
        }
        Move::Pass | Move::Resign => {
            let _ = write!(out, ";{tag}[]");
        }
    }
}

/// Emits a single, variation-free game record.
pub fn emit_game(size: usize, komi: f32, moves: &[SgfMove]) -> String {
    let mut out = String::new();
    let _ = write!(out, "(;FF[4]KM[{komi}]SZ[{size}]");
    for &mv in moves {
        append_node(&mut out, size, mv);
    }
    out.push(')');
    out
}

/// Emits a game record whose tail branches into one or more simulated
/// playout continuations, each as its own parenthesised variation appended
/// after the trunk of real moves.
pub fn emit_game_with_variations(size: usize, komi: f32, trunk: &[SgfMove], variations: &[Vec<SgfMove>]) -> String {
    let mut out = String::new();
    let _ = write!(out, "(;FF[4]KM[{komi}]SZ[{size}]");
    for &mv in trunk {
        append_node(&mut out, size, mv);
    }
    for variation in variations {
        out.push('(');
        for &mv in variation {
            append_node(&mut out, size, mv);
        }
        out.push(')');
    }
    out.push(')');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emits_header_and_moves_in_order() {
        let moves = [
            SgfMove { color: Color::Black, mv: Move::Play(Point::from_xy(3, 2, 5)) },
            SgfMove { color: Color::White, mv: Move::Play(Point::from_xy(4, 2, 5)) },
        ];
        let sgf = emit_game(5, 6.5, &moves);
        assert_eq!(sgf, "(;FF[4]KM[6.5]SZ[5];B[dc];W[ec])");
    }

    #[test]
    fn pass_and_resign_have_empty_coordinates() {
        let moves = [
            SgfMove { color: Color::Black, mv: Move::Pass },
            SgfMove { color: Color::White, mv: Move::Resign },
        ];
        let sgf = emit_game(9, 7.0, &moves);
        assert_eq!(sgf, "(;FF[4]KM[7]SZ[9];B[];W[])");
    }

    #[test]
    fn variations_are_parenthesised_after_the_trunk() {
        let trunk = [SgfMove { color: Color::Black, mv: Move::Play(Point::from_xy(0, 0, 5)) }];
        let variations = vec![
            vec![SgfMove { color: Color::White, mv: Move::Play(Point::from_xy(1, 1, 5)) }],
            vec![SgfMove { color: Color::White, mv: Move::Play(Point::from_xy(2, 2, 5)) }],
        ];
        let sgf = emit_game_with_variations(5, 6.5, &trunk, &variations);
        assert_eq!(sgf, "(;FF[4]KM[6.5]SZ[5];B[aa](;W[bb])(;W[cc]))");
    }
}
