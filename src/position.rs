/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use std::fmt;

use anyhow::{bail, ensure, Context, Result};

use crate::{Move, MoveList, Promotion, Psqt, Score, MATE_LOWER};

/// FEN string for the starting position of chess.
pub const FEN_STARTPOS: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

/// The board is a 10x12 grid of bytes: the 8x8 playing area sits in the
/// middle, wrapped in two sentinel rows above and below and one sentinel
/// column on each side.
///
/// Cells hold a piece letter (uppercase for the side to move), `b' '` for an
/// empty playing square, or a sentinel (`b'.'`, with `b'\n'` in the leftmost
/// column so the raw buffer prints as a diagram). Rotating the board swaps
/// which sentinel occupies which edge column, so both bytes always test as
/// off-board.
pub type Board = [u8; 120];

/// An empty square inside the playing area.
pub const EMPTY: u8 = b' ';

/// Board index of the a1 square. Files grow to the east, ranks to the north.
pub const A1: usize = 91;
/// Board index of the h1 square.
pub const H1: usize = 98;
/// Board index of the a8 square.
pub const A8: usize = 21;
/// Board index of the h8 square.
pub const H8: usize = 28;

/// Direction offsets in the 10-wide board layout.
pub const NORTH: isize = -10;
pub const EAST: isize = 1;
pub const SOUTH: isize = 10;
pub const WEST: isize = -1;

const N: isize = NORTH;
const E: isize = EAST;
const S: isize = SOUTH;
const W: isize = WEST;

const INITIAL_BOARD: Board = *b"\n.........\n.........\nrnbqkbnr.\npppppppp.\n        .\n        .\n        .\n        .\nPPPPPPPP.\nRNBQKBNR.\n.........\n.........";

/// The fixed movement vectors of each piece kind.
///
/// Pawn vectors cover the single push, double push, and both captures; the
/// generator sorts out which of them apply. Sliding pieces repeat their
/// vectors until blocked.
fn directions(piece: u8) -> &'static [isize] {
    match piece {
        b'P' => &[N, N + N, N + W, N + E],
        b'N' => &[
            N + N + E,
            E + N + E,
            E + S + E,
            S + S + E,
            S + S + W,
            W + S + W,
            W + N + W,
            N + N + W,
        ],
        b'B' => &[N + E, S + E, S + W, N + W],
        b'R' => &[N, E, S, W],
        b'Q' | b'K' => &[N, E, S, W, N + E, S + E, S + W, N + W],
        _ => &[],
    }
}

#[inline(always)]
const fn is_offboard(cell: u8) -> bool {
    cell == b'.' || cell == b'\n'
}

#[inline(always)]
const fn swap_case(cell: u8) -> u8 {
    if cell.is_ascii_alphabetic() {
        cell ^ 0x20
    } else {
        cell
    }
}

/// Recompute a board's static evaluation from scratch: the sum of the
/// piece-square values of the side to move's pieces, minus the opponent's
/// (looked up through the mirrored square).
fn board_score(board: &Board) -> Score {
    let mut score = Score::DRAW;
    for (i, &p) in board.iter().enumerate() {
        if p.is_ascii_uppercase() {
            score += Psqt::for_piece(p).get(i);
        } else if p.is_ascii_lowercase() {
            score -= Psqt::for_piece(p.to_ascii_uppercase()).get(119 - i);
        }
    }
    score
}

/// A full chess position, always stored from the side to move's perspective.
///
/// After every move the board is rotated 180 degrees and the letter cases are
/// swapped, so the uppercase pieces always belong to the player whose turn it
/// is. This lets the evaluation and the search use a single sign convention.
///
/// Positions are immutable values: applying a move produces a new one.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct Position {
    /// The padded 10x12 board.
    pub board: Board,

    /// Static evaluation for the side to move, maintained incrementally.
    ///
    /// Always equal to what [`Position::static_score`] recomputes, except in
    /// positions reached through a phantom capture of a castling king.
    pub score: Score,

    /// The side to move's castling rights, as `(queenside, kingside)`.
    pub wc: (bool, bool),

    /// The opponent's castling rights. Stored pre-swapped so that rotation
    /// just exchanges the two pairs.
    pub bc: (bool, bool),

    /// Square a pawn may capture onto en passant, or 0 if none.
    pub ep: usize,

    /// Square the opponent's king passed over while castling last move, or 0.
    /// A capture on (or next to) this square counts as capturing the king,
    /// which is how castling through check is ruled out.
    pub kp: usize,
}

impl Position {
    /// The starting position of chess.
    pub fn initial() -> Self {
        Self {
            board: INITIAL_BOARD,
            score: Score::DRAW,
            wc: (true, true),
            bc: (true, true),
            ep: 0,
            kp: 0,
        }
    }

    /// Parse a FEN string, returning the position and whether White is the
    /// side to move.
    ///
    /// The position is always oriented to the side to move, so a
    /// Black-to-move FEN comes back rotated. The halfmove and fullmove
    /// counters are accepted but ignored.
    pub fn from_fen(fen: &str) -> Result<(Self, bool)> {
        let mut fields = fen.split_ascii_whitespace();
        let placement = fields.next().context("FEN is missing the piece placement field")?;
        let color = fields.next().context("FEN is missing the side-to-move field")?;
        let castling = fields.next().context("FEN is missing the castling field")?;
        let en_passant = fields.next().context("FEN is missing the en-passant field")?;

        let mut board: Board = [b'.'; 120];
        for row in 0..12 {
            board[row * 10] = b'\n';
        }
        for row in 2..10 {
            for col in 1..9 {
                board[row * 10 + col] = EMPTY;
            }
        }

        let (mut rank, mut file) = (0, 0);
        for c in placement.chars() {
            match c {
                '/' => {
                    ensure!(file == 8, "FEN rank {} has {file} files", 8 - rank);
                    rank += 1;
                    file = 0;
                    ensure!(rank < 8, "FEN has more than eight ranks");
                }
                '1'..='8' => file += c as usize - '0' as usize,
                'p' | 'n' | 'b' | 'r' | 'q' | 'k' | 'P' | 'N' | 'B' | 'R' | 'Q' | 'K' => {
                    ensure!(file < 8, "FEN rank {} overflows", 8 - rank);
                    board[21 + rank * 10 + file] = c as u8;
                    file += 1;
                }
                _ => bail!("unexpected {c:?} in FEN piece placement"),
            }
            ensure!(file <= 8, "FEN rank {} overflows", 8 - rank);
        }
        ensure!(rank == 7 && file == 8, "FEN piece placement is incomplete");

        let wc = (castling.contains('Q'), castling.contains('K'));
        let bc = (castling.contains('k'), castling.contains('q'));
        let ep = if en_passant == "-" {
            0
        } else {
            crate::parse_square(en_passant)?
        };

        let pos = Self {
            board,
            score: board_score(&board),
            wc,
            bc,
            ep,
            kp: 0,
        };

        match color {
            "w" => Ok((pos, true)),
            "b" => Ok((pos.rotate(), false)),
            _ => bail!("invalid side to move {color:?}"),
        }
    }

    /// Generate all pseudo-legal moves for the side to move.
    ///
    /// Moves that leave the own king capturable are included; legality is
    /// resolved one ply later by actually capturing the king. Filtering them
    /// out here would break the search's mate detection.
    pub fn gen_moves(&self) -> MoveList {
        let mut moves = MoveList::new();

        for (i, &p) in self.board.iter().enumerate() {
            if !p.is_ascii_uppercase() {
                continue;
            }

            for &d in directions(p) {
                let mut j = (i as isize + d) as usize;
                loop {
                    let q = self.board[j];

                    // Stay inside the board, and off friendly pieces.
                    if is_offboard(q) || q.is_ascii_uppercase() {
                        break;
                    }

                    if p == b'P' {
                        // Pushes only onto empty squares, double pushes only
                        // from the home rank with an empty square in between.
                        if (d == N || d == N + N) && q != EMPTY {
                            break;
                        }
                        if d == N + N
                            && (i < (A1 as isize + N) as usize
                                || self.board[(i as isize + N) as usize] != EMPTY)
                        {
                            break;
                        }
                        // Diagonals only capture: a piece, the en-passant
                        // square, or the square a castling king passed over.
                        if (d == N + W || d == N + E)
                            && q == EMPTY
                            && j != self.ep
                            && j != self.kp
                            && j != self.kp.wrapping_sub(1)
                            && j != self.kp + 1
                        {
                            break;
                        }
                        // A pawn reaching the last rank becomes something.
                        if (A8..=H8).contains(&j) {
                            for promotion in Promotion::ALL {
                                moves.push(Move::new(i, j, Some(promotion)));
                            }
                            break;
                        }
                    }

                    moves.push(Move::new(i, j, None));

                    // Stop crawlers from sliding, and sliding after captures.
                    if matches!(p, b'P' | b'N' | b'K') || q.is_ascii_lowercase() {
                        break;
                    }

                    // Castling is generated when a home rook slides next to
                    // the unmoved king, which also proves the gap is empty.
                    if i == A1 && self.board[j + 1] == b'K' && self.wc.0 {
                        moves.push(Move::new(j + 1, j - 1, None));
                    }
                    if i == H1 && self.board[j - 1] == b'K' && self.wc.1 {
                        moves.push(Move::new(j - 1, j + 1, None));
                    }

                    j = (j as isize + d) as usize;
                }
            }
        }

        moves
    }

    /// The change in [`Position::score`] that playing `mv` would produce,
    /// before the sign flip of the rotation.
    ///
    /// This is a pure piece-square lookup, so it doubles as the move-ordering
    /// key: captures and promotions score high, quiet moves near zero.
    pub fn value(&self, mv: Move) -> Score {
        let (i, j) = (mv.from(), mv.to());
        let (p, q) = (self.board[i], self.board[j]);

        let mut score = Psqt::for_piece(p).get(j) - Psqt::for_piece(p).get(i);

        // Capture: the opponent's tables are ours applied to the mirror.
        if q.is_ascii_lowercase() {
            score += Psqt::for_piece(q.to_ascii_uppercase()).get(119 - j);
        }

        // Landing on or next to the king-passant square captures the king
        // mid-castle.
        if j.abs_diff(self.kp) < 2 {
            score += Psqt::for_piece(b'K').get(119 - j);
        }

        // Castling also moves the rook.
        if p == b'K' && i.abs_diff(j) == 2 {
            score += Psqt::for_piece(b'R').get((i + j) / 2);
            score -= Psqt::for_piece(b'R').get(if j < i { A1 } else { H1 });
        }

        if p == b'P' {
            if (A8..=H8).contains(&j) {
                if let Some(promotion) = mv.promotion() {
                    score += Psqt::for_piece(promotion.piece()).get(j)
                        - Psqt::for_piece(b'P').get(j);
                }
            }
            // En passant: the captured pawn sits behind the target square.
            if j == self.ep {
                score += Psqt::for_piece(b'P').get(119 - (j as isize + S) as usize);
            }
        }

        score
    }

    /// Apply `mv`, returning the resulting position from the opponent's
    /// perspective.
    pub fn with_move_made(&self, mv: Move) -> Self {
        let (i, j) = (mv.from(), mv.to());
        let p = self.board[i];

        let mut board = self.board;
        let mut wc = self.wc;
        let mut bc = self.bc;
        let mut ep = 0;
        let mut kp = 0;
        let score = self.score + self.value(mv);

        board[j] = board[i];
        board[i] = EMPTY;

        // Castling rights disappear when a rook moves or is captured on its
        // home corner.
        if i == A1 {
            wc = (false, wc.1);
        }
        if i == H1 {
            wc = (wc.0, false);
        }
        if j == A8 {
            bc = (bc.0, false);
        }
        if j == H8 {
            bc = (false, bc.1);
        }

        if p == b'K' {
            wc = (false, false);
            if i.abs_diff(j) == 2 {
                kp = (i + j) / 2;
                board[if j < i { A1 } else { H1 }] = EMPTY;
                board[kp] = b'R';
            }
        }

        if p == b'P' {
            if (A8..=H8).contains(&j) {
                if let Some(promotion) = mv.promotion() {
                    board[j] = promotion.piece();
                }
            }
            if j as isize - i as isize == 2 * N {
                ep = (i as isize + N) as usize;
            }
            if j == self.ep {
                board[(j as isize + S) as usize] = EMPTY;
            }
        }

        let pos = Self {
            board,
            score,
            wc,
            bc,
            ep,
            kp,
        };

        // Phantom king captures next to `kp` credit a king that is still on
        // the board, so the incremental score intentionally diverges there.
        debug_assert!(
            (self.kp != 0 && j.abs_diff(self.kp) < 2) || pos.score == board_score(&pos.board),
            "incremental score diverged from the board after {mv}"
        );

        pos.rotate()
    }

    /// Rotate the board 180 degrees and swap the side to move.
    ///
    /// The en-passant and king-passant squares travel with the rotation.
    /// Applied twice this is the identity.
    pub fn rotate(&self) -> Self {
        let mut board = [0u8; 120];
        for (i, &cell) in self.board.iter().enumerate() {
            board[119 - i] = swap_case(cell);
        }

        Self {
            board,
            score: -self.score,
            wc: self.bc,
            bc: self.wc,
            ep: if self.ep != 0 { 119 - self.ep } else { 0 },
            kp: if self.kp != 0 { 119 - self.kp } else { 0 },
        }
    }

    /// Like [`Position::rotate`], but forgets the en-passant and king-passant
    /// squares. This is the "pass" used by null-move pruning, where neither
    /// square may linger into the extra tempo.
    pub fn nullmove(&self) -> Self {
        Self {
            ep: 0,
            kp: 0,
            ..self.rotate()
        }
    }

    /// Whether the side to move can capture the opponent's king outright,
    /// i.e. the previous move was illegal.
    pub fn is_dead(&self) -> bool {
        self.gen_moves().iter().any(|&mv| self.value(mv) >= MATE_LOWER)
    }

    /// Recompute the static evaluation from the board alone.
    ///
    /// [`Position::score`] tracks this incrementally; recomputing is the
    /// consistency oracle for tests and debug assertions.
    pub fn static_score(&self) -> Score {
        board_score(&self.board)
    }
}

impl Default for Position {
    fn default() -> Self {
        Self::initial()
    }
}

impl std::str::FromStr for Position {
    type Err = anyhow::Error;

    /// Parse a FEN string, discarding the side-to-move flag.
    fn from_str(s: &str) -> Result<Self> {
        Ok(Self::from_fen(s)?.0)
    }
}

impl fmt::Display for Position {
    /// Renders the playing area as an 8x8 diagram with rank and file labels,
    /// oriented with the side to move at the bottom.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in 2..10 {
            write!(f, "{} ", 10 - row)?;
            for col in 1..9 {
                let cell = self.board[row * 10 + col];
                let c = if cell == EMPTY { '.' } else { cell as char };
                write!(f, " {c}")?;
            }
            writeln!(f)?;
        }
        write!(f, "   a b c d e f g h")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn startpos() -> Position {
        Position::initial()
    }

    /// Applies a line of moves, each written in the frame of the side making
    /// it (Black's moves come pre-mirrored).
    fn play(pos: Position, moves: &[&str]) -> Position {
        moves.iter().fold(pos, |pos, text| {
            let mv = Move::from_uci(text, false).unwrap();
            assert!(pos.gen_moves().contains(&mv), "{text} is not generated");
            pos.with_move_made(mv)
        })
    }

    #[test]
    fn test_initial_board_shape() {
        let pos = startpos();
        assert_eq!(pos.board[A1], b'R');
        assert_eq!(pos.board[H1], b'R');
        assert_eq!(pos.board[A8], b'r');
        assert_eq!(pos.board[H8], b'r');
        assert_eq!(pos.board[81], b'P');
        assert_eq!(pos.board[38], b'p');
        assert_eq!(pos.score, Score::DRAW);
        assert_eq!(pos.static_score(), Score::DRAW);
    }

    #[test]
    fn test_startpos_matches_fen() {
        let (from_fen, white) = Position::from_fen(FEN_STARTPOS).unwrap();
        assert!(white);
        assert_eq!(from_fen, startpos());
    }

    #[test]
    fn test_rotation_involution() {
        let (pos, _) =
            Position::from_fen("r3k2r/8/8/8/8/8/8/R3K2R w KQkq - 0 1").unwrap();
        assert_eq!(pos.rotate().rotate(), pos);

        // A double nullmove only forgets the passant squares.
        let after = play(startpos(), &["e2e4"]);
        assert_ne!(after.ep, 0);
        let double_null = after.nullmove().nullmove();
        assert_eq!(double_null.board, after.board);
        assert_eq!(double_null.score, after.score);
        assert_eq!(double_null.ep, 0);
    }

    #[test]
    fn test_incremental_score_consistency() {
        // A line touching the special cases: double pushes, an en-passant
        // capture, development, and kingside castling. Black's moves are
        // written pre-mirrored into its own frame.
        let line = [
            "e2e4", // 1. e4
            "d2d3", // 1... e6
            "e4e5", // 2. e5
            "e2e4", // 2... d5
            "e5d6", // 3. exd6 (en passant)
            "b1c3", // 3... Nf6
            "g1f3", // 4. Nf3
            "g1f3", // 4... Nc6
            "f1e2", // 5. Be2
            "c1d2", // 5... Be7
            "e1g1", // 6. O-O
            "h2h3", // 6... a6
        ];
        let mut pos = startpos();
        for text in line {
            let mv = Move::from_uci(text, false).unwrap();
            assert!(pos.gen_moves().contains(&mv), "{text} should be generated");
            pos = pos.with_move_made(mv);
            assert_eq!(pos.score, pos.static_score(), "after {text}");
        }

        // Promotion keeps the incremental score consistent, too.
        let (pos, _) = Position::from_fen("8/P7/8/8/8/8/8/k6K w - - 0 1").unwrap();
        let promote = Move::from_uci("a7a8q", false).unwrap();
        let after = pos.with_move_made(promote);
        assert_eq!(after.score, after.static_score());
    }

    #[test]
    fn test_double_push_sets_ep() {
        let pos = play(startpos(), &["e2e4"]);
        // In the rotated frame, the skipped e3 square shows up mirrored.
        assert_eq!(pos.ep, 119 - crate::parse_square("e3").unwrap());
    }

    #[test]
    fn test_castling_moves_rook() {
        let (pos, _) =
            Position::from_fen("r3k2r/8/8/8/8/8/8/R3K2R w KQkq - 0 1").unwrap();
        let castle = Move::from_uci("e1g1", false).unwrap();
        let after = pos.with_move_made(castle);

        // From Black's perspective the white king now sits on the mirrored
        // g1, with the rook beside it on the mirrored f1.
        let king = 119 - crate::parse_square("g1").unwrap();
        let rook = 119 - crate::parse_square("f1").unwrap();
        assert_eq!(after.board[king], b'k');
        assert_eq!(after.board[rook], b'r');
        assert_eq!(after.board[119 - H1], EMPTY);
        assert_eq!(after.kp, 119 - crate::parse_square("f1").unwrap());
        assert_eq!(after.bc, (false, false));
    }

    #[test]
    fn test_fen_rejects_garbage() {
        assert!(Position::from_fen("").is_err());
        assert!(Position::from_fen("rnbqkbnr/pppppppp w KQkq - 0 1").is_err());
        assert!(Position::from_fen(
            "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR x KQkq - 0 1"
        )
        .is_err());
        assert!(Position::from_fen(
            "rnbqkbnr/pppppppp/9/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1"
        )
        .is_err());
    }

    #[test]
    fn test_fen_without_clocks() {
        // Some test suites omit the halfmove and fullmove counters.
        assert!(Position::from_fen("8/2p5/3p4/KP5r/1R3p1k/8/4P1P1/8 w - -").is_ok());
    }
}
