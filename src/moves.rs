/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use std::fmt;

use anyhow::{ensure, Result};

use crate::A1;

/// Generous upper bound on the number of pseudo-legal moves in one position.
pub const MAX_NUM_MOVES: usize = 512;

/// An alias for an [`arrayvec::ArrayVec`] containing at most [`MAX_NUM_MOVES`] moves.
pub type MoveList = arrayvec::ArrayVec<Move, MAX_NUM_MOVES>;

/// The piece a pawn may become upon reaching the last rank.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Promotion {
    Knight,
    Bishop,
    Rook,
    Queen,
}

impl Promotion {
    /// All promotions, in the order they are generated.
    pub const ALL: [Self; 4] = [Self::Knight, Self::Bishop, Self::Rook, Self::Queen];

    /// The (uppercase) board letter of the promoted piece.
    #[inline(always)]
    pub const fn piece(self) -> u8 {
        match self {
            Self::Knight => b'N',
            Self::Bishop => b'B',
            Self::Rook => b'R',
            Self::Queen => b'Q',
        }
    }

    /// The lowercase suffix used in UCI move notation.
    #[inline(always)]
    pub const fn to_char(self) -> char {
        match self {
            Self::Knight => 'n',
            Self::Bishop => 'b',
            Self::Rook => 'r',
            Self::Queen => 'q',
        }
    }

    /// Parse a UCI promotion suffix.
    pub fn from_char(c: char) -> Result<Self> {
        match c.to_ascii_lowercase() {
            'n' => Ok(Self::Knight),
            'b' => Ok(Self::Bishop),
            'r' => Ok(Self::Rook),
            'q' => Ok(Self::Queen),
            _ => anyhow::bail!("invalid promotion piece {c:?}"),
        }
    }
}

/// A move: origin square, destination square, and an optional promotion.
///
/// Squares are indices into the padded 10x12 board of the position the move
/// belongs to, so they are always relative to the side to move.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct Move {
    from: u8,
    to: u8,
    promotion: Option<Promotion>,
}

impl Move {
    /// Creates a new [`Move`] from `from` to `to` with an optional promotion.
    #[inline(always)]
    pub fn new(from: usize, to: usize, promotion: Option<Promotion>) -> Self {
        debug_assert!(from < 120 && to < 120);
        Self {
            from: from as u8,
            to: to as u8,
            promotion,
        }
    }

    /// Origin square of this move.
    #[inline(always)]
    pub const fn from(&self) -> usize {
        self.from as usize
    }

    /// Destination square of this move.
    #[inline(always)]
    pub const fn to(&self) -> usize {
        self.to as usize
    }

    /// Promotion piece, if this move promotes a pawn.
    #[inline(always)]
    pub const fn promotion(&self) -> Option<Promotion> {
        self.promotion
    }

    /// Parse a move from UCI notation like `e2e4` or `e7e8q`.
    ///
    /// When `flipped` is set the squares are mirrored through the board
    /// center, translating from White's coordinates into the frame of a
    /// position where Black is the side to move.
    pub fn from_uci(text: &str, flipped: bool) -> Result<Self> {
        ensure!(
            text.is_ascii() && matches!(text.len(), 4 | 5),
            "malformed move {text:?}"
        );

        let mut from = parse_square(&text[0..2])?;
        let mut to = parse_square(&text[2..4])?;
        let promotion = match text.chars().nth(4) {
            Some(c) => Some(Promotion::from_char(c)?),
            None => None,
        };

        if flipped {
            from = 119 - from;
            to = 119 - to;
        }

        Ok(Self::new(from, to, promotion))
    }

    /// Render this move in UCI notation, mirroring the squares if `flipped`.
    pub fn to_uci(&self, flipped: bool) -> String {
        let (mut from, mut to) = (self.from(), self.to());
        if flipped {
            from = 119 - from;
            to = 119 - to;
        }

        let mut text = format!("{}{}", render_square(from), render_square(to));
        if let Some(promotion) = self.promotion {
            text.push(promotion.to_char());
        }
        text
    }
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_uci(false))
    }
}

/// Parse an algebraic square like `e2` into a board index.
pub fn parse_square(text: &str) -> Result<usize> {
    let bytes = text.as_bytes();
    ensure!(
        bytes.len() == 2
            && (b'a'..=b'h').contains(&bytes[0])
            && (b'1'..=b'8').contains(&bytes[1]),
        "malformed square {text:?}"
    );

    let file = (bytes[0] - b'a') as usize;
    let rank = (bytes[1] - b'1') as usize;
    Ok(A1 + file - 10 * rank)
}

/// Render a board index as an algebraic square like `e2`.
pub fn render_square(square: usize) -> String {
    let delta = square as isize - A1 as isize;
    let file = delta.rem_euclid(10) as u8;
    let rank = 1 - delta.div_euclid(10);
    format!("{}{rank}", (b'a' + file) as char)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{A8, H1, H8};

    #[test]
    fn test_square_codec() {
        assert_eq!(parse_square("a1").unwrap(), A1);
        assert_eq!(parse_square("h1").unwrap(), H1);
        assert_eq!(parse_square("a8").unwrap(), A8);
        assert_eq!(parse_square("h8").unwrap(), H8);
        assert_eq!(render_square(A1), "a1");
        assert_eq!(render_square(H8), "h8");
        assert!(parse_square("i9").is_err());
        assert!(parse_square("e").is_err());
    }

    #[test]
    fn test_move_roundtrip() {
        for text in ["e2e4", "g8f6", "e1g1", "a7a8q", "h2h1n"] {
            let mv = Move::from_uci(text, false).unwrap();
            assert_eq!(mv.to_uci(false), text);

            // Mirroring must be an involution on the text form, too.
            let mirrored = Move::from_uci(text, true).unwrap();
            assert_eq!(mirrored.to_uci(true), text);
        }
    }

    #[test]
    fn test_mirrored_parse() {
        // The mirror is a 180-degree rotation, so in a Black-to-move frame
        // the move e7e5 lands on the d2-d4 squares.
        let mv = Move::from_uci("e7e5", true).unwrap();
        assert_eq!(mv.from(), parse_square("d2").unwrap());
        assert_eq!(mv.to(), parse_square("d4").unwrap());
    }

    #[test]
    fn test_malformed_moves_rejected() {
        assert!(Move::from_uci("e2", false).is_err());
        assert!(Move::from_uci("e2e9", false).is_err());
        assert!(Move::from_uci("e7e8x", false).is_err());
    }
}
