/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use std::fmt;

use uci_parser::UciScore;

pub type ScoreInternal = i32;

/// A numerical evaluation of a position or move, in units of ["centipawns"](https://www.chessprogramming.org/Score).
///
/// Scores are always relative to the side to move.
/// Mate-related constants live next to the piece-square tables they are derived from.
#[derive(Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
#[repr(transparent)]
pub struct Score(ScoreInternal);

impl Score {
    /// Score of a draw.
    pub const DRAW: Self = Self(0);

    /// Constructs a new [`Score`] instance.
    #[inline(always)]
    pub const fn new(score: ScoreInternal) -> Self {
        Self(score)
    }

    /// Fetch the raw centipawn value of this [`Score`].
    #[inline(always)]
    pub const fn inner(self) -> ScoreInternal {
        self.0
    }

    /// Converts this [`Score`] into a [`UciScore`] for the `info score` message.
    #[inline(always)]
    pub fn into_uci(self) -> UciScore {
        UciScore::cp(self.0)
    }
}

impl From<Score> for UciScore {
    #[inline(always)]
    fn from(value: Score) -> Self {
        value.into_uci()
    }
}

macro_rules! impl_binary_op {
    ($trait:tt, $fn:ident) => {
        impl std::ops::$trait for Score {
            type Output = Self;

            #[inline(always)]
            fn $fn(self, rhs: Self) -> Self::Output {
                Self(self.0.$fn(rhs.0))
            }
        }

        impl std::ops::$trait<ScoreInternal> for Score {
            type Output = Self;

            #[inline(always)]
            fn $fn(self, rhs: ScoreInternal) -> Self::Output {
                Self(self.0.$fn(rhs))
            }
        }

        impl std::ops::$trait<Score> for ScoreInternal {
            type Output = Score;

            #[inline(always)]
            fn $fn(self, rhs: Score) -> Self::Output {
                Score(self.$fn(rhs.0))
            }
        }
    };
}

macro_rules! impl_binary_op_assign {
    ($trait:tt, $fn:ident) => {
        impl std::ops::$trait for Score {
            #[inline(always)]
            fn $fn(&mut self, rhs: Self) {
                self.0.$fn(rhs.0);
            }
        }

        impl std::ops::$trait<ScoreInternal> for Score {
            #[inline(always)]
            fn $fn(&mut self, rhs: ScoreInternal) {
                self.0.$fn(rhs);
            }
        }
    };
}

impl_binary_op!(Add, add);
impl_binary_op!(Sub, sub);
impl_binary_op!(Mul, mul);
impl_binary_op!(Div, div);

impl_binary_op_assign!(AddAssign, add_assign);
impl_binary_op_assign!(SubAssign, sub_assign);

impl std::ops::Neg for Score {
    type Output = Self;

    #[inline(always)]
    fn neg(self) -> Self::Output {
        Self(self.0.neg())
    }
}

impl PartialEq<ScoreInternal> for Score {
    #[inline(always)]
    fn eq(&self, other: &ScoreInternal) -> bool {
        self.0.eq(other)
    }
}

impl PartialOrd<ScoreInternal> for Score {
    #[inline(always)]
    fn partial_cmp(&self, other: &ScoreInternal) -> Option<std::cmp::Ordering> {
        self.0.partial_cmp(other)
    }
}

impl fmt::Display for Score {
    #[inline(always)]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
