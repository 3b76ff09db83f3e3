/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use crate::{Move, Position, Score, MATE_UPPER};

/// Number of bytes in a megabyte.
const BYTES_IN_MB: usize = 1024 * 1024;

/// Proven bounds on the true score of a position at some depth.
///
/// Every search runs with a zero-width window, so it only ever proves
/// `lower <= score` or `score <= upper` — never an exact value. Storing
/// anything "exact" here would be wrong by construction.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Bounds {
    pub lower: Score,
    pub upper: Score,
}

impl Default for Bounds {
    /// The vacuous bounds: nothing is known about the position yet.
    #[inline(always)]
    fn default() -> Self {
        Self {
            lower: -MATE_UPPER,
            upper: MATE_UPPER,
        }
    }
}

/// One slot of the [`ScoreTable`].
///
/// The full key is kept so an index collision reads as a miss instead of
/// returning bounds for a different position.
#[derive(Clone, Copy, Debug)]
struct ScoreSlot {
    pos: Position,
    depth: i32,
    can_null: bool,
    bounds: Bounds,
}

/// Transposition table mapping `(position, depth, can_null)` to proven score
/// bounds.
///
/// Fixed capacity with always-replace eviction: the search tolerates any
/// consistent subset of previously stored bounds, so dropping entries on
/// collision is safe.
#[derive(Debug)]
pub struct ScoreTable {
    slots: Vec<Option<ScoreSlot>>,
}

impl ScoreTable {
    /// Default size of the table, in megabytes.
    pub const DEFAULT_SIZE: usize = 16;

    /// Minimum size of the table, in megabytes.
    pub const MIN_SIZE: usize = 1;

    /// Maximum size of the table, in megabytes.
    pub const MAX_SIZE: usize = 1_024;

    /// Create a new [`ScoreTable`] of roughly `size` megabytes.
    #[inline(always)]
    pub fn new(size: usize) -> Self {
        Self::from_capacity((size * BYTES_IN_MB) / std::mem::size_of::<Option<ScoreSlot>>())
    }

    /// Create a new [`ScoreTable`] that can hold `capacity` entries.
    #[inline(always)]
    pub fn from_capacity(capacity: usize) -> Self {
        Self {
            slots: vec![None; capacity.max(1)],
        }
    }

    /// Forget everything stored so far.
    #[inline(always)]
    pub fn clear(&mut self) {
        self.slots.iter_mut().for_each(|slot| *slot = None);
    }

    /// Returns the number of entries that fit in this table.
    #[inline(always)]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Returns the size of this table, in megabytes.
    #[inline(always)]
    pub fn size(&self) -> usize {
        self.slots.len() * std::mem::size_of::<Option<ScoreSlot>>() / BYTES_IN_MB
    }

    #[inline(always)]
    fn index(&self, pos: &Position, depth: i32, can_null: bool) -> usize {
        let mut hasher = DefaultHasher::new();
        pos.hash(&mut hasher);
        depth.hash(&mut hasher);
        can_null.hash(&mut hasher);
        (hasher.finish() % self.slots.len() as u64) as usize
    }

    /// Fetch the bounds stored for a key, or the vacuous bounds on a miss.
    #[inline(always)]
    pub fn get(&self, pos: &Position, depth: i32, can_null: bool) -> Bounds {
        self.slots[self.index(pos, depth, can_null)]
            .as_ref()
            .filter(|slot| slot.depth == depth && slot.can_null == can_null && slot.pos == *pos)
            .map(|slot| slot.bounds)
            .unwrap_or_default()
    }

    /// Store `bounds` for a key, evicting whatever occupied its slot.
    #[inline(always)]
    pub fn store(&mut self, pos: &Position, depth: i32, can_null: bool, bounds: Bounds) {
        let index = self.index(pos, depth, can_null);
        self.slots[index] = Some(ScoreSlot {
            pos: *pos,
            depth,
            can_null,
            bounds,
        });
    }
}

impl Default for ScoreTable {
    #[inline(always)]
    fn default() -> Self {
        Self::new(Self::DEFAULT_SIZE)
    }
}

/// Cache of the best move found in each position, used to seed move ordering
/// and to walk out the principal variation.
#[derive(Debug)]
pub struct MoveTable {
    slots: Vec<Option<(Position, Move)>>,
}

impl MoveTable {
    /// Default number of entries.
    pub const DEFAULT_CAPACITY: usize = 1 << 16;

    /// Create a new [`MoveTable`] that can hold `capacity` entries.
    #[inline(always)]
    pub fn from_capacity(capacity: usize) -> Self {
        Self {
            slots: vec![None; capacity.max(1)],
        }
    }

    /// Forget everything stored so far.
    #[inline(always)]
    pub fn clear(&mut self) {
        self.slots.iter_mut().for_each(|slot| *slot = None);
    }

    #[inline(always)]
    fn index(&self, pos: &Position) -> usize {
        let mut hasher = DefaultHasher::new();
        pos.hash(&mut hasher);
        (hasher.finish() % self.slots.len() as u64) as usize
    }

    /// Fetch the best known move for `pos`, if one survives in the table.
    #[inline(always)]
    pub fn get(&self, pos: &Position) -> Option<Move> {
        self.slots[self.index(pos)]
            .as_ref()
            .filter(|(stored, _)| stored == pos)
            .map(|&(_, mv)| mv)
    }

    /// Remember `mv` as the best move found in `pos`.
    #[inline(always)]
    pub fn store(&mut self, pos: &Position, mv: Move) {
        let index = self.index(pos);
        self.slots[index] = Some((*pos, mv));
    }
}

impl Default for MoveTable {
    #[inline(always)]
    fn default() -> Self {
        Self::from_capacity(Self::DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FEN_STARTPOS;

    #[test]
    fn test_score_table_roundtrip() {
        let mut table = ScoreTable::from_capacity(128);
        let pos = Position::initial();

        assert_eq!(table.get(&pos, 3, true), Bounds::default());

        let bounds = Bounds {
            lower: Score::new(17),
            upper: MATE_UPPER,
        };
        table.store(&pos, 3, true, bounds);
        assert_eq!(table.get(&pos, 3, true), bounds);

        // Depth and the null-move flag are part of the key.
        assert_eq!(table.get(&pos, 4, true), Bounds::default());
        assert_eq!(table.get(&pos, 3, false), Bounds::default());

        table.clear();
        assert_eq!(table.get(&pos, 3, true), Bounds::default());
    }

    #[test]
    fn test_collisions_read_as_misses() {
        // A one-slot table guarantees every key collides.
        let mut table = ScoreTable::from_capacity(1);
        let first = Position::initial();
        let second: Position = FEN_STARTPOS
            .parse::<Position>()
            .unwrap()
            .with_move_made(crate::Move::from_uci("e2e4", false).unwrap());

        let bounds = Bounds {
            lower: Score::new(5),
            upper: Score::new(9),
        };
        table.store(&first, 1, true, bounds);
        assert_eq!(table.get(&second, 1, true), Bounds::default());

        // Storing the second evicts the first.
        table.store(&second, 1, true, bounds);
        assert_eq!(table.get(&first, 1, true), Bounds::default());
        assert_eq!(table.get(&second, 1, true), bounds);
    }

    #[test]
    fn test_move_table_roundtrip() {
        let mut table = MoveTable::from_capacity(64);
        let pos = Position::initial();
        assert_eq!(table.get(&pos), None);

        let mv = crate::Move::from_uci("e2e4", false).unwrap();
        table.store(&pos, mv);
        assert_eq!(table.get(&pos), Some(mv));
    }
}
