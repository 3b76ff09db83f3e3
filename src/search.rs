/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use std::{
    cmp::Reverse,
    collections::HashSet,
    io::{self, Write},
    time::{Duration, Instant},
};

use uci_parser::{UciInfo, UciResponse, UciSearchOptions};

use crate::{tune, Bounds, Move, MoveTable, Position, Score, ScoreTable, MATE_LOWER, MATE_UPPER};

/// Maximum depth of the iterative-deepening loop.
pub const MAX_DEPTH: i32 = 127;

/// How many nodes may pass between two looks at the clock.
const CHECKUP_MASK: u64 = 0x7FF;

/// Configuration variables for executing a search.
#[derive(Debug, Clone, Copy)]
pub struct SearchConfig {
    /// Maximum depth to execute the search.
    pub max_depth: i32,

    /// Node allowance. If the search exceeds this many nodes, it will exit
    /// as quickly as possible.
    pub max_nodes: u64,

    /// Start time of the search.
    pub starttime: Instant,

    /// Soft limit on search time.
    ///
    /// Checked between iterations: once exceeded, no deeper iteration is
    /// started, since it probably would not finish anyway.
    pub soft_timeout: Duration,

    /// Hard limit on search time.
    ///
    /// Checked during the search itself; exceeding it abandons the in-flight
    /// iteration.
    pub hard_timeout: Duration,

    /// Suppress the per-iteration `info` lines. Used by benchmarks.
    pub silent: bool,
}

impl SearchConfig {
    /// Constructs a new [`SearchConfig`] from the provided UCI options.
    ///
    /// A `movetime` is spent as-is. Otherwise the budget for this move is a
    /// fixed fraction of the mover's remaining clock plus the increment,
    /// floored at a few milliseconds and capped at half the clock.
    pub fn new(options: UciSearchOptions, white_to_move: bool) -> Self {
        let mut config = Self::default();

        if let Some(depth) = options.depth {
            config.max_depth = (depth as i32).min(MAX_DEPTH);
        }

        if let Some(nodes) = options.nodes {
            config.max_nodes = nodes as u64;
        }

        if let Some(movetime) = options.movetime {
            config.soft_timeout = movetime;
            config.hard_timeout = movetime;
        } else {
            let (time, inc) = if white_to_move {
                (options.wtime, options.winc)
            } else {
                (options.btime, options.binc)
            };

            if let Some(time) = time {
                let inc = inc.unwrap_or(Duration::ZERO);
                let budget = (time / tune::time_divisor!() + inc)
                    .min(time / 2)
                    .max(Duration::from_millis(tune::min_think_ms!()));

                config.hard_timeout = budget;
                // Starting another iteration close to the deadline is wasted
                // work, so back off a little earlier.
                config.soft_timeout = budget * 4 / 5;
            }
        }

        config
    }
}

impl Default for SearchConfig {
    /// A default [`SearchConfig`] permits an effectively unbounded search.
    #[inline(always)]
    fn default() -> Self {
        Self {
            max_depth: MAX_DEPTH,
            max_nodes: u64::MAX,
            starttime: Instant::now(),
            soft_timeout: Duration::MAX,
            hard_timeout: Duration::MAX,
            silent: false,
        }
    }
}

/// Tunable knobs of the search, adjustable through UCI options.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchParameters {
    /// Value floor for moves considered at the quiescence horizon.
    pub qs: i32,

    /// How quickly the floor falls off with remaining depth.
    pub qs_a: i32,

    /// Convergence tolerance of the bisection on the root score.
    pub eval_roughness: i32,

    /// Standing node cap applied when `go` does not provide one. Zero means
    /// unlimited.
    pub max_nodes: u64,
}

impl Default for SearchParameters {
    fn default() -> Self {
        Self {
            qs: tune::qs!(),
            qs_a: tune::qs_a!(),
            eval_roughness: tune::eval_roughness!(),
            max_nodes: 0,
        }
    }
}

/// The result of a search: the deepest fully-completed iteration wins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchResult {
    /// Number of nodes searched.
    pub nodes: u64,

    /// Best move found during the search, in the root position's frame.
    pub bestmove: Option<Move>,

    /// Score of the root position.
    pub score: Score,

    /// Depth of the deepest completed iteration.
    pub depth: i32,

    /// Principal variation, each move in the frame of the position it is
    /// played from.
    pub pv: Vec<Move>,
}

impl Default for SearchResult {
    #[inline(always)]
    fn default() -> Self {
        Self {
            nodes: 0,
            bestmove: None,
            score: Score::DRAW,
            depth: 0,
            pv: Vec::new(),
        }
    }
}

/// Executes searches over a game of chess.
///
/// The transposition tables live here and persist across searches; they are
/// only dropped when a new game starts. The repetition history and node
/// counter are reset at the start of every search.
#[derive(Debug)]
pub struct Searcher {
    /// Proven score bounds per `(position, depth, can_null)`.
    tp_score: ScoreTable,

    /// Best move found per position.
    tp_move: MoveTable,

    /// Positions reached in the game so far, for repetition detection.
    history: HashSet<Position>,

    /// Number of nodes searched so far.
    nodes: u64,

    /// Set once the clock or the node budget runs out; the in-flight
    /// iteration is then abandoned without touching the tables further.
    stopped: bool,

    /// Limits of the currently-running search.
    config: SearchConfig,

    /// Tunable knobs, adjustable through UCI options.
    pub params: SearchParameters,
}

impl Searcher {
    /// Construct a new [`Searcher`] with a score table of `hash_mb`
    /// megabytes.
    pub fn new(hash_mb: usize) -> Self {
        Self {
            tp_score: ScoreTable::new(hash_mb),
            tp_move: MoveTable::default(),
            history: HashSet::new(),
            nodes: 0,
            stopped: false,
            config: SearchConfig::default(),
            params: SearchParameters::default(),
        }
    }

    /// Drop everything learned so far. Called between games.
    pub fn clear_tables(&mut self) {
        self.tp_score.clear();
        self.tp_move.clear();
    }

    /// Replace the score table with a fresh one of `hash_mb` megabytes.
    pub fn resize(&mut self, hash_mb: usize) {
        self.tp_score = ScoreTable::new(hash_mb);
    }

    /// Current size of the score table, in megabytes.
    pub fn hash_size(&self) -> usize {
        self.tp_score.size()
    }

    /// Iterative-deepening search over the last position in `history`.
    ///
    /// Each depth converges on the root score with MTD-bi: a bisection of
    /// zero-window [`Searcher::bound`] calls on the interval the score must
    /// lie in. One `info` line is printed per completed depth, and the
    /// deadline is consulted between bisection steps. `flipped` mirrors all
    /// printed coordinates for Black-to-move roots.
    pub fn search(
        &mut self,
        history: &[Position],
        config: SearchConfig,
        flipped: bool,
    ) -> SearchResult {
        let Some(root) = history.last().copied() else {
            return SearchResult::default();
        };

        self.nodes = 0;
        self.stopped = false;
        self.config = config;
        self.history = history.iter().copied().collect();

        // Should the clock expire before depth 1 completes, any legal move
        // beats forfeiting on time.
        let mut result = SearchResult {
            bestmove: root
                .gen_moves()
                .iter()
                .copied()
                .find(|&mv| !root.with_move_made(mv).is_dead()),
            ..Default::default()
        };

        // The bisection target carries over between depths: the previous
        // score is the best guess for the next one.
        let mut gamma = Score::DRAW;

        'deepening: for depth in 1..=self.config.max_depth {
            let (mut lower, mut upper) = (-MATE_LOWER, MATE_LOWER);

            while lower < upper - self.params.eval_roughness {
                let score = self.bound(&root, gamma, depth, false);
                if self.stopped {
                    break 'deepening;
                }

                if score >= gamma {
                    lower = score;
                } else {
                    upper = score;
                }
                gamma = (lower + upper + 1) / 2;

                if self.soft_deadline_passed() && result.bestmove.is_some() {
                    break 'deepening;
                }
            }

            // Depth complete: report it and remember its outcome.
            result.depth = depth;
            result.score = if lower == -MATE_LOWER { upper } else { lower };
            if let Some(mv) = self.tp_move.get(&root) {
                result.bestmove = Some(mv);
            }
            result.pv = self.principal_variation(&root);
            if !self.config.silent {
                self.send_depth_info(&result, flipped);
            }

            if self.soft_deadline_passed() {
                break 'deepening;
            }
        }

        result.nodes = self.nodes;
        result
    }

    /// Zero-window search: returns a lower bound on the true score of `pos`
    /// if the result is `>= gamma`, and an upper bound otherwise.
    ///
    /// `depth <= 0` is the quiescence horizon, where only standing pat and
    /// high-value moves are considered. `can_null` permits the null move and
    /// the repetition check; it is unset at the root (which is in the history
    /// but is not a draw) and immediately after a null move.
    pub fn bound(&mut self, pos: &Position, gamma: Score, depth: i32, can_null: bool) -> Score {
        self.nodes += 1;
        self.checkup();
        if self.stopped {
            return -MATE_UPPER;
        }

        // Quiescence re-searches are all the same depth as far as the table
        // is concerned.
        let depth = depth.max(0);

        // This is a king-capture engine: the single termination condition is
        // that our king is already gone.
        if pos.score <= -MATE_LOWER {
            return -MATE_UPPER;
        }

        let entry = self.tp_score.get(pos, depth, can_null);
        if entry.lower >= gamma {
            return entry.lower;
        }
        if entry.upper < gamma {
            return entry.upper;
        }

        // Repeating any earlier position is scored as a draw. Not at depth 0
        // (too expensive) and not at the root.
        if can_null && depth > 0 && self.history.contains(pos) {
            return Score::DRAW;
        }

        let mut best = -MATE_UPPER;
        let mut best_move = None;

        'candidates: {
            // First try not moving at all, searched shallower. If passing
            // still beats the window, a real move surely will.
            if depth > 0 && can_null {
                let score = -self.bound(&pos.nullmove(), 1 - gamma, depth - 3, false);
                if self.stopped {
                    break 'candidates;
                }
                if score > best {
                    best = score;
                }
                if best >= gamma {
                    break 'candidates;
                }
            }

            // At the horizon, standing pat bounds the position from below.
            if depth == 0 {
                if pos.score > best {
                    best = pos.score;
                }
                if best >= gamma {
                    break 'candidates;
                }
            }

            // At depth 0 only captures and promotions clear this floor; at
            // shallow depths it also culls the most pointless moves.
            let val_lower = Score::new(self.params.qs - depth * self.params.qs_a);

            // The hash move goes first, gated by the same floor to keep the
            // move set stable across re-searches.
            if let Some(killer) = self.tp_move.get(pos) {
                if pos.value(killer) >= val_lower {
                    let score = -self.bound(&pos.with_move_made(killer), 1 - gamma, depth - 1, true);
                    if self.stopped {
                        break 'candidates;
                    }
                    if score > best {
                        best = score;
                        best_move = Some(killer);
                    }
                    if best >= gamma {
                        break 'candidates;
                    }
                }
            }

            // Then every other move, strongest swing first.
            let mut moves: Vec<(Score, Move)> = pos
                .gen_moves()
                .iter()
                .map(|&mv| (pos.value(mv), mv))
                .collect();
            moves.sort_unstable_by_key(|&(value, _)| Reverse(value));

            for (value, mv) in moves {
                if value < val_lower {
                    break;
                }
                let score = -self.bound(&pos.with_move_made(mv), 1 - gamma, depth - 1, true);
                if self.stopped {
                    break 'candidates;
                }
                if score > best {
                    best = score;
                    best_move = Some(mv);
                }
                if best >= gamma {
                    break 'candidates;
                }
            }
        }

        if self.stopped {
            // The iteration is being abandoned; whatever `best` holds now
            // must not be recorded as a proven bound.
            return best;
        }

        // Save the refutation for move ordering and the PV.
        if best >= gamma {
            if let Some(mv) = best_move {
                self.tp_move.store(pos, mv);
            }
        }

        // Failing this low with moves to spare means every move loses the
        // king: either we are mated or it is stalemate. Probing whether the
        // opponent could capture the king if we passed tells the two apart.
        if depth > 0 && best == -MATE_UPPER {
            let flipped = pos.nullmove();
            let in_check = self.bound(&flipped, MATE_UPPER, 0, true) == MATE_UPPER;
            best = if in_check { -MATE_LOWER } else { Score::DRAW };
            if self.stopped {
                return best;
            }
        }

        if best >= gamma {
            self.tp_score.store(
                pos,
                depth,
                can_null,
                Bounds {
                    lower: best,
                    upper: entry.upper,
                },
            );
        } else {
            self.tp_score.store(
                pos,
                depth,
                can_null,
                Bounds {
                    lower: entry.lower,
                    upper: best,
                },
            );
        }

        best
    }

    /// Walk the best-move table from the root to recover the principal
    /// variation. The walk stops when the chain runs out, revisits a
    /// position, or grows impractically long.
    fn principal_variation(&self, root: &Position) -> Vec<Move> {
        let mut pv = Vec::new();
        let mut pos = *root;
        let mut seen = vec![pos];

        while pv.len() < tune::max_pv_length!() {
            let Some(mv) = self.tp_move.get(&pos) else {
                break;
            };
            pv.push(mv);
            pos = pos.with_move_made(mv);
            if seen.contains(&pos) {
                break;
            }
            seen.push(pos);
        }

        pv
    }

    /// Polls the clock and node budget every couple thousand nodes.
    #[inline(always)]
    fn checkup(&mut self) {
        if self.nodes & CHECKUP_MASK == 0
            && (self.nodes >= self.config.max_nodes
                || self.config.starttime.elapsed() >= self.config.hard_timeout)
        {
            self.stopped = true;
        }
    }

    #[inline(always)]
    fn soft_deadline_passed(&self) -> bool {
        self.config.starttime.elapsed() >= self.config.soft_timeout
    }

    /// Prints the `info` line for a completed iteration.
    fn send_depth_info(&self, result: &SearchResult, flipped: bool) {
        let elapsed = self.config.starttime.elapsed();
        let nps = (self.nodes as f64 / elapsed.as_secs_f64().max(1e-3)) as u64;

        // PV moves alternate frames, so the mirroring alternates with them.
        let pv: Vec<String> = result
            .pv
            .iter()
            .enumerate()
            .map(|(ply, mv)| mv.to_uci(flipped ^ (ply % 2 == 1)))
            .collect();

        let mut info = UciInfo::new()
            .depth(result.depth)
            .score(result.score.into_uci())
            .nodes(self.nodes)
            .nps(nps)
            .time(elapsed.as_millis());
        if !pv.is_empty() {
            info = info.pv(pv);
        }

        println!("{}", UciResponse::<String>::Info(Box::new(info)));
        let _ = io::stdout().flush();
    }
}

impl Default for Searcher {
    fn default() -> Self {
        Self::new(ScoreTable::DEFAULT_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_movetime_budget() {
        let options = UciSearchOptions {
            movetime: Some(Duration::from_millis(500)),
            ..Default::default()
        };
        let config = SearchConfig::new(options, true);
        assert_eq!(config.hard_timeout, Duration::from_millis(500));
        assert_eq!(config.soft_timeout, Duration::from_millis(500));
        assert_eq!(config.max_depth, MAX_DEPTH);
    }

    #[test]
    fn test_clock_budget_uses_own_clock() {
        let options = || UciSearchOptions {
            wtime: Some(Duration::from_secs(40)),
            btime: Some(Duration::from_secs(4)),
            ..Default::default()
        };

        let white = SearchConfig::new(options(), true);
        assert_eq!(white.hard_timeout, Duration::from_secs(1));

        let black = SearchConfig::new(options(), false);
        assert_eq!(black.hard_timeout, Duration::from_millis(100));
        assert!(black.soft_timeout < black.hard_timeout);
    }

    #[test]
    fn test_depth_limit_overrides_time() {
        let options = UciSearchOptions {
            depth: Some(3),
            ..Default::default()
        };
        let config = SearchConfig::new(options, true);
        assert_eq!(config.max_depth, 3);
        assert_eq!(config.hard_timeout, Duration::MAX);
    }
}
