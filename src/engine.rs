/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use std::{
    fmt,
    io::{self, Write},
    sync::mpsc::{channel, Receiver, Sender},
    thread,
    time::Instant,
};

use anyhow::{bail, Context, Result};
use uci_parser::{UciCommand, UciInfo, UciOption, UciResponse, UciSearchOptions};

use crate::{
    parse_line, perft, splitperft, tune, EngineCommand, Move, Position, ScoreTable, SearchConfig,
    Searcher,
};

/// Positions used by the `bench` command: a mix of openings, middlegames,
/// and endgames, for both sides to move.
const BENCH_FENS: &[&str] = &[
    "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1",
    "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1",
    "8/2p5/3p4/KP5r/1R3p1k/8/4P1P1/8 w - - 0 1",
    "r3k2r/Pppp1ppp/1b3nbN/nP6/BBP1P3/q4N2/Pp1P2PP/R2Q1RK1 w kq - 0 1",
    "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq - 0 1",
    "r1bqkbnr/pppp1ppp/2n5/1B2p3/4P3/5N2/PPPP1PPP/RNBQK2R b KQkq - 0 1",
    "6k1/5ppp/8/8/8/8/5PPP/R5K1 w - - 0 1",
    "8/8/4k3/8/8/3K4/8/4R3 w - - 0 1",
];

/// The minnow chess engine.
///
/// Owns the game state (the history of positions reached and whose turn it
/// is), one [`Searcher`] whose tables live for the whole game, and the
/// channel the input thread feeds commands through.
#[derive(Debug)]
pub struct Engine {
    /// Every position reached in the game so far, the current one last.
    history: Vec<Position>,

    /// Whether White is the side to move in the last history entry.
    ///
    /// Positions are stored relative to the side to move, so this is what
    /// decides whether coordinates must be mirrored at the protocol border.
    white_to_move: bool,

    /// The searcher, carrying its transposition tables across moves.
    searcher: Searcher,

    /// One half of a channel, responsible for sending commands to the engine.
    sender: Sender<EngineCommand>,

    /// One half of a channel, responsible for receiving commands to execute.
    receiver: Receiver<EngineCommand>,

    /// Whether to print extra diagnostics as `info string` lines.
    debug: bool,
}

impl Engine {
    /// Constructs a new [`Engine`] to be executed with [`Engine::run`].
    pub fn new() -> Self {
        let (sender, receiver) = channel();

        Self {
            history: vec![Position::initial()],
            white_to_move: true,
            searcher: Searcher::default(),
            sender,
            receiver,
            debug: false,
        }
    }

    /// Returns a string of the engine's name and current version.
    #[inline(always)]
    pub fn name(&self) -> String {
        format!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"))
    }

    /// Returns a string of all authors of this engine.
    #[inline(always)]
    pub fn authors(&self) -> String {
        env!("CARGO_PKG_AUTHORS").replace(':', ", ")
    }

    /// Sends an [`EngineCommand`] to the engine to be executed.
    #[inline(always)]
    pub fn send_command(&self, command: EngineCommand) {
        // The receiver lives exactly as long as the engine itself, so this
        // can only fail once the engine is already gone.
        self.sender
            .send(command)
            .expect("engine command channel closed");
    }

    /// Entrypoint of the engine.
    ///
    /// Spawns a thread that parses `stdin` into commands, then executes the
    /// commands in the order received. Searches run on this thread and
    /// manage their own time, so the loop is busy for the duration of a
    /// `go`.
    pub fn run(&mut self) -> Result<()> {
        let sender = self.sender.clone();
        thread::spawn(move || {
            if let Err(err) = input_handler(sender) {
                eprintln!("input handler stopping after fatal error: {err:#}");
            }
        });

        while let Ok(cmd) = self.receiver.recv() {
            match cmd {
                EngineCommand::Bench { depth } => self.bench(depth),

                EngineCommand::Display => self.display(),

                EngineCommand::Eval => println!("{}", self.position().score),

                EngineCommand::Perft { depth } => {
                    println!("{}", perft(&self.position(), depth))
                }

                EngineCommand::Splitperft { depth } => {
                    splitperft(&self.position(), depth, !self.white_to_move);
                }

                EngineCommand::Quit => break,

                EngineCommand::Uci { cmd } => {
                    // The UCI spec says to keep running when a command fails.
                    if let Err(err) = self.handle_uci_command(cmd) {
                        eprintln!("error: {err:#}");
                    }
                }
            }
        }

        Ok(())
    }

    /// Handle the execution of a single [`UciCommand`].
    fn handle_uci_command(&mut self, uci: UciCommand) -> Result<()> {
        use UciCommand::*;
        match uci {
            Uci => self.uci(),

            Debug(status) => self.debug = status,

            IsReady => self.respond(UciResponse::<String>::ReadyOk),

            SetOption { name, value } => self.set_option(&name, value)?,

            Register { name: _, code: _ } => {
                println!("{} requires no registration", self.name())
            }

            UciNewGame => self.new_game(),

            Position { fen, moves } => self.set_position(fen, moves)?,

            Go(options) => self.go(options),

            // Searches are synchronous, so by the time a `stop` is read the
            // search it was aimed at has already returned.
            Stop => {}

            Quit => self.send_command(EngineCommand::Quit),

            _ => bail!("{} does not support UCI command {uci:?}", self.name()),
        }

        Ok(())
    }

    /// Called when the engine receives the `uci` command: prints the
    /// engine's identity and all supported options.
    fn uci(&self) {
        println!("id name {}", self.name());
        println!("id author {}", self.authors());
        println!();

        for option in self.options() {
            println!("{}", UciResponse::<&str>::Option(option));
        }

        self.respond(UciResponse::<String>::UciOk);
    }

    /// All UCI options this engine supports.
    fn options(&self) -> impl Iterator<Item = UciOption<&str>> {
        [
            UciOption::button("Clear Hash"),
            UciOption::spin(
                "Hash",
                ScoreTable::DEFAULT_SIZE as i32,
                ScoreTable::MIN_SIZE as i32,
                ScoreTable::MAX_SIZE as i32,
            ),
            UciOption::spin("QS", tune::qs!(), 0, 300),
            UciOption::spin("QS_A", tune::qs_a!(), 0, 300),
            UciOption::spin("EVAL_ROUGHNESS", tune::eval_roughness!(), 0, 50),
            UciOption::spin("NODES_SEARCHED", 0, 0, i32::MAX),
        ]
        .into_iter()
    }

    /// Handles the `setoption` command.
    fn set_option(&mut self, name: &str, value: Option<String>) -> Result<()> {
        match name {
            "Clear Hash" => self.searcher.clear_tables(),

            "Hash" => {
                let Some(value) = value.as_ref() else {
                    bail!("usage: setoption name Hash value <megabytes>");
                };
                let Ok(mb) = value.parse::<usize>() else {
                    bail!("expected an integer, got {value:?}");
                };
                if !(ScoreTable::MIN_SIZE..=ScoreTable::MAX_SIZE).contains(&mb) {
                    bail!(
                        "Hash must be between {} and {} megabytes",
                        ScoreTable::MIN_SIZE,
                        ScoreTable::MAX_SIZE
                    );
                }
                self.searcher.resize(mb);
            }

            "QS" => self.searcher.params.qs = parse_spin(&value, 0, 300)?,

            "QS_A" => self.searcher.params.qs_a = parse_spin(&value, 0, 300)?,

            "EVAL_ROUGHNESS" => {
                self.searcher.params.eval_roughness = parse_spin(&value, 0, 50)?
            }

            "NODES_SEARCHED" => {
                self.searcher.params.max_nodes = parse_spin(&value, 0, i32::MAX)? as u64
            }

            _ => bail!("unrecognized option {name:?}"),
        }

        if self.debug {
            let detail = value.unwrap_or_default();
            self.send_string(format!("option {name} set to {detail}"));
        }

        Ok(())
    }

    /// Resets the game: a fresh history and empty search tables. The table
    /// sizes and tuned parameters survive, since the GUI configured them.
    fn new_game(&mut self) {
        self.searcher.clear_tables();
        self.history = vec![Position::initial()];
        self.white_to_move = true;
    }

    /// Rebuild the history from a `position` command: a starting point plus
    /// a list of moves in UCI coordinates.
    ///
    /// A move that does not parse or is not playable is logged and skipped,
    /// keeping the history limited to positions actually reachable.
    fn set_position(&mut self, fen: Option<String>, moves: Vec<String>) -> Result<()> {
        let (start, white) = match fen {
            Some(fen) => Position::from_fen(&fen)?,
            None => (Position::initial(), true),
        };

        self.history = vec![start];
        self.white_to_move = white;

        for text in moves {
            let pos = self.position();
            match Move::from_uci(&text, !self.white_to_move) {
                Ok(mv) if pos.gen_moves().contains(&mv) => {
                    self.history.push(pos.with_move_made(mv));
                    self.white_to_move = !self.white_to_move;
                }
                Ok(_) => eprintln!("skipping move {text:?}: not playable here"),
                Err(err) => eprintln!("skipping move {text:?}: {err:#}"),
            }
        }

        Ok(())
    }

    /// Executes the `go` command: search the current position within the
    /// requested limits and print the chosen move.
    fn go(&mut self, options: UciSearchOptions) {
        let mut config = SearchConfig::new(options, self.white_to_move);
        if config.max_nodes == u64::MAX && self.searcher.params.max_nodes > 0 {
            config.max_nodes = self.searcher.params.max_nodes;
        }

        if self.debug {
            self.send_string(format!(
                "searching to depth {} within {:?}",
                config.max_depth, config.hard_timeout
            ));
        }

        let flipped = !self.white_to_move;
        let result = self.searcher.search(&self.history, config, flipped);

        // With no legal move to report, the null move tells the GUI to
        // adjudicate the mate or stalemate itself.
        let bestmove = result
            .bestmove
            .map(|mv| mv.to_uci(flipped))
            .unwrap_or_else(|| String::from("0000"));

        self.respond(UciResponse::BestMove {
            bestmove: Some(bestmove),
            ponder: None,
        });
    }

    /// Executes the `bench` command: a fixed-depth search of every benchmark
    /// position, reporting node counts and speed.
    fn bench(&mut self, depth: Option<i32>) {
        let max_depth = depth.unwrap_or(tune::bench_depth!());
        let start = Instant::now();
        let mut nodes = 0;

        for fen in BENCH_FENS {
            let (pos, white) = Position::from_fen(fen).expect("benchmark FEN is valid");

            // Every benchmark position gets a cold searcher so the numbers
            // are comparable run to run.
            let mut searcher = Searcher::default();
            let config = SearchConfig {
                max_depth,
                silent: true,
                ..Default::default()
            };

            let result = searcher.search(&[pos], config, !white);
            println!("{:<72} {:>9} nodes", fen, result.nodes);
            nodes += result.nodes;
        }

        let elapsed = start.elapsed();
        let nps = (nodes as f64 / elapsed.as_secs_f64().max(1e-3)) as u64;
        println!("{nodes} nodes / {elapsed:.2?} := {nps} nps");
    }

    /// Executes the `display` command: an ASCII diagram from White's
    /// perspective plus the static evaluation.
    fn display(&self) {
        let pos = self.position();
        let oriented = if self.white_to_move { pos } else { pos.rotate() };
        println!("{oriented}");
        println!();
        println!(
            "{} to move, static eval {}",
            if self.white_to_move { "White" } else { "Black" },
            pos.score
        );
    }

    /// The current position: the last entry of the history.
    fn position(&self) -> Position {
        // The history always contains at least the starting position.
        *self.history.last().expect("history is never empty")
    }

    /// Prints a [`UciResponse`], flushing so piped GUIs see it immediately.
    fn respond<T: fmt::Display>(&self, response: UciResponse<T>) {
        println!("{response}");
        let _ = io::stdout().flush();
    }

    /// Prints an `info string` message.
    fn send_string<T: fmt::Display>(&self, message: T) {
        self.respond(UciResponse::<String>::Info(Box::new(
            UciInfo::new().string(message),
        )));
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_spin(value: &Option<String>, min: i32, max: i32) -> Result<i32> {
    let Some(value) = value.as_ref() else {
        bail!("missing value for option");
    };
    let Ok(parsed) = value.parse::<i32>() else {
        bail!("expected an integer, got {value:?}");
    };
    if !(min..=max).contains(&parsed) {
        bail!("value must be between {min} and {max}");
    }
    Ok(parsed)
}

/// Loops endlessly awaiting input on `stdin`, sending every
/// successfully-parsed command through the supplied `sender`.
fn input_handler(sender: Sender<EngineCommand>) -> Result<()> {
    let mut buffer = String::with_capacity(2048);

    loop {
        buffer.clear();
        let bytes = io::stdin()
            .read_line(&mut buffer)
            .context("failed to read a line from stdin")?;

        // EOF (ctrl+d or a closed pipe): quit cleanly.
        if bytes == 0 {
            sender
                .send(EngineCommand::Quit)
                .context("failed to send quit after EOF")?;
            return Ok(());
        }

        let line = buffer.trim();
        if line.is_empty() {
            continue;
        }

        match parse_line(line) {
            Ok(cmd) => sender
                .send(cmd)
                .context("failed to send command to the engine")?,

            // A bad line is logged and ignored; the engine keeps running.
            Err(err) => eprintln!("{err:#}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bench_fens_are_valid() {
        for fen in BENCH_FENS {
            assert!(Position::from_fen(fen).is_ok(), "bad benchmark FEN {fen}");
        }
    }

    #[test]
    fn test_spin_parsing() {
        assert_eq!(parse_spin(&Some("25".into()), 0, 300).unwrap(), 25);
        assert!(parse_spin(&Some("301".into()), 0, 300).is_err());
        assert!(parse_spin(&Some("banana".into()), 0, 300).is_err());
        assert!(parse_spin(&None, 0, 300).is_err());
    }
}
