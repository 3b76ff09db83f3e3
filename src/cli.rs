/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use std::str::FromStr;

use anyhow::{bail, Context, Result};
use uci_parser::{UciCommand, UciParseError};

/// A command to be sent to the engine.
///
/// UCI commands arrive wrapped in [`EngineCommand::Uci`]; the rest are
/// console conveniences for poking at the engine directly.
#[derive(Debug, Clone)]
pub enum EngineCommand {
    /// Run a fixed-depth search over the benchmark positions.
    Bench { depth: Option<i32> },

    /// Print a diagram of the current position.
    Display,

    /// Print the static evaluation of the current position.
    Eval,

    /// Count the positions reachable in `depth` plies.
    Perft { depth: usize },

    /// Like `perft`, but with per-move subtotals at the root.
    Splitperft { depth: usize },

    /// Quit the engine.
    Quit,

    /// Execute a UCI command.
    Uci { cmd: UciCommand },
}

impl FromStr for EngineCommand {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut tokens = s.split_ascii_whitespace();
        let command = tokens.next().context("empty command")?;

        let cmd = match command.to_ascii_lowercase().as_str() {
            "bench" => Self::Bench {
                depth: tokens
                    .next()
                    .map(str::parse)
                    .transpose()
                    .context("usage: bench [depth]")?,
            },
            "display" | "d" => Self::Display,
            "eval" => Self::Eval,
            "perft" => Self::Perft {
                depth: parse_depth(tokens.next())?,
            },
            "splitperft" | "sperft" => Self::Splitperft {
                depth: parse_depth(tokens.next())?,
            },
            "quit" | "exit" => Self::Quit,
            unknown => bail!("unknown command {unknown:?}"),
        };

        Ok(cmd)
    }
}

fn parse_depth(token: Option<&str>) -> Result<usize> {
    token
        .context("missing depth argument")?
        .parse()
        .context("depth must be a non-negative integer")
}

/// Parse one input line, preferring UCI commands and falling back to the
/// engine's own console commands.
pub fn parse_line(line: &str) -> Result<EngineCommand> {
    match UciCommand::new(line) {
        Ok(cmd) => Ok(EngineCommand::Uci { cmd }),

        // Not a UCI keyword at all: try the console commands.
        Err(UciParseError::UnrecognizedCommand { .. }) => line.parse(),

        // A UCI keyword with bad arguments: report the UCI diagnostics.
        Err(err) => bail!("{err}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_console_commands_parse() {
        assert!(matches!(
            parse_line("perft 4"),
            Ok(EngineCommand::Perft { depth: 4 })
        ));
        assert!(matches!(parse_line("d"), Ok(EngineCommand::Display)));
        assert!(matches!(parse_line("exit"), Ok(EngineCommand::Quit)));
        assert!(matches!(
            parse_line("bench"),
            Ok(EngineCommand::Bench { depth: None })
        ));
    }

    #[test]
    fn test_uci_commands_win() {
        assert!(matches!(
            parse_line("isready"),
            Ok(EngineCommand::Uci { .. })
        ));
        assert!(matches!(
            parse_line("go depth 3"),
            Ok(EngineCommand::Uci { .. })
        ));
    }

    #[test]
    fn test_garbage_is_rejected() {
        assert!(parse_line("xyzzy").is_err());
        assert!(parse_line("perft").is_err());
        assert!(parse_line("perft banana").is_err());
    }
}
