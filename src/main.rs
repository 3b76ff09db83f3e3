/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use clap::Parser;
use minnow::{parse_line, Engine, EngineCommand};

/// A minimalist UCI chess engine.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// A single command to execute before exiting, e.g. `bench` or `go depth 6`.
    #[arg(trailing_var_arg = true)]
    command: Vec<String>,
}

fn main() {
    let cli = Cli::parse();
    let mut engine = Engine::new();

    // If a command was provided on the command line, run it and quit.
    if !cli.command.is_empty() {
        let line = cli.command.join(" ");
        match parse_line(&line) {
            Ok(cmd) => {
                engine.send_command(cmd);
                engine.send_command(EngineCommand::Quit);
            }
            Err(err) => {
                eprintln!("{err:#}");
                std::process::exit(2);
            }
        }
    }

    if let Err(err) = engine.run() {
        eprintln!("{} encountered a fatal error: {err:#}", engine.name());
        std::process::exit(1);
    }
}
