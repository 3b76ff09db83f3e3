/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use minnow::{perft, Position};

fn test_perft_fen_nodes(depth: usize, fen: &str, expected: u64) {
    let position: Position = fen.parse().unwrap();
    let nodes = perft(&position, depth);
    assert_eq!(nodes, expected, "PERFT({depth}) failed on {fen}");
}

/// <https://www.chessprogramming.org/Perft_Results>
#[cfg(test)]
mod startpos_perft {
    use super::*;

    const FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

    #[test]
    fn test_startpos_perft_1() {
        test_perft_fen_nodes(1, FEN, 20);
    }

    #[test]
    fn test_startpos_perft_2() {
        test_perft_fen_nodes(2, FEN, 400);
    }

    #[test]
    fn test_startpos_perft_3() {
        test_perft_fen_nodes(3, FEN, 8_902);
    }

    #[test]
    fn test_startpos_perft_4() {
        test_perft_fen_nodes(4, FEN, 197_281);
    }
}

/// "Kiwipete": castling, pins, en passant, and checks all at once.
#[cfg(test)]
mod kiwipete_perft {
    use super::*;

    const FEN: &str = "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1";

    #[test]
    fn test_kiwipete_perft_1() {
        test_perft_fen_nodes(1, FEN, 48);
    }

    #[test]
    fn test_kiwipete_perft_2() {
        test_perft_fen_nodes(2, FEN, 2_039);
    }

    #[test]
    fn test_kiwipete_perft_3() {
        test_perft_fen_nodes(3, FEN, 97_862);
    }

    #[test]
    fn test_kiwipete_perft_4() {
        test_perft_fen_nodes(4, FEN, 4_085_603);
    }
}

/// An endgame heavy on en-passant and promotion edge cases.
#[cfg(test)]
mod position_3_perft {
    use super::*;

    const FEN: &str = "8/2p5/3p4/KP5r/1R3p1k/8/4P1P1/8 w - - 0 1";

    #[test]
    fn test_position_3_perft_1() {
        test_perft_fen_nodes(1, FEN, 14);
    }

    #[test]
    fn test_position_3_perft_2() {
        test_perft_fen_nodes(2, FEN, 191);
    }

    #[test]
    fn test_position_3_perft_3() {
        test_perft_fen_nodes(3, FEN, 2_812);
    }

    #[test]
    fn test_position_3_perft_4() {
        test_perft_fen_nodes(4, FEN, 43_238);
    }
}

/// A promotion-rich middlegame with castling rights for one side only.
#[cfg(test)]
mod position_4_perft {
    use super::*;

    const FEN: &str = "r3k2r/Pppp1ppp/1b3nbN/nP6/BBP1P3/q4N2/Pp1P2PP/R2Q1RK1 w kq - 0 1";

    #[test]
    fn test_position_4_perft_1() {
        test_perft_fen_nodes(1, FEN, 6);
    }

    #[test]
    fn test_position_4_perft_2() {
        test_perft_fen_nodes(2, FEN, 264);
    }

    #[test]
    fn test_position_4_perft_3() {
        test_perft_fen_nodes(3, FEN, 9_467);
    }

    #[test]
    fn test_position_4_perft_4() {
        test_perft_fen_nodes(4, FEN, 422_333);
    }
}
