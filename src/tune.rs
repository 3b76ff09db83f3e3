/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

/// Value floor for moves considered at the quiescence horizon.
macro_rules! qs {
    () => {
        40
    };
}
pub(crate) use qs;

/// How quickly the quiescence value floor falls off with remaining depth.
macro_rules! qs_a {
    () => {
        140
    };
}
pub(crate) use qs_a;

/// Convergence tolerance of the bisection on the root score.
macro_rules! eval_roughness {
    () => {
        15
    };
}
pub(crate) use eval_roughness;

/// Fraction of the remaining clock to spend on one move.
macro_rules! time_divisor {
    () => {
        40
    };
}
pub(crate) use time_divisor;

/// Safety floor on the per-move time budget, in milliseconds.
macro_rules! min_think_ms {
    () => {
        10
    };
}
pub(crate) use min_think_ms;

/// Longest principal variation worth reporting.
macro_rules! max_pv_length {
    () => {
        16
    };
}
pub(crate) use max_pv_length;

/// Default depth at which to run the benchmark searches.
macro_rules! bench_depth {
    () => {
        6
    };
}
pub(crate) use bench_depth;
