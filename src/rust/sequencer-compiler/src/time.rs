// Copyright 2026 the sequencer-compiler developers
// SPDX-License-Identifier: BSD-3-Clause

//! Conversion between schedule time (seconds) and the hardware time grid.

use crate::constants::GRID_TIME;
use crate::{Error, Result};
use q1asm::TimeNs;

/// Rounds a time in seconds to whole nanoseconds, absorbing floating-point
/// jitter below the nanosecond.
pub fn round_to_ns(time_s: f64) -> TimeNs {
    (time_s * 1e9).round() as TimeNs
}

/// Converts a time in seconds to nanoseconds on the hardware time grid.
///
/// Times that do not land on the grid cannot be expressed in sequencer
/// instruction timing and are a fatal error.
pub fn to_grid_time_ns(time_s: f64) -> Result<TimeNs> {
    let time_ns = round_to_ns(time_s);
    if time_ns % GRID_TIME != 0 {
        return Err(Error::Timing(format!(
            "time {time_s:e} s ({time_ns} ns) is not a multiple of the sequencer \
             grid time of {GRID_TIME} ns"
        )));
    }
    Ok(time_ns)
}

/// Whether two times in seconds land within half a grid tick of each other,
/// i.e. are co-located as far as instruction timing is concerned.
pub fn is_within_half_grid_time(a_s: f64, b_s: f64) -> bool {
    let half_grid_s = GRID_TIME as f64 / 2.0 * 1e-9;
    (a_s - b_s).abs() < half_grid_s
}
