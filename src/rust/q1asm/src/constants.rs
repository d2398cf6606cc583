// Copyright 2026 the sequencer-compiler developers
// SPDX-License-Identifier: BSD-3-Clause

//! Timing and immediate-range constants of the Q1 sequence processor.

use crate::TimeNs;

/// Minimum schedulable tick of the sequencer instruction timing, in ns.
pub const GRID_TIME: TimeNs = 4;

/// Largest wait that fits a single `wait` immediate, kept a multiple of
/// [`GRID_TIME`].
pub const IMMEDIATE_MAX_WAIT_TIME: TimeNs = (1 << 16) - GRID_TIME;

/// Size of the signed immediate used by `set_awg_gain`.
pub const IMMEDIATE_SZ_GAIN: i64 = 1 << 16;
/// Size of the signed immediate used by `set_awg_offs`.
pub const IMMEDIATE_SZ_OFFSET: i64 = 1 << 16;

/// NCO phase immediates are expressed in steps of 1e9 per 360 degrees.
pub const NCO_PHASE_STEPS_PER_DEG: f64 = 1e9 / 360.0;
/// NCO frequency immediates are expressed in steps of 0.25 Hz.
pub const NCO_FREQ_STEPS_PER_HZ: f64 = 4.0;
/// The NCO spans [-500 MHz, 500 MHz], i.e. 2e9 steps total.
pub const NCO_FREQ_LIMIT_STEPS: i64 = 2_000_000_000;
/// Wait applied after `set_freq` before the change is guaranteed active.
pub const NCO_SET_FREQ_WAIT: TimeNs = 8;
/// Wait applied after `set_ph_delta` before the change is guaranteed active.
pub const NCO_SET_PH_DELTA_WAIT: TimeNs = 8;

/// Scratch registers available to one sequencer.
pub const REGISTER_COUNT: usize = 64;
