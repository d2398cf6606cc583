// Copyright 2026 the sequencer-compiler developers
// SPDX-License-Identifier: BSD-3-Clause

//! Hardware resource ceilings and timing constants.

pub use q1asm::constants::GRID_TIME;
use q1asm::TimeNs;

/// Sampling rate of the AWG and acquisition paths, in samples per second.
pub const SAMPLING_RATE: f64 = 1e9;

/// Waveform memory shared by all waveforms of one sequencer, in samples.
pub const MAX_SAMPLE_SIZE_WAVEFORMS: usize = 16384;

/// Maximum number of acquisition bins of one sequencer.
pub const MAX_NUMBER_OF_BINS: u64 = 131072;

/// Advisory instruction-memory ceilings per module type. Exceeding them is
/// logged, not fatal: the hardware is the final arbiter.
pub const MAX_NUMBER_OF_INSTRUCTIONS_QCM: usize = 16384;
pub const MAX_NUMBER_OF_INSTRUCTIONS_QRM: usize = 12288;

/// Number of sequencers per module.
pub const NUMBER_OF_SEQUENCERS_QCM: usize = 6;
pub const NUMBER_OF_SEQUENCERS_QRM: usize = 6;

/// Relative tolerance used when comparing resolved frequencies.
pub const FREQUENCY_REL_TOLERANCE: f64 = 1e-6;

/// Minimum spacing between acquisition starts on one sequencer, in ns.
/// Closer acquisitions are logged, not rejected: short integration windows
/// can legitimately go below this on some module revisions.
pub const MIN_TIME_BETWEEN_ACQUISITIONS: TimeNs = 300;
