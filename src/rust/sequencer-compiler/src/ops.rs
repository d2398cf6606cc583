// Copyright 2026 the sequencer-compiler developers
// SPDX-License-Identifier: BSD-3-Clause

//! Immutable records describing one scheduled hardware-level event.

use num_complex::Complex64;
use q1asm::TimeNs;
use serde::Serialize;

use crate::time;

/// The addressing pair an operation targets. The port is `None` for
/// clock-only operations (e.g. setting a clock frequency), which address
/// every sequencer using that clock.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PortClock {
    pub port: Option<String>,
    pub clock: String,
}

impl PortClock {
    pub fn new(port: impl Into<String>, clock: impl Into<String>) -> Self {
        Self {
            port: Some(port.into()),
            clock: clock.into(),
        }
    }

    pub fn clock_only(clock: impl Into<String>) -> Self {
        Self {
            port: None,
            clock: clock.into(),
        }
    }

    /// The `"port-clock"` key used by the latency- and distortion-correction
    /// tables of the hardware configuration.
    pub fn key(&self) -> String {
        format!("{}-{}", self.port.as_deref().unwrap_or("None"), self.clock)
    }
}

impl std::fmt::Display for PortClock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.key())
    }
}

/// Waveform shapes a pulse can carry. Numerical samples cover everything
/// the closed shape set does not.
#[derive(Debug, Clone, PartialEq)]
pub enum PulseShape {
    Square { amp: f64 },
    Ramp { amp: f64 },
    SoftSquare { amp: f64 },
    Samples { samples: Vec<Complex64> },
}

#[derive(Debug, Clone, PartialEq)]
pub struct PulseInfo {
    pub shape: PulseShape,
    pub duration: f64,
    /// Phase rotation applied to the sampled waveform, in degrees.
    pub phase: f64,
    /// Output index, pinned during distribution for digital-mode sequencers.
    pub output: Option<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum AcquisitionProtocol {
    Trace,
    SsbIntegrationComplex,
    WeightedIntegratedComplex,
    ThresholdedAcquisition,
    TriggerCount,
    LoopedPeriodicAcquisition,
}

/// Acquisition accumulation policy: one new bin per shot, or accumulation
/// into a fixed bin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum BinMode {
    Average,
    Append,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AcquisitionInfo {
    pub protocol: AcquisitionProtocol,
    pub bin_mode: BinMode,
    pub acq_channel: u64,
    pub acq_index: u64,
    pub duration: f64,
    /// Integration weights, for the weighted protocol.
    pub weights: Vec<PulseInfo>,
    /// Sample count override for the looped periodic protocol.
    pub num_times: Option<u64>,
    pub acq_rotation: Option<f64>,
    pub acq_threshold: Option<f64>,
    pub integration_length: Option<f64>,
}

/// Bare AWG offset write. Takes effect only once a parameter update (or a
/// play/acquire) follows.
#[derive(Debug, Clone, PartialEq)]
pub struct OffsetInfo {
    pub offset_path_0: f64,
    pub offset_path_1: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SetClockFrequency {
    pub clock_freq_new: f64,
    /// Backfilled from the schedule resources before sequencer distribution.
    pub clock_freq_old: Option<f64>,
    /// Backfilled from the owning sequencer before distribution.
    pub interm_freq_old: Option<f64>,
}

/// Protocol-specific payload of one operation.
#[derive(Debug, Clone, PartialEq)]
pub enum OpData {
    Pulse(PulseInfo),
    /// Digital marker pulse; drives the marker line of the pinned output.
    /// The output index is filled in during sequencer distribution.
    MarkerPulse { duration: f64, output: Option<u8> },
    Acquisition(AcquisitionInfo),
    Offset(OffsetInfo),
    NcoPhaseShift { phase_shift: f64 },
    NcoResetClockPhase,
    SetClockFrequency(SetClockFrequency),
    UpdateParameters,
    IdlePulse { duration: f64 },
}

/// One scheduled hardware-level event, attributed to a port-clock.
///
/// `timing` is relative to the start of one repetition of the compiled
/// program and never negative after latency correction. Instances are
/// consumed read-only; the only permitted mutation is the frequency
/// backfill of [`OpData::SetClockFrequency`].
#[derive(Debug, Clone, PartialEq)]
pub struct OpInfo {
    pub name: String,
    pub timing: f64,
    pub port_clock: PortClock,
    pub data: OpData,
}

impl OpInfo {
    pub fn duration(&self) -> f64 {
        match &self.data {
            OpData::Pulse(info) => info.duration,
            OpData::MarkerPulse { duration, .. } => *duration,
            OpData::Acquisition(info) => info.duration,
            OpData::IdlePulse { duration } => *duration,
            OpData::Offset(_)
            | OpData::NcoPhaseShift { .. }
            | OpData::NcoResetClockPhase
            | OpData::SetClockFrequency(_)
            | OpData::UpdateParameters => 0.0,
        }
    }

    pub fn is_acquisition(&self) -> bool {
        matches!(self.data, OpData::Acquisition(_))
    }

    /// Whether this operation occupies the real-time I/O pipeline. At equal
    /// timing these are emitted after any virtual/offset instruction, so
    /// that parameter writes take effect before the I/O they precede.
    pub fn is_real_time_io_operation(&self) -> bool {
        matches!(
            self.data,
            OpData::Pulse(_)
                | OpData::MarkerPulse { .. }
                | OpData::Acquisition(_)
                | OpData::UpdateParameters
        )
    }

    pub fn is_offset_instruction(&self) -> bool {
        matches!(self.data, OpData::Offset(_))
    }

    /// Timing rounded to whole nanoseconds, the resolution at which
    /// operations are ordered.
    pub fn rounded_timing_ns(&self) -> TimeNs {
        time::round_to_ns(self.timing)
    }
}

impl std::fmt::Display for OpInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} (t={:e} s, d={:e} s, {})",
            self.name,
            self.timing,
            self.duration(),
            self.port_clock
        )
    }
}
