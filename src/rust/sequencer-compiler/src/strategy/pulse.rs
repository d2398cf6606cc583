// Copyright 2026 the sequencer-compiler developers
// SPDX-License-Identifier: BSD-3-Clause

//! Strategies for operations that produce AWG output.

use q1asm::constants::{GRID_TIME, IMMEDIATE_SZ_GAIN};
use q1asm::{Q1asmProgram, instructions};

use crate::hw_properties::IoMode;
use crate::ops::{OpData, OpInfo};
use crate::strategy::OperationStrategy;
use crate::time;
use crate::waveforms::{self, WaveformDict};
use crate::{Error, Result};

/// Plays an arbitrary-shape pulse: waveform memory for both paths plus a
/// `set_awg_gain`/`play` pair.
pub struct GenericPulseStrategy {
    op_info: OpInfo,
    io_mode: IoMode,
    waveform_indices: Option<(u32, u32)>,
    gains: (f64, f64),
}

impl GenericPulseStrategy {
    pub fn new(op_info: OpInfo, io_mode: IoMode) -> Self {
        Self {
            op_info,
            io_mode,
            waveform_indices: None,
            gains: (0.0, 0.0),
        }
    }
}

impl OperationStrategy for GenericPulseStrategy {
    fn op_info(&self) -> &OpInfo {
        &self.op_info
    }

    fn generate_data(&mut self, wf_dict: &mut WaveformDict) -> Result<()> {
        let OpData::Pulse(info) = &self.op_info.data else {
            unreachable!("constructed from a pulse payload");
        };
        let samples = waveforms::sample_pulse(info);
        let (path0, path1, gain0, gain1) = waveforms::normalize_paths(&samples);

        if matches!(self.io_mode, IoMode::Real | IoMode::Imag)
            && path1.iter().any(|v| *v != 0.0)
        {
            return Err(Error::Config(format!(
                "complex-valued pulse {} assigned to a real-valued sequencer path",
                self.op_info
            )));
        }

        let (path0, path1) = match self.io_mode {
            // The second DAC path carries the data for imaginary I/Os.
            IoMode::Imag => (path1, path0),
            _ => (path0, path1),
        };
        let idx0 = wf_dict.insert(path0);
        let idx1 = wf_dict.insert(path1);
        self.waveform_indices = Some((idx0, idx1));
        self.gains = match self.io_mode {
            IoMode::Imag => (gain1, gain0),
            _ => (gain0, gain1),
        };
        Ok(())
    }

    fn insert_qasm(&mut self, qasm: &mut Q1asmProgram) -> Result<()> {
        let (idx0, idx1) = self.waveform_indices.ok_or_else(|| {
            Error::Config(format!(
                "pulse {} reached instruction emission without its waveform data",
                self.op_info
            ))
        })?;
        let gain0 =
            Q1asmProgram::expand_from_normalised_range(self.gains.0, IMMEDIATE_SZ_GAIN, "awg_gain_path_0")?;
        let gain1 =
            Q1asmProgram::expand_from_normalised_range(self.gains.1, IMMEDIATE_SZ_GAIN, "awg_gain_path_1")?;
        qasm.emit_with_comment(
            instructions::SET_AWG_GAIN,
            &[&gain0, &gain1],
            Some(format!("setting gain for {}", self.op_info.name)),
        );
        qasm.emit(instructions::PLAY, &[&idx0, &idx1, &GRID_TIME]);
        qasm.elapsed_time += GRID_TIME;
        // The program only advances past the play once the wave is done, so
        // the residual wait at the loop end stays in sync across sequencers.
        let remainder = time::round_to_ns(self.op_info.duration()) - GRID_TIME;
        qasm.auto_wait(remainder.max(0), true, None)?;
        Ok(())
    }
}

/// Drives the marker line of the pinned output high for the pulse duration.
pub struct MarkerPulseStrategy {
    op_info: OpInfo,
}

impl MarkerPulseStrategy {
    pub fn new(op_info: OpInfo) -> Self {
        Self { op_info }
    }
}

impl OperationStrategy for MarkerPulseStrategy {
    fn op_info(&self) -> &OpInfo {
        &self.op_info
    }

    fn insert_qasm(&mut self, qasm: &mut Q1asmProgram) -> Result<()> {
        let output = match &self.op_info.data {
            OpData::MarkerPulse { output, .. } => *output,
            _ => None,
        }
        .ok_or_else(|| {
            Error::Config(format!(
                "marker pulse {} has no output assigned; digital sequencers pin \
                 their single output during data distribution",
                self.op_info
            ))
        })?;
        let duration_ns = time::round_to_ns(self.op_info.duration());
        if duration_ns < 2 * GRID_TIME {
            return Err(Error::Config(format!(
                "marker pulse {} is shorter than the {} ns needed to raise and \
                 lower the marker",
                self.op_info,
                2 * GRID_TIME
            )));
        }
        let marker = 1u32 << output;
        qasm.emit_with_comment(
            instructions::SET_MARKER,
            &[&marker],
            Some(format!("set marker for output {output}")),
        );
        qasm.emit(instructions::UPDATE_PARAMETERS, &[&GRID_TIME]);
        qasm.elapsed_time += GRID_TIME;
        qasm.auto_wait(duration_ns - 2 * GRID_TIME, true, None)?;
        qasm.emit_with_comment(
            instructions::SET_MARKER,
            &[&0u32],
            Some(format!("reset marker for output {output}")),
        );
        qasm.emit(instructions::UPDATE_PARAMETERS, &[&GRID_TIME]);
        qasm.elapsed_time += GRID_TIME;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::{PortClock, PulseInfo, PulseShape};
    use q1asm::RegisterArena;

    fn square_op(amp: f64) -> OpInfo {
        OpInfo {
            name: "SquarePulse".to_string(),
            timing: 0.0,
            port_clock: PortClock::new("q0:mw", "q0.01"),
            data: OpData::Pulse(PulseInfo {
                shape: PulseShape::Square { amp },
                duration: 16e-9,
                phase: 0.0,
                output: None,
            }),
        }
    }

    #[test]
    fn test_pulse_emits_gain_play_and_fill() {
        let mut strategy = GenericPulseStrategy::new(square_op(0.5), IoMode::Complex);
        let mut wf_dict = WaveformDict::new();
        strategy.generate_data(&mut wf_dict).unwrap();
        assert_eq!(wf_dict.total_samples(), 32);

        let mut qasm = Q1asmProgram::new(RegisterArena::new());
        strategy.insert_qasm(&mut qasm).unwrap();
        let mnemonics: Vec<_> = qasm.statements().iter().map(|s| s.instruction).collect();
        assert_eq!(
            mnemonics,
            vec![instructions::SET_AWG_GAIN, instructions::PLAY, instructions::WAIT]
        );
        // Elapsed time covers the full pulse duration.
        assert_eq!(qasm.elapsed_time, 16);
    }

    #[test]
    fn test_pulse_without_waveform_data_is_an_error() {
        let mut strategy = GenericPulseStrategy::new(square_op(0.5), IoMode::Complex);
        let mut qasm = Q1asmProgram::new(RegisterArena::new());
        assert!(matches!(
            strategy.insert_qasm(&mut qasm),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_complex_pulse_rejected_on_real_path() {
        let op = OpInfo {
            data: OpData::Pulse(PulseInfo {
                shape: PulseShape::Square { amp: 1.0 },
                duration: 16e-9,
                phase: 90.0,
                output: None,
            }),
            ..square_op(1.0)
        };
        let mut strategy = GenericPulseStrategy::new(op, IoMode::Real);
        let mut wf_dict = WaveformDict::new();
        assert!(matches!(
            strategy.generate_data(&mut wf_dict),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_marker_pulse_raises_and_lowers() {
        let op = OpInfo {
            name: "MarkerPulse".to_string(),
            timing: 0.0,
            port_clock: PortClock::new("q0:switch", "digital"),
            data: OpData::MarkerPulse {
                duration: 100e-9,
                output: Some(2),
            },
        };
        let mut strategy = MarkerPulseStrategy::new(op);
        let mut qasm = Q1asmProgram::new(RegisterArena::new());
        strategy.insert_qasm(&mut qasm).unwrap();
        assert_eq!(qasm.statements()[0].arguments, vec!["4"]); // 1 << 2
        assert_eq!(qasm.elapsed_time, 100);
    }
}
