// Copyright 2026 the sequencer-compiler developers
// SPDX-License-Identifier: BSD-3-Clause

//! Strategies for zero-duration operations: parameter writes and NCO
//! control. None of these touch waveform memory.

use q1asm::constants::{
    GRID_TIME, IMMEDIATE_SZ_OFFSET, NCO_FREQ_LIMIT_STEPS, NCO_FREQ_STEPS_PER_HZ,
    NCO_PHASE_STEPS_PER_DEG, NCO_SET_FREQ_WAIT, NCO_SET_PH_DELTA_WAIT,
};
use q1asm::{Q1asmProgram, instructions};

use crate::ops::{OpData, OpInfo};
use crate::strategy::OperationStrategy;
use crate::{Error, Result};

/// Bare AWG offset write. The new offset takes effect at the next
/// parameter update, which the schedule provides separately.
pub struct AwgOffsetStrategy {
    op_info: OpInfo,
}

impl AwgOffsetStrategy {
    pub fn new(op_info: OpInfo) -> Self {
        Self { op_info }
    }
}

impl OperationStrategy for AwgOffsetStrategy {
    fn op_info(&self) -> &OpInfo {
        &self.op_info
    }

    fn insert_qasm(&mut self, qasm: &mut Q1asmProgram) -> Result<()> {
        let OpData::Offset(info) = &self.op_info.data else {
            unreachable!("constructed from an offset payload");
        };
        let offset0 = Q1asmProgram::expand_from_normalised_range(
            info.offset_path_0,
            IMMEDIATE_SZ_OFFSET,
            "offset_path_0",
        )?;
        let offset1 = Q1asmProgram::expand_from_normalised_range(
            info.offset_path_1,
            IMMEDIATE_SZ_OFFSET,
            "offset_path_1",
        )?;
        qasm.emit_with_comment(
            instructions::SET_AWG_OFFSET,
            &[&offset0, &offset1],
            Some(format!("setting offset for {}", self.op_info.name)),
        );
        Ok(())
    }
}

/// Shifts the NCO phase by a fixed amount. The shift needs a parameter
/// update and a settling period before it is guaranteed active.
pub struct NcoPhaseShiftStrategy {
    op_info: OpInfo,
}

impl NcoPhaseShiftStrategy {
    pub fn new(op_info: OpInfo) -> Self {
        Self { op_info }
    }
}

impl OperationStrategy for NcoPhaseShiftStrategy {
    fn op_info(&self) -> &OpInfo {
        &self.op_info
    }

    fn insert_qasm(&mut self, qasm: &mut Q1asmProgram) -> Result<()> {
        let OpData::NcoPhaseShift { phase_shift } = self.op_info.data else {
            unreachable!("constructed from a phase-shift payload");
        };
        let phase = phase_shift.rem_euclid(360.0);
        if phase == 0.0 {
            return Ok(());
        }
        let steps = (phase * NCO_PHASE_STEPS_PER_DEG).round() as i64;
        qasm.emit_with_comment(
            instructions::SET_NCO_PHASE_OFFSET,
            &[&steps],
            Some(format!("increment nco phase by {phase_shift:.2} deg")),
        );
        qasm.emit(instructions::UPDATE_PARAMETERS, &[&NCO_SET_PH_DELTA_WAIT]);
        qasm.elapsed_time += NCO_SET_PH_DELTA_WAIT;
        Ok(())
    }
}

/// Resets the NCO phase accumulator to zero.
pub struct NcoResetClockPhaseStrategy {
    op_info: OpInfo,
}

impl NcoResetClockPhaseStrategy {
    pub fn new(op_info: OpInfo) -> Self {
        Self { op_info }
    }
}

impl OperationStrategy for NcoResetClockPhaseStrategy {
    fn op_info(&self) -> &OpInfo {
        &self.op_info
    }

    fn insert_qasm(&mut self, qasm: &mut Q1asmProgram) -> Result<()> {
        qasm.emit(instructions::RESET_PHASE, &[]);
        Ok(())
    }
}

/// Retunes the NCO mid-schedule. The local oscillator stays fixed, so a
/// clock frequency change maps one-to-one onto an intermediate frequency
/// change.
pub struct NcoSetClockFrequencyStrategy {
    op_info: OpInfo,
}

impl NcoSetClockFrequencyStrategy {
    pub fn new(op_info: OpInfo) -> Self {
        Self { op_info }
    }
}

impl OperationStrategy for NcoSetClockFrequencyStrategy {
    fn op_info(&self) -> &OpInfo {
        &self.op_info
    }

    fn insert_qasm(&mut self, qasm: &mut Q1asmProgram) -> Result<()> {
        let OpData::SetClockFrequency(info) = &self.op_info.data else {
            unreachable!("constructed from a clock-frequency payload");
        };
        let clock_freq_old = match info.clock_freq_old {
            Some(freq) if !freq.is_nan() => freq,
            _ => {
                return Err(Error::Frequency(format!(
                    "{} has no current clock frequency to retune from; the \
                     schedule must define the clock resource",
                    self.op_info
                )));
            }
        };
        let interm_freq_old = info.interm_freq_old.ok_or_else(|| {
            Error::Frequency(format!(
                "{} targets a sequencer whose intermediate frequency is not \
                 resolved",
                self.op_info
            ))
        })?;
        let interm_freq_new = interm_freq_old + info.clock_freq_new - clock_freq_old;
        let steps = (interm_freq_new * NCO_FREQ_STEPS_PER_HZ).round() as i64;
        if steps.abs() > NCO_FREQ_LIMIT_STEPS {
            return Err(Error::Frequency(format!(
                "retuned intermediate frequency {interm_freq_new:e} Hz of {} \
                 is outside the NCO range of [-{limit:e}, {limit:e}] Hz",
                self.op_info,
                limit = NCO_FREQ_LIMIT_STEPS as f64 / NCO_FREQ_STEPS_PER_HZ,
            )));
        }
        qasm.emit_with_comment(
            instructions::SET_FREQUENCY,
            &[&steps],
            Some(format!(
                "set nco frequency to {interm_freq_new:e} Hz"
            )),
        );
        qasm.emit(instructions::UPDATE_PARAMETERS, &[&NCO_SET_FREQ_WAIT]);
        qasm.elapsed_time += NCO_SET_FREQ_WAIT;
        Ok(())
    }
}

/// Explicit parameter update, making any pending offset or marker write
/// take effect.
pub struct UpdateParameterStrategy {
    op_info: OpInfo,
}

impl UpdateParameterStrategy {
    pub fn new(op_info: OpInfo) -> Self {
        Self { op_info }
    }
}

impl OperationStrategy for UpdateParameterStrategy {
    fn op_info(&self) -> &OpInfo {
        &self.op_info
    }

    fn insert_qasm(&mut self, qasm: &mut Q1asmProgram) -> Result<()> {
        qasm.emit(instructions::UPDATE_PARAMETERS, &[&GRID_TIME]);
        qasm.elapsed_time += GRID_TIME;
        Ok(())
    }
}

/// Reserves schedule time without output; the wait to the next operation
/// covers the duration.
pub struct IdleStrategy {
    op_info: OpInfo,
}

impl IdleStrategy {
    pub fn new(op_info: OpInfo) -> Self {
        Self { op_info }
    }
}

impl OperationStrategy for IdleStrategy {
    fn op_info(&self) -> &OpInfo {
        &self.op_info
    }

    fn insert_qasm(&mut self, _qasm: &mut Q1asmProgram) -> Result<()> {
        Ok(())
    }
}
