// Copyright 2026 the sequencer-compiler developers
// SPDX-License-Identifier: BSD-3-Clause

//! Strategies for operations that store data into acquisition bins.

use q1asm::constants::GRID_TIME;
use q1asm::{Q1asmProgram, Register, instructions};

use crate::ops::{BinMode, OpData, OpInfo};
use crate::strategy::OperationStrategy;
use crate::time;
use crate::waveforms::{self, WaveformDict};
use crate::{Error, Result};

/// Bin argument of an acquire instruction: a fixed bin for averaging, a
/// register for append mode.
enum BinRef {
    Immediate(u64),
    Register(Register),
}

impl std::fmt::Display for BinRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BinRef::Immediate(index) => write!(f, "{index}"),
            BinRef::Register(register) => write!(f, "{register}"),
        }
    }
}

fn bin_ref(op_info: &OpInfo, register: Option<Register>) -> Result<BinRef> {
    let OpData::Acquisition(info) = &op_info.data else {
        unreachable!("constructed from an acquisition payload");
    };
    match info.bin_mode {
        BinMode::Average => Ok(BinRef::Immediate(info.acq_index)),
        BinMode::Append => register.map(BinRef::Register).ok_or_else(|| {
            Error::Config(format!(
                "append-mode acquisition {op_info} was not assigned a bin-index register"
            ))
        }),
    }
}

/// Emits the `add` that advances an append-mode bin register to the next
/// shot's bin.
fn increment_bin(qasm: &mut Q1asmProgram, register: Register, acq_channel: u64) {
    qasm.emit_with_comment(
        instructions::ADD,
        &[&register, &1u32, &register],
        Some(format!("increment bin index for ch{acq_channel}")),
    );
}

/// Untriggered single-input acquisition: trace, single-sideband
/// integration, thresholding and the looped periodic protocol all reduce
/// to one `acquire`.
pub struct SquareAcquisitionStrategy {
    op_info: OpInfo,
    bin_index_register: Option<Register>,
}

impl SquareAcquisitionStrategy {
    pub fn new(op_info: OpInfo) -> Self {
        Self {
            op_info,
            bin_index_register: None,
        }
    }
}

impl OperationStrategy for SquareAcquisitionStrategy {
    fn op_info(&self) -> &OpInfo {
        &self.op_info
    }

    fn insert_qasm(&mut self, qasm: &mut Q1asmProgram) -> Result<()> {
        let OpData::Acquisition(info) = &self.op_info.data else {
            unreachable!("constructed from an acquisition payload");
        };
        let bin = bin_ref(&self.op_info, self.bin_index_register)?;
        qasm.emit_with_comment(
            instructions::ACQUIRE,
            &[&info.acq_channel, &bin, &GRID_TIME],
            Some(format!("acquisition of {}", self.op_info.name)),
        );
        if let BinRef::Register(register) = bin {
            increment_bin(qasm, register, info.acq_channel);
        }
        qasm.elapsed_time += GRID_TIME;
        let remainder = time::round_to_ns(self.op_info.duration()) - GRID_TIME;
        qasm.auto_wait(remainder.max(0), true, None)?;
        Ok(())
    }

    fn set_bin_index_register(&mut self, register: Register) {
        self.bin_index_register = Some(register);
    }
}

/// Integration against a pair of stored weight waveforms.
pub struct WeightedAcquisitionStrategy {
    op_info: OpInfo,
    weight_indices: Option<(u32, u32)>,
    bin_index_register: Option<Register>,
}

impl WeightedAcquisitionStrategy {
    pub fn new(op_info: OpInfo) -> Self {
        Self {
            op_info,
            weight_indices: None,
            bin_index_register: None,
        }
    }
}

impl OperationStrategy for WeightedAcquisitionStrategy {
    fn op_info(&self) -> &OpInfo {
        &self.op_info
    }

    fn generate_data(&mut self, wf_dict: &mut WaveformDict) -> Result<()> {
        let OpData::Acquisition(info) = &self.op_info.data else {
            unreachable!("constructed from an acquisition payload");
        };
        let [weight_i, weight_q] = info.weights.as_slice() else {
            return Err(Error::Config(format!(
                "weighted acquisition {} requires exactly two integration \
                 weights, got {}",
                self.op_info,
                info.weights.len()
            )));
        };
        let path0: Vec<f64> = waveforms::sample_pulse(weight_i)
            .iter()
            .map(|s| s.re)
            .collect();
        let path1: Vec<f64> = waveforms::sample_pulse(weight_q)
            .iter()
            .map(|s| s.re)
            .collect();
        let idx0 = wf_dict.insert(path0);
        let idx1 = wf_dict.insert(path1);
        self.weight_indices = Some((idx0, idx1));
        Ok(())
    }

    fn insert_qasm(&mut self, qasm: &mut Q1asmProgram) -> Result<()> {
        let OpData::Acquisition(info) = &self.op_info.data else {
            unreachable!("constructed from an acquisition payload");
        };
        let acq_channel = info.acq_channel;
        let (idx0, idx1) = self.weight_indices.ok_or_else(|| {
            Error::Config(format!(
                "weighted acquisition {} reached instruction emission without \
                 its integration weights",
                self.op_info
            ))
        })?;
        let bin = bin_ref(&self.op_info, self.bin_index_register)?;
        let comment = format!("weighted acquisition of {}", self.op_info.name);
        match bin {
            BinRef::Immediate(_) => {
                qasm.emit_with_comment(
                    instructions::ACQUIRE_WEIGHED,
                    &[&acq_channel, &bin, &idx0, &idx1, &GRID_TIME],
                    Some(comment),
                );
            }
            BinRef::Register(bin_register) => {
                // The register form of acquire_weighed takes the weight
                // indices as registers as well.
                let weight0 = qasm.registers_mut().allocate()?;
                let weight1 = qasm.registers_mut().allocate()?;
                qasm.emit(instructions::MOVE, &[&idx0, &weight0]);
                qasm.emit(instructions::MOVE, &[&idx1, &weight1]);
                qasm.emit_with_comment(
                    instructions::ACQUIRE_WEIGHED,
                    &[&acq_channel, &bin_register, &weight0, &weight1, &GRID_TIME],
                    Some(comment),
                );
                increment_bin(qasm, bin_register, acq_channel);
                qasm.registers_mut().free(weight1)?;
                qasm.registers_mut().free(weight0)?;
            }
        }
        qasm.elapsed_time += GRID_TIME;
        let remainder = time::round_to_ns(self.op_info.duration()) - GRID_TIME;
        qasm.auto_wait(remainder.max(0), true, None)?;
        Ok(())
    }

    fn set_bin_index_register(&mut self, register: Register) {
        self.bin_index_register = Some(register);
    }
}

/// Counts input triggers over a gate window: `acquire_ttl` arms the
/// counter at the window start and disarms it at the end.
pub struct TriggerCountAcquisitionStrategy {
    op_info: OpInfo,
    bin_index_register: Option<Register>,
}

impl TriggerCountAcquisitionStrategy {
    pub fn new(op_info: OpInfo) -> Self {
        Self {
            op_info,
            bin_index_register: None,
        }
    }
}

impl OperationStrategy for TriggerCountAcquisitionStrategy {
    fn op_info(&self) -> &OpInfo {
        &self.op_info
    }

    fn insert_qasm(&mut self, qasm: &mut Q1asmProgram) -> Result<()> {
        let OpData::Acquisition(info) = &self.op_info.data else {
            unreachable!("constructed from an acquisition payload");
        };
        let duration_ns = time::round_to_ns(self.op_info.duration());
        if duration_ns < 2 * GRID_TIME {
            return Err(Error::Config(format!(
                "trigger count acquisition {} is shorter than the {} ns needed \
                 to arm and disarm the counter",
                self.op_info,
                2 * GRID_TIME
            )));
        }
        let bin = bin_ref(&self.op_info, self.bin_index_register)?;
        qasm.emit_with_comment(
            instructions::ACQUIRE_TTL,
            &[&info.acq_channel, &bin, &1u32, &GRID_TIME],
            Some(format!("start trigger count of {}", self.op_info.name)),
        );
        qasm.elapsed_time += GRID_TIME;
        qasm.auto_wait(duration_ns - 2 * GRID_TIME, true, None)?;
        qasm.emit_with_comment(
            instructions::ACQUIRE_TTL,
            &[&info.acq_channel, &bin, &0u32, &GRID_TIME],
            Some(format!("end trigger count of {}", self.op_info.name)),
        );
        if let BinRef::Register(register) = bin {
            increment_bin(qasm, register, info.acq_channel);
        }
        qasm.elapsed_time += GRID_TIME;
        Ok(())
    }

    fn set_bin_index_register(&mut self, register: Register) {
        self.bin_index_register = Some(register);
    }
}
