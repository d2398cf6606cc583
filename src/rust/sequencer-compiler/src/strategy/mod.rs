// Copyright 2026 the sequencer-compiler developers
// SPDX-License-Identifier: BSD-3-Clause

//! Polymorphic handling of one operation kind: materializing sample data
//! and emitting the corresponding instructions.
//!
//! The set of strategies is closed; [`strategy_for_op`] is the single
//! dispatch point from operation payload to strategy, which keeps the
//! supported protocols explicit and exhaustively checkable.

mod acquisition;
mod pulse;
mod virtual_ops;

pub use acquisition::{
    SquareAcquisitionStrategy, TriggerCountAcquisitionStrategy, WeightedAcquisitionStrategy,
};
pub use pulse::{GenericPulseStrategy, MarkerPulseStrategy};
pub use virtual_ops::{
    AwgOffsetStrategy, IdleStrategy, NcoPhaseShiftStrategy, NcoResetClockPhaseStrategy,
    NcoSetClockFrequencyStrategy, UpdateParameterStrategy,
};

use q1asm::{Q1asmProgram, Register};

use crate::hw_properties::IoMode;
use crate::ops::{AcquisitionProtocol, BinMode, OpData, OpInfo};
use crate::waveforms::WaveformDict;
use crate::{Error, Result};

pub trait OperationStrategy {
    fn op_info(&self) -> &OpInfo;

    /// Materializes waveform or weight sample data into the sequencer's
    /// waveform memory. Strategies without sample data do nothing.
    fn generate_data(&mut self, _wf_dict: &mut WaveformDict) -> Result<()> {
        Ok(())
    }

    /// Emits the instructions for this operation.
    fn insert_qasm(&mut self, qasm: &mut Q1asmProgram) -> Result<()>;

    /// Hands an append-mode acquisition its bin-index register. A no-op for
    /// everything else.
    fn set_bin_index_register(&mut self, _register: Register) {}
}

/// Pure dispatch from operation payload to strategy.
pub fn strategy_for_op(op: OpInfo, io_mode: IoMode) -> Result<Box<dyn OperationStrategy>> {
    match &op.data {
        OpData::Pulse(_) => {
            if io_mode == IoMode::Digital {
                Err(Error::Config(format!(
                    "analog pulse {op} assigned to a digital sequencer"
                )))
            } else {
                Ok(Box::new(GenericPulseStrategy::new(op, io_mode)))
            }
        }
        OpData::MarkerPulse { .. } => Ok(Box::new(MarkerPulseStrategy::new(op))),
        OpData::Acquisition(info) => match (info.protocol, info.bin_mode) {
            (AcquisitionProtocol::Trace, BinMode::Append)
            | (AcquisitionProtocol::LoopedPeriodicAcquisition, BinMode::Append) => {
                Err(Error::Config(format!(
                    "unsupported acquisition protocol {:?} with bin mode {:?} for {op}",
                    info.protocol, info.bin_mode
                )))
            }
            (AcquisitionProtocol::WeightedIntegratedComplex, _) => {
                Ok(Box::new(WeightedAcquisitionStrategy::new(op)))
            }
            (AcquisitionProtocol::TriggerCount, _) => {
                Ok(Box::new(TriggerCountAcquisitionStrategy::new(op)))
            }
            _ => Ok(Box::new(SquareAcquisitionStrategy::new(op))),
        },
        OpData::Offset(_) => Ok(Box::new(AwgOffsetStrategy::new(op))),
        OpData::NcoPhaseShift { .. } => Ok(Box::new(NcoPhaseShiftStrategy::new(op))),
        OpData::NcoResetClockPhase => Ok(Box::new(NcoResetClockPhaseStrategy::new(op))),
        OpData::SetClockFrequency(_) => Ok(Box::new(NcoSetClockFrequencyStrategy::new(op))),
        OpData::UpdateParameters => Ok(Box::new(UpdateParameterStrategy::new(op))),
        OpData::IdlePulse { .. } => Ok(Box::new(IdleStrategy::new(op))),
    }
}
