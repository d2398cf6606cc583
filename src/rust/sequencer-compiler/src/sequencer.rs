// Copyright 2026 the sequencer-compiler developers
// SPDX-License-Identifier: BSD-3-Clause

//! Per-sequencer compilation: one port-clock, one register arena, one
//! Q1ASM program.

use indexmap::IndexMap;
use log::warn;
use serde::Serialize;

use q1asm::constants::GRID_TIME;
use q1asm::{Q1asmProgram, Register, RegisterArena, TimeNs, instructions};

use crate::constants::{
    MAX_NUMBER_OF_BINS, MAX_SAMPLE_SIZE_WAVEFORMS, MIN_TIME_BETWEEN_ACQUISITIONS,
};
use crate::frequency::FrequencySlot;
use crate::hw_properties::{IoMode, StaticHardwareProperties, io_info};
use crate::ops::{
    AcquisitionInfo, AcquisitionProtocol, BinMode, OpData, OpInfo, PortClock,
};
use crate::output::{AcquisitionDeclaration, AcquisitionMetadata, SequencerProgram};
use crate::strategy::{OperationStrategy, strategy_for_op};
use crate::time;
use crate::waveforms::WaveformDict;
use crate::{Error, Result};

/// Settings uploaded to the sequencer alongside the program.
#[derive(Debug, Clone, Serialize)]
pub struct SequencerSettings {
    pub nco_en: bool,
    pub sync_en: bool,
    pub modulation_freq: FrequencySlot,
    pub connected_output_indices: Vec<u8>,
    pub connected_input_indices: Vec<u8>,
    /// Delay before the program body, in seconds.
    pub latency_correction: f64,
    pub integration_length_acq: Option<TimeNs>,
    pub thresholded_acq_rotation: Option<f64>,
    pub thresholded_acq_threshold: Option<f64>,
    pub ttl_acq_auto_bin_incr_en: Option<bool>,
}

pub struct Sequencer {
    pub index: usize,
    pub port_clock: PortClock,
    pub io_name: String,
    pub io_mode: IoMode,
    pub settings: SequencerSettings,
    pub marker_debug: bool,
    instrument: String,
    properties: &'static StaticHardwareProperties,
    strategies: Vec<Box<dyn OperationStrategy>>,
}

impl Sequencer {
    pub fn new(
        instrument: impl Into<String>,
        index: usize,
        port_clock: PortClock,
        io_name: &str,
        properties: &'static StaticHardwareProperties,
        latency_correction: f64,
        marker_debug: bool,
    ) -> Result<Self> {
        let (io_mode, outputs, inputs) = io_info(io_name)?;
        Ok(Self {
            index,
            port_clock,
            io_name: io_name.to_string(),
            io_mode,
            settings: SequencerSettings {
                nco_en: false,
                sync_en: true,
                modulation_freq: FrequencySlot::Unset,
                connected_output_indices: outputs.unwrap_or_default(),
                connected_input_indices: inputs.unwrap_or_default(),
                latency_correction,
                integration_length_acq: None,
                thresholded_acq_rotation: None,
                thresholded_acq_threshold: None,
                ttl_acq_auto_bin_incr_en: None,
            },
            marker_debug,
            instrument: instrument.into(),
            properties,
            strategies: Vec::new(),
        })
    }

    /// The sequencer name used in the compiled output (`seq0`, `seq1`, ...).
    pub fn name(&self) -> String {
        format!("seq{}", self.index)
    }

    pub fn has_data(&self) -> bool {
        !self.strategies.is_empty()
    }

    /// Whether this sequencer performs a raw-trace (scope) acquisition.
    pub fn has_scope_acquisition(&self) -> bool {
        self.strategies.iter().any(|s| {
            matches!(
                &s.op_info().data,
                OpData::Acquisition(info) if info.protocol == AcquisitionProtocol::Trace
            )
        })
    }

    /// Accepts one operation, resolving it to its strategy.
    pub fn add_operation(&mut self, op: OpInfo) -> Result<()> {
        self.strategies.push(strategy_for_op(op, self.io_mode)?);
        Ok(())
    }

    fn context(&self) -> String {
        format!(
            "sequencer {} ({}) of instrument '{}'",
            self.name(),
            self.port_clock,
            self.instrument
        )
    }

    /// Compiles this sequencer into a program, or `None` if it holds no
    /// operations.
    pub fn compile(
        &mut self,
        repetitions: u64,
        total_play_time: f64,
        qasm_hook: Option<&dyn Fn(&mut Q1asmProgram)>,
    ) -> Result<Option<(SequencerProgram, Option<AcquisitionMetadata>)>> {
        if self.strategies.is_empty() {
            return Ok(None);
        }
        // Virtual and offset instructions at the same rounded timing come
        // before real-time I/O, so parameter writes take effect before the
        // play or acquire they precede.
        self.strategies.sort_by_key(|s| {
            (
                s.op_info().rounded_timing_ns(),
                s.op_info().is_real_time_io_operation(),
            )
        });

        let mut previous_acq_start: Option<TimeNs> = None;
        for strategy in &self.strategies {
            let info = strategy.op_info();
            if !info.is_acquisition() {
                continue;
            }
            let start = info.rounded_timing_ns();
            if let Some(previous) = previous_acq_start
                && acquisitions_too_close(previous, start)
            {
                warn!(
                    "'{info}' on {} starts {} ns after the previous acquisition, \
                     closer than the required {MIN_TIME_BETWEEN_ACQUISITIONS} ns; \
                     the acquisition path may deliver corrupted data",
                    self.context(),
                    start - previous
                );
            }
            previous_acq_start = Some(start);
        }

        let mut waveforms = WaveformDict::new();
        let mut weights = WaveformDict::new();
        for strategy in &mut self.strategies {
            let dict = if strategy.op_info().is_acquisition() {
                &mut weights
            } else {
                &mut waveforms
            };
            strategy.generate_data(dict)?;
        }
        for (what, dict) in [("waveform", &waveforms), ("weight", &weights)] {
            if dict.total_samples() > MAX_SAMPLE_SIZE_WAVEFORMS {
                return Err(Error::ResourceLimit(format!(
                    "total {what} size of {} exceeds the memory of {} samples \
                     available to {}",
                    dict.total_samples(),
                    MAX_SAMPLE_SIZE_WAVEFORMS,
                    self.context()
                )));
            }
        }

        let acq_infos: Vec<AcquisitionInfo> = self
            .strategies
            .iter()
            .filter_map(|s| match &s.op_info().data {
                OpData::Acquisition(info) => Some(info.clone()),
                _ => None,
            })
            .collect();
        let (acquisitions, metadata) = self.validate_acquisitions(&acq_infos, repetitions)?;
        self.extract_acq_settings(&acq_infos)?;

        let mut qasm = Q1asmProgram::new(RegisterArena::new());
        qasm.emit_header();
        if self.properties.default_marker != 0 {
            qasm.emit_with_comment(
                instructions::SET_MARKER,
                &[&self.properties.default_marker],
                Some("set default marker".to_string()),
            );
            qasm.emit(instructions::UPDATE_PARAMETERS, &[&GRID_TIME]);
        }

        // Append-mode bin registers persist across repetitions, so they are
        // initialized exactly once, before the loop opens.
        let mut bin_registers: IndexMap<u64, Register> = IndexMap::new();
        for info in &acq_infos {
            if info.bin_mode != BinMode::Append || bin_registers.contains_key(&info.acq_channel)
            {
                continue;
            }
            let register = qasm.registers_mut().allocate()?;
            qasm.emit_with_comment(
                instructions::MOVE,
                &[&0u64, &register],
                Some(format!("initialize bin counter for ch{}", info.acq_channel)),
            );
            bin_registers.insert(info.acq_channel, register);
        }
        for strategy in &mut self.strategies {
            if let OpData::Acquisition(info) = &strategy.op_info().data
                && let Some(register) = bin_registers.get(&info.acq_channel)
            {
                strategy.set_bin_index_register(*register);
            }
        }

        let latency_ns = time::round_to_ns(self.settings.latency_correction);
        if latency_ns % GRID_TIME != 0 {
            warn!(
                "latency correction of {latency_ns} ns for {} is not a multiple \
                 of the grid time of {GRID_TIME} ns; relative timing between \
                 sequencers is not guaranteed stable",
                self.context()
            );
        }
        // A constant grid-time delay on every sequencer keeps the overall
        // correction positive and comparable across sequencers.
        qasm.auto_wait(
            GRID_TIME + latency_ns,
            false,
            Some(format!("latency correction of {GRID_TIME} + {latency_ns} ns")),
        )?;

        let total_play_time_ns = time::to_grid_time_ns(total_play_time)?;
        let context = self.context();
        let marker_debug = self.marker_debug;
        let properties = self.properties;
        let outputs = self.settings.connected_output_indices.clone();
        let strategies = &mut self.strategies;
        qasm.loop_scope("start", repetitions, |qasm| {
            qasm.emit(instructions::RESET_PHASE, &[]);
            qasm.emit(instructions::UPDATE_PARAMETERS, &[&GRID_TIME]);
            // The loop preamble is a constant offset shared by all
            // sequencers; schedule time starts at zero here.
            qasm.elapsed_time = 0;

            let mut previous_end = [TimeNs::MIN; 2];
            for strategy in strategies.iter_mut() {
                let info = strategy.op_info();
                let start = info.rounded_timing_ns();
                if info.is_real_time_io_operation() && info.duration() > 0.0 {
                    let class = usize::from(info.is_acquisition());
                    if start < previous_end[class] {
                        warn!(
                            "'{info}' overlaps the end ({} ns) of a previous \
                             operation on {context}",
                            previous_end[class]
                        );
                    }
                    previous_end[class] =
                        previous_end[class].max(start + time::round_to_ns(info.duration()));
                }

                let wait = start - qasm.elapsed_time;
                if wait < 0 {
                    warn!(
                        "'{info}' on {context} starts {} ns before the previous \
                         instruction finished",
                        -wait
                    );
                } else {
                    qasm.auto_wait(wait, true, None)?;
                }

                let debug_marker = marker_debug
                    .then(|| debug_marker_for(strategy.op_info(), &outputs, properties))
                    .flatten();
                if let Some(marker) = debug_marker {
                    qasm.emit_with_comment(
                        instructions::SET_MARKER,
                        &[&marker],
                        Some("debug marker".to_string()),
                    );
                }
                strategy.insert_qasm(qasm)?;
                if debug_marker.is_some() {
                    qasm.emit_with_comment(
                        instructions::SET_MARKER,
                        &[&properties.default_marker],
                        Some("reset debug marker".to_string()),
                    );
                    // The reset only latches on the next parameter update,
                    // which may otherwise be arbitrarily far away.
                    qasm.emit(instructions::UPDATE_PARAMETERS, &[&GRID_TIME]);
                    qasm.elapsed_time += GRID_TIME;
                }
            }

            let residual = total_play_time_ns - qasm.elapsed_time;
            if residual < 0 {
                return Err(Error::Timing(format!(
                    "the schedule on {context} runs {} ns past the declared \
                     total play time of {total_play_time_ns} ns",
                    -residual
                )));
            }
            qasm.auto_wait(residual, false, Some("wait to the schedule end".to_string()))?;
            Ok(())
        })?;
        qasm.emit_with_comment(instructions::STOP, &[], Some("stop the sequence".to_string()));

        if let Some(hook) = qasm_hook {
            hook(&mut qasm);
        }
        if qasm.len() > self.properties.max_instructions {
            warn!(
                "program of {} has {} instructions, exceeding the advisory \
                 ceiling of {} for this module type",
                self.context(),
                qasm.len(),
                self.properties.max_instructions
            );
        }

        let program = SequencerProgram {
            program: qasm.to_string(),
            waveforms,
            weights,
            acquisitions,
            settings: self.settings.clone(),
        };
        Ok(Some((program, metadata)))
    }

    fn validate_acquisitions(
        &self,
        acq_infos: &[AcquisitionInfo],
        repetitions: u64,
    ) -> Result<(IndexMap<u64, AcquisitionDeclaration>, Option<AcquisitionMetadata>)> {
        if acq_infos.is_empty() {
            return Ok((IndexMap::new(), None));
        }
        let protocol = acq_infos[0].protocol;
        let bin_mode = acq_infos[0].bin_mode;
        for info in acq_infos {
            if info.protocol != protocol || info.bin_mode != bin_mode {
                return Err(Error::Config(format!(
                    "{} mixes acquisition protocols or bin modes \
                     ({protocol:?}/{bin_mode:?} vs {:?}/{:?}); one sequencer \
                     supports exactly one combination",
                    self.context(),
                    info.protocol,
                    info.bin_mode
                )));
            }
        }
        if protocol == AcquisitionProtocol::LoopedPeriodicAcquisition && acq_infos.len() > 1 {
            return Err(Error::Config(format!(
                "a looped periodic acquisition must be the only acquisition of \
                 {}, found {} acquisitions",
                self.context(),
                acq_infos.len()
            )));
        }

        let mut acq_indices: IndexMap<u64, Vec<u64>> = IndexMap::new();
        for info in acq_infos {
            acq_indices
                .entry(info.acq_channel)
                .or_default()
                .push(info.acq_index);
        }

        let mut declarations = IndexMap::new();
        for (channel, indices) in &acq_indices {
            let mut unique: Vec<u64> = indices.clone();
            unique.sort_unstable();
            unique.dedup();
            let max = *unique.last().unwrap_or(&0);
            if unique.first() != Some(&0) || unique.len() as u64 != max + 1 {
                return Err(Error::Config(format!(
                    "acquisition indices {indices:?} on ch{channel} of {} are \
                     not dense starting at 0",
                    self.context()
                )));
            }
            let num_bins = match (protocol, bin_mode) {
                (AcquisitionProtocol::LoopedPeriodicAcquisition, _) => {
                    acq_infos[0].num_times.ok_or_else(|| {
                        Error::Config(format!(
                            "looped periodic acquisition on {} does not specify \
                             its sample count",
                            self.context()
                        ))
                    })?
                }
                (AcquisitionProtocol::TriggerCount, BinMode::Average) => MAX_NUMBER_OF_BINS,
                (_, BinMode::Append) => repetitions * (max + 1),
                (_, BinMode::Average) => max + 1,
            };
            if num_bins > MAX_NUMBER_OF_BINS {
                return Err(Error::ResourceLimit(format!(
                    "ch{channel} of {} requires {num_bins} bins, exceeding the \
                     maximum of {MAX_NUMBER_OF_BINS}",
                    self.context()
                )));
            }
            declarations.insert(
                *channel,
                AcquisitionDeclaration {
                    num_bins,
                    index: *channel,
                },
            );
        }

        let metadata = AcquisitionMetadata {
            acq_protocol: protocol,
            bin_mode,
            acq_indices,
        };
        Ok((declarations, Some(metadata)))
    }

    /// Derives the sequencer settings implied by its acquisitions.
    fn extract_acq_settings(&mut self, acq_infos: &[AcquisitionInfo]) -> Result<()> {
        for info in acq_infos {
            match info.protocol {
                AcquisitionProtocol::SsbIntegrationComplex
                | AcquisitionProtocol::WeightedIntegratedComplex
                | AcquisitionProtocol::ThresholdedAcquisition
                | AcquisitionProtocol::LoopedPeriodicAcquisition => {
                    let length = info
                        .integration_length
                        .map(time::round_to_ns)
                        .unwrap_or_else(|| time::round_to_ns(info.duration));
                    if let Some(previous) = self.settings.integration_length_acq
                        && previous != length
                    {
                        return Err(Error::Config(format!(
                            "conflicting integration lengths {previous} ns and \
                             {length} ns on {}",
                            self.context()
                        )));
                    }
                    self.settings.integration_length_acq = Some(length);
                }
                AcquisitionProtocol::TriggerCount => {
                    self.settings.ttl_acq_auto_bin_incr_en =
                        Some(info.bin_mode == BinMode::Average);
                }
                AcquisitionProtocol::Trace => {}
            }
            if info.protocol == AcquisitionProtocol::ThresholdedAcquisition {
                self.settings.thresholded_acq_rotation = info.acq_rotation;
                self.settings.thresholded_acq_threshold = info.acq_threshold;
            }
        }
        Ok(())
    }
}

/// Whether two acquisition start times are spaced closer than the
/// acquisition path can absorb.
fn acquisitions_too_close(previous_start: TimeNs, start: TimeNs) -> bool {
    start - previous_start < MIN_TIME_BETWEEN_ACQUISITIONS
}

/// Marker bitmask asserted around an operation in debug mode. Pulses mark
/// the connected output paths; acquisitions always use the first debug
/// line. RF modules keep their low marker bits for the output enables.
fn debug_marker_for(
    info: &OpInfo,
    outputs: &[u8],
    properties: &StaticHardwareProperties,
) -> Option<u32> {
    if !info.is_real_time_io_operation() || matches!(info.data, OpData::UpdateParameters) {
        return None;
    }
    let shift = if properties.is_rf { 2 } else { 0 };
    let mask = if info.is_acquisition() {
        1 << shift
    } else {
        outputs
            .iter()
            .fold(0u32, |mask, out| mask | 1 << (out + shift))
    };
    (mask != 0).then_some(mask | properties.default_marker)
}
