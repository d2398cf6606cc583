// Copyright 2026 the sequencer-compiler developers
// SPDX-License-Identifier: BSD-3-Clause

//! Compiled-program output model and the optional debug artifact sink.

use indexmap::IndexMap;
use serde::Serialize;

use crate::ops::{AcquisitionProtocol, BinMode};
use crate::waveforms::WaveformDict;
use crate::Result;

/// Receives serialized sequencer programs for instruments configured with
/// `sequence_to_file`. The compiler core never touches the filesystem; a
/// sink implementation decides where the artifacts go.
pub trait SequenceSink {
    fn write_sequence(
        &mut self,
        instrument: &str,
        sequencer: &str,
        sequence: &serde_json::Value,
    ) -> Result<()>;
}

/// Acquisition bin reservation of one channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AcquisitionDeclaration {
    pub num_bins: u64,
    pub index: u64,
}

/// Acquisition handling of one sequencer, for the caller retrieving data
/// after execution.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AcquisitionMetadata {
    pub acq_protocol: AcquisitionProtocol,
    pub bin_mode: BinMode,
    /// Acquisition indices used per channel.
    pub acq_indices: IndexMap<u64, Vec<u64>>,
}

/// The compiled artifact of one sequencer: program text, sample data and
/// the settings the driver uploads alongside it.
#[derive(Debug, Clone, Serialize)]
pub struct SequencerProgram {
    pub program: String,
    pub waveforms: WaveformDict,
    pub weights: WaveformDict,
    /// Bin declarations keyed by acquisition channel.
    pub acquisitions: IndexMap<u64, AcquisitionDeclaration>,
    pub settings: crate::sequencer::SequencerSettings,
}

/// Compiled artifact of one instrument entry.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum CompiledInstrument {
    Module(CompiledModule),
    /// Flat settings of a non-sequencing instrument (local oscillator).
    Settings(IndexMap<String, serde_json::Value>),
    /// Subtree of an aggregate instrument, keyed by module name.
    Cluster(IndexMap<String, CompiledInstrument>),
}

#[derive(Debug, Clone, Serialize)]
pub struct CompiledModule {
    /// Sequencer programs keyed by sequencer name (`seq0`, `seq1`, ...).
    pub sequencers: IndexMap<String, SequencerProgram>,
    /// Module-level settings (gains, offsets, attenuation, reference
    /// source).
    pub settings: IndexMap<String, serde_json::Value>,
    /// Acquisition metadata per sequencer name; empty for modules without
    /// acquisition support.
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub acq_metadata: IndexMap<String, AcquisitionMetadata>,
    pub repetitions: u64,
}

/// The full compilation result: one entry per instrument that produced
/// data, in hardware-configuration declaration order.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct CompiledProgram {
    pub instruments: IndexMap<String, CompiledInstrument>,
}
