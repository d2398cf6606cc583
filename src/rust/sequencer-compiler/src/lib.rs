// Copyright 2026 the sequencer-compiler developers
// SPDX-License-Identifier: BSD-3-Clause

//! Compiler turning a time-annotated schedule of pulses and acquisitions
//! into per-instrument, per-sequencer Q1ASM programs.
//!
//! The pipeline runs schedule -> [`container::CompilerContainer`] ->
//! instrument compilers -> sequencers -> operation strategies, and hands the
//! compiled programs back up as a nested instrument -> sequencer map.

pub mod constants;
pub mod container;
pub mod corrections;
pub mod frequency;
pub mod hardware_config;
pub mod hw_properties;
pub mod instrument;
pub mod ops;
pub mod output;
pub mod schedule;
pub mod sequencer;
pub mod strategy;
pub mod time;
pub mod waveforms;

pub use container::{compile, compile_with_options, CompileOptions, QasmHook};
pub use output::{CompiledProgram, SequenceSink};

/// Compilation errors. All variants are fatal; advisory conditions are
/// logged through the `log` facade instead.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Malformed hardware configuration or schedule routing.
    #[error("invalid configuration: {0}")]
    Config(String),
    /// A hardware resource ceiling was exceeded.
    #[error("resource limit exceeded: {0}")]
    ResourceLimit(String),
    /// The schedule timing is inconsistent with the declared play time.
    #[error("timing inconsistency: {0}")]
    Timing(String),
    /// LO/IF/clock frequency resolution failed.
    #[error("frequency resolution error: {0}")]
    Frequency(String),
    #[error(transparent)]
    Assembly(#[from] q1asm::Error),
    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
