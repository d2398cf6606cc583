// Copyright 2026 the sequencer-compiler developers
// SPDX-License-Identifier: BSD-3-Clause

//! Q1ASM assembly layer: instruction mnemonics, the columnar program
//! builder and the per-sequencer register arena.
//!
//! This crate knows nothing about schedules or instruments; it only deals
//! with emitting a well-formed instruction stream for one Q1 sequence
//! processor.

pub mod constants;
pub mod instructions;
pub mod program;
pub mod registers;

pub use program::Q1asmProgram;
pub use registers::{Register, RegisterArena};

/// Time in nanoseconds on the sequencer instruction grid.
pub type TimeNs = i64;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("invalid wait time of {0} ns requested")]
    InvalidWait(TimeNs),
    #[error("{param} of {value} is out of the normalised range [-1.0, 1.0]")]
    OutOfRange { param: String, value: f64 },
    #[error("all {count} sequencer registers are in use")]
    RegistersExhausted { count: usize },
    #[error("register {0} freed while not allocated")]
    RegisterNotAllocated(Register),
    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
