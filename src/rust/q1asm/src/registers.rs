// Copyright 2026 the sequencer-compiler developers
// SPDX-License-Identifier: BSD-3-Clause

//! Deterministic scratch-register allocation for one sequencer.

use crate::constants::REGISTER_COUNT;
use crate::{Error, Result};

/// Opaque handle to one sequencer register. Renders as `R{index}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Register(u8);

impl Register {
    pub fn index(&self) -> u8 {
        self.0
    }
}

impl std::fmt::Display for Register {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "R{}", self.0)
    }
}

/// Arena handing out registers `R0..R63` in ascending order.
///
/// One arena exists per sequencer, so allocation is sequential and fully
/// deterministic: compiling the same input twice yields the same register
/// assignment.
#[derive(Debug)]
pub struct RegisterArena {
    available: Vec<u8>,
}

impl Default for RegisterArena {
    fn default() -> Self {
        Self::new()
    }
}

impl RegisterArena {
    pub fn new() -> Self {
        // Stored in reverse so `pop` yields R0 first.
        Self {
            available: (0..REGISTER_COUNT as u8).rev().collect(),
        }
    }

    pub fn available_registers(&self) -> usize {
        self.available.len()
    }

    pub fn allocate(&mut self) -> Result<Register> {
        self.available.pop().map(Register).ok_or(Error::RegistersExhausted {
            count: REGISTER_COUNT,
        })
    }

    /// Returns a register to the arena.
    pub fn free(&mut self, register: Register) -> Result<()> {
        if self.available.contains(&register.0) {
            return Err(Error::RegisterNotAllocated(register));
        }
        self.available.push(register.0);
        Ok(())
    }
}
