// Copyright 2026 the sequencer-compiler developers
// SPDX-License-Identifier: BSD-3-Clause

//! Columnar Q1ASM program builder.
//!
//! The builder keeps an ordered statement list and a running elapsed-time
//! counter. Rendering via [`std::fmt::Display`] is byte-stable, so compiling
//! the same input twice yields identical program text.

use crate::constants::{GRID_TIME, IMMEDIATE_MAX_WAIT_TIME};
use crate::registers::RegisterArena;
use crate::{Error, Result, TimeNs, instructions};

#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub label: Option<String>,
    pub instruction: &'static str,
    pub arguments: Vec<String>,
    pub comment: Option<String>,
}

pub struct Q1asmProgram {
    statements: Vec<Statement>,
    registers: RegisterArena,
    pending_label: Option<String>,
    /// Time the instructions emitted so far take to execute, in ns.
    pub elapsed_time: TimeNs,
}

impl Q1asmProgram {
    pub fn new(registers: RegisterArena) -> Self {
        Self {
            statements: Vec::new(),
            registers,
            pending_label: None,
            elapsed_time: 0,
        }
    }

    pub fn registers_mut(&mut self) -> &mut RegisterArena {
        &mut self.registers
    }

    pub fn statements(&self) -> &[Statement] {
        &self.statements
    }

    /// Number of instructions, for the instruction-memory ceiling check.
    pub fn len(&self) -> usize {
        self.statements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    /// Attaches a label to the next emitted instruction.
    pub fn set_label(&mut self, label: impl Into<String>) {
        self.pending_label = Some(label.into());
    }

    pub fn emit(&mut self, instruction: &'static str, arguments: &[&dyn std::fmt::Display]) {
        self.emit_with_comment(instruction, arguments, None);
    }

    pub fn emit_with_comment(
        &mut self,
        instruction: &'static str,
        arguments: &[&dyn std::fmt::Display],
        comment: Option<String>,
    ) {
        self.statements.push(Statement {
            label: self.pending_label.take(),
            instruction,
            arguments: arguments.iter().map(|a| a.to_string()).collect(),
            comment,
        });
    }

    /// Emits the wait instructions needed to advance real time by
    /// `wait_time` ns.
    ///
    /// Zero is a no-op and negative is an error. Waits that do not fit a
    /// single immediate are split; when more than two maximal waits would be
    /// needed, a register-counted loop is emitted instead.
    pub fn auto_wait(
        &mut self,
        wait_time: TimeNs,
        count_as_elapsed_time: bool,
        comment: Option<String>,
    ) -> Result<()> {
        if wait_time < 0 {
            return Err(Error::InvalidWait(wait_time));
        }
        if wait_time == 0 {
            return Ok(());
        }

        let repetitions = wait_time / IMMEDIATE_MAX_WAIT_TIME;
        if repetitions > 1 {
            let loop_label = format!("wait{}", self.statements.len());
            self.loop_scope::<Error>(&loop_label, repetitions as u64, |program| {
                program.emit_with_comment(
                    instructions::WAIT,
                    &[&IMMEDIATE_MAX_WAIT_TIME],
                    comment.clone(),
                );
                Ok(())
            })?;
        } else if repetitions == 1 {
            self.emit_with_comment(
                instructions::WAIT,
                &[&IMMEDIATE_MAX_WAIT_TIME],
                comment.clone(),
            );
        }

        let time_left = wait_time % IMMEDIATE_MAX_WAIT_TIME;
        if time_left > 0 {
            self.emit_with_comment(instructions::WAIT, &[&time_left], comment);
        }

        if count_as_elapsed_time {
            self.elapsed_time += wait_time;
        }
        Ok(())
    }

    /// Runs `body` inside a `move`/`loop` pair iterating `repetitions`
    /// times, using a register allocated for the duration of the scope.
    /// Generic over the body's error type so callers can fail with their
    /// own errors mid-loop.
    pub fn loop_scope<E: From<Error>>(
        &mut self,
        label: &str,
        repetitions: u64,
        body: impl FnOnce(&mut Self) -> Result<(), E>,
    ) -> Result<(), E> {
        let register = self.registers.allocate().map_err(E::from)?;
        self.emit_with_comment(
            instructions::MOVE,
            &[&repetitions, &register],
            Some(format!("iterator for loop with label {label}")),
        );
        self.set_label(label);
        body(self)?;
        self.emit(instructions::LOOP, &[&register, &format!("@{label}")]);
        self.registers.free(register).map_err(E::from)?;
        Ok(())
    }

    /// Maps a value in [-1.0, 1.0] to the signed immediate range of size
    /// `immediate_size`.
    pub fn expand_from_normalised_range(
        value: f64,
        immediate_size: i64,
        param: &str,
    ) -> Result<i64> {
        if value.abs() > 1.0 {
            return Err(Error::OutOfRange {
                param: param.to_string(),
                value,
            });
        }
        let expanded = (value * (immediate_size / 2) as f64).round() as i64;
        Ok(expanded.min(immediate_size / 2 - 1))
    }

    /// Emits the program-header synchronization barrier and initial
    /// parameter update, both pinned to the grid time.
    pub fn emit_header(&mut self) {
        self.emit(instructions::WAIT_SYNC, &[&GRID_TIME]);
        self.emit(instructions::UPDATE_PARAMETERS, &[&GRID_TIME]);
    }
}

impl std::fmt::Display for Q1asmProgram {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label_width = self
            .statements
            .iter()
            .filter_map(|s| s.label.as_ref().map(|l| l.len() + 1))
            .max()
            .unwrap_or(0)
            .max(1);
        for statement in &self.statements {
            let label = match &statement.label {
                Some(label) => format!("{label}:"),
                None => String::new(),
            };
            let arguments = statement.arguments.join(",");
            let mut line = format!(
                " {label:<label_width$} {:<16}{arguments:<20}",
                statement.instruction
            );
            if let Some(comment) = &statement.comment {
                line.push_str(&format!("# {comment}"));
            }
            writeln!(f, "{}", line.trim_end())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn program() -> Q1asmProgram {
        Q1asmProgram::new(RegisterArena::new())
    }

    #[test]
    fn test_auto_wait_zero_emits_nothing() {
        let mut qasm = program();
        qasm.auto_wait(0, true, None).unwrap();
        assert!(qasm.is_empty());
        assert_eq!(qasm.elapsed_time, 0);
    }

    #[test]
    fn test_auto_wait_negative_is_an_error() {
        let mut qasm = program();
        assert!(matches!(qasm.auto_wait(-4, true, None), Err(Error::InvalidWait(-4))));
    }

    #[test]
    fn test_auto_wait_single_immediate() {
        let mut qasm = program();
        qasm.auto_wait(100, true, None).unwrap();
        assert_eq!(qasm.len(), 1);
        assert_eq!(qasm.statements()[0].arguments, vec!["100"]);
        assert_eq!(qasm.elapsed_time, 100);
    }

    #[test]
    fn test_auto_wait_splits_once_above_immediate_ceiling() {
        let mut qasm = program();
        qasm.auto_wait(IMMEDIATE_MAX_WAIT_TIME + 8, true, None).unwrap();
        assert_eq!(qasm.len(), 2);
        assert_eq!(
            qasm.statements()[0].arguments,
            vec![IMMEDIATE_MAX_WAIT_TIME.to_string()]
        );
        assert_eq!(qasm.statements()[1].arguments, vec!["8"]);
    }

    #[test]
    fn test_auto_wait_long_wait_uses_a_loop() {
        let mut qasm = program();
        let wait_time = 3 * IMMEDIATE_MAX_WAIT_TIME + 12;
        qasm.auto_wait(wait_time, true, None).unwrap();
        let mnemonics: Vec<_> = qasm.statements().iter().map(|s| s.instruction).collect();
        assert_eq!(
            mnemonics,
            vec![
                instructions::MOVE,
                instructions::WAIT,
                instructions::LOOP,
                instructions::WAIT,
            ]
        );
        assert_eq!(qasm.elapsed_time, wait_time);
        // The loop register is released again.
        assert_eq!(qasm.registers_mut().allocate().unwrap().to_string(), "R0");
    }

    #[test]
    fn test_loop_scope_shape() {
        let mut qasm = program();
        qasm.loop_scope::<Error>("start", 10, |program| {
            program.emit(instructions::WAIT, &[&GRID_TIME]);
            Ok(())
        })
        .unwrap();
        assert_eq!(qasm.statements()[1].label.as_deref(), Some("start"));
        assert_eq!(qasm.statements()[2].arguments, vec!["R0", "@start"]);
    }

    #[test]
    fn test_expand_from_normalised_range() {
        let expanded =
            Q1asmProgram::expand_from_normalised_range(0.5, 1 << 16, "gain").unwrap();
        assert_eq!(expanded, 16384);
        let clamped =
            Q1asmProgram::expand_from_normalised_range(1.0, 1 << 16, "gain").unwrap();
        assert_eq!(clamped, (1 << 15) - 1);
        assert!(Q1asmProgram::expand_from_normalised_range(1.2, 1 << 16, "gain").is_err());
    }

    #[test]
    fn test_render_is_stable() {
        let render = |_| {
            let mut qasm = program();
            qasm.emit_header();
            qasm.loop_scope("start", 2, |program| {
                program.emit(instructions::RESET_PHASE, &[]);
                program.auto_wait(16, true, None)
            })
            .unwrap();
            qasm.emit(instructions::STOP, &[]);
            qasm.to_string()
        };
        assert_eq!(render(()), render(()));
        assert!(render(()).contains("wait_sync"));
    }
}
