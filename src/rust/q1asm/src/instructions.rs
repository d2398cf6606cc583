// Copyright 2026 the sequencer-compiler developers
// SPDX-License-Identifier: BSD-3-Clause

//! Instruction mnemonics of the Q1 sequence processor.

// Control
pub const ILLEGAL: &str = "illegal";
pub const STOP: &str = "stop";
pub const NOP: &str = "nop";
pub const NEW_LINE: &str = "";

// Jumps
pub const JUMP: &str = "jmp";
pub const LOOP: &str = "loop";
pub const JUMP_GREATER_EQUALS: &str = "jge";
pub const JUMP_LESS_EQUALS: &str = "jlt";

// Arithmetic
pub const MOVE: &str = "move";
pub const ADD: &str = "add";
pub const SUB: &str = "sub";

// Real-time pipeline
pub const SET_MARKER: &str = "set_mrk";
pub const PLAY: &str = "play";
pub const ACQUIRE: &str = "acquire";
pub const ACQUIRE_WEIGHED: &str = "acquire_weighed";
pub const ACQUIRE_TTL: &str = "acquire_ttl";
pub const WAIT: &str = "wait";
pub const WAIT_SYNC: &str = "wait_sync";
pub const UPDATE_PARAMETERS: &str = "upd_param";

// NCO and AWG parameter writes
pub const SET_AWG_GAIN: &str = "set_awg_gain";
pub const SET_AWG_OFFSET: &str = "set_awg_offs";
pub const RESET_PHASE: &str = "reset_ph";
pub const SET_NCO_PHASE_OFFSET: &str = "set_ph_delta";
pub const SET_FREQUENCY: &str = "set_freq";
