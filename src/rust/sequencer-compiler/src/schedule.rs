// Copyright 2026 the sequencer-compiler developers
// SPDX-License-Identifier: BSD-3-Clause

//! The schedule input consumed by the compiler, and its flattening into
//! hardware-level operation records.

use std::collections::HashMap;

use crate::ops::{OpData, OpInfo, PortClock};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClockResource {
    pub freq: f64,
}

/// One pulse or acquisition event inside a scheduled operation, timed
/// relative to the operation start.
#[derive(Debug, Clone)]
pub struct OpEvent {
    pub name: String,
    pub t0: f64,
    pub port: Option<String>,
    pub clock: String,
    pub data: OpData,
}

/// One operation of the schedule at an absolute time within a repetition.
#[derive(Debug, Clone)]
pub struct ScheduledOp {
    pub abs_time: f64,
    pub events: Vec<OpEvent>,
}

/// The abstract experiment description handed to the compiler: timed
/// operations, the repetition count and the named clocks with resolved
/// frequencies.
#[derive(Debug, Clone, Default)]
pub struct Schedule {
    pub name: String,
    pub repetitions: u64,
    pub operations: Vec<ScheduledOp>,
    pub resources: HashMap<String, ClockResource>,
}

impl Schedule {
    /// Global experiment duration, identical across all instruments so
    /// their programs stay in lockstep.
    pub fn total_play_time(&self) -> f64 {
        self.operations
            .iter()
            .flat_map(|op| {
                op.events
                    .iter()
                    .map(move |event| op.abs_time + event.t0 + event_duration(event))
            })
            .fold(0.0, f64::max)
    }

    /// Flattens the schedule into port-clock attributed [`OpInfo`] records.
    pub fn flatten(&self) -> Vec<OpInfo> {
        self.operations
            .iter()
            .flat_map(|op| {
                op.events.iter().map(move |event| OpInfo {
                    name: event.name.clone(),
                    timing: op.abs_time + event.t0,
                    port_clock: PortClock {
                        port: event.port.clone(),
                        clock: event.clock.clone(),
                    },
                    data: event.data.clone(),
                })
            })
            .collect()
    }
}

fn event_duration(event: &OpEvent) -> f64 {
    match &event.data {
        OpData::Pulse(info) => info.duration,
        OpData::MarkerPulse { duration, .. } | OpData::IdlePulse { duration } => *duration,
        OpData::Acquisition(info) => info.duration,
        _ => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::{PulseInfo, PulseShape};

    fn square_event(t0: f64, duration: f64) -> OpEvent {
        OpEvent {
            name: "SquarePulse".to_string(),
            t0,
            port: Some("q0:mw".to_string()),
            clock: "q0.01".to_string(),
            data: OpData::Pulse(PulseInfo {
                shape: PulseShape::Square { amp: 1.0 },
                duration,
                phase: 0.0,
                output: None,
            }),
        }
    }

    #[test]
    fn test_total_play_time() {
        let schedule = Schedule {
            name: "test".to_string(),
            repetitions: 1,
            operations: vec![
                ScheduledOp {
                    abs_time: 0.0,
                    events: vec![square_event(0.0, 16e-9)],
                },
                ScheduledOp {
                    abs_time: 100e-9,
                    events: vec![square_event(4e-9, 20e-9)],
                },
            ],
            resources: HashMap::new(),
        };
        assert_eq!(schedule.total_play_time(), 124e-9);
    }

    #[test]
    fn test_flatten_attributes_portclock_and_timing() {
        let schedule = Schedule {
            name: "test".to_string(),
            repetitions: 1,
            operations: vec![ScheduledOp {
                abs_time: 40e-9,
                events: vec![square_event(8e-9, 16e-9)],
            }],
            resources: HashMap::new(),
        };
        let ops = schedule.flatten();
        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0].timing, 48e-9);
        assert_eq!(ops[0].port_clock.key(), "q0:mw-q0.01");
    }
}
