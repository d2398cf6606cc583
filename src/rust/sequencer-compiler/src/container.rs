// Copyright 2026 the sequencer-compiler developers
// SPDX-License-Identifier: BSD-3-Clause

//! The compiler container: one instrument compiler per hardware
//! configuration entry, and the top-level compile entry point.

use std::collections::HashMap;

use indexmap::IndexMap;
use q1asm::Q1asmProgram;

use crate::corrections;
use crate::frequency::FrequencySlot;
use crate::hardware_config::HardwareConfig;
use crate::hw_properties::InstrumentType;
use crate::instrument::{
    ClusterCompiler, CompileContext, LocalOscillatorCompiler, ModuleCompiler,
};
use crate::ops::{OpInfo, PortClock};
use crate::output::{CompiledProgram, SequenceSink};
use crate::schedule::{ClockResource, Schedule};
use crate::{Error, Result};

/// Raw-instruction injection run on a sequencer program after assembly.
pub type QasmHook = Box<dyn Fn(&mut Q1asmProgram)>;

/// Caller-facing knobs of one compile pass.
#[derive(Default)]
pub struct CompileOptions<'a> {
    /// Debug artifact writer for instruments configured with
    /// `sequence_to_file`.
    pub sink: Option<&'a mut dyn SequenceSink>,
    /// Hooks keyed by port-clock.
    pub qasm_hooks: HashMap<String, QasmHook>,
}

enum InstrumentCompiler {
    Module(ModuleCompiler),
    LocalOscillator(LocalOscillatorCompiler),
    Cluster(ClusterCompiler),
}

impl InstrumentCompiler {
    fn owns(&self, port_clock: &PortClock) -> bool {
        match self {
            InstrumentCompiler::Module(module) => module.owns(port_clock),
            InstrumentCompiler::Cluster(cluster) => cluster.owns(port_clock),
            InstrumentCompiler::LocalOscillator(_) => false,
        }
    }
}

pub struct CompilerContainer {
    instruments: IndexMap<String, InstrumentCompiler>,
    resources: HashMap<String, ClockResource>,
    lo_frequencies: HashMap<String, FrequencySlot>,
    repetitions: u64,
}

impl CompilerContainer {
    /// Builds one instrument compiler per configuration entry, dispatching
    /// on the declared instrument type. The schedule-wide play time is
    /// computed once and shared, keeping all instruments in lockstep.
    pub fn from_hardware_config(schedule: &Schedule, config: &HardwareConfig) -> Result<Self> {
        let total_play_time = schedule.total_play_time();
        let mut instruments = IndexMap::new();
        for (name, entry) in config.instruments()? {
            let compiler = match entry.instrument_type {
                InstrumentType::LocalOscillator => InstrumentCompiler::LocalOscillator(
                    LocalOscillatorCompiler::new(&name, &entry),
                ),
                InstrumentType::Cluster => InstrumentCompiler::Cluster(ClusterCompiler::new(
                    &name,
                    &entry,
                    total_play_time,
                    &config.latency_corrections,
                )?),
                _ => InstrumentCompiler::Module(ModuleCompiler::new(
                    &name,
                    &entry,
                    total_play_time,
                    &config.latency_corrections,
                )?),
            };
            instruments.insert(name, compiler);
        }
        Ok(Self {
            instruments,
            resources: schedule.resources.clone(),
            lo_frequencies: HashMap::new(),
            repetitions: schedule.repetitions,
        })
    }

    /// Assigns every operation to the instrument compiler(s) owning its
    /// port-clock.
    pub fn add_operations(&mut self, ops: Vec<OpInfo>) -> Result<()> {
        for op in ops {
            let mut matched = false;
            for compiler in self.instruments.values_mut() {
                if !compiler.owns(&op.port_clock) {
                    continue;
                }
                matched = true;
                match compiler {
                    InstrumentCompiler::Module(module) => module.add_operation(op.clone())?,
                    InstrumentCompiler::Cluster(cluster) => cluster.add_operation(op.clone())?,
                    InstrumentCompiler::LocalOscillator(_) => unreachable!(),
                }
            }
            if !matched {
                return Err(Error::Config(format!(
                    "'{op}' is addressed to {}, which no configured instrument \
                     owns",
                    op.port_clock
                )));
            }
        }
        Ok(())
    }

    pub fn prepare(&mut self) -> Result<()> {
        let mut ctx = CompileContext {
            resources: &self.resources,
            lo_frequencies: &mut self.lo_frequencies,
        };
        // LOs seed their frequency slots before any module resolves
        // against them.
        for compiler in self.instruments.values() {
            if let InstrumentCompiler::LocalOscillator(lo) = compiler {
                lo.prepare(&mut ctx)?;
            }
        }
        for compiler in self.instruments.values_mut() {
            match compiler {
                InstrumentCompiler::Module(module) => module.prepare(&mut ctx)?,
                InstrumentCompiler::Cluster(cluster) => cluster.prepare(&mut ctx)?,
                InstrumentCompiler::LocalOscillator(_) => {}
            }
        }
        Ok(())
    }

    /// Runs the full pass: prepare, then compile each instrument.
    /// Instruments producing no program are omitted from the result.
    pub fn compile(&mut self, options: &mut CompileOptions<'_>) -> Result<CompiledProgram> {
        self.prepare()?;
        let mut compiled = IndexMap::new();
        for (name, compiler) in &mut self.instruments {
            let result = match compiler {
                InstrumentCompiler::Module(module) => {
                    module.compile(self.repetitions, options)?
                }
                InstrumentCompiler::Cluster(cluster) => {
                    cluster.compile(self.repetitions, options)?
                }
                InstrumentCompiler::LocalOscillator(lo) => lo.compile(&self.lo_frequencies)?,
            };
            if let Some(instrument) = result {
                compiled.insert(name.clone(), instrument);
            }
        }
        Ok(CompiledProgram {
            instruments: compiled,
        })
    }
}

/// Compiles a schedule against a hardware configuration.
pub fn compile(
    schedule: &Schedule,
    hardware_config: serde_json::Value,
) -> Result<CompiledProgram> {
    compile_with_options(schedule, hardware_config, &mut CompileOptions::default())
}

pub fn compile_with_options(
    schedule: &Schedule,
    hardware_config: serde_json::Value,
    options: &mut CompileOptions<'_>,
) -> Result<CompiledProgram> {
    let config = HardwareConfig::from_json(hardware_config)?;
    let mut ops = schedule.flatten();
    corrections::apply_distortion_corrections(&mut ops, &config.distortion_corrections);
    let mut container = CompilerContainer::from_hardware_config(schedule, &config)?;
    container.add_operations(ops)?;
    container.compile(options)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::{
        AcquisitionInfo, AcquisitionProtocol, BinMode, OpData, PulseInfo, PulseShape,
        SetClockFrequency,
    };
    use crate::output::CompiledInstrument;
    use crate::schedule::{OpEvent, ScheduledOp};
    use serde_json::json;

    fn hardware_config() -> serde_json::Value {
        json!({
            "qcm0": {
                "instrument_type": "QCM",
                "complex_output_0": {
                    "lo_name": "lo0",
                    "portclock_configs": [
                        {"port": "q0:mw", "clock": "q0.01", "interm_freq": 50e6}
                    ]
                }
            },
            "qrm0": {
                "instrument_type": "QRM",
                "complex_input_0": {
                    "portclock_configs": [
                        {"port": "q0:res", "clock": "q0.ro", "interm_freq": 0}
                    ]
                }
            },
            "lo0": {"instrument_type": "LocalOscillator", "power": 13}
        })
    }

    fn pulse_event(name: &str, port: &str, clock: &str, duration: f64) -> OpEvent {
        OpEvent {
            name: name.to_string(),
            t0: 0.0,
            port: Some(port.to_string()),
            clock: clock.to_string(),
            data: OpData::Pulse(PulseInfo {
                shape: PulseShape::Square { amp: 0.5 },
                duration,
                phase: 0.0,
                output: None,
            }),
        }
    }

    fn schedule() -> Schedule {
        Schedule {
            name: "readout".to_string(),
            repetitions: 10,
            operations: vec![
                ScheduledOp {
                    abs_time: 0.0,
                    events: vec![pulse_event("SquarePulse", "q0:mw", "q0.01", 16e-9)],
                },
                ScheduledOp {
                    abs_time: 100e-9,
                    events: vec![OpEvent {
                        name: "SSBIntegrationComplex".to_string(),
                        t0: 0.0,
                        port: Some("q0:res".to_string()),
                        clock: "q0.ro".to_string(),
                        data: OpData::Acquisition(AcquisitionInfo {
                            protocol: AcquisitionProtocol::SsbIntegrationComplex,
                            bin_mode: BinMode::Average,
                            acq_channel: 0,
                            acq_index: 0,
                            duration: 300e-9,
                            weights: vec![],
                            num_times: None,
                            acq_rotation: None,
                            acq_threshold: None,
                            integration_length: None,
                        }),
                    }],
                },
            ],
            resources: HashMap::from([
                ("q0.01".to_string(), ClockResource { freq: 5e9 }),
                ("q0.ro".to_string(), ClockResource { freq: 7e9 }),
            ]),
        }
    }

    #[test]
    fn test_end_to_end_compile() {
        let compiled = compile(&schedule(), hardware_config()).unwrap();
        assert_eq!(compiled.instruments.len(), 3);

        let CompiledInstrument::Module(qcm) = &compiled.instruments["qcm0"] else {
            panic!("expected a module program");
        };
        assert_eq!(qcm.repetitions, 10);
        let program = &qcm.sequencers["seq0"].program;
        assert!(program.contains("wait_sync"));
        assert!(program.contains("play"));
        assert!(program.contains("stop"));
        assert!(qcm.sequencers["seq0"].settings.nco_en);

        let CompiledInstrument::Module(qrm) = &compiled.instruments["qrm0"] else {
            panic!("expected a module program");
        };
        assert!(qrm.sequencers["seq0"].program.contains("acquire"));
        assert_eq!(qrm.sequencers["seq0"].acquisitions[&0u64].num_bins, 1);
        assert_eq!(
            qrm.acq_metadata["seq0"].acq_protocol,
            AcquisitionProtocol::SsbIntegrationComplex
        );

        // The LO frequency was solved from the QCM clock and IF.
        let CompiledInstrument::Settings(lo) = &compiled.instruments["lo0"] else {
            panic!("expected LO settings");
        };
        assert_eq!(lo["frequency"], json!(5e9 - 50e6));
        assert_eq!(lo["power"], json!(13.0));
    }

    #[test]
    fn test_instruments_without_data_are_omitted() {
        let mut sched = schedule();
        // Drop the readout: the QRM compiles to nothing.
        sched.operations.truncate(1);
        let compiled = compile(&sched, hardware_config()).unwrap();
        assert!(compiled.instruments.contains_key("qcm0"));
        assert!(!compiled.instruments.contains_key("qrm0"));
    }

    #[test]
    fn test_unroutable_operation_is_fatal() {
        let mut sched = schedule();
        sched.operations.push(ScheduledOp {
            abs_time: 0.0,
            events: vec![pulse_event("SquarePulse", "q9:mw", "q9.01", 16e-9)],
        });
        assert!(matches!(
            compile(&sched, hardware_config()),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_clock_retune_is_backfilled() {
        let mut sched = schedule();
        sched.operations.push(ScheduledOp {
            abs_time: 60e-9,
            events: vec![OpEvent {
                name: "SetClockFrequency".to_string(),
                t0: 0.0,
                port: None,
                clock: "q0.01".to_string(),
                data: OpData::SetClockFrequency(SetClockFrequency {
                    clock_freq_new: 5.001e9,
                    clock_freq_old: None,
                    interm_freq_old: None,
                }),
            }],
        });
        let compiled = compile(&sched, hardware_config()).unwrap();
        let CompiledInstrument::Module(qcm) = &compiled.instruments["qcm0"] else {
            panic!("expected a module program");
        };
        // IF moves from 50 MHz to 51 MHz: 204e6 steps of 0.25 Hz.
        assert!(qcm.sequencers["seq0"].program.contains("set_freq"));
        assert!(qcm.sequencers["seq0"].program.contains("204000000"));
    }

    #[test]
    fn test_compilation_is_idempotent_across_passes() {
        let render = || {
            let compiled = compile(&schedule(), hardware_config()).unwrap();
            serde_json::to_string(&compiled).unwrap()
        };
        assert_eq!(render(), render());
    }

    #[test]
    fn test_cluster_subtree() {
        let config = json!({
            "cluster0": {
                "instrument_type": "Cluster",
                "ref_source": "internal",
                "cluster0_module1": {
                    "instrument_type": "QCM",
                    "complex_output_0": {
                        "portclock_configs": [
                            {"port": "q0:mw", "clock": "q0.01", "interm_freq": 0}
                        ]
                    }
                }
            }
        });
        let mut sched = schedule();
        sched.operations.truncate(1);
        let compiled = compile(&sched, config).unwrap();
        let CompiledInstrument::Cluster(subtree) = &compiled.instruments["cluster0"] else {
            panic!("expected a cluster subtree");
        };
        let CompiledInstrument::Module(module) = &subtree["cluster0_module1"] else {
            panic!("expected a module program");
        };
        assert!(module.sequencers["seq0"].program.contains("play"));
    }

    struct RecordingSink(Vec<(String, String)>);

    impl SequenceSink for RecordingSink {
        fn write_sequence(
            &mut self,
            instrument: &str,
            sequencer: &str,
            _sequence: &serde_json::Value,
        ) -> Result<()> {
            self.0.push((instrument.to_string(), sequencer.to_string()));
            Ok(())
        }
    }

    #[test]
    fn test_sequence_to_file_writes_to_the_sink() {
        let mut config = hardware_config();
        config["qcm0"]["sequence_to_file"] = json!(true);
        let mut sink = RecordingSink(Vec::new());
        let mut options = CompileOptions {
            sink: Some(&mut sink),
            qasm_hooks: HashMap::new(),
        };
        compile_with_options(&schedule(), config, &mut options).unwrap();
        assert_eq!(sink.0, vec![("qcm0".to_string(), "seq0".to_string())]);
    }
}
