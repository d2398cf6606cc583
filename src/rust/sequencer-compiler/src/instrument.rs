// Copyright 2026 the sequencer-compiler developers
// SPDX-License-Identifier: BSD-3-Clause

//! Instrument-level compilers: modules with sequencers, local oscillators
//! and clusters aggregating modules.

use std::collections::{HashMap, HashSet};

use indexmap::IndexMap;
use serde_json::json;

use crate::container::CompileOptions;
use crate::frequency::{self, Frequencies, FrequencySlot};
use crate::hardware_config::{InstrumentConfig, IoConfig, PortClockConfig};
use crate::hw_properties::{IoMode, StaticHardwareProperties};
use crate::ops::{OpData, OpInfo, PortClock};
use crate::output::{CompiledInstrument, CompiledModule};
use crate::schedule::ClockResource;
use crate::sequencer::Sequencer;
use crate::time;
use crate::{Error, Result};

/// Schedule-wide state threaded through instrument preparation: the
/// resolved clock frequencies and the write-once frequencies of the local
/// oscillators shared between instruments.
pub struct CompileContext<'a> {
    pub resources: &'a HashMap<String, ClockResource>,
    pub lo_frequencies: &'a mut HashMap<String, FrequencySlot>,
}

/// Compiler of one QCM/QRM module (baseband or RF). All behavioral
/// differences between the module types come from the static properties
/// table.
pub struct ModuleCompiler {
    name: String,
    properties: &'static StaticHardwareProperties,
    io_configs: IndexMap<String, IoConfig>,
    ref_source: Option<String>,
    sequence_to_file: bool,
    total_play_time: f64,
    latency_corrections: HashMap<String, f64>,
    portclock_keys: HashSet<String>,
    clocks: HashSet<String>,
    sequencers: Vec<Sequencer>,
    ops: Vec<OpInfo>,
    settings: IndexMap<String, serde_json::Value>,
}

impl ModuleCompiler {
    pub fn new(
        name: impl Into<String>,
        config: &InstrumentConfig,
        total_play_time: f64,
        latency_corrections: &HashMap<String, f64>,
    ) -> Result<Self> {
        let name = name.into();
        let properties = config.instrument_type.properties().ok_or_else(|| {
            Error::Config(format!("instrument '{name}' is not a sequencing module"))
        })?;
        let io_configs = config.io_configs(&name)?;

        let mut portclock_keys = HashSet::new();
        let mut clocks = HashSet::new();
        for (io_name, io) in &io_configs {
            if !properties.valid_ios.contains(&io_name.as_str()) {
                return Err(Error::Config(format!(
                    "'{io_name}' is not a valid I/O of {} module '{name}'",
                    properties.instrument_type
                )));
            }
            if io.portclock_configs.is_empty() {
                return Err(Error::Config(format!(
                    "I/O '{io_name}' of instrument '{name}' has no portclock_configs"
                )));
            }
            for pc in &io.portclock_configs {
                let key = format!("{}-{}", pc.port, pc.clock);
                if !portclock_keys.insert(key.clone()) {
                    return Err(Error::Config(format!(
                        "portclock '{key}' is assigned to more than one I/O of \
                         instrument '{name}'"
                    )));
                }
                clocks.insert(pc.clock.clone());
            }
        }

        Ok(Self {
            name,
            properties,
            io_configs,
            ref_source: config.ref_source.clone(),
            sequence_to_file: config.sequence_to_file.unwrap_or(false),
            total_play_time,
            latency_corrections: latency_corrections.clone(),
            portclock_keys,
            clocks,
            sequencers: Vec::new(),
            ops: Vec::new(),
            settings: IndexMap::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether an operation addressed to this port-clock belongs to this
    /// module. Clock-only operations match on the clock alone.
    pub fn owns(&self, port_clock: &PortClock) -> bool {
        match &port_clock.port {
            Some(_) => self.portclock_keys.contains(&port_clock.key()),
            None => self.clocks.contains(&port_clock.clock),
        }
    }

    pub fn add_operation(&mut self, op: OpInfo) -> Result<()> {
        if op.is_acquisition() && !self.properties.supports_acquisition {
            return Err(Error::Config(format!(
                "'{op}' is an acquisition, but {} module '{}' cannot acquire",
                self.properties.instrument_type, self.name
            )));
        }
        self.ops.push(op);
        Ok(())
    }

    /// Idempotent setup: extracts settings, constructs the sequencers,
    /// resolves frequencies and distributes the queued operations.
    pub fn prepare(&mut self, ctx: &mut CompileContext<'_>) -> Result<()> {
        self.sequencers.clear();
        self.settings.clear();
        if let Some(ref_source) = &self.ref_source {
            self.settings
                .insert("ref_source".to_string(), json!(ref_source));
        }

        let io_configs = self.io_configs.clone();
        for (io_name, io) in &io_configs {
            for pc in &io.portclock_configs {
                let index = self.sequencers.len();
                if index >= self.properties.max_sequencers {
                    return Err(Error::ResourceLimit(format!(
                        "trying to configure more than {} sequencers on \
                         instrument '{}'",
                        self.properties.max_sequencers, self.name
                    )));
                }
                let port_clock = PortClock::new(pc.port.clone(), pc.clock.clone());
                let latency = self
                    .latency_corrections
                    .get(&port_clock.key())
                    .copied()
                    .unwrap_or(0.0);
                let mut sequencer = Sequencer::new(
                    self.name.clone(),
                    index,
                    port_clock,
                    io_name,
                    self.properties,
                    latency,
                    io.marker_debug_mode_enable,
                )?;
                self.assign_frequency(&mut sequencer, io_name, io, pc, ctx)?;
                self.sequencers.push(sequencer);
            }
            self.configure_io_settings(io_name, io)?;
        }

        self.distribute_ops(ctx)?;

        let scope_sequencers: Vec<usize> = self
            .sequencers
            .iter()
            .filter(|seq| seq.has_scope_acquisition())
            .map(|seq| seq.index)
            .collect();
        if let [first, others @ ..] = scope_sequencers.as_slice()
            && !others.is_empty()
        {
            return Err(Error::Config(format!(
                "both sequencers {first} and {} of instrument '{}' perform a \
                 scope (trace) acquisition; only one scope acquisition per \
                 module is possible",
                others[0], self.name
            )));
        }
        Ok(())
    }

    pub fn compile(
        &mut self,
        repetitions: u64,
        options: &mut CompileOptions<'_>,
    ) -> Result<Option<CompiledInstrument>> {
        let mut sequencers = IndexMap::new();
        let mut acq_metadata = IndexMap::new();
        for sequencer in &mut self.sequencers {
            let hook = options
                .qasm_hooks
                .get(&sequencer.port_clock.key())
                .map(|hook| hook.as_ref());
            let Some((program, metadata)) =
                sequencer.compile(repetitions, self.total_play_time, hook)?
            else {
                continue;
            };
            if self.sequence_to_file
                && let Some(sink) = options.sink.as_deref_mut()
            {
                let sequence = serde_json::to_value(&program).map_err(anyhow::Error::from)?;
                sink.write_sequence(&self.name, &sequencer.name(), &sequence)?;
            }
            if let Some(metadata) = metadata {
                acq_metadata.insert(sequencer.name(), metadata);
            }
            sequencers.insert(sequencer.name(), program);
        }
        if sequencers.is_empty() {
            return Ok(None);
        }
        Ok(Some(CompiledInstrument::Module(CompiledModule {
            sequencers,
            settings: self.settings.clone(),
            acq_metadata,
            repetitions,
        })))
    }

    /// Solves the LO/IF/clock relation for one sequencer and records the
    /// result in its settings (and the shared LO slot, when one is used).
    fn assign_frequency(
        &mut self,
        sequencer: &mut Sequencer,
        io_name: &str,
        io: &IoConfig,
        pc: &PortClockConfig,
        ctx: &mut CompileContext<'_>,
    ) -> Result<()> {
        if sequencer.io_mode == IoMode::Digital {
            return Ok(());
        }
        let clock = ctx
            .resources
            .get(&pc.clock)
            .ok_or_else(|| {
                Error::Config(format!(
                    "clock '{}' of instrument '{}' is not declared in the \
                     schedule resources",
                    pc.clock, self.name
                ))
            })?
            .freq;

        // An intermediate frequency pinned to zero disables the NCO for good.
        if pc.interm_freq == Some(0.0) {
            sequencer.settings.nco_en = false;
            sequencer.settings.modulation_freq.try_set(
                0.0,
                &format!("modulation frequency of {}", sequencer.port_clock),
            )?;
            return Ok(());
        }

        let lo = if let Some(lo_name) = &io.lo_name {
            let slot = ctx.lo_frequencies.get(lo_name).ok_or_else(|| {
                Error::Config(format!(
                    "I/O '{io_name}' of instrument '{}' references unknown \
                     local oscillator '{lo_name}'",
                    self.name
                ))
            })?;
            slot.get()
        } else if self.properties.is_rf {
            io.lo_freq
        } else {
            // Baseband without an LO: the NCO tracks the clock directly.
            Some(0.0)
        };

        let freqs = frequency::resolve(
            Frequencies {
                clock,
                lo,
                intermediate: pc.interm_freq,
            },
            io.downconverter_freq,
            io.mix_lo,
        )?;

        let intermediate = freqs.intermediate.unwrap_or(0.0);
        sequencer.settings.modulation_freq.try_set(
            intermediate,
            &format!("modulation frequency of {}", sequencer.port_clock),
        )?;
        sequencer.settings.nco_en = intermediate != 0.0;

        if let Some(resolved_lo) = freqs.lo {
            if let Some(lo_name) = &io.lo_name {
                let slot = ctx.lo_frequencies.get_mut(lo_name).ok_or_else(|| {
                    Error::Config(format!("unknown local oscillator '{lo_name}'"))
                })?;
                slot.try_set(resolved_lo, &format!("frequency of LO '{lo_name}'"))?;
            } else if self.properties.is_rf {
                self.set_setting(&format!("{io_name}_lo_freq"), json!(resolved_lo))?;
            }
        }
        Ok(())
    }

    /// Extracts input gains, mixer DC offsets and attenuation from one I/O
    /// configuration into the module settings.
    fn configure_io_settings(&mut self, io_name: &str, io: &IoConfig) -> Result<()> {
        let (_, outputs, inputs) = crate::hw_properties::io_info(io_name)?;

        if let Some(inputs) = &inputs {
            let gain_per_path: Vec<(u8, Option<i64>)> = match inputs.as_slice() {
                // Complex input: I and Q gains for the path pair.
                [i, q] => vec![(*i, io.input_gain_i), (*q, io.input_gain_q)],
                [path] => {
                    let dedicated = if *path % 2 == 0 {
                        io.input_gain_0
                    } else {
                        io.input_gain_1
                    };
                    vec![(*path, io.input_gain.or(dedicated))]
                }
                _ => vec![],
            };
            for (path, gain) in gain_per_path {
                if let Some(gain) = gain {
                    self.set_setting(&format!("in{path}_gain"), json!(gain))?;
                }
            }
        }

        let offset_range = self.properties.mixer_dc_offset_range;
        if let Some(outputs) = &outputs {
            for (path, offset) in outputs
                .iter()
                .zip([io.dc_mixer_offset_i, io.dc_mixer_offset_q])
                .filter_map(|(path, offset)| Some((*path, offset?)))
            {
                if offset < offset_range.min || offset > offset_range.max {
                    return Err(Error::Config(format!(
                        "mixer DC offset of {offset} {units} on '{io_name}' of \
                         instrument '{}' is outside [{}, {}] {units}",
                        self.name,
                        offset_range.min,
                        offset_range.max,
                        units = offset_range.units
                    )));
                }
                self.set_setting(&format!("out{path}_offset"), json!(offset))?;
            }
        }

        for (att, key) in [(io.input_att, "in0_att"), (io.output_att, "out0_att")] {
            let Some(att) = att else { continue };
            if !self.properties.is_rf {
                return Err(Error::Config(format!(
                    "attenuation on '{io_name}' of instrument '{}' is only \
                     supported on RF modules",
                    self.name
                )));
            }
            if att.fract() != 0.0 {
                return Err(Error::Config(format!(
                    "attenuation of {att} dB on '{io_name}' of instrument '{}' \
                     is not an integer",
                    self.name
                )));
            }
            // The same attenuation may not be configured in two places,
            // even with equal values.
            if self.settings.contains_key(key) {
                return Err(Error::Config(format!(
                    "attenuation '{key}' of instrument '{}' is defined by more \
                     than one I/O configuration",
                    self.name
                )));
            }
            self.settings.insert(key.to_string(), json!(att as i64));
        }
        Ok(())
    }

    fn set_setting(&mut self, key: &str, value: serde_json::Value) -> Result<()> {
        if let Some(previous) = self.settings.get(key)
            && *previous != value
        {
            return Err(Error::Config(format!(
                "conflicting values {previous} and {value} for '{key}' of \
                 instrument '{}'",
                self.name
            )));
        }
        self.settings.insert(key.to_string(), value);
        Ok(())
    }

    /// Routes the queued operations to their sequencers, backfilling the
    /// frequency context of clock retunes and pinning digital outputs.
    fn distribute_ops(&mut self, ctx: &CompileContext<'_>) -> Result<()> {
        let ops = std::mem::take(&mut self.ops);
        let mut per_sequencer: Vec<Vec<OpInfo>> = vec![Vec::new(); self.sequencers.len()];
        for op in ops {
            let mut matched = false;
            for (i, sequencer) in self.sequencers.iter().enumerate() {
                let matches = match &op.port_clock.port {
                    Some(_) => sequencer.port_clock == op.port_clock,
                    None => sequencer.port_clock.clock == op.port_clock.clock,
                };
                if !matches {
                    continue;
                }
                matched = true;
                let mut op = op.clone();
                match &mut op.data {
                    OpData::SetClockFrequency(info) => {
                        info.clock_freq_old =
                            ctx.resources.get(&op.port_clock.clock).map(|r| r.freq);
                        info.interm_freq_old = sequencer.settings.modulation_freq.get();
                    }
                    OpData::MarkerPulse { output, .. } if output.is_none() => {
                        *output = sequencer.settings.connected_output_indices.first().copied();
                    }
                    _ => {}
                }
                per_sequencer[i].push(op);
            }
            if !matched {
                return Err(Error::Config(format!(
                    "'{op}' is addressed to {}, which no sequencer of \
                     instrument '{}' is configured for",
                    op.port_clock, self.name
                )));
            }
        }

        for (i, mut ops) in per_sequencer.into_iter().enumerate() {
            insert_update_parameters(&mut ops, self.total_play_time);
            for op in ops {
                self.sequencers[i].add_operation(op)?;
            }
        }
        Ok(())
    }
}

/// Synthesizes an update-parameters instruction for every bare offset not
/// co-located with a real-time instruction, so the offset actually takes
/// effect. Offsets at the very end of the schedule get none; there is no
/// time left to apply them in.
fn insert_update_parameters(ops: &mut Vec<OpInfo>, total_play_time: f64) {
    let mut synthesized: Vec<OpInfo> = Vec::new();
    for op in ops.iter().filter(|op| op.is_offset_instruction()) {
        if time::is_within_half_grid_time(op.timing, total_play_time) {
            continue;
        }
        let covered = ops
            .iter()
            .filter(|other| other.is_real_time_io_operation())
            .chain(synthesized.iter())
            .any(|other| time::is_within_half_grid_time(other.timing, op.timing));
        if !covered {
            synthesized.push(OpInfo {
                name: "UpdateParameters".to_string(),
                timing: op.timing,
                port_clock: op.port_clock.clone(),
                data: OpData::UpdateParameters,
            });
        }
    }
    ops.append(&mut synthesized);
}

/// Compiler of a local oscillator: no program, just the resolved frequency
/// and optional power.
pub struct LocalOscillatorCompiler {
    name: String,
    frequency: Option<f64>,
    power: Option<f64>,
}

impl LocalOscillatorCompiler {
    pub fn new(name: impl Into<String>, config: &InstrumentConfig) -> Self {
        Self {
            name: name.into(),
            frequency: config.frequency,
            power: config.power,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Seeds the shared frequency slot with the configured frequency, if
    /// any; modules feeding from this LO may also resolve it.
    pub fn prepare(&self, ctx: &mut CompileContext<'_>) -> Result<()> {
        let slot = ctx.lo_frequencies.entry(self.name.clone()).or_default();
        if let Some(frequency) = self.frequency {
            slot.try_set(frequency, &format!("frequency of LO '{}'", self.name))?;
        }
        Ok(())
    }

    pub fn compile(
        &self,
        lo_frequencies: &HashMap<String, FrequencySlot>,
    ) -> Result<Option<CompiledInstrument>> {
        let frequency = lo_frequencies
            .get(&self.name)
            .and_then(|slot| slot.get())
            .ok_or_else(|| {
                Error::Frequency(format!(
                    "the frequency of local oscillator '{}' was never determined",
                    self.name
                ))
            })?;
        let mut settings = IndexMap::new();
        settings.insert("frequency".to_string(), json!(frequency));
        if let Some(power) = self.power {
            settings.insert("power".to_string(), json!(power));
        }
        Ok(Some(CompiledInstrument::Settings(settings)))
    }
}

/// Compiler of a cluster: fans operations out to its child modules and
/// aggregates their compiled programs into a subtree.
pub struct ClusterCompiler {
    name: String,
    modules: IndexMap<String, ModuleCompiler>,
}

impl ClusterCompiler {
    pub fn new(
        name: impl Into<String>,
        config: &InstrumentConfig,
        total_play_time: f64,
        latency_corrections: &HashMap<String, f64>,
    ) -> Result<Self> {
        let name = name.into();
        let mut modules = IndexMap::new();
        for (module_name, module_config) in config.module_configs(&name)? {
            if !module_config.instrument_type.is_module() {
                return Err(Error::Config(format!(
                    "entry '{module_name}' of cluster '{name}' is not a \
                     sequencing module"
                )));
            }
            modules.insert(
                module_name.clone(),
                ModuleCompiler::new(
                    module_name,
                    &module_config,
                    total_play_time,
                    latency_corrections,
                )?,
            );
        }
        Ok(Self { name, modules })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn owns(&self, port_clock: &PortClock) -> bool {
        self.modules.values().any(|module| module.owns(port_clock))
    }

    pub fn add_operation(&mut self, op: OpInfo) -> Result<()> {
        for module in self.modules.values_mut() {
            if module.owns(&op.port_clock) {
                module.add_operation(op.clone())?;
            }
        }
        Ok(())
    }

    pub fn prepare(&mut self, ctx: &mut CompileContext<'_>) -> Result<()> {
        for module in self.modules.values_mut() {
            module.prepare(ctx)?;
        }
        Ok(())
    }

    pub fn compile(
        &mut self,
        repetitions: u64,
        options: &mut CompileOptions<'_>,
    ) -> Result<Option<CompiledInstrument>> {
        let mut subtree = IndexMap::new();
        for (module_name, module) in &mut self.modules {
            if let Some(compiled) = module.compile(repetitions, options)? {
                subtree.insert(module_name.clone(), compiled);
            }
        }
        if subtree.is_empty() {
            return Ok(None);
        }
        Ok(Some(CompiledInstrument::Cluster(subtree)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware_config::HardwareConfig;
    use crate::ops::{AcquisitionInfo, AcquisitionProtocol, BinMode, PulseInfo, PulseShape};
    use serde_json::json;

    fn context_fixture() -> (HashMap<String, ClockResource>, HashMap<String, FrequencySlot>) {
        let resources = HashMap::from([
            ("q0.01".to_string(), ClockResource { freq: 5e9 }),
            ("q0.ro".to_string(), ClockResource { freq: 7e9 }),
        ]);
        (resources, HashMap::new())
    }

    fn instrument_config(value: serde_json::Value) -> InstrumentConfig {
        let cfg = HardwareConfig::from_json(json!({ "dut": value })).unwrap();
        cfg.instruments().unwrap()["dut"].clone()
    }

    fn qcm_config() -> InstrumentConfig {
        instrument_config(json!({
            "instrument_type": "QCM",
            "complex_output_0": {
                "lo_name": "lo0",
                "portclock_configs": [
                    {"port": "q0:mw", "clock": "q0.01", "interm_freq": 50e6}
                ]
            }
        }))
    }

    fn square_pulse(timing: f64) -> OpInfo {
        OpInfo {
            name: "SquarePulse".to_string(),
            timing,
            port_clock: PortClock::new("q0:mw", "q0.01"),
            data: OpData::Pulse(PulseInfo {
                shape: PulseShape::Square { amp: 0.5 },
                duration: 16e-9,
                phase: 0.0,
                output: None,
            }),
        }
    }

    #[test]
    fn test_prepare_assigns_pinned_if() {
        let (resources, mut los) = context_fixture();
        los.insert("lo0".to_string(), FrequencySlot::Unset);
        let mut ctx = CompileContext {
            resources: &resources,
            lo_frequencies: &mut los,
        };
        let mut module =
            ModuleCompiler::new("qcm0", &qcm_config(), 16e-9, &HashMap::new()).unwrap();
        module.add_operation(square_pulse(0.0)).unwrap();
        module.prepare(&mut ctx).unwrap();
        let seq = &module.sequencers[0];
        assert_eq!(seq.settings.modulation_freq.get(), Some(50e6));
        assert!(seq.settings.nco_en);
    }

    #[test]
    fn test_module_resolves_shared_lo() {
        let config = instrument_config(json!({
            "instrument_type": "QCM",
            "complex_output_0": {
                "lo_name": "lo0",
                "portclock_configs": [
                    {"port": "q0:mw", "clock": "q0.01", "interm_freq": 50e6}
                ]
            }
        }));
        let (resources, mut los) = context_fixture();
        los.insert("lo0".to_string(), FrequencySlot::Unset);
        let mut ctx = CompileContext {
            resources: &resources,
            lo_frequencies: &mut los,
        };
        let mut module = ModuleCompiler::new("qcm0", &config, 16e-9, &HashMap::new()).unwrap();
        module.prepare(&mut ctx).unwrap();
        // f_LO = f_clock - f_IF.
        assert_eq!(los["lo0"].get(), Some(5e9 - 50e6));
    }

    #[test]
    fn test_duplicate_portclock_is_fatal() {
        let config = instrument_config(json!({
            "instrument_type": "QCM",
            "complex_output_0": {
                "portclock_configs": [{"port": "q0:mw", "clock": "q0.01"}]
            },
            "complex_output_1": {
                "portclock_configs": [{"port": "q0:mw", "clock": "q0.01"}]
            }
        }));
        assert!(matches!(
            ModuleCompiler::new("qcm0", &config, 16e-9, &HashMap::new()),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_unknown_io_is_fatal() {
        let config = instrument_config(json!({
            "instrument_type": "QCM_RF",
            "real_output_0": {
                "portclock_configs": [{"port": "q0:mw", "clock": "q0.01"}]
            }
        }));
        assert!(matches!(
            ModuleCompiler::new("qcmrf0", &config, 16e-9, &HashMap::new()),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_acquisition_on_qcm_is_fatal() {
        let mut module =
            ModuleCompiler::new("qcm0", &qcm_config(), 16e-9, &HashMap::new()).unwrap();
        let acquisition = OpInfo {
            name: "Trace".to_string(),
            timing: 0.0,
            port_clock: PortClock::new("q0:mw", "q0.01"),
            data: OpData::Acquisition(AcquisitionInfo {
                protocol: AcquisitionProtocol::Trace,
                bin_mode: BinMode::Average,
                acq_channel: 0,
                acq_index: 0,
                duration: 100e-9,
                weights: vec![],
                num_times: None,
                acq_rotation: None,
                acq_threshold: None,
                integration_length: None,
            }),
        };
        assert!(matches!(
            module.add_operation(acquisition),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_duplicate_scope_acquisition_is_fatal() {
        let config = instrument_config(json!({
            "instrument_type": "QRM",
            "complex_output_0": {
                "portclock_configs": [{"port": "q0:res", "clock": "q0.ro", "interm_freq": 0}]
            },
            "complex_input_0": {
                "portclock_configs": [{"port": "q1:res", "clock": "q0.ro", "interm_freq": 0}]
            }
        }));
        let (resources, mut los) = context_fixture();
        let mut ctx = CompileContext {
            resources: &resources,
            lo_frequencies: &mut los,
        };
        let mut module = ModuleCompiler::new("qrm0", &config, 400e-9, &HashMap::new()).unwrap();
        for port in ["q0:res", "q1:res"] {
            module
                .add_operation(OpInfo {
                    name: "Trace".to_string(),
                    timing: 0.0,
                    port_clock: PortClock::new(port, "q0.ro"),
                    data: OpData::Acquisition(AcquisitionInfo {
                        protocol: AcquisitionProtocol::Trace,
                        bin_mode: BinMode::Average,
                        acq_channel: 0,
                        acq_index: 0,
                        duration: 100e-9,
                        weights: vec![],
                        num_times: None,
                        acq_rotation: None,
                        acq_threshold: None,
                        integration_length: None,
                    }),
                })
                .unwrap();
        }
        let err = module.prepare(&mut ctx).unwrap_err();
        let Error::Config(message) = err else {
            panic!("expected a configuration error");
        };
        assert!(message.contains("sequencers 0 and 1"));
    }

    #[test]
    fn test_attenuation_conflict_is_fatal() {
        let config = instrument_config(json!({
            "instrument_type": "QRM_RF",
            "complex_output_0": {
                "lo_freq": 7.2e9,
                "input_att": 10,
                "portclock_configs": [{"port": "q0:res", "clock": "q0.ro"}]
            },
            "complex_input_0": {
                "lo_freq": 7.2e9,
                "input_att": 10,
                "portclock_configs": [{"port": "q1:res", "clock": "q0.ro"}]
            }
        }));
        let (resources, mut los) = context_fixture();
        let mut ctx = CompileContext {
            resources: &resources,
            lo_frequencies: &mut los,
        };
        let mut module = ModuleCompiler::new("qrmrf0", &config, 16e-9, &HashMap::new()).unwrap();
        assert!(matches!(module.prepare(&mut ctx), Err(Error::Config(_))));
    }

    #[test]
    fn test_fractional_attenuation_is_fatal() {
        let config = instrument_config(json!({
            "instrument_type": "QCM_RF",
            "complex_output_0": {
                "lo_freq": 4.8e9,
                "output_att": 10.5,
                "portclock_configs": [{"port": "q0:mw", "clock": "q0.01"}]
            }
        }));
        let (resources, mut los) = context_fixture();
        let mut ctx = CompileContext {
            resources: &resources,
            lo_frequencies: &mut los,
        };
        let mut module = ModuleCompiler::new("qcmrf0", &config, 16e-9, &HashMap::new()).unwrap();
        assert!(matches!(module.prepare(&mut ctx), Err(Error::Config(_))));
    }

    #[test]
    fn test_update_parameters_synthesis() {
        let offset = OpInfo {
            name: "VoltageOffset".to_string(),
            timing: 100e-9,
            port_clock: PortClock::new("q0:mw", "q0.01"),
            data: OpData::Offset(crate::ops::OffsetInfo {
                offset_path_0: 0.5,
                offset_path_1: 0.0,
            }),
        };
        // Offset co-located with a pulse: nothing synthesized.
        let mut ops = vec![square_pulse(100e-9), offset.clone()];
        insert_update_parameters(&mut ops, 200e-9);
        assert_eq!(ops.len(), 2);

        // Bare offset: an update-parameters appears at its timing.
        let mut ops = vec![square_pulse(0.0), offset.clone()];
        insert_update_parameters(&mut ops, 200e-9);
        assert_eq!(ops.len(), 3);
        assert!(matches!(ops[2].data, OpData::UpdateParameters));
        assert_eq!(ops[2].timing, 100e-9);

        // Offset at the schedule end: nothing synthesized.
        let mut ops = vec![
            square_pulse(0.0),
            OpInfo {
                timing: 200e-9,
                ..offset
            },
        ];
        insert_update_parameters(&mut ops, 200e-9);
        assert_eq!(ops.len(), 2);
    }

    #[test]
    fn test_lo_compiler_requires_a_frequency() {
        let config = instrument_config(json!({ "instrument_type": "LocalOscillator" }));
        let lo = LocalOscillatorCompiler::new("lo0", &config);
        let mut los = HashMap::new();
        let resources = HashMap::new();
        lo.prepare(&mut CompileContext {
            resources: &resources,
            lo_frequencies: &mut los,
        })
        .unwrap();
        assert!(matches!(lo.compile(&los), Err(Error::Frequency(_))));

        los.get_mut("lo0").unwrap().try_set(5e9, "lo0").unwrap();
        let Some(CompiledInstrument::Settings(settings)) = lo.compile(&los).unwrap() else {
            panic!("expected LO settings");
        };
        assert_eq!(settings["frequency"], json!(5e9));
    }
}
