// Copyright 2026 the sequencer-compiler developers
// SPDX-License-Identifier: BSD-3-Clause

//! Typed model of the hardware configuration consumed by the compiler.
//!
//! The configuration is a nested mapping keyed by instrument name. Besides
//! the typed fields, instrument entries carry free-form keys: for modules
//! these are the I/O configurations (`complex_output_0`, ...), for clusters
//! the child module entries. Non-object values (addresses and the like) are
//! transport concerns and skipped.

use indexmap::IndexMap;
use serde::Deserialize;
use std::collections::HashMap;

use crate::hw_properties::InstrumentType;
use crate::{Error, Result};

#[derive(Debug, Clone, Deserialize)]
pub struct HardwareConfig {
    /// Delay per port-clock (`"port-clock"` key), in seconds, applied by
    /// delaying the start of the sequencer program.
    #[serde(default)]
    pub latency_corrections: HashMap<String, f64>,
    /// Filter corrections applied to pulses per port-clock before they
    /// reach the sequencers.
    #[serde(default)]
    pub distortion_corrections: HashMap<String, DistortionCorrection>,
    #[serde(flatten)]
    entries: IndexMap<String, serde_json::Value>,
}

impl HardwareConfig {
    pub fn from_json(value: serde_json::Value) -> Result<Self> {
        serde_json::from_value(value)
            .map_err(|err| Error::Config(format!("malformed hardware configuration: {err}")))
    }

    /// The instrument entries of the configuration, in declaration order.
    pub fn instruments(&self) -> Result<IndexMap<String, InstrumentConfig>> {
        let mut instruments = IndexMap::new();
        for (name, value) in &self.entries {
            if !value.is_object() {
                continue;
            }
            let config: InstrumentConfig =
                serde_json::from_value(value.clone()).map_err(|err| {
                    Error::Config(format!("malformed entry for instrument '{name}': {err}"))
                })?;
            instruments.insert(name.clone(), config);
        }
        Ok(instruments)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DistortionCorrection {
    /// FIR filter coefficients convolved with the pulse samples.
    pub filter_coefficients: Vec<f64>,
    /// Optional `[min, max]` clipping applied after filtering.
    #[serde(default)]
    pub clipping_values: Option<[f64; 2]>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InstrumentConfig {
    pub instrument_type: InstrumentType,
    #[serde(default)]
    pub ref_source: Option<String>,
    /// Dump each compiled sequence to the caller-provided sink.
    #[serde(default)]
    pub sequence_to_file: Option<bool>,
    /// Local oscillator frequency, for `LocalOscillator` entries.
    #[serde(default)]
    pub frequency: Option<f64>,
    /// Local oscillator output power, for `LocalOscillator` entries.
    #[serde(default)]
    pub power: Option<f64>,
    #[serde(flatten)]
    rest: IndexMap<String, serde_json::Value>,
}

impl InstrumentConfig {
    /// The I/O configurations of a module entry, keyed by I/O name.
    pub fn io_configs(&self, instrument: &str) -> Result<IndexMap<String, IoConfig>> {
        let mut ios = IndexMap::new();
        for (io_name, value) in &self.rest {
            if !value.is_object() {
                continue;
            }
            let io: IoConfig = serde_json::from_value(value.clone()).map_err(|err| {
                Error::Config(format!(
                    "malformed I/O entry '{io_name}' of instrument '{instrument}': {err}"
                ))
            })?;
            ios.insert(io_name.clone(), io);
        }
        Ok(ios)
    }

    /// The child module entries of a cluster.
    pub fn module_configs(&self, cluster: &str) -> Result<IndexMap<String, InstrumentConfig>> {
        let mut modules = IndexMap::new();
        for (module_name, value) in &self.rest {
            if !value.is_object() {
                continue;
            }
            let module: InstrumentConfig =
                serde_json::from_value(value.clone()).map_err(|err| {
                    Error::Config(format!(
                        "malformed module entry '{module_name}' of cluster '{cluster}': {err}"
                    ))
                })?;
            modules.insert(module_name.clone(), module);
        }
        Ok(modules)
    }
}

fn default_mix_lo() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct IoConfig {
    #[serde(default)]
    pub portclock_configs: Vec<PortClockConfig>,
    #[serde(default)]
    pub lo_name: Option<String>,
    #[serde(default)]
    pub lo_freq: Option<f64>,
    /// IQ mixing with the LO; with `false` the LO tracks the clock
    /// frequency directly.
    #[serde(default = "default_mix_lo")]
    pub mix_lo: bool,
    #[serde(default)]
    pub downconverter_freq: Option<f64>,
    #[serde(default)]
    pub marker_debug_mode_enable: bool,
    #[serde(default, rename = "input_gain_I")]
    pub input_gain_i: Option<i64>,
    #[serde(default, rename = "input_gain_Q")]
    pub input_gain_q: Option<i64>,
    #[serde(default)]
    pub input_gain: Option<i64>,
    #[serde(default)]
    pub input_gain_0: Option<i64>,
    #[serde(default)]
    pub input_gain_1: Option<i64>,
    #[serde(default, rename = "dc_mixer_offset_I")]
    pub dc_mixer_offset_i: Option<f64>,
    #[serde(default, rename = "dc_mixer_offset_Q")]
    pub dc_mixer_offset_q: Option<f64>,
    #[serde(default)]
    pub input_att: Option<f64>,
    #[serde(default)]
    pub output_att: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PortClockConfig {
    pub port: String,
    pub clock: String,
    /// Pinned intermediate frequency; `0` permanently disables the NCO.
    #[serde(default)]
    pub interm_freq: Option<f64>,
}
