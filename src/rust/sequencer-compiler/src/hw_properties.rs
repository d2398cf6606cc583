// Copyright 2026 the sequencer-compiler developers
// SPDX-License-Identifier: BSD-3-Clause

//! Static hardware properties per instrument type.
//!
//! This table gathers all differences between the module types. Supporting
//! new hardware means extending it; nothing in the compiler is more generic
//! than this.

use serde::Deserialize;

use crate::constants::{
    MAX_NUMBER_OF_INSTRUCTIONS_QCM, MAX_NUMBER_OF_INSTRUCTIONS_QRM, NUMBER_OF_SEQUENCERS_QCM,
    NUMBER_OF_SEQUENCERS_QRM,
};
use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
pub enum InstrumentType {
    #[serde(rename = "QCM")]
    Qcm,
    #[serde(rename = "QRM")]
    Qrm,
    #[serde(rename = "QCM_RF")]
    QcmRf,
    #[serde(rename = "QRM_RF")]
    QrmRf,
    #[serde(rename = "Cluster")]
    Cluster,
    #[serde(rename = "LocalOscillator")]
    LocalOscillator,
}

/// Inclusive bounds of a hardware parameter.
#[derive(Debug, Clone, Copy)]
pub struct BoundedParameter {
    pub min: f64,
    pub max: f64,
    pub units: &'static str,
}

pub struct StaticHardwareProperties {
    pub instrument_type: &'static str,
    pub max_sequencers: usize,
    pub max_instructions: usize,
    pub mixer_dc_offset_range: BoundedParameter,
    pub valid_ios: &'static [&'static str],
    /// Marker value asserted at program start. For RF modules the low bits
    /// enable the RF output paths.
    pub default_marker: u32,
    pub supports_acquisition: bool,
    pub is_rf: bool,
}

const QCM_PROPERTIES: StaticHardwareProperties = StaticHardwareProperties {
    instrument_type: "QCM",
    max_sequencers: NUMBER_OF_SEQUENCERS_QCM,
    max_instructions: MAX_NUMBER_OF_INSTRUCTIONS_QCM,
    mixer_dc_offset_range: BoundedParameter {
        min: -2.5,
        max: 2.5,
        units: "V",
    },
    valid_ios: &[
        "complex_output_0",
        "complex_output_1",
        "real_output_0",
        "real_output_1",
        "real_output_2",
        "real_output_3",
        "digital_output_0",
        "digital_output_1",
        "digital_output_2",
        "digital_output_3",
    ],
    default_marker: 0,
    supports_acquisition: false,
    is_rf: false,
};

const QRM_PROPERTIES: StaticHardwareProperties = StaticHardwareProperties {
    instrument_type: "QRM",
    max_sequencers: NUMBER_OF_SEQUENCERS_QRM,
    max_instructions: MAX_NUMBER_OF_INSTRUCTIONS_QRM,
    mixer_dc_offset_range: BoundedParameter {
        min: -0.5,
        max: 0.5,
        units: "V",
    },
    valid_ios: &[
        "complex_output_0",
        "complex_input_0",
        "real_output_0",
        "real_output_1",
        "real_input_0",
        "real_input_1",
        "digital_output_0",
        "digital_output_1",
        "digital_output_2",
        "digital_output_3",
    ],
    default_marker: 0,
    supports_acquisition: true,
    is_rf: false,
};

const QCM_RF_PROPERTIES: StaticHardwareProperties = StaticHardwareProperties {
    instrument_type: "QCM_RF",
    max_sequencers: NUMBER_OF_SEQUENCERS_QCM,
    max_instructions: MAX_NUMBER_OF_INSTRUCTIONS_QCM,
    mixer_dc_offset_range: BoundedParameter {
        min: -0.05,
        max: 0.05,
        units: "V",
    },
    valid_ios: &[
        "complex_output_0",
        "complex_output_1",
        "digital_output_0",
        "digital_output_1",
    ],
    default_marker: 0b0011,
    supports_acquisition: false,
    is_rf: true,
};

const QRM_RF_PROPERTIES: StaticHardwareProperties = StaticHardwareProperties {
    instrument_type: "QRM_RF",
    max_sequencers: NUMBER_OF_SEQUENCERS_QRM,
    max_instructions: MAX_NUMBER_OF_INSTRUCTIONS_QRM,
    mixer_dc_offset_range: BoundedParameter {
        min: -0.05,
        max: 0.05,
        units: "V",
    },
    valid_ios: &[
        "complex_output_0",
        "complex_input_0",
        "digital_output_0",
        "digital_output_1",
    ],
    default_marker: 0b0010,
    supports_acquisition: true,
    is_rf: true,
};

impl InstrumentType {
    /// The static properties of a module type. Only module types have them;
    /// clusters and local oscillators have no sequencers.
    pub fn properties(&self) -> Option<&'static StaticHardwareProperties> {
        match self {
            InstrumentType::Qcm => Some(&QCM_PROPERTIES),
            InstrumentType::Qrm => Some(&QRM_PROPERTIES),
            InstrumentType::QcmRf => Some(&QCM_RF_PROPERTIES),
            InstrumentType::QrmRf => Some(&QRM_RF_PROPERTIES),
            InstrumentType::Cluster | InstrumentType::LocalOscillator => None,
        }
    }

    pub fn is_module(&self) -> bool {
        self.properties().is_some()
    }
}

/// Data paths a sequencer can drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoMode {
    /// Real-valued data on path 0.
    Real,
    /// Real-valued data on path 1 (paths swapped).
    Imag,
    Complex,
    /// Marker-line output only.
    Digital,
}

/// Derives the I/O mode and connected physical path indices from an I/O
/// name of the hardware configuration (e.g. `complex_output_0`).
pub fn io_info(io_name: &str) -> Result<(IoMode, Option<Vec<u8>>, Option<Vec<u8>>)> {
    let (kind, rest) = io_name
        .split_once('_')
        .ok_or_else(|| Error::Config(format!("'{io_name}' is not a valid I/O name")))?;
    let (direction, idx) = rest
        .split_once('_')
        .ok_or_else(|| Error::Config(format!("'{io_name}' is not a valid I/O name")))?;
    let idx: u8 = idx
        .parse()
        .map_err(|_| Error::Config(format!("'{io_name}' is not a valid I/O name")))?;

    let (mode, paths) = match kind {
        "complex" => (IoMode::Complex, vec![2 * idx, 2 * idx + 1]),
        // Odd real paths drive the Q data path of the DAC pair.
        "real" if idx % 2 == 0 => (IoMode::Real, vec![idx]),
        "real" => (IoMode::Imag, vec![idx]),
        "digital" => (IoMode::Digital, vec![idx]),
        _ => {
            return Err(Error::Config(format!(
                "'{io_name}' is not a valid I/O name"
            )));
        }
    };
    match direction {
        "output" => Ok((mode, Some(paths), None)),
        "input" => Ok((mode, None, Some(paths))),
        _ => Err(Error::Config(format!(
            "'{io_name}' is not a valid I/O name"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_info() {
        let (mode, outs, ins) = io_info("complex_output_1").unwrap();
        assert_eq!(mode, IoMode::Complex);
        assert_eq!(outs, Some(vec![2, 3]));
        assert_eq!(ins, None);

        let (mode, outs, ins) = io_info("real_input_1").unwrap();
        assert_eq!(mode, IoMode::Imag);
        assert_eq!(outs, None);
        assert_eq!(ins, Some(vec![1]));

        let (mode, outs, _) = io_info("digital_output_3").unwrap();
        assert_eq!(mode, IoMode::Digital);
        assert_eq!(outs, Some(vec![3]));

        assert!(io_info("bogus_output_0").is_err());
        assert!(io_info("complex_sideways_0").is_err());
    }

    #[test]
    fn test_properties_table() {
        assert!(InstrumentType::Qrm.properties().unwrap().supports_acquisition);
        assert!(!InstrumentType::Qcm.properties().unwrap().supports_acquisition);
        assert!(InstrumentType::QrmRf.properties().unwrap().is_rf);
        assert!(InstrumentType::Cluster.properties().is_none());
    }
}
