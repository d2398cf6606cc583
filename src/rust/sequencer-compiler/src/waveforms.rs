// Copyright 2026 the sequencer-compiler developers
// SPDX-License-Identifier: BSD-3-Clause

//! Waveform sample materialization and the per-sequencer waveform memory.

use indexmap::IndexMap;
use num_complex::Complex64;
use serde::Serialize;

use crate::constants::SAMPLING_RATE;
use crate::ops::{PulseInfo, PulseShape};

/// Number of samples a duration in seconds occupies at the AWG sampling
/// rate.
pub fn duration_to_samples(duration: f64) -> usize {
    (duration * SAMPLING_RATE).round() as usize
}

/// Materializes the complex samples of a pulse at the hardware sampling
/// rate, phase rotation applied.
pub fn sample_pulse(info: &PulseInfo) -> Vec<Complex64> {
    let num_samples = duration_to_samples(info.duration);
    let mut samples: Vec<Complex64> = match &info.shape {
        PulseShape::Square { amp } => vec![Complex64::new(*amp, 0.0); num_samples],
        PulseShape::Ramp { amp } => (0..num_samples)
            .map(|n| Complex64::new(amp * n as f64 / num_samples.max(1) as f64, 0.0))
            .collect(),
        PulseShape::SoftSquare { amp } => {
            // Square with raised-cosine edges over a quarter of the pulse on
            // each side.
            let edge = num_samples / 4;
            (0..num_samples)
                .map(|n| {
                    let envelope = if n < edge && edge > 0 {
                        0.5 * (1.0 - (std::f64::consts::PI * n as f64 / edge as f64).cos())
                    } else if n >= num_samples - edge && edge > 0 {
                        let m = num_samples - 1 - n;
                        0.5 * (1.0 - (std::f64::consts::PI * m as f64 / edge as f64).cos())
                    } else {
                        1.0
                    };
                    Complex64::new(amp * envelope, 0.0)
                })
                .collect()
        }
        PulseShape::Samples { samples } => samples.clone(),
    };
    if info.phase != 0.0 {
        let rotation = Complex64::from_polar(1.0, info.phase.to_radians());
        for sample in &mut samples {
            *sample *= rotation;
        }
    }
    samples
}

/// Normalizes complex samples into two real paths plus the gains that
/// restore the original amplitude.
///
/// The AWG plays unit-range waveform memory scaled by `set_awg_gain`; the
/// returned gains are in [-1.0, 1.0].
pub fn normalize_paths(samples: &[Complex64]) -> (Vec<f64>, Vec<f64>, f64, f64) {
    let norm = samples
        .iter()
        .map(|s| s.re.abs().max(s.im.abs()))
        .fold(0.0, f64::max);
    if norm == 0.0 {
        let zeros = vec![0.0; samples.len()];
        return (zeros.clone(), zeros, 0.0, 0.0);
    }
    let path0 = samples.iter().map(|s| s.re / norm).collect();
    let path1 = samples.iter().map(|s| s.im / norm).collect();
    (path0, path1, norm, norm)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Waveform {
    pub data: Vec<f64>,
    pub index: u32,
}

/// Waveform memory of one sequencer, deduplicated by content.
///
/// Waveform names are the md5 digest of the raw sample bytes, so identical
/// data shares one memory slot and compilation output is reproducible.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct WaveformDict {
    entries: IndexMap<String, Waveform>,
}

impl WaveformDict {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts sample data, returning the assigned index. Data already
    /// present keeps its original index.
    pub fn insert(&mut self, data: Vec<f64>) -> u32 {
        let name = content_name(&data);
        if let Some(waveform) = self.entries.get(&name) {
            return waveform.index;
        }
        let index = self.entries.len() as u32;
        self.entries.insert(name, Waveform { data, index });
        index
    }

    /// Total sample count, checked against the waveform memory limit.
    pub fn total_samples(&self) -> usize {
        self.entries.values().map(|wf| wf.data.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &IndexMap<String, Waveform> {
        &self.entries
    }
}

fn content_name(data: &[f64]) -> String {
    let mut bytes = Vec::with_capacity(data.len() * 8);
    for value in data {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    format!("{:x}", md5::compute(&bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(amp: f64, duration: f64) -> PulseInfo {
        PulseInfo {
            shape: PulseShape::Square { amp },
            duration,
            phase: 0.0,
            output: None,
        }
    }

    #[test]
    fn test_square_sampling() {
        let samples = sample_pulse(&square(0.25, 16e-9));
        assert_eq!(samples.len(), 16);
        assert!(samples.iter().all(|s| s.re == 0.25 && s.im == 0.0));
    }

    #[test]
    fn test_phase_rotation() {
        let info = PulseInfo {
            phase: 90.0,
            ..square(1.0, 4e-9)
        };
        let samples = sample_pulse(&info);
        assert!(samples[0].re.abs() < 1e-12);
        assert!((samples[0].im - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_normalize_paths() {
        let samples = vec![Complex64::new(0.5, -0.25); 8];
        let (path0, path1, gain0, gain1) = normalize_paths(&samples);
        assert_eq!(gain0, 0.5);
        assert_eq!(gain1, 0.5);
        assert!(path0.iter().all(|v| *v == 1.0));
        assert!(path1.iter().all(|v| *v == -0.5));
    }

    #[test]
    fn test_dict_deduplicates_by_content() {
        let mut dict = WaveformDict::new();
        let first = dict.insert(vec![0.0, 0.5, 1.0]);
        let second = dict.insert(vec![1.0, 0.5]);
        let duplicate = dict.insert(vec![0.0, 0.5, 1.0]);
        assert_eq!(first, 0);
        assert_eq!(second, 1);
        assert_eq!(duplicate, first);
        assert_eq!(dict.total_samples(), 5);
    }
}
