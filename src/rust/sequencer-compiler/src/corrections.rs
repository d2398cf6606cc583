// Copyright 2026 the sequencer-compiler developers
// SPDX-License-Identifier: BSD-3-Clause

//! Distortion corrections applied to pulses before sequencer distribution.
//!
//! Corrected pulses are pre-sampled: the shape payload is replaced by the
//! filtered (and optionally clipped) numerical samples, so downstream
//! compilation sees an ordinary sampled pulse.

use num_complex::Complex64;
use std::collections::HashMap;

use crate::hardware_config::DistortionCorrection;
use crate::ops::{OpData, OpInfo, PulseShape};
use crate::waveforms;

/// Convolves real and imaginary parts with the FIR coefficients, keeping
/// the original sample count.
fn apply_fir(samples: &[Complex64], coefficients: &[f64]) -> Vec<Complex64> {
    (0..samples.len())
        .map(|n| {
            coefficients
                .iter()
                .enumerate()
                .filter(|(k, _)| *k <= n)
                .map(|(k, c)| samples[n - k] * *c)
                .sum()
        })
        .collect()
}

fn clip(samples: &mut [Complex64], bounds: [f64; 2]) {
    let [min, max] = bounds;
    for sample in samples {
        sample.re = sample.re.clamp(min, max);
        sample.im = sample.im.clamp(min, max);
    }
}

/// Applies the configured corrections in place. Operations without a
/// matching port-clock entry, and non-pulse operations, are untouched.
pub fn apply_distortion_corrections(
    ops: &mut [OpInfo],
    corrections: &HashMap<String, DistortionCorrection>,
) {
    if corrections.is_empty() {
        return;
    }
    for op in ops {
        let Some(correction) = corrections.get(&op.port_clock.key()) else {
            continue;
        };
        let OpData::Pulse(info) = &mut op.data else {
            continue;
        };
        let mut samples = apply_fir(&waveforms::sample_pulse(info), &correction.filter_coefficients);
        if let Some(bounds) = correction.clipping_values {
            clip(&mut samples, bounds);
        }
        info.phase = 0.0; // already folded into the samples
        info.shape = PulseShape::Samples { samples };
    }
}
