// Copyright 2026 the sequencer-compiler developers
// SPDX-License-Identifier: BSD-3-Clause

//! LO/IF/clock frequency resolution.
//!
//! Frequencies shared between sequencers (the modulation frequency of one
//! sequencer, the frequency of an LO feeding several outputs) are write-once
//! per compile pass: any later assignment must agree with the first one.

use serde::Serialize;

use crate::constants::FREQUENCY_REL_TOLERANCE;
use crate::{Error, Result};

pub fn freqs_close(a: f64, b: f64) -> bool {
    (a - b).abs() <= FREQUENCY_REL_TOLERANCE * a.abs().max(b.abs())
}

/// Write-once frequency slot: `Unset -> Set(value)`, where a second set to
/// a materially different value is a transition error rather than a silent
/// overwrite.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub enum FrequencySlot {
    #[default]
    Unset,
    Set(f64),
}

impl FrequencySlot {
    pub fn get(&self) -> Option<f64> {
        match self {
            FrequencySlot::Unset => None,
            FrequencySlot::Set(value) => Some(*value),
        }
    }

    /// Sets the slot, or fails if it already holds an incompatible value.
    /// `what` names the slot in the error message.
    pub fn try_set(&mut self, value: f64, what: &str) -> Result<()> {
        match *self {
            FrequencySlot::Set(previous) if !previous.is_nan() && !freqs_close(previous, value) => {
                Err(Error::Frequency(format!(
                    "attempting to set {what} to {value:e} Hz, while it has previously \
                     been set to {previous:e} Hz"
                )))
            }
            _ => {
                *self = FrequencySlot::Set(value);
                Ok(())
            }
        }
    }
}

impl Serialize for FrequencySlot {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.get().serialize(serializer)
    }
}

/// The LO/IF/clock triple of one sequencer path, related by
/// `f_clock = f_LO + f_IF`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Frequencies {
    pub clock: f64,
    pub lo: Option<f64>,
    pub intermediate: Option<f64>,
}

/// Solves `f_clock = f_LO + f_IF` given whichever of LO/IF is known.
///
/// With `mix_lo` false the LO bypasses the mixer and is set to the clock
/// frequency directly. An external downconverter folds the clock frequency
/// before solving.
pub fn resolve(
    mut freqs: Frequencies,
    downconverter_freq: Option<f64>,
    mix_lo: bool,
) -> Result<Frequencies> {
    if let Some(downconverter) = downconverter_freq {
        if downconverter <= 0.0 {
            return Err(Error::Frequency(format!(
                "downconverter frequency must be positive, got {downconverter:e} Hz"
            )));
        }
        if downconverter < freqs.clock {
            return Err(Error::Frequency(format!(
                "downconverter frequency {downconverter:e} Hz is below the clock \
                 frequency {:e} Hz",
                freqs.clock
            )));
        }
        freqs.clock = downconverter - freqs.clock;
    }

    if !mix_lo {
        freqs.lo = Some(freqs.clock);
        return Ok(freqs);
    }

    match (freqs.lo, freqs.intermediate) {
        (None, None) => Err(Error::Frequency(format!(
            "neither an LO nor an intermediate frequency is known for clock \
             frequency {:e} Hz; supply at least one",
            freqs.clock
        ))),
        (Some(lo), Some(intermediate)) => {
            if !freqs_close(lo + intermediate, freqs.clock) {
                return Err(Error::Frequency(format!(
                    "inconsistent frequencies: f_clock = {:e} Hz, but f_LO + f_IF = \
                     {lo:e} + {intermediate:e} = {:e} Hz",
                    freqs.clock,
                    lo + intermediate
                )));
            }
            Ok(freqs)
        }
        (Some(lo), None) => {
            freqs.intermediate = Some(freqs.clock - lo);
            Ok(freqs)
        }
        (None, Some(intermediate)) => {
            freqs.lo = Some(freqs.clock - intermediate);
            Ok(freqs)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_transitions() {
        let mut slot = FrequencySlot::default();
        assert_eq!(slot.get(), None);
        slot.try_set(5e9, "lo0_freq").unwrap();
        // Re-setting to the same value within tolerance is allowed.
        slot.try_set(5e9 * (1.0 + 1e-9), "lo0_freq").unwrap();
        assert!(slot.try_set(5.1e9, "lo0_freq").is_err());
        assert_eq!(slot.get(), Some(5e9 * (1.0 + 1e-9)));
    }

    #[test]
    fn test_resolve_if_from_lo() {
        let freqs = resolve(
            Frequencies {
                clock: 7.0e9,
                lo: Some(6.8e9),
                intermediate: None,
            },
            None,
            true,
        )
        .unwrap();
        assert!(freqs_close(freqs.intermediate.unwrap(), 0.2e9));
    }

    #[test]
    fn test_resolve_lo_from_if() {
        let freqs = resolve(
            Frequencies {
                clock: 7.0e9,
                lo: None,
                intermediate: Some(50e6),
            },
            None,
            true,
        )
        .unwrap();
        assert!(freqs_close(freqs.lo.unwrap(), 6.95e9));
    }

    #[test]
    fn test_resolve_consistency_roundtrip() {
        let consistent = Frequencies {
            clock: 7.0e9,
            lo: Some(6.8e9),
            intermediate: Some(0.2e9),
        };
        assert!(resolve(consistent, None, true).is_ok());

        // Within 1e-6 relative tolerance still passes.
        let nudged = Frequencies {
            lo: Some(6.8e9 * (1.0 + 1e-7)),
            ..consistent
        };
        assert!(resolve(nudged, None, true).is_ok());

        // Outside tolerance fails.
        let perturbed = Frequencies {
            lo: Some(6.8e9 + 1e6),
            ..consistent
        };
        assert!(matches!(
            resolve(perturbed, None, true),
            Err(Error::Frequency(_))
        ));
    }

    #[test]
    fn test_resolve_requires_one_of_lo_if() {
        let result = resolve(
            Frequencies {
                clock: 7.0e9,
                lo: None,
                intermediate: None,
            },
            None,
            true,
        );
        assert!(matches!(result, Err(Error::Frequency(_))));
    }

    #[test]
    fn test_mix_lo_false_pins_lo_to_clock() {
        let freqs = resolve(
            Frequencies {
                clock: 5.2e9,
                lo: None,
                intermediate: Some(100e6),
            },
            None,
            false,
        )
        .unwrap();
        assert_eq!(freqs.lo, Some(5.2e9));
        assert_eq!(freqs.intermediate, Some(100e6));
    }

    #[test]
    fn test_downconverter_folds_clock() {
        let freqs = resolve(
            Frequencies {
                clock: 5.0e9,
                lo: Some(3.9e9),
                intermediate: None,
            },
            Some(9.0e9),
            true,
        )
        .unwrap();
        // Folded clock is 9 - 5 = 4 GHz.
        assert!(freqs_close(freqs.intermediate.unwrap(), 0.1e9));
        assert!(resolve(
            Frequencies {
                clock: 5.0e9,
                lo: Some(3.9e9),
                intermediate: None,
            },
            Some(4.0e9),
            true,
        )
        .is_err());
    }
}
