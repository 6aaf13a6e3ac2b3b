//! What the processing view shows while a job runs: the stage derived from
//! real backend progress, and a purely cosmetic counter driven by wall-clock
//! time.

use std::{fmt, time::Duration};
use strum::{EnumIter, IntoEnumIterator};

use crate::money::format_gbp;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, EnumIter)]
pub enum ProcessingStage {
    Analysing,
    Materials,
    Labour,
    Timescales,
    Finalising,
}

impl ProcessingStage {
    pub fn from_progress(progress: u8) -> Self {
        match progress.min(100) {
            0..=19 => ProcessingStage::Analysing,
            20..=39 => ProcessingStage::Materials,
            40..=59 => ProcessingStage::Labour,
            60..=79 => ProcessingStage::Timescales,
            _ => ProcessingStage::Finalising,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ProcessingStage::Analysing => "Analysing job description",
            ProcessingStage::Materials => "Pricing materials",
            ProcessingStage::Labour => "Calculating labour",
            ProcessingStage::Timescales => "Planning timescales",
            ProcessingStage::Finalising => "Finalising quote",
        }
    }

    pub fn index(self) -> usize {
        Self::iter().position(|s| s == self).unwrap_or_default()
    }

    pub fn count() -> usize {
        Self::iter().count()
    }
}

const COSMETIC_CEILING: f32 = 95.0;
const COSMETIC_TIME_CONSTANT_SECS: f32 = 45.0;
const ESTIMATE_CEILING: f64 = 2500.0;
const ESTIMATE_TIME_CONSTANT_SECS: f64 = 30.0;

/// Decorative running figure shown while waiting. Has no relation to the
/// real calculation and is deliberately not serializable.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecorativeEstimate(f64);

impl DecorativeEstimate {
    pub fn amount(self) -> f64 {
        self.0
    }
}

impl fmt::Display for DecorativeEstimate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "~{} (indicative only)", format_gbp(self.0))
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ProcessingSimulation {
    phase: f64,
}

impl ProcessingSimulation {
    pub fn new(seed: u64) -> Self {
        Self {
            phase: (seed % 628) as f64 / 100.0,
        }
    }

    /// Percentage for the animated bar. Never reaches 100 on its own.
    pub fn cosmetic_percent(&self, elapsed: Duration) -> f32 {
        let t = elapsed.as_secs_f32();
        let value = COSMETIC_CEILING * (1.0 - (-t / COSMETIC_TIME_CONSTANT_SECS).exp());
        value.clamp(0.0, COSMETIC_CEILING)
    }

    pub fn decorative_estimate(&self, elapsed: Duration) -> DecorativeEstimate {
        let t = elapsed.as_secs_f64();
        let base = ESTIMATE_CEILING * (1.0 - (-t / ESTIMATE_TIME_CONSTANT_SECS).exp());
        let wobble = (t * 1.7 + self.phase).sin() * 0.04 + (t * 0.63 + self.phase * 2.0).sin() * 0.03;
        let value = (base * (1.0 + wobble) / 10.0).round() * 10.0;
        DecorativeEstimate(value.max(0.0))
    }
}
