//! Continuous-angle reconstruction and upright calibration.
//!
//! The encoder only reports position modulo one revolution. [`AngleUnwrapper`]
//! counts crossings of the 0/1 boundary with a symmetric hysteresis band:
//!
//! ```text
//! diff = sample − last_sample
//! diff < −threshold  → wrap_count += 1   (forward wrap)
//! diff > +threshold  → wrap_count −= 1   (backward wrap)
//! continuous_turns   = sample + wrap_count
//! ```
//!
//! # Operating assumption
//!
//! This is an approximation, not exact unwrapping. It is only correct while
//! the true displacement between two consecutive samples stays below
//! `threshold` turns. At the default 0.5 and a 1 kHz loop that is 500 rev/s
//! of sensor shaft, far beyond a balancing pendulum, but a slower loop or a
//! high gear ratio shrinks the margin accordingly.

use core::f64::consts::TAU;

use rwp_common::config::ConfigError;

use crate::sensor::RawSample;

/// Unwrap state: last sample plus accumulated whole turns.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AngleUnwrapper {
    last_sample: f64,
    wrap_count: i64,
    threshold: f64,
}

impl AngleUnwrapper {
    /// Start unwrapping from the calibration sample.
    ///
    /// # Errors
    /// `ConfigError::ValidationError` unless `0 < threshold < 1`.
    pub fn new(threshold: f64, rest: RawSample) -> Result<Self, ConfigError> {
        if !(threshold.is_finite() && threshold > 0.0 && threshold < 1.0) {
            return Err(ConfigError::ValidationError(format!(
                "unwrap threshold {threshold} must lie strictly inside (0, 1)"
            )));
        }
        Ok(Self {
            last_sample: rest.turns(),
            wrap_count: 0,
            threshold,
        })
    }

    /// Feed one sample, returning the continuous angle in turns.
    #[inline]
    pub fn update(&mut self, sample: RawSample) -> f64 {
        let s = sample.turns();
        let diff = s - self.last_sample;
        if diff < -self.threshold {
            self.wrap_count += 1;
        } else if diff > self.threshold {
            self.wrap_count -= 1;
        }
        self.last_sample = s;
        self.continuous_turns()
    }

    #[inline]
    pub fn continuous_turns(&self) -> f64 {
        self.last_sample + self.wrap_count as f64
    }

    #[inline]
    pub const fn wrap_count(&self) -> i64 {
        self.wrap_count
    }

    #[inline]
    pub const fn last_sample(&self) -> f64 {
        self.last_sample
    }
}

/// Upright zero reference captured once per session.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Calibration {
    pub rest_turns: f64,
    /// Sensor turns per pendulum turn.
    pub gear_ratio: f64,
}

impl Calibration {
    /// `theta_raw = (2π / gear_ratio) · (continuous_turns − rest_turns)` [rad].
    #[inline]
    pub fn theta(&self, continuous_turns: f64) -> f64 {
        TAU / self.gear_ratio * (continuous_turns - self.rest_turns)
    }
}
