//! Sliding-mode (bang-bang) balancing law.
//!
//! ```text
//! s = θ + C·θ̇
//! u = U_max·sign(s) + dither·(±1)
//! ```
//!
//! The switching term is discontinuous. With `boundary_layer = φ > 0` it is
//! replaced by `U_max·sat(s/φ)`; with φ = 0 no smoothing is applied. The
//! dither sign is drawn uniformly every tick. sign(0) = 0.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use rwp_common::config::ConfigError;
use rwp_common::control_unit::config::SlidingModeConfig;

use super::{ControlLaw, LawInput, require_non_negative};

#[derive(Debug, Clone)]
pub struct SlidingModeLaw {
    c: f64,
    u_max: f64,
    dither: f64,
    boundary_layer: f64,
    rng: StdRng,
}

impl SlidingModeLaw {
    pub fn new(cfg: &SlidingModeConfig) -> Result<Self, ConfigError> {
        require_non_negative("c", cfg.c)?;
        require_non_negative("dither", cfg.dither)?;
        require_non_negative("boundary_layer", cfg.boundary_layer)?;
        if !(cfg.u_max.is_finite() && cfg.u_max > 0.0) {
            return Err(ConfigError::InvalidLawConfig(format!(
                "u_max must be positive, got {}",
                cfg.u_max
            )));
        }
        let rng = match cfg.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Ok(Self {
            c: cfg.c,
            u_max: cfg.u_max,
            dither: cfg.dither,
            boundary_layer: cfg.boundary_layer,
            rng,
        })
    }

    /// Switching function `s = θ + C·θ̇`.
    #[inline]
    pub fn surface(&self, input: &LawInput) -> f64 {
        input.state.theta + self.c * input.state.theta_dot
    }

    fn switching(&self, s: f64) -> f64 {
        if self.boundary_layer > 0.0 {
            self.u_max * (s / self.boundary_layer).clamp(-1.0, 1.0)
        } else if s > 0.0 {
            self.u_max
        } else if s < 0.0 {
            -self.u_max
        } else {
            0.0
        }
    }
}

impl ControlLaw for SlidingModeLaw {
    fn compute(&mut self, input: &LawInput) -> f64 {
        let s = self.surface(input);
        let mut u = self.switching(s);
        if self.dither > 0.0 {
            let sign = if self.rng.gen_bool(0.5) { 1.0 } else { -1.0 };
            u += self.dither * sign;
        }
        u
    }

    fn reset(&mut self) {}

    fn name(&self) -> &'static str {
        "sliding_mode"
    }
}
