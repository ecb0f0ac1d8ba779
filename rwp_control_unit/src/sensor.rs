//! Absolute encoder sample decoding.
//!
//! The encoder returns two bytes `[hi, lo]` from its position register. How
//! they map onto one revolution depends on the configured [`BitLayout`]:
//!
//! ```text
//! split_8_6 : turns = hi/255 + lo/(64·255)          (mod 1)
//! packed_12 : turns = (((hi << 6) | (lo >> 2)) & 0xFFF) / 4096
//! ```
//!
//! The two layouts cover different value ranges and are never mixed within
//! a session.

use rwp_common::control_unit::config::BitLayout;

/// Packed-layout resolution [counts per turn].
pub const PACKED_COUNTS_PER_TURN: u32 = 4096;

/// One absolute-position readout as a fraction of a turn in [0, 1).
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default)]
pub struct RawSample(f64);

impl RawSample {
    /// Wrap an arbitrary turn value into [0, 1).
    pub fn from_turns(turns: f64) -> Self {
        let t = turns.rem_euclid(1.0);
        // rem_euclid can round up to exactly 1.0 for tiny negative inputs.
        Self(if t >= 1.0 { 0.0 } else { t })
    }

    #[inline]
    pub const fn turns(self) -> f64 {
        self.0
    }
}

/// Decode the two register bytes using the configured layout.
#[inline]
pub fn decode(bytes: [u8; 2], layout: BitLayout) -> RawSample {
    let [hi, lo] = bytes;
    match layout {
        BitLayout::Split8x6 => {
            RawSample::from_turns(hi as f64 / 255.0 + lo as f64 / (64.0 * 255.0))
        }
        BitLayout::Packed12 => {
            let counts = (((hi as u32) << 6) | ((lo as u32) >> 2)) & 0x0FFF;
            RawSample::from_turns(counts as f64 / PACKED_COUNTS_PER_TURN as f64)
        }
    }
}
