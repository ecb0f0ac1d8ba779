//! Simulated absolute encoder on a register-addressed bus.

use std::f64::consts::TAU;
use std::sync::Arc;

use parking_lot::Mutex;
use rwp_common::control_unit::config::BitLayout;
use rwp_common::hal::driver::{AngleSensor, HalError};
use rwp_common::hal::types::SensorAddress;
use tracing::trace;

use super::bench::BenchState;

/// Split layout resolution [counts per turn].
const SPLIT_COUNTS: u32 = 64 * 255;
/// Packed layout resolution [counts per turn].
const PACKED_COUNTS: u32 = 4096;

/// Encode a turn fraction into the two register bytes of `layout`.
///
/// Inverse of the controller's decoding, to within one count.
pub fn encode_turns(turns: f64, layout: BitLayout) -> [u8; 2] {
    let t = turns.rem_euclid(1.0);
    match layout {
        BitLayout::Split8x6 => {
            let counts = (t * SPLIT_COUNTS as f64).round() as u32 % SPLIT_COUNTS;
            [(counts / 64) as u8, (counts % 64) as u8]
        }
        BitLayout::Packed12 => {
            let counts = (t * PACKED_COUNTS as f64).round() as u32 % PACKED_COUNTS;
            [(counts >> 6) as u8, ((counts & 0x3F) << 2) as u8]
        }
    }
}

pub struct SimulatedEncoder {
    bench: Arc<Mutex<BenchState>>,
    address: SensorAddress,
    layout: BitLayout,
    gear_ratio: f64,
    mounting_offset: f64,
    good_reads: u64,
    failed_reads: u64,
    fail_after: Option<u64>,
    fail_count: Option<u64>,
}

impl SimulatedEncoder {
    pub(crate) fn new(
        bench: Arc<Mutex<BenchState>>,
        address: SensorAddress,
        layout: BitLayout,
        gear_ratio: f64,
        mounting_offset: f64,
        fail_after: Option<u64>,
        fail_count: Option<u64>,
    ) -> Self {
        Self {
            bench,
            address,
            layout,
            gear_ratio,
            mounting_offset,
            good_reads: 0,
            failed_reads: 0,
            fail_after,
            fail_count,
        }
    }

    pub fn good_reads(&self) -> u64 {
        self.good_reads
    }

    pub fn failed_reads(&self) -> u64 {
        self.failed_reads
    }

    fn should_fail(&self) -> bool {
        match self.fail_after {
            Some(after) if self.good_reads >= after => {
                self.fail_count.is_none_or(|n| self.failed_reads < n)
            }
            _ => false,
        }
    }
}

impl AngleSensor for SimulatedEncoder {
    fn read_angle_bytes(&mut self, addr: &SensorAddress) -> Result<[u8; 2], HalError> {
        if *addr != self.address {
            return Err(HalError::SensorRead(format!("no device at {addr}")));
        }
        if self.should_fail() {
            self.failed_reads += 1;
            return Err(HalError::SensorRead("bus NACK (injected)".to_string()));
        }
        let phi = self.bench.lock().plant.phi();
        let turns = self.gear_ratio * phi / TAU + self.mounting_offset;
        self.good_reads += 1;
        let bytes = encode_turns(turns, self.layout);
        trace!(phi, ?bytes, "encoder read");
        Ok(bytes)
    }
}
