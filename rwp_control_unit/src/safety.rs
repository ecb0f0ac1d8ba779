//! Safety module root.
//!
//! Fall detection, sensor-fault escalation and the one-shot emergency stop.

pub mod supervisor;
