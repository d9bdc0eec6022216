//! kobuki-io - Serial driver for a differential-drive robot base
//!
//! The base streams multiplexed sensor telemetry over a 115200-baud serial
//! link and accepts motion and configuration commands in the same framing.
//! This crate provides:
//!
//! - the framed packet codec (stream resynchronisation, checksum
//!   validation, typed sub-record pool)
//! - a worker-thread driver loop that drains the port, pulses observers
//!   and emits one motion command per inbound frame
//! - wrap-safe odometry integration with differential-drive forward
//!   kinematics
//! - the outbound command encoder

pub mod config;
pub mod driver;
pub mod error;
pub mod observer;
pub mod odometry;
pub mod protocol;
pub mod transport;

// Re-export commonly used types
pub use config::Config;
pub use driver::{JointState, KobukiDriver, Wheel};
pub use error::{Error, Result};
pub use protocol::Command;
