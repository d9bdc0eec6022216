//! Error types for kobuki-io
//!
//! # Error Recovery Strategies
//!
//! Only [`Error::Config`] is fatal: it is raised while constructing the
//! driver and aborts startup. Everything else is reported through the log
//! channels and recovered locally — stream corruption never takes the
//! worker down.
//!
//! - **`Serial` / `Io`**: open/read/write failure on the port. Logged as an
//!   error; the worker retries on the next tick.
//! - **`NoData`**: the 4 s read timeout elapsed with zero bytes. Logged as a
//!   warning; the loop continues.
//! - **`FrameMalformed`**: a payload carried an unknown header id or a
//!   sub-length that disagrees with its schema. The offending payload is
//!   discarded along with that frame's seen-id set.
//! - **`Serialisation`**: an outbound command record could not be encoded.
//!   The command is not sent.
//! - **`MutexPoisoned` / `ThreadPanic`**: a lock or join failed because
//!   another thread panicked. Surfaced to the caller of `stop()`; the
//!   driver must be re-created.

use thiserror::Error;

/// Errors that can occur in kobuki-io
///
/// See module-level documentation for recovery strategies.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config error: {0}")]
    Config(String),

    #[error("No serial data in")]
    NoData,

    #[error("Malformed frame: unknown header id 0x{header:02X}")]
    FrameMalformed { header: u8 },

    #[error("Serialisation error: {0}")]
    Serialisation(String),

    #[error("Mutex poisoned")]
    MutexPoisoned,

    #[error("Thread panic")]
    ThreadPanic,
}

pub type Result<T> = std::result::Result<T, Error>;
