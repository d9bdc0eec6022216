//! Framed binary protocol: byte codecs, stream resynchronisation, typed
//! sub-record decoding and outbound command encoding.
//!
//! Wire format summary (all multi-byte integers little-endian):
//!
//! ```text
//! frame      = STX(0xAA 0x55) | LEN | PAYLOAD(LEN bytes) | CKS
//! CKS        = XOR of LEN .. last payload byte
//! payload    = sub-record* | residue(1 byte)
//! sub-record = HDR(1) | SUBLEN(1) | DATA(SUBLEN bytes)
//! ```

pub mod bytes;
pub mod command;
pub mod finder;
pub mod frame;
pub mod records;

pub use command::{drive_values, Command};
pub use finder::PacketFinder;
pub use frame::{FrameDispatcher, RecordPool};
