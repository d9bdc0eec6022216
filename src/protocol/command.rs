//! Outbound command records and their framing.
//!
//! Commands share the inbound framing: `AA 55 | LEN | record | CKS`, where
//! `LEN` is the serialised record length and `CKS` the XOR of every byte
//! from `LEN` through the last record byte. A record serialises as its
//! command id followed by its little-endian fields.

use super::bytes::FieldWriter;
use super::finder::MAX_PAYLOAD_LEN;
use crate::error::{Error, Result};

const STX_1: u8 = 0xAA;
const STX_2: u8 = 0x55;

/// Command ids accepted by the base firmware.
pub mod command_id {
    pub const BASE_CONTROL: u8 = 0x01;
    pub const SOUND: u8 = 0x03;
    pub const SOUND_SEQUENCE: u8 = 0x04;
    pub const REQUEST_EXTRA: u8 = 0x09;
    pub const CHANGE_FRAME: u8 = 0x0A;
    pub const REQUEST_EEPROM: u8 = 0x0B;
    pub const SET_DIGITAL_OUT: u8 = 0x0C;
}

/// A command record bound for the base.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    /// Motion: higher-wheel linear speed in mm/s and turning radius in mm
    /// (radius 0 = straight, ±1 = spin in place).
    BaseControl { speed: i16, radius: i16 },
    /// Play a single note; duration in device ticks.
    Sound { note: u16, duration: u8 },
    /// Play one of the preprogrammed sound sequences.
    SoundSequence { sequence: u8 },
    /// Request one-shot extra sub-records (hw/fw/eeprom flags).
    RequestExtra { flags: u16 },
    /// Switch the streamed reference frame.
    ChangeFrame { frame: u8 },
    /// Request an EEPROM slot dump.
    RequestEeprom { slot: u8 },
    /// Drive the general-purpose output pins.
    SetDigitalOut { gp_out: u16 },
}

impl Command {
    fn serialise(&self) -> Vec<u8> {
        let mut w = FieldWriter::new();
        match *self {
            Command::BaseControl { speed, radius } => {
                w.u8(command_id::BASE_CONTROL).i16(speed).i16(radius);
            }
            Command::Sound { note, duration } => {
                w.u8(command_id::SOUND).u16(note).u8(duration);
            }
            Command::SoundSequence { sequence } => {
                w.u8(command_id::SOUND_SEQUENCE).u8(sequence);
            }
            Command::RequestExtra { flags } => {
                w.u8(command_id::REQUEST_EXTRA).u16(flags);
            }
            Command::ChangeFrame { frame } => {
                w.u8(command_id::CHANGE_FRAME).u8(frame);
            }
            Command::RequestEeprom { slot } => {
                w.u8(command_id::REQUEST_EEPROM).u8(slot);
            }
            Command::SetDigitalOut { gp_out } => {
                w.u8(command_id::SET_DIGITAL_OUT).u16(gp_out);
            }
        }
        w.into_bytes()
    }

    /// Wrap the record in STX/LEN/CKS framing, ready for the port.
    pub fn to_frame(&self) -> Result<Vec<u8>> {
        let record = self.serialise();
        if record.is_empty() || record.len() > MAX_PAYLOAD_LEN as usize {
            return Err(Error::Serialisation(format!(
                "record length {} outside 1..={}",
                record.len(),
                MAX_PAYLOAD_LEN
            )));
        }

        let len = record.len() as u8;
        let mut frame = Vec::with_capacity(record.len() + 4);
        frame.push(STX_1);
        frame.push(STX_2);
        frame.push(len);
        frame.extend_from_slice(&record);
        let cks = frame[2..].iter().fold(0u8, |acc, &b| acc ^ b);
        frame.push(cks);
        Ok(frame)
    }
}

/// Translate a `(vx, wz)` motion request into the `(speed, radius)` pair
/// the base understands.
///
/// `radius` encodes the turn: 0 drives straight, ±1 spins in place, any
/// other value is the signed turning radius in mm. `speed` is the linear
/// speed of the faster wheel in mm/s, so the commanded arc is always
/// achievable by both wheels.
pub fn drive_values(vx: f64, wz: f64, bias: f64) -> (i16, i16) {
    let radius = if wz == 0.0 {
        0
    } else if vx == 0.0 && wz > 0.0 {
        1
    } else if vx == 0.0 && wz < 0.0 {
        -1
    } else {
        (vx * 1000.0 / wz).round() as i16
    };

    let speed = (1000.0 * f64::max(vx + bias * wz / 2.0, vx - bias * wz / 2.0)).round() as i16;
    (speed, radius)
}
