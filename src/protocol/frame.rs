//! Payload-block dispatcher: splits a checksum-valid payload into
//! sub-records and distributes them into the record pool.
//!
//! A payload is a concatenation of sub-records, each
//! `HDR(1) | SUBLEN(1) | DATA(SUBLEN)`, in any order, at most one instance
//! of a given header id per frame. The final single byte of the payload is
//! protocol residue and is never interpreted.

use super::records::{
    header, sub_length, CliffData, CoreSensorData, CurrentData, DockIrData, EepromData,
    GpInputData, InertiaData, IrData, MagnetData, StGyroData, TimeData, VersionData,
};
use crate::error::{Error, Result};
use std::collections::BTreeSet;

/// Most recently decoded sub-record per header id.
///
/// All slots start empty; readers observe whatever was last written. The
/// driver copies slots out for accessors, so the contract is snapshot per
/// id, never cross-id atomicity.
#[derive(Debug, Clone, Default)]
pub struct RecordPool {
    pub core: Option<CoreSensorData>,
    pub ir: Option<IrData>,
    pub dock_ir: Option<DockIrData>,
    pub inertia: Option<InertiaData>,
    pub cliff: Option<CliffData>,
    pub current: Option<CurrentData>,
    pub magnet: Option<MagnetData>,
    pub time: Option<TimeData>,
    pub hw: Option<VersionData>,
    pub fw: Option<VersionData>,
    pub st_gyro: Option<StGyroData>,
    pub eeprom: Option<EepromData>,
    pub gp_input: Option<GpInputData>,
}

/// Splits payload blocks into sub-records and tracks which header ids the
/// most recent frame carried.
///
/// Iteration of the seen set is ascending by header id, which makes
/// observer notification order deterministic and puts the core record
/// (lowest id) first.
pub struct FrameDispatcher {
    /// Only `"2.0"` frames are decoded; other versions are drained unparsed
    decode_enabled: bool,
    seen: BTreeSet<u8>,
}

impl FrameDispatcher {
    pub fn new(protocol_version: &str) -> Self {
        let decode_enabled = protocol_version == "2.0";
        if !decode_enabled {
            log::warn!(
                "Protocol version {:?} not supported for decoding; frames will be drained only",
                protocol_version
            );
        }
        Self {
            decode_enabled,
            seen: BTreeSet::new(),
        }
    }

    /// Header ids present in the most recent successfully dispatched frame,
    /// ascending.
    pub fn seen_ids(&self) -> impl Iterator<Item = u8> + '_ {
        self.seen.iter().copied()
    }

    /// Distribute one payload block into the pool.
    ///
    /// On an unrecognised header id the remainder of the payload and this
    /// frame's seen set are abandoned and `FrameMalformed` is returned. A
    /// recognised sub-record whose declared length disagrees with its
    /// schema is logged and skipped; the pool slot keeps its old value.
    pub fn dispatch(&mut self, payload: &[u8], pool: &mut RecordPool) -> Result<()> {
        self.seen.clear();
        if !self.decode_enabled {
            return Ok(());
        }

        let mut rest = payload;
        // one trailing byte is reserved residue, never a sub-record
        while rest.len() > 1 {
            let header_id = rest[0];
            let Some(expected) = sub_length(header_id) else {
                log::warn!(
                    "Unknown header id 0x{:02X}, flushing remainder of frame",
                    header_id
                );
                self.seen.clear();
                return Err(Error::FrameMalformed { header: header_id });
            };

            let declared = rest[1] as usize;
            if rest.len() < 2 + declared {
                log::warn!(
                    "Sub-record 0x{:02X} declares {} bytes but only {} remain, dropping tail",
                    header_id,
                    declared,
                    rest.len() - 2
                );
                break;
            }

            let data = &rest[2..2 + declared];
            if declared == expected as usize {
                self.decode_into(header_id, data, pool);
                self.seen.insert(header_id);
            } else {
                log::warn!(
                    "Sub-record 0x{:02X} length {} does not match schema {}, skipping",
                    header_id,
                    declared,
                    expected
                );
            }
            rest = &rest[2 + declared..];
        }

        Ok(())
    }

    fn decode_into(&self, header_id: u8, data: &[u8], pool: &mut RecordPool) {
        match header_id {
            header::DEFAULT => pool.core = Some(CoreSensorData::decode(data)),
            header::IR => pool.ir = Some(IrData::decode(data)),
            header::DOCK_IR => pool.dock_ir = Some(DockIrData::decode(data)),
            header::INERTIA => pool.inertia = Some(InertiaData::decode(data)),
            header::CLIFF => pool.cliff = Some(CliffData::decode(data)),
            header::CURRENT => pool.current = Some(CurrentData::decode(data)),
            header::MAGNET => pool.magnet = Some(MagnetData::decode(data)),
            header::TIME => pool.time = Some(TimeData::decode(data)),
            header::HW => pool.hw = Some(VersionData::decode(data)),
            header::FW => pool.fw = Some(VersionData::decode(data)),
            header::ST_GYRO => pool.st_gyro = Some(StGyroData::decode(data)),
            header::EEPROM => pool.eeprom = Some(EepromData::decode(data)),
            header::GP_INPUT => pool.gp_input = Some(GpInputData::decode(data)),
            _ => unreachable!("sub_length() gates recognised ids"),
        }
    }
}
