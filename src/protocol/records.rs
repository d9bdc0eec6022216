//! Typed sub-record decoders for the sensor stream.
//!
//! Every sub-record is `HDR(1) | SUBLEN(1) | DATA(SUBLEN)`. The schemas
//! below are fixed-width; `SUBLEN` on the wire must equal the schema
//! constant for its header id or the dispatcher skips the record.
//!
//! All multi-byte fields are little-endian.

use super::bytes::FieldReader;

/// Header ids of the complete recognised sub-record set.
pub mod header {
    pub const DEFAULT: u8 = 0x01;
    pub const IR: u8 = 0x02;
    pub const DOCK_IR: u8 = 0x03;
    pub const INERTIA: u8 = 0x04;
    pub const CLIFF: u8 = 0x05;
    pub const CURRENT: u8 = 0x06;
    pub const MAGNET: u8 = 0x07;
    pub const TIME: u8 = 0x08;
    pub const HW: u8 = 0x09;
    pub const FW: u8 = 0x0A;
    pub const ST_GYRO: u8 = 0x0B;
    pub const EEPROM: u8 = 0x0C;
    pub const GP_INPUT: u8 = 0x0D;
}

/// Declared data length for a recognised header id.
pub fn sub_length(header_id: u8) -> Option<u8> {
    match header_id {
        header::DEFAULT => Some(CoreSensorData::SUBLEN),
        header::IR => Some(IrData::SUBLEN),
        header::DOCK_IR => Some(DockIrData::SUBLEN),
        header::INERTIA => Some(InertiaData::SUBLEN),
        header::CLIFF => Some(CliffData::SUBLEN),
        header::CURRENT => Some(CurrentData::SUBLEN),
        header::MAGNET => Some(MagnetData::SUBLEN),
        header::TIME => Some(TimeData::SUBLEN),
        header::HW => Some(VersionData::SUBLEN),
        header::FW => Some(VersionData::SUBLEN),
        header::ST_GYRO => Some(StGyroData::SUBLEN),
        header::EEPROM => Some(EepromData::SUBLEN),
        header::GP_INPUT => Some(GpInputData::SUBLEN),
        _ => None,
    }
}

/// Core sensor record (header 0x01), streamed every device period.
///
/// Carries the wheel encoders and timestamp that drive odometry, plus the
/// safety bitfields and battery state.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CoreSensorData {
    /// Device timestamp in milliseconds, wraps at 2^16
    pub time_stamp: u16,
    pub bumper: u8,
    pub wheel_drop: u8,
    pub cliff: u8,
    /// Left wheel tick counter, wraps at 2^16
    pub left_encoder: u16,
    /// Right wheel tick counter, wraps at 2^16
    pub right_encoder: u16,
    pub left_pwm: i8,
    pub right_pwm: i8,
    pub buttons: u8,
    pub charger: u8,
    /// Battery voltage in 0.1 V units
    pub battery: u8,
    pub over_current: u8,
}

impl CoreSensorData {
    pub const SUBLEN: u8 = 15;

    pub fn decode(data: &[u8]) -> Self {
        let mut r = FieldReader::new(data);
        Self {
            time_stamp: r.u16(),
            bumper: r.u8(),
            wheel_drop: r.u8(),
            cliff: r.u8(),
            left_encoder: r.u16(),
            right_encoder: r.u16(),
            left_pwm: r.i8(),
            right_pwm: r.i8(),
            buttons: r.u8(),
            charger: r.u8(),
            battery: r.u8(),
            over_current: r.u8(),
        }
    }
}

/// IR receiver intensities (header 0x02)
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct IrData {
    pub right: u8,
    pub centre: u8,
    pub left: u8,
}

impl IrData {
    pub const SUBLEN: u8 = 3;

    pub fn decode(data: &[u8]) -> Self {
        let mut r = FieldReader::new(data);
        Self {
            right: r.u8(),
            centre: r.u8(),
            left: r.u8(),
        }
    }
}

/// Docking station IR receivers (header 0x03)
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DockIrData {
    pub right: u8,
    pub centre: u8,
    pub left: u8,
}

impl DockIrData {
    pub const SUBLEN: u8 = 3;

    pub fn decode(data: &[u8]) -> Self {
        let mut r = FieldReader::new(data);
        Self {
            right: r.u8(),
            centre: r.u8(),
            left: r.u8(),
        }
    }
}

/// Factory-calibrated inertial measurement (header 0x04)
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct InertiaData {
    /// Heading in hundredths of a degree
    pub angle: i16,
    pub angle_rate: i16,
    pub acc_x: u8,
    pub acc_y: u8,
    pub acc_z: u8,
}

impl InertiaData {
    pub const SUBLEN: u8 = 7;

    pub fn decode(data: &[u8]) -> Self {
        let mut r = FieldReader::new(data);
        Self {
            angle: r.i16(),
            angle_rate: r.i16(),
            acc_x: r.u8(),
            acc_y: r.u8(),
            acc_z: r.u8(),
        }
    }
}

/// Cliff sensor ADC readings (header 0x05)
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CliffData {
    pub right: u16,
    pub centre: u16,
    pub left: u16,
}

impl CliffData {
    pub const SUBLEN: u8 = 6;

    pub fn decode(data: &[u8]) -> Self {
        let mut r = FieldReader::new(data);
        Self {
            right: r.u16(),
            centre: r.u16(),
            left: r.u16(),
        }
    }
}

/// Wheel motor currents in 10 mA units (header 0x06)
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CurrentData {
    pub left: u8,
    pub right: u8,
}

impl CurrentData {
    pub const SUBLEN: u8 = 2;

    pub fn decode(data: &[u8]) -> Self {
        let mut r = FieldReader::new(data);
        Self {
            left: r.u8(),
            right: r.u8(),
        }
    }
}

/// Magnetic strip detector (header 0x07)
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MagnetData {
    pub right: u8,
    pub centre: u8,
    pub left: u8,
}

impl MagnetData {
    pub const SUBLEN: u8 = 3;

    pub fn decode(data: &[u8]) -> Self {
        let mut r = FieldReader::new(data);
        Self {
            right: r.u8(),
            centre: r.u8(),
            left: r.u8(),
        }
    }
}

/// Standalone frame-time record (header 0x08)
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TimeData {
    pub frame_time: u16,
}

impl TimeData {
    pub const SUBLEN: u8 = 2;

    pub fn decode(data: &[u8]) -> Self {
        let mut r = FieldReader::new(data);
        Self {
            frame_time: r.u16(),
        }
    }
}

/// Hardware or firmware version triple (headers 0x09 and 0x0A share the layout)
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct VersionData {
    pub patch: u8,
    pub minor: u8,
    pub major: u8,
}

impl VersionData {
    pub const SUBLEN: u8 = 4;

    pub fn decode(data: &[u8]) -> Self {
        let mut r = FieldReader::new(data);
        let v = Self {
            patch: r.u8(),
            minor: r.u8(),
            major: r.u8(),
        };
        let _reserved = r.u8();
        v
    }
}

/// Raw z-gyro rates (header 0x0B)
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StGyroData {
    pub frame_id: u8,
    pub rate_x: i16,
    pub rate_y: i16,
    pub rate_z: i16,
}

impl StGyroData {
    pub const SUBLEN: u8 = 7;

    pub fn decode(data: &[u8]) -> Self {
        let mut r = FieldReader::new(data);
        Self {
            frame_id: r.u8(),
            rate_x: r.i16(),
            rate_y: r.i16(),
            rate_z: r.i16(),
        }
    }
}

/// EEPROM slot contents (header 0x0C)
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct EepromData {
    pub slot: u8,
    pub data: [u8; 16],
}

impl EepromData {
    pub const SUBLEN: u8 = 17;

    pub fn decode(data: &[u8]) -> Self {
        let mut r = FieldReader::new(data);
        let slot = r.u8();
        let mut bytes = [0u8; 16];
        for b in bytes.iter_mut() {
            *b = r.u8();
        }
        Self { slot, data: bytes }
    }
}

/// General purpose digital and analog inputs (header 0x0D)
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GpInputData {
    pub digital_input: u16,
    pub analog_input: [u16; 4],
}

impl GpInputData {
    pub const SUBLEN: u8 = 10;

    pub fn decode(data: &[u8]) -> Self {
        let mut r = FieldReader::new(data);
        let digital_input = r.u16();
        let mut analog_input = [0u16; 4];
        for a in analog_input.iter_mut() {
            *a = r.u16();
        }
        Self {
            digital_input,
            analog_input,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_core_sensor_decode() {
        let data = [
            0x10, 0x27, // time_stamp = 10000
            0x01, // bumper
            0x00, // wheel_drop
            0x02, // cliff
            0xFA, 0xFF, // left_encoder = 65530
            0x05, 0x00, // right_encoder = 5
            0x7F, // left_pwm = 127
            0x81, // right_pwm = -127
            0x04, // buttons
            0x02, // charger
            0xA0, // battery = 16.0 V
            0x00, // over_current
        ];
        assert_eq!(data.len() as u8, CoreSensorData::SUBLEN);

        let rec = CoreSensorData::decode(&data);
        assert_eq!(rec.time_stamp, 10000);
        assert_eq!(rec.bumper, 0x01);
        assert_eq!(rec.left_encoder, 65530);
        assert_eq!(rec.right_encoder, 5);
        assert_eq!(rec.left_pwm, 127);
        assert_eq!(rec.right_pwm, -127);
        assert_eq!(rec.battery, 0xA0);
    }

    #[test]
    fn test_inertia_decode_signed() {
        let data = [0x18, 0xFC, 0x0A, 0x00, 1, 2, 3];
        let rec = InertiaData::decode(&data);
        assert_eq!(rec.angle, -1000);
        assert_eq!(rec.angle_rate, 10);
        assert_eq!(rec.acc_z, 3);
    }

    #[test]
    fn test_gp_input_decode() {
        let data = [0x03, 0x00, 0x01, 0x00, 0x02, 0x00, 0x03, 0x00, 0x04, 0x00];
        let rec = GpInputData::decode(&data);
        assert_eq!(rec.digital_input, 3);
        assert_eq!(rec.analog_input, [1, 2, 3, 4]);
    }

    #[test]
    fn test_sub_length_table_covers_all_headers() {
        for id in header::DEFAULT..=header::GP_INPUT {
            assert!(sub_length(id).is_some(), "missing schema for 0x{:02X}", id);
        }
        assert_eq!(sub_length(0x00), None);
        assert_eq!(sub_length(0x0E), None);
    }
}
