//! Observer interface: named channels on which the driver surfaces decoded
//! events and log messages.
//!
//! The driver does not hard-code any publish/subscribe facility. It pulses
//! [`Observer`] implementations registered before `start()`; middleware
//! bindings map [`Channel::topic`] names onto their own bus. Two in-process
//! reference bindings are provided: [`LogRelay`] (log facade) and
//! [`ChannelRelay`] (crossbeam channel fan-out).

use crate::protocol::records::header;
use crossbeam_channel::{Receiver, Sender, TrySendError};

/// Data channels the driver emits on, one per sub-record id plus the
/// derived wheel joint-state channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    JointState,
    SensorData,
    Ir,
    DockIr,
    Inertia,
    Cliff,
    Current,
    Magnet,
    Time,
    Hw,
    Fw,
    StGyro,
    Eeprom,
    GpInput,
}

impl Channel {
    /// Channel name suffix under the configured namespace.
    pub fn suffix(self) -> &'static str {
        match self {
            Channel::JointState => "/joint_state",
            Channel::SensorData => "/sensor_data",
            Channel::Ir => "/ir",
            Channel::DockIr => "/dock_ir",
            Channel::Inertia => "/inertia",
            Channel::Cliff => "/cliff",
            Channel::Current => "/current",
            Channel::Magnet => "/magnet",
            Channel::Time => "/time",
            Channel::Hw => "/hw",
            Channel::Fw => "/fw",
            Channel::StGyro => "/st_gyro",
            Channel::Eeprom => "/eeprom",
            Channel::GpInput => "/gp_input",
        }
    }

    /// Fully-qualified channel name, e.g. `/kobuki/sensor_data`.
    pub fn topic(self, namespace: &str) -> String {
        format!("{}{}", namespace, self.suffix())
    }

    /// The data channel pulsed for a decoded sub-record header id.
    /// `JointState` is derived and has no header of its own.
    pub fn for_header(header_id: u8) -> Option<Channel> {
        match header_id {
            header::DEFAULT => Some(Channel::SensorData),
            header::IR => Some(Channel::Ir),
            header::DOCK_IR => Some(Channel::DockIr),
            header::INERTIA => Some(Channel::Inertia),
            header::CLIFF => Some(Channel::Cliff),
            header::CURRENT => Some(Channel::Current),
            header::MAGNET => Some(Channel::Magnet),
            header::TIME => Some(Channel::Time),
            header::HW => Some(Channel::Hw),
            header::FW => Some(Channel::Fw),
            header::ST_GYRO => Some(Channel::StGyro),
            header::EEPROM => Some(Channel::Eeprom),
            header::GP_INPUT => Some(Channel::GpInput),
            _ => None,
        }
    }
}

/// Log channels mirroring the middleware severity levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogChannel {
    Debug,
    Info,
    Warn,
    Error,
}

impl LogChannel {
    pub fn suffix(self) -> &'static str {
        match self {
            LogChannel::Debug => "/ros_debug",
            LogChannel::Info => "/ros_info",
            LogChannel::Warn => "/ros_warn",
            LogChannel::Error => "/ros_error",
        }
    }

    pub fn topic(self, namespace: &str) -> String {
        format!("{}{}", namespace, self.suffix())
    }
}

/// Subscriber interface pulsed by the driver worker.
///
/// `notify` carries no payload: subscribers pull the records they need
/// through the driver accessors, which copy the pool slot out. Both
/// methods run on the worker thread and must not block; a slow observer
/// slows the driver.
pub trait Observer: Send + Sync {
    fn notify(&self, channel: Channel) {
        let _ = channel;
    }

    fn log(&self, channel: LogChannel, message: &str) {
        let _ = (channel, message);
    }
}

/// Routes driver log channels onto the `log` facade and ignores data
/// pulses. The daemon binary installs one of these by default.
pub struct LogRelay {
    namespace: String,
}

impl LogRelay {
    pub fn new(namespace: &str) -> Self {
        Self {
            namespace: namespace.to_string(),
        }
    }
}

impl Observer for LogRelay {
    fn log(&self, channel: LogChannel, message: &str) {
        let topic = channel.topic(&self.namespace);
        match channel {
            LogChannel::Debug => log::debug!("[{}] {}", topic, message),
            LogChannel::Info => log::info!("[{}] {}", topic, message),
            LogChannel::Warn => log::warn!("[{}] {}", topic, message),
            LogChannel::Error => log::error!("[{}] {}", topic, message),
        }
    }
}

/// Fans data pulses out over a bounded crossbeam channel so subscribers can
/// consume events off the worker thread.
///
/// Sends are non-blocking; when the subscriber falls behind, pulses are
/// dropped rather than stalling the serial loop.
pub struct ChannelRelay {
    tx: Sender<Channel>,
}

impl ChannelRelay {
    pub fn new(capacity: usize) -> (Self, Receiver<Channel>) {
        let (tx, rx) = crossbeam_channel::bounded(capacity);
        (Self { tx }, rx)
    }
}

impl Observer for ChannelRelay {
    fn notify(&self, channel: Channel) {
        match self.tx.try_send(channel) {
            Ok(()) | Err(TrySendError::Full(_)) => {}
            Err(TrySendError::Disconnected(_)) => {
                log::debug!("Channel relay disconnected, dropping {:?}", channel)
            }
        }
    }
}
