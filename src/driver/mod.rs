//! Driver facade: owns the serial port, the worker thread, the record pool
//! and the odometry state.
//!
//! # Thread Model
//!
//! One dedicated worker thread drains the serial port, feeds the packet
//! finder, dispatches decoded sub-records into the pool, updates odometry
//! and pulses observers. The worker is the only writer to the pool and the
//! odometry state while it runs; accessors copy values out under short
//! locks.
//!
//! The port itself sits behind a mutex so `send_command` from any thread
//! serialises against the worker's own writes. The worker suspends only
//! inside the serial read (4 s timeout); there is no internal sleep on the
//! hardware path — pacing comes from the device's ≈20 Hz stream.

mod worker;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::observer::Observer;
use crate::odometry::Odometry;
use crate::protocol::command::{drive_values, Command};
use crate::protocol::frame::RecordPool;
use crate::protocol::records::{
    CliffData, CoreSensorData, CurrentData, DockIrData, EepromData, GpInputData, IrData,
    InertiaData, MagnetData, StGyroData, TimeData, VersionData,
};
use crate::transport::{SerialTransport, Transport};
use std::sync::atomic::{AtomicBool, AtomicI16, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

/// Baud rate of the base's serial link.
const BAUD_RATE: u32 = 115200;

/// Wheel selector for joint-state queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wheel {
    Left,
    Right,
}

impl Wheel {
    pub fn joint_name(self) -> &'static str {
        match self {
            Wheel::Left => "wheel_left",
            Wheel::Right => "wheel_right",
        }
    }
}

/// Snapshot of one wheel joint.
#[derive(Debug, Clone, PartialEq)]
pub struct JointState {
    pub name: &'static str,
    /// Accumulated wheel angle in radians
    pub position: f64,
    /// Wheel angular velocity in rad/s
    pub velocity: f64,
    /// True while connected, running and enabled
    pub enabled: bool,
}

/// State shared between the facade and the worker thread.
pub(crate) struct SharedState {
    /// `None` in simulation mode and after `stop()`
    port: Mutex<Option<Box<dyn Transport>>>,
    pool: Mutex<RecordPool>,
    odometry: Mutex<Odometry>,
    /// Current motion command, read by the worker once per frame
    speed: AtomicI16,
    radius: AtomicI16,
    is_running: AtomicBool,
    is_enabled: AtomicBool,
    is_connected: AtomicBool,
}

impl SharedState {
    /// Encode and write the current `(speed, radius)` pair.
    fn send_base_control(&self) -> Result<()> {
        let command = Command::BaseControl {
            speed: self.speed.load(Ordering::Relaxed),
            radius: self.radius.load(Ordering::Relaxed),
        };
        self.write_command(&command)
    }

    /// Frame and write a command record. Discards silently when no port is
    /// open (simulation, or already stopped).
    fn write_command(&self, command: &Command) -> Result<()> {
        let frame = command.to_frame()?;
        let mut guard = self.port.lock().map_err(|_| Error::MutexPoisoned)?;
        if let Some(port) = guard.as_mut() {
            port.write_all(&frame)?;
        }
        Ok(())
    }
}

/// Serial driver for the differential-drive base.
///
/// ```no_run
/// use kobuki_io::{Config, KobukiDriver};
///
/// # fn main() -> kobuki_io::Result<()> {
/// let config = Config::load("/etc/kobuki.toml")?;
/// let mut driver = KobukiDriver::new(config)?;
/// driver.start()?;
/// driver.enable();
/// driver.set_motion(0.2, 0.0); // 0.2 m/s straight ahead
/// # Ok(())
/// # }
/// ```
pub struct KobukiDriver {
    config: Config,
    observers: Vec<Arc<dyn Observer>>,
    shared: Arc<SharedState>,
    worker_handle: Option<JoinHandle<()>>,
}

impl KobukiDriver {
    /// Construct the driver, opening the configured serial port unless
    /// simulating. Configuration problems abort here; everything later is
    /// recovered locally.
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let port: Option<Box<dyn Transport>> = if config.simulation {
            log::info!("Simulation mode: serial port not opened");
            None
        } else {
            Some(Box::new(SerialTransport::open(
                &config.device_port,
                BAUD_RATE,
            )?))
        };
        Ok(Self::assemble(config, port))
    }

    /// Construct the driver over an arbitrary transport. Used by tests to
    /// drive the worker from an in-memory byte source.
    pub fn with_transport(config: Config, transport: Box<dyn Transport>) -> Result<Self> {
        config.validate()?;
        Ok(Self::assemble(config, Some(transport)))
    }

    fn assemble(config: Config, port: Option<Box<dyn Transport>>) -> Self {
        let connected = port.is_some();
        let shared = Arc::new(SharedState {
            port: Mutex::new(port),
            pool: Mutex::new(RecordPool::default()),
            odometry: Mutex::new(Odometry::new(config.geometry)),
            speed: AtomicI16::new(0),
            radius: AtomicI16::new(0),
            is_running: AtomicBool::new(false),
            is_enabled: AtomicBool::new(false),
            is_connected: AtomicBool::new(connected),
        });
        Self {
            config,
            observers: Vec::new(),
            shared,
            worker_handle: None,
        }
    }

    /// Register an observer. Must be called before [`start`](Self::start);
    /// the worker snapshots the observer list when it spawns.
    pub fn add_observer(&mut self, observer: Arc<dyn Observer>) {
        self.observers.push(observer);
    }

    /// Spawn the worker thread.
    pub fn start(&mut self) -> Result<()> {
        if self.shared.is_running.load(Ordering::Relaxed) {
            log::warn!("Driver already running");
            return Ok(());
        }

        self.shared.is_running.store(true, Ordering::Relaxed);
        let shared = Arc::clone(&self.shared);
        let observers: Arc<[Arc<dyn Observer>]> = self.observers.clone().into();
        let protocol_version = self.config.protocol_version.clone();
        let simulation = self.config.simulation;

        self.worker_handle = Some(
            thread::Builder::new()
                .name("kobuki-worker".to_string())
                .spawn(move || {
                    worker::worker_loop(shared, observers, &protocol_version, simulation);
                })
                .map_err(|e| Error::Config(format!("Failed to spawn worker thread: {}", e)))?,
        );

        log::info!("Kobuki driver started");
        Ok(())
    }

    /// Arm command emission.
    pub fn enable(&self) {
        self.shared.is_enabled.store(true, Ordering::Relaxed);
    }

    /// Disarm command emission and bring the base to rest.
    pub fn disable(&self) {
        self.set_motion(0.0, 0.0);
        if let Err(e) = self.shared.send_base_control() {
            log::error!("Failed to send stop command: {}", e);
        }
        self.shared.is_enabled.store(false, Ordering::Relaxed);
    }

    /// Stop the worker, send one zero-motion command and close the port.
    /// Idempotent.
    pub fn stop(&mut self) -> Result<()> {
        self.shared.is_running.store(false, Ordering::Relaxed);
        self.shared.is_enabled.store(false, Ordering::Relaxed);

        if let Some(handle) = self.worker_handle.take() {
            handle.join().map_err(|_| Error::ThreadPanic)?;

            self.shared.speed.store(0, Ordering::Relaxed);
            self.shared.radius.store(0, Ordering::Relaxed);
            if let Err(e) = self.shared.send_base_control() {
                log::warn!("Failed to send final zero-motion command: {}", e);
            }

            // drop the port so the device node is released
            *self.shared.port.lock().map_err(|_| Error::MutexPoisoned)? = None;
            self.shared.is_connected.store(false, Ordering::Relaxed);
            log::info!("Kobuki driver stopped");
        }
        Ok(())
    }

    /// Set the motion target from linear (m/s) and angular (rad/s)
    /// velocity. The worker sends the resulting `(speed, radius)` pair once
    /// per inbound frame.
    pub fn set_motion(&self, vx: f64, wz: f64) {
        let (speed, radius) = drive_values(vx, wz, self.config.geometry.wheel_base);
        self.shared.speed.store(speed, Ordering::Relaxed);
        self.shared.radius.store(radius, Ordering::Relaxed);
    }

    /// Frame and send an arbitrary command record. A base-control record
    /// also replaces the periodic `(speed, radius)` pair.
    pub fn send_command(&self, command: Command) -> Result<()> {
        if let Command::BaseControl { speed, radius } = command {
            self.shared.speed.store(speed, Ordering::Relaxed);
            self.shared.radius.store(radius, Ordering::Relaxed);
        }
        if self.config.simulation {
            return Ok(());
        }
        self.shared.write_command(&command)
    }

    pub fn is_running(&self) -> bool {
        self.shared.is_running.load(Ordering::Relaxed)
    }

    pub fn is_enabled(&self) -> bool {
        self.shared.is_enabled.load(Ordering::Relaxed)
    }

    pub fn is_connected(&self) -> bool {
        self.shared.is_connected.load(Ordering::Relaxed)
    }

    /// Current `(speed, radius)` motion pair, mm/s and mm.
    pub fn motion_command(&self) -> (i16, i16) {
        (
            self.shared.speed.load(Ordering::Relaxed),
            self.shared.radius.load(Ordering::Relaxed),
        )
    }

    fn pool(&self) -> std::sync::MutexGuard<'_, RecordPool> {
        // a poisoned pool means the worker panicked; accessors keep working
        // on the last published snapshot
        self.shared
            .pool
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Core sensor record (encoders, bumpers, battery); `None` until the
    /// first frame decodes.
    pub fn sensor_data(&self) -> Option<CoreSensorData> {
        self.pool().core
    }

    pub fn ir_data(&self) -> Option<IrData> {
        self.pool().ir
    }

    pub fn dock_ir_data(&self) -> Option<DockIrData> {
        self.pool().dock_ir
    }

    pub fn inertia_data(&self) -> Option<InertiaData> {
        self.pool().inertia
    }

    pub fn cliff_data(&self) -> Option<CliffData> {
        self.pool().cliff
    }

    pub fn current_data(&self) -> Option<CurrentData> {
        self.pool().current
    }

    pub fn magnet_data(&self) -> Option<MagnetData> {
        self.pool().magnet
    }

    pub fn time_data(&self) -> Option<TimeData> {
        self.pool().time
    }

    pub fn hw_data(&self) -> Option<VersionData> {
        self.pool().hw
    }

    pub fn fw_data(&self) -> Option<VersionData> {
        self.pool().fw
    }

    pub fn st_gyro_data(&self) -> Option<StGyroData> {
        self.pool().st_gyro
    }

    pub fn eeprom_data(&self) -> Option<EepromData> {
        self.pool().eeprom
    }

    pub fn gp_input_data(&self) -> Option<GpInputData> {
        self.pool().gp_input
    }

    /// Position, velocity and enablement of one wheel joint.
    pub fn joint_state(&self, wheel: Wheel) -> JointState {
        let left = wheel == Wheel::Left;
        let (position, velocity) = {
            let odo = self
                .shared
                .odometry
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            (odo.wheel_position(left), odo.wheel_velocity(left))
        };
        JointState {
            name: wheel.joint_name(),
            position,
            velocity,
            enabled: self.is_connected() && self.is_running() && self.is_enabled(),
        }
    }
}

impl Drop for KobukiDriver {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Geometry;
    use crate::observer::{Channel, ChannelRelay};
    use crate::protocol::records::header;
    use crate::transport::MockTransport;
    use std::time::{Duration, Instant};

    fn test_config() -> Config {
        Config {
            device_port: "mock".to_string(),
            protocol_version: "2.0".to_string(),
            simulation: false,
            sigslots_namespace: "/kobuki".to_string(),
            geometry: Geometry::default(),
        }
    }

    fn frame(payload: &[u8]) -> Vec<u8> {
        let len = payload.len() as u8;
        let cks = payload.iter().fold(len, |acc, &b| acc ^ b);
        let mut out = vec![0xAA, 0x55, len];
        out.extend_from_slice(payload);
        out.push(cks);
        out
    }

    fn core_sub_record(time_stamp: u16, left: u16, right: u16) -> Vec<u8> {
        let mut data = vec![header::DEFAULT, CoreSensorData::SUBLEN];
        data.extend_from_slice(&time_stamp.to_le_bytes());
        data.extend_from_slice(&[0, 0, 0]);
        data.extend_from_slice(&left.to_le_bytes());
        data.extend_from_slice(&right.to_le_bytes());
        data.extend_from_slice(&[0, 0, 0, 0, 0xA0, 0]);
        data
    }

    fn wait_until<F: Fn() -> bool>(cond: F) {
        let deadline = Instant::now() + Duration::from_secs(2);
        while !cond() {
            assert!(Instant::now() < deadline, "timed out waiting for condition");
            std::thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn test_frame_with_two_sub_records_end_to_end() {
        let mock = MockTransport::new();
        let mut driver =
            KobukiDriver::with_transport(test_config(), Box::new(mock.clone())).unwrap();
        let (relay, events) = ChannelRelay::new(64);
        driver.add_observer(Arc::new(relay));

        let mut payload = core_sub_record(100, 10, 20);
        payload.extend_from_slice(&[header::DOCK_IR, DockIrData::SUBLEN, 1, 2, 3]);
        payload.push(0x00);
        mock.inject_read(&frame(&payload));

        driver.start().unwrap();
        driver.enable();
        wait_until(|| driver.dock_ir_data().is_some());

        // observer order: sensor_data, joint_state, then dock_ir
        let mut got = Vec::new();
        while got.len() < 3 {
            got.push(events.recv_timeout(Duration::from_secs(2)).unwrap());
        }
        assert_eq!(
            got,
            vec![Channel::SensorData, Channel::JointState, Channel::DockIr]
        );

        let core = driver.sensor_data().unwrap();
        assert_eq!(core.left_encoder, 10);
        assert_eq!(
            driver.dock_ir_data().unwrap(),
            DockIrData {
                right: 1,
                centre: 2,
                left: 3
            }
        );
        let js = driver.joint_state(Wheel::Left);
        assert_eq!(js.name, "wheel_left");
        assert!(js.enabled);

        // one command frame per successful inbound frame
        wait_until(|| !mock.written().is_empty());
        let written = mock.written();
        assert_eq!(&written[..4], &[0xAA, 0x55, 0x05, 0x01]);

        driver.stop().unwrap();
    }

    #[test]
    fn test_motion_command_reflects_set_motion() {
        let mock = MockTransport::new();
        let mut driver =
            KobukiDriver::with_transport(test_config(), Box::new(mock.clone())).unwrap();

        driver.set_motion(0.0, 0.5);
        assert_eq!(driver.motion_command(), (75, 1));

        let mut payload = core_sub_record(50, 0, 0);
        payload.push(0x00);
        mock.inject_read(&frame(&payload));

        driver.start().unwrap();
        wait_until(|| !mock.written().is_empty());
        driver.stop().unwrap();

        let written = mock.written();
        let expected = Command::BaseControl {
            speed: 75,
            radius: 1,
        }
        .to_frame()
        .unwrap();
        assert_eq!(&written[..9], expected.as_slice());
    }

    #[test]
    fn test_stop_sends_zero_motion_and_disconnects() {
        let mock = MockTransport::new();
        let mut driver =
            KobukiDriver::with_transport(test_config(), Box::new(mock.clone())).unwrap();
        driver.set_motion(0.3, 0.0);
        driver.start().unwrap();
        driver.stop().unwrap();

        let written = mock.written();
        let zero = Command::BaseControl {
            speed: 0,
            radius: 0,
        }
        .to_frame()
        .unwrap();
        assert!(written.ends_with(&zero));
        assert!(!driver.is_running());
        assert!(!driver.is_connected());

        // idempotent
        driver.stop().unwrap();
    }

    #[test]
    fn test_send_command_base_control_updates_pair() {
        let mock = MockTransport::new();
        let driver = KobukiDriver::with_transport(test_config(), Box::new(mock.clone())).unwrap();

        driver
            .send_command(Command::BaseControl {
                speed: 120,
                radius: -40,
            })
            .unwrap();
        assert_eq!(driver.motion_command(), (120, -40));
        assert_eq!(
            mock.written(),
            Command::BaseControl {
                speed: 120,
                radius: -40
            }
            .to_frame()
            .unwrap()
        );
    }

    #[test]
    fn test_simulation_discards_commands() {
        let mut config = test_config();
        config.simulation = true;
        config.device_port.clear();
        let mut driver = KobukiDriver::new(config).unwrap();

        assert!(!driver.is_connected());
        driver.send_command(Command::Sound { note: 1, duration: 1 }).unwrap();
        driver.start().unwrap();
        std::thread::sleep(Duration::from_millis(120));
        assert!(driver.is_running());
        driver.stop().unwrap();

        let js = driver.joint_state(Wheel::Right);
        assert!(!js.enabled);
        assert_eq!(js.position, 0.0);
    }

    #[test]
    fn test_corrupt_frame_then_valid_frame_recovers() {
        let mock = MockTransport::new();
        let mut driver =
            KobukiDriver::with_transport(test_config(), Box::new(mock.clone())).unwrap();

        let mut bad = frame(&{
            let mut p = core_sub_record(10, 1, 1);
            p.push(0x00);
            p
        });
        let last = bad.len() - 1;
        bad[last] ^= 0xFF;
        mock.inject_read(&bad);

        let mut good_payload = core_sub_record(20, 7, 7);
        good_payload.push(0x00);
        mock.inject_read(&frame(&good_payload));

        driver.start().unwrap();
        wait_until(|| driver.sensor_data().is_some());
        assert_eq!(driver.sensor_data().unwrap().left_encoder, 7);
        driver.stop().unwrap();
    }
}
