//! Worker loop: drains the serial port, runs the codec and pulses
//! observers.
//!
//! Per tick:
//! 1. read up to `bytes_needed_hint()` bytes (4 s timeout inside the
//!    transport; a zero-byte read is the no-data warning)
//! 2. feed the packet finder, dispatch every completed payload
//! 3. update odometry from a fresh core record before signalling
//! 4. pulse observers per seen header id ascending, `joint_state` directly
//!    after `sensor_data`
//! 5. send the current `(speed, radius)` once per completed frame

use super::SharedState;
use crate::error::Error;
use crate::observer::{Channel, LogChannel, Observer};
use crate::odometry::Odometry;
use crate::protocol::frame::{FrameDispatcher, RecordPool};
use crate::protocol::records::header;
use crate::protocol::PacketFinder;
use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

/// Tick period in simulation mode, matching the ≈20 Hz device stream.
const SIMULATION_TICK: Duration = Duration::from_millis(50);

/// Back-off after a failed read so a dead port cannot spin the loop.
const READ_ERROR_BACKOFF: Duration = Duration::from_millis(10);

/// Pacing for transports that return `Ok(0)` immediately instead of
/// blocking out their timeout.
const NO_DATA_BACKOFF: Duration = Duration::from_millis(1);

pub(super) fn worker_loop(
    shared: Arc<SharedState>,
    observers: Arc<[Arc<dyn Observer>]>,
    protocol_version: &str,
    simulation: bool,
) {
    let mut finder = PacketFinder::new();
    let mut dispatcher = FrameDispatcher::new(protocol_version);
    let mut buf = [0u8; 256];

    while shared.is_running.load(Ordering::Relaxed) {
        if simulation {
            // no serial I/O, no signals; commands are discarded upstream
            thread::sleep(SIMULATION_TICK);
            continue;
        }

        let want = finder.bytes_needed_hint().min(buf.len());
        let n = {
            let Ok(mut guard) = shared.port.lock() else {
                log::error!("Worker: port mutex poisoned, exiting");
                break;
            };
            let Some(port) = guard.as_mut() else {
                break; // port closed under us, stop() is in progress
            };
            match port.read(&mut buf[..want]) {
                Ok(n) => n,
                Err(e) => {
                    log::error!("Serial read failed: {}", e);
                    emit_log(&observers, LogChannel::Error, &format!("serial read failed: {}", e));
                    drop(guard);
                    thread::sleep(READ_ERROR_BACKOFF);
                    continue;
                }
            }
        };

        if n == 0 {
            log::warn!("{}", Error::NoData);
            emit_log(&observers, LogChannel::Warn, "no serial data in");
            thread::sleep(NO_DATA_BACKOFF);
            continue;
        }
        log::trace!("serial_read({})", n);

        if !finder.feed(&buf[..n]) {
            continue;
        }

        while let Some(payload) = finder.take() {
            if let Err(e) = dispatch_payload(&shared, &mut dispatcher, &payload) {
                emit_log(&observers, LogChannel::Warn, &format!("{}", e));
                continue;
            }

            notify_frame(&dispatcher, &observers);

            // one outbound command per successful inbound frame
            if let Err(e) = shared.send_base_control() {
                log::error!("Motion command send failed: {}", e);
                emit_log(
                    &observers,
                    LogChannel::Error,
                    &format!("motion command send failed: {}", e),
                );
            }
        }
    }

    log::info!("Worker thread exiting");
}

/// Dispatch one payload into the pool and fold the fresh core record into
/// odometry so accessors observe post-update values when signalled.
fn dispatch_payload(
    shared: &SharedState,
    dispatcher: &mut FrameDispatcher,
    payload: &[u8],
) -> crate::error::Result<()> {
    let core = {
        let mut pool = lock_pool(&shared.pool);
        dispatcher.dispatch(payload, &mut pool)?;
        pool.core
    };

    if dispatcher.seen_ids().any(|id| id == header::DEFAULT) {
        if let Some(core) = core {
            lock_odometry(&shared.odometry).update(&core);
        }
    }
    Ok(())
}

fn notify_frame(dispatcher: &FrameDispatcher, observers: &Arc<[Arc<dyn Observer>]>) {
    for id in dispatcher.seen_ids() {
        let Some(channel) = Channel::for_header(id) else {
            continue;
        };
        for observer in observers.iter() {
            observer.notify(channel);
        }
        if id == header::DEFAULT {
            for observer in observers.iter() {
                observer.notify(Channel::JointState);
            }
        }
    }
}

fn emit_log(observers: &Arc<[Arc<dyn Observer>]>, channel: LogChannel, message: &str) {
    for observer in observers.iter() {
        observer.log(channel, message);
    }
}

fn lock_pool(pool: &Mutex<RecordPool>) -> std::sync::MutexGuard<'_, RecordPool> {
    pool.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn lock_odometry(odometry: &Mutex<Odometry>) -> std::sync::MutexGuard<'_, Odometry> {
    odometry
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}
