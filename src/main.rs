//! kobuki-iod - daemon wrapping the base driver
//!
//! Loads the TOML configuration, starts the driver with a log relay
//! observer and runs until SIGINT.

use kobuki_io::observer::LogRelay;
use kobuki_io::{Config, KobukiDriver, Result, Wheel};
use std::env;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config_path = env::args()
        .nth(1)
        .unwrap_or_else(|| "/etc/kobuki-io.toml".to_string());
    log::info!("Using config: {}", config_path);

    let config = Config::load(&config_path)?;
    let namespace = config.sigslots_namespace.clone();

    let mut driver = KobukiDriver::new(config)?;
    driver.add_observer(Arc::new(LogRelay::new(&namespace)));
    driver.start()?;
    driver.enable();

    let running = Arc::new(AtomicBool::new(true));
    let r = Arc::clone(&running);
    ctrlc::set_handler(move || {
        log::info!("Received shutdown signal");
        r.store(false, Ordering::Relaxed);
    })
    .map_err(|e| kobuki_io::Error::Config(format!("Error setting Ctrl-C handler: {}", e)))?;

    log::info!("kobuki-iod running. Press Ctrl-C to stop.");
    while running.load(Ordering::Relaxed) {
        std::thread::sleep(Duration::from_secs(1));
        let js = driver.joint_state(Wheel::Left);
        log::debug!(
            "wheel_left position={:.4} rad velocity={:.4} rad/s enabled={}",
            js.position,
            js.velocity,
            js.enabled
        );
    }

    driver.stop()?;
    log::info!("kobuki-iod stopped");
    Ok(())
}
