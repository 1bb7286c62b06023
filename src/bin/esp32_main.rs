//! ESP32-C3 SuperMini radiator valve controller.
//!
//! This is the main entry point for the physical valve actuator. It runs:
//! - A periodic timer service callback that samples the photo-eye and
//!   advances the motor timeouts
//! - A 20ms task loop that runs the deferred pulse and stop handlers
//! - A 1s control tick that drives calibration and moves the valve to its
//!   target once calibrated
//!
//! # Build
//!
//! ```bash
//! cargo build --release --bin esp32_main --features esp32
//!
//! # Different target position
//! VALVE_TARGET_PERCENT=30 cargo build --release --bin esp32_main --features esp32
//! ```

use esp_idf_hal::peripherals::Peripherals;
use esp_idf_svc::log::EspLogger;
use esp_idf_svc::nvs::EspDefaultNvsPartition;
use esp_idf_svc::timer::EspTaskTimerService;
use rs_valve::hal::esp32::{Esp32Valve, NvsConfigStore};
use rs_valve::{CalibrationRequest, ConfigStore, ValveController, POSITION_UNKNOWN};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;
use tracing::{error, info, warn};

/// Timer tick period. Per-pulse timeouts are counted in these ticks.
const TICK_PERIOD: Duration = Duration::from_micros(512);

/// Task loop interval in milliseconds
const LOOP_INTERVAL_MS: u64 = 20;

/// Task loop iterations per control tick (1s)
const CONTROL_EVERY: u32 = 50;

/// Default target when `VALVE_TARGET_PERCENT` is not set at build time
const DEFAULT_TARGET_PERCENT: u8 = 50;

fn target_percent() -> u8 {
    option_env!("VALVE_TARGET_PERCENT")
        .and_then(|s| s.parse::<u8>().ok())
        .filter(|p| *p <= 100)
        .unwrap_or(DEFAULT_TARGET_PERCENT)
}

fn main() -> anyhow::Result<()> {
    // Initialize ESP-IDF
    esp_idf_hal::sys::link_patches();
    EspLogger::initialize_default();

    info!("rs-valve controller starting");

    // =========================================================================
    // Configuration (NVS)
    // =========================================================================
    let nvs = EspDefaultNvsPartition::take()?;
    let store = NvsConfigStore::load(nvs)?;
    info!(config = ?store.config(), "configuration loaded");

    // =========================================================================
    // Initialize Valve Hardware (bridge on GPIO2/3, eye on GPIO4/5)
    // =========================================================================
    let peripherals = Peripherals::take()?;
    let hw = Esp32Valve::new(
        peripherals.pins.gpio2,
        peripherals.pins.gpio3,
        peripherals.ledc.timer0,
        peripherals.ledc.channel0,
        peripherals.ledc.channel1,
        peripherals.pins.gpio4,
        peripherals.pins.gpio5,
    )?;
    info!("valve hardware initialized");

    let controller = Arc::new(Mutex::new(ValveController::new(hw, store)));

    // =========================================================================
    // Periodic tick: eye sampling and motor timeouts
    // =========================================================================
    let timer_service = EspTaskTimerService::new()?;
    let tick_controller = controller.clone();
    let tick_timer = timer_service.timer(move || {
        let Ok(mut c) = tick_controller.lock() else {
            return;
        };
        if !c.hardware().tick_enabled() {
            return;
        }
        if c.hardware().eye_enabled() {
            let level = c.hardware().eye_level();
            c.on_eye_sample(level);
        }
        if let Err(e) = c.on_timer_tick() {
            error!(error = %e, "timer tick failed");
        }
    })?;
    tick_timer.every(TICK_PERIOD)?;

    // =========================================================================
    // Main Loop
    // =========================================================================
    let target = target_percent();
    let mut last_percent = 0u8;
    let mut moved_to_target = false;
    let mut loop_count: u32 = 0;

    info!(target, "entering main loop");

    loop {
        {
            let mut c = controller
                .lock()
                .map_err(|_| anyhow::anyhow!("valve controller lock poisoned"))?;

            if let Err(e) = c.run_pending() {
                warn!(error = %e, "task handler failed");
            }

            if loop_count % CONTROL_EVERY == 0 {
                if c.is_calibrated() {
                    let percent = c.position_percent();
                    if percent != POSITION_UNKNOWN {
                        last_percent = percent;
                    }
                    if !moved_to_target {
                        c.goto(target)?;
                        moved_to_target = true;
                    }
                } else {
                    moved_to_target = false;
                    c.update_calibration(CalibrationRequest::Tick, last_percent)?;
                }

                let state = c.state();
                info!(
                    position = state.position,
                    max_position = state.max_position,
                    percent = ?state.percent,
                    calibration = state.calibration.as_i8(),
                    errors = state.errors.bits(),
                    "valve state"
                );
            }
        }

        loop_count = loop_count.wrapping_add(1);
        thread::sleep(Duration::from_millis(LOOP_INTERVAL_MS));
    }
}
