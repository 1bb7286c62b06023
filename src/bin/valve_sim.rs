//! Desktop valve simulator.
//!
//! Runs the controller against a simulated actuator: calibrates it, then
//! walks the valve through a list of target positions and prints the
//! resulting state after every move.
//!
//! # Usage
//!
//! ```sh
//! cargo run --bin valve_sim --features sim
//!
//! # 420 pulse valve, auto calibration, custom targets
//! cargo run --bin valve_sim --features sim -- --travel 420 --mode auto 0 35 70 100
//!
//! # Per-pulse logging
//! RUST_LOG=rs_valve=trace cargo run --bin valve_sim --features sim
//! ```

use anyhow::{bail, Context};
use rs_valve::hal::{MockConfigStore, MockValve, ValveMechanics};
use rs_valve::{CalibrationRequest, CalibrationStep, ManualCalibration, ValveConfig, ValveController};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Simulated ticks allowed for one move or calibration.
const MAX_TICKS: u32 = 2_000_000;

/// Calibration requests before giving up.
const MAX_REQUESTS: u32 = 100;

struct SimArgs {
    travel: i16,
    manual: ManualCalibration,
    start_percent: u8,
    targets: Vec<u8>,
}

fn parse_args() -> anyhow::Result<SimArgs> {
    let mut args = SimArgs {
        travel: 350,
        manual: ManualCalibration::Unset,
        start_percent: 0,
        targets: Vec::new(),
    };

    let mut iter = std::env::args().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--travel" => {
                let value = iter.next().context("--travel needs a value")?;
                args.travel = value.parse().context("invalid --travel")?;
            }
            "--start" => {
                let value = iter.next().context("--start needs a value")?;
                args.start_percent = value.parse().context("invalid --start")?;
            }
            "--mode" => {
                let value = iter.next().context("--mode needs a value")?;
                args.manual = match value.as_str() {
                    "unset" => ManualCalibration::Unset,
                    "auto" => ManualCalibration::Auto,
                    fixed => ManualCalibration::Fixed(
                        fixed
                            .parse()
                            .context("--mode must be unset, auto or a pulse count")?,
                    ),
                };
            }
            target => {
                let percent: u8 = target
                    .parse()
                    .with_context(|| format!("invalid target '{target}'"))?;
                if percent > 100 {
                    bail!("target {percent}% out of range");
                }
                args.targets.push(percent);
            }
        }
    }

    if args.targets.is_empty() {
        args.targets = vec![50, 100, 25, 0];
    }
    Ok(args)
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = parse_args()?;

    println!("=================================");
    println!("  rs-valve Simulator");
    println!("=================================");
    println!();

    let config = ValveConfig::default().with_manual_calibration(args.manual);
    let mut controller = ValveController::new(MockValve::new(), MockConfigStore::new(config));

    let start = i32::from(args.travel) * i32::from(args.start_percent.min(100)) / 100;
    let mut valve = ValveMechanics::new(args.travel).with_pulse_position(start as i16);

    info!(
        travel = args.travel,
        manual = ?args.manual,
        start = valve.pulse_position(),
        "simulated valve"
    );

    // =========================================================================
    // Calibration
    // =========================================================================
    let mut requests = 0;
    while !controller.calibration_step().is_running() {
        if requests == MAX_REQUESTS {
            bail!("calibration did not start");
        }
        controller.update_calibration(CalibrationRequest::Tick, args.start_percent)?;
        requests += 1;
    }
    let ticks = valve.run_until_idle(&mut controller, MAX_TICKS)?;

    match controller.calibration_step() {
        CalibrationStep::Done => println!(
            "Calibrated in {ticks} ticks: travel {} pulses (errors: {:#04x})",
            controller.max_position(),
            controller.errors().bits()
        ),
        step => bail!("calibration ended in step {}", step.as_i8()),
    }
    if let Some(stored) = controller.config().manual_calibration.fixed() {
        println!("Stored travel: {stored} pulses");
    }

    // =========================================================================
    // Moves
    // =========================================================================
    for target in args.targets {
        controller.goto(target)?;
        let ticks = valve.run_until_idle(&mut controller, MAX_TICKS)?;
        let state = controller.state();
        println!(
            "goto {target:>3}% -> {:>3}% (count {:>4}, spindle {:>4}, {ticks} ticks, mean interval {:?})",
            state.percent.unwrap_or(0),
            state.position,
            valve.pulse_position(),
            state.mean_interval,
        );
    }

    Ok(())
}
