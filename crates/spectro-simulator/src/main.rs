//! Desktop simulator for the spectro-node wake cycle.
//!
//! Runs the spectro-core scheduler against simulated peripherals and an
//! in-process broker, so acquisition, buffering, reporting and the batch flag
//! protocol can be exercised without hardware. Waits are scaled down by
//! `SIM_TIME_SCALE`; see [`settings`] for all knobs.

mod network;
mod peripherals;
mod settings;

use log::{error, info};

use spectro_core::board::{Board, Platform};
use spectro_core::scheduler::WakeScheduler;
use spectro_core::storage::DEFAULT_STORE_CAPACITY;

use network::{LoopbackBroker, SimWifi};
use peripherals::{
    SimClock, SimDelay, SimLight, SimSensor, SimSystem, SimTrigger, SimWake, TimeScale,
};
use settings::SimSettings;

/// PWM resolution of the simulated LED driver (10 bit)
const LED_MAX_DUTY: u16 = 1023;

/// Status polls the simulated station needs to associate
const ASSOCIATION_POLLS: u32 = 2;

struct SimPlatform;

impl Platform for SimPlatform {
    type Sensor = SimSensor;
    type Clock = SimClock;
    type Light = SimLight;
    type Trigger = SimTrigger;
    type Delay = SimDelay;
    type Link = SimWifi;
    type Session = LoopbackBroker;
    type System = SimSystem;
    type Wake = SimWake;
}

fn main() {
    if let Ok(path) = dotenvy::dotenv() {
        eprintln!("Loaded environment from {}", path.display());
    }
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    info!("Starting spectro-node simulator");

    let config = match settings::load_config() {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            std::process::exit(2);
        }
    };
    let sim = SimSettings::from_env();
    let scale = TimeScale(sim.time_scale);

    let light = SimLight::new(config.acquisition.led_polarity, LED_MAX_DUTY);
    let sensor = SimSensor::new(light.shown(), sim.sensor_fail_every);
    // Scheduler check plus one check per batch, then released
    let hold_reads = config.acquisition.batch_size + 1;
    let wake = SimWake::new(scale, sim.trigger_every, hold_reads);
    let trigger = SimTrigger::new(wake.trigger_line());

    let board = Board::<SimPlatform> {
        sensor,
        clock: SimClock,
        light,
        trigger,
        delay: SimDelay { scale },
        system: SimSystem::new(),
        wake,
    };
    let link = SimWifi::new(!sim.wifi_down, ASSOCIATION_POLLS);
    let broker = LoopbackBroker::new(config.broker.batch_topic, !sim.broker_down);

    let mut node = WakeScheduler::<SimPlatform, DEFAULT_STORE_CAPACITY>::new(
        config, board, link, broker,
    );
    node.boot_or_restart();

    for _ in 0..sim.cycles {
        let cause = node.sleep();
        let report = node.run_cycle();
        info!(
            "Wake {:?}: collected {:?}, batch {:?}, session {}, {} batch(es) pending",
            cause,
            report.collected.map(|c| c.batches),
            report.batch,
            report.session_open,
            report.pending_groups
        );
    }

    let ctx = node.context();
    let stored = ctx.store.len();
    let overwrites = ctx.store.overwrites();
    let cycles = ctx.cycles;
    let broker = node.connectivity().session_mut();
    info!(
        "Simulation finished after {} cycle(s): {} sample(s) in store, {} overwrite(s), {} message(s) published, {} session(s) reassembled",
        cycles, stored, overwrites, broker.messages, broker.sessions_closed
    );
}
