//! # Guidance Simulation
//!
//! This binary runs GuideCtrl closed loop against a kinematic simulation of the robot, its
//! landmark camera and its localisation, so that guidance plans and tuning can be tried out
//! without any equipment. The history of every cycle is saved into the session directory.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use color_eyre::{eyre::WrapErr, Result};
use log::{debug, info};
use structopt::StructOpt;

use guide_lib::{
    guide_ctrl::{AnchorLayoutParams, Params},
    sim::{Sim, SimParams},
};
use util::{
    logger::{logger_init, LevelFilter, LogLevels},
    session::Session,
};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Name of the file the cycle history is saved to within the session.
const HISTORY_FILE_NAME: &str = "guide_sim_history.json";

/// Number of cycles between progress reports.
const REPORT_INTERVAL_CYCLES: usize = 20;

// ------------------------------------------------------------------------------------------------
// CLI
// ------------------------------------------------------------------------------------------------

#[derive(Debug, StructOpt)]
#[structopt(name = "guide_sim", about = "Run guidance control against a kinematic simulation")]
struct Args {
    /// Guidance parameter file, relative to the params directory
    #[structopt(long, default_value = "guide_ctrl.toml")]
    guide_params: String,

    /// Simulation parameter file, relative to the params directory
    #[structopt(long, default_value = "guide_sim.toml")]
    sim_params: String,

    /// Anchor layout file, relative to the params directory
    #[structopt(long, default_value = "anchor_layout.toml")]
    layout: String,

    /// Minimum level of messages to log
    #[structopt(long, default_value = "debug")]
    log_level: LevelFilter,

    /// Level for messages logged on every cycle, capped by `--log-level`
    #[structopt(long, default_value = "debug")]
    cycle_log_level: LevelFilter,
}

// ------------------------------------------------------------------------------------------------
// MAIN
// ------------------------------------------------------------------------------------------------

fn main() -> Result<()> {
    color_eyre::install()?;

    let args = Args::from_args();

    // ---- EARLY INITIALISATION ----

    // Initialise session
    let session = Session::new("guide_sim", "sessions").wrap_err("Failed to create the session")?;

    // Initialise logger
    let levels = LogLevels {
        min: args.log_level,
        per_cycle: args.cycle_log_level,
    };
    logger_init(levels, &session).wrap_err("Failed to initialise logging")?;

    // Log information on this execution.
    info!("Guidance Simulation\n");
    info!("Session directory: {:?}\n", session.session_root);
    debug!("CLI arguments: {:?}", args);

    // ---- LOAD PARAMETERS ----

    let guide_params: Params = util::params::load(&args.guide_params)
        .wrap_err("Could not load guidance params")?;
    let sim_params: SimParams = util::params::load(&args.sim_params)
        .wrap_err("Could not load simulation params")?;
    let layout: AnchorLayoutParams = util::params::load(&args.layout)
        .wrap_err("Could not load the anchor layout")?;

    info!(
        "Loaded {} anchors, simulating {:.02} s at {:.03} s per cycle",
        layout.anchors.len(),
        sim_params.duration_s,
        sim_params.cycle_period_s
    );

    // ---- INITIALISE SIMULATION ----

    let mut sim = Sim::new(sim_params, guide_params, layout.into_layout())
        .wrap_err("Failed to initialise the simulation")?;
    info!("GuideCtrl initialised in {} mode\n", sim.ctrl.mode());

    // ---- MAIN LOOP ----

    info!("Begining simulation\n");

    let records = sim.run();

    for (i, record) in records.iter().enumerate() {
        if i % REPORT_INTERVAL_CYCLES == 0 {
            info!(
                "[{:8.3} s] pose ({:.3}, {:.3}, {:.3}) {}",
                record.time_s,
                record.pose.x_m,
                record.pose.y_m,
                record.pose.heading_rad,
                record.report
            );
        }
    }

    // ---- RESULTS ----

    let final_pose = sim.world.borrow().robot_pose();
    info!(
        "Simulation complete after {} cycles, final pose ({:.3}, {:.3}, {:.3})",
        records.len(),
        final_pose.x_m,
        final_pose.y_m,
        final_pose.heading_rad
    );

    session
        .save_json(HISTORY_FILE_NAME, &records)
        .wrap_err("Failed to save the simulation history")?;
    info!("History saved to {:?}", session.session_root.join(HISTORY_FILE_NAME));

    Ok(())
}
