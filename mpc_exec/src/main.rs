//! Receding horizon tracking executable entry point.
//!
//! # Architecture
//!
//! The executable:
//!
//!     - Loads parameters and initialises the session and logging
//!     - Loads the reference trajectory from the waypoint file
//!     - Runs the closed loop from the first waypoint until the end of the
//!       reference
//!     - Writes the realised states and controls, even if the run halted,
//!       and archives every sample and solve report to the session
//!
//! Any failure is reported and the process exits with a nonzero status.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use color_eyre::{Report, eyre::{eyre, WrapErr}};
use log::{info, warn};
use serde::{Serialize, de::DeserializeOwned};
use std::path::PathBuf;
use std::sync::Arc;
use structopt::StructOpt;

// Internal
use mpc_lib::{
    driver::{Driver, Sample},
    ocp, output,
    params::MpcExecParams,
    reference::{BoundsValidityChecker, ParseMode, ReferenceTrajectory},
    rti::{self, RtiSolver},
    sim::{self, Simulator},
    vehicle::{self, VehicleModel}
};
use util::{
    archive::Archiver,
    logger::{logger_init, LevelFilter},
    params::{self, LoadError},
    session::Session
};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Command line options.
#[derive(Debug, StructOpt)]
#[structopt(name = "mpc_exec", about = "Closed loop receding horizon path tracking")]
struct Opt {
    /// Reference waypoint file, one `x y theta` per line
    #[structopt(parse(from_os_str))]
    reference: PathBuf,

    /// Output file for the realised states
    #[structopt(long, parse(from_os_str), default_value = "output_states.txt")]
    states_out: PathBuf,

    /// Output file for the applied controls
    #[structopt(long, parse(from_os_str), default_value = "output_controls.txt")]
    controls_out: PathBuf,

    /// Directory to load parameter files from, instead of `<root>/params`
    #[structopt(long, parse(from_os_str))]
    params_dir: Option<PathBuf>,

    /// Reject malformed reference lines
    #[structopt(long)]
    strict: bool,

    /// Override the number of shooting intervals in the horizon
    #[structopt(long)]
    horizon: Option<usize>
}

/// Flat record of a sample for archiving.
#[derive(Serialize)]
struct SampleRecord {
    time_s: f64,
    x_m: f64,
    y_m: f64,
    heading_rad: f64,
    speed_ms: f64,
    steer_rad: f64
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Executable main function, entry point.
fn main() -> Result<(), Report> {
    color_eyre::install()?;

    let opt = Opt::from_args();

    // ---- EARLY INITIALISATION ----

    let exec_params: MpcExecParams = load_params(&opt, "exec.toml")
        .wrap_err("Could not load exec params")?;

    // Initialise session
    let session = Session::new("mpc_exec", &exec_params.sessions_dir)
        .wrap_err("Failed to create the session")?;

    // Initialise logger
    let min_level: LevelFilter = exec_params.log_level.parse()
        .map_err(|e| eyre!("Invalid log level {:?}: {}", exec_params.log_level, e))?;
    logger_init(min_level, Some(&session))
        .wrap_err("Failed to initialise logging")?;

    info!("Receding Horizon Tracking Executable\n");
    info!("Session directory: {:?}\n", session.session_root);

    // ---- LOAD PARAMETERS ----

    let vehicle_params: vehicle::Params = load_params(&opt, "vehicle.toml")
        .wrap_err("Could not load vehicle params")?;
    let mut ocp_params: ocp::Params = load_params(&opt, "ocp.toml")
        .wrap_err("Could not load OCP params")?;
    let rti_params: rti::Params = load_params(&opt, "rti.toml")
        .wrap_err("Could not load solver params")?;
    let sim_params: sim::Params = load_params(&opt, "sim.toml")
        .wrap_err("Could not load simulator params")?;

    if let Some(n) = opt.horizon {
        ocp_params.horizon_intervals = n;
    }

    info!("Parameters loaded, horizon of {} intervals", ocp_params.horizon_intervals);

    // ---- LOAD REFERENCE ----

    let parse_mode = if opt.strict || exec_params.strict_parsing {
        ParseMode::Strict
    }
    else {
        ParseMode::Tolerant
    };

    let reference = Arc::new(
        ReferenceTrajectory::from_file(&opt.reference, exec_params.total_time_s, parse_mode)
            .wrap_err("Failed to load the reference trajectory")?
    );

    // The reference is produced by a planner, audit it against the workspace
    let checker = BoundsValidityChecker::from_vehicle_params(&vehicle_params);
    let invalid = reference.invalid_waypoints(&checker);
    if !invalid.is_empty() {
        warn!(
            "{} reference waypoints lie outside the workspace: {:?}",
            invalid.len(), invalid
        );
    }

    // ---- INITIALISE MODULES ----

    let model = VehicleModel::new(vehicle_params)
        .wrap_err("Invalid vehicle model")?;
    let solver = RtiSolver::new(model.clone(), ocp_params, rti_params, reference.clone())
        .wrap_err("Failed to initialise the solver")?;
    let simulator = Simulator::new(&model, sim_params)
        .wrap_err("Failed to initialise the simulator")?;

    let mut driver = Driver::new(solver, simulator, reference.total_duration());

    // ---- RUN ----

    let run_result = match driver.init(reference.value_at(0.0)) {
        Ok(()) => driver.run().map(|summary| {
            info!("Run summary: {:#?}", summary);
        }),
        Err(e) => Err(e)
    };

    info!("Simulator statistics: {:?}", driver.process().stats());

    // ---- OUTPUT ----

    // Whatever was recorded is written, even if the run halted
    output::write_states(&opt.states_out, driver.samples())
        .wrap_err("Failed to write the states file")?;
    output::write_controls(&opt.controls_out, driver.samples())
        .wrap_err("Failed to write the controls file")?;

    archive_run(&session, driver.samples(), driver.reports())
        .wrap_err("Failed to archive the run")?;

    run_result.wrap_err("The closed loop run failed")?;

    info!("End of execution");

    Ok(())
}

/// Load a parameter file from the directory given on the command line, or the
/// default parameter directory.
fn load_params<P: DeserializeOwned>(opt: &Opt, file: &str) -> Result<P, LoadError> {
    match opt.params_dir {
        Some(ref dir) => params::load_from(dir, file),
        None => params::load(file)
    }
}

/// Archive the samples and solve reports into the session.
fn archive_run(
    session: &Session, samples: &[Sample], reports: &[rti::SolveReport]
) -> Result<(), Report> {
    let mut sample_arch = Archiver::from_session(session, "samples.csv")?;
    sample_arch.serialise_all(samples.iter().map(|s| SampleRecord {
        time_s: s.time_s,
        x_m: s.state[0],
        y_m: s.state[1],
        heading_rad: s.state[2],
        speed_ms: s.control[0],
        steer_rad: s.control[1]
    }))?;

    let mut report_arch = Archiver::from_session(session, "solve_reports.csv")?;
    report_arch.serialise_all(reports.iter())?;

    info!(
        "Archived {} samples and {} solve reports",
        sample_arch.num_records(), report_arch.num_records()
    );

    Ok(())
}
