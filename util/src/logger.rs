//! Logger setup for guidance executables
//!
//! Guidance logs a line per control cycle from a few modules (candidate dumps, status reports,
//! simulated equipment). These have their own level so a run can be logged at `DEBUG` without
//! being flooded by them.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External imports
use log::{self, info};
use fern;
use colored::{ColoredString, Colorize};
use thiserror::Error;

// Internal imports
use crate::session;

// Re-exports
pub use log::LevelFilter;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Targets which log on every control cycle.
pub const PER_CYCLE_TARGETS: [&str; 3] = [
    "guide_lib::guide_ctrl::solver",
    "guide_lib::guide_ctrl::state",
    "guide_lib::sim",
];

/// Crate prefix stripped from targets when they are printed.
const TARGET_PREFIX: &str = "guide_lib::";

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Levels to log at.
#[derive(Debug, Clone, Copy)]
pub struct LogLevels {
    /// Minimum level for everything, must be at least `INFO`.
    pub min: LevelFilter,

    /// Level for the [`PER_CYCLE_TARGETS`], on top of `min`.
    pub per_cycle: LevelFilter,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Errors associated with initialising the logger.
#[derive(Debug, Error)]
pub enum LoggerInitError {
    #[error("Expected a log level of at least `INFO`, found `{0}`")]
    InvalidMinLogLevel(log::LevelFilter),

    #[error("Error initialising the log file: {0}")]
    LogFileInitError(std::io::Error),

    #[error("An error occured while setting up the logger: {0}")]
    FernInitError(log::SetLoggerError)
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Initialise the logger for this execution, printing to stdout and the session's log file.
///
/// # Safety
///
/// - This function must only be called once to prevent corrupting logs.
pub fn logger_init(
    levels: LogLevels,
    session: &session::Session
) -> Result<(), LoggerInitError> {

    if levels.min < log::Level::Info {
        return Err(LoggerInitError::InvalidMinLogLevel(levels.min))
    }

    let log_file = fern::log_file(session.log_file_path.clone())
        .map_err(LoggerInitError::LogFileInitError)?;

    let mut dispatch = fern::Dispatch::new()
        .format(|out, message, record| {
            let time_s = session::get_elapsed_seconds();
            let level = level_to_str(record.level());

            // Only debug and trace messages say where they came from
            if record.level() > log::Level::Info {
                out.finish(format_args!(
                    "[{:10.6} {}] {}: {}",
                    time_s,
                    level,
                    short_target(record.target()).dimmed(),
                    message
                ))
            }
            else {
                out.finish(format_args!("[{:10.6} {}] {}", time_s, level, message))
            }
        })
        .level(levels.min);

    for target in PER_CYCLE_TARGETS.iter() {
        dispatch = dispatch.level_for(*target, per_cycle_level(levels));
    }

    dispatch
        .chain(std::io::stdout())
        .chain(log_file)
        .apply()
        .map_err(LoggerInitError::FernInitError)?;

    info!("Logging initialised");
    if let Some(epoch) = session::get_epoch() {
        info!("    Session epoch: {}", epoch);
    }
    info!("    Log level: {:?} (per cycle {:?})", levels.min, per_cycle_level(levels));
    info!("    Log file path: {:?}", session.log_file_path);

    Ok(())
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

/// The per cycle level actually applied, which is never more verbose than the minimum.
fn per_cycle_level(levels: LogLevels) -> LevelFilter {
    levels.per_cycle.min(levels.min)
}

fn short_target(target: &str) -> &str {
    target.strip_prefix(TARGET_PREFIX).unwrap_or(target)
}

/// Get the string representation of a log level
fn level_to_str(level: log::Level) -> ColoredString {
    match level {
        log::Level::Trace => "TRC".dimmed().italic(),
        log::Level::Debug => "DBG".dimmed(),
        log::Level::Info  => "INF".normal(),
        log::Level::Warn  => "WRN".yellow(),
        log::Level::Error => "ERR".red().bold()
    }
}
