//! Utility library for the guidance software

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

pub mod convert;
pub mod host;
#[macro_use]
pub mod logger;
pub mod maths;
pub mod params;
pub mod session;
pub mod time;

// ---------------------------------------------------------------------------
// REEXPORTS
// ---------------------------------------------------------------------------

pub use comms_if;
