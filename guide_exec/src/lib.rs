//! # Guidance library.
//!
//! This library allows other crates in the workspace to access items defined inside the guidance
//! crate.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Guidance control module - aligns the robot to a target using landmark observations and/or the
/// field pose estimate
pub mod guide_ctrl;

/// Simulation module - provides a kinematic robot with simulated camera and localisation
#[cfg(feature = "sim")]
pub mod sim;
