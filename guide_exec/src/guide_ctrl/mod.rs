//! # Guidance control module
//!
//! Guidance control drives the robot so that a chosen point on it (the translation frame) reaches
//! a target point, and another chosen point (the aim frame) faces a target point or heading. It is
//! an overlay: each cycle it produces a velocity command together with a mask saying which axes
//! it wants to override, and the caller keeps its own command for the rest.
//!
//! Two feedback channels may be configured:
//!
//! - The observation channel, which sees a landmark (anchor) relative to the robot body.
//! - The field pose channel, which gives the absolute pose of the robot in the field.
//!
//! Each channel has its own solver which produces a candidate command. When both are configured
//! the overlay runs in adaptive mode, where an arbiter picks between the candidates for each
//! degree of freedom using a range hysteresis band, and blends between them over a fixed
//! duration when the choice changes, so that the command does not jump on handoff.
//!
//! Axes that were requested but that neither channel can drive this cycle are handled by the
//! loss policy, either left to the caller (pass through) or held at zero.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

pub mod arbiter;
pub mod cmd;
pub mod controllers;
pub mod feedback;
pub mod params;
pub mod plan;
pub mod solver;
pub mod state;
pub mod target;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// Internal
pub use cmd::*;
pub use feedback::*;
pub use params::*;
pub use plan::*;
pub use state::*;
pub use target::*;
