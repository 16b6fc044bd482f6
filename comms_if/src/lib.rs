//! # Communications interface crate.
//!
//! Provides the data structures exchanged between the guidance core and the equipment it reads
//! from (the landmark camera pipeline and the localisation estimator).

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Sample definitions for equipment (cameras, localisation)
pub mod eqpt;
