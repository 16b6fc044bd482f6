//! # Perloc Equipment Communications Module
//!
//! Field pose estimates produced by the perception and localisation (perloc) equipment.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// A planar pose in the Field (FD) frame.
///
/// Heading is measured counter-clockwise from the positive FD_X axis.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct FieldPose {
    /// Units: meters
    pub x_m: f64,

    /// Units: meters
    pub y_m: f64,

    /// Units: radians
    #[serde(default)]
    pub heading_rad: f64,
}

/// An estimate of the robot's pose, as reported by the localisation equipment.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct PoseEstimate {
    /// If false the estimator has no pose and the remaining fields are meaningless.
    pub has_pose: bool,

    /// Time since the estimate was last updated.
    ///
    /// Units: seconds
    pub age_s: f64,

    /// Estimator specific confidence, higher is better.
    pub quality: f64,

    /// Pose of the robot origin in the field.
    pub pose: FieldPose,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl FieldPose {
    pub fn new(x_m: f64, y_m: f64, heading_rad: f64) -> Self {
        Self {
            x_m,
            y_m,
            heading_rad,
        }
    }

    /// True if this is exactly the identity pose.
    pub fn is_origin(&self) -> bool {
        self.x_m == 0.0 && self.y_m == 0.0 && self.heading_rad == 0.0
    }
}

impl PoseEstimate {
    /// An estimate with no pose.
    pub fn none() -> Self {
        Self::default()
    }
}
