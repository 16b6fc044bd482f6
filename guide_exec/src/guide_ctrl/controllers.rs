//! # Guidance controllers module
//!
//! Stateless proportional control laws converting translation and bearing errors into velocity
//! demands.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use util::maths::clamp;

use super::params::Tuning;

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Get the translation demand for the given error in the robot body frame.
///
/// If the demand vector is longer than `max_trans_cmd` it is scaled down so that its direction is
/// preserved. Returns `(forward, lateral)`.
pub fn translation_cmd(forward_err_m: f64, left_err_m: f64, tuning: &Tuning) -> (f64, f64) {
    let axial = tuning.trans_k_p * forward_err_m;
    let lateral = tuning.trans_k_p * left_err_m;

    let mag = axial.hypot(lateral);

    if mag > tuning.max_trans_cmd && mag > 0.0 {
        let scale = tuning.max_trans_cmd / mag;
        (axial * scale, lateral * scale)
    }
    else {
        (axial, lateral)
    }
}

/// Get the rotation demand for the given bearing error.
///
/// Errors with a magnitude at or below the deadband give exactly zero.
pub fn rotation_cmd(bearing_err_rad: f64, tuning: &Tuning) -> f64 {
    if bearing_err_rad.abs() <= tuning.rot_deadband_rad {
        return 0.0;
    }

    clamp(
        &(tuning.rot_k_p * bearing_err_rad),
        &-tuning.max_rot_cmd,
        &tuning.max_rot_cmd,
    )
}
