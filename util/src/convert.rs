//! Implements `Convert` functions between interface types and `nalgebra` types.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use comms_if::eqpt::perloc::FieldPose;
use nalgebra::{Isometry2, Vector2};

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

pub trait Convert<O> {
    fn convert(&self) -> O;
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Convert<Isometry2<f64>> for FieldPose {
    fn convert(&self) -> Isometry2<f64> {
        Isometry2::new(Vector2::new(self.x_m, self.y_m), self.heading_rad)
    }
}

impl Convert<FieldPose> for Isometry2<f64> {
    fn convert(&self) -> FieldPose {
        FieldPose {
            x_m: self.translation.vector.x,
            y_m: self.translation.vector.y,
            heading_rad: self.rotation.angle(),
        }
    }
}
