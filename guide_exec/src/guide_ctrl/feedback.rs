//! # Feedback equipment interfaces
//!
//! Traits for the equipment GuideCtrl reads from. All calls are synchronous and made at most once
//! per cycle from within `GuideCtrl::get`.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use std::collections::HashMap;

use comms_if::eqpt::{
    cam::ObservationSample,
    perloc::{FieldPose, PoseEstimate},
    AnchorId,
};
use serde::Deserialize;

// ---------------------------------------------------------------------------
// TRAITS
// ---------------------------------------------------------------------------

/// A source of landmark observations relative to the robot.
pub trait ObservationSource {
    /// Acquire the latest observation. `dt_s` is the period of the current cycle.
    fn sample(&mut self, dt_s: f64) -> ObservationSample;
}

/// A source of absolute field pose estimates.
pub trait PoseEstimator {
    fn get_estimate(&mut self) -> PoseEstimate;
}

/// The known field poses of the anchors.
pub trait AnchorLayout {
    fn lookup(&self, id: AnchorId) -> Option<FieldPose>;
}

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A list of anchors as stored in a parameter file.
#[derive(Deserialize, Debug, Clone, Default)]
pub struct AnchorLayoutParams {
    #[serde(default)]
    pub anchors: Vec<AnchorEntry>,
}

#[derive(Deserialize, Debug, Clone, Copy)]
pub struct AnchorEntry {
    pub id: AnchorId,
    pub pose: FieldPose,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl<F> ObservationSource for F
where
    F: FnMut(f64) -> ObservationSample,
{
    fn sample(&mut self, dt_s: f64) -> ObservationSample {
        self(dt_s)
    }
}

impl<F> PoseEstimator for F
where
    F: FnMut() -> PoseEstimate,
{
    fn get_estimate(&mut self) -> PoseEstimate {
        self()
    }
}

impl AnchorLayout for HashMap<AnchorId, FieldPose> {
    fn lookup(&self, id: AnchorId) -> Option<FieldPose> {
        self.get(&id).copied()
    }
}

impl AnchorLayoutParams {
    /// Build an in-memory layout. Later entries replace earlier ones with the same id.
    pub fn into_layout(self) -> HashMap<AnchorId, FieldPose> {
        self.anchors
            .into_iter()
            .map(|a| (a.id, a.pose))
            .collect()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_layout_from_params() {
        let params: AnchorLayoutParams = util::params::from_str(r#"
            [[anchors]]
            id = 3
            pose = { x_m = 1.0, y_m = 2.0, heading_rad = 1.5 }

            [[anchors]]
            id = 7
            pose = { x_m = -1.0, y_m = 0.5 }
        "#).unwrap();

        let layout = params.into_layout();

        assert_eq!(layout.lookup(AnchorId(3)), Some(FieldPose::new(1.0, 2.0, 1.5)));
        assert_eq!(layout.lookup(AnchorId(7)), Some(FieldPose::new(-1.0, 0.5, 0.0)));
        assert_eq!(layout.lookup(AnchorId(4)), None);
    }

    #[test]
    fn test_closures_are_sources() {
        let mut calls = 0;
        let mut source = |_dt: f64| {
            calls += 1;
            ObservationSample::none()
        };

        let sample = ObservationSource::sample(&mut source, 0.02);
        assert!(!sample.has_target);
        assert_eq!(calls, 1);
    }
}
