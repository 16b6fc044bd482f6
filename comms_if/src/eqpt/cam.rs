//! # Camera Equipment Communications Module
//!
//! Landmark observations produced by the vision pipeline. All quantities are relative to the
//! Robot Body (RB) frame: +x forward, +y left, angles positive to the left.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

use super::AnchorId;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// A single sample from the landmark observation pipeline.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ObservationSample {
    /// If true the pipeline currently sees a landmark.
    pub has_target: bool,

    /// Time since the underlying frame was acquired.
    ///
    /// Units: seconds
    pub age_s: f64,

    /// Pipeline specific confidence in the detection, higher is better.
    pub quality: f64,

    /// Forward distance from the robot origin to the landmark, if ranged.
    ///
    /// Units: meters,
    /// Frame: Robot body
    #[serde(default)]
    pub forward_m_rb: Option<f64>,

    /// Leftwards distance from the robot origin to the landmark, if ranged.
    ///
    /// Units: meters,
    /// Frame: Robot body
    #[serde(default)]
    pub left_m_rb: Option<f64>,

    /// Orientation of the landmark's frame relative to the robot heading, if the pipeline
    /// resolved it.
    ///
    /// Units: radians
    #[serde(default)]
    pub heading_rad_rb: Option<f64>,

    /// Identifier of the observed landmark, if it could be decoded.
    #[serde(default)]
    pub anchor_id: Option<AnchorId>,

    /// Bearing to the landmark centre from the robot origin. Always present when `has_target` is
    /// set, even if the landmark could not be ranged.
    ///
    /// Units: radians
    pub bearing_rad: f64,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl ObservationSample {
    /// A sample indicating that nothing is in view.
    pub fn none() -> Self {
        Self {
            has_target: false,
            age_s: 0.0,
            quality: 0.0,
            forward_m_rb: None,
            left_m_rb: None,
            heading_rad_rb: None,
            anchor_id: None,
            bearing_rad: 0.0,
        }
    }

    /// Return the relative position of the landmark if both components were measured.
    pub fn position_m_rb(&self) -> Option<[f64; 2]> {
        match (self.forward_m_rb, self.left_m_rb) {
            (Some(f), Some(l)) => Some([f, l]),
            _ => None,
        }
    }
}

impl Default for ObservationSample {
    fn default() -> Self {
        Self::none()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_parse_bearing_only_sample() {
        let json = r#"{
            "has_target": true,
            "age_s": 0.02,
            "quality": 0.8,
            "anchor_id": 7,
            "bearing_rad": 0.1
        }"#;

        let sample: ObservationSample = serde_json::from_str(json).unwrap();

        assert!(sample.has_target);
        assert_eq!(sample.anchor_id, Some(AnchorId(7)));
        assert_eq!(sample.position_m_rb(), None);
        assert_eq!(sample.heading_rad_rb, None);
    }

    #[test]
    fn test_partial_position_is_not_a_position() {
        let mut sample = ObservationSample::none();
        sample.forward_m_rb = Some(1.0);
        assert_eq!(sample.position_m_rb(), None);

        sample.left_m_rb = Some(-0.5);
        assert_eq!(sample.position_m_rb(), Some([1.0, -0.5]));
    }
}
