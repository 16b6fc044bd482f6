//! Guidance control parameters

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use comms_if::eqpt::perloc::FieldPose;
use serde::{Deserialize, Serialize};

// Internal
use super::target::{AimTarget, TranslationTarget};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Default rotation deadband, one degree.
pub const DEFAULT_ROT_DEADBAND_RAD: f64 = std::f64::consts::PI / 180.0;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for guidance control.
///
/// Everything which makes up a guidance plan apart from the equipment handles themselves, see
/// `Plan::new`.
#[derive(Deserialize, Debug, Clone, Default)]
pub struct Params {
    /// Where to drive the translation frame to. If `None` translation is not requested.
    #[serde(default)]
    pub translation_target: Option<TranslationTarget>,

    /// What to point the aim frame at. If `None` rotation is not requested.
    #[serde(default)]
    pub aim_target: Option<AimTarget>,

    #[serde(default)]
    pub control_frames: ControlFrames,

    #[serde(default)]
    pub tuning: Tuning,

    /// Acceptance thresholds for observation samples.
    #[serde(default)]
    pub obs_thresholds: Thresholds,

    /// Acceptance thresholds for pose estimates.
    #[serde(default)]
    pub pose_thresholds: Thresholds,

    /// Source switching gates, only used in adaptive mode. Defaults are used if not given.
    #[serde(default)]
    pub gates: Option<Gates>,

    /// If true, rotation uses the observation whenever it is usable, regardless of which source
    /// drives translation.
    #[serde(default)]
    pub prefer_obs_for_rotation: bool,

    #[serde(default)]
    pub loss_policy: LossPolicy,
}

/// Offsets of the controlled points from the robot origin.
///
/// Frame: Robot body
#[derive(Deserialize, Serialize, Debug, Clone, Copy, Default, PartialEq)]
#[serde(default)]
pub struct ControlFrames {
    /// The point which is translated onto the translation target.
    pub translation_rb: FieldPose,

    /// The point (and direction, along its X axis) which is aimed at the aim target.
    pub aim_rb: FieldPose,
}

/// Gains and limits for the proportional control laws.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq)]
#[serde(default)]
pub struct Tuning {
    /// Translation controller proportional gain
    pub trans_k_p: f64,

    /// Maximum magnitude of the translation command vector
    pub max_trans_cmd: f64,

    /// Rotation controller proportional gain
    pub rot_k_p: f64,

    /// Maximum magnitude of the rotation command
    pub max_rot_cmd: f64,

    /// Bearing errors at or below this magnitude produce no rotation.
    ///
    /// Units: radians
    pub rot_deadband_rad: f64,
}

/// Thresholds a feedback sample must meet to be used.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq)]
#[serde(default)]
pub struct Thresholds {
    /// Samples older than this are rejected.
    ///
    /// Units: seconds
    pub max_age_s: f64,

    /// Samples with a quality below this are rejected.
    pub min_quality: f64,
}

/// Source arbitration gates for adaptive mode.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq)]
#[serde(default)]
pub struct Gates {
    /// Observation range at or below which the observation becomes preferred for translation.
    ///
    /// Units: meters
    pub enter_range_m: f64,

    /// Observation range at or above which the observation stops being preferred.
    ///
    /// Units: meters
    pub exit_range_m: f64,

    /// Time taken to fully hand over from one source to the other.
    ///
    /// Units: seconds
    pub blend_duration_s: f64,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// What to do with a requested axis that no source can drive.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LossPolicy {
    /// Leave the axis to the caller's own command.
    PassThrough,

    /// Override the axis with zero.
    ZeroOutput,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for Tuning {
    fn default() -> Self {
        Self {
            trans_k_p: 1.0,
            max_trans_cmd: 1.0,
            rot_k_p: 1.0,
            max_rot_cmd: 1.0,
            rot_deadband_rad: DEFAULT_ROT_DEADBAND_RAD,
        }
    }
}

impl Tuning {
    /// Return the name of the first negative (or NaN) value, if any.
    pub(crate) fn first_invalid(&self) -> Option<&'static str> {
        let values = [
            ("trans_k_p", self.trans_k_p),
            ("max_trans_cmd", self.max_trans_cmd),
            ("rot_k_p", self.rot_k_p),
            ("max_rot_cmd", self.max_rot_cmd),
            ("rot_deadband_rad", self.rot_deadband_rad),
        ];

        values
            .iter()
            .find(|(_, v)| !(*v >= 0.0))
            .map(|(name, _)| *name)
    }
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            max_age_s: 0.25,
            min_quality: 0.0,
        }
    }
}

impl Thresholds {
    /// Check a sample's age and quality against the thresholds.
    pub fn accepts(&self, age_s: f64, quality: f64) -> bool {
        age_s <= self.max_age_s && quality >= self.min_quality
    }
}

impl Default for Gates {
    fn default() -> Self {
        Self {
            enter_range_m: 1.0,
            exit_range_m: 1.5,
            blend_duration_s: 0.5,
        }
    }
}

impl Default for LossPolicy {
    fn default() -> Self {
        LossPolicy::PassThrough
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::guide_ctrl::target::AnchorSelector;
    use comms_if::eqpt::AnchorId;

    #[test]
    fn test_load_params_from_toml() {
        let params: Params = util::params::from_str(r#"
            prefer_obs_for_rotation = true
            loss_policy = "zero_output"

            [translation_target]
            kind = "anchor_relative_point"
            anchor = "any"
            forward_m = 0.5

            [aim_target]
            kind = "anchor_relative_point"
            anchor = 4

            [control_frames.translation_rb]
            x_m = 0.3
            y_m = 0.0

            [tuning]
            trans_k_p = 0.05
            max_trans_cmd = 0.6

            [gates]
            enter_range_m = 2.0
            exit_range_m = 2.5
            blend_duration_s = 0.25
        "#).unwrap();

        assert!(params.prefer_obs_for_rotation);
        assert_eq!(params.loss_policy, LossPolicy::ZeroOutput);
        assert_eq!(
            params.translation_target,
            Some(TranslationTarget::AnchorRelativePoint {
                anchor: AnchorSelector::Any,
                forward_m: 0.5,
                left_m: 0.0
            })
        );
        assert_eq!(
            params.aim_target,
            Some(AimTarget::AnchorRelativePoint {
                anchor: AnchorSelector::Id(AnchorId(4)),
                forward_m: 0.0,
                left_m: 0.0
            })
        );
        assert_eq!(params.control_frames.translation_rb.x_m, 0.3);
        assert!(params.control_frames.aim_rb.is_origin());

        // Unspecified tuning values take their defaults
        assert_eq!(params.tuning.trans_k_p, 0.05);
        assert_eq!(params.tuning.rot_k_p, 1.0);
        assert_eq!(params.tuning.rot_deadband_rad, DEFAULT_ROT_DEADBAND_RAD);

        assert_eq!(params.gates.map(|g| g.enter_range_m), Some(2.0));
        assert_eq!(params.obs_thresholds, Thresholds::default());
    }

    #[test]
    fn test_empty_params_are_defaults() {
        let params: Params = util::params::from_str("").unwrap();

        assert!(params.translation_target.is_none());
        assert!(params.aim_target.is_none());
        assert!(params.gates.is_none());
        assert_eq!(params.loss_policy, LossPolicy::PassThrough);
        assert_eq!(params.tuning, Tuning::default());
    }

    #[test]
    fn test_thresholds() {
        let t = Thresholds {
            max_age_s: 0.1,
            min_quality: 0.5,
        };

        assert!(t.accepts(0.1, 0.5));
        assert!(!t.accepts(0.11, 0.9));
        assert!(!t.accepts(0.0, 0.49));
        assert!(!t.accepts(std::f64::NAN, 1.0));
    }

    #[test]
    fn test_tuning_validation() {
        assert_eq!(Tuning::default().first_invalid(), None);

        let mut tuning = Tuning::default();
        tuning.max_rot_cmd = -0.1;
        assert_eq!(tuning.first_invalid(), Some("max_rot_cmd"));
    }
}
