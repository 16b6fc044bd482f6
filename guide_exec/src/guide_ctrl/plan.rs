//! # Guidance plan
//!
//! A plan is the validated, immutable configuration of one guidance overlay: the targets, frames
//! and tuning from the parameters, together with the equipment handles it reads feedback from.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use std::fmt;

use log::{info, warn};
use serde::Serialize;
use thiserror::Error;

// Internal
use super::{
    cmd::OverrideMask,
    feedback::{AnchorLayout, ObservationSource, PoseEstimator},
    params::{ControlFrames, Gates, LossPolicy, Params, Thresholds, Tuning},
    target::{AimTarget, TranslationTarget},
};
use util::params;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// The equipment a plan may read from. Any of these may be left out, but at least one of the
/// observation source and pose estimator must be given.
#[derive(Default)]
pub struct Collaborators {
    pub obs_source: Option<Box<dyn ObservationSource>>,
    pub pose_estimator: Option<Box<dyn PoseEstimator>>,
    pub anchor_layout: Option<Box<dyn AnchorLayout>>,
}

/// The observation channel of a plan.
pub struct ObsFeedback {
    pub source: Box<dyn ObservationSource>,
    pub thresholds: Thresholds,
}

/// The field pose channel of a plan.
pub struct PoseFeedback {
    pub estimator: Box<dyn PoseEstimator>,
    pub thresholds: Thresholds,
}

pub struct Plan {
    pub translation_target: Option<TranslationTarget>,
    pub aim_target: Option<AimTarget>,
    pub control_frames: ControlFrames,
    pub tuning: Tuning,

    /// Gates for adaptive mode. Populated with defaults in other modes but unused.
    pub gates: Gates,

    pub prefer_obs_for_rotation: bool,
    pub loss_policy: LossPolicy,

    pub obs: Option<ObsFeedback>,
    pub pose: Option<PoseFeedback>,
    pub layout: Option<Box<dyn AnchorLayout>>,

    mode: GuideMode,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Which feedback channels a plan uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GuideMode {
    ObservationOnly,
    FieldPoseOnly,

    /// Both channels, arbitrated per degree of freedom.
    Adaptive,
}

#[derive(Debug, Error)]
pub enum PlanError {
    #[error("No feedback source was given, at least one of an observation source or pose estimator is required")]
    NoFeedback,

    #[error("Tuning value {0} must be non-negative")]
    InvalidTuning(&'static str),

    #[error("Enter range ({enter_m} m) must be less than exit range ({exit_m} m)")]
    InvalidGates { enter_m: f64, exit_m: f64 },

    #[error("Blend duration ({0} s) must be non-negative")]
    NegativeBlendDuration(f64),

    #[error("Failed to load parameters: {0}")]
    ParamLoadError(params::LoadError),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Plan {
    /// Build and validate a new plan.
    pub fn new(params: Params, collabs: Collaborators) -> Result<Self, PlanError> {
        let mode = match (&collabs.obs_source, &collabs.pose_estimator) {
            (Some(_), Some(_)) => GuideMode::Adaptive,
            (Some(_), None) => GuideMode::ObservationOnly,
            (None, Some(_)) => GuideMode::FieldPoseOnly,
            (None, None) => return Err(PlanError::NoFeedback),
        };

        if let Some(name) = params.tuning.first_invalid() {
            return Err(PlanError::InvalidTuning(name));
        }

        let gates = params.gates.unwrap_or_default();
        if mode == GuideMode::Adaptive {
            if !(gates.enter_range_m < gates.exit_range_m) {
                return Err(PlanError::InvalidGates {
                    enter_m: gates.enter_range_m,
                    exit_m: gates.exit_range_m,
                });
            }
            if !(gates.blend_duration_s >= 0.0) {
                return Err(PlanError::NegativeBlendDuration(gates.blend_duration_s));
            }
        }

        // Targets which only the pose channel can resolve
        if collabs.pose_estimator.is_none() {
            if let Some(TranslationTarget::SessionRelativePoint { .. }) = params.translation_target {
                warn!("Session relative translation target without a pose estimator will never resolve");
            }
            if let Some(AimTarget::AbsoluteHeading { .. }) = params.aim_target {
                warn!("Absolute heading aim target without a pose estimator will never resolve");
            }
            if collabs.anchor_layout.is_some() {
                warn!("Anchor layout given without a pose estimator, it will not be used");
            }
        }

        let obs = collabs.obs_source.map(|source| ObsFeedback {
            source,
            thresholds: params.obs_thresholds,
        });
        let pose = collabs.pose_estimator.map(|estimator| PoseFeedback {
            estimator,
            thresholds: params.pose_thresholds,
        });

        let plan = Self {
            translation_target: params.translation_target,
            aim_target: params.aim_target,
            control_frames: params.control_frames,
            tuning: params.tuning,
            gates,
            prefer_obs_for_rotation: params.prefer_obs_for_rotation,
            loss_policy: params.loss_policy,
            obs,
            pose,
            layout: collabs.anchor_layout,
            mode,
        };

        info!("Guidance plan built: {:?}", plan);

        Ok(plan)
    }

    /// Load the parameters from a file (relative to the params directory) and build a plan.
    pub fn from_file(params_path: &str, collabs: Collaborators) -> Result<Self, PlanError> {
        let params: Params = params::load(params_path)
            .map_err(PlanError::ParamLoadError)?;

        Self::new(params, collabs)
    }

    pub fn mode(&self) -> GuideMode {
        self.mode
    }

    /// The axes this plan has targets for.
    pub fn requested(&self) -> OverrideMask {
        OverrideMask {
            translation: self.translation_target.is_some(),
            rotation: self.aim_target.is_some(),
        }
    }
}

impl fmt::Debug for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Plan")
            .field("mode", &self.mode)
            .field("translation_target", &self.translation_target)
            .field("aim_target", &self.aim_target)
            .field("control_frames", &self.control_frames)
            .field("tuning", &self.tuning)
            .field("gates", &self.gates)
            .field("prefer_obs_for_rotation", &self.prefer_obs_for_rotation)
            .field("loss_policy", &self.loss_policy)
            .field("has_layout", &self.layout.is_some())
            .finish()
    }
}

impl GuideMode {
    pub fn label(&self) -> &'static str {
        match self {
            GuideMode::ObservationOnly => "observation_only",
            GuideMode::FieldPoseOnly => "field_pose_only",
            GuideMode::Adaptive => "adaptive",
        }
    }
}

impl fmt::Display for GuideMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use comms_if::eqpt::{cam::ObservationSample, perloc::PoseEstimate};
    use std::collections::HashMap;

    fn obs_source() -> Option<Box<dyn ObservationSource>> {
        Some(Box::new(|_dt: f64| ObservationSample::none()))
    }

    fn pose_estimator() -> Option<Box<dyn PoseEstimator>> {
        Some(Box::new(PoseEstimate::none))
    }

    #[test]
    fn test_no_feedback_is_rejected() {
        let collabs = Collaborators {
            anchor_layout: Some(Box::new(HashMap::new())),
            ..Collaborators::default()
        };

        assert!(matches!(
            Plan::new(Params::default(), collabs),
            Err(PlanError::NoFeedback)
        ));
    }

    #[test]
    fn test_mode_from_collaborators() {
        let plan = Plan::new(Params::default(), Collaborators {
            obs_source: obs_source(),
            ..Collaborators::default()
        }).unwrap();
        assert_eq!(plan.mode(), GuideMode::ObservationOnly);

        let plan = Plan::new(Params::default(), Collaborators {
            pose_estimator: pose_estimator(),
            ..Collaborators::default()
        }).unwrap();
        assert_eq!(plan.mode(), GuideMode::FieldPoseOnly);

        let plan = Plan::new(Params::default(), Collaborators {
            obs_source: obs_source(),
            pose_estimator: pose_estimator(),
            ..Collaborators::default()
        }).unwrap();
        assert_eq!(plan.mode(), GuideMode::Adaptive);
        assert_eq!(plan.gates, Gates::default());
        assert_eq!(plan.mode().label(), "adaptive");
    }

    #[test]
    fn test_invalid_tuning() {
        let mut params = Params::default();
        params.tuning.trans_k_p = -1.0;

        let res = Plan::new(params, Collaborators {
            pose_estimator: pose_estimator(),
            ..Collaborators::default()
        });
        assert!(matches!(res, Err(PlanError::InvalidTuning("trans_k_p"))));
    }

    #[test]
    fn test_gates_checked_only_when_adaptive() {
        let bad_gates = Gates {
            enter_range_m: 2.0,
            exit_range_m: 1.0,
            blend_duration_s: 0.5,
        };
        let mut params = Params::default();
        params.gates = Some(bad_gates);

        assert!(Plan::new(params.clone(), Collaborators {
            obs_source: obs_source(),
            ..Collaborators::default()
        }).is_ok());

        let res = Plan::new(params.clone(), Collaborators {
            obs_source: obs_source(),
            pose_estimator: pose_estimator(),
            ..Collaborators::default()
        });
        assert!(matches!(res, Err(PlanError::InvalidGates { .. })));

        params.gates = Some(Gates {
            blend_duration_s: -0.1,
            ..Gates::default()
        });
        let res = Plan::new(params, Collaborators {
            obs_source: obs_source(),
            pose_estimator: pose_estimator(),
            ..Collaborators::default()
        });
        assert!(matches!(res, Err(PlanError::NegativeBlendDuration(_))));
    }

    #[test]
    fn test_requested_follows_targets() {
        let mut params = Params::default();
        params.aim_target = Some(AimTarget::AbsoluteHeading { heading_rad: 0.0 });

        let plan = Plan::new(params, Collaborators {
            pose_estimator: pose_estimator(),
            ..Collaborators::default()
        }).unwrap();

        assert_eq!(plan.requested(), OverrideMask {
            translation: false,
            rotation: true,
        });
    }
}
