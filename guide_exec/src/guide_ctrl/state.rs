//! Guidance control module state

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use std::fmt;

use comms_if::eqpt::{perloc::FieldPose, AnchorId};
use log::{debug, info, trace};
use nalgebra::Isometry2;
use serde::Serialize;
use util::convert::Convert;

// Internal
use super::{
    arbiter::{self, Source},
    cmd::{OverrideMask, VelocityCommand},
    params::LossPolicy,
    plan::{GuideMode, Plan},
    solver::{solve, Candidate, ObsChannel, PoseChannel, SolveCtx},
};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Guidance overlay.
///
/// Call `on_enable` before the first cycle, then `get` once per control cycle.
pub struct GuideCtrl {
    plan: Plan,

    enabled: bool,

    state: AdaptiveState,

    report: StatusReport,
}

/// Mutable state carried between cycles.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AdaptiveState {
    /// Range hysteresis flag, true while the observation is close enough to drive translation.
    pub obs_in_range: bool,

    /// Fraction of the observation candidate mixed into the translation command.
    pub translation_blend: f64,

    /// Fraction of the observation candidate mixed into the rotation command.
    pub rotation_blend: f64,

    /// The most recently observed anchor. Kept across enable and disable.
    pub last_seen_anchor: Option<AnchorId>,

    /// Pose of the translation frame captured for session relative targets.
    ///
    /// Frame: Field
    pub session_anchor: Option<Isometry2<f64>>,
}

/// The status report of the last cycle.
#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
pub struct StatusReport {
    pub mode: GuideMode,
    pub enabled: bool,

    pub cmd: VelocityCommand,
    pub mask: OverrideMask,

    pub translation_source: Source,
    pub rotation_source: Source,

    pub obs_in_range: bool,
    pub translation_blend: f64,
    pub rotation_blend: f64,

    /// Range to the observed anchor this cycle.
    ///
    /// Units: meters
    pub obs_range_m: Option<f64>,

    pub last_seen_anchor: Option<AnchorId>,
    pub session_anchor: Option<FieldPose>,

    pub obs_candidate: Candidate,
    pub pose_candidate: Candidate,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl AdaptiveState {
    /// Clear the per-activation state, keeping the last seen anchor.
    pub fn reset_for_enable(&mut self) {
        *self = Self {
            last_seen_anchor: self.last_seen_anchor,
            ..Self::default()
        };
    }
}

impl GuideCtrl {
    /// Create a new disabled overlay for the plan.
    pub fn new(plan: Plan) -> Self {
        let report = StatusReport::new(plan.mode());

        Self {
            plan,
            enabled: false,
            state: AdaptiveState::default(),
            report,
        }
    }

    pub fn on_enable(&mut self, _dt_s: f64) {
        self.state.reset_for_enable();
        self.enabled = true;

        self.report = StatusReport {
            last_seen_anchor: self.state.last_seen_anchor,
            ..StatusReport::new(self.plan.mode())
        };
        self.report.enabled = true;

        info!(
            "GuideCtrl enabled in {} mode (requested {:?})",
            self.plan.mode(),
            self.plan.requested()
        );
    }

    /// Stop guidance. The state is kept as it was until the next enable.
    pub fn on_disable(&mut self, _dt_s: f64) {
        self.enabled = false;
        self.report.enabled = false;

        info!("GuideCtrl disabled");
    }

    /// Run one cycle, returning the command and which of its axes are overridden.
    ///
    /// While disabled nothing is sampled and no axes are overridden.
    pub fn get(&mut self, dt_s: f64) -> (VelocityCommand, OverrideMask) {
        if !self.enabled {
            return (VelocityCommand::default(), OverrideMask::none());
        }

        let mode = self.plan.mode();
        let requested = self.plan.requested();

        let plan = &mut self.plan;
        let state = &mut self.state;

        let ctx = SolveCtx {
            translation_target: plan.translation_target.as_ref(),
            aim_target: plan.aim_target.as_ref(),
            frames: &plan.control_frames,
            tuning: &plan.tuning,
        };

        // ---- SOLVE ----

        // Observation first so that an anchor seen this cycle can be used by the pose channel
        let obs_cand = match plan.obs.as_mut() {
            Some(obs) => {
                let sample = obs.source.sample(dt_s);
                let channel = ObsChannel {
                    thresholds: &obs.thresholds,
                };
                solve(&channel, &sample, &ctx, state)
            }
            None => Candidate::invalid(),
        };

        let pose_cand = match plan.pose.as_mut() {
            Some(pose) => {
                let estimate = pose.estimator.get_estimate();
                let channel = PoseChannel {
                    thresholds: &pose.thresholds,
                    layout: plan.layout.as_deref(),
                };
                solve(&channel, &estimate, &ctx, state)
            }
            None => Candidate::invalid(),
        };

        // ---- ARBITRATE ----

        let selection = match mode {
            GuideMode::Adaptive => Some(arbiter::arbitrate(
                state,
                &obs_cand,
                &pose_cand,
                &requested,
                &plan.gates,
                plan.prefer_obs_for_rotation,
            )),
            _ => None,
        };

        // Without a ramp the handoff happens on the cycle the selection changes, otherwise the
        // blend steps after composing so the first cycle of a handoff keeps the previous command
        let instant_handoff = plan.gates.blend_duration_s <= 0.0;
        if let (Some(sel), true) = (selection.as_ref(), instant_handoff) {
            arbiter::advance_blends(state, sel, dt_s, &plan.gates);
        }

        // Only one candidate can be usable outside adaptive mode, so the fraction has no effect
        let (trans_frac, rot_frac) = match mode {
            GuideMode::Adaptive => (state.translation_blend, state.rotation_blend),
            GuideMode::ObservationOnly => (1.0, 1.0),
            GuideMode::FieldPoseOnly => (0.0, 0.0),
        };

        // ---- COMPOSE ----

        let mut cmd = VelocityCommand::default();
        let mut mask = OverrideMask::none();
        let mut translation_source = Source::None;
        let mut rotation_source = Source::None;

        if requested.translation {
            let obs_t = if obs_cand.usable_for_translation() {
                Some((obs_cand.forward_cmd, obs_cand.lateral_cmd))
            }
            else {
                None
            };
            let pose_t = if pose_cand.usable_for_translation() {
                Some((pose_cand.forward_cmd, pose_cand.lateral_cmd))
            }
            else {
                None
            };

            match arbiter::compose(obs_t, pose_t, trans_frac, arbiter::mix_translation) {
                Some(((forward, lateral), source)) => {
                    cmd.forward = forward;
                    cmd.lateral = lateral;
                    mask.translation = true;
                    translation_source = source;
                }
                None => mask.translation = plan.loss_policy == LossPolicy::ZeroOutput,
            }
        }

        if requested.rotation {
            let obs_r = if obs_cand.usable_for_rotation() {
                Some(obs_cand.angular_cmd)
            }
            else {
                None
            };
            let pose_r = if pose_cand.usable_for_rotation() {
                Some(pose_cand.angular_cmd)
            }
            else {
                None
            };

            match arbiter::compose(obs_r, pose_r, rot_frac, arbiter::mix_rotation) {
                Some((angular, source)) => {
                    cmd.angular = angular;
                    mask.rotation = true;
                    rotation_source = source;
                }
                None => mask.rotation = plan.loss_policy == LossPolicy::ZeroOutput,
            }
        }

        if let (Some(sel), false) = (selection.as_ref(), instant_handoff) {
            arbiter::advance_blends(state, sel, dt_s, &plan.gates);
        }

        // ---- REPORT ----

        if translation_source != self.report.translation_source
            || rotation_source != self.report.rotation_source
        {
            debug!(
                "Sources changed: translation {:?} -> {:?}, rotation {:?} -> {:?}",
                self.report.translation_source,
                translation_source,
                self.report.rotation_source,
                rotation_source
            );
        }

        self.report = StatusReport {
            mode,
            enabled: true,
            cmd,
            mask,
            translation_source,
            rotation_source,
            obs_in_range: state.obs_in_range,
            translation_blend: state.translation_blend,
            rotation_blend: state.rotation_blend,
            obs_range_m: obs_cand.range_m,
            last_seen_anchor: state.last_seen_anchor,
            session_anchor: state.session_anchor.map(|iso| iso.convert()),
            obs_candidate: obs_cand,
            pose_candidate: pose_cand,
        };

        trace!("{}", self.report);

        (cmd, mask)
    }

    /// The status report of the most recent cycle.
    pub fn report(&self) -> &StatusReport {
        &self.report
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn mode(&self) -> GuideMode {
        self.plan.mode()
    }

    /// The axes the plan would like to override.
    pub fn requested(&self) -> OverrideMask {
        self.plan.requested()
    }
}

impl StatusReport {
    fn new(mode: GuideMode) -> Self {
        Self {
            mode,
            enabled: false,
            cmd: VelocityCommand::default(),
            mask: OverrideMask::none(),
            translation_source: Source::None,
            rotation_source: Source::None,
            obs_in_range: false,
            translation_blend: 0.0,
            rotation_blend: 0.0,
            obs_range_m: None,
            last_seen_anchor: None,
            session_anchor: None,
            obs_candidate: Candidate::invalid(),
            pose_candidate: Candidate::invalid(),
        }
    }
}

impl fmt::Display for StatusReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}{}] cmd ({:.3}, {:.3}, {:.3}) mask (T: {}, R: {}) src (T: {:?}, R: {:?}) \
            in_range {} blend ({:.2}, {:.2})",
            self.mode,
            if self.enabled { "" } else { ", disabled" },
            self.cmd.forward,
            self.cmd.lateral,
            self.cmd.angular,
            self.mask.translation,
            self.mask.rotation,
            self.translation_source,
            self.rotation_source,
            self.obs_in_range,
            self.translation_blend,
            self.rotation_blend,
        )?;

        match self.obs_range_m {
            Some(r) => write!(f, " range {:.3} m", r)?,
            None => write!(f, " range none")?,
        }

        match self.last_seen_anchor {
            Some(id) => write!(f, " last_seen {}", id)?,
            None => write!(f, " last_seen none")?,
        }

        match self.session_anchor {
            Some(p) => write!(
                f,
                " session_anchor ({:.3}, {:.3}, {:.3})",
                p.x_m, p.y_m, p.heading_rad
            ),
            None => write!(f, " session_anchor none"),
        }
    }
}
