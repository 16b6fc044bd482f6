//! # Per-source solvers
//!
//! Each feedback channel turns its latest sample into a `Candidate` command. The geometry is
//! shared: a channel only has to say where the robot is in its reference frame, and where the
//! targets resolve to in that same frame.
//!
//! - The observation channel works in the Robot Body frame, so the robot pose is the identity and
//!   targets are resolved from the observed anchor.
//! - The field pose channel works in the Field frame, with the robot pose taken from the estimate
//!   and targets resolved through the anchor layout or the session capture.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use comms_if::eqpt::{cam::ObservationSample, perloc::PoseEstimate};
use log::trace;
use nalgebra::{Isometry2, Point2};
use serde::Serialize;
use util::{convert::Convert, maths::{norm, wrap_pi}};

// Internal
use super::{
    controllers,
    feedback::AnchorLayout,
    params::{ControlFrames, Thresholds, Tuning},
    state::AdaptiveState,
    target::{AimTarget, ResolvedAim, TranslationTarget},
};

// ---------------------------------------------------------------------------
// TRAITS
// ---------------------------------------------------------------------------

/// A feedback channel which can be solved for a candidate command.
pub trait Channel {
    type Sample;

    /// Label used in logs.
    const NAME: &'static str;

    /// True if the sample is fresh and confident enough to use.
    fn is_valid(&self, sample: &Self::Sample) -> bool;

    /// Called once per cycle with a valid sample, before any target is resolved.
    fn on_valid(&self, _sample: &Self::Sample, _state: &mut AdaptiveState) {}

    /// Pose of the robot origin in this channel's reference frame.
    fn robot_pose(&self, sample: &Self::Sample) -> Isometry2<f64>;

    /// Resolve the translation target in the reference frame.
    fn translation_point(
        &self,
        sample: &Self::Sample,
        target: &TranslationTarget,
        trans_frame: &Isometry2<f64>,
        state: &mut AdaptiveState,
    ) -> Option<Point2<f64>>;

    /// Resolve the aim target in the reference frame.
    fn aim(
        &self,
        sample: &Self::Sample,
        target: &AimTarget,
        frames: &ControlFrames,
        state: &AdaptiveState,
    ) -> Option<ResolvedAim>;

    /// Distance to whatever the channel is measuring, if it measures one.
    fn range_m(&self, _sample: &Self::Sample) -> Option<f64> {
        None
    }
}

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// The command a single source would give this cycle.
#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq)]
pub struct Candidate {
    /// The sample passed its age and quality checks.
    pub valid: bool,

    /// The translation target resolved, and the translation fields are set.
    pub can_translate: bool,

    /// The aim target resolved, and the rotation fields are set.
    pub can_rotate: bool,

    /// Translation error along RB_X
    pub forward_err_m: f64,

    /// Translation error along RB_Y
    pub left_err_m: f64,

    pub forward_cmd: f64,
    pub lateral_cmd: f64,

    /// Bearing error of the aim frame, positive to the left.
    pub bearing_err_rad: f64,

    pub angular_cmd: f64,

    /// Range to the observed anchor (observation channel only).
    pub range_m: Option<f64>,
}

/// Everything from the plan a solver needs.
pub struct SolveCtx<'a> {
    pub translation_target: Option<&'a TranslationTarget>,
    pub aim_target: Option<&'a AimTarget>,
    pub frames: &'a ControlFrames,
    pub tuning: &'a Tuning,
}

/// The observation channel.
pub struct ObsChannel<'a> {
    pub thresholds: &'a Thresholds,
}

/// The field pose channel.
pub struct PoseChannel<'a> {
    pub thresholds: &'a Thresholds,
    pub layout: Option<&'a dyn AnchorLayout>,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Candidate {
    /// An invalid candidate, as produced for an unconfigured or rejected source.
    pub fn invalid() -> Self {
        Self::default()
    }

    pub fn usable_for_translation(&self) -> bool {
        self.valid && self.can_translate
    }

    pub fn usable_for_rotation(&self) -> bool {
        self.valid && self.can_rotate
    }
}

impl<'a> Channel for ObsChannel<'a> {
    type Sample = ObservationSample;

    const NAME: &'static str = "obs";

    fn is_valid(&self, sample: &ObservationSample) -> bool {
        sample.has_target && self.thresholds.accepts(sample.age_s, sample.quality)
    }

    fn on_valid(&self, sample: &ObservationSample, state: &mut AdaptiveState) {
        if let Some(id) = sample.anchor_id {
            state.last_seen_anchor = Some(id);
        }
    }

    fn robot_pose(&self, _sample: &ObservationSample) -> Isometry2<f64> {
        Isometry2::identity()
    }

    fn translation_point(
        &self,
        sample: &ObservationSample,
        target: &TranslationTarget,
        _trans_frame: &Isometry2<f64>,
        _state: &mut AdaptiveState,
    ) -> Option<Point2<f64>> {
        target.resolve_observed(sample)
    }

    fn aim(
        &self,
        sample: &ObservationSample,
        target: &AimTarget,
        frames: &ControlFrames,
        _state: &AdaptiveState,
    ) -> Option<ResolvedAim> {
        target.resolve_observed(sample, frames.aim_rb.is_origin())
    }

    fn range_m(&self, sample: &ObservationSample) -> Option<f64> {
        sample
            .position_m_rb()
            .and_then(|p| norm(&[0f64, 0f64], &p))
    }
}

impl<'a> Channel for PoseChannel<'a> {
    type Sample = PoseEstimate;

    const NAME: &'static str = "pose";

    fn is_valid(&self, sample: &PoseEstimate) -> bool {
        sample.has_pose && self.thresholds.accepts(sample.age_s, sample.quality)
    }

    fn robot_pose(&self, sample: &PoseEstimate) -> Isometry2<f64> {
        sample.pose.convert()
    }

    fn translation_point(
        &self,
        _sample: &PoseEstimate,
        target: &TranslationTarget,
        trans_frame: &Isometry2<f64>,
        state: &mut AdaptiveState,
    ) -> Option<Point2<f64>> {
        target.resolve_field(trans_frame, self.layout, state)
    }

    fn aim(
        &self,
        _sample: &PoseEstimate,
        target: &AimTarget,
        _frames: &ControlFrames,
        state: &AdaptiveState,
    ) -> Option<ResolvedAim> {
        target.resolve_field(self.layout, state.last_seen_anchor)
    }
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Solve a channel's sample for a candidate command.
pub fn solve<C: Channel>(
    channel: &C,
    sample: &C::Sample,
    ctx: &SolveCtx,
    state: &mut AdaptiveState,
) -> Candidate {
    let mut cand = Candidate::invalid();

    if !channel.is_valid(sample) {
        trace!("{} sample rejected", C::NAME);
        return cand;
    }

    cand.valid = true;
    channel.on_valid(sample, state);
    cand.range_m = channel.range_m(sample);

    let robot = channel.robot_pose(sample);

    // ---- TRANSLATION ----

    if let Some(target) = ctx.translation_target {
        let trans_rb: Isometry2<f64> = ctx.frames.translation_rb.convert();
        let trans_frame = robot * trans_rb;

        if let Some(point) = channel.translation_point(sample, target, &trans_frame, state) {
            // Error in the reference frame, then rotated into the robot's axes
            let err = point.coords - trans_frame.translation.vector;
            let err_rb = robot.inverse_transform_vector(&err);

            let (fwd, lat) = controllers::translation_cmd(err_rb.x, err_rb.y, ctx.tuning);

            cand.can_translate = true;
            cand.forward_err_m = err_rb.x;
            cand.left_err_m = err_rb.y;
            cand.forward_cmd = fwd;
            cand.lateral_cmd = lat;
        }
    }

    // ---- ROTATION ----

    if let Some(target) = ctx.aim_target {
        let aim_rb: Isometry2<f64> = ctx.frames.aim_rb.convert();
        let aim_frame = robot * aim_rb;

        let bearing_err_rad = match channel.aim(sample, target, ctx.frames, state) {
            Some(ResolvedAim::Point(p)) => Some(bearing_to(&aim_frame, &p)),
            Some(ResolvedAim::Heading(h)) => Some(wrap_pi(h - aim_frame.rotation.angle())),
            Some(ResolvedAim::Bearing(b)) => Some(b),
            None => None,
        };

        if let Some(err) = bearing_err_rad {
            cand.can_rotate = true;
            cand.bearing_err_rad = err;
            cand.angular_cmd = controllers::rotation_cmd(err, ctx.tuning);
        }
    }

    trace!(
        "{} candidate: trans {} ({:.3}, {:.3}), rot {} ({:.3}), range {:?}",
        C::NAME,
        cand.can_translate,
        cand.forward_cmd,
        cand.lateral_cmd,
        cand.can_rotate,
        cand.angular_cmd,
        cand.range_m
    );

    cand
}

/// Angle from the frame's X axis to the point, positive to the left.
fn bearing_to(frame: &Isometry2<f64>, point: &Point2<f64>) -> f64 {
    let local = frame.inverse_transform_point(point);
    local.y.atan2(local.x)
}
