//! # Kinematic simulation
//!
//! A point robot in the field with a simulated landmark camera and localisation, enough to run
//! GuideCtrl closed loop without any equipment. The robot integrates the body velocity command
//! exactly as demanded, the camera sees the nearest anchor inside its range and field of view,
//! and localisation reports the true pose except during configured dropouts, when its last fix
//! goes stale.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use std::{cell::RefCell, cmp::Ordering, collections::HashMap, rc::Rc};

use comms_if::eqpt::{
    cam::ObservationSample,
    perloc::{FieldPose, PoseEstimate},
    AnchorId,
};
use log::trace;
use nalgebra::{Isometry2, Vector2};
use serde::{Deserialize, Serialize};
use util::convert::Convert;

// Internal
use crate::guide_ctrl::{
    Collaborators, GuideCtrl, ObservationSource, OverrideMask, Params, Plan, PlanError,
    PoseEstimator, StatusReport, VelocityCommand,
};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Simulation parameters.
#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct SimParams {
    /// Period of one control cycle.
    ///
    /// Units: seconds
    pub cycle_period_s: f64,

    /// Total simulated time.
    ///
    /// Units: seconds
    pub duration_s: f64,

    /// Initial pose of the robot in the field.
    pub start_pose: FieldPose,

    /// The command the caller would send without guidance, used for axes guidance does not
    /// override.
    pub base_cmd: BaseCmd,

    /// Camera parameters, `None` if no camera is fitted.
    pub camera: Option<CameraParams>,

    /// Localisation parameters, `None` if there is no localisation.
    pub loc: Option<LocParams>,
}

#[derive(Deserialize, Debug, Clone, Copy, Default)]
#[serde(default)]
pub struct BaseCmd {
    pub forward: f64,
    pub lateral: f64,
    pub angular: f64,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct CameraParams {
    /// Anchors further away than this are not seen.
    ///
    /// Units: meters
    pub max_range_m: f64,

    /// Half of the horizontal field of view.
    ///
    /// Units: radians
    pub half_fov_rad: f64,

    /// Anchors closer than this are ranged, further ones only give a bearing.
    ///
    /// Units: meters
    pub max_ranging_m: f64,

    /// If true ranged observations include the anchor's orientation.
    pub resolves_heading: bool,

    pub age_s: f64,
    pub quality: f64,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct LocParams {
    /// Periods during which localisation produces no new fixes.
    pub dropouts: Vec<Dropout>,

    pub quality: f64,
}

/// A window of simulation time, `start_s <= t < end_s`.
#[derive(Deserialize, Debug, Clone, Copy)]
pub struct Dropout {
    pub start_s: f64,
    pub end_s: f64,
}

/// The simulated world.
#[derive(Debug, Clone)]
pub struct SimWorld {
    /// Pose of the robot.
    ///
    /// Frame: Field
    pub robot_fd: Isometry2<f64>,

    /// Simulation time
    ///
    /// Units: seconds
    pub time_s: f64,

    pub anchors: HashMap<AnchorId, FieldPose>,
}

/// Simulated landmark camera.
pub struct SimCamera {
    world: Rc<RefCell<SimWorld>>,
    params: CameraParams,
}

/// Simulated localisation.
pub struct SimLoc {
    world: Rc<RefCell<SimWorld>>,
    params: LocParams,

    /// Time and pose of the last fix.
    last_fix: Option<(f64, FieldPose)>,
}

/// GuideCtrl running closed loop in a simulated world.
pub struct Sim {
    pub world: Rc<RefCell<SimWorld>>,
    pub ctrl: GuideCtrl,
    params: SimParams,
}

/// The record of one simulated cycle.
#[derive(Serialize, Debug, Clone, Copy)]
pub struct SimRecord {
    pub time_s: f64,

    /// Pose of the robot at the start of the cycle.
    pub pose: FieldPose,

    /// The command actually applied after overlaying guidance on the base command.
    pub applied_cmd: VelocityCommand,

    pub report: StatusReport,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for SimParams {
    fn default() -> Self {
        Self {
            cycle_period_s: 0.05,
            duration_s: 20.0,
            start_pose: FieldPose::default(),
            base_cmd: BaseCmd::default(),
            camera: Some(CameraParams::default()),
            loc: Some(LocParams::default()),
        }
    }
}

impl Default for CameraParams {
    fn default() -> Self {
        Self {
            max_range_m: 6.0,
            half_fov_rad: 0.6,
            max_ranging_m: 6.0,
            resolves_heading: true,
            age_s: 0.0,
            quality: 1.0,
        }
    }
}

impl Default for LocParams {
    fn default() -> Self {
        Self {
            dropouts: vec![],
            quality: 1.0,
        }
    }
}

impl Dropout {
    pub fn contains(&self, time_s: f64) -> bool {
        time_s >= self.start_s && time_s < self.end_s
    }
}

impl SimWorld {
    pub fn new(start_pose: &FieldPose, anchors: HashMap<AnchorId, FieldPose>) -> Self {
        Self {
            robot_fd: start_pose.convert(),
            time_s: 0.0,
            anchors,
        }
    }

    /// Move the robot by the body velocity command for one cycle.
    pub fn step(&mut self, cmd: &VelocityCommand, dt_s: f64) {
        let delta = Isometry2::new(
            Vector2::new(cmd.forward * dt_s, cmd.lateral * dt_s),
            cmd.angular * dt_s,
        );

        self.robot_fd *= delta;
        self.time_s += dt_s;
    }

    pub fn robot_pose(&self) -> FieldPose {
        self.robot_fd.convert()
    }
}

impl SimCamera {
    pub fn new(world: Rc<RefCell<SimWorld>>, params: CameraParams) -> Self {
        Self { world, params }
    }
}

impl ObservationSource for SimCamera {
    fn sample(&mut self, _dt_s: f64) -> ObservationSample {
        let world = self.world.borrow();

        // All anchors in view, as (id, range, pose in the body frame)
        let nearest = world
            .anchors
            .iter()
            .map(|(id, pose)| {
                let anchor_fd: Isometry2<f64> = pose.convert();
                let anchor_rb = world.robot_fd.inverse() * anchor_fd;
                (*id, anchor_rb.translation.vector.norm(), anchor_rb)
            })
            .filter(|(_, range_m, anchor_rb)| {
                let v = anchor_rb.translation.vector;
                *range_m <= self.params.max_range_m
                    && v.y.atan2(v.x).abs() <= self.params.half_fov_rad
            })
            .min_by(|a, b| {
                a.1.partial_cmp(&b.1)
                    .unwrap_or(Ordering::Equal)
                    .then(a.0.cmp(&b.0))
            });

        let (id, range_m, anchor_rb) = match nearest {
            Some(n) => n,
            None => return ObservationSample::none(),
        };

        let v = anchor_rb.translation.vector;
        let ranged = range_m <= self.params.max_ranging_m;

        trace!("SimCamera sees {} at {:.3} m", id, range_m);

        ObservationSample {
            has_target: true,
            age_s: self.params.age_s,
            quality: self.params.quality,
            forward_m_rb: if ranged { Some(v.x) } else { None },
            left_m_rb: if ranged { Some(v.y) } else { None },
            heading_rad_rb: if ranged && self.params.resolves_heading {
                Some(anchor_rb.rotation.angle())
            }
            else {
                None
            },
            anchor_id: Some(id),
            bearing_rad: v.y.atan2(v.x),
        }
    }
}

impl SimLoc {
    pub fn new(world: Rc<RefCell<SimWorld>>, params: LocParams) -> Self {
        Self {
            world,
            params,
            last_fix: None,
        }
    }
}

impl PoseEstimator for SimLoc {
    fn get_estimate(&mut self) -> PoseEstimate {
        let world = self.world.borrow();

        if !self.params.dropouts.iter().any(|d| d.contains(world.time_s)) {
            self.last_fix = Some((world.time_s, world.robot_pose()));
        }

        match self.last_fix {
            Some((fix_time_s, pose)) => PoseEstimate {
                has_pose: true,
                age_s: world.time_s - fix_time_s,
                quality: self.params.quality,
                pose,
            },
            None => PoseEstimate::none(),
        }
    }
}

impl Sim {
    /// Build the simulated equipment and a GuideCtrl using it.
    pub fn new(
        params: SimParams,
        guide_params: Params,
        anchors: HashMap<AnchorId, FieldPose>,
    ) -> Result<Self, PlanError> {
        let world = Rc::new(RefCell::new(SimWorld::new(&params.start_pose, anchors.clone())));

        let mut collabs = Collaborators::default();
        if let Some(ref cam) = params.camera {
            collabs.obs_source = Some(Box::new(SimCamera::new(world.clone(), cam.clone())));
        }
        if let Some(ref loc) = params.loc {
            collabs.pose_estimator = Some(Box::new(SimLoc::new(world.clone(), loc.clone())));
            collabs.anchor_layout = Some(Box::new(anchors));
        }

        let plan = Plan::new(guide_params, collabs)?;

        Ok(Self {
            world,
            ctrl: GuideCtrl::new(plan),
            params,
        })
    }

    /// Run a single cycle, overlaying the guidance command on the base command and moving the
    /// robot.
    pub fn step(&mut self) -> SimRecord {
        let dt_s = self.params.cycle_period_s;

        let (time_s, pose) = {
            let world = self.world.borrow();
            (world.time_s, world.robot_pose())
        };

        let (cmd, mask) = self.ctrl.get(dt_s);

        let base = VelocityCommand::new(
            self.params.base_cmd.forward,
            self.params.base_cmd.lateral,
            self.params.base_cmd.angular,
        );
        let applied_cmd = cmd.overlay(&base, &mask);

        self.world.borrow_mut().step(&applied_cmd, dt_s);

        SimRecord {
            time_s,
            pose,
            applied_cmd,
            report: *self.ctrl.report(),
        }
    }

    /// Enable guidance and run for the configured duration.
    pub fn run(&mut self) -> Vec<SimRecord> {
        let dt_s = self.params.cycle_period_s;
        let num_cycles = if dt_s > 0.0 {
            (self.params.duration_s / dt_s).round() as usize
        }
        else {
            0
        };

        self.ctrl.on_enable(dt_s);

        let records = (0..num_cycles).map(|_| self.step()).collect();

        self.ctrl.on_disable(dt_s);

        records
    }

    /// True if the last cycle's mask overrode nothing.
    pub fn idle(&self) -> bool {
        self.ctrl.report().mask == OverrideMask::none()
    }
}
