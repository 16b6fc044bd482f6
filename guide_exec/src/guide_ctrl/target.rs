//! # Target specifications and resolution
//!
//! Targets are declared in the plan as one of a closed set of kinds. Each cycle they are resolved
//! into a concrete point (or heading) in the frame of whichever solver is asking:
//!
//! - The field pose solver resolves into the Field (FD) frame, using the anchor layout for
//!   anchor-relative targets and the pose captured on enable for session-relative targets.
//! - The observation solver resolves into the Robot Body (RB) frame directly from the observed
//!   anchor, and can only resolve anchor-relative targets.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use std::convert::TryFrom;

use comms_if::eqpt::{cam::ObservationSample, AnchorId};
use nalgebra::{Isometry2, Point2, Vector2};
use serde::{Deserialize, Serialize};
use util::convert::Convert;

// Internal
use super::{feedback::AnchorLayout, state::AdaptiveState};

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Which anchor an anchor-relative target refers to.
///
/// In parameter files this is either an integer id or the string `"any"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "AnchorSelectorRepr", into = "AnchorSelectorRepr")]
pub enum AnchorSelector {
    /// Whichever anchor was seen most recently.
    Any,

    /// A specific anchor.
    Id(AnchorId),
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum AnchorSelectorRepr {
    Id(u32),
    Name(String),
}

/// Where the translation frame should be driven to.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TranslationTarget {
    /// A fixed point in the field.
    AbsolutePoint { x_m: f64, y_m: f64 },

    /// A point fixed in an anchor's frame, `forward_m` along its X axis and `left_m` along its Y.
    AnchorRelativePoint {
        anchor: AnchorSelector,
        #[serde(default)]
        forward_m: f64,
        #[serde(default)]
        left_m: f64,
    },

    /// A point fixed relative to where the translation frame was when guidance was enabled.
    SessionRelativePoint {
        #[serde(default)]
        forward_m: f64,
        #[serde(default)]
        left_m: f64,
    },
}

/// What the aim frame should point at.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AimTarget {
    /// A fixed point in the field.
    AbsolutePoint { x_m: f64, y_m: f64 },

    /// A point fixed in an anchor's frame.
    AnchorRelativePoint {
        anchor: AnchorSelector,
        #[serde(default)]
        forward_m: f64,
        #[serde(default)]
        left_m: f64,
    },

    /// An absolute field heading for the aim frame's X axis.
    AbsoluteHeading { heading_rad: f64 },
}

/// A target resolved for the rotation solver.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ResolvedAim {
    /// Aim the frame's X axis through this point.
    Point(Point2<f64>),

    /// Align the frame's X axis with this heading.
    Heading(f64),

    /// A bearing error already measured by the equipment.
    Bearing(f64),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl TryFrom<AnchorSelectorRepr> for AnchorSelector {
    type Error = String;

    fn try_from(repr: AnchorSelectorRepr) -> Result<Self, Self::Error> {
        match repr {
            AnchorSelectorRepr::Id(id) => Ok(AnchorSelector::Id(AnchorId(id))),
            AnchorSelectorRepr::Name(n) if n.eq_ignore_ascii_case("any") => Ok(AnchorSelector::Any),
            AnchorSelectorRepr::Name(n) => Err(format!(
                "expected an anchor id or \"any\", found \"{}\"", n
            )),
        }
    }
}

impl From<AnchorSelector> for AnchorSelectorRepr {
    fn from(sel: AnchorSelector) -> Self {
        match sel {
            AnchorSelector::Any => AnchorSelectorRepr::Name(String::from("any")),
            AnchorSelector::Id(id) => AnchorSelectorRepr::Id(id.0),
        }
    }
}

impl AnchorSelector {
    /// True if an observation of `observed` satisfies this selector.
    pub fn matches(&self, observed: Option<AnchorId>) -> bool {
        match self {
            AnchorSelector::Any => true,
            AnchorSelector::Id(id) => observed == Some(*id),
        }
    }

    /// The concrete anchor this selector refers to, substituting the last seen anchor for `Any`.
    pub fn concrete(&self, last_seen: Option<AnchorId>) -> Option<AnchorId> {
        match self {
            AnchorSelector::Any => last_seen,
            AnchorSelector::Id(id) => Some(*id),
        }
    }
}

impl TranslationTarget {
    /// Resolve the target into a point in the field frame.
    ///
    /// `trans_frame_fd` is the current pose of the translation frame in the field. For session
    /// relative targets the first call after enable captures it into `state`.
    pub(crate) fn resolve_field(
        &self,
        trans_frame_fd: &Isometry2<f64>,
        layout: Option<&dyn AnchorLayout>,
        state: &mut AdaptiveState,
    ) -> Option<Point2<f64>> {
        match *self {
            TranslationTarget::AbsolutePoint { x_m, y_m } => Some(Point2::new(x_m, y_m)),
            TranslationTarget::AnchorRelativePoint {
                anchor,
                forward_m,
                left_m,
            } => {
                let anchor_fd = lookup_anchor(anchor, layout, state.last_seen_anchor)?;
                Some(anchor_fd * Point2::new(forward_m, left_m))
            }
            TranslationTarget::SessionRelativePoint { forward_m, left_m } => {
                let origin_fd = *state.session_anchor.get_or_insert(*trans_frame_fd);
                Some(origin_fd * Point2::new(forward_m, left_m))
            }
        }
    }

    /// Resolve the target into a point in the robot body frame from an observation sample.
    ///
    /// Only anchor-relative targets can be resolved this way.
    pub(crate) fn resolve_observed(&self, sample: &ObservationSample) -> Option<Point2<f64>> {
        match *self {
            TranslationTarget::AnchorRelativePoint {
                anchor,
                forward_m,
                left_m,
            } => observed_anchor_point(anchor, forward_m, left_m, sample),
            TranslationTarget::AbsolutePoint { .. }
            | TranslationTarget::SessionRelativePoint { .. } => None,
        }
    }
}

impl AimTarget {
    /// Resolve the target in the field frame.
    pub(crate) fn resolve_field(
        &self,
        layout: Option<&dyn AnchorLayout>,
        last_seen: Option<AnchorId>,
    ) -> Option<ResolvedAim> {
        match *self {
            AimTarget::AbsolutePoint { x_m, y_m } => Some(ResolvedAim::Point(Point2::new(x_m, y_m))),
            AimTarget::AnchorRelativePoint {
                anchor,
                forward_m,
                left_m,
            } => {
                let anchor_fd = lookup_anchor(anchor, layout, last_seen)?;
                Some(ResolvedAim::Point(anchor_fd * Point2::new(forward_m, left_m)))
            }
            AimTarget::AbsoluteHeading { heading_rad } => Some(ResolvedAim::Heading(heading_rad)),
        }
    }

    /// Resolve the target in the robot body frame from an observation sample.
    ///
    /// If the sample carries a position the full geometry is used. Otherwise the raw bearing is
    /// only usable when both the aim frame and the target sit exactly on the anchor centre line
    /// from the robot origin, i.e. `aim_frame_is_origin` is set and the offset is exactly zero.
    pub(crate) fn resolve_observed(
        &self,
        sample: &ObservationSample,
        aim_frame_is_origin: bool,
    ) -> Option<ResolvedAim> {
        match *self {
            AimTarget::AnchorRelativePoint {
                anchor,
                forward_m,
                left_m,
            } => {
                if !anchor.matches(sample.anchor_id) {
                    return None;
                }

                if sample.position_m_rb().is_some() {
                    observed_anchor_point(anchor, forward_m, left_m, sample)
                        .map(ResolvedAim::Point)
                }
                else if aim_frame_is_origin && is_zero_offset(forward_m, left_m) {
                    Some(ResolvedAim::Bearing(sample.bearing_rad))
                }
                else {
                    None
                }
            }
            AimTarget::AbsolutePoint { .. } | AimTarget::AbsoluteHeading { .. } => None,
        }
    }
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

fn is_zero_offset(forward_m: f64, left_m: f64) -> bool {
    forward_m == 0.0 && left_m == 0.0
}

/// Find the field pose of the selected anchor in the layout.
fn lookup_anchor(
    anchor: AnchorSelector,
    layout: Option<&dyn AnchorLayout>,
    last_seen: Option<AnchorId>,
) -> Option<Isometry2<f64>> {
    let id = anchor.concrete(last_seen)?;
    let pose = layout?.lookup(id)?;

    Some(pose.convert())
}

/// Compute the offset point in the robot body frame from an observed anchor.
///
/// Needs the anchor's position, and its orientation as well unless the offset is zero.
fn observed_anchor_point(
    anchor: AnchorSelector,
    forward_m: f64,
    left_m: f64,
    sample: &ObservationSample,
) -> Option<Point2<f64>> {
    if !anchor.matches(sample.anchor_id) {
        return None;
    }

    let [fwd, left] = sample.position_m_rb()?;
    let anchor_pos_rb = Point2::new(fwd, left);

    if is_zero_offset(forward_m, left_m) {
        return Some(anchor_pos_rb);
    }

    let heading_rad = sample.heading_rad_rb?;
    let anchor_rb = Isometry2::new(Vector2::new(fwd, left), heading_rad);

    Some(anchor_rb * Point2::new(forward_m, left_m))
}

#[cfg(test)]
mod test {
    use super::*;
    use comms_if::eqpt::perloc::FieldPose;
    use std::collections::HashMap;
    use std::f64::consts::FRAC_PI_2;

    fn layout() -> HashMap<AnchorId, FieldPose> {
        let mut l = HashMap::new();
        l.insert(AnchorId(3), FieldPose::new(4.0, 2.0, FRAC_PI_2));
        l
    }

    fn observed(id: Option<u32>, pos: Option<[f64; 2]>, heading: Option<f64>) -> ObservationSample {
        ObservationSample {
            has_target: true,
            age_s: 0.0,
            quality: 1.0,
            forward_m_rb: pos.map(|p| p[0]),
            left_m_rb: pos.map(|p| p[1]),
            heading_rad_rb: heading,
            anchor_id: id.map(AnchorId),
            bearing_rad: 0.3,
        }
    }

    fn assert_point_eq(a: Point2<f64>, b: Point2<f64>) {
        assert!((a - b).norm() < 1e-9, "{} != {}", a, b);
    }

    #[test]
    fn test_anchor_selector_parse() {
        #[derive(Deserialize)]
        struct Wrap {
            a: AnchorSelector,
        }

        let w: Wrap = util::params::from_str("a = \"any\"").unwrap();
        assert_eq!(w.a, AnchorSelector::Any);
        let w: Wrap = util::params::from_str("a = 12").unwrap();
        assert_eq!(w.a, AnchorSelector::Id(AnchorId(12)));
        assert!(util::params::from_str::<Wrap>("a = \"some\"").is_err());
    }

    #[test]
    fn test_field_anchor_relative() {
        let layout = layout();
        let mut state = AdaptiveState::default();
        let target = TranslationTarget::AnchorRelativePoint {
            anchor: AnchorSelector::Id(AnchorId(3)),
            forward_m: 1.0,
            left_m: 0.5,
        };

        // Anchor faces +y, so forward is +y and left is -x
        let p = target
            .resolve_field(&Isometry2::identity(), Some(&layout), &mut state)
            .unwrap();
        assert_point_eq(p, Point2::new(3.5, 3.0));

        // Without a layout nothing resolves
        assert!(target
            .resolve_field(&Isometry2::identity(), None, &mut state)
            .is_none());

        // Unknown anchor
        let unknown = TranslationTarget::AnchorRelativePoint {
            anchor: AnchorSelector::Id(AnchorId(9)),
            forward_m: 0.0,
            left_m: 0.0,
        };
        assert!(unknown
            .resolve_field(&Isometry2::identity(), Some(&layout), &mut state)
            .is_none());
    }

    #[test]
    fn test_field_any_anchor_needs_memory() {
        let layout = layout();
        let mut state = AdaptiveState::default();
        let target = AimTarget::AnchorRelativePoint {
            anchor: AnchorSelector::Any,
            forward_m: 0.0,
            left_m: 0.0,
        };

        assert_eq!(target.resolve_field(Some(&layout), None), None);
        state.last_seen_anchor = Some(AnchorId(3));
        assert_eq!(
            target.resolve_field(Some(&layout), state.last_seen_anchor),
            Some(ResolvedAim::Point(Point2::new(4.0, 2.0)))
        );
    }

    #[test]
    fn test_session_relative_captures_once() {
        let mut state = AdaptiveState::default();
        let target = TranslationTarget::SessionRelativePoint {
            forward_m: 6.0,
            left_m: 0.0,
        };

        let first = Isometry2::new(Vector2::new(5.0, 5.0), FRAC_PI_2);
        let p = target.resolve_field(&first, None, &mut state).unwrap();
        assert_point_eq(p, Point2::new(5.0, 11.0));

        // Moving the frame doesn't move the target
        let moved = Isometry2::new(Vector2::new(-2.0, 1.0), 0.3);
        let p = target.resolve_field(&moved, None, &mut state).unwrap();
        assert_point_eq(p, Point2::new(5.0, 11.0));

        // Never from an observation
        assert!(target.resolve_observed(&observed(Some(3), Some([1.0, 0.0]), Some(0.0))).is_none());
    }

    #[test]
    fn test_observed_translation_preconditions() {
        let centre = TranslationTarget::AnchorRelativePoint {
            anchor: AnchorSelector::Id(AnchorId(3)),
            forward_m: 0.0,
            left_m: 0.0,
        };
        let offset = TranslationTarget::AnchorRelativePoint {
            anchor: AnchorSelector::Id(AnchorId(3)),
            forward_m: 1.0,
            left_m: 0.0,
        };

        // Centre needs only the position
        let s = observed(Some(3), Some([2.0, 1.0]), None);
        assert_point_eq(centre.resolve_observed(&s).unwrap(), Point2::new(2.0, 1.0));

        // An offset needs the orientation too
        assert!(offset.resolve_observed(&s).is_none());

        // Anchor facing back at the robot, 1 m in front of it is towards the robot
        let s = observed(Some(3), Some([2.0, 1.0]), Some(std::f64::consts::PI));
        assert_point_eq(offset.resolve_observed(&s).unwrap(), Point2::new(1.0, 1.0));

        // Wrong id, or no id at all
        assert!(centre.resolve_observed(&observed(Some(4), Some([2.0, 1.0]), None)).is_none());
        assert!(centre.resolve_observed(&observed(None, Some([2.0, 1.0]), None)).is_none());

        // No position
        assert!(centre.resolve_observed(&observed(Some(3), None, None)).is_none());
    }

    #[test]
    fn test_observed_bearing_fallback() {
        let centre = AimTarget::AnchorRelativePoint {
            anchor: AnchorSelector::Any,
            forward_m: 0.0,
            left_m: 0.0,
        };
        let offset = AimTarget::AnchorRelativePoint {
            anchor: AnchorSelector::Any,
            forward_m: 0.0,
            left_m: 0.2,
        };
        let bearing_only = observed(Some(3), None, None);

        assert_eq!(
            centre.resolve_observed(&bearing_only, true),
            Some(ResolvedAim::Bearing(0.3))
        );
        assert_eq!(centre.resolve_observed(&bearing_only, false), None);
        assert_eq!(offset.resolve_observed(&bearing_only, true), None);

        // With a position the offset point is used
        let ranged = observed(Some(3), Some([2.0, 0.0]), Some(0.0));
        assert_eq!(
            offset.resolve_observed(&ranged, false),
            Some(ResolvedAim::Point(Point2::new(2.0, 0.2)))
        );

        // Headings can't come from an observation
        let heading = AimTarget::AbsoluteHeading { heading_rad: 1.0 };
        assert_eq!(heading.resolve_observed(&ranged, true), None);
    }
}
