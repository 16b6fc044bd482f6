//! # Source arbiter
//!
//! In adaptive mode each degree of freedom (translation, rotation) independently decides whether
//! the observation or the field pose candidate should drive it, and a blend fraction ramps
//! towards the chosen source so the command changes smoothly on handoff.
//!
//! Translation prefers the observation while it is close enough to be trusted, with a hysteresis
//! band between `enter_range_m` and `exit_range_m` to prevent chattering. Rotation follows
//! translation unless `prefer_obs_for_rotation` is set.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::debug;
use serde::Serialize;
use util::maths::{clamp, lerp};

// Internal
use super::{
    cmd::OverrideMask,
    params::Gates,
    solver::Candidate,
    state::AdaptiveState,
};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Relative tolerance on the last blend step, absorbs rounding from summing `dt / duration`.
const BLEND_SNAP_TOLERANCE: f64 = 1e-9;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Per degree of freedom decision on whether to use the observation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Selection {
    pub obs_for_translation: bool,
    pub obs_for_rotation: bool,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Which source ended up driving a degree of freedom.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    Observation,
    FieldPose,

    /// Part way through a handoff.
    Blend,

    /// Nothing could drive the axis.
    None,
}

impl Default for Source {
    fn default() -> Self {
        Source::None
    }
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Update the range hysteresis flag.
///
/// The flag sets at or below `enter_range_m` and clears at or above `exit_range_m`. Without a
/// range this cycle it clears.
pub fn update_in_range(in_range: bool, range_m: Option<f64>, gates: &Gates) -> bool {
    match range_m {
        None => false,
        Some(r) if in_range => r < gates.exit_range_m,
        Some(r) => r <= gates.enter_range_m,
    }
}

/// Decide whether the observation drives translation.
pub fn select_translation(
    requested: bool,
    obs_usable: bool,
    pose_usable: bool,
    in_range: bool,
) -> bool {
    if !requested {
        return false;
    }

    match (obs_usable, pose_usable) {
        (true, false) => true,
        (true, true) => in_range,
        _ => false,
    }
}

/// Decide whether the observation drives rotation.
pub fn select_rotation(
    requested: bool,
    obs_usable: bool,
    pose_usable: bool,
    prefer_obs: bool,
    obs_for_translation: bool,
) -> bool {
    if !requested {
        return false;
    }

    if obs_usable && !pose_usable {
        return true;
    }

    if prefer_obs {
        return obs_usable;
    }

    if obs_usable && pose_usable {
        return obs_for_translation;
    }

    false
}

/// Move a blend fraction one cycle towards 1 (observation) or 0 (field pose).
///
/// With a non-positive duration the fraction jumps straight to the end. A fraction within one step
/// (plus rounding) of its end is snapped onto it, so a ramp always finishes in
/// `ceil(duration / dt)` cycles. A non-finite step leaves the fraction where it is.
pub fn step_blend(fraction: f64, towards_obs: bool, dt_s: f64, duration_s: f64) -> f64 {
    let mut step = if duration_s <= 0.0 {
        1.0
    }
    else {
        clamp(&(dt_s / duration_s), &0.0, &1.0)
    };
    if !step.is_finite() {
        step = 0.0;
    }

    let snap = step * (1.0 + BLEND_SNAP_TOLERANCE);

    let next = if towards_obs {
        if step > 0.0 && 1.0 - fraction <= snap {
            1.0
        }
        else {
            fraction + step
        }
    }
    else if step > 0.0 && fraction <= snap {
        0.0
    }
    else {
        fraction - step
    };

    clamp(&next, &0.0, &1.0)
}

/// Run one cycle of arbitration, updating the hysteresis flag in `state`.
pub fn arbitrate(
    state: &mut AdaptiveState,
    obs: &Candidate,
    pose: &Candidate,
    requested: &OverrideMask,
    gates: &Gates,
    prefer_obs_for_rotation: bool,
) -> Selection {
    let in_range = update_in_range(state.obs_in_range, obs.range_m, gates);
    if in_range != state.obs_in_range {
        debug!(
            "Observation {} range ({:?} m)",
            if in_range { "entered" } else { "left" },
            obs.range_m
        );
    }
    state.obs_in_range = in_range;

    let obs_for_translation = select_translation(
        requested.translation,
        obs.usable_for_translation(),
        pose.usable_for_translation(),
        in_range,
    );
    let obs_for_rotation = select_rotation(
        requested.rotation,
        obs.usable_for_rotation(),
        pose.usable_for_rotation(),
        prefer_obs_for_rotation,
        obs_for_translation,
    );

    Selection {
        obs_for_translation,
        obs_for_rotation,
    }
}

/// Step both blend fractions towards the selection.
///
/// With a ramp this is called after the cycle's command has been composed, so the first cycle
/// after a change of selection still outputs the previous source's command. Without one it is
/// called before composing and the command switches on that cycle.
pub fn advance_blends(state: &mut AdaptiveState, selection: &Selection, dt_s: f64, gates: &Gates) {
    state.translation_blend = step_blend(
        state.translation_blend,
        selection.obs_for_translation,
        dt_s,
        gates.blend_duration_s,
    );
    state.rotation_blend = step_blend(
        state.rotation_blend,
        selection.obs_for_rotation,
        dt_s,
        gates.blend_duration_s,
    );
}

/// Combine the two candidates' values for one degree of freedom.
///
/// If both are usable they are interpolated by `fraction` (0 is all field pose, 1 is all
/// observation), if only one is usable it is used as is. Returns `None` if neither is usable.
pub fn compose<T>(
    obs: Option<T>,
    pose: Option<T>,
    fraction: f64,
    mix: impl Fn(T, T, f64) -> T,
) -> Option<(T, Source)> {
    match (obs, pose) {
        (Some(o), Some(p)) => {
            let source = if fraction <= 0.0 {
                Source::FieldPose
            }
            else if fraction >= 1.0 {
                Source::Observation
            }
            else {
                Source::Blend
            };

            Some((mix(p, o, fraction), source))
        }
        (Some(o), None) => Some((o, Source::Observation)),
        (None, Some(p)) => Some((p, Source::FieldPose)),
        (None, None) => None,
    }
}

/// Mix function for translation demands, `(forward, lateral)`.
pub fn mix_translation(pose: (f64, f64), obs: (f64, f64), fraction: f64) -> (f64, f64) {
    (lerp(pose.0, obs.0, fraction), lerp(pose.1, obs.1, fraction))
}

/// Mix function for rotation demands.
pub fn mix_rotation(pose: f64, obs: f64, fraction: f64) -> f64 {
    lerp(pose, obs, fraction)
}

#[cfg(test)]
mod test {
    use super::*;

    fn gates() -> Gates {
        Gates {
            enter_range_m: 1.0,
            exit_range_m: 2.0,
            blend_duration_s: 1.0,
        }
    }

    fn cand(range_m: Option<f64>, trans: bool, rot: bool) -> Candidate {
        Candidate {
            valid: true,
            can_translate: trans,
            can_rotate: rot,
            range_m,
            ..Candidate::default()
        }
    }

    #[test]
    fn test_hysteresis_band() {
        let g = gates();

        // Outside, entering requires reaching enter range
        assert!(!update_in_range(false, Some(1.5), &g));
        assert!(update_in_range(false, Some(1.0), &g));

        // Inside, leaving requires reaching exit range
        assert!(update_in_range(true, Some(1.5), &g));
        assert!(update_in_range(true, Some(1.99), &g));
        assert!(!update_in_range(true, Some(2.0), &g));

        // Losing range always clears
        assert!(!update_in_range(true, None, &g));
    }

    #[test]
    fn test_hysteresis_no_chatter_inside_band() {
        let g = gates();
        let eps = 0.01;
        let mut flag = false;
        let mut toggles = 0;

        // Oscillate inside the band, crossing each threshold exactly once in the middle
        let mut ranges = vec![];
        for i in 0..20 {
            ranges.push(if i % 2 == 0 { g.enter_range_m + eps } else { g.exit_range_m - eps });
        }
        ranges.push(g.enter_range_m - eps);
        for i in 0..20 {
            ranges.push(if i % 2 == 0 { g.enter_range_m + eps } else { g.exit_range_m - eps });
        }
        ranges.push(g.exit_range_m + eps);
        for i in 0..20 {
            ranges.push(if i % 2 == 0 { g.enter_range_m + eps } else { g.exit_range_m - eps });
        }

        for r in ranges {
            let next = update_in_range(flag, Some(r), &g);
            if next != flag {
                toggles += 1;
            }
            flag = next;
        }

        assert_eq!(toggles, 2);
        assert!(!flag);
    }

    #[test]
    fn test_select_translation() {
        assert!(!select_translation(false, true, true, true));
        assert!(select_translation(true, true, false, false));
        assert!(select_translation(true, true, true, true));
        assert!(!select_translation(true, true, true, false));
        assert!(!select_translation(true, false, true, true));
        assert!(!select_translation(true, false, false, true));
    }

    #[test]
    fn test_select_rotation() {
        assert!(!select_rotation(false, true, false, true, true));
        assert!(select_rotation(true, true, false, false, false));

        // Preferred observation follows its own usability
        assert!(select_rotation(true, true, true, true, false));
        assert!(!select_rotation(true, false, true, true, true));

        // Otherwise mirror translation when both are usable
        assert!(select_rotation(true, true, true, false, true));
        assert!(!select_rotation(true, true, true, false, false));
        assert!(!select_rotation(true, false, true, false, true));
    }

    /// Step a ramp up from 0 then back down from 1, checking it is monotonic and ends exactly on
    /// each end within `ceil(duration / dt)` cycles.
    fn check_ramp(dt: f64, duration: f64) {
        let ticks = (duration / dt).ceil() as usize;

        let mut f = 0.0;
        for _ in 0..ticks {
            let next = step_blend(f, true, dt, duration);
            assert!(next >= f, "dt {} duration {}", dt, duration);
            f = next;
        }
        assert_eq!(f, 1.0, "dt {} duration {}", dt, duration);

        for _ in 0..ticks {
            let next = step_blend(f, false, dt, duration);
            assert!(next <= f, "dt {} duration {}", dt, duration);
            f = next;
        }
        assert_eq!(f, 0.0, "dt {} duration {}", dt, duration);
    }

    #[test]
    fn test_blend_monotonic_and_exact() {
        check_ramp(0.25, 1.0);
        check_ramp(0.02, 0.5);

        // Uneven steps overshoot and are clamped onto the end
        check_ramp(0.3, 1.0);

        // Steps not exactly representable accumulate rounding error
        check_ramp(0.1, 1.0);
        check_ramp(0.05, 0.5);
        check_ramp(0.01, 0.3);
        check_ramp(0.05, 1.0);
    }

    #[test]
    fn test_blend_does_not_finish_early() {
        let dt: f64 = 0.1;
        let duration: f64 = 1.0;

        let mut f = 0.0;
        for _ in 0..9 {
            f = step_blend(f, true, dt, duration);
        }
        assert!(f < 1.0);
        assert!((f - 0.9).abs() < 1e-9);
    }

    #[test]
    fn test_blend_zero_duration_jumps() {
        assert_eq!(step_blend(0.0, true, 0.02, 0.0), 1.0);
        assert_eq!(step_blend(1.0, false, 0.02, -1.0), 0.0);
    }

    #[test]
    fn test_blend_non_finite_step_holds() {
        assert_eq!(step_blend(0.4, true, std::f64::NAN, 1.0), 0.4);
        assert_eq!(step_blend(0.4, false, std::f64::NAN, 1.0), 0.4);
        assert_eq!(step_blend(0.4, true, 0.1, std::f64::NAN), 0.4);

        // Negative time does not move the ramp backwards
        assert_eq!(step_blend(0.4, true, -0.1, 1.0), 0.4);
    }

    #[test]
    fn test_arbitrate_updates_state() {
        let mut state = AdaptiveState::default();
        let requested = OverrideMask::all();
        let g = gates();

        let obs = cand(Some(0.5), true, true);
        let pose = cand(None, true, true);

        let sel = arbitrate(&mut state, &obs, &pose, &requested, &g, false);
        assert!(state.obs_in_range);
        assert_eq!(sel, Selection {
            obs_for_translation: true,
            obs_for_rotation: true
        });
        assert_eq!(state.translation_blend, 0.0);

        advance_blends(&mut state, &sel, 0.5, &g);
        assert_eq!(state.translation_blend, 0.5);
        assert_eq!(state.rotation_blend, 0.5);

        // Observation loses its range, hysteresis is forced out and the blends ramp back
        let obs = cand(None, false, true);
        let sel = arbitrate(&mut state, &obs, &pose, &requested, &g, false);
        assert!(!state.obs_in_range);
        assert!(!sel.obs_for_translation);
        assert!(!sel.obs_for_rotation);

        advance_blends(&mut state, &sel, 0.5, &g);
        assert_eq!(state.translation_blend, 0.0);
        assert_eq!(state.rotation_blend, 0.0);
    }

    #[test]
    fn test_compose() {
        let mix = |p: f64, o: f64, f: f64| mix_rotation(p, o, f);

        assert_eq!(compose(Some(1.0), Some(-1.0), 0.0, mix), Some((-1.0, Source::FieldPose)));
        assert_eq!(compose(Some(1.0), Some(-1.0), 1.0, mix), Some((1.0, Source::Observation)));
        assert_eq!(compose(Some(1.0), Some(-1.0), 0.25, mix), Some((-0.5, Source::Blend)));

        // Single candidates are used directly whatever the fraction
        assert_eq!(compose(Some(1.0), None, 0.0, mix), Some((1.0, Source::Observation)));
        assert_eq!(compose(None, Some(-1.0), 1.0, mix), Some((-1.0, Source::FieldPose)));
        assert_eq!(compose(None::<f64>, None, 0.5, mix), None);

        let t = compose(Some((1.0, 0.0)), Some((0.0, 1.0)), 0.5, mix_translation);
        assert_eq!(t, Some(((0.5, 0.5), Source::Blend)));
    }
}
