//! Commands produced by GuideCtrl

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::Serialize;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A frame-level velocity command for the robot body.
///
/// Units follow the tuning gains, typically meters/second for translation and radians/second
/// for rotation.
#[derive(Clone, Copy, Debug, Default, Serialize, PartialEq)]
pub struct VelocityCommand {
    /// Speed along the robot's forward (RB_X) axis.
    pub forward: f64,

    /// Speed along the robot's left (RB_Y) axis.
    pub lateral: f64,

    /// Turn rate about the robot's up (RB_Z) axis, positive to the left.
    pub angular: f64,
}

/// Which degrees of freedom a command actually overrides.
#[derive(Clone, Copy, Debug, Default, Serialize, PartialEq, Eq)]
pub struct OverrideMask {
    /// Forward and lateral components are overridden.
    pub translation: bool,

    /// Angular component is overridden.
    pub rotation: bool,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl VelocityCommand {
    pub fn new(forward: f64, lateral: f64, angular: f64) -> Self {
        Self {
            forward,
            lateral,
            angular,
        }
    }

    /// Merge this command over a base command, taking only the axes set in `mask` from `self`.
    pub fn overlay(&self, base: &VelocityCommand, mask: &OverrideMask) -> VelocityCommand {
        let mut out = *base;

        if mask.translation {
            out.forward = self.forward;
            out.lateral = self.lateral;
        }
        if mask.rotation {
            out.angular = self.angular;
        }

        out
    }
}

impl OverrideMask {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn all() -> Self {
        Self {
            translation: true,
            rotation: true,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_overlay_keeps_base_for_unmasked_axes() {
        let base = VelocityCommand::new(0.3, -0.2, 1.0);
        let cmd = VelocityCommand::new(0.0, 0.5, -0.4);

        let trans_only = cmd.overlay(&base, &OverrideMask {
            translation: true,
            rotation: false,
        });
        assert_eq!(trans_only, VelocityCommand::new(0.0, 0.5, 1.0));

        let rot_only = cmd.overlay(&base, &OverrideMask {
            translation: false,
            rotation: true,
        });
        assert_eq!(rot_only, VelocityCommand::new(0.3, -0.2, -0.4));

        assert_eq!(cmd.overlay(&base, &OverrideMask::none()), base);
        assert_eq!(cmd.overlay(&base, &OverrideMask::all()), cmd);
    }
}
