//! Manual scale/rotation/offset overrides set from the UI.

use serde::{Deserialize, Serialize};

/// The user's current overrides.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AdjustmentState {
    /// Multiplier applied on top of the anchor-derived scale.
    pub user_scale: f32,
    pub rotation_y_degrees: f32,
    /// Added to the projected vertical position, in overlay units.
    pub vertical_offset: f32,
}

impl Default for AdjustmentState {
    fn default() -> Self {
        Self {
            user_scale: 1.0,
            rotation_y_degrees: 0.0,
            vertical_offset: 0.0,
        }
    }
}

/// Bounds applied by the setters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdjustmentLimits {
    pub min_scale: f32,
    pub max_scale: f32,
    /// Rotation is clamped to `[-max_rotation_degrees, max_rotation_degrees]`.
    pub max_rotation_degrees: f32,
    /// Vertical offset is clamped to `[-max_vertical_offset, max_vertical_offset]`.
    pub max_vertical_offset: f32,
}

impl Default for AdjustmentLimits {
    fn default() -> Self {
        Self {
            min_scale: 0.3,
            max_scale: 3.0,
            max_rotation_degrees: 180.0,
            max_vertical_offset: 1.0,
        }
    }
}

/// Bounded, resettable holder for [`AdjustmentState`].
///
/// Each setter clamps its value and returns what was applied. Non-finite
/// input is ignored and the current value returned.
#[derive(Debug, Clone)]
pub struct UserAdjustmentState {
    state: AdjustmentState,
    limits: AdjustmentLimits,
}

impl UserAdjustmentState {
    pub fn new(limits: AdjustmentLimits) -> Self {
        Self {
            state: AdjustmentState::default(),
            limits,
        }
    }

    pub fn current(&self) -> AdjustmentState {
        self.state
    }

    pub fn limits(&self) -> AdjustmentLimits {
        self.limits
    }

    pub fn set_scale(&mut self, scale: f32) -> f32 {
        if scale.is_finite() {
            self.state.user_scale = scale.clamp(self.limits.min_scale, self.limits.max_scale);
        }
        self.state.user_scale
    }

    pub fn set_rotation(&mut self, degrees: f32) -> f32 {
        if degrees.is_finite() {
            let max = self.limits.max_rotation_degrees;
            self.state.rotation_y_degrees = degrees.clamp(-max, max);
        }
        self.state.rotation_y_degrees
    }

    pub fn set_vertical_offset(&mut self, offset: f32) -> f32 {
        if offset.is_finite() {
            let max = self.limits.max_vertical_offset;
            self.state.vertical_offset = offset.clamp(-max, max);
        }
        self.state.vertical_offset
    }

    /// Back to `{1.0, 0, 0}`. Called on every variant switch.
    pub fn reset(&mut self) {
        self.state = AdjustmentState::default();
    }
}

impl Default for UserAdjustmentState {
    fn default() -> Self {
        Self::new(AdjustmentLimits::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let adj = UserAdjustmentState::default();
        assert_eq!(
            adj.current(),
            AdjustmentState { user_scale: 1.0, rotation_y_degrees: 0.0, vertical_offset: 0.0 }
        );
    }

    #[test]
    fn test_setters_clamp_independently() {
        let mut adj = UserAdjustmentState::default();
        assert_eq!(adj.set_scale(10.0), 3.0);
        assert_eq!(adj.set_scale(0.01), 0.3);
        assert_eq!(adj.set_rotation(270.0), 180.0);
        assert_eq!(adj.set_rotation(-200.0), -180.0);
        assert_eq!(adj.set_vertical_offset(1.5), 1.0);
        assert_eq!(adj.set_vertical_offset(-0.25), -0.25);
        assert_eq!(
            adj.current(),
            AdjustmentState { user_scale: 0.3, rotation_y_degrees: -180.0, vertical_offset: -0.25 }
        );
    }

    #[test]
    fn test_non_finite_input_ignored() {
        let mut adj = UserAdjustmentState::default();
        adj.set_scale(2.0);
        assert_eq!(adj.set_scale(f32::NAN), 2.0);
        assert_eq!(adj.set_rotation(f32::INFINITY), 0.0);
        assert_eq!(adj.set_vertical_offset(f32::NEG_INFINITY), 0.0);
    }

    #[test]
    fn test_custom_limits() {
        let mut adj = UserAdjustmentState::new(AdjustmentLimits {
            min_scale: 0.5,
            max_scale: 1.5,
            ..AdjustmentLimits::default()
        });
        assert_eq!(adj.set_scale(2.0), 1.5);
        assert_eq!(adj.set_scale(0.1), 0.5);
    }

    #[test]
    fn test_reset_restores_defaults() {
        let mut adj = UserAdjustmentState::default();
        adj.set_scale(2.5);
        adj.set_rotation(45.0);
        adj.set_vertical_offset(0.4);
        adj.reset();
        assert_eq!(adj.current(), AdjustmentState::default());
    }
}
