//! Anchor + adjustments → render transform.
//!
//! The camera feed is shown mirrored while the overlay is not, so the
//! horizontal anchor component is inverted before projection. Both axes map
//! the normalized [0, 1] range onto `[-K/2, K/2]` around the overlay centre,
//! with K the projection scale.

use crate::adjustment::AdjustmentState;
use crate::types::{Anchor, RenderTransform};

/// Projection constant matching the renderer's visible extent.
pub const DEFAULT_PROJECTION_SCALE: f32 = 1.5;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoordinateMapper {
    projection_scale: f32,
}

impl CoordinateMapper {
    pub fn new(projection_scale: f32) -> Self {
        Self { projection_scale }
    }

    pub fn projection_scale(&self) -> f32 {
        self.projection_scale
    }

    /// Compute the transform for this anchor and these adjustments.
    ///
    /// User scale multiplies the anchor scale; rotation comes only from the
    /// user. Nothing is cached between calls.
    pub fn map_to_transform(&self, anchor: &Anchor, adjustments: &AdjustmentState) -> RenderTransform {
        let k = self.projection_scale;
        RenderTransform {
            position_x: (0.5 - anchor.x) * k,
            position_y: (0.5 - anchor.y) * k + adjustments.vertical_offset,
            position_z: 0.0,
            rotation_y: adjustments.rotation_y_degrees.to_radians(),
            scale: anchor.scale * adjustments.user_scale,
        }
    }
}

impl Default for CoordinateMapper {
    fn default() -> Self {
        Self::new(DEFAULT_PROJECTION_SCALE)
    }
}
