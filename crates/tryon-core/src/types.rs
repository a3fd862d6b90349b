use serde::{Deserialize, Serialize};

/// A facial keypoint in normalized image coordinates ([0, 1] on both axes,
/// origin top-left, y growing downward).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
    /// Relative depth, when the detector provides one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub z: Option<f32>,
}

impl Landmark {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y, z: None }
    }

    /// Distance to `other` in the image plane. Depth is ignored.
    pub fn planar_distance(&self, other: &Landmark) -> f32 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

/// One face's full landmark set, in the detector's fixed numbering.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LandmarkSet(Vec<Landmark>);

impl LandmarkSet {
    pub fn new(points: Vec<Landmark>) -> Self {
        Self(points)
    }

    pub fn get(&self, index: usize) -> Option<&Landmark> {
        self.0.get(index)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn points(&self) -> &[Landmark] {
        &self.0
    }
}

impl From<Vec<Landmark>> for LandmarkSet {
    fn from(points: Vec<Landmark>) -> Self {
        Self(points)
    }
}

/// Placement point and scale hint for an accessory, before user adjustment.
///
/// `x`/`y` share the landmark coordinate space. `scale` is dimensionless.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Anchor {
    pub x: f32,
    pub y: f32,
    pub scale: f32,
}

impl Anchor {
    /// Screen-centre anchor used whenever no usable landmarks are available.
    pub const CENTER: Anchor = Anchor {
        x: 0.5,
        y: 0.5,
        scale: 1.0,
    };
}

impl Default for Anchor {
    fn default() -> Self {
        Self::CENTER
    }
}

/// Final placement of the accessory model in overlay space.
///
/// Always derived from an [`Anchor`] and the current adjustments; never
/// stored on its own.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RenderTransform {
    pub position_x: f32,
    pub position_y: f32,
    pub position_z: f32,
    /// Rotation about the vertical axis, in radians.
    pub rotation_y: f32,
    pub scale: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_planar_distance_ignores_depth() {
        let a = Landmark { x: 0.0, y: 0.0, z: Some(5.0) };
        let b = Landmark { x: 0.3, y: 0.4, z: Some(-5.0) };
        assert!((a.planar_distance(&b) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_landmark_set_deserializes_from_plain_array() {
        let set: LandmarkSet =
            serde_json::from_str(r#"[{"x":0.1,"y":0.2},{"x":0.3,"y":0.4,"z":-0.01}]"#).unwrap();
        assert_eq!(set.len(), 2);
        assert_eq!(set.get(0), Some(&Landmark::new(0.1, 0.2)));
        assert_eq!(set.get(1).and_then(|l| l.z), Some(-0.01));
        assert!(set.get(2).is_none());
    }

    #[test]
    fn test_default_anchor_is_center() {
        assert_eq!(Anchor::default(), Anchor { x: 0.5, y: 0.5, scale: 1.0 });
    }
}
