//! Face mesh landmark numbering used by the built-in anchor rules.
//!
//! Indices follow the 468-point face mesh topology (478 with iris
//! refinement). Left/right are from the subject's point of view in the
//! unmirrored camera image.

/// Number of landmarks in the base face mesh.
pub const BASE_LANDMARK_COUNT: usize = 468;

/// Number of landmarks with refined iris points enabled.
pub const REFINED_LANDMARK_COUNT: usize = 478;

/// Outer corner of the left eye.
pub const LEFT_EYE_OUTER: usize = 33;

/// Outer corner of the right eye.
pub const RIGHT_EYE_OUTER: usize = 263;

/// Left face contour point level with the ear.
pub const LEFT_EAR: usize = 234;

/// Right face contour point level with the ear.
pub const RIGHT_EAR: usize = 454;

/// Top of the forehead, on the face midline.
pub const FOREHEAD: usize = 10;
