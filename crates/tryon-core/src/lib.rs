//! tryon-core — Face-anchored accessory placement.
//!
//! Turns a face landmark set into an anchor for the selected accessory
//! variant, and maps that anchor plus the user's manual adjustments into
//! the transform handed to the model renderer. Everything here is pure and
//! deterministic; capture and detection live in other crates.

pub mod adjustment;
pub mod anchor;
pub mod mapper;
pub mod mesh;
pub mod types;
pub mod variant;

pub use adjustment::{AdjustmentLimits, AdjustmentState, UserAdjustmentState};
pub use anchor::{resolve_rule, AnchorResolver};
pub use mapper::CoordinateMapper;
pub use types::{Anchor, Landmark, LandmarkSet, RenderTransform};
pub use variant::{AccessoryVariant, AnchorRule, CatalogError, VariantCatalog};
