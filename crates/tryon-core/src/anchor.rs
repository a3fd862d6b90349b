//! Landmark set → accessory anchor.
//!
//! Resolution never fails. A missing face, a landmark set too short for the
//! rule, or a variant id outside the catalog all resolve to
//! [`Anchor::CENTER`], so the overlay degrades to a centred model instead of
//! disappearing.

use crate::types::{Anchor, LandmarkSet};
use crate::variant::{AnchorRule, VariantCatalog};
use std::collections::HashMap;

/// Resolves anchors by variant id against a fixed catalog.
#[derive(Debug, Clone)]
pub struct AnchorResolver {
    rules: HashMap<String, AnchorRule>,
}

impl AnchorResolver {
    pub fn new(catalog: &VariantCatalog) -> Self {
        Self {
            rules: catalog
                .iter()
                .map(|v| (v.id.clone(), v.anchor))
                .collect(),
        }
    }

    /// Anchor for `variant_id` given the latest detection, if any.
    pub fn resolve(&self, landmarks: Option<&LandmarkSet>, variant_id: &str) -> Anchor {
        match self.rules.get(variant_id) {
            Some(rule) => resolve_rule(landmarks, rule),
            None => Anchor::CENTER,
        }
    }
}

/// Apply a single anchor rule to a landmark set.
pub fn resolve_rule(landmarks: Option<&LandmarkSet>, rule: &AnchorRule) -> Anchor {
    let Some(set) = landmarks.filter(|s| !s.is_empty()) else {
        return Anchor::CENTER;
    };

    let anchor = match *rule {
        AnchorRule::Eyewear {
            left_eye,
            right_eye,
            scale_factor,
        } => set.get(left_eye).zip(set.get(right_eye)).map(|(l, r)| Anchor {
            x: (l.x + r.x) / 2.0,
            y: (l.y + r.y) / 2.0,
            scale: l.planar_distance(r) * scale_factor,
        }),
        AnchorRule::Ear { ear, drop, scale } => set.get(ear).map(|e| Anchor {
            x: e.x,
            // image y grows downward
            y: e.y + drop,
            scale,
        }),
        AnchorRule::Headwear {
            left_ear,
            right_ear,
            forehead,
            lift,
            scale_factor,
        } => match (set.get(left_ear), set.get(right_ear), set.get(forehead)) {
            (Some(l), Some(r), Some(f)) => Some(Anchor {
                x: (l.x + r.x) / 2.0,
                y: f.y - lift,
                scale: l.planar_distance(r) * scale_factor,
            }),
            _ => None,
        },
    };

    anchor.unwrap_or_else(|| {
        tracing::trace!(points = set.len(), ?rule, "landmark set too short for anchor rule");
        Anchor::CENTER
    })
}
