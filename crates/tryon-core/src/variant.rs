//! Accessory variant catalog.
//!
//! Each variant names a model asset and the rule that anchors it to the
//! face. The built-in catalog is embedded at compile time from
//! `contrib/variants/*.toml`; a deployment may replace it with a directory
//! of files in the same format.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use thiserror::Error;

const VARIANT_AVIATOR: &str = include_str!("../../../contrib/variants/aviator.toml");
const VARIANT_EARRING: &str = include_str!("../../../contrib/variants/earring.toml");
const VARIANT_HAT: &str = include_str!("../../../contrib/variants/hat.toml");

const BUILTIN_SOURCES: [(&str, &str); 3] = [
    ("aviator.toml", VARIANT_AVIATOR),
    ("earring.toml", VARIANT_EARRING),
    ("hat.toml", VARIANT_HAT),
];

static BUILTIN: OnceLock<Result<VariantCatalog, String>> = OnceLock::new();

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("bad variant definition in {origin}: {source}")]
    Parse {
        origin: String,
        #[source]
        source: toml::de::Error,
    },
    #[error("variant catalog is empty")]
    Empty,
    #[error("duplicate variant id: {0}")]
    DuplicateId(String),
    #[error("built-in variant catalog is invalid: {0}")]
    Builtin(String),
}

/// How a variant's anchor is derived from the landmark set.
///
/// Offsets are in normalized image units; `scale_factor` multiplies a
/// measured landmark distance. The numbers are empirically tuned per model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AnchorRule {
    /// Midpoint of the outer eye corners, scaled by their distance.
    Eyewear {
        left_eye: usize,
        right_eye: usize,
        scale_factor: f32,
    },
    /// A single ear point, moved down by `drop`, at a fixed scale.
    Ear { ear: usize, drop: f32, scale: f32 },
    /// Between the ears horizontally, `lift` above the forehead, scaled by
    /// the ear-to-ear distance.
    Headwear {
        left_ear: usize,
        right_ear: usize,
        forehead: usize,
        lift: f32,
        scale_factor: f32,
    },
}

/// A selectable accessory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessoryVariant {
    pub id: String,
    pub display_name: String,
    /// Asset reference handed to the renderer.
    pub model: String,
    /// Product category this variant previews (e.g. "glasses").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    pub anchor: AnchorRule,
}

/// On-disk layout of one variant file.
#[derive(Deserialize)]
struct VariantFile {
    variant: VariantHeader,
    anchor: AnchorRule,
}

#[derive(Deserialize)]
struct VariantHeader {
    id: String,
    display_name: String,
    model: String,
    #[serde(default)]
    category: Option<String>,
}

impl AccessoryVariant {
    /// Parse a single variant definition. `origin` only labels errors.
    pub fn from_toml(src: &str, origin: &str) -> Result<Self, CatalogError> {
        let file: VariantFile = toml::from_str(src).map_err(|source| CatalogError::Parse {
            origin: origin.to_string(),
            source,
        })?;
        Ok(Self {
            id: file.variant.id,
            display_name: file.variant.display_name,
            model: file.variant.model,
            category: file.variant.category,
            anchor: file.anchor,
        })
    }
}

/// The fixed set of variants known to a session.
#[derive(Debug, Clone)]
pub struct VariantCatalog {
    variants: Vec<AccessoryVariant>,
}

impl VariantCatalog {
    /// Build a catalog, rejecting empty sets and duplicate ids.
    pub fn new(variants: Vec<AccessoryVariant>) -> Result<Self, CatalogError> {
        if variants.is_empty() {
            return Err(CatalogError::Empty);
        }
        let mut seen = HashSet::new();
        for v in &variants {
            if !seen.insert(v.id.as_str()) {
                return Err(CatalogError::DuplicateId(v.id.clone()));
            }
        }
        Ok(Self { variants })
    }

    /// The catalog compiled into the binary. Parsed once; a bad embedded
    /// file fails every call instead of yielding a partial catalog.
    pub fn builtin() -> Result<&'static VariantCatalog, CatalogError> {
        BUILTIN
            .get_or_init(|| {
                Self::from_sources(&BUILTIN_SOURCES).map_err(|e| {
                    tracing::error!(error = %e, "built-in variant catalog is invalid");
                    e.to_string()
                })
            })
            .as_ref()
            .map_err(|e| CatalogError::Builtin(e.clone()))
    }

    /// Build a catalog from `(origin, toml)` pairs.
    pub fn from_sources(sources: &[(&str, &str)]) -> Result<Self, CatalogError> {
        let variants = sources
            .iter()
            .map(|(origin, src)| AccessoryVariant::from_toml(src, origin))
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(variants)
    }

    /// Load every `*.toml` file in `dir`, ordered by file name.
    pub fn load_dir(dir: &Path) -> Result<Self, CatalogError> {
        let io_err = |source| CatalogError::Io {
            path: dir.to_path_buf(),
            source,
        };
        let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)
            .map_err(io_err)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.extension().is_some_and(|ext| ext == "toml"))
            .collect();
        paths.sort();

        let mut variants = Vec::with_capacity(paths.len());
        for path in paths {
            let src = std::fs::read_to_string(&path).map_err(|source| CatalogError::Io {
                path: path.clone(),
                source,
            })?;
            variants.push(AccessoryVariant::from_toml(&src, &path.display().to_string())?);
        }

        let catalog = Self::new(variants)?;
        tracing::info!(dir = %dir.display(), count = catalog.len(), "loaded variant catalog");
        Ok(catalog)
    }

    pub fn get(&self, id: &str) -> Option<&AccessoryVariant> {
        self.variants.iter().find(|v| v.id == id)
    }

    /// First variant whose category matches, case-insensitively.
    pub fn for_category(&self, category: &str) -> Option<&AccessoryVariant> {
        self.variants.iter().find(|v| {
            v.category
                .as_deref()
                .is_some_and(|c| c.eq_ignore_ascii_case(category))
        })
    }

    /// Variant drawn when the selection is not in the catalog.
    pub fn fallback(&self) -> Option<&AccessoryVariant> {
        self.variants.first()
    }

    pub fn iter(&self) -> impl Iterator<Item = &AccessoryVariant> {
        self.variants.iter()
    }

    pub fn len(&self) -> usize {
        self.variants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variants.is_empty()
    }
}
