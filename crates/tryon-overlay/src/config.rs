use crate::controller::ControllerSettings;
use crate::detector::DetectorOptions;
use crate::session::SessionSettings;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tryon_core::{mapper, AdjustmentLimits, CatalogError, VariantCatalog};
use tryon_hw::CaptureConstraints;

const DEFAULT_RENDER_FPS: u32 = 60;

/// Overlay configuration, loaded from environment variables.
#[derive(Debug, Clone, PartialEq)]
pub struct OverlayConfig {
    /// V4L2 device path (default: /dev/video0).
    pub camera_device: String,
    pub capture_width: u32,
    pub capture_height: u32,
    pub min_detection_confidence: f32,
    pub min_tracking_confidence: f32,
    /// Render loop rate.
    pub render_fps: u32,
    /// Projection constant K mapping normalized coordinates to overlay space.
    pub projection_scale: f32,
    pub min_user_scale: f32,
    pub max_user_scale: f32,
    /// Directory of variant TOML files replacing the built-in catalog.
    pub variant_dir: Option<PathBuf>,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

impl OverlayConfig {
    /// Load configuration from `TRYON_*` environment variables with defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through `lookup`; unset or unparsable values fall
    /// back to their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let constraints = CaptureConstraints::default();
        let detector = DetectorOptions::default();
        let limits = AdjustmentLimits::default();

        Self {
            camera_device: lookup("TRYON_CAMERA_DEVICE").unwrap_or_else(|| "/dev/video0".to_string()),
            capture_width: parsed(&lookup, "TRYON_CAPTURE_WIDTH", constraints.width),
            capture_height: parsed(&lookup, "TRYON_CAPTURE_HEIGHT", constraints.height),
            min_detection_confidence: finite(
                &lookup,
                "TRYON_MIN_DETECTION_CONFIDENCE",
                detector.min_detection_confidence,
            ),
            min_tracking_confidence: finite(
                &lookup,
                "TRYON_MIN_TRACKING_CONFIDENCE",
                detector.min_tracking_confidence,
            ),
            render_fps: parsed(&lookup, "TRYON_RENDER_FPS", DEFAULT_RENDER_FPS),
            projection_scale: finite(
                &lookup,
                "TRYON_PROJECTION_SCALE",
                mapper::DEFAULT_PROJECTION_SCALE,
            ),
            min_user_scale: finite(&lookup, "TRYON_MIN_USER_SCALE", limits.min_scale),
            max_user_scale: finite(&lookup, "TRYON_MAX_USER_SCALE", limits.max_scale),
            variant_dir: lookup("TRYON_VARIANT_DIR")
                .filter(|v| !v.is_empty())
                .map(PathBuf::from),
        }
    }

    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            constraints: CaptureConstraints {
                width: self.capture_width,
                height: self.capture_height,
            },
            detector: DetectorOptions::single_face(
                self.min_detection_confidence,
                self.min_tracking_confidence,
            ),
        }
    }

    pub fn controller_settings(&self) -> ControllerSettings {
        // An inverted range would make every clamp panic.
        let (min_scale, max_scale) = if self.min_user_scale <= self.max_user_scale {
            (self.min_user_scale, self.max_user_scale)
        } else {
            (self.max_user_scale, self.min_user_scale)
        };
        ControllerSettings {
            render_interval: self.render_interval(),
            projection_scale: self.projection_scale,
            limits: AdjustmentLimits {
                min_scale,
                max_scale,
                ..AdjustmentLimits::default()
            },
            ..ControllerSettings::default()
        }
    }

    /// Time between render ticks. A zero rate falls back to the default.
    pub fn render_interval(&self) -> Duration {
        let fps = if self.render_fps == 0 {
            DEFAULT_RENDER_FPS
        } else {
            self.render_fps
        };
        Duration::from_secs(1) / fps
    }

    /// The variant catalog: `variant_dir` if set, the built-in one otherwise.
    pub fn load_catalog(&self) -> Result<VariantCatalog, CatalogError> {
        match &self.variant_dir {
            Some(dir) => VariantCatalog::load_dir(dir),
            None => VariantCatalog::builtin().cloned(),
        }
    }
}

fn parsed<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T {
    lookup(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn finite(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: f32) -> f32 {
    Some(parsed(lookup, key, default))
        .filter(|v| v.is_finite())
        .unwrap_or(default)
}
