use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tryon_core::{AnchorResolver, CoordinateMapper, LandmarkSet, RenderTransform, UserAdjustmentState};
use tryon_hw::{Camera, CameraProvider};
use tryon_overlay::{AROverlayController, ModelRenderer, OverlayConfig, ReplayDetector, TrackingSession};

#[derive(Parser)]
#[command(name = "tryon", about = "Face-anchored accessory try-on overlay")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the accessory variants in the catalog
    Variants,
    /// List V4L2 capture devices
    Devices,
    /// Compute the render transform for one landmark set
    Resolve {
        /// Variant id (e.g., "aviator")
        #[arg(short, long)]
        variant: String,
        /// JSON file holding one landmark array; omit for "no face"
        #[arg(short, long)]
        landmarks: Option<PathBuf>,
        /// User scale multiplier
        #[arg(long, default_value_t = 1.0)]
        scale: f32,
        /// Rotation about the vertical axis, in degrees
        #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
        rotate: f32,
        /// Vertical offset in overlay units
        #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
        vertical: f32,
    },
    /// Run the overlay against the camera, logging each drawn frame
    Preview {
        /// Variant id to show
        #[arg(short, long, conflicts_with = "category")]
        variant: Option<String>,
        /// Product category to preview (e.g., "glasses")
        #[arg(short, long)]
        category: Option<String>,
        /// JSON-lines landmark recording replayed as detector output
        #[arg(short, long)]
        landmarks: Option<PathBuf>,
        /// Stop after this many seconds (default: run until Ctrl-C)
        #[arg(short, long)]
        seconds: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = OverlayConfig::from_env();

    match cli.command {
        Commands::Variants => {
            let catalog = config.load_catalog().context("failed to load variant catalog")?;
            let variants: Vec<_> = catalog.iter().collect();
            println!("{}", serde_json::to_string_pretty(&variants)?);
        }
        Commands::Devices => {
            let devices = Camera::list_devices();
            if devices.is_empty() {
                tracing::info!("no V4L2 capture devices found");
            }
            println!("{}", serde_json::to_string_pretty(&devices)?);
        }
        Commands::Resolve {
            variant,
            landmarks,
            scale,
            rotate,
            vertical,
        } => {
            let catalog = config.load_catalog().context("failed to load variant catalog")?;
            if catalog.get(&variant).is_none() {
                tracing::warn!(variant = %variant, "unknown variant; resolving to centre");
            }
            let landmarks = landmarks.as_deref().map(read_landmarks).transpose()?;

            let anchor = AnchorResolver::new(&catalog).resolve(landmarks.as_ref(), &variant);
            let controller_settings = config.controller_settings();
            let mut adjustments = UserAdjustmentState::new(controller_settings.limits);
            adjustments.set_scale(scale);
            adjustments.set_rotation(rotate);
            adjustments.set_vertical_offset(vertical);
            let transform = CoordinateMapper::new(controller_settings.projection_scale)
                .map_to_transform(&anchor, &adjustments.current());

            println!(
                "{}",
                serde_json::to_string_pretty(&serde_json::json!({
                    "variant": variant,
                    "anchor": anchor,
                    "adjustments": adjustments.current(),
                    "transform": transform,
                }))?
            );
        }
        Commands::Preview {
            variant,
            category,
            landmarks,
            seconds,
        } => {
            preview(&config, variant, category, landmarks, seconds).await?;
        }
    }

    Ok(())
}

async fn preview(
    config: &OverlayConfig,
    variant: Option<String>,
    category: Option<String>,
    landmarks: Option<PathBuf>,
    seconds: Option<u64>,
) -> Result<()> {
    let catalog = Arc::new(config.load_catalog().context("failed to load variant catalog")?);
    let detector = match landmarks {
        Some(path) => ReplayDetector::load(&path)?,
        None => {
            println!("No landmark recording given; the overlay stays centred");
            ReplayDetector::new(Vec::new())
        }
    };

    let session = TrackingSession::spawn(
        CameraProvider::new(config.camera_device.clone()),
        detector,
        config.session_settings(),
    );
    let renderer = LogRenderer::default();
    let drawn = Arc::clone(&renderer.drawn);
    let mut controller = AROverlayController::new(catalog, session, renderer, config.controller_settings());

    if let Some(id) = variant {
        controller.select_variant(&id);
    }
    if let Some(category) = category {
        if !controller.select_category(&category) {
            bail!("no variant for category {category:?}");
        }
    }

    if let Err(e) = controller.open().await {
        eprintln!("{}", e.user_message());
        return Err(e).context("failed to open try-on overlay");
    }
    println!(
        "Previewing {} on {} (Ctrl-C to stop)",
        controller.selected_variant(),
        config.camera_device
    );

    let limit = async {
        match seconds {
            Some(s) => tokio::time::sleep(Duration::from_secs(s)).await,
            None => std::future::pending().await,
        }
    };
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = limit => {}
    }

    controller.close().await;
    println!("Drew {} frames", drawn.load(Ordering::Relaxed));
    Ok(())
}

fn read_landmarks(path: &Path) -> Result<LandmarkSet> {
    let src = std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&src).with_context(|| format!("failed to parse landmarks in {}", path.display()))
}

/// Renderer stand-in that logs each draw call.
#[derive(Default)]
struct LogRenderer {
    drawn: Arc<AtomicU64>,
}

impl ModelRenderer for LogRenderer {
    fn draw(&mut self, model: &str, transform: &RenderTransform) {
        let n = self.drawn.fetch_add(1, Ordering::Relaxed) + 1;
        tracing::debug!(
            frame = n,
            model,
            x = transform.position_x,
            y = transform.position_y,
            rotation = transform.rotation_y,
            scale = transform.scale,
            "draw"
        );
    }
}
