//! Render loop.
//!
//! Runs at display cadence, independent of detection. Each tick reads the
//! latest detection and the current selection, resolves the anchor, maps
//! it to a transform and hands it to the renderer. A tick never waits for
//! a detection: before the first result, or while no face is visible, the
//! model is drawn at the centre anchor.

use crate::register::LandmarkRegister;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tryon_core::{AdjustmentState, AnchorResolver, CoordinateMapper, RenderTransform, VariantCatalog};

/// Draws a model asset at a transform. The 3D renderer itself is external.
pub trait ModelRenderer: Send + 'static {
    fn draw(&mut self, model: &str, transform: &RenderTransform);
}

/// Selection and adjustments as last set by the controller.
#[derive(Debug, Clone, PartialEq)]
pub struct OverlayState {
    pub variant_id: String,
    pub adjustments: AdjustmentState,
}

/// What one tick draws.
#[derive(Debug, Clone, PartialEq)]
pub struct FramePlan {
    pub model: String,
    pub transform: RenderTransform,
}

pub struct Compositor<R: ModelRenderer> {
    catalog: Arc<VariantCatalog>,
    resolver: Arc<AnchorResolver>,
    mapper: CoordinateMapper,
    register: LandmarkRegister,
    overlay: watch::Receiver<OverlayState>,
    renderer: Arc<Mutex<R>>,
}

impl<R: ModelRenderer> Clone for Compositor<R> {
    fn clone(&self) -> Self {
        Self {
            catalog: Arc::clone(&self.catalog),
            resolver: Arc::clone(&self.resolver),
            mapper: self.mapper,
            register: self.register.clone(),
            overlay: self.overlay.clone(),
            renderer: Arc::clone(&self.renderer),
        }
    }
}

impl<R: ModelRenderer> Compositor<R> {
    pub fn new(
        catalog: Arc<VariantCatalog>,
        mapper: CoordinateMapper,
        register: LandmarkRegister,
        overlay: watch::Receiver<OverlayState>,
        renderer: Arc<Mutex<R>>,
    ) -> Self {
        Self {
            resolver: Arc::new(AnchorResolver::new(&catalog)),
            catalog,
            mapper,
            register,
            overlay,
            renderer,
        }
    }

    /// Compute what to draw right now. `None` only if the catalog has no
    /// model to fall back on.
    ///
    /// An unknown selection draws the fallback model at the centre anchor.
    pub fn plan(&self) -> Option<FramePlan> {
        let state = self.overlay.borrow().clone();
        let variant = self
            .catalog
            .get(&state.variant_id)
            .or_else(|| self.catalog.fallback())?;

        let landmarks = self.register.latest();
        let anchor = self.resolver.resolve(landmarks.as_deref(), &state.variant_id);
        let transform = self.mapper.map_to_transform(&anchor, &state.adjustments);

        Some(FramePlan {
            model: variant.model.clone(),
            transform,
        })
    }

    /// Draw one frame.
    pub fn tick(&self) {
        let Some(plan) = self.plan() else {
            return;
        };
        self.renderer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .draw(&plan.model, &plan.transform);
    }

    /// Tick every `period` until the task is aborted.
    pub async fn run(self, period: Duration) {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tracing::debug!(period_ms = period.as_millis() as u64, "render loop started");
        loop {
            interval.tick().await;
            self.tick();
        }
    }
}
