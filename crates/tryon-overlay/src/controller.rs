//! Overlay controller: the surface the surrounding application drives.
//!
//! Owns the tracking session, the active variant and the user's
//! adjustments, and runs the compositor while the overlay is open.

use crate::compositor::{Compositor, FramePlan, ModelRenderer, OverlayState};
use crate::session::{SessionError, SessionState, TrackingSession};
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tryon_core::{
    mapper, AdjustmentLimits, AdjustmentState, CatalogError, CoordinateMapper, UserAdjustmentState,
    VariantCatalog,
};
use tryon_hw::DeviceError;

#[derive(Error, Debug)]
pub enum OverlayError {
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error("variant catalog: {0}")]
    Catalog(#[from] CatalogError),
}

impl OverlayError {
    /// Message suitable for showing to the person in front of the camera.
    pub fn user_message(&self) -> String {
        match self {
            OverlayError::Session(SessionError::Device(DeviceError::PermissionDenied(_))) => {
                "Camera access is required for try-on. Allow camera access and try again.".into()
            }
            OverlayError::Session(SessionError::Device(DeviceError::DeviceBusy)) => {
                "The camera is in use by another application. Close it and try again.".into()
            }
            OverlayError::Session(SessionError::Device(DeviceError::DeviceNotFound(_))) => {
                "No camera was found. Connect a camera and try again.".into()
            }
            OverlayError::Session(SessionError::Device(e)) => {
                format!("The camera could not be started ({e}).")
            }
            OverlayError::Session(SessionError::Detector(e)) => {
                format!("Face tracking could not be started ({e}).")
            }
            OverlayError::Session(SessionError::Cancelled) => {
                "Try-on was closed before the camera started.".into()
            }
            OverlayError::Session(SessionError::ChannelClosed) => {
                "The try-on session has ended. Reopen try-on to continue.".into()
            }
            OverlayError::Catalog(e) => format!("Accessory definitions could not be loaded ({e})."),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ControllerSettings {
    /// Variant selected on creation; the catalog's first variant if unset.
    pub initial_variant: Option<String>,
    pub render_interval: Duration,
    pub projection_scale: f32,
    pub limits: AdjustmentLimits,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            initial_variant: None,
            render_interval: Duration::from_secs(1) / 60,
            projection_scale: mapper::DEFAULT_PROJECTION_SCALE,
            limits: AdjustmentLimits::default(),
        }
    }
}

pub struct AROverlayController<R: ModelRenderer> {
    catalog: Arc<VariantCatalog>,
    session: TrackingSession,
    adjustments: UserAdjustmentState,
    overlay: watch::Sender<OverlayState>,
    compositor: Compositor<R>,
    render_interval: Duration,
    render_task: Option<JoinHandle<()>>,
}

impl<R: ModelRenderer> AROverlayController<R> {
    pub fn new(
        catalog: Arc<VariantCatalog>,
        session: TrackingSession,
        renderer: R,
        settings: ControllerSettings,
    ) -> Self {
        let initial = settings
            .initial_variant
            .or_else(|| catalog.fallback().map(|v| v.id.clone()))
            .unwrap_or_default();
        let adjustments = UserAdjustmentState::new(settings.limits);
        let (overlay, overlay_rx) = watch::channel(OverlayState {
            variant_id: initial,
            adjustments: adjustments.current(),
        });
        let compositor = Compositor::new(
            Arc::clone(&catalog),
            CoordinateMapper::new(settings.projection_scale),
            session.register().clone(),
            overlay_rx,
            Arc::new(Mutex::new(renderer)),
        );

        Self {
            catalog,
            session,
            adjustments,
            overlay,
            compositor,
            render_interval: settings.render_interval,
            render_task: None,
        }
    }

    /// Start tracking, then start rendering.
    ///
    /// Nothing is drawn unless the session comes up. On failure the session
    /// is left `Failed` and a new `open` is required to retry.
    pub async fn open(&mut self) -> Result<(), OverlayError> {
        if self.render_task.is_some() && self.session.state() == SessionState::Running {
            return Ok(());
        }
        // A session that failed while running leaves a stale render task.
        if let Some(task) = self.render_task.take() {
            task.abort();
        }
        if let Err(e) = self.session.open().await {
            tracing::warn!(error = %e, "try-on overlay failed to open");
            return Err(e.into());
        }
        tracing::info!(variant = %self.selected_variant(), "try-on overlay open");
        self.render_task = Some(tokio::spawn(self.compositor.clone().run(self.render_interval)));
        Ok(())
    }

    /// Stop rendering and tear the session down.
    ///
    /// Rendering stops immediately. The returned future only tracks session
    /// teardown and may be dropped.
    pub fn close(&mut self) -> impl Future<Output = ()> + Send + 'static {
        if let Some(task) = self.render_task.take() {
            task.abort();
        }
        self.session.close()
    }

    /// Switch the active variant. Adjustments reset whenever the selection
    /// changes; the next render tick picks the new variant up.
    pub fn select_variant(&mut self, id: &str) {
        if self.overlay.borrow().variant_id == id {
            return;
        }
        if self.catalog.get(id).is_none() {
            tracing::warn!(variant = id, "unknown variant selected; drawing fallback model at centre");
        }
        self.adjustments.reset();
        let adjustments = self.adjustments.current();
        self.overlay.send_modify(|state| {
            state.variant_id = id.to_string();
            state.adjustments = adjustments;
        });
        tracing::debug!(variant = id, "variant selected");
    }

    /// Select the variant previewing a product category. Returns `false`,
    /// leaving the selection alone, when no variant covers the category.
    pub fn select_category(&mut self, category: &str) -> bool {
        let Some(id) = self.catalog.for_category(category).map(|v| v.id.clone()) else {
            tracing::debug!(category, "no variant for product category");
            return false;
        };
        self.select_variant(&id);
        true
    }

    pub fn set_scale(&mut self, scale: f32) -> f32 {
        let applied = self.adjustments.set_scale(scale);
        self.publish_adjustments();
        applied
    }

    pub fn set_rotation(&mut self, degrees: f32) -> f32 {
        let applied = self.adjustments.set_rotation(degrees);
        self.publish_adjustments();
        applied
    }

    pub fn set_vertical_offset(&mut self, offset: f32) -> f32 {
        let applied = self.adjustments.set_vertical_offset(offset);
        self.publish_adjustments();
        applied
    }

    pub fn selected_variant(&self) -> String {
        self.overlay.borrow().variant_id.clone()
    }

    pub fn adjustments(&self) -> AdjustmentState {
        self.adjustments.current()
    }

    /// What the next render tick would draw, computed fresh.
    pub fn current_frame(&self) -> Option<FramePlan> {
        self.compositor.plan()
    }

    pub fn session_state(&self) -> SessionState {
        self.session.state()
    }

    pub fn is_rendering(&self) -> bool {
        self.render_task.as_ref().is_some_and(|t| !t.is_finished())
    }

    pub fn catalog(&self) -> &VariantCatalog {
        &self.catalog
    }

    fn publish_adjustments(&self) {
        let adjustments = self.adjustments.current();
        self.overlay.send_if_modified(|state| {
            let changed = state.adjustments != adjustments;
            state.adjustments = adjustments;
            changed
        });
    }
}

impl<R: ModelRenderer> Drop for AROverlayController<R> {
    fn drop(&mut self) {
        if let Some(task) = self.render_task.take() {
            task.abort();
        }
        // `session` drops next and tears itself down.
    }
}
