use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crossbeam_channel::{Receiver, Sender, TrySendError};

use crate::shared::frame_metadata::CameraFacing;

use super::canvas::Canvas;
use super::graphic::Graphic;

/// Maps image coordinates onto the view a graphic is drawn into.
///
/// Scale factors are view size over preview size. Front-facing previews are
/// mirrored horizontally, so `translate_x` flips around the view width.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct OverlayTransform {
    pub width_scale: f32,
    pub height_scale: f32,
    pub view_width: f32,
    pub facing: CameraFacing,
}

impl OverlayTransform {
    pub fn new(preview: (u32, u32), view: (u32, u32), facing: CameraFacing) -> Self {
        let ratio = |view: u32, preview: u32| {
            if preview == 0 {
                1.0
            } else {
                view as f32 / preview as f32
            }
        };
        Self {
            width_scale: ratio(view.0, preview.0),
            height_scale: ratio(view.1, preview.1),
            view_width: view.0 as f32,
            facing,
        }
    }

    pub fn scale_x(&self, x: f32) -> f32 {
        x * self.width_scale
    }

    pub fn scale_y(&self, y: f32) -> f32 {
        y * self.height_scale
    }

    pub fn translate_x(&self, x: f32) -> f32 {
        match self.facing {
            CameraFacing::Front => self.view_width - self.scale_x(x),
            CameraFacing::Back => self.scale_x(x),
        }
    }

    pub fn translate_y(&self, y: f32) -> f32 {
        self.scale_y(y)
    }
}

struct OverlayState {
    graphics: Vec<Box<dyn Graphic>>,
    preview_size: (u32, u32),
    view_size: Option<(u32, u32)>,
    facing: CameraFacing,
}

/// Thread-safe list of graphics drawn on top of the camera preview.
///
/// Presenters rebuild the list on the detector thread; a surface draws it
/// on its own thread after [`post_invalidate`](Self::post_invalidate).
/// Each invalidation bumps a generation counter and, if a listener is
/// subscribed, notifies it without blocking. Pending notifications coalesce.
pub struct GraphicOverlay {
    state: Mutex<OverlayState>,
    generation: AtomicU64,
    listener: Mutex<Option<Sender<u64>>>,
}

impl GraphicOverlay {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(OverlayState {
                graphics: Vec::new(),
                preview_size: (0, 0),
                view_size: None,
                facing: CameraFacing::default(),
            }),
            generation: AtomicU64::new(0),
            listener: Mutex::new(None),
        }
    }

    pub fn clear(&self) {
        self.state().graphics.clear();
    }

    pub fn add(&self, graphic: Box<dyn Graphic>) {
        self.state().graphics.push(graphic);
    }

    /// Swaps in a complete list of graphics, so a concurrent `draw` sees
    /// either the old list or the new one.
    pub fn replace(&self, graphics: Vec<Box<dyn Graphic>>) {
        self.state().graphics = graphics;
    }

    pub fn len(&self) -> usize {
        self.state().graphics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Records the preview size and camera facing used to map coordinates.
    pub fn set_camera_info(&self, preview_width: u32, preview_height: u32, facing: CameraFacing) {
        let mut state = self.state();
        state.preview_size = (preview_width, preview_height);
        state.facing = facing;
    }

    pub fn camera_facing(&self) -> CameraFacing {
        self.state().facing
    }

    pub fn preview_size(&self) -> (u32, u32) {
        self.state().preview_size
    }

    pub fn set_view_size(&self, width: u32, height: u32) {
        self.state().view_size = Some((width, height));
    }

    /// View size, falling back to the preview size when none was set.
    pub fn view_size(&self) -> (u32, u32) {
        let state = self.state();
        state.view_size.unwrap_or(state.preview_size)
    }

    /// Transform for a view of the given size.
    pub fn transform_for(&self, view_width: u32, view_height: u32) -> OverlayTransform {
        let state = self.state();
        OverlayTransform::new(state.preview_size, (view_width, view_height), state.facing)
    }

    /// Requests a redraw.
    pub fn post_invalidate(&self) {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let listener = self.listener.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(tx) = listener.as_ref() {
            match tx.try_send(generation) {
                Ok(()) | Err(TrySendError::Full(_)) => {}
                Err(TrySendError::Disconnected(_)) => {
                    log::debug!("Overlay listener disconnected");
                }
            }
        }
    }

    /// Number of invalidations posted so far.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Subscribes to invalidations, replacing any previous listener.
    ///
    /// The channel holds one pending notification; further invalidations
    /// before the listener wakes up are folded into it.
    pub fn subscribe(&self) -> Receiver<u64> {
        let (tx, rx) = crossbeam_channel::bounded(1);
        *self.listener.lock().unwrap_or_else(PoisonError::into_inner) = Some(tx);
        rx
    }

    /// Drops the listener so its receiver sees a disconnect.
    pub fn unsubscribe(&self) {
        self.listener
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }

    /// Draws every graphic in insertion order, scaled to the canvas size.
    pub fn draw(&self, canvas: &mut dyn Canvas) {
        let state = self.state();
        let transform = OverlayTransform::new(
            state.preview_size,
            (canvas.width(), canvas.height()),
            state.facing,
        );
        for graphic in &state.graphics {
            graphic.draw(canvas, &transform);
        }
    }

    fn state(&self) -> MutexGuard<'_, OverlayState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for GraphicOverlay {
    fn default() -> Self {
        Self::new()
    }
}
