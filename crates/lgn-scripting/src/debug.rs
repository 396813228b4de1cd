//! Debug primitive list: an append-only, lifetime-bounded set rebuilt each
//! frame.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::entity::{Rgba8, Vec3};

/// Global visibility gate for the debug-render pass, toggled outside the
/// command-queue/frame-order path (`DebugRenderSetVisible`/`SetHidden` in
/// the original mutate a plain static bool, not a queued command).
/// `renderWorld`/`renderScreen` consult it before an external renderer
/// would submit any draw calls.
#[derive(Debug, Clone)]
pub struct DebugVisibility(Arc<AtomicBool>);

impl DebugVisibility {
    /// Construct a visibility gate, visible by default.
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(true)))
    }

    /// Show debug primitives.
    pub fn set_visible(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// Hide debug primitives.
    pub fn set_hidden(&self) {
        self.0.store(false, Ordering::Relaxed);
    }

    /// Whether a render pass should currently draw anything.
    pub fn is_visible(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

impl Default for DebugVisibility {
    fn default() -> Self {
        Self::new()
    }
}

/// Which draw-order/depth-testing bucket a primitive renders in, carried
/// from the original `DebugRenderMode` enum (`ALWAYS`, `USE_DEPTH`, `X_RAY`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderMode {
    /// Always visible, ignoring depth.
    Always,
    /// Depth-tested against the scene.
    UseDepth,
    /// Rendered through geometry with reduced opacity.
    XRay,
}

/// The shape/content of a single debug primitive.
#[derive(Debug, Clone, PartialEq)]
pub enum DebugGeometry {
    /// A point at `position` with the given draw radius.
    Point { position: Vec3, radius: f32 },
    /// A line segment from `start` to `end` with the given draw radius.
    Line { start: Vec3, end: Vec3, radius: f32 },
    /// A wireframe sphere centered at `center`.
    WireSphere { center: Vec3, radius: f32 },
    /// A wireframe cylinder from `base` to `top`.
    Cylinder { base: Vec3, top: Vec3, radius: f32 },
    /// An arrow from `start` to `end`.
    Arrow { start: Vec3, end: Vec3, radius: f32 },
    /// World-space text anchored at `origin`.
    Text { text: String, origin: Vec3, height: f32 },
    /// Screen-facing (billboarded) text anchored at `origin`.
    BillboardText { text: String, origin: Vec3, height: f32 },
    /// Screen-space text at normalized `position`.
    ScreenText { text: String, position: (f32, f32), size: f32 },
    /// A console/HUD message with no geometry.
    Message { text: String },
    /// A three-axis coordinate basis anchored at `origin`.
    Basis { origin: Vec3, i_basis: Vec3, j_basis: Vec3, k_basis: Vec3 },
}

/// One entry in the debug-primitive list.
#[derive(Debug, Clone, PartialEq)]
pub struct DebugPrimitive {
    /// The shape and content to draw.
    pub geometry: DebugGeometry,
    /// Countdown in seconds. Negative means "lives until explicitly
    /// cleared"; others are removed when the countdown reaches zero.
    pub duration: f32,
    /// Color at the start of the primitive's lifetime.
    pub start_color: Rgba8,
    /// Color at the end of the primitive's lifetime; the consumer
    /// interpolates between the two as `duration` counts down.
    pub end_color: Rgba8,
    /// Depth-testing bucket.
    pub mode: RenderMode,
}

impl DebugPrimitive {
    /// Whether this primitive lives until explicitly cleared.
    pub fn is_permanent(&self) -> bool {
        self.duration < 0.0
    }

    /// Tick the lifetime countdown by `dt` seconds. Returns `false` once a
    /// non-permanent primitive's countdown has reached zero and it should
    /// be dropped by the consumer.
    pub fn tick(&mut self, dt: f32) -> bool {
        if self.is_permanent() {
            return true;
        }
        self.duration -= dt;
        self.duration > 0.0
    }
}

/// Append-only per-frame list of debug primitives. The command processor
/// only ever pushes; the consumer is responsible for pruning expired
/// entries after it finishes reading the front-buffer snapshot.
pub type DebugList = Vec<DebugPrimitive>;

/// Advance every primitive's lifetime by `dt` and drop the ones that have
/// expired. Call this against the *back* buffer after the front buffer has
/// been consumed for the frame, never against the front buffer itself.
pub fn retire_expired(list: &mut DebugList, dt: f32) {
    list.retain_mut(|primitive| primitive.tick(dt));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permanent_primitive_never_expires() {
        let mut primitive = DebugPrimitive {
            geometry: DebugGeometry::Message { text: "hi".to_string() },
            duration: -1.0,
            start_color: Rgba8::WHITE,
            end_color: Rgba8::WHITE,
            mode: RenderMode::Always,
        };
        assert!(primitive.tick(1000.0));
        assert_eq!(primitive.duration, -1.0);
    }

    #[test]
    fn timed_primitive_expires_and_is_retired() {
        let mut list = vec![DebugPrimitive {
            geometry: DebugGeometry::Point { position: Vec3::ZERO, radius: 1.0 },
            duration: 0.5,
            start_color: Rgba8::WHITE,
            end_color: Rgba8::WHITE,
            mode: RenderMode::UseDepth,
        }];
        retire_expired(&mut list, 0.3);
        assert_eq!(list.len(), 1);
        retire_expired(&mut list, 0.3);
        assert!(list.is_empty());
    }

    #[test]
    fn visibility_defaults_to_visible_and_toggles() {
        let visibility = DebugVisibility::new();
        assert!(visibility.is_visible());
        visibility.set_hidden();
        assert!(!visibility.is_visible());
        visibility.set_visible();
        assert!(visibility.is_visible());
    }

    #[test]
    fn visibility_clones_share_the_same_flag() {
        let visibility = DebugVisibility::new();
        let clone = visibility.clone();
        visibility.set_hidden();
        assert!(!clone.is_visible());
    }
}
