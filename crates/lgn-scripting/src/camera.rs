//! Camera state map: `CameraID -> CameraRecord`, plus the derived projection
//! cache rebuilt at the end of every `swap()`.

use std::collections::HashMap;

use crate::entity::{EulerAngles, Vec3};
use crate::ids::SENTINEL_ID;

/// A normalized viewport rectangle applied to the render target, `[0, 1]^2`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    /// Left edge, normalized.
    pub left: f32,
    /// Bottom edge, normalized.
    pub bottom: f32,
    /// Right edge, normalized.
    pub right: f32,
    /// Top edge, normalized.
    pub top: f32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self { left: 0.0, bottom: 0.0, right: 1.0, top: 1.0 }
    }
}

/// Which projection variant a camera uses, with the parameters each variant
/// needs. Switching type rebuilds this configuration but never touches
/// `position`/`orientation`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CameraKind {
    /// Perspective projection for world-space rendering.
    World {
        /// Field of view, degrees.
        fov: f32,
        /// Aspect ratio (width / height).
        aspect: f32,
        /// Near clip plane.
        near: f32,
        /// Far clip plane.
        far: f32,
    },
    /// Orthographic projection for screen-space (UI/HUD) rendering.
    Screen {
        /// Left bound.
        left: f32,
        /// Right bound.
        right: f32,
        /// Bottom bound.
        bottom: f32,
        /// Top bound.
        top: f32,
        /// Near clip plane.
        near: f32,
        /// Far clip plane.
        far: f32,
    },
}

impl CameraKind {
    /// The default parameters for a world (perspective) camera.
    pub fn default_world() -> Self {
        Self::World { fov: 60.0, aspect: 16.0 / 9.0, near: 0.1, far: 100.0 }
    }

    /// The default parameters for a screen (orthographic) camera.
    pub fn default_screen() -> Self {
        Self::Screen { left: 0.0, right: 1920.0, bottom: 0.0, top: 1080.0, near: 0.0, far: 1.0 }
    }

    /// Parse the script-facing type tag (`"world"` or `"screen"`) into the
    /// matching default-parameter variant.
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "world" => Some(Self::default_world()),
            "screen" => Some(Self::default_screen()),
            _ => None,
        }
    }

    /// The script-facing type tag for this variant.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::World { .. } => "world",
            Self::Screen { .. } => "screen",
        }
    }
}

/// Render state of one camera.
#[derive(Debug, Clone, PartialEq)]
pub struct CameraRecord {
    /// World-space position.
    pub position: Vec3,
    /// World-space rotation.
    pub orientation: EulerAngles,
    /// Projection variant and its parameters.
    pub kind: CameraKind,
    /// Normalized viewport rectangle.
    pub viewport: Viewport,
    /// Whether this camera is eligible to render.
    pub is_active: bool,
}

impl Default for CameraRecord {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            orientation: EulerAngles::ZERO,
            kind: CameraKind::default_world(),
            viewport: Viewport::default(),
            is_active: false,
        }
    }
}

/// Mapping from camera id to its record.
pub type CameraMap = HashMap<u64, CameraRecord>;

/// A projection ready to bind, derived from a [`CameraRecord`]. Treated as
/// derived data: rebuilt wholesale at the end of every `swap()`, never
/// mutated directly.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProjectionCacheEntry {
    /// The projection variant this entry was derived from.
    pub kind: CameraKind,
    /// The viewport the projection should be applied through.
    pub viewport: Viewport,
}

/// Derived map from camera id to its ready-to-bind projection, rebuilt every
/// swap for every record present in the front buffer.
pub type ProjectionCache = HashMap<u64, ProjectionCacheEntry>;

/// Rebuild the projection cache from a front-buffer snapshot. Called by the
/// orchestrator immediately after a camera-buffer swap.
pub fn rebuild_projection_cache(front: &CameraMap) -> ProjectionCache {
    front
        .iter()
        .map(|(&id, record)| {
            (id, ProjectionCacheEntry { kind: record.kind, viewport: record.viewport })
        })
        .collect()
}

/// Tracks the single "currently active" camera id as a scalar outside the
/// map's key set.
#[derive(Debug, Clone, Copy, Default)]
pub struct ActiveCamera(u64);

impl ActiveCamera {
    /// No camera selected.
    pub fn none() -> Self {
        Self(SENTINEL_ID)
    }

    /// Overwrite the active id unconditionally (SET_ACTIVE_CAMERA never
    /// validates against the map's key set).
    pub fn set(&mut self, id: u64) {
        self.0 = id;
    }

    /// The raw scalar id, which may point at a destroyed record.
    pub fn id(&self) -> u64 {
        self.0
    }

    /// Resolve against a front-buffer snapshot. Per spec.md's decided open
    /// question (§9 "camera scalar vs. map consistency"), an id that is not
    /// present in `front` resolves to "no camera" rather than erroring.
    pub fn resolve<'a>(&self, front: &'a CameraMap) -> Option<(&'a CameraRecord, u64)> {
        front.get(&self.0).map(|record| (record, self.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn switching_type_rebuilds_projection_but_preserves_pose() {
        let mut record = CameraRecord {
            position: Vec3::new(1.0, 2.0, 3.0),
            orientation: EulerAngles::new(10.0, 0.0, 0.0),
            kind: CameraKind::default_world(),
            ..Default::default()
        };
        assert_eq!(record.kind.tag(), "world");

        record.kind = CameraKind::from_tag("screen").unwrap();

        assert_eq!(record.kind.tag(), "screen");
        assert_eq!(record.position, Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(record.orientation, EulerAngles::new(10.0, 0.0, 0.0));
    }

    #[test]
    fn active_camera_with_destroyed_id_resolves_to_none() {
        let mut active = ActiveCamera::none();
        active.set(1000);

        let mut cameras = CameraMap::new();
        cameras.insert(1000, CameraRecord::default());
        assert!(active.resolve(&cameras).is_some());

        cameras.remove(&1000);
        assert!(active.resolve(&cameras).is_none());
        // the scalar itself is left dangling, per spec.md's decided choice.
        assert_eq!(active.id(), 1000);
    }

    #[test]
    fn projection_cache_rebuilds_from_front_snapshot() {
        let mut cameras = CameraMap::new();
        cameras.insert(1, CameraRecord { kind: CameraKind::default_screen(), ..Default::default() });
        let cache = rebuild_projection_cache(&cameras);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache[&1].kind.tag(), "screen");
    }
}
