//! Entity state map: `EntityID -> EntityRecord`.

use std::collections::HashMap;

/// World-space position, right-handed X-forward/Y-left/Z-up.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vec3 {
    /// Forward axis.
    pub x: f32,
    /// Left axis.
    pub y: f32,
    /// Up axis.
    pub z: f32,
}

impl Vec3 {
    /// The origin.
    pub const ZERO: Self = Self { x: 0.0, y: 0.0, z: 0.0 };

    /// Construct a vector from components.
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Whether every component is finite (not NaN or infinite).
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

/// Yaw/pitch/roll in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EulerAngles {
    /// Rotation around the up axis, degrees.
    pub yaw: f32,
    /// Rotation around the left axis, degrees.
    pub pitch: f32,
    /// Rotation around the forward axis, degrees.
    pub roll: f32,
}

impl EulerAngles {
    /// No rotation.
    pub const ZERO: Self = Self { yaw: 0.0, pitch: 0.0, roll: 0.0 };

    /// Construct angles from components.
    pub fn new(yaw: f32, pitch: f32, roll: f32) -> Self {
        Self { yaw, pitch, roll }
    }
}

/// Packed 8-bit RGBA color. Never expanded to floats in the record; clamped
/// on write (see spec.md §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgba8 {
    /// Red channel.
    pub r: u8,
    /// Green channel.
    pub g: u8,
    /// Blue channel.
    pub b: u8,
    /// Alpha channel.
    pub a: u8,
}

impl Rgba8 {
    /// Opaque white.
    pub const WHITE: Self = Self { r: 255, g: 255, b: 255, a: 255 };

    /// Construct a color, clamping each component-as-float input to `[0, 255]`
    /// before truncating. Scripts pass numeric values that may exceed the
    /// byte range; clamping here is the write-side discipline spec.md §3
    /// requires ("clamped on write, never on read").
    pub fn from_f64(r: f64, g: f64, b: f64, a: f64) -> Self {
        let clamp = |v: f64| -> u8 { v.clamp(0.0, 255.0) as u8 };
        Self { r: clamp(r), g: clamp(g), b: clamp(b), a: clamp(a) }
    }
}

/// Render state of one entity.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityRecord {
    /// World-space position.
    pub position: Vec3,
    /// World-space rotation.
    pub orientation: EulerAngles,
    /// Packed RGBA color.
    pub color: Rgba8,
    /// Uniform scale.
    pub radius: f32,
    /// Mesh selection tag, e.g. `"cube"`, `"sphere"`, `"grid"`.
    pub mesh_type: String,
    /// Render gate; `false` skips the entity entirely.
    pub is_active: bool,
    /// Which camera space this entity should be drawn in (`"world"` or `"screen"`).
    pub camera_type: String,
}

impl Default for EntityRecord {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            orientation: EulerAngles::ZERO,
            color: Rgba8::WHITE,
            radius: 1.0,
            mesh_type: "cube".to_string(),
            is_active: true,
            camera_type: "world".to_string(),
        }
    }
}

/// Mapping from entity id to its record.
pub type EntityMap = HashMap<u64, EntityRecord>;

/// Fields an UPDATE_ENTITY command may carry; each is independently optional
/// so a partial update preserves the fields it omits.
#[derive(Debug, Clone, Default)]
pub struct EntityUpdate {
    /// New position, if present.
    pub position: Option<Vec3>,
    /// New orientation, if present.
    pub orientation: Option<EulerAngles>,
    /// New color, if present.
    pub color: Option<Rgba8>,
}

impl EntityUpdate {
    /// Apply the present fields onto `record`, leaving absent fields
    /// untouched.
    pub fn apply(&self, record: &mut EntityRecord) {
        if let Some(position) = self.position {
            record.position = position;
        }
        if let Some(orientation) = self.orientation {
            record.orientation = orientation;
        }
        if let Some(color) = self.color {
            record.color = color;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_update_preserves_absent_fields() {
        let mut record = EntityRecord {
            position: Vec3::new(0.0, 0.0, 0.0),
            orientation: EulerAngles::new(10.0, 20.0, 30.0),
            ..Default::default()
        };

        let update = EntityUpdate {
            position: Some(Vec3::new(5.0, 5.0, 5.0)),
            orientation: None,
            color: None,
        };
        update.apply(&mut record);

        assert_eq!(record.position, Vec3::new(5.0, 5.0, 5.0));
        assert_eq!(record.orientation, EulerAngles::new(10.0, 20.0, 30.0));
    }

    #[test]
    fn color_clamps_out_of_range_components() {
        let color = Rgba8::from_f64(-10.0, 300.0, 128.0, 255.0);
        assert_eq!(color, Rgba8 { r: 0, g: 255, b: 128, a: 255 });
    }
}
