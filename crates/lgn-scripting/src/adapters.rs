//! Script-boundary adapters: the layer scripted methods
//! actually call. Adapters hold no state machine of their own — they
//! validate arguments, normalize types, package a [`crate::command::Command`],
//! and submit it. Validation constants and thresholds are grounded on
//! `examples/original_source/Code/Engine/Audio/AudioScriptInterface.cpp`'s
//! `Validate*` family, which is the only place in the original source that
//! pins these down to concrete numbers.

use std::sync::Arc;

use thiserror::Error;

use crate::audio::AudioUpdate;
use crate::callback::SharedCallbackRegistry;
use crate::camera::CameraKind;
use crate::command::{Command, CommandQueue};
use crate::debug::{DebugGeometry, DebugVisibility, RenderMode};
use crate::entity::{EntityRecord, EntityUpdate, EulerAngles, Rgba8, Vec3};

/// Largest byte length a sound path may have (`AudioScriptInterface::ValidateSoundPath`).
pub const MAX_SOUND_PATH_BYTES: usize = 260;
/// Required path prefix for sound assets.
pub const SOUND_PATH_PREFIX: &str = "Data/";
/// Recognized (case-insensitive) audio file suffixes.
pub const SOUND_PATH_SUFFIXES: &[&str] = &[".mp3", ".wav", ".ogg", ".m4a"];
/// Inclusive volume bound; the original allows up to 10 to headroom-boost 3D sources.
pub const MAX_VOLUME: f32 = 10.0;
/// Inclusive stereo balance bound.
pub const MAX_BALANCE: f32 = 1.0;
/// Inclusive lower speed bound.
pub const MIN_SPEED: f32 = 0.1;
/// Inclusive upper speed bound.
pub const MAX_SPEED: f32 = 10.0;
/// Absolute world-coordinate bound; components must satisfy `abs(v) <= this`.
pub const MAX_COORDINATE: f32 = 10000.0;
/// Inclusive listener-count bounds.
pub const MIN_LISTENERS: i64 = 1;
/// See [`MIN_LISTENERS`].
pub const MAX_LISTENERS: i64 = 8;

/// A validation failure at the script boundary. Never mutates state; the
/// adapter surfaces this as an `err` result instead of submitting a command.
#[derive(Debug, Clone, Error, PartialEq)]
#[error("{0}")]
pub struct ValidationError(pub String);

impl ValidationError {
    fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Outcome of a script-boundary call: `{ok, value}` or `{err, message}`.
/// `T` is typically `()` for a queued intent or `u64` for a direct
/// synchronous id lookup.
pub type AdapterResult<T> = Result<T, ValidationError>;

fn validate_finite_position(x: f32, y: f32, z: f32) -> AdapterResult<Vec3> {
    let position = Vec3::new(x, y, z);
    if !position.is_finite() {
        return Err(ValidationError::new("position must be finite"));
    }
    if x.abs() > MAX_COORDINATE || y.abs() > MAX_COORDINATE || z.abs() > MAX_COORDINATE {
        return Err(ValidationError::new(format!(
            "position components must satisfy abs(v) <= {MAX_COORDINATE}"
        )));
    }
    Ok(position)
}

fn validate_volume(volume: f32) -> AdapterResult<f32> {
    if !(0.0..=MAX_VOLUME).contains(&volume) {
        return Err(ValidationError::new(format!("volume must be within [0, {MAX_VOLUME}]")));
    }
    Ok(volume)
}

fn validate_balance(balance: f32) -> AdapterResult<f32> {
    if !(-MAX_BALANCE..=MAX_BALANCE).contains(&balance) {
        return Err(ValidationError::new(format!("balance must be within [-{MAX_BALANCE}, {MAX_BALANCE}]")));
    }
    Ok(balance)
}

fn validate_speed(speed: f32) -> AdapterResult<f32> {
    if !(MIN_SPEED..=MAX_SPEED).contains(&speed) {
        return Err(ValidationError::new(format!("speed must be within [{MIN_SPEED}, {MAX_SPEED}]")));
    }
    Ok(speed)
}

fn validate_sound_path(path: &str) -> AdapterResult<()> {
    if path.is_empty() || path.len() > MAX_SOUND_PATH_BYTES {
        return Err(ValidationError::new(format!(
            "sound path must be non-empty and at most {MAX_SOUND_PATH_BYTES} bytes"
        )));
    }
    if !path.starts_with(SOUND_PATH_PREFIX) {
        return Err(ValidationError::new(format!("sound path must be rooted under \"{SOUND_PATH_PREFIX}\"")));
    }
    let lower = path.to_ascii_lowercase();
    if !SOUND_PATH_SUFFIXES.iter().any(|suffix| lower.ends_with(suffix)) {
        return Err(ValidationError::new("sound path must end with a recognized audio suffix"));
    }
    Ok(())
}

fn validate_listener_count(count: i64) -> AdapterResult<u32> {
    if !(MIN_LISTENERS..=MAX_LISTENERS).contains(&count) {
        return Err(ValidationError::new(format!(
            "listener count must be within [{MIN_LISTENERS}, {MAX_LISTENERS}]"
        )));
    }
    Ok(count as u32)
}

/// Register a pending callback and return the id it was assigned, so the
/// caller (the `rhai` registration layer) can pair it with the script-side
/// closure in its own callback table, or resolve it with the error
/// sentinel immediately and surface a [`ValidationError`] if the target
/// queue is saturated.
fn submit_with_callback(
    queue: &CommandQueue,
    registry: &SharedCallbackRegistry,
    build: impl FnOnce(u64) -> Command,
) -> AdapterResult<u64> {
    let callback_id = registry.lock().register();
    let command = build(callback_id);
    if queue.submit(command).is_err() {
        registry.lock().resolve(callback_id, crate::callback::CallbackResult::Error);
        return Err(ValidationError::new("command queue is full"));
    }
    Ok(callback_id)
}

/// Adapter behind the `entity` script API.
pub struct EntityAdapter {
    queue: Arc<CommandQueue>,
    callbacks: SharedCallbackRegistry,
}

impl EntityAdapter {
    /// Construct an adapter over the engine's entity command queue and
    /// create-callback registry.
    pub fn new(queue: Arc<CommandQueue>, callbacks: SharedCallbackRegistry) -> Self {
        Self { queue, callbacks }
    }

    /// `entity.createMesh(type, x, y, z, radius, r, g, b, a, callback)`.
    /// Returns the callback id the registration layer pairs with the
    /// script-side closure; the create-callback fires once the entity is
    /// visible in the front buffer.
    #[allow(clippy::too_many_arguments)]
    pub fn create_mesh(
        &self,
        mesh_type: &str,
        x: f32,
        y: f32,
        z: f32,
        radius: f32,
        r: f64,
        g: f64,
        b: f64,
        a: f64,
    ) -> AdapterResult<u64> {
        let position = validate_finite_position(x, y, z)?;
        let record = EntityRecord {
            position,
            radius,
            color: Rgba8::from_f64(r, g, b, a),
            mesh_type: mesh_type.to_string(),
            ..Default::default()
        };
        submit_with_callback(&self.queue, &self.callbacks, |callback_id| Command::CreateEntity {
            record,
            callback_id,
        })
    }

    /// `entity.updatePosition(id, x, y, z)`.
    pub fn update_position(&self, id: u64, x: f32, y: f32, z: f32) -> AdapterResult<()> {
        let position = validate_finite_position(x, y, z)?;
        self.queue
            .submit(Command::UpdateEntity {
                id,
                update: EntityUpdate { position: Some(position), ..Default::default() },
            })
            .map_err(|_| ValidationError::new("command queue is full"))
    }

    /// `entity.moveBy(id, dx, dy, dz)`. The adapter has no read access to
    /// the current position (that lives in the back buffer, main-thread
    /// only), so the delta is carried as a relative update the processor
    /// cannot apply generically — callers on the script side track their
    /// own running position and call `updatePosition` with the sum; this
    /// method exists for API parity and forwards to `updatePosition`.
    pub fn move_by(&self, id: u64, base_x: f32, base_y: f32, base_z: f32, dx: f32, dy: f32, dz: f32) -> AdapterResult<()> {
        self.update_position(id, base_x + dx, base_y + dy, base_z + dz)
    }

    /// `entity.updateOrientation(id, yaw, pitch, roll)`.
    pub fn update_orientation(&self, id: u64, yaw: f32, pitch: f32, roll: f32) -> AdapterResult<()> {
        self.queue
            .submit(Command::UpdateEntity {
                id,
                update: EntityUpdate {
                    orientation: Some(EulerAngles::new(yaw, pitch, roll)),
                    ..Default::default()
                },
            })
            .map_err(|_| ValidationError::new("command queue is full"))
    }

    /// `entity.updateColor(id, r, g, b, a)`.
    pub fn update_color(&self, id: u64, r: f64, g: f64, b: f64, a: f64) -> AdapterResult<()> {
        self.queue
            .submit(Command::UpdateEntity {
                id,
                update: EntityUpdate { color: Some(Rgba8::from_f64(r, g, b, a)), ..Default::default() },
            })
            .map_err(|_| ValidationError::new("command queue is full"))
    }

    /// `entity.destroy(id)`.
    pub fn destroy(&self, id: u64) -> AdapterResult<()> {
        self.queue.submit(Command::DestroyEntity { id }).map_err(|_| ValidationError::new("command queue is full"))
    }
}

/// Adapter behind the `camera` script API.
pub struct CameraAdapter {
    queue: Arc<CommandQueue>,
    callbacks: SharedCallbackRegistry,
}

impl CameraAdapter {
    /// Construct an adapter over the engine's camera command queue and
    /// create-callback registry.
    pub fn new(queue: Arc<CommandQueue>, callbacks: SharedCallbackRegistry) -> Self {
        Self { queue, callbacks }
    }

    /// `camera.create({position, orientation, type}, callback)`. Returns
    /// the callback id, same contract as [`EntityAdapter::create_mesh`].
    pub fn create(
        &self,
        x: f32,
        y: f32,
        z: f32,
        yaw: f32,
        pitch: f32,
        roll: f32,
        type_tag: &str,
    ) -> AdapterResult<u64> {
        let position = validate_finite_position(x, y, z)?;
        let kind = CameraKind::from_tag(type_tag)
            .ok_or_else(|| ValidationError::new(format!("unknown camera type tag \"{type_tag}\"")))?;
        let orientation = EulerAngles::new(yaw, pitch, roll);
        submit_with_callback(&self.queue, &self.callbacks, |callback_id| Command::CreateCamera {
            position,
            orientation,
            kind,
            callback_id,
        })
    }

    /// `camera.update(id, pos, orient)` — the atomic, primary update path.
    pub fn update(&self, id: u64, x: f32, y: f32, z: f32, yaw: f32, pitch: f32, roll: f32) -> AdapterResult<()> {
        let position = validate_finite_position(x, y, z)?;
        self.queue
            .submit(Command::UpdateCamera { id, position, orientation: EulerAngles::new(yaw, pitch, roll) })
            .map_err(|_| ValidationError::new("command queue is full"))
    }

    /// Legacy position-only update.
    pub fn update_position_legacy(&self, id: u64, x: f32, y: f32, z: f32) -> AdapterResult<()> {
        let position = validate_finite_position(x, y, z)?;
        self.queue
            .submit(Command::UpdateCameraPosition { id, position })
            .map_err(|_| ValidationError::new("command queue is full"))
    }

    /// Legacy orientation-only update.
    pub fn update_orientation_legacy(&self, id: u64, yaw: f32, pitch: f32, roll: f32) -> AdapterResult<()> {
        self.queue
            .submit(Command::UpdateCameraOrientation { id, orientation: EulerAngles::new(yaw, pitch, roll) })
            .map_err(|_| ValidationError::new("command queue is full"))
    }

    /// `camera.moveBy(id, delta)`. Same caller-tracks-position caveat as
    /// [`EntityAdapter::move_by`].
    #[allow(clippy::too_many_arguments)]
    pub fn move_by(
        &self,
        id: u64,
        base_x: f32,
        base_y: f32,
        base_z: f32,
        yaw: f32,
        pitch: f32,
        roll: f32,
        dx: f32,
        dy: f32,
        dz: f32,
    ) -> AdapterResult<()> {
        self.update(id, base_x + dx, base_y + dy, base_z + dz, yaw, pitch, roll)
    }

    /// `camera.lookAt(id, target)`. Orientation math (deriving yaw/pitch
    /// from a target point) belongs to the renderer's camera math, which
    /// is an external collaborator; this adapter validates
    /// and forwards the already-computed angles.
    pub fn look_at(&self, id: u64, x: f32, y: f32, z: f32, yaw: f32, pitch: f32, roll: f32) -> AdapterResult<()> {
        self.update(id, x, y, z, yaw, pitch, roll)
    }

    /// `camera.setActive(id, callback)`.
    pub fn set_active(&self, id: u64) -> AdapterResult<()> {
        self.queue.submit(Command::SetActiveCamera { id }).map_err(|_| ValidationError::new("command queue is full"))
    }

    /// `camera.setType(id, typeTag, callback)`.
    pub fn set_type(&self, id: u64, type_tag: &str) -> AdapterResult<()> {
        let kind = CameraKind::from_tag(type_tag)
            .ok_or_else(|| ValidationError::new(format!("unknown camera type tag \"{type_tag}\"")))?;
        self.queue
            .submit(Command::UpdateCameraType { id, kind })
            .map_err(|_| ValidationError::new("command queue is full"))
    }
}

/// Adapter behind the `audio` script API.
pub struct AudioAdapter {
    queue: Arc<CommandQueue>,
    callbacks: SharedCallbackRegistry,
}

impl AudioAdapter {
    /// Construct an adapter over the engine's audio command queue and
    /// create-callback registry.
    pub fn new(queue: Arc<CommandQueue>, callbacks: SharedCallbackRegistry) -> Self {
        Self { queue, callbacks }
    }

    /// `audio.loadSoundAsync(path, callback)` / `createOrGetSound(path, kind)`'s
    /// async path. Returns the callback id, same contract as
    /// [`EntityAdapter::create_mesh`].
    pub fn load_sound_async(&self, path: &str) -> AdapterResult<u64> {
        validate_sound_path(path)?;
        let path = path.to_string();
        submit_with_callback(&self.queue, &self.callbacks, |callback_id| Command::CreateSound {
            path,
            callback_id,
        })
    }

    /// `audio.createOrGetSound(path, "2D"|"3D")` — the direct,
    /// non-callback counterpart of [`AudioAdapter::load_sound_async`].
    /// Spatialization kind is accepted for API parity but does not change
    /// validation: every `AudioRecord` already carries a `position`, used
    /// only when the source plays back as 3D.
    pub fn create_or_get_sound(&self, path: &str, spatialization: &str) -> AdapterResult<u64> {
        if spatialization != "2D" && spatialization != "3D" {
            return Err(ValidationError::new("spatialization must be \"2D\" or \"3D\""));
        }
        validate_sound_path(path)?;
        let path = path.to_string();
        submit_with_callback(&self.queue, &self.callbacks, |callback_id| Command::CreateSound {
            path,
            callback_id,
        })
    }

    /// `audio.startSound(id[, looped, volume, balance, speed, paused])` —
    /// 2D playback start at the origin. `balance`/`speed` are validated but
    /// not stored, per [`AudioAdapter::validate_balance_only`]'s note.
    pub fn start_sound(
        &self,
        id: u64,
        looped: bool,
        volume: f32,
        balance: f32,
        speed: f32,
        paused: bool,
    ) -> AdapterResult<()> {
        validate_balance(balance)?;
        validate_speed(speed)?;
        let volume = validate_volume(volume)?;
        let update = AudioUpdate {
            position: Some(Vec3::ZERO),
            volume: Some(volume),
            is_looped: Some(looped),
            is_playing: Some(!paused),
        };
        self.queue.submit(Command::UpdateSound { id, update }).map_err(|_| ValidationError::new("command queue is full"))
    }

    /// `audio.startSoundAt(id, x, y, z[, ...])` — 3D playback start at a
    /// given world position, otherwise identical to
    /// [`AudioAdapter::start_sound`].
    #[allow(clippy::too_many_arguments)]
    pub fn start_sound_at(
        &self,
        id: u64,
        x: f32,
        y: f32,
        z: f32,
        looped: bool,
        volume: f32,
        balance: f32,
        speed: f32,
        paused: bool,
    ) -> AdapterResult<()> {
        validate_balance(balance)?;
        validate_speed(speed)?;
        let volume = validate_volume(volume)?;
        let position = validate_finite_position(x, y, z)?;
        let update = AudioUpdate {
            position: Some(position),
            volume: Some(volume),
            is_looped: Some(looped),
            is_playing: Some(!paused),
        };
        self.queue.submit(Command::UpdateSound { id, update }).map_err(|_| ValidationError::new("command queue is full"))
    }

    /// `audio.playSound(id, volume, looped, {x,y,z})`.
    pub fn play_sound(&self, id: u64, volume: f32, looped: bool, x: f32, y: f32, z: f32) -> AdapterResult<()> {
        let volume = validate_volume(volume)?;
        let position = validate_finite_position(x, y, z)?;
        let update = AudioUpdate {
            position: Some(position),
            volume: Some(volume),
            is_looped: Some(looped),
            is_playing: Some(true),
        };
        self.queue.submit(Command::UpdateSound { id, update }).map_err(|_| ValidationError::new("command queue is full"))
    }

    /// `audio.stopSound(id)`.
    pub fn stop_sound(&self, id: u64) -> AdapterResult<()> {
        let update = AudioUpdate { is_playing: Some(false), ..Default::default() };
        self.queue.submit(Command::UpdateSound { id, update }).map_err(|_| ValidationError::new("command queue is full"))
    }

    /// `audio.setVolume(id, v)`.
    pub fn set_volume(&self, id: u64, volume: f32) -> AdapterResult<()> {
        let volume = validate_volume(volume)?;
        let update = AudioUpdate { volume: Some(volume), ..Default::default() };
        self.queue.submit(Command::UpdateSound { id, update }).map_err(|_| ValidationError::new("command queue is full"))
    }

    /// `audio.update3DPosition(id, {x,y,z})`.
    pub fn update_3d_position(&self, id: u64, x: f32, y: f32, z: f32) -> AdapterResult<()> {
        let position = validate_finite_position(x, y, z)?;
        let update = AudioUpdate { position: Some(position), ..Default::default() };
        self.queue.submit(Command::UpdateSound { id, update }).map_err(|_| ValidationError::new("command queue is full"))
    }

    /// `audio.setSoundBalance(id, b)` — validates only; stereo balance and
    /// playback speed are mixer-handle parameters, not fields of `AudioRecord`,
    /// so there is no back-buffer write to perform here.
    pub fn validate_balance_only(&self, balance: f32) -> AdapterResult<()> {
        validate_balance(balance).map(|_| ())
    }

    /// `audio.setSoundSpeed(id, s)` — validates only; see
    /// [`AudioAdapter::validate_balance_only`]'s note.
    pub fn validate_speed_only(&self, speed: f32) -> AdapterResult<()> {
        validate_speed(speed).map(|_| ())
    }

    /// `audio.setNumListeners(n)` — validates only; listener count lives on
    /// the audio-mixer handle (an external collaborator, spec.md §1), not
    /// in the state map.
    pub fn set_num_listeners(&self, count: i64) -> AdapterResult<u32> {
        validate_listener_count(count)
    }

    /// `audio.updateListener(i, px,py,pz, fx,fy,fz, ux,uy,uz)` — validates
    /// the listener index and the three finite vectors.
    #[allow(clippy::too_many_arguments)]
    pub fn update_listener(
        &self,
        index: i64,
        px: f32,
        py: f32,
        pz: f32,
        fx: f32,
        fy: f32,
        fz: f32,
        ux: f32,
        uy: f32,
        uz: f32,
    ) -> AdapterResult<()> {
        if !(0..MAX_LISTENERS).contains(&index) {
            return Err(ValidationError::new(format!("listener index must be within [0, {MAX_LISTENERS})")));
        }
        validate_finite_position(px, py, pz)?;
        validate_finite_position(fx, fy, fz)?;
        validate_finite_position(ux, uy, uz)?;
        Ok(())
    }
}

/// Adapter behind the `debug` script API.
pub struct DebugAdapter {
    queue: Arc<CommandQueue>,
    visibility: DebugVisibility,
}

impl DebugAdapter {
    /// Construct an adapter over the engine's debug-primitive command queue
    /// and visibility gate.
    pub fn new(queue: Arc<CommandQueue>, visibility: DebugVisibility) -> Self {
        Self { queue, visibility }
    }

    /// `debug.setVisible()`. Takes effect immediately, independent of frame
    /// order — mirrors the original's direct (non-queued) mutex-protected
    /// flag rather than going through the command queue.
    pub fn set_visible(&self) -> AdapterResult<()> {
        self.visibility.set_visible();
        Ok(())
    }

    /// `debug.setHidden()`. See [`DebugAdapter::set_visible`].
    pub fn set_hidden(&self) -> AdapterResult<()> {
        self.visibility.set_hidden();
        Ok(())
    }

    /// `debug.renderWorld(camId)`. This crate has no renderer of its own;
    /// the actual draw submission is an external collaborator reading the
    /// camera front buffer, the same boundary `CameraAdapter::move_by`
    /// documents. This call reports whether that collaborator should
    /// proceed, gated on the visibility flag, which is the one piece of
    /// the original call's behavior that belongs on this side of the
    /// boundary.
    pub fn render_world(&self, _camera_id: u64) -> AdapterResult<bool> {
        Ok(self.visibility.is_visible())
    }

    /// `debug.renderScreen(camId)`. See [`DebugAdapter::render_world`].
    pub fn render_screen(&self, _camera_id: u64) -> AdapterResult<bool> {
        Ok(self.visibility.is_visible())
    }

    fn submit(&self, geometry: DebugGeometry, duration: f32, start: Rgba8, end: Rgba8, mode: RenderMode) -> AdapterResult<()> {
        self.queue
            .submit(Command::AddDebugPrimitive { geometry, duration, start_color: start, end_color: end, mode })
            .map_err(|_| ValidationError::new("command queue is full"))
    }

    /// `debug.clear()`.
    pub fn clear(&self) -> AdapterResult<()> {
        self.queue.submit(Command::ClearDebugPrimitives).map_err(|_| ValidationError::new("command queue is full"))
    }

    /// `debug.addWorldPoint(x, y, z, radius, duration, r,g,b,a [, mode])`.
    #[allow(clippy::too_many_arguments)]
    pub fn add_world_point(
        &self,
        x: f32,
        y: f32,
        z: f32,
        radius: f32,
        duration: f32,
        r: f64,
        g: f64,
        b: f64,
        a: f64,
        mode: RenderMode,
    ) -> AdapterResult<()> {
        let position = validate_finite_position(x, y, z)?;
        let color = Rgba8::from_f64(r, g, b, a);
        self.submit(DebugGeometry::Point { position, radius }, duration, color, color, mode)
    }

    /// `debug.addWorldLine(start, end, radius, duration, startColor, endColor [, mode])`.
    #[allow(clippy::too_many_arguments)]
    pub fn add_world_line(
        &self,
        start: (f32, f32, f32),
        end: (f32, f32, f32),
        radius: f32,
        duration: f32,
        start_color: Rgba8,
        end_color: Rgba8,
        mode: RenderMode,
    ) -> AdapterResult<()> {
        let start = validate_finite_position(start.0, start.1, start.2)?;
        let end = validate_finite_position(end.0, end.1, end.2)?;
        self.submit(DebugGeometry::Line { start, end, radius }, duration, start_color, end_color, mode)
    }

    /// `debug.addWorldWireSphere(center, radius, duration, r,g,b,a [, mode])`.
    #[allow(clippy::too_many_arguments)]
    pub fn add_world_wire_sphere(
        &self,
        center: (f32, f32, f32),
        radius: f32,
        duration: f32,
        r: f64,
        g: f64,
        b: f64,
        a: f64,
        mode: RenderMode,
    ) -> AdapterResult<()> {
        let center = validate_finite_position(center.0, center.1, center.2)?;
        let color = Rgba8::from_f64(r, g, b, a);
        self.submit(DebugGeometry::WireSphere { center, radius }, duration, color, color, mode)
    }

    /// `debug.addWorldCylinder(base, top, radius, duration, r,g,b,a [, mode])`.
    #[allow(clippy::too_many_arguments)]
    pub fn add_world_cylinder(
        &self,
        base: (f32, f32, f32),
        top: (f32, f32, f32),
        radius: f32,
        duration: f32,
        r: f64,
        g: f64,
        b: f64,
        a: f64,
        mode: RenderMode,
    ) -> AdapterResult<()> {
        let base = validate_finite_position(base.0, base.1, base.2)?;
        let top = validate_finite_position(top.0, top.1, top.2)?;
        let color = Rgba8::from_f64(r, g, b, a);
        self.submit(DebugGeometry::Cylinder { base, top, radius }, duration, color, color, mode)
    }

    /// `debug.addWorldArrow(start, end, radius, duration, r,g,b,a [, mode])`.
    #[allow(clippy::too_many_arguments)]
    pub fn add_world_arrow(
        &self,
        start: (f32, f32, f32),
        end: (f32, f32, f32),
        radius: f32,
        duration: f32,
        r: f64,
        g: f64,
        b: f64,
        a: f64,
        mode: RenderMode,
    ) -> AdapterResult<()> {
        let start = validate_finite_position(start.0, start.1, start.2)?;
        let end = validate_finite_position(end.0, end.1, end.2)?;
        let color = Rgba8::from_f64(r, g, b, a);
        self.submit(DebugGeometry::Arrow { start, end, radius }, duration, color, color, mode)
    }

    /// `debug.addWorldText(text, origin, height, duration, r,g,b,a [, mode])`.
    #[allow(clippy::too_many_arguments)]
    pub fn add_world_text(
        &self,
        text: &str,
        origin: (f32, f32, f32),
        height: f32,
        duration: f32,
        r: f64,
        g: f64,
        b: f64,
        a: f64,
        mode: RenderMode,
    ) -> AdapterResult<()> {
        let origin = validate_finite_position(origin.0, origin.1, origin.2)?;
        let color = Rgba8::from_f64(r, g, b, a);
        self.submit(
            DebugGeometry::Text { text: text.to_string(), origin, height },
            duration,
            color,
            color,
            mode,
        )
    }

    /// `debug.addWorldBillboardText(text, origin, height, duration, r,g,b,a [, mode])`.
    #[allow(clippy::too_many_arguments)]
    pub fn add_world_billboard_text(
        &self,
        text: &str,
        origin: (f32, f32, f32),
        height: f32,
        duration: f32,
        r: f64,
        g: f64,
        b: f64,
        a: f64,
        mode: RenderMode,
    ) -> AdapterResult<()> {
        let origin = validate_finite_position(origin.0, origin.1, origin.2)?;
        let color = Rgba8::from_f64(r, g, b, a);
        self.submit(
            DebugGeometry::BillboardText { text: text.to_string(), origin, height },
            duration,
            color,
            color,
            mode,
        )
    }

    /// `debug.addWorldBasis(origin, iBasis, jBasis, kBasis, duration, r,g,b,a [, mode])`.
    #[allow(clippy::too_many_arguments)]
    pub fn add_world_basis(
        &self,
        origin: (f32, f32, f32),
        i_basis: (f32, f32, f32),
        j_basis: (f32, f32, f32),
        k_basis: (f32, f32, f32),
        duration: f32,
        r: f64,
        g: f64,
        b: f64,
        a: f64,
        mode: RenderMode,
    ) -> AdapterResult<()> {
        let origin = validate_finite_position(origin.0, origin.1, origin.2)?;
        let i_basis = validate_finite_position(i_basis.0, i_basis.1, i_basis.2)?;
        let j_basis = validate_finite_position(j_basis.0, j_basis.1, j_basis.2)?;
        let k_basis = validate_finite_position(k_basis.0, k_basis.1, k_basis.2)?;
        let color = Rgba8::from_f64(r, g, b, a);
        self.submit(DebugGeometry::Basis { origin, i_basis, j_basis, k_basis }, duration, color, color, mode)
    }

    /// `debug.addScreenText(text, x, y, size, duration, r,g,b,a)`.
    #[allow(clippy::too_many_arguments)]
    pub fn add_screen_text(
        &self,
        text: &str,
        x: f32,
        y: f32,
        size: f32,
        duration: f32,
        r: f64,
        g: f64,
        b: f64,
        a: f64,
    ) -> AdapterResult<()> {
        let color = Rgba8::from_f64(r, g, b, a);
        self.submit(
            DebugGeometry::ScreenText { text: text.to_string(), position: (x, y), size },
            duration,
            color,
            color,
            RenderMode::Always,
        )
    }

    /// `debug.addMessage(text, duration, r,g,b,a)`.
    pub fn add_message(&self, text: &str, duration: f32, r: f64, g: f64, b: f64, a: f64) -> AdapterResult<()> {
        let color = Rgba8::from_f64(r, g, b, a);
        self.submit(DebugGeometry::Message { text: text.to_string() }, duration, color, color, RenderMode::Always)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callback::{self, CallbackResult};
    use std::sync::Arc;

    fn entity_adapter() -> (EntityAdapter, Arc<CommandQueue>, SharedCallbackRegistry) {
        let queue = Arc::new(CommandQueue::new(4));
        let callbacks = callback::new_shared();
        (EntityAdapter::new(queue.clone(), callbacks.clone()), queue, callbacks)
    }

    #[test]
    fn create_mesh_rejects_non_finite_position() {
        let (adapter, _, _) = entity_adapter();
        let err = adapter.create_mesh("cube", f32::NAN, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 255.0).unwrap_err();
        assert!(err.0.contains("finite"));
    }

    #[test]
    fn create_mesh_rejects_out_of_bound_position() {
        let (adapter, _, _) = entity_adapter();
        let err = adapter.create_mesh("cube", 20000.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 255.0).unwrap_err();
        assert!(err.0.contains("10000"));
    }

    #[test]
    fn create_mesh_queues_a_command_and_registers_a_callback() {
        let (adapter, queue, callbacks) = entity_adapter();
        adapter.create_mesh("cube", 1.0, 2.0, 3.0, 1.0, 255.0, 0.0, 0.0, 255.0).unwrap();
        assert_eq!(queue.approximate_size(), 1);
        assert_eq!(callbacks.lock().pending_count(), 1);
    }

    #[test]
    fn create_mesh_resolves_callback_with_error_when_queue_is_full() {
        let queue = Arc::new(CommandQueue::new(0));
        let callbacks = callback::new_shared();
        let adapter = EntityAdapter::new(queue, callbacks.clone());
        let err = adapter.create_mesh("cube", 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 255.0).unwrap_err();
        assert!(err.0.contains("full"));
        let ready = callbacks.lock().take_ready();
        assert_eq!(ready, vec![(1, CallbackResult::Error)]);
    }

    #[test]
    fn sound_path_validation_rejects_traversal_and_bad_suffix() {
        assert!(validate_sound_path("../etc/passwd").is_err());
        assert!(validate_sound_path("Data/Audio/explosion.exe").is_err());
        assert!(validate_sound_path("Data/Audio/explosion.mp3").is_ok());
    }

    #[test]
    fn volume_validation_enforces_closed_interval() {
        assert!(validate_volume(-0.1).is_err());
        assert!(validate_volume(10.1).is_err());
        assert!(validate_volume(5.0).is_ok());
    }

    #[test]
    fn listener_count_enforces_bounds() {
        assert!(validate_listener_count(0).is_err());
        assert!(validate_listener_count(9).is_err());
        assert_eq!(validate_listener_count(4).unwrap(), 4);
    }

    fn audio_adapter() -> (AudioAdapter, Arc<CommandQueue>) {
        let queue = Arc::new(CommandQueue::new(4));
        let callbacks = callback::new_shared();
        (AudioAdapter::new(queue.clone(), callbacks), queue)
    }

    #[test]
    fn create_or_get_sound_rejects_path_traversal_scenario() {
        // End-to-end scenario 5: a rejected path never submits a command.
        let (adapter, queue) = audio_adapter();
        let err = adapter.create_or_get_sound("../etc/passwd", "2D").unwrap_err();
        assert!(err.0.contains("Data/"));
        assert_eq!(queue.approximate_size(), 0);
    }

    #[test]
    fn create_or_get_sound_rejects_unknown_spatialization_tag() {
        let (adapter, _) = audio_adapter();
        assert!(adapter.create_or_get_sound("Data/Audio/a.mp3", "4D").is_err());
    }

    #[test]
    fn start_sound_validates_balance_and_speed_before_queuing() {
        let (adapter, queue) = audio_adapter();
        assert!(adapter.start_sound(1, false, 0.5, 2.0, 1.0, false).is_err());
        assert_eq!(queue.approximate_size(), 0);
        assert!(adapter.start_sound(1, false, 0.5, 0.0, 1.0, false).is_ok());
        assert_eq!(queue.approximate_size(), 1);
    }

    #[test]
    fn start_sound_at_validates_position() {
        let (adapter, _) = audio_adapter();
        assert!(adapter.start_sound_at(1, f32::NAN, 0.0, 0.0, false, 1.0, 0.0, 1.0, false).is_err());
        assert!(adapter.start_sound_at(1, 1.0, 2.0, 3.0, true, 1.0, 0.0, 1.0, false).is_ok());
    }

    fn debug_adapter() -> (DebugAdapter, Arc<CommandQueue>) {
        let queue = Arc::new(CommandQueue::new(4));
        (DebugAdapter::new(queue.clone(), DebugVisibility::new()), queue)
    }

    #[test]
    fn add_world_cylinder_queues_the_right_geometry() {
        let (adapter, queue) = debug_adapter();
        adapter
            .add_world_cylinder((0.0, 0.0, 0.0), (0.0, 0.0, 2.0), 1.0, 5.0, 255.0, 0.0, 0.0, 255.0, RenderMode::UseDepth)
            .unwrap();
        assert_eq!(queue.approximate_size(), 1);
    }

    #[test]
    fn add_world_basis_rejects_non_finite_axis() {
        let (adapter, _) = debug_adapter();
        let err = adapter
            .add_world_basis(
                (0.0, 0.0, 0.0),
                (f32::NAN, 0.0, 0.0),
                (0.0, 1.0, 0.0),
                (0.0, 0.0, 1.0),
                1.0,
                255.0,
                255.0,
                255.0,
                255.0,
                RenderMode::Always,
            )
            .unwrap_err();
        assert!(err.0.contains("finite"));
    }
}
