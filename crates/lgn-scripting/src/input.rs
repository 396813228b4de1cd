//! Input state snapshot and the script-facing `input` API.
//!
//! Raw device polling (keyboard/mouse/controller drivers, window/OS
//! plumbing) is an external collaborator; this module only
//! owns the published snapshot and the read-only validated queries scripts
//! make against it. The snapshot is double-buffered with
//! [`lgn_state_buffer::StateBuffer`] the same way every other subsystem is:
//! the external polling code is the single writer of the back buffer once
//! per frame, the frame orchestrator swaps it alongside the other buffers,
//! and scripts read only the front buffer — so "current" and "just
//! pressed/released" queries always see one consistent frame, never a
//! half-updated one (grounded on
//! `examples/original_source/Code/Engine/Input/InputScriptInterface.cpp`'s
//! method set and its "compare this frame against last frame" shape for the
//! just-pressed/just-released queries).

use std::sync::Arc;

use thiserror::Error;

use lgn_state_buffer::StateBuffer;

/// Number of distinct key codes tracked, one bit per byte value (the
/// original source casts key codes to `char`).
pub const NUM_KEYS: usize = 256;
/// Number of distinct mouse buttons tracked (left, right, middle, x1, x2).
pub const NUM_MOUSE_BUTTONS: usize = 5;
/// Maximum number of simultaneously tracked controllers.
pub const MAX_CONTROLLERS: usize = 4;
/// Number of axes tracked per controller (left stick x/y, right stick x/y,
/// left trigger, right trigger).
pub const NUM_CONTROLLER_AXES: usize = 6;
/// Number of buttons tracked per controller.
pub const NUM_CONTROLLER_BUTTONS: usize = 16;

/// Per-controller state: connectivity, axis values, and button state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControllerState {
    /// Whether a physical controller is bound to this slot.
    pub connected: bool,
    /// Axis values, each in `[-1.0, 1.0]`.
    pub axes: [f32; NUM_CONTROLLER_AXES],
    /// Button-down state.
    pub buttons_down: [bool; NUM_CONTROLLER_BUTTONS],
}

impl Default for ControllerState {
    fn default() -> Self {
        Self { connected: false, axes: [0.0; NUM_CONTROLLER_AXES], buttons_down: [false; NUM_CONTROLLER_BUTTONS] }
    }
}

/// One frame's worth of raw input, as published by the external polling
/// system. "Just pressed"/"just released" queries are answered by comparing
/// `this` against the previous front-buffer snapshot the adapter keeps
/// (see [`InputAdapter`]), not stored redundantly here.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InputSnapshot {
    /// Key-down state, indexed by key code.
    pub keys_down: [bool; NUM_KEYS],
    /// Mouse-button-down state, indexed by button index.
    pub mouse_buttons_down: [bool; NUM_MOUSE_BUTTONS],
    /// Current mouse position in window-client coordinates.
    pub mouse_position: (f32, f32),
    /// Mouse movement delta since the previous frame.
    pub mouse_delta: (f32, f32),
    /// Per-slot controller state.
    pub controllers: [ControllerState; MAX_CONTROLLERS],
}

impl Default for InputSnapshot {
    fn default() -> Self {
        Self {
            keys_down: [false; NUM_KEYS],
            mouse_buttons_down: [false; NUM_MOUSE_BUTTONS],
            mouse_position: (0.0, 0.0),
            mouse_delta: (0.0, 0.0),
            controllers: [ControllerState::default(); MAX_CONTROLLERS],
        }
    }
}

/// Double-buffered input snapshot: written once per frame by the (external)
/// input-polling system via `back_mut()`, swapped by the frame orchestrator
/// alongside every other subsystem buffer.
pub type InputBuffer = StateBuffer<InputSnapshot>;

/// A validation failure at the `input` script boundary.
/// Never mutates state — there is nothing to mutate here, only to query —
/// but out-of-range indices are still rejected rather than silently
/// clamped, matching the other adapters' discipline.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{0}")]
pub struct InputError(pub String);

/// `Result` alias for the `input` script API.
pub type InputResult<T> = Result<T, InputError>;

fn validate_key_code(code: i64) -> InputResult<usize> {
    usize::try_from(code)
        .ok()
        .filter(|&code| code < NUM_KEYS)
        .ok_or_else(|| InputError(format!("key code must be within [0, {NUM_KEYS})")))
}

fn validate_mouse_button(button: i64) -> InputResult<usize> {
    usize::try_from(button)
        .ok()
        .filter(|&button| button < NUM_MOUSE_BUTTONS)
        .ok_or_else(|| InputError(format!("mouse button must be within [0, {NUM_MOUSE_BUTTONS})")))
}

fn validate_controller_index(index: i64) -> InputResult<usize> {
    usize::try_from(index)
        .ok()
        .filter(|&index| index < MAX_CONTROLLERS)
        .ok_or_else(|| InputError(format!("controller index must be within [0, {MAX_CONTROLLERS})")))
}

fn validate_controller_axis(axis: i64) -> InputResult<usize> {
    usize::try_from(axis)
        .ok()
        .filter(|&axis| axis < NUM_CONTROLLER_AXES)
        .ok_or_else(|| InputError(format!("controller axis must be within [0, {NUM_CONTROLLER_AXES})")))
}

fn validate_controller_button(button: i64) -> InputResult<usize> {
    usize::try_from(button)
        .ok()
        .filter(|&button| button < NUM_CONTROLLER_BUTTONS)
        .ok_or_else(|| InputError(format!("controller button must be within [0, {NUM_CONTROLLER_BUTTONS})")))
}

/// Adapter behind the `input` script API. Holds the engine's
/// input buffer plus the previous frame's front snapshot, so "just
/// pressed"/"just released" queries can diff without the orchestrator
/// needing to expose frame history anywhere else.
pub struct InputAdapter {
    buffer: Arc<InputBuffer>,
    previous: parking_lot::Mutex<InputSnapshot>,
}

impl InputAdapter {
    /// Construct an adapter over the engine's input buffer.
    pub fn new(buffer: Arc<InputBuffer>) -> Self {
        Self { buffer, previous: parking_lot::Mutex::new(InputSnapshot::default()) }
    }

    /// Call once per frame, after the orchestrator's swap, before scripts
    /// run `wasKeyJustPressed`/`wasKeyJustReleased`/`wasMouseButtonJustPressed`
    /// queries for that frame: snapshots the now-current front buffer as the
    /// "previous" baseline for the *next* frame's just-pressed/just-released
    /// comparisons.
    pub fn advance_frame(&self) {
        *self.previous.lock() = *self.buffer.front();
    }

    /// `input.isKeyPressed(code)`.
    pub fn is_key_pressed(&self, code: i64) -> InputResult<bool> {
        let code = validate_key_code(code)?;
        Ok(self.buffer.front().keys_down[code])
    }

    /// `input.wasKeyJustPressed(code)`.
    pub fn was_key_just_pressed(&self, code: i64) -> InputResult<bool> {
        let code = validate_key_code(code)?;
        let now = self.buffer.front().keys_down[code];
        let before = self.previous.lock().keys_down[code];
        Ok(now && !before)
    }

    /// `input.wasKeyJustReleased(code)`.
    pub fn was_key_just_released(&self, code: i64) -> InputResult<bool> {
        let code = validate_key_code(code)?;
        let now = self.buffer.front().keys_down[code];
        let before = self.previous.lock().keys_down[code];
        Ok(!now && before)
    }

    /// `input.getMousePosition()`.
    pub fn mouse_position(&self) -> (f32, f32) {
        self.buffer.front().mouse_position
    }

    /// `input.getMouseDelta()`.
    pub fn mouse_delta(&self) -> (f32, f32) {
        self.buffer.front().mouse_delta
    }

    /// `input.isMouseButtonPressed(b)`.
    pub fn is_mouse_button_pressed(&self, button: i64) -> InputResult<bool> {
        let button = validate_mouse_button(button)?;
        Ok(self.buffer.front().mouse_buttons_down[button])
    }

    /// `input.wasMouseButtonJustPressed(b)`.
    pub fn was_mouse_button_just_pressed(&self, button: i64) -> InputResult<bool> {
        let button = validate_mouse_button(button)?;
        let now = self.buffer.front().mouse_buttons_down[button];
        let before = self.previous.lock().mouse_buttons_down[button];
        Ok(now && !before)
    }

    /// `input.isControllerConnected(i)`.
    pub fn is_controller_connected(&self, index: i64) -> InputResult<bool> {
        let index = validate_controller_index(index)?;
        Ok(self.buffer.front().controllers[index].connected)
    }

    /// `input.getControllerAxis(i, axis)`.
    pub fn controller_axis(&self, index: i64, axis: i64) -> InputResult<f32> {
        let index = validate_controller_index(index)?;
        let axis = validate_controller_axis(axis)?;
        Ok(self.buffer.front().controllers[index].axes[axis])
    }

    /// `input.isControllerButtonPressed(i, btn)`.
    pub fn is_controller_button_pressed(&self, index: i64, button: i64) -> InputResult<bool> {
        let index = validate_controller_index(index)?;
        let button = validate_controller_button(button)?;
        Ok(self.buffer.front().controllers[index].buttons_down[button])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adapter_with(snapshot: InputSnapshot) -> (InputAdapter, Arc<InputBuffer>) {
        let buffer = Arc::new(InputBuffer::new(InputSnapshot::default(), InputSnapshot::default()));
        *buffer.back_mut() = snapshot;
        buffer.swap();
        let adapter = InputAdapter::new(buffer.clone());
        (adapter, buffer)
    }

    #[test]
    fn rejects_out_of_range_key_code() {
        let (adapter, _buffer) = adapter_with(InputSnapshot::default());
        assert!(adapter.is_key_pressed(-1).is_err());
        assert!(adapter.is_key_pressed(NUM_KEYS as i64).is_err());
        assert!(adapter.is_key_pressed(65).is_ok());
    }

    #[test]
    fn just_pressed_is_true_only_on_the_transition_frame() {
        let mut snapshot = InputSnapshot::default();
        let (adapter, buffer) = adapter_with(snapshot);
        adapter.advance_frame();
        assert!(!adapter.was_key_just_pressed(32).unwrap());

        snapshot.keys_down[32] = true;
        *buffer.back_mut() = snapshot;
        buffer.swap();
        assert!(adapter.was_key_just_pressed(32).unwrap());

        adapter.advance_frame();
        assert!(!adapter.was_key_just_pressed(32).unwrap(), "held key is not 'just' pressed again");
    }

    #[test]
    fn just_released_fires_once_on_the_release_frame() {
        let mut snapshot = InputSnapshot::default();
        snapshot.keys_down[10] = true;
        let (adapter, buffer) = adapter_with(snapshot);
        adapter.advance_frame();

        snapshot.keys_down[10] = false;
        *buffer.back_mut() = snapshot;
        buffer.swap();
        assert!(adapter.was_key_just_released(10).unwrap());

        adapter.advance_frame();
        assert!(!adapter.was_key_just_released(10).unwrap());
    }

    #[test]
    fn controller_queries_validate_index_and_axis_bounds() {
        let (adapter, _buffer) = adapter_with(InputSnapshot::default());
        assert!(adapter.is_controller_connected(MAX_CONTROLLERS as i64).is_err());
        assert!(adapter.controller_axis(0, NUM_CONTROLLER_AXES as i64).is_err());
        assert!(adapter.is_controller_button_pressed(0, NUM_CONTROLLER_BUTTONS as i64).is_err());
        assert_eq!(adapter.controller_axis(0, 0).unwrap(), 0.0);
    }
}
