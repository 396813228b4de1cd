//! Binds the script-boundary adapters to a concrete `rhai::Engine`
//! and dispatches ready callbacks into script-side
//! closures.
//!
//! This module is the only place in the crate that touches `rhai` types;
//! every other module stays engine-agnostic so the state maps, queue, and
//! processor can be tested without a script runtime at all.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use rhai::{Dynamic, Engine, EvalAltResult, FnPtr, AST};

use crate::adapters::{AudioAdapter, CameraAdapter, DebugAdapter, EntityAdapter, ValidationError};
use crate::callback::CallbackResult;
use crate::debug::RenderMode;
use crate::input::InputAdapter;
use crate::orchestrator::ReadyCallbacks;

/// Converts an [`AdapterResult`](crate::adapters::AdapterResult) into the
/// script-facing `{ok, value}` / `{err, message}` shape; the
/// script side never sees a Rust `Result` or a thrown exception.
pub fn to_script_result<T: Into<Dynamic>, E: std::fmt::Display>(result: Result<T, E>) -> Dynamic {
    let mut map = rhai::Map::new();
    match result {
        Ok(value) => {
            map.insert("ok".into(), true.into());
            map.insert("value".into(), value.into());
        }
        Err(err) => {
            map.insert("ok".into(), false.into());
            map.insert("err".into(), err.to_string().into());
        }
    }
    map.into()
}

/// Table of pending callback values (the actual script-side closures),
/// keyed by the same callback id [`crate::callback::CallbackRegistry`]
/// tracks. Split out from the registry because the registry's job is
/// ready-flag/result bookkeeping, independent of which runtime embeds the
/// callback value; the (callback value, ready flag, result) triple ends
/// up realized as two tables sharing one id space.
#[derive(Debug, Default)]
pub struct ScriptCallbackTable {
    pending: Mutex<HashMap<u64, FnPtr>>,
}

impl ScriptCallbackTable {
    /// Construct an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the script-side closure for a just-registered callback id.
    pub fn insert(&self, callback_id: u64, callback: FnPtr) {
        self.pending.lock().insert(callback_id, callback);
    }

    fn take(&self, callback_id: u64) -> Option<FnPtr> {
        self.pending.lock().remove(&callback_id)
    }
}

/// Owns the script engine and its compiled program; invoking a callback
/// requires both.
pub struct ScriptRuntime {
    engine: Engine,
    ast: Mutex<AST>,
}

impl ScriptRuntime {
    /// Wrap an already-configured engine (native functions registered) and
    /// a compiled program.
    pub fn new(engine: Engine, ast: AST) -> Self {
        Self { engine, ast: Mutex::new(ast) }
    }

    /// Replace the compiled program, e.g. after a script hot-reload.
    pub fn set_ast(&self, ast: AST) {
        *self.ast.lock() = ast;
    }

    /// Invoke one ready callback with its assigned id (or the sentinel on
    /// error). Any error raised by the script callback is caught, logged
    /// with the callback id, and does not propagate — a misbehaving
    /// script must not kill the main thread.
    fn invoke(&self, callback_id: u64, callback: &FnPtr, result: CallbackResult) {
        let ast = self.ast.lock();
        let outcome: Result<(), Box<EvalAltResult>> =
            callback.call(&self.engine, &ast, (result.as_id() as i64,));
        if let Err(err) = outcome {
            tracing::warn!(callback_id, error = %err, "script callback raised an error, continuing");
        }
    }

    /// Call the script-defined `onToolInvoke(toolName, argumentsJson)`
    /// handler for one broker-delivered tool invocation and
    /// return its JSON-encoded reply. Staying at the `String` boundary
    /// (rather than decoding into `Dynamic`) keeps this crate free of a
    /// JSON-library dependency; the runtime binary owns real
    /// (de)serialization on either side of this call.
    pub fn invoke_tool(&self, tool_name: &str, arguments_json: &str) -> Result<String, String> {
        let ast = self.ast.lock();
        self.engine
            .call_fn::<String>(
                &mut rhai::Scope::new(),
                &ast,
                "onToolInvoke",
                (tool_name.to_string(), arguments_json.to_string()),
            )
            .map_err(|err| err.to_string())
    }
}

/// One table per async-create API.
#[derive(Debug, Default)]
pub struct CallbackTables {
    /// Pending `entity.createMesh` callbacks.
    pub entities: ScriptCallbackTable,
    /// Pending `camera.create` callbacks.
    pub cameras: ScriptCallbackTable,
    /// Pending `audio.loadSoundAsync` callbacks.
    pub sounds: ScriptCallbackTable,
}

/// Dispatch every callback the orchestrator marked ready this frame.
/// Must run after the swap whose effect the callback reports, never
/// before.
pub fn dispatch_ready(runtime: &ScriptRuntime, tables: &CallbackTables, ready: ReadyCallbacks) {
    for (id, result) in ready.entities {
        if let Some(callback) = tables.entities.take(id) {
            runtime.invoke(id, &callback, result);
        }
    }
    for (id, result) in ready.cameras {
        if let Some(callback) = tables.cameras.take(id) {
            runtime.invoke(id, &callback, result);
        }
    }
    for (id, result) in ready.sounds {
        if let Some(callback) = tables.sounds.take(id) {
            runtime.invoke(id, &callback, result);
        }
    }
}

fn parse_render_mode(tag: &str) -> RenderMode {
    match tag {
        "use-depth" => RenderMode::UseDepth,
        "x-ray" => RenderMode::XRay,
        _ => RenderMode::Always,
    }
}

/// Register the full `entity`, `camera`, `audio`, `debug`, and `input`
/// native-function tables onto `engine`, closing over the adapters and
/// `callbacks` so that a script-side `createMesh(...)` call validates,
/// queues a command, and — for the three async-create calls
/// (`createMesh`, `createCamera`, `loadSoundAsync`) — records the caller's
/// trailing closure argument in the matching [`ScriptCallbackTable`] under
/// the id the adapter assigned, ready for [`dispatch_ready`] to invoke once
/// the orchestrator reports it ready. `entity.moveBy` and `camera.moveBy`
/// share one name; `rhai` resolves the overload by arity, same as any other
/// pair of same-named functions registered with different signatures.
///
/// `rhai` is committed to as the one concrete embedded runtime (see
/// DESIGN.md); the `engine.register_fn` style mirrors `rhai`'s documented
/// native-function registration pattern.
pub fn register_script_api(
    engine: &mut Engine,
    entity: Arc<EntityAdapter>,
    camera: Arc<CameraAdapter>,
    audio: Arc<AudioAdapter>,
    debug: Arc<DebugAdapter>,
    input: Arc<InputAdapter>,
    callbacks: Arc<CallbackTables>,
) {
    // `entity` API.
    {
        let entity = entity.clone();
        let callbacks = callbacks.clone();
        engine.register_fn(
            "createMesh",
            move |mesh_type: &str, x: f64, y: f64, z: f64, radius: f64, r: f64, g: f64, b: f64, a: f64, on_created: FnPtr| {
                let result = entity
                    .create_mesh(mesh_type, x as f32, y as f32, z as f32, radius as f32, r, g, b, a)
                    .map(|id| {
                        callbacks.entities.insert(id, on_created);
                    });
                to_script_result(result)
            },
        );
    }
    {
        let entity = entity.clone();
        engine.register_fn("updatePosition", move |id: i64, x: f64, y: f64, z: f64| {
            to_script_result(entity.update_position(id as u64, x as f32, y as f32, z as f32))
        });
    }
    {
        let entity = entity.clone();
        engine.register_fn("updateOrientation", move |id: i64, yaw: f64, pitch: f64, roll: f64| {
            to_script_result(entity.update_orientation(id as u64, yaw as f32, pitch as f32, roll as f32))
        });
    }
    {
        let entity = entity.clone();
        engine.register_fn("updateColor", move |id: i64, r: f64, g: f64, b: f64, a: f64| {
            to_script_result(entity.update_color(id as u64, r, g, b, a))
        });
    }
    {
        let entity = entity.clone();
        engine.register_fn("destroyEntity", move |id: i64| to_script_result(entity.destroy(id as u64)));
    }
    {
        let entity = entity.clone();
        engine.register_fn(
            "moveBy",
            move |id: i64, base_x: f64, base_y: f64, base_z: f64, dx: f64, dy: f64, dz: f64| {
                to_script_result(entity.move_by(
                    id as u64, base_x as f32, base_y as f32, base_z as f32, dx as f32, dy as f32, dz as f32,
                ))
            },
        );
    }

    // `camera` API.
    {
        let camera = camera.clone();
        let callbacks = callbacks.clone();
        engine.register_fn(
            "createCamera",
            move |x: f64, y: f64, z: f64, yaw: f64, pitch: f64, roll: f64, type_tag: &str, on_created: FnPtr| {
                let result = camera
                    .create(x as f32, y as f32, z as f32, yaw as f32, pitch as f32, roll as f32, type_tag)
                    .map(|id| {
                        callbacks.cameras.insert(id, on_created);
                    });
                to_script_result(result)
            },
        );
    }
    {
        let camera = camera.clone();
        engine.register_fn(
            "updateCamera",
            move |id: i64, x: f64, y: f64, z: f64, yaw: f64, pitch: f64, roll: f64| {
                to_script_result(camera.update(id as u64, x as f32, y as f32, z as f32, yaw as f32, pitch as f32, roll as f32))
            },
        );
    }
    {
        let camera = camera.clone();
        engine.register_fn("updateCameraPosition", move |id: i64, x: f64, y: f64, z: f64| {
            to_script_result(camera.update_position_legacy(id as u64, x as f32, y as f32, z as f32))
        });
    }
    {
        let camera = camera.clone();
        engine.register_fn("updateCameraOrientation", move |id: i64, yaw: f64, pitch: f64, roll: f64| {
            to_script_result(camera.update_orientation_legacy(id as u64, yaw as f32, pitch as f32, roll as f32))
        });
    }
    {
        let camera = camera.clone();
        engine.register_fn(
            "moveBy",
            move |id: i64,
                  base_x: f64,
                  base_y: f64,
                  base_z: f64,
                  yaw: f64,
                  pitch: f64,
                  roll: f64,
                  dx: f64,
                  dy: f64,
                  dz: f64| {
                to_script_result(camera.move_by(
                    id as u64,
                    base_x as f32,
                    base_y as f32,
                    base_z as f32,
                    yaw as f32,
                    pitch as f32,
                    roll as f32,
                    dx as f32,
                    dy as f32,
                    dz as f32,
                ))
            },
        );
    }
    {
        let camera = camera.clone();
        engine.register_fn(
            "lookAt",
            move |id: i64, x: f64, y: f64, z: f64, yaw: f64, pitch: f64, roll: f64| {
                to_script_result(camera.look_at(id as u64, x as f32, y as f32, z as f32, yaw as f32, pitch as f32, roll as f32))
            },
        );
    }
    {
        let camera = camera.clone();
        engine.register_fn("setActiveCamera", move |id: i64| to_script_result(camera.set_active(id as u64)));
    }
    {
        let camera = camera.clone();
        engine.register_fn("setCameraType", move |id: i64, type_tag: &str| {
            to_script_result(camera.set_type(id as u64, type_tag))
        });
    }

    // `audio` API.
    {
        let audio = audio.clone();
        let callbacks = callbacks.clone();
        engine.register_fn("loadSoundAsync", move |path: &str, on_loaded: FnPtr| {
            let result = audio.load_sound_async(path).map(|id| {
                callbacks.sounds.insert(id, on_loaded);
            });
            to_script_result(result)
        });
    }
    {
        let audio = audio.clone();
        engine.register_fn("createOrGetSound", move |path: &str, spatialization: &str| {
            to_script_result(audio.create_or_get_sound(path, spatialization))
        });
    }
    {
        let audio = audio.clone();
        engine.register_fn(
            "startSound",
            move |id: i64, looped: bool, volume: f64, balance: f64, speed: f64, paused: bool| {
                to_script_result(audio.start_sound(id as u64, looped, volume as f32, balance as f32, speed as f32, paused))
            },
        );
    }
    {
        let audio = audio.clone();
        engine.register_fn(
            "startSoundAt",
            move |id: i64,
                  x: f64,
                  y: f64,
                  z: f64,
                  looped: bool,
                  volume: f64,
                  balance: f64,
                  speed: f64,
                  paused: bool| {
                to_script_result(audio.start_sound_at(
                    id as u64, x as f32, y as f32, z as f32, looped, volume as f32, balance as f32, speed as f32, paused,
                ))
            },
        );
    }
    {
        let audio = audio.clone();
        engine.register_fn(
            "playSound",
            move |id: i64, volume: f64, looped: bool, x: f64, y: f64, z: f64| {
                to_script_result(audio.play_sound(id as u64, volume as f32, looped, x as f32, y as f32, z as f32))
            },
        );
    }
    {
        let audio = audio.clone();
        engine.register_fn("stopSound", move |id: i64| to_script_result(audio.stop_sound(id as u64)));
    }
    {
        let audio = audio.clone();
        engine.register_fn("setVolume", move |id: i64, volume: f64| {
            to_script_result(audio.set_volume(id as u64, volume as f32))
        });
    }
    {
        let audio = audio.clone();
        engine.register_fn("update3DPosition", move |id: i64, x: f64, y: f64, z: f64| {
            to_script_result(audio.update_3d_position(id as u64, x as f32, y as f32, z as f32))
        });
    }
    {
        let audio = audio.clone();
        engine.register_fn("setSoundBalance", move |_id: i64, balance: f64| {
            to_script_result(audio.validate_balance_only(balance as f32))
        });
    }
    {
        let audio = audio.clone();
        engine.register_fn("setSoundSpeed", move |_id: i64, speed: f64| {
            to_script_result(audio.validate_speed_only(speed as f32))
        });
    }
    {
        let audio = audio.clone();
        engine.register_fn("setNumListeners", move |count: i64| to_script_result(audio.set_num_listeners(count)));
    }
    {
        let audio = audio.clone();
        engine.register_fn(
            "updateListener",
            move |index: i64,
                  px: f64,
                  py: f64,
                  pz: f64,
                  fx: f64,
                  fy: f64,
                  fz: f64,
                  ux: f64,
                  uy: f64,
                  uz: f64| {
                to_script_result(audio.update_listener(
                    index, px as f32, py as f32, pz as f32, fx as f32, fy as f32, fz as f32, ux as f32, uy as f32,
                    uz as f32,
                ))
            },
        );
    }

    // `debug` API.
    {
        let debug = debug.clone();
        engine.register_fn("setVisible", move || to_script_result(debug.set_visible()));
    }
    {
        let debug = debug.clone();
        engine.register_fn("setHidden", move || to_script_result(debug.set_hidden()));
    }
    {
        let debug = debug.clone();
        engine.register_fn("renderWorld", move |camera_id: i64| to_script_result(debug.render_world(camera_id as u64)));
    }
    {
        let debug = debug.clone();
        engine.register_fn("renderScreen", move |camera_id: i64| to_script_result(debug.render_screen(camera_id as u64)));
    }
    {
        let debug = debug.clone();
        engine.register_fn("clearDebugPrimitives", move || to_script_result(debug.clear()));
    }
    {
        let debug = debug.clone();
        engine.register_fn("clear", move || to_script_result(debug.clear()));
    }
    {
        let debug = debug.clone();
        engine.register_fn(
            "addWorldPoint",
            move |x: f64, y: f64, z: f64, radius: f64, duration: f64, r: f64, g: f64, b: f64, a: f64, mode: &str| {
                to_script_result(debug.add_world_point(
                    x as f32, y as f32, z as f32, radius as f32, duration as f32, r, g, b, a, parse_render_mode(mode),
                ))
            },
        );
    }
    {
        let debug = debug.clone();
        engine.register_fn(
            "addWorldLine",
            move |sx: f64,
                  sy: f64,
                  sz: f64,
                  ex: f64,
                  ey: f64,
                  ez: f64,
                  radius: f64,
                  duration: f64,
                  sr: f64,
                  sg: f64,
                  sb: f64,
                  sa: f64,
                  er: f64,
                  eg: f64,
                  eb: f64,
                  ea: f64,
                  mode: &str| {
                to_script_result(debug.add_world_line(
                    (sx as f32, sy as f32, sz as f32),
                    (ex as f32, ey as f32, ez as f32),
                    radius as f32,
                    duration as f32,
                    crate::entity::Rgba8::from_f64(sr, sg, sb, sa),
                    crate::entity::Rgba8::from_f64(er, eg, eb, ea),
                    parse_render_mode(mode),
                ))
            },
        );
    }
    {
        let debug = debug.clone();
        engine.register_fn(
            "addWorldWireSphere",
            move |cx: f64, cy: f64, cz: f64, radius: f64, duration: f64, r: f64, g: f64, b: f64, a: f64, mode: &str| {
                to_script_result(debug.add_world_wire_sphere(
                    (cx as f32, cy as f32, cz as f32),
                    radius as f32,
                    duration as f32,
                    r,
                    g,
                    b,
                    a,
                    parse_render_mode(mode),
                ))
            },
        );
    }
    {
        let debug = debug.clone();
        engine.register_fn(
            "addWorldCylinder",
            move |bx: f64,
                  by: f64,
                  bz: f64,
                  tx: f64,
                  ty: f64,
                  tz: f64,
                  radius: f64,
                  duration: f64,
                  r: f64,
                  g: f64,
                  b: f64,
                  a: f64,
                  mode: &str| {
                to_script_result(debug.add_world_cylinder(
                    (bx as f32, by as f32, bz as f32),
                    (tx as f32, ty as f32, tz as f32),
                    radius as f32,
                    duration as f32,
                    r,
                    g,
                    b,
                    a,
                    parse_render_mode(mode),
                ))
            },
        );
    }
    {
        let debug = debug.clone();
        engine.register_fn(
            "addWorldArrow",
            move |sx: f64,
                  sy: f64,
                  sz: f64,
                  ex: f64,
                  ey: f64,
                  ez: f64,
                  radius: f64,
                  duration: f64,
                  r: f64,
                  g: f64,
                  b: f64,
                  a: f64,
                  mode: &str| {
                to_script_result(debug.add_world_arrow(
                    (sx as f32, sy as f32, sz as f32),
                    (ex as f32, ey as f32, ez as f32),
                    radius as f32,
                    duration as f32,
                    r,
                    g,
                    b,
                    a,
                    parse_render_mode(mode),
                ))
            },
        );
    }
    {
        let debug = debug.clone();
        engine.register_fn(
            "addWorldText",
            move |text: &str,
                  x: f64,
                  y: f64,
                  z: f64,
                  height: f64,
                  duration: f64,
                  r: f64,
                  g: f64,
                  b: f64,
                  a: f64,
                  mode: &str| {
                to_script_result(debug.add_world_text(
                    text,
                    (x as f32, y as f32, z as f32),
                    height as f32,
                    duration as f32,
                    r,
                    g,
                    b,
                    a,
                    parse_render_mode(mode),
                ))
            },
        );
    }
    {
        let debug = debug.clone();
        engine.register_fn(
            "addWorldBillboardText",
            move |text: &str,
                  x: f64,
                  y: f64,
                  z: f64,
                  height: f64,
                  duration: f64,
                  r: f64,
                  g: f64,
                  b: f64,
                  a: f64,
                  mode: &str| {
                to_script_result(debug.add_world_billboard_text(
                    text,
                    (x as f32, y as f32, z as f32),
                    height as f32,
                    duration as f32,
                    r,
                    g,
                    b,
                    a,
                    parse_render_mode(mode),
                ))
            },
        );
    }
    {
        let debug = debug.clone();
        engine.register_fn(
            "addWorldBasis",
            move |ox: f64,
                  oy: f64,
                  oz: f64,
                  ix: f64,
                  iy: f64,
                  iz: f64,
                  jx: f64,
                  jy: f64,
                  jz: f64,
                  kx: f64,
                  ky: f64,
                  kz: f64,
                  duration: f64,
                  r: f64,
                  g: f64,
                  b: f64,
                  a: f64,
                  mode: &str| {
                to_script_result(debug.add_world_basis(
                    (ox as f32, oy as f32, oz as f32),
                    (ix as f32, iy as f32, iz as f32),
                    (jx as f32, jy as f32, jz as f32),
                    (kx as f32, ky as f32, kz as f32),
                    duration as f32,
                    r,
                    g,
                    b,
                    a,
                    parse_render_mode(mode),
                ))
            },
        );
    }
    {
        let debug = debug.clone();
        engine.register_fn(
            "addScreenText",
            move |text: &str, x: f64, y: f64, size: f64, duration: f64, r: f64, g: f64, b: f64, a: f64| {
                to_script_result(debug.add_screen_text(text, x as f32, y as f32, size as f32, duration as f32, r, g, b, a))
            },
        );
    }
    {
        engine.register_fn("addMessage", move |text: &str, duration: f64, r: f64, g: f64, b: f64, a: f64| {
            to_script_result(debug.add_message(text, duration as f32, r, g, b, a))
        });
    }

    // `input` API.
    {
        let input = input.clone();
        engine.register_fn("isKeyPressed", move |code: i64| to_script_result(input.is_key_pressed(code)));
    }
    {
        let input = input.clone();
        engine.register_fn("wasKeyJustPressed", move |code: i64| to_script_result(input.was_key_just_pressed(code)));
    }
    {
        let input = input.clone();
        engine.register_fn("wasKeyJustReleased", move |code: i64| {
            to_script_result(input.was_key_just_released(code))
        });
    }
    {
        let input = input.clone();
        engine.register_fn("getMousePosition", move || {
            let (x, y) = input.mouse_position();
            let mut map = rhai::Map::new();
            map.insert("x".into(), (x as f64).into());
            map.insert("y".into(), (y as f64).into());
            Dynamic::from(map)
        });
    }
    {
        let input = input.clone();
        engine.register_fn("getMouseDelta", move || {
            let (x, y) = input.mouse_delta();
            let mut map = rhai::Map::new();
            map.insert("x".into(), (x as f64).into());
            map.insert("y".into(), (y as f64).into());
            Dynamic::from(map)
        });
    }
    {
        let input = input.clone();
        engine.register_fn("isMouseButtonPressed", move |button: i64| {
            to_script_result(input.is_mouse_button_pressed(button))
        });
    }
    {
        let input = input.clone();
        engine.register_fn("wasMouseButtonJustPressed", move |button: i64| {
            to_script_result(input.was_mouse_button_just_pressed(button))
        });
    }
    {
        let input = input.clone();
        engine.register_fn("isControllerConnected", move |index: i64| {
            to_script_result(input.is_controller_connected(index))
        });
    }
    {
        let input = input.clone();
        engine.register_fn("getControllerAxis", move |index: i64, axis: i64| {
            to_script_result(input.controller_axis(index, axis).map(|value| value as f64))
        });
    }
    {
        engine.register_fn("isControllerButtonPressed", move |index: i64, button: i64| {
            to_script_result(input.is_controller_button_pressed(index, button))
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn to_script_result_reports_ok_shape() {
        let dynamic = to_script_result::<i64>(Ok(5));
        let map = dynamic.cast::<rhai::Map>();
        assert!(map["ok"].clone().cast::<bool>());
        assert_eq!(map["value"].clone().cast::<i64>(), 5);
    }

    #[test]
    fn to_script_result_reports_err_shape() {
        let dynamic = to_script_result::<i64>(Err(ValidationError("bad".into())));
        let map = dynamic.cast::<rhai::Map>();
        assert!(!map["ok"].clone().cast::<bool>());
        assert_eq!(map["err"].clone().cast::<String>(), "bad");
    }

    #[test]
    fn invoke_tool_calls_script_defined_handler() {
        let mut engine = Engine::new();
        let ast = engine
            .compile(r#"fn onToolInvoke(toolName, argumentsJson) { "{\"echo\":\"" + toolName + "\"}" }"#)
            .unwrap();
        let runtime = ScriptRuntime::new(engine, ast);

        let result = runtime.invoke_tool("spawnCube", "{}").unwrap();
        assert_eq!(result, "{\"echo\":\"spawnCube\"}");
    }

    #[test]
    fn invoke_tool_errors_when_handler_missing() {
        let mut engine = Engine::new();
        let ast = engine.compile("").unwrap();
        let runtime = ScriptRuntime::new(engine, ast);

        assert!(runtime.invoke_tool("spawnCube", "{}").is_err());
    }
}
