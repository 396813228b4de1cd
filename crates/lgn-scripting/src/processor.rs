//! Dispatches drained [`Command`]s onto the back buffers of each subsystem
//! map. Runs once per frame, before swap, strictly on the
//! main thread. Errors inside a single command's handler are contained:
//! they log and drop that command, and the rest of the drain proceeds
//!.

use crate::audio::{self, AudioMap};
use crate::callback::{self, CallbackResult, SharedCallbackRegistry};
use crate::camera::{ActiveCamera, CameraMap, CameraRecord};
use crate::command::Command;
use crate::debug::{DebugList, DebugPrimitive};
use crate::entity::EntityMap;
use crate::ids::IdAllocator;

/// A tool invocation drained this frame, still carrying its broker-assigned
/// request id so the runtime can echo a `result`/`error` back once the
/// script handler returns.
#[derive(Debug, Clone)]
pub struct ToolInvocation {
    /// Id the broker assigned this call.
    pub request_id: u64,
    /// Name of the registered tool to invoke.
    pub tool_name: String,
    /// Call arguments, JSON-encoded.
    pub arguments_json: String,
}

/// Per-subsystem id allocators and callback registries the processor needs
/// alongside the state-buffer back buffers. The callback registries are
/// shared with the script-boundary adapters (see
/// [`crate::callback::SharedCallbackRegistry`]); the id allocators are
/// touched only here, on the main thread, at CREATE_* processing time.
pub struct ProcessorState {
    /// Monotonic entity id allocator.
    pub entity_ids: IdAllocator,
    /// Monotonic camera id allocator.
    pub camera_ids: IdAllocator,
    /// Monotonic sound id allocator.
    pub sound_ids: IdAllocator,
    /// Pending entity-create callbacks.
    pub entity_callbacks: SharedCallbackRegistry,
    /// Pending camera-create callbacks.
    pub camera_callbacks: SharedCallbackRegistry,
    /// Pending sound-create callbacks.
    pub sound_callbacks: SharedCallbackRegistry,
    /// Tool invocations drained this frame, consumed by
    /// [`crate::orchestrator::Engine::tick`] and cleared every call.
    pub tool_invocations: Vec<ToolInvocation>,
}

impl Default for ProcessorState {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessorState {
    /// Construct a fresh processor state with all allocators starting at 1
    /// and empty callback tables.
    pub fn new() -> Self {
        Self {
            entity_ids: IdAllocator::new(),
            camera_ids: IdAllocator::new(),
            sound_ids: IdAllocator::new(),
            entity_callbacks: callback::new_shared(),
            camera_callbacks: callback::new_shared(),
            sound_callbacks: callback::new_shared(),
            tool_invocations: Vec::new(),
        }
    }
}

/// Apply one drained command against the relevant back buffers. `active_camera`
/// is passed by reference because SET_ACTIVE_CAMERA writes a scalar outside
/// any map.
#[allow(clippy::too_many_arguments)]
pub fn apply_command(
    command: Command,
    state: &mut ProcessorState,
    entities: &mut EntityMap,
    cameras: &mut CameraMap,
    active_camera: &mut ActiveCamera,
    audio: &mut AudioMap,
    debug: &mut DebugList,
) {
    match command {
        Command::CreateEntity { record, callback_id } => match state.entity_ids.allocate() {
            Some(id) => {
                entities.insert(id, record);
                state.entity_callbacks.lock().resolve(callback_id, CallbackResult::Id(id));
            }
            None => {
                tracing::error!("entity id space exhausted, dropping CreateEntity");
                state.entity_callbacks.lock().resolve(callback_id, CallbackResult::Error);
            }
        },
        Command::UpdateEntity { id, update } => match entities.get_mut(&id) {
            Some(record) => update.apply(record),
            None => tracing::warn!(id, "UPDATE_ENTITY against unknown id, dropping"),
        },
        Command::DestroyEntity { id } => {
            if entities.remove(&id).is_none() {
                tracing::warn!(id, "DESTROY_ENTITY against unknown id");
            }
        }
        Command::CreateCamera { position, orientation, kind, callback_id } => {
            match state.camera_ids.allocate() {
                Some(id) => {
                    cameras.insert(
                        id,
                        CameraRecord { position, orientation, kind, ..Default::default() },
                    );
                    state.camera_callbacks.lock().resolve(callback_id, CallbackResult::Id(id));
                }
                None => {
                    tracing::error!("camera id space exhausted, dropping CreateCamera");
                    state.camera_callbacks.lock().resolve(callback_id, CallbackResult::Error);
                }
            }
        }
        Command::UpdateCamera { id, position, orientation } => match cameras.get_mut(&id) {
            Some(record) => {
                record.position = position;
                record.orientation = orientation;
            }
            None => tracing::warn!(id, "UPDATE_CAMERA against unknown id, dropping"),
        },
        Command::UpdateCameraPosition { id, position } => match cameras.get_mut(&id) {
            Some(record) => record.position = position,
            None => tracing::warn!(id, "legacy position-only camera update against unknown id"),
        },
        Command::UpdateCameraOrientation { id, orientation } => match cameras.get_mut(&id) {
            Some(record) => record.orientation = orientation,
            None => tracing::warn!(id, "legacy orientation-only camera update against unknown id"),
        },
        Command::UpdateCameraType { id, kind } => match cameras.get_mut(&id) {
            Some(record) => record.kind = kind,
            None => tracing::warn!(id, "UPDATE_CAMERA_TYPE against unknown id, dropping"),
        },
        Command::SetActiveCamera { id } => active_camera.set(id),
        Command::DestroyCamera { id } => {
            if cameras.remove(&id).is_none() {
                tracing::warn!(id, "DESTROY_CAMERA against unknown id");
            }
            // active_camera scalar is deliberately left untouched: spec.md
            // §9 mandates "treat as no camera" at resolve time rather than
            // clearing the scalar here.
        }
        Command::CreateSound { path, callback_id } => match state.sound_ids.allocate() {
            Some(id) => {
                audio::create_or_update(audio, id, path);
                state.sound_callbacks.lock().resolve(callback_id, CallbackResult::Id(id));
            }
            None => {
                tracing::error!("sound id space exhausted, dropping CreateSound");
                state.sound_callbacks.lock().resolve(callback_id, CallbackResult::Error);
            }
        },
        Command::UpdateSound { id, update } => match audio.get_mut(&id) {
            Some(existing) => update.apply(existing),
            None => tracing::warn!(id, "UPDATE_SOUND against unknown id, dropping"),
        },
        Command::DestroySound { id } => {
            if audio.remove(&id).is_none() {
                tracing::warn!(id, "DESTROY_SOUND against unknown id");
            }
        }
        Command::AddDebugPrimitive { geometry, duration, start_color, end_color, mode } => {
            debug.push(DebugPrimitive { geometry, duration, start_color, end_color, mode });
        }
        Command::ClearDebugPrimitives => debug.clear(),
        Command::InvokeTool { request_id, tool_name, arguments_json } => {
            state.tool_invocations.push(ToolInvocation { request_id, tool_name, arguments_json });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::CameraKind;
    use crate::entity::EntityRecord;

    fn empty_buffers() -> (EntityMap, CameraMap, ActiveCamera, AudioMap, DebugList) {
        (EntityMap::new(), CameraMap::new(), ActiveCamera::none(), AudioMap::new(), DebugList::new())
    }

    #[test]
    fn create_entity_assigns_id_and_resolves_callback() {
        let mut state = ProcessorState::new();
        let (mut entities, mut cameras, mut active, mut audio, mut debug) = empty_buffers();
        let callback_id = state.entity_callbacks.lock().register();

        apply_command(
            Command::CreateEntity { record: EntityRecord::default(), callback_id },
            &mut state,
            &mut entities,
            &mut cameras,
            &mut active,
            &mut audio,
            &mut debug,
        );

        assert_eq!(entities.len(), 1);
        let ready = state.entity_callbacks.lock().take_ready();
        assert_eq!(ready.len(), 1);
        assert_eq!(ready[0].0, callback_id);
        assert!(matches!(ready[0].1, CallbackResult::Id(_)));
    }

    #[test]
    fn update_against_unknown_id_is_dropped_without_panicking() {
        let mut state = ProcessorState::new();
        let (mut entities, mut cameras, mut active, mut audio, mut debug) = empty_buffers();

        apply_command(
            Command::UpdateEntity { id: 999, update: Default::default() },
            &mut state,
            &mut entities,
            &mut cameras,
            &mut active,
            &mut audio,
            &mut debug,
        );

        assert!(entities.is_empty());
    }

    #[test]
    fn destroying_active_camera_leaves_scalar_dangling() {
        let mut state = ProcessorState::new();
        let (mut entities, mut cameras, mut active, mut audio, mut debug) = empty_buffers();
        let callback_id = state.camera_callbacks.lock().register();

        apply_command(
            Command::CreateCamera {
                position: crate::entity::Vec3::ZERO,
                orientation: crate::entity::EulerAngles::ZERO,
                kind: CameraKind::default_world(),
                callback_id,
            },
            &mut state,
            &mut entities,
            &mut cameras,
            &mut active,
            &mut audio,
            &mut debug,
        );
        let id = state.camera_callbacks.lock().take_ready()[0].1.as_id();
        apply_command(
            Command::SetActiveCamera { id },
            &mut state,
            &mut entities,
            &mut cameras,
            &mut active,
            &mut audio,
            &mut debug,
        );
        apply_command(
            Command::DestroyCamera { id },
            &mut state,
            &mut entities,
            &mut cameras,
            &mut active,
            &mut audio,
            &mut debug,
        );

        assert_eq!(active.id(), id);
        assert!(active.resolve(&cameras).is_none());
    }
}
