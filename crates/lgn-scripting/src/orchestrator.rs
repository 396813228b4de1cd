//! Frame orchestrator: the one place that defines per-frame ordering.
//! Nothing outside [`Engine::tick`] is permitted to call `swap()`.

use std::sync::Arc;

use lgn_core::Time;

use crate::audio::AudioMap;
use crate::callback::CallbackResult;
use crate::camera::{rebuild_projection_cache, ActiveCamera, CameraMap, ProjectionCache};
use crate::command::CommandQueue;
use crate::debug::DebugList;
use crate::entity::EntityMap;
use crate::input::{InputBuffer, InputSnapshot};
use crate::processor::{apply_command, ProcessorState, ToolInvocation};
use lgn_state_buffer::StateBuffer;

/// Default render-command queue capacity.
pub const DEFAULT_ENTITY_QUEUE_CAPACITY: usize = 1000;
/// Default camera-command queue capacity, same order as entities.
pub const DEFAULT_CAMERA_QUEUE_CAPACITY: usize = 1000;
/// Default audio-command queue capacity.
pub const DEFAULT_AUDIO_QUEUE_CAPACITY: usize = 1000;
/// Default debug-primitive queue capacity.
pub const DEFAULT_DEBUG_QUEUE_CAPACITY: usize = 500;
/// Default broker tool-invocation queue capacity — invocations are rarer
/// and more latency-sensitive than render commands, so a smaller capacity
/// is plenty.
pub const DEFAULT_TOOL_QUEUE_CAPACITY: usize = 256;

/// Callback ids ready to dispatch this frame, grouped by subsystem. Handed
/// to the script-boundary layer (which owns the actual script-side
/// callback values) after step 5 of the frame order.
#[derive(Debug, Default)]
pub struct ReadyCallbacks {
    /// Entity create-callbacks ready this frame.
    pub entities: Vec<(u64, CallbackResult)>,
    /// Camera create-callbacks ready this frame.
    pub cameras: Vec<(u64, CallbackResult)>,
    /// Sound create-callbacks ready this frame.
    pub sounds: Vec<(u64, CallbackResult)>,
    /// Broker tool invocations drained this frame, awaiting a script
    /// handler and a `result`/`error` reply.
    pub tool_invocations: Vec<ToolInvocation>,
}

/// The aggregate of all subsystem queues, buffers, and processor state,
/// constructed once at startup and driven by [`Engine::tick`] every frame.
/// Owned explicitly rather than reached through static subsystem pointers
/// or global singletons.
pub struct Engine {
    /// Frame timing.
    pub time: Time,

    /// Entity command ingress. `Arc`-wrapped so the script-boundary adapters
    /// can hold their own clone and submit from outside the engine without
    /// borrowing it.
    pub entity_queue: Arc<CommandQueue>,
    /// Entity double-buffered state.
    pub entity_buffer: StateBuffer<EntityMap>,

    /// Camera command ingress.
    pub camera_queue: Arc<CommandQueue>,
    /// Camera double-buffered state.
    pub camera_buffer: StateBuffer<CameraMap>,
    /// Scalar id of the currently-active camera.
    pub active_camera: ActiveCamera,
    /// Derived ready-to-bind projections, rebuilt every camera swap.
    pub projection_cache: ProjectionCache,

    /// Audio command ingress.
    pub audio_queue: Arc<CommandQueue>,
    /// Audio double-buffered state.
    pub audio_buffer: StateBuffer<AudioMap>,

    /// Debug-primitive command ingress.
    pub debug_queue: Arc<CommandQueue>,
    /// Debug-primitive double-buffered state.
    pub debug_buffer: StateBuffer<DebugList>,

    /// Broker tool-invocation ingress.
    pub tool_queue: Arc<CommandQueue>,

    /// Id allocators and callback registries shared by the processor.
    pub processor_state: ProcessorState,

    /// Double-buffered raw-input snapshot. Written
    /// once per frame by the external input-polling system via
    /// `input_buffer.back_mut()`; swapped alongside every other subsystem
    /// buffer so `input` queries from the script side never see a
    /// half-updated frame. `Arc`-wrapped so [`crate::input::InputAdapter`]
    /// can hold its own clone, the same pattern as the command queues.
    pub input_buffer: Arc<InputBuffer>,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine {
    /// Construct an engine with the default queue capacities and empty
    /// state maps.
    pub fn new() -> Self {
        Self {
            time: Time::default(),
            entity_queue: Arc::new(CommandQueue::new(DEFAULT_ENTITY_QUEUE_CAPACITY)),
            entity_buffer: StateBuffer::default(),
            camera_queue: Arc::new(CommandQueue::new(DEFAULT_CAMERA_QUEUE_CAPACITY)),
            camera_buffer: StateBuffer::default(),
            active_camera: ActiveCamera::none(),
            projection_cache: ProjectionCache::new(),
            audio_queue: Arc::new(CommandQueue::new(DEFAULT_AUDIO_QUEUE_CAPACITY)),
            audio_buffer: StateBuffer::default(),
            debug_queue: Arc::new(CommandQueue::new(DEFAULT_DEBUG_QUEUE_CAPACITY)),
            debug_buffer: StateBuffer::default(),
            tool_queue: Arc::new(CommandQueue::new(DEFAULT_TOOL_QUEUE_CAPACITY)),
            processor_state: ProcessorState::new(),
            input_buffer: Arc::new(InputBuffer::new(InputSnapshot::default(), InputSnapshot::default())),
        }
    }

    /// Run one frame in a fixed order:
    ///
    /// 1. advance the clock;
    /// 2. drain every command queue into the matching back buffer;
    /// 3. swap every buffer that was marked dirty, including `input_buffer`
    ///    if the external polling system called `back_mut()` on it this
    ///    frame;
    /// 4. rebuild the camera projection cache from the new front buffer;
    /// 5. collect callbacks marked ready this frame.
    ///
    /// Consuming the front buffers (rendering, audio mix submission, debug
    /// draw) and actually invoking the collected callbacks happen outside
    /// this call, driven by the runtime binary and the script-boundary
    /// layer respectively, so that this crate stays free of
    /// rendering/audio-device and script-engine dependencies.
    pub fn tick(&mut self) -> ReadyCallbacks {
        self.time.update();

        self.drain_commands();
        self.swap_buffers();
        self.projection_cache = rebuild_projection_cache(self.camera_buffer.front());

        ReadyCallbacks {
            entities: self.processor_state.entity_callbacks.lock().take_ready(),
            cameras: self.processor_state.camera_callbacks.lock().take_ready(),
            sounds: self.processor_state.sound_callbacks.lock().take_ready(),
            tool_invocations: std::mem::take(&mut self.processor_state.tool_invocations),
        }
    }

    fn drain_commands(&mut self) {
        let Self {
            entity_queue,
            camera_queue,
            audio_queue,
            debug_queue,
            tool_queue,
            processor_state,
            active_camera,
            entity_buffer,
            camera_buffer,
            audio_buffer,
            debug_buffer,
            ..
        } = self;

        let entities = entity_buffer.back_mut();
        let cameras = camera_buffer.back_mut();
        let audio = audio_buffer.back_mut();
        let debug = debug_buffer.back_mut();

        // Draining all four queues against the same back-buffer set means a
        // single command (e.g. a camera update keyed off a just-created
        // entity id) always sees the other subsystems' commands from this
        // same frame, never a half-applied previous frame.
        entity_queue.drain(|command| {
            apply_command(command, processor_state, entities, cameras, active_camera, audio, debug);
        });
        camera_queue.drain(|command| {
            apply_command(command, processor_state, entities, cameras, active_camera, audio, debug);
        });
        audio_queue.drain(|command| {
            apply_command(command, processor_state, entities, cameras, active_camera, audio, debug);
        });
        debug_queue.drain(|command| {
            apply_command(command, processor_state, entities, cameras, active_camera, audio, debug);
        });
        tool_queue.drain(|command| {
            apply_command(command, processor_state, entities, cameras, active_camera, audio, debug);
        });
    }

    fn swap_buffers(&mut self) {
        self.entity_buffer.swap();
        self.camera_buffer.swap();
        self.audio_buffer.swap();
        self.debug_buffer.swap();
        self.input_buffer.swap();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::CameraKind;
    use crate::command::Command;
    use crate::entity::EntityRecord;

    #[test]
    fn create_then_render_scenario() {
        let mut engine = Engine::new();
        let callback_id = engine.processor_state.entity_callbacks.lock().register();
        engine
            .entity_queue
            .submit(Command::CreateEntity {
                record: EntityRecord { mesh_type: "cube".to_string(), ..Default::default() },
                callback_id,
            })
            .unwrap();
        assert_eq!(engine.entity_queue.approximate_size(), 1);

        let ready = engine.tick();

        assert_eq!(engine.entity_buffer.front().len(), 1);
        assert_eq!(ready.entities.len(), 1);
        assert_eq!(ready.entities[0].0, callback_id);
    }

    #[test]
    fn callbacks_never_dispatch_before_effect_is_visible() {
        let mut engine = Engine::new();
        let callback_id = engine.processor_state.camera_callbacks.lock().register();
        engine
            .camera_queue
            .submit(Command::CreateCamera {
                position: crate::entity::Vec3::ZERO,
                orientation: crate::entity::EulerAngles::ZERO,
                kind: CameraKind::default_world(),
                callback_id,
            })
            .unwrap();

        let ready = engine.tick();
        let id = ready.cameras[0].1.as_id();
        assert!(engine.camera_buffer.front().contains_key(&id));
    }

    #[test]
    fn camera_type_swap_preserves_pose_and_rebuilds_cache() {
        let mut engine = Engine::new();
        let callback_id = engine.processor_state.camera_callbacks.lock().register();
        engine
            .camera_queue
            .submit(Command::CreateCamera {
                position: crate::entity::Vec3::new(1.0, 2.0, 3.0),
                orientation: crate::entity::EulerAngles::ZERO,
                kind: CameraKind::default_world(),
                callback_id,
            })
            .unwrap();
        let ready = engine.tick();
        let id = ready.cameras[0].1.as_id();
        engine.camera_queue.submit(Command::SetActiveCamera { id }).unwrap();
        engine.tick();

        assert_eq!(engine.active_camera.id(), id);
        assert_eq!(engine.projection_cache[&id].kind.tag(), "world");

        engine
            .camera_queue
            .submit(Command::UpdateCameraType { id, kind: CameraKind::default_screen() })
            .unwrap();
        engine.tick();

        assert_eq!(engine.projection_cache[&id].kind.tag(), "screen");
        assert_eq!(engine.camera_buffer.front()[&id].position, crate::entity::Vec3::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn tool_invocation_surfaces_through_ready_callbacks() {
        let mut engine = Engine::new();
        engine
            .tool_queue
            .submit(Command::InvokeTool {
                request_id: 7,
                tool_name: "spawnCube".to_string(),
                arguments_json: "{}".to_string(),
            })
            .unwrap();

        let ready = engine.tick();

        assert_eq!(ready.tool_invocations.len(), 1);
        assert_eq!(ready.tool_invocations[0].request_id, 7);
        assert_eq!(ready.tool_invocations[0].tool_name, "spawnCube");

        // Cleared after being taken, not re-reported next frame.
        let ready = engine.tick();
        assert!(ready.tool_invocations.is_empty());
    }

    #[test]
    fn input_buffer_swaps_alongside_the_other_subsystem_buffers() {
        let mut engine = Engine::new();
        let mut snapshot = *engine.input_buffer.front();
        snapshot.keys_down[32] = true;
        *engine.input_buffer.back_mut() = snapshot;

        engine.tick();

        assert!(engine.input_buffer.front().keys_down[32]);
        assert_eq!(engine.input_buffer.total_swaps(), 1);
    }
}
