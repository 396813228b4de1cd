//! Single-producer/single-consumer command queue: the only channel a
//! scripted mutation intent travels from the script worker thread to the
//! main thread's command processor.

use crossbeam_queue::ArrayQueue;

use crate::audio::AudioUpdate;
use crate::camera::CameraKind;
use crate::debug::{DebugGeometry, RenderMode};
use crate::entity::{EntityRecord, EntityUpdate, EulerAngles, Rgba8, Vec3};

/// One mutation intent, tagged by variant. Carries its own callback id for
/// CREATE_* commands so the processor can notify the callback registry once
/// the new record's id is assigned.
#[derive(Debug, Clone)]
pub enum Command {
    /// Allocate a new entity with the given initial fields.
    CreateEntity {
        /// Initial record to insert (before id assignment).
        record: EntityRecord,
        /// Callback id to notify with the assigned entity id.
        callback_id: u64,
    },
    /// Apply a partial update to an existing entity.
    UpdateEntity {
        /// Target entity id.
        id: u64,
        /// Fields to overwrite; absent fields are preserved.
        update: EntityUpdate,
    },
    /// Remove an entity entirely.
    DestroyEntity {
        /// Target entity id.
        id: u64,
    },
    /// Allocate a new camera.
    CreateCamera {
        /// Initial position.
        position: Vec3,
        /// Initial orientation.
        orientation: EulerAngles,
        /// Initial projection variant.
        kind: CameraKind,
        /// Callback id to notify with the assigned camera id.
        callback_id: u64,
    },
    /// Atomically update a camera's position and orientation together.
    UpdateCamera {
        /// Target camera id.
        id: u64,
        /// New position.
        position: Vec3,
        /// New orientation.
        orientation: EulerAngles,
    },
    /// Legacy, documented-racy position-only camera update.
    UpdateCameraPosition {
        /// Target camera id.
        id: u64,
        /// New position.
        position: Vec3,
    },
    /// Legacy, documented-racy orientation-only camera update.
    UpdateCameraOrientation {
        /// Target camera id.
        id: u64,
        /// New orientation.
        orientation: EulerAngles,
    },
    /// Reconfigure a camera's projection variant, preserving pose.
    UpdateCameraType {
        /// Target camera id.
        id: u64,
        /// New projection variant.
        kind: CameraKind,
    },
    /// Overwrite the active-camera scalar, independent of the map's key
    /// set.
    SetActiveCamera {
        /// Camera id to mark active (may not exist yet or ever).
        id: u64,
    },
    /// Remove a camera entirely. Does not touch the active-camera scalar.
    DestroyCamera {
        /// Target camera id.
        id: u64,
    },
    /// Create or update an audio source (async path: carries a callback).
    CreateSound {
        /// Sound file path.
        path: String,
        /// Callback id to notify with the assigned sound id.
        callback_id: u64,
    },
    /// Apply a partial update to an existing audio source.
    UpdateSound {
        /// Target sound id.
        id: u64,
        /// Fields to overwrite; absent fields are preserved.
        update: AudioUpdate,
    },
    /// Remove an audio source entirely.
    DestroySound {
        /// Target sound id.
        id: u64,
    },
    /// Append a debug primitive to the per-frame list.
    AddDebugPrimitive {
        /// Shape and content to draw.
        geometry: DebugGeometry,
        /// Lifetime countdown in seconds; negative is permanent.
        duration: f32,
        /// Color at the start of the lifetime.
        start_color: Rgba8,
        /// Color at the end of the lifetime.
        end_color: Rgba8,
        /// Depth-testing bucket.
        mode: RenderMode,
    },
    /// Clear the entire debug-primitive list immediately.
    ClearDebugPrimitives,
    /// A tool invocation received from the broker agent, delivered through
    /// this same pathway so scripts observe it with the same ordering
    /// guarantees as any other command.
    InvokeTool {
        /// Id the broker assigned this call; echoed back in the result.
        request_id: u64,
        /// Name of the registered tool to invoke.
        tool_name: String,
        /// Call arguments, still JSON-encoded — this crate stays
        /// JSON-library-agnostic, so decoding happens at the script
        /// binding.
        arguments_json: String,
    },
}

/// Error returned by [`CommandQueue::submit`] when the queue is saturated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("command queue is full")]
pub struct QueueFull;

/// Bounded single-producer/single-consumer ring of [`Command`]s.
///
/// `submit` is lock-free and never blocks; on a full queue it returns
/// [`QueueFull`] and leaves the queue untouched — backpressure is a design
/// feature, not a reason to retry internally. `drain` pops
/// every currently-visible command in FIFO order and must only be called
/// from the main thread.
pub struct CommandQueue {
    ring: ArrayQueue<Command>,
}

impl CommandQueue {
    /// Construct a queue with the given fixed capacity (render ≈1000,
    /// debug ≈500 as practical defaults).
    pub fn new(capacity: usize) -> Self {
        Self { ring: ArrayQueue::new(capacity) }
    }

    /// Submit a command. Returns `Err(QueueFull)` without modifying the
    /// queue if it is saturated; the caller decides whether to retry, drop,
    /// or report.
    pub fn submit(&self, command: Command) -> Result<(), QueueFull> {
        self.ring.push(command).map_err(|_| QueueFull)
    }

    /// Pop every currently-visible command and invoke `handler` on each, in
    /// FIFO order. Call only from the main thread.
    pub fn drain(&self, mut handler: impl FnMut(Command)) {
        while let Some(command) = self.ring.pop() {
            handler(command);
        }
    }

    /// Fixed capacity this queue was constructed with.
    pub fn capacity(&self) -> usize {
        self.ring.capacity()
    }

    /// Approximate number of commands currently queued.
    pub fn approximate_size(&self) -> usize {
        self.ring.len()
    }

    /// Whether the queue currently holds no commands.
    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    /// Whether the queue is at capacity.
    pub fn is_full(&self) -> bool {
        self.ring.is_full()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fifo_delivery_order() {
        let queue = CommandQueue::new(4);
        queue.submit(Command::DestroyEntity { id: 1 }).unwrap();
        queue.submit(Command::DestroyEntity { id: 2 }).unwrap();
        queue.submit(Command::DestroyEntity { id: 3 }).unwrap();

        let mut seen = Vec::new();
        queue.drain(|cmd| {
            if let Command::DestroyEntity { id } = cmd {
                seen.push(id);
            }
        });
        assert_eq!(seen, vec![1, 2, 3]);
    }

    #[test]
    fn backpressure_rejects_past_capacity_without_mutating_state() {
        let queue = CommandQueue::new(2);
        assert!(queue.submit(Command::DestroyEntity { id: 1 }).is_ok());
        assert!(queue.submit(Command::DestroyEntity { id: 2 }).is_ok());
        assert_eq!(queue.submit(Command::DestroyEntity { id: 3 }), Err(QueueFull));
        assert_eq!(queue.approximate_size(), 2);
        assert!(queue.is_full());
    }
}
