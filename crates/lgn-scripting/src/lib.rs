//! The async scripting bridge: typed state maps, the command queue, the
//! command processor, the callback registry, the frame orchestrator, and
//! the script-boundary adapters that embed `rhai` as the engine's one
//! concrete script runtime.

#![warn(missing_docs)]

pub mod adapters;
pub mod audio;
pub mod callback;
pub mod camera;
pub mod command;
pub mod debug;
pub mod entity;
pub mod ids;
pub mod input;
pub mod orchestrator;
pub mod processor;
pub mod runtime;

pub use orchestrator::{Engine, ReadyCallbacks};
pub use processor::ToolInvocation;
