//! Wires `lgn-config`, `lgn-core`, `lgn-state-buffer`, `lgn-scripting`, and
//! `lgn-broker-agent` into the fixed per-frame pipeline: tick the engine,
//! dispatch ready callbacks, advance the input snapshot, then poll the
//! broker bridge for tool invocations (this crate has no ECS/plugin system
//! to drive, so the wiring happens directly in `main`'s loop instead of
//! through a `Schedule`).

use std::sync::Arc;
use std::time::Duration;

use lgn_broker_agent::{crypto, BrokerAgent, V1Adapter};
use lgn_scripting::adapters::{AudioAdapter, CameraAdapter, DebugAdapter, EntityAdapter};
use lgn_scripting::command::Command;
use lgn_scripting::debug::DebugVisibility;
use lgn_scripting::input::InputAdapter;
use lgn_scripting::runtime::{dispatch_ready, register_script_api, CallbackTables, ScriptRuntime};
use lgn_scripting::Engine;

/// Default script compiled in when no `runtime.script_path` config key is
/// set. Defines the one hook the broker bridge calls into
/// (`onToolInvoke`); a real deployment points `runtime.script_path` at the
/// game's own script file.
const DEFAULT_SCRIPT: &str = r#"
fn onToolInvoke(toolName, argumentsJson) {
    "{\"error\":\"no handler registered for tool '" + toolName + "'\"}"
}
"#;

/// How long to sleep between frames when no broker is configured and there
/// is no real display/audio device driving the frame rate. A real
/// deployment paces `tick()` off vsync or an audio callback instead.
const FRAME_PERIOD: Duration = Duration::from_millis(16);

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let script_path: Option<String> =
        lgn_config::get("runtime.script_path").unwrap_or_else(|err| {
            tracing::warn!(error = %err, "failed to read runtime.script_path, using the built-in default script");
            None
        });
    let broker_url: Option<String> = lgn_config::get("runtime.broker_url").unwrap_or_else(|err| {
        tracing::warn!(error = %err, "failed to read runtime.broker_url, broker bridge disabled");
        None
    });

    let mut engine = Engine::new();

    let entity_adapter = Arc::new(EntityAdapter::new(
        engine.entity_queue.clone(),
        engine.processor_state.entity_callbacks.clone(),
    ));
    let camera_adapter = Arc::new(CameraAdapter::new(
        engine.camera_queue.clone(),
        engine.processor_state.camera_callbacks.clone(),
    ));
    let audio_adapter = Arc::new(AudioAdapter::new(
        engine.audio_queue.clone(),
        engine.processor_state.sound_callbacks.clone(),
    ));
    let debug_adapter = Arc::new(DebugAdapter::new(engine.debug_queue.clone(), DebugVisibility::new()));
    let input_adapter = Arc::new(InputAdapter::new(engine.input_buffer.clone()));

    let callback_tables = Arc::new(CallbackTables::default());

    let mut rhai_engine = rhai::Engine::new();
    register_script_api(
        &mut rhai_engine,
        entity_adapter,
        camera_adapter,
        audio_adapter,
        debug_adapter,
        input_adapter.clone(),
        callback_tables.clone(),
    );

    let script_source = match &script_path {
        Some(path) => std::fs::read_to_string(path).unwrap_or_else(|err| {
            tracing::error!(error = %err, path, "failed to read configured script, falling back to the built-in default");
            DEFAULT_SCRIPT.to_string()
        }),
        None => DEFAULT_SCRIPT.to_string(),
    };
    let ast = rhai_engine
        .compile(&script_source)
        .expect("script failed to compile");
    let script_runtime = ScriptRuntime::new(rhai_engine, ast);

    let mut broker_agent = broker_url.map(|url| {
        let keypair = crypto::generate_keypair().expect("failed to generate an Ed25519 keypair");
        let mut agent = BrokerAgent::new(V1Adapter::new());
        agent.connect(&url, keypair.public_key, keypair.private_key);
        agent
    });

    tracing::info!("entering the frame loop");
    loop {
        let ready = engine.tick();
        dispatch_ready(&script_runtime, &callback_tables, ready);
        input_adapter.advance_frame();

        if let Some(agent) = broker_agent.as_mut() {
            run_broker_frame(agent, &engine, &script_runtime);
        }

        std::thread::sleep(FRAME_PERIOD);
    }
}

/// Drains this frame's broker events: routes inbound tool invocations into
/// the engine's existing command pathway and replies to any
/// invocation the script handler answers synchronously. The invocation
/// itself rides the ordinary `tool_queue` so it is visible to `tick()`
/// exactly one frame before the reply is attempted, matching the rest of
/// the command-then-effect ordering the orchestrator enforces.
fn run_broker_frame(
    agent: &mut BrokerAgent<V1Adapter>,
    engine: &lgn_scripting::Engine,
    script_runtime: &ScriptRuntime,
) {
    let polled = agent.poll();

    for invocation in polled.tool_invocations {
        let arguments_json = invocation.arguments.to_string();
        if engine
            .tool_queue
            .submit(Command::InvokeTool {
                request_id: invocation.request_id,
                tool_name: invocation.tool_name.clone(),
                arguments_json: arguments_json.clone(),
            })
            .is_err()
        {
            agent.send_tool_error(invocation.request_id, "tool queue is full");
            continue;
        }

        match script_runtime.invoke_tool(&invocation.tool_name, &arguments_json) {
            Ok(result_json) => match serde_json::from_str(&result_json) {
                Ok(result) => agent.send_tool_result(invocation.request_id, &result),
                Err(err) => agent.send_tool_error(invocation.request_id, &err.to_string()),
            },
            Err(err) => agent.send_tool_error(invocation.request_id, &err),
        }
    }

    for delivery in polled.event_deliveries {
        tracing::debug!(channel = %delivery.channel, "dropped event delivery, no subscriber routing configured");
    }
}
