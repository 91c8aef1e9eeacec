//! Prompt/cancel dispatch (C7 + C8): routes a validated frame to the
//! right runner, and translates runner events back into outbound frames,
//! maintaining the "exactly one terminal event per request id" invariant.

use bridge_runner::{EventSender, RunOptions, RunnerEvent};
use bridge_wire::{CancelRequest, PromptRequest, ServerMessage};

use crate::connection::ConnectionState;
use crate::factory::RunnerFactories;

/// Handles a `prompt` frame. Returns `Some(message)` when dispatch itself
/// produces an immediate reply (the duplicate-id error); on success the
/// runner's events arrive later through `events` and are turned into
/// frames by [`translate_runner_event`].
pub async fn handle_prompt(
    state: &mut ConnectionState,
    factories: &RunnerFactories,
    prompt: PromptRequest,
    events: EventSender,
) -> Option<ServerMessage> {
    if state.has_request(&prompt.request_id) {
        return Some(ServerMessage::error(
            format!("Request {} is already in progress", prompt.request_id),
            Some(prompt.request_id),
        ));
    }

    let provider = prompt.provider;
    let request_id = prompt.request_id.clone();
    state.register_request(request_id.clone(), provider);

    let options = RunOptions {
        request_id: request_id.clone(),
        prompt: prompt.prompt,
        model: prompt.model,
        system_prompt: prompt.system_prompt,
        project_id: prompt.project_id,
        thinking_tokens: prompt.thinking_tokens,
        images: prompt.images,
    };

    let runner = state.runner_for(provider, factories);
    runner.run(options, events).await;
    None
}

/// Handles a `cancel` frame. Always produces an immediate reply: either
/// "no active request" or "Request cancelled". The runner's own terminal
/// event for the killed execution is suppressed by its `killed` flag, so
/// no further frame follows for this id.
pub async fn handle_cancel(state: &mut ConnectionState, factories: &RunnerFactories, cancel: CancelRequest) -> ServerMessage {
    match state.remove_request(&cancel.request_id) {
        Some(provider) => {
            let runner = state.runner_for(provider, factories);
            runner.kill().await;
            ServerMessage::error("Request cancelled", Some(cancel.request_id))
        }
        None => ServerMessage::error(
            format!("No active request with id: {}", cancel.request_id),
            Some(cancel.request_id),
        ),
    }
}

/// Translates one runner event into an outbound frame, removing the
/// request from the registry on a terminal event (`complete` or
/// `error`), matching the "removed exactly once" invariant.
pub fn translate_runner_event(state: &mut ConnectionState, event: RunnerEvent) -> ServerMessage {
    match event {
        RunnerEvent::Chunk { request_id, content, thinking } => ServerMessage::chunk(content, request_id, thinking),
        RunnerEvent::Complete { request_id } => {
            state.remove_request(&request_id);
            ServerMessage::complete(request_id)
        }
        RunnerEvent::Error { request_id, message } => {
            state.remove_request(&request_id);
            ServerMessage::error(message, Some(request_id))
        }
    }
}
