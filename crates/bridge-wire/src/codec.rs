//! Frame parsing and serialization.
//!
//! Validation runs in the exact order laid out for each message type —
//! callers rely on the first failing check surfacing, not just any
//! failing check, since the error text differs per step.

use serde_json::Value;

use crate::error::{truncate_type_value, CodecError};
use crate::message::{
    CancelRequest, ClientMessage, ImageAttachment, PromptRequest, Provider, ServerMessage,
    ALLOWED_MEDIA_TYPES,
};

const MAX_PROMPT_BYTES: usize = 512 * 1024;
const MAX_SYSTEM_PROMPT_BYTES: usize = 64 * 1024;
const MAX_PROJECT_ID_CHARS: usize = 128;
const MAX_IMAGES: usize = 4;
const MAX_IMAGE_DATA_BYTES: usize = 10 * 1024 * 1024;

pub fn parse_client_message(input: &str) -> Result<ClientMessage, CodecError> {
    let value: Value = serde_json::from_str(input).map_err(|_| CodecError::InvalidJson)?;
    let obj = value.as_object().ok_or(CodecError::NotAnObject)?;

    let type_value = obj.get("type").and_then(Value::as_str).ok_or(CodecError::MissingType)?;

    match type_value {
        "prompt" => parse_prompt(obj).map(ClientMessage::Prompt),
        "cancel" => parse_cancel(obj).map(ClientMessage::Cancel),
        other => Err(CodecError::UnknownType(truncate_type_value(other))),
    }
}

fn parse_prompt(obj: &serde_json::Map<String, Value>) -> Result<PromptRequest, CodecError> {
    // (a) non-empty prompt
    let prompt = obj.get("prompt").and_then(Value::as_str).unwrap_or("");
    if prompt.is_empty() {
        return Err(CodecError::EmptyPrompt);
    }

    // (b) prompt byte length <= 512 KiB as UTF-8
    if prompt.len() > MAX_PROMPT_BYTES {
        return Err(CodecError::PromptTooLarge);
    }
    let prompt = prompt.to_string();

    // (c) non-empty requestId
    let request_id = obj.get("requestId").and_then(Value::as_str).unwrap_or("");
    if request_id.is_empty() {
        return Err(CodecError::EmptyRequestId);
    }
    let request_id = request_id.to_string();

    // (d) systemPrompt, if present and a string, <= 64 KiB
    let system_prompt = match obj.get("systemPrompt") {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => {
            if s.len() > MAX_SYSTEM_PROMPT_BYTES {
                return Err(CodecError::SystemPromptTooLarge);
            }
            Some(s.clone())
        }
        Some(_) => None,
    };

    // (e) projectId, if present and a string, length <= 128 then pattern match
    let project_id = match obj.get("projectId") {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => {
            if s.chars().count() > MAX_PROJECT_ID_CHARS {
                return Err(CodecError::ProjectIdTooLong);
            }
            if !is_valid_project_id(s) {
                return Err(CodecError::ProjectIdInvalid);
            }
            Some(s.clone())
        }
        Some(_) => None,
    };

    // (f) provider, if present as a string, must be a known tag
    let provider = match obj.get("provider") {
        None | Some(Value::Null) => Provider::default(),
        Some(Value::String(s)) => {
            Provider::parse(s).ok_or_else(|| CodecError::UnsupportedProvider(s.clone()))?
        }
        Some(_) => Provider::default(),
    };

    // (g) images, if a non-empty array
    let images = match obj.get("images") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) if items.is_empty() => Vec::new(),
        Some(Value::Array(items)) => parse_images(items)?,
        Some(_) => Vec::new(),
    };

    // thinkingTokens: accepted only when a non-negative number
    let thinking_tokens = obj
        .get("thinkingTokens")
        .and_then(Value::as_u64);

    Ok(PromptRequest {
        prompt,
        request_id,
        provider,
        model: obj.get("model").and_then(Value::as_str).map(str::to_string),
        system_prompt,
        project_id,
        thinking_tokens,
        images,
    })
}

fn parse_images(items: &[Value]) -> Result<Vec<ImageAttachment>, CodecError> {
    if items.len() > MAX_IMAGES {
        return Err(CodecError::TooManyImages);
    }

    let mut images = Vec::with_capacity(items.len());
    for (i, item) in items.iter().enumerate() {
        let obj = item.as_object().ok_or(CodecError::ImageNotObject(i))?;
        let media_type = obj
            .get("media_type")
            .and_then(Value::as_str)
            .ok_or(CodecError::ImageMediaTypeInvalid(i))?;
        if !ALLOWED_MEDIA_TYPES.contains(&media_type) {
            return Err(CodecError::ImageMediaTypeInvalid(i));
        }
        let data = obj
            .get("data")
            .and_then(Value::as_str)
            .ok_or(CodecError::ImageDataInvalid(i))?;
        if data.len() > MAX_IMAGE_DATA_BYTES {
            return Err(CodecError::ImageDataTooLarge(i));
        }
        images.push(ImageAttachment {
            media_type: media_type.to_string(),
            data: data.to_string(),
        });
    }
    Ok(images)
}

fn parse_cancel(obj: &serde_json::Map<String, Value>) -> Result<CancelRequest, CodecError> {
    let request_id = obj.get("requestId").and_then(Value::as_str).unwrap_or("");
    if request_id.is_empty() {
        return Err(CodecError::EmptyRequestId);
    }
    Ok(CancelRequest {
        request_id: request_id.to_string(),
    })
}

fn is_valid_project_id(value: &str) -> bool {
    !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '-')
}

pub fn serialize_server_message(message: &ServerMessage) -> String {
    let value = match message {
        ServerMessage::Connected { version, agent } => serde_json::json!({
            "type": "connected",
            "version": version,
            "agent": agent,
        }),
        ServerMessage::Chunk {
            content,
            request_id,
            thinking,
        } => {
            if *thinking {
                serde_json::json!({
                    "type": "chunk",
                    "content": content,
                    "requestId": request_id,
                    "thinking": true,
                })
            } else {
                serde_json::json!({
                    "type": "chunk",
                    "content": content,
                    "requestId": request_id,
                })
            }
        }
        ServerMessage::Complete { request_id } => serde_json::json!({
            "type": "complete",
            "requestId": request_id,
        }),
        ServerMessage::Error { message, request_id } => match request_id {
            Some(id) => serde_json::json!({
                "type": "error",
                "message": message,
                "requestId": id,
            }),
            None => serde_json::json!({
                "type": "error",
                "message": message,
            }),
        },
    };
    value.to_string()
}
