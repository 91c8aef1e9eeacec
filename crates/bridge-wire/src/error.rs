use thiserror::Error;

/// Every way an inbound frame can fail validation.
///
/// `Display` renders the exact human-readable message the gateway puts on
/// the wire in an `error` frame, so this type doubles as the message
/// source of truth — nothing downstream reformats these strings.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("Invalid JSON")]
    InvalidJson,

    #[error("Message must be a JSON object")]
    NotAnObject,

    #[error("Missing or invalid 'type' field")]
    MissingType,

    #[error("Unknown message type: {0}")]
    UnknownType(String),

    #[error("prompt must not be empty")]
    EmptyPrompt,

    #[error("prompt exceeds maximum size of 512 KiB")]
    PromptTooLarge,

    #[error("requestId must not be empty")]
    EmptyRequestId,

    #[error("systemPrompt exceeds maximum size of 64 KiB")]
    SystemPromptTooLarge,

    #[error("projectId exceeds maximum length of 128 characters")]
    ProjectIdTooLong,

    #[error("projectId contains invalid characters")]
    ProjectIdInvalid,

    #[error("unsupported provider: {0} (expected one of: A, B, C)")]
    UnsupportedProvider(String),

    #[error("images: maximum of 4 images allowed")]
    TooManyImages,

    #[error("images[{0}] must be an object")]
    ImageNotObject(usize),

    #[error("images[{0}].media_type must be one of: image/png, image/jpeg, image/gif, image/webp")]
    ImageMediaTypeInvalid(usize),

    #[error("images[{0}].data exceeds maximum size of 10 MiB")]
    ImageDataTooLarge(usize),

    #[error("images[{0}].data must be a string")]
    ImageDataInvalid(usize),
}

const MAX_TYPE_VALUE_CHARS: usize = 50;

/// Truncates an arbitrary `type` value to the 50-char limit spec.md calls
/// for in the "Unknown message type" error.
pub fn truncate_type_value(value: &str) -> String {
    if value.chars().count() <= MAX_TYPE_VALUE_CHARS {
        value.to_string()
    } else {
        value.chars().take(MAX_TYPE_VALUE_CHARS).collect()
    }
}
