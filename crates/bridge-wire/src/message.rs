//! Typed shapes for the client-to-server and server-to-client frames.

/// The backend a prompt targets. Defaults to `A` when the client omits it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Provider {
    A,
    B,
    C,
}

impl Provider {
    pub fn as_str(self) -> &'static str {
        match self {
            Provider::A => "A",
            Provider::B => "B",
            Provider::C => "C",
        }
    }

    pub fn parse(value: &str) -> Option<Provider> {
        match value {
            "A" => Some(Provider::A),
            "B" => Some(Provider::B),
            "C" => Some(Provider::C),
            _ => None,
        }
    }
}

impl Default for Provider {
    fn default() -> Self {
        Provider::A
    }
}

/// One inline image attachment on a prompt request.
#[derive(Debug, Clone)]
pub struct ImageAttachment {
    pub media_type: String,
    pub data: String,
}

pub const ALLOWED_MEDIA_TYPES: &[&str] = &["image/png", "image/jpeg", "image/gif", "image/webp"];

/// A validated `prompt` message.
#[derive(Debug, Clone)]
pub struct PromptRequest {
    pub prompt: String,
    pub request_id: String,
    pub provider: Provider,
    pub model: Option<String>,
    pub system_prompt: Option<String>,
    pub project_id: Option<String>,
    pub thinking_tokens: Option<u64>,
    pub images: Vec<ImageAttachment>,
}

/// A validated `cancel` message.
#[derive(Debug, Clone)]
pub struct CancelRequest {
    pub request_id: String,
}

/// A fully validated inbound frame.
#[derive(Debug, Clone)]
pub enum ClientMessage {
    Prompt(PromptRequest),
    Cancel(CancelRequest),
}

/// An outbound frame, ready for serialization.
#[derive(Debug, Clone)]
pub enum ServerMessage {
    Connected {
        version: String,
        agent: String,
    },
    Chunk {
        content: String,
        request_id: String,
        thinking: bool,
    },
    Complete {
        request_id: String,
    },
    Error {
        message: String,
        request_id: Option<String>,
    },
}

impl ServerMessage {
    pub fn connected(agent: impl Into<String>) -> Self {
        ServerMessage::Connected {
            version: "2.0".to_string(),
            agent: agent.into(),
        }
    }

    pub fn chunk(content: impl Into<String>, request_id: impl Into<String>, thinking: bool) -> Self {
        ServerMessage::Chunk {
            content: content.into(),
            request_id: request_id.into(),
            thinking,
        }
    }

    pub fn complete(request_id: impl Into<String>) -> Self {
        ServerMessage::Complete {
            request_id: request_id.into(),
        }
    }

    pub fn error(message: impl Into<String>, request_id: Option<String>) -> Self {
        ServerMessage::Error {
            message: message.into(),
            request_id,
        }
    }

    pub fn request_id(&self) -> Option<&str> {
        match self {
            ServerMessage::Chunk { request_id, .. } => Some(request_id),
            ServerMessage::Complete { request_id } => Some(request_id),
            ServerMessage::Error { request_id, .. } => request_id.as_deref(),
            ServerMessage::Connected { .. } => None,
        }
    }
}
