use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

// ---------------------------------------------------------------------------
// Message
// ---------------------------------------------------------------------------

/// Represents a chat message. Tagged enum with System, Human, AI, Tool and Chat variants.
///
/// The cache treats messages as opaque payloads: they are handed to a
/// [`MessageMapper`] on the way in and out of the store and otherwise passed
/// through unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "role")]
pub enum Message {
    #[serde(rename = "system")]
    System {
        content: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        #[serde(default, skip_serializing_if = "HashMap::is_empty")]
        additional_kwargs: HashMap<String, Value>,
        #[serde(default, skip_serializing_if = "HashMap::is_empty")]
        response_metadata: HashMap<String, Value>,
    },
    #[serde(rename = "human")]
    Human {
        content: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        #[serde(default, skip_serializing_if = "HashMap::is_empty")]
        additional_kwargs: HashMap<String, Value>,
        #[serde(default, skip_serializing_if = "HashMap::is_empty")]
        response_metadata: HashMap<String, Value>,
    },
    #[serde(rename = "assistant")]
    AI {
        content: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        tool_calls: Vec<ToolCall>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        #[serde(default, skip_serializing_if = "HashMap::is_empty")]
        additional_kwargs: HashMap<String, Value>,
        #[serde(default, skip_serializing_if = "HashMap::is_empty")]
        response_metadata: HashMap<String, Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        usage_metadata: Option<TokenUsage>,
    },
    #[serde(rename = "tool")]
    Tool {
        content: String,
        tool_call_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        #[serde(default, skip_serializing_if = "HashMap::is_empty")]
        additional_kwargs: HashMap<String, Value>,
        #[serde(default, skip_serializing_if = "HashMap::is_empty")]
        response_metadata: HashMap<String, Value>,
    },
    #[serde(rename = "chat")]
    Chat {
        custom_role: String,
        content: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        #[serde(default, skip_serializing_if = "HashMap::is_empty")]
        additional_kwargs: HashMap<String, Value>,
        #[serde(default, skip_serializing_if = "HashMap::is_empty")]
        response_metadata: HashMap<String, Value>,
    },
}

/// Helper macro to set a shared field across all Message variants.
macro_rules! set_message_field {
    ($self:expr, $field:ident, $value:expr) => {
        match $self {
            Message::System { $field, .. } => *$field = $value,
            Message::Human { $field, .. } => *$field = $value,
            Message::AI { $field, .. } => *$field = $value,
            Message::Tool { $field, .. } => *$field = $value,
            Message::Chat { $field, .. } => *$field = $value,
        }
    };
}

/// Helper macro to get a shared field from all Message variants.
macro_rules! get_message_field {
    ($self:expr, $field:ident) => {
        match $self {
            Message::System { $field, .. } => $field,
            Message::Human { $field, .. } => $field,
            Message::AI { $field, .. } => $field,
            Message::Tool { $field, .. } => $field,
            Message::Chat { $field, .. } => $field,
        }
    };
}

impl Message {
    // -- Factory methods -----------------------------------------------------

    pub fn system(content: impl Into<String>) -> Self {
        Message::System {
            content: content.into(),
            id: None,
            name: None,
            additional_kwargs: HashMap::new(),
            response_metadata: HashMap::new(),
        }
    }

    pub fn human(content: impl Into<String>) -> Self {
        Message::Human {
            content: content.into(),
            id: None,
            name: None,
            additional_kwargs: HashMap::new(),
            response_metadata: HashMap::new(),
        }
    }

    pub fn ai(content: impl Into<String>) -> Self {
        Message::AI {
            content: content.into(),
            tool_calls: vec![],
            id: None,
            name: None,
            additional_kwargs: HashMap::new(),
            response_metadata: HashMap::new(),
            usage_metadata: None,
        }
    }

    pub fn ai_with_tool_calls(content: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        Message::AI {
            content: content.into(),
            tool_calls,
            id: None,
            name: None,
            additional_kwargs: HashMap::new(),
            response_metadata: HashMap::new(),
            usage_metadata: None,
        }
    }

    pub fn tool(content: impl Into<String>, tool_call_id: impl Into<String>) -> Self {
        Message::Tool {
            content: content.into(),
            tool_call_id: tool_call_id.into(),
            id: None,
            name: None,
            additional_kwargs: HashMap::new(),
            response_metadata: HashMap::new(),
        }
    }

    pub fn chat(role: impl Into<String>, content: impl Into<String>) -> Self {
        Message::Chat {
            custom_role: role.into(),
            content: content.into(),
            id: None,
            name: None,
            additional_kwargs: HashMap::new(),
            response_metadata: HashMap::new(),
        }
    }

    // -- Builder methods -----------------------------------------------------

    pub fn with_id(mut self, value: impl Into<String>) -> Self {
        set_message_field!(&mut self, id, Some(value.into()));
        self
    }

    pub fn with_name(mut self, value: impl Into<String>) -> Self {
        set_message_field!(&mut self, name, Some(value.into()));
        self
    }

    pub fn with_additional_kwarg(mut self, key: impl Into<String>, value: Value) -> Self {
        match &mut self {
            Message::System {
                additional_kwargs, ..
            }
            | Message::Human {
                additional_kwargs, ..
            }
            | Message::AI {
                additional_kwargs, ..
            }
            | Message::Tool {
                additional_kwargs, ..
            }
            | Message::Chat {
                additional_kwargs, ..
            } => {
                additional_kwargs.insert(key.into(), value);
            }
        }
        self
    }

    pub fn with_response_metadata_entry(mut self, key: impl Into<String>, value: Value) -> Self {
        match &mut self {
            Message::System {
                response_metadata, ..
            }
            | Message::Human {
                response_metadata, ..
            }
            | Message::AI {
                response_metadata, ..
            }
            | Message::Tool {
                response_metadata, ..
            }
            | Message::Chat {
                response_metadata, ..
            } => {
                response_metadata.insert(key.into(), value);
            }
        }
        self
    }

    pub fn with_usage_metadata(mut self, usage: TokenUsage) -> Self {
        if let Message::AI { usage_metadata, .. } = &mut self {
            *usage_metadata = Some(usage);
        }
        self
    }

    // -- Accessor methods ----------------------------------------------------

    pub fn content(&self) -> &str {
        get_message_field!(self, content)
    }

    pub fn role(&self) -> &str {
        match self {
            Message::System { .. } => "system",
            Message::Human { .. } => "human",
            Message::AI { .. } => "assistant",
            Message::Tool { .. } => "tool",
            Message::Chat { custom_role, .. } => custom_role,
        }
    }

    /// The serde tag of this variant. Unlike [`role`](Self::role) this is
    /// `"chat"` for every custom-role message.
    pub fn kind(&self) -> &'static str {
        match self {
            Message::System { .. } => "system",
            Message::Human { .. } => "human",
            Message::AI { .. } => "assistant",
            Message::Tool { .. } => "tool",
            Message::Chat { .. } => "chat",
        }
    }

    pub fn is_ai(&self) -> bool {
        matches!(self, Message::AI { .. })
    }

    pub fn tool_calls(&self) -> &[ToolCall] {
        match self {
            Message::AI { tool_calls, .. } => tool_calls,
            _ => &[],
        }
    }

    pub fn id(&self) -> Option<&str> {
        get_message_field!(self, id).as_deref()
    }

    pub fn name(&self) -> Option<&str> {
        get_message_field!(self, name).as_deref()
    }

    pub fn additional_kwargs(&self) -> &HashMap<String, Value> {
        get_message_field!(self, additional_kwargs)
    }

    pub fn response_metadata(&self) -> &HashMap<String, Value> {
        get_message_field!(self, response_metadata)
    }
}

/// A tool invocation requested by the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub total_tokens: u32,
}

// ---------------------------------------------------------------------------
// Generation
// ---------------------------------------------------------------------------

/// One output produced by a model invocation.
///
/// Plain completion models produce [`Generation::Text`]; chat models produce
/// [`Generation::Chat`], which keeps the full message alongside its text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Generation {
    Text { text: String },
    Chat { text: String, message: Message },
}

impl Generation {
    pub fn plain(text: impl Into<String>) -> Self {
        Generation::Text { text: text.into() }
    }

    /// A chat generation whose text is the message content.
    pub fn chat(message: Message) -> Self {
        Generation::Chat {
            text: message.content().to_string(),
            message,
        }
    }

    pub fn chat_with_text(text: impl Into<String>, message: Message) -> Self {
        Generation::Chat {
            text: text.into(),
            message,
        }
    }

    pub fn text(&self) -> &str {
        match self {
            Generation::Text { text } | Generation::Chat { text, .. } => text,
        }
    }

    pub fn message(&self) -> Option<&Message> {
        match self {
            Generation::Text { .. } => None,
            Generation::Chat { message, .. } => Some(message),
        }
    }
}

// ---------------------------------------------------------------------------
// Stored (durable) shapes
// ---------------------------------------------------------------------------

/// Transportable form of a chat message: a type tag plus an opaque payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredMessage {
    #[serde(rename = "type")]
    pub kind: String,
    pub data: Value,
}

/// Durable encoding of one [`Generation`].
///
/// `message` is only present for chat generations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredGeneration {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<StoredMessage>,
}

/// Converts chat messages to and from their transportable form.
///
/// The generation codec never inspects message internals; it delegates to an
/// implementation of this trait.
pub trait MessageMapper: Send + Sync {
    fn to_stored(&self, message: &Message) -> Result<StoredMessage, SynapticError>;
    fn from_stored(&self, stored: StoredMessage) -> Result<Message, SynapticError>;
}

/// [`MessageMapper`] backed by the serde representation of [`Message`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SerdeMessageMapper;

impl MessageMapper for SerdeMessageMapper {
    fn to_stored(&self, message: &Message) -> Result<StoredMessage, SynapticError> {
        let data = serde_json::to_value(message)
            .map_err(|e| SynapticError::Parsing(format!("message serialize error: {e}")))?;
        Ok(StoredMessage {
            kind: message.kind().to_string(),
            data,
        })
    }

    fn from_stored(&self, stored: StoredMessage) -> Result<Message, SynapticError> {
        let message: Message = serde_json::from_value(stored.data)
            .map_err(|e| SynapticError::Parsing(format!("message deserialize error: {e}")))?;
        if message.kind() != stored.kind {
            return Err(SynapticError::Parsing(format!(
                "stored message type '{}' does not match payload role '{}'",
                stored.kind,
                message.kind()
            )));
        }
        Ok(message)
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Unified error type for the Synaptic cache crates.
#[derive(Debug, Error)]
pub enum SynapticError {
    #[error("parsing error: {0}")]
    Parsing(String),
    #[error("cache error: {0}")]
    Cache(String),
    #[error("corrupted cache entry: {0}")]
    CacheCorruption(String),
    #[error("store error: {0}")]
    Store(String),
    #[error("config error: {0}")]
    Config(String),
}

// ---------------------------------------------------------------------------
// LlmCache trait (implementations in synaptic-cache and synaptic-redis)
// ---------------------------------------------------------------------------

/// Trait for caching model generations keyed by prompt and model identity.
///
/// `llm_key` is the model identity string: two model configurations that
/// would produce different outputs for the same prompt must use different
/// keys.
#[async_trait]
pub trait LlmCache: Send + Sync {
    /// Look up the generations cached for `(prompt, llm_key)`.
    ///
    /// `Ok(None)` is a miss. Unreadable stored data is an error, never a miss.
    async fn lookup(
        &self,
        prompt: &str,
        llm_key: &str,
    ) -> Result<Option<Vec<Generation>>, SynapticError>;

    /// Store `generations` for `(prompt, llm_key)`, replacing any previous sequence.
    async fn update(
        &self,
        prompt: &str,
        llm_key: &str,
        generations: &[Generation],
    ) -> Result<(), SynapticError>;
}
