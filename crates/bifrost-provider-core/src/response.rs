use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::message::Message;
use crate::request::Params;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    Stop,
    Length,
    ToolCalls,
    ContentFilter,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Choice {
    pub index: u32,
    pub message: Message,
    pub finish_reason: FinishReason,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

/// Provider actually served, echoed params, observed latency, and (when tools
/// executed) the full reconstructed conversation — carried alongside the
/// bit-compatible response fields so callers can introspect what the
/// dispatcher actually did without the core inventing new top-level fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtraFields {
    pub provider: String,
    pub model_params: Params,
    #[serde(with = "duration_millis")]
    pub latency: Duration,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_response: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chat_history: Option<Vec<Message>>,
}

mod duration_millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u128(value.as_millis())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    pub id: String,
    pub object: String,
    pub choices: Vec<Choice>,
    pub model: String,
    pub created: i64,
    pub usage: Usage,
    pub extra_fields: ExtraFields,
}

impl Response {
    pub fn single_choice(
        id: impl Into<String>,
        object: impl Into<String>,
        model: impl Into<String>,
        created: i64,
        message: Message,
        finish_reason: FinishReason,
        usage: Usage,
        extra_fields: ExtraFields,
    ) -> Self {
        Self {
            id: id.into(),
            object: object.into(),
            model: model.into(),
            created,
            usage,
            extra_fields,
            choices: vec![Choice { index: 0, message, finish_reason }],
        }
    }
}
