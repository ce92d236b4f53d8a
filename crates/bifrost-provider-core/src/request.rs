use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::message::Message;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestKind {
    Chat,
    Text,
    Embedding,
    Speech,
    Transcription,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EmbeddingInput {
    Single(String),
    Batch(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioInput {
    pub bytes: Vec<u8>,
    pub format: String,
}

/// Exactly one variant is populated per request; enforced by
/// [`RequestSpec::validate`], never by the type system alone, because the
/// wire format (and plugins rewriting specs mid-pipeline) needs a single flat
/// struct to mutate.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequestInput {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub messages: Option<Vec<Message>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<EmbeddingInput>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio: Option<AudioInput>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolChoice {
    None,
    Auto,
    Any,
    Required,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ToolChoiceValue {
    Mode(ToolChoice),
    Function { name: String },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolSchema {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub parameters: Value,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Params {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_k: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_sequences: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub presence_penalty: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency_penalty: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<ToolSchema>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<ToolChoiceValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parallel_tool_calls: Option<bool>,
    /// Unknown parameters are passed through opaquely to the provider codec.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FallbackTarget {
    pub provider: String,
    pub model: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestSpec {
    pub provider: String,
    pub model: String,
    pub kind: RequestKind,
    pub input: RequestInput,
    #[serde(default)]
    pub params: Params,
    #[serde(default)]
    pub fallbacks: Vec<FallbackTarget>,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RequestSpecError {
    #[error("request kind {kind:?} requires exactly one matching input variant")]
    InvalidInput { kind: RequestKind },
}

impl RequestSpec {
    /// Enforces the "exactly one input variant is set" invariant for the
    /// request's declared kind.
    pub fn validate(&self) -> Result<(), RequestSpecError> {
        let ok = match self.kind {
            RequestKind::Chat => {
                self.input.messages.is_some()
                    && self.input.text.is_none()
                    && self.input.embedding.is_none()
                    && self.input.audio.is_none()
            }
            RequestKind::Text => {
                self.input.text.is_some()
                    && self.input.messages.is_none()
                    && self.input.embedding.is_none()
                    && self.input.audio.is_none()
            }
            RequestKind::Embedding => {
                self.input.embedding.is_some()
                    && self.input.messages.is_none()
                    && self.input.text.is_none()
                    && self.input.audio.is_none()
            }
            RequestKind::Speech | RequestKind::Transcription => {
                self.input.audio.is_some()
                    && self.input.messages.is_none()
                    && self.input.text.is_none()
                    && self.input.embedding.is_none()
            }
        };
        if ok {
            Ok(())
        } else {
            Err(RequestSpecError::InvalidInput { kind: self.kind })
        }
    }

    pub fn pop_fallback(&mut self) -> Option<FallbackTarget> {
        if self.fallbacks.is_empty() {
            None
        } else {
            Some(self.fallbacks.remove(0))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chat_spec(messages: Option<Vec<Message>>) -> RequestSpec {
        RequestSpec {
            provider: "openai".into(),
            model: "gpt-4o".into(),
            kind: RequestKind::Chat,
            input: RequestInput {
                messages,
                ..Default::default()
            },
            params: Params::default(),
            fallbacks: Vec::new(),
        }
    }

    #[test]
    fn chat_with_messages_is_valid() {
        let spec = chat_spec(Some(vec![Message::user("hi")]));
        assert!(spec.validate().is_ok());
    }

    #[test]
    fn chat_without_messages_is_invalid() {
        let spec = chat_spec(None);
        assert_eq!(
            spec.validate(),
            Err(RequestSpecError::InvalidInput { kind: RequestKind::Chat })
        );
    }

    #[test]
    fn conflicting_variants_are_invalid() {
        let mut spec = chat_spec(Some(vec![Message::user("hi")]));
        spec.input.text = Some("also text".into());
        assert!(spec.validate().is_err());
    }

    #[test]
    fn pop_fallback_consumes_left_to_right() {
        let mut spec = chat_spec(Some(vec![Message::user("hi")]));
        spec.fallbacks = vec![
            FallbackTarget { provider: "a".into(), model: "m1".into() },
            FallbackTarget { provider: "b".into(), model: "m2".into() },
        ];
        assert_eq!(spec.pop_fallback().unwrap().provider, "a");
        assert_eq!(spec.pop_fallback().unwrap().provider, "b");
        assert!(spec.pop_fallback().is_none());
    }
}
