use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CredentialId(pub Uuid);

impl CredentialId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for CredentialId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CredentialId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An opaque secret value. `Debug` never prints the contents.
#[derive(Clone, Serialize, Deserialize)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(<redacted>)")
    }
}

/// A registered API credential for one provider.
///
/// Immutable once registered; updates are replace-then-swap at the pool
/// level (see `bifrost-core::selector::WeightedCredentialPool`), never
/// mutated in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credential {
    pub id: CredentialId,
    pub secret: Secret,
    /// Empty means "supports all models".
    pub supported_models: HashSet<String>,
    pub weight: f64,
}

impl Credential {
    pub fn new(secret: impl Into<String>, weight: f64) -> Self {
        Self {
            id: CredentialId::new(),
            secret: Secret::new(secret),
            supported_models: HashSet::new(),
            weight,
        }
    }

    pub fn with_models(mut self, models: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.supported_models = models.into_iter().map(Into::into).collect();
        self
    }

    pub fn supports_model(&self, model: &str) -> bool {
        self.supported_models.is_empty() || self.supported_models.contains(model)
    }
}
