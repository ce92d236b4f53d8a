use std::collections::HashMap;
use std::sync::Arc;

use crate::capability::ProviderCapability;

/// Maps a provider identifier to a provider capability. Construction-time
/// only: the registry is built once at bootstrap and handed out as a shared
/// `Arc`, read-only for the lifetime of the process.
#[derive(Default, Clone)]
pub struct ProviderRegistry {
    providers: HashMap<String, Arc<dyn ProviderCapability>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, id: impl Into<String>, capability: Arc<dyn ProviderCapability>) {
        self.providers.insert(id.into(), capability);
    }

    pub fn get(&self, id: &str) -> Option<Arc<dyn ProviderCapability>> {
        self.providers.get(id).cloned()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.providers.keys().map(String::as_str)
    }
}
