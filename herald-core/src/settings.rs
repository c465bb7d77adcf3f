//! Per-scope settings persistence contract.
//!
//! The core itself never reads settings; built-in commands such as `prefix`
//! persist through this trait. `scope: None` addresses the reserved global
//! scope.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use crate::adapter::ScopeId;
use crate::herald::Herald;

#[async_trait]
pub trait SettingProvider: Send + Sync {
    /// Called once when the provider is installed on a client.
    async fn init(&self, client: &Herald) -> anyhow::Result<()>;

    /// Called when the client shuts down.
    async fn destroy(&self) -> anyhow::Result<()>;

    async fn get(&self, scope: Option<ScopeId>, key: &str, default: Option<Value>) -> Option<Value>;

    async fn set(&self, scope: Option<ScopeId>, key: &str, value: Value) -> anyhow::Result<()>;

    async fn remove(&self, scope: Option<ScopeId>, key: &str) -> anyhow::Result<Option<Value>>;

    async fn clear(&self, scope: Option<ScopeId>) -> anyhow::Result<()>;
}

/// Keeps settings in memory. Good enough for tests and hosts that do not
/// need persistence across restarts.
#[derive(Default)]
pub struct MemoryProvider {
    store: Mutex<HashMap<Option<ScopeId>, HashMap<String, Value>>>,
}

impl MemoryProvider {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SettingProvider for MemoryProvider {
    async fn init(&self, _client: &Herald) -> anyhow::Result<()> {
        Ok(())
    }

    async fn destroy(&self) -> anyhow::Result<()> {
        Ok(())
    }

    async fn get(&self, scope: Option<ScopeId>, key: &str, default: Option<Value>) -> Option<Value> {
        self.store
            .lock()
            .unwrap()
            .get(&scope)
            .and_then(|settings| settings.get(key).cloned())
            .or(default)
    }

    async fn set(&self, scope: Option<ScopeId>, key: &str, value: Value) -> anyhow::Result<()> {
        self.store
            .lock()
            .unwrap()
            .entry(scope)
            .or_default()
            .insert(key.to_owned(), value);
        Ok(())
    }

    async fn remove(&self, scope: Option<ScopeId>, key: &str) -> anyhow::Result<Option<Value>> {
        Ok(self
            .store
            .lock()
            .unwrap()
            .get_mut(&scope)
            .and_then(|settings| settings.remove(key)))
    }

    async fn clear(&self, scope: Option<ScopeId>) -> anyhow::Result<()> {
        self.store.lock().unwrap().remove(&scope);
        Ok(())
    }
}
