//! The client aggregate.
//!
//! [`Herald`] owns the registry, the dispatcher, the platform adapter and
//! the per-scope prefix overrides. It is the object handlers reach through
//! for everything outside their own invocation.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use herald_common::config::HeraldOptions;
use serde_json::Value;

use crate::adapter::{ChatAdapter, InboundMessage, ScopeId, UserId};
use crate::command::group::CommandGroup;
use crate::command::registry::Registry;
use crate::command::Command;
use crate::dispatcher::Dispatcher;
use crate::events::{EventHandler, NullEventHandler};
use crate::settings::SettingProvider;

pub struct Herald {
    pub options: HeraldOptions,
    pub registry: Registry,
    pub dispatcher: Dispatcher,
    pub adapter: Arc<dyn ChatAdapter>,
    pub events: Arc<dyn EventHandler>,
    provider: tokio::sync::Mutex<Option<Box<dyn SettingProvider>>>,
    /// Global prefix override; `None` falls back to the configured default.
    global_prefix: RwLock<Option<String>>,
    /// Per-scope prefix overrides; an empty string means prefixless.
    scope_prefixes: RwLock<HashMap<ScopeId, String>>,
}

impl Herald {
    pub fn new(options: HeraldOptions, adapter: Arc<dyn ChatAdapter>) -> Arc<Self> {
        Self::with_events(options, adapter, Arc::new(NullEventHandler))
    }

    pub fn with_events(
        options: HeraldOptions,
        adapter: Arc<dyn ChatAdapter>,
        events: Arc<dyn EventHandler>,
    ) -> Arc<Self> {
        Arc::new(Herald {
            dispatcher: Dispatcher::new(&options),
            registry: Registry::new(),
            adapter,
            events,
            provider: tokio::sync::Mutex::new(None),
            global_prefix: RwLock::new(None),
            scope_prefixes: RwLock::new(HashMap::new()),
            options,
        })
    }

    /// Routes one inbound message through the dispatch pipeline. Hosts
    /// usually spawn this per event, since argument collection can suspend
    /// for as long as the configured wait windows.
    pub async fn handle(&self, message: InboundMessage, old_message: Option<InboundMessage>) -> anyhow::Result<()> {
        self.dispatcher.handle(self, message, old_message).await
    }

    pub fn is_owner(&self, user: UserId) -> bool {
        self.options.owners.contains(&user)
    }

    /// The effective prefix for a scope; empty means commands need a
    /// mention (or a bare first token in DMs).
    pub fn prefix_in(&self, scope: Option<ScopeId>) -> String {
        if let Some(scope) = scope {
            if let Some(prefix) = self.scope_prefixes.read().unwrap().get(&scope) {
                return prefix.clone();
            }
        }
        self.global_prefix
            .read()
            .unwrap()
            .clone()
            .unwrap_or_else(|| self.options.command_prefix.clone())
    }

    /// The prefix to show in usage strings: the effective prefix, or the
    /// bot mention when there is none.
    pub fn calling_prefix(&self, scope: Option<ScopeId>) -> String {
        let prefix = self.prefix_in(scope);
        if prefix.is_empty() {
            format!("<@{}> ", self.adapter.bot_id())
        } else {
            prefix
        }
    }

    pub fn set_global_prefix(&self, prefix: Option<&str>) {
        *self.global_prefix.write().unwrap() = prefix.map(str::to_owned);
        self.events.prefix_change(None, prefix);
    }

    /// Overrides the prefix for one scope; `None` removes the override so
    /// the scope inherits the global prefix again.
    pub fn set_scope_prefix(&self, scope: ScopeId, prefix: Option<&str>) {
        {
            let mut prefixes = self.scope_prefixes.write().unwrap();
            match prefix {
                Some(prefix) => {
                    prefixes.insert(scope, prefix.to_owned());
                },
                None => {
                    prefixes.remove(&scope);
                },
            }
        }
        self.events.prefix_change(Some(scope), prefix);
    }

    /// Enables or disables a command, emitting the status change event.
    pub fn set_command_enabled(&self, command: &Command, scope: Option<ScopeId>, enabled: bool) -> anyhow::Result<()> {
        command.set_enabled_in(scope, enabled)?;
        self.events.command_status_change(scope, &command.spec.name, enabled);
        Ok(())
    }

    pub fn set_group_enabled(&self, group: &CommandGroup, scope: Option<ScopeId>, enabled: bool) -> anyhow::Result<()> {
        group.set_enabled_in(scope, enabled)?;
        self.events.group_status_change(scope, &group.id, enabled);
        Ok(())
    }

    /// Installs a settings provider, initialising it against this client.
    pub async fn set_provider(&self, provider: Box<dyn SettingProvider>) -> anyhow::Result<()> {
        provider.init(self).await?;
        *self.provider.lock().await = Some(provider);
        Ok(())
    }

    /// Tears down the settings provider, if one is installed.
    pub async fn destroy(&self) -> anyhow::Result<()> {
        if let Some(provider) = self.provider.lock().await.take() {
            provider.destroy().await?;
        }
        Ok(())
    }

    pub async fn setting_get(&self, scope: Option<ScopeId>, key: &str, default: Option<Value>) -> Option<Value> {
        let provider = self.provider.lock().await;
        match provider.as_ref() {
            Some(provider) => provider.get(scope, key, default).await,
            None => default,
        }
    }

    pub async fn setting_set(&self, scope: Option<ScopeId>, key: &str, value: Value) -> anyhow::Result<()> {
        let provider = self.provider.lock().await;
        match provider.as_ref() {
            Some(provider) => provider.set(scope, key, value).await,
            None => anyhow::bail!("no settings provider is set"),
        }
    }

    pub async fn setting_remove(&self, scope: Option<ScopeId>, key: &str) -> anyhow::Result<Option<Value>> {
        let provider = self.provider.lock().await;
        match provider.as_ref() {
            Some(provider) => provider.remove(scope, key).await,
            None => anyhow::bail!("no settings provider is set"),
        }
    }
}
