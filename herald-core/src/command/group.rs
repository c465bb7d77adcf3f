use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, RwLock};

use crate::adapter::ScopeId;

/// A named set of commands sharing enablement state.
pub struct CommandGroup {
    pub id: String,
    name: RwLock<String>,
    /// Guarded groups cannot be disabled.
    pub guarded: bool,
    enabled: AtomicBool,
    scope_enabled: Mutex<HashMap<ScopeId, bool>>,
}

impl CommandGroup {
    pub fn new(id: impl Into<String>, name: impl Into<String>, guarded: bool) -> Self {
        let id = id.into();
        assert!(!id.is_empty(), "group id must not be empty");
        assert_eq!(id, id.to_lowercase(), "group id must be lowercase");
        CommandGroup {
            id,
            name: RwLock::new(name.into()),
            guarded,
            enabled: AtomicBool::new(true),
            scope_enabled: Mutex::new(HashMap::new()),
        }
    }

    pub fn display_name(&self) -> String {
        self.name.read().unwrap().clone()
    }

    pub(crate) fn rename(&self, name: &str) {
        *self.name.write().unwrap() = name.to_owned();
    }

    pub fn is_enabled_in(&self, scope: Option<ScopeId>) -> bool {
        if self.guarded {
            return true;
        }
        let global = self.enabled.load(Ordering::Relaxed);
        match scope {
            None => global,
            Some(scope) => *self.scope_enabled.lock().unwrap().get(&scope).unwrap_or(&global),
        }
    }

    /// Enables or disables the group globally or in one scope. Fails on a
    /// guarded group.
    pub fn set_enabled_in(&self, scope: Option<ScopeId>, enabled: bool) -> anyhow::Result<()> {
        anyhow::ensure!(!self.guarded, "the group is guarded");
        match scope {
            None => self.enabled.store(enabled, Ordering::Relaxed),
            Some(scope) => {
                self.scope_enabled.lock().unwrap().insert(scope, enabled);
            },
        }
        Ok(())
    }
}
