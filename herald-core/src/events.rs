//! Domain event notifications.
//!
//! Diagnostics go through `tracing`; the host observes command lifecycle
//! events by installing an [`EventHandler`]. Every method has a no-op default
//! so implementations only pick out what they care about.

use crate::adapter::ScopeId;
use crate::command::argument::CancelReason;
use crate::command::BlockReason;

pub trait EventHandler: Send + Sync {
    fn command_blocked(&self, _command: &str, _reason: &BlockReason) {}

    fn command_run(&self, _command: &str) {}

    fn command_error(&self, _command: &str, _error: &anyhow::Error) {}

    fn command_cancelled(&self, _command: &str, _reason: CancelReason) {}

    /// An inbound message did not resolve to a single runnable command.
    fn unknown_command(&self, _content: &str) {}

    fn command_status_change(&self, _scope: Option<ScopeId>, _command: &str, _enabled: bool) {}

    fn group_status_change(&self, _scope: Option<ScopeId>, _group: &str, _enabled: bool) {}

    fn prefix_change(&self, _scope: Option<ScopeId>, _prefix: Option<&str>) {}
}

/// Discards every notification.
pub struct NullEventHandler;

impl EventHandler for NullEventHandler {}
