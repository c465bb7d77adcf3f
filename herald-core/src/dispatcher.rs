//! The dispatch pipeline.
//!
//! [`Dispatcher::handle`] turns a raw inbound message into a resolved
//! [`Invocation`]: admission filtering, pattern/prefix parsing, the
//! inhibitor chain, the enablement gate, execution and response caching.
//! The response cache keyed by source message id is what a later edit of the
//! same message looks up to re-run against.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;

use futures_util::future::BoxFuture;
use herald_common::config::HeraldOptions;
use moka::sync::Cache;
use regex::Regex;
use tracing::debug;

use crate::adapter::{ChannelId, ChatAdapter, InboundMessage, MessageId, SentMessage, UserId};
use crate::command::BlockReason;
use crate::herald::Herald;
use crate::invocation::Invocation;

/// Result of an inhibitor vetoing dispatch: a reason tag and, optionally, an
/// already-in-flight response to await as the invocation's final responses.
pub struct Inhibition {
    pub reason: String,
    pub response: Option<BoxFuture<'static, anyhow::Result<SentMessage>>>,
}

impl Inhibition {
    pub fn reason(reason: impl Into<String>) -> Self {
        Inhibition {
            reason: reason.into(),
            response: None,
        }
    }

    pub fn with_response(
        reason: impl Into<String>,
        response: BoxFuture<'static, anyhow::Result<SentMessage>>,
    ) -> Self {
        Inhibition {
            reason: reason.into(),
            response: Some(response),
        }
    }
}

/// A pluggable predicate that can veto dispatch before execution.
pub trait Inhibitor: Send + Sync {
    fn inhibit(&self, herald: &Herald, invocation: &Invocation) -> Option<Inhibition>;
}

impl<F> Inhibitor for F
where
    F: Fn(&Herald, &Invocation) -> Option<Inhibition> + Send + Sync,
{
    fn inhibit(&self, herald: &Herald, invocation: &Invocation) -> Option<Inhibition> {
        self(herald, invocation)
    }
}

/// Marks (author, channel) pairs with an argument collection in flight so a
/// second message from the same pair is dropped, not interleaved.
pub(crate) struct AwaitingSet {
    inner: Mutex<HashSet<(UserId, ChannelId)>>,
}

impl AwaitingSet {
    fn new() -> Self {
        AwaitingSet {
            inner: Mutex::new(HashSet::new()),
        }
    }

    pub(crate) fn contains(&self, author: UserId, channel: ChannelId) -> bool {
        self.inner.lock().unwrap().contains(&(author, channel))
    }

    /// Marks the pair as awaited until the returned guard drops.
    pub(crate) fn acquire(&self, author: UserId, channel: ChannelId) -> AwaitingGuard<'_> {
        self.inner.lock().unwrap().insert((author, channel));
        AwaitingGuard {
            set: self,
            key: (author, channel),
        }
    }
}

pub(crate) struct AwaitingGuard<'a> {
    set: &'a AwaitingSet,
    key: (UserId, ChannelId),
}

impl Drop for AwaitingGuard<'_> {
    fn drop(&mut self) {
        self.set.inner.lock().unwrap().remove(&self.key);
    }
}

fn bare_command_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^(\S+)").unwrap())
}

pub struct Dispatcher {
    inhibitors: Mutex<Vec<(String, Box<dyn Inhibitor>)>>,
    /// Compiled prefix patterns, cached per prefix string.
    command_patterns: Mutex<HashMap<String, Regex>>,
    /// Invocations of recent messages, for edit-driven re-execution.
    results: Cache<MessageId, Arc<Invocation>>,
    pub(crate) awaiting: AwaitingSet,
}

impl Dispatcher {
    pub fn new(options: &HeraldOptions) -> Self {
        let retention = Duration::from_secs(options.command_editable_duration.max(1));
        Dispatcher {
            inhibitors: Mutex::new(Vec::new()),
            command_patterns: Mutex::new(HashMap::new()),
            results: Cache::builder().max_capacity(10_000).time_to_live(retention).build(),
            awaiting: AwaitingSet::new(),
        }
    }

    /// Adds a named inhibitor to the end of the chain. Returns false if one
    /// with the same name is already installed.
    pub fn add_inhibitor(&self, name: impl Into<String>, inhibitor: Box<dyn Inhibitor>) -> bool {
        let name = name.into();
        let mut inhibitors = self.inhibitors.lock().unwrap();
        if inhibitors.iter().any(|(n, _)| n == &name) {
            return false;
        }
        inhibitors.push((name, inhibitor));
        true
    }

    pub fn remove_inhibitor(&self, name: &str) -> bool {
        let mut inhibitors = self.inhibitors.lock().unwrap();
        let before = inhibitors.len();
        inhibitors.retain(|(n, _)| n != name);
        inhibitors.len() != before
    }

    /// The cached invocation for a message id, if it is still retained.
    pub fn cached_invocation(&self, id: MessageId) -> Option<Arc<Invocation>> {
        self.results.get(&id)
    }

    /// Handles one inbound message. `old_message` is supplied when the event
    /// is an edit of a previously seen message.
    pub async fn handle(
        &self,
        herald: &Herald,
        message: InboundMessage,
        old_message: Option<InboundMessage>,
    ) -> anyhow::Result<()> {
        if !self.should_handle(herald, &message, old_message.as_ref()) {
            return Ok(());
        }

        let mut old_invocation = None;
        let invocation = if let Some(old) = &old_message {
            old_invocation = self.results.get(&old.id);
            if old_invocation.is_none() && !herald.options.non_command_editable {
                return Ok(());
            }
            let invocation = self.parse_message(herald, &message);
            if let (Some(invocation), Some(old_invocation)) = (&invocation, &old_invocation) {
                invocation.inherit_responses(old_invocation);
            }
            invocation
        } else {
            self.parse_message(herald, &message)
        };

        // Outer None: the invocation produced nothing (still retained for
        // edits); Some(None): the handler explicitly produced a null
        // response, which evicts the cache entry.
        let mut responses: Option<Option<Vec<SentMessage>>> = None;

        if let Some(invocation) = &invocation {
            if let Some(mut inhibition) = self.inhibit(herald, invocation) {
                if let Some(deferred) = inhibition.response.take() {
                    let sent = deferred.await?;
                    responses = Some(Some(vec![sent]));
                }
            } else if let Some(command) = &invocation.command {
                if !command.is_enabled_in(message.guild_id) {
                    if !command.spec.unknown {
                        let sent = invocation
                            .reply(herald, &format!("The `{}` command is disabled.", command.spec.name))
                            .await?;
                        responses = Some(Some(vec![sent]));
                    } else {
                        herald.events.unknown_command(&invocation.arg_string);
                    }
                } else if old_message.is_none() || old_invocation.is_some() {
                    // Edits only execute when the previous version of the
                    // message already had an invocation.
                    responses = Some(invocation.run(herald).await?);
                }
            } else {
                herald.events.unknown_command(&message.content);
            }

            invocation
                .finalize(herald, responses.as_ref().and_then(|r| r.as_deref()))
                .await;
        } else if let Some(old_invocation) = &old_invocation {
            old_invocation.finalize(herald, None).await;
            if !herald.options.non_command_editable {
                self.results.invalidate(&message.id);
            }
        }

        self.cache_results(herald, &message, invocation, &responses);
        Ok(())
    }

    /// The admission filter: partial events, bot-authored events, events the
    /// bot produced itself, pairs with a pending collection, and unchanged
    /// edits are all dropped.
    fn should_handle(&self, herald: &Herald, message: &InboundMessage, old: Option<&InboundMessage>) -> bool {
        if message.partial {
            return false;
        }
        if message.author.bot || message.webhook {
            return false;
        }
        if message.author.id == herald.adapter.bot_id() {
            return false;
        }
        if self.awaiting.contains(message.author.id, message.channel_id) {
            return false;
        }
        if let Some(old) = old {
            if old.content == message.content {
                return false;
            }
        }
        true
    }

    /// Runs the inhibitor chain; the first truthy result wins and emits a
    /// block notification.
    fn inhibit(&self, herald: &Herald, invocation: &Invocation) -> Option<Inhibition> {
        let inhibitors = self.inhibitors.lock().unwrap();
        for (name, inhibitor) in inhibitors.iter() {
            if let Some(inhibition) = inhibitor.inhibit(herald, invocation) {
                debug!("inhibitor {name} blocked message {}", invocation.message.id);
                let command = invocation
                    .command
                    .as_deref()
                    .map(|c| c.spec.name.as_str())
                    .unwrap_or("");
                herald
                    .events
                    .command_blocked(command, &BlockReason::Inhibited(inhibition.reason.clone()));
                return Some(inhibition);
            }
        }
        None
    }

    /// Parses a message into an invocation: literal patterns first (in
    /// registration order), then the prefix/mention pattern, then the bare
    /// first token outside guilds.
    fn parse_message(&self, herald: &Herald, message: &InboundMessage) -> Option<Arc<Invocation>> {
        for command in herald.registry.commands() {
            for pattern in &command.spec.patterns {
                if let Some(caps) = pattern.captures(&message.content) {
                    let matches = caps
                        .iter()
                        .map(|m| m.map(|m| m.as_str().to_owned()).unwrap_or_default())
                        .collect();
                    return Some(Arc::new(Invocation::new(
                        message.clone(),
                        Some(command.clone()),
                        String::new(),
                        Some(matches),
                    )));
                }
            }
        }

        let prefix = herald.prefix_in(message.guild_id);
        let pattern = self.command_pattern(herald, &prefix);
        let mut invocation = self.match_default(herald, message, &pattern, 2, false);
        if invocation.is_none() && message.guild_id.is_none() {
            invocation = self.match_default(herald, message, bare_command_pattern(), 1, true);
        }
        invocation
    }

    /// Matches the command token of a prefix pattern and resolves it. Zero
    /// or ambiguous candidates route to the unknown-command handler.
    fn match_default(
        &self,
        herald: &Herald,
        message: &InboundMessage,
        pattern: &Regex,
        name_index: usize,
        prefixless: bool,
    ) -> Option<Arc<Invocation>> {
        let caps = pattern.captures(&message.content)?;
        let token = caps.get(name_index)?;
        let commands = herald.registry.find_commands(Some(token.as_str()), true);

        if commands.len() != 1 || !commands[0].spec.default_handling {
            let unmatched = if prefixless {
                message.content.clone()
            } else {
                message.content[caps.get(1).map_or(0, |m| m.end())..].to_owned()
            };
            return Some(Arc::new(Invocation::new(
                message.clone(),
                herald.registry.unknown_command(),
                unmatched,
                None,
            )));
        }

        let arg_string = message.content[token.end()..].to_owned();
        Some(Arc::new(Invocation::new(
            message.clone(),
            Some(commands[0].clone()),
            arg_string,
            None,
        )))
    }

    /// The compiled pattern accepting either the scope prefix or a bot
    /// mention (optionally followed by the prefix), cached per prefix.
    fn command_pattern(&self, herald: &Herald, prefix: &str) -> Regex {
        let mut patterns = self.command_patterns.lock().unwrap();
        if let Some(pattern) = patterns.get(prefix) {
            return pattern.clone();
        }
        let bot_id = herald.adapter.bot_id();
        let pattern = if prefix.is_empty() {
            Regex::new(&format!(r"(?i)^(<@!?{bot_id}>\s+)(\S+)")).unwrap()
        } else {
            let escaped = regex::escape(prefix);
            Regex::new(&format!(
                r"(?i)^(<@!?{bot_id}>\s+(?:{escaped}\s*)?|{escaped}\s*)(\S+)"
            ))
            .unwrap()
        };
        debug!("built command pattern for prefix {prefix:?}: {pattern}");
        patterns.insert(prefix.to_owned(), pattern.clone());
        pattern
    }

    /// Retains the invocation against the source message id for the edit
    /// window; a null response evicts immediately.
    fn cache_results(
        &self,
        herald: &Herald,
        message: &InboundMessage,
        invocation: Option<Arc<Invocation>>,
        responses: &Option<Option<Vec<SentMessage>>>,
    ) {
        if herald.options.command_editable_duration == 0 {
            return;
        }
        if matches!(responses, Some(None)) {
            self.results.invalidate(&message.id);
        } else if let Some(invocation) = invocation {
            self.results.insert(message.id, invocation);
        }
    }
}
