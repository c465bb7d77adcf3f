//! The command system.
//!
//! The key pieces:
//!
//! - [`CommandSpec`]: declarative identity, gating and argument metadata for
//!   one command, built with a fluent constructor and validated at
//!   registration time.
//! - The [`CommandHandler`] trait: the run step plus the block, error and
//!   permission hooks, each with a spec-driven default. Handlers are stored
//!   as trait objects alongside their spec in the registry.
//! - [`Command`]: a registered command: spec, handler, argument collector
//!   and runtime state (enablement overrides, throttle records).
//! - [`CommandCtxt`]: what a handler gets to work with, namely the invocation
//!   and the client aggregate, with reply helpers that feed the invocation's
//!   response manifest.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use moka::sync::Cache;
use regex::Regex;

use crate::adapter::{Author, Capability, ChannelId, ChatAdapter, ScopeId, SentMessage, UserId};
use crate::herald::Herald;
use crate::invocation::Invocation;

use self::argument::ArgumentSpec;
use self::collector::ArgumentCollector;
use self::group::CommandGroup;
use self::types::ArgumentValue;

use async_trait::async_trait;

pub mod argument;
pub mod collector;
pub mod group;
pub mod registry;
pub mod types;

/// Usage ceiling per caller within a fixed window.
#[derive(Clone, Copy, Debug)]
pub struct Throttling {
    pub usages: u32,
    pub duration: Duration,
}

/// Declarative description of a command. Identity fields must be lowercase;
/// registration validates and panics on violations, since a malformed spec
/// is a programming error.
pub struct CommandSpec {
    pub name: String,
    pub aliases: Vec<String>,
    /// Generate dash-less aliases for dashed names automatically.
    pub auto_aliases: bool,
    pub group: String,
    pub member_name: String,
    pub description: String,
    /// Argument format string shown in usage messages; derived from the
    /// argument list when absent.
    pub format: Option<String>,
    pub details: Option<String>,
    pub examples: Vec<String>,
    pub guild_only: bool,
    pub owner_only: bool,
    pub nsfw: bool,
    pub caller_capabilities: Vec<Capability>,
    pub bot_capabilities: Vec<Capability>,
    pub throttling: Option<Throttling>,
    pub args: Vec<ArgumentSpec>,
    pub args_prompt_limit: Option<u32>,
    /// Literal patterns that bypass prefix parsing entirely.
    pub patterns: Vec<Regex>,
    /// Guarded commands cannot be disabled.
    pub guarded: bool,
    /// Hidden commands are omitted from help listings.
    pub hidden: bool,
    /// Marks this command as the designated unknown-command handler.
    pub unknown: bool,
    /// Whether an unambiguous prefix match may dispatch this command.
    pub default_handling: bool,
}

impl CommandSpec {
    pub fn new(
        name: impl Into<String>,
        group: impl Into<String>,
        member_name: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        CommandSpec {
            name: name.into(),
            aliases: Vec::new(),
            auto_aliases: true,
            group: group.into(),
            member_name: member_name.into(),
            description: description.into(),
            format: None,
            details: None,
            examples: Vec::new(),
            guild_only: false,
            owner_only: false,
            nsfw: false,
            caller_capabilities: Vec::new(),
            bot_capabilities: Vec::new(),
            throttling: None,
            args: Vec::new(),
            args_prompt_limit: None,
            patterns: Vec::new(),
            guarded: false,
            hidden: false,
            unknown: false,
            default_handling: true,
        }
    }

    #[must_use]
    pub fn aliases(mut self, aliases: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.aliases = aliases.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }

    #[must_use]
    pub fn details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    #[must_use]
    pub fn examples(mut self, examples: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.examples = examples.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn guild_only(mut self) -> Self {
        self.guild_only = true;
        self
    }

    #[must_use]
    pub fn owner_only(mut self) -> Self {
        self.owner_only = true;
        self
    }

    #[must_use]
    pub fn nsfw(mut self) -> Self {
        self.nsfw = true;
        self
    }

    #[must_use]
    pub fn caller_capabilities(mut self, capabilities: impl IntoIterator<Item = Capability>) -> Self {
        self.caller_capabilities = capabilities.into_iter().collect();
        self
    }

    #[must_use]
    pub fn bot_capabilities(mut self, capabilities: impl IntoIterator<Item = Capability>) -> Self {
        self.bot_capabilities = capabilities.into_iter().collect();
        self
    }

    #[must_use]
    pub fn throttling(mut self, usages: u32, duration: Duration) -> Self {
        self.throttling = Some(Throttling { usages, duration });
        self
    }

    #[must_use]
    pub fn args(mut self, args: Vec<ArgumentSpec>) -> Self {
        self.args = args;
        self
    }

    #[must_use]
    pub fn args_prompt_limit(mut self, limit: u32) -> Self {
        self.args_prompt_limit = Some(limit);
        self
    }

    #[must_use]
    pub fn patterns(mut self, patterns: Vec<Regex>) -> Self {
        self.patterns = patterns;
        self
    }

    #[must_use]
    pub fn guarded(mut self) -> Self {
        self.guarded = true;
        self
    }

    #[must_use]
    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    #[must_use]
    pub fn unknown(mut self) -> Self {
        self.unknown = true;
        self
    }

    #[must_use]
    pub fn default_handling(mut self, default_handling: bool) -> Self {
        self.default_handling = default_handling;
        self
    }

    pub(crate) fn validate(&self) {
        assert!(!self.name.is_empty(), "command name must not be empty");
        assert_eq!(self.name, self.name.to_lowercase(), "command name must be lowercase");
        for alias in &self.aliases {
            assert_eq!(alias, &alias.to_lowercase(), "command aliases must be lowercase");
        }
        assert_eq!(self.group, self.group.to_lowercase(), "command group must be lowercase");
        assert_eq!(
            self.member_name,
            self.member_name.to_lowercase(),
            "command member name must be lowercase"
        );
        if let Some(throttling) = &self.throttling {
            assert!(throttling.usages >= 1, "command throttling usages must be at least 1");
            assert!(
                throttling.duration >= Duration::from_secs(1),
                "command throttling duration must be at least 1 second"
            );
        }
    }
}

/// Why the pipeline refused to run a command. Expected, high-frequency
/// conditions; surfaced to the user through [`CommandHandler::on_block`].
#[derive(Clone, Debug)]
pub enum BlockReason {
    GuildOnly,
    Nsfw,
    /// Caller lacks permission; carries the specific denial message, if any.
    Permission(Option<String>),
    /// The bot itself is missing capabilities in the channel.
    BotCapabilities(Vec<Capability>),
    Throttling { remaining: Duration },
    /// An inhibitor vetoed dispatch with this reason tag.
    Inhibited(String),
}

impl BlockReason {
    pub fn tag(&self) -> &'static str {
        match self {
            BlockReason::GuildOnly => "guildOnly",
            BlockReason::Nsfw => "nsfw",
            BlockReason::Permission(_) => "permission",
            BlockReason::BotCapabilities(_) => "botCapabilities",
            BlockReason::Throttling { .. } => "throttling",
            BlockReason::Inhibited(_) => "inhibited",
        }
    }
}

/// Outcome of the permission predicate.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PermissionCheck {
    Allowed,
    /// Denied with an optional specific message.
    Denied(Option<String>),
}

/// Arguments as handed to a handler's run step.
#[derive(Clone, Debug, Default)]
pub struct CommandArgs {
    /// Collected values keyed by argument key; empty when the command has no
    /// argument collector.
    pub values: HashMap<String, ArgumentValue>,
    /// Capture groups when the invocation came from a literal pattern.
    pub pattern_matches: Option<Vec<String>>,
    /// The trimmed raw argument string with wrapping quotes removed.
    pub raw: String,
}

impl CommandArgs {
    pub fn get(&self, key: &str) -> Option<&ArgumentValue> {
        self.values.get(key)
    }

    pub fn text(&self, key: &str) -> Option<&str> {
        self.values.get(key).and_then(ArgumentValue::as_text)
    }

    pub fn integer(&self, key: &str) -> Option<i64> {
        self.values.get(key).and_then(ArgumentValue::as_integer)
    }

    pub fn boolean(&self, key: &str) -> Option<bool> {
        self.values.get(key).and_then(ArgumentValue::as_boolean)
    }
}

/// What a handler gets to work with during one invocation.
pub struct CommandCtxt<'a> {
    pub herald: &'a Herald,
    pub invocation: &'a Invocation,
}

impl CommandCtxt<'_> {
    pub fn author(&self) -> Author {
        self.invocation.message.author
    }

    pub fn channel_id(&self) -> ChannelId {
        self.invocation.message.channel_id
    }

    pub fn guild_id(&self) -> Option<ScopeId> {
        self.invocation.message.guild_id
    }

    /// Replies in the invocation's channel, mentioning the author when in a
    /// guild. Replies are tracked in the response manifest.
    pub async fn reply(&self, content: &str) -> anyhow::Result<SentMessage> {
        self.invocation.reply(self.herald, content).await
    }

    /// Sends a plain message to the invocation's channel.
    pub async fn say(&self, content: &str) -> anyhow::Result<SentMessage> {
        self.invocation.say(self.herald, content).await
    }

    /// Sends a direct message to the invoking user.
    pub async fn direct(&self, content: &str) -> anyhow::Result<SentMessage> {
        self.invocation.direct(self.herald, content).await
    }
}

/// The unit of work behind a command, with overridable hooks.
#[async_trait]
pub trait CommandHandler: Send + Sync {
    async fn run(&self, cx: &CommandCtxt<'_>, args: &CommandArgs) -> anyhow::Result<Option<Vec<SentMessage>>>;

    /// Owner override, owner-only restriction and required caller
    /// capabilities, in that order.
    async fn has_permission(&self, cx: &CommandCtxt<'_>, command: &Command) -> PermissionCheck {
        let spec = &command.spec;
        if !spec.owner_only && spec.caller_capabilities.is_empty() {
            return PermissionCheck::Allowed;
        }
        let author = cx.author().id;
        if cx.herald.is_owner(author) {
            return PermissionCheck::Allowed;
        }
        if spec.owner_only {
            return PermissionCheck::Denied(Some(format!(
                "The `{}` command can only be used by the bot owner.",
                spec.name
            )));
        }
        if cx.guild_id().is_some() && !spec.caller_capabilities.is_empty() {
            let held = cx
                .herald
                .adapter
                .member_capabilities(author, cx.channel_id())
                .await;
            let missing: Vec<Capability> = spec
                .caller_capabilities
                .iter()
                .copied()
                .filter(|c| !held.contains(c))
                .collect();
            if missing.len() == 1 {
                return PermissionCheck::Denied(Some(format!(
                    "The `{}` command requires you to have the \"{}\" permission.",
                    spec.name,
                    missing[0].human_name()
                )));
            }
            if !missing.is_empty() {
                let list = missing.iter().map(|c| c.human_name()).collect::<Vec<_>>().join(", ");
                return PermissionCheck::Denied(Some(format!(
                    "The `{}` command requires you to have the following permissions: {list}",
                    spec.name
                )));
            }
        }
        PermissionCheck::Allowed
    }

    /// Explains a gating block to the user.
    async fn on_block(
        &self,
        cx: &CommandCtxt<'_>,
        command: &Command,
        reason: &BlockReason,
    ) -> anyhow::Result<Option<Vec<SentMessage>>> {
        let name = &command.spec.name;
        let content = match reason {
            BlockReason::GuildOnly => {
                format!("The `{name}` command must be used in a server channel.")
            },
            BlockReason::Nsfw => format!("The `{name}` command can only be used in NSFW channels."),
            BlockReason::Permission(response) => match response {
                Some(response) => response.clone(),
                None => format!("You do not have permission to use the `{name}` command."),
            },
            BlockReason::BotCapabilities(missing) if missing.len() == 1 => format!(
                "I need the \"{}\" permission for the `{name}` command to work.",
                missing[0].human_name()
            ),
            BlockReason::BotCapabilities(missing) => {
                let list = missing.iter().map(|c| c.human_name()).collect::<Vec<_>>().join(", ");
                format!("I need the following permissions for the `{name}` command to work: {list}")
            },
            BlockReason::Throttling { remaining } => format!(
                "You may not use the `{name}` command again for another {:.1} seconds.",
                remaining.as_secs_f64()
            ),
            BlockReason::Inhibited(_) => return Ok(None),
        };
        let sent = cx.reply(&content).await?;
        Ok(Some(vec![sent]))
    }

    /// Reports an unexpected run failure to the user.
    async fn on_error(
        &self,
        cx: &CommandCtxt<'_>,
        _command: &Command,
        error: &anyhow::Error,
    ) -> anyhow::Result<Option<Vec<SentMessage>>> {
        let contact = match &cx.herald.options.invite {
            Some(invite) => format!("Please contact the bot owner, or join {invite}."),
            None => "Please contact the bot owner.".to_owned(),
        };
        let sent = cx
            .reply(&format!(
                "An error occurred while running the command: `{error}`\n{contact}"
            ))
            .await?;
        Ok(Some(vec![sent]))
    }
}

/// One caller's usage window for a throttled command.
pub struct ThrottleRecord {
    pub start: Instant,
    pub usages: AtomicU32,
}

/// A registered command: spec, handler and runtime state.
pub struct Command {
    pub spec: CommandSpec,
    pub handler: Box<dyn CommandHandler>,
    pub collector: Option<ArgumentCollector>,
    pub group: Arc<CommandGroup>,
    /// Effective format string (explicit or derived from the arguments).
    pub format: Option<String>,
    enabled: AtomicBool,
    scope_enabled: Mutex<HashMap<ScopeId, bool>>,
    /// Per-caller usage windows; entries expire when the window elapses.
    throttles: Option<Cache<UserId, Arc<ThrottleRecord>>>,
}

impl Command {
    pub(crate) fn assemble(
        mut spec: CommandSpec,
        handler: Box<dyn CommandHandler>,
        group: Arc<CommandGroup>,
        registry: &registry::Registry,
    ) -> Command {
        let arg_specs = std::mem::take(&mut spec.args);
        let collector = if arg_specs.is_empty() {
            None
        } else {
            Some(ArgumentCollector::new(arg_specs, spec.args_prompt_limit, registry))
        };

        let format = spec.format.clone().or_else(|| {
            collector.as_ref().map(|collector| {
                collector
                    .args
                    .iter()
                    .map(|arg| {
                        let (l, r) = if arg.default.is_some() { ("[", "]") } else { ("<", ">") };
                        let ellipsis = if arg.infinite { "..." } else { "" };
                        format!("{l}{}{ellipsis}{r}", arg.label)
                    })
                    .collect::<Vec<_>>()
                    .join(" ")
            })
        });

        let throttles = spec.throttling.as_ref().map(|throttling| {
            Cache::builder()
                .max_capacity(10_000)
                .time_to_live(throttling.duration)
                .build()
        });

        Command {
            spec,
            handler,
            collector,
            group,
            format,
            enabled: AtomicBool::new(true),
            scope_enabled: Mutex::new(HashMap::new()),
            throttles,
        }
    }

    /// Whether the command may run in the given scope, taking the group's
    /// enablement into account. Guarded commands are always enabled.
    pub fn is_enabled_in(&self, scope: Option<ScopeId>) -> bool {
        if self.spec.guarded {
            return true;
        }
        if !self.group.is_enabled_in(scope) {
            return false;
        }
        let global = self.enabled.load(Ordering::Relaxed);
        match scope {
            None => global,
            Some(scope) => *self.scope_enabled.lock().unwrap().get(&scope).unwrap_or(&global),
        }
    }

    /// Enables or disables the command globally or in one scope. Fails on a
    /// guarded command.
    pub fn set_enabled_in(&self, scope: Option<ScopeId>, enabled: bool) -> anyhow::Result<()> {
        anyhow::ensure!(!self.spec.guarded, "the command is guarded");
        match scope {
            None => self.enabled.store(enabled, Ordering::Relaxed),
            Some(scope) => {
                self.scope_enabled.lock().unwrap().insert(scope, enabled);
            },
        }
        Ok(())
    }

    /// The caller's current throttle window, creating one lazily. `None`
    /// when the command is unthrottled or the caller is an owner.
    pub(crate) fn throttle(&self, user: UserId, owners: &[UserId]) -> Option<Arc<ThrottleRecord>> {
        if owners.contains(&user) {
            return None;
        }
        let throttles = self.throttles.as_ref()?;
        Some(throttles.get_with(user, || {
            Arc::new(ThrottleRecord {
                start: Instant::now(),
                usages: AtomicU32::new(0),
            })
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::argument::ArgumentSpec;
    use super::types::ArgumentValue;
    use super::*;
    use crate::test_util::{herald, CountingHandler, MockAdapter};

    #[test]
    fn format_is_derived_from_the_argument_list() {
        let client = herald(MockAdapter::new());
        let command = client.registry.register_command(
            CommandSpec::new("fmt", "util", "fmt", "x").args(vec![
                ArgumentSpec::new("text", "string", "?"),
                ArgumentSpec::new("count", "integer", "?").default_value(ArgumentValue::Integer(1)),
                ArgumentSpec::new("rest", "string", "?")
                    .default_value(ArgumentValue::Text(String::new()))
                    .infinite(),
            ]),
            Box::new(CountingHandler::new().0),
        );
        assert_eq!(command.format.as_deref(), Some("<text> [count] [rest...]"));
    }

    #[test]
    fn explicit_format_wins_over_derivation() {
        let client = herald(MockAdapter::new());
        let command = client.registry.register_command(
            CommandSpec::new("fmt", "util", "fmt", "x")
                .format("<anything>")
                .args(vec![ArgumentSpec::new("text", "string", "?")]),
            Box::new(CountingHandler::new().0),
        );
        assert_eq!(command.format.as_deref(), Some("<anything>"));
    }

    #[test]
    fn guarded_commands_cannot_be_toggled_but_stay_enabled() {
        let client = herald(MockAdapter::new());
        let command = client.registry.register_command(
            CommandSpec::new("locked", "util", "locked", "x").guarded(),
            Box::new(CountingHandler::new().0),
        );
        assert!(command.set_enabled_in(None, false).is_err());
        assert!(command.is_enabled_in(None));
        assert!(command.is_enabled_in(Some(7)));
    }

    #[test]
    fn scope_enablement_overrides_global() {
        let client = herald(MockAdapter::new());
        let command = client.registry.register_command(
            CommandSpec::new("c", "util", "c", "x"),
            Box::new(CountingHandler::new().0),
        );
        command.set_enabled_in(Some(7), false).unwrap();
        assert!(!command.is_enabled_in(Some(7)));
        assert!(command.is_enabled_in(Some(8)));
        assert!(command.is_enabled_in(None));

        command.set_enabled_in(None, false).unwrap();
        command.set_enabled_in(Some(7), true).unwrap();
        assert!(command.is_enabled_in(Some(7)));
        assert!(!command.is_enabled_in(Some(8)));
    }

    #[test]
    fn block_reason_tags_are_stable() {
        assert_eq!(BlockReason::GuildOnly.tag(), "guildOnly");
        assert_eq!(BlockReason::Nsfw.tag(), "nsfw");
        assert_eq!(BlockReason::Permission(None).tag(), "permission");
        assert_eq!(BlockReason::BotCapabilities(vec![]).tag(), "botCapabilities");
        assert_eq!(
            BlockReason::Throttling {
                remaining: Duration::from_secs(1)
            }
            .tag(),
            "throttling"
        );
        assert_eq!(BlockReason::Inhibited("x".into()).tag(), "inhibited");
    }

    #[test]
    fn command_args_accessors() {
        let mut args = CommandArgs::default();
        args.values.insert("t".into(), ArgumentValue::Text("hi".into()));
        args.values.insert("n".into(), ArgumentValue::Integer(3));
        args.values.insert("b".into(), ArgumentValue::Boolean(true));
        assert_eq!(args.text("t"), Some("hi"));
        assert_eq!(args.integer("n"), Some(3));
        assert_eq!(args.boolean("b"), Some(true));
        assert_eq!(args.text("n"), None);
        assert!(args.get("missing").is_none());
    }
}
