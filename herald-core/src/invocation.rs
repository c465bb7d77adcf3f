//! One inbound event resolved against the command set.
//!
//! An [`Invocation`] carries the resolved command (if any), the raw argument
//! string or pattern captures, and the response manifest that lets an edited
//! source message re-use and edit the responses of its previous run. The run
//! pipeline (gating, argument collection, handler execution and its hooks)
//! lives here too.

use std::collections::HashMap;
use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex};

use herald_common::util::args::{parse_arg_groups, strip_wrapping_quotes};
use tracing::debug;

use crate::adapter::{ChatAdapter, InboundMessage, SentMessage};
use crate::command::argument::CancelReason;
use crate::command::collector::CollectorOutcome;
use crate::command::{BlockReason, Command, CommandArgs, CommandCtxt, PermissionCheck};
use crate::errors::FriendlyError;
use crate::herald::Herald;

/// Where a tracked response went.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ResponseTarget {
    Channel(crate::adapter::ChannelId),
    Dm,
}

#[derive(Clone, Default)]
struct ResponseManifest {
    responses: HashMap<ResponseTarget, Vec<SentMessage>>,
    /// Cursor of the last response edited per target; -1 before any.
    positions: HashMap<ResponseTarget, isize>,
}

pub struct Invocation {
    pub message: InboundMessage,
    /// `None` when the event did not resolve to any command (and no unknown
    /// handler is registered).
    pub command: Option<Arc<Command>>,
    pub arg_string: String,
    /// Capture groups when a literal pattern matched.
    pub pattern_matches: Option<Vec<String>>,
    responses: Mutex<Option<ResponseManifest>>,
}

impl Invocation {
    pub fn new(
        message: InboundMessage,
        command: Option<Arc<Command>>,
        arg_string: String,
        pattern_matches: Option<Vec<String>>,
    ) -> Self {
        Invocation {
            message,
            command,
            arg_string,
            pattern_matches,
            responses: Mutex::new(None),
        }
    }

    /// Adopts the response manifest of the invocation a previous version of
    /// this message produced, so replies edit in place.
    pub fn inherit_responses(&self, old: &Invocation) {
        let inherited = old.responses.lock().unwrap().clone();
        *self.responses.lock().unwrap() = inherited;
    }

    /// Replies in the invocation's channel, mentioning the author in guilds.
    pub async fn reply(&self, herald: &Herald, content: &str) -> anyhow::Result<SentMessage> {
        let content = if self.message.guild_id.is_some() {
            format!("<@{}>, {content}", self.message.author.id)
        } else {
            content.to_owned()
        };
        self.respond(herald, ResponseTarget::Channel(self.message.channel_id), &content)
            .await
    }

    /// Sends a plain message to the invocation's channel.
    pub async fn say(&self, herald: &Herald, content: &str) -> anyhow::Result<SentMessage> {
        self.respond(herald, ResponseTarget::Channel(self.message.channel_id), content)
            .await
    }

    /// Sends a direct message to the invoking user.
    pub async fn direct(&self, herald: &Herald, content: &str) -> anyhow::Result<SentMessage> {
        self.respond(herald, ResponseTarget::Dm, content).await
    }

    /// Sends or, when re-running from an edit, edits the next tracked
    /// response for the target.
    async fn respond(&self, herald: &Herald, target: ResponseTarget, content: &str) -> anyhow::Result<SentMessage> {
        let edit_target = {
            let mut state = self.responses.lock().unwrap();
            state.as_mut().map(|manifest| {
                let position = manifest.positions.entry(target).or_insert(-1);
                *position += 1;
                manifest
                    .responses
                    .get(&target)
                    .and_then(|list| list.get(*position as usize))
                    .copied()
            })
        };

        match edit_target {
            Some(Some(previous)) => {
                herald
                    .adapter
                    .edit_message(previous.channel_id, previous.id, content)
                    .await
            },
            _ => match target {
                ResponseTarget::Channel(channel_id) => herald.adapter.send_message(channel_id, content).await,
                ResponseTarget::Dm => herald.adapter.send_dm(self.message.author.id, content).await,
            },
        }
    }

    /// Installs the final response manifest and deletes any leftover
    /// responses from a previous run that were not edited over.
    pub async fn finalize(&self, herald: &Herald, responses: Option<&[SentMessage]>) {
        let leftovers: Vec<SentMessage> = {
            let mut state = self.responses.lock().unwrap();

            let mut leftovers = Vec::new();
            if let Some(manifest) = state.take() {
                let positions = manifest.positions;
                for (target, list) in manifest.responses {
                    let cursor = positions.get(&target).copied().unwrap_or(-1);
                    let keep = (cursor + 1).max(0) as usize;
                    leftovers.extend(list.into_iter().skip(keep));
                }
            }

            let mut manifest = ResponseManifest::default();
            if let Some(responses) = responses {
                for sent in responses {
                    let target = if sent.dm {
                        ResponseTarget::Dm
                    } else {
                        ResponseTarget::Channel(sent.channel_id)
                    };
                    manifest.responses.entry(target).or_default().push(*sent);
                    manifest.positions.entry(target).or_insert(-1);
                }
            }
            *state = Some(manifest);
            leftovers
        };

        for sent in leftovers {
            let _ = herald.adapter.delete_message(sent.channel_id, sent.id).await;
        }
    }

    /// Runs the resolved command through gating, argument collection and the
    /// handler, returning whatever responses the run produced.
    pub async fn run(&self, herald: &Herald) -> anyhow::Result<Option<Vec<SentMessage>>> {
        let command = self
            .command
            .clone()
            .expect("run() requires an invocation with a resolved command");
        let cx = CommandCtxt {
            herald,
            invocation: self,
        };

        if let PermissionCheck::Denied(response) = command.handler.has_permission(&cx, &command).await {
            return self.block(&cx, &command, BlockReason::Permission(response)).await;
        }
        if command.spec.guild_only && self.message.guild_id.is_none() {
            return self.block(&cx, &command, BlockReason::GuildOnly).await;
        }
        if command.spec.nsfw && !herald.adapter.channel_is_nsfw(self.message.channel_id).await {
            return self.block(&cx, &command, BlockReason::Nsfw).await;
        }
        if self.message.guild_id.is_some() && !command.spec.bot_capabilities.is_empty() {
            let held = herald.adapter.bot_capabilities(self.message.channel_id).await;
            let missing: Vec<_> = command
                .spec
                .bot_capabilities
                .iter()
                .copied()
                .filter(|c| !held.contains(c))
                .collect();
            if !missing.is_empty() {
                return self.block(&cx, &command, BlockReason::BotCapabilities(missing)).await;
            }
        }

        let throttle = command.throttle(self.message.author.id, &herald.options.owners);
        if let (Some(record), Some(throttling)) = (&throttle, &command.spec.throttling) {
            if record.usages.load(Ordering::Relaxed) + 1 > throttling.usages {
                let remaining = throttling.duration.saturating_sub(record.start.elapsed());
                return self.block(&cx, &command, BlockReason::Throttling { remaining }).await;
            }
        }

        let mut values = HashMap::new();
        if self.pattern_matches.is_none() {
            if let Some(collector) = &command.collector {
                let count = match collector.args.last() {
                    Some(last) if last.infinite => None,
                    _ => Some(collector.args.len()),
                };
                let provided = parse_arg_groups(self.arg_string.trim(), count, true);
                let result = collector.obtain(&cx, &provided).await?;

                match result.outcome {
                    CollectorOutcome::Complete(collected) => values = collected,
                    CollectorOutcome::Cancelled(reason) => {
                        if result.prompts.is_empty() || reason == CancelReason::PromptLimit {
                            let sent = self.reply(herald, &self.format_error(herald, &command)).await?;
                            return Ok(Some(vec![sent]));
                        }
                        herald.events.command_cancelled(&command.spec.name, reason);
                        let sent = self.reply(herald, "Cancelled command.").await?;
                        return Ok(Some(vec![sent]));
                    },
                }
            }
        }

        let args = CommandArgs {
            values,
            pattern_matches: self.pattern_matches.clone(),
            raw: strip_wrapping_quotes(self.arg_string.trim(), true).to_owned(),
        };

        if let Some(record) = &throttle {
            record.usages.fetch_add(1, Ordering::Relaxed);
        }

        debug!("running command {}:{}", command.spec.group, command.spec.member_name);
        herald.events.command_run(&command.spec.name);
        match command.handler.run(&cx, &args).await {
            Ok(responses) => Ok(responses),
            Err(error) => {
                herald.events.command_error(&command.spec.name, &error);
                if let Some(friendly) = error.downcast_ref::<FriendlyError>() {
                    let sent = self.reply(herald, friendly.message()).await?;
                    Ok(Some(vec![sent]))
                } else {
                    command.handler.on_error(&cx, &command, &error).await
                }
            },
        }
    }

    async fn block(
        &self,
        cx: &CommandCtxt<'_>,
        command: &Command,
        reason: BlockReason,
    ) -> anyhow::Result<Option<Vec<SentMessage>>> {
        cx.herald.events.command_blocked(&command.spec.name, &reason);
        command.handler.on_block(cx, command, &reason).await
    }

    /// The friendly "invalid usage" message shown when collection never got
    /// off the ground or ran out of prompts.
    fn format_error(&self, herald: &Herald, command: &Command) -> String {
        let prefix = herald.calling_prefix(self.message.guild_id);
        let name = &command.spec.name;
        let usage = match &command.format {
            Some(format) => format!("{prefix}{name} {format}"),
            None => format!("{prefix}{name}"),
        };
        format!(
            "Invalid command usage. The accepted format of the `{name}` command is: `{usage}`. \
             Use `{prefix}help {name}` for more information."
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::{herald, message, MockAdapter};

    #[tokio::test]
    async fn finalize_installs_manifest_and_reruns_edit_in_order() {
        let adapter = MockAdapter::new();
        let client = herald(adapter.clone());

        let first = Invocation::new(message(1, 10, 20, Some(7), "!x"), None, String::new(), None);
        let a = adapter.send_message(20, "one").await.unwrap();
        let b = adapter.send_message(20, "two").await.unwrap();
        first.finalize(&client, Some(&[a, b])).await;
        assert!(adapter.deleted.lock().unwrap().is_empty());

        let second = Invocation::new(message(1, 10, 20, Some(7), "!x edited"), None, String::new(), None);
        second.inherit_responses(&first);

        // the re-run's first reply edits response `a` in place
        let edited = second.reply(&client, "one again").await.unwrap();
        assert_eq!(edited.id, a.id);
        assert_eq!(adapter.edits.lock().unwrap().len(), 1);

        // finalizing with only the first response deletes the leftover `b`
        second.finalize(&client, Some(&[edited])).await;
        assert_eq!(adapter.deleted.lock().unwrap().as_slice(), &[b.id]);
    }

    #[tokio::test]
    async fn finalize_with_nothing_deletes_all_previous_responses() {
        let adapter = MockAdapter::new();
        let client = herald(adapter.clone());

        let invocation = Invocation::new(message(1, 10, 20, Some(7), "!x"), None, String::new(), None);
        let a = adapter.send_message(20, "one").await.unwrap();
        invocation.finalize(&client, Some(&[a])).await;

        invocation.finalize(&client, None).await;
        assert_eq!(adapter.deleted.lock().unwrap().as_slice(), &[a.id]);
    }

    #[tokio::test]
    async fn replies_mention_the_author_only_in_guilds() {
        let adapter = MockAdapter::new();
        let client = herald(adapter.clone());

        let guild = Invocation::new(message(1, 10, 20, Some(7), "!x"), None, String::new(), None);
        guild.reply(&client, "hi").await.unwrap();
        assert_eq!(adapter.last_sent().unwrap(), "<@10>, hi");

        let dm = Invocation::new(message(2, 10, 20, None, "x"), None, String::new(), None);
        dm.reply(&client, "hi").await.unwrap();
        assert_eq!(adapter.last_sent().unwrap(), "hi");
    }

    #[tokio::test]
    async fn direct_responses_are_tracked_separately_from_channel_ones() {
        let adapter = MockAdapter::new();
        let client = herald(adapter.clone());

        let invocation = Invocation::new(message(1, 10, 20, Some(7), "!x"), None, String::new(), None);
        let in_channel = invocation.say(&client, "public").await.unwrap();
        let in_dm = invocation.direct(&client, "private").await.unwrap();
        assert!(!in_channel.dm);
        assert!(in_dm.dm);

        invocation.finalize(&client, Some(&[in_channel, in_dm])).await;

        let edited = Invocation::new(message(1, 10, 20, Some(7), "!x edited"), None, String::new(), None);
        edited.inherit_responses(&invocation);
        let redone = edited.direct(&client, "private again").await.unwrap();
        assert_eq!(redone.id, in_dm.id);
    }
}
