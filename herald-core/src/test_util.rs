//! Shared test scaffolding: a scripted adapter, a recording event sink and a
//! counting handler.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::adapter::{
    Author, Capability, ChannelId, ChatAdapter, InboundMessage, MessageId, ScopeId, SentMessage, UserId,
};
use crate::command::argument::CancelReason;
use crate::command::{BlockReason, CommandArgs, CommandCtxt, CommandHandler};
use crate::events::EventHandler;
use crate::herald::Herald;
use herald_common::config::HeraldOptions;

pub(crate) const BOT_ID: UserId = 999;

#[derive(Clone, Debug)]
pub(crate) struct SentRecord {
    pub message: SentMessage,
    pub content: String,
}

/// Adapter with scripted replies: each `await_reply` pops the next entry,
/// `None` meaning the wait window elapsed.
pub(crate) struct MockAdapter {
    replies: Mutex<VecDeque<Option<String>>>,
    pub sent: Mutex<Vec<SentRecord>>,
    pub edits: Mutex<Vec<(MessageId, String)>>,
    pub deleted: Mutex<Vec<MessageId>>,
    pub member_caps: Mutex<HashMap<UserId, Vec<Capability>>>,
    pub bot_caps: Mutex<Vec<Capability>>,
    pub nsfw_channels: Mutex<HashSet<ChannelId>>,
    next_id: AtomicU64,
}

impl MockAdapter {
    pub fn new() -> Arc<Self> {
        Arc::new(MockAdapter {
            replies: Mutex::new(VecDeque::new()),
            sent: Mutex::new(Vec::new()),
            edits: Mutex::new(Vec::new()),
            deleted: Mutex::new(Vec::new()),
            member_caps: Mutex::new(HashMap::new()),
            bot_caps: Mutex::new(Vec::new()),
            nsfw_channels: Mutex::new(HashSet::new()),
            next_id: AtomicU64::new(5000),
        })
    }

    pub fn queue_reply(&self, content: &str) {
        self.replies.lock().unwrap().push_back(Some(content.to_owned()));
    }

    pub fn queue_timeout(&self) {
        self.replies.lock().unwrap().push_back(None);
    }

    pub fn sent_contents(&self) -> Vec<String> {
        self.sent.lock().unwrap().iter().map(|r| r.content.clone()).collect()
    }

    pub fn last_sent(&self) -> Option<String> {
        self.sent.lock().unwrap().last().map(|r| r.content.clone())
    }

    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }
}

#[async_trait]
impl ChatAdapter for MockAdapter {
    fn bot_id(&self) -> UserId {
        BOT_ID
    }

    async fn send_message(&self, channel_id: ChannelId, content: &str) -> anyhow::Result<SentMessage> {
        let message = SentMessage {
            id: self.next_id(),
            channel_id,
            dm: false,
        };
        self.sent.lock().unwrap().push(SentRecord {
            message,
            content: content.to_owned(),
        });
        Ok(message)
    }

    async fn send_dm(&self, user_id: UserId, content: &str) -> anyhow::Result<SentMessage> {
        let message = SentMessage {
            id: self.next_id(),
            channel_id: user_id,
            dm: true,
        };
        self.sent.lock().unwrap().push(SentRecord {
            message,
            content: content.to_owned(),
        });
        Ok(message)
    }

    async fn edit_message(
        &self,
        channel_id: ChannelId,
        message_id: MessageId,
        content: &str,
    ) -> anyhow::Result<SentMessage> {
        self.edits.lock().unwrap().push((message_id, content.to_owned()));
        Ok(SentMessage {
            id: message_id,
            channel_id,
            dm: false,
        })
    }

    async fn delete_message(&self, _channel_id: ChannelId, message_id: MessageId) -> anyhow::Result<()> {
        self.deleted.lock().unwrap().push(message_id);
        Ok(())
    }

    async fn await_reply(
        &self,
        author_id: UserId,
        channel_id: ChannelId,
        _within: Option<Duration>,
    ) -> Option<InboundMessage> {
        let content = self.replies.lock().unwrap().pop_front()??;
        Some(InboundMessage {
            id: self.next_id(),
            channel_id,
            guild_id: None,
            author: Author {
                id: author_id,
                bot: false,
            },
            content,
            partial: false,
            webhook: false,
        })
    }

    async fn member_capabilities(&self, user_id: UserId, _channel_id: ChannelId) -> Vec<Capability> {
        self.member_caps.lock().unwrap().get(&user_id).cloned().unwrap_or_default()
    }

    async fn bot_capabilities(&self, _channel_id: ChannelId) -> Vec<Capability> {
        self.bot_caps.lock().unwrap().clone()
    }

    async fn channel_is_nsfw(&self, channel_id: ChannelId) -> bool {
        self.nsfw_channels.lock().unwrap().contains(&channel_id)
    }
}

#[derive(Default)]
pub(crate) struct RecordingEvents {
    pub events: Mutex<Vec<String>>,
}

impl RecordingEvents {
    fn push(&self, event: String) {
        self.events.lock().unwrap().push(event);
    }

    pub fn recorded(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }
}

impl EventHandler for RecordingEvents {
    fn command_blocked(&self, command: &str, reason: &BlockReason) {
        self.push(format!("blocked:{command}:{}", reason.tag()));
    }

    fn command_run(&self, command: &str) {
        self.push(format!("run:{command}"));
    }

    fn command_error(&self, command: &str, _error: &anyhow::Error) {
        self.push(format!("error:{command}"));
    }

    fn command_cancelled(&self, command: &str, reason: CancelReason) {
        self.push(format!("cancelled:{command}:{reason}"));
    }

    fn unknown_command(&self, _content: &str) {
        self.push("unknown".to_owned());
    }

    fn command_status_change(&self, _scope: Option<ScopeId>, command: &str, enabled: bool) {
        self.push(format!("command_status:{command}:{enabled}"));
    }

    fn group_status_change(&self, _scope: Option<ScopeId>, group: &str, enabled: bool) {
        self.push(format!("group_status:{group}:{enabled}"));
    }
}

/// Handler that counts runs, remembers its last arguments and replies "ok".
pub(crate) struct CountingHandler {
    pub runs: Arc<AtomicU32>,
    pub last_args: Arc<Mutex<Option<CommandArgs>>>,
}

impl CountingHandler {
    pub fn new() -> (Self, Arc<AtomicU32>, Arc<Mutex<Option<CommandArgs>>>) {
        let runs = Arc::new(AtomicU32::new(0));
        let last_args = Arc::new(Mutex::new(None));
        (
            CountingHandler {
                runs: runs.clone(),
                last_args: last_args.clone(),
            },
            runs,
            last_args,
        )
    }
}

#[async_trait]
impl CommandHandler for CountingHandler {
    async fn run(&self, cx: &CommandCtxt<'_>, args: &CommandArgs) -> anyhow::Result<Option<Vec<SentMessage>>> {
        self.runs.fetch_add(1, Ordering::Relaxed);
        *self.last_args.lock().unwrap() = Some(args.clone());
        let sent = cx.reply("ok").await?;
        Ok(Some(vec![sent]))
    }
}

pub(crate) fn message(
    id: MessageId,
    author: UserId,
    channel: ChannelId,
    guild: Option<ScopeId>,
    content: &str,
) -> InboundMessage {
    InboundMessage {
        id,
        channel_id: channel,
        guild_id: guild,
        author: Author { id: author, bot: false },
        content: content.to_owned(),
        partial: false,
        webhook: false,
    }
}

/// A client with the default types and groups registered (but no commands).
pub(crate) fn herald(adapter: Arc<MockAdapter>) -> Arc<Herald> {
    herald_with_options(adapter, HeraldOptions::default())
}

pub(crate) fn herald_with_options(adapter: Arc<MockAdapter>, options: HeraldOptions) -> Arc<Herald> {
    let herald = Herald::new(options, adapter);
    herald.registry.register_default_types();
    herald.registry.register_default_groups();
    herald
}

pub(crate) fn herald_with_events(
    adapter: Arc<MockAdapter>,
    events: Arc<RecordingEvents>,
) -> Arc<Herald> {
    let herald = Herald::with_events(HeraldOptions::default(), adapter, events);
    herald.registry.register_default_types();
    herald.registry.register_default_groups();
    herald
}
