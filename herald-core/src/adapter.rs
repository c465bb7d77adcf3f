//! The chat platform boundary.
//!
//! The core never talks to a concrete chat service. Everything it needs from
//! the platform is captured by [`ChatAdapter`], which a host implements by
//! wrapping whatever native client it uses. The dispatcher and argument
//! collection loops only ever hold a `dyn ChatAdapter`.

use std::time::Duration;

use async_trait::async_trait;

pub type UserId = u64;
pub type ChannelId = u64;
pub type MessageId = u64;
/// Tenant boundary for prefixes, enablement overrides and settings (e.g. a
/// guild id). `None` in APIs taking `Option<ScopeId>` means the global scope.
pub type ScopeId = u64;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Author {
    pub id: UserId,
    /// Whether the platform marks this author as an automated account.
    pub bot: bool,
}

/// An inbound chat event, as delivered by the host's gateway.
#[derive(Clone, Debug)]
pub struct InboundMessage {
    pub id: MessageId,
    pub channel_id: ChannelId,
    pub guild_id: Option<ScopeId>,
    pub author: Author,
    pub content: String,
    /// Set when the platform delivered an incomplete representation.
    pub partial: bool,
    /// Set when the message was produced by a webhook or similar bot actor.
    pub webhook: bool,
}

/// A message the bot has sent, as tracked by response manifests.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SentMessage {
    pub id: MessageId,
    pub channel_id: ChannelId,
    /// Whether this message went to a direct-message channel.
    pub dm: bool,
}

/// A permission the platform can grant a member or the bot in a channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Capability {
    Administrator,
    ManageGuild,
    ManageChannels,
    ManageMessages,
    KickMembers,
    BanMembers,
    SendMessages,
    EmbedLinks,
    AttachFiles,
    AddReactions,
    MentionEveryone,
    ReadMessageHistory,
}

impl Capability {
    pub fn human_name(self) -> &'static str {
        match self {
            Capability::Administrator => "Administrator",
            Capability::ManageGuild => "Manage Server",
            Capability::ManageChannels => "Manage Channels",
            Capability::ManageMessages => "Manage Messages",
            Capability::KickMembers => "Kick Members",
            Capability::BanMembers => "Ban Members",
            Capability::SendMessages => "Send Messages",
            Capability::EmbedLinks => "Embed Links",
            Capability::AttachFiles => "Attach Files",
            Capability::AddReactions => "Add Reactions",
            Capability::MentionEveryone => "Mention Everyone",
            Capability::ReadMessageHistory => "Read Message History",
        }
    }
}

/// Capability set the core consumes from the chat platform.
#[async_trait]
pub trait ChatAdapter: Send + Sync {
    /// The bot's own user id, used for self-filtering and the mention prefix.
    fn bot_id(&self) -> UserId;

    async fn send_message(&self, channel_id: ChannelId, content: &str) -> anyhow::Result<SentMessage>;

    async fn send_dm(&self, user_id: UserId, content: &str) -> anyhow::Result<SentMessage>;

    async fn edit_message(
        &self,
        channel_id: ChannelId,
        message_id: MessageId,
        content: &str,
    ) -> anyhow::Result<SentMessage>;

    async fn delete_message(&self, channel_id: ChannelId, message_id: MessageId) -> anyhow::Result<()>;

    /// Waits for the next message from `author_id` in `channel_id`. Returns
    /// `None` once `within` elapses; `None` for `within` waits forever.
    async fn await_reply(
        &self,
        author_id: UserId,
        channel_id: ChannelId,
        within: Option<Duration>,
    ) -> Option<InboundMessage>;

    /// The effective capabilities of a member in a channel.
    async fn member_capabilities(&self, user_id: UserId, channel_id: ChannelId) -> Vec<Capability>;

    /// The bot's own effective capabilities in a channel.
    async fn bot_capabilities(&self, channel_id: ChannelId) -> Vec<Capability>;

    async fn channel_is_nsfw(&self, channel_id: ChannelId) -> bool;
}
