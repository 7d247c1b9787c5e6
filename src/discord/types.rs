use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Discord embed payload (the subset the sticky poster needs).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Embed {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<u32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<EmbedField>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub footer: Option<EmbedFooter>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<EmbedThumbnail>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbedField {
    pub name: String,
    pub value: String,
    #[serde(default)]
    pub inline: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbedFooter {
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbedThumbnail {
    pub url: String,
}

/// Payload for creating a channel message.
#[derive(Debug, Serialize)]
pub struct CreateMessageRequest {
    pub embeds: Vec<Embed>,
}

/// A channel message as returned by the history endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub id: String,
    pub author: MessageAuthor,
    #[serde(default)]
    pub embeds: Vec<Embed>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MessageAuthor {
    pub id: String,
    #[serde(default)]
    pub bot: bool,
}

/// A channel object (the subset needed to resolve guild membership).
#[derive(Debug, Clone, Deserialize)]
pub struct Channel {
    #[serde(default)]
    pub guild_id: Option<String>,
}

/// Gateway events relayed to the `/events` webhook.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventEnvelope {
    /// A new message appeared in a channel.
    MessageCreate {
        channel_id: String,
        author_id: String,
        #[serde(default)]
        author_is_bot: bool,
        #[serde(default)]
        timestamp: Option<DateTime<Utc>>,
    },
    /// The bot was added to a guild (or came back within the grace window).
    GuildCreate { guild_id: String },
    /// The bot was removed from a guild.
    GuildDelete { guild_id: String },
}
