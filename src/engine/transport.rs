use crate::discord::types::{Embed, Message};
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    /// The target message or channel does not exist (anymore).
    #[error("not found")]
    NotFound,
    /// The bot lost permission to act in the channel.
    #[error("missing permissions")]
    PermissionDenied,
    #[error("chat api error ({status}): {message}")]
    Api { status: u16, message: String },
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
}

/// The engine's view of the chat platform. One implementation talks to the
/// Discord REST API; tests swap in a recording fake.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Post a sticky embed to a channel, returning the new message id.
    async fn send_sticky(&self, channel_id: &str, embed: Embed) -> Result<String, TransportError>;

    /// Delete a message. Returns `TransportError::NotFound` when the message
    /// is already gone; callers treat that as success.
    async fn delete_message(
        &self,
        channel_id: &str,
        message_id: &str,
    ) -> Result<(), TransportError>;

    /// The most recent messages in a channel, newest first. Used by the
    /// recovery scan after a restart.
    async fn recent_messages(
        &self,
        channel_id: &str,
        limit: u8,
    ) -> Result<Vec<Message>, TransportError>;

    /// The guild a channel belongs to, or `None` for channels outside a
    /// guild. `Err(NotFound)` means the channel itself is gone.
    async fn channel_group(&self, channel_id: &str) -> Result<Option<String>, TransportError>;
}
