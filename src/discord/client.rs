use super::types::{Channel, CreateMessageRequest, Embed, Message};
use crate::engine::transport::{ChatTransport, TransportError};
use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use std::time::Duration;

const API_BASE: &str = "https://discord.com/api/v10";

/// Bound on every Discord call. A hung connection must fail fast instead of
/// stalling the guild lifecycle handlers or holding a repost task alive past
/// its debounce window.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Discord REST client. Only the endpoints the sticky engine needs.
#[derive(Clone)]
pub struct DiscordClient {
    client: Client,
    bot_token: String,
    api_base: String,
}

impl DiscordClient {
    pub fn new(bot_token: String) -> Self {
        Self::with_base_url(bot_token, API_BASE.to_string(), REQUEST_TIMEOUT)
    }

    fn with_base_url(bot_token: String, api_base: String, timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();
        Self {
            client,
            bot_token,
            api_base,
        }
    }

    fn auth_header(&self) -> String {
        format!("Bot {}", self.bot_token)
    }

    /// Map non-success responses onto transport errors, keeping Discord's
    /// error message for the log.
    async fn check(response: Response) -> Result<Response, TransportError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        if status == StatusCode::NOT_FOUND {
            return Err(TransportError::NotFound);
        }
        if status == StatusCode::FORBIDDEN {
            return Err(TransportError::PermissionDenied);
        }
        let message = match response.json::<serde_json::Value>().await {
            Ok(body) => body["message"]
                .as_str()
                .unwrap_or("unknown error")
                .to_string(),
            Err(_) => "unknown error".to_string(),
        };
        Err(TransportError::Api {
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl ChatTransport for DiscordClient {
    async fn send_sticky(&self, channel_id: &str, embed: Embed) -> Result<String, TransportError> {
        let payload = CreateMessageRequest {
            embeds: vec![embed],
        };

        let response = self
            .client
            .post(format!("{}/channels/{}/messages", self.api_base, channel_id))
            .header("Authorization", self.auth_header())
            .json(&payload)
            .send()
            .await?;

        let message: Message = Self::check(response).await?.json().await?;
        Ok(message.id)
    }

    async fn delete_message(
        &self,
        channel_id: &str,
        message_id: &str,
    ) -> Result<(), TransportError> {
        let response = self
            .client
            .delete(format!(
                "{}/channels/{}/messages/{}",
                self.api_base, channel_id, message_id
            ))
            .header("Authorization", self.auth_header())
            .send()
            .await?;

        Self::check(response).await?;
        Ok(())
    }

    async fn recent_messages(
        &self,
        channel_id: &str,
        limit: u8,
    ) -> Result<Vec<Message>, TransportError> {
        let response = self
            .client
            .get(format!("{}/channels/{}/messages", self.api_base, channel_id))
            .header("Authorization", self.auth_header())
            .query(&[("limit", limit.to_string())])
            .send()
            .await?;

        let messages: Vec<Message> = Self::check(response).await?.json().await?;
        Ok(messages)
    }

    async fn channel_group(&self, channel_id: &str) -> Result<Option<String>, TransportError> {
        let response = self
            .client
            .get(format!("{}/channels/{}", self.api_base, channel_id))
            .header("Authorization", self.auth_header())
            .send()
            .await?;

        let channel: Channel = Self::check(response).await?.json().await?;
        Ok(channel.guild_id)
    }
}
