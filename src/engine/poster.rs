//! Renders and delivers one channel's sticky post: delete the previous
//! instance, send the new one, track the resulting message id.

use super::transport::TransportError;
use super::StickyEngine;
use crate::discord::types::{Embed, EmbedField, EmbedFooter, EmbedThumbnail};
use crate::models::StickyConfig;
use chrono::Utc;

/// Marker used when no footer is configured. The recovery scan also keys
/// off this text to recognize the bot's own sticky posts.
pub const DEFAULT_FOOTER: &str = "📌 Sticky Message";

/// Discord blurple.
const STICKY_COLOR: u32 = 0x5865F2;

/// Post the sticky for a channel, replacing the previous instance.
///
/// Send failures are returned without retry; the next activity trigger
/// will attempt again after its own delay, which bounds retry pressure.
pub(crate) async fn repost(
    engine: &StickyEngine,
    channel_id: &str,
    config: &StickyConfig,
) -> Result<(), TransportError> {
    let previous = {
        let state = engine.state().lock().await;
        state
            .runtime
            .get(channel_id)
            .and_then(|r| r.last_message_id.clone())
    };
    let previous = match previous {
        Some(id) => Some(id),
        // Fresh process or never posted: adopt a survivor from the channel
        // history if one looks like ours.
        None => find_previous_sticky(engine, channel_id, config).await,
    };

    if let Some(message_id) = previous {
        match engine.transport().delete_message(channel_id, &message_id).await {
            Ok(()) => {
                tracing::debug!("deleted previous sticky {} in {}", message_id, channel_id)
            }
            Err(TransportError::NotFound) => {
                tracing::debug!("previous sticky {} already gone", message_id)
            }
            Err(e) => {
                // Non-fatal: posting proceeds regardless.
                tracing::warn!(
                    "could not delete previous sticky {} in {}: {}",
                    message_id,
                    channel_id,
                    e
                );
            }
        }
    }

    let mut embed = build_embed(config);
    if let Some(provider) = engine.enrichment() {
        match tokio::time::timeout(engine.config().enrichment_timeout, provider.thumbnail()).await {
            Ok(Some(thumbnail)) => {
                tracing::debug!("attaching thumbnail {}", thumbnail.name);
                embed.thumbnail = Some(EmbedThumbnail { url: thumbnail.url });
            }
            Ok(None) => {}
            Err(_) => tracing::debug!("thumbnail fetch timed out, posting without it"),
        }
    }

    let message_id = engine.transport().send_sticky(channel_id, embed).await?;
    tracing::info!("posted sticky {} in channel {}", message_id, channel_id);

    let now = Utc::now();
    let mut state = engine.state().lock().await;
    let runtime = state.runtime.entry(channel_id.to_string()).or_default();
    runtime.last_message_id = Some(message_id);
    runtime.last_posted_at = Some(now);
    runtime.cooldown_until = Some(now + engine.config().cooldown);
    Ok(())
}

/// Bounded recovery scan: look through the most recent messages for one
/// authored by the bot whose embed matches this sticky's title or carries
/// the footer marker.
async fn find_previous_sticky(
    engine: &StickyEngine,
    channel_id: &str,
    config: &StickyConfig,
) -> Option<String> {
    let messages = match engine
        .transport()
        .recent_messages(channel_id, engine.config().recovery_scan_limit)
        .await
    {
        Ok(messages) => messages,
        Err(e) => {
            tracing::warn!("recovery scan failed for channel {}: {}", channel_id, e);
            return None;
        }
    };

    let marker = config.footer.as_deref().unwrap_or(DEFAULT_FOOTER);
    for message in messages {
        if message.author.id != engine.config().bot_user_id {
            continue;
        }
        let Some(embed) = message.embeds.first() else {
            continue;
        };
        let title_matches = embed.title.as_deref() == Some(config.title.as_str());
        let footer_matches = embed
            .footer
            .as_ref()
            .is_some_and(|f| f.text == marker);
        if title_matches || footer_matches {
            tracing::debug!(
                "recovery scan adopted message {} in {}",
                message.id,
                channel_id
            );
            return Some(message.id);
        }
    }
    None
}

fn build_embed(config: &StickyConfig) -> Embed {
    let mut embed = Embed {
        title: Some(config.title.clone()),
        description: Some(config.body.clone()),
        color: Some(STICKY_COLOR),
        ..Embed::default()
    };
    if let Some(extra) = &config.extra_info {
        embed.fields.push(EmbedField {
            name: "Additional info".to_string(),
            value: extra.clone(),
            inline: false,
        });
    }
    embed.footer = Some(EmbedFooter {
        text: config
            .footer
            .clone()
            .unwrap_or_else(|| DEFAULT_FOOTER.to_string()),
    });
    embed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::testutil::{config, test_engine, FakeTransport};
    use crate::engine::{EngineConfig, StickyEngine};
    use crate::enrichment::{Thumbnail, ThumbnailProvider};
    use crate::store::MemoryStore;
    use async_trait::async_trait;
    use std::sync::atomic::Ordering;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn embed_carries_title_body_footer_and_extra_info() {
        let mut c = config(10);
        c.extra_info = Some("Ask a mod for help.".into());
        c.footer = Some("© Pokémon Hideout".into());

        let embed = build_embed(&c);
        assert_eq!(embed.title.as_deref(), Some("Rules"));
        assert_eq!(
            embed.description.as_deref(),
            Some("Read the rules before posting.")
        );
        assert_eq!(embed.fields.len(), 1);
        assert_eq!(embed.fields[0].value, "Ask a mod for help.");
        assert_eq!(embed.footer.unwrap().text, "© Pokémon Hideout");
    }

    #[tokio::test]
    async fn embed_falls_back_to_default_footer_marker() {
        let embed = build_embed(&config(10));
        assert_eq!(embed.footer.unwrap().text, DEFAULT_FOOTER);
    }

    #[tokio::test]
    async fn repost_deletes_tracked_previous_message() {
        let (engine, transport) = test_engine();
        let c = config(10);

        repost(&engine, "chan", &c).await.unwrap();
        assert!(transport.deletes.lock().unwrap().is_empty());

        repost(&engine, "chan", &c).await.unwrap();
        let deletes = transport.deletes.lock().unwrap();
        assert_eq!(deletes.len(), 1);
        assert_eq!(deletes[0].1, "msg-0");
        assert_eq!(transport.post_count(), 2);
    }

    #[tokio::test]
    async fn delete_of_already_gone_message_is_not_an_error() {
        let (engine, transport) = test_engine();
        let c = config(10);
        repost(&engine, "chan", &c).await.unwrap();

        transport.delete_not_found.store(true, Ordering::SeqCst);
        repost(&engine, "chan", &c).await.unwrap();
        assert_eq!(transport.post_count(), 2);
    }

    #[tokio::test]
    async fn recovery_scan_adopts_matching_bot_message() {
        let (engine, transport) = test_engine();
        let c = config(10);

        let survivor = FakeTransport::bot_message("old-sticky", build_embed(&c));
        let unrelated = FakeTransport::bot_message(
            "other-post",
            Embed {
                title: Some("Unrelated announcement".into()),
                ..Embed::default()
            },
        );
        transport.seed_history("chan", vec![unrelated, survivor]);

        repost(&engine, "chan", &c).await.unwrap();
        let deletes = transport.deletes.lock().unwrap();
        assert_eq!(deletes.len(), 1);
        assert_eq!(deletes[0].1, "old-sticky", "adopted the surviving sticky");
    }

    #[tokio::test]
    async fn recovery_scan_ignores_other_authors() {
        let (engine, transport) = test_engine();
        let c = config(10);

        let mut foreign = FakeTransport::bot_message("foreign", build_embed(&c));
        foreign.author.id = "someone-else".into();
        transport.seed_history("chan", vec![foreign]);

        repost(&engine, "chan", &c).await.unwrap();
        assert!(transport.deletes.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn send_failure_is_returned_and_leaves_no_cooldown() {
        let (engine, transport) = test_engine();
        transport.fail_send.store(true, Ordering::SeqCst);

        let result = repost(&engine, "chan", &config(10)).await;
        assert!(matches!(result, Err(TransportError::PermissionDenied)));

        let state = engine.state().lock().await;
        let runtime = state.runtime.get("chan");
        assert!(runtime.map_or(true, |r| r.cooldown_until.is_none()));
    }

    struct FixedThumbnail;

    #[async_trait]
    impl ThumbnailProvider for FixedThumbnail {
        async fn thumbnail(&self) -> Option<Thumbnail> {
            Some(Thumbnail {
                url: "https://example.com/art.png".into(),
                name: "Pikachu".into(),
            })
        }
    }

    struct StalledThumbnail;

    #[async_trait]
    impl ThumbnailProvider for StalledThumbnail {
        async fn thumbnail(&self) -> Option<Thumbnail> {
            tokio::time::sleep(Duration::from_secs(600)).await;
            None
        }
    }

    fn engine_with_provider(
        provider: Arc<dyn ThumbnailProvider>,
    ) -> (StickyEngine, Arc<FakeTransport>) {
        let transport = Arc::new(FakeTransport::default());
        let engine = StickyEngine::load(
            Box::new(MemoryStore::default()),
            transport.clone(),
            Some(provider),
            EngineConfig::default(),
        );
        (engine, transport)
    }

    #[tokio::test]
    async fn enrichment_attaches_thumbnail() {
        let (engine, transport) = engine_with_provider(Arc::new(FixedThumbnail));
        repost(&engine, "chan", &config(10)).await.unwrap();

        let (_, embed) = transport.last_post().unwrap();
        assert_eq!(
            embed.thumbnail.unwrap().url,
            "https://example.com/art.png"
        );
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn stalled_enrichment_never_blocks_the_post() {
        let (engine, transport) = engine_with_provider(Arc::new(StalledThumbnail));
        repost(&engine, "chan", &config(10)).await.unwrap();

        let (_, embed) = transport.last_post().unwrap();
        assert!(embed.thumbnail.is_none());
        assert_eq!(transport.post_count(), 1);
    }
}
