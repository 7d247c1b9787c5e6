use crate::discord::EventEnvelope;
use crate::AppState;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use chrono::Utc;
use serde_json::json;
use std::sync::Arc;

/// Handle gateway events relayed to the webhook: channel activity and
/// guild lifecycle changes.
pub async fn handle_events(
    State(state): State<Arc<AppState>>,
    Json(event): Json<EventEnvelope>,
) -> Response {
    match event {
        EventEnvelope::MessageCreate {
            channel_id,
            author_id,
            author_is_bot,
            timestamp,
        } => {
            // Identity filter at the ingress boundary: the bot's own sticky
            // posts must never re-enter the trigger stream.
            if author_is_bot || author_id == state.engine.bot_user_id() {
                tracing::debug!("ignoring bot-authored message in {}", channel_id);
                return StatusCode::OK.into_response();
            }

            let observed_at = timestamp.unwrap_or_else(Utc::now);
            state.engine.on_activity(&channel_id, observed_at).await;
            StatusCode::OK.into_response()
        }

        EventEnvelope::GuildDelete { guild_id } => {
            tracing::info!("bot removed from guild {}", guild_id);
            let archived = state.engine.on_group_detached(&guild_id).await;
            Json(json!({ "archived": archived })).into_response()
        }

        EventEnvelope::GuildCreate { guild_id } => {
            tracing::info!("bot added to guild {}", guild_id);
            let restored = state.engine.on_group_attached(&guild_id).await;
            Json(json!({ "restored": restored })).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::testutil::{config, test_engine, BOT_USER_ID};
    use std::time::Duration;

    fn message_event(author_id: &str, author_is_bot: bool) -> EventEnvelope {
        EventEnvelope::MessageCreate {
            channel_id: "chan-x".into(),
            author_id: author_id.into(),
            author_is_bot,
            timestamp: None,
        }
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn user_message_schedules_a_repost() {
        let (engine, transport) = test_engine();
        engine.set_sticky("chan-x", config(5)).await.unwrap();
        let state = Arc::new(AppState { engine });

        handle_events(State(state), Json(message_event("user-1", false))).await;

        tokio::time::sleep(Duration::from_secs(6)).await;
        assert_eq!(transport.post_count(), 1);
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn own_identity_is_filtered_before_the_gate() {
        let (engine, transport) = test_engine();
        engine.set_sticky("chan-x", config(5)).await.unwrap();
        let state = Arc::new(AppState { engine });

        handle_events(
            State(state.clone()),
            Json(message_event(BOT_USER_ID, true)),
        )
        .await;
        // A non-bot event claiming the bot's user id is filtered too.
        handle_events(State(state), Json(message_event(BOT_USER_ID, false))).await;

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(transport.post_count(), 0);
    }

    #[tokio::test]
    async fn guild_lifecycle_events_report_counts() {
        let (engine, transport) = test_engine();
        transport.set_group("chan-y", "guild-1");
        engine.set_sticky("chan-y", config(10)).await.unwrap();
        let state = Arc::new(AppState { engine });

        let response = handle_events(
            State(state.clone()),
            Json(EventEnvelope::GuildDelete {
                guild_id: "guild-1".into(),
            }),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(state.engine.list().await.is_empty());

        handle_events(
            State(state.clone()),
            Json(EventEnvelope::GuildCreate {
                guild_id: "guild-1".into(),
            }),
        )
        .await;
        assert_eq!(state.engine.list().await.len(), 1);
    }

    #[test]
    fn event_envelope_deserializes_tagged_json() {
        let event: EventEnvelope = serde_json::from_str(
            r#"{"type":"message_create","channel_id":"c1","author_id":"u1"}"#,
        )
        .unwrap();
        assert!(matches!(
            event,
            EventEnvelope::MessageCreate { ref channel_id, ref author_id, author_is_bot: false, .. }
                if channel_id == "c1" && author_id == "u1"
        ));

        let event: EventEnvelope =
            serde_json::from_str(r#"{"type":"guild_delete","guild_id":"g1"}"#).unwrap();
        assert!(matches!(event, EventEnvelope::GuildDelete { .. }));
    }
}
