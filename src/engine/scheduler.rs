//! Per-channel trigger gate and debounce. Bursts of activity inside one
//! delay window collapse to a single repost, fired `repost_delay_secs`
//! after the last trigger.

use super::{poster, StickyEngine};
use chrono::{DateTime, Utc};
use std::time::Duration;

/// Handle an activity notification for a channel.
///
/// Instead of cancelling timers, every trigger bumps the channel's
/// generation counter and spawns a fresh timer carrying the value it saw.
/// A timer whose generation no longer matches at fire time was superseded
/// and does nothing.
pub(crate) async fn on_activity(
    engine: &StickyEngine,
    channel_id: &str,
    observed_at: DateTime<Utc>,
) {
    let (generation, config) = {
        let mut state = engine.state().lock().await;
        let Some(config) = state.active.get(channel_id).cloned() else {
            return;
        };

        let runtime = state.runtime.entry(channel_id.to_string()).or_default();
        if let Some(until) = runtime.cooldown_until {
            if observed_at < until {
                tracing::debug!("channel {} in cooldown until {}", channel_id, until);
                return;
            }
        }

        runtime.pending_generation += 1;
        (runtime.pending_generation, config)
    };

    tracing::debug!(
        "sticky trigger for channel {} (generation {})",
        channel_id,
        generation
    );

    let engine = engine.clone();
    let channel_id = channel_id.to_string();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(config.repost_delay_secs)).await;

        {
            let state = engine.state().lock().await;
            let current = state
                .runtime
                .get(&channel_id)
                .map(|r| r.pending_generation)
                .unwrap_or(0);
            if current != generation {
                // Superseded by a later trigger.
                return;
            }
            if !state.active.contains_key(&channel_id) {
                // Config was removed or archived while we slept.
                return;
            }
        }

        if let Err(e) = poster::repost(&engine, &channel_id, &config).await {
            tracing::warn!("sticky repost failed for channel {}: {}", channel_id, e);
        }
    });
}
