//! Moves sticky configurations between the active and archived collections
//! around guild detach/reattach, and sweeps expired archive entries.

use super::StickyEngine;
use crate::models::ArchiveEntry;
use chrono::{DateTime, Utc};

/// Park every active configuration belonging to `group_id` in the archive.
/// Returns the number of channels archived.
pub(crate) async fn archive_group(engine: &StickyEngine, group_id: &str) -> usize {
    // Resolve guild membership outside the lock; a slow lookup must not
    // stall unrelated channels.
    let channel_ids: Vec<String> = {
        let state = engine.state().lock().await;
        state.active.keys().cloned().collect()
    };

    let mut members = Vec::new();
    for channel_id in channel_ids {
        match engine.transport().channel_group(&channel_id).await {
            Ok(Some(group)) if group == group_id => members.push(channel_id),
            Ok(_) => {}
            Err(e) => {
                tracing::warn!("could not resolve guild for channel {}: {}", channel_id, e)
            }
        }
    }
    if members.is_empty() {
        return 0;
    }

    let now = Utc::now();
    let mut state = engine.state().lock().await;
    let mut archived = 0;
    for channel_id in &members {
        let Some(config) = state.active.remove(channel_id) else {
            continue;
        };
        state.archive.insert(
            channel_id.clone(),
            ArchiveEntry::new(config, group_id.to_string(), now),
        );
        // Supersede any pending repost and drop the tracked message; the
        // generation counter stays monotonic so stale timers cannot match
        // a later one.
        let runtime = state.runtime.entry(channel_id.clone()).or_default();
        runtime.pending_generation += 1;
        runtime.last_message_id = None;
        runtime.last_posted_at = None;
        runtime.cooldown_until = None;
        archived += 1;
    }

    if archived > 0 {
        engine.persist_both(&state);
        tracing::info!(
            "archived {} sticky configurations for guild {} (24h grace period)",
            archived,
            group_id
        );
    }
    archived
}

/// Restore archived configurations for `group_id` whose channels are still
/// reachable. Unreachable channels stay archived until they expire.
/// Returns the number restored; a group with nothing archived returns 0.
pub(crate) async fn restore_group(engine: &StickyEngine, group_id: &str) -> usize {
    let candidates: Vec<String> = {
        let state = engine.state().lock().await;
        state
            .archive
            .iter()
            .filter(|(_, entry)| entry.owner_group_id == group_id)
            .map(|(channel_id, _)| channel_id.clone())
            .collect()
    };

    let mut reachable = Vec::new();
    for channel_id in candidates {
        match engine.transport().channel_group(&channel_id).await {
            Ok(Some(_)) => reachable.push(channel_id),
            Ok(None) => {}
            Err(e) => {
                tracing::debug!("channel {} not reachable, leaving archived: {}", channel_id, e)
            }
        }
    }
    if reachable.is_empty() {
        return 0;
    }

    let mut state = engine.state().lock().await;
    let mut restored = 0;
    for channel_id in reachable {
        let Some(entry) = state.archive.remove(&channel_id) else {
            continue;
        };
        tracing::info!(
            "restored sticky for channel #{} ({})",
            entry.config.channel_name,
            channel_id
        );
        state.active.insert(channel_id, entry.config);
        restored += 1;
    }

    if restored > 0 {
        engine.persist_both(&state);
        tracing::info!(
            "restored {} sticky configurations for guild {}",
            restored,
            group_id
        );
    }
    restored
}

/// Remove every archive entry whose expiry has passed. Returns the number
/// removed.
pub(crate) async fn sweep_expired(engine: &StickyEngine, now: DateTime<Utc>) -> usize {
    let mut state = engine.state().lock().await;

    let expired: Vec<String> = state
        .archive
        .iter()
        .filter(|(_, entry)| entry.effective_expiry() <= now)
        .map(|(channel_id, _)| channel_id.clone())
        .collect();

    for channel_id in &expired {
        if let Some(entry) = state.archive.remove(channel_id) {
            tracing::info!(
                "expired archive entry removed: #{} ({})",
                entry.config.channel_name,
                channel_id
            );
        }
    }

    if !expired.is_empty() {
        if let Err(e) = engine.save_archive(&state) {
            tracing::error!("could not persist sticky archive after sweep: {}", e);
        }
    }
    expired.len()
}
