use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

/// Minimum allowed repost delay. Anything shorter is rejected before it
/// ever reaches the store.
pub const MIN_REPOST_DELAY_SECS: u64 = 5;

/// Grace period an archived sticky survives after its guild kicked the bot.
pub const ARCHIVE_GRACE_HOURS: i64 = 24;

/// Fallback retention applied when an archive entry's expiry is missing or
/// unparsable: sweep it 48h after it was archived instead of keeping it
/// forever.
pub const CORRUPT_EXPIRY_FALLBACK_HOURS: i64 = 48;

#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("title must not be empty")]
    EmptyTitle,
    #[error("body must not be empty")]
    EmptyBody,
    #[error("repost delay must be at least {MIN_REPOST_DELAY_SECS} seconds, got {0}")]
    DelayTooShort(u64),
}

/// One channel's sticky message configuration. Persisted in the active
/// collection, keyed by channel id; one per channel, overwritten atomically
/// on edit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StickyConfig {
    pub title: String,
    pub body: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra_info: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub footer: Option<String>,
    pub repost_delay_secs: u64,
    /// Cached display name, so lists render without a channel lookup.
    pub channel_name: String,
}

impl StickyConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.title.trim().is_empty() {
            return Err(ValidationError::EmptyTitle);
        }
        if self.body.trim().is_empty() {
            return Err(ValidationError::EmptyBody);
        }
        if self.repost_delay_secs < MIN_REPOST_DELAY_SECS {
            return Err(ValidationError::DelayTooShort(self.repost_delay_secs));
        }
        Ok(())
    }
}

/// An archived sticky configuration, parked for the grace period after the
/// owning guild detached. Keyed by channel id in the archive collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchiveEntry {
    #[serde(flatten)]
    pub config: StickyConfig,
    pub archived_at: DateTime<Utc>,
    pub owner_group_id: String,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl ArchiveEntry {
    pub fn new(config: StickyConfig, owner_group_id: String, now: DateTime<Utc>) -> Self {
        Self {
            config,
            archived_at: now,
            owner_group_id,
            expires_at: Some(now + Duration::hours(ARCHIVE_GRACE_HOURS)),
        }
    }

    /// The instant at which the sweep may remove this entry. Entries with a
    /// missing or unparsable `expires_at` fall back to 48h after archival.
    pub fn effective_expiry(&self) -> DateTime<Utc> {
        self.expires_at
            .unwrap_or(self.archived_at + Duration::hours(CORRUPT_EXPIRY_FALLBACK_HOURS))
    }
}

/// Deserialize a timestamp that may be absent, null, or garbage left behind
/// by an older file format. Garbage becomes `None` so the sweep fallback
/// applies instead of the load failing.
fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer).unwrap_or(None);
    Ok(raw.and_then(|s| s.parse::<DateTime<Utc>>().ok()))
}
