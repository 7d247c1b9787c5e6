//! The sticky message lifecycle engine: per-channel debounced reposting,
//! plus time-boxed archival of configurations across guild detach/reattach.

pub mod archive;
pub mod poster;
pub mod scheduler;
pub mod transport;

use crate::enrichment::ThumbnailProvider;
use crate::models::{ArchiveEntry, StickyConfig, ValidationError, MIN_REPOST_DELAY_SECS};
use crate::store::{StickyStore, StoreError};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use transport::{ChatTransport, TransportError};

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid sticky configuration: {0}")]
    Config(#[from] ValidationError),
    #[error("no sticky message configured for channel {0}")]
    NotFound(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Tunables for one engine instance.
pub struct EngineConfig {
    /// The bot's own user id; used by the recovery scan to recognize its
    /// previous posts.
    pub bot_user_id: String,
    /// Minimum gap between successful posts in one channel, guarding
    /// against pathological bursts across debounce windows.
    pub cooldown: chrono::Duration,
    /// How often the archive sweep runs after the startup sweep.
    pub sweep_interval: std::time::Duration,
    /// How many recent messages the recovery scan inspects.
    pub recovery_scan_limit: u8,
    /// Budget for the decorative thumbnail fetch.
    pub enrichment_timeout: std::time::Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            bot_user_id: String::new(),
            cooldown: chrono::Duration::seconds(30),
            sweep_interval: std::time::Duration::from_secs(6 * 3600),
            recovery_scan_limit: 50,
            enrichment_timeout: std::time::Duration::from_secs(3),
        }
    }
}

/// Process-local per-channel state. Never persisted; rebuilt best-effort
/// after a restart via the poster's recovery scan.
#[derive(Debug, Default)]
pub(crate) struct ChannelRuntime {
    pub last_message_id: Option<String>,
    pub last_posted_at: Option<DateTime<Utc>>,
    /// Monotonic counter; bumping it supersedes any timer in flight for
    /// this channel.
    pub pending_generation: u64,
    pub cooldown_until: Option<DateTime<Utc>>,
}

pub(crate) struct EngineState {
    pub active: HashMap<String, StickyConfig>,
    pub archive: HashMap<String, ArchiveEntry>,
    pub runtime: HashMap<String, ChannelRuntime>,
}

struct EngineInner {
    transport: Arc<dyn ChatTransport>,
    enrichment: Option<Arc<dyn ThumbnailProvider>>,
    store: Box<dyn StickyStore>,
    state: Mutex<EngineState>,
    config: EngineConfig,
}

/// One engine instance owns all sticky state; clones share it. Everything
/// mutable sits behind a single mutex that is never held across an await,
/// so channels cannot block one another.
#[derive(Clone)]
pub struct StickyEngine {
    inner: Arc<EngineInner>,
}

impl StickyEngine {
    /// Build an engine from persisted state. Load failures degrade to an
    /// empty working set instead of failing startup.
    pub fn load(
        store: Box<dyn StickyStore>,
        transport: Arc<dyn ChatTransport>,
        enrichment: Option<Arc<dyn ThumbnailProvider>>,
        config: EngineConfig,
    ) -> Self {
        let active = store.load_active().unwrap_or_else(|e| {
            tracing::warn!("could not load active stickies, starting empty: {}", e);
            HashMap::new()
        });
        let archive = store.load_archive().unwrap_or_else(|e| {
            tracing::warn!("could not load sticky archive, starting empty: {}", e);
            HashMap::new()
        });
        tracing::info!(
            "loaded {} active and {} archived sticky configurations",
            active.len(),
            archive.len()
        );

        Self {
            inner: Arc::new(EngineInner {
                transport,
                enrichment,
                store,
                state: Mutex::new(EngineState {
                    active,
                    archive,
                    runtime: HashMap::new(),
                }),
                config,
            }),
        }
    }

    pub fn bot_user_id(&self) -> &str {
        &self.inner.config.bot_user_id
    }

    pub(crate) fn state(&self) -> &Mutex<EngineState> {
        &self.inner.state
    }

    pub(crate) fn transport(&self) -> &dyn ChatTransport {
        &*self.inner.transport
    }

    pub(crate) fn enrichment(&self) -> Option<&Arc<dyn ThumbnailProvider>> {
        self.inner.enrichment.as_ref()
    }

    pub(crate) fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    /// Create or overwrite a channel's sticky configuration. On a save
    /// failure the in-memory change is kept so the caller can retry.
    pub async fn set_sticky(
        &self,
        channel_id: &str,
        config: StickyConfig,
    ) -> Result<(), EngineError> {
        config.validate()?;

        let mut state = self.inner.state.lock().await;
        state.active.insert(channel_id.to_string(), config);
        // The collections are disjoint per channel: a fresh config wins
        // over whatever the archive still holds.
        let unarchived = state.archive.remove(channel_id).is_some();

        self.inner.store.save_active(&state.active)?;
        if unarchived {
            self.inner.store.save_archive(&state.archive)?;
        }
        tracing::info!("sticky configuration saved for channel {}", channel_id);
        Ok(())
    }

    /// Remove a channel's sticky configuration and best-effort delete the
    /// currently posted message. Any pending repost timer becomes a no-op.
    pub async fn remove_sticky(&self, channel_id: &str) -> Result<(), EngineError> {
        let last_message_id = {
            let mut state = self.inner.state.lock().await;
            if state.active.remove(channel_id).is_none() {
                return Err(EngineError::NotFound(channel_id.to_string()));
            }
            let runtime = state.runtime.entry(channel_id.to_string()).or_default();
            runtime.pending_generation += 1;
            runtime.cooldown_until = None;
            runtime.last_posted_at = None;
            let last = runtime.last_message_id.take();
            self.inner.store.save_active(&state.active)?;
            last
        };

        if let Some(message_id) = last_message_id {
            match self
                .inner
                .transport
                .delete_message(channel_id, &message_id)
                .await
            {
                Ok(()) | Err(TransportError::NotFound) => {}
                Err(e) => {
                    tracing::warn!(
                        "could not delete sticky {} in channel {}: {}",
                        message_id,
                        channel_id,
                        e
                    );
                }
            }
        }
        tracing::info!("sticky configuration removed for channel {}", channel_id);
        Ok(())
    }

    /// Change only the repost delay of an existing configuration.
    pub async fn update_delay(&self, channel_id: &str, seconds: u64) -> Result<(), EngineError> {
        if seconds < MIN_REPOST_DELAY_SECS {
            return Err(ValidationError::DelayTooShort(seconds).into());
        }
        let mut state = self.inner.state.lock().await;
        let config = state
            .active
            .get_mut(channel_id)
            .ok_or_else(|| EngineError::NotFound(channel_id.to_string()))?;
        config.repost_delay_secs = seconds;
        self.inner.store.save_active(&state.active)?;
        Ok(())
    }

    /// Snapshot of all active sticky configurations.
    pub async fn list(&self) -> HashMap<String, StickyConfig> {
        self.inner.state.lock().await.active.clone()
    }

    /// Activity ingress: debounce and schedule a repost for the channel.
    pub async fn on_activity(&self, channel_id: &str, observed_at: DateTime<Utc>) {
        scheduler::on_activity(self, channel_id, observed_at).await;
    }

    /// The bot was removed from a guild: park its configurations in the
    /// archive for the grace period. Returns how many were archived.
    pub async fn on_group_detached(&self, group_id: &str) -> usize {
        archive::archive_group(self, group_id).await
    }

    /// The bot was (re-)added to a guild: restore whatever the archive
    /// still holds for it. Returns how many were restored.
    pub async fn on_group_attached(&self, group_id: &str) -> usize {
        archive::restore_group(self, group_id).await
    }

    /// Remove archive entries past their expiry. Returns how many were
    /// removed.
    pub async fn sweep_expired(&self, now: DateTime<Utc>) -> usize {
        archive::sweep_expired(self, now).await
    }

    /// Start the recurring archive sweep. The first tick fires immediately,
    /// which doubles as the startup sweep. The caller owns the handle and
    /// aborts it on shutdown.
    pub fn spawn_sweep_job(&self) -> JoinHandle<()> {
        let engine = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(engine.inner.config.sweep_interval);
            loop {
                ticker.tick().await;
                let removed = engine.sweep_expired(Utc::now()).await;
                if removed > 0 {
                    tracing::info!("sweep removed {} expired archive entries", removed);
                }
            }
        })
    }

    /// Persist both collections after a background mutation. Background
    /// jobs only log; the in-memory state stays authoritative for retry.
    pub(crate) fn persist_both(&self, state: &EngineState) {
        if let Err(e) = self.inner.store.save_active(&state.active) {
            tracing::error!("could not persist active stickies: {}", e);
        }
        if let Err(e) = self.inner.store.save_archive(&state.archive) {
            tracing::error!("could not persist sticky archive: {}", e);
        }
    }

    pub(crate) fn save_archive(&self, state: &EngineState) -> Result<(), StoreError> {
        self.inner.store.save_archive(&state.archive)
    }
}


#[cfg(test)]
mod tests {
    use super::testutil::{config, test_engine};
    use super::*;
    use crate::store::MemoryStore;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[tokio::test]
    async fn set_sticky_rejects_short_delay() {
        let (engine, _) = test_engine();
        let err = engine.set_sticky("chan", config(4)).await.unwrap_err();
        assert!(matches!(
            err,
            EngineError::Config(ValidationError::DelayTooShort(4))
        ));
        assert!(engine.list().await.is_empty());
    }

    #[tokio::test]
    async fn set_sticky_overwrites_existing() {
        let (engine, _) = test_engine();
        engine.set_sticky("chan", config(5)).await.unwrap();
        let mut updated = config(10);
        updated.title = "New rules".into();
        engine.set_sticky("chan", updated.clone()).await.unwrap();

        let list = engine.list().await;
        assert_eq!(list.len(), 1);
        assert_eq!(list["chan"], updated);
    }

    #[tokio::test]
    async fn remove_sticky_for_unknown_channel_is_not_found() {
        let (engine, _) = test_engine();
        let err = engine.remove_sticky("chan").await.unwrap_err();
        assert!(matches!(err, EngineError::NotFound(_)));
    }

    #[tokio::test]
    async fn update_delay_enforces_minimum() {
        let (engine, _) = test_engine();
        engine.set_sticky("chan", config(10)).await.unwrap();
        assert!(engine.update_delay("chan", 4).await.is_err());
        engine.update_delay("chan", 5).await.unwrap();
        assert_eq!(engine.list().await["chan"].repost_delay_secs, 5);
    }

    struct FailingStore {
        fail_saves: AtomicBool,
    }

    impl crate::store::StickyStore for FailingStore {
        fn load_active(&self) -> Result<HashMap<String, StickyConfig>, StoreError> {
            Err(StoreError::Io(std::io::Error::other("disk gone")))
        }
        fn save_active(&self, _: &HashMap<String, StickyConfig>) -> Result<(), StoreError> {
            if self.fail_saves.load(Ordering::SeqCst) {
                Err(StoreError::Io(std::io::Error::other("disk gone")))
            } else {
                Ok(())
            }
        }
        fn load_archive(&self) -> Result<HashMap<String, ArchiveEntry>, StoreError> {
            Err(StoreError::Io(std::io::Error::other("disk gone")))
        }
        fn save_archive(&self, _: &HashMap<String, ArchiveEntry>) -> Result<(), StoreError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn load_failure_degrades_to_empty_working_set() {
        let transport = Arc::new(testutil::FakeTransport::default());
        let engine = StickyEngine::load(
            Box::new(FailingStore {
                fail_saves: AtomicBool::new(false),
            }),
            transport,
            None,
            EngineConfig::default(),
        );
        assert!(engine.list().await.is_empty());
        // The engine still accepts new configurations.
        engine.set_sticky("chan", config(10)).await.unwrap();
        assert_eq!(engine.list().await.len(), 1);
    }

    #[tokio::test]
    async fn save_failure_surfaces_but_keeps_change_for_retry() {
        let transport = Arc::new(testutil::FakeTransport::default());
        let engine = StickyEngine::load(
            Box::new(FailingStore {
                fail_saves: AtomicBool::new(true),
            }),
            transport,
            None,
            EngineConfig::default(),
        );
        let err = engine.set_sticky("chan", config(10)).await.unwrap_err();
        assert!(matches!(err, EngineError::Store(_)));
        // The in-memory change is retained for a later retry.
        assert_eq!(engine.list().await.len(), 1);
    }

    #[tokio::test]
    async fn set_sticky_unarchives_the_channel() {
        let (engine, _) = test_engine();
        {
            let mut state = engine.state().lock().await;
            state.archive.insert(
                "chan".to_string(),
                ArchiveEntry::new(config(10), "guild-1".into(), Utc::now()),
            );
        }
        engine.set_sticky("chan", config(15)).await.unwrap();
        let state = engine.state().lock().await;
        assert!(state.archive.is_empty());
        assert!(state.active.contains_key("chan"));
    }

    #[tokio::test]
    async fn engine_persists_through_shared_store() {
        let store = Arc::new(MemoryStore::default());

        struct SharedStore(Arc<MemoryStore>);
        impl crate::store::StickyStore for SharedStore {
            fn load_active(&self) -> Result<HashMap<String, StickyConfig>, StoreError> {
                self.0.load_active()
            }
            fn save_active(&self, m: &HashMap<String, StickyConfig>) -> Result<(), StoreError> {
                self.0.save_active(m)
            }
            fn load_archive(&self) -> Result<HashMap<String, ArchiveEntry>, StoreError> {
                self.0.load_archive()
            }
            fn save_archive(&self, m: &HashMap<String, ArchiveEntry>) -> Result<(), StoreError> {
                self.0.save_archive(m)
            }
        }

        let transport = Arc::new(testutil::FakeTransport::default());
        let engine = StickyEngine::load(
            Box::new(SharedStore(store.clone())),
            transport.clone(),
            None,
            EngineConfig::default(),
        );
        engine.set_sticky("chan", config(10)).await.unwrap();
        drop(engine);

        // A second engine over the same backing store sees the config.
        let engine = StickyEngine::load(
            Box::new(SharedStore(store)),
            transport,
            None,
            EngineConfig::default(),
        );
        assert_eq!(engine.list().await.len(), 1);
    }
}
