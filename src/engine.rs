//! Engine wiring: one struct tying storage, revisions, broadcast, and the
//! mutation/read paths together with a shared configuration.

use crate::bell::{BellConfig, BellScheduler};
use crate::catchup::CatchupResolver;
use crate::coordinator::{CoordinatorConfig, MutationCoordinator};
use crate::expand::OverrideRules;
use crate::revisions::RevisionLog;
use crate::store::ScheduleStore;
use crate::sync::SyncBroadcaster;
use chrono::Duration;
use std::sync::Arc;

/// Engine configuration.
#[derive(Clone, Copy, Debug)]
pub struct EngineConfig {
    /// Day-of-week override rules for template expansion.
    pub override_rules: OverrideRules,

    /// Allowed drift for the bulk-autofill freshness marker.
    pub freshness_window: Duration,

    /// Per-subscriber event buffer before a slow client is dropped.
    pub subscriber_buffer: usize,

    /// Bell scheduler tuning.
    pub bell: BellConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            override_rules: OverrideRules::default(),
            freshness_window: Duration::seconds(10),
            subscriber_buffer: 256,
            bell: BellConfig::default(),
        }
    }
}

/// The assembled schedule engine.
///
/// Construction wires every component onto one store and revision log;
/// accessors hand out the pieces the embedding transport needs.
pub struct Engine {
    store: Arc<ScheduleStore>,
    revisions: Arc<RevisionLog>,
    broadcaster: Arc<SyncBroadcaster>,
    coordinator: Arc<MutationCoordinator>,
    catchup: CatchupResolver,
    bell: Arc<BellScheduler>,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        let store = Arc::new(ScheduleStore::new());
        let revisions = Arc::new(RevisionLog::new());
        let broadcaster = Arc::new(SyncBroadcaster::with_buffer_size(config.subscriber_buffer));

        let coordinator = Arc::new(MutationCoordinator::new(
            Arc::clone(&store),
            Arc::clone(&revisions),
            Arc::clone(&broadcaster),
            CoordinatorConfig {
                freshness_window: config.freshness_window,
                override_rules: config.override_rules,
            },
        ));
        let catchup = CatchupResolver::new(Arc::clone(&store), Arc::clone(&revisions));
        let bell = Arc::new(BellScheduler::new(
            Arc::clone(&store),
            Arc::clone(&broadcaster),
            config.bell,
        ));

        Self {
            store,
            revisions,
            broadcaster,
            coordinator,
            catchup,
            bell,
        }
    }

    pub fn store(&self) -> &Arc<ScheduleStore> {
        &self.store
    }

    pub fn revisions(&self) -> &Arc<RevisionLog> {
        &self.revisions
    }

    pub fn broadcaster(&self) -> &Arc<SyncBroadcaster> {
        &self.broadcaster
    }

    pub fn coordinator(&self) -> &Arc<MutationCoordinator> {
        &self.coordinator
    }

    pub fn catchup(&self) -> &CatchupResolver {
        &self.catchup
    }

    pub fn bell(&self) -> &Arc<BellScheduler> {
        &self.bell
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}
