//! Process-wide broadcast entry point: snapshot, dispatch, reconcile.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::info;

use crate::{
    dispatch::{DispatchConfig, DispatchLoop, DispatchResult},
    messaging::{port::Transport, types::Payload},
    reconcile::reconcile,
    store::RecipientStore,
};

#[derive(Clone, Copy, Debug, Default)]
pub struct BroadcastConfig {
    pub dispatch: DispatchConfig,
    /// Also fan out to the user store, not only to groups.
    pub include_users: bool,
}

/// Outcome of one broadcast across every audience.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BroadcastSummary {
    pub groups: DispatchResult,
    pub users: Option<DispatchResult>,
    /// At least one audience was dispatched from a cached (stale) snapshot.
    pub stale: bool,
}

impl BroadcastSummary {
    fn results(&self) -> impl Iterator<Item = &DispatchResult> {
        std::iter::once(&self.groups).chain(self.users.as_ref())
    }

    pub fn delivered(&self) -> usize {
        self.results().map(|r| r.delivered).sum()
    }

    pub fn total(&self) -> usize {
        self.results().map(|r| r.total).sum()
    }

    pub fn purged(&self) -> usize {
        self.results().map(|r| r.purge.len()).sum()
    }

    pub fn failed(&self) -> usize {
        self.results().map(|r| r.failed.len()).sum()
    }
}

/// Owns the recipient stores and the transport for the lifetime of the process.
///
/// Broadcasts are serialized: two dispatch passes over the same stores never
/// run at once, so their purges cannot interleave.
pub struct BroadcastService {
    groups: Arc<RecipientStore>,
    users: Arc<RecipientStore>,
    transport: Arc<dyn Transport>,
    cfg: BroadcastConfig,
    in_flight: Mutex<()>,
}

impl BroadcastService {
    pub fn new(
        groups: Arc<RecipientStore>,
        users: Arc<RecipientStore>,
        transport: Arc<dyn Transport>,
        cfg: BroadcastConfig,
    ) -> Self {
        Self {
            groups,
            users,
            transport,
            cfg,
            in_flight: Mutex::new(()),
        }
    }

    pub fn groups(&self) -> &Arc<RecipientStore> {
        &self.groups
    }

    pub fn users(&self) -> &Arc<RecipientStore> {
        &self.users
    }

    pub async fn submit_broadcast(&self, payload: &Payload) -> BroadcastSummary {
        let _running = self.in_flight.lock().await;

        let (groups, groups_stale) = self.fan_out(&self.groups, payload).await;
        let mut summary = BroadcastSummary {
            groups,
            users: None,
            stale: groups_stale,
        };

        if self.cfg.include_users {
            let (users, users_stale) = self.fan_out(&self.users, payload).await;
            summary.users = Some(users);
            summary.stale |= users_stale;
        }

        info!(
            kind = %payload.kind(),
            delivered = summary.delivered(),
            total = summary.total(),
            purged = summary.purged(),
            stale = summary.stale,
            "broadcast finished"
        );
        summary
    }

    /// Number of targets the next broadcast would reach.
    pub async fn current_recipient_count(&self) -> usize {
        let (groups, _) = self.groups.snapshot_or_cached().await;
        if !self.cfg.include_users {
            return groups.len();
        }
        let (users, _) = self.users.snapshot_or_cached().await;
        groups.len() + users.len()
    }

    async fn fan_out(&self, store: &RecipientStore, payload: &Payload) -> (DispatchResult, bool) {
        let (snapshot, stale) = store.snapshot_or_cached().await;
        let result = DispatchLoop::new(self.transport.as_ref(), self.cfg.dispatch)
            .dispatch(payload, &snapshot)
            .await;
        reconcile(store, &result).await;
        (result, stale)
    }
}
