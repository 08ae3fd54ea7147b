use std::sync::Arc;

use tracing::{info, warn};

use super::cache::{CacheKey, CacheTransport, ListingCache};
use super::domain::{Flat, FlatStatus, House, NewFlat, NewHouse, Role, StatusChange};
use super::store::{ListingStore, StoreError};
use super::transition::ModerationOutcome;

/// Cache partitions that must be dropped after `flat` was written.
///
/// The moderator view always changes. The client view only changes when the flat ends up
/// approved, since clients never see any other status.
pub fn partitions_to_invalidate(flat: &Flat) -> Vec<CacheKey> {
    let mut keys = vec![CacheKey::new(flat.house_id, Role::Moderator)];
    if flat.status == FlatStatus::Approved {
        keys.push(CacheKey::new(flat.house_id, Role::Client));
    }
    keys
}

/// Write side of the listings: creation, status transitions and the invalidation that
/// follows them.
pub struct ModerationWorkflow<S, T> {
    store: Arc<S>,
    cache: ListingCache<T>,
}

impl<S, T> ModerationWorkflow<S, T>
where
    S: ListingStore + 'static,
    T: CacheTransport + 'static,
{
    pub fn new(store: Arc<S>, cache: ListingCache<T>) -> Self {
        Self { store, cache }
    }

    pub async fn create_house(&self, house: NewHouse) -> Result<House, StoreError> {
        let stored = self.store.create_house(house).await?;
        info!(house_id = %stored.id, "house created");
        Ok(stored)
    }

    pub async fn create_flat(&self, flat: NewFlat) -> Result<Flat, StoreError> {
        let stored = self.store.create_flat(flat).await?;
        info!(flat_id = %stored.id, house_id = %stored.house_id, "flat created");
        self.invalidate_for(&stored).await;
        Ok(stored)
    }

    /// Applies a moderator's status change. A conflicting claim comes back as
    /// [`ModerationOutcome::Rejected`], not as an error.
    pub async fn update_flat(&self, change: StatusChange) -> Result<ModerationOutcome, StoreError> {
        let outcome = self.store.change_status(change).await?;
        match &outcome {
            ModerationOutcome::Applied(receipt) => {
                info!(
                    flat_id = %receipt.flat.id,
                    status = receipt.flat.status.label(),
                    moderator_id = %receipt.handled_by,
                    "flat status changed"
                );
                self.invalidate_for(&receipt.flat).await;
            }
            ModerationOutcome::Rejected(rejection) => {
                info!(
                    flat_id = %rejection.flat_id,
                    moderator_id = %change.moderator_id,
                    held_by = ?rejection.held_by.map(|id| id.0),
                    "moderation rejected: flat claimed by another moderator"
                );
            }
        }
        Ok(outcome)
    }

    /// Best effort: failures are logged and never undo the write.
    async fn invalidate_for(&self, flat: &Flat) {
        for key in partitions_to_invalidate(flat) {
            if let Err(err) = self.cache.invalidate(key.house_id, key.role).await {
                warn!(key = %key, error = %err, "failed to invalidate listing cache");
            }
        }
    }
}
