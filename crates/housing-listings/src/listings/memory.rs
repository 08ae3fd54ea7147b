use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use async_trait::async_trait;

use super::cache::{CacheError, CacheTransport};
use super::domain::{
    next_touch, now_millis, Flat, FlatId, FlatStatus, House, HouseId, NewFlat, NewHouse, Role,
    StatusChange,
};
use super::store::{Entity, ListingStore, StoreError};
use super::transition::{
    decide, ClaimState, Decision, ModerationOutcome, ModerationReceipt, ModerationRejection,
};

#[derive(Debug, Default)]
struct Tables {
    houses: BTreeMap<HouseId, House>,
    flats: BTreeMap<FlatId, Flat>,
    next_house_id: i64,
    next_flat_id: i64,
}

/// Process-local listing store. A single lock serializes every operation, which gives
/// the per-flat atomicity the transition rule needs.
#[derive(Debug, Default, Clone)]
pub struct InMemoryListingStore {
    tables: Arc<Mutex<Tables>>,
}

impl InMemoryListingStore {
    fn lock(&self) -> Result<MutexGuard<'_, Tables>, StoreError> {
        self.tables
            .lock()
            .map_err(|_| StoreError::Unavailable("listing store mutex poisoned".to_string()))
    }

    /// Snapshot of a single flat, bypassing role filtering.
    pub fn flat(&self, id: FlatId) -> Result<Option<Flat>, StoreError> {
        Ok(self.lock()?.flats.get(&id).cloned())
    }

    pub fn house(&self, id: HouseId) -> Result<Option<House>, StoreError> {
        Ok(self.lock()?.houses.get(&id).cloned())
    }
}

#[async_trait]
impl ListingStore for InMemoryListingStore {
    async fn flats(&self, house_id: HouseId, role: Role) -> Result<Vec<Flat>, StoreError> {
        let tables = self.lock()?;
        Ok(tables
            .flats
            .values()
            .filter(|flat| flat.house_id == house_id && flat.status.visible_to(role))
            .cloned()
            .collect())
    }

    async fn create_house(&self, house: NewHouse) -> Result<House, StoreError> {
        house.validate()?;
        let mut tables = self.lock()?;
        tables.next_house_id += 1;
        let now = now_millis();
        let stored = House {
            id: HouseId(tables.next_house_id),
            address: house.address,
            year: house.year,
            developer: house.developer,
            created_at: now,
            updated_at: now,
        };
        tables.houses.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn create_flat(&self, flat: NewFlat) -> Result<Flat, StoreError> {
        flat.validate()?;
        let mut tables = self.lock()?;
        let tables = &mut *tables;

        let house = tables
            .houses
            .get_mut(&flat.house_id)
            .ok_or(StoreError::NotFound(Entity::House(flat.house_id)))?;
        house.updated_at = next_touch(house.updated_at, now_millis());

        tables.next_flat_id += 1;
        let stored = Flat {
            id: FlatId(tables.next_flat_id),
            house_id: flat.house_id,
            price: flat.price,
            rooms: flat.rooms,
            number: flat.number,
            status: FlatStatus::Created,
            moderator_id: None,
        };
        tables.flats.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn change_status(&self, change: StatusChange) -> Result<ModerationOutcome, StoreError> {
        let mut tables = self.lock()?;
        let flat = tables
            .flats
            .get_mut(&change.flat_id)
            .ok_or(StoreError::NotFound(Entity::Flat(change.flat_id)))?;

        let current = ClaimState {
            status: flat.status,
            moderator_id: flat.moderator_id,
        };

        match decide(current, &change) {
            Decision::Reject { held_by } => Ok(ModerationOutcome::Rejected(ModerationRejection {
                flat_id: change.flat_id,
                held_by,
            })),
            Decision::Apply(next) => {
                flat.status = next.status;
                flat.moderator_id = next.moderator_id;
                Ok(ModerationOutcome::Applied(ModerationReceipt {
                    flat: flat.clone(),
                    handled_by: change.moderator_id,
                }))
            }
        }
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    payload: Vec<u8>,
    expires_at: Instant,
}

/// Process-local key-value cache with absolute expiry.
#[derive(Debug, Default, Clone)]
pub struct InMemoryCacheTransport {
    entries: Arc<Mutex<HashMap<String, CacheEntry>>>,
}

impl InMemoryCacheTransport {
    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, CacheEntry>>, CacheError> {
        self.entries
            .lock()
            .map_err(|_| CacheError::Unavailable("cache mutex poisoned".to_string()))
    }

    /// Keys currently held, expired or not.
    pub fn keys(&self) -> Vec<String> {
        match self.entries.lock() {
            Ok(entries) => entries.keys().cloned().collect(),
            Err(_) => Vec::new(),
        }
    }
}

#[async_trait]
impl CacheTransport for InMemoryCacheTransport {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        let mut entries = self.lock()?;
        match entries.get(key) {
            Some(entry) if Instant::now() < entry.expires_at => Ok(Some(entry.payload.clone())),
            Some(_) => {
                entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), CacheError> {
        let expires_at = Instant::now()
            .checked_add(ttl)
            .ok_or(CacheError::InvalidTtl(ttl))?;
        self.lock()?.insert(
            key.to_string(),
            CacheEntry {
                payload: value,
                expires_at,
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.lock()?.remove(key);
        Ok(())
    }
}
