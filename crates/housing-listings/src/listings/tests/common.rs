use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::response::Response;
use serde_json::Value;

use crate::listings::auth::TokenAuthority;
use crate::listings::cache::{CacheError, CacheTransport, ListingCache};
use crate::listings::domain::{
    Flat, House, HouseId, ModeratorId, NewFlat, NewHouse, Role, StatusChange,
};
use crate::listings::memory::{InMemoryCacheTransport, InMemoryListingStore};
use crate::listings::service::ListingService;
use crate::listings::store::{ListingStore, StoreError};
use crate::listings::transition::ModerationOutcome;
use crate::listings::{listing_router, FlatStatus};

pub(super) const TEST_SECRET: &str = "test-secret-that-is-long-enough-for-hmac";

pub(super) fn new_house() -> NewHouse {
    NewHouse {
        address: "Lesnaya 7, Moscow".to_string(),
        year: 2008,
        developer: Some("Mosstroy".to_string()),
    }
}

pub(super) fn new_flat(house_id: HouseId) -> NewFlat {
    NewFlat {
        house_id,
        price: 150_000,
        rooms: 4,
        number: 102,
        status: None,
        moderator_id: None,
    }
}

pub(super) fn change(flat: &Flat, status: FlatStatus, moderator: i64) -> StatusChange {
    StatusChange {
        flat_id: flat.id,
        status,
        moderator_id: ModeratorId(moderator),
    }
}

/// Store double counting listing reads.
#[derive(Default)]
pub(super) struct CountingStore {
    pub(super) inner: InMemoryListingStore,
    reads: AtomicUsize,
}

impl CountingStore {
    pub(super) fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ListingStore for CountingStore {
    async fn flats(&self, house_id: HouseId, role: Role) -> Result<Vec<Flat>, StoreError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.inner.flats(house_id, role).await
    }

    async fn create_house(&self, house: NewHouse) -> Result<House, StoreError> {
        self.inner.create_house(house).await
    }

    async fn create_flat(&self, flat: NewFlat) -> Result<Flat, StoreError> {
        self.inner.create_flat(flat).await
    }

    async fn change_status(&self, change: StatusChange) -> Result<ModerationOutcome, StoreError> {
        self.inner.change_status(change).await
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) enum CacheOp {
    Get(String),
    Set(String),
    Delete(String),
}

/// Cache double recording every transport call; can be switched into a failing mode.
#[derive(Default)]
pub(super) struct RecordingCache {
    pub(super) inner: InMemoryCacheTransport,
    ops: Mutex<Vec<CacheOp>>,
    failing: AtomicBool,
}

impl RecordingCache {
    pub(super) fn ops(&self) -> Vec<CacheOp> {
        self.ops.lock().expect("ops mutex poisoned").clone()
    }

    pub(super) fn clear(&self) {
        self.ops.lock().expect("ops mutex poisoned").clear();
    }

    pub(super) fn sets(&self) -> usize {
        self.ops()
            .iter()
            .filter(|op| matches!(op, CacheOp::Set(_)))
            .count()
    }

    pub(super) fn deleted(&self) -> Vec<String> {
        self.ops()
            .into_iter()
            .filter_map(|op| match op {
                CacheOp::Delete(key) => Some(key),
                _ => None,
            })
            .collect()
    }

    pub(super) fn fail(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn record(&self, op: CacheOp) -> Result<(), CacheError> {
        self.ops.lock().expect("ops mutex poisoned").push(op);
        if self.failing.load(Ordering::SeqCst) {
            Err(CacheError::Unavailable("cache offline".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl CacheTransport for RecordingCache {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        self.record(CacheOp::Get(key.to_string()))?;
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), CacheError> {
        self.record(CacheOp::Set(key.to_string()))?;
        self.inner.set(key, value, ttl).await
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.record(CacheOp::Delete(key.to_string()))?;
        self.inner.delete(key).await
    }
}

pub(super) struct UnavailableStore;

#[async_trait]
impl ListingStore for UnavailableStore {
    async fn flats(&self, _house_id: HouseId, _role: Role) -> Result<Vec<Flat>, StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }

    async fn create_house(&self, _house: NewHouse) -> Result<House, StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }

    async fn create_flat(&self, _flat: NewFlat) -> Result<Flat, StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }

    async fn change_status(&self, _change: StatusChange) -> Result<ModerationOutcome, StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }
}

pub(super) type TestService = ListingService<CountingStore, RecordingCache>;

pub(super) fn build_service() -> (TestService, Arc<CountingStore>, Arc<RecordingCache>) {
    let store = Arc::new(CountingStore::default());
    let cache = Arc::new(RecordingCache::default());
    let service = ListingService::new(
        store.clone(),
        ListingCache::new(cache.clone(), Duration::from_secs(300)),
    );
    (service, store, cache)
}

/// A house with one flat in each status, as a moderator would leave it.
pub(super) async fn seeded_house(service: &TestService) -> (House, Vec<Flat>) {
    let house = service.create_house(new_house()).await.expect("house");
    let mut flats = Vec::new();
    for (offset, target) in [
        FlatStatus::Created,
        FlatStatus::OnModeration,
        FlatStatus::Approved,
        FlatStatus::Declined,
    ]
    .into_iter()
    .enumerate()
    {
        let mut payload = new_flat(house.id);
        payload.number = 100 + offset as i32;
        let flat = service.create_flat(payload).await.expect("flat");
        let flat = match target {
            FlatStatus::Created => flat,
            status => {
                service
                    .update_flat(change(&flat, status, 1))
                    .await
                    .expect("transition")
                    .applied()
                    .expect("applied")
                    .flat
                    .clone()
            }
        };
        flats.push(flat);
    }
    (house, flats)
}

pub(super) fn key(house_id: HouseId, role: Role) -> String {
    format!("houseID:{},userType:{}", house_id.0, role.label())
}

pub(super) fn authority() -> Arc<TokenAuthority> {
    Arc::new(TokenAuthority::new(TEST_SECRET, 15))
}

pub(super) fn router_with_service(service: TestService) -> axum::Router {
    listing_router(Arc::new(service), authority())
}

pub(super) fn bearer(role: Role, moderator: Option<i64>) -> String {
    let (token, _) = authority()
        .issue(role, moderator.map(ModeratorId))
        .expect("token issues");
    format!("Bearer {token}")
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
