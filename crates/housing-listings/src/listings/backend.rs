//! Runtime selection between in-process and networked backends.
//!
//! Enum dispatch keeps the service generic without trait objects: the configuration
//! decides the variant once at start-up.

use std::time::Duration;

use async_trait::async_trait;
use tracing::info;

use super::cache::{CacheError, CacheTransport};
use super::domain::{Flat, House, HouseId, NewFlat, NewHouse, Role, StatusChange};
use super::memory::{InMemoryCacheTransport, InMemoryListingStore};
use super::pg_store::PgListingStore;
use super::redis_cache::RedisCacheTransport;
use super::store::{ListingStore, StoreError};
use super::transition::ModerationOutcome;
use crate::config::StorageConfig;

#[derive(Debug, Clone)]
pub enum StoreBackend {
    Memory(InMemoryListingStore),
    Postgres(PgListingStore),
}

impl StoreBackend {
    /// Connects to PostgreSQL and runs migrations when a database URL is configured.
    pub async fn from_config(config: &StorageConfig) -> Result<Self, StoreError> {
        match &config.database_url {
            Some(url) => {
                let store = PgListingStore::connect(url, config.max_connections).await?;
                store.migrate().await?;
                info!(backend = "postgres", "listing store ready");
                Ok(Self::Postgres(store))
            }
            None => {
                info!(backend = "memory", "listing store ready");
                Ok(Self::Memory(InMemoryListingStore::default()))
            }
        }
    }

    pub const fn label(&self) -> &'static str {
        match self {
            StoreBackend::Memory(_) => "memory",
            StoreBackend::Postgres(_) => "postgres",
        }
    }
}

#[async_trait]
impl ListingStore for StoreBackend {
    async fn flats(&self, house_id: HouseId, role: Role) -> Result<Vec<Flat>, StoreError> {
        match self {
            StoreBackend::Memory(store) => store.flats(house_id, role).await,
            StoreBackend::Postgres(store) => store.flats(house_id, role).await,
        }
    }

    async fn create_house(&self, house: NewHouse) -> Result<House, StoreError> {
        match self {
            StoreBackend::Memory(store) => store.create_house(house).await,
            StoreBackend::Postgres(store) => store.create_house(house).await,
        }
    }

    async fn create_flat(&self, flat: NewFlat) -> Result<Flat, StoreError> {
        match self {
            StoreBackend::Memory(store) => store.create_flat(flat).await,
            StoreBackend::Postgres(store) => store.create_flat(flat).await,
        }
    }

    async fn change_status(&self, change: StatusChange) -> Result<ModerationOutcome, StoreError> {
        match self {
            StoreBackend::Memory(store) => store.change_status(change).await,
            StoreBackend::Postgres(store) => store.change_status(change).await,
        }
    }
}

#[derive(Clone)]
pub enum CacheBackend {
    Memory(InMemoryCacheTransport),
    Redis(RedisCacheTransport),
}

impl CacheBackend {
    pub async fn from_config(config: &StorageConfig) -> Result<Self, CacheError> {
        match &config.redis_url {
            Some(url) => {
                let transport = RedisCacheTransport::connect(url).await?;
                info!(backend = "redis", "listing cache ready");
                Ok(Self::Redis(transport))
            }
            None => {
                info!(backend = "memory", "listing cache ready");
                Ok(Self::Memory(InMemoryCacheTransport::default()))
            }
        }
    }

    pub const fn label(&self) -> &'static str {
        match self {
            CacheBackend::Memory(_) => "memory",
            CacheBackend::Redis(_) => "redis",
        }
    }
}

#[async_trait]
impl CacheTransport for CacheBackend {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        match self {
            CacheBackend::Memory(cache) => cache.get(key).await,
            CacheBackend::Redis(cache) => cache.get(key).await,
        }
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), CacheError> {
        match self {
            CacheBackend::Memory(cache) => cache.set(key, value, ttl).await,
            CacheBackend::Redis(cache) => cache.set(key, value, ttl).await,
        }
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        match self {
            CacheBackend::Memory(cache) => cache.delete(key).await,
            CacheBackend::Redis(cache) => cache.delete(key).await,
        }
    }
}
