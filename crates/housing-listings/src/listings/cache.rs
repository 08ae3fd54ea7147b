use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use super::domain::{Flat, HouseId, Role};

/// Default lifetime of a cached listing.
pub const DEFAULT_LISTING_TTL: Duration = Duration::from_secs(5 * 60);

/// Key-value service holding serialized listings under opaque string keys.
#[async_trait]
pub trait CacheTransport: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError>;

    /// Replaces any existing value; the entry expires `ttl` from now.
    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), CacheError>;

    /// Removing an absent key is not an error.
    async fn delete(&self, key: &str) -> Result<(), CacheError>;
}

/// Cache error raised by transports or payload decoding.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("cache unavailable: {0}")]
    Unavailable(String),
    #[error("cached listing could not be decoded: {0}")]
    Codec(#[from] serde_json::Error),
    #[error("cache ttl {0:?} is out of range")]
    InvalidTtl(Duration),
}

impl From<redis::RedisError> for CacheError {
    fn from(value: redis::RedisError) -> Self {
        Self::Unavailable(value.to_string())
    }
}

/// One cache partition: the listing of a house as seen by a role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub house_id: HouseId,
    pub role: Role,
}

impl CacheKey {
    pub fn new(house_id: HouseId, role: Role) -> Self {
        Self { house_id, role }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "houseID:{},userType:{}",
            self.house_id.0,
            self.role.label()
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheLookup {
    Hit(Vec<Flat>),
    Miss,
}

/// Role-partitioned listing cache over a [`CacheTransport`].
pub struct ListingCache<T> {
    transport: Arc<T>,
    ttl: Duration,
}

impl<T> Clone for ListingCache<T> {
    fn clone(&self) -> Self {
        Self {
            transport: Arc::clone(&self.transport),
            ttl: self.ttl,
        }
    }
}

impl<T> ListingCache<T>
where
    T: CacheTransport,
{
    pub fn new(transport: Arc<T>, ttl: Duration) -> Self {
        Self { transport, ttl }
    }

    pub fn with_default_ttl(transport: Arc<T>) -> Self {
        Self::new(transport, DEFAULT_LISTING_TTL)
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub async fn get(&self, house_id: HouseId, role: Role) -> Result<CacheLookup, CacheError> {
        let key = CacheKey::new(house_id, role).to_string();
        match self.transport.get(&key).await? {
            Some(bytes) => Ok(CacheLookup::Hit(serde_json::from_slice(&bytes)?)),
            None => Ok(CacheLookup::Miss),
        }
    }

    pub async fn put(
        &self,
        flats: &[Flat],
        house_id: HouseId,
        role: Role,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        let key = CacheKey::new(house_id, role).to_string();
        let payload = serde_json::to_vec(flats)?;
        self.transport.set(&key, payload, ttl).await
    }

    pub async fn invalidate(&self, house_id: HouseId, role: Role) -> Result<(), CacheError> {
        let key = CacheKey::new(house_id, role).to_string();
        self.transport.delete(&key).await
    }
}
