use anyhow::{Result, anyhow};
use async_trait::async_trait;
use fjall::Keyspace;
use parking_lot::Mutex;
use rand::RngExt;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::task;

use crate::config::CacheConfig;
use crate::error::ItineraryError;
use crate::models::Coordinates;

/// Lifetime class of a cached payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TtlClass {
    Geocode,
    PlaceSearch,
    Photo,
}

/// Base lifetimes per [`TtlClass`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TtlPolicy {
    pub geocode: Duration,
    pub place_search: Duration,
    pub photo: Duration,
}

impl Default for TtlPolicy {
    fn default() -> Self {
        Self {
            geocode: Duration::from_hours(14 * 24),
            place_search: Duration::from_hours(48),
            photo: Duration::from_hours(14 * 24),
        }
    }
}

impl From<&CacheConfig> for TtlPolicy {
    fn from(config: &CacheConfig) -> Self {
        Self {
            geocode: Duration::from_hours(config.geocode_ttl_hours),
            place_search: Duration::from_hours(config.place_search_ttl_hours),
            photo: Duration::from_hours(config.photo_ttl_hours),
        }
    }
}

impl TtlPolicy {
    /// Lifetime for one write. Entries are jittered so they do not expire
    /// together; photos live between one and two base lifetimes.
    #[must_use]
    pub fn ttl_for(&self, class: TtlClass) -> Duration {
        let mut rng = rand::rng();
        match class {
            TtlClass::Geocode => self.geocode.mul_f32(rng.random_range(0.9..1.1)),
            TtlClass::PlaceSearch => self.place_search.mul_f32(rng.random_range(0.9..1.1)),
            TtlClass::Photo => self.photo.mul_f32(rng.random_range(1.0..2.0)),
        }
    }
}

/// Key derived from normalized lookup inputs
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

fn normalize_query(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

fn normalize_keywords(keywords: &str) -> String {
    let mut words: Vec<String> = keywords
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect();
    words.sort();
    words.dedup();
    words.join("+")
}

impl CacheKey {
    #[must_use]
    pub fn nearby(
        location: &Coordinates,
        radius_m: u32,
        category: Option<&str>,
        keyword: Option<&str>,
    ) -> Self {
        Self(format!(
            "nearby:{}:r{radius_m}:t{}:k{}",
            location.cache_fragment(),
            category.map(normalize_query).unwrap_or_default(),
            keyword.map(normalize_keywords).unwrap_or_default()
        ))
    }

    #[must_use]
    pub fn text(query: &str, bias: Option<&Coordinates>) -> Self {
        Self(format!(
            "text:{}:{}",
            normalize_query(query),
            bias.map(Coordinates::cache_fragment).unwrap_or_else(|| "-".to_string())
        ))
    }

    #[must_use]
    pub fn details(place_id: &str) -> Self {
        Self(format!("details:{place_id}"))
    }

    #[must_use]
    pub fn geocode(address: &str) -> Self {
        Self(format!("geocode:{}", normalize_query(address)))
    }

    #[must_use]
    pub fn photo(reference: &str, max_width: u32) -> Self {
        Self(format!("photo:{reference}:w{max_width}"))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Byte-oriented TTL store for place lookups
#[async_trait]
pub trait PlaceCache: Send + Sync {
    /// Fresh payload for `key`, `None` on miss or expiry
    async fn get(&self, key: &CacheKey) -> Result<Option<Vec<u8>>>;

    async fn set(&self, key: &CacheKey, value: Vec<u8>, ttl: TtlClass) -> Result<()>;
}

#[derive(Serialize, Deserialize)]
struct StoredEntry {
    value: Vec<u8>,
    expires_at: u64, // Unix timestamp (seconds)
}

fn unix_now() -> Result<u64> {
    Ok(SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs())
}

fn get_from_store(store: Keyspace, key: Vec<u8>) -> Result<Option<Vec<u8>>> {
    Ok(store.get(key)?.map(|v| v.to_vec()))
}

/// Disk-backed cache on a fjall keyspace
pub struct PersistentCache {
    store: Keyspace,
    policy: TtlPolicy,
}

impl PersistentCache {
    pub fn open(path: impl AsRef<Path>, policy: TtlPolicy) -> crate::Result<Self> {
        let location = path.as_ref().display().to_string();
        let db = fjall::Database::builder(path.as_ref())
            .open()
            .map_err(|e| ItineraryError::cache(format!("cannot open cache at {location}: {e}")))?;
        let items = db
            .keyspace("places", fjall::KeyspaceCreateOptions::default)
            .map_err(|e| ItineraryError::cache(format!("cannot open places keyspace: {e}")))?;
        Ok(PersistentCache {
            store: items,
            policy,
        })
    }

    /// Manually removes a key from the cache.
    pub async fn remove(&self, key: &CacheKey) -> Result<()> {
        let key = key.as_str().as_bytes().to_vec();
        let store = self.store.clone();
        task::spawn_blocking(move || store.remove(key)).await??;
        Ok(())
    }
}

#[async_trait]
impl PlaceCache for PersistentCache {
    #[tracing::instrument(name = "query_cache", level = "debug", skip(self, key), fields(key = key.as_str()))]
    async fn get(&self, key: &CacheKey) -> Result<Option<Vec<u8>>> {
        let store = self.store.clone();
        let key_bytes = key.as_str().as_bytes().to_vec();

        let maybe_bytes = task::spawn_blocking(move || get_from_store(store, key_bytes)).await??;

        let Some(bytes) = maybe_bytes else {
            tracing::debug!("Key not found");
            return Ok(None);
        };

        let entry: StoredEntry = postcard::from_bytes(&bytes)?;
        if unix_now()? < entry.expires_at {
            tracing::debug!("Key found and still fresh");
            Ok(Some(entry.value))
        } else {
            tracing::debug!("Key found but expired");
            self.remove(key).await?;
            Ok(None)
        }
    }

    #[tracing::instrument(name = "put_cache", level = "debug", skip(self, key, value), fields(key = key.as_str(), bytes = value.len()))]
    async fn set(&self, key: &CacheKey, value: Vec<u8>, ttl: TtlClass) -> Result<()> {
        let store = self.store.clone();
        let key = key.as_str().as_bytes().to_vec();
        let expires_at = SystemTime::now()
            .checked_add(self.policy.ttl_for(ttl))
            .ok_or(anyhow!("TTL overflow"))?
            .duration_since(UNIX_EPOCH)?
            .as_secs();
        let bytes = postcard::to_stdvec(&StoredEntry { value, expires_at })?;

        task::spawn_blocking(move || store.insert(key, bytes)).await??;
        Ok(())
    }
}

/// Process-local cache, used when no cache directory is configured
#[derive(Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<CacheKey, StoredEntry>>,
    policy: TtlPolicy,
}

impl MemoryCache {
    #[must_use]
    pub fn new(policy: TtlPolicy) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            policy,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl PlaceCache for MemoryCache {
    async fn get(&self, key: &CacheKey) -> Result<Option<Vec<u8>>> {
        let now = unix_now()?;
        let mut entries = self.entries.lock();
        match entries.get(key) {
            Some(entry) if now < entry.expires_at => Ok(Some(entry.value.clone())),
            Some(_) => {
                entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set(&self, key: &CacheKey, value: Vec<u8>, ttl: TtlClass) -> Result<()> {
        let expires_at = unix_now()? + self.policy.ttl_for(ttl).as_secs();
        self.entries
            .lock()
            .insert(key.clone(), StoredEntry { value, expires_at });
        Ok(())
    }
}
