//! Cache-through decorator with per-call budgets

use async_trait::async_trait;
use serde::{Serialize, de::DeserializeOwned};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, warn};

use super::{NearbyQuery, PlaceSearchError, PlaceSearchProvider, Result};
use crate::cache::{CacheKey, PlaceCache, TtlClass};
use crate::models::{Coordinates, PlaceResult};

/// Wraps a provider with a [`PlaceCache`]. Reads that fail count as misses
/// and writes are best-effort, so the cache can never fail a lookup.
pub struct CachedPlaceSearch {
    inner: Arc<dyn PlaceSearchProvider>,
    cache: Arc<dyn PlaceCache>,
    call_timeout: Duration,
    write_timeout: Duration,
}

impl CachedPlaceSearch {
    #[must_use]
    pub fn new(
        inner: Arc<dyn PlaceSearchProvider>,
        cache: Arc<dyn PlaceCache>,
        call_timeout: Duration,
        write_timeout: Duration,
    ) -> Self {
        Self {
            inner,
            cache,
            call_timeout,
            write_timeout,
        }
    }

    async fn read<T: DeserializeOwned>(&self, key: &CacheKey) -> Option<T> {
        match self.cache.get(key).await {
            Ok(Some(bytes)) => match postcard::from_bytes(&bytes) {
                Ok(value) => {
                    debug!(key = key.as_str(), "place cache hit");
                    Some(value)
                }
                Err(e) => {
                    warn!(key = key.as_str(), error = %e, "discarding undecodable cache entry");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                warn!(key = key.as_str(), error = %e, "cache read failed, treating as miss");
                None
            }
        }
    }

    async fn write_bytes(&self, key: &CacheKey, bytes: Vec<u8>, class: TtlClass) {
        match timeout(self.write_timeout, self.cache.set(key, bytes, class)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(key = key.as_str(), error = %e, "cache write failed"),
            Err(_) => warn!(key = key.as_str(), "cache write timed out"),
        }
    }

    async fn write<T: Serialize>(&self, key: &CacheKey, value: &T, class: TtlClass) {
        match postcard::to_stdvec(value) {
            Ok(bytes) => self.write_bytes(key, bytes, class).await,
            Err(e) => warn!(key = key.as_str(), error = %e, "failed to encode cache entry"),
        }
    }

    async fn bounded<T>(&self, call: impl Future<Output = Result<T>>) -> Result<T> {
        timeout(self.call_timeout, call)
            .await
            .map_err(|_| PlaceSearchError::Timeout(self.call_timeout))?
    }

    async fn cached<T, F>(&self, key: CacheKey, class: TtlClass, call: F) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: Future<Output = Result<T>>,
    {
        if let Some(hit) = self.read(&key).await {
            return Ok(hit);
        }
        let value = self.bounded(call).await?;
        self.write(&key, &value, class).await;
        Ok(value)
    }
}

#[async_trait]
impl PlaceSearchProvider for CachedPlaceSearch {
    async fn search_nearby(&self, query: &NearbyQuery) -> Result<Vec<PlaceResult>> {
        let key = CacheKey::nearby(
            &query.location,
            query.radius_m,
            query.category.as_deref(),
            query.keyword.as_deref(),
        );
        self.cached(key, TtlClass::PlaceSearch, self.inner.search_nearby(query))
            .await
    }

    async fn search_text(&self, query: &str, bias: Option<Coordinates>) -> Result<Vec<PlaceResult>> {
        let key = CacheKey::text(query, bias.as_ref());
        self.cached(key, TtlClass::PlaceSearch, self.inner.search_text(query, bias))
            .await
    }

    async fn place_details(&self, place_id: &str) -> Result<Option<PlaceResult>> {
        let key = CacheKey::details(place_id);
        self.cached(key, TtlClass::PlaceSearch, self.inner.place_details(place_id))
            .await
    }

    async fn geocode(&self, address: &str) -> Result<Option<Coordinates>> {
        let key = CacheKey::geocode(address);
        self.cached(key, TtlClass::Geocode, self.inner.geocode(address))
            .await
    }

    async fn photo(&self, reference: &str, max_width: u32) -> Result<Vec<u8>> {
        let key = CacheKey::photo(reference, max_width);
        match self.cache.get(&key).await {
            Ok(Some(bytes)) => return Ok(bytes),
            Ok(None) => {}
            Err(e) => warn!(key = key.as_str(), error = %e, "cache read failed, treating as miss"),
        }
        let bytes = self.bounded(self.inner.photo(reference, max_width)).await?;
        self.write_bytes(&key, bytes.clone(), TtlClass::Photo).await;
        Ok(bytes)
    }
}
