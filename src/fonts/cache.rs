use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures::future::try_join_all;

use super::{FontAsset, FontRequest, FontResolver, FontStyle};
use crate::Result;

#[derive(Debug, Clone, Hash, PartialEq, Eq)]
struct CacheKey {
    family: String,
    weight: u16,
    style: FontStyle,
}

impl CacheKey {
    fn new(request: &FontRequest) -> Self {
        Self {
            family: request.family.trim().to_lowercase(),
            weight: request.snapped_weight(),
            style: request.style,
        }
    }
}

/// Time-bounded cache keyed by family, snapped weight and style.
///
/// Misses are resolved one request at a time through the inner resolver so
/// that each key maps to exactly the assets its request produced. A backend
/// that answers with a whole family can therefore return the same face for
/// several keys; the combined answer keeps each face once.
pub struct CachingResolver<R> {
    inner: R,
    ttl: Duration,
    entries: Mutex<HashMap<CacheKey, (Instant, Vec<FontAsset>)>>,
}

impl<R: FontResolver> CachingResolver<R> {
    pub fn new(inner: R, ttl: Duration) -> Self {
        Self {
            inner,
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn lookup(&self, key: &CacheKey) -> Option<Vec<FontAsset>> {
        let mut entries = self.entries.lock().ok()?;
        match entries.get(key) {
            Some((stored, assets)) if stored.elapsed() < self.ttl => Some(assets.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    /// Insert `assets` and drop every entry that has outlived the TTL.
    fn store(&self, key: CacheKey, assets: &[FontAsset]) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.retain(|_, (stored, _)| stored.elapsed() < self.ttl);
            entries.insert(key, (Instant::now(), assets.to_vec()));
        }
    }

    async fn resolve_one(&self, request: &FontRequest) -> Result<Vec<FontAsset>> {
        let key = CacheKey::new(request);
        if let Some(hit) = self.lookup(&key) {
            log::debug!("font cache hit for {:?}", key);
            return Ok(hit);
        }
        let assets = self.inner.resolve(std::slice::from_ref(request)).await?;
        self.store(key, &assets);
        Ok(assets)
    }
}

#[async_trait]
impl<R: FontResolver> FontResolver for CachingResolver<R> {
    async fn resolve(&self, requests: &[FontRequest]) -> Result<Vec<FontAsset>> {
        if requests.is_empty() {
            return self.inner.resolve(requests).await;
        }
        let groups = try_join_all(requests.iter().map(|r| self.resolve_one(r))).await?;
        let mut seen = HashSet::new();
        Ok(groups
            .into_iter()
            .flatten()
            .filter(|a| seen.insert((a.family().to_string(), a.weight(), a.style())))
            .collect())
    }
}
