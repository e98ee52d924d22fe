use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::campaign::{Campaign, CampaignId};
use crate::error::Error;
use crate::project::ProjectId;

#[async_trait]
pub trait Cache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, Error>;

    async fn set(&self, key: &str, value: String) -> Result<(), Error>;

    /// Deleting a key that is not present is not an error. Every delete
    /// advances [`Cache::version`].
    async fn delete(&self, key: &str) -> Result<(), Error>;

    /// Number of deletes so far. Read-through callers take it before loading
    /// from the database and hand it to [`Cache::set_if_current`].
    async fn version(&self) -> Result<u64, Error>;

    /// Stores `value` only if nothing was deleted since `version` was taken,
    /// so a load that raced a write cannot cache what the write replaced.
    async fn set_if_current(&self, key: &str, value: String, version: u64) -> Result<(), Error>;
}

/// Cache key layout.
pub struct Keys;

impl Keys {
    pub fn campaign(campaign_id: CampaignId) -> String {
        format!("campaign:{}", campaign_id)
    }

    pub fn project_campaigns(project_id: ProjectId) -> String {
        format!("project-campaigns:{}", project_id)
    }
}

pub async fn get_json<T: DeserializeOwned>(cache: &dyn Cache, key: &str) -> Result<Option<T>, Error> {
    let value = match cache.get(key).await? {
        Some(value) => value,
        None => return Ok(None),
    };

    match serde_json::from_str(&value) {
        Ok(value) => Ok(Some(value)),
        Err(err) => {
            // an entry written by an older build, treat it as a miss
            tracing::warn!(key, %err, "discarding unreadable cache entry");
            cache.delete(key).await?;
            Ok(None)
        }
    }
}

pub async fn set_json<T: Serialize + Sync>(
    cache: &dyn Cache,
    key: &str,
    value: &T,
    version: u64,
) -> Result<(), Error> {
    let value = serde_json::to_string(value)?;
    cache.set_if_current(key, value, version).await
}

/// Removes every cached read that can include `campaign`. Runs last in each
/// operation that changes a campaign or a project's set of campaigns.
#[tracing::instrument(skip(cache, campaign), fields(campaign_id = %campaign.id))]
pub async fn invalidate_campaign(cache: &dyn Cache, campaign: &Campaign) -> Result<(), Error> {
    cache.delete(&Keys::campaign(campaign.id)).await?;
    cache
        .delete(&Keys::project_campaigns(campaign.project_id))
        .await?;

    Ok(())
}

struct CacheEntry {
    value: String,
    expires_at: Instant,
}

/// Every this many writes, expired entries are swept out.
const SWEEP_INTERVAL: usize = 64;

/// In-process cache with a fixed time-to-live per entry.
pub struct MemoryCache {
    entries: DashMap<String, CacheEntry>,
    ttl: Duration,
    deletes: AtomicU64,
    writes: AtomicUsize,
}

impl MemoryCache {
    pub fn new(ttl: Duration) -> MemoryCache {
        MemoryCache {
            entries: DashMap::new(),
            ttl,
            deletes: AtomicU64::new(0),
            writes: AtomicUsize::new(0),
        }
    }

    fn insert(&self, key: &str, value: String) {
        let now = Instant::now();
        if (self.writes.fetch_add(1, Ordering::Relaxed) + 1) % SWEEP_INTERVAL == 0 {
            self.entries.retain(|_, entry| entry.expires_at > now);
        }

        let entry = CacheEntry {
            value,
            expires_at: now + self.ttl,
        };
        self.entries.insert(key.to_owned(), entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl Cache for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>, Error> {
        let now = Instant::now();
        let hit = self
            .entries
            .get(key)
            .filter(|entry| entry.expires_at > now)
            .map(|entry| entry.value.clone());

        if hit.is_none() {
            self.entries.remove_if(key, |_, entry| entry.expires_at <= now);
        }

        Ok(hit)
    }

    async fn set(&self, key: &str, value: String) -> Result<(), Error> {
        self.insert(key, value);

        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), Error> {
        // bump before removing: a racing set_if_current either sees the new
        // version or has already inserted, and then the remove wins
        self.deletes.fetch_add(1, Ordering::SeqCst);
        self.entries.remove(key);

        Ok(())
    }

    async fn version(&self) -> Result<u64, Error> {
        Ok(self.deletes.load(Ordering::SeqCst))
    }

    async fn set_if_current(&self, key: &str, value: String, version: u64) -> Result<(), Error> {
        if self.deletes.load(Ordering::SeqCst) != version {
            return Ok(());
        }

        self.insert(key, value);

        // a delete that landed while inserting may have missed the new entry
        if self.deletes.load(Ordering::SeqCst) != version {
            self.entries.remove(key);
        }

        Ok(())
    }
}
