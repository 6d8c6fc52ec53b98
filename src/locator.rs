use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, NaiveDateTime, TimeDelta, Utc};
use reqwest::Url;
use serde::Serialize;
use tracing::{debug, info};

use crate::archive::classify_at;
use crate::clock::{Clock, SystemClock};
use crate::domain::{ArchiveStatus, ObjectId, RemoteObjectRef, RestoreTier, SourceKind};
use crate::error::PortalError;
use crate::portal::{PortalClient, PresignOptions, RestoreRequest, error_text};

pub const DEFAULT_PRESIGN_TTL: Duration = Duration::from_secs(300);
pub const DEFAULT_CACHE_CAPACITY: usize = 256;

/// A time-bounded access URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PresignedAccess {
    pub url: String,
    pub issued_at: DateTime<Utc>,
    pub ttl: Duration,
}

impl PresignedAccess {
    pub fn expires_at(&self) -> DateTime<Utc> {
        // An unrepresentable ttl collapses to zero, i.e. already stale.
        self.issued_at + TimeDelta::from_std(self.ttl).unwrap_or(TimeDelta::zero())
    }

    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RestoreOutcome {
    pub object_id: ObjectId,
    pub days: u32,
    pub tier: RestoreTier,
    pub requested_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct PresignKey {
    object_id: ObjectId,
    options: PresignOptions,
}

struct PresignCache {
    max_entries: usize,
    entries: HashMap<PresignKey, PresignedAccess>,
}

impl PresignCache {
    fn new(max_entries: usize) -> Self {
        Self {
            max_entries: max_entries.max(1),
            entries: HashMap::new(),
        }
    }

    fn get(&mut self, key: &PresignKey, now: DateTime<Utc>) -> Option<PresignedAccess> {
        self.entries.retain(|_, access| access.is_fresh(now));
        self.entries.get(key).cloned()
    }

    fn insert(&mut self, key: PresignKey, access: PresignedAccess, now: DateTime<Utc>) {
        self.entries.retain(|_, access| access.is_fresh(now));
        if self.entries.len() >= self.max_entries && !self.entries.contains_key(&key) {
            if let Some(victim) = self
                .entries
                .iter()
                .min_by_key(|(_, access)| access.issued_at)
                .map(|(key, _)| key.clone())
            {
                self.entries.remove(&victim);
            }
        }
        self.entries.insert(key, access);
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Resolves object references to access URLs and archive states.
///
/// Presigned URLs are cached per object id and header overrides until
/// their ttl elapses; an expired entry is never returned. Results fetched
/// before [`StorageObjectLocator::invalidate_context`] are handed back to
/// the caller but not cached.
pub struct StorageObjectLocator<P: PortalClient, C: Clock = SystemClock> {
    portal: P,
    clock: C,
    ttl: Duration,
    cache: Mutex<PresignCache>,
    epoch: AtomicU64,
}

impl<P: PortalClient> StorageObjectLocator<P, SystemClock> {
    pub fn new(portal: P) -> Self {
        Self::with_clock(portal, SystemClock, DEFAULT_PRESIGN_TTL, DEFAULT_CACHE_CAPACITY)
    }
}

impl<P: PortalClient, C: Clock> StorageObjectLocator<P, C> {
    pub fn with_clock(portal: P, clock: C, ttl: Duration, capacity: usize) -> Self {
        Self {
            portal,
            clock,
            ttl,
            cache: Mutex::new(PresignCache::new(capacity)),
            epoch: AtomicU64::new(0),
        }
    }

    pub fn portal(&self) -> &P {
        &self.portal
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Marks every in-flight presign as stale.
    pub fn invalidate_context(&self) {
        self.epoch.fetch_add(1, Ordering::SeqCst);
    }

    pub fn cached_entries(&self) -> usize {
        self.cache.lock().map(|cache| cache.len()).unwrap_or(0)
    }

    pub async fn get_status(&self, object: &RemoteObjectRef) -> Result<ArchiveStatus, PortalError> {
        let response = self.portal.object_status(object).await.map_err(|err| {
            PortalError::StatusUnavailable {
                object: object.to_string(),
                reason: err.to_string(),
            }
        })?;
        let status = classify_at(&response.head_object, self.clock.now());
        debug!(object = %object, %status, "classified archive status");
        Ok(status)
    }

    pub async fn get_presigned_url(
        &self,
        object: &RemoteObjectRef,
        options: &PresignOptions,
    ) -> Result<PresignedAccess, PortalError> {
        let key = PresignKey {
            object_id: object.object_id().clone(),
            options: options.clone(),
        };
        if let Some(hit) = self.lookup(&key) {
            debug!(object = %object, "presign cache hit");
            return Ok(hit);
        }

        let epoch = self.epoch.load(Ordering::SeqCst);
        let requested_at = self.clock.now();
        let failed = |reason: String| PortalError::PresignFailed {
            object: object.to_string(),
            reason,
        };
        let response = self
            .portal
            .presign(object, options)
            .await
            .map_err(|err| failed(err.to_string()))?;
        if let Some(error) = &response.error {
            return Err(failed(error_text(error)));
        }
        let url = response
            .signed_url
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| failed("portal returned no signed_url".to_string()))?;

        let ttl = match url_expiry(&url) {
            Some(expiry) => expiry.min(self.ttl),
            None => self.ttl,
        };
        // The validity window opens at signing time, never after the request.
        let issued_at = url_signed_at(&url)
            .map_or(requested_at, |signed_at| signed_at.min(requested_at));
        let access = PresignedAccess { url, issued_at, ttl };

        if self.epoch.load(Ordering::SeqCst) == epoch {
            let now = self.clock.now();
            if !access.is_fresh(now) {
                debug!(object = %object, "presigned url expired in transit; not caching");
            } else if let Ok(mut cache) = self.cache.lock() {
                cache.insert(key, access.clone(), now);
            }
        } else {
            debug!(object = %object, "context changed during presign; not caching");
        }
        Ok(access)
    }

    pub async fn request_restore(
        &self,
        object: &RemoteObjectRef,
        retention_days: u32,
        tier: RestoreTier,
    ) -> Result<RestoreOutcome, PortalError> {
        let rejected = |reason: String| PortalError::RestoreRejected {
            object: object.to_string(),
            reason,
        };
        if object.source() != SourceKind::PrimaryStore {
            return Err(rejected(
                "restore is only supported for primary store objects".to_string(),
            ));
        }
        if retention_days == 0 {
            return Err(rejected("retention must be at least one day".to_string()));
        }

        let request = RestoreRequest {
            days: retention_days,
            tier,
        };
        let response = self
            .portal
            .restore(object, &request)
            .await
            .map_err(|err| rejected(err.to_string()))?;
        if let Some(error) = &response.error {
            return Err(rejected(error_text(error)));
        }
        info!(object = %object, days = retention_days, %tier, "restore requested");
        Ok(RestoreOutcome {
            object_id: object.object_id().clone(),
            days: retention_days,
            tier,
            requested_at: self.clock.now(),
        })
    }

    /// Finds the stored object for a derived index path next to `base`.
    pub async fn locate_sibling(
        &self,
        base: &RemoteObjectRef,
        path: &str,
    ) -> Result<RemoteObjectRef, PortalError> {
        self.portal
            .find_object(base.source(), base.container(), path)
            .await
            .map_err(|err| PortalError::PresignFailed {
                object: path.to_string(),
                reason: err.to_string(),
            })?
            .ok_or_else(|| PortalError::IndexObjectNotFound(path.to_string()))
    }

    fn lookup(&self, key: &PresignKey) -> Option<PresignedAccess> {
        let now = self.clock.now();
        self.cache.lock().ok()?.get(key, now)
    }
}

/// Validity window embedded in a SigV4 presigned URL.
fn url_expiry(url: &str) -> Option<Duration> {
    let parsed = Url::parse(url).ok()?;
    parsed
        .query_pairs()
        .find(|(name, _)| name.eq_ignore_ascii_case("X-Amz-Expires"))
        .and_then(|(_, value)| value.parse::<u64>().ok())
        .map(Duration::from_secs)
}

/// Signing time of a SigV4 presigned URL (`X-Amz-Date`, basic ISO 8601).
fn url_signed_at(url: &str) -> Option<DateTime<Utc>> {
    let parsed = Url::parse(url).ok()?;
    parsed
        .query_pairs()
        .find(|(name, _)| name.eq_ignore_ascii_case("X-Amz-Date"))
        .and_then(|(_, value)| NaiveDateTime::parse_from_str(&value, "%Y%m%dT%H%M%SZ").ok())
        .map(|signed| signed.and_utc())
}
