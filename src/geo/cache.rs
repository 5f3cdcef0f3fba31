use std::net::IpAddr;
use std::num::NonZeroUsize;
use std::time::{Duration, Instant};

use lru::LruCache;
use tokio::sync::Mutex;

use crate::types::GeolocationRecord;

#[derive(Debug, Clone)]
struct CachedGeo {
    record: GeolocationRecord,
    expires_at: Instant,
}

/// Bounded, expiring map from client IP to its resolved geolocation.
///
/// Keys are `namespace + ip` so the cache can share a key space with other
/// caches without collisions. Expired entries are dropped lazily on read.
pub struct GeoCache {
    namespace: String,
    entries: Mutex<LruCache<String, CachedGeo>>,
}

impl GeoCache {
    pub fn new(namespace: impl Into<String>, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self { namespace: namespace.into(), entries: Mutex::new(LruCache::new(capacity)) }
    }

    pub fn key(&self, ip: IpAddr) -> String {
        format!("{}{}", self.namespace, ip)
    }

    pub async fn get(&self, ip: IpAddr) -> Option<GeolocationRecord> {
        let key = self.key(ip);
        let mut entries = self.entries.lock().await;
        match entries.get(&key) {
            Some(cached) if cached.expires_at > Instant::now() => Some(cached.record.clone()),
            Some(_) => {
                entries.pop(&key);
                None
            }
            None => None,
        }
    }

    /// Stores `record` for `ttl`. A zero TTL stores nothing.
    pub async fn insert(&self, ip: IpAddr, record: GeolocationRecord, ttl: Duration) {
        if ttl.is_zero() {
            return;
        }
        let key = self.key(ip);
        let expires_at = Instant::now() + ttl;
        self.entries.lock().await.put(key, CachedGeo { record, expires_at });
    }

    #[cfg(test)]
    pub(crate) async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    #[cfg(test)]
    pub(crate) async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nairobi() -> GeolocationRecord {
        GeolocationRecord {
            country: Some("Kenya".to_string()),
            city: Some("Nairobi".to_string()),
            latitude: Some(-1.28),
            longitude: Some(36.82),
        }
    }

    #[test]
    fn test_key_uses_namespace() {
        let cache = GeoCache::new("ip_geo_", 4);
        assert_eq!(cache.key("41.0.0.1".parse().unwrap()), "ip_geo_41.0.0.1");
    }

    #[tokio::test]
    async fn test_entries_expire() {
        let cache = GeoCache::new("ip_geo_", 4);
        let ip: IpAddr = "41.0.0.1".parse().unwrap();
        cache.insert(ip, nairobi(), Duration::from_millis(50)).await;
        assert_eq!(cache.get(ip).await, Some(nairobi()));

        tokio::time::sleep(Duration::from_millis(80)).await;
        assert_eq!(cache.get(ip).await, None);
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_capacity_evicts_least_recently_used() {
        let cache = GeoCache::new("ip_geo_", 2);
        let a: IpAddr = "1.1.1.1".parse().unwrap();
        let b: IpAddr = "8.8.8.8".parse().unwrap();
        let c: IpAddr = "9.9.9.9".parse().unwrap();
        let ttl = Duration::from_secs(60);

        cache.insert(a, nairobi(), ttl).await;
        cache.insert(b, GeolocationRecord::empty(), ttl).await;
        // Touch a so b becomes the eviction candidate
        assert!(cache.get(a).await.is_some());
        cache.insert(c, GeolocationRecord::empty(), ttl).await;

        assert!(cache.get(a).await.is_some());
        assert!(cache.get(b).await.is_none());
        assert!(cache.get(c).await.is_some());
    }

    #[tokio::test]
    async fn test_zero_ttl_is_not_stored() {
        let cache = GeoCache::new("ip_geo_", 2);
        cache.insert("1.1.1.1".parse().unwrap(), nairobi(), Duration::ZERO).await;
        assert_eq!(cache.len().await, 0);
    }
}
