//! Cached, best-effort geolocation of client addresses.
//!
//! [`GeoResolver::resolve`] never fails: provider errors, non-success
//! responses and timeouts are logged and folded into an empty
//! [`GeolocationRecord`]. Successful results are cached for `cache_ttl`,
//! empty ones for the shorter `failure_ttl`. Concurrent misses for the same
//! address share a single provider call.

pub mod cache;
pub mod provider;

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt, Shared};
use tokio::sync::Mutex;

use crate::config::GeoConfig;
use crate::metrics::Metrics;
use crate::types::GeolocationRecord;

pub use cache::GeoCache;
pub use provider::{GeoError, GeoProvider, IpApiProvider};

type InFlight = Shared<BoxFuture<'static, GeolocationRecord>>;

struct Inner {
    provider: Arc<dyn GeoProvider>,
    cache: GeoCache,
    inflight: Mutex<HashMap<IpAddr, InFlight>>,
    cache_ttl: Duration,
    failure_ttl: Duration,
    timeout: Duration,
    skip_private: bool,
    metrics: Metrics,
}

#[derive(Clone)]
pub struct GeoResolver {
    inner: Arc<Inner>,
}

impl GeoResolver {
    pub fn new(provider: Arc<dyn GeoProvider>, cfg: &GeoConfig, metrics: Metrics) -> Self {
        Self {
            inner: Arc::new(Inner {
                provider,
                cache: GeoCache::new(cfg.cache_namespace.clone(), cfg.cache_capacity),
                inflight: Mutex::new(HashMap::new()),
                cache_ttl: cfg.cache_ttl(),
                failure_ttl: cfg.failure_ttl(),
                timeout: cfg.timeout(),
                skip_private: cfg.skip_private,
                metrics,
            }),
        }
    }

    /// Builds a resolver backed by the ip-api.com client from configuration.
    pub fn from_config(cfg: &GeoConfig, metrics: Metrics) -> Result<Self, GeoError> {
        let provider = IpApiProvider::new(&cfg.api_base_url, cfg.timeout())?;
        Ok(Self::new(Arc::new(provider), cfg, metrics))
    }

    /// Returns the geolocation for `ip`, from cache when possible.
    pub async fn resolve(&self, ip: IpAddr) -> GeolocationRecord {
        if self.inner.skip_private && !is_routable(ip) {
            return GeolocationRecord::empty();
        }

        if let Some(hit) = self.inner.cache.get(ip).await {
            self.inner.metrics.inc_geo_cache_hits();
            return hit;
        }

        let lookup = {
            let mut inflight = self.inner.inflight.lock().await;
            // A lookup may have finished between the first check and taking the lock
            if let Some(hit) = self.inner.cache.get(ip).await {
                self.inner.metrics.inc_geo_cache_hits();
                return hit;
            }
            self.inner.metrics.inc_geo_cache_misses();
            inflight
                .entry(ip)
                .or_insert_with(|| {
                    // Runs to completion even if every waiter is dropped
                    let task = tokio::spawn(self.inner.clone().fetch_and_store(ip));
                    async move {
                        task.await.unwrap_or_else(|e| {
                            tracing::error!(%ip, "Geolocation lookup task failed: {}", e);
                            GeolocationRecord::empty()
                        })
                    }
                    .boxed()
                    .shared()
                })
                .clone()
        };

        lookup.await
    }

    #[cfg(test)]
    pub(crate) async fn cached(&self, ip: IpAddr) -> Option<GeolocationRecord> {
        self.inner.cache.get(ip).await
    }

    #[cfg(test)]
    pub(crate) async fn inflight_len(&self) -> usize {
        self.inner.inflight.lock().await.len()
    }
}

impl Inner {
    async fn fetch_and_store(self: Arc<Self>, ip: IpAddr) -> GeolocationRecord {
        self.metrics.inc_geo_lookups();
        let outcome = match tokio::time::timeout(self.timeout, self.provider.lookup(ip)).await {
            Ok(result) => result,
            Err(_) => Err(GeoError::Timeout(self.timeout)),
        };

        let (record, ttl) = match outcome {
            Ok(record) => {
                tracing::debug!(%ip, country = ?record.country, city = ?record.city, "Resolved geolocation");
                (record, self.cache_ttl)
            }
            Err(e) => {
                self.metrics.inc_geo_lookup_failures();
                tracing::error!(%ip, "Failed to get geolocation for {}: {}", ip, e);
                (GeolocationRecord::empty(), self.failure_ttl)
            }
        };

        // Cache before leaving the in-flight map so later callers hit the cache
        self.cache.insert(ip, record.clone(), ttl).await;
        self.inflight.lock().await.remove(&ip);
        record
    }
}

/// False for addresses no public lookup service can place.
pub fn is_routable(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            !(v4.is_private()
                || v4.is_loopback()
                || v4.is_link_local()
                || v4.is_unspecified()
                || v4.is_broadcast()
                || v4.is_multicast())
        }
        IpAddr::V6(v6) => {
            if let Some(v4) = v6.to_ipv4_mapped() {
                return is_routable(IpAddr::V4(v4));
            }
            let first = v6.segments()[0];
            let unique_local = (first & 0xfe00) == 0xfc00;
            let link_local = (first & 0xffc0) == 0xfe80;
            !(v6.is_loopback() || v6.is_unspecified() || v6.is_multicast() || unique_local || link_local)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_routable() {
        assert!(is_routable("41.0.0.1".parse().unwrap()));
        assert!(is_routable("2001:4860:4860::8888".parse().unwrap()));
        assert!(!is_routable("127.0.0.1".parse().unwrap()));
        assert!(!is_routable("10.1.2.3".parse().unwrap()));
        assert!(!is_routable("192.168.0.10".parse().unwrap()));
        assert!(!is_routable("169.254.1.1".parse().unwrap()));
        assert!(!is_routable("::1".parse().unwrap()));
        assert!(!is_routable("fd00::1".parse().unwrap()));
        assert!(!is_routable("fe80::1".parse().unwrap()));
        assert!(!is_routable("::ffff:192.168.1.1".parse().unwrap()));
    }
}
