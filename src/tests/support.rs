use std::net::{IpAddr, SocketAddr};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    extract::{connect_info::ConnectInfo, Path, State},
    routing::get,
    Json, Router,
};
use serde_json::Value;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};

use crate::config::{AppConfig, GeoMode};
use crate::geo::{GeoError, GeoProvider};
use crate::types::GeolocationRecord;

/// Single-connection in-memory database with the schema applied.
pub async fn setup_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    crate::db::init_db(&pool).await.unwrap();
    pool
}

pub fn test_config(mode: GeoMode) -> AppConfig {
    let mut config = AppConfig::default();
    config.geo.mode = mode;
    config.geo.timeout_ms = 500;
    config.tracking.skip_paths = vec!["/healthz".to_string()];
    config
}

pub fn nairobi() -> GeolocationRecord {
    GeolocationRecord {
        country: Some("Kenya".to_string()),
        city: Some("Nairobi".to_string()),
        latitude: Some(-1.28),
        longitude: Some(36.82),
    }
}

pub fn with_remote(mut req: axum::extract::Request, ip: [u8; 4]) -> axum::extract::Request {
    req.extensions_mut().insert(ConnectInfo(SocketAddr::from((ip, 40000))));
    req
}

/// Provider returning a fixed answer (or a failure) and counting calls.
pub struct FakeProvider {
    calls: AtomicUsize,
    answer: Option<GeolocationRecord>,
    delay: Duration,
}

impl FakeProvider {
    pub fn answering(record: GeolocationRecord) -> Arc<Self> {
        Arc::new(Self { calls: AtomicUsize::new(0), answer: Some(record), delay: Duration::ZERO })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self { calls: AtomicUsize::new(0), answer: None, delay: Duration::ZERO })
    }

    pub fn slow(record: GeolocationRecord, delay: Duration) -> Arc<Self> {
        Arc::new(Self { calls: AtomicUsize::new(0), answer: Some(record), delay })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GeoProvider for FakeProvider {
    async fn lookup(&self, _ip: IpAddr) -> Result<GeolocationRecord, GeoError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        match &self.answer {
            Some(record) => Ok(record.clone()),
            None => Err(GeoError::Rejected("upstream unavailable".to_string())),
        }
    }
}

/// Local stand-in for the ip-api.com JSON endpoint.
///
/// Returns the base URL (`http://127.0.0.1:<port>/json`) and the hit counter.
pub async fn spawn_fake_ip_api(body: Value) -> (String, Arc<AtomicUsize>) {
    let hits = Arc::new(AtomicUsize::new(0));
    let app = Router::new()
        .route(
            "/json/{ip}",
            get(|State((hits, body)): State<(Arc<AtomicUsize>, Value)>, Path(_ip): Path<String>| async move {
                hits.fetch_add(1, Ordering::SeqCst);
                Json(body)
            }),
        )
        .with_state((hits.clone(), body));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    (format!("http://{}/json", addr), hits)
}
