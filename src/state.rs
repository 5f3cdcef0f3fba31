use std::sync::{Arc, Mutex};

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::{AppConfig, GeoMode};
use crate::geo::{GeoProvider, GeoResolver};
use crate::metrics::Metrics;
use crate::middleware::RequestInterceptor;
use crate::recorder::RequestRecorder;
use crate::store::{AccessControlStore, RequestLogStore};

/// The shared application state.
///
/// Every component of the tracking pipeline is constructed once here and
/// handed to handlers and middleware by cloning. Clones share the same pool,
/// cache and counters.
#[derive(Clone)]
pub struct AppState {
    /// The database connection pool.
    pub db: sqlx::SqlitePool,
    /// The application configuration.
    pub config: Arc<AppConfig>,
    /// Pipeline counters.
    pub metrics: Metrics,
    /// The block list.
    pub access: AccessControlStore,
    /// The append-only request log.
    pub logs: RequestLogStore,
    /// Geolocation resolver; `None` when enrichment is disabled.
    pub geo: Option<GeoResolver>,
    /// The middleware pipeline, ready for `from_fn_with_state`.
    pub interceptor: RequestInterceptor,
    shutdown: CancellationToken,
    worker: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl AppState {
    /// Creates the state with the ip-api.com provider configured in `config.geo`.
    ///
    /// Must be called inside a tokio runtime when `geo.mode = "background"`,
    /// since the enrichment worker is spawned here.
    pub fn new(db: sqlx::SqlitePool, config: AppConfig) -> anyhow::Result<Self> {
        let metrics = Metrics::new();
        let geo = if config.geo.is_active() {
            Some(GeoResolver::from_config(&config.geo, metrics.clone())?)
        } else {
            None
        };
        Ok(Self::assemble(db, config, geo, metrics))
    }

    /// Creates the state with a caller-supplied geolocation provider.
    pub fn with_geo_provider(db: sqlx::SqlitePool, config: AppConfig, provider: Arc<dyn GeoProvider>) -> Self {
        let metrics = Metrics::new();
        let geo = config.geo.is_active().then(|| GeoResolver::new(provider, &config.geo, metrics.clone()));
        Self::assemble(db, config, geo, metrics)
    }

    fn assemble(db: sqlx::SqlitePool, config: AppConfig, geo: Option<GeoResolver>, metrics: Metrics) -> Self {
        let access = AccessControlStore::new(db.clone());
        let logs = RequestLogStore::new(db.clone());
        let shutdown = CancellationToken::new();

        let (recorder, worker) = if geo.is_some() && config.geo.mode == GeoMode::Background {
            let (recorder, handle) = RequestRecorder::background(
                logs.clone(),
                geo.clone(),
                metrics.clone(),
                config.tracking.queue_capacity,
                shutdown.clone(),
            );
            (recorder, Some(handle))
        } else {
            (RequestRecorder::inline(logs.clone(), geo.clone(), metrics.clone()), None)
        };

        let interceptor = RequestInterceptor::new(
            access.clone(),
            recorder,
            metrics.clone(),
            config.tracking.skip_paths.clone(),
        );

        Self {
            db,
            config: Arc::new(config),
            metrics,
            access,
            logs,
            geo,
            interceptor,
            shutdown,
            worker: Arc::new(Mutex::new(worker)),
        }
    }

    /// Stops the background enrichment worker (if any) after it has drained
    /// its queue.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        let handle = match self.worker.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                tracing::error!("Enrichment worker terminated abnormally: {}", e);
            }
        }
    }
}
