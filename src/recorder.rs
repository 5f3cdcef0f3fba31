//! Writes request log entries, enriching them with geolocation either inline
//! or on a background worker.

use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::geo::GeoResolver;
use crate::metrics::Metrics;
use crate::store::RequestLogStore;
use crate::types::NewRequestLog;

#[derive(Clone)]
pub struct RequestRecorder {
    logs: RequestLogStore,
    geo: Option<GeoResolver>,
    metrics: Metrics,
    queue: Option<mpsc::Sender<NewRequestLog>>,
}

impl RequestRecorder {
    /// Enriches and writes each entry before `record` returns.
    pub fn inline(logs: RequestLogStore, geo: Option<GeoResolver>, metrics: Metrics) -> Self {
        Self { logs, geo, metrics, queue: None }
    }

    /// Hands entries to a worker task that enriches and writes them.
    ///
    /// When `shutdown` is cancelled the worker stops accepting new entries,
    /// drains what is already queued and exits.
    pub fn background(
        logs: RequestLogStore,
        geo: Option<GeoResolver>,
        metrics: Metrics,
        capacity: usize,
        shutdown: CancellationToken,
    ) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let worker = Self::inline(logs.clone(), geo.clone(), metrics.clone());
        let handle = tokio::spawn(run_worker(worker, rx, shutdown));
        (Self { logs, geo, metrics, queue: Some(tx) }, handle)
    }

    /// Persists `entry`. Failures are logged and counted, never returned.
    pub async fn record(&self, entry: NewRequestLog) {
        if let Some(queue) = &self.queue {
            match queue.try_send(entry) {
                Ok(()) => {}
                Err(TrySendError::Full(entry)) => {
                    tracing::warn!(ip = %entry.ip_address, "Enrichment queue full, writing entry without geolocation");
                    self.write(&entry).await;
                }
                Err(TrySendError::Closed(entry)) => {
                    self.write(&entry).await;
                }
            }
            return;
        }

        let entry = self.enrich(entry).await;
        self.write(&entry).await;
    }

    async fn enrich(&self, entry: NewRequestLog) -> NewRequestLog {
        match &self.geo {
            Some(geo) => {
                let record = geo.resolve(entry.ip_address).await;
                entry.with_geo(record)
            }
            None => entry,
        }
    }

    async fn write(&self, entry: &NewRequestLog) {
        match self.logs.append(entry).await {
            Ok(id) => {
                self.metrics.inc_requests_logged();
                tracing::debug!(id, ip = %entry.ip_address, path = %entry.path, method = %entry.method, "Request logged");
            }
            Err(e) => {
                self.metrics.inc_log_write_failures();
                tracing::error!(ip = %entry.ip_address, path = %entry.path, "Failed to write request log: {}", e);
            }
        }
    }
}

async fn run_worker(worker: RequestRecorder, mut rx: mpsc::Receiver<NewRequestLog>, shutdown: CancellationToken) {
    loop {
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            next = rx.recv() => match next {
                Some(entry) => {
                    let entry = worker.enrich(entry).await;
                    worker.write(&entry).await;
                }
                None => return,
            },
        }
    }

    rx.close();
    let mut drained = 0usize;
    while let Some(entry) = rx.recv().await {
        let entry = worker.enrich(entry).await;
        worker.write(&entry).await;
        drained += 1;
    }
    tracing::info!(drained, "Enrichment worker stopped");
}
