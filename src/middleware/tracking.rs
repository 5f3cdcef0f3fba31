//! The request interceptor: client IP → block check → downstream → log entry.

use std::future::Future;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use axum::{
    extract::{connect_info::ConnectInfo, Request, State},
    http::header::USER_AGENT,
    middleware::Next,
    response::{IntoResponse, Response},
};

use super::ip::client_ip;
use crate::error::AppError;
use crate::metrics::Metrics;
use crate::recorder::RequestRecorder;
use crate::store::AccessControlStore;
use crate::types::NewRequestLog;

#[derive(Clone)]
pub struct RequestInterceptor {
    access: AccessControlStore,
    recorder: RequestRecorder,
    metrics: Metrics,
    skip_paths: Arc<[String]>,
}

impl RequestInterceptor {
    pub fn new(
        access: AccessControlStore,
        recorder: RequestRecorder,
        metrics: Metrics,
        skip_paths: Vec<String>,
    ) -> Self {
        Self { access, recorder, metrics, skip_paths: skip_paths.into() }
    }

    /// Runs one request through the pipeline.
    ///
    /// Requests from an active block-list entry get a 403 and never reach
    /// `downstream`. Everything else is forwarded, and whatever `downstream`
    /// returns is handed back untouched after exactly one log entry has been
    /// recorded. Logging problems never change the response.
    pub async fn handle<F, Fut>(&self, req: Request, downstream: F) -> Response
    where
        F: FnOnce(Request) -> Fut,
        Fut: Future<Output = Response>,
    {
        let remote = req.extensions().get::<ConnectInfo<SocketAddr>>().map(|ConnectInfo(addr)| addr.ip());
        let Some(ip) = client_ip(req.headers(), remote) else {
            tracing::warn!(path = %req.uri().path(), "No client IP available; serving request untracked");
            return downstream(req).await;
        };

        if self.is_blocked(ip).await {
            self.metrics.inc_requests_blocked();
            tracing::warn!(%ip, method = %req.method(), path = %req.uri().path(), "Rejected request from blocked IP");
            return AppError::Forbidden("Access denied".to_string()).into_response();
        }

        let path = req.uri().path().to_string();
        let method = req.method().as_str().to_string();
        let user_agent = req.headers().get(USER_AGENT).map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned());

        let response = downstream(req).await;

        if !self.skip_paths.iter().any(|p| p == &path) {
            let entry = NewRequestLog::new(ip, &path, &method, user_agent);
            self.recorder.record(entry).await;
        }

        response
    }

    /// Store errors fail open: the request is served and the failure logged.
    async fn is_blocked(&self, ip: IpAddr) -> bool {
        match self.access.is_blocked(ip).await {
            Ok(blocked) => blocked,
            Err(e) => {
                self.metrics.inc_access_check_failures();
                tracing::error!(%ip, "Block list check failed, allowing request: {}", e);
                false
            }
        }
    }
}

/// Axum middleware entry point, wired with `from_fn_with_state`.
pub async fn track_requests(
    State(interceptor): State<RequestInterceptor>,
    req: Request,
    next: Next,
) -> Response {
    interceptor.handle(req, |req| next.run(req)).await
}
