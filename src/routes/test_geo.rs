//! Manual verification endpoint: echoes how the server sees the caller.

use axum::{
    extract::{OriginalUri, State},
    http::{HeaderMap, HeaderValue, Method},
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::json;

use crate::{
    error::{AppError, AppResult},
    middleware::ip::{client_ip, MaybeRemoteAddr, X_FORWARDED_FOR},
    state::AppState,
};

fn header_str(headers: &HeaderMap, name: &str) -> Option<String> {
    headers.get(name).and_then(|v| v.to_str().ok()).map(str::to_string)
}

async fn describe(
    state: &AppState,
    method: &Method,
    path: &str,
    headers: &HeaderMap,
    remote: MaybeRemoteAddr,
) -> serde_json::Value {
    let remote_ip = remote.0.map(|addr| addr.ip());
    let ip = client_ip(headers, remote_ip);

    let geolocation = match (&state.geo, ip) {
        (Some(geo), Some(ip)) => Some(geo.resolve(ip).await),
        _ => None,
    };

    json!({
        "ip_address": ip.map(|ip| ip.to_string()),
        "method": method.as_str(),
        "path": path,
        "user_agent": header_str(headers, "user-agent"),
        "geo_headers": {
            "x-forwarded-for": header_str(headers, X_FORWARDED_FOR),
            "remote_addr": remote_ip.map(|ip| ip.to_string()),
        },
        "geolocation": geolocation,
    })
}

pub async fn test_geo_get(
    State(state): State<AppState>,
    method: Method,
    OriginalUri(uri): OriginalUri,
    remote: MaybeRemoteAddr,
    headers: HeaderMap,
) -> impl IntoResponse {
    Json(describe(&state, &method, uri.path(), &headers, remote).await)
}

#[derive(Debug, Deserialize)]
pub struct TestGeoRequest {
    #[serde(default)]
    pub ip: String,
}

/// Same as GET, with `ip` from the body injected as `X-Forwarded-For`.
pub async fn test_geo_post(
    State(state): State<AppState>,
    method: Method,
    OriginalUri(uri): OriginalUri,
    remote: MaybeRemoteAddr,
    mut headers: HeaderMap,
    Json(req): Json<TestGeoRequest>,
) -> AppResult<impl IntoResponse> {
    let value = HeaderValue::from_str(&req.ip)
        .map_err(|_| AppError::BadRequest(format!("ip is not a valid header value: {:?}", req.ip)))?;
    headers.insert(X_FORWARDED_FOR, value);
    Ok(Json(describe(&state, &method, uri.path(), &headers, remote).await))
}
