use axum::{
    extract::{connect_info::ConnectInfo, FromRequestParts},
    http::{request::Parts, HeaderMap},
};
use std::convert::Infallible;
use std::net::{IpAddr, SocketAddr};

pub const X_FORWARDED_FOR: &str = "x-forwarded-for";

/// First comma-separated token of an `X-Forwarded-For` value, trimmed.
pub fn first_forwarded_token(value: &str) -> Option<&str> {
    value.split(',').next().map(str::trim).filter(|token| !token.is_empty())
}

/// Client IP as announced by the `X-Forwarded-For` header, if it parses.
pub fn forwarded_ip(headers: &HeaderMap) -> Option<IpAddr> {
    let value = headers.get(X_FORWARDED_FOR)?.to_str().ok()?;
    let token = first_forwarded_token(value)?;
    match token.parse::<IpAddr>() {
        Ok(ip) => Some(ip),
        Err(_) => {
            tracing::debug!(token, "Ignoring unparseable X-Forwarded-For token");
            None
        }
    }
}

/// The one client IP used for blocking, logging and geolocation.
///
/// The first `X-Forwarded-For` token wins; otherwise the connection's remote
/// address. `None` when neither is available. IPv4-mapped IPv6 addresses
/// (as seen on a dual-stack listener) are reduced to plain IPv4.
pub fn client_ip(headers: &HeaderMap, remote: Option<IpAddr>) -> Option<IpAddr> {
    forwarded_ip(headers).or(remote).map(|ip| ip.to_canonical())
}

/// Optional extractor for remote socket address. Unlike `ConnectInfo`, this never rejects
/// if the connection info extension is absent (e.g. in tests or custom services).
#[derive(Clone, Copy, Debug, Default)]
pub struct MaybeRemoteAddr(pub Option<SocketAddr>);

impl<S> FromRequestParts<S> for MaybeRemoteAddr
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(MaybeRemoteAddr(parts.extensions.get::<ConnectInfo<SocketAddr>>().map(|ConnectInfo(addr)| *addr)))
    }
}
