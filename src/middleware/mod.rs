//! Middleware components for HTTP request processing.
//!
//! - `ip`: client IP resolution shared by every component
//! - `tracking`: the request interceptor (block check and request logging)

pub mod ip;
pub mod tracking;

pub use tracking::{track_requests, RequestInterceptor};
