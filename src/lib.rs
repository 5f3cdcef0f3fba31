//! # ip-tracking
//!
//! Request logging and IP access control for Axum applications.
//!
//! Every inbound request passes through [`middleware::RequestInterceptor`],
//! which resolves the client IP, rejects addresses on the block list with a
//! 403, forwards everything else to the application and finally appends one
//! entry to the request log, optionally enriched with geolocation.
//!
//! ## Core Components
//!
//! - [`config`]: Layered configuration (embedded defaults, file, environment)
//! - [`db`]: SQLite schema and indexes
//! - [`error`]: Centralized error handling and HTTP error responses
//! - [`geo`]: Cached, best-effort geolocation lookups
//! - [`metrics`]: Pipeline counters
//! - [`middleware`]: Client IP resolution and the request interceptor
//! - [`recorder`]: Inline or background writing of log entries
//! - [`routes`]: Health, admin and test endpoints plus router assembly
//! - [`state`]: Shared application state
//! - [`store`]: Block list and request log stores
//! - [`types`]: Records and DTOs

pub mod config;
pub mod db;
pub mod error;
pub mod geo;
pub mod metrics;
pub mod middleware;
pub mod recorder;
pub mod routes;
pub mod state;
pub mod store;
pub mod types;

#[cfg(test)]
mod tests;
