//! Integration and unit tests for the tracking pipeline.
//!
//! ## Test Modules
//!
//! - **support**: shared fixtures (in-memory database, fake geolocation providers)
//! - **config_tests**: configuration defaults and validation
//! - **db_tests**: schema creation
//! - **access_tests**: block list store
//! - **log_store_tests**: request log store
//! - **geo_tests**: cache-then-fetch resolution, failure handling, single flight
//! - **interceptor_tests**: the end-to-end middleware pipeline
//! - **api_tests**: admin, test and health endpoints
//! - **error_tests**: error mapping to HTTP responses

pub mod support;

pub mod error_tests;
