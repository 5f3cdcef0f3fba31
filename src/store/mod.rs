//! SQLite-backed stores for the block list and the request log.
//!
//! Both stores are cheap to clone (they share the pool) and are safe to use
//! from concurrent request handlers.

pub mod access;
pub mod logs;

pub use access::AccessControlStore;
pub use logs::RequestLogStore;
