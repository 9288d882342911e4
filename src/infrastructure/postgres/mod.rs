//! PostgreSQL persistence module.
//!
//! Provides connection pooling for the PostgreSQL subscription store.

pub mod pool;

pub use pool::{PostgresPool, PostgresPoolError};
