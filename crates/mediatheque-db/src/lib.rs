//! Mediatheque-DB: catalog schema, migrations, and query operations
//!
//! This crate provides database functionality for mediatheque using SQLite
//! with rusqlite and r2d2 connection pooling.
//!
//! # Modules
//!
//! - `migrations` - Database schema migrations
//! - `pool` - Connection pool management and busy-retry helper
//! - `models` - Rust models matching database schema
//! - `queries` - Database query operations
//!
//! Query functions take a `&Connection` and never open their own
//! transaction; composite operations (the analyzer's per-media path, task
//! insertion) own a single enclosing transaction via
//! `Connection::unchecked_transaction`, which commits explicitly and rolls
//! back on drop.

pub mod migrations;
pub mod models;
pub mod pool;
pub mod queries;
