//! Database layer for pagetrack
//!
//! This module provides the storage layer using SQLite with:
//! - Schema migrations
//! - Batch inserts for accepted events
//! - Simple read queries for inspection

pub mod repo;
pub mod schema;

pub use repo::{Database, StoredEvent};
