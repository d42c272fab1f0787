//! # pagetrack-core
//!
//! Core library for pagetrack - a page event tracking agent and its
//! ingestion endpoint.
//!
//! This library provides:
//! - The tracking agent: buffering, batched flushes, retry, exit beacon
//! - Ingestion: body decoding, event validation, tag normalization
//! - The HTTP ingestion endpoint
//! - SQLite storage for accepted events
//! - Configuration management
//! - Logging infrastructure
//!
//! ## Data flow
//!
//! ```text
//! track() → EventBuffer → FlushController ──POST /track──▶ IngestServer → Database
//!                               └──────── exit beacon ─────────┘
//! ```
//!
//! ## Example
//!
//! ```rust,no_run
//! use pagetrack_core::{Config, Database};
//!
//! // Load configuration
//! let config = Config::load().expect("failed to load config");
//!
//! // Open database
//! let db = Database::open(&config.database_path()).expect("failed to open database");
//! db.migrate().expect("failed to run migrations");
//! ```

// Re-export commonly used items at the crate root
pub use config::Config;
pub use db::Database;
pub use error::{Error, Result};
pub use tracker::EventTracker;
pub use types::*;

// Public modules
pub mod config;
pub mod db;
pub mod error;
pub mod ingest;
pub mod logging;
pub mod server;
pub mod tracker;
pub mod types;
