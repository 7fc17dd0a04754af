//! deckdata sync library
//!
//! Keeps the CSV source of truth and the SQLite working cache in step, and
//! runs consistency analyses over the cache. Every operation takes its
//! dependencies explicitly through [`SyncContext`].

pub mod context;
pub mod localization;
pub mod services;

pub use context::SyncContext;
pub use localization::LocalizationTables;
