//! # deckdata common library
//!
//! Shared code for the flashcard dataset tools:
//! - Error taxonomy and result alias
//! - Configuration loading
//! - Locale codes
//! - Cache schema and row models
//! - CSV layout discovery, reading and writing

pub mod config;
pub mod db;
pub mod error;
pub mod locale;
pub mod tabular;

pub use error::{ConflictSide, Error, Result};
pub use locale::Locale;
