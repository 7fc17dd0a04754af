//! Cache database: schema, row models and sync bookkeeping

pub mod init;
pub mod models;
pub mod schema_check;
pub mod sync_state;
pub mod table_schemas;

pub use init::{open_cache, open_existing_cache, DATA_TABLES};
pub use sync_state::{load_sync_state, record_sync, SyncState};
