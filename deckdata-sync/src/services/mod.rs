//! Synchronization and analysis services

pub mod ambiguity;
pub mod audio_consistency;
pub mod check;
pub mod duplicates;
pub mod exporter;
pub mod freshness;
pub mod importer;
pub mod key_coverage;

pub use ambiguity::{find_ambiguities, AmbiguityReport};
pub use audio_consistency::{check_audio, AudioPointer, AudioReport};
pub use check::{run_checks, CheckReport};
pub use duplicates::{find_duplicate_identities, DuplicateReport};
pub use exporter::{export, export_with_pool, ExportSummary};
pub use freshness::{
    check_before_export, check_before_import, ConflictResolution, FreshnessReport, Outcome,
    SyncConflict, SyncOptions,
};
pub use importer::{import, import_with_pool, ImportSummary};
pub use key_coverage::{ensure_key_coverage, CoverageSummary};
