//! LMDB storage backend for the ballot ledger.
//!
//! Implements all storage traits from `ballot-store` using the `heed` LMDB bindings.
//! Each logical store maps to one or more LMDB databases within a single environment.
//! LMDB allows a single writer at a time, so every vote commit runs as one
//! serialisable write transaction.

pub mod ballot;
pub mod candidate;
pub mod category;
pub mod environment;
pub mod error;
pub mod integrity;
mod keys;
pub mod meta;
pub mod migration;

pub use environment::LmdbEnvironment;
pub use error::LmdbError;
pub use integrity::{check_data_dir, check_integrity, IntegrityReport};
pub use meta::LmdbMetaStore;
pub use migration::{Migrator, CURRENT_SCHEMA_VERSION};
