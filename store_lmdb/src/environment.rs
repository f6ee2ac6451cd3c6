//! LMDB environment setup.

use std::path::Path;
use std::sync::Arc;

use heed::types::Bytes;
use heed::{Database, Env, EnvOpenOptions, RoTxn, RwTxn};

use ballot_store::{CandidateInfo, CategoryInfo};
use ballot_types::{CandidateId, CategoryId};

use crate::meta::LmdbMetaStore;
use crate::LmdbError;

/// Names of every database this backend creates.
pub(crate) const DATABASE_NAMES: &[&str] = &[
    "categories",
    "category_names",
    "candidates",
    "category_candidates",
    "participation",
    "voter_index",
    "meta",
];

const NEXT_CATEGORY_ID_KEY: &[u8] = b"next_category_id";
const NEXT_CANDIDATE_ID_KEY: &[u8] = b"next_candidate_id";

/// Wraps the LMDB environment and all database handles.
pub struct LmdbEnvironment {
    env: Arc<Env>,
    pub(crate) categories_db: Database<Bytes, Bytes>,
    pub(crate) category_names_db: Database<Bytes, Bytes>,
    pub(crate) candidates_db: Database<Bytes, Bytes>,
    pub(crate) category_candidates_db: Database<Bytes, Bytes>,
    pub(crate) participation_db: Database<Bytes, Bytes>,
    pub(crate) voter_index_db: Database<Bytes, Bytes>,
    pub(crate) meta_db: Database<Bytes, Bytes>,
}

impl LmdbEnvironment {
    /// Open or create an LMDB environment at the given path.
    pub fn open(path: &Path, max_dbs: u32, map_size: usize) -> Result<Self, LmdbError> {
        std::fs::create_dir_all(path)?;

        // SAFETY: the environment is opened once per process per path and the
        // memory map is never modified outside of LMDB transactions.
        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(map_size)
                .max_dbs(max_dbs)
                .open(path)?
        };

        let mut wtxn = env.write_txn()?;
        let categories_db = env.create_database(&mut wtxn, Some("categories"))?;
        let category_names_db = env.create_database(&mut wtxn, Some("category_names"))?;
        let candidates_db = env.create_database(&mut wtxn, Some("candidates"))?;
        let category_candidates_db =
            env.create_database(&mut wtxn, Some("category_candidates"))?;
        let participation_db = env.create_database(&mut wtxn, Some("participation"))?;
        let voter_index_db = env.create_database(&mut wtxn, Some("voter_index"))?;
        let meta_db = env.create_database(&mut wtxn, Some("meta"))?;
        wtxn.commit()?;

        tracing::debug!(path = %path.display(), map_size, "LMDB environment opened");

        Ok(Self {
            env: Arc::new(env),
            categories_db,
            category_names_db,
            candidates_db,
            category_candidates_db,
            participation_db,
            voter_index_db,
            meta_db,
        })
    }

    /// The underlying heed environment.
    pub fn env(&self) -> &Arc<Env> {
        &self.env
    }

    /// A metadata store sharing this environment.
    pub fn meta_store(&self) -> LmdbMetaStore {
        LmdbMetaStore {
            env: Arc::clone(&self.env),
            meta_db: self.meta_db,
        }
    }

    /// Flush the memory map to disk.
    pub fn sync(&self) -> Result<(), LmdbError> {
        self.env.force_sync()?;
        Ok(())
    }

    // ── Record helpers shared by the store implementations ──────────────

    pub(crate) fn read_category(
        &self,
        txn: &RoTxn,
        id: CategoryId,
    ) -> Result<Option<CategoryInfo>, LmdbError> {
        match self.categories_db.get(txn, &id.to_be_bytes())? {
            Some(bytes) => Ok(Some(bincode::deserialize(bytes)?)),
            None => Ok(None),
        }
    }

    pub(crate) fn write_category(
        &self,
        txn: &mut RwTxn,
        info: &CategoryInfo,
    ) -> Result<(), LmdbError> {
        let bytes = bincode::serialize(info)?;
        self.categories_db
            .put(txn, &info.id.to_be_bytes(), &bytes)?;
        Ok(())
    }

    pub(crate) fn read_candidate(
        &self,
        txn: &RoTxn,
        id: CandidateId,
    ) -> Result<Option<CandidateInfo>, LmdbError> {
        match self.candidates_db.get(txn, &id.to_be_bytes())? {
            Some(bytes) => Ok(Some(bincode::deserialize(bytes)?)),
            None => Ok(None),
        }
    }

    pub(crate) fn write_candidate(
        &self,
        txn: &mut RwTxn,
        info: &CandidateInfo,
    ) -> Result<(), LmdbError> {
        let bytes = bincode::serialize(info)?;
        self.candidates_db
            .put(txn, &info.id.to_be_bytes(), &bytes)?;
        Ok(())
    }

    /// Candidate ids of a category, read through the `category_candidates` index.
    pub(crate) fn candidate_ids(
        &self,
        txn: &RoTxn,
        category: CategoryId,
    ) -> Result<Vec<CandidateId>, LmdbError> {
        let prefix = category.to_be_bytes();
        let mut ids = Vec::new();
        for entry in self.category_candidates_db.prefix_iter(txn, &prefix)? {
            let (key, _) = entry?;
            let id = key
                .get(crate::keys::ID_LEN..)
                .and_then(CandidateId::from_slice)
                .ok_or_else(|| {
                    LmdbError::Serialization("malformed category_candidates key".to_string())
                })?;
            ids.push(id);
        }
        Ok(ids)
    }

    pub(crate) fn next_category_id(&self, txn: &mut RwTxn) -> Result<CategoryId, LmdbError> {
        self.bump_counter(txn, NEXT_CATEGORY_ID_KEY).map(CategoryId::new)
    }

    pub(crate) fn next_candidate_id(&self, txn: &mut RwTxn) -> Result<CandidateId, LmdbError> {
        self.bump_counter(txn, NEXT_CANDIDATE_ID_KEY)
            .map(CandidateId::new)
    }

    /// Read-and-advance an id counter inside the caller's write transaction.
    /// Ids start at 1.
    fn bump_counter(&self, txn: &mut RwTxn, key: &[u8]) -> Result<u64, LmdbError> {
        let current = match self.meta_db.get(txn, key)? {
            Some(bytes) => {
                let arr: [u8; 8] = bytes.try_into().map_err(|_| {
                    LmdbError::Serialization("id counter has unexpected byte length".to_string())
                })?;
                u64::from_be_bytes(arr)
            }
            None => 1,
        };
        let next = current
            .checked_add(1)
            .ok_or_else(|| LmdbError::Serialization("id counter overflow".to_string()))?;
        self.meta_db.put(txn, key, &next.to_be_bytes())?;
        Ok(current)
    }
}
