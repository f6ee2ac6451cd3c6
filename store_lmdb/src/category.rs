//! LMDB implementation of CategoryStore.

use ballot_store::{CategoryInfo, CategoryStore, NewCategory, StoreError};
use ballot_types::{CategoryId, Timestamp};

use crate::keys::{category_candidate_key, voter_index_key, voter_from_participation_key};
use crate::{LmdbEnvironment, LmdbError};

impl CategoryStore for LmdbEnvironment {
    fn create_category(
        &self,
        category: &NewCategory,
        now: Timestamp,
    ) -> Result<CategoryInfo, StoreError> {
        let mut wtxn = self.env().write_txn().map_err(LmdbError::from)?;
        let name_key = category.name.as_bytes();
        if self
            .category_names_db
            .get(&wtxn, name_key)
            .map_err(LmdbError::from)?
            .is_some()
        {
            return Err(StoreError::Duplicate(format!("category '{}'", category.name)));
        }

        let id = self.next_category_id(&mut wtxn)?;
        let info = CategoryInfo {
            id,
            name: category.name.clone(),
            description: category.description.clone(),
            is_open: false,
            created_at: now,
            created_by: category.created_by.clone(),
        };
        self.write_category(&mut wtxn, &info)?;
        self.category_names_db
            .put(&mut wtxn, name_key, &id.to_be_bytes())
            .map_err(LmdbError::from)?;
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(info)
    }

    fn get_category(&self, id: CategoryId) -> Result<Option<CategoryInfo>, StoreError> {
        let rtxn = self.env().read_txn().map_err(LmdbError::from)?;
        Ok(self.read_category(&rtxn, id)?)
    }

    fn set_open(&self, id: CategoryId, open: bool) -> Result<CategoryInfo, StoreError> {
        let mut wtxn = self.env().write_txn().map_err(LmdbError::from)?;
        let mut info = self
            .read_category(&wtxn, id)?
            .ok_or_else(|| LmdbError::NotFound(format!("category {id}")))?;
        if info.is_open != open {
            info.is_open = open;
            self.write_category(&mut wtxn, &info)?;
            wtxn.commit().map_err(LmdbError::from)?;
        }
        Ok(info)
    }

    fn delete_category(&self, id: CategoryId) -> Result<usize, StoreError> {
        let mut wtxn = self.env().write_txn().map_err(LmdbError::from)?;
        let info = self
            .read_category(&wtxn, id)?
            .ok_or_else(|| LmdbError::NotFound(format!("category {id}")))?;
        if info.is_open {
            return Err(StoreError::Conflict(format!(
                "category {id} is open; close voting before deleting"
            )));
        }

        let candidates = self.candidate_ids(&wtxn, id)?;
        for candidate in &candidates {
            self.candidates_db
                .delete(&mut wtxn, &candidate.to_be_bytes())
                .map_err(LmdbError::from)?;
            self.category_candidates_db
                .delete(&mut wtxn, &category_candidate_key(id, *candidate))
                .map_err(LmdbError::from)?;
        }

        let participation_keys: Vec<Vec<u8>> = {
            let prefix = id.to_be_bytes();
            let mut keys = Vec::new();
            for entry in self
                .participation_db
                .prefix_iter(&wtxn, &prefix)
                .map_err(LmdbError::from)?
            {
                let (key, _) = entry.map_err(LmdbError::from)?;
                keys.push(key.to_vec());
            }
            keys
        };
        for key in &participation_keys {
            let voter = voter_from_participation_key(key).ok_or_else(|| {
                StoreError::Corruption("malformed participation key".to_string())
            })?;
            self.voter_index_db
                .delete(&mut wtxn, &voter_index_key(&voter, id))
                .map_err(LmdbError::from)?;
            self.participation_db
                .delete(&mut wtxn, key)
                .map_err(LmdbError::from)?;
        }

        self.category_names_db
            .delete(&mut wtxn, info.name.as_bytes())
            .map_err(LmdbError::from)?;
        self.categories_db
            .delete(&mut wtxn, &id.to_be_bytes())
            .map_err(LmdbError::from)?;
        wtxn.commit().map_err(LmdbError::from)?;

        tracing::debug!(
            category = %id,
            candidates = candidates.len(),
            participation = participation_keys.len(),
            "category deleted"
        );
        Ok(candidates.len())
    }

    fn iter_categories(&self) -> Result<Vec<CategoryInfo>, StoreError> {
        let rtxn = self.env().read_txn().map_err(LmdbError::from)?;
        let mut result = Vec::new();
        for entry in self.categories_db.iter(&rtxn).map_err(LmdbError::from)? {
            let (_, val) = entry.map_err(LmdbError::from)?;
            let info: CategoryInfo = bincode::deserialize(val).map_err(LmdbError::from)?;
            result.push(info);
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_test_env() -> (tempfile::TempDir, LmdbEnvironment) {
        let dir = tempfile::tempdir().unwrap();
        let env = LmdbEnvironment::open(dir.path(), 16, 1 << 20).unwrap();
        (dir, env)
    }

    fn new_category(name: &str) -> NewCategory {
        NewCategory {
            name: name.to_string(),
            description: String::new(),
            created_by: Some("admin".to_string()),
        }
    }

    #[test]
    fn create_and_get_category() {
        let (_dir, env) = open_test_env();
        let created = env
            .create_category(&new_category("Best Talk"), Timestamp::new(5))
            .unwrap();
        assert_eq!(created.id, CategoryId::new(1));
        assert!(!created.is_open);

        let fetched = env.get_category(created.id).unwrap().unwrap();
        assert_eq!(fetched, created);
    }

    #[test]
    fn duplicate_name_rejected() {
        let (_dir, env) = open_test_env();
        env.create_category(&new_category("Best Talk"), Timestamp::new(1))
            .unwrap();
        let err = env
            .create_category(&new_category("Best Talk"), Timestamp::new(2))
            .unwrap_err();
        assert!(matches!(err, StoreError::Duplicate(_)));
    }

    #[test]
    fn set_open_toggles() {
        let (_dir, env) = open_test_env();
        let c = env
            .create_category(&new_category("Poll"), Timestamp::new(1))
            .unwrap();
        assert!(env.set_open(c.id, true).unwrap().is_open);
        assert!(env.get_category(c.id).unwrap().unwrap().is_open);
        assert!(!env.set_open(c.id, false).unwrap().is_open);
    }

    #[test]
    fn set_open_unknown_category_is_not_found() {
        let (_dir, env) = open_test_env();
        let err = env.set_open(CategoryId::new(99), true).unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[test]
    fn delete_open_category_conflicts() {
        let (_dir, env) = open_test_env();
        let c = env
            .create_category(&new_category("Poll"), Timestamp::new(1))
            .unwrap();
        env.set_open(c.id, true).unwrap();
        let err = env.delete_category(c.id).unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
        assert!(env.get_category(c.id).unwrap().is_some());
    }

    #[test]
    fn delete_frees_name() {
        let (_dir, env) = open_test_env();
        let c = env
            .create_category(&new_category("Poll"), Timestamp::new(1))
            .unwrap();
        assert_eq!(env.delete_category(c.id).unwrap(), 0);
        assert!(env.get_category(c.id).unwrap().is_none());
        let again = env
            .create_category(&new_category("Poll"), Timestamp::new(2))
            .unwrap();
        assert_ne!(again.id, c.id);
    }

    #[test]
    fn iter_in_creation_order() {
        let (_dir, env) = open_test_env();
        for (i, name) in ["a", "b", "c"].iter().enumerate() {
            env.create_category(&new_category(name), Timestamp::new(i as u64))
                .unwrap();
        }
        let names: Vec<String> = env
            .iter_categories()
            .unwrap()
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }
}
