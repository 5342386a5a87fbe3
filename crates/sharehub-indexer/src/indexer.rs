//! The generic indexer.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, RwLock};

use tracing::debug;

use sharehub_core::error::AppError;
use sharehub_core::result::AppResult;
use sharehub_core::traits::{Indexable, MetadataStorage};
use sharehub_core::types::escape::{escape_segment, unescape_segment};

use crate::dedup::dedup_preserving_order;
use crate::error::IndexError;
use crate::glob::glob_match;
use crate::query::{self, Expr};
use crate::spec::{IndexKind, IndexSpec};

/// One persisted index entry, reported back from [`Indexer::add`].
///
/// Callers that index through autoincrement fields read the allocated
/// integer out of the matching result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexResult {
    /// Index field name.
    pub field: String,
    /// Persisted value (post-normalization; the allocated integer for
    /// autoincrement fields).
    pub value: String,
}

/// Maximum exclusive-create attempts for one autoincrement allocation.
/// Each lost race moves the candidate forward, so this bounds only
/// pathological contention.
const AUTOINCREMENT_ATTEMPTS: usize = 50;

/// Secondary index over records of type `R`, persisted in a container
/// directory of a [`MetadataStorage`] backend.
///
/// Entries live at `<container>/<field>/<escaped value>`: a symlink to
/// the primary key for unique and autoincrement indexes, a directory of
/// primary-key-named symlinks for non-unique indexes.
///
/// `update` is best-effort, not transactional: the new entry is written
/// before the old one is retracted, so a crash in between leaves both
/// resolvable. Readers tolerate this (and any dangling entry) by treating
/// a missing record blob as not found.
pub struct Indexer<R: Indexable> {
    storage: Arc<dyn MetadataStorage>,
    container: String,
    fields: RwLock<Vec<IndexSpec<R>>>,
}

impl<R: Indexable> std::fmt::Debug for Indexer<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Indexer")
            .field("container", &self.container)
            .field("type", &R::type_name())
            .finish_non_exhaustive()
    }
}

impl<R: Indexable> Indexer<R> {
    /// Create an indexer persisting under the given container directory.
    pub fn new(storage: Arc<dyn MetadataStorage>, container: impl Into<String>) -> Self {
        Self {
            storage,
            container: container.into(),
            fields: RwLock::new(Vec::new()),
        }
    }

    /// Register an index. Idempotent per field name; re-registration with
    /// a different kind is rejected.
    pub async fn add_index(&self, spec: IndexSpec<R>) -> AppResult<()> {
        {
            let fields = self.fields.read().expect("index registry poisoned");
            if let Some(existing) = fields.iter().find(|s| s.name == spec.name) {
                if existing.kind != spec.kind {
                    return Err(AppError::invalid_argument(format!(
                        "index '{}' already registered with kind {:?}",
                        spec.name, existing.kind
                    )));
                }
                return Ok(());
            }
        }

        self.storage
            .make_dir_if_not_exist(&self.field_dir(&spec.name))
            .await?;

        let mut fields = self.fields.write().expect("index registry poisoned");
        if !fields.iter().any(|s| s.name == spec.name) {
            fields.push(spec);
        }
        Ok(())
    }

    fn field_dir(&self, field: &str) -> String {
        format!("{}/{}", self.container, field)
    }

    fn entry_path(&self, field: &str, value: &str) -> String {
        format!("{}/{}/{}", self.container, field, escape_segment(value))
    }

    /// Snapshot of registered specs, autoincrement fields last so a
    /// unique-index conflict never burns an allocated integer.
    fn specs(&self) -> Vec<IndexSpec<R>> {
        let mut specs = self
            .fields
            .read()
            .expect("index registry poisoned")
            .clone();
        specs.sort_by_key(|s| matches!(s.kind, IndexKind::Autoincrement { .. }));
        specs
    }

    fn spec(&self, field: &str) -> Result<IndexSpec<R>, IndexError> {
        self.fields
            .read()
            .expect("index registry poisoned")
            .iter()
            .find(|s| s.name == field)
            .cloned()
            .ok_or_else(|| IndexError::UnknownField(field.to_string()))
    }

    /// Persist index entries for every registered field of the record.
    ///
    /// Unique conflicts surface as [`IndexError::Conflict`] carrying the
    /// offending field and value; entries written before the conflict
    /// remain (idempotent re-adds tolerate them).
    pub async fn add(&self, record: &R) -> Result<Vec<IndexResult>, IndexError> {
        let pk = record.primary_key();
        let mut results = Vec::new();

        for spec in self.specs() {
            if let Some(result) = self.add_field(&spec, record, &pk).await? {
                results.push(result);
            }
        }
        Ok(results)
    }

    async fn add_field(
        &self,
        spec: &IndexSpec<R>,
        record: &R,
        pk: &str,
    ) -> Result<Option<IndexResult>, IndexError> {
        let value = spec.value(record);

        match spec.kind {
            IndexKind::Unique => match value {
                Some(v) => self.claim_entry(&spec.name, &v, pk).await.map(Some),
                None => Ok(None),
            },
            IndexKind::NonUnique => {
                let Some(v) = value else { return Ok(None) };
                let value_dir = self.entry_path(&spec.name, &v);
                self.storage.make_dir_if_not_exist(&value_dir).await?;
                let link = format!("{}/{}", value_dir, escape_segment(pk));
                match self.storage.create_symlink(pk, &link).await {
                    Ok(()) => {}
                    // Same (value, pk) pair already present: idempotent.
                    Err(e) if e.is_already_exists() => {}
                    Err(e) => return Err(e.into()),
                }
                Ok(Some(IndexResult {
                    field: spec.name.clone(),
                    value: v,
                }))
            }
            IndexKind::Autoincrement { lower_bound } => {
                // A record that already carries a value re-claims it; a
                // fresh record allocates the next integer.
                match value.filter(|v| !v.is_empty()) {
                    Some(v) => self.claim_entry(&spec.name, &v, pk).await.map(Some),
                    None => self
                        .allocate_next(&spec.name, lower_bound, pk)
                        .await
                        .map(Some),
                }
            }
        }
    }

    /// Claim `<field>/<value>` for `pk`. Succeeds if the entry is absent
    /// or already points at `pk`; conflicts otherwise.
    async fn claim_entry(
        &self,
        field: &str,
        value: &str,
        pk: &str,
    ) -> Result<IndexResult, IndexError> {
        let path = self.entry_path(field, value);
        match self.storage.create_symlink(pk, &path).await {
            Ok(()) => Ok(IndexResult {
                field: field.to_string(),
                value: value.to_string(),
            }),
            Err(e) if e.is_already_exists() => {
                let existing = self.storage.resolve_symlink(&path).await?;
                if existing == pk {
                    Ok(IndexResult {
                        field: field.to_string(),
                        value: value.to_string(),
                    })
                } else {
                    Err(IndexError::Conflict {
                        field: field.to_string(),
                        value: value.to_string(),
                        existing,
                    })
                }
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Allocate the next free integer ≥ `lower_bound` for `pk`. The first
    /// writer to create the candidate's symlink wins; losers move on to
    /// the next candidate.
    async fn allocate_next(
        &self,
        field: &str,
        lower_bound: i64,
        pk: &str,
    ) -> Result<IndexResult, IndexError> {
        let dir = self.field_dir(field);

        for _ in 0..AUTOINCREMENT_ATTEMPTS {
            let entries = self.storage.read_dir(&dir).await?;
            let max_claimed = entries
                .iter()
                .filter_map(|name| unescape_segment(name).parse::<i64>().ok())
                .max();
            let candidate = match max_claimed {
                Some(max) => (max + 1).max(lower_bound),
                None => lower_bound,
            };

            let path = self.entry_path(field, &candidate.to_string());
            match self.storage.create_symlink(pk, &path).await {
                Ok(()) => {
                    debug!(field, value = candidate, pk, "Allocated autoincrement entry");
                    return Ok(IndexResult {
                        field: field.to_string(),
                        value: candidate.to_string(),
                    });
                }
                Err(e) if e.is_already_exists() => continue,
                Err(e) => return Err(e.into()),
            }
        }

        Err(IndexError::Storage(AppError::internal(format!(
            "autoincrement allocation on '{field}' lost {AUTOINCREMENT_ATTEMPTS} races"
        ))))
    }

    /// Remove all index entries for the record across every registered
    /// field. Safe to call when some entries are already missing.
    pub async fn remove(&self, record: &R) -> AppResult<()> {
        let pk = record.primary_key();
        for spec in self.specs() {
            self.remove_field(&spec, record, &pk).await?;
        }
        Ok(())
    }

    async fn remove_field(&self, spec: &IndexSpec<R>, record: &R, pk: &str) -> AppResult<()> {
        let Some(value) = spec.value(record) else {
            return Ok(());
        };

        match spec.kind {
            IndexKind::Unique | IndexKind::Autoincrement { .. } => {
                let path = self.entry_path(&spec.name, &value);
                // Only retract entries that actually point at this record;
                // the value may have been re-claimed by another key.
                match self.storage.resolve_symlink(&path).await {
                    Ok(existing) if existing == pk => self.delete_tolerant(&path).await,
                    Ok(_) => Ok(()),
                    Err(e) if e.is_not_found() => Ok(()),
                    Err(e) => Err(e),
                }
            }
            IndexKind::NonUnique => {
                let link = format!(
                    "{}/{}",
                    self.entry_path(&spec.name, &value),
                    escape_segment(pk)
                );
                self.delete_tolerant(&link).await
            }
        }
    }

    async fn delete_tolerant(&self, path: &str) -> AppResult<()> {
        match self.storage.delete(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.is_not_found() => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Drop whatever currently occupies `<field>/<value>`, regardless of
    /// which primary key it maps to. This is the self-heal hook for the
    /// managers' write protocol.
    pub async fn remove_entry(&self, field: &str, value: &str) -> AppResult<()> {
        let spec = self.spec(field).map_err(AppError::from)?;
        let value = if spec.case_insensitive {
            value.to_lowercase()
        } else {
            value.to_string()
        };

        match spec.kind {
            IndexKind::Unique | IndexKind::Autoincrement { .. } => {
                self.delete_tolerant(&self.entry_path(field, &value)).await
            }
            IndexKind::NonUnique => {
                let value_dir = self.entry_path(field, &value);
                for entry in self.storage.read_dir(&value_dir).await? {
                    self.delete_tolerant(&format!("{value_dir}/{entry}")).await?;
                }
                Ok(())
            }
        }
    }

    /// Re-index a record whose field values may have changed.
    ///
    /// For each changed field the new entry is written first, then the old
    /// one retracted; a unique conflict on the new value aborts with the
    /// old mapping intact. Best-effort across fields, not transactional.
    pub async fn update(&self, old: &R, new: &R) -> Result<(), IndexError> {
        let old_pk = old.primary_key();
        let new_pk = new.primary_key();

        for spec in self.specs() {
            let old_value = spec.value(old);
            let new_value = spec.value(new);
            if old_value == new_value && old_pk == new_pk {
                continue;
            }
            self.add_field(&spec, new, &new_pk).await?;
            if old_value.is_some() {
                self.remove_field(&spec, old, &old_pk).await?;
            }
        }
        Ok(())
    }

    /// Resolve all primary keys mapped to the given value.
    pub async fn find_by(&self, field: &str, value: &str) -> AppResult<Vec<String>> {
        let spec = self.spec(field).map_err(AppError::from)?;
        let value = if spec.case_insensitive {
            value.to_lowercase()
        } else {
            value.to_string()
        };

        match spec.kind {
            IndexKind::Unique | IndexKind::Autoincrement { .. } => {
                match self
                    .storage
                    .resolve_symlink(&self.entry_path(field, &value))
                    .await
                {
                    Ok(pk) => Ok(vec![pk]),
                    Err(e) if e.is_not_found() => Ok(Vec::new()),
                    Err(e) => Err(e),
                }
            }
            IndexKind::NonUnique => {
                let entries = self
                    .storage
                    .read_dir(&self.entry_path(field, &value))
                    .await?;
                Ok(entries.iter().map(|e| unescape_segment(e)).collect())
            }
        }
    }

    /// Resolve all primary keys whose indexed value matches the glob
    /// pattern (`*`, `?`).
    pub async fn find_by_partial(&self, field: &str, pattern: &str) -> AppResult<Vec<String>> {
        let spec = self.spec(field).map_err(AppError::from)?;
        let pattern = if spec.case_insensitive {
            pattern.to_lowercase()
        } else {
            pattern.to_string()
        };
        self.scan_matching(&spec, |value| glob_match(&pattern, value))
            .await
    }

    async fn scan_matching(
        &self,
        spec: &IndexSpec<R>,
        matches: impl Fn(&str) -> bool,
    ) -> AppResult<Vec<String>> {
        let dir = self.field_dir(&spec.name);
        let mut pks = Vec::new();

        for entry in self.storage.read_dir(&dir).await? {
            let value = unescape_segment(&entry);
            if !matches(&value) {
                continue;
            }
            match spec.kind {
                IndexKind::Unique | IndexKind::Autoincrement { .. } => {
                    match self.storage.resolve_symlink(&format!("{dir}/{entry}")).await {
                        Ok(pk) => pks.push(pk),
                        // Entry raced with a concurrent delete.
                        Err(e) if e.is_not_found() => {}
                        Err(e) => return Err(e),
                    }
                }
                IndexKind::NonUnique => {
                    let members = self.storage.read_dir(&format!("{dir}/{entry}")).await?;
                    pks.extend(members.iter().map(|m| unescape_segment(m)));
                }
            }
        }
        Ok(dedup_preserving_order(pks))
    }

    /// Evaluate a boolean query expression over the registered indexes.
    ///
    /// OR combines result sets by union, AND by intersection; leaves
    /// resolve through `find_by` (equality) and a prefix scan
    /// (`startswith`). The result is deduplicated.
    pub async fn query(&self, expression: &str) -> AppResult<Vec<String>> {
        let expr = query::parse(expression)?;
        let result = self.eval(&expr).await?;
        Ok(dedup_preserving_order(result))
    }

    fn eval<'a>(
        &'a self,
        expr: &'a Expr,
    ) -> Pin<Box<dyn Future<Output = AppResult<Vec<String>>> + Send + 'a>> {
        Box::pin(async move {
            match expr {
                Expr::Eq { field, value } => self.find_by(field, value).await,
                Expr::StartsWith { field, prefix } => {
                    let spec = self.spec(field).map_err(AppError::from)?;
                    let prefix = if spec.case_insensitive {
                        prefix.to_lowercase()
                    } else {
                        prefix.clone()
                    };
                    self.scan_matching(&spec, |value| value.starts_with(&prefix))
                        .await
                }
                Expr::Or(left, right) => {
                    let mut result = self.eval(left).await?;
                    result.extend(self.eval(right).await?);
                    Ok(dedup_preserving_order(result))
                }
                Expr::And(left, right) => {
                    let left_set = self.eval(left).await?;
                    let right_set: std::collections::HashSet<String> =
                        self.eval(right).await?.into_iter().collect();
                    Ok(left_set
                        .into_iter()
                        .filter(|pk| right_set.contains(pk))
                        .collect())
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sharehub_storage::LocalMetadataStorage;

    #[derive(Debug, Clone)]
    struct Doc {
        id: String,
        owner: String,
        tag: Option<String>,
        number: String,
    }

    impl Indexable for Doc {
        fn type_name() -> &'static str {
            "doc"
        }

        fn primary_key(&self) -> String {
            self.id.clone()
        }
    }

    fn doc(id: &str, owner: &str, tag: Option<&str>) -> Doc {
        Doc {
            id: id.to_string(),
            owner: owner.to_string(),
            tag: tag.map(String::from),
            number: String::new(),
        }
    }

    async fn indexer() -> (tempfile::TempDir, Arc<dyn MetadataStorage>, Indexer<Doc>) {
        let dir = tempfile::tempdir().unwrap();
        let storage: Arc<dyn MetadataStorage> =
            Arc::new(LocalMetadataStorage::new(dir.path().to_str().unwrap()));
        storage.init().await.unwrap();

        let indexer = Indexer::new(Arc::clone(&storage), "docs-index");
        indexer
            .add_index(IndexSpec::unique("tag", |d: &Doc| d.tag.clone()))
            .await
            .unwrap();
        indexer
            .add_index(IndexSpec::non_unique("owner", |d: &Doc| {
                Some(d.owner.clone())
            }))
            .await
            .unwrap();
        indexer
            .add_index(IndexSpec::autoincrement("number", 100, |d: &Doc| {
                Some(d.number.clone())
            }))
            .await
            .unwrap();
        (dir, storage, indexer)
    }

    #[tokio::test]
    async fn test_add_and_find_by() {
        let (_dir, _storage, indexer) = indexer().await;

        indexer.add(&doc("d1", "alice", Some("t1"))).await.unwrap();
        indexer.add(&doc("d2", "alice", Some("t2"))).await.unwrap();
        indexer.add(&doc("d3", "bob", None)).await.unwrap();

        assert_eq!(indexer.find_by("tag", "t1").await.unwrap(), vec!["d1"]);
        assert_eq!(
            indexer.find_by("owner", "alice").await.unwrap(),
            vec!["d1", "d2"]
        );
        assert_eq!(indexer.find_by("owner", "bob").await.unwrap(), vec!["d3"]);
        assert!(indexer.find_by("owner", "carol").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unique_conflict() {
        let (_dir, _storage, indexer) = indexer().await;

        indexer.add(&doc("d1", "alice", Some("t1"))).await.unwrap();

        // Re-adding the same record is idempotent.
        indexer.add(&doc("d1", "alice", Some("t1"))).await.unwrap();

        // A different record claiming the same unique value conflicts.
        let err = indexer
            .add(&doc("d2", "bob", Some("t1")))
            .await
            .unwrap_err();
        match err {
            IndexError::Conflict {
                field,
                value,
                existing,
            } => {
                assert_eq!(field, "tag");
                assert_eq!(value, "t1");
                assert_eq!(existing, "d1");
            }
            other => panic!("expected conflict, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_autoincrement_allocates_monotonically() {
        let (_dir, _storage, indexer) = indexer().await;

        let r1 = indexer.add(&doc("d1", "alice", None)).await.unwrap();
        let r2 = indexer.add(&doc("d2", "alice", None)).await.unwrap();

        let n1 = r1.iter().find(|r| r.field == "number").unwrap();
        let n2 = r2.iter().find(|r| r.field == "number").unwrap();
        assert_eq!(n1.value, "100");
        assert_eq!(n2.value, "101");

        assert_eq!(indexer.find_by("number", "100").await.unwrap(), vec!["d1"]);
    }

    #[tokio::test]
    async fn test_autoincrement_never_reuses_after_delete() {
        let (_dir, _storage, indexer) = indexer().await;

        let r1 = indexer.add(&doc("d1", "alice", None)).await.unwrap();
        let allocated = r1.iter().find(|r| r.field == "number").unwrap().value.clone();
        assert_eq!(allocated, "100");

        let mut d1 = doc("d1", "alice", None);
        d1.number = allocated;
        indexer.remove(&d1).await.unwrap();

        // Allocation scans for the maximum, so the freed hole stays free.
        let r2 = indexer.add(&doc("d2", "alice", None)).await.unwrap();
        let n2 = r2.iter().find(|r| r.field == "number").unwrap();
        assert_eq!(n2.value, "100");
        // ...but once anything later is claimed, earlier values are gone.
        let r3 = indexer.add(&doc("d3", "alice", None)).await.unwrap();
        assert_eq!(r3.iter().find(|r| r.field == "number").unwrap().value, "101");
    }

    #[tokio::test]
    async fn test_autoincrement_concurrent_allocation() {
        let (_dir, storage, _unused) = indexer().await;

        let indexer = Arc::new(Indexer::<Doc>::new(Arc::clone(&storage), "race-index"));
        indexer
            .add_index(IndexSpec::autoincrement("number", 1, |d: &Doc| {
                Some(d.number.clone())
            }))
            .await
            .unwrap();

        let mut handles = Vec::new();
        for i in 0..8 {
            let indexer = Arc::clone(&indexer);
            handles.push(tokio::spawn(async move {
                let record = doc(&format!("d{i}"), "alice", None);
                indexer.add(&record).await.unwrap()
            }));
        }

        let mut allocated = Vec::new();
        for handle in handles {
            let results = handle.await.unwrap();
            allocated.push(results[0].value.parse::<i64>().unwrap());
        }
        allocated.sort();
        assert_eq!(allocated, (1..=8).collect::<Vec<_>>(), "no duplicates, no gaps");
    }

    #[tokio::test]
    async fn test_remove_is_idempotent() {
        let (_dir, _storage, indexer) = indexer().await;

        let d = doc("d1", "alice", Some("t1"));
        indexer.add(&d).await.unwrap();
        indexer.remove(&d).await.unwrap();
        assert!(indexer.find_by("tag", "t1").await.unwrap().is_empty());
        assert!(indexer.find_by("owner", "alice").await.unwrap().is_empty());

        // Removing again hits only absent entries.
        indexer.remove(&d).await.unwrap();
    }

    #[tokio::test]
    async fn test_remove_leaves_other_keys_entry() {
        let (_dir, _storage, indexer) = indexer().await;

        indexer.add(&doc("d1", "alice", Some("t1"))).await.unwrap();

        // d2 never owned tag t1; removing it must not retract d1's entry.
        let stale = doc("d2", "bob", Some("t1"));
        indexer.remove(&stale).await.unwrap();
        assert_eq!(indexer.find_by("tag", "t1").await.unwrap(), vec!["d1"]);
    }

    #[tokio::test]
    async fn test_update_moves_entries() {
        let (_dir, _storage, indexer) = indexer().await;

        let old = doc("d1", "alice", Some("t1"));
        indexer.add(&old).await.unwrap();

        let new = doc("d1", "bob", Some("t2"));
        indexer.update(&old, &new).await.unwrap();

        assert!(indexer.find_by("tag", "t1").await.unwrap().is_empty());
        assert_eq!(indexer.find_by("tag", "t2").await.unwrap(), vec!["d1"]);
        assert!(indexer.find_by("owner", "alice").await.unwrap().is_empty());
        assert_eq!(indexer.find_by("owner", "bob").await.unwrap(), vec!["d1"]);
    }

    #[tokio::test]
    async fn test_update_conflict_keeps_old_mapping() {
        let (_dir, _storage, indexer) = indexer().await;

        let d1 = doc("d1", "alice", Some("t1"));
        let d2 = doc("d2", "bob", Some("t2"));
        indexer.add(&d1).await.unwrap();
        indexer.add(&d2).await.unwrap();

        // d2 tries to take d1's unique tag.
        let moved = doc("d2", "bob", Some("t1"));
        let err = indexer.update(&d2, &moved).await.unwrap_err();
        assert!(matches!(err, IndexError::Conflict { .. }));

        assert_eq!(indexer.find_by("tag", "t1").await.unwrap(), vec!["d1"]);
        assert_eq!(indexer.find_by("tag", "t2").await.unwrap(), vec!["d2"]);
    }

    #[tokio::test]
    async fn test_remove_entry_heals_stale_mapping() {
        let (_dir, _storage, indexer) = indexer().await;

        // A crashed write left tag t1 pointing at a dead record.
        indexer.add(&doc("deadbeef", "x", Some("t1"))).await.unwrap();

        let fresh = doc("d9", "alice", Some("t1"));
        let err = indexer.add(&fresh).await.unwrap_err();
        let IndexError::Conflict { field, value, .. } = err else {
            panic!("expected conflict");
        };

        indexer.remove_entry(&field, &value).await.unwrap();
        indexer.add(&fresh).await.unwrap();
        assert_eq!(indexer.find_by("tag", "t1").await.unwrap(), vec!["d9"]);
    }

    #[tokio::test]
    async fn test_find_by_partial() {
        let (_dir, _storage, indexer) = indexer().await;

        indexer
            .add(&doc("d1", "user:idp:alice", Some("t1")))
            .await
            .unwrap();
        indexer
            .add(&doc("d2", "user:idp:bob", Some("t2")))
            .await
            .unwrap();
        indexer
            .add(&doc("d3", "group:crew", Some("t3")))
            .await
            .unwrap();

        let users = indexer.find_by_partial("owner", "user:*").await.unwrap();
        assert_eq!(users, vec!["d1", "d2"]);

        let single = indexer.find_by_partial("owner", "*:alice").await.unwrap();
        assert_eq!(single, vec!["d1"]);

        let tags = indexer.find_by_partial("tag", "t?").await.unwrap();
        assert_eq!(tags.len(), 3);
    }

    #[tokio::test]
    async fn test_case_insensitive_index() {
        let (_dir, storage, _unused) = indexer().await;

        let indexer = Indexer::<Doc>::new(storage, "ci-index");
        indexer
            .add_index(
                IndexSpec::non_unique("owner", |d: &Doc| Some(d.owner.clone()))
                    .case_insensitive(),
            )
            .await
            .unwrap();

        indexer.add(&doc("d1", "Alice", None)).await.unwrap();
        assert_eq!(indexer.find_by("owner", "ALICE").await.unwrap(), vec!["d1"]);
        assert_eq!(
            indexer.find_by_partial("owner", "ALI*").await.unwrap(),
            vec!["d1"]
        );
    }

    #[tokio::test]
    async fn test_query_combinators() {
        let (_dir, _storage, indexer) = indexer().await;

        indexer.add(&doc("d1", "alice", Some("t1"))).await.unwrap();
        indexer.add(&doc("d2", "alice", Some("t2"))).await.unwrap();
        indexer.add(&doc("d3", "bob", Some("t3"))).await.unwrap();

        let union = indexer
            .query("owner eq 'alice' or owner eq 'bob'")
            .await
            .unwrap();
        assert_eq!(union.len(), 3);

        let intersection = indexer
            .query("owner eq 'alice' and tag eq 't2'")
            .await
            .unwrap();
        assert_eq!(intersection, vec!["d2"]);

        let prefix = indexer
            .query("startswith(owner,'ali') and tag eq 't1'")
            .await
            .unwrap();
        assert_eq!(prefix, vec!["d1"]);

        let none = indexer
            .query("owner eq 'alice' and owner eq 'bob'")
            .await
            .unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn test_query_unknown_field() {
        let (_dir, _storage, indexer) = indexer().await;
        let err = indexer.query("missing eq 'x'").await.unwrap_err();
        assert_eq!(err.kind, sharehub_core::error::ErrorKind::InvalidArgument);
    }

    #[tokio::test]
    async fn test_reregistration_is_idempotent() {
        let (_dir, _storage, indexer) = indexer().await;

        indexer
            .add_index(IndexSpec::unique("tag", |d: &Doc| d.tag.clone()))
            .await
            .unwrap();

        // Same name, different kind is rejected.
        let err = indexer
            .add_index(IndexSpec::non_unique("tag", |d: &Doc| d.tag.clone()))
            .await
            .unwrap_err();
        assert_eq!(err.kind, sharehub_core::error::ErrorKind::InvalidArgument);
    }
}
