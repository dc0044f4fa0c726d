use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{debug, info};

use super::feed::{FeedIterator, QueryOptions, DEFAULT_MAX_ITEM_COUNT};
use super::row::{resolve_partition_key, Accessor, Row};
use crate::cancel::CancellationToken;
use crate::error::{DbError, DbResult};
use crate::sql::{parse, BoundQuery};

pub(crate) type Documents<T> = BTreeMap<String, T>;

struct ContainerState<T> {
    /// Live documents keyed by id. Shared with open feeds; writers go
    /// through `Arc::make_mut`.
    documents: Arc<Documents<T>>,
    /// Named deep copies of `documents`.
    snapshots: HashMap<String, Documents<T>>,
}

/// A named, partition-keyed in-memory collection of rows of type `T`.
pub struct Container<T: Row> {
    name: String,
    partition_key_path: String,
    partition_key: Accessor<T>,
    max_item_count: usize,
    /// Shared with the owning database; whole-database snapshot operations
    /// hold it exclusively.
    gate: Arc<RwLock<()>>,
    state: RwLock<ContainerState<T>>,
}

impl<T: Row> Container<T> {
    /// Creates a standalone container.
    pub fn new(name: &str, partition_key_path: &str) -> DbResult<Self> {
        Self::with_gate(
            name,
            partition_key_path,
            DEFAULT_MAX_ITEM_COUNT,
            Arc::new(RwLock::new(())),
        )
    }

    pub(crate) fn with_gate(
        name: &str,
        partition_key_path: &str,
        max_item_count: usize,
        gate: Arc<RwLock<()>>,
    ) -> DbResult<Self> {
        let partition_key =
            resolve_partition_key(T::schema(), partition_key_path).ok_or_else(|| {
                DbError::InvalidPartitionKey(format!(
                    "'{}' does not name a column of the rows stored in '{}'",
                    partition_key_path, name
                ))
            })?;

        Ok(Self {
            name: name.to_string(),
            partition_key_path: partition_key_path.to_string(),
            partition_key,
            max_item_count,
            gate,
            state: RwLock::new(ContainerState {
                documents: Arc::new(BTreeMap::new()),
                snapshots: HashMap::new(),
            }),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn partition_key_path(&self) -> &str {
        &self.partition_key_path
    }

    pub fn max_item_count(&self) -> usize {
        self.max_item_count
    }

    /// Number of live documents.
    pub fn count(&self) -> usize {
        let _gate = self.gate.read();
        self.state.read().documents.len()
    }

    // ==================== Documents ====================

    /// Inserts `document`, replacing any document with the same id.
    pub fn upsert_item(&self, document: T, cancel: &CancellationToken) -> DbResult<()> {
        let id = Self::document_id(&document)?;
        let _gate = self.gate.read();
        cancel.check()?;

        let mut state = self.state.write();
        debug!(container = %self.name, id = %id, "upsert");
        Arc::make_mut(&mut state.documents).insert(id, document);
        Ok(())
    }

    /// Inserts `document`; fails with `Conflict` if the id is taken.
    pub fn create_item(&self, document: T, cancel: &CancellationToken) -> DbResult<()> {
        let id = Self::document_id(&document)?;
        let _gate = self.gate.read();
        cancel.check()?;

        let mut state = self.state.write();
        if state.documents.contains_key(&id) {
            return Err(DbError::Conflict(format!(
                "document '{}' already exists in '{}'",
                id, self.name
            )));
        }
        debug!(container = %self.name, id = %id, "create");
        Arc::make_mut(&mut state.documents).insert(id, document);
        Ok(())
    }

    pub fn read_item(
        &self,
        id: &str,
        partition_key: &str,
        cancel: &CancellationToken,
    ) -> DbResult<T> {
        let _gate = self.gate.read();
        cancel.check()?;

        let state = self.state.read();
        state
            .documents
            .get(id)
            .filter(|doc| self.partition_key_matches(doc, partition_key))
            .cloned()
            .ok_or_else(|| DbError::DocumentNotFound(id.to_string()))
    }

    /// Removes a document. The partition key must match the stored one.
    pub fn delete_item(
        &self,
        id: &str,
        partition_key: &str,
        cancel: &CancellationToken,
    ) -> DbResult<()> {
        let _gate = self.gate.read();
        cancel.check()?;

        let mut state = self.state.write();
        let found = state
            .documents
            .get(id)
            .is_some_and(|doc| self.partition_key_matches(doc, partition_key));
        if !found {
            return Err(DbError::DocumentNotFound(id.to_string()));
        }
        Arc::make_mut(&mut state.documents).remove(id);
        debug!(container = %self.name, id = %id, "delete");
        Ok(())
    }

    // ==================== Queries ====================

    /// Runs `query` against a point-in-time view. `None` returns every
    /// document.
    pub fn query(&self, query: Option<&str>, cancel: &CancellationToken) -> DbResult<FeedIterator<T>> {
        self.query_with_options(query, &QueryOptions::default(), cancel)
    }

    pub fn query_with_options(
        &self,
        query: Option<&str>,
        options: &QueryOptions,
        cancel: &CancellationToken,
    ) -> DbResult<FeedIterator<T>> {
        let bound = match query {
            Some(text) => {
                debug!(container = %self.name, query = %text, "query");
                Some(BoundQuery::bind(&parse(text)?)?)
            }
            None => None,
        };

        let view = {
            let _gate = self.gate.read();
            cancel.check()?;
            Arc::clone(&self.state.read().documents)
        };

        FeedIterator::new(
            view,
            bound,
            options.max_item_count.unwrap_or(self.max_item_count),
            cancel.clone(),
        )
    }

    // ==================== Snapshots ====================

    /// Stores a deep copy of the live documents under `name`, replacing
    /// any snapshot with that name.
    pub fn create_snapshot(&self, name: &str, cancel: &CancellationToken) -> DbResult<()> {
        let _gate = self.gate.read();
        cancel.check()?;

        let mut state = self.state.write();
        let copy = (*state.documents).clone();
        state.snapshots.insert(name.to_string(), copy);
        info!(container = %self.name, snapshot = %name, "snapshot created");
        Ok(())
    }

    /// Replaces the live documents with a fresh copy of snapshot `name`.
    /// The snapshot itself is left intact.
    pub fn reset_to_snapshot(&self, name: &str, cancel: &CancellationToken) -> DbResult<()> {
        let _gate = self.gate.read();
        cancel.check()?;

        let mut state = self.state.write();
        let copy = state
            .snapshots
            .get(name)
            .cloned()
            .ok_or_else(|| DbError::SnapshotNotFound(name.to_string()))?;
        state.documents = Arc::new(copy);
        info!(container = %self.name, snapshot = %name, "reset to snapshot");
        Ok(())
    }

    /// Removes snapshot `name`. Unknown names are ignored.
    pub fn delete_snapshot(&self, name: &str, cancel: &CancellationToken) -> DbResult<()> {
        let _gate = self.gate.read();
        cancel.check()?;

        if self.state.write().snapshots.remove(name).is_some() {
            info!(container = %self.name, snapshot = %name, "snapshot deleted");
        }
        Ok(())
    }

    pub fn snapshot_names(&self) -> Vec<String> {
        let _gate = self.gate.read();
        let mut names: Vec<String> = self.state.read().snapshots.keys().cloned().collect();
        names.sort();
        names
    }

    /// Drops all documents and snapshots.
    pub fn clear(&self, cancel: &CancellationToken) -> DbResult<()> {
        let _gate = self.gate.read();
        cancel.check()?;

        let mut state = self.state.write();
        state.documents = Arc::new(BTreeMap::new());
        state.snapshots.clear();
        info!(container = %self.name, "container cleared");
        Ok(())
    }

    // ==================== Database-level access ====================
    // Callers hold the gate exclusively, so these take only the state lock.

    pub(crate) fn export_documents(&self) -> Documents<T> {
        (*self.state.read().documents).clone()
    }

    pub(crate) fn import_documents(&self, documents: &Documents<T>) {
        let copy = documents.clone();
        self.state.write().documents = Arc::new(copy);
    }

    pub(crate) fn truncate(&self) {
        self.state.write().documents = Arc::new(BTreeMap::new());
    }

    fn partition_key_matches(&self, document: &T, partition_key: &str) -> bool {
        (self.partition_key)(document).to_key_string() == partition_key
    }

    fn document_id(document: &T) -> DbResult<String> {
        let id = document.id();
        if id.is_empty() {
            return Err(DbError::InvalidDocument(
                "document id must not be empty".to_string(),
            ));
        }
        Ok(id.to_string())
    }
}

impl<T: Row> std::fmt::Debug for Container<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Container")
            .field("name", &self.name)
            .field("partition_key_path", &self.partition_key_path)
            .field("count", &self.state.read().documents.len())
            .finish()
    }
}
