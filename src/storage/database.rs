use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

use super::container::{Container, Documents};
use super::feed::DEFAULT_MAX_ITEM_COUNT;
use super::row::Row;
use crate::cancel::CancellationToken;
use crate::config::EmulatorConfig;
use crate::error::{DbError, DbResult};

/// Type-erased access to a container through JSON documents.
pub trait ContainerHandle: Send + Sync {
    fn name(&self) -> &str;

    fn partition_key_path(&self) -> &str;

    fn count(&self) -> usize;

    fn read_json(&self, id: &str, partition_key: &str, cancel: &CancellationToken)
        -> DbResult<Value>;

    /// Runs a query and returns every match. A select list narrows each
    /// document to the named fields.
    fn query_json(&self, query: Option<&str>, cancel: &CancellationToken) -> DbResult<Vec<Value>>;

    fn upsert_json(&self, document: Value, cancel: &CancellationToken) -> DbResult<()>;

    fn delete_item(&self, id: &str, partition_key: &str, cancel: &CancellationToken)
        -> DbResult<()>;

    fn create_snapshot(&self, name: &str, cancel: &CancellationToken) -> DbResult<()>;

    fn reset_to_snapshot(&self, name: &str, cancel: &CancellationToken) -> DbResult<()>;

    fn delete_snapshot(&self, name: &str, cancel: &CancellationToken) -> DbResult<()>;

    fn snapshot_names(&self) -> Vec<String>;

    fn clear(&self, cancel: &CancellationToken) -> DbResult<()>;
}

impl<T: Row> ContainerHandle for Container<T> {
    fn name(&self) -> &str {
        Container::name(self)
    }

    fn partition_key_path(&self) -> &str {
        Container::partition_key_path(self)
    }

    fn count(&self) -> usize {
        Container::count(self)
    }

    fn read_json(
        &self,
        id: &str,
        partition_key: &str,
        cancel: &CancellationToken,
    ) -> DbResult<Value> {
        Ok(serde_json::to_value(self.read_item(id, partition_key, cancel)?)?)
    }

    fn query_json(&self, query: Option<&str>, cancel: &CancellationToken) -> DbResult<Vec<Value>> {
        let feed = self.query(query, cancel)?;
        let projection = feed.projection().map(|names| names.to_vec());
        feed.read_all()?
            .into_iter()
            .map(|row| -> DbResult<Value> {
                let value = serde_json::to_value(row)?;
                Ok(match &projection {
                    Some(names) => project(value, names),
                    None => value,
                })
            })
            .collect()
    }

    fn upsert_json(&self, document: Value, cancel: &CancellationToken) -> DbResult<()> {
        let row: T = serde_json::from_value(document)
            .map_err(|e| DbError::InvalidDocument(e.to_string()))?;
        self.upsert_item(row, cancel)
    }

    fn delete_item(
        &self,
        id: &str,
        partition_key: &str,
        cancel: &CancellationToken,
    ) -> DbResult<()> {
        Container::delete_item(self, id, partition_key, cancel)
    }

    fn create_snapshot(&self, name: &str, cancel: &CancellationToken) -> DbResult<()> {
        Container::create_snapshot(self, name, cancel)
    }

    fn reset_to_snapshot(&self, name: &str, cancel: &CancellationToken) -> DbResult<()> {
        Container::reset_to_snapshot(self, name, cancel)
    }

    fn delete_snapshot(&self, name: &str, cancel: &CancellationToken) -> DbResult<()> {
        Container::delete_snapshot(self, name, cancel)
    }

    fn snapshot_names(&self) -> Vec<String> {
        Container::snapshot_names(self)
    }

    fn clear(&self, cancel: &CancellationToken) -> DbResult<()> {
        Container::clear(self, cancel)
    }
}

/// Keeps the fields named in `names`, matched case-insensitively, in
/// select-list order.
fn project(value: Value, names: &[&str]) -> Value {
    let Value::Object(fields) = value else {
        return value;
    };
    let mut projected = Map::new();
    for name in names {
        if let Some((key, field)) = fields.iter().find(|(k, _)| k.eq_ignore_ascii_case(name)) {
            projected.insert(key.clone(), field.clone());
        }
    }
    Value::Object(projected)
}

/// Copy-out/copy-in used by whole-database snapshots. Callers hold the
/// database gate exclusively.
trait SnapshotParticipant: Send + Sync {
    fn export(&self) -> Box<dyn Any + Send + Sync>;

    fn import(&self, documents: &(dyn Any + Send + Sync)) -> DbResult<()>;

    fn truncate(&self);
}

impl<T: Row> SnapshotParticipant for Container<T> {
    fn export(&self) -> Box<dyn Any + Send + Sync> {
        Box::new(self.export_documents())
    }

    fn import(&self, documents: &(dyn Any + Send + Sync)) -> DbResult<()> {
        let documents = documents
            .downcast_ref::<Documents<T>>()
            .ok_or_else(|| DbError::ContainerTypeMismatch(self.name().to_string()))?;
        self.import_documents(documents);
        Ok(())
    }

    fn truncate(&self) {
        Container::truncate(self)
    }
}

/// One registered container, viewed three ways.
struct ContainerEntry {
    typed: Arc<dyn Any + Send + Sync>,
    handle: Arc<dyn ContainerHandle>,
    participant: Arc<dyn SnapshotParticipant>,
}

/// Deep copies of every container's documents, keyed by container name.
type DatabaseSnapshot = HashMap<String, Box<dyn Any + Send + Sync>>;

/// Container listing in the wire shape of the cloud service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ContainerFeed {
    pub document_collections: Vec<ContainerDescription>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ContainerDescription {
    pub id: String,
    pub partition_key: PartitionKeyDefinition,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PartitionKeyDefinition {
    pub paths: Vec<String>,
}

/// A named set of containers with whole-database snapshots.
#[derive(Clone)]
pub struct Database {
    name: String,
    max_item_count: usize,
    /// Container operations hold this shared; database snapshot
    /// operations hold it exclusively.
    gate: Arc<RwLock<()>>,
    containers: Arc<RwLock<HashMap<String, ContainerEntry>>>,
    snapshots: Arc<RwLock<HashMap<String, DatabaseSnapshot>>>,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("name", &self.name)
            .field("containers", &self.container_names())
            .finish()
    }
}

impl Database {
    pub fn new(name: &str) -> Self {
        Self::with_max_item_count(name, DEFAULT_MAX_ITEM_COUNT)
    }

    pub fn with_max_item_count(name: &str, max_item_count: usize) -> Self {
        Self {
            name: name.to_string(),
            max_item_count,
            gate: Arc::new(RwLock::new(())),
            containers: Arc::new(RwLock::new(HashMap::new())),
            snapshots: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn with_config(config: &EmulatorConfig) -> Self {
        Self::with_max_item_count(&config.database, config.max_item_count)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    // ==================== Containers ====================

    /// Returns the container called `name`, creating it first if needed.
    ///
    /// Repeated calls return the same container. A different partition key
    /// path on a later call is ignored with a warning.
    pub fn create_container_if_not_exists<T: Row>(
        &self,
        name: &str,
        partition_key_path: &str,
    ) -> DbResult<Arc<Container<T>>> {
        let mut containers = self.containers.write();

        if let Some(entry) = containers.get(name) {
            let container = downcast::<T>(name, entry)?;
            if container.partition_key_path() != partition_key_path {
                warn!(
                    container = %name,
                    existing = %container.partition_key_path(),
                    requested = %partition_key_path,
                    "container exists with a different partition key path"
                );
            }
            return Ok(container);
        }

        let container = Arc::new(Container::<T>::with_gate(
            name,
            partition_key_path,
            self.max_item_count,
            Arc::clone(&self.gate),
        )?);
        containers.insert(
            name.to_string(),
            ContainerEntry {
                typed: container.clone(),
                handle: container.clone(),
                participant: container.clone(),
            },
        );
        info!(database = %self.name, container = %name, partition_key = %partition_key_path, "container created");
        Ok(container)
    }

    pub fn container<T: Row>(&self, name: &str) -> DbResult<Arc<Container<T>>> {
        let containers = self.containers.read();
        let entry = containers
            .get(name)
            .ok_or_else(|| DbError::ContainerNotFound(name.to_string()))?;
        downcast::<T>(name, entry)
    }

    pub fn container_handle(&self, name: &str) -> DbResult<Arc<dyn ContainerHandle>> {
        self.containers
            .read()
            .get(name)
            .map(|entry| Arc::clone(&entry.handle))
            .ok_or_else(|| DbError::ContainerNotFound(name.to_string()))
    }

    pub fn container_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.containers.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Lists containers sorted by name.
    pub fn list_containers(&self) -> ContainerFeed {
        let containers = self.containers.read();
        let mut document_collections: Vec<ContainerDescription> = containers
            .values()
            .map(|entry| ContainerDescription {
                id: entry.handle.name().to_string(),
                partition_key: PartitionKeyDefinition {
                    paths: vec![entry.handle.partition_key_path().to_string()],
                },
            })
            .collect();
        document_collections.sort_by(|a, b| a.id.cmp(&b.id));
        ContainerFeed {
            document_collections,
        }
    }

    // ==================== Snapshots ====================

    /// Captures every container as one unit.
    pub fn create_snapshot(&self, name: &str, cancel: &CancellationToken) -> DbResult<()> {
        let _gate = self.gate.write();
        cancel.check()?;

        let snapshot: DatabaseSnapshot = self
            .containers
            .read()
            .iter()
            .map(|(container, entry)| (container.clone(), entry.participant.export()))
            .collect();
        let count = snapshot.len();
        self.snapshots.write().insert(name.to_string(), snapshot);
        info!(database = %self.name, snapshot = %name, containers = count, "database snapshot created");
        Ok(())
    }

    /// Restores every container from snapshot `name`. Containers created
    /// after the snapshot was taken are emptied but stay registered.
    pub fn reset_to_snapshot(&self, name: &str, cancel: &CancellationToken) -> DbResult<()> {
        let _gate = self.gate.write();
        cancel.check()?;

        let snapshots = self.snapshots.read();
        let snapshot = snapshots
            .get(name)
            .ok_or_else(|| DbError::SnapshotNotFound(name.to_string()))?;

        for (container, entry) in self.containers.read().iter() {
            match snapshot.get(container) {
                Some(documents) => entry.participant.import(documents.as_ref())?,
                None => entry.participant.truncate(),
            }
        }
        info!(database = %self.name, snapshot = %name, "database reset to snapshot");
        Ok(())
    }

    /// Removes snapshot `name`. Unknown names are ignored.
    pub fn delete_snapshot(&self, name: &str, cancel: &CancellationToken) -> DbResult<()> {
        let _gate = self.gate.write();
        cancel.check()?;

        if self.snapshots.write().remove(name).is_some() {
            info!(database = %self.name, snapshot = %name, "database snapshot deleted");
        }
        Ok(())
    }

    pub fn snapshot_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.snapshots.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Drops every container and database snapshot.
    pub fn clear(&self, cancel: &CancellationToken) -> DbResult<()> {
        let _gate = self.gate.write();
        cancel.check()?;

        self.containers.write().clear();
        self.snapshots.write().clear();
        info!(database = %self.name, "database cleared");
        Ok(())
    }
}

fn downcast<T: Row>(name: &str, entry: &ContainerEntry) -> DbResult<Arc<Container<T>>> {
    Arc::clone(&entry.typed)
        .downcast::<Container<T>>()
        .map_err(|_| DbError::ContainerTypeMismatch(name.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_project_keeps_named_fields() {
        let doc = json!({"id": "1", "emailAddress": "a@b.c", "name": "A"});
        assert_eq!(
            project(doc, &["EMAILADDRESS", "id"]),
            json!({"emailAddress": "a@b.c", "id": "1"})
        );
    }

    #[test]
    fn test_container_feed_shape() {
        let feed = ContainerFeed {
            document_collections: vec![ContainerDescription {
                id: "teams".to_string(),
                partition_key: PartitionKeyDefinition {
                    paths: vec!["/emailAddress".to_string()],
                },
            }],
        };
        assert_eq!(
            serde_json::to_value(&feed).unwrap(),
            json!({"DocumentCollections": [{"Id": "teams", "PartitionKey": {"Paths": ["/emailAddress"]}}]})
        );
    }

    #[test]
    fn test_unknown_container() {
        let db = Database::new("emulator");
        assert!(matches!(
            db.container_handle("missing"),
            Err(DbError::ContainerNotFound(_))
        ));
        assert!(db.list_containers().document_collections.is_empty());
    }
}
