use serde::{de::DeserializeOwned, Serialize};
use std::collections::HashMap;

use crate::sql::value::{FieldType, FieldValue};

/// Reads one column's current value from a row.
pub type Accessor<T> = fn(&T) -> FieldValue;

/// A caller-defined document type stored in a container.
///
/// ```
/// use emudb::storage::{Row, Schema};
/// use emudb::sql::FieldType;
/// use once_cell::sync::Lazy;
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Clone, Serialize, Deserialize)]
/// struct Team {
///     id: String,
///     name: String,
///     founded: Option<i32>,
/// }
///
/// impl Row for Team {
///     fn schema() -> &'static Schema<Self> {
///         static SCHEMA: Lazy<Schema<Team>> = Lazy::new(|| {
///             Schema::builder()
///                 .column("id", FieldType::String, |t: &Team| t.id.clone().into())
///                 .column("name", FieldType::String, |t: &Team| t.name.clone().into())
///                 .column("founded", FieldType::I32, |t: &Team| t.founded.into())
///                 .build()
///         });
///         &SCHEMA
///     }
///
///     fn id(&self) -> &str {
///         &self.id
///     }
/// }
/// ```
pub trait Row: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    fn schema() -> &'static Schema<Self>;

    fn id(&self) -> &str;
}

pub struct Column<T> {
    pub name: &'static str,
    /// Declared type, used for literal coercion even when the value is null.
    pub field_type: FieldType,
    pub accessor: Accessor<T>,
}

impl<T> Column<T> {
    pub fn read(&self, row: &T) -> FieldValue {
        (self.accessor)(row)
    }
}

/// Column table of a row type with a case-insensitive name index.
pub struct Schema<T> {
    columns: Vec<Column<T>>,
    index: HashMap<String, usize>,
}

impl<T> Schema<T> {
    pub fn builder() -> SchemaBuilder<T> {
        SchemaBuilder {
            columns: Vec::new(),
        }
    }

    /// Case-insensitive lookup.
    pub fn column(&self, name: &str) -> Option<&Column<T>> {
        self.index
            .get(&name.to_lowercase())
            .and_then(|&i| self.columns.get(i))
    }

    pub fn columns(&self) -> &[Column<T>] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

pub struct SchemaBuilder<T> {
    columns: Vec<Column<T>>,
}

impl<T> SchemaBuilder<T> {
    pub fn column(mut self, name: &'static str, field_type: FieldType, accessor: Accessor<T>) -> Self {
        self.columns.push(Column {
            name,
            field_type,
            accessor,
        });
        self
    }

    /// Builds the schema. A later column with the same (case-insensitive)
    /// name replaces an earlier one in the index.
    pub fn build(self) -> Schema<T> {
        let index = self
            .columns
            .iter()
            .enumerate()
            .map(|(i, c)| (c.name.to_lowercase(), i))
            .collect();
        Schema {
            columns: self.columns,
            index,
        }
    }
}

/// Resolves a partition key path such as `/emailAddress` to a column.
pub fn resolve_partition_key<T>(schema: &Schema<T>, path: &str) -> Option<Accessor<T>> {
    let name = path.strip_prefix('/')?;
    if name.is_empty() || name.contains('/') {
        return None;
    }
    schema.column(name).map(|c| c.accessor)
}
