pub mod blobs;
pub mod container;
pub mod database;
pub mod feed;
pub mod row;

pub use blobs::BlobStore;
pub use container::Container;
pub use database::{
    ContainerDescription, ContainerFeed, ContainerHandle, Database, PartitionKeyDefinition,
};
pub use feed::{FeedIterator, FeedResponse, QueryOptions, DEFAULT_MAX_ITEM_COUNT};
pub use row::{resolve_partition_key, Accessor, Column, Row, Schema, SchemaBuilder};
