pub mod cancel;
pub mod config;
pub mod error;
pub mod logging;
pub mod server;
pub mod sql;
pub mod storage;

pub use cancel::CancellationToken;
pub use config::EmulatorConfig;
pub use error::{DbError, DbResult, ErrorCategory};
pub use server::{create_router, SandboxState};
pub use sql::{parse, tokenize, BoundQuery, FieldType, FieldValue, QueryModel};
pub use storage::{
    BlobStore, Container, ContainerFeed, ContainerHandle, Database, FeedIterator, FeedResponse,
    QueryOptions, Row, Schema,
};
