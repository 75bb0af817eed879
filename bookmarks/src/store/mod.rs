use async_trait::async_trait;
use common_database::{classify, ErrorClass};
use thiserror::Error;

pub mod links_model;
pub mod pg_store;

pub use links_model::{Link, NewLink};
pub use pg_store::PgLinkStore;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database query failed: {0}")]
    Query(#[from] sqlx::Error),
    #[error("failed to commit transaction: {0}")]
    Commit(sqlx::Error),
}

impl StoreError {
    pub fn class(&self) -> ErrorClass {
        match self {
            StoreError::Query(e) | StoreError::Commit(e) => classify(e),
        }
    }
}

/// Durable storage for [`Link`]s.
///
/// Implementations own their transactions: a failed `create` must leave nothing
/// behind that a later `list_all` could observe.
#[async_trait]
pub trait LinkStore: Send + Sync + 'static {
    /// Persists a new link and returns it with its generated `id` and `created_at`.
    async fn create(&self, new_link: NewLink) -> Result<Link, StoreError>;

    /// All links, newest first.
    async fn list_all(&self) -> Result<Vec<Link>, StoreError>;

    async fn check_connection(&self) -> Result<(), StoreError>;
}
