use std::{
    future::Future,
    panic,
    sync::{
        atomic::{AtomicBool, Ordering},
        Mutex,
    },
};

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;

use crate::store::{Link, LinkStore, NewLink, PgLinkStore, StoreError};

/// A freshly created `links` schema that lives for the duration of one test.
///
/// `setup` drops whatever an earlier run left behind before creating the table,
/// `teardown` drops it again. Prefer [`with_schema`], which tears down even when the test panics.
pub struct TestSchema {
    store: PgLinkStore,
}

impl TestSchema {
    pub async fn setup(pool: PgPool) -> Result<Self, StoreError> {
        let store = PgLinkStore::new(pool);
        store.drop_schema().await?;
        store.ensure_schema().await?;
        Ok(TestSchema { store })
    }

    pub fn store(&self) -> &PgLinkStore {
        &self.store
    }

    pub async fn teardown(self) -> Result<(), StoreError> {
        self.store.drop_schema().await
    }
}

/// Runs `test` against a fresh schema and drops the schema afterwards, whether the
/// test returned an error or panicked. A panic is re-raised once the schema is gone.
pub async fn with_schema<F, Fut, T>(pool: PgPool, test: F) -> Result<T>
where
    F: FnOnce(PgLinkStore) -> Fut,
    Fut: Future<Output = Result<T>> + Send + 'static,
    T: Send + 'static,
{
    let schema = TestSchema::setup(pool).await?;
    let outcome = tokio::spawn(test(schema.store().clone())).await;
    schema.teardown().await?;

    match outcome {
        Ok(result) => result,
        Err(join_error) if join_error.is_panic() => panic::resume_unwind(join_error.into_panic()),
        Err(join_error) => Err(join_error.into()),
    }
}

/// Keeps links in a vector. Good enough for exercising the HTTP layer without Postgres.
#[derive(Default)]
pub struct InMemoryLinkStore {
    links: Mutex<Vec<Link>>,
}

impl InMemoryLinkStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LinkStore for InMemoryLinkStore {
    async fn create(&self, new_link: NewLink) -> Result<Link, StoreError> {
        let mut links = self.links.lock().expect("poisoned lock");
        let link = Link {
            id: links.len() as i32 + 1,
            url: new_link.url,
            title: new_link.title,
            description: new_link.description,
            created_at: Utc::now(),
        };
        links.push(link.clone());
        Ok(link)
    }

    async fn list_all(&self) -> Result<Vec<Link>, StoreError> {
        let mut links = self.links.lock().expect("poisoned lock").clone();
        links.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(links)
    }

    async fn check_connection(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

/// Wraps an [`InMemoryLinkStore`] and fails selected operations on demand.
#[derive(Default)]
pub struct FaultyLinkStore {
    inner: InMemoryLinkStore,
    fail_creates: AtomicBool,
    fail_lists: AtomicBool,
    fail_connection: AtomicBool,
    panic_on_list: AtomicBool,
}

impl FaultyLinkStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_creates() -> Self {
        let store = Self::new();
        store.fail_creates.store(true, Ordering::SeqCst);
        store
    }

    pub fn unreachable() -> Self {
        let store = Self::new();
        store.fail_creates.store(true, Ordering::SeqCst);
        store.fail_lists.store(true, Ordering::SeqCst);
        store.fail_connection.store(true, Ordering::SeqCst);
        store
    }

    pub fn panicking_lists() -> Self {
        let store = Self::new();
        store.panic_on_list.store(true, Ordering::SeqCst);
        store
    }

    pub fn set_fail_creates(&self, fail: bool) {
        self.fail_creates.store(fail, Ordering::SeqCst);
    }
}

fn simulated_failure() -> StoreError {
    StoreError::Commit(sqlx::Error::PoolClosed)
}

#[async_trait]
impl LinkStore for FaultyLinkStore {
    async fn create(&self, new_link: NewLink) -> Result<Link, StoreError> {
        if self.fail_creates.load(Ordering::SeqCst) {
            return Err(simulated_failure());
        }
        self.inner.create(new_link).await
    }

    async fn list_all(&self) -> Result<Vec<Link>, StoreError> {
        if self.panic_on_list.load(Ordering::SeqCst) {
            panic!("simulated bug while listing links");
        }
        if self.fail_lists.load(Ordering::SeqCst) {
            return Err(StoreError::Query(sqlx::Error::PoolTimedOut));
        }
        self.inner.list_all().await
    }

    async fn check_connection(&self) -> Result<(), StoreError> {
        if self.fail_connection.load(Ordering::SeqCst) {
            return Err(StoreError::Query(sqlx::Error::PoolTimedOut));
        }
        Ok(())
    }
}
