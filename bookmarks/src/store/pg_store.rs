use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;
use tracing::instrument;

use super::links_model::{MAX_TITLE_LENGTH, MAX_URL_LENGTH};
use super::{Link, LinkStore, NewLink, StoreError};

/// [`LinkStore`] backed by the `links` table in Postgres.
#[derive(Clone)]
pub struct PgLinkStore {
    pool: PgPool,
}

impl PgLinkStore {
    pub fn new(pool: PgPool) -> Self {
        PgLinkStore { pool }
    }

    /// Creates the `links` table and its index if they don't exist yet.
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        let create_table = format!(
            r#"
            CREATE TABLE IF NOT EXISTS links (
                id SERIAL PRIMARY KEY,
                url VARCHAR({MAX_URL_LENGTH}) NOT NULL,
                title VARCHAR({MAX_TITLE_LENGTH}),
                description TEXT,
                created_at TIMESTAMPTZ NOT NULL
            )
            "#
        );
        sqlx::query(&create_table).execute(&self.pool).await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS links_created_at_idx ON links (created_at DESC)")
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    pub async fn drop_schema(&self) -> Result<(), StoreError> {
        sqlx::query("DROP TABLE IF EXISTS links")
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl LinkStore for PgLinkStore {
    #[instrument(name = "create_link", skip_all)]
    async fn create(&self, new_link: NewLink) -> Result<Link, StoreError> {
        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query_as::<_, Link>(
            r#"
            INSERT INTO links (url, title, description, created_at)
            VALUES ($1, $2, $3, $4)
            RETURNING id, url, title, description, created_at
            "#,
        )
        .bind(&new_link.url)
        .bind(&new_link.title)
        .bind(&new_link.description)
        .bind(Utc::now())
        .fetch_one(&mut *tx)
        .await;

        let link = match inserted {
            Ok(link) => link,
            Err(e) => {
                // Dropping the transaction would also roll back, but do it eagerly so the
                // connection goes back to the pool clean.
                if let Err(rollback_error) = tx.rollback().await {
                    tracing::warn!(error = %rollback_error, "Failed to roll back link insert");
                }
                return Err(StoreError::Query(e));
            }
        };

        tx.commit().await.map_err(StoreError::Commit)?;

        tracing::debug!(id = link.id, "Created link");
        Ok(link)
    }

    #[instrument(name = "list_links", skip_all)]
    async fn list_all(&self) -> Result<Vec<Link>, StoreError> {
        let links = sqlx::query_as::<_, Link>(
            r#"
            SELECT id, url, title, description, created_at
            FROM links
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(links)
    }

    async fn check_connection(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
