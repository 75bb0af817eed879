use anyhow::{Context, Result};
use std::sync::Arc;

use common_database::get_pool;
use common_metrics::setup_metrics_recorder;
use metrics_exporter_prometheus::PrometheusHandle;

use crate::config::Config;
use crate::store::{LinkStore, PgLinkStore};

#[derive(Clone)]
pub struct State {
    pub store: Arc<dyn LinkStore>,
    pub max_body_size: usize,
    pub metrics: Option<PrometheusHandle>,
}

impl State {
    /// Connects to Postgres, makes sure the schema is in place and that the database answers.
    /// Any failure here means the process should not start serving.
    pub async fn from_config(config: &Config) -> Result<Self> {
        let pool = match get_pool(&config.database_url, config.max_pg_connections).await {
            Ok(pool) => {
                tracing::info!("Successfully created Postgres client");
                pool
            }
            Err(e) => {
                tracing::error!(
                    error = %e,
                    max_connections = config.max_pg_connections,
                    "Failed to create Postgres client"
                );
                return Err(anyhow::anyhow!("Failed to create Postgres client: {}", e));
            }
        };

        let store = PgLinkStore::new(pool);
        store
            .ensure_schema()
            .await
            .context("Failed to create or verify the links table")?;
        tracing::info!("Database tables created/verified");

        store
            .check_connection()
            .await
            .context("Database connection check failed")?;
        tracing::info!("Database connection successful");

        let metrics = if config.enable_metrics {
            Some(setup_metrics_recorder().context("Failed to install metrics recorder")?)
        } else {
            None
        };

        Ok(State {
            store: Arc::new(store),
            max_body_size: config.max_body_size,
            metrics,
        })
    }

    /// Builds a state around an already constructed store, skipping all startup checks.
    pub fn with_store(store: Arc<dyn LinkStore>, config: &Config) -> Self {
        State {
            store,
            max_body_size: config.max_body_size,
            metrics: None,
        }
    }
}
