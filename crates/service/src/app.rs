//! Application assembly: wires configuration into running components.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::task::JoinHandle;

use domain::services::{InvalidationCoordinator, InvalidationPublisher};
use invalidation::{InvalidationBus, InvalidationListener, ResolutionCache};
use persistence::db::{create_pool, run_migrations};
use persistence::metrics::spawn_pool_metrics_recorder;
use persistence::PgTemplateStore;

use crate::config::Config;
use crate::services::TemplateService;

/// A fully wired template service backed by PostgreSQL, with the
/// invalidation listener running as a background task.
pub struct Application {
    pub templates: TemplateService<PgTemplateStore>,
    pub bus: Arc<InvalidationBus>,
    pub cache: Arc<ResolutionCache>,
    listener: JoinHandle<()>,
    pool_metrics: JoinHandle<()>,
}

const POOL_METRICS_PERIOD: Duration = Duration::from_secs(30);

impl Application {
    /// Connect to the database, run migrations, and start the
    /// invalidation listener.
    pub async fn build(config: &Config) -> anyhow::Result<Self> {
        let db_config = config.database.clone().into();
        let pool = create_pool(&db_config)
            .await
            .context("failed to create database pool")?;
        run_migrations(&pool)
            .await
            .context("failed to run database migrations")?;
        tracing::info!("database pool ready, migrations applied");

        let pool_metrics = spawn_pool_metrics_recorder(pool.clone(), POOL_METRICS_PERIOD);
        let store = Arc::new(PgTemplateStore::new(pool));
        let bus = Arc::new(InvalidationBus::new(config.invalidation.buffer));
        let cache = Arc::new(ResolutionCache::new(Duration::from_secs(
            config.cache.ttl_secs,
        )));

        // The listener subscribes before any write can publish, so no
        // event produced through this application is missed.
        let listener = InvalidationListener::new(&bus, cache.clone());
        let listener = tokio::spawn(listener.run());

        let publisher: Arc<dyn InvalidationPublisher> = bus.clone();
        let templates = TemplateService::new(
            store,
            cache.clone(),
            InvalidationCoordinator::new(publisher),
        );
        tracing::info!(
            cache_ttl_secs = config.cache.ttl_secs,
            bus_buffer = config.invalidation.buffer,
            "template service assembled"
        );

        Ok(Self {
            templates,
            bus,
            cache,
            listener,
            pool_metrics,
        })
    }

    /// Stop the background tasks.
    pub fn shutdown(&self) {
        self.listener.abort();
        self.pool_metrics.abort();
        tracing::info!("background tasks stopped");
    }
}
