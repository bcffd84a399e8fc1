//! Query and connection-pool instrumentation for the template store.

use metrics::{gauge, histogram};
use sqlx::PgPool;
use std::time::{Duration, Instant};

/// Times one repository query and records it to the
/// `template_store_query_duration_seconds` histogram, labeled by query name.
pub struct QueryTimer {
    query: &'static str,
    start: Instant,
}

impl QueryTimer {
    pub fn new(query: &'static str) -> Self {
        Self {
            query,
            start: Instant::now(),
        }
    }

    /// Record the elapsed duration. Consumes the timer so a query cannot be
    /// recorded twice.
    pub fn record(self) {
        histogram!("template_store_query_duration_seconds", "query" => self.query)
            .record(self.start.elapsed().as_secs_f64());
    }
}

/// Sample the connection pool gauges once.
pub fn record_pool_metrics(pool: &PgPool) {
    let size = pool.size() as usize;
    let idle = pool.num_idle();

    gauge!("template_db_connections_total").set(size as f64);
    gauge!("template_db_connections_idle").set(idle as f64);
    gauge!("template_db_connections_active").set(size.saturating_sub(idle) as f64);
}

/// Spawn a background task sampling the pool gauges every `period`.
///
/// The task runs until aborted; the returned handle is owned by whoever
/// manages the application lifecycle.
pub fn spawn_pool_metrics_recorder(
    pool: PgPool,
    period: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        loop {
            interval.tick().await;
            record_pool_metrics(&pool);
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::postgres::PgPoolOptions;

    #[test]
    fn test_query_timer_records_once() {
        let timer = QueryTimer::new("get_schema");
        assert_eq!(timer.query, "get_schema");
        // Consuming record() is the only way to emit the sample.
        timer.record();
    }

    #[tokio::test]
    async fn test_pool_metrics_recorder_keeps_running() {
        // A lazy pool never opens a connection, so sampling its gauges is
        // safe without a database.
        let pool = PgPoolOptions::new()
            .connect_lazy("postgres://localhost/unreachable")
            .unwrap();
        record_pool_metrics(&pool);

        let handle = spawn_pool_metrics_recorder(pool, Duration::from_millis(5));
        tokio::time::sleep(Duration::from_millis(25)).await;
        assert!(!handle.is_finished());
        handle.abort();
    }
}
