use crate::error::DbError;
use configuration::{ConnectionStrategy, Settings};
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::{ConnectOptions, Connection, PgConnection, PgPool};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, MutexGuard};

/// Lower bound of the connection pool.
const POOL_MIN_CONNECTIONS: u32 = 1;
/// Upper bound of the connection pool; requests beyond this block on checkout.
const POOL_MAX_CONNECTIONS: u32 = 10;
/// How long a request may wait for a pooled connection before failing.
const POOL_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);
/// Fixed delay between singleton startup connection attempts.
const RETRY_DELAY: Duration = Duration::from_secs(5);
/// The no-op query used to confirm database reachability.
const LIVENESS_QUERY: &str = "SELECT 1";

/// The database resource constructed once at startup and handed to every
/// request handler. Which variant is built is decided by
/// `Settings::connection_strategy`; the rest of the application only sees the
/// methods on this type.
#[derive(Debug, Clone)]
pub enum Database {
    /// A bounded connection pool shared by all requests. Connections are
    /// checked out per request and always returned, never closed here.
    Pooled(PgPool),
    /// Connection parameters only; a fresh connection is opened inside each
    /// request and closed when the request is done.
    PerRequest(PgConnectOptions),
    /// One long-lived connection created at startup. The mutex serializes
    /// concurrent requests over the single handle.
    Singleton(Arc<Mutex<PgConnection>>),
}

impl Database {
    /// Establishes the database resource for the configured strategy.
    ///
    /// `Pooled` connects eagerly, so an unreachable database fails startup.
    /// `PerRequest` only validates the connection string. `Singleton` retries
    /// until the database accepts a connection and does not return before
    /// then.
    pub async fn connect(settings: &Settings) -> Result<Database, DbError> {
        let options: PgConnectOptions = settings
            .database_url
            .parse()
            .map_err(DbError::InvalidUrl)?;

        match settings.connection_strategy {
            ConnectionStrategy::Pooled => {
                let pool = PgPoolOptions::new()
                    .min_connections(POOL_MIN_CONNECTIONS)
                    .max_connections(POOL_MAX_CONNECTIONS)
                    .acquire_timeout(POOL_ACQUIRE_TIMEOUT)
                    .connect_with(options)
                    .await
                    .map_err(DbError::Connect)?;
                Ok(Database::Pooled(pool))
            }
            ConnectionStrategy::PerRequest => Ok(Database::PerRequest(options)),
            ConnectionStrategy::Singleton => {
                let conn = connect_with_retry(&options).await;
                Ok(Database::Singleton(Arc::new(Mutex::new(conn))))
            }
        }
    }

    /// Checks a connection out according to the strategy.
    pub(crate) async fn checkout(&self) -> Result<DbHandle<'_>, DbError> {
        match self {
            Database::Pooled(pool) => {
                let conn = pool.acquire().await.map_err(DbError::Acquire)?;
                Ok(DbHandle::Pooled(conn))
            }
            Database::PerRequest(options) => {
                let conn = options.connect().await.map_err(DbError::Connect)?;
                Ok(DbHandle::Owned(conn))
            }
            Database::Singleton(conn) => Ok(DbHandle::Shared(conn.lock().await)),
        }
    }

    /// Executes the liveness query through whichever strategy is active.
    ///
    /// This is the `/health` primitive: it confirms that a connection can be
    /// obtained and that the database answers a trivial query.
    pub async fn ping(&self) -> Result<(), DbError> {
        let mut handle = self.checkout().await?;
        let result = sqlx::query(LIVENESS_QUERY)
            .persistent(false)
            .execute(handle.as_conn())
            .await;
        handle.release().await;
        result.map(|_| ()).map_err(DbError::Execute)
    }
}

/// A connection checked out for the duration of one request, in whatever form
/// the active strategy provides it.
pub(crate) enum DbHandle<'a> {
    Pooled(sqlx::pool::PoolConnection<sqlx::Postgres>),
    Owned(PgConnection),
    Shared(MutexGuard<'a, PgConnection>),
}

impl DbHandle<'_> {
    pub(crate) fn as_conn(&mut self) -> &mut PgConnection {
        match self {
            DbHandle::Pooled(conn) => conn,
            DbHandle::Owned(conn) => conn,
            DbHandle::Shared(guard) => guard,
        }
    }

    /// Returns the connection to wherever it came from. Pooled connections go
    /// back to the pool on drop and the singleton guard unlocks; only
    /// per-request connections are explicitly closed.
    pub(crate) async fn release(self) {
        if let DbHandle::Owned(conn) = self {
            if let Err(e) = conn.close().await {
                tracing::warn!(error = %e, "Per-request connection did not close cleanly.");
            }
        }
    }
}

/// Connects to the database, retrying with a fixed delay until it succeeds.
///
/// The singleton strategy calls this before the server starts serving
/// traffic, so the process waits indefinitely for the database instead of
/// exiting. Implemented as a loop, not recursion.
async fn connect_with_retry(options: &PgConnectOptions) -> PgConnection {
    let mut attempt: u32 = 1;
    loop {
        match options.connect().await {
            Ok(conn) => {
                tracing::info!(attempt, "Connected to the database.");
                return conn;
            }
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    attempt,
                    retry_in_secs = RETRY_DELAY.as_secs(),
                    "Database connection failed; retrying."
                );
                tokio::time::sleep(RETRY_DELAY).await;
                attempt += 1;
            }
        }
    }
}
