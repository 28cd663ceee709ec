use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Invalid database connection string: {0}")]
    InvalidUrl(#[source] sqlx::Error),

    #[error("Failed to connect to the database: {0}")]
    Connect(#[source] sqlx::Error),

    #[error("Failed to check a connection out of the pool: {0}")]
    Acquire(#[source] sqlx::Error),

    #[error("Statement execution failed: {0}")]
    Execute(#[source] sqlx::Error),

    #[error("Failed to decode column `{column}`: {source}")]
    Decode {
        column: String,
        #[source]
        source: sqlx::Error,
    },
}
