use thiserror::Error;

use crate::dataset::VacancyId;

/// Failure of a single HTTP round trip.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("{url} answered with HTTP {status}")]
    Status { url: String, status: u16 },
    #[error("response body is not the expected JSON: {0}")]
    Decode(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("relational storage selected but no database URL configured")]
    MissingDatabaseUrl,
    #[error("unsupported database URL scheme `{0}` (expected postgres://, postgresql:// or sqlite://)")]
    UnsupportedScheme(String),
    #[error("no storage selected to read from (use a csv or db store)")]
    NothingToRead,
    #[error("PostgreSQL support is not compiled in; rebuild with `--features postgres`")]
    PostgresDisabled,
    #[error("flat file I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed flat file, line {line}: {reason}")]
    Malformed { line: usize, reason: String },
    #[error("array column encoding failed: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("vacancy {id} has an unparsable publication date `{value}`")]
    InvalidDate { id: VacancyId, value: String },
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[cfg(feature = "postgres")]
    #[error("postgres: {0}")]
    Postgres(#[from] postgres::Error),
}

/// Every way a collection run can abort. Nothing below `main` recovers from these.
#[derive(Debug, Error)]
pub enum CollectError {
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("listing page {page} could not be read")]
    Listing {
        page: u32,
        #[source]
        source: TransportError,
    },
    #[error("vacancy {id} could not be fetched after {attempts} attempts")]
    Fetch {
        id: VacancyId,
        attempts: u32,
        #[source]
        source: TransportError,
    },
    #[error("vacancy {id} does not match the expected schema")]
    Schema {
        id: VacancyId,
        #[source]
        source: serde_json::Error,
    },
    #[error(transparent)]
    Storage(#[from] StorageError),
}
