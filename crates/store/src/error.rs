use thiserror::Error;

/// Storage errors: insert failures to the metrics table or atom store.
/// `TableMissing` is distinguished from other database errors because the
/// Fingerprint Index's absence is an explicitly survivable condition —
/// graceful degradation is a feature, not a bug.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("required table is absent: {0}")]
    TableMissing(String),
}

impl StoreError {
    /// PostgreSQL SQLSTATE 42P01 is "undefined_table".
    pub fn is_table_missing(&self) -> bool {
        match self {
            StoreError::TableMissing(_) => true,
            StoreError::Database(sqlx::Error::Database(e)) => e.code().as_deref() == Some("42P01"),
            StoreError::Database(_) => false,
        }
    }
}
