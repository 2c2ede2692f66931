use thiserror::Error;
use websql_core::WebSqlError;

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Service-level errors with user-friendly messages
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Startup failed: {0}")]
    StartupFailed(String),

    #[error("The database is still starting up")]
    NotReady,

    #[error("Table export failed: {0}")]
    ExportFailed(String),

    #[error(transparent)]
    Core(#[from] WebSqlError),
}
