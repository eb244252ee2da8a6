use thiserror::Error;

pub type BlobResult<T> = Result<T, BlobError>;

pub type LockResult<T> = Result<T, LockError>;

#[derive(Debug, Error)]
pub enum BlobError {
    #[error("Object not found: {bucket}/{key}")]
    NotFound { bucket: String, key: String },

    #[error("Content mismatch at {bucket}/{key}: expecting {expected}, found {actual}")]
    Mismatch {
        bucket: String,
        key: String,
        expected: String,
        actual: String,
    },

    #[error("Serialisation error: {0}")]
    Serialisation(String),

    #[error("Operation not supported by backend: {0}")]
    Unsupported(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Backend error: {0}")]
    Backend(String),
}

impl BlobError {
    pub(crate) fn from_store(bucket: &str, key: &str, err: object_store::Error) -> Self {
        match err {
            object_store::Error::NotFound { .. } => Self::NotFound {
                bucket: bucket.to_owned(),
                key: key.to_owned(),
            },
            object_store::Error::NotImplemented | object_store::Error::NotSupported { .. } => {
                Self::Unsupported(err.to_string())
            }
            other => Self::Backend(other.to_string()),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

#[derive(Debug, Error)]
pub enum LockError {
    #[error("Lock {lock_path} not owned: expecting {expected}, held by {actual}")]
    OwnershipMismatch {
        lock_path: String,
        expected: String,
        actual: String,
    },

    #[error(transparent)]
    Blob(#[from] BlobError),
}
