pub type StorageResult<T> = Result<T, StorageError>;

#[derive(thiserror::Error, Debug)]
pub enum StorageError {
    #[error("Object store error: {0}")]
    ObjectStoreError(#[from] object_store::Error),
    #[error("Blob properties serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
    #[error("Invalid properties version object: {0}")]
    InvalidVersion(String),
    #[error("Initialization error: {0}")]
    InitializationError(String),
}

impl StorageError {
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            StorageError::ObjectStoreError(object_store::Error::NotFound { .. })
        )
    }
}
