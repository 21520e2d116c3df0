pub type BlobResult<T> = std::result::Result<T, BlobError>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BlobError {
    #[error("Malformed id2_info '{token}': {reason}")]
    MalformedSplitDescriptor { token: String, reason: String },
    #[error("Invalid blob id '{0}', expected <sat>.<key>")]
    InvalidBlobId(String),
    #[error("Sat {0} is not mapped to any keyspace")]
    UnknownSat(i16),
    #[error("Invalid sat mapping entry '{0}'")]
    InvalidSatMapping(String),
    #[error("Split index cannot be used: target sequence was not resolved")]
    NoIndex,
    #[error("Failed to decode split index: {0}")]
    SplitIndexDecode(String),
    #[error("Unknown completeness option '{0}'")]
    UnknownCompletenessOption(String),
}

impl BlobError {
    pub(crate) fn malformed(token: &str, reason: impl Into<String>) -> Self {
        BlobError::MalformedSplitDescriptor {
            token: token.to_string(),
            reason: reason.into(),
        }
    }
}
