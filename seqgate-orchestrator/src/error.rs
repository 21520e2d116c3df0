use crate::request::RequestOrigin;

pub type RetrievalResult<T> = Result<T, RetrievalError>;

/// Failures of the request driver itself. Backend failures are not errors at
/// this level: they are classified and reported to the client.
#[derive(Debug, thiserror::Error)]
pub enum RetrievalError {
    #[error("Fetch event channel closed unexpectedly")]
    EventChannelClosed,
    #[error("Request stalled in state {0}: no fetch is running but the request is not finished")]
    Stalled(String),
}

/// Client-visible classification of backend outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    MalformedSplitDescriptor,
    Unauthorized,
    BackendTransport,
}

impl ErrorKind {
    pub fn status(&self, origin: RequestOrigin) -> u16 {
        match self {
            // a blob reached through resolution must exist, so its absence is a backend inconsistency
            ErrorKind::NotFound => match origin {
                RequestOrigin::ExplicitKey => 404,
                RequestOrigin::Resolved => 502,
            },
            ErrorKind::MalformedSplitDescriptor => 200,
            ErrorKind::Unauthorized => 403,
            ErrorKind::BackendTransport => 500,
        }
    }
}
