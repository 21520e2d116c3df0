//! Per-request orchestration of split-aware blob retrieval.
//!
//! [`orchestrator::FetchOrchestrator`] is a reducer: it consumes
//! [`event::FetchEvent`]s and produces [`event::Effect`]s, without knowing
//! how fetches are executed. [`runtime::BlobRetrieval`] executes those
//! effects on tokio against a [`seqgate_storage::BlobStorage`] and feeds the
//! completions back, one request per event loop.

pub mod context;
pub mod error;
pub mod event;
pub mod fallback;
pub mod fetch;
pub mod orchestrator;
pub mod reply;
pub mod request;
pub mod runtime;

pub mod prelude {
    pub use crate::context::RetrievalContext;
    pub use crate::error::{ErrorKind, RetrievalError, RetrievalResult};
    pub use crate::orchestrator::{FetchOrchestrator, RequestOutcome, RequestState};
    pub use crate::reply::{ItemAddress, MessageCode, RecordingSink, ReplyItem, ReplyMessage, ReplySink, Severity};
    pub use crate::request::{BlobRequest, RequestOrigin, RequestTarget};
    pub use crate::runtime::BlobRetrieval;
}
