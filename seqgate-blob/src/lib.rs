//! Value types and pure decision logic for split-aware blob retrieval.
//!
//! Nothing in this crate performs I/O: it describes where blobs live
//! ([`identity`]), how a split blob addresses its chunks
//! ([`split_descriptor`]), what a client asked for ([`completeness`]) and
//! which chunks a target sequence needs ([`split_index`]).

pub mod completeness;
pub mod error;
pub mod identity;
pub mod properties;
pub mod split_descriptor;
pub mod split_index;

pub mod prelude {
    pub use crate::completeness::{CompletenessOption, CompletenessPolicy, Plan};
    pub use crate::error::{BlobError, BlobResult};
    pub use crate::identity::{BlobIdentity, Keyspace, KeyspaceRegistry};
    pub use crate::properties::{BlobFlags, BlobProperties};
    pub use crate::split_descriptor::{SplitDescriptor, SPLIT_INFO_CHUNK};
    pub use crate::split_index::{SplitIndex, SplitIndexAnalyzer};
}
