//! The switch from the split path to the original blob.

use std::{collections::HashSet, fmt::Display};

use seqgate_blob::identity::BlobIdentity;

use crate::{
    fetch::FetchRecord,
    reply::{ItemAddress, MessageCode, ReplyMessage, Severity},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackTrigger {
    /// The caller must issue the original blob fetch.
    FirstTime,
    AlreadyRequested,
}

/// Why a split fetch gave up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FallbackCause {
    NotFound,
    Transport(String),
    Unauthorized,
    SplitIndex(String),
}

impl FallbackCause {
    pub fn status(&self) -> u16 {
        match self {
            FallbackCause::NotFound => 404,
            FallbackCause::Unauthorized => 403,
            FallbackCause::Transport(_) | FallbackCause::SplitIndex(_) => 500,
        }
    }
}

impl Display for FallbackCause {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FallbackCause::NotFound => write!(f, "split chunk not found"),
            FallbackCause::Transport(err) => write!(f, "split chunk fetch failed: {err}"),
            FallbackCause::Unauthorized => write!(f, "split chunk is not authorized"),
            FallbackCause::SplitIndex(err) => write!(f, "split index could not be decoded: {err}"),
        }
    }
}

/// One per request. Once triggered, split fetches of the request are
/// abandoned in favour of a single fetch of the original blob.
#[derive(Debug, Default)]
pub struct FallbackController {
    triggered: bool,
    requested_split: HashSet<BlobIdentity>,
}

impl FallbackController {
    pub fn register_split(&mut self, blob: BlobIdentity) {
        self.requested_split.insert(blob);
    }

    pub fn is_triggered(&self) -> bool {
        self.triggered
    }

    pub fn trigger(&mut self) -> FallbackTrigger {
        if std::mem::replace(&mut self.triggered, true) {
            FallbackTrigger::AlreadyRequested
        } else {
            FallbackTrigger::FirstTime
        }
    }

    /// An unfinished split fetch that has not sent any data yet can be dropped
    /// silently; one that has must be left to finish its own stream.
    pub fn redirectable(&self, record: &FetchRecord) -> bool {
        record.role.is_split()
            && !record.finished
            && record.bytes_delivered == 0
            && self.requested_split.contains(&record.target)
    }

    pub fn diagnostic(
        &self,
        trigger: FallbackTrigger,
        cause: &FallbackCause,
        address: Option<ItemAddress>,
        original: &BlobIdentity,
    ) -> ReplyMessage {
        let (code, text) = match trigger {
            FallbackTrigger::FirstTime => (
                MessageCode::FallbackToOriginal,
                format!("{cause}; falling back to original blob {original}"),
            ),
            FallbackTrigger::AlreadyRequested => (
                MessageCode::FallbackAlreadyRequested,
                format!("{cause}; fallback to original blob {original} already requested"),
            ),
        };
        ReplyMessage {
            address,
            severity: Severity::Warning,
            code,
            status: cause.status(),
            text,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use seqgate_blob::identity::Keyspace;

    use super::*;
    use crate::fetch::{FetchKind, FetchRole};

    fn blob(key: i32) -> BlobIdentity {
        BlobIdentity::new(4, key, Arc::new(Keyspace { name: "ks".into(), secure: false }))
    }

    fn chunk_record(key: i32, chunk: i32) -> FetchRecord {
        FetchRecord::new(
            blob(key),
            FetchKind::Data,
            FetchRole::Chunk(chunk),
            ItemAddress::Id2Chunk { id2_chunk: chunk, id2_info: "4.10.3".into() },
        )
    }

    #[test]
    fn trigger_latches_once() {
        let mut controller = FallbackController::default();
        assert!(!controller.is_triggered());
        assert_eq!(controller.trigger(), FallbackTrigger::FirstTime);
        assert_eq!(controller.trigger(), FallbackTrigger::AlreadyRequested);
        assert!(controller.is_triggered());
    }

    #[test]
    fn only_zero_byte_split_fetches_are_redirectable() {
        let mut controller = FallbackController::default();
        controller.register_split(blob(7));
        controller.register_split(blob(8));

        let idle = chunk_record(7, 1);
        let mut streaming = chunk_record(8, 2);
        streaming.bytes_delivered = 12;
        let main = FetchRecord::new(blob(10), FetchKind::Data, FetchRole::Main, ItemAddress::Blob(blob(10)));

        assert!(controller.redirectable(&idle));
        assert!(!controller.redirectable(&streaming));
        assert!(!controller.redirectable(&main));
    }

    #[test]
    fn diagnostic_codes_differ_by_trigger() {
        let controller = FallbackController::default();
        let first = controller.diagnostic(FallbackTrigger::FirstTime, &FallbackCause::NotFound, None, &blob(10));
        let again = controller.diagnostic(
            FallbackTrigger::AlreadyRequested,
            &FallbackCause::Transport("timeout".into()),
            None,
            &blob(10),
        );
        assert_eq!(first.code, MessageCode::FallbackToOriginal);
        assert_eq!(first.status, 404);
        assert_eq!(again.code, MessageCode::FallbackAlreadyRequested);
        assert_eq!(again.status, 500);
        assert!(again.text.contains("timeout"));
        assert_eq!(first.severity, Severity::Warning);
    }
}
