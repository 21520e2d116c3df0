//! The per-request fetch list.
//!
//! Every asynchronous operation a request starts gets one [`FetchRecord`] in
//! a [`FetchList`] owned by that request. Records are never removed; a
//! request is drained once all of them are finished.

use std::fmt::Display;

use seqgate_blob::identity::BlobIdentity;

use crate::reply::ItemAddress;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FetchId(usize);

impl Display for FetchId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchKind {
    Properties,
    Data,
    PublicComment,
}

/// The part of the reply a fetch contributes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchRole {
    /// The requested blob, or the requested id2 chunk.
    Main,
    SplitInfo,
    Chunk(i32),
    /// The original blob fetched after abandoning the split path.
    Fallback,
}

impl FetchRole {
    pub fn is_split(&self) -> bool {
        matches!(self, FetchRole::SplitInfo | FetchRole::Chunk(_))
    }
}

#[derive(Debug, Clone)]
pub struct FetchRecord {
    pub target: BlobIdentity,
    pub kind: FetchKind,
    pub role: FetchRole,
    pub address: ItemAddress,
    pub finished: bool,
    /// Finished without its outcome being forwarded to the client.
    pub discarded: bool,
    pub bytes_delivered: u64,
    pub data_chunks: u32,
}

impl FetchRecord {
    pub fn new(target: BlobIdentity, kind: FetchKind, role: FetchRole, address: ItemAddress) -> Self {
        Self {
            target,
            kind,
            role,
            address,
            finished: false,
            discarded: false,
            bytes_delivered: 0,
            data_chunks: 0,
        }
    }
}

#[derive(Debug, Default)]
pub struct FetchList {
    records: Vec<FetchRecord>,
}

impl FetchList {
    pub fn push(&mut self, record: FetchRecord) -> FetchId {
        self.records.push(record);
        FetchId(self.records.len() - 1)
    }

    pub fn get(&self, id: FetchId) -> Option<&FetchRecord> {
        self.records.get(id.0)
    }

    pub fn get_mut(&mut self, id: FetchId) -> Option<&mut FetchRecord> {
        self.records.get_mut(id.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (FetchId, &FetchRecord)> {
        self.records
            .iter()
            .enumerate()
            .map(|(index, record)| (FetchId(index), record))
    }

    /// Scans the whole list; records may be appended after others finished.
    pub fn is_drained(&self) -> bool {
        self.records.iter().all(|record| record.finished)
    }

    pub fn unfinished(&self) -> Vec<FetchId> {
        self.iter()
            .filter(|(_, record)| !record.finished)
            .map(|(id, _)| id)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
