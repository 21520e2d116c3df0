//! The reply-sink interface.
//!
//! For every blob or chunk the sink sees, in order: properties, properties
//! completion, zero or more data pieces, data completion. Items of different
//! blobs interleave freely; the [`ItemAddress`] tells them apart.

use std::fmt::Display;

use bytes::Bytes;
use seqgate_blob::identity::BlobIdentity;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ItemAddress {
    Blob(BlobIdentity),
    /// A record of a split blob: a numbered chunk or the split info.
    Id2Chunk { id2_chunk: i32, id2_info: String },
}

impl Display for ItemAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ItemAddress::Blob(blob) => write!(f, "blob {blob}"),
            ItemAddress::Id2Chunk {
                id2_chunk,
                id2_info,
            } => write!(f, "id2_info {id2_info} chunk {id2_chunk}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// Stable message codes reported to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageCode {
    BlobNotFound = 300,
    MalformedSplitInfo = 301,
    Unauthorized = 302,
    BackendError = 303,
    BlobInProgress = 304,
    BlobSentRecently = 305,
    FallbackToOriginal = 306,
    FallbackAlreadyRequested = 307,
    SmartSelectionUnavailable = 308,
    PublicComment = 309,
    RequestCancelled = 310,
}

impl MessageCode {
    pub fn code(self) -> u32 {
        self as u32
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyMessage {
    pub address: Option<ItemAddress>,
    pub severity: Severity,
    pub code: MessageCode,
    pub status: u16,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyItem {
    Properties {
        address: ItemAddress,
        payload: Bytes,
    },
    PropertiesCompletion {
        address: ItemAddress,
    },
    Data {
        address: ItemAddress,
        bytes: Bytes,
        chunk_seq: u32,
    },
    DataCompletion {
        address: ItemAddress,
        chunks: u32,
    },
    Message(ReplyMessage),
    Completion {
        status: u16,
    },
}

impl ReplyItem {
    pub fn send_to(self, sink: &mut dyn ReplySink) {
        match self {
            ReplyItem::Properties { address, payload } => sink.prepare_properties(&address, payload),
            ReplyItem::PropertiesCompletion { address } => {
                sink.prepare_properties_completion(&address)
            }
            ReplyItem::Data {
                address,
                bytes,
                chunk_seq,
            } => sink.prepare_data(&address, bytes, chunk_seq),
            ReplyItem::DataCompletion { address, chunks } => {
                sink.prepare_data_completion(&address, chunks)
            }
            ReplyItem::Message(message) => sink.prepare_message(&message),
            ReplyItem::Completion { status } => sink.prepare_reply_completion(status),
        }
    }
}

pub trait ReplySink: Send {
    fn prepare_properties(&mut self, address: &ItemAddress, payload: Bytes);
    fn prepare_properties_completion(&mut self, address: &ItemAddress);
    fn prepare_data(&mut self, address: &ItemAddress, bytes: Bytes, chunk_seq: u32);
    fn prepare_data_completion(&mut self, address: &ItemAddress, chunks: u32);
    fn prepare_message(&mut self, message: &ReplyMessage);
    fn prepare_reply_completion(&mut self, status: u16);

    /// The client went away; the request should be cancelled.
    fn is_closed(&self) -> bool {
        false
    }
}

/// Keeps every item in order.
#[derive(Debug, Default)]
pub struct RecordingSink {
    pub items: Vec<ReplyItem>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Concatenated data sent for `address`.
    pub fn data_for(&self, address: &ItemAddress) -> Vec<u8> {
        self.items
            .iter()
            .filter_map(|item| match item {
                ReplyItem::Data { address: a, bytes, .. } if a == address => Some(bytes.as_ref()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .concat()
    }

    pub fn messages(&self) -> Vec<&ReplyMessage> {
        self.items
            .iter()
            .filter_map(|item| match item {
                ReplyItem::Message(message) => Some(message),
                _ => None,
            })
            .collect()
    }

    pub fn has_message(&self, code: MessageCode) -> bool {
        self.messages().iter().any(|m| m.code == code)
    }

    pub fn completion_status(&self) -> Option<u16> {
        self.items.iter().find_map(|item| match item {
            ReplyItem::Completion { status } => Some(*status),
            _ => None,
        })
    }

    /// Addresses that received a data completion, in order.
    pub fn completed_addresses(&self) -> Vec<&ItemAddress> {
        self.items
            .iter()
            .filter_map(|item| match item {
                ReplyItem::DataCompletion { address, .. } => Some(address),
                _ => None,
            })
            .collect()
    }
}

impl ReplySink for RecordingSink {
    fn prepare_properties(&mut self, address: &ItemAddress, payload: Bytes) {
        self.items.push(ReplyItem::Properties {
            address: address.clone(),
            payload,
        });
    }

    fn prepare_properties_completion(&mut self, address: &ItemAddress) {
        self.items.push(ReplyItem::PropertiesCompletion {
            address: address.clone(),
        });
    }

    fn prepare_data(&mut self, address: &ItemAddress, bytes: Bytes, chunk_seq: u32) {
        self.items.push(ReplyItem::Data {
            address: address.clone(),
            bytes,
            chunk_seq,
        });
    }

    fn prepare_data_completion(&mut self, address: &ItemAddress, chunks: u32) {
        self.items.push(ReplyItem::DataCompletion {
            address: address.clone(),
            chunks,
        });
    }

    fn prepare_message(&mut self, message: &ReplyMessage) {
        self.items.push(ReplyItem::Message(message.clone()));
    }

    fn prepare_reply_completion(&mut self, status: u16) {
        self.items.push(ReplyItem::Completion { status });
    }
}
