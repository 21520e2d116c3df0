//! PSG framing of reply items onto an HTTP body.
//!
//! Every item is one header line followed by `size` payload bytes:
//!
//! ```text
//! PSG-Reply-Chunk: item_id=1&item_type=blob&chunk_type=data&size=5&blob_chunk=0&blob_id=4.10
//! hello
//! ```

use std::{collections::HashMap, convert::Infallible};

use bytes::{BufMut, Bytes, BytesMut};
use futures::channel::mpsc;
use seqgate_orchestrator::reply::{ItemAddress, ReplyMessage, ReplySink, Severity};

pub type FrameStream = mpsc::UnboundedReceiver<Result<Bytes, Infallible>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum ItemType {
    BlobProp,
    Blob,
}

impl ItemType {
    fn as_str(self) -> &'static str {
        match self {
            ItemType::BlobProp => "blob_prop",
            ItemType::Blob => "blob",
        }
    }
}

#[derive(Debug)]
pub struct PsgReplySink {
    frames: mpsc::UnboundedSender<Result<Bytes, Infallible>>,
    item_ids: HashMap<(ItemAddress, ItemType), u32>,
    next_item_id: u32,
    chunks_sent: u32,
}

impl PsgReplySink {
    pub fn channel() -> (Self, FrameStream) {
        let (frames, stream) = mpsc::unbounded();
        (
            Self {
                frames,
                item_ids: HashMap::new(),
                next_item_id: 1,
                chunks_sent: 0,
            },
            stream,
        )
    }

    fn item_id(&mut self, address: &ItemAddress, item_type: ItemType) -> u32 {
        let next = &mut self.next_item_id;
        *self
            .item_ids
            .entry((address.clone(), item_type))
            .or_insert_with(|| {
                let id = *next;
                *next += 1;
                id
            })
    }

    fn send_item(
        &mut self,
        address: Option<&ItemAddress>,
        item_type: &str,
        item_id: u32,
        chunk_type: &str,
        extra: &str,
        payload: &[u8],
    ) {
        let mut header = format!(
            "PSG-Reply-Chunk: item_id={item_id}&item_type={item_type}&chunk_type={chunk_type}&size={}",
            payload.len()
        );
        header.push_str(extra);
        if let Some(address) = address {
            header.push_str(&address_fields(address));
        }
        header.push('\n');

        let mut frame = BytesMut::with_capacity(header.len() + payload.len());
        frame.put_slice(header.as_bytes());
        frame.put_slice(payload);
        self.chunks_sent += 1;
        // an error only means the client is gone; is_closed reports it
        let _ = self.frames.unbounded_send(Ok(frame.freeze()));
    }
}

fn address_fields(address: &ItemAddress) -> String {
    match address {
        ItemAddress::Blob(blob) => format!("&blob_id={blob}"),
        ItemAddress::Id2Chunk {
            id2_chunk,
            id2_info,
        } => format!("&id2_chunk={id2_chunk}&id2_info={id2_info}"),
    }
}

fn severity(severity: Severity) -> &'static str {
    match severity {
        Severity::Info => "info",
        Severity::Warning => "warning",
        Severity::Error => "error",
    }
}

impl ReplySink for PsgReplySink {
    fn prepare_properties(&mut self, address: &ItemAddress, payload: Bytes) {
        let item_id = self.item_id(address, ItemType::BlobProp);
        self.send_item(Some(address), ItemType::BlobProp.as_str(), item_id, "data", "", &payload);
    }

    fn prepare_properties_completion(&mut self, address: &ItemAddress) {
        let item_id = self.item_id(address, ItemType::BlobProp);
        self.send_item(
            Some(address),
            ItemType::BlobProp.as_str(),
            item_id,
            "meta",
            "&n_chunks=2",
            &[],
        );
    }

    fn prepare_data(&mut self, address: &ItemAddress, bytes: Bytes, chunk_seq: u32) {
        let item_id = self.item_id(address, ItemType::Blob);
        self.send_item(
            Some(address),
            ItemType::Blob.as_str(),
            item_id,
            "data",
            &format!("&blob_chunk={chunk_seq}"),
            &bytes,
        );
    }

    fn prepare_data_completion(&mut self, address: &ItemAddress, chunks: u32) {
        let item_id = self.item_id(address, ItemType::Blob);
        self.send_item(
            Some(address),
            ItemType::Blob.as_str(),
            item_id,
            "meta",
            &format!("&n_chunks={}", chunks + 1),
            &[],
        );
    }

    fn prepare_message(&mut self, message: &ReplyMessage) {
        // messages about one blob join that blob's item, the rest go to the reply item
        let (item_type, item_id) = match &message.address {
            Some(address) => (ItemType::Blob.as_str(), self.item_id(address, ItemType::Blob)),
            None => ("reply", 0),
        };
        let extra = format!(
            "&severity={}&code={}&status={}",
            severity(message.severity),
            message.code.code(),
            message.status
        );
        self.send_item(
            message.address.as_ref(),
            item_type,
            item_id,
            "message",
            &extra,
            message.text.as_bytes(),
        );
    }

    fn prepare_reply_completion(&mut self, status: u16) {
        let n_chunks = self.chunks_sent + 1;
        self.send_item(
            None,
            "reply",
            0,
            "meta",
            &format!("&n_chunks={n_chunks}&status={status}"),
            &[],
        );
        self.frames.close_channel();
    }

    fn is_closed(&self) -> bool {
        self.frames.is_closed()
    }
}
