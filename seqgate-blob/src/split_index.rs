//! Split-info payload decoding and smart chunk selection.

use indexmap::IndexMap;
use serde::Deserialize;

use crate::{
    error::{BlobError, BlobResult},
    split_descriptor::SplitDescriptor,
};

#[derive(Debug, Deserialize)]
struct SplitInfoDocument {
    chunks: Vec<ChunkContent>,
}

#[derive(Debug, Deserialize)]
struct ChunkContent {
    chunk: i32,
    #[serde(default)]
    seq_ids: Vec<String>,
}

/// Which chunks carry data for which sequence.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SplitIndex {
    by_seq_id: IndexMap<String, Vec<i32>>,
}

impl SplitIndex {
    /// Decodes the split-info record payload.
    ///
    /// This is CPU bound for large entries; callers on an async runtime should
    /// run it on a blocking thread.
    pub fn decode(payload: &[u8]) -> BlobResult<Self> {
        let document: SplitInfoDocument = serde_json::from_slice(payload)
            .map_err(|err| BlobError::SplitIndexDecode(err.to_string()))?;

        let mut index = SplitIndex::default();
        for content in document.chunks {
            for seq_id in content.seq_ids {
                index.add(seq_id.trim(), content.chunk);
            }
        }
        for chunks in index.by_seq_id.values_mut() {
            chunks.sort_unstable();
            chunks.dedup();
        }
        Ok(index)
    }

    fn add(&mut self, seq_id: &str, chunk: i32) {
        self.by_seq_id
            .entry(seq_id.to_string())
            .or_default()
            .push(chunk);
    }

    pub fn chunks_for(&self, seq_id: &str) -> Option<&[i32]> {
        self.by_seq_id.get(seq_id.trim()).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.by_seq_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_seq_id.is_empty()
    }
}

impl<S: AsRef<str>> FromIterator<(S, i32)> for SplitIndex {
    fn from_iter<T: IntoIterator<Item = (S, i32)>>(iter: T) -> Self {
        let mut index = SplitIndex::default();
        for (seq_id, chunk) in iter {
            index.add(seq_id.as_ref(), chunk);
        }
        for chunks in index.by_seq_id.values_mut() {
            chunks.sort_unstable();
            chunks.dedup();
        }
        index
    }
}

pub struct SplitIndexAnalyzer;

impl SplitIndexAnalyzer {
    /// The numbered chunks needed to reconstruct `target`, ascending.
    ///
    /// An unresolved target is an error; a target the index does not mention
    /// needs no chunks beyond the split info.
    pub fn compute_needed_chunks(
        index: &SplitIndex,
        target: Option<&str>,
        descriptor: &SplitDescriptor,
    ) -> BlobResult<Vec<i32>> {
        let seq_id = target
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(BlobError::NoIndex)?;

        let Some(chunks) = index.chunks_for(seq_id) else {
            tracing::debug!(seq_id, id2_info = %descriptor, "target not present in split index");
            return Ok(vec![]);
        };

        let (needed, out_of_range): (Vec<i32>, Vec<i32>) = chunks
            .iter()
            .copied()
            .partition(|chunk| (1..=descriptor.chunk_count()).contains(chunk));
        if !out_of_range.is_empty() {
            tracing::warn!(
                seq_id,
                id2_info = %descriptor,
                ?out_of_range,
                "split index references chunks outside the descriptor"
            );
        }
        Ok(needed)
    }
}
