use seqgate_blob::{
    completeness::CompletenessOption,
    error::BlobResult,
    identity::{BlobIdentity, KeyspaceRegistry},
    split_descriptor::SplitDescriptor,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestTarget {
    /// A blob addressed by its storage key.
    Blob {
        blob: BlobIdentity,
        last_modified: Option<i64>,
    },
    /// One record of a split blob addressed by `(id2_info, id2_chunk)`.
    Id2Chunk {
        descriptor: SplitDescriptor,
        chunk: i32,
        blob: BlobIdentity,
    },
}

/// How the client got hold of the blob key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RequestOrigin {
    /// The client asked for this key explicitly.
    #[default]
    ExplicitKey,
    /// The key came out of sequence id resolution.
    Resolved,
}

#[derive(Debug, Clone)]
pub struct BlobRequest {
    pub target: RequestTarget,
    pub completeness: CompletenessOption,
    /// Empty disables resend suppression for this request.
    pub client_id: String,
    /// Resolved sequence the client is after, used for smart chunk selection.
    pub target_seq_id: Option<String>,
    pub send_blob_if_small: Option<u64>,
    pub origin: RequestOrigin,
}

impl BlobRequest {
    pub fn blob(blob: BlobIdentity, completeness: CompletenessOption) -> Self {
        Self {
            target: RequestTarget::Blob {
                blob,
                last_modified: None,
            },
            completeness,
            client_id: String::new(),
            target_seq_id: None,
            send_blob_if_small: None,
            origin: RequestOrigin::ExplicitKey,
        }
    }

    pub fn id2_chunk(
        registry: &KeyspaceRegistry,
        descriptor: SplitDescriptor,
        chunk: i32,
    ) -> BlobResult<Self> {
        let blob = descriptor.chunk_identity(registry, chunk)?;
        Ok(Self {
            target: RequestTarget::Id2Chunk {
                descriptor,
                chunk,
                blob,
            },
            completeness: CompletenessOption::Unknown,
            client_id: String::new(),
            target_seq_id: None,
            send_blob_if_small: None,
            origin: RequestOrigin::ExplicitKey,
        })
    }

    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = client_id.into();
        self
    }

    pub fn with_target_seq_id(mut self, seq_id: impl Into<String>) -> Self {
        self.target_seq_id = Some(seq_id.into());
        self
    }

    pub fn with_send_blob_if_small(mut self, size: u64) -> Self {
        self.send_blob_if_small = Some(size);
        self
    }

    pub fn with_last_modified(mut self, version: i64) -> Self {
        if let RequestTarget::Blob { last_modified, .. } = &mut self.target {
            *last_modified = Some(version);
        }
        self
    }

    pub fn with_origin(mut self, origin: RequestOrigin) -> Self {
        self.origin = origin;
        self
    }

    /// The identity the first properties fetch goes to.
    pub fn blob_identity(&self) -> &BlobIdentity {
        match &self.target {
            RequestTarget::Blob { blob, .. } | RequestTarget::Id2Chunk { blob, .. } => blob,
        }
    }

    /// Id2 chunk requests never take part in resend suppression.
    pub fn suppression_client_id(&self) -> &str {
        match self.target {
            RequestTarget::Blob { .. } => &self.client_id,
            RequestTarget::Id2Chunk { .. } => "",
        }
    }
}
