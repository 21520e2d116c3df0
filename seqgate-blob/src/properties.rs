use serde::{Deserialize, Serialize};

use crate::split_descriptor::SplitDescriptor;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobFlags {
    #[serde(default)]
    pub confidential: bool,
    #[serde(default)]
    pub withdrawn: bool,
    #[serde(default)]
    pub suppressed: bool,
}

/// Blob property record as stored next to the blob data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobProperties {
    pub sat: i16,
    pub key: i32,
    /// Milliseconds since the epoch, identifies the blob version.
    pub last_modified: i64,
    /// Size of the blob data in bytes. For split blobs, the size of the whole entry.
    pub size: u64,
    #[serde(default)]
    pub flags: BlobFlags,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id2_info: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

impl BlobProperties {
    pub fn new(sat: i16, key: i32, last_modified: i64, size: u64) -> Self {
        Self {
            sat,
            key,
            last_modified,
            size,
            flags: BlobFlags::default(),
            id2_info: None,
            username: None,
        }
    }

    pub fn with_split(mut self, descriptor: &SplitDescriptor) -> Self {
        self.id2_info = Some(descriptor.to_string());
        self
    }

    pub fn with_flags(mut self, flags: BlobFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn is_restricted(&self) -> bool {
        self.flags.confidential || self.flags.withdrawn
    }

    pub fn to_json(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }
}
