//! The `id2_info` split descriptor.
//!
//! A split blob is stored as one split-info record plus `chunk_count`
//! numbered chunks laid out on consecutive storage keys right below the
//! info key:
//!
//! ```text
//! key:   info-N ... info-2 info-1 | info
//! chunk:   1    ...  N-1     N    | SPLIT_INFO_CHUNK
//! ```
//!
//! The descriptor travels as a token `sat[/subsat].info_key.chunk_count[.split_version]`.

use std::{fmt::Display, str::FromStr};

use crate::{
    error::{BlobError, BlobResult},
    identity::{BlobIdentity, KeyspaceRegistry},
};

/// Chunk number addressing the split-info record itself.
pub const SPLIT_INFO_CHUNK: i32 = 999_999_999;

/// Largest chunk count accepted from an `id2_info` token. Expanding a split
/// blob issues one fetch per chunk, so the count must stay bounded.
pub const MAX_SPLIT_CHUNKS: i32 = 100_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SplitDescriptor {
    sat: i16,
    sub_sat: Option<i16>,
    info_key: i32,
    chunk_count: i32,
    split_version: Option<i32>,
}

impl SplitDescriptor {
    pub fn new(
        sat: i16,
        info_key: i32,
        chunk_count: i32,
        split_version: Option<i32>,
    ) -> BlobResult<Self> {
        let descriptor = Self {
            sat,
            sub_sat: None,
            info_key,
            chunk_count,
            split_version,
        };
        descriptor.validate(&descriptor.to_string())?;
        Ok(descriptor)
    }

    pub fn with_sub_sat(mut self, sub_sat: i16) -> Self {
        self.sub_sat = Some(sub_sat);
        self
    }

    pub fn sat(&self) -> i16 {
        self.sat
    }

    pub fn sub_sat(&self) -> Option<i16> {
        self.sub_sat
    }

    pub fn info_key(&self) -> i32 {
        self.info_key
    }

    pub fn chunk_count(&self) -> i32 {
        self.chunk_count
    }

    pub fn split_version(&self) -> Option<i32> {
        self.split_version
    }

    pub fn split_version_present(&self) -> bool {
        self.split_version.is_some()
    }

    /// Storage key of a chunk, `None` when the chunk number is out of range.
    pub fn storage_key_of(&self, chunk: i32) -> Option<i32> {
        if chunk == SPLIT_INFO_CHUNK {
            Some(self.info_key)
        } else if (1..=self.chunk_count).contains(&chunk) {
            Some(self.info_key - self.chunk_count - 1 + chunk)
        } else {
            None
        }
    }

    /// Numbered chunks, in order.
    pub fn chunks(&self) -> impl Iterator<Item = i32> {
        1..=self.chunk_count
    }

    pub fn chunk_identity(&self, registry: &KeyspaceRegistry, chunk: i32) -> BlobResult<BlobIdentity> {
        let key = self
            .storage_key_of(chunk)
            .ok_or_else(|| BlobError::malformed(&self.to_string(), format!("no chunk {chunk}")))?;
        registry.resolve(self.sat, key)
    }

    pub fn info_identity(&self, registry: &KeyspaceRegistry) -> BlobResult<BlobIdentity> {
        self.chunk_identity(registry, SPLIT_INFO_CHUNK)
    }

    fn validate(&self, token: &str) -> BlobResult<()> {
        if self.chunk_count < 0 {
            return Err(BlobError::malformed(token, "negative chunk count"));
        }
        if self.chunk_count > MAX_SPLIT_CHUNKS {
            return Err(BlobError::malformed(
                token,
                format!("chunk count exceeds {MAX_SPLIT_CHUNKS}"),
            ));
        }
        if self.info_key <= self.chunk_count {
            return Err(BlobError::malformed(
                token,
                "info key leaves no room for the chunk keys",
            ));
        }
        if self.info_key == SPLIT_INFO_CHUNK {
            return Err(BlobError::malformed(token, "info key collides with the split-info chunk number"));
        }
        Ok(())
    }
}

impl Display for SplitDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.sat)?;
        if let Some(sub_sat) = self.sub_sat {
            write!(f, "/{sub_sat}")?;
        }
        write!(f, ".{}.{}", self.info_key, self.chunk_count)?;
        if let Some(split_version) = self.split_version {
            write!(f, ".{split_version}")?;
        }
        Ok(())
    }
}

impl FromStr for SplitDescriptor {
    type Err = BlobError;

    fn from_str(token: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = token.split('.').collect();
        if parts.len() < 3 {
            return Err(BlobError::malformed(token, "expected at least 3 segments"));
        }
        if parts.len() > 4 {
            return Err(BlobError::malformed(token, "expected at most 4 segments"));
        }

        fn number<T: FromStr>(token: &str, segment: &str, what: &str) -> BlobResult<T> {
            segment
                .parse::<T>()
                .map_err(|_| BlobError::malformed(token, format!("{what} '{segment}' is not numeric")))
        }

        let (sat, sub_sat) = match parts[0].split_once('/') {
            Some((sat, sub_sat)) => (
                number::<i16>(token, sat, "sat")?,
                Some(number::<i16>(token, sub_sat, "subsat")?),
            ),
            None => (number::<i16>(token, parts[0], "sat")?, None),
        };
        let info_key = number::<i32>(token, parts[1], "info key")?;
        let chunk_count = number::<i32>(token, parts[2], "chunk count")?;
        let split_version = parts
            .get(3)
            .map(|segment| number::<i32>(token, segment, "split version"))
            .transpose()?;

        let descriptor = SplitDescriptor {
            sat,
            sub_sat,
            info_key,
            chunk_count,
            split_version,
        };
        descriptor.validate(token)?;
        Ok(descriptor)
    }
}
