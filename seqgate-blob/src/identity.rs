use std::{
    collections::HashMap,
    fmt::Display,
    hash::{Hash, Hasher},
    str::FromStr,
    sync::Arc,
};

use serde::{Deserialize, Serialize};

use crate::error::{BlobError, BlobResult};

/// A storage keyspace. Secure keyspaces hold blobs that were authorized
/// upstream, so confidential/withdrawn flags do not block delivery.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Keyspace {
    pub name: String,
    pub secure: bool,
}

/// Storage location of one blob.
///
/// Equality and hashing only consider `(sat, key)`; the keyspace is derived
/// from the sat and carried along for the storage driver.
#[derive(Debug, Clone)]
pub struct BlobIdentity {
    sat: i16,
    key: i32,
    keyspace: Arc<Keyspace>,
}

impl BlobIdentity {
    pub fn new(sat: i16, key: i32, keyspace: Arc<Keyspace>) -> Self {
        Self { sat, key, keyspace }
    }

    pub fn sat(&self) -> i16 {
        self.sat
    }

    pub fn key(&self) -> i32 {
        self.key
    }

    pub fn keyspace(&self) -> &Keyspace {
        &self.keyspace
    }

    pub fn is_secure(&self) -> bool {
        self.keyspace.secure
    }
}

impl PartialEq for BlobIdentity {
    fn eq(&self, other: &Self) -> bool {
        self.sat == other.sat && self.key == other.key
    }
}

impl Eq for BlobIdentity {}

impl Hash for BlobIdentity {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.sat.hash(state);
        self.key.hash(state);
    }
}

impl Display for BlobIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.sat, self.key)
    }
}

/// Maps sat numbers to keyspaces.
#[derive(Debug, Clone, Default)]
pub struct KeyspaceRegistry {
    keyspaces: HashMap<i16, Arc<Keyspace>>,
}

impl KeyspaceRegistry {
    /// Parses a `sat=keyspace[:secure]` list, e.g. `4=satncbi_extended,23=satsecure:secure`.
    pub fn from_mapping(mapping: &str) -> BlobResult<Self> {
        let mut registry = Self::default();
        for entry in mapping.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            let (sat, keyspace) = entry
                .split_once('=')
                .ok_or_else(|| BlobError::InvalidSatMapping(entry.to_string()))?;
            let sat = sat
                .trim()
                .parse::<i16>()
                .map_err(|_| BlobError::InvalidSatMapping(entry.to_string()))?;
            let (name, secure) = match keyspace.trim().split_once(':') {
                Some((name, "secure")) => (name, true),
                Some(_) => return Err(BlobError::InvalidSatMapping(entry.to_string())),
                None => (keyspace.trim(), false),
            };
            if name.is_empty() {
                return Err(BlobError::InvalidSatMapping(entry.to_string()));
            }
            registry.insert(sat, name, secure);
        }
        Ok(registry)
    }

    pub fn insert(&mut self, sat: i16, name: &str, secure: bool) {
        self.keyspaces.insert(
            sat,
            Arc::new(Keyspace {
                name: name.to_string(),
                secure,
            }),
        );
    }

    pub fn keyspace(&self, sat: i16) -> Option<Arc<Keyspace>> {
        self.keyspaces.get(&sat).cloned()
    }

    pub fn resolve(&self, sat: i16, key: i32) -> BlobResult<BlobIdentity> {
        let keyspace = self.keyspace(sat).ok_or(BlobError::UnknownSat(sat))?;
        Ok(BlobIdentity::new(sat, key, keyspace))
    }

    /// Parses a client supplied `<sat>.<key>` blob id.
    pub fn parse_blob_id(&self, blob_id: &str) -> BlobResult<BlobIdentity> {
        let BlobId { sat, key } = blob_id.parse()?;
        self.resolve(sat, key)
    }
}

/// Unresolved `<sat>.<key>` pair as it appears on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlobId {
    pub sat: i16,
    pub key: i32,
}

impl FromStr for BlobId {
    type Err = BlobError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || BlobError::InvalidBlobId(s.to_string());
        let (sat, key) = s.trim().split_once('.').ok_or_else(invalid)?;
        Ok(BlobId {
            sat: sat.parse().map_err(|_| invalid())?,
            key: key.parse().map_err(|_| invalid())?,
        })
    }
}
