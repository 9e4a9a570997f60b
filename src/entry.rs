//! Entry definitions
//!
//! The record shared by the MemTable, WAL and SSTables, and the three-way
//! outcome of a lookup.

use serde::{Deserialize, Serialize};

use crate::error::{Result, StrataError};

/// A single key-value record, or a tombstone when `deleted` is set
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub key: String,
    pub payload: Vec<u8>,
    pub deleted: bool,
}

impl Entry {
    /// A live value
    pub fn new(key: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            key: key.into(),
            payload: payload.into(),
            deleted: false,
        }
    }

    /// A tombstone (deleted key, empty payload)
    pub fn tombstone(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            payload: Vec::new(),
            deleted: true,
        }
    }

    /// Serialize to the on-disk record format
    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    /// Deserialize from the on-disk record format
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        Ok(bincode::deserialize(bytes)?)
    }

    /// The lookup answer this entry gives for its key
    pub fn to_lookup(&self) -> Lookup {
        if self.deleted {
            Lookup::Tombstoned
        } else {
            Lookup::Found(self.payload.clone())
        }
    }
}

/// Outcome of a point lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    /// Key has a live value
    Found(Vec<u8>),

    /// Key was never written (or has been purged)
    NotFound,

    /// Key was deleted; shadows any older value
    Tombstoned,
}

impl Lookup {
    pub fn is_found(&self) -> bool {
        matches!(self, Lookup::Found(_))
    }

    /// Borrow the payload of a `Found` result
    pub fn value(&self) -> Option<&[u8]> {
        match self {
            Lookup::Found(v) => Some(v),
            _ => None,
        }
    }

    /// Convert into the payload, mapping absence to a typed error
    pub fn into_value(self) -> Result<Vec<u8>> {
        match self {
            Lookup::Found(v) => Ok(v),
            Lookup::NotFound => Err(StrataError::KeyNotFound),
            Lookup::Tombstoned => Err(StrataError::KeyTombstoned),
        }
    }
}
