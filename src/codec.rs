//! Value codec
//!
//! The engine stores opaque byte payloads. Typed application values pass
//! through a `ValueCodec` on their way in and out.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::Result;

/// Turns typed values into payload bytes and back
pub trait ValueCodec: Send + Sync {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>>;

    fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T>;
}

/// Default codec backed by bincode
#[derive(Debug, Clone, Copy, Default)]
pub struct BincodeCodec;

impl ValueCodec for BincodeCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>> {
        Ok(bincode::serialize(value)?)
    }

    fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T> {
        Ok(bincode::deserialize(bytes)?)
    }
}
