//! Payload codec.
//!
//! Entity payloads are opaque JSON to the engine. They are serialized with
//! `serde_json` (object keys sorted, so encoding is deterministic) and then
//! passed through a pluggable [`Compression`] byte transform.

use std::io::{Read, Write};
use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

/// Default zstd compression level.
pub const DEFAULT_ZSTD_LEVEL: i32 = 3;

/// Errors from payload encoding and decoding.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("corrupt payload: {0}")]
    Corrupt(String),
    #[error("encode failed: {0}")]
    Encode(String),
}

/// Reversible byte transform applied to serialized payloads.
pub trait Compression: Send + Sync {
    fn compress(&self, data: &[u8]) -> Result<Vec<u8>, CodecError>;
    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>, CodecError>;
}

/// zstd streaming compression.
#[derive(Debug, Clone, Copy)]
pub struct ZstdCompression {
    level: i32,
}

impl ZstdCompression {
    pub fn new(level: i32) -> Self {
        Self { level }
    }
}

impl Default for ZstdCompression {
    fn default() -> Self {
        Self::new(DEFAULT_ZSTD_LEVEL)
    }
}

impl Compression for ZstdCompression {
    fn compress(&self, data: &[u8]) -> Result<Vec<u8>, CodecError> {
        let mut encoder = zstd::Encoder::new(Vec::new(), self.level)
            .map_err(|e| CodecError::Encode(e.to_string()))?;
        encoder
            .write_all(data)
            .map_err(|e| CodecError::Encode(e.to_string()))?;
        encoder.finish().map_err(|e| CodecError::Encode(e.to_string()))
    }

    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>, CodecError> {
        let mut decoder =
            zstd::Decoder::new(data).map_err(|e| CodecError::Corrupt(e.to_string()))?;
        let mut buf = Vec::new();
        decoder
            .read_to_end(&mut buf)
            .map_err(|e| CodecError::Corrupt(e.to_string()))?;
        Ok(buf)
    }
}

/// Passthrough transform. Payloads are stored as plain JSON bytes.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCompression;

impl Compression for NoCompression {
    fn compress(&self, data: &[u8]) -> Result<Vec<u8>, CodecError> {
        Ok(data.to_vec())
    }

    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>, CodecError> {
        Ok(data.to_vec())
    }
}

/// Compression algorithm discriminator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionType {
    #[default]
    Zstd,
    None,
}

/// Codec configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CodecConfig {
    pub compression: CompressionType,
    /// zstd level; ignored for `none`.
    pub level: i32,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            compression: CompressionType::Zstd,
            level: DEFAULT_ZSTD_LEVEL,
        }
    }
}

/// JSON payload codec over a pluggable compression transform.
#[derive(Clone)]
pub struct PayloadCodec {
    compression: Arc<dyn Compression>,
}

impl PayloadCodec {
    pub fn new(compression: Arc<dyn Compression>) -> Self {
        Self { compression }
    }

    pub fn from_config(config: &CodecConfig) -> Self {
        match config.compression {
            CompressionType::Zstd => Self::new(Arc::new(ZstdCompression::new(config.level))),
            CompressionType::None => Self::new(Arc::new(NoCompression)),
        }
    }

    /// Serialize and compress a payload.
    pub fn compress(&self, payload: &Value) -> Result<Vec<u8>, CodecError> {
        let raw = serde_json::to_vec(payload).map_err(|e| CodecError::Encode(e.to_string()))?;
        self.compression.compress(&raw)
    }

    /// Decompress and parse a payload.
    pub fn decompress(&self, bytes: &[u8]) -> Result<Value, CodecError> {
        let raw = self.compression.decompress(bytes)?;
        serde_json::from_slice(&raw).map_err(|e| CodecError::Corrupt(e.to_string()))
    }
}

impl Default for PayloadCodec {
    fn default() -> Self {
        Self::new(Arc::new(ZstdCompression::default()))
    }
}

impl std::fmt::Debug for PayloadCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PayloadCodec").finish_non_exhaustive()
    }
}
