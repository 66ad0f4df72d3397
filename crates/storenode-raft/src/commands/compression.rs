//! Payload compression for log entries

use std::io::{Read, Write};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;

use crate::RaftError;

/// Gzip-compress `data`
pub fn compress(data: &[u8]) -> Result<Vec<u8>, RaftError> {
    let mut encoder = GzEncoder::new(Vec::with_capacity(data.len() / 2 + 32), Compression::default());
    encoder
        .write_all(data)
        .map_err(|e| RaftError::Serialization(format!("Failed to compress payload: {}", e)))?;
    encoder
        .finish()
        .map_err(|e| RaftError::Serialization(format!("Failed to compress payload: {}", e)))
}

/// Reverse of [`compress`]
pub fn decompress(data: &[u8]) -> Result<Vec<u8>, RaftError> {
    let mut decoder = GzDecoder::new(data);
    let mut out = Vec::new();
    decoder
        .read_to_end(&mut out)
        .map_err(|e| RaftError::Serialization(format!("Failed to decompress payload: {}", e)))?;
    Ok(out)
}
