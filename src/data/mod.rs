use std::fs;
use std::io::Cursor;
use std::path::Path;

use bincode::ErrorKind;
use log::debug;
use thiserror::Error;

use crate::catalogue::SystemCatalogue;

/// Compression level used when encoding serialized catalogue data.
///
/// Catalogue files hold tens of millions of coordinates for a full galaxy
/// dump, so size matters more than encode time.
const CATALOGUE_COMPRESSION_LEVEL: i32 = 19;

#[derive(Debug, Error)]
pub enum DataError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialize(#[from] Box<ErrorKind>),
    #[error("Compression error: {0}")]
    Compression(#[source] std::io::Error),
}

pub fn serialize_catalogue(catalogue: &SystemCatalogue) -> Result<Vec<u8>, DataError> {
    let encoded = bincode::serialize(catalogue)?;
    let mut cursor = Cursor::new(encoded);
    zstd::stream::encode_all(&mut cursor, CATALOGUE_COMPRESSION_LEVEL)
        .map_err(DataError::Compression)
}

pub fn deserialize_catalogue(bytes: &[u8]) -> Result<SystemCatalogue, DataError> {
    let mut cursor = Cursor::new(bytes);
    let decoded = zstd::stream::decode_all(&mut cursor).map_err(DataError::Compression)?;
    let mut catalogue: SystemCatalogue = bincode::deserialize(&decoded)?;
    catalogue.rebuild_indices();
    debug!("decoded catalogue with {} systems", catalogue.len());
    Ok(catalogue)
}

pub fn write_catalogue_to_file<P: AsRef<Path>>(
    catalogue: &SystemCatalogue,
    path: P,
) -> Result<(), DataError> {
    let bytes = serialize_catalogue(catalogue)?;
    fs::write(path, bytes)?;
    Ok(())
}

pub fn read_catalogue_from_file<P: AsRef<Path>>(path: P) -> Result<SystemCatalogue, DataError> {
    let bytes = fs::read(path)?;
    deserialize_catalogue(&bytes)
}
