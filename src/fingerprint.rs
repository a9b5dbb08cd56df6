//! Content identity values for mod files
//!
//! Two different values identify a jar remotely: its SHA-1 hash, which
//! Modrinth indexes, and CurseForge's fingerprint, a MurmurHash2 variant
//! computed over the file with whitespace bytes removed.

use crate::{Error, Result};
use sha1::{Digest, Sha1};
use std::fs::{self, File};
use std::io::Read;
use std::path::Path;

const MULTIPLEX: u32 = 1_540_483_477;

fn is_whitespace(b: u8) -> bool {
    matches!(b, 9 | 10 | 13 | 32)
}

/// CurseForge fingerprint of raw file contents
pub fn fingerprint(bytes: &[u8]) -> u32 {
    let normalized_length = bytes.iter().filter(|b| !is_whitespace(**b)).count() as u32;

    let mut hash: u32 = 1 ^ normalized_length;
    let mut block: u32 = 0;
    let mut shift: u32 = 0;

    for &b in bytes.iter().filter(|b| !is_whitespace(**b)) {
        block |= (b as u32) << shift;
        shift += 8;
        if shift == 32 {
            let k = block.wrapping_mul(MULTIPLEX);
            let k = (k ^ (k >> 24)).wrapping_mul(MULTIPLEX);
            hash = hash.wrapping_mul(MULTIPLEX) ^ k;
            block = 0;
            shift = 0;
        }
    }

    if shift > 0 {
        hash = (hash ^ block).wrapping_mul(MULTIPLEX);
    }

    let hash = (hash ^ (hash >> 13)).wrapping_mul(MULTIPLEX);
    hash ^ (hash >> 15)
}

/// CurseForge fingerprint of a file on disk
pub fn fingerprint_file<P: AsRef<Path>>(path: P) -> Result<u32> {
    let path = path.as_ref();
    let bytes = fs::read(path).map_err(|e| Error::io(path, e))?;
    Ok(fingerprint(&bytes))
}

/// Lowercase hex SHA-1 of a file
pub fn sha1_file<P: AsRef<Path>>(path: P) -> Result<String> {
    let path = path.as_ref();
    let mut file = File::open(path).map_err(|e| Error::io(path, e))?;
    let mut hasher = Sha1::new();
    let mut buffer = vec![0; 8192];

    loop {
        let bytes_read = file.read(&mut buffer).map_err(|e| Error::io(path, e))?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(hex::encode(hasher.finalize()))
}

/// Compare two hex hashes, ignoring case and surrounding whitespace
pub fn hashes_match(a: &str, b: &str) -> bool {
    a.trim().eq_ignore_ascii_case(b.trim())
}
