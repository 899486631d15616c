//! BLAKE3 digests identifying file content

use crate::error::{IoResultExt, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

/// Files at least this large are hashed through a memory map
pub const MMAP_THRESHOLD: u64 = 4 * 1024 * 1024;

/// A BLAKE3 hash (32 bytes)
#[derive(Copy, Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
pub struct Blake3Hash([u8; 32]);

impl Blake3Hash {
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Lowercase hex rendering
    pub fn to_hex(&self) -> String {
        const HEX_CHARS: &[u8] = b"0123456789abcdef";
        let mut hex = String::with_capacity(64);
        for &byte in &self.0 {
            hex.push(HEX_CHARS[(byte >> 4) as usize] as char);
            hex.push(HEX_CHARS[(byte & 0xf) as usize] as char);
        }
        hex
    }
}

impl std::fmt::Debug for Blake3Hash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Blake3Hash({})", &self.to_hex()[..16])
    }
}

impl std::fmt::Display for Blake3Hash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// The digest primitive: hash a byte slice
pub fn hash_bytes(data: &[u8]) -> Blake3Hash {
    Blake3Hash::from_bytes(*blake3::hash(data).as_bytes())
}

/// Hash a file's full contents, picking streaming or mmap by size
pub fn hash_path(path: &Path) -> Result<Blake3Hash> {
    let len = std::fs::metadata(path).at(path)?.len();
    if len >= MMAP_THRESHOLD {
        hash_file_mmap(path)
    } else {
        hash_file(path)
    }
}

/// Hash a file with a buffered reader
pub fn hash_file(path: &Path) -> Result<Blake3Hash> {
    let file = File::open(path).at(path)?;
    let mut reader = BufReader::new(file);
    let mut hasher = blake3::Hasher::new();

    let mut buffer = [0u8; 8192];
    loop {
        let bytes_read = reader.read(&mut buffer).at(path)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(Blake3Hash::from_bytes(*hasher.finalize().as_bytes()))
}

/// Hash a file through a read-only memory map
pub fn hash_file_mmap(path: &Path) -> Result<Blake3Hash> {
    use memmap2::Mmap;

    let file = File::open(path).at(path)?;
    // Zero-length files cannot be mapped on every platform
    if file.metadata().at(path)?.len() == 0 {
        return Ok(hash_bytes(&[]));
    }
    // SAFETY: the map is read-only and dropped before returning. A concurrent
    // writer can at worst produce a digest of mixed content, which the next
    // reconciliation recomputes.
    let mmap = unsafe { Mmap::map(&file) }.at(path)?;
    Ok(hash_bytes(&mmap))
}
