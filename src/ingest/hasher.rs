//! Content fingerprints used as stable video ids.

use std::fs::File;
use std::io::{self, BufReader};
use std::path::Path;

use anyhow::{Context, Result};
use memmap2::MmapOptions;
use sha2::{Digest, Sha256};

const MMAP_THRESHOLD: u64 = 500 * 1024 * 1024; // 500 MB

/// Hex SHA-256 of the file contents.
pub fn fingerprint(path: &Path) -> Result<String> {
    let file = File::open(path).with_context(|| format!("Failed to open video: {:?}", path))?;
    let len = file.metadata()?.len();

    let mut hasher = Sha256::new();
    if len > MMAP_THRESHOLD {
        // SAFETY: the video is opened read-only and not modified while we hash it.
        let mmap = unsafe { MmapOptions::new().map(&file)? };
        hasher.update(&mmap[..]);
    } else {
        io::copy(&mut BufReader::new(file), &mut hasher)
            .with_context(|| format!("Failed to read video: {:?}", path))?;
    }

    Ok(hex::encode(hasher.finalize()))
}

/// Short form of `fingerprint` for use as a `video_id`.
pub fn video_id_for(path: &Path) -> Result<String> {
    let mut digest = fingerprint(path)?;
    digest.truncate(16);
    Ok(digest)
}
