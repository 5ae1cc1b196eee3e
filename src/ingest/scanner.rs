use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Result;
use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

use crate::ingest::extract::frame_index_from_name;
use crate::media::mimetype;

/// An extracted frame file and the source time it stands for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameFile {
    pub path: PathBuf,
    pub timestamp: Duration,
}

/// Collects the image files under `root` in frame order.
///
/// When every file is named like `frame_0007.jpg` the sequence numbers give
/// both order and timestamp. Otherwise files are taken in name order and the
/// timestamp follows the position.
pub fn scan_frames(root: &Path, interval: Duration) -> Result<Vec<FrameFile>> {
    let mut paths = Vec::new();

    for entry in WalkDir::new(root).into_iter().filter_entry(|e| !is_hidden(e)) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        match mimetype::is_image_file(entry.path()) {
            Ok(true) => paths.push(entry.into_path()),
            Ok(false) => debug!("Ignoring non-image file {:?}", entry.path()),
            Err(e) => warn!("Skipping unreadable file {:?}: {:#}", entry.path(), e),
        }
    }

    // `frame_0001` and `snapshot_0001` in one directory would share an index.
    let numbered = paths
        .iter()
        .map(|p| frame_index_from_name(p).map(|i| (i, p.clone())))
        .collect::<Option<Vec<(u64, PathBuf)>>>()
        .map(|mut numbered| {
            numbered.sort();
            numbered
        })
        .filter(|numbered| numbered.windows(2).all(|w| w[0].0 < w[1].0));

    let indexed = match numbered {
        Some(numbered) => numbered,
        None => {
            if !paths.is_empty() {
                debug!("Frame files in {:?} are not uniformly numbered; using name order", root);
            }
            paths.sort();
            paths.into_iter().enumerate().map(|(i, p)| (i as u64, p)).collect()
        }
    };

    let frames = indexed
        .into_iter()
        .map(|(index, path)| FrameFile {
            path,
            timestamp: interval.saturating_mul(u32::try_from(index).unwrap_or(u32::MAX)),
        })
        .collect();

    Ok(frames)
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.depth() > 0
        && entry
            .file_name()
            .to_str()
            .map(|s| s.starts_with('.'))
            .unwrap_or(false)
}
