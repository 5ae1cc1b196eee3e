use std::path::Path;

use anyhow::{Context, Result};

/// MIME type of an encoded image, or `None` if the bytes aren't an image.
pub fn detect_image_mime(bytes: &[u8]) -> Option<&'static str> {
    infer::get(bytes)
        .filter(|kind| kind.matcher_type() == infer::MatcherType::Image)
        .map(|kind| kind.mime_type())
}

pub fn is_image_file(path: &Path) -> Result<bool> {
    let kind = infer::get_from_path(path)
        .with_context(|| format!("Failed to read {:?} for mimetype detection", path))?;

    Ok(matches!(kind, Some(k) if k.matcher_type() == infer::MatcherType::Image))
}
