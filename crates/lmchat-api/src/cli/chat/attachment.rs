//! Image attachments for outgoing messages.
//!
//! URLs (`http`, `https`, `data:`) are passed through untouched; local files
//! are read and inlined as base64 `data:` URLs.

use std::path::Path;

use anyhow::{bail, Context, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

/// Largest local image that will be inlined.
const MAX_IMAGE_BYTES: u64 = 20 * 1024 * 1024;

/// Resolve `/image` input into an image reference the model service accepts.
pub async fn resolve_image(input: &str) -> Result<String> {
    let input = input.trim();
    if is_url(input) {
        return Ok(input.to_string());
    }

    let path = Path::new(input);
    let mime = mime_for(path)
        .with_context(|| format!("unsupported image type: {}", path.display()))?;

    let metadata = tokio::fs::metadata(path)
        .await
        .with_context(|| format!("cannot read {}", path.display()))?;
    if metadata.len() > MAX_IMAGE_BYTES {
        bail!(
            "{} is {} bytes; images are limited to {MAX_IMAGE_BYTES}",
            path.display(),
            metadata.len()
        );
    }

    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("cannot read {}", path.display()))?;
    Ok(data_url(mime, &bytes))
}

fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://") || input.starts_with("data:")
}

fn mime_for(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "gif" => Some("image/gif"),
        "webp" => Some("image/webp"),
        _ => None,
    }
}

fn data_url(mime: &str, bytes: &[u8]) -> String {
    format!("data:{mime};base64,{}", STANDARD.encode(bytes))
}

/// Short label for an attached image reference.
pub fn describe(image: &str) -> String {
    match image.split_once(";base64,") {
        Some((prefix, data)) => format!("{} ({} KB)", prefix.trim_start_matches("data:"), data.len() * 3 / 4 / 1024),
        None => image.to_string(),
    }
}
