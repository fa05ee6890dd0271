//! Upload normalization for listing images: type sniffing, safe file names
//! and content hashes. Duplicate detection lives in [`dedup`].

pub mod dedup;

use sha2::{Digest, Sha256};

pub use dedup::{DedupePlan, plan_dedupe, signature};

const MAX_STEM_CHARS: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageFormat {
    Jpeg,
    Png,
    Webp,
    Gif,
}

impl ImageFormat {
    /// Sniff the format from the leading magic bytes; the declared type is never trusted.
    #[must_use]
    pub fn detect(bytes: &[u8]) -> Option<Self> {
        if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
            Some(Self::Jpeg)
        } else if bytes.starts_with(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]) {
            Some(Self::Png)
        } else if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
            Some(Self::Webp)
        } else if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
            Some(Self::Gif)
        } else {
            None
        }
    }

    #[must_use]
    pub fn from_content_type(content_type: &str) -> Option<Self> {
        match content_type {
            "image/jpeg" => Some(Self::Jpeg),
            "image/png" => Some(Self::Png),
            "image/webp" => Some(Self::Webp),
            "image/gif" => Some(Self::Gif),
            _ => None,
        }
    }

    #[must_use]
    pub fn content_type(self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::Webp => "image/webp",
            Self::Gif => "image/gif",
        }
    }

    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            Self::Jpeg => "jpg",
            Self::Png => "png",
            Self::Webp => "webp",
            Self::Gif => "gif",
        }
    }

    /// Lower is better when choosing which duplicate to keep
    #[must_use]
    pub fn preference(self) -> u8 {
        match self {
            Self::Webp => 0,
            Self::Jpeg => 1,
            Self::Png => 2,
            Self::Gif => 3,
        }
    }
}

/// Hex sha-256 of the file contents
#[must_use]
pub fn content_hash(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Strip any directory part and the extension (when it looks like one)
pub(crate) fn file_stem(file_name: &str) -> &str {
    let base = file_name
        .rsplit(|c: char| c == '/' || c == '\\')
        .next()
        .unwrap_or(file_name);
    match base.rsplit_once('.') {
        Some((stem, ext))
            if !stem.is_empty()
                && (1..=5).contains(&ext.len())
                && ext.chars().all(|c| c.is_ascii_alphanumeric()) =>
        {
            stem
        }
        _ => base,
    }
}

/// Lowercase ascii with every other run of characters collapsed to one `-`
pub(crate) fn dash_separated(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pending_dash = false;
    for c in text.chars().flat_map(char::to_lowercase) {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !out.is_empty() {
                out.push('-');
            }
            pending_dash = false;
            out.push(c);
        } else {
            pending_dash = true;
        }
    }
    out
}

/// Safe stored file name: lowercase stem, no path, extension matching the real format.
///
/// `"../My Tent (1).JPEG"` detected as webp becomes `"my-tent-1.webp"`.
#[must_use]
pub fn normalize_file_name(original: &str, format: ImageFormat) -> String {
    let stem: String = dash_separated(file_stem(original))
        .chars()
        .take(MAX_STEM_CHARS)
        .collect();
    let stem = stem.trim_end_matches('-');
    let stem = if stem.is_empty() { "image" } else { stem };
    format!("{stem}.{}", format.extension())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_formats() {
        assert_eq!(ImageFormat::detect(&[0xFF, 0xD8, 0xFF, 0xE0, 0]), Some(ImageFormat::Jpeg));
        assert_eq!(
            ImageFormat::detect(b"\x89PNG\r\n\x1a\n rest"),
            Some(ImageFormat::Png)
        );
        assert_eq!(ImageFormat::detect(b"RIFF\x10\x00\x00\x00WEBPVP8 "), Some(ImageFormat::Webp));
        assert_eq!(ImageFormat::detect(b"GIF89a...."), Some(ImageFormat::Gif));
        assert_eq!(ImageFormat::detect(b"%PDF-1.7"), None);
        assert_eq!(ImageFormat::detect(b"RIFF\x10\x00\x00\x00WAVE"), None);
        assert_eq!(ImageFormat::detect(b""), None);
    }

    #[test]
    fn test_preference_order() {
        let mut formats = [ImageFormat::Gif, ImageFormat::Png, ImageFormat::Webp, ImageFormat::Jpeg];
        formats.sort_by_key(|f| f.preference());
        assert_eq!(
            formats,
            [ImageFormat::Webp, ImageFormat::Jpeg, ImageFormat::Png, ImageFormat::Gif]
        );
    }

    #[test]
    fn test_content_hash() {
        assert_eq!(
            content_hash(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_normalize_file_name() {
        assert_eq!(normalize_file_name("../My Tent (1).JPEG", ImageFormat::Webp), "my-tent-1.webp");
        assert_eq!(normalize_file_name("C:\\Users\\x\\stove.png", ImageFormat::Png), "stove.png");
        assert_eq!(normalize_file_name("", ImageFormat::Jpeg), "image.jpg");
        assert_eq!(normalize_file_name("!!!.gif", ImageFormat::Gif), "image.gif");
        assert_eq!(normalize_file_name(".hidden", ImageFormat::Png), "hidden.png");
    }

    #[test]
    fn test_normalize_truncates_long_names() {
        let long = format!("{}.png", "a".repeat(300));
        let name = normalize_file_name(&long, ImageFormat::Png);
        assert_eq!(name.len(), MAX_STEM_CHARS + ".png".len());
    }
}
