//! Object Store key generation for listing photos.

use chrono::Utc;

const KEY_PREFIX: &str = "photos";
const MAX_STEM_LEN: usize = 48;
const KNOWN_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "png", "gif", "webp"];

/// Generates a collision-resistant key for a photo upload.
///
/// Layout: `photos/{unix_millis}-{16 hex random}-{stem}.{ext}`.
pub fn photo_storage_key(file_name: &str, content_type: &str) -> String {
    photo_storage_key_at(
        file_name,
        content_type,
        Utc::now().timestamp_millis(),
        rand::random::<u64>(),
    )
}

pub(crate) fn photo_storage_key_at(
    file_name: &str,
    content_type: &str,
    millis: i64,
    random: u64,
) -> String {
    format!(
        "{KEY_PREFIX}/{millis}-{random:016x}-{}.{}",
        sanitize_stem(file_name),
        photo_extension(file_name, content_type)
    )
}

fn split_file_name(file_name: &str) -> (&str, Option<&str>) {
    let base = file_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(file_name);

    match base.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => (stem, Some(ext)),
        _ => (base, None),
    }
}

/// Reduces a client-supplied file name to a safe key segment.
pub fn sanitize_stem(file_name: &str) -> String {
    let (stem, _) = split_file_name(file_name);

    let mut out = String::with_capacity(stem.len());
    for c in stem.chars() {
        if c.is_ascii_alphanumeric() || c == '_' {
            out.push(c.to_ascii_lowercase());
        } else if !out.ends_with('-') {
            out.push('-');
        }
    }

    let trimmed = out.trim_matches('-');
    let truncated: String = trimmed.chars().take(MAX_STEM_LEN).collect();
    let truncated = truncated.trim_end_matches('-');

    if truncated.is_empty() {
        "photo".to_string()
    } else {
        truncated.to_string()
    }
}

/// Picks the key extension: the file's own when it is a known image
/// extension, otherwise one derived from the content type.
pub fn photo_extension(file_name: &str, content_type: &str) -> &'static str {
    if let (_, Some(ext)) = split_file_name(file_name) {
        let ext = ext.to_ascii_lowercase();
        if let Some(known) = KNOWN_EXTENSIONS.iter().copied().find(|k| *k == ext) {
            return known;
        }
    }

    match super::submission::normalize_content_type(content_type).as_str() {
        "image/jpeg" => "jpg",
        "image/png" => "png",
        "image/gif" => "gif",
        "image/webp" => "webp",
        _ => "bin",
    }
}
