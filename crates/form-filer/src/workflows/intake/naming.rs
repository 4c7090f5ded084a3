use std::collections::BTreeSet;

use super::domain::ItemResponse;

/// Characters that are not allowed in generated file or folder names.
pub const ILLEGAL_NAME_CHARS: &[char] = &['\\', '/', ':', '"', '*', '?', '<', '>', '|'];

/// Separator the form platform inserts before the uploader's name.
pub const SUBMITTER_SEPARATOR: &str = " - ";

/// Marker for containers that have not been reviewed yet.
pub const PENDING_MARKER: &str = "PENDING";

/// Replaces each illegal character with `-`.
pub fn sanitize(raw: &str) -> String {
    raw.chars()
        .map(|c| if ILLEGAL_NAME_CHARS.contains(&c) { '-' } else { c })
        .collect()
}

/// Splits `name` at its last `.`; the extension keeps the dot and its casing.
pub fn split_extension(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(index) => name.split_at(index),
        None => (name, ""),
    }
}

/// Drops the trailing ` - <submitter>` segment from a base name. Names without
/// the separator are returned as-is.
pub fn strip_submitter_suffix(base: &str) -> &str {
    match base.rfind(SUBMITTER_SEPARATOR) {
        Some(index) => &base[..index],
        None => base,
    }
}

/// Special-branch name: `<prefix> - <original base>.<ext>`.
pub fn special_file_name(prefix: &str, original_name: &str) -> String {
    let (base, extension) = split_extension(original_name);
    let stripped = strip_submitter_suffix(base);
    format!(
        "{}{extension}",
        sanitize(&format!("{prefix}{SUBMITTER_SEPARATOR}{stripped}"))
    )
}

/// Standard-branch name. `position` is the 1-based upload index and is only
/// rendered when the question has more than one file.
pub fn standard_file_name(
    base: &str,
    original_name: &str,
    position: usize,
    files_on_question: usize,
) -> String {
    let (_, extension) = split_extension(original_name);
    let mut name = sanitize(base);
    if files_on_question > 1 {
        name.push_str(&format!(" ({position})"));
    }
    name.push_str(extension);
    name
}

/// Destination container name: `<timestamp>_PENDING_<part>_<part>...`.
///
/// File uploads and excluded questions never contribute, nor do answers that
/// are blank after trimming.
pub fn compose_folder_name(
    items: &[ItemResponse],
    timestamp: &str,
    excluded: &BTreeSet<String>,
) -> String {
    let parts = items
        .iter()
        .filter(|item| !item.is_file_upload())
        .filter(|item| !excluded.contains(item.question_title()))
        .map(|item| item.answer().flatten().trim().to_string())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>();

    format!("{timestamp}_{PENDING_MARKER}_{}", parts.join("_"))
}
