//! Archive entry naming

/// Make a provider resource name safe to use as one archive path segment
pub(crate) fn sanitize_segment(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | '\0' => '_',
            c => c,
        })
        .collect();

    match cleaned.as_str() {
        "" => "unnamed".to_string(),
        "." | ".." => "_".repeat(cleaned.len()),
        _ => cleaned,
    }
}

/// Entry name for a file under `prefix`
pub(crate) fn file_entry_path(prefix: &str, name: &str) -> String {
    format!("{}{}", prefix, sanitize_segment(name))
}

/// Prefix (with trailing separator) for the children of a directory under `prefix`
pub(crate) fn directory_prefix(prefix: &str, name: &str) -> String {
    format!("{}{}/", prefix, sanitize_segment(name))
}
