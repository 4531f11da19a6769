use regex::Regex;
use std::path::Path;

/// Only keep letters, numbers, dots, dashes, underscores, and spaces in uploaded file names.
/// Anything else gets swapped for an underscore, and any directory part is dropped.
pub fn sanitize_file_name(name: &str) -> Option<String> {
    let unsafe_chars = Regex::new(r"[^A-Za-z0-9._ -]").ok()?;

    // Browsers on Windows may send the full path
    let base = name.rsplit(['/', '\\']).next()?.trim();
    let cleaned = unsafe_chars.replace_all(base, "_").to_string();

    // Need a real stem, not just dots or an extension
    let stem = Path::new(&cleaned).file_stem()?.to_str()?;
    if stem.trim_matches('.').is_empty() || cleaned.starts_with('.') {
        return None;
    }

    Some(cleaned)
}
