/// Suffix of a package feed's service index document.
pub const INDEX_SUFFIX: &str = "/index.json";

/// Canonical comparison key for a feed URL.
///
/// Trims whitespace, lowercases, strips one trailing slash, and assumes
/// https when no scheme was typed. Total: garbage in, stable garbage out.
pub fn normalize_url(url: &str) -> String {
    let mut key = url.trim().to_lowercase();
    if key.ends_with('/') {
        key.truncate(key.len() - 1);
    }
    if !key.starts_with("http") {
        key = format!("https://{key}");
    }
    key
}

/// Map an observed (possibly partial) URL to the canonical key of a stored
/// feed. Dialogs sometimes show the full index document URL and sometimes
/// the base path without it, so both alias directions are tried. Matching
/// is whole-string only: a stored `.../nuget-local-snapshots/index.json`
/// must never satisfy a lookup for `.../nuget-local`.
pub fn resolve_feed(observed: &str, stored_keys: &[&str]) -> Option<String> {
    if observed.trim().is_empty() || stored_keys.is_empty() {
        return None;
    }
    let key = normalize_url(observed);

    if let Some(hit) = stored_keys.iter().find(|k| **k == key) {
        return Some((*hit).to_string());
    }

    // Observed is a base path, stored key carries the index document.
    let with_index = format!("{}{}", key.trim_end_matches('/'), INDEX_SUFFIX);
    if let Some(hit) = stored_keys.iter().find(|k| **k == with_index) {
        return Some((*hit).to_string());
    }

    // Stored key minus its index document equals the observed value.
    for stored in stored_keys {
        if let Some(base) = stored.strip_suffix(INDEX_SUFFIX) {
            if base.trim_end_matches('/') == key.trim_end_matches('/') {
                return Some((*stored).to_string());
            }
        }
    }

    // Observed carries the index document, stored key is the base path.
    if let Some(base) = key.strip_suffix(INDEX_SUFFIX) {
        if let Some(hit) = stored_keys.iter().find(|k| **k == base) {
            return Some((*hit).to_string());
        }
    }

    None
}
