use log::debug;
use regex::Regex;
use std::sync::LazyLock;

use crate::window::{Node, NodeKind};

/// Generic authentication phrases seen in dialog titles.
const GENERIC_TITLES: &[&str] = &[
    "enter credentials",
    "credentials required",
    "authentication required",
    "sign in",
    "log in",
    "personal access token",
];

/// Package-source-specific phrases.
const PACKAGE_TITLES: &[&str] = &[
    "nuget authentication",
    "package source credentials",
    "package manager credentials",
];

/// A feed index URL, bounded on the right by whitespace, a quote, an angle
/// bracket, or end-of-string so trailing prose is never captured. Used for
/// content classification.
static FEED_INDEX_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(https?://[^\s"'<>]+/index\.json)(?:[\s"'<>]|$)"#)
        .expect("hardcoded pattern compiles")
});

/// Any http(s) URL. Too permissive for classification; only used as a
/// last-resort during field extraction.
static ANY_HTTP_URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"https?://[^\s"'<>]+"#).expect("hardcoded pattern compiles"));

/// First feed index URL in the text, if any.
pub fn find_feed_index_url(text: &str) -> Option<String> {
    FEED_INDEX_URL
        .captures(text)
        .and_then(|captures| captures.get(1))
        .map(|hit| hit.as_str().to_string())
}

/// First http(s) URL in the text, with no suffix requirement.
pub fn find_any_url(text: &str) -> Option<String> {
    ANY_HTTP_URL.find(text).map(|hit| hit.as_str().to_string())
}

/// Case-insensitive title match against the fixed vocabulary. Either
/// pattern group is sufficient.
pub fn title_matches(title: &str) -> bool {
    let title = title.to_lowercase();
    GENERIC_TITLES
        .iter()
        .chain(PACKAGE_TITLES)
        .any(|phrase| title.contains(phrase))
}

/// Content fallback for unrecognized titles (localized or custom dialogs):
/// requires a masked input AND a label carrying a feed index URL. Either
/// alone is not enough: plenty of dialogs have a password field with no
/// feed URL, or quote a URL with nothing to type into.
pub fn content_matches(tree: &Node) -> bool {
    let mut masked_input = false;
    let mut feed_url_label = false;
    for node in tree.walk() {
        match &node.kind {
            NodeKind::TextInput { masked: true } => masked_input = true,
            NodeKind::Label { text } => {
                if find_feed_index_url(text).is_some() {
                    feed_url_label = true;
                }
            }
            _ => {}
        }
        if masked_input && feed_url_label {
            return true;
        }
    }
    false
}

/// Does this window look like a credential prompt?
pub fn is_credential_window(title: Option<&str>, tree: &Node) -> bool {
    if title.is_some_and(title_matches) {
        return true;
    }
    if content_matches(tree) {
        debug!("window content looks like a credential prompt despite title {title:?}");
        return true;
    }
    false
}
