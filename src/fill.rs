use log::debug;

use crate::classify;
use crate::store::CredentialView;
use crate::window::{Node, NodeId, NodeKind, Window};

/// Button labels that submit a credential dialog.
const SUBMIT_LABELS: &[&str] = &["ok", "login", "sign in"];

/// Candidate input fields located in a window's tree.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LocatedFields {
    pub username: Option<NodeId>,
    pub password: Option<NodeId>,
}

/// First plain text input and first masked input, shallowest first. Stops
/// as soon as both are found.
pub fn locate_fields(tree: &Node) -> LocatedFields {
    let mut fields = LocatedFields::default();
    for node in tree.walk() {
        if let NodeKind::TextInput { masked } = node.kind {
            let slot = if masked {
                &mut fields.password
            } else {
                &mut fields.username
            };
            if slot.is_none() {
                *slot = Some(node.id);
            }
        }
        if fields.username.is_some() && fields.password.is_some() {
            break;
        }
    }
    fields
}

/// Candidate feed URL quoted in the window's labels. Prefers a strict feed
/// index URL; falls back to any http(s) URL so partially-shown base paths
/// still resolve.
pub fn extract_feed_url(tree: &Node) -> Option<String> {
    let labels = || {
        tree.walk().filter_map(|node| match &node.kind {
            NodeKind::Label { text } => Some(text.as_str()),
            _ => None,
        })
    };
    if let Some(url) = labels().find_map(classify::find_feed_index_url) {
        return Some(url);
    }
    labels().find_map(classify::find_any_url)
}

/// Write the credentials into the located fields and, when the record asks
/// for it, press the submit button. Safe to call after the window has
/// closed: every step re-checks and degrades to a logged no-op.
pub fn fill_and_submit(window: &dyn Window, fields: LocatedFields, creds: &CredentialView) {
    if window.tree().is_none() {
        debug!("window {} closed before credentials arrived", window.id());
        return;
    }

    let mut filled_username = false;
    let mut filled_password = false;
    if let Some(id) = fields.username {
        window.set_text(id, &creds.username);
        window.caret_to_end(id);
        filled_username = true;
    }
    if let Some(id) = fields.password {
        window.set_text(id, &creds.password);
        window.caret_to_end(id);
        filled_password = true;
    }

    if !(filled_username && filled_password && creds.auto_submit) {
        return;
    }
    let Some(tree) = window.tree() else {
        return;
    };
    submit(window, &tree);
}

/// Press the first recognizable submit button, if it can take the press.
fn submit(window: &dyn Window, tree: &Node) {
    for node in tree.walk() {
        let NodeKind::Button {
            label,
            enabled,
            visible,
        } = &node.kind
        else {
            continue;
        };
        let lowered = label.to_lowercase();
        if !SUBMIT_LABELS.iter().any(|s| lowered.contains(s)) {
            continue;
        }
        if *enabled && *visible {
            window.click(node.id);
        } else {
            debug!("submit button {label:?} is present but not clickable; leaving the dialog open");
        }
        return;
    }
    debug!("no submit button found; leaving the dialog open");
}

#[cfg(test)]
mod tests;
