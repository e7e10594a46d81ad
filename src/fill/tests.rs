use super::*;
use crate::window::WindowId;
use std::sync::Mutex;

#[derive(Debug, PartialEq, Eq)]
enum Op {
    SetText(NodeId, String),
    Caret(NodeId),
    Click(NodeId),
}

/// Scripted window: a fixed tree plus a log of every mutation.
struct FakeWindow {
    tree: Option<Node>,
    ops: Mutex<Vec<Op>>,
}

impl FakeWindow {
    fn new(tree: Node) -> Self {
        Self {
            tree: Some(tree),
            ops: Mutex::new(Vec::new()),
        }
    }

    fn disposed() -> Self {
        Self {
            tree: None,
            ops: Mutex::new(Vec::new()),
        }
    }

    fn ops(&self) -> Vec<Op> {
        self.ops.lock().unwrap().drain(..).collect()
    }
}

impl Window for FakeWindow {
    fn id(&self) -> WindowId {
        1
    }

    fn title(&self) -> Option<String> {
        None
    }

    fn tree(&self) -> Option<Node> {
        self.tree.clone()
    }

    fn is_visible(&self) -> bool {
        self.tree.is_some()
    }

    fn set_text(&self, node: NodeId, text: &str) {
        self.ops.lock().unwrap().push(Op::SetText(node, text.to_string()));
    }

    fn caret_to_end(&self, node: NodeId) {
        self.ops.lock().unwrap().push(Op::Caret(node));
    }

    fn click(&self, node: NodeId) {
        self.ops.lock().unwrap().push(Op::Click(node));
    }
}

fn label(id: u32, text: &str) -> Node {
    Node::new(
        id,
        NodeKind::Label {
            text: text.to_string(),
        },
    )
}

fn input(id: u32, masked: bool) -> Node {
    Node::new(id, NodeKind::TextInput { masked })
}

fn button(id: u32, text: &str, enabled: bool, visible: bool) -> Node {
    Node::new(
        id,
        NodeKind::Button {
            label: text.to_string(),
            enabled,
            visible,
        },
    )
}

fn creds(auto_submit: bool) -> CredentialView {
    CredentialView {
        url: "https://feed.example.com/v3/index.json".to_string(),
        username: "alice".to_string(),
        password: "p1".to_string(),
        auto_submit,
    }
}

// --- locate_fields ------------------------------------------------------

#[test]
fn locates_first_input_of_each_kind() {
    let tree = Node::with_children(
        0,
        NodeKind::Panel,
        vec![input(1, false), input(2, true), input(3, false), input(4, true)],
    );

    let fields = locate_fields(&tree);

    assert_eq!(fields.username, Some(1));
    assert_eq!(fields.password, Some(2));
}

#[test]
fn shallow_inputs_win_over_deep_ones() {
    // A deep masked input sits under the first child; the shallow one at
    // the top level must still win.
    let tree = Node::with_children(
        0,
        NodeKind::Panel,
        vec![
            Node::with_children(1, NodeKind::Panel, vec![input(5, true)]),
            input(2, true),
        ],
    );

    assert_eq!(locate_fields(&tree).password, Some(2));
}

#[test]
fn missing_fields_stay_none() {
    let tree = Node::with_children(0, NodeKind::Panel, vec![label(1, "just text")]);

    assert_eq!(locate_fields(&tree), LocatedFields::default());
}

// --- extract_feed_url ---------------------------------------------------

#[test]
fn prefers_strict_index_url_over_any_url() {
    let tree = Node::with_children(
        0,
        NodeKind::Panel,
        vec![
            label(1, "docs at https://example.com/help"),
            label(2, "feed https://host/v3/index.json"),
        ],
    );

    assert_eq!(
        extract_feed_url(&tree).as_deref(),
        Some("https://host/v3/index.json")
    );
}

#[test]
fn falls_back_to_any_url_when_no_index_url_present() {
    let tree = Node::with_children(
        0,
        NodeKind::Panel,
        vec![label(1, "server https://host/v3 wants a password")],
    );

    assert_eq!(extract_feed_url(&tree).as_deref(), Some("https://host/v3"));
}

#[test]
fn no_labels_no_url() {
    let tree = Node::with_children(0, NodeKind::Panel, vec![input(1, true)]);

    assert_eq!(extract_feed_url(&tree), None);
}

// --- fill_and_submit ----------------------------------------------------

fn credential_dialog(submit_button: Node) -> Node {
    Node::with_children(
        0,
        NodeKind::Panel,
        vec![input(1, false), input(2, true), submit_button],
    )
}

#[test]
fn fills_username_then_password_with_caret_at_end() {
    let window = FakeWindow::new(credential_dialog(button(3, "OK", true, true)));

    fill_and_submit(&window, locate_fields(&window.tree().unwrap()), &creds(false));

    assert_eq!(
        window.ops(),
        vec![
            Op::SetText(1, "alice".to_string()),
            Op::Caret(1),
            Op::SetText(2, "p1".to_string()),
            Op::Caret(2),
        ]
    );
}

#[test]
fn auto_submit_clicks_the_ok_button_exactly_once() {
    let window = FakeWindow::new(credential_dialog(button(3, "OK", true, true)));

    fill_and_submit(&window, locate_fields(&window.tree().unwrap()), &creds(true));

    let clicks: Vec<_> = window
        .ops()
        .into_iter()
        .filter(|op| matches!(op, Op::Click(_)))
        .collect();
    assert_eq!(clicks, vec![Op::Click(3)]);
}

#[test]
fn login_and_sign_in_labels_also_submit() {
    for text in ["Login", "Sign In to feed"] {
        let window = FakeWindow::new(credential_dialog(button(3, text, true, true)));

        fill_and_submit(&window, locate_fields(&window.tree().unwrap()), &creds(true));

        let clicked = window.ops().iter().any(|op| matches!(op, Op::Click(3)));
        assert!(clicked, "label {text:?} should submit");
    }
}

#[test]
fn disabled_or_hidden_submit_button_is_left_alone() {
    for b in [button(3, "OK", false, true), button(3, "OK", true, false)] {
        let window = FakeWindow::new(credential_dialog(b));

        fill_and_submit(&window, locate_fields(&window.tree().unwrap()), &creds(true));

        assert!(!window.ops().iter().any(|op| matches!(op, Op::Click(_))));
    }
}

#[test]
fn no_submit_without_both_fields_filled() {
    let tree = Node::with_children(
        0,
        NodeKind::Panel,
        vec![input(2, true), button(3, "OK", true, true)],
    );
    let window = FakeWindow::new(tree);

    fill_and_submit(&window, locate_fields(&window.tree().unwrap()), &creds(true));

    assert!(!window.ops().iter().any(|op| matches!(op, Op::Click(_))));
}

#[test]
fn disposed_window_is_a_silent_no_op() {
    let window = FakeWindow::disposed();

    fill_and_submit(&window, LocatedFields { username: Some(1), password: Some(2) }, &creds(true));

    assert!(window.ops().is_empty());
}
