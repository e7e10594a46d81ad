//! Credential autofill engine for package-feed authentication prompts.
//!
//! Watches host windows for credential dialogs, matches them to feeds the
//! user registered, and fills them from a two-tier store: metadata in a
//! plain TOML snapshot, passwords in the OS keychain. The windowing system
//! is abstracted behind the [`window::Window`] trait so any toolkit
//! binding can drive the engine.

pub mod classify;
pub mod fill;
pub mod store;
pub mod url;
pub mod vault;
pub mod watcher;
pub mod window;

pub use store::{CredentialStore, CredentialView, FeedConfig, FeedRecord, StoreError};
pub use url::{normalize_url, resolve_feed};
pub use vault::{KeyringVault, MemoryVault, Secret, SecretVault};
pub use watcher::{DialogWatcher, InlineScheduler, Scheduler, SharedStore};
pub use window::{Window, WindowEvent, WindowId};
