use log::{debug, warn};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use crate::classify;
use crate::fill;
use crate::store::CredentialStore;
use crate::window::{Window, WindowEvent, WindowId};

/// The one credential store of the process, shared between the watcher,
/// menu actions, and the management surface.
pub type SharedStore = Arc<Mutex<CredentialStore>>;

/// Execution seams of the host. Window trees may only be touched on the
/// thread that owns them; vault I/O blocks and must stay off that thread.
pub trait Scheduler: Send + Sync {
    /// Run on the shared worker pool.
    fn spawn_blocking(&self, job: Box<dyn FnOnce() + Send>);

    /// Run on the thread that owns the windows.
    fn on_window_thread(&self, job: Box<dyn FnOnce() + Send>);
}

/// Runs every job on the calling thread. For tests and single-threaded
/// hosts that accept vault I/O inline.
pub struct InlineScheduler;

impl Scheduler for InlineScheduler {
    fn spawn_blocking(&self, job: Box<dyn FnOnce() + Send>) {
        job();
    }

    fn on_window_thread(&self, job: Box<dyn FnOnce() + Send>) {
        job();
    }
}

/// Watches window lifecycle notifications, classifies credential prompts
/// once per display, and triggers the asynchronous fill. All state lives
/// on the window-owning thread; only the credential lookup crosses onto
/// the worker pool.
///
/// The processed set holds bare window identities, never window handles,
/// so a closed window is not kept alive by the watcher. Identities are
/// evicted on close so a reused window object is classified afresh the
/// next time it is shown.
pub struct DialogWatcher {
    store: SharedStore,
    scheduler: Arc<dyn Scheduler>,
    processed: HashSet<WindowId>,
    armed: bool,
}

impl DialogWatcher {
    pub fn new(store: SharedStore, scheduler: Arc<dyn Scheduler>) -> DialogWatcher {
        DialogWatcher {
            store,
            scheduler,
            processed: HashSet::new(),
            armed: false,
        }
    }

    /// Arm the watcher. Idempotent: repeated calls return false and
    /// change nothing.
    pub fn start(&mut self) -> bool {
        if self.armed {
            return false;
        }
        self.armed = true;
        true
    }

    /// Feed one lifecycle notification through the dedup state machine.
    pub fn handle_event(&mut self, event: WindowEvent, window: &Arc<dyn Window>) {
        if !self.armed {
            return;
        }
        let id = window.id();
        match event {
            WindowEvent::Opened => {
                // A fresh display; any record from a previous life of this
                // identity is stale.
                self.processed.remove(&id);
                self.classify_and_fill(window);
            }
            WindowEvent::Activated => {
                // Windows re-shown by visibility toggling activate without
                // re-opening; classify only the first time.
                if !self.processed.contains(&id) {
                    self.classify_and_fill(window);
                }
            }
            WindowEvent::Closed | WindowEvent::Closing => {
                self.processed.remove(&id);
            }
        }
    }

    /// Catch-up sweep over windows that appeared before the listener was
    /// registered.
    pub fn rescan(&mut self, windows: &[Arc<dyn Window>]) {
        if !self.armed {
            return;
        }
        for window in windows {
            if window.is_visible() && !self.processed.contains(&window.id()) {
                self.classify_and_fill(window);
            }
        }
    }

    fn classify_and_fill(&mut self, window: &Arc<dyn Window>) {
        // Recorded before any work so later activations of this display
        // never re-enter, match or not.
        self.processed.insert(window.id());

        let Some(tree) = window.tree() else {
            return;
        };
        let title = window.title();
        if !classify::is_credential_window(title.as_deref(), &tree) {
            return;
        }
        let Some(url) = fill::extract_feed_url(&tree) else {
            debug!("credential prompt {:?} shows no feed URL; ignoring", title);
            return;
        };
        let fields = fill::locate_fields(&tree);

        // The lookup blocks on the vault, so it leaves the window thread;
        // the fill hops back. The window may close in between, which the
        // fill step tolerates.
        let store = Arc::clone(&self.store);
        let scheduler = Arc::clone(&self.scheduler);
        let window = Arc::clone(window);
        self.scheduler.spawn_blocking(Box::new(move || {
            let creds = match store.lock() {
                Ok(store) => store.get_credentials(&url),
                Err(_) => {
                    warn!("credential store lock poisoned; skipping autofill for {url}");
                    None
                }
            };
            let Some(creds) = creds else {
                debug!("no stored credentials match {url}");
                return;
            };
            scheduler.on_window_thread(Box::new(move || {
                fill::fill_and_submit(window.as_ref(), fields, &creds);
            }));
        }));
    }
}
