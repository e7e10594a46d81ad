use anyhow::{Context, Result};
use keyring::Entry;
use log::warn;
use std::collections::HashMap;
use std::sync::Mutex;

const SERVICE_NAME: &str = "feedkey";
const KEY_SCHEME_TAG: &str = "v2";

/// The secret half of a stored credential. Lives only in the vault and in
/// short-lived views handed to callers; never persisted to the config file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Secret {
    pub username: String,
    pub password: String,
}

/// Address of a vault entry. The service name carries a scheme version tag
/// so entries written before the tag existed can be found and migrated.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VaultKey {
    pub service: String,
    pub account: String,
}

/// Key under the current scheme (version-tagged service name).
pub fn current_key(canonical_url: &str) -> VaultKey {
    VaultKey {
        service: format!("{SERVICE_NAME}.{KEY_SCHEME_TAG}"),
        account: canonical_url.to_string(),
    }
}

/// Key under the legacy scheme, which predates the version tag.
pub fn legacy_key(canonical_url: &str) -> VaultKey {
    VaultKey {
        service: SERVICE_NAME.to_string(),
        account: canonical_url.to_string(),
    }
}

/// Opaque secret storage. `set(key, None)` deletes; deleting an absent
/// entry is not an error. A `get` miss and a `get` failure are the same
/// thing to callers: no secret available.
pub trait SecretVault: Send + Sync {
    fn set(&self, key: &VaultKey, secret: Option<&Secret>) -> Result<()>;
    fn get(&self, key: &VaultKey) -> Option<Secret>;
}

// --- OS keychain backend ------------------------------------------------

/// Vault backed by the platform keychain (macOS Keychain, Windows
/// Credential Manager, Secret Service on Linux).
pub struct KeyringVault;

impl SecretVault for KeyringVault {
    fn set(&self, key: &VaultKey, secret: Option<&Secret>) -> Result<()> {
        let entry = Entry::new(&key.service, &key.account)
            .context("failed to create keyring entry")?;
        match secret {
            Some(secret) => entry
                .set_password(&encode(secret))
                .context("failed to store secret in keychain")?,
            None => match entry.delete_password() {
                Ok(()) | Err(keyring::Error::NoEntry) => {}
                Err(e) => {
                    return Err(e).context("failed to delete keychain entry");
                }
            },
        }
        Ok(())
    }

    fn get(&self, key: &VaultKey) -> Option<Secret> {
        let entry = Entry::new(&key.service, &key.account).ok()?;
        match entry.get_password() {
            Ok(raw) => decode(&raw, &key.account),
            Err(keyring::Error::NoEntry) => None,
            Err(e) => {
                warn!("keychain read for {} failed: {e}", key.account);
                None
            }
        }
    }
}

/// The keychain stores one string per entry, so the username rides in
/// front of the password, separated by the first newline. Passwords keep
/// any newlines of their own.
fn encode(secret: &Secret) -> String {
    format!("{}\n{}", secret.username, secret.password)
}

fn decode(raw: &str, account: &str) -> Option<Secret> {
    match raw.split_once('\n') {
        Some((username, password)) => Some(Secret {
            username: username.to_string(),
            password: password.to_string(),
        }),
        None => {
            warn!("keychain entry for {account} has no username separator; ignoring it");
            None
        }
    }
}

// --- In-memory backend --------------------------------------------------

/// Map-backed vault for tests and embedders that have no keychain.
#[derive(Default)]
pub struct MemoryVault {
    entries: Mutex<HashMap<VaultKey, Secret>>,
}

impl MemoryVault {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SecretVault for MemoryVault {
    fn set(&self, key: &VaultKey, secret: Option<&Secret>) -> Result<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| anyhow::anyhow!("vault map poisoned"))?;
        match secret {
            Some(secret) => {
                entries.insert(key.clone(), secret.clone());
            }
            None => {
                entries.remove(key);
            }
        }
        Ok(())
    }

    fn get(&self, key: &VaultKey) -> Option<Secret> {
        self.entries.lock().ok()?.get(key).cloned()
    }
}
