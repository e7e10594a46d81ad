use anyhow::{Context, Result};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::url::{normalize_url, resolve_feed};
use crate::vault::{self, Secret, SecretVault};

const WRITE_ATTEMPTS: u32 = 2;
const RETRY_DELAY: Duration = Duration::from_millis(200);

/// Non-secret metadata for one feed. Identity is the canonical URL; the
/// password never appears here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedRecord {
    pub url: String,
    pub username: String,
    #[serde(default)]
    pub auto_submit: bool,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

/// Ephemeral join of a feed record and its vault secret, handed to callers
/// and never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialView {
    pub url: String,
    pub username: String,
    pub password: String,
    pub auto_submit: bool,
}

/// Persisted shape of the configuration snapshot. The same shape is used
/// for the primary config file and the backup copy.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct FeedConfig {
    #[serde(default)]
    pub feeds: Vec<FeedRecord>,
}

impl FeedConfig {
    /// Read a snapshot file. A missing file is the empty snapshot; an
    /// unreadable or unparseable one is logged and also treated as empty,
    /// which routes recovery through `load_state`'s guard and the backup.
    pub fn load(path: &Path) -> FeedConfig {
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(_) => return FeedConfig::default(),
        };
        match toml::from_str(&contents) {
            Ok(config) => config,
            Err(e) => {
                warn!("could not parse {}: {e}", path.display());
                FeedConfig::default()
            }
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let contents = toml::to_string_pretty(self).context("serializing feed config")?;
        write_atomic(path, &contents)
    }
}

/// Write via a temp file and rename so a crash mid-write never leaves a
/// truncated snapshot behind.
fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    let tmp = path.with_extension("toml.tmp");
    fs::write(&tmp, contents).with_context(|| format!("writing {}", tmp.display()))?;
    fs::rename(&tmp, path).with_context(|| format!("renaming over {}", path.display()))?;
    Ok(())
}

/// Failure of the two-tier write protocol. The snapshot is guaranteed to be
/// unchanged whenever one of these is returned.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to store the secret for {url} in the system keychain: {cause}")]
    VaultWrite { url: String, cause: anyhow::Error },
    #[error("secret for {url} could not be read back after writing; the keychain may be locked")]
    VaultVerifyMiss { url: String },
}

/// Owns the mapping from canonical feed key to `{secret, metadata}` and
/// enforces that the two tiers never diverge: the metadata record is
/// committed only after the vault write has been confirmed by a read-back,
/// and a backup snapshot is rewritten after every successful mutation.
pub struct CredentialStore {
    feeds: BTreeMap<String, FeedRecord>,
    vault: Box<dyn SecretVault>,
    backup_path: PathBuf,
}

impl CredentialStore {
    pub fn new(vault: Box<dyn SecretVault>, backup_path: PathBuf) -> CredentialStore {
        CredentialStore {
            feeds: BTreeMap::new(),
            vault,
            backup_path,
        }
    }

    /// Store or replace credentials for a feed. The secret is written to
    /// the vault and verified first; only then does the record enter the
    /// snapshot. On failure the snapshot is exactly as it was before.
    pub fn store_credentials(
        &mut self,
        url: &str,
        username: &str,
        password: &str,
        auto_submit: bool,
    ) -> Result<FeedRecord, StoreError> {
        let key = normalize_url(url);
        let secret = Secret {
            username: username.to_string(),
            password: password.to_string(),
        };
        write_secret_checked(self.vault.as_ref(), &key, &secret)?;

        let record = FeedRecord {
            url: key.clone(),
            username: username.to_string(),
            auto_submit,
            enabled: true,
        };
        self.feeds.insert(key, record.clone());
        self.write_backup();
        Ok(record)
    }

    /// Look up credentials for an observed URL. Absent, disabled, and
    /// vault-missing feeds all read as `None`; a partial record with no
    /// password is never returned.
    pub fn get_credentials(&self, url: &str) -> Option<CredentialView> {
        let keys: Vec<&str> = self.feeds.keys().map(String::as_str).collect();
        let key = resolve_feed(url, &keys)?;
        let record = self.feeds.get(&key)?;
        if !record.enabled {
            return None;
        }
        let secret = self.read_secret_migrating(&key)?;
        Some(CredentialView {
            url: key,
            username: secret.username,
            password: secret.password,
            auto_submit: record.auto_submit,
        })
    }

    /// Read the secret under the current key scheme, falling back to the
    /// legacy scheme and migrating forward on a hit so the upgrade is
    /// invisible to callers across restarts.
    fn read_secret_migrating(&self, key: &str) -> Option<Secret> {
        if let Some(secret) = self.vault.get(&vault::current_key(key)) {
            return Some(secret);
        }
        let secret = self.vault.get(&vault::legacy_key(key))?;
        // Copy forward before deleting: a failure in between leaves a
        // harmless duplicate, never a lost secret.
        if let Err(e) = self.vault.set(&vault::current_key(key), Some(&secret)) {
            warn!("could not migrate keychain entry for {key} to the current scheme: {e}");
            return Some(secret);
        }
        if let Err(e) = self.vault.set(&vault::legacy_key(key), None) {
            warn!("stale legacy keychain entry for {key} was left behind: {e}");
        }
        info!("migrated keychain entry for {key} to the current scheme");
        Some(secret)
    }

    /// Remove a feed and its vault entries. Returns false when the URL
    /// does not resolve to a stored feed.
    pub fn remove_credentials(&mut self, url: &str) -> bool {
        let Some(key) = self.resolve(url) else {
            return false;
        };
        self.feeds.remove(&key);
        for vault_key in [vault::current_key(&key), vault::legacy_key(&key)] {
            if let Err(e) = self.vault.set(&vault_key, None) {
                warn!("keychain entry for {key} could not be deleted: {e}");
            }
        }
        self.write_backup();
        true
    }

    pub fn set_feed_enabled(&mut self, url: &str, enabled: bool) -> bool {
        self.update_record(url, |record| record.enabled = enabled)
    }

    pub fn set_auto_submit(&mut self, url: &str, auto_submit: bool) -> bool {
        self.update_record(url, |record| record.auto_submit = auto_submit)
    }

    fn update_record(&mut self, url: &str, mutate: impl FnOnce(&mut FeedRecord)) -> bool {
        let Some(key) = self.resolve(url) else {
            return false;
        };
        let Some(record) = self.feeds.get_mut(&key) else {
            return false;
        };
        mutate(record);
        self.write_backup();
        true
    }

    fn resolve(&self, url: &str) -> Option<String> {
        let keys: Vec<&str> = self.feeds.keys().map(String::as_str).collect();
        resolve_feed(url, &keys)
    }

    /// Adopt a snapshot loaded by the host, guarding against silent
    /// credential loss: an empty incoming state never replaces live
    /// entries, and an empty state on a cold start is checked against the
    /// backup copy before being believed.
    pub fn load_state(&mut self, incoming: Vec<FeedRecord>) {
        if incoming.is_empty() && !self.feeds.is_empty() {
            warn!(
                "ignoring empty feed configuration over {} live entries; keeping current state",
                self.feeds.len()
            );
            return;
        }
        if incoming.is_empty() {
            if let Some(backup) = self.read_backup() {
                if !backup.is_empty() {
                    info!(
                        "primary feed configuration empty; restored {} entries from backup",
                        backup.len()
                    );
                    self.feeds = Self::key_records(backup);
                    return;
                }
            }
        }
        self.feeds = Self::key_records(incoming);
    }

    /// Re-key incoming records through the normalizer so a hand-edited
    /// file cannot introduce non-canonical keys.
    fn key_records(records: Vec<FeedRecord>) -> BTreeMap<String, FeedRecord> {
        let mut feeds = BTreeMap::new();
        for mut record in records {
            record.url = normalize_url(&record.url);
            feeds.insert(record.url.clone(), record);
        }
        feeds
    }

    fn write_backup(&self) {
        let config = self.to_config();
        if let Err(e) = config.save(&self.backup_path) {
            warn!("could not write feed backup to {}: {e}", self.backup_path.display());
        }
    }

    fn read_backup(&self) -> Option<Vec<FeedRecord>> {
        if !self.backup_path.exists() {
            return None;
        }
        Some(FeedConfig::load(&self.backup_path).feeds)
    }

    /// Stored records in canonical-key order.
    pub fn feeds(&self) -> impl Iterator<Item = &FeedRecord> {
        self.feeds.values()
    }

    pub fn is_empty(&self) -> bool {
        self.feeds.is_empty()
    }

    /// Snapshot in the persisted shape, for the host to save.
    pub fn to_config(&self) -> FeedConfig {
        FeedConfig {
            feeds: self.feeds.values().cloned().collect(),
        }
    }

    /// Network validation hook. Not implemented: always reports success.
    pub fn test_credentials(&self, _record: &FeedRecord) -> bool {
        true
    }
}

/// One verified vault write: set, then confirm by reading back. Retried
/// once after a short delay; the final error is returned unchanged.
fn write_secret_checked(
    vault: &dyn SecretVault,
    url: &str,
    secret: &Secret,
) -> Result<(), StoreError> {
    let key = vault::current_key(url);
    let mut attempt = 0;
    loop {
        attempt += 1;
        match try_write(vault, &key, url, secret) {
            Ok(()) => return Ok(()),
            Err(e) if attempt < WRITE_ATTEMPTS => {
                warn!("vault write for {url} failed (attempt {attempt}), retrying: {e}");
                std::thread::sleep(RETRY_DELAY);
            }
            Err(e) => return Err(e),
        }
    }
}

fn try_write(
    vault: &dyn SecretVault,
    key: &vault::VaultKey,
    url: &str,
    secret: &Secret,
) -> Result<(), StoreError> {
    vault
        .set(key, Some(secret))
        .map_err(|cause| StoreError::VaultWrite {
            url: url.to_string(),
            cause,
        })?;
    if vault.get(key).is_none() {
        return Err(StoreError::VaultVerifyMiss {
            url: url.to_string(),
        });
    }
    Ok(())
}
