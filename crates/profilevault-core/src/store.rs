//! Encrypted profile store.
//!
//! Owns the persisted schema and every operation on it. State lives in four
//! independent backend keys under one namespace:
//!
//! | Key                             | Content                    | Encrypted |
//! |---------------------------------|----------------------------|-----------|
//! | `<namespace>_version`           | schema/version tag         | no        |
//! | `<namespace>_profiles`          | JSON array of profiles     | yes       |
//! | `<namespace>_active_profile_id` | active profile id (absent = none) | no |
//! | `<namespace>_settings`          | JSON settings object       | yes       |
//!
//! Every operation is a read -> decrypt -> mutate -> encrypt -> write cycle.
//!
//! ## Failure policy
//!
//! Read paths ([`list_profiles`](ProfileStore::list_profiles),
//! [`get_settings`](ProfileStore::get_settings),
//! [`get_active_profile`](ProfileStore::get_active_profile)) never fail: an
//! unreadable blob degrades to an empty/default value and a warning. Write
//! paths surface every failure to the caller, and load the profile
//! collection strictly so that a corrupt blob is reported instead of being
//! overwritten with an empty list.
//!
//! ## Concurrency
//!
//! With [`WriteMode::Serialized`] (the default) mutations queue on a FIFO
//! lock, one in flight at a time. With [`WriteMode::Unsynchronized`] two
//! overlapping mutations race and the last writer wins.

use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, info, warn};

use crate::backend::KeyValueBackend;
use crate::config::{VaultConfig, WriteMode};
use crate::crypto::ProfileCipher;
use crate::error::{VaultError, VaultResult};
use crate::types::{
    ProfileFields, ProfileId, ProfileRecord, Settings, SettingsPatch, StorageSnapshot,
    STORE_VERSION,
};

/// Fully-qualified backend keys for one namespace
#[derive(Debug, Clone)]
struct StorageKeys {
    version: String,
    profiles: String,
    active_profile_id: String,
    settings: String,
}

impl StorageKeys {
    fn new(namespace: &str) -> Self {
        Self {
            version: format!("{}_version", namespace),
            profiles: format!("{}_profiles", namespace),
            active_profile_id: format!("{}_active_profile_id", namespace),
            settings: format!("{}_settings", namespace),
        }
    }
}

/// Encrypted, versioned store of profiles and settings.
///
/// Built once at process start and shared by handle (`Arc<ProfileStore<_>>`).
pub struct ProfileStore<B: KeyValueBackend> {
    backend: B,
    cipher: ProfileCipher,
    keys: StorageKeys,
    write_mode: WriteMode,
    write_lock: Mutex<()>,
    initialized: AtomicBool,
}

impl<B: KeyValueBackend> std::fmt::Debug for ProfileStore<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProfileStore")
            .field("keys", &self.keys)
            .field("write_mode", &self.write_mode)
            .field("initialized", &self.is_initialized())
            .finish()
    }
}

impl<B: KeyValueBackend> ProfileStore<B> {
    /// Create a store with the default configuration.
    pub fn new(backend: B, cipher: ProfileCipher) -> Self {
        Self::with_config(backend, cipher, &VaultConfig::default())
    }

    /// Create a store with an explicit configuration.
    pub fn with_config(backend: B, cipher: ProfileCipher, config: &VaultConfig) -> Self {
        Self {
            backend,
            cipher,
            keys: StorageKeys::new(&config.namespace),
            write_mode: config.write_mode,
            write_lock: Mutex::new(()),
            initialized: AtomicBool::new(false),
        }
    }

    /// Whether [`initialize`](Self::initialize) has completed on this instance
    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    pub fn write_mode(&self) -> WriteMode {
        self.write_mode
    }

    async fn write_guard(&self) -> Option<MutexGuard<'_, ()>> {
        match self.write_mode {
            WriteMode::Serialized => Some(self.write_lock.lock().await),
            WriteMode::Unsynchronized => None,
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Lifecycle
    // ═══════════════════════════════════════════════════════════════════════

    /// Write first-run defaults if the version marker is absent.
    ///
    /// Idempotent: later calls return immediately.
    pub async fn initialize(&self) -> VaultResult<()> {
        if self.is_initialized() {
            return Ok(());
        }

        let _guard = self.write_guard().await;
        if self.backend.get(&self.keys.version).await?.is_none() {
            info!("First time setup - initializing storage");
            self.write_defaults().await?;
        }

        self.initialized.store(true, Ordering::Release);
        info!(keys = ?self.keys, "Profile store initialized");
        Ok(())
    }

    async fn write_defaults(&self) -> VaultResult<()> {
        let empty: Vec<ProfileRecord> = Vec::new();
        self.store_profiles(&empty).await?;
        self.write_active_id(None).await?;
        self.store_settings(&Settings::default()).await?;
        // Written last: its presence marks setup as complete
        self.backend
            .set(&self.keys.version, STORE_VERSION.to_string())
            .await
    }

    /// Wipe every persisted key and reinitialize to first-run defaults.
    ///
    /// Irreversible.
    pub async fn clear_all(&self) -> VaultResult<()> {
        let _guard = self.write_guard().await;
        self.backend.clear().await?;
        self.write_defaults().await?;
        self.initialized.store(true, Ordering::Release);
        info!("All data cleared and reset to defaults");
        Ok(())
    }

    /// Stored schema version, if any
    pub async fn version(&self) -> VaultResult<Option<String>> {
        self.backend.get(&self.keys.version).await
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Raw persistence
    // ═══════════════════════════════════════════════════════════════════════

    async fn load_profiles(&self) -> VaultResult<Vec<ProfileRecord>> {
        match self.backend.get(&self.keys.profiles).await? {
            Some(token) => self.cipher.decrypt_object(&token),
            None => Ok(Vec::new()),
        }
    }

    async fn store_profiles(&self, profiles: &[ProfileRecord]) -> VaultResult<()> {
        let token = self.cipher.encrypt_object(profiles)?;
        self.backend.set(&self.keys.profiles, token).await
    }

    async fn load_active_id(&self) -> VaultResult<Option<ProfileId>> {
        Ok(self
            .backend
            .get(&self.keys.active_profile_id)
            .await?
            .filter(|id| !id.is_empty())
            .map(ProfileId::from))
    }

    async fn write_active_id(&self, id: Option<&ProfileId>) -> VaultResult<()> {
        match id {
            Some(id) => {
                self.backend
                    .set(&self.keys.active_profile_id, id.as_str().to_string())
                    .await
            }
            None => self.backend.remove(&self.keys.active_profile_id).await,
        }
    }

    async fn load_settings(&self) -> VaultResult<Settings> {
        match self.backend.get(&self.keys.settings).await? {
            Some(token) => self.cipher.decrypt_object(&token),
            None => Ok(Settings::default()),
        }
    }

    async fn store_settings(&self, settings: &Settings) -> VaultResult<()> {
        let token = self.cipher.encrypt_object(settings)?;
        self.backend.set(&self.keys.settings, token).await
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Profile reads
    // ═══════════════════════════════════════════════════════════════════════

    /// All profiles in insertion order.
    ///
    /// Returns an empty collection if storage is empty or unreadable.
    pub async fn list_profiles(&self) -> Vec<ProfileRecord> {
        match self.load_profiles().await {
            Ok(profiles) => profiles,
            Err(e) => {
                warn!(error = %e, "Failed to get profiles");
                Vec::new()
            }
        }
    }

    /// Look up one profile by id.
    pub async fn get_profile(&self, id: &ProfileId) -> Option<ProfileRecord> {
        self.list_profiles().await.into_iter().find(|p| &p.id == id)
    }

    /// Id of the active profile, if one is selected.
    pub async fn active_profile_id(&self) -> Option<ProfileId> {
        match self.load_active_id().await {
            Ok(id) => id,
            Err(e) => {
                warn!(error = %e, "Failed to get active profile id");
                None
            }
        }
    }

    /// The active profile; `None` if unset or if the selection dangles.
    pub async fn get_active_profile(&self) -> Option<ProfileRecord> {
        let id = self.active_profile_id().await?;
        let profile = self.get_profile(&id).await;
        if profile.is_none() {
            debug!(profile_id = %id, "Active profile id does not resolve");
        }
        profile
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Profile writes
    // ═══════════════════════════════════════════════════════════════════════

    /// Append a new profile.
    ///
    /// Fails with [`VaultError::DuplicateId`] if the id is taken. The first
    /// profile saved into an empty collection also becomes the active one.
    pub async fn save_profile(&self, record: ProfileRecord) -> VaultResult<()> {
        if record.id.as_str().is_empty() {
            return Err(VaultError::Validation("profile id must not be empty".to_string()));
        }
        if record.updated_at < record.created_at {
            return Err(VaultError::Validation(format!(
                "profile {} was updated before it was created",
                record.id
            )));
        }

        let _guard = self.write_guard().await;
        let mut profiles = self.load_profiles().await?;

        if profiles.iter().any(|p| p.id == record.id) {
            return Err(VaultError::DuplicateId(record.id.to_string()));
        }

        let id = record.id.clone();
        profiles.push(record);
        self.store_profiles(&profiles).await?;
        info!(profile_id = %id, "Profile saved successfully");

        if profiles.len() == 1 {
            self.write_active_id(Some(&id)).await?;
            info!(profile_id = %id, "First profile set as active");
        }

        Ok(())
    }

    /// Build a profile with a fresh id and timestamps, then save it.
    pub async fn create_profile(
        &self,
        name: impl Into<String>,
        data: ProfileFields,
    ) -> VaultResult<ProfileRecord> {
        let record = ProfileRecord::new(name, data);
        self.save_profile(record.clone()).await?;
        Ok(record)
    }

    /// Shallow-merge `updates` into a profile's fields and refresh its
    /// `updated_at`. Returns the updated record.
    pub async fn update_profile(
        &self,
        id: &ProfileId,
        updates: ProfileFields,
    ) -> VaultResult<ProfileRecord> {
        let _guard = self.write_guard().await;
        let mut profiles = self.load_profiles().await?;

        let profile = profiles
            .iter_mut()
            .find(|p| &p.id == id)
            .ok_or_else(|| VaultError::NotFound(id.to_string()))?;

        profile.data.merge(updates);
        profile.touch();
        let updated = profile.clone();

        self.store_profiles(&profiles).await?;
        info!(profile_id = %id, "Profile updated successfully");
        Ok(updated)
    }

    /// Remove a profile, clearing the active selection if it pointed here.
    pub async fn delete_profile(&self, id: &ProfileId) -> VaultResult<()> {
        let _guard = self.write_guard().await;
        let mut profiles = self.load_profiles().await?;

        let before = profiles.len();
        profiles.retain(|p| &p.id != id);
        if profiles.len() == before {
            return Err(VaultError::NotFound(id.to_string()));
        }

        let was_active = self.load_active_id().await?.as_ref() == Some(id);

        self.store_profiles(&profiles).await?;

        if was_active {
            self.write_active_id(None).await?;
            debug!(profile_id = %id, "Cleared active profile selection");
        }

        info!(profile_id = %id, "Profile deleted successfully");
        Ok(())
    }

    /// Select the active profile.
    pub async fn set_active_profile(&self, id: &ProfileId) -> VaultResult<()> {
        let _guard = self.write_guard().await;
        let profiles = self.load_profiles().await?;

        if !profiles.iter().any(|p| &p.id == id) {
            return Err(VaultError::NotFound(id.to_string()));
        }

        self.write_active_id(Some(id)).await?;
        info!(profile_id = %id, "Active profile set");
        Ok(())
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Settings
    // ═══════════════════════════════════════════════════════════════════════

    /// Current settings; defaults if absent or unreadable.
    pub async fn get_settings(&self) -> Settings {
        match self.load_settings().await {
            Ok(settings) => settings,
            Err(e) => {
                warn!(error = %e, "Failed to get settings, using defaults");
                Settings::default()
            }
        }
    }

    /// Shallow-merge a patch into the current settings and persist.
    ///
    /// An unreadable settings blob is replaced by defaults plus the patch.
    pub async fn update_settings(&self, patch: SettingsPatch) -> VaultResult<Settings> {
        let _guard = self.write_guard().await;
        let merged = self.get_settings().await.merged(&patch)?;
        self.store_settings(&merged).await?;
        info!("Settings updated successfully");
        Ok(merged)
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Backup / restore
    // ═══════════════════════════════════════════════════════════════════════

    /// Capture the entire store.
    ///
    /// Unlike the read paths this fails on an unreadable blob, so a backup is
    /// never silently empty.
    pub async fn export_snapshot(&self) -> VaultResult<StorageSnapshot> {
        let profiles = self.load_profiles().await?;
        let settings = self.load_settings().await?;
        let version = self
            .version()
            .await?
            .unwrap_or_else(|| STORE_VERSION.to_string());

        let active_profile_id = self
            .load_active_id()
            .await?
            .filter(|id| profiles.iter().any(|p| &p.id == id));

        Ok(StorageSnapshot {
            profiles,
            active_profile_id,
            settings,
            version,
        })
    }

    /// Overwrite the whole store with a snapshot.
    ///
    /// Each key is written independently. A dangling active id is dropped.
    pub async fn import_snapshot(&self, mut snapshot: StorageSnapshot) -> VaultResult<()> {
        snapshot.validate()?;

        if !snapshot.active_id_resolves() {
            warn!(
                active_profile_id = ?snapshot.active_profile_id,
                "Imported active profile id does not resolve, clearing it"
            );
            snapshot.active_profile_id = None;
        }

        let profiles_token = self.cipher.encrypt_object(&snapshot.profiles)?;
        let settings_token = self.cipher.encrypt_object(&snapshot.settings)?;

        let _guard = self.write_guard().await;
        self.backend.set(&self.keys.profiles, profiles_token).await?;
        self.backend.set(&self.keys.settings, settings_token).await?;
        self.write_active_id(snapshot.active_profile_id.as_ref())
            .await?;
        self.backend
            .set(&self.keys.version, snapshot.version.clone())
            .await?;

        info!(profiles = snapshot.profiles.len(), "Data imported successfully");
        Ok(())
    }

    /// Import from an untyped payload, rejecting malformed shapes with
    /// [`VaultError::Validation`].
    pub async fn import_snapshot_value(&self, value: serde_json::Value) -> VaultResult<()> {
        let snapshot = StorageSnapshot::from_value(value)?;
        self.import_snapshot(snapshot).await
    }
}
