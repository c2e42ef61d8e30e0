//! Whole-store snapshot used for backup and restore

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::VaultError;
use crate::types::{ProfileId, ProfileRecord, Settings};

/// The entire persisted state as one transferable value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageSnapshot {
    pub profiles: Vec<ProfileRecord>,
    pub active_profile_id: Option<ProfileId>,
    pub settings: Settings,
    pub version: String,
}

impl StorageSnapshot {
    /// Parse an untyped payload (e.g. a backup file or a message body).
    ///
    /// Any shape mismatch, such as `profiles` not being an array, is a
    /// [`VaultError::Validation`].
    pub fn from_value(value: serde_json::Value) -> Result<Self, VaultError> {
        serde_json::from_value(value).map_err(|e| VaultError::Validation(e.to_string()))
    }

    /// Check the collection invariants before the snapshot is written.
    pub fn validate(&self) -> Result<(), VaultError> {
        if self.version.trim().is_empty() {
            return Err(VaultError::Validation("version must not be empty".to_string()));
        }

        let mut seen = HashSet::with_capacity(self.profiles.len());
        for profile in &self.profiles {
            if profile.id.as_str().is_empty() {
                return Err(VaultError::Validation("profile id must not be empty".to_string()));
            }
            if !seen.insert(&profile.id) {
                return Err(VaultError::Validation(format!(
                    "duplicate profile id: {}",
                    profile.id
                )));
            }
            if profile.updated_at < profile.created_at {
                return Err(VaultError::Validation(format!(
                    "profile {} was updated before it was created",
                    profile.id
                )));
            }
        }

        self.settings.validate()
    }

    /// True if the active id points at a profile in this snapshot (or is unset).
    pub fn active_id_resolves(&self) -> bool {
        match &self.active_profile_id {
            Some(id) => self.profiles.iter().any(|p| &p.id == id),
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ProfileFields, STORE_VERSION};

    fn snapshot(profiles: Vec<ProfileRecord>) -> StorageSnapshot {
        StorageSnapshot {
            profiles,
            active_profile_id: None,
            settings: Settings::default(),
            version: STORE_VERSION.to_string(),
        }
    }

    #[test]
    fn test_valid_snapshot() {
        let snap = snapshot(vec![
            ProfileRecord::new("A", ProfileFields::new()),
            ProfileRecord::new("B", ProfileFields::new()),
        ]);
        assert!(snap.validate().is_ok());
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let a = ProfileRecord::new("A", ProfileFields::new());
        let mut b = ProfileRecord::new("B", ProfileFields::new());
        b.id = a.id.clone();

        let err = snapshot(vec![a, b]).validate().unwrap_err();
        assert!(matches!(err, VaultError::Validation(msg) if msg.contains("duplicate")));
    }

    #[test]
    fn test_profiles_must_be_array() {
        let result = StorageSnapshot::from_value(serde_json::json!({
            "profiles": "nope",
            "activeProfileId": null,
            "settings": Settings::default(),
            "version": "0.1.0"
        }));
        assert!(matches!(result, Err(VaultError::Validation(_))));
    }

    #[test]
    fn test_active_id_resolution() {
        let a = ProfileRecord::new("A", ProfileFields::new());
        let mut snap = snapshot(vec![a.clone()]);
        assert!(snap.active_id_resolves());

        snap.active_profile_id = Some(a.id.clone());
        assert!(snap.active_id_resolves());

        snap.active_profile_id = Some(ProfileId::from("gone"));
        assert!(!snap.active_id_resolves());
    }
}
