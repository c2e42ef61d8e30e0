//! Store RPC facade: binds [`ProfileStore`] operations to message types.
//!
//! | Type                 | Payload                    | Data                     |
//! |----------------------|----------------------------|--------------------------|
//! | `GET_PROFILE`        | none                       | active profile or `null` |
//! | `UPDATE_PROFILE`     | `{ profileId, updates }`   | `{ success: true }`      |
//! | `SAVE_PROFILE`       | full profile record        | `{ success: true }`      |
//! | `GET_SETTINGS`       | none                       | settings                 |
//! | `UPDATE_SETTINGS`    | partial settings           | `{ success: true }`      |
//! | `LIST_PROFILES`      | none                       | array of profiles        |
//! | `DELETE_PROFILE`     | `{ profileId }`            | `{ success: true }`      |
//! | `SET_ACTIVE_PROFILE` | `{ profileId }`            | `{ success: true }`      |
//! | `EXPORT_DATA`        | none                       | snapshot                 |
//! | `IMPORT_DATA`        | snapshot                   | `{ success: true }`      |
//! | `CLEAR_ALL`          | none                       | `{ success: true }`      |

use std::sync::Arc;

use serde::de::IgnoredAny;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use crate::backend::KeyValueBackend;
use crate::error::{VaultError, VaultResult};
use crate::router::{ListeningRouter, MessageRouter};
use crate::store::ProfileStore;
use crate::transport::Inbound;
use crate::types::{MessageType, ProfileFields, ProfileId, ProfileRecord, SettingsPatch};

/// Payload of `UPDATE_PROFILE`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfilePayload {
    #[serde(default)]
    pub profile_id: Option<ProfileId>,
    #[serde(default)]
    pub updates: ProfileFields,
}

/// Payload of `DELETE_PROFILE` and `SET_ACTIVE_PROFILE`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileIdPayload {
    #[serde(default)]
    pub profile_id: Option<ProfileId>,
}

/// Reply of every mutating message type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ack {
    pub success: bool,
}

impl Ack {
    pub fn ok() -> Self {
        Self { success: true }
    }
}

fn missing(what: &str) -> VaultError {
    VaultError::MissingInput(format!("{} is required", what))
}

fn require_id(id: Option<ProfileId>) -> VaultResult<ProfileId> {
    id.filter(|id| !id.as_str().is_empty())
        .ok_or_else(|| missing("Profile ID"))
}

/// Unwrap a payload that the message type cannot run without
fn require<P>(payload: Option<P>, what: &str) -> VaultResult<P> {
    payload.ok_or_else(|| missing(what))
}

/// Register a handler for every store operation.
pub fn register_store_handlers<B: KeyValueBackend>(
    router: &mut MessageRouter,
    store: Arc<ProfileStore<B>>,
) {
    let s = Arc::clone(&store);
    router.on(MessageType::GetProfile, move |_: IgnoredAny| {
        let store = Arc::clone(&s);
        async move { Ok(store.get_active_profile().await) }
    });

    let s = Arc::clone(&store);
    router.on(MessageType::UpdateProfile, move |payload: Option<UpdateProfilePayload>| {
        let store = Arc::clone(&s);
        async move {
            let payload = payload.unwrap_or_default();
            let id = require_id(payload.profile_id)?;
            store.update_profile(&id, payload.updates).await?;
            Ok(Ack::ok())
        }
    });

    let s = Arc::clone(&store);
    router.on(MessageType::SaveProfile, move |record: Option<ProfileRecord>| {
        let store = Arc::clone(&s);
        async move {
            let record = require(record, "Profile data")?;
            store.save_profile(record).await?;
            Ok(Ack::ok())
        }
    });

    let s = Arc::clone(&store);
    router.on(MessageType::GetSettings, move |_: IgnoredAny| {
        let store = Arc::clone(&s);
        async move { Ok(store.get_settings().await) }
    });

    let s = Arc::clone(&store);
    router.on(MessageType::UpdateSettings, move |patch: Option<SettingsPatch>| {
        let store = Arc::clone(&s);
        async move {
            let patch = require(patch, "Settings data")?;
            store.update_settings(patch).await?;
            Ok(Ack::ok())
        }
    });

    let s = Arc::clone(&store);
    router.on(MessageType::ListProfiles, move |_: IgnoredAny| {
        let store = Arc::clone(&s);
        async move { Ok(store.list_profiles().await) }
    });

    let s = Arc::clone(&store);
    router.on(MessageType::DeleteProfile, move |payload: Option<ProfileIdPayload>| {
        let store = Arc::clone(&s);
        async move {
            let id = require_id(payload.and_then(|p| p.profile_id))?;
            store.delete_profile(&id).await?;
            Ok(Ack::ok())
        }
    });

    let s = Arc::clone(&store);
    router.on(MessageType::SetActiveProfile, move |payload: Option<ProfileIdPayload>| {
        let store = Arc::clone(&s);
        async move {
            let id = require_id(payload.and_then(|p| p.profile_id))?;
            store.set_active_profile(&id).await?;
            Ok(Ack::ok())
        }
    });

    let s = Arc::clone(&store);
    router.on(MessageType::ExportData, move |_: IgnoredAny| {
        let store = Arc::clone(&s);
        async move { store.export_snapshot().await }
    });

    let s = Arc::clone(&store);
    router.on(MessageType::ImportData, move |snapshot: Value| {
        let store = Arc::clone(&s);
        async move {
            store.import_snapshot_value(snapshot).await?;
            Ok(Ack::ok())
        }
    });

    router.on(MessageType::ClearAll, move |_: IgnoredAny| {
        let store = Arc::clone(&store);
        async move {
            store.clear_all().await?;
            Ok(Ack::ok())
        }
    });
}

/// Initialize the store, register its handlers and start listening.
pub async fn serve<B: KeyValueBackend>(
    store: Arc<ProfileStore<B>>,
    inbound: Inbound,
) -> VaultResult<ListeningRouter> {
    store.initialize().await?;

    let mut router = MessageRouter::new();
    register_store_handlers(&mut router, store);
    info!("Profile store service started");

    Ok(router.listen(inbound))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;
    use crate::crypto::ProfileCipher;
    use crate::types::{ProfileField, Request, Settings};
    use serde_json::json;

    async fn create_test_router() -> (MessageRouter, Arc<ProfileStore<MemoryBackend>>) {
        let store = Arc::new(ProfileStore::new(
            MemoryBackend::new(),
            ProfileCipher::new(&[5u8; 32]),
        ));
        store.initialize().await.unwrap();

        let mut router = MessageRouter::new();
        register_store_handlers(&mut router, Arc::clone(&store));
        (router, store)
    }

    #[tokio::test]
    async fn test_all_message_types_registered() {
        let (router, _store) = create_test_router().await;
        for kind in MessageType::KNOWN {
            assert!(router.handles(&kind), "missing handler for {}", kind);
        }
    }

    #[tokio::test]
    async fn test_get_profile_null_when_empty() {
        let (router, _store) = create_test_router().await;
        let response = router.dispatch(Request::new(MessageType::GetProfile)).await;

        assert!(response.success);
        assert_eq!(response.data, Some(Value::Null));
    }

    #[tokio::test]
    async fn test_save_then_get_profile() {
        let (router, _store) = create_test_router().await;
        let record = ProfileRecord::new(
            "Work",
            ProfileFields::new().with(ProfileField::Email, "a@example.com"),
        );

        let response = router
            .dispatch(
                Request::new(MessageType::SaveProfile)
                    .with_payload(serde_json::to_value(&record).unwrap()),
            )
            .await;
        assert_eq!(response.data, Some(json!({"success": true})));

        let response = router.dispatch(Request::new(MessageType::GetProfile)).await;
        let active: ProfileRecord = serde_json::from_value(response.data.unwrap()).unwrap();
        assert_eq!(active, record);
    }

    #[tokio::test]
    async fn test_update_profile_requires_id() {
        let (router, _store) = create_test_router().await;

        for payload in [json!({"updates": {"city": "X"}}), json!({"profileId": ""})] {
            let response = router
                .dispatch(Request::new(MessageType::UpdateProfile).with_payload(payload))
                .await;
            assert!(!response.success);
            assert_eq!(
                response.error.as_deref(),
                Some("Profile ID is required")
            );
        }
    }

    #[tokio::test]
    async fn test_missing_payload_names_required_input() {
        let (router, _store) = create_test_router().await;

        let cases = [
            (MessageType::UpdateProfile, "Profile ID is required"),
            (MessageType::DeleteProfile, "Profile ID is required"),
            (MessageType::SetActiveProfile, "Profile ID is required"),
            (MessageType::SaveProfile, "Profile data is required"),
            (MessageType::UpdateSettings, "Settings data is required"),
        ];
        for (kind, expected) in cases {
            let response = router
                .dispatch(Request::new(kind.clone()).with_request_id("r-7"))
                .await;
            assert!(!response.success, "{} accepted a missing payload", kind);
            assert_eq!(response.error.as_deref(), Some(expected));
            assert_eq!(response.request_id.as_deref(), Some("r-7"));
        }
    }

    #[tokio::test]
    async fn test_update_after_max_timestamp_save_succeeds() {
        let (router, store) = create_test_router().await;
        let mut record = ProfileRecord::new("Far future", ProfileFields::new());
        record.updated_at = i64::MAX;

        let response = router
            .dispatch(
                Request::new(MessageType::SaveProfile)
                    .with_payload(serde_json::to_value(&record).unwrap()),
            )
            .await;
        assert!(response.success);

        let response = router
            .dispatch(
                Request::new(MessageType::UpdateProfile)
                    .with_payload(json!({
                        "profileId": record.id.as_str(),
                        "updates": {"city": "X"}
                    }))
                    .with_request_id("r-8"),
            )
            .await;
        assert!(response.success);
        assert_eq!(response.request_id.as_deref(), Some("r-8"));

        let updated = store.get_profile(&record.id).await.unwrap();
        assert_eq!(updated.updated_at, i64::MAX);
        assert_eq!(updated.data.get(ProfileField::City), Some("X"));
    }

    #[tokio::test]
    async fn test_update_profile_merges_fields() {
        let (router, store) = create_test_router().await;
        let record = store
            .create_profile("A", ProfileFields::new().with(ProfileField::State, "Y"))
            .await
            .unwrap();

        let response = router
            .dispatch(Request::new(MessageType::UpdateProfile).with_payload(json!({
                "profileId": record.id.as_str(),
                "updates": {"city": "X"}
            })))
            .await;
        assert!(response.success);

        let updated = store.get_profile(&record.id).await.unwrap();
        assert_eq!(updated.data.get(ProfileField::City), Some("X"));
        assert_eq!(updated.data.get(ProfileField::State), Some("Y"));
    }

    #[tokio::test]
    async fn test_update_settings_rejects_out_of_range() {
        let (router, store) = create_test_router().await;

        let response = router
            .dispatch(
                Request::new(MessageType::UpdateSettings)
                    .with_payload(json!({"confidenceThreshold": 1.5})),
            )
            .await;

        assert!(!response.success);
        assert_eq!(store.get_settings().await, Settings::default());
    }

    #[tokio::test]
    async fn test_delete_missing_profile_reports_not_found() {
        let (router, _store) = create_test_router().await;

        let response = router
            .dispatch(
                Request::new(MessageType::DeleteProfile)
                    .with_payload(json!({"profileId": "ghost"}))
                    .with_request_id("r-9"),
            )
            .await;

        assert!(!response.success);
        assert_eq!(response.error.as_deref(), Some("Profile not found: ghost"));
        assert_eq!(response.request_id.as_deref(), Some("r-9"));
    }

    #[tokio::test]
    async fn test_import_malformed_snapshot() {
        let (router, _store) = create_test_router().await;

        let response = router
            .dispatch(
                Request::new(MessageType::ImportData).with_payload(json!({"profiles": 42})),
            )
            .await;

        assert!(!response.success);
        assert!(response.error.unwrap().starts_with("Invalid data format"));
    }
}
