//! Core types for ProfileVault

pub mod message;
pub mod profile;
pub mod settings;
pub mod snapshot;

pub use message::{MessageType, Request, Response};
pub use profile::{ProfileField, ProfileFields, ProfileId, ProfileRecord};
pub use settings::{Settings, SettingsPatch};
pub use snapshot::StorageSnapshot;

/// Schema/version tag written on first run
pub const STORE_VERSION: &str = "0.1.0";
