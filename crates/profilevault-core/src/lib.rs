//! ProfileVault Core Library
//!
//! Encrypted profile and settings store reached through a typed async
//! request/response protocol.
//!
//! ## Overview
//!
//! ProfileVault keeps form-filling profiles (name, email, address, ...) and
//! a small settings record in a local key-value backend, encrypted at rest.
//! Callers never touch the store directly: they send typed requests through
//! a [`RouterClient`], the [`MessageRouter`] dispatches them to the store's
//! handlers, and a correlated [`Response`] comes back.
//!
//! ## Core Principles
//!
//! - **Single owner**: the [`ProfileStore`] is the only mutator of its keys
//! - **Encrypted at rest**: profiles and settings are ChaCha20-Poly1305 blobs
//! - **One active profile**: the selection never dangles
//!
//! ## Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use profilevault_core::{
//!     service, transport, MemoryBackend, MessageType, ProfileCipher, ProfileStore, Settings,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = Arc::new(ProfileStore::new(
//!         MemoryBackend::new(),
//!         ProfileCipher::from_environment(),
//!     ));
//!
//!     let (client, inbound) = transport::channel(64);
//!     let _router = service::serve(store, inbound).await?;
//!
//!     let settings: Settings = client.send_empty(MessageType::GetSettings).await?;
//!     println!("threshold: {}", settings.confidence_threshold);
//!
//!     Ok(())
//! }
//! ```

pub mod backend;
pub mod config;
pub mod crypto;
pub mod error;
pub mod fingerprint;
pub mod router;
pub mod service;
pub mod store;
pub mod transport;
pub mod types;

// Re-exports
pub use backend::{KeyValueBackend, MemoryBackend, RedbBackend};
pub use config::{VaultConfig, WriteMode};
pub use crypto::ProfileCipher;
pub use error::{VaultError, VaultResult};
pub use fingerprint::EnvironmentFingerprint;
pub use router::{ListeningRouter, MessageRouter, RouterState};
pub use service::{register_store_handlers, serve, Ack};
pub use store::ProfileStore;
pub use transport::{Envelope, RouterClient};
pub use types::*;
