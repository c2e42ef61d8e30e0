//! Environment fingerprint used to derive the at-rest encryption key.
//!
//! The key is never persisted. It is recomputed on every start from a few
//! stable attributes of the machine the store lives on:
//!
//! ```text
//! seed = "<host>-<platform>-<locale>"
//! key  = SHA-256(seed)
//! ```
//!
//! ## Weakness
//!
//! The seed has very little entropy. Anyone who can guess or read the host
//! name, platform, and locale can rebuild the key, so this only protects
//! against casual inspection of the database file. Embedders that need real
//! secrecy should build a [`ProfileCipher`](crate::crypto::ProfileCipher)
//! from an explicit key instead.

use sha2::{Digest, Sha256};

/// Locale used when the environment does not advertise one
const DEFAULT_LOCALE: &str = "en-US";

/// Host name used when none can be discovered
const DEFAULT_HOST: &str = "localhost";

/// Stable attributes of the runtime environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvironmentFingerprint {
    /// Host identifier (machine host name)
    pub host: String,
    /// Platform identifier (`<os>-<arch>`)
    pub platform: String,
    /// Locale tag (e.g. `en-US`)
    pub locale: String,
}

impl EnvironmentFingerprint {
    /// Build a fingerprint from explicit parts.
    pub fn new(
        host: impl Into<String>,
        platform: impl Into<String>,
        locale: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            platform: platform.into(),
            locale: locale.into(),
        }
    }

    /// Read the fingerprint of the current process environment.
    pub fn detect() -> Self {
        let host = std::env::var("HOSTNAME")
            .ok()
            .or_else(|| std::fs::read_to_string("/etc/hostname").ok())
            .map(|h| h.trim().to_string())
            .filter(|h| !h.is_empty())
            .unwrap_or_else(|| DEFAULT_HOST.to_string());

        let platform = format!("{}-{}", std::env::consts::OS, std::env::consts::ARCH);

        let locale = ["LC_ALL", "LANG"]
            .iter()
            .filter_map(|var| std::env::var(var).ok())
            .map(|l| normalize_locale(&l))
            .find(|l| !l.is_empty())
            .unwrap_or_else(|| DEFAULT_LOCALE.to_string());

        Self {
            host,
            platform,
            locale,
        }
    }

    /// The concatenated seed fed to the hash.
    pub fn seed(&self) -> String {
        format!("{}-{}-{}", self.host, self.platform, self.locale)
    }

    /// Derive the 32-byte symmetric key for this environment.
    pub fn derive_key(&self) -> [u8; 32] {
        let digest = Sha256::digest(self.seed().as_bytes());
        let mut key = [0u8; 32];
        key.copy_from_slice(&digest);
        key
    }
}

/// `en_US.UTF-8` -> `en-US`; `C` and `POSIX` carry no locale information.
fn normalize_locale(raw: &str) -> String {
    let tag = raw.split('.').next().unwrap_or_default().trim();
    if tag.eq_ignore_ascii_case("c") || tag.eq_ignore_ascii_case("posix") {
        return String::new();
    }
    tag.replace('_', "-")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seed_format() {
        let fp = EnvironmentFingerprint::new("desk", "linux-x86_64", "en-GB");
        assert_eq!(fp.seed(), "desk-linux-x86_64-en-GB");
    }

    #[test]
    fn test_same_environment_same_key() {
        let a = EnvironmentFingerprint::new("desk", "linux-x86_64", "en-GB");
        let b = EnvironmentFingerprint::new("desk", "linux-x86_64", "en-GB");
        assert_eq!(a.derive_key(), b.derive_key());
    }

    #[test]
    fn test_different_environment_different_key() {
        let a = EnvironmentFingerprint::new("desk", "linux-x86_64", "en-GB");
        let b = EnvironmentFingerprint::new("desk", "linux-x86_64", "fr-FR");
        assert_ne!(a.derive_key(), b.derive_key());
    }

    #[test]
    fn test_detect_is_stable() {
        assert_eq!(EnvironmentFingerprint::detect(), EnvironmentFingerprint::detect());
    }

    #[test]
    fn test_normalize_locale() {
        assert_eq!(normalize_locale("en_US.UTF-8"), "en-US");
        assert_eq!(normalize_locale("de_DE"), "de-DE");
        assert_eq!(normalize_locale("C"), "");
        assert_eq!(normalize_locale("POSIX"), "");
    }
}
