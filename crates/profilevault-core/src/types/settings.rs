//! Application settings

use serde::{Deserialize, Serialize};

use crate::error::VaultError;

/// Fixed-shape settings record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    /// Master switch for autofill
    pub enabled: bool,
    /// Show the inline fill button next to detected forms
    pub show_inline_button: bool,
    /// Detect forms automatically on page load
    pub auto_detect_forms: bool,
    /// Minimum field classification confidence, in `[0, 1]`
    pub confidence_threshold: f64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            enabled: true,
            show_inline_button: true,
            auto_detect_forms: true,
            confidence_threshold: 0.6,
        }
    }
}

impl Settings {
    /// Shallow-merge a patch and return the result.
    ///
    /// The receiver is left untouched if the patch is invalid.
    pub fn merged(&self, patch: &SettingsPatch) -> Result<Settings, VaultError> {
        patch.validate()?;
        Ok(Settings {
            enabled: patch.enabled.unwrap_or(self.enabled),
            show_inline_button: patch.show_inline_button.unwrap_or(self.show_inline_button),
            auto_detect_forms: patch.auto_detect_forms.unwrap_or(self.auto_detect_forms),
            confidence_threshold: patch
                .confidence_threshold
                .unwrap_or(self.confidence_threshold),
        })
    }

    /// Check the value ranges
    pub fn validate(&self) -> Result<(), VaultError> {
        validate_threshold(self.confidence_threshold)
    }
}

/// Partial settings update; absent fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub show_inline_button: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_detect_forms: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence_threshold: Option<f64>,
}

impl SettingsPatch {
    pub fn is_empty(&self) -> bool {
        self == &SettingsPatch::default()
    }

    pub fn validate(&self) -> Result<(), VaultError> {
        match self.confidence_threshold {
            Some(threshold) => validate_threshold(threshold),
            None => Ok(()),
        }
    }
}

fn validate_threshold(threshold: f64) -> Result<(), VaultError> {
    if (0.0..=1.0).contains(&threshold) {
        Ok(())
    } else {
        Err(VaultError::Validation(format!(
            "confidenceThreshold must be within [0, 1], got {}",
            threshold
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert!(settings.enabled);
        assert!(settings.show_inline_button);
        assert!(settings.auto_detect_forms);
        assert_eq!(settings.confidence_threshold, 0.6);
    }

    #[test]
    fn test_merge_keeps_absent_fields() {
        let patch = SettingsPatch {
            enabled: Some(false),
            ..Default::default()
        };
        let merged = Settings::default().merged(&patch).unwrap();

        assert!(!merged.enabled);
        assert!(merged.show_inline_button);
        assert_eq!(merged.confidence_threshold, 0.6);
    }

    #[test]
    fn test_threshold_out_of_range_rejected() {
        for bad in [-0.1, 1.5, f64::NAN] {
            let patch = SettingsPatch {
                confidence_threshold: Some(bad),
                ..Default::default()
            };
            assert!(matches!(
                Settings::default().merged(&patch),
                Err(VaultError::Validation(_))
            ));
        }
    }

    #[test]
    fn test_patch_wire_shape() {
        let patch: SettingsPatch =
            serde_json::from_value(serde_json::json!({"showInlineButton": false})).unwrap();
        assert_eq!(patch.show_inline_button, Some(false));
        assert_eq!(patch.enabled, None);
        assert!(!patch.is_empty());
        assert!(SettingsPatch::default().is_empty());
    }
}
