//! Profile record type - the autofill data a user keeps per persona
//!
//! Field values live in [`ProfileFields`]: a closed set of well-known fields
//! plus an open map for anything else, serialized together as one flat JSON
//! object (`{"firstName": "Ada", "city": "London", "nickname": "A"}`).

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::de::Deserializer;
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Opaque, globally unique profile identifier.
///
/// Fresh ids are ULIDs, but any non-empty string read from storage or an
/// import is accepted as-is.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProfileId(String);

impl ProfileId {
    /// Create a new time-ordered ProfileId
    pub fn new() -> Self {
        Self(Ulid::new().to_string())
    }

    /// Borrow the id as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ProfileId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ProfileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ProfileId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ProfileId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Well-known profile fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ProfileField {
    FirstName,
    LastName,
    FullName,
    Email,
    Phone,
    DateOfBirth,
    AddressLine1,
    AddressLine2,
    City,
    State,
    PostalCode,
    Country,
}

impl ProfileField {
    /// Every known field, in display order
    pub const ALL: [ProfileField; 12] = [
        ProfileField::FirstName,
        ProfileField::LastName,
        ProfileField::FullName,
        ProfileField::Email,
        ProfileField::Phone,
        ProfileField::DateOfBirth,
        ProfileField::AddressLine1,
        ProfileField::AddressLine2,
        ProfileField::City,
        ProfileField::State,
        ProfileField::PostalCode,
        ProfileField::Country,
    ];

    /// Wire name of the field (camelCase)
    pub fn as_str(&self) -> &'static str {
        match self {
            ProfileField::FirstName => "firstName",
            ProfileField::LastName => "lastName",
            ProfileField::FullName => "fullName",
            ProfileField::Email => "email",
            ProfileField::Phone => "phone",
            ProfileField::DateOfBirth => "dateOfBirth",
            ProfileField::AddressLine1 => "addressLine1",
            ProfileField::AddressLine2 => "addressLine2",
            ProfileField::City => "city",
            ProfileField::State => "state",
            ProfileField::PostalCode => "postalCode",
            ProfileField::Country => "country",
        }
    }
}

impl fmt::Display for ProfileField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProfileField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ProfileField::ALL
            .iter()
            .copied()
            .find(|field| field.as_str() == s)
            .ok_or_else(|| format!("unknown profile field: {}", s))
    }
}

/// Field values of a profile.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileFields {
    known: BTreeMap<ProfileField, String>,
    extra: BTreeMap<String, String>,
}

impl ProfileFields {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style setter for a known field
    pub fn with(mut self, field: ProfileField, value: impl Into<String>) -> Self {
        self.set(field, value);
        self
    }

    /// Builder-style setter for any key, known or not
    pub fn with_key(mut self, key: &str, value: impl Into<String>) -> Self {
        self.set_key(key, value);
        self
    }

    pub fn get(&self, field: ProfileField) -> Option<&str> {
        self.known.get(&field).map(String::as_str)
    }

    pub fn set(&mut self, field: ProfileField, value: impl Into<String>) {
        self.known.insert(field, value.into());
    }

    pub fn remove(&mut self, field: ProfileField) -> Option<String> {
        self.known.remove(&field)
    }

    /// Look up a value by wire name, known or extra
    pub fn get_key(&self, key: &str) -> Option<&str> {
        match key.parse::<ProfileField>() {
            Ok(field) => self.get(field),
            Err(_) => self.extra.get(key).map(String::as_str),
        }
    }

    /// Set a value by wire name; unknown names land in the extra map
    pub fn set_key(&mut self, key: &str, value: impl Into<String>) {
        match key.parse::<ProfileField>() {
            Ok(field) => self.set(field, value),
            Err(_) => {
                self.extra.insert(key.to_string(), value.into());
            }
        }
    }

    /// Additional keys outside the known set
    pub fn extra(&self) -> &BTreeMap<String, String> {
        &self.extra
    }

    /// Shallow merge: every key in `patch` overwrites, every other key is kept.
    pub fn merge(&mut self, patch: ProfileFields) {
        self.known.extend(patch.known);
        self.extra.extend(patch.extra);
    }

    pub fn len(&self) -> usize {
        self.known.len() + self.extra.len()
    }

    pub fn is_empty(&self) -> bool {
        self.known.is_empty() && self.extra.is_empty()
    }

    /// Iterate `(wire name, value)` pairs, known fields first
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.known
            .iter()
            .map(|(field, value)| (field.as_str(), value.as_str()))
            .chain(self.extra.iter().map(|(k, v)| (k.as_str(), v.as_str())))
    }
}

impl Serialize for ProfileFields {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.len()))?;
        for (key, value) in self.iter() {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for ProfileFields {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        // `null` values mean "not set" and are dropped
        let raw = BTreeMap::<String, Option<String>>::deserialize(deserializer)?;
        let mut fields = ProfileFields::new();
        for (key, value) in raw {
            if let Some(value) = value {
                fields.set_key(&key, value);
            }
        }
        Ok(fields)
    }
}

/// A stored profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileRecord {
    /// Unique, immutable identifier
    pub id: ProfileId,

    /// Display name of the profile (e.g. "Work", "Personal")
    pub name: String,

    /// Unix timestamp (milliseconds) when the profile was created
    pub created_at: i64,

    /// Unix timestamp (milliseconds) of the last field mutation
    pub updated_at: i64,

    /// Field values used to fill forms
    #[serde(default)]
    pub data: ProfileFields,
}

impl ProfileRecord {
    /// Create a new profile with a fresh id
    pub fn new(name: impl Into<String>, data: ProfileFields) -> Self {
        let now = chrono::Utc::now().timestamp_millis();
        Self {
            id: ProfileId::new(),
            name: name.into(),
            created_at: now,
            updated_at: now,
            data,
        }
    }

    /// Refresh `updated_at`.
    ///
    /// The new value is always strictly greater than the old one, even when
    /// two mutations land within the same millisecond. A record already at
    /// `i64::MAX` stays there.
    pub fn touch(&mut self) {
        let now = chrono::Utc::now().timestamp_millis();
        self.updated_at = now.max(self.updated_at.saturating_add(1));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_touch_saturates_at_max_timestamp() {
        let mut record = ProfileRecord::new("Far future", ProfileFields::new());
        record.created_at = 0;
        record.updated_at = i64::MAX;

        record.touch();
        assert_eq!(record.updated_at, i64::MAX);
    }

    #[test]
    fn test_field_names_roundtrip() {
        for field in ProfileField::ALL {
            assert_eq!(field.as_str().parse::<ProfileField>().unwrap(), field);
        }
        assert!("nickname".parse::<ProfileField>().is_err());
    }

    #[test]
    fn test_fields_serialize_flat() {
        let fields = ProfileFields::new()
            .with(ProfileField::AddressLine1, "1 Main St")
            .with_key("nickname", "Ace");

        let json = serde_json::to_value(&fields).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"addressLine1": "1 Main St", "nickname": "Ace"})
        );
    }

    #[test]
    fn test_fields_deserialize_splits_known_and_extra() {
        let fields: ProfileFields = serde_json::from_value(serde_json::json!({
            "email": "ada@example.com",
            "loyaltyNumber": "X-1",
            "phone": null
        }))
        .unwrap();

        assert_eq!(fields.get(ProfileField::Email), Some("ada@example.com"));
        assert_eq!(fields.extra().get("loyaltyNumber").map(String::as_str), Some("X-1"));
        assert_eq!(fields.get(ProfileField::Phone), None);
        assert_eq!(fields.len(), 2);
    }

    #[test]
    fn test_merge_is_shallow_overwrite() {
        let mut base = ProfileFields::new()
            .with(ProfileField::City, "Old")
            .with(ProfileField::State, "Y");
        let patch = ProfileFields::new()
            .with(ProfileField::City, "X")
            .with_key("note", "n");

        base.merge(patch);

        assert_eq!(base.get(ProfileField::City), Some("X"));
        assert_eq!(base.get(ProfileField::State), Some("Y"));
        assert_eq!(base.get_key("note"), Some("n"));
    }

    #[test]
    fn test_new_record() {
        let record = ProfileRecord::new("Personal", ProfileFields::new());
        assert_eq!(record.name, "Personal");
        assert!(record.created_at > 0);
        assert_eq!(record.created_at, record.updated_at);
    }

    #[test]
    fn test_ids_are_unique() {
        assert_ne!(ProfileId::new(), ProfileId::new());
    }

    #[test]
    fn test_touch_is_strictly_increasing() {
        let mut record = ProfileRecord::new("Work", ProfileFields::new());
        let before = record.updated_at;

        record.touch();
        let first = record.updated_at;
        record.touch();

        assert!(first > before);
        assert!(record.updated_at > first);
        assert!(record.updated_at >= record.created_at);
    }

    #[test]
    fn test_record_wire_shape() {
        let record = ProfileRecord {
            id: ProfileId::from("p1"),
            name: "Home".to_string(),
            created_at: 1,
            updated_at: 2,
            data: ProfileFields::new().with(ProfileField::FirstName, "Ada"),
        };

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "id": "p1",
                "name": "Home",
                "createdAt": 1,
                "updatedAt": 2,
                "data": {"firstName": "Ada"}
            })
        );
    }

    #[test]
    fn test_record_ignores_legacy_is_active_flag() {
        let record: ProfileRecord = serde_json::from_value(serde_json::json!({
            "id": "p1",
            "name": "Home",
            "isActive": true,
            "createdAt": 1,
            "updatedAt": 1,
            "data": {}
        }))
        .unwrap();
        assert_eq!(record.id.as_str(), "p1");
    }
}
