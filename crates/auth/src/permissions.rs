use std::borrow::Cow;
use std::collections::{BTreeMap, HashMap, HashSet};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use fieldperm_core::DomainError;

/// Permission identifier.
///
/// Permissions are opaque strings (e.g. "notes.read"). A required permission
/// is lower-cased before lookup; names coming from a permission source are
/// stored exactly as supplied.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Permission(Cow<'static, str>);

impl Permission {
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    /// Like [`Permission::new`], but rejects blank names.
    pub fn parse(name: impl Into<Cow<'static, str>>) -> Result<Self, DomainError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(DomainError::validation("permission name must not be empty"));
        }
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The form used when looking this permission up in a [`PermissionSet`].
    pub fn lookup_key(&self) -> String {
        self.0.to_lowercase()
    }
}

impl core::fmt::Display for Permission {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&'static str> for Permission {
    fn from(value: &'static str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Permission {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// Permissions as returned by a permission source.
///
/// Either a flat list of names, or a mapping from group key (tenant,
/// organisation, ...) to a list of names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawPermissions {
    Flat(Vec<String>),
    Grouped(BTreeMap<String, Vec<String>>),
}

impl RawPermissions {
    pub fn flat<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Flat(names.into_iter().map(Into::into).collect())
    }

    pub fn grouped<I, G, N, S>(groups: I) -> Self
    where
        I: IntoIterator<Item = (G, N)>,
        G: Into<String>,
        N: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Grouped(
            groups
                .into_iter()
                .map(|(group, names)| (group.into(), names.into_iter().map(Into::into).collect()))
                .collect(),
        )
    }

    /// Interpret a JSON document as raw permissions.
    ///
    /// Only an array of strings or an object of string arrays is accepted;
    /// anything else is rejected rather than coerced.
    pub fn from_json(value: serde_json::Value) -> Result<Self, NormalizeError> {
        let found = json_kind(&value);
        serde_json::from_value(value).map_err(|e| NormalizeError::UnsupportedShape {
            found,
            detail: e.to_string(),
        })
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NormalizeError {
    #[error("unsupported permission data: expected a list or a group mapping, found {found} ({detail})")]
    UnsupportedShape { found: &'static str, detail: String },
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "bool",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

/// Set of permission names (duplicates collapsed, order irrelevant).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct PermissionSet(HashSet<String>);

impl PermissionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Names sorted for stable diagnostics output.
    pub fn sorted(&self) -> Vec<String> {
        let mut names: Vec<String> = self.0.iter().cloned().collect();
        names.sort();
        names
    }
}

impl<S: Into<String>> FromIterator<S> for PermissionSet {
    fn from_iter<T: IntoIterator<Item = S>>(iter: T) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

/// Permissions in lookup form.
///
/// Derived once per request and shared read-only afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum NormalizedPermissions {
    Flat(PermissionSet),
    Grouped(HashMap<String, PermissionSet>),
}

impl NormalizedPermissions {
    /// The structure used when a request carries no permissions at all.
    pub fn empty() -> Self {
        Self::Flat(PermissionSet::new())
    }

    pub fn is_grouped(&self) -> bool {
        matches!(self, Self::Grouped(_))
    }

    /// Permissions of a single group; `None` for flat structures.
    pub fn group(&self, key: &str) -> Option<&PermissionSet> {
        match self {
            Self::Flat(_) => None,
            Self::Grouped(groups) => groups.get(key),
        }
    }
}

impl Default for NormalizedPermissions {
    fn default() -> Self {
        Self::empty()
    }
}

/// Convert raw permissions into lookup form.
pub fn normalize(raw: &RawPermissions) -> NormalizedPermissions {
    match raw {
        RawPermissions::Flat(names) => NormalizedPermissions::Flat(names.iter().cloned().collect()),
        RawPermissions::Grouped(groups) => NormalizedPermissions::Grouped(
            groups
                .iter()
                .map(|(group, names)| (group.clone(), names.iter().cloned().collect()))
                .collect(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn flat_duplicates_collapse() {
        let normalized = normalize(&RawPermissions::flat(["a", "b", "a"]));
        assert_eq!(normalized, NormalizedPermissions::Flat(PermissionSet::from_iter(["a", "b"])));
    }

    #[test]
    fn grouped_keeps_groups_apart() {
        let raw = RawPermissions::grouped([
            ("test1", vec!["foo", "bar", "fam"]),
            ("test2", vec!["x", "y", "z"]),
        ]);
        let normalized = normalize(&raw);

        let test1 = normalized.group("test1").unwrap();
        let test2 = normalized.group("test2").unwrap();
        assert!(test1.contains("foo") && test1.contains("bar") && test1.contains("fam"));
        assert!(test2.contains("x") && test2.contains("y") && test2.contains("z"));
        assert!(!test2.contains("foo"));
        assert!(!test1.contains("x"));
    }

    #[test]
    fn single_group_normalizes_to_set() {
        let normalized = normalize(&RawPermissions::grouped([("g1", vec!["a", "b"])]));
        let mut expected = HashMap::new();
        expected.insert("g1".to_string(), PermissionSet::from_iter(["a", "b"]));
        assert_eq!(normalized, NormalizedPermissions::Grouped(expected));
    }

    #[test]
    fn stored_names_keep_their_case() {
        let normalized = normalize(&RawPermissions::flat(["Notes.Read"]));
        let NormalizedPermissions::Flat(set) = normalized else {
            panic!("expected flat permissions");
        };
        assert!(set.contains("Notes.Read"));
        assert!(!set.contains("notes.read"));
    }

    #[test]
    fn json_list_and_mapping_are_accepted() {
        let flat = RawPermissions::from_json(json!(["permission1", "permission2"])).unwrap();
        assert_eq!(flat, RawPermissions::flat(["permission1", "permission2"]));

        let grouped = RawPermissions::from_json(json!({"group-1234": ["permission1"]})).unwrap();
        assert_eq!(grouped, RawPermissions::grouped([("group-1234", vec!["permission1"])]));
    }

    #[test]
    fn json_other_shapes_are_rejected() {
        for value in [json!("permission1"), json!(42), json!(null), json!({"g": "p"})] {
            let err = RawPermissions::from_json(value).unwrap_err();
            assert!(matches!(err, NormalizeError::UnsupportedShape { .. }));
        }
    }

    #[test]
    fn permission_parse_rejects_blank_names() {
        assert!(Permission::parse("  ").is_err());
        assert_eq!(Permission::parse("read").unwrap().as_str(), "read");
    }

    #[test]
    fn lookup_key_is_lower_case() {
        assert_eq!(Permission::new("Notes.READ").lookup_key(), "notes.read");
    }
}
