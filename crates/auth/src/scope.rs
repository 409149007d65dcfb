//! Scope-key derivation: reading a nested field off a resolved object.
//!
//! Data objects opt in by implementing [`FieldAccessor`], exposing only the
//! fields a scope path may walk through. [`impl_field_accessor!`] covers the
//! common "struct with named fields" case.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use thiserror::Error;

use fieldperm_core::{UserId, UserIdentity};

/// A value whose fields can be reached by name along a scope path.
pub trait FieldAccessor {
    /// Name used in error messages.
    fn type_name(&self) -> &'static str;

    /// The named field, or `None` if this value has no such field.
    fn field(&self, name: &str) -> Option<&dyn FieldAccessor>;

    /// String form used when this value ends a scope path; `None` for
    /// composite values, which cannot serve as a scope key.
    fn scope_value(&self) -> Option<String> {
        None
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PathResolutionError {
    #[error("'{segment}' not found on {type_name}. Modify the scope path '{path}'.")]
    MissingSegment {
        segment: String,
        type_name: &'static str,
        path: String,
    },

    #[error("scope path '{path}' ends on {type_name}, which has no scope value. Extend the path to a scalar field.")]
    NotAScopeValue { type_name: &'static str, path: String },
}

/// Walk `path` (dot-separated) from `data` and render the final value.
///
/// Every segment must resolve; there is no skip-missing mode.
pub fn derive_scope_key(data: &dyn FieldAccessor, path: &str) -> Result<String, PathResolutionError> {
    let mut current = data;
    for segment in path.split('.') {
        current = current.field(segment).ok_or_else(|| PathResolutionError::MissingSegment {
            segment: segment.to_string(),
            type_name: current.type_name(),
            path: path.to_string(),
        })?;
    }
    let key = current.scope_value().ok_or_else(|| PathResolutionError::NotAScopeValue {
        type_name: current.type_name(),
        path: path.to_string(),
    })?;
    tracing::debug!(path = %path, scope = %key, "derived scope key");
    Ok(key)
}

/// Implement [`FieldAccessor`] for a struct by listing the fields a scope
/// path may traverse.
///
/// ```ignore
/// struct Group { id: String }
/// impl_field_accessor!(Group { id });
/// ```
#[macro_export]
macro_rules! impl_field_accessor {
    ($t:ty { $($field:ident),* $(,)? }) => {
        impl $crate::scope::FieldAccessor for $t {
            fn type_name(&self) -> &'static str {
                stringify!($t)
            }

            fn field(&self, name: &str) -> Option<&dyn $crate::scope::FieldAccessor> {
                $(
                    if name == stringify!($field) {
                        return Some(&self.$field);
                    }
                )*
                None
            }
        }
    };
}

macro_rules! impl_scalar_accessor {
    ($($t:ty => $name:literal),* $(,)?) => {
        $(
            impl FieldAccessor for $t {
                fn type_name(&self) -> &'static str {
                    $name
                }

                fn field(&self, _name: &str) -> Option<&dyn FieldAccessor> {
                    None
                }

                fn scope_value(&self) -> Option<String> {
                    Some(self.to_string())
                }
            }
        )*
    };
}

impl_scalar_accessor!(
    String => "String",
    &'static str => "str",
    bool => "bool",
    i32 => "i32",
    i64 => "i64",
    u32 => "u32",
    u64 => "u64",
    usize => "usize",
    uuid::Uuid => "Uuid",
    UserId => "UserId",
);

crate::impl_field_accessor!(UserIdentity { user_id, username });

/// `None` has no fields and renders as an empty key, which no group matches.
impl<T: FieldAccessor> FieldAccessor for Option<T> {
    fn type_name(&self) -> &'static str {
        match self {
            Some(inner) => inner.type_name(),
            None => "None",
        }
    }

    fn field(&self, name: &str) -> Option<&dyn FieldAccessor> {
        self.as_ref().and_then(|inner| inner.field(name))
    }

    fn scope_value(&self) -> Option<String> {
        match self {
            Some(inner) => inner.scope_value(),
            None => Some(String::new()),
        }
    }
}

impl<T: FieldAccessor + ?Sized> FieldAccessor for Box<T> {
    fn type_name(&self) -> &'static str {
        (**self).type_name()
    }

    fn field(&self, name: &str) -> Option<&dyn FieldAccessor> {
        (**self).field(name)
    }

    fn scope_value(&self) -> Option<String> {
        (**self).scope_value()
    }
}

impl<T: FieldAccessor + ?Sized> FieldAccessor for Arc<T> {
    fn type_name(&self) -> &'static str {
        (**self).type_name()
    }

    fn field(&self, name: &str) -> Option<&dyn FieldAccessor> {
        (**self).field(name)
    }

    fn scope_value(&self) -> Option<String> {
        (**self).scope_value()
    }
}

impl<V: FieldAccessor> FieldAccessor for HashMap<String, V> {
    fn type_name(&self) -> &'static str {
        "HashMap"
    }

    fn field(&self, name: &str) -> Option<&dyn FieldAccessor> {
        self.get(name).map(|v| v as &dyn FieldAccessor)
    }
}

impl<V: FieldAccessor> FieldAccessor for BTreeMap<String, V> {
    fn type_name(&self) -> &'static str {
        "BTreeMap"
    }

    fn field(&self, name: &str) -> Option<&dyn FieldAccessor> {
        self.get(name).map(|v| v as &dyn FieldAccessor)
    }
}

/// JSON objects expose their keys; strings render without quotes. Objects and
/// arrays have no scope value.
impl FieldAccessor for serde_json::Value {
    fn type_name(&self) -> &'static str {
        match self {
            serde_json::Value::Null => "null",
            serde_json::Value::Bool(_) => "bool",
            serde_json::Value::Number(_) => "number",
            serde_json::Value::String(_) => "string",
            serde_json::Value::Array(_) => "array",
            serde_json::Value::Object(_) => "object",
        }
    }

    fn field(&self, name: &str) -> Option<&dyn FieldAccessor> {
        match self {
            serde_json::Value::Object(map) => map.get(name).map(|v| v as &dyn FieldAccessor),
            _ => None,
        }
    }

    fn scope_value(&self) -> Option<String> {
        match self {
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Array(_) | serde_json::Value::Object(_) => None,
            other => Some(other.to_string()),
        }
    }
}
