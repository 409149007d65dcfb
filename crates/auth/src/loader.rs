//! Permission loader: which application function supplies a user's permissions.
//!
//! The host names a source by two identifiers, a module and a method. Sources
//! are registered up front in a [`SourceRegistry`]; the loader resolves the
//! configured pair against it on every call and invokes the result.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use fieldperm_core::UserIdentity;

use crate::{NormalizedPermissions, RawPermissions, normalize};

pub const SRC_MODULE_ENV: &str = "FIELD_PERMISSION_SRC_MODULE";
pub const SRC_METHOD_ENV: &str = "FIELD_PERMISSION_SRC_METHOD";

#[derive(Debug, Error)]
pub enum LoaderError {
    #[error("configuration error: {0} not set")]
    Configuration(&'static str),

    #[error("permission source module not found at '{0}'")]
    ModuleNotFound(String),

    #[error("permission source method '{method}' not found on '{module}'")]
    MethodNotFound { module: String, method: String },

    /// The application's permission source itself failed.
    #[error(transparent)]
    Source(#[from] anyhow::Error),
}

impl LoaderError {
    /// The configured source could not be located.
    pub fn is_resolution(&self) -> bool {
        matches!(self, Self::ModuleNotFound(_) | Self::MethodNotFound { .. })
    }
}

/// Identifies the permission source: `src_module` + `src_method`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionSourceConfig {
    #[serde(default, alias = "SRC_MODULE")]
    pub src_module: Option<String>,
    #[serde(default, alias = "SRC_METHOD")]
    pub src_method: Option<String>,
}

impl PermissionSourceConfig {
    pub fn new(src_module: impl Into<String>, src_method: impl Into<String>) -> Self {
        Self {
            src_module: Some(src_module.into()),
            src_method: Some(src_method.into()),
        }
    }

    /// Read `FIELD_PERMISSION_SRC_MODULE` / `FIELD_PERMISSION_SRC_METHOD`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            src_module: lookup(SRC_MODULE_ENV),
            src_method: lookup(SRC_METHOD_ENV),
        }
    }

    /// Both identifiers, or a configuration error naming the first missing one.
    pub fn identifiers(&self) -> Result<(&str, &str), LoaderError> {
        let module = non_blank(self.src_module.as_deref()).ok_or(LoaderError::Configuration("SRC_MODULE"))?;
        let method = non_blank(self.src_method.as_deref()).ok_or(LoaderError::Configuration("SRC_METHOD"))?;
        Ok((module, method))
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Application-owned function returning a user's raw permissions.
///
/// Failures are the application's; they propagate unchanged, with no retry.
pub trait PermissionSource: Send + Sync {
    fn fetch(&self, user: &UserIdentity) -> anyhow::Result<RawPermissions>;
}

impl<F> PermissionSource for F
where
    F: Fn(&UserIdentity) -> anyhow::Result<RawPermissions> + Send + Sync,
{
    fn fetch(&self, user: &UserIdentity) -> anyhow::Result<RawPermissions> {
        self(user)
    }
}

/// Named permission sources grouped under one module identifier.
#[derive(Clone, Default)]
pub struct SourceModule {
    methods: HashMap<String, Arc<dyn PermissionSource>>,
}

impl SourceModule {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_method(mut self, name: impl Into<String>, source: impl PermissionSource + 'static) -> Self {
        self.methods.insert(name.into(), Arc::new(source));
        self
    }

    pub fn method(&self, name: &str) -> Option<Arc<dyn PermissionSource>> {
        self.methods.get(name).cloned()
    }
}

impl core::fmt::Debug for SourceModule {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let mut names: Vec<&str> = self.methods.keys().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_struct("SourceModule").field("methods", &names).finish()
    }
}

/// Every permission source the application makes available by name.
#[derive(Debug, Clone, Default)]
pub struct SourceRegistry {
    modules: HashMap<String, SourceModule>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_module(mut self, name: impl Into<String>, module: SourceModule) -> Self {
        self.modules.insert(name.into(), module);
        self
    }

    /// Register one source, creating its module if needed.
    pub fn register(
        &mut self,
        module: impl Into<String>,
        method: impl Into<String>,
        source: impl PermissionSource + 'static,
    ) -> &mut Self {
        self.modules
            .entry(module.into())
            .or_default()
            .methods
            .insert(method.into(), Arc::new(source));
        self
    }

    pub fn module(&self, name: &str) -> Option<&SourceModule> {
        self.modules.get(name)
    }
}

/// Resolves the configured permission source and invokes it.
///
/// Resolution is repeated on every call; caching belongs to the request
/// context.
#[derive(Debug, Clone)]
pub struct PermissionLoader {
    config: PermissionSourceConfig,
    registry: Arc<SourceRegistry>,
}

impl PermissionLoader {
    pub fn new(config: PermissionSourceConfig, registry: impl Into<Arc<SourceRegistry>>) -> Self {
        Self {
            config,
            registry: registry.into(),
        }
    }

    pub fn config(&self) -> &PermissionSourceConfig {
        &self.config
    }

    /// Locate the configured source. A missing method fails fast.
    pub fn resolve(&self) -> Result<Arc<dyn PermissionSource>, LoaderError> {
        let (module_name, method_name) = self.config.identifiers()?;

        let module = self.registry.module(module_name).ok_or_else(|| {
            tracing::error!(module = %module_name, "permission source module not found");
            LoaderError::ModuleNotFound(module_name.to_string())
        })?;

        module.method(method_name).ok_or_else(|| {
            tracing::error!(module = %module_name, method = %method_name, "permission source method not found");
            LoaderError::MethodNotFound {
                module: module_name.to_string(),
                method: method_name.to_string(),
            }
        })
    }

    /// Fetch a user's raw permissions from the configured source.
    pub fn load(&self, user: &UserIdentity) -> Result<RawPermissions, LoaderError> {
        let source = self.resolve()?;
        let raw = source.fetch(user).map_err(|e| {
            tracing::error!(user = %user, error = %e, "permission source failed");
            LoaderError::Source(e)
        })?;
        tracing::debug!(user = %user, permissions = ?raw, "loaded permissions");
        Ok(raw)
    }

    /// [`load`](Self::load) followed by [`normalize`].
    pub fn fetch_permissions(&self, user: &UserIdentity) -> Result<NormalizedPermissions, LoaderError> {
        Ok(normalize(&self.load(user)?))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use fieldperm_core::UserId;

    use super::*;

    fn single(_user: &UserIdentity) -> anyhow::Result<RawPermissions> {
        Ok(RawPermissions::flat(["permission1", "permission2", "permission3"]))
    }

    fn registry() -> SourceRegistry {
        SourceRegistry::new().with_module("fakemod", SourceModule::new().with_method("fakemethod", single))
    }

    fn user() -> UserIdentity {
        UserIdentity::new(UserId::new())
    }

    #[test]
    fn empty_config_is_a_configuration_error() {
        let loader = PermissionLoader::new(PermissionSourceConfig::default(), registry());
        assert!(matches!(loader.resolve(), Err(LoaderError::Configuration("SRC_MODULE"))));
    }

    #[test]
    fn missing_method_is_a_configuration_error() {
        let config = PermissionSourceConfig {
            src_module: Some("fakemod".to_string()),
            src_method: None,
        };
        let loader = PermissionLoader::new(config, registry());
        assert!(matches!(loader.resolve(), Err(LoaderError::Configuration("SRC_METHOD"))));
    }

    #[test]
    fn blank_identifiers_count_as_missing() {
        let loader = PermissionLoader::new(PermissionSourceConfig::new(" ", "fakemethod"), registry());
        assert!(matches!(loader.resolve(), Err(LoaderError::Configuration(_))));
    }

    #[test]
    fn unknown_module_fails_resolution() {
        let loader = PermissionLoader::new(PermissionSourceConfig::new("nomod", "fakemethod"), registry());
        let err = loader.load(&user()).unwrap_err();
        assert!(err.is_resolution());
        assert!(matches!(err, LoaderError::ModuleNotFound(m) if m == "nomod"));
    }

    #[test]
    fn unknown_method_fails_fast() {
        let loader = PermissionLoader::new(PermissionSourceConfig::new("fakemod", "nomethod"), registry());
        let err = loader.load(&user()).unwrap_err();
        assert!(err.is_resolution());
        assert!(matches!(err, LoaderError::MethodNotFound { .. }));
    }

    #[test]
    fn valid_config_loads_permissions() {
        let loader = PermissionLoader::new(PermissionSourceConfig::new("fakemod", "fakemethod"), registry());
        let raw = loader.load(&user()).unwrap();
        assert_eq!(raw, RawPermissions::flat(["permission1", "permission2", "permission3"]));
    }

    #[test]
    fn fetch_permissions_normalizes_groups() {
        let mut registry = SourceRegistry::new();
        registry.register("perms", "grouped", |_: &UserIdentity| -> anyhow::Result<RawPermissions> {
            Ok(RawPermissions::grouped([
                ("test1", vec!["foo", "bar", "fam"]),
                ("test2", vec!["x", "y", "z"]),
            ]))
        });
        let loader = PermissionLoader::new(PermissionSourceConfig::new("perms", "grouped"), registry);

        let permissions = loader.fetch_permissions(&user()).unwrap();
        assert!(permissions.group("test1").unwrap().contains("foo"));
        assert!(!permissions.group("test2").unwrap().contains("foo"));
    }

    #[test]
    fn source_receives_the_user() {
        let expected = user();
        let seen = expected.clone();
        let mut registry = SourceRegistry::new();
        registry.register("perms", "by_user", move |u: &UserIdentity| -> anyhow::Result<RawPermissions> {
            anyhow::ensure!(*u == seen, "unexpected user");
            Ok(RawPermissions::flat(["read"]))
        });
        let loader = PermissionLoader::new(PermissionSourceConfig::new("perms", "by_user"), registry);

        assert!(loader.load(&expected).is_ok());
        assert!(matches!(loader.load(&user()), Err(LoaderError::Source(_))));
    }

    #[test]
    fn resolution_is_not_cached() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let mut registry = SourceRegistry::new();
        registry.register("perms", "counted", move |_: &UserIdentity| -> anyhow::Result<RawPermissions> {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(RawPermissions::flat(["read"]))
        });
        let loader = PermissionLoader::new(PermissionSourceConfig::new("perms", "counted"), registry);

        loader.load(&user()).unwrap();
        loader.load(&user()).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn config_from_lookup_and_json() {
        let config = PermissionSourceConfig::from_lookup(|key| match key {
            SRC_MODULE_ENV => Some("fakemod".to_string()),
            SRC_METHOD_ENV => Some("fakemethod".to_string()),
            _ => None,
        });
        assert_eq!(config, PermissionSourceConfig::new("fakemod", "fakemethod"));

        let from_json: PermissionSourceConfig =
            serde_json::from_value(serde_json::json!({"SRC_MODULE": "fakemod"})).unwrap();
        assert_eq!(from_json.src_module.as_deref(), Some("fakemod"));
        assert!(from_json.src_method.is_none());
    }
}
