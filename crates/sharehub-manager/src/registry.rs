//! Driver registry for manager backends.
//!
//! Each manager kind (user shares, public shares, OCM shares) is built
//! from a driver name plus driver options out of the application
//! configuration. Registration is explicit: callers start from
//! [`ManagerRegistry::with_defaults`] and may add or replace drivers,
//! nothing self-registers at link time.

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;
use serde::Deserialize;
use tracing::info;

use sharehub_core::config::manager::ManagerConfig;
use sharehub_core::config::AppConfig;
use sharehub_core::error::AppError;
use sharehub_core::result::AppResult;
use sharehub_core::traits::MetadataStorage;
use sharehub_storage::LocalMetadataStorage;

use crate::json::{JsonPublicShareManager, JsonShareManager, JsonStore};
use crate::metadata::{MetadataPublicShareManager, MetadataShareManager};
use crate::ocm::JsonOcmShareStore;
use crate::sql::{self, SqlPublicShareManager, SqlShareManager};
use crate::traits::{DenyAllStatter, OcmShareStore, PublicShareManager, ShareManager};

type Ctor<T> = Box<dyn Fn(AppConfig) -> BoxFuture<'static, AppResult<Arc<T>>> + Send + Sync>;

/// Options for the metadata driver.
#[derive(Debug, Deserialize)]
struct MetadataOptions {
    /// Overrides the storage root from the `[storage]` section.
    #[serde(default)]
    root: Option<String>,
}

/// Options for the json driver.
#[derive(Debug, Deserialize)]
struct JsonOptions {
    file: String,
}

/// Options for the sql driver.
#[derive(Debug, Deserialize)]
struct SqlOptions {
    url: String,
}

/// Resolve the blob root for a metadata-backed manager: the section's
/// `root` option when set, the shared `[storage]` root otherwise.
fn storage_for(section: &ManagerConfig, config: &AppConfig) -> AppResult<Arc<dyn MetadataStorage>> {
    let options: MetadataOptions = section.decode()?;
    let root = options.root.unwrap_or_else(|| config.storage.root.clone());
    Ok(Arc::new(LocalMetadataStorage::new(&root)))
}

fn unknown_driver(kind: &str, driver: &str, known: &HashMap<String, impl Sized>) -> AppError {
    let mut names: Vec<&str> = known.keys().map(String::as_str).collect();
    names.sort_unstable();
    AppError::configuration(format!(
        "Unknown {kind} driver '{driver}' (known drivers: {})",
        names.join(", ")
    ))
}

/// Registry mapping driver names to manager constructors.
pub struct ManagerRegistry {
    shares: HashMap<String, Ctor<dyn ShareManager>>,
    public_shares: HashMap<String, Ctor<dyn PublicShareManager>>,
    ocm: HashMap<String, Ctor<dyn OcmShareStore>>,
}

impl std::fmt::Debug for ManagerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManagerRegistry")
            .field("shares", &self.shares.keys().collect::<Vec<_>>())
            .field("public_shares", &self.public_shares.keys().collect::<Vec<_>>())
            .field("ocm", &self.ocm.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl ManagerRegistry {
    /// An empty registry with no drivers.
    pub fn new() -> Self {
        Self {
            shares: HashMap::new(),
            public_shares: HashMap::new(),
            ocm: HashMap::new(),
        }
    }

    /// A registry with the built-in drivers registered: `metadata`,
    /// `json` and `sql` for shares and public shares, `json` for OCM.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();

        registry.register_share_driver("metadata", |config| {
            async move {
                let storage = storage_for(&config.shares, &config)?;
                let manager: Arc<dyn ShareManager> =
                    Arc::new(MetadataShareManager::new(storage, Arc::new(DenyAllStatter)));
                Ok(manager)
            }
            .boxed()
        });
        registry.register_share_driver("json", |config| {
            async move {
                let options: JsonOptions = config.shares.decode()?;
                let manager: Arc<dyn ShareManager> =
                    Arc::new(JsonShareManager::new(JsonStore::new(options.file)));
                Ok(manager)
            }
            .boxed()
        });
        registry.register_share_driver("sql", |config| {
            async move {
                let options: SqlOptions = config.shares.decode()?;
                let pool = sql::connect(&options.url).await?;
                let manager: Arc<dyn ShareManager> = Arc::new(SqlShareManager::new(pool));
                Ok(manager)
            }
            .boxed()
        });

        registry.register_public_share_driver("metadata", |config| {
            async move {
                let storage = storage_for(&config.public_shares, &config)?;
                let manager: Arc<dyn PublicShareManager> =
                    Arc::new(MetadataPublicShareManager::new(storage, &config.auth));
                Ok(manager)
            }
            .boxed()
        });
        registry.register_public_share_driver("json", |config| {
            async move {
                let options: JsonOptions = config.public_shares.decode()?;
                let manager: Arc<dyn PublicShareManager> = Arc::new(JsonPublicShareManager::new(
                    JsonStore::new(options.file),
                    &config.auth,
                ));
                Ok(manager)
            }
            .boxed()
        });
        registry.register_public_share_driver("sql", |config| {
            async move {
                let options: SqlOptions = config.public_shares.decode()?;
                let pool = sql::connect(&options.url).await?;
                let manager: Arc<dyn PublicShareManager> =
                    Arc::new(SqlPublicShareManager::new(pool, &config.auth));
                Ok(manager)
            }
            .boxed()
        });

        registry.register_ocm_driver("json", |config| {
            async move {
                let options: JsonOptions = config.ocm.decode()?;
                let store: Arc<dyn OcmShareStore> =
                    Arc::new(JsonOcmShareStore::new(JsonStore::new(options.file)));
                Ok(store)
            }
            .boxed()
        });

        registry
    }

    /// Register (or replace) a share manager driver.
    pub fn register_share_driver<F>(&mut self, name: impl Into<String>, ctor: F)
    where
        F: Fn(AppConfig) -> BoxFuture<'static, AppResult<Arc<dyn ShareManager>>>
            + Send
            + Sync
            + 'static,
    {
        self.shares.insert(name.into(), Box::new(ctor));
    }

    /// Register (or replace) a public share manager driver.
    pub fn register_public_share_driver<F>(&mut self, name: impl Into<String>, ctor: F)
    where
        F: Fn(AppConfig) -> BoxFuture<'static, AppResult<Arc<dyn PublicShareManager>>>
            + Send
            + Sync
            + 'static,
    {
        self.public_shares.insert(name.into(), Box::new(ctor));
    }

    /// Register (or replace) an OCM share store driver.
    pub fn register_ocm_driver<F>(&mut self, name: impl Into<String>, ctor: F)
    where
        F: Fn(AppConfig) -> BoxFuture<'static, AppResult<Arc<dyn OcmShareStore>>>
            + Send
            + Sync
            + 'static,
    {
        self.ocm.insert(name.into(), Box::new(ctor));
    }

    /// Build the share manager selected by `config.shares.driver`.
    pub async fn share_manager(&self, config: &AppConfig) -> AppResult<Arc<dyn ShareManager>> {
        let driver = &config.shares.driver;
        let ctor = self
            .shares
            .get(driver)
            .ok_or_else(|| unknown_driver("share", driver, &self.shares))?;
        let manager = ctor(config.clone()).await?;
        info!(%driver, "Constructed share manager");
        Ok(manager)
    }

    /// Build the public share manager selected by
    /// `config.public_shares.driver`.
    pub async fn public_share_manager(
        &self,
        config: &AppConfig,
    ) -> AppResult<Arc<dyn PublicShareManager>> {
        let driver = &config.public_shares.driver;
        let ctor = self
            .public_shares
            .get(driver)
            .ok_or_else(|| unknown_driver("public share", driver, &self.public_shares))?;
        let manager = ctor(config.clone()).await?;
        info!(%driver, "Constructed public share manager");
        Ok(manager)
    }

    /// Build the OCM share store selected by `config.ocm.driver`.
    pub async fn ocm_store(&self, config: &AppConfig) -> AppResult<Arc<dyn OcmShareStore>> {
        let driver = &config.ocm.driver;
        let ctor = self
            .ocm
            .get(driver)
            .ok_or_else(|| unknown_driver("OCM", driver, &self.ocm))?;
        let store = ctor(config.clone()).await?;
        info!(%driver, "Constructed OCM share store");
        Ok(store)
    }
}

impl Default for ManagerRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sharehub_core::config::manager::ManagerConfig;
    use sharehub_core::error::ErrorKind;

    fn config_in(dir: &tempfile::TempDir) -> AppConfig {
        let mut config = AppConfig::default();
        config.storage.root = dir.path().join("metadata").display().to_string();
        config.auth.bcrypt_cost = 4;
        config
    }

    #[tokio::test]
    async fn test_defaults_cover_all_builtin_drivers() {
        let dir = tempfile::tempdir().unwrap();
        let registry = ManagerRegistry::with_defaults();

        let mut config = config_in(&dir);
        config.shares = ManagerConfig::new("metadata");
        config.public_shares = ManagerConfig::new("metadata");
        registry.share_manager(&config).await.unwrap();
        registry.public_share_manager(&config).await.unwrap();

        config.shares = ManagerConfig::new("json")
            .with_option("file", dir.path().join("shares.json").display().to_string());
        config.public_shares = ManagerConfig::new("json")
            .with_option("file", dir.path().join("public.json").display().to_string());
        config.ocm = ManagerConfig::new("json")
            .with_option("file", dir.path().join("ocm.json").display().to_string());
        registry.share_manager(&config).await.unwrap();
        registry.public_share_manager(&config).await.unwrap();
        registry.ocm_store(&config).await.unwrap();

        config.shares = ManagerConfig::new("sql").with_option("url", "sqlite::memory:");
        config.public_shares = ManagerConfig::new("sql").with_option("url", "sqlite::memory:");
        registry.share_manager(&config).await.unwrap();
        registry.public_share_manager(&config).await.unwrap();
    }

    #[tokio::test]
    async fn test_unknown_driver_names_known_ones() {
        let dir = tempfile::tempdir().unwrap();
        let registry = ManagerRegistry::with_defaults();

        let mut config = config_in(&dir);
        config.shares = ManagerConfig::new("redis");
        let err = registry.share_manager(&config).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Configuration);
        assert!(err.message.contains("redis"));
        assert!(err.message.contains("json, metadata, sql"));
    }

    #[tokio::test]
    async fn test_missing_required_option_fails() {
        let dir = tempfile::tempdir().unwrap();
        let registry = ManagerRegistry::with_defaults();

        let mut config = config_in(&dir);
        config.shares = ManagerConfig::new("json");
        let err = registry.share_manager(&config).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Configuration);
    }

    #[tokio::test]
    async fn test_custom_driver_replaces_builtin() {
        let dir = tempfile::tempdir().unwrap();
        let mut registry = ManagerRegistry::with_defaults();
        registry.register_share_driver("json", |config| {
            async move {
                let options: JsonOptions = config.shares.decode()?;
                let manager: Arc<dyn ShareManager> =
                    Arc::new(JsonShareManager::new(JsonStore::new(options.file)));
                Ok(manager)
            }
            .boxed()
        });

        let mut config = config_in(&dir);
        config.shares = ManagerConfig::new("json")
            .with_option("file", dir.path().join("shares.json").display().to_string());
        registry.share_manager(&config).await.unwrap();
    }
}
