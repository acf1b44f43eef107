//! Configuration providers.
//!
//! The pricing engine never reaches for ambient configuration; it is
//! handed a [`ConfigProvider`] and asks it for a [`RateTable`] snapshot
//! once per calculation.

use crate::config::{load_rate_tables_from_dir, select_rate_table, RateTable, SystemConfig, TierConfig};
use crate::error::Result;
use crate::models::WorkerTier;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

/// Source of the active rate table.
///
/// Providers must be thread-safe (`Send + Sync`) because quotes may be
/// computed concurrently across threads.  `rate_table` must not fail:
/// when the backing store is unreachable an implementation returns its
/// last-known-good table or a fixed fallback.
pub trait ConfigProvider: Send + Sync {
    fn rate_table(&self) -> Arc<RateTable>;

    fn system_config(&self) -> SystemConfig {
        self.rate_table().system.clone()
    }

    fn tier_config(&self, tier: WorkerTier) -> TierConfig {
        self.rate_table().tiers.get(tier).clone()
    }

    fn tier_for_points(&self, points: u64) -> WorkerTier {
        self.rate_table().tiers.tier_for_points(points)
    }

    /// Reload from the backing store.  Providers without one simply
    /// return their current table.
    fn refresh(&self) -> Result<Arc<RateTable>> {
        Ok(self.rate_table())
    }
}

impl<P: ConfigProvider + ?Sized> ConfigProvider for Arc<P> {
    fn rate_table(&self) -> Arc<RateTable> {
        (**self).rate_table()
    }

    fn refresh(&self) -> Result<Arc<RateTable>> {
        (**self).refresh()
    }
}

/// A fixed rate table.
#[derive(Debug, Clone, Default)]
pub struct StaticConfigProvider {
    table: Arc<RateTable>,
}

impl StaticConfigProvider {
    pub fn new(table: RateTable) -> Self {
        Self { table: Arc::new(table) }
    }
}

impl ConfigProvider for StaticConfigProvider {
    fn rate_table(&self) -> Arc<RateTable> {
        self.table.clone()
    }
}

/// Rate tables read from a directory of versioned JSON files.
///
/// The active table is swapped atomically on [`refresh`](ConfigProvider::refresh).
/// A failed refresh keeps the previous table.
#[derive(Debug)]
pub struct FileConfigProvider {
    dir: PathBuf,
    version: Option<String>,
    current: RwLock<Arc<RateTable>>,
}

impl FileConfigProvider {
    /// Load the rate table from `dir`.  When nothing usable is found the
    /// built-in reference table is used and a warning is logged.
    pub fn open(dir: impl Into<PathBuf>, version: Option<String>) -> Self {
        let dir = dir.into();
        let table = match Self::load(&dir, version.as_deref()) {
            Ok(table) => {
                tracing::info!(dir = %dir.display(), version = table.version(), "rate table loaded");
                table
            }
            Err(err) => {
                let fallback = RateTable::default();
                tracing::warn!(
                    dir = %dir.display(),
                    error = %err,
                    fallback_version = fallback.version(),
                    "no usable rate table; using built-in fallback"
                );
                fallback
            }
        };
        Self {
            dir,
            version,
            current: RwLock::new(Arc::new(table)),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn load(dir: &Path, version: Option<&str>) -> Result<RateTable> {
        let tables = load_rate_tables_from_dir(dir)?;
        select_rate_table(tables, version)
    }
}

impl ConfigProvider for FileConfigProvider {
    fn rate_table(&self) -> Arc<RateTable> {
        self.current.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn refresh(&self) -> Result<Arc<RateTable>> {
        match Self::load(&self.dir, self.version.as_deref()) {
            Ok(table) => {
                let table = Arc::new(table);
                let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
                if current.version() != table.version() {
                    tracing::info!(from = current.version(), to = table.version(), "rate table switched");
                }
                *current = table.clone();
                Ok(table)
            }
            Err(err) => {
                tracing::warn!(
                    dir = %self.dir.display(),
                    error = %err,
                    kept_version = self.rate_table().version(),
                    "rate table refresh failed; keeping last known good"
                );
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::fs;

    fn write_table(dir: &Path, file: &str, version: &str, revision: u32) {
        let mut table = RateTable::default();
        table.system.version = version.to_string();
        table.system.revision = revision;
        fs::write(dir.join(file), serde_json::to_string_pretty(&table).unwrap()).unwrap();
    }

    #[test]
    fn static_provider_resolves_tiers() {
        let provider = StaticConfigProvider::default();
        assert_eq!(provider.tier_config(WorkerTier::Starter).commission_fee, dec!(0.25));
        assert_eq!(provider.tier_for_points(0), WorkerTier::Starter);
        assert_eq!(provider.system_config().version, "default-v1");
        assert_eq!(provider.refresh().unwrap().version(), "default-v1");
    }

    #[test]
    fn file_provider_falls_back_when_directory_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let provider = FileConfigProvider::open(dir.path(), None);
        assert_eq!(*provider.rate_table(), RateTable::default());
    }

    #[test]
    fn file_provider_picks_up_new_versions_on_refresh() {
        let dir = tempfile::tempdir().unwrap();
        write_table(dir.path(), "a.json", "2024-01", 1);
        let provider = FileConfigProvider::open(dir.path(), None);
        assert_eq!(provider.rate_table().version(), "2024-01");

        write_table(dir.path(), "b.json", "2024-06", 2);
        assert_eq!(provider.refresh().unwrap().version(), "2024-06");
        assert_eq!(provider.system_config().version, "2024-06");
    }

    #[test]
    fn failed_refresh_keeps_last_known_good() {
        let dir = tempfile::tempdir().unwrap();
        write_table(dir.path(), "a.json", "2024-01", 1);
        let provider = FileConfigProvider::open(dir.path(), Some("2024-01".to_string()));

        fs::remove_file(dir.path().join("a.json")).unwrap();
        assert!(provider.refresh().is_err());
        assert_eq!(provider.rate_table().version(), "2024-01");
    }

    #[test]
    fn dated_table_beside_the_shipped_default_becomes_active() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("default-v1.json"),
            serde_json::to_string(&RateTable::default()).unwrap(),
        )
        .unwrap();
        write_table(dir.path(), "2025-03.json", "2025-03", 2);
        let provider = FileConfigProvider::open(dir.path(), None);
        assert_eq!(provider.rate_table().version(), "2025-03");
    }

    #[test]
    fn provider_works_behind_trait_object() {
        let provider: Arc<dyn ConfigProvider> = Arc::new(StaticConfigProvider::default());
        assert_eq!(provider.tier_for_points(2500), WorkerTier::Elite);
    }
}
