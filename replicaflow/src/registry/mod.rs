//! Central registry of per-table configuration overrides.
//!
//! The registry is parsed once per process and read-only afterwards. Source,
//! database and table keys are matched case-insensitively, and entries
//! flagged inactive are dropped while building, so no lookup can see them.

mod loader;
mod models;

pub use loader::load_dir;
pub use models::{ConfigOverride, DatabaseRegistration, RegistryTask, RegistryType, SourceRegistration};

use crate::core::SourceType;
use crate::errors::ConfigurationError;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::OnceLock;
use tracing::{info, warn};

/// Read access to registered overrides.
pub trait Registry: Send + Sync {
    /// Makes sure the backing data is available.
    ///
    /// Registries that load lazily report a load failure here; every other
    /// method treats a failed load as an empty registry.
    fn ensure_loaded(&self) -> Result<(), ConfigurationError> {
        Ok(())
    }

    /// Returns true if an active source with this name exists.
    fn has_source(&self, source_name: &str) -> bool;

    /// Returns true if an active table entry exists.
    fn has_table(&self, source_name: &str, db_name: &str, table_name: &str) -> bool;

    /// Returns the active override for a table.
    fn get_override(&self, source_name: &str, db_name: &str, table_name: &str) -> Option<&ConfigOverride>;

    /// Returns the registered type of an active source.
    fn source_type(&self, source_name: &str) -> Option<SourceType>;
}

type TableMap = BTreeMap<String, ConfigOverride>;

#[derive(Debug, Clone)]
struct SourceEntry {
    source_type: SourceType,
    databases: BTreeMap<String, TableMap>,
}

/// An in-memory registry built from parsed source registrations.
#[derive(Debug, Clone, Default)]
pub struct ConfigRegistry {
    sources: BTreeMap<String, SourceEntry>,
}

fn key(name: &str) -> String {
    name.trim().to_lowercase()
}

impl ConfigRegistry {
    /// Creates a registry with no sources.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Builds a registry, dropping inactive sources and tables.
    ///
    /// # Errors
    ///
    /// Fails if two registrations (active or not) share a source name, or if
    /// two databases or tables collide once lower-cased.
    pub fn from_sources(sources: Vec<SourceRegistration>) -> Result<Self, ConfigurationError> {
        let mut seen = std::collections::HashSet::new();
        let mut registry = Self::default();

        for source in sources {
            let source_key = key(&source.source_name);
            if !seen.insert(source_key.clone()) {
                return Err(ConfigurationError::new(format!(
                    "Duplicated source name `{}`; it is already registered by another file",
                    source.source_name
                )));
            }
            if !source.is_active {
                info!(source = %source.source_name, "Skipping inactive registry source");
                continue;
            }

            let mut databases = BTreeMap::new();
            for (db_name, db) in source.databases {
                let mut tables = TableMap::new();
                for (table_name, entry) in db.tables {
                    if !entry.is_active {
                        continue;
                    }
                    if tables.insert(key(&table_name), entry).is_some() {
                        return Err(ConfigurationError::new(format!(
                            "Table `{table_name}` is registered twice under `{}.{db_name}`",
                            source.source_name
                        )));
                    }
                }
                if databases.insert(key(&db_name), tables).is_some() {
                    return Err(ConfigurationError::new(format!(
                        "Database `{db_name}` is registered twice under `{}`",
                        source.source_name
                    )));
                }
            }

            registry.sources.insert(
                source_key,
                SourceEntry {
                    source_type: source.source_type,
                    databases,
                },
            );
        }

        Ok(registry)
    }

    /// Number of active sources.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    /// Returns true if no active source is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Enumerates registered tables.
    ///
    /// Each given component narrows the listing: all three select a single
    /// table, source and database select that database's tables, a source
    /// alone selects everything under it, and no filter lists everything.
    #[must_use]
    pub fn list_tasks(
        &self,
        source_name: Option<&str>,
        db_name: Option<&str>,
        table_name: Option<&str>,
    ) -> Vec<RegistryTask> {
        let matches = |filter: Option<&str>, candidate: &str| filter.map_or(true, |f| key(f) == candidate);

        let mut tasks = Vec::new();
        for (source_key, source) in &self.sources {
            if !matches(source_name, source_key) {
                continue;
            }
            for (db_key, tables) in &source.databases {
                if !matches(db_name, db_key) {
                    continue;
                }
                for table_key in tables.keys() {
                    if matches(table_name, table_key) {
                        tasks.push(RegistryTask {
                            source_name: source_key.clone(),
                            db_name: db_key.clone(),
                            table_name: table_key.clone(),
                        });
                    }
                }
            }
        }
        tasks
    }

    /// Logs every table whose override carries unrecognized fields.
    ///
    /// Returns the number of such tables.
    pub fn alert_extra(&self) -> usize {
        let mut flagged = 0;
        for (source_key, source) in &self.sources {
            for (db_key, tables) in &source.databases {
                for (table_key, entry) in tables {
                    if entry.has_extra() {
                        flagged += 1;
                        let fields: Vec<&str> = entry.extra.keys().map(String::as_str).collect();
                        warn!(
                            table = %format!("{source_key}.{db_key}.{table_key}"),
                            extra = ?fields,
                            "Registry entry carries unrecognized fields; they are ignored"
                        );
                    }
                }
            }
        }
        flagged
    }

    fn table(&self, source_name: &str, db_name: &str, table_name: &str) -> Option<&ConfigOverride> {
        self.sources
            .get(&key(source_name))?
            .databases
            .get(&key(db_name))?
            .get(&key(table_name))
    }
}

impl Registry for ConfigRegistry {
    fn has_source(&self, source_name: &str) -> bool {
        self.sources.contains_key(&key(source_name))
    }

    fn has_table(&self, source_name: &str, db_name: &str, table_name: &str) -> bool {
        self.table(source_name, db_name, table_name).is_some()
    }

    fn get_override(&self, source_name: &str, db_name: &str, table_name: &str) -> Option<&ConfigOverride> {
        self.table(source_name, db_name, table_name)
    }

    fn source_type(&self, source_name: &str) -> Option<SourceType> {
        self.sources.get(&key(source_name)).map(|s| s.source_type)
    }
}

/// A registry read from disk on first access, then kept for the process.
///
/// Construct one per process and share it (`Arc<LazyRegistry>`) with every
/// task run; the directory is parsed at most once.
#[derive(Debug)]
pub struct LazyRegistry {
    root: Option<PathBuf>,
    cell: OnceLock<Result<ConfigRegistry, ConfigurationError>>,
}

impl LazyRegistry {
    /// Creates a lazy registry over `root`.
    ///
    /// `None` means no registry is configured; lookups then see nothing.
    #[must_use]
    pub fn new(root: Option<PathBuf>) -> Self {
        Self {
            root,
            cell: OnceLock::new(),
        }
    }

    /// Returns true once the first load has happened.
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.cell.get().is_some()
    }

    /// Loads on first call and returns the parsed registry.
    pub fn get(&self) -> Result<&ConfigRegistry, ConfigurationError> {
        self.cell
            .get_or_init(|| match &self.root {
                Some(root) => load_dir(root),
                None => {
                    info!("No registry path configured; tasks run on caller defaults");
                    Ok(ConfigRegistry::empty())
                }
            })
            .as_ref()
            .map_err(Clone::clone)
    }
}

impl Registry for LazyRegistry {
    fn ensure_loaded(&self) -> Result<(), ConfigurationError> {
        self.get().map(|_| ())
    }

    fn has_source(&self, source_name: &str) -> bool {
        self.get().map_or(false, |r| r.has_source(source_name))
    }

    fn has_table(&self, source_name: &str, db_name: &str, table_name: &str) -> bool {
        self.get().map_or(false, |r| r.has_table(source_name, db_name, table_name))
    }

    fn get_override(&self, source_name: &str, db_name: &str, table_name: &str) -> Option<&ConfigOverride> {
        self.get().ok()?.get_override(source_name, db_name, table_name)
    }

    fn source_type(&self, source_name: &str) -> Option<SourceType> {
        self.get().ok()?.source_type(source_name)
    }
}
