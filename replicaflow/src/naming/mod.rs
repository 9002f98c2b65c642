//! Storage paths and catalog identifiers for replicated tables.
//!
//! Everything here is a pure function of its inputs. The layout is an
//! external contract shared with downstream readers:
//!
//! - catalog name: `{layer}_{team}_{db}.{table}`
//! - storage prefix: `{layer}/{team}/{db}/{table}`
//!
//! where `layer` is the layer token (`clean`, or `clean_test` in the test
//! environment) and every component is passed through [`normalize`].

use crate::core::{DataLayer, SourceType};
use crate::task::{TaskConfig, TaskIdentity};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

fn invalid_run() -> &'static Regex {
    static INVALID_RUN: OnceLock<Regex> = OnceLock::new();
    INVALID_RUN.get_or_init(|| Regex::new(r"[^a-z0-9_]+").expect("valid normalization regex"))
}

/// Lowercases `raw`, collapses every run of characters outside
/// `[a-z0-9_]` into one `_`, and trims `_` from both ends.
#[must_use]
pub fn normalize(raw: &str) -> String {
    let lowered = raw.to_lowercase();
    invalid_run()
        .replace_all(&lowered, "_")
        .trim_matches('_')
        .to_string()
}

/// The layer token, suffixed with `_test` in the test environment.
#[must_use]
pub fn layer_token(layer: DataLayer, test_env: bool) -> String {
    if test_env {
        format!("{}_test", layer.path_token())
    } else {
        layer.path_token().to_string()
    }
}

/// URI scheme a storage prefix is rendered with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageScheme {
    /// `s3://bucket/prefix`
    S3,
    /// `s3n://bucket/prefix`
    S3n,
    /// `dbfs:/mnt/bucket/prefix`
    Dbfs,
}

impl StorageScheme {
    /// Renders `prefix` inside `bucket`.
    #[must_use]
    pub fn render(&self, bucket: &str, prefix: &str) -> String {
        let bucket = bucket.trim_matches('/');
        let prefix = prefix.trim_start_matches('/');
        match self {
            Self::S3 => format!("s3://{bucket}/{prefix}"),
            Self::S3n => format!("s3n://{bucket}/{prefix}"),
            Self::Dbfs => format!("dbfs:/mnt/{bucket}/{prefix}"),
        }
    }
}

/// Naming inputs for one table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableNaming {
    /// Owning team.
    pub team: String,
    /// Designated test environment.
    pub test_env: bool,
    /// Database name as given by the task.
    pub db_name: String,
    /// Final table name (alias already applied).
    pub table_name: String,
    /// Source name, used only when `enrich` is set.
    pub source_name: Option<String>,
    /// Prefix the database component with the source name.
    pub enrich: bool,
}

impl TableNaming {
    /// Creates naming inputs without a source name.
    #[must_use]
    pub fn new(team: impl Into<String>, db_name: impl Into<String>, table_name: impl Into<String>) -> Self {
        Self {
            team: team.into(),
            test_env: false,
            db_name: db_name.into(),
            table_name: table_name.into(),
            source_name: None,
            enrich: false,
        }
    }

    /// Naming inputs of a task under its resolved configuration.
    ///
    /// The alias, when set, replaces the table name; the source name enriches
    /// the database component only with `use_enriched_naming`.
    #[must_use]
    pub fn for_task(identity: &TaskIdentity, config: &TaskConfig, test_env: bool) -> Self {
        let table_name = config.table_alias.as_deref().unwrap_or(&identity.table_name);
        Self::new(&config.team, &identity.db_name, table_name)
            .with_test_env(test_env)
            .with_source(&identity.source_name, config.use_enriched_naming)
    }

    /// Sets the test environment flag.
    #[must_use]
    pub fn with_test_env(mut self, test_env: bool) -> Self {
        self.test_env = test_env;
        self
    }

    /// Sets the source name and whether it enriches the database component.
    #[must_use]
    pub fn with_source(mut self, source_name: impl Into<String>, enrich: bool) -> Self {
        self.source_name = Some(source_name.into());
        self.enrich = enrich;
        self
    }

    /// The database component used in names and paths.
    #[must_use]
    pub fn effective_db_name(&self) -> String {
        match (&self.source_name, self.enrich) {
            (Some(source), true) => normalize(&format!("{source}_{}", self.db_name)),
            _ => self.db_name.clone(),
        }
    }

    /// Catalog identifier in `layer`.
    #[must_use]
    pub fn fq_name(&self, layer: DataLayer) -> String {
        format!(
            "{}_{}_{}.{}",
            layer_token(layer, self.test_env),
            normalize(&self.team),
            self.effective_db_name(),
            normalize(&self.table_name)
        )
    }

    /// Storage prefix in `layer`.
    #[must_use]
    pub fn path(&self, layer: DataLayer) -> String {
        format!(
            "{}/{}/{}/{}",
            layer_token(layer, self.test_env),
            normalize(&self.team),
            self.effective_db_name(),
            normalize(&self.table_name)
        )
    }

    /// Every name and path a replication task touches.
    #[must_use]
    pub fn location(&self, source_type: SourceType) -> TableLocation {
        TableLocation {
            fq_name: self.fq_name(DataLayer::Clean),
            raw_fq_name: self.fq_name(DataLayer::Raw),
            raw_path: self.path(DataLayer::Raw),
            clean_path: self.path(DataLayer::Clean),
            cached_path: source_type
                .has_cached_layer()
                .then(|| self.path(DataLayer::Cached)),
        }
    }
}

/// Derived names and paths of a replicated table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableLocation {
    /// CLEAN-layer catalog identifier.
    pub fq_name: String,
    /// RAW-layer catalog identifier.
    pub raw_fq_name: String,
    /// RAW-layer storage prefix.
    pub raw_path: String,
    /// CLEAN-layer storage prefix.
    pub clean_path: String,
    /// CACHED-layer storage prefix; third-party sources only.
    pub cached_path: Option<String>,
}

impl TableLocation {
    /// The CLEAN catalog identifier with the schema separator flattened,
    /// usable as a metric or monitor key.
    #[must_use]
    pub fn flat_name(&self) -> String {
        normalize(&self.fq_name.replace('.', "_"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("Data-Eng"), "data_eng");
        assert_eq!(normalize("  Sales // EU  "), "sales_eu");
        assert_eq!(normalize("__orders__"), "orders");
        assert_eq!(normalize("already_ok_1"), "already_ok_1");
    }

    #[test]
    fn test_layer_token_test_env() {
        assert_eq!(layer_token(DataLayer::Clean, false), "clean");
        assert_eq!(layer_token(DataLayer::Clean, true), "clean_test");
    }

    #[test]
    fn test_naming_is_deterministic() {
        let naming = TableNaming::new("data-eng", "orders", "customers");

        let first = naming.fq_name(DataLayer::Clean);
        let second = TableNaming::new("data-eng", "orders", "customers").fq_name(DataLayer::Clean);

        assert_eq!(first, "clean_data_eng_orders.customers");
        assert_eq!(first, second);
        assert_eq!(naming.path(DataLayer::Clean), "clean/data_eng/orders/customers");
    }

    #[test]
    fn test_enriched_db_name() {
        let naming = TableNaming::new("default", "Sales", "orders").with_source("PG-1", true);
        assert_eq!(naming.effective_db_name(), "pg_1_sales");
        assert_eq!(naming.fq_name(DataLayer::Clean), "clean_default_pg_1_sales.orders");

        let plain = TableNaming::new("default", "sales", "orders").with_source("pg1", false);
        assert_eq!(plain.effective_db_name(), "sales");
    }

    #[test]
    fn test_location_cached_only_for_third_party() {
        let naming = TableNaming::new("growth", "crm", "contacts").with_test_env(true);

        let api = naming.location(SourceType::ThirdParty);
        assert_eq!(api.cached_path.as_deref(), Some("cached_test/growth/crm/contacts"));
        assert_eq!(api.raw_path, "raw_test/growth/crm/contacts");
        assert_eq!(api.raw_fq_name, "raw_test_growth_crm.contacts");

        let db = naming.location(SourceType::Database);
        assert!(db.cached_path.is_none());
        assert_eq!(db.flat_name(), "clean_test_growth_crm_contacts");
    }

    #[test]
    fn test_for_task_applies_alias_and_enrichment() {
        let identity = TaskIdentity::new("pg1", "sales", "orders");
        let config = TaskConfig {
            team: "Data Eng".to_string(),
            table_alias: Some("orders_v2".to_string()),
            use_enriched_naming: true,
            ..TaskConfig::default()
        };

        let naming = TableNaming::for_task(&identity, &config, false);
        assert_eq!(naming.fq_name(DataLayer::Clean), "clean_data_eng_pg1_sales.orders_v2");

        let plain = TableNaming::for_task(&identity, &TaskConfig::default(), false);
        assert_eq!(plain.fq_name(DataLayer::Clean), "clean_default_sales.orders");
    }

    #[test]
    fn test_storage_scheme_render() {
        let prefix = "clean/data_eng/orders/customers";
        assert_eq!(StorageScheme::S3.render("lake", prefix), "s3://lake/clean/data_eng/orders/customers");
        assert_eq!(StorageScheme::S3n.render("lake/", prefix), "s3n://lake/clean/data_eng/orders/customers");
        assert_eq!(StorageScheme::Dbfs.render("lake", prefix), "dbfs:/mnt/lake/clean/data_eng/orders/customers");
    }
}
