//! Closed vocabularies used by replication tasks.
//!
//! Every enum here parses case-insensitively from its string form and fails
//! with a [`ConfigurationError`] on anything else, so a task or registry entry
//! carrying an unknown mode or format never gets past construction.

use crate::errors::ConfigurationError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

fn parse_variant<T: Copy>(
    field: &str,
    raw: &str,
    variants: &[(&str, T)],
) -> Result<T, ConfigurationError> {
    let needle = raw.trim().to_ascii_uppercase();
    variants
        .iter()
        .find(|(name, _)| *name == needle)
        .map(|(_, v)| *v)
        .ok_or_else(|| {
            let allowed: Vec<&str> = variants.iter().map(|(name, _)| *name).collect();
            ConfigurationError::unknown_variant(field, raw, &allowed)
        })
}

/// How the writer applies extracted data to the CLEAN layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE", try_from = "String")]
pub enum EtlMode {
    /// Merge new rows by upsert key.
    Incremental,
    /// Overwrite the whole table.
    FullReload,
}

impl Default for EtlMode {
    fn default() -> Self {
        Self::Incremental
    }
}

impl fmt::Display for EtlMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Incremental => write!(f, "INCREMENTAL"),
            Self::FullReload => write!(f, "FULL_RELOAD"),
        }
    }
}

impl FromStr for EtlMode {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_variant(
            "etl_mode",
            s,
            &[("INCREMENTAL", Self::Incremental), ("FULL_RELOAD", Self::FullReload)],
        )
    }
}

impl TryFrom<String> for EtlMode {
    type Error = ConfigurationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Storage layout of the CLEAN layer.
///
/// `VersionedColumnar` tables are registered through a symlink manifest and
/// keep a version history the writer can roll back to. `PlainColumnar`
/// tables are bare columnar files with no history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE", try_from = "String")]
pub enum DataFormat {
    /// Bare columnar files (parquet-style).
    PlainColumnar,
    /// Columnar files with a transaction log (delta-style).
    VersionedColumnar,
}

impl Default for DataFormat {
    fn default() -> Self {
        Self::PlainColumnar
    }
}

impl DataFormat {
    /// Whether the writer can restore the previous table version.
    #[must_use]
    pub fn supports_rollback(&self) -> bool {
        matches!(self, Self::VersionedColumnar)
    }

    /// Whether catalog DDL for this layout carries the manifest marker.
    #[must_use]
    pub fn uses_manifest_marker(&self) -> bool {
        matches!(self, Self::VersionedColumnar)
    }
}

impl fmt::Display for DataFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PlainColumnar => write!(f, "PLAIN_COLUMNAR"),
            Self::VersionedColumnar => write!(f, "VERSIONED_COLUMNAR"),
        }
    }
}

impl FromStr for DataFormat {
    type Err = ConfigurationError;

    // PARQUET and DELTA are accepted for task definitions written against
    // the engine-specific names.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_variant(
            "data_format",
            s,
            &[
                ("PLAIN_COLUMNAR", Self::PlainColumnar),
                ("VERSIONED_COLUMNAR", Self::VersionedColumnar),
                ("PARQUET", Self::PlainColumnar),
                ("DELTA", Self::VersionedColumnar),
            ],
        )
    }
}

impl TryFrom<String> for DataFormat {
    type Error = ConfigurationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// A named storage tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE", try_from = "String")]
pub enum DataLayer {
    /// Data as ingested from the source.
    Raw,
    /// Transformed, query-ready replication output.
    Clean,
    /// Snapshots of third-party API responses.
    Cached,
    /// Application-ready marts.
    App,
    /// Ad hoc dumps.
    Dump,
}

impl DataLayer {
    /// The token used in storage prefixes and catalog schema names.
    #[must_use]
    pub fn path_token(&self) -> &'static str {
        match self {
            Self::Raw => "raw",
            Self::Clean => "clean",
            Self::Cached => "cached",
            Self::App => "app",
            Self::Dump => "dump",
        }
    }
}

impl fmt::Display for DataLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path_token().to_ascii_uppercase())
    }
}

impl FromStr for DataLayer {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_variant(
            "data_layer",
            s,
            &[
                ("RAW", Self::Raw),
                ("CLEAN", Self::Clean),
                ("CACHED", Self::Cached),
                ("APP", Self::App),
                ("DUMP", Self::Dump),
            ],
        )
    }
}

impl TryFrom<String> for DataLayer {
    type Error = ConfigurationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// The kind of system a task replicates from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE", try_from = "String")]
pub enum SourceType {
    /// An external database.
    Database,
    /// A third-party REST API or SDK.
    ThirdParty,
    /// Files in an object store.
    File,
}

impl SourceType {
    /// Third-party sources keep a CACHED snapshot alongside RAW and CLEAN.
    #[must_use]
    pub fn has_cached_layer(&self) -> bool {
        matches!(self, Self::ThirdParty)
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Database => write!(f, "DATABASE"),
            Self::ThirdParty => write!(f, "THIRD_PARTY"),
            Self::File => write!(f, "FILE"),
        }
    }
}

impl FromStr for SourceType {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_variant(
            "source_type",
            s,
            &[
                ("DATABASE", Self::Database),
                ("THIRD_PARTY", Self::ThirdParty),
                ("FILE", Self::File),
            ],
        )
    }
}

impl TryFrom<String> for SourceType {
    type Error = ConfigurationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// A partition column with its declared position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionKey {
    /// Column name.
    pub column: String,
    /// Declared position; keys are sorted by this before use.
    #[serde(default)]
    pub order: u32,
    /// Optional expression deriving the partition value (e.g. `date(created_at)`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expression: Option<String>,
}

impl PartitionKey {
    /// Creates a partition key.
    #[must_use]
    pub fn new(column: impl Into<String>, order: u32) -> Self {
        Self {
            column: column.into(),
            order,
            expression: None,
        }
    }

    /// Sets the derivation expression.
    #[must_use]
    pub fn with_expression(mut self, expression: impl Into<String>) -> Self {
        self.expression = Some(expression.into());
        self
    }
}

/// A column rewrite applied by the writer before persisting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnTransformation {
    /// Target column.
    pub column: String,
    /// Expression producing the new value.
    pub expression: String,
}

impl ColumnTransformation {
    /// Creates a transformation.
    #[must_use]
    pub fn new(column: impl Into<String>, expression: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            expression: expression.into(),
        }
    }
}

/// A predicate restricting a backfill extraction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackfillFilter {
    /// Filtered column.
    pub column: String,
    /// Comparison operator as understood by the reader (`>=`, `<`, `=`).
    pub operator: String,
    /// Comparison value.
    pub value: serde_json::Value,
}

/// Allowed deviation band for the standard quality check, in percent.
///
/// Deserializes from a `[low, high]` pair through [`QualityTolerance::new`],
/// so an inverted band is rejected wherever it comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "(i64, i64)")]
pub struct QualityTolerance(i64, i64);

impl Default for QualityTolerance {
    fn default() -> Self {
        Self(-20, 10)
    }
}

impl TryFrom<(i64, i64)> for QualityTolerance {
    type Error = ConfigurationError;

    fn try_from((low, high): (i64, i64)) -> Result<Self, Self::Error> {
        Self::new(low, high)
    }
}

impl QualityTolerance {
    /// Creates a band, rejecting `low > high`.
    pub fn new(low: i64, high: i64) -> Result<Self, ConfigurationError> {
        if low > high {
            return Err(ConfigurationError::new(format!(
                "quality tolerance band is inverted: low {low} > high {high}"
            )));
        }
        Ok(Self(low, high))
    }

    /// Lower bound.
    #[must_use]
    pub fn low(&self) -> i64 {
        self.0
    }

    /// Upper bound.
    #[must_use]
    pub fn high(&self) -> i64 {
        self.1
    }
}
