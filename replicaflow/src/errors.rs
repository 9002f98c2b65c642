//! Error types for replication runs.
//!
//! Configuration and identity errors are raised before any side effect.
//! Extraction, persistence and catalog errors wrap the collaborator's own
//! error as `source` without altering it. Ancillary failures (monitors,
//! notifications, reporting) are never surfaced through this type; they are
//! logged and alerted where they happen.

use crate::core::SourceType;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// The main error type for replication operations.
#[derive(Debug, Error)]
pub enum ReplicationError {
    /// Malformed registry data, settings or enum strings.
    #[error("{0}")]
    Configuration(#[from] ConfigurationError),

    /// Required task identifiers are missing.
    #[error("{0}")]
    Identity(#[from] IdentityError),

    /// The registry declares a different source type than the task.
    #[error("{0}")]
    TypeMismatch(#[from] TypeMismatchError),

    /// The reader failed, or pre-extracted RAW data could not be read.
    #[error("Extraction failed for `{table}`: {source}")]
    Extraction {
        /// `source.db.table` of the task.
        table: String,
        /// The reader's error, unchanged.
        #[source]
        source: anyhow::Error,
    },

    /// The writer failed.
    #[error("Persistence failed for `{table}`: {source}")]
    Persistence {
        /// `source.db.table` of the task.
        table: String,
        /// The writer's error, unchanged.
        #[source]
        source: anyhow::Error,
    },

    /// A catalog operation failed during registration.
    #[error("Catalog operation `{operation}` failed for `{fq_name}`: {source}")]
    Catalog {
        /// Fully-qualified catalog name.
        fq_name: String,
        /// The catalog operation that failed.
        operation: &'static str,
        /// The catalog's error, unchanged.
        #[source]
        source: anyhow::Error,
    },

    /// The quality check ran and failed.
    #[error("{0}")]
    QualityCheckFailure(#[from] QualityCheckFailure),

    /// The quality checker itself could not complete.
    #[error("Quality check could not run for `{fq_name}`: {source}")]
    QualityCheck {
        /// Fully-qualified catalog name.
        fq_name: String,
        /// The checker's error, unchanged.
        #[source]
        source: anyhow::Error,
    },

    /// A run or metric reporter failed. Logged, never returned from a run.
    #[error("Reporting `{operation}` failed for `{fq_name}`: {source}")]
    Reporting {
        /// Fully-qualified catalog name.
        fq_name: String,
        /// The reporter call that failed.
        operation: &'static str,
        /// The reporter's error, unchanged.
        #[source]
        source: anyhow::Error,
    },

    /// Monitoring or rollback side work failed. Logged and alerted, never
    /// returned from a run.
    #[error("Ancillary step `{operation}` failed for `{table}`: {source}")]
    Ancillary {
        /// `db.table` the step ran for.
        table: String,
        /// The step that failed.
        operation: &'static str,
        /// The collaborator's error, unchanged.
        #[source]
        source: anyhow::Error,
    },
}

impl ReplicationError {
    /// Creates an extraction error.
    #[must_use]
    pub fn extraction(table: impl Into<String>, source: anyhow::Error) -> Self {
        Self::Extraction {
            table: table.into(),
            source,
        }
    }

    /// Creates a persistence error.
    #[must_use]
    pub fn persistence(table: impl Into<String>, source: anyhow::Error) -> Self {
        Self::Persistence {
            table: table.into(),
            source,
        }
    }

    /// Creates a catalog error.
    #[must_use]
    pub fn catalog(fq_name: impl Into<String>, operation: &'static str, source: anyhow::Error) -> Self {
        Self::Catalog {
            fq_name: fq_name.into(),
            operation,
            source,
        }
    }

    /// Creates a quality checker error.
    #[must_use]
    pub fn quality_check(fq_name: impl Into<String>, source: anyhow::Error) -> Self {
        Self::QualityCheck {
            fq_name: fq_name.into(),
            source,
        }
    }

    /// Creates a reporting error.
    #[must_use]
    pub fn reporting(fq_name: impl Into<String>, operation: &'static str, source: anyhow::Error) -> Self {
        Self::Reporting {
            fq_name: fq_name.into(),
            operation,
            source,
        }
    }

    /// Creates an ancillary error.
    #[must_use]
    pub fn ancillary(table: impl Into<String>, operation: &'static str, source: anyhow::Error) -> Self {
        Self::Ancillary {
            table: table.into(),
            operation,
            source,
        }
    }

    /// Returns true for failures that are logged instead of ending a run.
    #[must_use]
    pub fn is_ancillary(&self) -> bool {
        matches!(self, Self::Reporting { .. } | Self::Ancillary { .. })
    }

    /// Returns true for errors raised before any I/O took place.
    #[must_use]
    pub fn is_pre_flight(&self) -> bool {
        matches!(
            self,
            Self::Configuration(_) | Self::Identity(_) | Self::TypeMismatch(_)
        )
    }

    /// Diagnostic metadata used for the actionable log line on fatal paths.
    #[must_use]
    pub fn info(&self) -> ErrorInfo {
        match self {
            Self::Configuration(err) => ErrorInfo::new("REPL-001-CONFIG", err.to_string())
                .with_fix_hint("Check the registry YAML and the task arguments for typos or unknown values."),
            Self::Identity(err) => ErrorInfo::new("REPL-002-IDENTITY", err.to_string())
                .with_fix_hint("Provide source_name, db_name and table_name when constructing the task."),
            Self::TypeMismatch(err) => ErrorInfo::new("REPL-003-TYPE", err.to_string())
                .with_fix_hint("Use a task whose source type matches the registry, or fix the registry source_type.")
                .with_context_entry("declared", err.declared.to_string())
                .with_context_entry("registered", err.registered.to_string()),
            Self::Extraction { table, .. } => ErrorInfo::new("REPL-010-EXTRACT", self.to_string())
                .with_fix_hint("If extraction was skipped, reload the entire RAW folder with a full extraction.")
                .with_context_entry("table", table.clone()),
            Self::Persistence { table, .. } => ErrorInfo::new("REPL-011-PERSIST", self.to_string())
                .with_fix_hint("Nothing was registered; inspect the writer error and rerun the task.")
                .with_context_entry("table", table.clone()),
            Self::Catalog { fq_name, operation, .. } => {
                ErrorInfo::new("REPL-012-CATALOG", self.to_string())
                    .with_fix_hint("Data is persisted; rerun to retry registration.")
                    .with_context_entry("fq_name", fq_name.clone())
                    .with_context_entry("operation", (*operation).to_string())
            }
            Self::QualityCheckFailure(err) => ErrorInfo::new("REPL-020-DQC", err.to_string())
                .with_fix_hint("Inspect the source for missing or duplicated rows before rerunning.")
                .with_context_entry("fq_name", err.fq_name.clone())
                .with_context_entry("rolled_back", err.rolled_back.to_string()),
            Self::QualityCheck { fq_name, .. } => ErrorInfo::new("REPL-021-DQC-INFRA", self.to_string())
                .with_fix_hint("The check did not complete; data was not rolled back.")
                .with_context_entry("fq_name", fq_name.clone()),
            Self::Reporting { fq_name, operation, .. } => {
                ErrorInfo::new("REPL-030-REPORT", self.to_string())
                    .with_fix_hint("The run itself is unaffected; check the reporting backend.")
                    .with_context_entry("fq_name", fq_name.clone())
                    .with_context_entry("operation", (*operation).to_string())
            }
            Self::Ancillary { table, operation, .. } => {
                ErrorInfo::new("REPL-031-ANCILLARY", self.to_string())
                    .with_fix_hint("The run continued; repair the monitor or writer history manually.")
                    .with_context_entry("table", table.clone())
                    .with_context_entry("operation", (*operation).to_string())
            }
        }
    }
}

/// Metadata about an error for diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ErrorInfo {
    /// Error code (e.g., "REPL-003-TYPE").
    pub code: String,
    /// Short summary of the error.
    pub summary: String,
    /// Hint for fixing the error.
    pub fix_hint: Option<String>,
    /// Additional context key-value pairs.
    #[serde(default)]
    pub context: HashMap<String, String>,
}

impl ErrorInfo {
    /// Creates new error info.
    #[must_use]
    pub fn new(code: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            summary: summary.into(),
            fix_hint: None,
            context: HashMap::new(),
        }
    }

    /// Sets the fix hint.
    #[must_use]
    pub fn with_fix_hint(mut self, hint: impl Into<String>) -> Self {
        self.fix_hint = Some(hint.into());
        self
    }

    /// Adds a single context entry.
    #[must_use]
    pub fn with_context_entry(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    /// Converts to a dictionary representation.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        let mut map = HashMap::new();
        map.insert("code".to_string(), serde_json::Value::String(self.code.clone()));
        map.insert("summary".to_string(), serde_json::Value::String(self.summary.clone()));

        if let Some(ref hint) = self.fix_hint {
            map.insert("fix_hint".to_string(), serde_json::Value::String(hint.clone()));
        }
        if !self.context.is_empty() {
            let context_map: serde_json::Map<String, serde_json::Value> = self
                .context
                .iter()
                .map(|(k, v)| (k.clone(), serde_json::Value::String(v.clone())))
                .collect();
            map.insert("context".to_string(), serde_json::Value::Object(context_map));
        }

        map
    }
}

/// Error raised for malformed configuration.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct ConfigurationError {
    /// The error message.
    pub message: String,
    /// The file the problem was found in, if any.
    pub file: Option<String>,
}

impl ConfigurationError {
    /// Creates a new configuration error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            file: None,
        }
    }

    /// Creates an error for a string that matches no enum variant.
    #[must_use]
    pub fn unknown_variant(field: &str, raw: &str, allowed: &[&str]) -> Self {
        Self::new(format!(
            "Unknown {field} `{raw}`; expected one of: {}",
            allowed.join(", ")
        ))
    }

    /// Attaches the offending file, prefixing the message with it.
    #[must_use]
    pub fn in_file(mut self, file: impl Into<String>) -> Self {
        let file = file.into();
        self.message = format!("{file}: {}", self.message);
        self.file = Some(file);
        self
    }
}

/// Error raised when required task identifiers are missing.
#[derive(Debug, Clone, Error)]
#[error("Missing required task identifier(s): {}", missing.join(", "))]
pub struct IdentityError {
    /// Names of the empty identifiers.
    pub missing: Vec<String>,
}

impl IdentityError {
    /// Creates a new identity error.
    #[must_use]
    pub fn new(missing: Vec<String>) -> Self {
        Self { missing }
    }
}

/// Error raised when the registry and the task disagree on source type.
#[derive(Debug, Clone, Error)]
#[error("Source type mismatch for `{table}`: task declares {declared}, registry declares {registered}")]
pub struct TypeMismatchError {
    /// `source.db.table` of the task.
    pub table: String,
    /// The type the task was built as.
    pub declared: SourceType,
    /// The type recorded in the registry.
    pub registered: SourceType,
}

impl TypeMismatchError {
    /// Creates a new type mismatch error.
    #[must_use]
    pub fn new(table: impl Into<String>, declared: SourceType, registered: SourceType) -> Self {
        Self {
            table: table.into(),
            declared,
            registered,
        }
    }
}

/// Error raised when the post-write quality check fails.
#[derive(Debug, Clone, Error)]
#[error("Data quality check failed for `{fq_name}` (window {window_days}d, tolerance {low}..{high}){}", if *rolled_back { "; previous version restored" } else { "" })]
pub struct QualityCheckFailure {
    /// Fully-qualified catalog name.
    pub fq_name: String,
    /// Trailing window the check covered.
    pub window_days: u32,
    /// Lower tolerance bound.
    pub low: i64,
    /// Upper tolerance bound.
    pub high: i64,
    /// Whether the writer rolled back successfully.
    pub rolled_back: bool,
}
