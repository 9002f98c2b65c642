//! Decides when a catalog table must be dropped and rebuilt.

use crate::core::{DataFormat, EtlMode};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Marker present in the DDL of tables registered through a symlink
/// manifest, i.e. the versioned layout.
pub const MANIFEST_MARKER: &str = "_symlink_format_manifest";

/// Which rule produced a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecreationReason {
    /// The catalog has no DDL for the table.
    MissingDdl,
    /// The table is registered as versioned but the task writes plain files.
    VersionedToPlain,
    /// The table is registered as plain but the task writes versioned files.
    PlainToVersioned,
    /// Full reloads always start from a clean table.
    FullReload,
    /// The caller asked for a drop the rules did not require.
    Forced,
    /// No rule applies; the existing table is kept.
    Unchanged,
}

impl fmt::Display for RecreationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingDdl => write!(f, "missing_ddl"),
            Self::VersionedToPlain => write!(f, "versioned_to_plain"),
            Self::PlainToVersioned => write!(f, "plain_to_versioned"),
            Self::FullReload => write!(f, "full_reload"),
            Self::Forced => write!(f, "forced"),
            Self::Unchanged => write!(f, "unchanged"),
        }
    }
}

/// Outcome of the recreation policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecreationDecision {
    /// Drop the existing table before creating it.
    pub recreate: bool,
    /// The rule that decided.
    pub reason: RecreationReason,
}

impl RecreationDecision {
    fn recreate(reason: RecreationReason) -> Self {
        Self {
            recreate: true,
            reason,
        }
    }

    fn keep() -> Self {
        Self {
            recreate: false,
            reason: RecreationReason::Unchanged,
        }
    }

    /// ORs a caller force-drop into the decision.
    ///
    /// A mandated recreation keeps its reason; forcing only changes a
    /// `keep` decision.
    #[must_use]
    pub fn with_force(self, force: bool) -> Self {
        if force && !self.recreate {
            Self::recreate(RecreationReason::Forced)
        } else {
            self
        }
    }
}

/// The table recreation rules. First matching rule wins.
#[derive(Debug, Clone, Copy, Default)]
pub struct RecreationPolicy;

impl RecreationPolicy {
    /// Creates the policy.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Decides from the current DDL and the task's declared format and mode.
    #[must_use]
    pub fn decide(&self, ddl: Option<&str>, format: DataFormat, mode: EtlMode) -> RecreationDecision {
        let Some(ddl) = ddl else {
            return RecreationDecision::recreate(RecreationReason::MissingDdl);
        };

        let has_marker = ddl.contains(MANIFEST_MARKER);
        if has_marker && !format.uses_manifest_marker() {
            return RecreationDecision::recreate(RecreationReason::VersionedToPlain);
        }
        if !has_marker && format.uses_manifest_marker() {
            return RecreationDecision::recreate(RecreationReason::PlainToVersioned);
        }
        if mode == EtlMode::FullReload {
            return RecreationDecision::recreate(RecreationReason::FullReload);
        }
        RecreationDecision::keep()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const VERSIONED_DDL: &str =
        "CREATE EXTERNAL TABLE t (id bigint) LOCATION 's3://lake/clean/t/_symlink_format_manifest'";
    const PLAIN_DDL: &str = "CREATE EXTERNAL TABLE t (id bigint) STORED AS PARQUET LOCATION 's3://lake/clean/t'";

    fn decide(ddl: Option<&str>, format: DataFormat, mode: EtlMode) -> RecreationDecision {
        RecreationPolicy::new().decide(ddl, format, mode)
    }

    #[test]
    fn test_rule_table() {
        use DataFormat::{PlainColumnar as Plain, VersionedColumnar as Versioned};
        use EtlMode::{FullReload, Incremental};
        use RecreationReason as R;

        let cases = [
            (None, Plain, Incremental, true, R::MissingDdl),
            (None, Versioned, FullReload, true, R::MissingDdl),
            (Some(VERSIONED_DDL), Plain, Incremental, true, R::VersionedToPlain),
            (Some(PLAIN_DDL), Versioned, Incremental, true, R::PlainToVersioned),
            (Some(PLAIN_DDL), Plain, FullReload, true, R::FullReload),
            (Some(VERSIONED_DDL), Versioned, FullReload, true, R::FullReload),
            (Some(PLAIN_DDL), Plain, Incremental, false, R::Unchanged),
            (Some(VERSIONED_DDL), Versioned, Incremental, false, R::Unchanged),
        ];

        for (ddl, format, mode, recreate, reason) in cases {
            let decision = decide(ddl, format, mode);
            assert_eq!(
                decision,
                RecreationDecision { recreate, reason },
                "ddl={ddl:?} format={format} mode={mode}"
            );
        }
    }

    #[test]
    fn test_force_never_weakens() {
        let mandated = decide(None, DataFormat::PlainColumnar, EtlMode::Incremental);
        assert_eq!(mandated.with_force(false), mandated);
        assert_eq!(mandated.with_force(true), mandated);
    }

    #[test]
    fn test_force_overrides_keep() {
        let keep = decide(Some(PLAIN_DDL), DataFormat::PlainColumnar, EtlMode::Incremental);
        assert!(!keep.recreate);

        let forced = keep.with_force(true);
        assert!(forced.recreate);
        assert_eq!(forced.reason, RecreationReason::Forced);
        assert_eq!(keep.with_force(false), keep);
    }
}
