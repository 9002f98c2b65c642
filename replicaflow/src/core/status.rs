//! Run state and step outcome enums.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The step a replication run is in.
///
/// Steps are strictly ordered; a run only moves forward until it reaches
/// [`RunState::Done`] or [`RunState::Failed`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    /// Run created, identifiers not yet checked.
    Init,
    /// Merging task defaults with the registry override.
    ResolveConfig,
    /// Pulling data from the source (or the RAW layer).
    Extract,
    /// Writing into the CLEAN layer.
    Persist,
    /// Creating or replacing the catalog entry.
    Register,
    /// Running the post-write quality gate.
    QualityCheck,
    /// Publishing run metadata.
    Report,
    /// Terminal success.
    Done,
    /// Terminal failure.
    Failed,
}

impl Default for RunState {
    fn default() -> Self {
        Self::Init
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Init => write!(f, "init"),
            Self::ResolveConfig => write!(f, "resolve_config"),
            Self::Extract => write!(f, "extract"),
            Self::Persist => write!(f, "persist"),
            Self::Register => write!(f, "register"),
            Self::QualityCheck => write!(f, "quality_check"),
            Self::Report => write!(f, "report"),
            Self::Done => write!(f, "done"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

impl RunState {
    /// Returns true if the run has finished.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }

    /// Returns true if the run finished successfully.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Done)
    }
}

/// Why the quality gate did not run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualitySkipReason {
    /// `run_quality_check` is off for this table.
    Disabled,
    /// A full reload ran against an empty source and wrote nothing.
    ReloadNoOp,
}

impl fmt::Display for QualitySkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disabled => write!(f, "disabled"),
            Self::ReloadNoOp => write!(f, "reload_no_op"),
        }
    }
}

/// Outcome of the quality step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "outcome", content = "reason")]
pub enum QualityOutcome {
    /// The run never reached the quality step.
    NotRun,
    /// The step was reached but skipped.
    Skipped(QualitySkipReason),
    /// The check passed.
    Passed,
    /// The check failed.
    Failed,
}

impl Default for QualityOutcome {
    fn default() -> Self {
        Self::NotRun
    }
}

impl fmt::Display for QualityOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotRun => write!(f, "not_run"),
            Self::Skipped(reason) => write!(f, "skipped:{reason}"),
            Self::Passed => write!(f, "passed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_state_display() {
        assert_eq!(RunState::ResolveConfig.to_string(), "resolve_config");
        assert_eq!(RunState::QualityCheck.to_string(), "quality_check");
        assert_eq!(RunState::Done.to_string(), "done");
    }

    #[test]
    fn test_run_state_order() {
        assert!(RunState::Init < RunState::ResolveConfig);
        assert!(RunState::Extract < RunState::Persist);
        assert!(RunState::Register < RunState::QualityCheck);
        assert!(RunState::Report < RunState::Done);
    }

    #[test]
    fn test_run_state_terminal() {
        assert!(RunState::Done.is_terminal());
        assert!(RunState::Failed.is_terminal());
        assert!(!RunState::Report.is_terminal());
        assert!(!RunState::Failed.is_success());
    }

    #[test]
    fn test_quality_outcome_serialize() {
        let json = serde_json::to_string(&QualityOutcome::Skipped(QualitySkipReason::ReloadNoOp)).unwrap();
        assert_eq!(json, r#"{"outcome":"skipped","reason":"reload_no_op"}"#);

        let passed = serde_json::to_string(&QualityOutcome::Passed).unwrap();
        assert_eq!(passed, r#"{"outcome":"passed"}"#);
    }

    #[test]
    fn test_quality_outcome_display() {
        assert_eq!(
            QualityOutcome::Skipped(QualitySkipReason::Disabled).to_string(),
            "skipped:disabled"
        );
        assert_eq!(QualityOutcome::default().to_string(), "not_run");
    }
}
