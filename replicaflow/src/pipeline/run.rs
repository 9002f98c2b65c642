//! Bookkeeping for one orchestrator invocation.

use crate::core::{QualityOutcome, RunState};
use crate::task::TaskIdentity;
use crate::utils::{format_iso8601, generate_run_id, run_started_at, Timestamp};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use tracing::debug;
use uuid::Uuid;

/// Key that run-report rows are written under.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunKey {
    /// CLEAN catalog identifier of the table.
    pub fq_name: String,
    /// Run start, truncated to whole seconds.
    pub started_at: Timestamp,
}

impl RunKey {
    /// Creates a run key.
    #[must_use]
    pub fn new(fq_name: impl Into<String>, started_at: Timestamp) -> Self {
        Self {
            fq_name: fq_name.into(),
            started_at,
        }
    }

    /// Stable hex digest of the key, usable as a row identifier.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.fq_name.as_bytes());
        hasher.update(b"|");
        hasher.update(format_iso8601(&self.started_at).as_bytes());
        hex::encode(hasher.finalize())
    }
}

/// State and per-step outcomes of one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineRun {
    /// Unique run identifier.
    pub run_id: Uuid,
    /// Table the run replicates.
    pub identity: TaskIdentity,
    /// CLEAN catalog identifier; empty until configuration is resolved.
    pub fq_name: String,
    /// Run start, truncated to whole seconds.
    pub started_at: Timestamp,
    /// Current state.
    pub state: RunState,
    /// Extraction (or the RAW read) completed.
    pub extracted: bool,
    /// The writer persisted new data.
    pub wrote_new_data: bool,
    /// The table was registered in the catalog.
    pub registered: bool,
    /// Quality gate outcome.
    pub quality: QualityOutcome,
    /// When the run reached a terminal state.
    pub finished_at: Option<Timestamp>,
    /// Failure message of a failed run.
    pub error: Option<String>,
}

impl PipelineRun {
    /// Starts a run for `identity`.
    #[must_use]
    pub fn start(identity: TaskIdentity) -> Self {
        Self {
            run_id: generate_run_id(),
            identity,
            fq_name: String::new(),
            started_at: run_started_at(),
            state: RunState::Init,
            extracted: false,
            wrote_new_data: false,
            registered: false,
            quality: QualityOutcome::NotRun,
            finished_at: None,
            error: None,
        }
    }

    /// Moves to `state`.
    pub fn advance(&mut self, state: RunState) {
        debug!(
            run_id = %self.run_id,
            table = %self.identity,
            from = %self.state,
            to = %state,
            "Run state transition"
        );
        self.state = state;
    }

    /// Marks the run done.
    pub fn complete(&mut self) {
        self.advance(RunState::Done);
        self.finished_at = Some(Utc::now());
    }

    /// Marks the run failed with `message`.
    pub fn fail(&mut self, message: impl Into<String>) {
        self.advance(RunState::Failed);
        self.error = Some(message.into());
        self.finished_at = Some(Utc::now());
    }

    /// The reporting key of this run.
    #[must_use]
    pub fn key(&self) -> RunKey {
        RunKey::new(self.fq_name.clone(), self.started_at)
    }

    /// Returns true once the run reached a terminal state.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.state.is_terminal()
    }

    /// Returns true if the run ended in `Done`.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.state.is_success()
    }

    /// Converts to a dictionary representation.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        let mut map = HashMap::new();
        map.insert("run_id".to_string(), serde_json::json!(self.run_id.to_string()));
        map.insert("table".to_string(), serde_json::json!(self.identity.qualified()));
        map.insert("fq_name".to_string(), serde_json::json!(self.fq_name));
        map.insert("started_at".to_string(), serde_json::json!(format_iso8601(&self.started_at)));
        map.insert("state".to_string(), serde_json::json!(self.state.to_string()));
        map.insert("extracted".to_string(), serde_json::json!(self.extracted));
        map.insert("wrote_new_data".to_string(), serde_json::json!(self.wrote_new_data));
        map.insert("registered".to_string(), serde_json::json!(self.registered));
        map.insert("quality".to_string(), serde_json::json!(self.quality.to_string()));

        if let Some(ref finished_at) = self.finished_at {
            map.insert("finished_at".to_string(), serde_json::json!(format_iso8601(finished_at)));
        }
        if let Some(ref error) = self.error {
            map.insert("error".to_string(), serde_json::json!(error));
        }

        map
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Timelike};

    #[test]
    fn test_start_state() {
        let run = PipelineRun::start(TaskIdentity::new("pg1", "sales", "orders"));
        assert_eq!(run.state, RunState::Init);
        assert_eq!(run.started_at.nanosecond(), 0);
        assert_eq!(run.quality, QualityOutcome::NotRun);
        assert!(!run.is_finished());
    }

    #[test]
    fn test_complete_and_fail() {
        let mut run = PipelineRun::start(TaskIdentity::new("pg1", "sales", "orders"));
        run.complete();
        assert!(run.is_success());
        assert!(run.finished_at.is_some());

        let mut failed = PipelineRun::start(TaskIdentity::new("pg1", "sales", "orders"));
        failed.fail("disk full");
        assert!(failed.is_finished());
        assert!(!failed.is_success());
        assert_eq!(failed.to_dict().get("error"), Some(&serde_json::json!("disk full")));
    }

    #[test]
    fn test_run_key_fingerprint_is_stable() {
        let ts = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let a = RunKey::new("clean_default_sales.orders", ts);
        let b = RunKey::new("clean_default_sales.orders", ts);
        let c = RunKey::new("clean_default_sales.refunds", ts);

        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_ne!(a.fingerprint(), c.fingerprint());
        assert_eq!(a.fingerprint().len(), 64);
    }
}
