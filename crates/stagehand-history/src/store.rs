//! ---
//! sh_section: "02-persistence-logging"
//! sh_subsection: "module"
//! sh_type: "source"
//! sh_scope: "code"
//! sh_description: "JSON-array history store with atomic rewrites."
//! sh_version: "v0.1.0"
//! sh_owner: "tbd"
//! ---
use std::fs;
use std::io::{BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use stagehand_scenario::{ExecutionStatus, ExecutionSummary, ScenarioExecution, ScenarioResult};
use tracing::debug;

use crate::{HistoryError, Result};

/// Fields replaced on an existing execution record. `None` leaves the
/// stored value untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExecutionPatch {
    /// New batch status.
    pub status: Option<ExecutionStatus>,
    /// New per-status counts.
    pub summary: Option<ExecutionSummary>,
    /// Replacement scenario results.
    pub scenarios: Option<Vec<ScenarioResult>>,
    /// Wall-clock duration in milliseconds.
    pub duration: Option<u64>,
    /// Reason the batch stopped early.
    pub error: Option<String>,
}

impl ExecutionPatch {
    /// Shallow-merge the patch into `execution`.
    pub fn apply(self, execution: &mut ScenarioExecution) {
        if let Some(status) = self.status {
            execution.status = status;
        }
        if let Some(summary) = self.summary {
            execution.summary = summary;
        }
        if let Some(scenarios) = self.scenarios {
            execution.scenarios = scenarios;
        }
        if let Some(duration) = self.duration {
            execution.duration = Some(duration);
        }
        if let Some(error) = self.error {
            execution.error = Some(error);
        }
    }
}

impl From<ScenarioExecution> for ExecutionPatch {
    /// Patch carrying every mutable field of a finished execution.
    fn from(execution: ScenarioExecution) -> Self {
        Self {
            status: Some(execution.status),
            summary: Some(execution.summary),
            scenarios: Some(execution.scenarios),
            duration: execution.duration,
            error: execution.error,
        }
    }
}

/// Execution history kept in one JSON document holding an array of
/// [`ScenarioExecution`] records.
///
/// Every mutation is a read-modify-write of the whole document, serialised
/// by an in-process lock and committed through a temp file rename so readers
/// never observe a partial write.
#[derive(Debug)]
pub struct HistoryStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl HistoryStore {
    /// Store backed by the document at `path`. Nothing is touched on disk.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// Location of the backing document.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create the parent directory and an empty document when absent.
    pub fn ensure_store(&self) -> Result<()> {
        let _guard = self.lock.lock();
        if self.path.is_file() {
            return Ok(());
        }
        self.write_all(&[])?;
        debug!(path = %self.path.display(), "history store initialised");
        Ok(())
    }

    /// Every record, newest first.
    pub fn get_all(&self) -> Result<Vec<ScenarioExecution>> {
        let mut executions = {
            let _guard = self.lock.lock();
            self.read_all()?
        };
        executions.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(executions)
    }

    /// The record with `id`, or `None` when there is no such record.
    pub fn get_by_id(&self, id: &str) -> Result<Option<ScenarioExecution>> {
        let _guard = self.lock.lock();
        Ok(self
            .read_all()?
            .into_iter()
            .find(|execution| execution.id == id))
    }

    /// Prepend a new record.
    pub fn add_execution(&self, execution: ScenarioExecution) -> Result<()> {
        let _guard = self.lock.lock();
        let mut executions = self.read_all()?;
        debug!(execution = %execution.id, "recording execution");
        executions.insert(0, execution);
        self.write_all(&executions)
    }

    /// Merge `patch` into the record with `id`. Returns `false`, and writes
    /// nothing, when no such record exists.
    pub fn update_execution(&self, id: &str, patch: ExecutionPatch) -> Result<bool> {
        let _guard = self.lock.lock();
        let mut executions = self.read_all()?;
        let Some(execution) = executions.iter_mut().find(|execution| execution.id == id) else {
            debug!(execution = id, "update skipped: execution not found");
            return Ok(false);
        };
        patch.apply(execution);
        self.write_all(&executions)?;
        Ok(true)
    }

    fn read_all(&self) -> Result<Vec<ScenarioExecution>> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(HistoryError::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        };
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Vec::new());
        }
        serde_json::from_slice(&bytes).map_err(|source| HistoryError::Json {
            path: self.path.clone(),
            source,
        })
    }

    fn write_all(&self, executions: &[ScenarioExecution]) -> Result<()> {
        let parent = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let io_err = |path: &Path, source| HistoryError::Io {
            path: path.to_path_buf(),
            source,
        };
        fs::create_dir_all(&parent).map_err(|err| io_err(&parent, err))?;

        let staged = tempfile::NamedTempFile::new_in(&parent).map_err(|err| io_err(&parent, err))?;
        let mut writer = BufWriter::new(staged);
        serde_json::to_writer_pretty(&mut writer, executions).map_err(|source| {
            HistoryError::Json {
                path: self.path.clone(),
                source,
            }
        })?;
        writer.flush().map_err(|err| io_err(&self.path, err))?;
        let staged = writer
            .into_inner()
            .map_err(|err| io_err(&self.path, err.into_error()))?;
        staged
            .persist(&self.path)
            .map_err(|err| io_err(&self.path, err.error))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stagehand_scenario::RunStatus;
    use tempfile::tempdir;

    #[test]
    fn missing_document_reads_as_empty() {
        let dir = tempdir().unwrap();
        let store = HistoryStore::new(dir.path().join("absent.json"));
        assert!(store.get_all().unwrap().is_empty());
        assert!(store.get_by_id("nonexistent").unwrap().is_none());
    }

    #[test]
    fn ensure_store_creates_empty_array_once() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested/data/history.json");
        let store = HistoryStore::new(&path);
        store.ensure_store().unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap().trim(), "[]");

        store
            .add_execution(ScenarioExecution::started("exec-1", &["mint"]))
            .unwrap();
        store.ensure_store().unwrap();
        assert_eq!(store.get_all().unwrap().len(), 1);
    }

    #[test]
    fn malformed_document_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("history.json");
        fs::write(&path, "{ nope").unwrap();
        let store = HistoryStore::new(&path);
        assert!(matches!(store.get_all(), Err(HistoryError::Json { .. })));
    }

    #[test]
    fn patch_is_a_shallow_merge() {
        let mut execution = ScenarioExecution::started("exec-1", &["mint", "burn"]);
        ExecutionPatch {
            status: Some(ExecutionStatus::Failed),
            error: Some("setup hook 'deploy' failed".into()),
            ..ExecutionPatch::default()
        }
        .apply(&mut execution);
        assert_eq!(execution.status, ExecutionStatus::Failed);
        assert_eq!(execution.summary.running, 2);
        assert_eq!(execution.scenarios[0].status, RunStatus::Running);
        assert!(execution.error.is_some());
    }
}
