//! ---
//! sh_section: "02-persistence-logging"
//! sh_subsection: "test"
//! sh_type: "source"
//! sh_scope: "code"
//! sh_description: "History store ordering, lookup, and update behaviour."
//! sh_version: "v0.1.0"
//! sh_owner: "tbd"
//! ---
use std::sync::Arc;
use std::thread;

use anyhow::Result;
use chrono::{Duration, Utc};
use stagehand_history::{ExecutionPatch, HistoryStore};
use stagehand_scenario::{ExecutionStatus, RunStatus, ScenarioExecution, ScenarioResult};
use tempfile::tempdir;

fn execution_at(id: &str, minutes_ago: i64) -> ScenarioExecution {
    let mut execution = ScenarioExecution::started(id, &["transfer"]);
    execution.timestamp = Utc::now() - Duration::minutes(minutes_ago);
    execution
}

#[test]
fn get_all_is_newest_first() -> Result<()> {
    let dir = tempdir()?;
    let store = HistoryStore::new(dir.path().join("history.json"));
    store.add_execution(execution_at("middle", 5))?;
    store.add_execution(execution_at("oldest", 10))?;
    store.add_execution(execution_at("newest", 1))?;

    let ids: Vec<_> = store.get_all()?.into_iter().map(|e| e.id).collect();
    assert_eq!(ids, vec!["newest", "middle", "oldest"]);

    let all = store.get_all()?;
    assert!(all.windows(2).all(|pair| pair[0].timestamp > pair[1].timestamp));
    Ok(())
}

#[test]
fn update_replaces_results_of_existing_record() -> Result<()> {
    let dir = tempdir()?;
    let store = HistoryStore::new(dir.path().join("history.json"));
    let mut execution = ScenarioExecution::started("exec-1", &["transfer"]);
    store.add_execution(execution.clone())?;

    let mut result = ScenarioResult::running("transfer");
    result.finish();
    execution.complete(vec![result], None);
    assert!(store.update_execution("exec-1", ExecutionPatch::from(execution))?);

    let stored = store.get_by_id("exec-1")?.expect("record present");
    assert_eq!(stored.status, ExecutionStatus::Completed);
    assert_eq!(stored.summary.passed, 1);
    assert_eq!(stored.summary.running, 0);
    assert_eq!(stored.scenarios[0].status, RunStatus::Passed);
    assert!(stored.duration.is_some());
    Ok(())
}

#[test]
fn update_of_unknown_id_is_a_no_op() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("history.json");
    let store = HistoryStore::new(&path);
    store.add_execution(execution_at("exec-1", 0))?;
    let before = std::fs::read(&path)?;

    let patch = ExecutionPatch {
        status: Some(ExecutionStatus::Failed),
        ..ExecutionPatch::default()
    };
    assert!(!store.update_execution("missing", patch)?);
    assert_eq!(std::fs::read(&path)?, before);
    assert!(store.get_by_id("missing")?.is_none());
    Ok(())
}

#[test]
fn records_survive_reopening() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("history.json");
    HistoryStore::new(&path).add_execution(execution_at("exec-1", 0))?;

    let reopened = HistoryStore::new(&path);
    assert_eq!(reopened.get_all()?.len(), 1);
    assert_eq!(
        reopened.get_by_id("exec-1")?.map(|e| e.summary.total),
        Some(1)
    );
    Ok(())
}

#[test]
fn concurrent_writers_do_not_lose_records() -> Result<()> {
    let dir = tempdir()?;
    let store = Arc::new(HistoryStore::new(dir.path().join("history.json")));
    let handles: Vec<_> = (0..8)
        .map(|n| {
            let store = Arc::clone(&store);
            thread::spawn(move || store.add_execution(execution_at(&format!("exec-{n}"), n)))
        })
        .collect();
    for handle in handles {
        handle.join().expect("writer thread panicked")?;
    }
    assert_eq!(store.get_all()?.len(), 8);
    Ok(())
}
