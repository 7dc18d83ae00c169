//! Concurrency tests for wplan.
//!
//! These tests verify that multiple processes can safely:
//! - Mutate the same plan store simultaneously (file locking)
//! - Append to the journal without interleaving lines
//! - Read while others write

use assert_cmd::Command;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;
use tempfile::TempDir;

fn cli() -> Command {
    Command::new(assert_cmd::cargo::cargo_bin!("wplan"))
}

fn setup_test_dir() -> TempDir {
    tempfile::tempdir().expect("Failed to create temp dir")
}

fn base_cmd(root: &Path) -> Command {
    let config = root.join("config.toml");
    if !config.exists() {
        std::fs::write(&config, "[identity]\ndefault_user = \"athlete\"\n")
            .expect("Failed to write config");
    }
    let mut cmd = cli();
    cmd.arg("--data-dir")
        .arg(root.join("data"))
        .arg("--config")
        .arg(config)
        .arg("--today")
        .arg("2024-05-08");
    cmd
}

fn json(root: &Path, args: &[&str]) -> Value {
    let output = base_cmd(root)
        .args(args)
        .timeout(Duration::from_secs(10))
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    serde_json::from_slice(&output).expect("CLI did not print JSON")
}

fn create_plan(root: &Path) -> String {
    json(root, &["plan", "create", "--name", "Shared", "--type", "yearly-plan"])["id"]
        .as_str()
        .unwrap()
        .to_string()
}

#[test]
fn test_concurrent_week_additions_are_serialized() {
    let temp_dir = setup_test_dir();
    let root: PathBuf = temp_dir.path().to_path_buf();
    let plan = create_plan(&root);

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let root = root.clone();
            let plan = plan.clone();
            thread::spawn(move || {
                // Small stagger to reduce thundering herd
                thread::sleep(Duration::from_millis(i * 5));
                json(&root, &["week", "add", &plan]);
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("Thread panicked");
    }

    // No lost updates: every week made it and numbering is contiguous
    let tree = json(&root, &["plan", "show", &plan]);
    let numbers: Vec<u64> = tree["weeks"]
        .as_array()
        .unwrap()
        .iter()
        .map(|w| w["week_number"].as_u64().unwrap())
        .collect();
    assert_eq!(numbers, (1..=8).collect::<Vec<u64>>());
}

#[test]
fn test_concurrent_sessions_respect_cap() {
    let temp_dir = setup_test_dir();
    let root: PathBuf = temp_dir.path().to_path_buf();
    let plan = create_plan(&root);
    let week = json(&root, &["week", "add", &plan])["id"]
        .as_str()
        .unwrap()
        .to_string();
    let day = json(&root, &["day", "add", &week, "--date", "2024-05-06"])["id"]
        .as_str()
        .unwrap()
        .to_string();

    let handles: Vec<_> = (0..5)
        .map(|_| {
            let root = root.clone();
            let day = day.clone();
            thread::spawn(move || {
                let output = base_cmd(&root)
                    .args(["session", "add", &day])
                    .timeout(Duration::from_secs(10))
                    .output()
                    .expect("Failed to run wplan");
                output.status.code()
            })
        })
        .collect();

    let codes: Vec<Option<i32>> = handles
        .into_iter()
        .map(|h| h.join().expect("Thread panicked"))
        .collect();
    assert_eq!(codes.iter().filter(|c| **c == Some(0)).count(), 3);
    assert_eq!(codes.iter().filter(|c| **c == Some(2)).count(), 2);

    let tree = json(&root, &["day", "show", &day]);
    let numbers: Vec<u64> = tree["sessions"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["session_number"].as_u64().unwrap())
        .collect();
    assert_eq!(numbers, vec![1, 2, 3]);
}

#[test]
fn test_no_journal_corruption_under_load() {
    let temp_dir = setup_test_dir();
    let root: PathBuf = temp_dir.path().to_path_buf();
    // Writes the shared config before the threads start
    base_cmd(&root);

    let handles: Vec<_> = (0..10)
        .map(|i| {
            let root = root.clone();
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(i * 5));
                json(&root, &["plan", "create", "--name", "P", "--type", "archive"]);
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("Thread panicked");
    }

    let journal = std::fs::read_to_string(root.join("data/journal.jsonl"))
        .expect("Failed to read journal");
    let mut valid_count = 0;
    for line in journal.lines() {
        if line.is_empty() {
            continue;
        }
        let parsed: Result<Value, _> = serde_json::from_str(line);
        assert!(parsed.is_ok(), "Journal contains invalid JSON line: {}", line);
        valid_count += 1;
    }
    assert_eq!(valid_count, 10, "Expected 10 journal entries");

    let plans = json(&root, &["plan", "list"]);
    assert_eq!(plans.as_array().unwrap().len(), 10);
}
