//! File logging writes a rotated log under `LOG_DIR`.
//!
//! Kept in its own test binary because it installs the global subscriber.

use adaptive_engine::logging::{init_tracing, LOG_FILE_PREFIX};

#[test]
fn file_logging_writes_to_log_dir() {
    let dir = tempfile::tempdir().unwrap();
    std::env::set_var("ENABLE_FILE_LOGS", "true");
    std::env::set_var("LOG_DIR", dir.path());

    let guard = init_tracing("debug").expect("file logging should be enabled");
    assert_eq!(guard.log_dir, dir.path());
    tracing::info!(learner_id = "l-1", "hello from the test");
    drop(guard);

    let entries: Vec<String> = std::fs::read_dir(dir.path())
        .unwrap()
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .collect();
    assert!(
        entries.iter().any(|name| name.starts_with(LOG_FILE_PREFIX)),
        "no log file in {entries:?}"
    );

    let written = std::fs::read_dir(dir.path())
        .unwrap()
        .filter_map(|e| e.ok())
        .map(|e| std::fs::read_to_string(e.path()).unwrap_or_default())
        .collect::<String>();
    assert!(written.contains("hello from the test"));

    std::env::remove_var("ENABLE_FILE_LOGS");
    std::env::remove_var("LOG_DIR");
}
