mod common;

use std::collections::HashSet;

use common::{ScriptedSource, Step, det, fast_config, image, log_lines, published_files, start};
use tanlei::{
  MineDetector,
  config::WorkspaceConfig,
  detector::{ERROR_PREFIX, LOG_WARNING_PREFIX, StartupError},
  pipeline::NO_DETECTION_MESSAGE,
  workspace::Workspace,
};

#[test]
fn startup_removes_previous_state() -> anyhow::Result<()> {
  let dir = tempfile::TempDir::new()?;
  let base = dir.path();
  std::fs::create_dir_all(base.join("runs/detect/exp7"))?;
  std::fs::create_dir_all(base.join("static"))?;
  std::fs::write(base.join("static/result_1.jpg"), b"old")?;
  std::fs::write(base.join("detection_log.csv"), "timestamp,class,confidence\r\n")?;

  let detector = start(base, vec![]);

  assert!(!base.join("runs/detect").exists());
  assert!(!base.join("static").exists());
  assert_eq!(detector.fetch_log(), None);
  Ok(())
}

#[test]
fn startup_fails_when_old_log_cannot_be_removed() -> anyhow::Result<()> {
  let dir = tempfile::TempDir::new()?;
  let config = WorkspaceConfig::rooted_at(dir.path());
  // 日志路径被非空目录占用，无法删除
  std::fs::create_dir_all(config.log_path.join("stale"))?;

  let source = ScriptedSource::new(&config.raw_root, vec![]);
  let log_path = config.log_path.clone();
  let result = MineDetector::start(source, Workspace::new(config), fast_config());

  assert!(matches!(result, Err(StartupError::Log(_))));
  assert!(log_path.exists());
  Ok(())
}

#[test]
fn sequential_runs_publish_distinct_files() -> anyhow::Result<()> {
  let dir = tempfile::TempDir::new()?;
  let mut detector = start(dir.path(), vec![]);

  let mut paths = HashSet::new();
  for _ in 0..5 {
    let outcome = detector.detect(&image())?;
    paths.insert(outcome.result_path.expect("published path"));
    std::thread::sleep(std::time::Duration::from_millis(1));
  }

  assert_eq!(paths.len(), 5);
  assert_eq!(published_files(detector.workspace().publish_root()).len(), 5);
  Ok(())
}

#[test]
fn log_is_append_only_across_runs() -> anyhow::Result<()> {
  let dir = tempfile::TempDir::new()?;
  let mut detector = start(
    dir.path(),
    vec![
      Step::Detect(vec![det("satm", 0.9), det("sapem", 0.7)]),
      Step::Detect(vec![]),
      Step::Detect(vec![det("sapem", 0.42)]),
      Step::Detect(vec![det("satm", 0.31), det("satm", 0.55), det("sapem", 0.6)]),
    ],
  );

  for _ in 0..3 {
    detector.detect(&image())?;
  }
  let log = detector.fetch_log().expect("log exists");
  let before = log_lines(&log);
  assert_eq!(before.len(), 1 + 2 + 1 + 1);
  assert_eq!(before[0], "timestamp,class,confidence");

  detector.detect(&image())?;
  let after = log_lines(&log);
  assert_eq!(after.len(), before.len() + 3);
  assert_eq!(&after[..before.len()], &before[..]);
  Ok(())
}

#[test]
fn empty_run_writes_sentinel_row() -> anyhow::Result<()> {
  let dir = tempfile::TempDir::new()?;
  let mut detector = start(dir.path(), vec![Step::Detect(vec![])]);

  let outcome = detector.detect(&image())?;
  assert_eq!(outcome.summary, NO_DETECTION_MESSAGE);
  assert!(outcome.result_path.is_some());

  let lines = log_lines(&detector.fetch_log().unwrap());
  assert_eq!(lines.len(), 2);
  let fields: Vec<_> = lines[1].split(',').collect();
  assert_eq!(&fields[1..], &["None", "-"]);
  Ok(())
}

#[test]
fn summary_and_log_formatting() -> anyhow::Result<()> {
  let dir = tempfile::TempDir::new()?;
  let mut detector = start(dir.path(), vec![Step::Detect(vec![det("satm", 0.8234)])]);

  let outcome = detector.detect(&image())?;
  assert!(outcome.summary.lines().any(|l| l.contains("SATM (82.3%)")));

  let lines = log_lines(&detector.fetch_log().unwrap());
  let fields: Vec<_> = lines[1].split(',').collect();
  assert_eq!(&fields[1..], &["SATM", "0.8234"]);
  assert!(chrono::NaiveDateTime::parse_from_str(fields[0], "%Y-%m-%d %H:%M:%S").is_ok());
  Ok(())
}

#[test]
fn missing_output_directory_fails_cleanly() -> anyhow::Result<()> {
  let dir = tempfile::TempDir::new()?;
  let mut detector = start(
    dir.path(),
    vec![Step::Detect(vec![det("satm", 0.9)]), Step::NoOutput],
  );

  detector.detect(&image())?;
  let log = detector.fetch_log().unwrap();
  let rows_before = log_lines(&log).len();

  let outcome = detector.detect(&image())?;
  assert_eq!(outcome.result_path, None);
  assert!(outcome.summary.starts_with(ERROR_PREFIX));
  assert!(outcome.summary.contains("No detection output found"));
  assert_eq!(log_lines(&log).len(), rows_before);
  assert_eq!(published_files(detector.workspace().publish_root()).len(), 1);
  Ok(())
}

#[test]
fn missing_output_image_fails_cleanly() -> anyhow::Result<()> {
  let dir = tempfile::TempDir::new()?;
  let mut detector = start(dir.path(), vec![Step::DirectoryOnly]);

  let outcome = detector.detect(&image())?;
  assert_eq!(outcome.result_path, None);
  assert!(outcome.summary.starts_with(ERROR_PREFIX));
  assert!(outcome.summary.contains("Output image missing"));
  assert_eq!(detector.fetch_log(), None);
  assert!(published_files(detector.workspace().publish_root()).is_empty());
  Ok(())
}

#[test]
fn source_failure_is_fatal() -> anyhow::Result<()> {
  let dir = tempfile::TempDir::new()?;
  let mut detector = start(dir.path(), vec![Step::Fail]);

  let err = detector.detect(&image()).unwrap_err();
  assert!(err.is_fatal());
  assert_eq!(detector.fetch_log(), None);
  Ok(())
}

#[test]
fn log_failure_keeps_result() -> anyhow::Result<()> {
  let dir = tempfile::TempDir::new()?;
  let mut detector = start(dir.path(), vec![Step::Detect(vec![det("sapem", 0.66)])]);

  // 日志路径被目录占用，追加必然失败
  std::fs::create_dir_all(detector.workspace().log_path())?;

  let outcome = detector.detect(&image())?;
  let path = outcome.result_path.expect("result survives log failure");
  assert!(path.is_file());

  let mut lines = outcome.summary.lines();
  assert_eq!(lines.next(), Some("🚨 Landmine(s) detected:"));
  assert_eq!(lines.next(), Some("- SAPEM (66.0%)"));
  assert!(lines.next().is_some_and(|l| l.starts_with(LOG_WARNING_PREFIX)));
  Ok(())
}

#[test]
fn raw_output_is_reset_before_each_run() -> anyhow::Result<()> {
  let dir = tempfile::TempDir::new()?;
  let mut detector = start(dir.path(), vec![]);

  for _ in 0..3 {
    detector.detect(&image())?;
    let runs: Vec<_> = std::fs::read_dir(detector.workspace().raw_root())?
      .map(|e| e.map(|e| e.file_name()))
      .collect::<Result<_, _>>()?;
    assert_eq!(runs, vec![std::ffi::OsString::from("exp")]);
  }
  Ok(())
}

#[test]
fn end_to_end_detect_clear_fetch_log() -> anyhow::Result<()> {
  let dir = tempfile::TempDir::new()?;
  let mut detector = start(
    dir.path(),
    vec![Step::Detect(vec![det("satm", 0.91), det("sapem", 0.58)])],
  );

  let outcome = detector.detect(&image())?;
  let published = outcome.result_path.expect("published path");
  assert_eq!(
    published_files(detector.workspace().publish_root()),
    vec![published.clone()]
  );
  assert_eq!(outcome.summary.lines().count(), 3);

  let log = detector.fetch_log().expect("log exists");
  assert_eq!(log_lines(&log).len(), 3);

  detector.clear()?;
  assert!(!detector.workspace().publish_root().exists());
  assert!(!detector.workspace().raw_root().exists());

  // 清理只作用于图像目录，日志保留到下次启动
  assert_eq!(detector.fetch_log(), Some(log.clone()));
  assert_eq!(log_lines(&log).len(), 3);

  detector.clear()?;
  Ok(())
}
