//! 進行状況ファイルの保存と読み込み

use std::fs;

use nihongowiz::progress::{FileStorage, ProgressCategory, ProgressStore};
use tempfile::TempDir;

fn open_in(dir: &TempDir) -> ProgressStore {
    ProgressStore::open(Box::new(FileStorage::new(dir.path().join("progress.json"))))
}

#[test]
fn test_progress_survives_reopen() {
    let dir = TempDir::new().unwrap();

    let mut store = open_in(&dir);
    assert!(!store.award(60));
    assert!(store.award(60));
    store.toggle_learned(ProgressCategory::Kanji, "k1");

    let reopened = open_in(&dir);
    let record = reopened.record();
    assert_eq!(record.xp, 120);
    assert_eq!(record.level, 2);
    assert_eq!(record.streak, 1);
    assert!(record.last_study_date.is_some());
    assert!(reopened.is_learned(ProgressCategory::Kanji, "k1"));
    assert_eq!(record.count(ProgressCategory::Kanji), 1);
}

#[test]
fn test_missing_parent_directory_is_created() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("progress.json");

    let mut store = ProgressStore::open(Box::new(FileStorage::new(&path)));
    store.add_xp(10);

    assert!(path.exists());
    let text = fs::read_to_string(&path).unwrap();
    assert!(text.contains("\"xp\": 10"));
}

#[test]
fn test_corrupt_file_starts_fresh() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("progress.json"), "{ not json").unwrap();

    let store = open_in(&dir);
    assert_eq!(store.record().xp, 0);
    assert_eq!(store.record().level, 1);
    assert_eq!(store.record().streak, 0);
}

#[test]
fn test_partial_file_keeps_known_fields() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("progress.json"), r#"{"xp": 250, "streak": 4}"#).unwrap();

    let store = open_in(&dir);
    assert_eq!(store.record().xp, 250);
    assert_eq!(store.record().level, 3);
    assert_eq!(store.record().streak, 4);
    assert_eq!(store.record().count(ProgressCategory::Vocabulary), 0);
}

#[test]
fn test_reset_writes_fresh_record() {
    let dir = TempDir::new().unwrap();
    let mut store = open_in(&dir);
    store.award(500);
    store.reset().unwrap();

    let reopened = open_in(&dir);
    assert_eq!(reopened.record().xp, 0);
    assert_eq!(reopened.record().level, 1);
}
