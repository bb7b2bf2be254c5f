// ============================================
// src/progress.rs
// 学習の進行状況 (XP・レベル・連続学習日数) と保存処理
// ============================================

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

/// 1レベルあたりの経験値
pub const XP_PER_LEVEL: u32 = 100;

const PROGRESS_FILE: &str = "progress.json";

/// 完了数を数えるカテゴリ
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgressCategory {
    Hiragana,
    Katakana,
    Vocabulary,
    Kanji,
    Grammar,
    Reading,
}

impl ProgressCategory {
    pub const ALL: [ProgressCategory; 6] = [
        ProgressCategory::Hiragana,
        ProgressCategory::Katakana,
        ProgressCategory::Vocabulary,
        ProgressCategory::Kanji,
        ProgressCategory::Grammar,
        ProgressCategory::Reading,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ProgressCategory::Hiragana => "Hiragana",
            ProgressCategory::Katakana => "Katakana",
            ProgressCategory::Vocabulary => "Vocabulary",
            ProgressCategory::Kanji => "Kanji",
            ProgressCategory::Grammar => "Grammar",
            ProgressCategory::Reading => "Reading",
        }
    }
}

impl fmt::Display for ProgressCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// XP からレベルを求める (0〜99 XP がレベル1)
pub fn level_for_xp(xp: u32) -> u32 {
    xp / XP_PER_LEVEL + 1
}

// --------------------------------------------------
// 進行状況データ
// --------------------------------------------------

/// 学習者の進行状況
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgressRecord {
    pub xp: u32,
    pub level: u32,
    /// 連続学習日数
    pub streak: u32,
    pub last_study_date: Option<NaiveDate>,
    /// カテゴリごとの完了数
    pub counts: BTreeMap<ProgressCategory, u32>,
    /// 「覚えた」に印をつけた項目の ID
    pub learned: BTreeMap<ProgressCategory, BTreeSet<String>>,
}

impl Default for ProgressRecord {
    /// 初回起動時の値
    fn default() -> Self {
        Self {
            xp: 0,
            level: 1,
            streak: 0,
            last_study_date: None,
            counts: BTreeMap::new(),
            learned: BTreeMap::new(),
        }
    }
}

impl ProgressRecord {
    /// 経験値を加算してレベルを再計算する。レベルが上がったら true
    pub fn add_xp(&mut self, amount: u32) -> bool {
        let before = self.level;
        self.xp = self.xp.saturating_add(amount);
        self.level = level_for_xp(self.xp);
        self.level > before
    }

    /// 現在のレベル内で貯まっている XP
    pub fn xp_into_level(&self) -> u32 {
        self.xp % XP_PER_LEVEL
    }

    /// 次のレベルまでに必要な XP
    pub fn xp_to_next_level(&self) -> u32 {
        XP_PER_LEVEL - self.xp_into_level()
    }

    /// 前回の学習日と `today` を比べて連続日数を更新する
    pub fn update_streak_on(&mut self, today: NaiveDate) {
        if self.last_study_date == Some(today) {
            return;
        }
        let yesterday = today.pred_opt();
        if yesterday.is_some() && self.last_study_date == yesterday {
            self.streak += 1;
        } else {
            self.streak = 1;
        }
        self.last_study_date = Some(today);
    }

    pub fn count(&self, category: ProgressCategory) -> u32 {
        self.counts.get(&category).copied().unwrap_or(0)
    }

    pub fn set_count(&mut self, category: ProgressCategory, value: u32) {
        self.counts.insert(category, value);
    }

    pub fn is_learned(&self, category: ProgressCategory, id: &str) -> bool {
        self.learned
            .get(&category)
            .is_some_and(|ids| ids.contains(id))
    }

    /// 「覚えた」印を付け外しし、完了数を印の数に合わせる
    pub fn toggle_learned(&mut self, category: ProgressCategory, id: &str) -> bool {
        let ids = self.learned.entry(category).or_default();
        let now_learned = if ids.remove(id) {
            false
        } else {
            ids.insert(id.to_string());
            true
        };
        let size = ids.len() as u32;
        self.set_count(category, size);
        now_learned
    }
}

// --------------------------------------------------
// 保存先
// --------------------------------------------------

/// 進行状況の保存先 (JSON テキストを1件だけ持つ)
pub trait ProgressStorage {
    /// 保存済みのテキスト。まだ無ければ `None`
    fn read(&self) -> Result<Option<String>>;

    fn write(&mut self, contents: &str) -> Result<()>;

    fn clear(&mut self) -> Result<()>;
}

/// データディレクトリ上の JSON ファイル
#[derive(Debug, Clone)]
pub struct FileStorage {
    path: PathBuf,
}

impl FileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// MARK:OS ごとのデータ保存用ディレクトリにある progress.json
    pub fn default_path() -> PathBuf {
        match data_dir() {
            Some(dir) => dir.join(PROGRESS_FILE),
            // 取得できなかったらカレントディレクトリに (フォールバック)
            None => PathBuf::from(PROGRESS_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// アプリのデータディレクトリ
pub fn data_dir() -> Option<PathBuf> {
    ProjectDirs::from("jp", "Fukumoto0141", "NIHONGO_WIZ").map(|dirs| dirs.data_dir().to_path_buf())
}

impl ProgressStorage for FileStorage {
    fn read(&self) -> Result<Option<String>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let text = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read {}", self.path.display()))?;
        Ok(Some(text))
    }

    fn write(&mut self, contents: &str) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
        }
        // 一時ファイルに書いてから置き換える
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, contents).with_context(|| format!("Failed to write {}", tmp.display()))?;
        fs::rename(&tmp, &self.path)
            .with_context(|| format!("Failed to replace {}", self.path.display()))?;
        Ok(())
    }

    fn clear(&mut self) -> Result<()> {
        if self.path.exists() {
            fs::remove_file(&self.path)
                .with_context(|| format!("Failed to remove {}", self.path.display()))?;
        }
        Ok(())
    }
}

/// メモリ上だけの保存先 (ゲストモードとテスト用)
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    contents: Option<String>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_contents(contents: impl Into<String>) -> Self {
        Self {
            contents: Some(contents.into()),
        }
    }
}

impl ProgressStorage for MemoryStorage {
    fn read(&self) -> Result<Option<String>> {
        Ok(self.contents.clone())
    }

    fn write(&mut self, contents: &str) -> Result<()> {
        self.contents = Some(contents.to_string());
        Ok(())
    }

    fn clear(&mut self) -> Result<()> {
        self.contents = None;
        Ok(())
    }
}

// --------------------------------------------------
// 進行状況ストア
// --------------------------------------------------

/// 進行状況の持ち主。変更はすべてここを通し、変更のたびに保存する
pub struct ProgressStore {
    record: ProgressRecord,
    storage: Box<dyn ProgressStorage>,
}

impl ProgressStore {
    /// MARK:保存先から読み込む (無い・壊れている場合は初期値)
    pub fn open(storage: Box<dyn ProgressStorage>) -> Self {
        let mut record = match storage.read() {
            Ok(Some(text)) => match serde_json::from_str(&text) {
                Ok(record) => record,
                Err(err) => {
                    tracing::warn!(error = %err, "progress record is corrupt, starting fresh");
                    ProgressRecord::default()
                }
            },
            Ok(None) => {
                tracing::info!("no saved progress, starting fresh");
                ProgressRecord::default()
            }
            Err(err) => {
                tracing::warn!(error = %err, "failed to read progress, starting fresh");
                ProgressRecord::default()
            }
        };
        // 保存値よりも XP からの計算を優先する
        record.level = level_for_xp(record.xp);
        Self { record, storage }
    }

    pub fn record(&self) -> &ProgressRecord {
        &self.record
    }

    /// 経験値を加算して保存する。レベルが上がったら true
    pub fn add_xp(&mut self, amount: u32) -> bool {
        let leveled_up = self.record.add_xp(amount);
        if leveled_up {
            tracing::info!(level = self.record.level, xp = self.record.xp, "level up");
        }
        self.persist();
        leveled_up
    }

    /// 今日の日付で連続学習日数を更新する
    pub fn update_streak(&mut self) {
        self.update_streak_on(Local::now().date_naive());
    }

    pub fn update_streak_on(&mut self, today: NaiveDate) {
        self.record.update_streak_on(today);
        self.persist();
    }

    /// カテゴリの完了数を上書きする
    pub fn update_progress(&mut self, category: ProgressCategory, value: u32) {
        self.record.set_count(category, value);
        self.persist();
    }

    pub fn is_learned(&self, category: ProgressCategory, id: &str) -> bool {
        self.record.is_learned(category, id)
    }

    pub fn toggle_learned(&mut self, category: ProgressCategory, id: &str) -> bool {
        let learned = self.record.toggle_learned(category, id);
        self.persist();
        learned
    }

    /// XP を与えて連続学習日数も更新する (学習アクションごとに呼ぶ)
    pub fn award(&mut self, amount: u32) -> bool {
        let leveled_up = self.add_xp(amount);
        self.update_streak();
        leveled_up
    }

    /// 初期値に戻す
    pub fn reset(&mut self) -> Result<()> {
        self.record = ProgressRecord::default();
        self.storage.clear()?;
        self.save()
    }

    /// MARK:JSON で保存する
    pub fn save(&mut self) -> Result<()> {
        let json = serde_json::to_string_pretty(&self.record)
            .context("Failed to serialize progress")?;
        self.storage.write(&json)
    }

    // 保存の失敗は致命的にしない (ログに残すだけ)
    fn persist(&mut self) {
        if let Err(err) = self.save() {
            tracing::error!(error = %err, "failed to save progress");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn memory_store() -> ProgressStore {
        ProgressStore::open(Box::new(MemoryStorage::new()))
    }

    #[test]
    fn default_record_starts_at_level_one() {
        let store = memory_store();
        assert_eq!(store.record(), &ProgressRecord::default());
        assert_eq!(store.record().level, 1);
    }

    #[test]
    fn add_zero_xp_keeps_level() {
        let mut record = ProgressRecord::default();
        record.add_xp(250);
        let level = record.level;
        assert!(!record.add_xp(0));
        assert_eq!(record.level, level);
    }

    #[test]
    fn add_hundred_xp_from_multiple_of_hundred_adds_one_level() {
        for start in [0, 100, 300, 1200] {
            let mut record = ProgressRecord::default();
            record.add_xp(start);
            let before = record.level;
            assert!(record.add_xp(100));
            assert_eq!(record.level, before + 1);
        }
    }

    #[test]
    fn level_is_xp_over_hundred_plus_one() {
        let mut record = ProgressRecord::default();
        record.add_xp(99);
        assert_eq!(record.level, 1);
        assert_eq!(record.xp_to_next_level(), 1);
        record.add_xp(581);
        assert_eq!(record.level, 7);
        assert_eq!(record.xp_into_level(), 80);
    }

    #[test]
    fn consecutive_days_increment_streak() {
        let mut record = ProgressRecord::default();
        record.update_streak_on(date(2026, 3, 1));
        assert_eq!(record.streak, 1);
        record.update_streak_on(date(2026, 3, 2));
        assert_eq!(record.streak, 2);
        record.update_streak_on(date(2026, 3, 3));
        assert_eq!(record.streak, 3);
    }

    #[test]
    fn same_day_does_not_change_streak() {
        let mut record = ProgressRecord::default();
        record.update_streak_on(date(2026, 3, 1));
        record.update_streak_on(date(2026, 3, 2));
        record.update_streak_on(date(2026, 3, 2));
        assert_eq!(record.streak, 2);
    }

    #[test]
    fn gap_of_two_days_resets_streak() {
        let mut record = ProgressRecord::default();
        record.update_streak_on(date(2026, 2, 27));
        record.update_streak_on(date(2026, 2, 28));
        assert_eq!(record.streak, 2);
        record.update_streak_on(date(2026, 3, 2));
        assert_eq!(record.streak, 1);
        assert_eq!(record.last_study_date, Some(date(2026, 3, 2)));
    }

    #[test]
    fn streak_crosses_month_boundary() {
        let mut record = ProgressRecord::default();
        record.update_streak_on(date(2026, 2, 28));
        record.update_streak_on(date(2026, 3, 1));
        assert_eq!(record.streak, 2);
    }

    #[test]
    fn update_progress_overwrites_counter() {
        let mut store = memory_store();
        store.update_progress(ProgressCategory::Kanji, 12);
        store.update_progress(ProgressCategory::Kanji, 3);
        assert_eq!(store.record().count(ProgressCategory::Kanji), 3);
    }

    #[test]
    fn toggle_learned_keeps_counter_in_sync() {
        let mut store = memory_store();
        assert!(store.toggle_learned(ProgressCategory::Vocabulary, "v1"));
        assert!(store.toggle_learned(ProgressCategory::Vocabulary, "v2"));
        assert_eq!(store.record().count(ProgressCategory::Vocabulary), 2);
        assert!(!store.toggle_learned(ProgressCategory::Vocabulary, "v1"));
        assert_eq!(store.record().count(ProgressCategory::Vocabulary), 1);
        assert!(store.is_learned(ProgressCategory::Vocabulary, "v2"));
        assert!(!store.is_learned(ProgressCategory::Vocabulary, "v1"));
    }

    #[test]
    fn mutations_are_persisted_immediately() {
        let mut store = memory_store();
        store.add_xp(150);
        let json = store.storage.read().unwrap().unwrap();
        let saved: ProgressRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(saved.xp, 150);
        assert_eq!(saved.level, 2);
    }

    #[test]
    fn corrupt_storage_falls_back_to_default() {
        let store = ProgressStore::open(Box::new(MemoryStorage::with_contents("{not json")));
        assert_eq!(store.record(), &ProgressRecord::default());
    }

    #[test]
    fn partial_record_fills_missing_fields() {
        let store = ProgressStore::open(Box::new(MemoryStorage::with_contents(r#"{"xp": 340}"#)));
        assert_eq!(store.record().xp, 340);
        assert_eq!(store.record().level, 4);
        assert_eq!(store.record().streak, 0);
        assert!(store.record().counts.is_empty());
    }

    #[test]
    fn reset_restores_defaults() {
        let mut store = memory_store();
        store.add_xp(500);
        store.toggle_learned(ProgressCategory::Grammar, "g1");
        store.reset().unwrap();
        assert_eq!(store.record(), &ProgressRecord::default());
    }
}
