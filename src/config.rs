// ============================================
// src/config.rs
// 設定ファイル (config.toml) の読み込み
// ============================================

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::content::Level;
use crate::progress::{self, FileStorage};
use crate::quiz::DEFAULT_DISTRACTORS;
use crate::speech::{DEFAULT_RATE, DEFAULT_VOLUME};

const CONFIG_FILE: &str = "config.toml";
const LOG_FILE: &str = "nihongowiz.log";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuizConfig {
    /// 分野別クイズの問題数
    pub question_count: usize,
    /// 1問あたりのダミー選択肢の数
    pub distractor_count: usize,
}

impl Default for QuizConfig {
    fn default() -> Self {
        Self {
            question_count: 10,
            distractor_count: DEFAULT_DISTRACTORS,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StudyConfig {
    /// 起動時のレベル絞り込み (未指定なら全レベル)
    pub level: Option<Level>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeechConfig {
    pub enabled: bool,
    /// 音声合成コマンド (未指定なら PATH から探す)
    pub command: Option<PathBuf>,
    pub rate: f32,
    pub volume: f32,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            command: None,
            rate: DEFAULT_RATE,
            volume: DEFAULT_VOLUME,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// 進行状況ファイルの場所
    pub progress_file: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// tracing のフィルタ (RUST_LOG があればそちらを優先)
    pub level: String,
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

/// アプリ全体の設定
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub quiz: QuizConfig,
    pub study: StudyConfig,
    pub speech: SpeechConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
}

impl Config {
    /// 設定ディレクトリ
    ///
    /// - Linux: `~/.config/nihongo_wiz/`
    /// - macOS: `~/Library/Application Support/jp.Fukumoto0141.NIHONGO_WIZ/`
    pub fn config_dir() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("jp", "Fukumoto0141", "NIHONGO_WIZ")
            .context("Failed to determine config directory")?;
        Ok(dirs.config_dir().to_path_buf())
    }

    pub fn default_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join(CONFIG_FILE))
    }

    /// MARK:設定を読み込む (ファイルが無ければ初期値)
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => Self::default_path()?,
        };
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::from_toml(&text)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {}", parent.display()))?;
        }
        let text = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, text)
            .with_context(|| format!("Failed to write config file: {}", path.display()))
    }

    fn validate(&self) -> Result<()> {
        if self.quiz.question_count == 0 {
            anyhow::bail!("quiz.question_count must be at least 1");
        }
        if !(0.1..=3.0).contains(&self.speech.rate) {
            anyhow::bail!("speech.rate must be between 0.1 and 3.0, got {}", self.speech.rate);
        }
        if !(0.0..=1.0).contains(&self.speech.volume) {
            anyhow::bail!("speech.volume must be between 0.0 and 1.0, got {}", self.speech.volume);
        }
        Ok(())
    }

    /// 進行状況ファイルの場所
    pub fn progress_path(&self) -> PathBuf {
        self.storage
            .progress_file
            .clone()
            .unwrap_or_else(FileStorage::default_path)
    }

    /// ログファイルの場所
    pub fn log_path(&self) -> PathBuf {
        if let Some(file) = &self.logging.file {
            return file.clone();
        }
        progress::data_dir()
            .map(|dir| dir.join(LOG_FILE))
            .unwrap_or_else(|| PathBuf::from(LOG_FILE))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.quiz.distractor_count, 3);
        assert!(config.speech.enabled);
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = Config::from_toml(
            r#"
            [quiz]
            question_count = 20

            [study]
            level = "N4"

            [speech]
            command = "espeak-ng"
            "#,
        )
        .unwrap();
        assert_eq!(config.quiz.question_count, 20);
        assert_eq!(config.quiz.distractor_count, 3);
        assert_eq!(config.study.level, Some(Level::N4));
        assert_eq!(config.speech.command, Some(PathBuf::from("espeak-ng")));
        assert_eq!(config.speech.rate, 0.8);
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        assert!(Config::from_toml("[quiz]\nquestion_count = 0").is_err());
        assert!(Config::from_toml("[speech]\nvolume = 1.5").is_err());
        assert!(Config::from_toml("[speech]\nrate = 0.0").is_err());
    }

    #[test]
    fn unknown_level_is_an_error() {
        assert!(Config::from_toml("[study]\nlevel = \"N1\"").is_err());
    }

    #[test]
    fn configured_progress_file_wins() {
        let mut config = Config::default();
        config.storage.progress_file = Some(PathBuf::from("/tmp/p.json"));
        assert_eq!(config.progress_path(), PathBuf::from("/tmp/p.json"));
    }
}
