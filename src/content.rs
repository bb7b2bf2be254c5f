// ============================================
// src/content.rs
// 同梱の学習データ (かな・語彙・漢字・文法・読解・聴解) を管理するモジュール
// ============================================

use std::fmt;

use serde::{Deserialize, Serialize};
use serde::de::DeserializeOwned;

use crate::error::ContentError;

// 同梱データ (ビルド時にバイナリへ埋め込む)
const HIRAGANA_JSON: &str = include_str!("../data/hiragana.json");
const KATAKANA_JSON: &str = include_str!("../data/katakana.json");
const VOCABULARY_JSON: &str = include_str!("../data/vocabulary.json");
const KANJI_JSON: &str = include_str!("../data/kanji.json");
const GRAMMAR_JSON: &str = include_str!("../data/grammar.json");
const READING_JSON: &str = include_str!("../data/reading.json");
const LISTENING_JSON: &str = include_str!("../data/listening.json");

/// 複数の読みの区切り文字
pub const READING_SEPARATOR: char = '、';

// --------------------------------------------------
// 分類タグ
// --------------------------------------------------

/// JLPT のレベル (データの区分として使うだけ)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Level {
    N5,
    N4,
}

impl Level {
    pub const ALL: [Level; 2] = [Level::N5, Level::N4];
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Level::N5 => f.write_str("N5"),
            Level::N4 => f.write_str("N4"),
        }
    }
}

/// かな表の種類
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Script {
    Hiragana,
    Katakana,
}

impl Script {
    pub fn name(self) -> &'static str {
        match self {
            Script::Hiragana => "Hiragana",
            Script::Katakana => "Katakana",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CharacterCategory {
    Basic,
    Dakuten,
    Handakuten,
    Combo,
}

impl CharacterCategory {
    pub const ALL: [CharacterCategory; 4] = [
        CharacterCategory::Basic,
        CharacterCategory::Dakuten,
        CharacterCategory::Handakuten,
        CharacterCategory::Combo,
    ];

    pub fn title(self) -> &'static str {
        match self {
            CharacterCategory::Basic => "Basic",
            CharacterCategory::Dakuten => "Dakuten",
            CharacterCategory::Handakuten => "Handakuten",
            CharacterCategory::Combo => "Combinations",
        }
    }
}

// --------------------------------------------------
// データ構造
// --------------------------------------------------

/// かな1文字 (または拗音の組み合わせ)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharacterEntry {
    pub id: String,
    pub glyph: String,        // 表示用 (例: "き", "キャ")
    pub romanization: String, // ローマ字 (例: "ki")
    pub category: CharacterCategory,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VocabularyEntry {
    pub id: String,
    pub level: Level,
    pub word: String,    // 表記 (漢字混じり)
    pub reading: String, // 読み (ひらがな)
    pub meaning: String,
    pub example_sentence: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KanjiEntry {
    pub id: String,
    pub level: Level,
    pub glyph: String,
    pub onyomi: String,  // 音読み (「、」区切り)
    pub kunyomi: String, // 訓読み (「、」区切り)
    pub meaning: String,
    pub example_words: Vec<String>,
}

impl KanjiEntry {
    /// 最初に挙げられている音読み
    pub fn primary_onyomi(&self) -> &str {
        first_reading(&self.onyomi)
    }
}

/// 「、」区切りの読みから先頭の1つを取り出す
pub fn first_reading(readings: &str) -> &str {
    readings.split(READING_SEPARATOR).next().unwrap_or("").trim()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrammarExample {
    pub japanese: String,
    pub english: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrammarEntry {
    pub id: String,
    pub level: Level,
    pub structure: String,
    pub meaning: String,
    pub explanation: String,
    pub examples: Vec<GrammarExample>,
}

/// 読解・聴解で共通の設問
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassageQuestion {
    pub question: String,
    pub options: Vec<String>,
    pub correct_answer_index: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadingPassage {
    pub id: String,
    pub level: Level,
    pub title: String,
    pub content: String,
    pub questions: Vec<PassageQuestion>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListeningKind {
    Conversation,
    Instruction,
    Dialog,
}

impl ListeningKind {
    pub fn title(self) -> &'static str {
        match self {
            ListeningKind::Conversation => "Conversation",
            ListeningKind::Instruction => "Instruction",
            ListeningKind::Dialog => "Dialog",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    pub fn title(self) -> &'static str {
        match self {
            Difficulty::Easy => "Easy",
            Difficulty::Medium => "Medium",
            Difficulty::Hard => "Hard",
        }
    }
}

/// 聴解問題 (音声は読み上げ機能で再生する)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListeningExercise {
    pub id: String,
    pub level: Level,
    pub kind: ListeningKind,
    pub audio: String, // 読み上げるテキスト
    pub transcript: String,
    pub question: String,
    pub options: Vec<String>,
    pub correct_answer_index: usize,
    pub difficulty: Difficulty,
}

// --------------------------------------------------
// 絞り込み・検索
// --------------------------------------------------

/// レベルを持つデータ
pub trait Leveled {
    fn level(&self) -> Level;
}

/// 検索語での絞り込みに対応するデータ
pub trait Searchable {
    /// `term` が空なら常に一致する
    fn matches(&self, term: &str) -> bool;
}

fn contains_ignore_case(haystack: &str, needle_lower: &str) -> bool {
    haystack.to_lowercase().contains(needle_lower)
}

macro_rules! impl_leveled {
    ($($ty:ty),*) => {
        $(impl Leveled for $ty {
            fn level(&self) -> Level {
                self.level
            }
        })*
    };
}

impl_leveled!(VocabularyEntry, KanjiEntry, GrammarEntry, ReadingPassage, ListeningExercise);

impl Searchable for VocabularyEntry {
    fn matches(&self, term: &str) -> bool {
        let lower = term.to_lowercase();
        self.word.contains(term)
            || self.reading.contains(term)
            || contains_ignore_case(&self.meaning, &lower)
    }
}

impl Searchable for KanjiEntry {
    fn matches(&self, term: &str) -> bool {
        let lower = term.to_lowercase();
        self.glyph.contains(term)
            || self.onyomi.contains(term)
            || self.kunyomi.contains(term)
            || contains_ignore_case(&self.meaning, &lower)
    }
}

impl Searchable for GrammarEntry {
    fn matches(&self, term: &str) -> bool {
        let lower = term.to_lowercase();
        self.structure.contains(term)
            || contains_ignore_case(&self.meaning, &lower)
            || contains_ignore_case(&self.explanation, &lower)
    }
}

/// レベルで絞り込む (`None` なら全件)
pub fn filter_by_level<T: Leveled>(entries: &[T], level: Option<Level>) -> Vec<&T> {
    entries
        .iter()
        .filter(|entry| level.is_none_or(|l| entry.level() == l))
        .collect()
}

/// レベルと検索語の両方で絞り込む
pub fn filter_entries<'a, T>(entries: &'a [T], level: Option<Level>, term: &str) -> Vec<&'a T>
where
    T: Leveled + Searchable,
{
    matching_indices(entries, level, term)
        .into_iter()
        .map(|i| &entries[i])
        .collect()
}

/// `filter_entries` と同じ条件で、一致したデータの位置を返す
pub fn matching_indices<T>(entries: &[T], level: Option<Level>, term: &str) -> Vec<usize>
where
    T: Leveled + Searchable,
{
    let term = term.trim();
    entries
        .iter()
        .enumerate()
        .filter(|(_, entry)| level.is_none_or(|l| entry.level() == l) && entry.matches(term))
        .map(|(i, _)| i)
        .collect()
}

// --------------------------------------------------
// コンテンツストア
// --------------------------------------------------

/// 起動時に読み込む読み取り専用のデータ一式
#[derive(Debug, Clone)]
pub struct ContentStore {
    hiragana: Vec<CharacterEntry>,
    katakana: Vec<CharacterEntry>,
    vocabulary: Vec<VocabularyEntry>,
    kanji: Vec<KanjiEntry>,
    grammar: Vec<GrammarEntry>,
    reading: Vec<ReadingPassage>,
    listening: Vec<ListeningExercise>,
}

fn parse_table<T: DeserializeOwned>(table: &'static str, json: &str) -> Result<Vec<T>, ContentError> {
    serde_json::from_str(json).map_err(|source| ContentError::Parse { table, source })
}

fn check_answer_key(
    table: &'static str,
    id: &str,
    index: usize,
    options: usize,
) -> Result<(), ContentError> {
    if index < options {
        Ok(())
    } else {
        Err(ContentError::InvalidAnswerKey {
            table,
            id: id.to_string(),
            index,
            options,
        })
    }
}

impl ContentStore {
    /// MARK:バイナリに埋め込んだデータを読み込む
    pub fn bundled() -> Result<Self, ContentError> {
        let store = Self {
            hiragana: parse_table("hiragana", HIRAGANA_JSON)?,
            katakana: parse_table("katakana", KATAKANA_JSON)?,
            vocabulary: parse_table("vocabulary", VOCABULARY_JSON)?,
            kanji: parse_table("kanji", KANJI_JSON)?,
            grammar: parse_table("grammar", GRAMMAR_JSON)?,
            reading: parse_table("reading", READING_JSON)?,
            listening: parse_table("listening", LISTENING_JSON)?,
        };
        store.validate()?;
        tracing::debug!(
            vocabulary = store.vocabulary.len(),
            kanji = store.kanji.len(),
            grammar = store.grammar.len(),
            reading = store.reading.len(),
            listening = store.listening.len(),
            "bundled content loaded"
        );
        Ok(store)
    }

    /// 正解インデックスが選択肢の範囲内かを確認する
    fn validate(&self) -> Result<(), ContentError> {
        for passage in &self.reading {
            for q in &passage.questions {
                check_answer_key("reading", &passage.id, q.correct_answer_index, q.options.len())?;
            }
        }
        for exercise in &self.listening {
            check_answer_key(
                "listening",
                &exercise.id,
                exercise.correct_answer_index,
                exercise.options.len(),
            )?;
        }
        Ok(())
    }

    pub fn characters(&self, script: Script) -> &[CharacterEntry] {
        match script {
            Script::Hiragana => &self.hiragana,
            Script::Katakana => &self.katakana,
        }
    }

    /// 指定カテゴリのかなだけを返す
    pub fn characters_in(&self, script: Script, category: CharacterCategory) -> Vec<&CharacterEntry> {
        self.characters(script)
            .iter()
            .filter(|c| c.category == category)
            .collect()
    }

    pub fn vocabulary(&self) -> &[VocabularyEntry] {
        &self.vocabulary
    }

    pub fn kanji(&self) -> &[KanjiEntry] {
        &self.kanji
    }

    pub fn grammar(&self) -> &[GrammarEntry] {
        &self.grammar
    }

    pub fn reading(&self) -> &[ReadingPassage] {
        &self.reading
    }

    pub fn listening(&self) -> &[ListeningExercise] {
        &self.listening
    }

    pub fn vocabulary_at(&self, level: Option<Level>) -> Vec<&VocabularyEntry> {
        filter_by_level(&self.vocabulary, level)
    }

    pub fn kanji_at(&self, level: Option<Level>) -> Vec<&KanjiEntry> {
        filter_by_level(&self.kanji, level)
    }

    pub fn grammar_at(&self, level: Option<Level>) -> Vec<&GrammarEntry> {
        filter_by_level(&self.grammar, level)
    }

    pub fn reading_at(&self, level: Option<Level>) -> Vec<&ReadingPassage> {
        filter_by_level(&self.reading, level)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> ContentStore {
        ContentStore::bundled().expect("bundled data should parse")
    }

    #[test]
    fn bundled_tables_are_not_empty() {
        let store = store();
        assert_eq!(store.characters_in(Script::Hiragana, CharacterCategory::Basic).len(), 46);
        assert_eq!(store.characters_in(Script::Katakana, CharacterCategory::Basic).len(), 46);
        assert!(!store.vocabulary().is_empty());
        assert!(!store.kanji().is_empty());
        assert!(!store.grammar().is_empty());
        assert!(!store.reading().is_empty());
        assert!(!store.listening().is_empty());
    }

    #[test]
    fn level_filter_returns_only_matching_entries() {
        let store = store();
        for level in Level::ALL {
            let vocab = store.vocabulary_at(Some(level));
            assert!(!vocab.is_empty());
            assert!(vocab.iter().all(|v| v.level == level));
            assert!(store.kanji_at(Some(level)).iter().all(|k| k.level == level));
            assert!(store.grammar_at(Some(level)).iter().all(|g| g.level == level));
        }
    }

    #[test]
    fn no_level_filter_returns_everything() {
        let store = store();
        assert_eq!(store.vocabulary_at(None).len(), store.vocabulary().len());
        assert_eq!(store.kanji_at(None).len(), store.kanji().len());
        assert_eq!(store.grammar_at(None).len(), store.grammar().len());
        assert_eq!(store.reading_at(None).len(), store.reading().len());
    }

    #[test]
    fn vocabulary_search_matches_word_reading_and_meaning() {
        let store = store();
        let by_word = filter_entries(store.vocabulary(), None, "水");
        assert!(by_word.iter().any(|v| v.meaning == "water"));

        let by_reading = filter_entries(store.vocabulary(), None, "みず");
        assert!(by_reading.iter().any(|v| v.word == "水"));

        let by_meaning = filter_entries(store.vocabulary(), None, "WATER");
        assert!(by_meaning.iter().any(|v| v.word == "水"));
    }

    #[test]
    fn search_without_matches_is_empty_not_an_error() {
        let store = store();
        assert!(filter_entries(store.grammar(), Some(Level::N5), "zzz-no-such-thing").is_empty());
    }

    #[test]
    fn primary_onyomi_takes_first_reading() {
        let store = store();
        let day = store.kanji().iter().find(|k| k.glyph == "日").unwrap();
        assert_eq!(day.primary_onyomi(), "ニチ");
        assert_eq!(first_reading(""), "");
    }

    #[test]
    fn answer_keys_are_validated() {
        let err = check_answer_key("reading", "r9", 4, 4).unwrap_err();
        assert!(matches!(err, ContentError::InvalidAnswerKey { index: 4, .. }));
        assert!(check_answer_key("reading", "r9", 3, 4).is_ok());
    }
}
