// ============================================
// src/quiz.rs
// 4択問題の生成ロジック
// ============================================

use rand::Rng;
use rand::seq::{IndexedRandom, SliceRandom};

use crate::content::{
    CharacterEntry, ContentStore, GrammarEntry, KanjiEntry, Level, ListeningExercise,
    PassageQuestion, ReadingPassage, VocabularyEntry,
};
use crate::error::QuizError;

/// 標準のダミー選択肢の数 (正解と合わせて4択)
pub const DEFAULT_DISTRACTORS: usize = 3;

/// 問題にする項目
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QuizField {
    Meaning,
    Reading,
    /// 最初の音読みだけを使う
    Onyomi,
    Romanization,
}

impl QuizField {
    pub fn name(self) -> &'static str {
        match self {
            QuizField::Meaning => "meaning",
            QuizField::Reading => "reading",
            QuizField::Onyomi => "onyomi",
            QuizField::Romanization => "romaji",
        }
    }
}

/// 問題の種類 (画面のバッジ表示用)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuestionKind {
    Field(QuizField),
    Comprehension,
    Listening,
}

impl QuestionKind {
    pub fn label(self) -> &'static str {
        match self {
            QuestionKind::Field(field) => field.name(),
            QuestionKind::Comprehension => "comprehension",
            QuestionKind::Listening => "listening",
        }
    }
}

/// 1問分のデータ (セッション中だけ使い捨て)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizQuestion {
    pub kind: QuestionKind,
    pub prompt: String,
    pub options: Vec<String>,
    /// シャッフル後の正解の位置
    pub correct_index: usize,
    pub level: Option<Level>,
    /// 読み上げ用テキスト
    pub audio_text: Option<String>,
    pub explanation: Option<String>,
    /// 問題文の上に出すバッジ (聴解の種類と難易度など)
    pub tags: Vec<&'static str>,
}

impl QuizQuestion {
    pub fn correct_answer(&self) -> &str {
        &self.options[self.correct_index]
    }

    pub fn is_correct(&self, index: usize) -> bool {
        index == self.correct_index
    }

    /// 正解が決まっている設問 (読解) から作る
    pub fn from_passage(passage: &ReadingPassage, question: &PassageQuestion) -> Self {
        Self {
            kind: QuestionKind::Comprehension,
            prompt: question.question.clone(),
            options: question.options.clone(),
            correct_index: question.correct_answer_index,
            level: Some(passage.level),
            audio_text: None,
            explanation: None,
            tags: Vec::new(),
        }
    }

    /// 聴解問題から作る (読み上げ後にスクリプトを解説として表示する)
    pub fn from_listening(exercise: &ListeningExercise) -> Self {
        Self {
            kind: QuestionKind::Listening,
            prompt: exercise.question.clone(),
            options: exercise.options.clone(),
            correct_index: exercise.correct_answer_index,
            level: Some(exercise.level),
            audio_text: Some(exercise.audio.clone()),
            explanation: Some(exercise.transcript.clone()),
            tags: vec![exercise.kind.title(), exercise.difficulty.title()],
        }
    }
}

// --------------------------------------------------
// 出題元データ
// --------------------------------------------------

/// 問題の元になるデータ
pub trait QuizSource {
    /// `field` の値 (その項目を持たないデータなら `None`)
    fn quiz_value(&self, field: QuizField) -> Option<&str>;

    fn quiz_prompt(&self, field: QuizField) -> String;

    fn audio_text(&self) -> Option<&str>;

    fn explanation(&self) -> Option<&str> {
        None
    }

    fn quiz_level(&self) -> Option<Level> {
        None
    }
}

impl<T: QuizSource + ?Sized> QuizSource for &T {
    fn quiz_value(&self, field: QuizField) -> Option<&str> {
        (**self).quiz_value(field)
    }

    fn quiz_prompt(&self, field: QuizField) -> String {
        (**self).quiz_prompt(field)
    }

    fn audio_text(&self) -> Option<&str> {
        (**self).audio_text()
    }

    fn explanation(&self) -> Option<&str> {
        (**self).explanation()
    }

    fn quiz_level(&self) -> Option<Level> {
        (**self).quiz_level()
    }
}

impl QuizSource for CharacterEntry {
    fn quiz_value(&self, field: QuizField) -> Option<&str> {
        match field {
            QuizField::Romanization => Some(&self.romanization),
            _ => None,
        }
    }

    fn quiz_prompt(&self, _field: QuizField) -> String {
        format!("What is the romaji for \"{}\"?", self.glyph)
    }

    fn audio_text(&self) -> Option<&str> {
        Some(&self.glyph)
    }
}

impl QuizSource for VocabularyEntry {
    fn quiz_value(&self, field: QuizField) -> Option<&str> {
        match field {
            QuizField::Meaning => Some(&self.meaning),
            QuizField::Reading => Some(&self.reading),
            _ => None,
        }
    }

    fn quiz_prompt(&self, field: QuizField) -> String {
        match field {
            QuizField::Reading => format!("How do you read \"{}\"?", self.word),
            _ => format!("What does \"{}\" mean?", self.word),
        }
    }

    fn audio_text(&self) -> Option<&str> {
        Some(&self.word)
    }

    fn quiz_level(&self) -> Option<Level> {
        Some(self.level)
    }
}

impl QuizSource for KanjiEntry {
    fn quiz_value(&self, field: QuizField) -> Option<&str> {
        match field {
            QuizField::Meaning => Some(&self.meaning),
            QuizField::Onyomi => Some(self.primary_onyomi()).filter(|r| !r.is_empty()),
            _ => None,
        }
    }

    fn quiz_prompt(&self, field: QuizField) -> String {
        match field {
            QuizField::Onyomi => format!("What is the onyomi reading of \"{}\"?", self.glyph),
            _ => format!("What does the kanji \"{}\" mean?", self.glyph),
        }
    }

    fn audio_text(&self) -> Option<&str> {
        Some(&self.glyph)
    }

    fn quiz_level(&self) -> Option<Level> {
        Some(self.level)
    }
}

impl QuizSource for GrammarEntry {
    fn quiz_value(&self, field: QuizField) -> Option<&str> {
        match field {
            QuizField::Meaning => Some(&self.meaning),
            _ => None,
        }
    }

    fn quiz_prompt(&self, _field: QuizField) -> String {
        format!("What does \"{}\" mean?", self.structure)
    }

    fn audio_text(&self) -> Option<&str> {
        self.examples.first().map(|e| e.japanese.as_str())
    }

    fn explanation(&self) -> Option<&str> {
        Some(&self.explanation)
    }

    fn quiz_level(&self) -> Option<Level> {
        Some(self.level)
    }
}

// --------------------------------------------------
// 選択肢の生成
// --------------------------------------------------

/// 正解1つとダミー `distractor_count` 個の選択肢を作り、正解の位置を返す
///
/// ダミーは `candidates` から重複なしで選ぶ。足りない分は
/// "Option N" の仮の文字列で埋める。
pub fn build_options<'a, I, R>(
    correct: &str,
    candidates: I,
    distractor_count: usize,
    rng: &mut R,
) -> (Vec<String>, usize)
where
    I: IntoIterator<Item = &'a str>,
    R: Rng + ?Sized,
{
    let mut pool: Vec<&str> = candidates
        .into_iter()
        .filter(|value| !value.is_empty() && *value != correct)
        .collect();
    pool.sort_unstable();
    pool.dedup();

    let mut options: Vec<String> = pool
        .choose_multiple(rng, distractor_count)
        .map(|value| value.to_string())
        .collect();

    // 候補が足りない場合は仮の選択肢で埋める
    let mut n = options.len();
    while options.len() < distractor_count {
        n += 1;
        let placeholder = format!("Option {n}");
        if placeholder != correct && !options.contains(&placeholder) {
            options.push(placeholder);
        }
    }

    options.shuffle(rng);
    // 正解をランダムな位置に差し込み、その位置をそのまま記録する
    let correct_index = rng.random_range(0..=options.len());
    options.insert(correct_index, correct.to_string());

    (options, correct_index)
}

/// `target` の `field` を問う4択問題を1問作る
pub fn generate_question<T, R>(
    pool: &[T],
    target: &T,
    field: QuizField,
    distractor_count: usize,
    rng: &mut R,
) -> Result<QuizQuestion, QuizError>
where
    T: QuizSource,
    R: Rng + ?Sized,
{
    let correct = target
        .quiz_value(field)
        .ok_or(QuizError::UnsupportedField { field: field.name() })?;
    let candidates = pool.iter().filter_map(|entry| entry.quiz_value(field));
    let (options, correct_index) = build_options(correct, candidates, distractor_count, rng);

    Ok(QuizQuestion {
        kind: QuestionKind::Field(field),
        prompt: target.quiz_prompt(field),
        options,
        correct_index,
        level: target.quiz_level(),
        audio_text: target.audio_text().map(str::to_string),
        explanation: target.explanation().map(str::to_string),
        tags: Vec::new(),
    })
}

/// プールから最大 `count` 件を重複なしで選んで問題にする
pub fn build_quiz<T, R>(
    pool: &[T],
    field: QuizField,
    count: usize,
    distractor_count: usize,
    rng: &mut R,
) -> Result<Vec<QuizQuestion>, QuizError>
where
    T: QuizSource,
    R: Rng + ?Sized,
{
    let targets: Vec<&T> = pool.choose_multiple(rng, count).collect();
    quiz_for_targets(pool, &targets, field, distractor_count, rng)
}

/// 出題対象を指定して問題にする (ダミーは `pool` 全体から選ぶ)
pub fn quiz_for_targets<T, R>(
    pool: &[T],
    targets: &[&T],
    field: QuizField,
    distractor_count: usize,
    rng: &mut R,
) -> Result<Vec<QuizQuestion>, QuizError>
where
    T: QuizSource,
    R: Rng + ?Sized,
{
    targets
        .iter()
        .map(|target| generate_question(pool, *target, field, distractor_count, rng))
        .collect()
}

/// 語彙5問・漢字3問・文法2問をまぜた「Mixed Challenge」
pub fn mixed_quiz<R>(
    store: &ContentStore,
    level: Option<Level>,
    distractor_count: usize,
    rng: &mut R,
) -> Result<Vec<QuizQuestion>, QuizError>
where
    R: Rng + ?Sized,
{
    let mut questions = build_quiz(
        &store.vocabulary_at(level),
        QuizField::Meaning,
        5,
        distractor_count,
        rng,
    )?;
    questions.extend(build_quiz(
        &store.kanji_at(level),
        QuizField::Meaning,
        3,
        distractor_count,
        rng,
    )?);
    questions.extend(build_quiz(
        &store.grammar_at(level),
        QuizField::Meaning,
        2,
        distractor_count,
        rng,
    )?);
    questions.shuffle(rng);
    Ok(questions)
}

/// 読解文の設問をすべて問題にする
pub fn passage_quiz(passage: &ReadingPassage) -> Vec<QuizQuestion> {
    passage
        .questions
        .iter()
        .map(|q| QuizQuestion::from_passage(passage, q))
        .collect()
}

pub fn listening_quiz<'a, I>(exercises: I) -> Vec<QuizQuestion>
where
    I: IntoIterator<Item = &'a ListeningExercise>,
{
    exercises.into_iter().map(QuizQuestion::from_listening).collect()
}
