// ============================================
// src/app.rs
// 画面の状態とキー入力の処理
// ============================================

use std::mem;

use crossterm::event::KeyCode;
use rand::rngs::StdRng;
use rand::seq::IndexedRandom;

use crate::config::Config;
use crate::content::{
    CharacterCategory, CharacterEntry, ContentStore, GrammarEntry, KanjiEntry, Level, ReadingPassage,
    Script, VocabularyEntry, filter_by_level, matching_indices,
};
use crate::flashcard::{DeckMode, DeckStep, FlashcardDeck, Rating};
use crate::progress::{ProgressCategory, ProgressStore};
use crate::quiz::{self, QuizField, QuizQuestion};
use crate::rewards::{Activity, Subject, xp_for};
use crate::session::{Phase, QuizSession, SessionSummary};
use crate::speech::{Speaker, Utterance};

/// かな表の1行あたりの文字数
pub const GRID_COLUMNS: usize = 5;

/// ブリッツで使う語彙の数
const BLITZ_CARDS: usize = 20;

/// スピードチャレンジで出題する清音の数 (五十音順の先頭から)
const SPEED_CHALLENGE_CHARS: usize = 15;

// --------------------------------------------------
// メニュー
// --------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuItem {
    Hiragana,
    Katakana,
    Vocabulary,
    Kanji,
    Grammar,
    Reading,
    Listening,
    MixedChallenge,
    SpeedChallenge,
    FlashcardBlitz,
    Dashboard,
}

impl MenuItem {
    pub const ALL: [MenuItem; 11] = [
        MenuItem::Hiragana,
        MenuItem::Katakana,
        MenuItem::Vocabulary,
        MenuItem::Kanji,
        MenuItem::Grammar,
        MenuItem::Reading,
        MenuItem::Listening,
        MenuItem::MixedChallenge,
        MenuItem::SpeedChallenge,
        MenuItem::FlashcardBlitz,
        MenuItem::Dashboard,
    ];

    pub fn title(self) -> &'static str {
        match self {
            MenuItem::Hiragana => "Hiragana",
            MenuItem::Katakana => "Katakana",
            MenuItem::Vocabulary => "Vocabulary",
            MenuItem::Kanji => "Kanji",
            MenuItem::Grammar => "Grammar",
            MenuItem::Reading => "Reading",
            MenuItem::Listening => "Listening Practice",
            MenuItem::MixedChallenge => "Mixed Challenge",
            MenuItem::SpeedChallenge => "Speed Challenge",
            MenuItem::FlashcardBlitz => "Flashcard Blitz",
            MenuItem::Dashboard => "Dashboard",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            MenuItem::Hiragana => "Chart, flashcards and romaji quiz",
            MenuItem::Katakana => "Chart, flashcards and romaji quiz",
            MenuItem::Vocabulary => "Browse, search and quiz N5/N4 words",
            MenuItem::Kanji => "Readings, meanings and example words",
            MenuItem::Grammar => "Patterns with explanations and examples",
            MenuItem::Reading => "Short passages with comprehension questions",
            MenuItem::Listening => "Listen and answer (needs a speech engine)",
            MenuItem::MixedChallenge => "Vocabulary, kanji and grammar in one quiz",
            MenuItem::SpeedChallenge => "Quick hiragana recognition",
            MenuItem::FlashcardBlitz => "Review 20 words as fast as possible",
            MenuItem::Dashboard => "XP, streak and the road to N4",
        }
    }

    fn position(self) -> usize {
        Self::ALL.iter().position(|item| *item == self).unwrap_or(0)
    }
}

// --------------------------------------------------
// 画面ごとの状態
// --------------------------------------------------

/// 語彙・漢字・文法の一覧画面の種類
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrowserKind {
    Vocabulary,
    Kanji,
    Grammar,
}

impl BrowserKind {
    pub fn title(self) -> &'static str {
        match self {
            BrowserKind::Vocabulary => "Vocabulary",
            BrowserKind::Kanji => "Kanji",
            BrowserKind::Grammar => "Grammar",
        }
    }

    pub fn subject(self) -> Subject {
        match self {
            BrowserKind::Vocabulary => Subject::Vocabulary,
            BrowserKind::Kanji => Subject::Kanji,
            BrowserKind::Grammar => Subject::Grammar,
        }
    }

    pub fn category(self) -> ProgressCategory {
        match self {
            BrowserKind::Vocabulary => ProgressCategory::Vocabulary,
            BrowserKind::Kanji => ProgressCategory::Kanji,
            BrowserKind::Grammar => ProgressCategory::Grammar,
        }
    }

    /// 読みのクイズで問う項目 (文法には無い)
    pub fn reading_field(self) -> Option<QuizField> {
        match self {
            BrowserKind::Vocabulary => Some(QuizField::Reading),
            BrowserKind::Kanji => Some(QuizField::Onyomi),
            BrowserKind::Grammar => None,
        }
    }

    fn menu_item(self) -> MenuItem {
        match self {
            BrowserKind::Vocabulary => MenuItem::Vocabulary,
            BrowserKind::Kanji => MenuItem::Kanji,
            BrowserKind::Grammar => MenuItem::Grammar,
        }
    }
}

#[derive(Debug, Clone)]
pub struct BrowserView {
    pub kind: BrowserKind,
    pub level: Option<Level>,
    pub search: String,
    /// 検索語の入力中
    pub searching: bool,
    pub cursor: usize,
}

impl BrowserView {
    fn new(kind: BrowserKind, level: Option<Level>) -> Self {
        Self {
            kind,
            level,
            search: String::new(),
            searching: false,
            cursor: 0,
        }
    }
}

/// レベル絞り込みを All → N5 → N4 → All の順に切り替える
pub fn next_level_filter(level: Option<Level>) -> Option<Level> {
    match level {
        None => Some(Level::N5),
        Some(Level::N5) => Some(Level::N4),
        Some(Level::N4) => None,
    }
}

#[derive(Debug, Clone)]
pub struct ChartView {
    pub script: Script,
    pub cursor: usize,
}

/// フラッシュカード1枚分の表示内容
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Card {
    pub front: String,
    pub hint: String,
    pub back: String,
    pub detail: String,
    pub audio: Option<String>,
    pub level: Option<Level>,
}

impl From<&CharacterEntry> for Card {
    fn from(entry: &CharacterEntry) -> Self {
        Self {
            front: entry.glyph.clone(),
            hint: String::new(),
            back: entry.romanization.clone(),
            detail: entry.category.title().to_string(),
            audio: Some(entry.glyph.clone()),
            level: None,
        }
    }
}

impl From<&VocabularyEntry> for Card {
    fn from(entry: &VocabularyEntry) -> Self {
        Self {
            front: entry.word.clone(),
            hint: entry.reading.clone(),
            back: entry.meaning.clone(),
            detail: entry.example_sentence.clone(),
            audio: Some(entry.word.clone()),
            level: Some(entry.level),
        }
    }
}

impl From<&KanjiEntry> for Card {
    fn from(entry: &KanjiEntry) -> Self {
        Self {
            front: entry.glyph.clone(),
            hint: String::new(),
            back: entry.meaning.clone(),
            detail: format!("On: {}  Kun: {}", entry.onyomi, entry.kunyomi),
            audio: Some(entry.glyph.clone()),
            level: Some(entry.level),
        }
    }
}

impl From<&GrammarEntry> for Card {
    fn from(entry: &GrammarEntry) -> Self {
        Self {
            front: entry.structure.clone(),
            hint: String::new(),
            back: entry.meaning.clone(),
            detail: entry.explanation.clone(),
            audio: entry.examples.first().map(|e| e.japanese.clone()),
            level: Some(entry.level),
        }
    }
}

pub struct FlashcardView {
    pub title: String,
    pub deck: FlashcardDeck<Card>,
    pub subject: Subject,
    /// ブリッツ (最後のカードで終了し、まとめて XP を与える)
    pub blitz: bool,
    pub return_to: Box<Screen>,
}

/// クイズの種類 (終了時の XP 計算に使う)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuizKind {
    Subject(Subject),
    /// 読解 (`App::reading_passages` での位置)
    Reading(usize),
    Mixed,
    Speed,
    Listening,
}

pub struct QuizView {
    pub title: String,
    pub kind: QuizKind,
    pub session: QuizSession,
    pub cursor: usize,
    pub return_to: Box<Screen>,
}

/// 表示中の画面
pub enum Screen {
    Menu { cursor: usize },
    Chart(ChartView),
    Browser(BrowserView),
    Flashcards(FlashcardView),
    Quiz(QuizView),
    ReadingList { cursor: usize },
    Dashboard,
}

// --------------------------------------------------
// アプリ全体の状態
// --------------------------------------------------

pub struct App {
    pub content: ContentStore,
    pub progress: ProgressStore,
    pub config: Config,
    pub screen: Screen,
    /// ステータス行に出すメッセージ (直前の獲得 XP など)
    pub message: Option<String>,
    /// 読み上げ中か (毎フレーム更新)
    pub speaking: bool,
    pub should_quit: bool,
    speaker: Box<dyn Speaker>,
    rng: StdRng,
}

impl App {
    pub fn new(
        content: ContentStore,
        progress: ProgressStore,
        speaker: Box<dyn Speaker>,
        config: Config,
        rng: StdRng,
    ) -> Self {
        Self {
            content,
            progress,
            config,
            screen: Screen::Menu { cursor: 0 },
            message: None,
            speaking: false,
            should_quit: false,
            speaker,
            rng,
        }
    }

    pub fn speech_supported(&self) -> bool {
        self.speaker.is_supported()
    }

    /// 毎フレーム呼ぶ
    pub fn tick(&mut self) {
        self.speaking = self.speaker.is_speaking();
    }

    /// MARK:キー入力の処理
    pub fn handle_key(&mut self, code: KeyCode) {
        let screen = mem::replace(&mut self.screen, Screen::Menu { cursor: 0 });
        self.screen = match screen {
            Screen::Menu { cursor } => self.on_menu(cursor, code),
            Screen::Chart(view) => self.on_chart(view, code),
            Screen::Browser(view) => self.on_browser(view, code),
            Screen::Flashcards(view) => self.on_flashcards(view, code),
            Screen::Quiz(view) => self.on_quiz(view, code),
            Screen::ReadingList { cursor } => self.on_reading_list(cursor, code),
            Screen::Dashboard => match code {
                KeyCode::Esc | KeyCode::Enter | KeyCode::Char('q') => Screen::Menu {
                    cursor: MenuItem::Dashboard.position(),
                },
                _ => Screen::Dashboard,
            },
        };
    }

    // --- メニュー ---

    fn on_menu(&mut self, cursor: usize, code: KeyCode) -> Screen {
        match code {
            KeyCode::Up => Screen::Menu {
                cursor: cursor.saturating_sub(1),
            },
            KeyCode::Down => Screen::Menu {
                cursor: (cursor + 1).min(MenuItem::ALL.len() - 1),
            },
            KeyCode::Esc | KeyCode::Char('q') => {
                self.should_quit = true;
                Screen::Menu { cursor }
            }
            KeyCode::Enter => self.open(MenuItem::ALL[cursor]),
            _ => Screen::Menu { cursor },
        }
    }

    fn open(&mut self, item: MenuItem) -> Screen {
        let back = Screen::Menu {
            cursor: item.position(),
        };
        let level = self.config.study.level;
        match item {
            MenuItem::Hiragana => Screen::Chart(ChartView {
                script: Script::Hiragana,
                cursor: 0,
            }),
            MenuItem::Katakana => Screen::Chart(ChartView {
                script: Script::Katakana,
                cursor: 0,
            }),
            MenuItem::Vocabulary => Screen::Browser(BrowserView::new(BrowserKind::Vocabulary, level)),
            MenuItem::Kanji => Screen::Browser(BrowserView::new(BrowserKind::Kanji, level)),
            MenuItem::Grammar => Screen::Browser(BrowserView::new(BrowserKind::Grammar, level)),
            MenuItem::Reading => Screen::ReadingList { cursor: 0 },
            MenuItem::Listening => {
                let questions = quiz::listening_quiz(filter_by_level(self.content.listening(), level));
                self.start_quiz("Listening Practice", QuizKind::Listening, questions, back)
            }
            MenuItem::MixedChallenge => {
                let distractors = self.config.quiz.distractor_count;
                match quiz::mixed_quiz(&self.content, level, distractors, &mut self.rng) {
                    Ok(questions) => self.start_quiz("Mixed Challenge", QuizKind::Mixed, questions, back),
                    Err(err) => {
                        tracing::warn!(error = %err, "failed to build mixed challenge");
                        self.message = Some(err.to_string());
                        back
                    }
                }
            }
            MenuItem::SpeedChallenge => {
                let distractors = self.config.quiz.distractor_count;
                let basic: Vec<&CharacterEntry> = self
                    .content
                    .characters_in(Script::Hiragana, CharacterCategory::Basic)
                    .into_iter()
                    .take(SPEED_CHALLENGE_CHARS)
                    .collect();
                let built = quiz::build_quiz(
                    &basic,
                    QuizField::Romanization,
                    SPEED_CHALLENGE_CHARS,
                    distractors,
                    &mut self.rng,
                );
                match built {
                    Ok(questions) => self.start_quiz("Speed Challenge", QuizKind::Speed, questions, back),
                    Err(err) => {
                        tracing::warn!(error = %err, "failed to build speed challenge");
                        self.message = Some(err.to_string());
                        back
                    }
                }
            }
            MenuItem::FlashcardBlitz => {
                let words = filter_by_level(self.content.vocabulary(), level);
                let cards: Vec<Card> = words
                    .choose_multiple(&mut self.rng, BLITZ_CARDS)
                    .map(|entry| Card::from(*entry))
                    .collect();
                self.start_flashcards("Flashcard Blitz", cards, Subject::Vocabulary, true, back)
            }
            MenuItem::Dashboard => Screen::Dashboard,
        }
    }

    // --- かな表 ---

    fn on_chart(&mut self, mut view: ChartView, code: KeyCode) -> Screen {
        let script = view.script;
        let len = self.content.characters(script).len();
        let categories: Vec<CharacterCategory> = self
            .content
            .characters(script)
            .iter()
            .map(|c| c.category)
            .collect();

        match code {
            KeyCode::Left => view.cursor = view.cursor.saturating_sub(1),
            KeyCode::Right => view.cursor = (view.cursor + 1).min(len.saturating_sub(1)),
            KeyCode::Up => view.cursor = grid_move(&categories, view.cursor, false),
            KeyCode::Down => view.cursor = grid_move(&categories, view.cursor, true),
            KeyCode::Enter | KeyCode::Char(' ') => {
                if let Some(entry) = self.content.characters(script).get(view.cursor) {
                    let id = entry.id.clone();
                    self.toggle_learned(script_category(script), &id, Subject::Characters);
                }
            }
            KeyCode::Char('s') => {
                if let Some(entry) = self.content.characters(script).get(view.cursor) {
                    let text = entry.glyph.clone();
                    self.speak(&text);
                }
            }
            KeyCode::Char('f') => {
                let cards: Vec<Card> = self
                    .content
                    .characters_in(script, CharacterCategory::Basic)
                    .into_iter()
                    .map(Card::from)
                    .collect();
                let title = format!("{} Flashcards", script.name());
                return self.start_flashcards(&title, cards, Subject::Characters, false, Screen::Chart(view));
            }
            KeyCode::Char('q') => {
                let basic = self.content.characters_in(script, CharacterCategory::Basic);
                let count = self.config.quiz.question_count;
                let distractors = self.config.quiz.distractor_count;
                let built = quiz::build_quiz(&basic, QuizField::Romanization, count, distractors, &mut self.rng);
                let title = format!("{} Quiz", script.name());
                return match built {
                    Ok(questions) => self.start_quiz(
                        &title,
                        QuizKind::Subject(Subject::Characters),
                        questions,
                        Screen::Chart(view),
                    ),
                    Err(err) => {
                        self.message = Some(err.to_string());
                        Screen::Chart(view)
                    }
                };
            }
            KeyCode::Esc => {
                let item = match script {
                    Script::Hiragana => MenuItem::Hiragana,
                    Script::Katakana => MenuItem::Katakana,
                };
                return Screen::Menu {
                    cursor: item.position(),
                };
            }
            _ => {}
        }
        Screen::Chart(view)
    }

    // --- 語彙・漢字・文法の一覧 ---

    /// 一覧画面で表示中のデータの位置
    pub fn browser_indices(&self, view: &BrowserView) -> Vec<usize> {
        match view.kind {
            BrowserKind::Vocabulary => matching_indices(self.content.vocabulary(), view.level, &view.search),
            BrowserKind::Kanji => matching_indices(self.content.kanji(), view.level, &view.search),
            BrowserKind::Grammar => matching_indices(self.content.grammar(), view.level, &view.search),
        }
    }

    fn on_browser(&mut self, mut view: BrowserView, code: KeyCode) -> Screen {
        // 検索語の入力中
        if view.searching {
            match code {
                KeyCode::Char(c) => view.search.push(c),
                KeyCode::Backspace => {
                    view.search.pop();
                }
                KeyCode::Enter | KeyCode::Esc => view.searching = false,
                _ => {}
            }
            view.cursor = 0;
            return Screen::Browser(view);
        }

        let indices = self.browser_indices(&view);
        let selected = indices.get(view.cursor).copied();

        match code {
            KeyCode::Up => view.cursor = view.cursor.saturating_sub(1),
            KeyCode::Down => view.cursor = (view.cursor + 1).min(indices.len().saturating_sub(1)),
            KeyCode::Tab => {
                view.level = next_level_filter(view.level);
                view.cursor = 0;
            }
            KeyCode::Char('/') => view.searching = true,
            KeyCode::Enter | KeyCode::Char(' ') => {
                if let Some(index) = selected {
                    let id = self.browser_id(view.kind, index);
                    self.toggle_learned(view.kind.category(), &id, view.kind.subject());
                }
            }
            KeyCode::Char('s') => {
                if let Some(index) = selected {
                    if let Some(text) = self.browser_audio(view.kind, index) {
                        self.speak(&text);
                    }
                }
            }
            KeyCode::Char('f') => {
                if indices.is_empty() {
                    self.message = Some("Nothing to study with the current filter".to_string());
                } else {
                    let cards = self.browser_cards(view.kind, &indices);
                    let title = format!("{} Flashcards", view.kind.title());
                    let subject = view.kind.subject();
                    return self.start_flashcards(&title, cards, subject, false, Screen::Browser(view));
                }
            }
            KeyCode::Char('q') => return self.browser_quiz(view, &indices, QuizField::Meaning),
            KeyCode::Char('r') => {
                if let Some(field) = view.kind.reading_field() {
                    return self.browser_quiz(view, &indices, field);
                }
            }
            KeyCode::Esc => {
                return Screen::Menu {
                    cursor: view.kind.menu_item().position(),
                };
            }
            _ => {}
        }
        Screen::Browser(view)
    }

    fn browser_id(&self, kind: BrowserKind, index: usize) -> String {
        match kind {
            BrowserKind::Vocabulary => self.content.vocabulary()[index].id.clone(),
            BrowserKind::Kanji => self.content.kanji()[index].id.clone(),
            BrowserKind::Grammar => self.content.grammar()[index].id.clone(),
        }
    }

    fn browser_audio(&self, kind: BrowserKind, index: usize) -> Option<String> {
        match kind {
            BrowserKind::Vocabulary => Some(self.content.vocabulary()[index].word.clone()),
            BrowserKind::Kanji => Some(self.content.kanji()[index].glyph.clone()),
            BrowserKind::Grammar => self.content.grammar()[index]
                .examples
                .first()
                .map(|e| e.japanese.clone()),
        }
    }

    fn browser_cards(&self, kind: BrowserKind, indices: &[usize]) -> Vec<Card> {
        match kind {
            BrowserKind::Vocabulary => indices.iter().map(|&i| Card::from(&self.content.vocabulary()[i])).collect(),
            BrowserKind::Kanji => indices.iter().map(|&i| Card::from(&self.content.kanji()[i])).collect(),
            BrowserKind::Grammar => indices.iter().map(|&i| Card::from(&self.content.grammar()[i])).collect(),
        }
    }

    /// 絞り込み中のデータから出題し、ダミーは全データから選ぶ
    fn browser_quiz(&mut self, view: BrowserView, indices: &[usize], field: QuizField) -> Screen {
        if indices.is_empty() {
            self.message = Some("Nothing to quiz with the current filter".to_string());
            return Screen::Browser(view);
        }
        let count = self.config.quiz.question_count;
        let distractors = self.config.quiz.distractor_count;
        let picked: Vec<usize> = indices.choose_multiple(&mut self.rng, count).copied().collect();

        let content = &self.content;
        let rng = &mut self.rng;
        let built = match view.kind {
            BrowserKind::Vocabulary => {
                let pool = content.vocabulary();
                let targets: Vec<&VocabularyEntry> = picked.iter().map(|&i| &pool[i]).collect();
                quiz::quiz_for_targets(pool, &targets, field, distractors, rng)
            }
            BrowserKind::Kanji => {
                let pool = content.kanji();
                let targets: Vec<&KanjiEntry> = picked.iter().map(|&i| &pool[i]).collect();
                quiz::quiz_for_targets(pool, &targets, field, distractors, rng)
            }
            BrowserKind::Grammar => {
                let pool = content.grammar();
                let targets: Vec<&GrammarEntry> = picked.iter().map(|&i| &pool[i]).collect();
                quiz::quiz_for_targets(pool, &targets, field, distractors, rng)
            }
        };

        match built {
            Ok(questions) => {
                let title = format!("{} Quiz ({})", view.kind.title(), field.name());
                let kind = QuizKind::Subject(view.kind.subject());
                self.start_quiz(&title, kind, questions, Screen::Browser(view))
            }
            Err(err) => {
                self.message = Some(err.to_string());
                Screen::Browser(view)
            }
        }
    }

    // --- 読解 ---

    /// 設定のレベルで絞り込んだ読解文
    pub fn reading_passages(&self) -> Vec<&ReadingPassage> {
        self.content.reading_at(self.config.study.level)
    }

    fn on_reading_list(&mut self, cursor: usize, code: KeyCode) -> Screen {
        let len = self.reading_passages().len();
        match code {
            KeyCode::Up => Screen::ReadingList {
                cursor: cursor.saturating_sub(1),
            },
            KeyCode::Down => Screen::ReadingList {
                cursor: (cursor + 1).min(len.saturating_sub(1)),
            },
            KeyCode::Enter => {
                let picked = self
                    .reading_passages()
                    .get(cursor)
                    .map(|passage| (passage.title.clone(), quiz::passage_quiz(passage)));
                match picked {
                    Some((title, questions)) => {
                        self.start_quiz(&title, QuizKind::Reading(cursor), questions, Screen::ReadingList { cursor })
                    }
                    None => Screen::ReadingList { cursor },
                }
            }
            KeyCode::Esc => Screen::Menu {
                cursor: MenuItem::Reading.position(),
            },
            _ => Screen::ReadingList { cursor },
        }
    }

    // --- フラッシュカード ---

    fn start_flashcards(
        &mut self,
        title: &str,
        cards: Vec<Card>,
        subject: Subject,
        blitz: bool,
        return_to: Screen,
    ) -> Screen {
        if cards.is_empty() {
            self.message = Some("No cards to study".to_string());
            return return_to;
        }
        let mode = if blitz { DeckMode::Once } else { DeckMode::Loop };
        Screen::Flashcards(FlashcardView {
            title: title.to_string(),
            deck: FlashcardDeck::new(cards, mode),
            subject,
            blitz,
            return_to: Box::new(return_to),
        })
    }

    fn on_flashcards(&mut self, mut view: FlashcardView, code: KeyCode) -> Screen {
        let rating = match code {
            KeyCode::Char(' ') | KeyCode::Enter => {
                view.deck.flip();
                None
            }
            KeyCode::Char('1') => Some(Rating::Hard),
            KeyCode::Char('2') => Some(Rating::Good),
            KeyCode::Char('3') => Some(Rating::Easy),
            KeyCode::Char('s') => {
                if let Some(text) = view.deck.current().and_then(|card| card.audio.clone()) {
                    self.speak(&text);
                }
                None
            }
            KeyCode::Esc => return *view.return_to,
            _ => None,
        };

        // 自己評価はカードの裏面を見てから
        let Some(rating) = rating else {
            return Screen::Flashcards(view);
        };
        if !view.deck.is_flipped() {
            return Screen::Flashcards(view);
        }

        if !view.blitz {
            self.award(Activity::Flashcard(view.subject, rating));
        }
        match view.deck.rate(rating) {
            DeckStep::Finished => {
                if view.blitz {
                    self.award(Activity::Blitz(view.deck.points()));
                }
                *view.return_to
            }
            DeckStep::Next | DeckStep::Wrapped => Screen::Flashcards(view),
        }
    }

    // --- クイズ ---

    fn start_quiz(
        &mut self,
        title: &str,
        kind: QuizKind,
        questions: Vec<QuizQuestion>,
        return_to: Screen,
    ) -> Screen {
        if questions.is_empty() {
            self.message = Some("No questions available".to_string());
            return return_to;
        }
        tracing::debug!(title, questions = questions.len(), "quiz started");
        Screen::Quiz(QuizView {
            title: title.to_string(),
            kind,
            session: QuizSession::new(questions),
            cursor: 0,
            return_to: Box::new(return_to),
        })
    }

    fn on_quiz(&mut self, mut view: QuizView, code: KeyCode) -> Screen {
        if view.session.is_complete() {
            return match code {
                KeyCode::Enter | KeyCode::Esc => *view.return_to,
                _ => Screen::Quiz(view),
            };
        }

        let options = view.session.current().map_or(0, |q| q.options.len());
        match code {
            KeyCode::Up => view.cursor = view.cursor.saturating_sub(1),
            KeyCode::Down => view.cursor = (view.cursor + 1).min(options.saturating_sub(1)),
            KeyCode::Char(c @ '1'..='9') => {
                let index = c as usize - '1' as usize;
                if index < options {
                    view.cursor = index;
                    self.answer(&mut view);
                }
            }
            KeyCode::Enter | KeyCode::Char('n') => match view.session.phase() {
                Phase::Unanswered if code == KeyCode::Enter => self.answer(&mut view),
                Phase::Answered { .. } => match view.session.advance() {
                    Ok(Some(summary)) => self.finish_quiz(view.kind, summary),
                    Ok(None) => view.cursor = 0,
                    Err(err) => tracing::warn!(error = %err, "unexpected quiz transition"),
                },
                _ => {}
            },
            KeyCode::Char('r') if view.kind == QuizKind::Listening => {
                if let Err(err) = view.session.retry() {
                    tracing::debug!(error = %err, "retry ignored");
                }
            }
            KeyCode::Char('s') | KeyCode::Char('p') => {
                if let Some(text) = view.session.current().and_then(|q| q.audio_text.clone()) {
                    self.speak(&text);
                }
            }
            KeyCode::Esc => return *view.return_to,
            _ => {}
        }
        Screen::Quiz(view)
    }

    fn answer(&mut self, view: &mut QuizView) {
        match view.session.select(view.cursor) {
            Ok(outcome) => {
                tracing::debug!(correct = outcome.correct, "answered");
            }
            Err(err) => tracing::debug!(error = %err, "answer ignored"),
        }
    }

    fn finish_quiz(&mut self, kind: QuizKind, summary: SessionSummary) {
        tracing::info!(score = summary.score, total = summary.total, "quiz complete");
        let activity = match kind {
            QuizKind::Subject(subject) => Activity::Quiz(subject, summary.score),
            QuizKind::Reading(index) => {
                let passage_id = self.reading_passages().get(index).map(|p| p.id.clone());
                if let Some(id) = passage_id {
                    if !self.progress.is_learned(ProgressCategory::Reading, &id) {
                        self.progress.toggle_learned(ProgressCategory::Reading, &id);
                    }
                }
                Activity::Reading(summary.score)
            }
            QuizKind::Mixed => Activity::MixedChallenge(summary.score),
            QuizKind::Speed => Activity::SpeedChallenge(summary.score),
            QuizKind::Listening => Activity::Listening(summary.score),
        };
        self.award(activity);
    }

    // --- 共通処理 ---

    /// 「覚えた」の付け外し。付けたときだけ XP を与える
    fn toggle_learned(&mut self, category: ProgressCategory, id: &str, subject: Subject) {
        if self.progress.toggle_learned(category, id) {
            self.award(Activity::Learned(subject));
        } else {
            self.message = None;
        }
    }

    /// XP を与えてステータス行に表示する
    fn award(&mut self, activity: Activity) {
        let xp = xp_for(activity);
        let leveled_up = self.progress.award(xp);
        let level = self.progress.record().level;
        self.message = Some(if leveled_up {
            format!("+{xp} XP  Level up! Lv.{level}")
        } else {
            format!("+{xp} XP")
        });
    }

    fn speak(&mut self, text: &str) {
        if !self.speaker.is_supported() {
            return;
        }
        let utterance = Utterance::new(text)
            .with_rate(self.config.speech.rate)
            .with_volume(self.config.speech.volume);
        self.speaker.speak(&utterance);
        self.speaking = true;
    }
}

/// 文字表に対応する進行状況のカテゴリ
pub fn script_category(script: Script) -> ProgressCategory {
    match script {
        Script::Hiragana => ProgressCategory::Hiragana,
        Script::Katakana => ProgressCategory::Katakana,
    }
}

/// かな表の上下移動
///
/// 表はカテゴリごとに `GRID_COLUMNS` 列で並ぶので、
/// 同じ列を保ったまま隣の行 (またはカテゴリ) に移る。
pub fn grid_move(categories: &[CharacterCategory], index: usize, down: bool) -> usize {
    if categories.is_empty() {
        return 0;
    }
    let index = index.min(categories.len() - 1);
    let category = categories[index];
    let start = categories[..index]
        .iter()
        .rposition(|c| *c != category)
        .map_or(0, |i| i + 1);
    let end = categories[index..]
        .iter()
        .position(|c| *c != category)
        .map_or(categories.len(), |i| index + i);
    let column = (index - start) % GRID_COLUMNS;

    if down {
        if index + GRID_COLUMNS < end {
            return index + GRID_COLUMNS;
        }
        if end >= categories.len() {
            return index;
        }
        // 次のカテゴリの先頭行へ
        let next_category = categories[end];
        let next_end = categories[end..]
            .iter()
            .position(|c| *c != next_category)
            .map_or(categories.len(), |i| end + i);
        (end + column).min(next_end - 1)
    } else {
        if index >= start + GRID_COLUMNS {
            return index - GRID_COLUMNS;
        }
        if start == 0 {
            return index;
        }
        // 前のカテゴリの最終行へ
        let prev_category = categories[start - 1];
        let prev_start = categories[..start]
            .iter()
            .rposition(|c| *c != prev_category)
            .map_or(0, |i| i + 1);
        let last_row = prev_start + (start - 1 - prev_start) / GRID_COLUMNS * GRID_COLUMNS;
        (last_row + column).min(start - 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::MemoryStorage;
    use crate::speech::NullSpeaker;
    use rand::SeedableRng;

    fn app() -> App {
        app_with(Config::default())
    }

    fn app_with(config: Config) -> App {
        App::new(
            ContentStore::bundled().unwrap(),
            ProgressStore::open(Box::new(MemoryStorage::new())),
            Box::new(NullSpeaker),
            config,
            StdRng::seed_from_u64(17),
        )
    }

    fn open(app: &mut App, item: MenuItem) {
        for _ in 0..item.position() {
            app.handle_key(KeyCode::Down);
        }
        app.handle_key(KeyCode::Enter);
    }

    /// 今の問題に正解する
    fn answer_correctly(app: &mut App) {
        let index = match &app.screen {
            Screen::Quiz(view) => view.session.current().unwrap().correct_index,
            _ => panic!("not in a quiz"),
        };
        app.handle_key(KeyCode::Char(char::from(b'1' + index as u8)));
        app.handle_key(KeyCode::Enter);
    }

    #[test]
    fn menu_quits_on_q() {
        let mut app = app();
        app.handle_key(KeyCode::Char('q'));
        assert!(app.should_quit);
    }

    #[test]
    fn learning_a_word_awards_xp_and_keeps_it_when_unmarked() {
        let mut app = app();
        open(&mut app, MenuItem::Vocabulary);
        assert!(matches!(app.screen, Screen::Browser(_)));

        app.handle_key(KeyCode::Enter);
        assert_eq!(app.progress.record().xp, 10);
        assert_eq!(app.progress.record().count(ProgressCategory::Vocabulary), 1);
        assert_eq!(app.progress.record().streak, 1);

        // 外しても XP は減らない
        app.handle_key(KeyCode::Enter);
        assert_eq!(app.progress.record().xp, 10);
        assert_eq!(app.progress.record().count(ProgressCategory::Vocabulary), 0);
    }

    #[test]
    fn relearning_a_word_awards_xp_again() {
        let mut app = app();
        open(&mut app, MenuItem::Vocabulary);

        app.handle_key(KeyCode::Enter);
        app.handle_key(KeyCode::Enter);
        app.handle_key(KeyCode::Enter);
        assert_eq!(app.progress.record().xp, 20);
        assert_eq!(app.progress.record().count(ProgressCategory::Vocabulary), 1);
    }

    #[test]
    fn browser_filters_by_level_and_search() {
        let mut app = app();
        open(&mut app, MenuItem::Vocabulary);
        app.handle_key(KeyCode::Tab);
        let Screen::Browser(view) = &app.screen else { panic!() };
        assert_eq!(view.level, Some(Level::N5));
        let indices = app.browser_indices(view);
        assert!(indices.iter().all(|&i| app.content.vocabulary()[i].level == Level::N5));

        app.handle_key(KeyCode::Char('/'));
        for c in "water".chars() {
            app.handle_key(KeyCode::Char(c));
        }
        app.handle_key(KeyCode::Enter);
        let Screen::Browser(view) = &app.screen else { panic!() };
        let indices = app.browser_indices(view);
        assert_eq!(indices.len(), 1);
        assert_eq!(app.content.vocabulary()[indices[0]].word, "水");
    }

    #[test]
    fn empty_search_shows_message_instead_of_quiz() {
        let mut app = app();
        open(&mut app, MenuItem::Grammar);
        app.handle_key(KeyCode::Char('/'));
        for c in "zzzz".chars() {
            app.handle_key(KeyCode::Char(c));
        }
        app.handle_key(KeyCode::Enter);
        app.handle_key(KeyCode::Char('q'));
        assert!(matches!(app.screen, Screen::Browser(_)));
        assert!(app.message.is_some());
    }

    #[test]
    fn perfect_vocabulary_quiz_awards_per_answer() {
        let mut app = app();
        open(&mut app, MenuItem::Vocabulary);
        app.handle_key(KeyCode::Char('q'));
        let total = match &app.screen {
            Screen::Quiz(view) => view.session.len(),
            _ => panic!("quiz should start"),
        };
        assert_eq!(total, 10);
        for _ in 0..total {
            answer_correctly(&mut app);
        }
        let Screen::Quiz(view) = &app.screen else { panic!() };
        assert_eq!(view.session.summary().unwrap().score, 10);
        assert_eq!(app.progress.record().xp, 250);
        assert_eq!(app.progress.record().level, 3);

        app.handle_key(KeyCode::Enter);
        assert!(matches!(app.screen, Screen::Browser(_)));
    }

    #[test]
    fn answered_question_ignores_other_options() {
        let mut app = app();
        open(&mut app, MenuItem::Hiragana);
        app.handle_key(KeyCode::Char('q'));
        let correct = match &app.screen {
            Screen::Quiz(view) => view.session.current().unwrap().correct_index,
            _ => panic!(),
        };
        let wrong = (correct + 1) % 4;
        app.handle_key(KeyCode::Char(char::from(b'1' + wrong as u8)));
        app.handle_key(KeyCode::Char(char::from(b'1' + correct as u8)));
        let Screen::Quiz(view) = &app.screen else { panic!() };
        assert_eq!(view.session.score(), 0);
        assert!(matches!(view.session.phase(), Phase::Answered { correct: false, .. }));
    }

    #[test]
    fn reading_marks_passage_complete() {
        let mut app = app();
        open(&mut app, MenuItem::Reading);
        app.handle_key(KeyCode::Enter);
        let questions = app.content.reading()[0].questions.len();
        for _ in 0..questions {
            answer_correctly(&mut app);
        }
        assert_eq!(app.progress.record().count(ProgressCategory::Reading), 1);
        assert_eq!(app.progress.record().xp, 40 * questions as u32);
    }

    #[test]
    fn listening_retry_keeps_first_score() {
        let mut app = app();
        open(&mut app, MenuItem::Listening);
        let correct = match &app.screen {
            Screen::Quiz(view) => view.session.current().unwrap().correct_index,
            _ => panic!("listening should start"),
        };
        let wrong = (correct + 1) % 4;
        app.handle_key(KeyCode::Char(char::from(b'1' + wrong as u8)));
        app.handle_key(KeyCode::Char('r'));
        app.handle_key(KeyCode::Char(char::from(b'1' + correct as u8)));
        let Screen::Quiz(view) = &app.screen else { panic!() };
        assert_eq!(view.session.score(), 0);
        assert!(matches!(view.session.phase(), Phase::Answered { correct: true, .. }));
    }

    #[test]
    fn flashcards_award_xp_after_flip() {
        let mut app = app();
        open(&mut app, MenuItem::Kanji);
        app.handle_key(KeyCode::Char('f'));
        assert!(matches!(app.screen, Screen::Flashcards(_)));

        // 表のままでは評価できない
        app.handle_key(KeyCode::Char('3'));
        assert_eq!(app.progress.record().xp, 0);

        app.handle_key(KeyCode::Char(' '));
        app.handle_key(KeyCode::Char('3'));
        assert_eq!(app.progress.record().xp, 25);
    }

    #[test]
    fn blitz_awards_once_at_the_end() {
        let mut app = app();
        open(&mut app, MenuItem::FlashcardBlitz);
        let cards = match &app.screen {
            Screen::Flashcards(view) => view.deck.len(),
            _ => panic!("blitz should start"),
        };
        for _ in 0..cards {
            app.handle_key(KeyCode::Char(' '));
            app.handle_key(KeyCode::Char('2'));
        }
        assert!(matches!(app.screen, Screen::Menu { .. }));
        assert_eq!(app.progress.record().xp, 50 + 5 * 2 * cards as u32);
    }

    #[test]
    fn mixed_challenge_awards_base_xp() {
        let mut app = app();
        open(&mut app, MenuItem::MixedChallenge);
        let total = match &app.screen {
            Screen::Quiz(view) => view.session.len(),
            _ => panic!(),
        };
        for _ in 0..total {
            answer_correctly(&mut app);
        }
        assert_eq!(app.progress.record().xp, 100 + 15 * total as u32);
    }

    #[test]
    fn speed_challenge_asks_romaji_for_first_basic_hiragana() {
        let mut app = app();
        open(&mut app, MenuItem::SpeedChallenge);
        let Screen::Quiz(view) = &app.screen else {
            panic!("speed challenge should start")
        };
        assert_eq!(view.kind, QuizKind::Speed);
        assert_eq!(view.session.len(), 15);

        let first: Vec<String> = app
            .content
            .characters_in(Script::Hiragana, CharacterCategory::Basic)
            .iter()
            .take(15)
            .map(|c| c.romanization.clone())
            .collect();
        let question = view.session.current().unwrap();
        assert_eq!(question.options.len(), 4);
        assert!(first.contains(&question.correct_answer().to_string()));

        let total = view.session.len();
        for _ in 0..total {
            answer_correctly(&mut app);
        }
        assert_eq!(app.progress.record().xp, 50 + 5 * total as u32);
    }

    #[test]
    fn reading_list_follows_configured_level() {
        let mut config = Config::default();
        config.study.level = Some(Level::N4);
        let mut app = app_with(config);

        let passages = app.reading_passages();
        assert!(!passages.is_empty());
        assert!(passages.iter().all(|p| p.level == Level::N4));
        let id = passages[0].id.clone();
        let questions = passages[0].questions.len();

        open(&mut app, MenuItem::Reading);
        app.handle_key(KeyCode::Enter);
        for _ in 0..questions {
            answer_correctly(&mut app);
        }
        assert!(app.progress.is_learned(ProgressCategory::Reading, &id));
        assert_eq!(app.progress.record().count(ProgressCategory::Reading), 1);
    }

    #[test]
    fn grid_moves_by_row_within_category() {
        use CharacterCategory::*;
        // Basic 7 文字, Dakuten 3 文字
        let cats = [Basic, Basic, Basic, Basic, Basic, Basic, Basic, Dakuten, Dakuten, Dakuten];
        assert_eq!(grid_move(&cats, 1, true), 6);
        // 最終行から次のカテゴリへ (同じ列)
        assert_eq!(grid_move(&cats, 6, true), 8);
        assert_eq!(grid_move(&cats, 5, true), 7);
        // 列が足りなければ末尾に寄せる
        assert_eq!(grid_move(&cats, 4, true), 9);
        assert_eq!(grid_move(&cats, 9, true), 9);
        // 上へ
        assert_eq!(grid_move(&cats, 8, false), 6);
        assert_eq!(grid_move(&cats, 6, false), 1);
        assert_eq!(grid_move(&cats, 2, false), 2);
    }

    #[test]
    fn level_filter_cycles() {
        assert_eq!(next_level_filter(None), Some(Level::N5));
        assert_eq!(next_level_filter(Some(Level::N5)), Some(Level::N4));
        assert_eq!(next_level_filter(Some(Level::N4)), None);
    }
}
