// ============================================
// src/flashcard.rs
// フラッシュカードの束 (表裏の切り替えと自己評価)
// ============================================

/// カードをめくった後の自己評価
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rating {
    Hard,
    Good,
    Easy,
}

impl Rating {
    pub const ALL: [Rating; 3] = [Rating::Hard, Rating::Good, Rating::Easy];

    /// ブリッツ用の得点
    pub fn points(self) -> u32 {
        match self {
            Rating::Hard => 1,
            Rating::Good => 2,
            Rating::Easy => 3,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Rating::Hard => "Hard",
            Rating::Good => "Good",
            Rating::Easy => "Easy",
        }
    }
}

/// 最後のカードの後の動き
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeckMode {
    /// 先頭に戻って続ける
    Loop,
    /// 最後のカードで終了する
    Once,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeckStep {
    Next,
    Wrapped,
    Finished,
}

#[derive(Debug, Clone)]
pub struct FlashcardDeck<T> {
    cards: Vec<T>,
    index: usize,
    flipped: bool,
    mode: DeckMode,
    points: u32,
    finished: bool,
}

impl<T> FlashcardDeck<T> {
    pub fn new(cards: Vec<T>, mode: DeckMode) -> Self {
        let finished = cards.is_empty();
        Self {
            cards,
            index: 0,
            flipped: false,
            mode,
            points: 0,
            finished,
        }
    }

    pub fn current(&self) -> Option<&T> {
        if self.finished {
            None
        } else {
            self.cards.get(self.index)
        }
    }

    pub fn position(&self) -> usize {
        self.index
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    pub fn is_flipped(&self) -> bool {
        self.flipped
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// 自己評価の合計点
    pub fn points(&self) -> u32 {
        self.points
    }

    pub fn flip(&mut self) {
        if !self.finished {
            self.flipped = !self.flipped;
        }
    }

    /// 評価を記録して次のカードへ
    pub fn rate(&mut self, rating: Rating) -> DeckStep {
        if self.finished {
            return DeckStep::Finished;
        }
        self.points += rating.points();
        self.flipped = false;

        if self.index + 1 < self.cards.len() {
            self.index += 1;
            return DeckStep::Next;
        }
        match self.mode {
            DeckMode::Loop => {
                self.index = 0;
                DeckStep::Wrapped
            }
            DeckMode::Once => {
                self.finished = true;
                DeckStep::Finished
            }
        }
    }
}
