// ============================================
// src/session.rs
// クイズセッションの状態遷移 (未回答 → 回答済み → 次の問題 / 終了)
// ============================================

use crate::error::SessionError;
use crate::quiz::QuizQuestion;

/// 現在の問題の状態
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Unanswered,
    /// 回答済み (この問題への入力はロックされる)
    Answered { selected: usize, correct: bool },
    Complete,
}

/// 回答の判定結果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnswerOutcome {
    pub correct: bool,
    pub correct_index: usize,
}

/// セッション終了時に呼び出し元へ返す集計
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSummary {
    pub score: u32,
    pub total: u32,
}

impl SessionSummary {
    pub fn percent(&self) -> u32 {
        if self.total == 0 {
            0
        } else {
            (self.score as f64 / self.total as f64 * 100.0).round() as u32
        }
    }
}

#[derive(Debug, Clone)]
pub struct QuizSession {
    questions: Vec<QuizQuestion>,
    current: usize,
    phase: Phase,
    score: u32,
    /// 採点済みの問題 (やり直しでは再採点しない)
    scored: Vec<bool>,
}

impl QuizSession {
    pub fn new(questions: Vec<QuizQuestion>) -> Self {
        let phase = if questions.is_empty() {
            Phase::Complete
        } else {
            Phase::Unanswered
        };
        let scored = vec![false; questions.len()];
        Self {
            questions,
            current: 0,
            phase,
            score: 0,
            scored,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_complete(&self) -> bool {
        self.phase == Phase::Complete
    }

    /// 現在の問題 (終了後は `None`)
    pub fn current(&self) -> Option<&QuizQuestion> {
        if self.is_complete() {
            None
        } else {
            self.questions.get(self.current)
        }
    }

    /// 0始まりの問題番号
    pub fn position(&self) -> usize {
        self.current
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    pub fn score(&self) -> u32 {
        self.score
    }

    /// 回答済みの問題数
    pub fn answered(&self) -> usize {
        self.scored.iter().filter(|s| **s).count()
    }

    pub fn is_last(&self) -> bool {
        self.current + 1 >= self.questions.len()
    }

    /// MARK:選択肢を選ぶ (未回答 → 回答済み)
    pub fn select(&mut self, index: usize) -> Result<AnswerOutcome, SessionError> {
        match self.phase {
            Phase::Complete => return Err(SessionError::Finished),
            Phase::Answered { .. } => return Err(SessionError::AlreadyAnswered),
            Phase::Unanswered => {}
        }

        let question = &self.questions[self.current];
        if index >= question.options.len() {
            return Err(SessionError::OptionOutOfRange {
                index,
                options: question.options.len(),
            });
        }

        let correct = question.is_correct(index);
        let correct_index = question.correct_index;

        // 最初の回答だけを採点する
        if !self.scored[self.current] {
            self.scored[self.current] = true;
            if correct {
                self.score += 1;
            }
        }

        self.phase = Phase::Answered {
            selected: index,
            correct,
        };
        Ok(AnswerOutcome {
            correct,
            correct_index,
        })
    }

    /// 同じ問題をもう一度回答できる状態に戻す (得点は変わらない)
    pub fn retry(&mut self) -> Result<(), SessionError> {
        match self.phase {
            Phase::Answered { .. } => {
                self.phase = Phase::Unanswered;
                Ok(())
            }
            Phase::Unanswered => Err(SessionError::NotAnswered),
            Phase::Complete => Err(SessionError::Finished),
        }
    }

    /// MARK:次の問題へ進む。最後の問題なら集計を返す
    pub fn advance(&mut self) -> Result<Option<SessionSummary>, SessionError> {
        match self.phase {
            Phase::Answered { .. } => {}
            Phase::Unanswered => return Err(SessionError::NotAnswered),
            Phase::Complete => return Err(SessionError::Finished),
        }

        if self.is_last() {
            self.phase = Phase::Complete;
            Ok(Some(self.summary_now()))
        } else {
            self.current += 1;
            self.phase = Phase::Unanswered;
            Ok(None)
        }
    }

    /// 終了していれば集計を返す
    pub fn summary(&self) -> Option<SessionSummary> {
        self.is_complete().then(|| self.summary_now())
    }

    fn summary_now(&self) -> SessionSummary {
        SessionSummary {
            score: self.score,
            total: self.questions.len() as u32,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quiz::QuestionKind;

    fn question(correct_index: usize) -> QuizQuestion {
        QuizQuestion {
            kind: QuestionKind::Comprehension,
            prompt: "?".to_string(),
            options: vec!["a".into(), "b".into(), "c".into(), "d".into()],
            correct_index,
            level: None,
            audio_text: None,
            explanation: None,
            tags: Vec::new(),
        }
    }

    #[test]
    fn answering_every_question_completes_with_score() {
        let mut session = QuizSession::new(vec![question(0), question(2), question(1)]);
        assert_eq!(session.phase(), Phase::Unanswered);

        assert!(session.select(0).unwrap().correct);
        assert_eq!(session.advance().unwrap(), None);

        let outcome = session.select(3).unwrap();
        assert!(!outcome.correct);
        assert_eq!(outcome.correct_index, 2);
        assert_eq!(session.advance().unwrap(), None);

        session.select(1).unwrap();
        let summary = session.advance().unwrap().unwrap();
        assert_eq!(summary, SessionSummary { score: 2, total: 3 });
        assert!(session.is_complete());
        assert!(session.current().is_none());
        assert_eq!(session.summary(), Some(summary));
    }

    #[test]
    fn answered_question_is_locked() {
        let mut session = QuizSession::new(vec![question(1), question(1)]);
        session.select(0).unwrap();
        assert_eq!(session.select(1), Err(SessionError::AlreadyAnswered));
        assert_eq!(session.score(), 0);
    }

    #[test]
    fn cannot_advance_without_answering() {
        let mut session = QuizSession::new(vec![question(0)]);
        assert_eq!(session.advance(), Err(SessionError::NotAnswered));
    }

    #[test]
    fn out_of_range_option_is_rejected() {
        let mut session = QuizSession::new(vec![question(0)]);
        assert_eq!(
            session.select(4),
            Err(SessionError::OptionOutOfRange { index: 4, options: 4 })
        );
        assert_eq!(session.phase(), Phase::Unanswered);
    }

    #[test]
    fn retry_does_not_rescore() {
        let mut session = QuizSession::new(vec![question(2)]);
        session.select(0).unwrap();
        session.retry().unwrap();
        assert_eq!(session.phase(), Phase::Unanswered);
        assert!(session.select(2).unwrap().correct);
        assert_eq!(session.score(), 0);
        assert_eq!(session.answered(), 1);

        let summary = session.advance().unwrap().unwrap();
        assert_eq!(summary.score, 0);
        assert_eq!(session.select(0), Err(SessionError::Finished));
    }

    #[test]
    fn empty_session_is_complete_immediately() {
        let session = QuizSession::new(Vec::new());
        assert!(session.is_complete());
        assert_eq!(session.summary(), Some(SessionSummary { score: 0, total: 0 }));
        assert_eq!(session.summary().unwrap().percent(), 0);
    }
}
