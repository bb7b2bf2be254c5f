// ============================================
// src/rewards.rs
// 学習アクションごとの獲得 XP
// ============================================

use crate::flashcard::Rating;

/// XP の対象になる学習分野
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Subject {
    Characters,
    Vocabulary,
    Kanji,
    Grammar,
}

/// XP がもらえる学習アクション
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activity {
    /// 「覚えた」に印をつけた
    Learned(Subject),
    /// フラッシュカードを自己評価した
    Flashcard(Subject, Rating),
    /// 分野別クイズを終えた (正解数)
    Quiz(Subject, u32),
    /// 読解の設問を終えた (正解数)
    Reading(u32),
    MixedChallenge(u32),
    /// ひらがなスピードチャレンジを終えた (正解数)
    SpeedChallenge(u32),
    Listening(u32),
    /// フラッシュカードブリッツを終えた (自己評価の合計点)
    Blitz(u32),
}

/// アクションに対する XP
pub fn xp_for(activity: Activity) -> u32 {
    match activity {
        Activity::Learned(subject) => match subject {
            Subject::Characters => 5,
            Subject::Vocabulary => 10,
            Subject::Kanji => 15,
            Subject::Grammar => 20,
        },
        Activity::Flashcard(subject, rating) => {
            // hard / good / easy の順に 5 ずつ増える
            let base = match subject {
                Subject::Characters => 5,
                Subject::Vocabulary => 10,
                Subject::Kanji | Subject::Grammar => 15,
            };
            base + 5 * (rating.points() - 1)
        }
        Activity::Quiz(subject, score) => {
            let per_answer = match subject {
                Subject::Characters => 20,
                Subject::Vocabulary => 25,
                Subject::Kanji => 30,
                Subject::Grammar => 35,
            };
            score * per_answer
        }
        Activity::Reading(correct) => correct * 40,
        Activity::MixedChallenge(score) => 100 + score * 15,
        Activity::SpeedChallenge(score) => 50 + score * 5,
        Activity::Listening(score) => 80 + score * 16,
        Activity::Blitz(points) => 50 + points * 5,
    }
}
