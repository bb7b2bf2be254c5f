// ============================================
// src/error.rs
// ドメインエラーの定義
// ============================================

use thiserror::Error;

/// 同梱データの読み込みエラー
#[derive(Debug, Error)]
pub enum ContentError {
    #[error("failed to parse bundled {table} table")]
    Parse {
        table: &'static str,
        #[source]
        source: serde_json::Error,
    },

    /// 正解インデックスが選択肢の範囲外
    #[error("{table} entry {id}: answer index {index} is out of range for {options} options")]
    InvalidAnswerKey {
        table: &'static str,
        id: String,
        index: usize,
        options: usize,
    },
}

/// 問題生成のエラー
#[derive(Debug, Error, PartialEq, Eq)]
pub enum QuizError {
    #[error("{field} cannot be quizzed for this kind of entry")]
    UnsupportedField { field: &'static str },
}

/// クイズセッションの不正な状態遷移
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("option {index} does not exist (question has {options} options)")]
    OptionOutOfRange { index: usize, options: usize },

    #[error("the current question has already been answered")]
    AlreadyAnswered,

    #[error("the current question has not been answered yet")]
    NotAnswered,

    #[error("the session is already complete")]
    Finished,
}
