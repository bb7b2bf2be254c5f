// ============================================
// src/lib.rs
// 日本語学習アプリ NIHONGO WIZ
// ============================================

pub mod app;
pub mod config;
pub mod content;
pub mod error;
pub mod flashcard;
pub mod progress;
pub mod quiz;
pub mod rewards;
pub mod roadmap;
pub mod session;
pub mod speech;
pub mod ui;
