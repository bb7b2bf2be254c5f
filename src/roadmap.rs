// ============================================
// src/roadmap.rs
// N4 合格までの目標と学習時間の見積もり
// ============================================

use crate::content::ContentStore;
use crate::progress::{ProgressCategory, ProgressRecord};

/// 分野ごとの件数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentStats {
    pub vocabulary: u32,
    pub kanji: u32,
    pub grammar: u32,
    pub listening: u32,
    pub quiz_questions: u32,
}

/// N4 に必要な分量の目安
pub const N4_TARGETS: ContentStats = ContentStats {
    vocabulary: 1500,
    kanji: 300,
    grammar: 140,
    listening: 100,
    quiz_questions: 1000,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Priority {
    High,
    Medium,
    Low,
}

impl Priority {
    pub fn label(self) -> &'static str {
        match self {
            Priority::High => "high",
            Priority::Medium => "medium",
            Priority::Low => "low",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoadmapItem {
    pub area: &'static str,
    pub current: u32,
    pub target: u32,
    pub remaining: u32,
    pub progress: u32,
    pub priority: Priority,
    /// 1件あたりの学習時間 (分)
    pub minutes_per_item: u32,
}

impl RoadmapItem {
    fn new(area: &'static str, current: u32, target: u32, priority: Priority, minutes_per_item: u32) -> Self {
        Self {
            area,
            current,
            target,
            remaining: target.saturating_sub(current),
            progress: progress_percentage(current, target),
            priority,
            minutes_per_item,
        }
    }
}

/// 目標に対する達成率 (0〜100 に丸める)
pub fn progress_percentage(current: u32, target: u32) -> u32 {
    if target == 0 {
        return 0;
    }
    let percent = (current as f64 / target as f64 * 100.0).round() as u32;
    percent.min(100)
}

/// 同梱データの件数
pub fn current_stats(store: &ContentStore) -> ContentStats {
    let quiz_questions = store.reading().iter().map(|p| p.questions.len()).sum::<usize>()
        + store.listening().len();
    ContentStats {
        vocabulary: store.vocabulary().len() as u32,
        kanji: store.kanji().len() as u32,
        grammar: store.grammar().len() as u32,
        listening: store.listening().len() as u32,
        quiz_questions: quiz_questions as u32,
    }
}

/// MARK:コンテンツ量と N4 目標の差
pub fn content_roadmap(store: &ContentStore) -> Vec<RoadmapItem> {
    let current = current_stats(store);
    vec![
        RoadmapItem::new("Vocabulary", current.vocabulary, N4_TARGETS.vocabulary, Priority::High, 2),
        RoadmapItem::new("Kanji", current.kanji, N4_TARGETS.kanji, Priority::High, 5),
        RoadmapItem::new("Grammar", current.grammar, N4_TARGETS.grammar, Priority::Medium, 10),
        RoadmapItem::new("Listening", current.listening, N4_TARGETS.listening, Priority::Medium, 3),
    ]
}

/// 問題数と N4 目標の差 (学習時間の見積もりには含めない)
pub fn quiz_status(store: &ContentStore) -> RoadmapItem {
    let current = current_stats(store);
    RoadmapItem::new("Quiz questions", current.quiz_questions, N4_TARGETS.quiz_questions, Priority::Low, 1)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StudyEstimate {
    pub total_minutes: u32,
    pub total_days: u32,
    /// 分野名と所要時間 (分)
    pub breakdown: Vec<(&'static str, u32)>,
}

/// 1日 `daily_minutes` 分学習した場合の見積もり
pub fn estimate_study_time(roadmap: &[RoadmapItem], daily_minutes: u32) -> StudyEstimate {
    let breakdown: Vec<(&'static str, u32)> = roadmap
        .iter()
        .map(|item| (item.area, item.remaining * item.minutes_per_item))
        .collect();
    let total_minutes: u32 = breakdown.iter().map(|(_, m)| m).sum();
    let total_days = if daily_minutes == 0 {
        0
    } else {
        total_minutes.div_ceil(daily_minutes)
    };
    StudyEstimate {
        total_minutes,
        total_days,
        breakdown,
    }
}

/// 学習者自身の N4 達成度
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requirement {
    pub area: &'static str,
    pub target: &'static str,
    pub progress: u32,
}

pub fn learner_requirements(record: &ProgressRecord) -> Vec<Requirement> {
    let pct = |category, target| progress_percentage(record.count(category), target);
    vec![
        Requirement {
            area: "Vocabulary",
            target: "1,500 words",
            progress: pct(ProgressCategory::Vocabulary, 1500),
        },
        Requirement {
            area: "Kanji",
            target: "250-300 characters",
            progress: pct(ProgressCategory::Kanji, 300),
        },
        Requirement {
            area: "Grammar",
            target: "130-132 patterns",
            progress: pct(ProgressCategory::Grammar, 130),
        },
        Requirement {
            area: "Reading",
            target: "Everyday texts",
            progress: pct(ProgressCategory::Reading, 20),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percentage_is_rounded_and_capped() {
        assert_eq!(progress_percentage(150, 1500), 10);
        assert_eq!(progress_percentage(1, 3), 33);
        assert_eq!(progress_percentage(2, 3), 67);
        assert_eq!(progress_percentage(400, 300), 100);
        assert_eq!(progress_percentage(5, 0), 0);
    }

    #[test]
    fn roadmap_uses_bundled_counts() {
        let store = ContentStore::bundled().unwrap();
        let roadmap = content_roadmap(&store);
        let vocab = &roadmap[0];
        assert_eq!(vocab.current, store.vocabulary().len() as u32);
        assert_eq!(vocab.remaining, 1500 - vocab.current);
        assert_eq!(vocab.priority, Priority::High);
        assert_eq!(roadmap[2].priority, Priority::Medium);
    }

    #[test]
    fn quiz_status_counts_bundled_questions() {
        let store = ContentStore::bundled().unwrap();
        let status = quiz_status(&store);
        let passages: usize = store.reading().iter().map(|p| p.questions.len()).sum();
        assert_eq!(status.current as usize, passages + store.listening().len());
        assert_eq!(status.target, 1000);
        assert_eq!(status.priority, Priority::Low);
        assert_eq!(status.progress, progress_percentage(status.current, 1000));
    }

    #[test]
    fn study_time_rounds_days_up() {
        let roadmap = vec![
            RoadmapItem::new("Vocabulary", 1490, 1500, Priority::High, 2),
            RoadmapItem::new("Kanji", 299, 300, Priority::High, 5),
        ];
        let estimate = estimate_study_time(&roadmap, 20);
        assert_eq!(estimate.total_minutes, 25);
        assert_eq!(estimate.total_days, 2);
        assert_eq!(estimate.breakdown, vec![("Vocabulary", 20), ("Kanji", 5)]);
        assert_eq!(estimate_study_time(&roadmap, 0).total_days, 0);
    }

    #[test]
    fn learner_requirements_follow_counters() {
        let mut record = ProgressRecord::default();
        record.set_count(ProgressCategory::Vocabulary, 750);
        record.set_count(ProgressCategory::Reading, 30);
        let reqs = learner_requirements(&record);
        assert_eq!(reqs[0].progress, 50);
        assert_eq!(reqs[3].progress, 100);
        assert_eq!(reqs[1].progress, 0);
    }
}
