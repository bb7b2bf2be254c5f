// ============================================
// src/ui.rs
// 画面の描画
// ============================================

use ratatui::{
    prelude::*,
    style::{Color, Style, Stylize},
    text::{Line, Span},
    widgets::{Block, Borders, Gauge, Paragraph, Wrap},
};

use crate::app::{
    App, BrowserKind, BrowserView, ChartView, FlashcardView, GRID_COLUMNS, MenuItem, QuizKind, QuizView, Screen,
    script_category,
};
use crate::content::CharacterCategory;
use crate::flashcard::Rating;
use crate::progress::{ProgressCategory, XP_PER_LEVEL};
use crate::roadmap::{content_roadmap, learner_requirements, quiz_status};
use crate::session::Phase;

/// MARK:画面全体の描画
pub fn draw(f: &mut Frame, app: &App) {
    let size = f.area();
    let block = Block::default().borders(Borders::ALL).title("Nihongo Wiz !");
    let inner_area = block.inner(size);
    f.render_widget(block, size);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1), // [0] ステータスバー (Lv, XP, 連続日数)
            Constraint::Length(1), // [1] メッセージ
            Constraint::Min(1),    // [2] 本体
            Constraint::Length(1), // [3] 操作説明
        ])
        .split(inner_area);

    draw_status(f, app, chunks[0]);

    let message = app.message.clone().unwrap_or_default();
    f.render_widget(
        Paragraph::new(message).style(Style::default().fg(Color::Yellow)),
        chunks[1],
    );

    let help = match &app.screen {
        Screen::Menu { cursor } => {
            draw_menu(f, *cursor, chunks[2]);
            "↑↓: select  Enter: open  q: quit"
        }
        Screen::Chart(view) => {
            draw_chart(f, app, view, chunks[2]);
            "←↑↓→: move  Enter: learned  f: flashcards  q: quiz  s: speak  Esc: back"
        }
        Screen::Browser(view) => {
            draw_browser(f, app, view, chunks[2]);
            if view.searching {
                "type to search  Enter/Esc: done"
            } else {
                "↑↓: move  Tab: level  /: search  Enter: learned  f: cards  q: meaning quiz  r: reading quiz  s: speak  Esc: back"
            }
        }
        Screen::Flashcards(view) => {
            draw_flashcards(f, app, view, chunks[2]);
            "Space: flip  1: hard  2: good  3: easy  s: speak  Esc: back"
        }
        Screen::Quiz(view) => {
            draw_quiz(f, app, view, chunks[2]);
            if view.session.is_complete() {
                "Enter: back"
            } else {
                "1-9 / ↑↓ Enter: answer  Enter: next  s: speak  r: retry (listening)  Esc: back"
            }
        }
        Screen::ReadingList { cursor } => {
            draw_reading_list(f, app, *cursor, chunks[2]);
            "↑↓: select  Enter: read  Esc: back"
        }
        Screen::Dashboard => {
            draw_dashboard(f, app, chunks[2]);
            "Esc: back"
        }
    };
    f.render_widget(
        Paragraph::new(help).style(Style::default().fg(Color::DarkGray)),
        chunks[3],
    );
}

/// レベルと XP ゲージ
fn draw_status(f: &mut Frame, app: &App, area: Rect) {
    let record = app.progress.record();
    let into_level = record.xp_into_level();
    let ratio = (into_level as f64 / XP_PER_LEVEL as f64).min(1.0);

    let speaking = if app.speaking { "  ♪" } else { "" };
    let label = format!(
        "Lv.{} ({} / {})  Streak: {} day(s){}",
        record.level, into_level, XP_PER_LEVEL, record.streak, speaking
    );
    let gauge = Gauge::default()
        .block(Block::default().borders(Borders::NONE))
        .gauge_style(Style::default().fg(Color::Magenta).bg(Color::Black))
        .ratio(ratio)
        .label(label);
    f.render_widget(gauge, area);
}

fn cursor_style(selected: bool) -> Style {
    if selected {
        Style::default().fg(Color::Black).bg(Color::White)
    } else {
        Style::default()
    }
}

fn draw_menu(f: &mut Frame, cursor: usize, area: Rect) {
    let lines: Vec<Line> = MenuItem::ALL
        .iter()
        .enumerate()
        .map(|(i, item)| {
            Line::from(vec![
                Span::styled(format!(" {:<20}", item.title()), cursor_style(i == cursor)),
                Span::styled(format!("  {}", item.description()), Style::default().fg(Color::Gray)),
            ])
        })
        .collect();
    f.render_widget(Paragraph::new(lines), area);
}

fn draw_chart(f: &mut Frame, app: &App, view: &ChartView, area: Rect) {
    let entries = app.content.characters(view.script);
    let category = script_category(view.script);
    let mut lines = vec![Line::from(view.script.name()).bold(), Line::default()];

    for section in CharacterCategory::ALL {
        let members: Vec<usize> = entries
            .iter()
            .enumerate()
            .filter(|(_, e)| e.category == section)
            .map(|(i, _)| i)
            .collect();
        if members.is_empty() {
            continue;
        }
        lines.push(Line::from(section.title()).fg(Color::Cyan));
        for row in members.chunks(GRID_COLUMNS) {
            let spans: Vec<Span> = row
                .iter()
                .map(|&i| {
                    let entry = &entries[i];
                    let mut style = cursor_style(i == view.cursor);
                    if i != view.cursor && app.progress.is_learned(category, &entry.id) {
                        style = style.fg(Color::Green);
                    }
                    Span::styled(format!(" {} {:<5}", entry.glyph, entry.romanization), style)
                })
                .collect();
            lines.push(Line::from(spans));
        }
    }

    // カーソル行が見えるようにスクロールする
    let cursor_line = lines
        .iter()
        .position(|line| line.spans.iter().any(|s| s.style.bg == Some(Color::White)))
        .unwrap_or(0) as u16;
    let scroll = cursor_line.saturating_sub(area.height.saturating_sub(2));
    f.render_widget(Paragraph::new(lines).scroll((scroll, 0)), area);
}

fn draw_browser(f: &mut Frame, app: &App, view: &BrowserView, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(2), Constraint::Min(1)])
        .split(area);

    let level = view.level.map_or("All".to_string(), |l| l.to_string());
    let search_style = if view.searching {
        Style::default().fg(Color::Black).bg(Color::Yellow)
    } else {
        Style::default().fg(Color::Gray)
    };
    let header = vec![
        Line::from(format!("{}  [{}]", view.kind.title(), level)).bold(),
        Line::from(Span::styled(format!("Search: {}", view.search), search_style)),
    ];
    f.render_widget(Paragraph::new(header), chunks[0]);

    let indices = app.browser_indices(view);
    if indices.is_empty() {
        f.render_widget(
            Paragraph::new("No matches. Try another search term or level.")
                .style(Style::default().fg(Color::DarkGray))
                .centered(),
            chunks[1],
        );
        return;
    }

    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(45), Constraint::Percentage(55)])
        .split(chunks[1]);

    // 一覧
    let category = view.kind.category();
    let height = columns[0].height as usize;
    let first = view.cursor.saturating_sub(height.saturating_sub(1));
    let lines: Vec<Line> = indices
        .iter()
        .enumerate()
        .skip(first)
        .take(height)
        .map(|(row, &i)| {
            let (id, label) = browser_row(app, view.kind, i);
            let mark = if app.progress.is_learned(category, id) { "✓" } else { " " };
            Line::from(Span::styled(format!("{mark} {label}"), cursor_style(row == view.cursor)))
        })
        .collect();
    f.render_widget(Paragraph::new(lines), columns[0]);

    // 詳細
    if let Some(&i) = indices.get(view.cursor) {
        let detail = browser_detail(app, view.kind, i);
        f.render_widget(
            Paragraph::new(detail)
                .block(Block::default().borders(Borders::LEFT))
                .wrap(Wrap { trim: false }),
            columns[1],
        );
    }
}

fn browser_row(app: &App, kind: BrowserKind, index: usize) -> (&str, String) {
    match kind {
        BrowserKind::Vocabulary => {
            let e = &app.content.vocabulary()[index];
            (&e.id, format!("{} ({}) {}", e.word, e.reading, e.meaning))
        }
        BrowserKind::Kanji => {
            let e = &app.content.kanji()[index];
            (&e.id, format!("{}  {}", e.glyph, e.meaning))
        }
        BrowserKind::Grammar => {
            let e = &app.content.grammar()[index];
            (&e.id, format!("{}  {}", e.structure, e.meaning))
        }
    }
}

fn browser_detail(app: &App, kind: BrowserKind, index: usize) -> Vec<Line<'static>> {
    match kind {
        BrowserKind::Vocabulary => {
            let e = &app.content.vocabulary()[index];
            vec![
                Line::from(e.word.clone()).bold(),
                Line::from(e.reading.clone()).fg(Color::Gray),
                Line::from(format!("[{}] {}", e.level, e.meaning)),
                Line::default(),
                Line::from(e.example_sentence.clone()),
            ]
        }
        BrowserKind::Kanji => {
            let e = &app.content.kanji()[index];
            let mut lines = vec![
                Line::from(e.glyph.clone()).bold(),
                Line::from(format!("[{}] {}", e.level, e.meaning)),
                Line::from(format!("On: {}", e.onyomi)),
                Line::from(format!("Kun: {}", e.kunyomi)),
                Line::default(),
            ];
            lines.extend(e.example_words.iter().map(|w| Line::from(format!("・{w}"))));
            lines
        }
        BrowserKind::Grammar => {
            let e = &app.content.grammar()[index];
            let mut lines = vec![
                Line::from(e.structure.clone()).bold(),
                Line::from(format!("[{}] {}", e.level, e.meaning)),
                Line::default(),
                Line::from(e.explanation.clone()),
                Line::default(),
            ];
            for example in &e.examples {
                lines.push(Line::from(example.japanese.clone()));
                lines.push(Line::from(format!("  {}", example.english)).fg(Color::Gray));
            }
            lines
        }
    }
}

fn draw_flashcards(f: &mut Frame, app: &App, view: &FlashcardView, area: Rect) {
    let Some(card) = view.deck.current() else {
        return;
    };
    let mut lines = vec![
        Line::from(format!(
            "{}  {} / {}  points: {}",
            view.title,
            view.deck.position() + 1,
            view.deck.len(),
            view.deck.points()
        ))
        .fg(Color::Gray),
        Line::default(),
        Line::default(),
        Line::from(card.front.clone()).bold().centered(),
    ];
    if !card.hint.is_empty() {
        lines.push(Line::from(card.hint.clone()).fg(Color::Gray).centered());
    }
    lines.push(Line::default());
    if view.deck.is_flipped() {
        lines.push(Line::from(card.back.clone()).fg(Color::Green).centered());
        if !card.detail.is_empty() {
            lines.push(Line::from(card.detail.clone()).centered());
        }
        lines.push(Line::default());
        let ratings: Vec<String> = Rating::ALL
            .iter()
            .enumerate()
            .map(|(i, r)| format!("{}: {}", i + 1, r.label()))
            .collect();
        lines.push(Line::from(format!("How well did you know it?  {}", ratings.join("  "))).centered());
    } else {
        lines.push(Line::from("(Space to flip)").fg(Color::DarkGray).centered());
    }
    if let Some(level) = card.level {
        lines.push(Line::default());
        lines.push(Line::from(format!("[{level}]")).fg(Color::DarkGray).centered());
    }
    if app.speech_supported() && card.audio.is_some() {
        lines.push(Line::from("s: listen").fg(Color::DarkGray).centered());
    }
    f.render_widget(Paragraph::new(lines).wrap(Wrap { trim: false }), area);
}

fn draw_quiz(f: &mut Frame, app: &App, view: &QuizView, area: Rect) {
    let session = &view.session;

    if let Some(summary) = session.summary() {
        let lines = vec![
            Line::from(view.title.clone()).bold(),
            Line::default(),
            Line::from(format!(
                "Score: {} / {} ({}%)",
                summary.score,
                summary.total,
                summary.percent()
            ))
            .fg(Color::Yellow),
        ];
        f.render_widget(Paragraph::new(lines), area);
        return;
    }

    let Some(question) = session.current() else {
        return;
    };
    let mut lines = vec![
        Line::from(format!(
            "{}  Question {} / {}  Score: {} / {}",
            view.title,
            session.position() + 1,
            session.len(),
            session.score(),
            session.answered()
        ))
        .fg(Color::Gray),
    ];

    // レベルと種類のバッジ
    let badges: Vec<Span> = question
        .level
        .map(|level| level.to_string())
        .into_iter()
        .chain(question.tags.iter().map(|tag| tag.to_string()))
        .map(|badge| Span::styled(format!("[{badge}] "), Style::default().fg(Color::Cyan)))
        .collect();
    lines.push(Line::from(badges));
    lines.push(Line::default());

    // 読解は本文を、聞き取りは読み上げ操作を先に出す
    if let QuizKind::Reading(index) = view.kind {
        if let Some(passage) = app.reading_passages().get(index) {
            lines.push(Line::from(passage.content.clone()));
            lines.push(Line::default());
        }
    }
    if question.audio_text.is_some() && app.speech_supported() {
        let label = if app.speaking { "♪ playing..." } else { "s: play audio" };
        lines.push(Line::from(label).fg(Color::Cyan));
    }

    lines.push(Line::from(format!("[{}] {}", question.kind.label(), question.prompt)).bold());
    lines.push(Line::default());

    let phase = session.phase();
    for (i, option) in question.options.iter().enumerate() {
        let style = match phase {
            Phase::Answered { .. } if i == question.correct_index => Style::default().fg(Color::Green).bold(),
            Phase::Answered { selected, correct: false } if i == selected => Style::default().fg(Color::Red),
            Phase::Unanswered if i == view.cursor => cursor_style(true),
            _ => Style::default(),
        };
        lines.push(Line::from(Span::styled(format!(" {}. {}", i + 1, option), style)));
    }

    if let Phase::Answered { correct, .. } = phase {
        lines.push(Line::default());
        if correct {
            lines.push(Line::from("Correct!").fg(Color::Green));
        } else {
            lines.push(Line::from(format!("Incorrect. Answer: {}", question.correct_answer())).fg(Color::Red));
        }
        if let Some(explanation) = &question.explanation {
            lines.push(Line::from(explanation.clone()).fg(Color::Gray));
        }
        let next = if session.is_last() { "Enter: see results" } else { "Enter: next question" };
        lines.push(Line::from(next).fg(Color::DarkGray));
    }

    f.render_widget(Paragraph::new(lines).wrap(Wrap { trim: false }), area);
}

fn draw_reading_list(f: &mut Frame, app: &App, cursor: usize, area: Rect) {
    let passages = app.reading_passages();
    let mut lines = vec![Line::from("Reading").bold(), Line::default()];
    if passages.is_empty() {
        lines.push(Line::from("No passages at this level.").fg(Color::DarkGray));
    }
    for (i, passage) in passages.iter().enumerate() {
        let done = app.progress.is_learned(ProgressCategory::Reading, &passage.id);
        let mark = if done { "✓" } else { " " };
        lines.push(Line::from(Span::styled(
            format!("{mark} [{}] {} ({} questions)", passage.level, passage.title, passage.questions.len()),
            cursor_style(i == cursor),
        )));
    }
    f.render_widget(Paragraph::new(lines), area);
}

fn draw_dashboard(f: &mut Frame, app: &App, area: Rect) {
    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(area);

    // 学習者の進行状況
    let record = app.progress.record();
    let mut left = vec![
        Line::from("Your progress").bold(),
        Line::default(),
        Line::from(format!("Level {}  ({} XP, {} to next)", record.level, record.xp, record.xp_to_next_level())),
        Line::from(format!("Streak: {} day(s)", record.streak)),
        Line::default(),
    ];
    for category in ProgressCategory::ALL {
        left.push(Line::from(format!("{:<12}{}", category.name(), record.count(category))));
    }
    left.push(Line::default());
    left.push(Line::from("N4 requirements").bold());
    for req in learner_requirements(record) {
        left.push(Line::from(format!("{:<12}{:>3}%  {}", req.area, req.progress, req.target)));
    }
    f.render_widget(Paragraph::new(left), columns[0]);

    // 同梱データと N4 目標の差
    let mut right = vec![Line::from("Content roadmap").bold(), Line::default()];
    for item in content_roadmap(&app.content) {
        right.push(Line::from(format!(
            "{:<11}{:>4} / {:<5}{:>3}%  [{}]",
            item.area,
            item.current,
            item.target,
            item.progress,
            item.priority.label()
        )));
    }
    let quizzes = quiz_status(&app.content);
    right.push(Line::default());
    right.push(Line::from(format!(
        "{:<11}{:>4} / {:<5}{:>3}%  [{}]",
        "Quizzes",
        quizzes.current,
        quizzes.target,
        quizzes.progress,
        quizzes.priority.label()
    )));
    f.render_widget(
        Paragraph::new(right).block(Block::default().borders(Borders::LEFT)),
        columns[1],
    );
}
