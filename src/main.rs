// ============================================
// src/main.rs (メインファイル)
// ============================================

use std::fs::{self, OpenOptions};
use std::io::stdout;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use console::style;
use dialoguer::Confirm;
use rand::SeedableRng;
use rand::rngs::StdRng;

use crossterm::{
    ExecutableCommand,
    cursor::{Hide, Show},
    event::{self, Event, KeyEventKind},
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::prelude::*;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use nihongowiz::app::App;
use nihongowiz::config::Config;
use nihongowiz::content::ContentStore;
use nihongowiz::progress::{FileStorage, MemoryStorage, ProgressCategory, ProgressStorage, ProgressStore};
use nihongowiz::roadmap::{content_roadmap, estimate_study_time, learner_requirements, quiz_status};
use nihongowiz::{speech, ui};

// --------------------------------------------------
// コマンドライン引数
// --------------------------------------------------

#[derive(Debug, Parser)]
#[command(name = "nihongowiz", version, about = "Learn Japanese (N5/N4) in the terminal")]
struct Cli {
    /// 設定ファイル (省略時は設定ディレクトリの config.toml)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// 進行状況を保存しない
    #[arg(long)]
    guest: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Show level, XP, streak and N4 progress
    Stats,
    /// Show the content roadmap to N4 and a study time estimate
    Roadmap {
        #[arg(long, default_value_t = 60)]
        daily_minutes: u32,
    },
    /// Reset progress to a fresh start
    Reset {
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
    /// Write the default config file if none exists
    Config,
}

// --------------------------------------------------
// メイン関数
// --------------------------------------------------

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;
    init_logging(&config);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "starting");

    let storage: Box<dyn ProgressStorage> = if cli.guest {
        Box::new(MemoryStorage::new())
    } else {
        Box::new(FileStorage::new(config.progress_path()))
    };
    let mut progress = ProgressStore::open(storage);

    match cli.command {
        None => run_tui(config, progress),
        Some(Command::Stats) => {
            print_stats(&progress);
            Ok(())
        }
        Some(Command::Roadmap { daily_minutes }) => {
            let content = ContentStore::bundled()?;
            print_roadmap(&content, daily_minutes);
            Ok(())
        }
        Some(Command::Reset { yes }) => {
            let confirmed = yes
                || Confirm::new()
                    .with_prompt("Reset all progress?")
                    .default(false)
                    .interact()?;
            if confirmed {
                progress.reset()?;
                println!("{}", style("Progress reset.").green());
            }
            Ok(())
        }
        Some(Command::Config) => write_default_config(cli.config.as_deref()),
    }
}

/// ログはファイルに出す (端末は TUI が使うため)
fn init_logging(config: &Config) {
    let path = config.log_path();
    if let Some(parent) = path.parent() {
        let _ = fs::create_dir_all(parent);
    }
    let file = match OpenOptions::new().create(true).append(true).open(&path) {
        Ok(file) => file,
        Err(err) => {
            eprintln!("failed to open log file {}: {err}", path.display());
            return;
        }
    };

    let level = config.logging.level.clone();
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| level.into()))
        .with(fmt::layer().with_writer(Mutex::new(file)).with_ansi(false))
        .init();
}

fn write_default_config(path: Option<&Path>) -> Result<()> {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => Config::default_path()?,
    };
    if path.exists() {
        println!("Config already exists: {}", path.display());
        return Ok(());
    }
    Config::default().save(&path)?;
    println!("{} {}", style("Wrote").green(), path.display());
    Ok(())
}

// --------------------------------------------------
// CLI 出力
// --------------------------------------------------

fn print_stats(progress: &ProgressStore) {
    let record = progress.record();
    println!("{}", style("NIHONGO WIZ").bold().magenta());
    println!(
        "Level {}  ({} XP, {} to next level)",
        style(record.level).bold(),
        record.xp,
        record.xp_to_next_level()
    );
    println!("Streak: {} day(s)", record.streak);
    println!();
    for category in ProgressCategory::ALL {
        println!("  {:<12}{}", category.name(), record.count(category));
    }
    println!();
    println!("{}", style("N4 requirements").bold());
    for req in learner_requirements(record) {
        println!("  {:<12}{:>3}%  {}", req.area, req.progress, style(req.target).dim());
    }
}

fn print_roadmap(content: &ContentStore, daily_minutes: u32) {
    let roadmap = content_roadmap(content);
    println!("{}", style("Content roadmap to N4").bold());
    for item in &roadmap {
        println!(
            "  {:<11}{:>4} / {:<5}{:>3}%  {} remaining  [{}]",
            item.area,
            item.current,
            item.target,
            item.progress,
            item.remaining,
            item.priority.label()
        );
    }
    let quizzes = quiz_status(content);
    println!(
        "  {:<11}{:>4} / {:<5}{:>3}%  [{}]",
        "Quizzes",
        quizzes.current,
        quizzes.target,
        quizzes.progress,
        quizzes.priority.label()
    );

    let estimate = estimate_study_time(&roadmap, daily_minutes);
    println!();
    println!(
        "At {} min/day: {} hours over {} days",
        daily_minutes,
        estimate.total_minutes / 60,
        style(estimate.total_days).bold()
    );
    for (area, minutes) in estimate.breakdown {
        println!("  {:<11}{:>5} h", area, minutes / 60);
    }
}

// --------------------------------------------------
// TUI のセットアップと実行ループ
// --------------------------------------------------

fn run_tui(config: Config, progress: ProgressStore) -> Result<()> {
    let content = ContentStore::bundled().context("Failed to load bundled content")?;
    let speaker = speech::detect(config.speech.enabled, config.speech.command.as_deref());
    let mut app = App::new(content, progress, speaker, config, StdRng::from_os_rng());

    let mut terminal = setup_terminal()?;
    let result = run_app(&mut terminal, &mut app);
    restore_terminal(&mut terminal)?;

    if let Err(err) = app.progress.save() {
        tracing::error!(error = %err, "failed to save progress on exit");
    }
    result
}

fn setup_terminal() -> Result<Terminal<impl Backend>> {
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?; // 代替スクリーンを使用
    stdout().execute(Hide)?; // カーソルを非表示
    let backend = CrosstermBackend::new(stdout());
    Ok(Terminal::new(backend)?)
}

fn restore_terminal(_terminal: &mut Terminal<impl Backend>) -> Result<()> {
    stdout().execute(Show)?;
    stdout().execute(LeaveAlternateScreen)?;
    disable_raw_mode()?;
    Ok(())
}

fn run_app(terminal: &mut Terminal<impl Backend>, app: &mut App) -> Result<()> {
    while !app.should_quit {
        app.tick();
        terminal.draw(|f| ui::draw(f, app))?;

        if event::poll(Duration::from_millis(50))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    app.handle_key(key.code);
                }
            }
        }
    }
    tracing::info!("quit");
    Ok(())
}
