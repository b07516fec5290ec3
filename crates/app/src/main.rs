use std::collections::HashMap;

use deck_core::model::{ChapterKey, ChapterStats};
use serde::Serialize;
use services::{AppServices, Clock};

mod args;

use args::{Args, ArgsError, Command};

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  chapters list       --deck <id>");
    eprintln!("  chapters create     --deck <id> [--ordinal <n>]");
    eprintln!("  chapters delete     --deck <id> --chapter <id>");
    eprintln!("  chapters reorder    --deck <id>");
    eprintln!("  chapters distribute --deck <id> [--chapters <id,id,...>]");
    eprintln!("  chapters progress   --deck <id> [--json]");
    eprintln!("  chapters move       --deck <id> --cards <id,id,...> --to <chapter_id|unassigned>");
    eprintln!("  chapters seed       --deck-owner <uuid> [--cards <n>] [--chapters <n>]");
    eprintln!();
    eprintln!("Common flags:");
    eprintln!("  --db <sqlite_url>   default sqlite://chapters.sqlite3");
    eprintln!("  --user <uuid>       acting user, required for changes and progress");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  CHAPTERS_DB_URL, CHAPTERS_USER_ID, RUST_LOG");
}

#[derive(Serialize)]
struct ProgressRow {
    chapter: ChapterKey,
    ordinal: Option<u32>,
    #[serde(flatten)]
    stats: ChapterStats,
    progress: f64,
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut argv = std::env::args().skip(1);

    let cmd = match argv.next() {
        None => {
            print_usage();
            return Ok(());
        }
        Some(first) if first == "--help" || first == "-h" => {
            print_usage();
            return Ok(());
        }
        Some(first) => Command::from_arg(&first).ok_or_else(|| {
            eprintln!("unknown subcommand: {first}");
            print_usage();
            ArgsError::UnknownArg(first.clone())
        })?,
    };

    let parsed = Args::parse(cmd, &mut argv).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    prepare_sqlite_file(&parsed.db_url)?;
    let app = AppServices::new_sqlite(&parsed.db_url, Clock::system()).await?;

    match cmd {
        Command::List => list(&app, &parsed).await,
        Command::Create => {
            let deck_id = parsed.deck()?;
            let permit = app.decks().permit(deck_id, parsed.user()?).await?;
            let chapter = match parsed.ordinal {
                Some(ordinal) => {
                    app.chapters()
                        .create_chapter(&permit, deck_id, ordinal)
                        .await?
                }
                None => app.chapters().create_next_chapter(&permit, deck_id).await?,
            };
            println!("created chapter {} (ordinal {})", chapter.id(), chapter.ordinal());
            Ok(())
        }
        Command::Delete => {
            let deck_id = parsed.deck()?;
            let chapter_id = parsed
                .chapter
                .ok_or(ArgsError::MissingFlag { flag: "--chapter" })?;
            let permit = app.decks().permit(deck_id, parsed.user()?).await?;
            let unassigned = app.chapters().delete_chapter(&permit, chapter_id).await?;
            println!("deleted chapter {chapter_id}; {unassigned} card(s) now unassigned");
            Ok(())
        }
        Command::Reorder => {
            let deck_id = parsed.deck()?;
            let permit = app.decks().permit(deck_id, parsed.user()?).await?;
            let chapters = app.chapters().reorder_ordinals(&permit, deck_id).await?;
            println!("{} chapter(s) renumbered 1..{}", chapters.len(), chapters.len());
            Ok(())
        }
        Command::Distribute => {
            let deck_id = parsed.deck()?;
            let permit = app.decks().permit(deck_id, parsed.user()?).await?;
            let targets = if parsed.chapters.is_empty() {
                app.chapters()
                    .list_chapters(deck_id)
                    .await?
                    .iter()
                    .map(|c| c.id())
                    .collect()
            } else {
                parsed.chapters.clone()
            };
            let assigned = app
                .distribution()
                .distribute_unassigned_evenly(&permit, deck_id, &targets)
                .await?;
            println!("assigned {assigned} card(s) across {} chapter(s)", targets.len());
            Ok(())
        }
        Command::Progress => progress(&app, &parsed).await,
        Command::Move => {
            let deck_id = parsed.deck()?;
            let target = parsed.to.ok_or(ArgsError::MissingFlag { flag: "--to" })?;
            let permit = app.decks().permit(deck_id, parsed.user()?).await?;
            let moved = app
                .chapters()
                .move_cards(&permit, deck_id, &parsed.cards, target)
                .await?;
            println!("moved {moved} card(s)");
            Ok(())
        }
        Command::Seed => seed(&app, &parsed).await,
    }
}

async fn list(app: &AppServices, parsed: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let deck_id = parsed.deck()?;
    let chapters = app.chapters().list_chapters(deck_id).await?;
    if chapters.is_empty() {
        println!("deck {deck_id} has no chapters");
    }
    for chapter in &chapters {
        println!(
            "{:>3}  chapter {}  created {}",
            chapter.ordinal(),
            chapter.id(),
            chapter.created_at().format("%Y-%m-%d %H:%M")
        );
    }
    Ok(())
}

async fn progress(app: &AppServices, parsed: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let deck_id = parsed.deck()?;
    let user = parsed.user()?;
    let chapters = app.chapters().list_chapters(deck_id).await?;

    let mut keys: Vec<ChapterKey> = chapters.iter().map(|c| ChapterKey::Chapter(c.id())).collect();
    keys.push(ChapterKey::Unassigned);
    let ordinals: HashMap<ChapterKey, u32> = chapters
        .iter()
        .map(|c| (ChapterKey::Chapter(c.id()), c.ordinal()))
        .collect();

    let map = app.progress().chapters_progress(&keys, deck_id, user).await;
    let rows: Vec<ProgressRow> = keys
        .iter()
        .filter_map(|key| {
            map.get(key).map(|stats| ProgressRow {
                chapter: *key,
                ordinal: ordinals.get(key).copied(),
                stats: *stats,
                progress: stats.progress(),
            })
        })
        .collect();

    if parsed.json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    for row in &rows {
        let label = row
            .ordinal
            .map_or_else(|| "unassigned".to_owned(), |o| format!("#{o}"));
        println!(
            "{label:>10}  total={:<4} learned={:<4} learning={:<4} new={:<4} {:>5.1}%",
            row.stats.total,
            row.stats.learned,
            row.stats.learning,
            row.stats.new,
            row.progress * 100.0
        );
    }
    let deck = app.progress().deck_progress(deck_id, user).await;
    println!(
        "{:>10}  total={:<4} learned={:<4} learning={:<4} new={:<4} {:>5.1}%",
        "deck",
        deck.total,
        deck.learned,
        deck.learning,
        deck.new,
        deck.progress() * 100.0
    );
    Ok(())
}

async fn seed(app: &AppServices, parsed: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let owner = parsed
        .deck_owner
        .or(parsed.user)
        .ok_or(ArgsError::MissingFlag {
            flag: "--deck-owner",
        })?;

    let deck_id = app.decks().create_deck(owner, "Seeded deck").await?;
    let permit = app.decks().permit(deck_id, owner).await?;
    for _ in 0..parsed.chapter_count {
        app.chapters().create_next_chapter(&permit, deck_id).await?;
    }
    for i in 1..=parsed.card_count {
        app.cards()
            .create_card(deck_id, None, format!("Question {i}"), format!("Answer {i}"))
            .await?;
    }

    log::info!(
        "seed complete deck_id={deck_id} chapters={} cards={}",
        parsed.chapter_count,
        parsed.card_count
    );
    println!(
        "seeded deck {deck_id} with {} chapter(s) and {} unassigned card(s)",
        parsed.chapter_count, parsed.card_count
    );
    Ok(())
}

fn prepare_sqlite_file(db_url: &str) -> Result<(), Box<dyn std::error::Error>> {
    if db_url == "sqlite::memory:" {
        return Ok(());
    }

    let path = db_url
        .strip_prefix("sqlite://")
        .ok_or_else(|| ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        })?;
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() {
        return Err(ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        }
        .into());
    }

    let path = std::path::Path::new(path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    if !path.exists() {
        std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)?;
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    env_logger::init();

    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}
