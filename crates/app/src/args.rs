use std::fmt;
use std::str::FromStr;

use deck_core::model::{CardId, ChapterId, DeckId, UserId};

#[derive(Debug, PartialEq, Eq)]
pub enum ArgsError {
    MissingValue { flag: &'static str },
    MissingFlag { flag: &'static str },
    UnknownArg(String),
    InvalidValue { flag: &'static str, raw: String },
    InvalidDbUrl { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::MissingFlag { flag } => write!(f, "{flag} is required"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidValue { flag, raw } => write!(f, "invalid {flag} value: {raw}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
        }
    }
}

impl std::error::Error for ArgsError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    List,
    Create,
    Delete,
    Reorder,
    Distribute,
    Progress,
    Move,
    Seed,
}

impl Command {
    pub fn from_arg(arg: &str) -> Option<Self> {
        match arg {
            "list" => Some(Self::List),
            "create" => Some(Self::Create),
            "delete" => Some(Self::Delete),
            "reorder" => Some(Self::Reorder),
            "distribute" => Some(Self::Distribute),
            "progress" => Some(Self::Progress),
            "move" => Some(Self::Move),
            "seed" => Some(Self::Seed),
            _ => None,
        }
    }
}

/// Flags shared by every subcommand plus the per-command ones. Which of them
/// are required is decided by the command handlers.
#[derive(Debug, Default)]
pub struct Args {
    pub db_url: String,
    pub user: Option<UserId>,
    pub deck: Option<DeckId>,
    pub chapter: Option<ChapterId>,
    pub ordinal: Option<u32>,
    pub chapters: Vec<ChapterId>,
    pub cards: Vec<CardId>,
    /// `None` after `--to unassigned`.
    pub to: Option<Option<ChapterId>>,
    pub json: bool,
    pub deck_owner: Option<UserId>,
    pub card_count: u32,
    pub chapter_count: u32,
}

impl Args {
    /// Reads defaults from `CHAPTERS_DB_URL` and `CHAPTERS_USER_ID`, then
    /// applies flags on top.
    pub fn parse(
        cmd: Command,
        args: &mut impl Iterator<Item = String>,
    ) -> Result<Self, ArgsError> {
        let db_url = std::env::var("CHAPTERS_DB_URL")
            .ok()
            .map_or_else(|| "sqlite://chapters.sqlite3".into(), normalize_sqlite_url);
        let user = std::env::var("CHAPTERS_USER_ID")
            .ok()
            .and_then(|value| value.parse::<UserId>().ok());

        Self::parse_with(cmd, args, db_url, user)
    }

    fn parse_with(
        cmd: Command,
        args: &mut impl Iterator<Item = String>,
        db_url: String,
        user: Option<UserId>,
    ) -> Result<Self, ArgsError> {
        let mut parsed = Self {
            db_url,
            user,
            card_count: 20,
            chapter_count: 3,
            ..Self::default()
        };

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    parsed.db_url = normalize_sqlite_url(value);
                }
                "--user" => parsed.user = Some(parse_value(args, "--user")?),
                "--deck" => parsed.deck = Some(parse_value(args, "--deck")?),
                "--chapter" => parsed.chapter = Some(parse_value(args, "--chapter")?),
                "--ordinal" => parsed.ordinal = Some(parse_value(args, "--ordinal")?),
                "--chapters" if cmd == Command::Seed => {
                    parsed.chapter_count = parse_value(args, "--chapters")?;
                }
                "--chapters" => parsed.chapters = parse_list(args, "--chapters")?,
                "--cards" if cmd == Command::Seed => {
                    parsed.card_count = parse_value(args, "--cards")?;
                }
                "--cards" => parsed.cards = parse_list(args, "--cards")?,
                "--to" => {
                    let value = require_value(args, "--to")?;
                    parsed.to = Some(if value == "unassigned" {
                        None
                    } else {
                        Some(value.parse().map_err(|_| ArgsError::InvalidValue {
                            flag: "--to",
                            raw: value.clone(),
                        })?)
                    });
                }
                "--deck-owner" => parsed.deck_owner = Some(parse_value(args, "--deck-owner")?),
                "--json" => parsed.json = true,
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        Ok(parsed)
    }

    pub fn deck(&self) -> Result<DeckId, ArgsError> {
        self.deck.ok_or(ArgsError::MissingFlag { flag: "--deck" })
    }

    pub fn user(&self) -> Result<UserId, ArgsError> {
        self.user.ok_or(ArgsError::MissingFlag { flag: "--user" })
    }
}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

fn parse_value<T: FromStr>(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<T, ArgsError> {
    let value = require_value(args, flag)?;
    value
        .parse()
        .map_err(|_| ArgsError::InvalidValue { flag, raw: value })
}

fn parse_list<T: FromStr>(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<Vec<T>, ArgsError> {
    let value = require_value(args, flag)?;
    value
        .split(',')
        .filter(|part| !part.trim().is_empty())
        .map(|part| {
            part.trim().parse().map_err(|_| ArgsError::InvalidValue {
                flag,
                raw: value.clone(),
            })
        })
        .collect()
}

pub fn normalize_sqlite_url(raw: String) -> String {
    if raw == "sqlite::memory:" || raw.starts_with("sqlite://") {
        return raw;
    }

    let trimmed = raw.trim().to_string();
    let path_str = trimmed
        .strip_prefix("sqlite:")
        .unwrap_or(trimmed.as_str())
        .to_string();
    let path = std::path::Path::new(&path_str);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| std::path::PathBuf::from("."))
            .join(path)
    };
    format!("sqlite://{}", absolute.display())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(cmd: Command, argv: &[&str]) -> Result<Args, ArgsError> {
        let mut iter = argv.iter().map(|s| (*s).to_string());
        Args::parse_with(cmd, &mut iter, "sqlite::memory:".into(), None)
    }

    #[test]
    fn move_accepts_card_list_and_unassigned_target() {
        let args = parse(Command::Move, &["--deck", "3", "--cards", "1, 2,5", "--to", "unassigned"])
            .unwrap();
        assert_eq!(args.deck().unwrap(), DeckId::new(3));
        assert_eq!(args.cards, vec![CardId::new(1), CardId::new(2), CardId::new(5)]);
        assert_eq!(args.to, Some(None));
    }

    #[test]
    fn seed_reads_counts_instead_of_ids() {
        let owner = UserId::random();
        let raw_owner = owner.to_string();
        let args = parse(
            Command::Seed,
            &["--deck-owner", raw_owner.as_str(), "--cards", "12", "--chapters", "4"],
        )
        .unwrap();
        assert_eq!(args.deck_owner, Some(owner));
        assert_eq!(args.card_count, 12);
        assert_eq!(args.chapter_count, 4);
    }

    #[test]
    fn bad_values_are_reported_with_their_flag() {
        let err = parse(Command::List, &["--deck", "abc"]).unwrap_err();
        assert_eq!(
            err,
            ArgsError::InvalidValue {
                flag: "--deck",
                raw: "abc".into()
            }
        );
        assert_eq!(
            parse(Command::List, &["--deck"]).unwrap_err(),
            ArgsError::MissingValue { flag: "--deck" }
        );
        assert_eq!(
            parse(Command::List, &[]).unwrap().deck().unwrap_err(),
            ArgsError::MissingFlag { flag: "--deck" }
        );
    }

    #[test]
    fn relative_db_path_becomes_absolute_url() {
        let url = normalize_sqlite_url("sqlite:data/chapters.sqlite3".into());
        assert!(url.starts_with("sqlite:///"));
        assert!(url.ends_with("data/chapters.sqlite3"));
        assert_eq!(normalize_sqlite_url("sqlite::memory:".into()), "sqlite::memory:");
    }
}
