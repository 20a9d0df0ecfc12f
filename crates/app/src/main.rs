use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use services::{AppServices, Clock};
use study_core::model::{
    CardId, FlashcardDraft, FlashcardSetDraft, LearnerId, ProgressStatus, SetId,
};
use tracing::{debug, info};

mod config;

use config::Config;

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    MissingFlag { flag: &'static str },
    UnknownArg(String),
    UnknownCommand(String),
    InvalidId { flag: &'static str, raw: String },
    InvalidStatus { raw: String },
    InvalidDbUrl { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::MissingFlag { flag } => write!(f, "{flag} is required"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::UnknownCommand(cmd) => write!(f, "unknown command: {cmd}"),
            ArgsError::InvalidId { flag, raw } => write!(f, "invalid {flag} value: {raw}"),
            ArgsError::InvalidStatus { raw } => {
                write!(f, "invalid --status value: {raw} (expected new, learning or mastered)")
            }
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
        }
    }
}

impl std::error::Error for ArgsError {}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: String,
) -> Result<String, ArgsError> {
    args.next().ok_or_else(|| ArgsError::MissingValue {
        flag: known_flag(&flag),
    })
}

const FLAGS: [&str; 10] = [
    "--db",
    "--owner",
    "--title",
    "--description",
    "--set",
    "--learner",
    "--term",
    "--definition",
    "--card",
    "--status",
];

fn known_flag(flag: &str) -> &'static str {
    FLAGS.iter().copied().find(|f| *f == flag).unwrap_or("flag")
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  app [--db <sqlite_url>] set create --owner <id> --title <text> [--description <text>]");
    eprintln!("  app [--db <sqlite_url>] set list --owner <id>");
    eprintln!("  app [--db <sqlite_url>] set show --set <id> --learner <id>");
    eprintln!("  app [--db <sqlite_url>] card add --set <id> --term <text> --definition <text>");
    eprintln!("  app [--db <sqlite_url>] card list --set <id>");
    eprintln!("  app [--db <sqlite_url>] progress get --learner <id> --card <id>");
    eprintln!(
        "  app [--db <sqlite_url>] progress update --learner <id> --card <id> --status <new|learning|mastered>"
    );
    eprintln!("  app [--db <sqlite_url>] streak --learner <id>");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  STUDY_DB_URL (default {})", config::DEFAULT_DB_URL);
    eprintln!("  STUDY_MAX_WRITE_ATTEMPTS, STUDY_LOG (falls back to RUST_LOG)");
}

//
// ─── ARGUMENTS ─────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    SetCreate {
        owner: LearnerId,
        title: String,
        description: Option<String>,
    },
    SetList {
        owner: LearnerId,
    },
    SetShow {
        set: SetId,
        learner: LearnerId,
    },
    CardAdd {
        set: SetId,
        term: String,
        definition: String,
    },
    CardList {
        set: SetId,
    },
    ProgressGet {
        learner: LearnerId,
        card: CardId,
    },
    ProgressUpdate {
        learner: LearnerId,
        card: CardId,
        status: ProgressStatus,
    },
    Streak {
        learner: LearnerId,
    },
}

/// Flag values collected in order; commands take what they need and the rest is rejected.
#[derive(Debug, Default)]
struct Flags {
    values: Vec<(String, String)>,
}

impl Flags {
    fn take(&mut self, flag: &'static str) -> Option<String> {
        let idx = self.values.iter().rposition(|(name, _)| name == flag)?;
        let (_, value) = self.values.remove(idx);
        self.values.retain(|(name, _)| name != flag);
        Some(value)
    }

    fn require(&mut self, flag: &'static str) -> Result<String, ArgsError> {
        self.take(flag).ok_or(ArgsError::MissingFlag { flag })
    }

    fn id<T: FromStr>(&mut self, flag: &'static str) -> Result<T, ArgsError> {
        let raw = self.require(flag)?;
        raw.parse().map_err(|_| ArgsError::InvalidId { flag, raw })
    }

    fn finish(self) -> Result<(), ArgsError> {
        match self.values.into_iter().next() {
            Some((flag, _)) => Err(ArgsError::UnknownArg(flag)),
            None => Ok(()),
        }
    }
}

#[derive(Debug)]
struct Args {
    db_url: Option<String>,
    command: Command,
}

impl Args {
    /// Returns `Ok(None)` when help was requested.
    fn parse(args: impl IntoIterator<Item = String>) -> Result<Option<Self>, ArgsError> {
        let mut args = args.into_iter();
        let mut words = Vec::new();
        let mut flags = Flags::default();

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--help" | "-h" => return Ok(None),
                flag if flag.starts_with("--") => {
                    let value = require_value(&mut args, arg.clone())?;
                    flags.values.push((arg, value));
                }
                _ => words.push(arg),
            }
        }

        if words.is_empty() {
            return Ok(None);
        }

        let db_url = match flags.take("--db") {
            Some(raw) if raw.trim().is_empty() => return Err(ArgsError::InvalidDbUrl { raw }),
            other => other,
        };

        let path: Vec<&str> = words.iter().map(String::as_str).collect();
        let command = match path.as_slice() {
            ["set", "create"] => Command::SetCreate {
                owner: flags.id("--owner")?,
                title: flags.require("--title")?,
                description: flags.take("--description"),
            },
            ["set", "list"] => Command::SetList {
                owner: flags.id("--owner")?,
            },
            ["set", "show"] => Command::SetShow {
                set: flags.id("--set")?,
                learner: flags.id("--learner")?,
            },
            ["card", "add"] => Command::CardAdd {
                set: flags.id("--set")?,
                term: flags.require("--term")?,
                definition: flags.require("--definition")?,
            },
            ["card", "list"] => Command::CardList {
                set: flags.id("--set")?,
            },
            ["progress", "get"] => Command::ProgressGet {
                learner: flags.id("--learner")?,
                card: flags.id("--card")?,
            },
            ["progress", "update"] => {
                let learner = flags.id("--learner")?;
                let card = flags.id("--card")?;
                let raw = flags.require("--status")?;
                let status = raw
                    .parse()
                    .map_err(|_| ArgsError::InvalidStatus { raw: raw.clone() })?;
                Command::ProgressUpdate {
                    learner,
                    card,
                    status,
                }
            }
            ["streak"] => Command::Streak {
                learner: flags.id("--learner")?,
            },
            _ => return Err(ArgsError::UnknownCommand(words.join(" "))),
        };

        flags.finish()?;
        Ok(Some(Self { db_url, command }))
    }
}

fn normalize_sqlite_url(raw: String) -> String {
    if raw == "sqlite::memory:" || raw.starts_with("sqlite://") || raw.contains("mode=memory") {
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

fn prepare_sqlite_file(db_url: &str) -> Result<(), Box<dyn std::error::Error>> {
    if db_url == "sqlite::memory:" || db_url.contains("mode=memory") {
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

//
// ─── COMMANDS ──────────────────────────────────────────────────────────────────
//

fn print_json<T: Serialize>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn execute(
    services: &AppServices,
    command: Command,
) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Command::SetCreate {
            owner,
            title,
            description,
        } => {
            let mut draft = FlashcardSetDraft::new(owner, title);
            if let Some(description) = description {
                draft = draft.with_description(description);
            }
            print_json(&services.flashcards().create_set(draft).await?)
        }
        Command::SetList { owner } => print_json(&services.flashcards().list_sets(owner).await?),
        Command::SetShow { set, learner } => {
            print_json(&services.overview().overview(learner, set).await?)
        }
        Command::CardAdd {
            set,
            term,
            definition,
        } => {
            let draft = FlashcardDraft::new(set, term, definition);
            print_json(&services.flashcards().add_card(draft).await?)
        }
        Command::CardList { set } => print_json(&services.flashcards().list_cards(set).await?),
        Command::ProgressGet { learner, card } => {
            print_json(&services.progress().get_progress(learner, card).await?)
        }
        Command::ProgressUpdate {
            learner,
            card,
            status,
        } => print_json(
            &services
                .progress()
                .update_progress(learner, card, status)
                .await?,
        ),
        Command::Streak { learner } => {
            let streak = services.activity().current_streak(learner).await?;
            print_json(&serde_json::json!({
                "learner_id": learner,
                "streak_days": streak,
            }))
        }
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let parsed = match Args::parse(std::env::args().skip(1)) {
        Ok(Some(parsed)) => parsed,
        Ok(None) => {
            print_usage();
            return Ok(());
        }
        Err(e) => {
            print_usage();
            return Err(e.into());
        }
    };

    let config = Config::load();
    let db_url = normalize_sqlite_url(parsed.db_url.unwrap_or(config.db_url));
    debug!(command = ?parsed.command, db_url = %db_url, "parsed arguments");

    // Open + migrate SQLite here so the library crates never touch the filesystem.
    prepare_sqlite_file(&db_url)?;
    let services =
        AppServices::new_sqlite(&db_url, Clock::system(), config.max_write_attempts).await?;
    info!(db_url = %db_url, "storage ready");

    execute(&services, parsed.command).await
}

#[tokio::main]
async fn main() {
    config::init_tracing();

    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}
