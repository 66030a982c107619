use std::fmt;

use course_core::model::{
    Course, CourseId, Lesson, LessonId, LessonStatus, ProgressSignals, SessionId, User, UserId,
    Viewer,
};
use services::{Clock, ProgressConfig, ProgressServices};
use storage::repository::CatalogRepository;
use tracing_subscriber::EnvFilter;

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    MissingFlag { flag: &'static str },
    UnknownArg(String),
    InvalidId { flag: &'static str, raw: String },
    InvalidSeconds { raw: String },
    InvalidDbUrl { raw: String },
    ConflictingViewer,
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::MissingFlag { flag } => write!(f, "{flag} is required"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidId { flag, raw } => write!(f, "invalid {flag} value: {raw}"),
            ArgsError::InvalidSeconds { raw } => write!(f, "invalid --playback value: {raw}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
            ArgsError::ConflictingViewer => {
                write!(f, "use exactly one of --user, --session or --guest")
            }
        }
    }
}

impl std::error::Error for ArgsError {}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

fn parse_id(args: &mut impl Iterator<Item = String>, flag: &'static str) -> Result<u64, ArgsError> {
    let value = require_value(args, flag)?;
    value
        .parse()
        .map_err(|_| ArgsError::InvalidId { flag, raw: value })
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p app -- migrate [--db <sqlite_url>]");
    eprintln!("  cargo run -p app -- seed    [--db <sqlite_url>]");
    eprintln!(
        "  cargo run -p app -- record  --lesson <id> (--user <id> [--subscriber <sid>] | --session <sid> | --guest)"
    );
    eprintln!("                              [--start] [--playback <secs>] [--complete] [--db <sqlite_url>]");
    eprintln!("  cargo run -p app -- show    --course <id> --user <id> [--db <sqlite_url>]");
    eprintln!("  cargo run -p app -- tags    [--db <sqlite_url>]");
    eprintln!();
    eprintln!("Any command accepts --no-tags to record milestones without queueing tags.");
    eprintln!("--guest mints a fresh session id and prints it to stderr.");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  COURSES_DB_URL (default sqlite://courses.sqlite3)");
    eprintln!("  COURSES_TAGGING_ENABLED (default true)");
    eprintln!("  RUST_LOG (default info)");
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    Migrate,
    Seed,
    Record(RecordArgs),
    Show { course_id: CourseId, user_id: UserId },
    Tags,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct RecordArgs {
    lesson_id: LessonId,
    user_id: Option<UserId>,
    subscriber_id: Option<String>,
    session: Option<String>,
    guest: bool,
    start: bool,
    playback: Option<u32>,
    complete: bool,
}

impl RecordArgs {
    fn viewer(&self) -> Result<Viewer, Box<dyn std::error::Error>> {
        match (self.user_id, &self.session, self.guest) {
            (Some(user_id), None, false) => Ok(Viewer::User(User::new(
                user_id,
                self.subscriber_id.clone(),
            ))),
            (None, Some(session), false) => Ok(Viewer::Guest(SessionId::new(session.as_str())?)),
            (None, None, true) => Ok(Viewer::Guest(SessionId::generate())),
            (None, None, false) => Err(ArgsError::MissingFlag {
                flag: "--user, --session or --guest",
            }
            .into()),
            _ => Err(ArgsError::ConflictingViewer.into()),
        }
    }

    fn signals(&self, clock: Clock) -> ProgressSignals {
        let now = clock.now();
        let mut signals = ProgressSignals::new();
        if self.start {
            signals = signals.with_started_at(now);
        }
        if let Some(seconds) = self.playback {
            signals = signals.with_playback(seconds);
        }
        if self.complete {
            signals = signals.with_completed_at(now);
        }
        signals
    }
}

struct Args {
    db_url: Option<String>,
    tagging: bool,
    command: Command,
}

impl Args {
    fn parse(name: &str, args: &mut impl Iterator<Item = String>) -> Result<Self, ArgsError> {
        let mut db_url = None;
        let mut tagging = true;
        let mut lesson_id = None;
        let mut course_id = None;
        let mut user_id = None;
        let mut subscriber_id = None;
        let mut session = None;
        let mut guest = false;
        let mut start = false;
        let mut playback = None;
        let mut complete = false;

        while let Some(arg) = args.next() {
            match (name, arg.as_str()) {
                (_, "--db") => {
                    let value = require_value(args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = Some(normalize_sqlite_url(value));
                }
                (_, "--no-tags") => tagging = false,
                ("record", "--lesson") => lesson_id = Some(LessonId::new(parse_id(args, "--lesson")?)),
                ("record" | "show", "--user") => user_id = Some(UserId::new(parse_id(args, "--user")?)),
                ("record", "--subscriber") => {
                    subscriber_id = Some(require_value(args, "--subscriber")?);
                }
                ("record", "--session") => session = Some(require_value(args, "--session")?),
                ("record", "--guest") => guest = true,
                ("record", "--start") => start = true,
                ("record", "--complete") => complete = true,
                ("record", "--playback") => {
                    let value = require_value(args, "--playback")?;
                    let seconds = value
                        .parse::<u32>()
                        .map_err(|_| ArgsError::InvalidSeconds { raw: value })?;
                    playback = Some(seconds);
                }
                ("show", "--course") => course_id = Some(CourseId::new(parse_id(args, "--course")?)),
                (_, "--help" | "-h") => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg.clone())),
            }
        }

        let command = match name {
            "migrate" => Command::Migrate,
            "seed" => Command::Seed,
            "tags" => Command::Tags,
            "record" => Command::Record(RecordArgs {
                lesson_id: lesson_id.ok_or(ArgsError::MissingFlag { flag: "--lesson" })?,
                user_id,
                subscriber_id,
                session,
                guest,
                start,
                playback,
                complete,
            }),
            "show" => Command::Show {
                course_id: course_id.ok_or(ArgsError::MissingFlag { flag: "--course" })?,
                user_id: user_id.ok_or(ArgsError::MissingFlag { flag: "--user" })?,
            },
            other => return Err(ArgsError::UnknownArg(other.to_owned())),
        };

        Ok(Self {
            db_url,
            tagging,
            command,
        })
    }
}

fn normalize_sqlite_url(raw: String) -> String {
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

async fn seed(catalog: &dyn CatalogRepository) -> Result<(), Box<dyn std::error::Error>> {
    let course = Course::new(CourseId::new(1), "intro-to-rust", "Intro to Rust")?;
    catalog.upsert_course(&course).await?;

    let lessons = [
        (1, "Ownership", Some(200), LessonStatus::Published),
        (2, "Borrowing", Some(60), LessonStatus::Previewable),
        (3, "Lifetimes", Some(600), LessonStatus::Published),
        (4, "Unsafe (coming soon)", None, LessonStatus::Draft),
    ];
    for (id, title, duration, status) in lessons {
        let lesson = Lesson::new(LessonId::new(id), course.id(), title, duration, status)?;
        catalog.upsert_lesson(&lesson).await?;
    }

    tracing::info!(course = course.slug(), lessons = lessons.len(), "seeded demo course");
    Ok(())
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut argv = std::env::args().skip(1);

    let name = match argv.next() {
        None => {
            print_usage();
            return Ok(());
        }
        Some(first) if first == "--help" || first == "-h" => {
            print_usage();
            return Ok(());
        }
        Some(first) => first,
    };

    let parsed = Args::parse(&name, &mut argv).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    let mut config = ProgressConfig::from_env();
    if !parsed.tagging {
        config = config.with_tagging(false);
    }
    if let Some(db_url) = parsed.db_url {
        config = config.with_database_url(db_url)?;
    } else {
        config.database_url = normalize_sqlite_url(config.database_url);
    }

    // Keep file creation in the binary glue so services stay storage-agnostic.
    prepare_sqlite_file(&config.database_url)?;
    let clock = Clock::System;
    let services = ProgressServices::new_sqlite(&config, clock).await?;

    match parsed.command {
        Command::Migrate => {
            println!("migrated {}", config.database_url);
        }
        Command::Seed => seed(services.catalog().as_ref()).await?,
        Command::Record(args) => {
            let viewer = args.viewer()?;
            if let (true, Viewer::Guest(session)) = (args.guest, &viewer) {
                eprintln!("session: {session}");
            }
            let outcome = services
                .record_lesson_progress(args.lesson_id, &viewer, args.signals(clock))
                .await?;
            println!("{}", serde_json::to_string_pretty(&outcome.progress)?);
            println!(
                "lesson_completed={} course_started={} course_completed={}",
                outcome.lesson_completed, outcome.course_started, outcome.course_completed
            );
        }
        Command::Show { course_id, user_id } => {
            let viewer = Viewer::User(User::new(user_id, None));
            if let Some(overview) = services.course_overview(course_id, &viewer).await? {
                println!("{}", serde_json::to_string_pretty(&overview)?);
            }
        }
        Command::Tags => {
            for job in services.pending_tags(100).await? {
                println!(
                    "{}\t{}\t{}\t{}",
                    job.id,
                    job.enqueued_at.to_rfc3339(),
                    job.subscriber_id,
                    job.tag
                );
            }
        }
    }
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
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}
