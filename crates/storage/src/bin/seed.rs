use std::fmt;
use std::path::PathBuf;

use sporty_core::CurriculumCatalog;
use storage::json_content::JsonContentSource;
use storage::repository::ContentRepository;
use storage::sqlite::SqliteRepository;
use tracing::info;
use tracing_subscriber::EnvFilter;

const DEFAULT_DB_URL: &str = "sqlite://sporty.sqlite3";
const DEFAULT_CONTENT_PATH: &str = "content/curriculum.json";

#[derive(Debug, Clone)]
struct Args {
    db_url: String,
    content_path: PathBuf,
}

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidDbUrl { raw: String },
    InvalidContentPath { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
            ArgsError::InvalidContentPath { raw } => {
                write!(f, "invalid --content value: {raw}")
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

impl Args {
    fn parse() -> Result<Self, ArgsError> {
        let mut db_url = std::env::var("SPORTY_DB_URL").unwrap_or_else(|_| DEFAULT_DB_URL.into());
        let mut content_path = std::env::var("SPORTY_CONTENT_PATH")
            .map_or_else(|_| PathBuf::from(DEFAULT_CONTENT_PATH), PathBuf::from);

        let mut args = std::env::args().skip(1);
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(&mut args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = value;
                }
                "--content" => {
                    let value = require_value(&mut args, "--content")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidContentPath { raw: value });
                    }
                    content_path = PathBuf::from(value);
                }
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        Ok(Self {
            db_url,
            content_path,
        })
    }
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p storage --bin seed -- [options]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --db <sqlite_url>         SQLite URL (default: {DEFAULT_DB_URL})");
    eprintln!("  --content <path>          Curriculum JSON file (default: {DEFAULT_CONTENT_PATH})");
    eprintln!("  -h, --help                Show this help");
    eprintln!();
    eprintln!("Environment (same as flags):");
    eprintln!("  SPORTY_DB_URL, SPORTY_CONTENT_PATH");
    eprintln!("Log level: RUST_LOG (default: info)");
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse().map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;
    init_logging();

    let draft = JsonContentSource::from_path(&args.content_path)
        .load_curriculum()
        .await
        .map_err(|e| format!("{}: {e}", args.content_path.display()))?;

    // Refuse to import anything the catalog would reject at startup.
    let catalog = CurriculumCatalog::load(draft.clone())?;

    let repo = SqliteRepository::connect(&args.db_url).await?;
    repo.migrate().await?;
    repo.import_curriculum(&draft).await?;

    let lessons: usize = catalog
        .sports()
        .iter()
        .map(|sport| catalog.lesson_count(&sport.id))
        .sum();
    info!(
        db = %args.db_url,
        content = %args.content_path.display(),
        sports = catalog.sports().len(),
        lessons,
        "seeded curriculum"
    );

    Ok(())
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}
