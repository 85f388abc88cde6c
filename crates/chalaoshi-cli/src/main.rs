use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chalaoshi_core::config::LoggingConfig;
use chalaoshi_core::{Config, Extractor};
use clap::{CommandFactory, Parser};
use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

#[derive(Parser)]
#[command(name = "chalaoshi-extract", version, about = "Extract password-protected rating archives and record their metadata")]
struct Cli {
    /// Config file (default: config/extract_config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Archive to extract, list or parse
    #[arg(short, long)]
    archive: Option<PathBuf>,

    /// Extraction directory
    #[arg(short, long)]
    dir: Option<PathBuf>,

    /// Password to use instead of the configured list
    #[arg(short, long)]
    password: Option<String>,

    /// List archive contents
    #[arg(short, long)]
    list: bool,

    /// Run the extract_tasks from the config file
    #[arg(long)]
    from_config: bool,

    /// Only parse the archive filename and save its metadata
    #[arg(long)]
    parse_filename: bool,

    /// Show the saved archive metadata
    #[arg(long)]
    show_info: bool,

    /// Archive metadata file (default: logs/archive_info.json)
    #[arg(long)]
    info_file: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let (mut config, source) = Config::load_or_default(cli.config.as_deref())?;
    if let Some(info_file) = &cli.info_file {
        config.metadata.info_file = info_file.clone();
    }
    init_logging(&config.logging);
    match source {
        Some(path) => info!("Loaded config file: {}", path.display()),
        None => warn!(
            "No config file at {}, using built-in defaults",
            chalaoshi_core::DEFAULT_CONFIG_PATH
        ),
    }

    let extractor = Extractor::new(config);

    if cli.show_info {
        show_info(&extractor);
    } else if cli.from_config {
        let results = extractor.extract_from_config();
        let succeeded = results.iter().filter(|(_, ok)| *ok).count();
        println!("Extraction finished: {}/{} archives succeeded", succeeded, results.len());
    } else if let Some(archive) = &cli.archive {
        if cli.parse_filename {
            parse_only(&extractor, archive)?;
        } else if cli.list {
            list(archive)?;
        } else if extractor.extract_file(archive, cli.dir.as_deref(), cli.password.as_deref())? {
            println!("Extraction succeeded");
        } else {
            println!("Extraction failed");
            std::process::exit(1);
        }
    } else {
        Cli::command().print_help()?;
    }

    Ok(())
}

/// RUST_LOG wins over the configured level; the log file is best effort.
fn init_logging(logging: &LoggingConfig) {
    let filter = || {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level))
    };

    let file_layer = logging.log_file.as_ref().and_then(|path| {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).ok()?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path).ok()?;
        Some(
            fmt::layer()
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .with_filter(filter()),
        )
    });
    let missing_log_file = logging.log_file.is_some() && file_layer.is_none();

    tracing_subscriber::registry()
        .with(fmt::layer().with_filter(filter()))
        .with(file_layer)
        .init();

    if missing_log_file {
        warn!("Cannot open log file, logging to stdout only");
    }
}

fn parse_only(extractor: &Extractor, archive: &Path) -> anyhow::Result<()> {
    let filename = archive
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("");

    let Some(record) = chalaoshi_core::parse_archive_filename(filename) else {
        println!("Filename does not follow the archive naming scheme");
        std::process::exit(1);
    };

    println!("Parsed:");
    let entry = serde_json::to_value(record.to_entry(chrono::Local::now()))?;
    if let serde_json::Value::Object(map) = entry {
        // preserve_order keeps the ArchiveEntry field order
        for (key, value) in map {
            match value {
                serde_json::Value::String(s) => println!("  {}: {}", key, s),
                other => println!("  {}: {}", key, other),
            }
        }
    }

    extractor.store().upsert(&record)?;
    println!("\nSaved to {}", extractor.store().path().display());
    Ok(())
}

fn list(archive: &Path) -> anyhow::Result<()> {
    match chalaoshi_core::list_archive_contents(archive) {
        Ok(names) if !names.is_empty() => {
            println!("Archive contents ({} entries):", names.len());
            for name in names {
                println!("  {}", name);
            }
            Ok(())
        }
        Ok(_) => {
            println!("Archive is empty");
            Ok(())
        }
        Err(e) => {
            eprintln!("Cannot list archive contents: {}", e);
            std::process::exit(1);
        }
    }
}

fn show_info(extractor: &Extractor) {
    let path = extractor.store().path();
    if !path.exists() {
        println!("Info file not found: {}", path.display());
        return;
    }

    let entries = extractor.store().load_entries();
    println!("Saved archive info ({} entries):", entries.len());
    println!("{}", "=".repeat(80));
    for (i, e) in entries.iter().enumerate() {
        println!("{}. File: {}", i + 1, e.filename);
        println!("   Date: {}", e.date_formatted);
        println!("   Post: {}", e.post_id);
        println!("   Floor: {}", e.floor_number);
        println!("   Author: {}", e.author_id);
        println!("   Method: {}", e.encryption_method);
        println!("   Forum URL: {}", e.forum_url);
        println!("   Password hint: {}", e.password_description);
        if e.is_extracted() {
            println!("   Status: extracted to {}", e.extract_dir.as_deref().unwrap_or("N/A"));
            match e.extraction_time {
                Some(t) => println!("   Extracted at: {}", t.to_rfc3339()),
                None => println!("   Extracted at: N/A"),
            }
        } else {
            println!("   Status: not extracted");
        }
        println!("{}", "-".repeat(80));
    }
}
