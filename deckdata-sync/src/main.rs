//! deckdata - CSV source of truth and SQLite working cache
//!
//! **Usage:**
//! ```bash
//! deckdata [--config <file>] [--cache <db>] [--data-dir <dir>] [--media-dir <dir>] [--json] <command>
//! ```
//!
//! The binary parses arguments, prompts and prints. Conflict prompts are
//! asked only when stdin is a terminal and no resolution was given on the
//! command line; the operation is first attempted with `abort`, which
//! leaves both stores untouched, then repeated with the chosen resolution.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use deckdata_common::config::{CliOverrides, CompiledDefaults, Settings, TomlConfig};
use deckdata_common::Locale;
use deckdata_sync::services::{
    check_before_import, ensure_key_coverage, export, import, run_checks, ConflictResolution,
    Outcome, SyncConflict, SyncOptions,
};
use deckdata_sync::SyncContext;
use serde::Serialize;
use std::fmt::Display;
use std::future::Future;
use std::io::{BufRead, IsTerminal, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{debug, info};
use tracing_subscriber::{fmt, layer::SubscriberExt, reload, util::SubscriberInitExt, EnvFilter};

/// Exit status of an operation skipped by a conflict
const EXIT_SKIPPED: u8 = 2;

#[derive(Parser, Debug)]
#[clap(name = "deckdata")]
#[clap(about = "Synchronize flashcard CSV files with the SQLite working cache")]
#[clap(version)]
struct Cli {
    /// TOML configuration file
    #[clap(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// SQLite cache path
    #[clap(long, global = true, value_name = "DB")]
    cache: Option<PathBuf>,

    /// Directory holding the CSV files
    #[clap(long, global = true, value_name = "DIR")]
    data_dir: Option<PathBuf>,

    /// Directory holding the per-locale audio folders
    #[clap(long, global = true, value_name = "DIR")]
    media_dir: Option<PathBuf>,

    /// Print results as JSON
    #[clap(long, global = true)]
    json: bool,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Replace the cache with the contents of the CSV files
    Import {
        #[clap(flatten)]
        conflict: ConflictArgs,
    },
    /// Regenerate the CSV files from the cache
    Export {
        /// Output directory (defaults to the data directory)
        #[clap(value_name = "DIR")]
        out_dir: Option<PathBuf>,

        #[clap(flatten)]
        conflict: ConflictArgs,
    },
    /// Show what changed since the last sync
    Status,
    /// Run duplicate, ambiguity and audio checks
    Check {
        /// Clear dangling audio pointers and delete orphaned audio files
        #[clap(long)]
        auto_fix: bool,

        #[clap(flatten)]
        conflict: ConflictArgs,
    },
    /// Add placeholder rows so every key exists in every locale and pair
    Coverage,
    /// Look up a localized string
    Lookup {
        #[clap(value_enum)]
        table: LookupTable,

        /// Locale to look up in (e.g. es_es)
        locale: String,

        /// String key, card type, or locale being named
        key: String,
    },
}

#[derive(Args, Debug, Default)]
struct ConflictArgs {
    /// Skip conflict detection
    #[clap(long)]
    force: bool,

    /// Fail on any conflict
    #[clap(long, conflicts_with = "force")]
    strict: bool,

    /// Resolution to apply without prompting
    #[clap(long, value_enum, value_name = "RESOLUTION")]
    on_conflict: Option<ResolutionArg>,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum ResolutionArg {
    Abort,
    Overwrite,
    Ignore,
}

impl From<ResolutionArg> for ConflictResolution {
    fn from(arg: ResolutionArg) -> Self {
        match arg {
            ResolutionArg::Abort => ConflictResolution::Abort,
            ResolutionArg::Overwrite => ConflictResolution::Overwrite,
            ResolutionArg::Ignore => ConflictResolution::Ignore,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum LookupTable {
    Ui,
    CardType,
    Language,
}

impl ConflictArgs {
    fn options(&self) -> SyncOptions {
        SyncOptions {
            force: self.force,
            strict: self.strict,
            on_conflict: self.on_conflict.map(Into::into).unwrap_or_default(),
        }
    }

    /// Prompt only when nothing on the command line already decided
    fn may_prompt(&self) -> bool {
        !self.force && !self.strict && self.on_conflict.is_none() && std::io::stdin().is_terminal()
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // Installed before configuration loads; the configured level is applied
    // once settings resolve, unless RUST_LOG is set
    let initial_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(CompiledDefaults::default().log_level));
    let (filter, filter_handle) = reload::Layer::new(initial_filter);
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let toml_config =
        TomlConfig::discover(cli.config.as_deref()).context("Failed to load configuration")?;
    let overrides = CliOverrides {
        cache_path: cli.cache.clone(),
        data_dir: cli.data_dir.clone(),
        media_dir: cli.media_dir.clone(),
    };
    let settings = Settings::resolve(&overrides, &toml_config);

    if std::env::var_os(EnvFilter::DEFAULT_ENV).is_none() {
        filter_handle
            .reload(EnvFilter::new(&settings.log_level))
            .context("Failed to apply log level")?;
    }

    info!(
        "deckdata v{}: cache {}, data {}",
        env!("CARGO_PKG_VERSION"),
        settings.cache_path.display(),
        settings.data_dir.display()
    );

    let mut ctx = SyncContext::new(settings);
    let json = cli.json;

    match cli.command {
        Command::Import { conflict } => {
            let ctx = &ctx;
            let data_dir = ctx.settings.data_dir.clone();
            let outcome = with_prompt(&conflict, move |options| {
                let data_dir = data_dir.clone();
                async move { import(ctx, &data_dir, &options).await }
            })
            .await
            .context("Import failed")?;
            print_outcome(&outcome, json)
        }
        Command::Export { out_dir, conflict } => {
            let ctx = &ctx;
            let out_dir = out_dir.unwrap_or_else(|| ctx.settings.data_dir.clone());
            let outcome = with_prompt(&conflict, move |options| {
                let out_dir = out_dir.clone();
                async move { export(ctx, &out_dir, &options).await }
            })
            .await
            .context("Export failed")?;
            print_outcome(&outcome, json)
        }
        Command::Status => {
            let pool = ctx.open_existing_cache().await?;
            let report = check_before_import(&pool, &ctx.settings.data_dir, &ctx.layout).await?;
            pool.close().await;
            print_value(&report, json)?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Check { auto_fix, conflict } => {
            let ctx = &ctx;
            let outcome = with_prompt(&conflict, move |options| {
                async move { run_checks(ctx, &options, auto_fix).await }
            })
            .await
            .context("Check failed")?;
            print_outcome(&outcome, json)
        }
        Command::Coverage => {
            let pool = ctx.open_existing_cache().await?;
            let summary = ensure_key_coverage(&pool).await?;
            pool.close().await;
            print_value(&summary, json)?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Lookup { table, locale, key } => {
            let locale: Locale = locale.parse()?;
            let pool = ctx.open_existing_cache().await?;
            ctx.reload_localization(&pool).await?;
            pool.close().await;

            let tables = &ctx.localization;
            let value = match table {
                LookupTable::Ui => tables.ui_string(&locale, &key),
                LookupTable::CardType => tables.card_type_name(&locale, &key),
                LookupTable::Language => {
                    let named: Locale = key.parse()?;
                    tables.language_name(&locale, &named)
                }
            };

            match value {
                Some(value) => {
                    println!("{}", value);
                    Ok(ExitCode::SUCCESS)
                }
                None => {
                    eprintln!("No entry for '{}' in {}", key, locale);
                    Ok(ExitCode::FAILURE)
                }
            }
        }
    }
}

/// Run `operation`, asking the user how to resolve a conflict if allowed
async fn with_prompt<T, F, Fut>(args: &ConflictArgs, operation: F) -> deckdata_common::Result<Outcome<T>>
where
    F: Fn(SyncOptions) -> Fut,
    Fut: Future<Output = deckdata_common::Result<Outcome<T>>>,
{
    let options = args.options();
    let outcome = operation(options).await?;

    let conflict = match &outcome {
        Outcome::Skipped(conflict) if args.may_prompt() => conflict.clone(),
        _ => return Ok(outcome),
    };

    match ask_resolution(&conflict)? {
        ConflictResolution::Abort => Ok(outcome),
        resolution => {
            debug!("User chose {:?}", resolution);
            operation(SyncOptions::resolving(resolution)).await
        }
    }
}

fn ask_resolution(conflict: &SyncConflict) -> std::io::Result<ConflictResolution> {
    let stdin = std::io::stdin();
    let mut stderr = std::io::stderr();

    loop {
        writeln!(stderr, "Conflict: {}", conflict)?;
        write!(stderr, "[a]bort, [o]verwrite, [i]gnore? ")?;
        stderr.flush()?;

        let mut answer = String::new();
        if stdin.lock().read_line(&mut answer)? == 0 {
            return Ok(ConflictResolution::Abort);
        }

        match answer.trim().to_ascii_lowercase().as_str() {
            "a" | "abort" | "" => return Ok(ConflictResolution::Abort),
            "o" | "overwrite" => return Ok(ConflictResolution::Overwrite),
            "i" | "ignore" => return Ok(ConflictResolution::Ignore),
            _ => continue,
        }
    }
}

fn print_value<T: Serialize + Display>(value: &T, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        print!("{}", value);
    }
    Ok(())
}

fn print_outcome<T: Serialize + Display>(outcome: &Outcome<T>, json: bool) -> Result<ExitCode> {
    if json {
        println!("{}", serde_json::to_string_pretty(outcome)?);
    } else {
        match outcome {
            Outcome::Done(value) => print!("{}", value),
            Outcome::Skipped(conflict) => println!("Skipped: {}", conflict),
        }
    }

    Ok(if outcome.is_skipped() {
        ExitCode::from(EXIT_SKIPPED)
    } else {
        ExitCode::SUCCESS
    })
}
