use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use timeline_engine::{
    DocumentStore, EngineConfig, EngineError, JsonFileStore, Timebase, TimelineDoc,
    build_render_plan, ensure_latest_format, migrate_timeline_doc_to_session, validate,
    validate_linked_groups,
};
use tracing_subscriber::EnvFilter;

fn main() -> timeline_engine::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };

    match cli.command {
        Commands::Validate { file } => run_validate(&config, &file),
        Commands::Migrate {
            input,
            out,
            ticks_per_second,
        } => run_migrate(&config, &input, out.as_deref(), ticks_per_second),
        Commands::Downgrade { input, out } => run_downgrade(&config, &input, &out),
        Commands::RenderPlan { file } => run_render_plan(&config, &file),
    }
}

fn run_validate(config: &EngineConfig, file: &Path) -> timeline_engine::Result<()> {
    let raw = read_json(file)?;
    // Current documents are checked as stored so every violation gets reported.
    let doc: TimelineDoc = if raw.get("tracks").is_some() {
        serde_json::from_value(raw).map_err(|source| EngineError::Deserialize { source })?
    } else {
        ensure_latest_format(&raw, config.timebase()?)?.0
    };

    let report = validate(&doc);
    let group_errors = validate_linked_groups(&doc);
    tracing::info!(
        file = %file.display(),
        valid = report.valid,
        violations = report.errors.len(),
        linked_group_violations = group_errors.len(),
        "validated timeline"
    );
    for violation in report.errors.iter().chain(&group_errors) {
        println!("{violation}");
    }
    if let Some(first) = report.errors.into_iter().next() {
        return Err(EngineError::InvariantViolation(first));
    }
    println!("ok: {} clips, duration {} ticks", doc.clips().count(), doc.duration());
    Ok(())
}

fn run_migrate(
    config: &EngineConfig,
    input: &Path,
    out: Option<&Path>,
    ticks_per_second: Option<i64>,
) -> timeline_engine::Result<()> {
    let timebase = match ticks_per_second {
        Some(rate) => Timebase::new(rate)?,
        None => config.timebase()?,
    };
    let (doc, migrated) = ensure_latest_format(&read_json(input)?, timebase)?;
    tracing::info!(input = %input.display(), migrated, "migration finished");

    match out {
        Some(path) => JsonFileStore::new(path).persist(&doc),
        None => print_json(&doc, input),
    }
}

fn run_downgrade(config: &EngineConfig, input: &Path, out: &Path) -> timeline_engine::Result<()> {
    let (doc, _) = ensure_latest_format(&read_json(input)?, config.timebase()?)?;
    let session = migrate_timeline_doc_to_session(&doc);
    let json = serde_json::to_string_pretty(&session).map_err(|source| {
        EngineError::Serialization {
            path: out.to_path_buf(),
            source,
        }
    })?;
    std::fs::write(out, json).map_err(|source| EngineError::Io {
        context: "failed to write legacy session",
        path: out.to_path_buf(),
        source,
    })?;
    tracing::info!(
        out = %out.display(),
        clip_count = session.timeline.clips.len(),
        "wrote legacy session"
    );
    Ok(())
}

fn run_render_plan(config: &EngineConfig, file: &Path) -> timeline_engine::Result<()> {
    let (doc, _) = ensure_latest_format(&read_json(file)?, config.timebase()?)?;
    let plan = build_render_plan(&doc)?;
    print_json(&plan, file)
}

fn read_json(path: &Path) -> timeline_engine::Result<serde_json::Value> {
    JsonFileStore::new(path)
        .load()?
        .ok_or_else(|| EngineError::Io {
            context: "file does not exist",
            path: path.to_path_buf(),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        })
}

fn print_json<T: serde::Serialize>(value: &T, path: &Path) -> timeline_engine::Result<()> {
    let json = serde_json::to_string_pretty(value).map_err(|source| EngineError::Serialization {
        path: path.to_path_buf(),
        source,
    })?;
    println!("{json}");
    Ok(())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Inspect and convert timeline documents", long_about = None)]
struct Cli {
    /// Engine configuration file (JSON).
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Check a document against the timeline rules.
    Validate {
        file: PathBuf,
    },
    /// Upgrade a legacy session or normalize a current document.
    Migrate {
        input: PathBuf,
        /// Output path; prints to stdout when absent.
        #[arg(long)]
        out: Option<PathBuf>,
        #[arg(long)]
        ticks_per_second: Option<i64>,
    },
    /// Write the main track of a document as a legacy session.
    Downgrade {
        input: PathBuf,
        #[arg(long)]
        out: PathBuf,
    },
    /// Print the flattened render plan of a document.
    RenderPlan {
        file: PathBuf,
    },
}
