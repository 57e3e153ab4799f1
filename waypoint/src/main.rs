//! Resumable journey server.
//!
//! Serves declared pieces one at a time and persists progress under
//! `.waypoint/` so a journey can continue after a restart.

use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use waypoint::controller::FileController;
use waypoint::core::sequence::SequenceModel;
use waypoint::core::types::JourneyStatus;
use waypoint::exit_codes;
use waypoint::io::config::load_config;
use waypoint::io::declaration::load_declaration;
use waypoint::io::init::{InitOptions, WaypointPaths, init_waypoint};
use waypoint::io::progress_store::{FileProgressStore, ProgressStore};
use waypoint::logging;
use waypoint::surface::dispatch_bytes;

#[derive(Parser)]
#[command(
    name = "waypoint",
    version,
    about = "Serve ordered journeys one piece at a time, resumable across restarts"
)]
struct Cli {
    /// Project root containing `.waypoint/`.
    #[arg(long, global = true, default_value = ".")]
    root: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create `.waypoint/` with a default config.
    Init {
        /// Overwrite waypoint-owned files; journey state is kept.
        #[arg(short, long)]
        force: bool,
    },
    /// Check a declaration against the schema and sequence invariants.
    Validate {
        /// Path to a JSON journey declaration.
        declaration: PathBuf,
    },
    /// Print the stored progress record for a journey.
    Status {
        journey_id: String,
    },
    /// Answer JSON-line requests from stdin on stdout until EOF.
    Serve,
}

fn main() {
    logging::init();
    let code = match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{err:#}");
            exit_codes::INVALID
        }
    };
    std::process::exit(code);
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    match cli.command {
        Command::Init { force } => cmd_init(&cli.root, force),
        Command::Validate { declaration } => cmd_validate(&declaration),
        Command::Status { journey_id } => cmd_status(&cli.root, &journey_id),
        Command::Serve => cmd_serve(&cli.root),
    }
}

fn cmd_init(root: &Path, force: bool) -> Result<i32> {
    let paths = init_waypoint(root, &InitOptions { force })?;
    println!("initialized {}", paths.waypoint_dir.display());
    Ok(exit_codes::OK)
}

fn cmd_validate(path: &Path) -> Result<i32> {
    let decl = load_declaration(path)?;
    let model = match SequenceModel::load(&decl) {
        Ok(model) => model,
        Err(err) => {
            eprintln!("{}: {err}", path.display());
            return Ok(exit_codes::INVALID);
        }
    };
    for warning in model.warnings() {
        eprintln!("warning: {warning}");
    }
    println!(
        "{}:{} ok ({} pieces)",
        model.domain(),
        model.version(),
        model.total_count()
    );
    println!(
        "  {} root, {} in {} groups",
        model.root_pieces().count(),
        model.groups().values().map(Vec::len).sum::<usize>(),
        model.groups().len()
    );
    if !model.description().is_empty() {
        println!("  {}", model.description());
    }
    Ok(exit_codes::OK)
}

fn cmd_status(root: &Path, journey_id: &str) -> Result<i32> {
    let store = FileProgressStore::new(WaypointPaths::new(root));
    let Some(record) = store.read(journey_id)? else {
        eprintln!("no progress recorded for journey '{journey_id}'");
        return Ok(exit_codes::INVALID);
    };
    println!(
        "{}",
        serde_json::to_string_pretty(&record).context("serialize progress record")?
    );
    Ok(match record.status {
        JourneyStatus::Complete => exit_codes::COMPLETE,
        JourneyStatus::NotStarted | JourneyStatus::InProgress => exit_codes::OK,
    })
}

fn cmd_serve(root: &Path) -> Result<i32> {
    let paths = WaypointPaths::new(root);
    let config = load_config(&paths.config_path)?;
    let controller = FileController::open(&paths, &config);
    info!(root = %root.display(), "serving journey requests");

    let mut stdin = io::stdin().lock();
    let mut stdout = io::stdout().lock();
    let mut line = Vec::new();
    loop {
        line.clear();
        if stdin.read_until(b'\n', &mut line).context("read request")? == 0 {
            break;
        }
        if line.trim_ascii().is_empty() {
            continue;
        }
        let reply = dispatch_bytes(&controller, &line);
        let payload = serde_json::to_string(&reply).context("serialize reply")?;
        writeln!(stdout, "{payload}").context("write reply")?;
        stdout.flush().context("flush reply")?;
    }
    Ok(exit_codes::OK)
}
