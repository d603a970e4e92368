//! warden: fleet doctor for a town of agent workspaces.
//!
//! ## Subcommands
//!
//! - `doctor`: Run every check, optionally fixing what is provably broken
//! - `locks`: List or clean workspace locks
//! - `sessions`: Classify live fleet sessions against the registered rigs
//! - `checkpoint`: Write, show or clear a worker's crash-recovery checkpoint
//!
//! The town root comes from `--town`, then `WARDEN_TOWN_ROOT`, then the
//! nearest ancestor of the working directory holding `mayor/`, then `~/gt`.

mod checkpoint;
mod doctor;
mod locks;
mod logging;
mod output;
mod sessions;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use warden_core::{
    load_config, CheckContext, DoctorConfig, Keepalive, SystemProcessProbe, TmuxCli, TownLayout,
};

#[derive(Parser)]
#[command(name = "warden")]
#[command(about = "Detect and heal stale locks, orphaned sessions and broken worker state")]
#[command(version)]
struct Cli {
    /// Town root directory
    #[arg(long, global = true, env = "WARDEN_TOWN_ROOT", value_name = "PATH")]
    town: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run health checks across the town
    Doctor {
        /// Apply fixes for fixable findings, then re-check
        #[arg(long)]
        fix: bool,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Inspect or clean workspace locks
    Locks {
        #[command(subcommand)]
        command: LockCommands,
    },

    /// Classify live fleet sessions
    Sessions {
        /// Print the classification as JSON
        #[arg(long)]
        json: bool,
    },

    /// Manage a worker's crash-recovery checkpoint
    Checkpoint {
        #[command(subcommand)]
        command: CheckpointCommands,
    },
}

#[derive(Subcommand)]
enum LockCommands {
    /// List every lock with its liveness classification
    List {
        #[arg(long)]
        json: bool,
    },

    /// Remove locks whose process and session are both dead
    Clean,
}

#[derive(Subcommand)]
enum CheckpointCommands {
    /// Capture repository state and write a checkpoint
    Write {
        #[command(flatten)]
        target: WorkerArg,

        /// Molecule being worked on
        #[arg(long)]
        molecule: Option<String>,

        /// Current step within the molecule
        #[arg(long, requires = "molecule")]
        step: Option<String>,

        /// Human-readable title of the current step
        #[arg(long, requires = "step")]
        title: Option<String>,

        /// Free-form notes for whoever resumes
        #[arg(long)]
        notes: Option<String>,
    },

    /// Print the checkpoint, if any
    Show {
        #[command(flatten)]
        target: WorkerArg,

        #[arg(long)]
        json: bool,
    },

    /// Delete the checkpoint
    Clear {
        #[command(flatten)]
        target: WorkerArg,
    },
}

#[derive(Args)]
struct WorkerArg {
    /// Worker directory (defaults to the current directory)
    #[arg(long, value_name = "DIR")]
    dir: Option<PathBuf>,
}

impl WorkerArg {
    fn resolve(&self) -> PathBuf {
        self.dir
            .clone()
            .or_else(|| std::env::current_dir().ok())
            .unwrap_or_else(|| PathBuf::from("."))
    }
}

/// Everything a subcommand needs: where the town is and how to reach tmux.
pub(crate) struct Runtime {
    pub layout: TownLayout,
    pub config: DoctorConfig,
    pub tmux: TmuxCli,
    pub processes: SystemProcessProbe,
}

impl Runtime {
    pub fn check_context(&self) -> CheckContext<'_> {
        CheckContext {
            layout: &self.layout,
            config: &self.config,
            sessions: &self.tmux,
            processes: &self.processes,
            current_session: self.tmux.current_session(),
        }
    }
}

fn resolve_town(explicit: Option<PathBuf>) -> TownLayout {
    if let Some(root) = explicit {
        return TownLayout::new(root);
    }
    if let Some(layout) = std::env::current_dir()
        .ok()
        .and_then(|cwd| TownLayout::discover(&cwd))
    {
        return layout;
    }
    let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
    TownLayout::new(home.join("gt"))
}

fn command_label(command: &Commands) -> &'static str {
    match command {
        Commands::Doctor { fix: true, .. } => "warden doctor --fix",
        Commands::Doctor { .. } => "warden doctor",
        Commands::Locks { command: LockCommands::List { .. } } => "warden locks list",
        Commands::Locks { command: LockCommands::Clean } => "warden locks clean",
        Commands::Sessions { .. } => "warden sessions",
        Commands::Checkpoint { command: CheckpointCommands::Write { .. } } => "warden checkpoint write",
        Commands::Checkpoint { command: CheckpointCommands::Show { .. } } => "warden checkpoint show",
        Commands::Checkpoint { command: CheckpointCommands::Clear { .. } } => "warden checkpoint clear",
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let layout = resolve_town(cli.town);
    let logs_dir = layout.root().is_dir().then(|| layout.logs_dir());
    let _logging_guard = logging::init(logs_dir.as_deref());

    let config = match load_config(&layout.config_file()) {
        Ok(config) => config,
        Err(err) => {
            tracing::error!(error = %err, "Failed to load doctor config");
            eprintln!("warden: {}", err);
            return ExitCode::FAILURE;
        }
    };

    if layout.root().is_dir() {
        Keepalive.touch(layout.root(), command_label(&cli.command));
    }

    let runtime = Runtime {
        layout,
        config,
        tmux: TmuxCli::new(),
        processes: SystemProcessProbe,
    };

    let result = match cli.command {
        Commands::Doctor { fix, json } => doctor::run(&runtime, fix, json),
        Commands::Locks { command } => match command {
            LockCommands::List { json } => locks::list(&runtime, json),
            LockCommands::Clean => locks::clean(&runtime),
        },
        Commands::Sessions { json } => sessions::run(&runtime, json),
        Commands::Checkpoint { command } => match command {
            CheckpointCommands::Write {
                target,
                molecule,
                step,
                title,
                notes,
            } => checkpoint::write(
                &runtime,
                &target.resolve(),
                checkpoint::WriteOptions {
                    molecule,
                    step,
                    title,
                    notes,
                },
            ),
            CheckpointCommands::Show { target, json } => {
                checkpoint::show(&target.resolve(), json)
            }
            CheckpointCommands::Clear { target } => checkpoint::clear(&target.resolve()),
        },
    };

    match result {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            tracing::error!(error = %err, "warden failed");
            eprintln!("warden: {}", err);
            ExitCode::FAILURE
        }
    }
}

/// `path` relative to the town root when it lies inside the town.
pub(crate) fn display_path<'a>(layout: &TownLayout, path: &'a Path) -> std::borrow::Cow<'a, str> {
    match path.strip_prefix(layout.root()) {
        Ok(relative) if !relative.as_os_str().is_empty() => relative.to_string_lossy(),
        _ => path.to_string_lossy(),
    }
}
