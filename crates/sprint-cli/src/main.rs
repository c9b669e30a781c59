mod cmd;
mod output;
mod root;
mod session;
mod tracker;

use clap::{Parser, Subcommand};
use cmd::{
    checklist::ChecklistSubcommand, config::ConfigSubcommand, task::TaskSubcommand,
};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "sprint",
    about = "Drive sprint tasks through an issue tracker board, one checklist item at a time",
    version,
    propagate_version = true
)]
struct Cli {
    /// Project root (default: auto-detect from .sprint/ or .git/)
    #[arg(long, global = true, env = "SPRINT_ROOT")]
    root: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scaffold .sprint/ with board and sprint config templates
    Init,

    /// Detect and print the state of a sprint
    Status { sprint: u32 },

    /// Run a sprint interactively, reading confirmations from stdin
    Run { sprint: u32 },

    /// Advance a sprint by one signal (no signal: begin)
    Step {
        sprint: u32,
        /// Reply such as `yes`, `verify`, `skip <reason>`
        signal: Vec<String>,
    },

    /// Drive a single task through its lifecycle
    Task {
        #[command(subcommand)]
        subcommand: TaskSubcommand,
    },

    /// Read and toggle checklist items on an issue
    Checklist {
        #[command(subcommand)]
        subcommand: ChecklistSubcommand,
    },

    /// Check a task's board status (exit code 2 on mismatch)
    Verify {
        issue: u64,
        /// Expected status: todo, in_progress, testing, review, done
        status: String,
    },

    /// Build the completion report for a sprint
    Report {
        sprint: u32,
        /// Write to .sprint/reports/sprint-<N>.md
        #[arg(long)]
        write: bool,
        /// Post as a comment on the gate issue
        #[arg(long)]
        post: bool,
    },

    /// Validate the configuration
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_level = match &cli.command {
        Commands::Run { .. } => tracing::Level::INFO,
        _ => tracing::Level::WARN,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let root = root::resolve_root(cli.root.as_deref());

    let result = match cli.command {
        Commands::Init => cmd::init::run(&root),
        Commands::Status { sprint } => cmd::status::run(&root, sprint, cli.json),
        Commands::Run { sprint } => cmd::run::run(&root, sprint, cli.json),
        Commands::Step { sprint, signal } => cmd::step::run(&root, sprint, &signal, cli.json),
        Commands::Task { subcommand } => cmd::task::run(&root, subcommand, cli.json),
        Commands::Checklist { subcommand } => cmd::checklist::run(&root, subcommand, cli.json),
        Commands::Verify { issue, status } => cmd::verify::run(&root, issue, &status, cli.json),
        Commands::Report {
            sprint,
            write,
            post,
        } => cmd::report::run(&root, sprint, write, post, cli.json),
        Commands::Config { subcommand } => cmd::config::run(&root, subcommand, cli.json),
    };

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
