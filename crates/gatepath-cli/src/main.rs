//! gatepath CLI: drive the progress engine against a local data file.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use uuid::Uuid;

use gatepath_core::model::{ContextType, SnapshotScope};

mod commands;

#[derive(Parser)]
#[command(
    name = "gatepath",
    version,
    about = "Learner progression and readiness engine"
)]
struct Cli {
    /// Config file path
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Print JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a starter config and question bank
    Init,

    /// Load questions and modules from a bank file
    Import {
        /// Path to a .toml question bank
        #[arg(long)]
        bank: PathBuf,
    },

    /// Record an answered question
    Attempt {
        #[arg(long)]
        learner: String,

        #[arg(long)]
        question: String,

        #[arg(long)]
        answer: String,

        /// Seconds spent on the question
        #[arg(long, default_value = "60")]
        time_spent: f64,

        /// baseline, drill, mock, recycle or flashcard
        #[arg(long, default_value = "drill")]
        context: ContextType,

        #[arg(long)]
        context_id: Option<String>,

        #[arg(long)]
        module: Option<String>,

        /// Attempt id; resubmitting an id is a no-op
        #[arg(long)]
        id: Option<Uuid>,
    },

    /// Record a module completion
    Finalize {
        #[arg(long)]
        learner: String,

        #[arg(long)]
        module: String,

        /// Module score (percent)
        #[arg(long)]
        score: f64,

        #[arg(long)]
        total: u32,

        #[arg(long)]
        correct: u32,
    },

    /// Take a readiness snapshot
    Snapshot {
        #[arg(long)]
        learner: String,

        /// partial_baseline, full_baseline, checkpoint, cycle_end or daily
        #[arg(long, default_value = "daily")]
        scope: SnapshotScope,
    },

    /// Build a remediation checkpoint from current weak skills
    Checkpoint {
        #[arg(long)]
        learner: String,
    },

    /// Inspect or advance the learner's phase
    Phase {
        #[command(subcommand)]
        action: commands::phase::PhaseAction,
    },

    /// Show construct and skill estimates
    Profile {
        #[arg(long)]
        learner: String,
    },

    /// Show snapshot and checkpoint history
    History {
        #[arg(long)]
        learner: String,
    },

    /// Rebuild construct and skill state from the attempt log
    Recompute {
        #[arg(long)]
        learner: String,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("gatepath=info".parse().unwrap()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = cli.config;
    let json = cli.json;

    let result = match cli.command {
        Commands::Init => commands::init::execute(),
        Commands::Import { bank } => commands::import::execute(config, bank, json).await,
        Commands::Attempt {
            learner,
            question,
            answer,
            time_spent,
            context,
            context_id,
            module,
            id,
        } => {
            commands::attempt::execute(
                config,
                commands::attempt::AttemptArgs {
                    learner,
                    question,
                    answer,
                    time_spent,
                    context,
                    context_id,
                    module,
                    id,
                },
                json,
            )
            .await
        }
        Commands::Finalize {
            learner,
            module,
            score,
            total,
            correct,
        } => {
            commands::finalize::execute(config, learner, module, score, total, correct, json).await
        }
        Commands::Snapshot { learner, scope } => {
            commands::snapshot::execute(config, learner, scope, json).await
        }
        Commands::Checkpoint { learner } => {
            commands::checkpoint::execute(config, learner, json).await
        }
        Commands::Phase { action } => commands::phase::execute(config, action, json).await,
        Commands::Profile { learner } => commands::profile::execute(config, learner, json).await,
        Commands::History { learner } => commands::history::execute(config, learner, json).await,
        Commands::Recompute { learner } => {
            commands::recompute::execute(config, learner, json).await
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}
