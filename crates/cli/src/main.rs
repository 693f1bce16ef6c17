//! scoutloop CLI: the main entry point.
//!
//! Commands:
//! - `ask`      Run the generic loop on one task and stream its steps
//! - `research` Run the lead-research loop for a product
//! - `config`   Print the effective configuration

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "scoutloop",
    about = "scoutloop: reason, act, observe",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one task through the reasoning loop
    Ask {
        /// The task or question
        task: String,

        /// Override the iteration cap
        #[arg(long)]
        max_iterations: Option<usize>,
    },

    /// Research and save leads for a product
    Research {
        /// What the product does
        #[arg(short, long)]
        product: String,

        /// Product identifier passed to save_lead_tool
        #[arg(long)]
        product_id: Option<String>,

        /// Human-readable product name
        #[arg(long)]
        product_name: Option<String>,

        /// Number of qualified leads to save
        #[arg(short, long)]
        target: Option<usize>,

        /// Search rounds before giving up
        #[arg(short, long)]
        iterations: Option<usize>,
    },

    /// Print the effective configuration (secrets omitted)
    Config,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Ask {
            task,
            max_iterations,
        } => commands::ask::run(task, max_iterations).await?,
        Commands::Research {
            product,
            product_id,
            product_name,
            target,
            iterations,
        } => {
            commands::research::run(commands::research::ResearchArgs {
                product,
                product_id,
                product_name,
                target,
                iterations,
            })
            .await?
        }
        Commands::Config => commands::config_cmd::show()?,
    }

    Ok(())
}
