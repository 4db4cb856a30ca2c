use clap::{CommandFactory, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "choreboard", version, about = "Household chore board with points and achievements")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Households and their members
    Household {
        #[command(subcommand)]
        action: commands::household::HouseholdAction,
    },
    /// Chores: create, complete, revert, delete
    Task {
        #[command(subcommand)]
        action: commands::task::TaskAction,
    },
    /// Completion history of a household
    History(commands::history::HistoryArgs),
    /// Points per member for the current period
    Leaderboard {
        /// Household ID
        household_id: String,
    },
    /// Close the current period and start a new one
    Rotate {
        /// Household ID
        household_id: String,
    },
    /// Achievement evaluation and catalog
    Achievements {
        #[command(subcommand)]
        action: commands::achievements::AchievementsAction,
    },
    /// Archived periods, newest first
    Archives {
        /// Household ID
        household_id: String,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
    /// Print shell completions
    Completions {
        shell: clap_complete::Shell,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    init_tracing();
    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Household { action } => commands::household::run(action),
        Commands::Task { action } => commands::task::run(action),
        Commands::History(args) => commands::history::run(args),
        Commands::Leaderboard { household_id } => commands::history::leaderboard(&household_id),
        Commands::Rotate { household_id } => commands::rotate::run(&household_id),
        Commands::Achievements { action } => commands::achievements::run(action),
        Commands::Archives { household_id } => commands::rotate::archives(&household_id),
        Commands::Config { action } => commands::config::run(action),
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "choreboard", &mut std::io::stdout());
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
