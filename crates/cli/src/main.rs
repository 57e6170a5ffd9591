use clap::{Parser, Subcommand};

mod commands;
mod desk;

use commands::{FlattenArgs, OrderCommand, ProposalsCommand};
use desk::DeskArgs;

#[derive(Parser)]
#[command(name = "riskdesk")]
#[command(about = "Options portfolio risk manager with human-gated hedging", long_about = None)]
struct Cli {
    #[command(flatten)]
    desk: DeskArgs,

    /// Optional log file path (logs to file instead of stderr)
    #[arg(long, global = true)]
    log_file: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the proposer loop until Ctrl+C
    Run,
    /// Run a single proposer cycle and print the report
    Check {
        /// Print the full cycle report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Review persisted hedge proposals
    #[command(subcommand)]
    Proposals(ProposalsCommand),
    /// Simulate, stage or submit orders
    #[command(subcommand)]
    Order(OrderCommand),
    /// Close every short option position with market orders
    Flatten(FlattenArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    match &cli.log_file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::sync::Mutex::new(file))
                .init();
        }
        None => {
            tracing_subscriber::fmt().with_env_filter(filter).init();
        }
    }

    match cli.command {
        Commands::Run => commands::run_proposer(&cli.desk).await?,
        Commands::Check { json } => commands::run_check(&cli.desk, json).await?,
        Commands::Proposals(cmd) => commands::run_proposals(&cli.desk, cmd).await?,
        Commands::Order(cmd) => commands::run_order(&cli.desk, cmd).await?,
        Commands::Flatten(args) => commands::run_flatten(&cli.desk, args).await?,
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn submit_parses_confirmation_flags() {
        let cli = Cli::try_parse_from([
            "riskdesk",
            "order",
            "submit",
            "7f1c3c2e-7d3c-4a43-9a7e-2d8f1f0b6a11",
            "--operator",
            "desk-lead",
            "--confirm",
        ])
        .unwrap();
        let Commands::Order(OrderCommand::Submit(args)) = cli.command else {
            panic!("expected order submit");
        };
        assert!(args.confirm);
        assert_eq!(args.operator, "desk-lead");
    }

    #[test]
    fn flatten_accepts_both_flags_for_validation() {
        let cli = Cli::try_parse_from([
            "riskdesk",
            "flatten",
            "--operator",
            "desk-lead",
            "--confirm",
        ])
        .unwrap();
        let Commands::Flatten(args) = cli.command else {
            panic!("expected flatten");
        };
        assert!(args.confirm);
        assert!(!args.confirm_flatten);
    }

    #[test]
    fn global_paths_have_defaults() {
        let cli = Cli::try_parse_from(["riskdesk", "check"]).unwrap();
        assert_eq!(cli.desk.config, "config/Config.toml");
        assert_eq!(cli.desk.paper_state, "config/paper_state.json");
        assert!(cli.desk.profile.is_none());
    }
}
