//! takp-peq-transfer CLI - copy one character from a TAKP schema to a PEQ schema.

use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use takp_peq_transfer::{Config, MigrationSummary, Orchestrator, TransferError, EXIT_USAGE_ERROR};
use tracing::{info, Level};

#[derive(Parser)]
#[command(name = "takp-peq-transfer")]
#[command(about = "Copy a character from a TAKP database to a PEQ database")]
#[command(version)]
struct Cli {
    /// Name of the character to transfer
    #[arg(short, long)]
    character: String,

    /// Path to YAML configuration file (default: environment variables)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Read and transform the character without writing anything
    #[arg(long)]
    dry_run: bool,

    /// Output JSON result to stdout
    #[arg(long)]
    output_json: bool,

    /// Log format: text or json
    #[arg(long, default_value = "text")]
    log_format: String,

    /// Log verbosity: debug, info, warn, error
    #[arg(long, default_value = "info")]
    verbosity: String,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    // clap exits with 2 on usage errors, which is the connection error code
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return if e.use_stderr() {
                ExitCode::from(EXIT_USAGE_ERROR)
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e.format_detailed());
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run(cli: Cli) -> Result<(), TransferError> {
    // Variables already in the environment win over .env
    dotenv::dotenv().ok();

    setup_logging(&cli.verbosity, &cli.log_format).map_err(TransferError::Config)?;

    let config = match &cli.config {
        Some(path) => {
            let config = Config::load(path)?;
            info!("Loaded configuration from {:?}", path);
            config
        }
        None => Config::from_env()?,
    };

    let orchestrator = Orchestrator::new(config).await?;
    let summary = orchestrator.run(&cli.character, cli.dry_run).await?;

    if cli.output_json {
        println!("{}", summary.to_json()?);
    } else {
        print_summary(&summary);
    }

    Ok(())
}

fn print_summary(summary: &MigrationSummary) {
    let status_msg = if summary.dry_run {
        "Dry run completed!"
    } else {
        "Transfer completed!"
    };
    println!("\n{}", status_msg);
    println!(
        "  Character: {} (source id {})",
        summary.character_name, summary.source_character_id
    );
    if let Some(id) = summary.character_id {
        println!("  New character id: {}", id);
    }
    let account_action = match (summary.dry_run, summary.account_created) {
        (true, true) => "would be created",
        (false, true) => "created",
        _ => "existing",
    };
    match summary.account_id {
        Some(id) => println!(
            "  Account: {} (id {}, {})",
            summary.account_name, id, account_action
        ),
        None => println!("  Account: {} ({})", summary.account_name, account_action),
    }
    println!("  Duration: {:.2}s", summary.duration_seconds);
    println!("  Rows: {}", summary.dependent_rows);
    for (table, rows) in &summary.tables {
        println!("    {:<32} {}", table, rows);
    }
    if summary.skipped_rows > 0 {
        println!("  Skipped rows: {}", summary.skipped_rows);
    }
}

fn setup_logging(verbosity: &str, format: &str) -> Result<(), String> {
    let level = match verbosity.to_lowercase().as_str() {
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false);

    match format {
        "json" => subscriber.json().init(),
        "text" => subscriber.init(),
        other => {
            return Err(format!(
                "unknown log format '{}', expected text or json",
                other
            ))
        }
    }

    Ok(())
}
