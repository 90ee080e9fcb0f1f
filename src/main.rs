use anyhow::{Result, bail};
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use bizscale::cli::{Cli, Commands};
use bizscale::generator::validator::validate_report_file;
use bizscale::generator::workflow::{evaluate, extract_latest, launch};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(err) = run(cli).await {
        error!(error = %err, "command failed");
        for cause in err.chain().skip(1) {
            error!(cause = %cause, "caused by");
        }
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Run(args) => {
            let config = args.to_config()?;
            let outcome = launch(&config, &args.business()).await?;
            println!("{}", serde_json::to_string_pretty(&outcome.report)?);
            info!(
                run_id = %outcome.run_id,
                report = %outcome.saved.report_path.display(),
                validation_errors = outcome.validation_errors.len(),
                "运行结果已保存"
            );
        }
        Commands::Evaluate(args) => {
            let config = args.load()?;
            let summary = evaluate(&config).await?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        Commands::Latest(args) => {
            let config = args.load()?;
            let latest = extract_latest(&config).await?;
            println!("Extracted latest report to: {}", latest.path.display());
            println!("Run ID: {}", latest.run_id);
        }
        Commands::Validate(args) => {
            let errors = validate_report_file(&args.file).await?;
            if !errors.is_empty() {
                for e in &errors {
                    println!("- {}", e);
                }
                bail!("{} validation error(s) in {}", errors.len(), args.file.display());
            }
            println!("OK: {} is a well-formed final report", args.file.display());
        }
    }
    Ok(())
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
