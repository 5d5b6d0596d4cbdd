//! bot-foundry CLI: scaffold one trading bot, push it to GitHub and
//! register its Render service.

use std::path::PathBuf;

use clap::Parser;
use tracing::Level;

use bot_foundry::{
    BotSpec, Credentials, Endpoints, Orchestrator, RunReport, Scaffolder, StageOutcome,
    TemplateSet,
};

#[derive(Parser)]
#[command(
    name = "bot-foundry",
    about = "Provision a trading bot: project scaffold, GitHub repo, Render service"
)]
struct Args {
    /// Bot name (project directory and repository name)
    #[arg(long)]
    name: String,

    /// Bot identifier baked into the generated project
    #[arg(long, default_value = "1")]
    bot_id: String,

    /// Trading pair
    #[arg(long, default_value = "BTC/USDT")]
    pair: String,

    /// Strategy: ema, rsi_macd, scalping or combo
    #[arg(long, default_value = "combo")]
    strategy: String,

    /// Candle timeframe
    #[arg(long, default_value = "1m")]
    timeframe: String,

    /// Directory the project is scaffolded under
    #[arg(long, default_value = "bots")]
    output_dir: PathBuf,

    /// Create the repository as public instead of private
    #[arg(long)]
    public: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(Level::INFO)
        .init();

    let args = Args::parse();
    let spec = BotSpec::new(
        args.name,
        args.bot_id,
        args.pair,
        &args.strategy,
        args.timeframe,
    )?;
    let credentials = Credentials::from_env();

    let scaffolder = Scaffolder::new(TemplateSet::builtin(), args.output_dir);
    let orchestrator = Orchestrator::new(scaffolder, credentials, Endpoints::default(), !args.public);

    let report = orchestrator.run(&spec).await;
    print_report(&report);

    // Downstream failures are warnings; only the scaffold decides the exit
    // code.
    if !report.succeeded() {
        std::process::exit(1);
    }
    Ok(())
}

fn print_report(report: &RunReport) {
    match &report.scaffold {
        StageOutcome::Succeeded(scaffold) => println!(
            "scaffold:   ok ({}, {} files)",
            scaffold.root.display(),
            scaffold.files_written.len()
        ),
        StageOutcome::Skipped { reason } => println!("scaffold:   skipped ({})", reason),
        StageOutcome::Failed(err) => println!("scaffold:   failed: {}", err),
    }
    match &report.repository {
        StageOutcome::Succeeded(repo) => println!("repository: ok ({})", repo.web_url),
        StageOutcome::Skipped { reason } => println!("repository: skipped ({})", reason),
        StageOutcome::Failed(err) => println!("repository: failed: {}", err),
    }
    match &report.service {
        StageOutcome::Succeeded(service) => {
            println!("service:    ok ({}, {})", service.id, service.status)
        }
        StageOutcome::Skipped { reason } => println!("service:    skipped ({})", reason),
        StageOutcome::Failed(err) => println!("service:    failed: {}", err),
    }
}
