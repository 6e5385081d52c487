//! xp-daemon - disqualification malus engine and XP queries

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use serde::de::DeserializeOwned;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use xp_daemon::{
    Args, BalanceService, Command, CommentEvent, EvaluationOutcome, GithubApi, LogFormat, MalusEngine,
    RestGithubClient, UnassignedEvent, XpCommandHandler,
};
use xp_ledger::{Ledger, SqliteLedgerStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    let args = Args::parse();
    init_tracing(&args);

    let settings = args.load_settings()?;
    let store = SqliteLedgerStore::open(&args.database)
        .with_context(|| format!("Failed to open ledger at {}", args.database.display()))?;
    let ledger = Ledger::new(Arc::new(store));

    let mut client = RestGithubClient::new(&args.github_api_url, args.github_token.clone())?;
    if let Some(url) = &args.github_graphql_url {
        client = client.with_graphql_url(url);
    }
    let github: Arc<dyn GithubApi> = Arc::new(client);

    match &args.command {
        Command::Evaluate { payload } => {
            let event: UnassignedEvent = read_payload(payload)?;
            let engine = MalusEngine::new(github, ledger, settings);
            match engine.evaluate_unassignment(&event).await {
                Ok(EvaluationOutcome::Skipped(reason)) => info!(?reason, "Evaluation skipped"),
                Ok(EvaluationOutcome::Applied(application)) => info!(
                    user_id = application.assignee.id,
                    malus = %application.malus,
                    total = %application.total,
                    sanction = ?application.sanction,
                    "Malus applied"
                ),
                Err(e) => {
                    error!(error = %e, "Evaluation failed");
                    return Err(e.into());
                }
            }
        }
        Command::Xp { payload } => {
            let event: CommentEvent = read_payload(payload)?;
            let handled = XpCommandHandler::new(github, ledger).handle(&event).await?;
            info!(handled, "XP command processed");
        }
        Command::Balance { users } => {
            let balances = BalanceService::new(github, ledger).lookup(users.as_slice()).await?;
            println!("{}", serde_json::to_string_pretty(&serde_json::json!({ "users": balances }))?);
        }
        Command::Total { user_id } => {
            let total = ledger.get_user_total(*user_id).await?;
            println!("{}", serde_json::to_string_pretty(&total)?);
        }
    }

    Ok(())
}

fn init_tracing(args: &Args) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!("xp_daemon={level},xp_ledger={level},info", level = args.log_level).into()
    });
    let registry = tracing_subscriber::registry().with(filter);
    match args.log_format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

fn read_payload<T: DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let raw = std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("Invalid payload in {}", path.display()))
}
