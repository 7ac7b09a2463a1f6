// Declare the modules
pub mod analysis;
pub mod api;
pub mod cohort;
pub mod commands;
pub mod config;
pub mod error;
pub mod graph;
pub mod models;
pub mod renewal;
pub mod search;
pub mod state;

use crate::api::{AnalysisProvider, ConversationSource, GraphConversationSource, HttpDashboardApi};
use crate::config::DashboardConfig;
use crate::error::DashboardError;
use clap::{Parser, Subcommand};
use commands::DashboardSummary;
use models::Message;
use search::SearchResult;
use state::AppState;
use std::process::ExitCode;
use std::sync::Arc;

#[derive(Clone, Debug, Parser)]
#[command(name = "subscriber-dashboard", version, about = "Subscriber conversations dashboard")]
struct Args {
    #[clap(subcommand)]
    subcommand: Subcommands,

    /// Read conversations straight from the Graph API instead of the dashboard backend
    #[arg(long, global = true, default_value_t = false)]
    graph: bool,

    /// Print machine-readable JSON
    #[arg(long, global = true, default_value_t = false)]
    json: bool,
}

#[derive(Clone, Debug, Subcommand)]
enum Subcommands {
    /// Subscription statistics and renewal countdowns
    Stats,
    /// Search every message by text or sender
    Search { query: String },
    /// Ask the analysis endpoint about one conversation
    Analyze { conversation_id: String },
    /// Store the Graph API access token in the OS keyring
    StoreToken { token: String },
}

pub fn run() -> ExitCode {
    // Initialize logging
    env_logger::init();
    let args = Args::parse();

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            log::error!("Failed to start async runtime: {:?}", e);
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(execute(args)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e);
            ExitCode::FAILURE
        }
    }
}

async fn execute(args: Args) -> Result<(), DashboardError> {
    let config = DashboardConfig::from_env();

    if let Subcommands::StoreToken { token } = &args.subcommand {
        config::set_access_token_in_keyring(&config, token)
            .map_err(|e| DashboardError::Config(format!("{:#}", e)))?;
        println!("Access token stored. Set GRAPH_ACCESS_TOKEN_REF=keyring to use it.");
        return Ok(());
    }

    let backend = Arc::new(HttpDashboardApi::from_config(&config));
    let source: Arc<dyn ConversationSource> = if args.graph {
        Arc::new(GraphConversationSource::new(config.clone())) as Arc<dyn ConversationSource>
    } else {
        backend.clone() as Arc<dyn ConversationSource>
    };
    let analysis_provider: Arc<dyn AnalysisProvider> = backend;
    let app_state = AppState::new(source, analysis_provider);

    // Every run starts with a fresh fetch; nothing is cached between runs
    commands::load_conversations(&app_state).await?;

    match args.subcommand {
        Subcommands::Stats => {
            let summary = commands::dashboard_stats(&app_state, chrono::Utc::now()).await?;
            if args.json {
                print_json(&summary);
            } else {
                print_summary(&summary);
            }
        }
        Subcommands::Search { query } => {
            let results = commands::search_messages(&app_state, &query).await?;
            if args.json {
                print_json(&results);
            } else {
                print_search_results(&results);
            }
        }
        Subcommands::Analyze { conversation_id } => {
            let handle = commands::analyze_conversation(&app_state, &conversation_id).await?;
            let analysis = commands::await_analysis(&app_state, handle).await?;
            if args.json {
                print_json(&commands::analysis_status(&app_state).await);
            } else {
                println!("{}", analysis);
            }
        }
        Subcommands::StoreToken { .. } => {}
    }
    Ok(())
}

fn print_json<T: serde::Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => log::error!("Failed to serialize output: {:?}", e),
    }
}

fn print_summary(summary: &DashboardSummary) {
    println!("Active subscriptions: {}", summary.subscribed_count);
    println!("Renewing next week:   {}", summary.renewing_within_week_count);
    println!("Conversion rate:      {:.1}%", summary.conversion_rate_percent);
    println!("Potential leads:      {}", summary.unsubscribed_count);

    println!();
    println!("Active subscribers ({})", summary.subscribed_count);
    for subscriber in &summary.subscribers {
        let marker = if subscriber.is_expiring_soon { "!" } else { " " };
        println!(
            " {} {:<32} {:>4} days remaining  [{}]",
            marker, subscriber.conversation_name, subscriber.days_remaining, subscriber.conversation_id
        );
        print_card_details(subscriber.last_user_id.as_deref(), &subscriber.recent_messages);
    }

    println!();
    println!("Potential leads ({})", summary.unsubscribed_count);
    for lead in &summary.leads {
        let last_active = lead
            .last_active
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "never".to_string());
        println!(
            "   {:<32} last active {}  [{}]",
            lead.conversation_name, last_active, lead.conversation_id
        );
        print_card_details(lead.last_user_id.as_deref(), &lead.recent_messages);
    }
}

fn print_card_details(last_user_id: Option<&str>, recent_messages: &[Message]) {
    if let Some(user_id) = last_user_id {
        println!("     user id {}", user_id);
    }
    for message in recent_messages {
        println!(
            "     {} ({}): {}",
            message.sender,
            message.created_at.format("%Y-%m-%d %H:%M"),
            message.text
        );
    }
}

fn print_search_results(results: &[SearchResult]) {
    println!("Found {} matching messages", results.len());
    for result in results {
        println!(
            "{} in {} · {}",
            result.message.sender,
            result.conversation_name,
            result.message.created_at.format("%Y-%m-%d %H:%M")
        );
        println!("    {}", result.message.text);
    }
}
