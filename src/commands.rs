// Operations exposed to the front end

use crate::analysis::{AnalysisState, Resolution, Selection};
use crate::cohort::CohortStats;
use crate::error::{DashboardError, DashboardResult};
use crate::models::{Conversation, Message};
use crate::search::{self, SearchResult};
use crate::state::AppState;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// How many messages a conversation card previews.
pub const RECENT_MESSAGE_COUNT: usize = 3;

// Owned snapshot of the cohort statistics, ready for display
#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct DashboardSummary {
    pub total_count: usize,
    pub subscribed_count: usize,
    pub unsubscribed_count: usize,
    pub renewing_within_week_count: usize,
    pub conversion_rate_percent: f64,
    pub subscribers: Vec<SubscriberSummary>,
    pub leads: Vec<LeadSummary>,
}

#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct SubscriberSummary {
    pub conversation_id: String,
    pub conversation_name: String,
    pub days_remaining: i64,
    pub is_expiring_soon: bool,
    pub last_active: Option<DateTime<Utc>>,
    pub last_user_id: Option<String>,
    pub recent_messages: Vec<Message>,
}

#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct LeadSummary {
    pub conversation_id: String,
    pub conversation_name: String,
    pub last_active: Option<DateTime<Utc>>,
    pub last_user_id: Option<String>,
    pub recent_messages: Vec<Message>,
}

/// Fetches a fresh conversation set and replaces the loaded one.
pub async fn load_conversations(state: &AppState) -> DashboardResult<Arc<Vec<Conversation>>> {
    log::info!("Loading conversations");
    let conversations = match state.source.fetch_conversations().await {
        Ok(conversations) => Arc::new(conversations),
        Err(e) => {
            log::error!("Failed to load conversations: {:?}", e);
            return Err(DashboardError::FetchFailure(format!("{:#}", e)));
        }
    };

    *state.conversations.lock().await = Some(conversations.clone());
    Ok(conversations)
}

/// The currently loaded conversation set.
pub async fn loaded_conversations(state: &AppState) -> DashboardResult<Arc<Vec<Conversation>>> {
    state
        .conversations
        .lock()
        .await
        .clone()
        .ok_or(DashboardError::NotLoaded)
}

/// Cohort statistics for the loaded conversations, as seen at `now`.
pub async fn dashboard_stats(state: &AppState, now: DateTime<Utc>) -> DashboardResult<DashboardSummary> {
    let conversations = loaded_conversations(state).await?;
    let stats = CohortStats::compute(&conversations, now);
    log::debug!(
        "Computed stats: {} subscribed, {} leads, {} renewing this week",
        stats.subscribed_count,
        stats.unsubscribed_count,
        stats.renewing_within_week_count
    );

    let subscribers = stats
        .renewal_windows(now)
        .map(|(conversation, window)| SubscriberSummary {
            conversation_id: conversation.id.clone(),
            conversation_name: conversation.name.clone(),
            days_remaining: window.days_remaining,
            is_expiring_soon: window.is_expiring_soon,
            last_active: conversation.last_message().map(|m| m.created_at),
            last_user_id: last_user_id(conversation),
            recent_messages: conversation.recent_messages(RECENT_MESSAGE_COUNT).to_vec(),
        })
        .collect();
    let leads = stats
        .unsubscribed
        .iter()
        .map(|conversation| LeadSummary {
            conversation_id: conversation.id.clone(),
            conversation_name: conversation.name.clone(),
            last_active: conversation.last_message().map(|m| m.created_at),
            last_user_id: last_user_id(conversation),
            recent_messages: conversation.recent_messages(RECENT_MESSAGE_COUNT).to_vec(),
        })
        .collect();

    Ok(DashboardSummary {
        total_count: stats.total_count(),
        subscribed_count: stats.subscribed_count,
        unsubscribed_count: stats.unsubscribed_count,
        renewing_within_week_count: stats.renewing_within_week_count,
        conversion_rate_percent: stats.conversion_rate_percent,
        subscribers,
        leads,
    })
}

fn last_user_id(conversation: &Conversation) -> Option<String> {
    conversation.last_message().and_then(|m| m.user_id.clone())
}

/// Searches every loaded message for `query`.
pub async fn search_messages(state: &AppState, query: &str) -> DashboardResult<Vec<SearchResult>> {
    let conversations = loaded_conversations(state).await?;
    let results = search::search_messages(&conversations, query);
    log::info!("Search for {:?} matched {} messages", query, results.len());
    Ok(results)
}

/// Starts analyzing a loaded conversation in the background.
///
/// Returns the handle of the task that performs the request and records its
/// outcome in the controller. Fails with `AnalysisBusy` if another analysis
/// is still in flight.
pub async fn analyze_conversation(
    state: &AppState,
    conversation_id: &str,
) -> DashboardResult<JoinHandle<Resolution>> {
    log::info!("Requested analysis of conversation {}", conversation_id);
    let conversations = loaded_conversations(state).await?;
    let conversation = conversations
        .iter()
        .find(|c| c.id == conversation_id)
        .ok_or_else(|| DashboardError::UnknownConversation(conversation_id.to_string()))?;

    // Lock only long enough to select; never across the remote call
    let pending = match state.analysis.lock().await.select(conversation) {
        Selection::Dispatched(pending) => pending,
        Selection::Rejected { in_flight } => return Err(DashboardError::AnalysisBusy { in_flight }),
    };

    let app_state_clone = state.clone();
    let handle = tokio::spawn(async move {
        log::debug!("BG Task [{}]: sending analysis request", pending.request_id);
        let outcome = app_state_clone
            .analysis_provider
            .analyze_conversation(&pending.request)
            .await
            .map_err(|e| format!("{:#}", e));

        let resolution = app_state_clone
            .analysis
            .lock()
            .await
            .resolve(pending.request_id, outcome);
        log::debug!("BG Task [{}]: finished ({:?})", pending.request_id, resolution);
        resolution
    });

    Ok(handle)
}

/// Current state of the analysis panel.
pub async fn analysis_status(state: &AppState) -> AnalysisState {
    state.analysis.lock().await.state().clone()
}

/// Waits for a background analysis and reports its outcome the way the
/// front end shows it.
pub async fn await_analysis(state: &AppState, handle: JoinHandle<Resolution>) -> DashboardResult<String> {
    if let Err(e) = handle.await {
        log::error!("Analysis task did not finish: {:?}", e);
        return Err(DashboardError::AnalysisFailure(e.to_string()));
    }

    match analysis_status(state).await {
        AnalysisState::Completed { analysis, .. } => Ok(analysis),
        AnalysisState::Failed { error, .. } => Err(DashboardError::AnalysisFailure(error)),
        AnalysisState::Analyzing { conversation_id } => Err(DashboardError::AnalysisBusy {
            in_flight: conversation_id,
        }),
        AnalysisState::Idle => Err(DashboardError::AnalysisFailure(
            "No analysis has been started".to_string(),
        )),
    }
}
