use thiserror::Error;

/// Errors surfaced to the front end by the dashboard commands.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DashboardError {
    #[error("Failed to load conversations: {0}")]
    FetchFailure(String),
    #[error("Analysis failed: {0}")]
    AnalysisFailure(String),
    #[error("Already analyzing conversation {in_flight}")]
    AnalysisBusy { in_flight: String },
    #[error("Conversation {0} not found")]
    UnknownConversation(String),
    #[error("Conversations have not been loaded yet")]
    NotLoaded,
    #[error("Configuration error: {0}")]
    Config(String),
}

impl DashboardError {
    /// Blocking errors replace the whole view; the others are scoped to one panel.
    pub fn is_blocking(&self) -> bool {
        matches!(self, DashboardError::FetchFailure(_) | DashboardError::Config(_))
    }
}

pub type DashboardResult<T> = Result<T, DashboardError>;
