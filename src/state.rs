use crate::analysis::AnalysisController;
use crate::api::{AnalysisProvider, ConversationSource};
use crate::models::Conversation;
use std::sync::Arc;
use tokio::sync::Mutex;

// Shared application state handed to commands and background tasks
#[derive(Clone)] // Allow cloning for background tasks
pub struct AppState {
    pub source: Arc<dyn ConversationSource>,
    pub analysis_provider: Arc<dyn AnalysisProvider>,
    // Result of the latest successful load; replaced wholesale on every fetch
    pub conversations: Arc<Mutex<Option<Arc<Vec<Conversation>>>>>,
    pub analysis: Arc<Mutex<AnalysisController>>,
}

impl AppState {
    pub fn new(source: Arc<dyn ConversationSource>, analysis_provider: Arc<dyn AnalysisProvider>) -> Self {
        Self {
            source,
            analysis_provider,
            conversations: Arc::new(Mutex::new(None)),
            analysis: Arc::new(Mutex::new(AnalysisController::new())),
        }
    }
}
