use crate::config::{self, DashboardConfig};
use crate::graph::{GraphConversationsPage, Normalizer};
use crate::models::{AnalysisRequest, AnalysisResponse, Conversation, ConversationsEnvelope};
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, Response};

const GRAPH_BASE_URL: &str = "https://graph.facebook.com";
const GRAPH_CONVERSATION_FIELDS: &str = "messages{message,from,created_time}";

// Where the dashboard gets its conversations from
#[async_trait]
pub trait ConversationSource: Send + Sync {
    async fn fetch_conversations(&self) -> Result<Vec<Conversation>>;
}

// The remote analysis endpoint; returns the analysis text
#[async_trait]
pub trait AnalysisProvider: Send + Sync {
    async fn analyze_conversation(&self, request: &AnalysisRequest) -> Result<String>;
}

// --- Dashboard Backend Implementation ---

pub struct HttpDashboardApi {
    client: Client,
    base_url: String,
}

impl HttpDashboardApi {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
        }
    }

    pub fn from_config(config: &DashboardConfig) -> Self {
        Self::new(config.api_url.clone())
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path.trim_start_matches('/'))
    }
}

#[async_trait]
impl ConversationSource for HttpDashboardApi {
    async fn fetch_conversations(&self) -> Result<Vec<Conversation>> {
        let request_url = self.endpoint("fb/");
        log::info!("Fetching conversations from {}", request_url);

        let response = self.client
            .get(&request_url)
            .send()
            .await
            .context("Failed to send conversations request")?;
        let response = ensure_success(response, "Conversations request").await?;

        let envelope: ConversationsEnvelope = response
            .json()
            .await
            .context("Failed to decode conversations response")?;
        log::info!("Fetched {} conversations", envelope.conversations.len());
        Ok(envelope.conversations)
    }
}

#[async_trait]
impl AnalysisProvider for HttpDashboardApi {
    async fn analyze_conversation(&self, request: &AnalysisRequest) -> Result<String> {
        let request_url = self.endpoint("analyze-messages/");
        log::info!(
            "Sending analysis request for conversation {} ({} messages) to {}",
            request.conversation_id,
            request.messages.len(),
            request_url
        );

        let response = self.client
            .post(&request_url)
            .json(request)
            .send()
            .await
            .context("Failed to send analysis request")?;
        let response = ensure_success(response, "Analysis request").await?;

        let body: AnalysisResponse = response
            .json()
            .await
            .context("Failed to decode analysis response")?;
        Ok(body.analysis)
    }
}

// --- Graph API Implementation ---

/// Reads conversations straight from the page inbox instead of the dashboard backend.
pub struct GraphConversationSource {
    client: Client,
    config: DashboardConfig,
    normalizer: Normalizer,
}

impl GraphConversationSource {
    pub fn new(config: DashboardConfig) -> Self {
        let normalizer = Normalizer::new(
            config.page_owner.clone(),
            config.subscription_keyword.clone(),
        );
        Self {
            client: Client::new(),
            config,
            normalizer,
        }
    }

    fn conversations_url(&self) -> String {
        format!(
            "{}/{}/{}/conversations",
            GRAPH_BASE_URL, self.config.graph_api_version, self.config.graph_page_id
        )
    }
}

#[async_trait]
impl ConversationSource for GraphConversationSource {
    async fn fetch_conversations(&self) -> Result<Vec<Conversation>> {
        let access_token = config::get_access_token(&self.config)?;
        let request_url = self.conversations_url();
        // Never log the token
        log::info!("Fetching conversations from Graph API: {}", request_url);

        let response = self.client
            .get(&request_url)
            .query(&[
                ("fields", GRAPH_CONVERSATION_FIELDS),
                ("access_token", access_token.as_str()),
            ])
            .send()
            .await
            .context("Failed to send Graph API conversations request")?;
        let response = ensure_success(response, "Graph API conversations request").await?;

        let page: GraphConversationsPage = response
            .json()
            .await
            .context("Failed to decode Graph API conversations response")?;
        let conversations = self.normalizer.normalize_page(page)?;
        log::info!("Fetched {} conversations from Graph API", conversations.len());
        Ok(conversations)
    }
}

// Turns a non-2xx response into an error carrying the status and body
async fn ensure_success(response: Response, what: &str) -> Result<Response> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status();
    let error_body = response.text().await.unwrap_or_else(|_| "<Failed to read error body>".to_string());
    log::error!("{} failed with status {}: {}", what, status, error_body);
    Err(anyhow::anyhow!("{} failed with status {}: {}", what, status, error_body))
}
