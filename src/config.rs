use anyhow::{Context, Result};
use keyring::Entry;

const DEFAULT_API_URL: &str = "http://127.0.0.1:8000";
const DEFAULT_PAGE_OWNER: &str = "Ai Egypt";
// "received" - what subscribers send once they've paid
const DEFAULT_SUBSCRIPTION_KEYWORD: &str = "وصل";
const DEFAULT_GRAPH_PAGE_ID: &str = "145247595328632";
const DEFAULT_GRAPH_API_VERSION: &str = "v22.0";
const DEFAULT_ACCESS_TOKEN_REF: &str = "env:FACEBOOK_ACCESS_TOKEN";

const KEYRING_SERVICE: &str = "subscriber_dashboard_graph_token";

// Runtime settings, read from the environment (and `.env` if present)
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DashboardConfig {
    pub api_url: String, // Dashboard backend base URL
    pub page_owner: String, // Display name the page replies under
    pub subscription_keyword: String,
    pub graph_page_id: String,
    pub graph_api_version: String,
    // 'env:NAME' or 'keyring'
    pub access_token_ref: String,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            page_owner: DEFAULT_PAGE_OWNER.to_string(),
            subscription_keyword: DEFAULT_SUBSCRIPTION_KEYWORD.to_string(),
            graph_page_id: DEFAULT_GRAPH_PAGE_ID.to_string(),
            graph_api_version: DEFAULT_GRAPH_API_VERSION.to_string(),
            access_token_ref: DEFAULT_ACCESS_TOKEN_REF.to_string(),
        }
    }
}

impl DashboardConfig {
    /// Loads `.env` (if any) and builds the config from the process environment.
    pub fn from_env() -> Self {
        match dotenvy::dotenv() {
            Ok(path) => log::debug!("Loaded environment from {}", path.display()),
            Err(e) if e.not_found() => log::debug!("No .env file found"),
            Err(e) => log::warn!("Failed to load .env file: {}", e),
        }
        Self::from_lookup(|key| dotenvy::var(key).ok())
    }

    /// Builds the config from an arbitrary variable lookup, falling back to defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let get = |key: &str, default: String| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
                .unwrap_or(default)
        };

        Self {
            api_url: get("DASHBOARD_API_URL", defaults.api_url),
            page_owner: get("DASHBOARD_PAGE_OWNER", defaults.page_owner),
            subscription_keyword: get("DASHBOARD_SUBSCRIPTION_KEYWORD", defaults.subscription_keyword),
            graph_page_id: get("GRAPH_PAGE_ID", defaults.graph_page_id),
            graph_api_version: get("GRAPH_API_VERSION", defaults.graph_api_version),
            access_token_ref: get("GRAPH_ACCESS_TOKEN_REF", defaults.access_token_ref),
        }
    }
}

// --- Access Token Retrieval ---

/// Retrieves the Graph API access token.
/// The `access_token_ref` decides whether it comes from an environment
/// variable or the OS keyring.
pub fn get_access_token(config: &DashboardConfig) -> Result<String> {
    let ref_str = config.access_token_ref.as_str();
    if let Some(env_var_name) = ref_str.strip_prefix("env:") {
        log::debug!("Retrieving access token from environment variable: {}", env_var_name);
        return dotenvy::var(env_var_name).context(format!(
            "Failed to get access token from environment variable '{}'",
            env_var_name
        ));
    }
    if ref_str == "keyring" {
        let entry = Entry::new(KEYRING_SERVICE, &config.graph_page_id)
            .context("Failed to create keyring entry")?;
        log::debug!("Retrieving access token from keyring for page: {}", config.graph_page_id);
        return entry.get_password().context(format!(
            "Failed to get access token from keyring for page '{}'",
            config.graph_page_id
        ));
    }
    Err(anyhow::anyhow!("Unsupported access token reference: {}", ref_str))
}

/// Stores the Graph API access token in the OS keyring.
pub fn set_access_token_in_keyring(config: &DashboardConfig, token: &str) -> Result<()> {
    let entry = Entry::new(KEYRING_SERVICE, &config.graph_page_id)
        .context("Failed to create keyring entry for setting password")?;
    log::info!("Setting access token in keyring for page: {}", config.graph_page_id);
    entry.set_password(token).context(format!(
        "Failed to set access token in keyring for page '{}'",
        config.graph_page_id
    ))?;

    // A store that doesn't persist must not look like success
    let stored = Entry::new(KEYRING_SERVICE, &config.graph_page_id)
        .and_then(|entry| entry.get_password())
        .context(format!(
            "Access token for page '{}' could not be read back from the keyring",
            config.graph_page_id
        ))?;
    if stored != token {
        return Err(anyhow::anyhow!(
            "The keyring returned a different access token for page '{}'",
            config.graph_page_id
        ));
    }
    Ok(())
}
