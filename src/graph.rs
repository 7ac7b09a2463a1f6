//! Raw Graph API conversation payloads and their normalization into
//! [`Conversation`] records.

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::models::{timestamp, Conversation, Message};

/// Name given to conversations where only the page owner ever spoke.
pub const UNKNOWN_CONVERSATION_NAME: &str = "Unknown";

// Top-level response of `/{page_id}/conversations`
#[derive(Deserialize, Debug, Default)]
pub struct GraphConversationsPage {
    #[serde(default)]
    pub data: Vec<GraphConversation>,
}

#[derive(Deserialize, Debug)]
pub struct GraphConversation {
    pub id: String,
    #[serde(default)]
    pub messages: Option<GraphMessages>,
}

#[derive(Deserialize, Debug, Default)]
pub struct GraphMessages {
    #[serde(default)]
    pub data: Vec<GraphMessage>,
}

#[derive(Deserialize, Debug)]
pub struct GraphMessage {
    // Attachments and stickers come without text
    #[serde(default)]
    pub message: Option<String>,
    pub from: GraphSender,
    pub created_time: String,
}

#[derive(Deserialize, Debug)]
pub struct GraphSender {
    pub name: String,
    pub id: String,
}

// Rules for turning raw Graph conversations into dashboard conversations
#[derive(Clone, Debug)]
pub struct Normalizer {
    pub page_owner: String,
    pub subscription_keyword: String,
}

impl Normalizer {
    pub fn new(page_owner: impl Into<String>, subscription_keyword: impl Into<String>) -> Self {
        Self {
            page_owner: page_owner.into(),
            subscription_keyword: subscription_keyword.into().to_lowercase(),
        }
    }

    pub fn normalize_page(&self, page: GraphConversationsPage) -> Result<Vec<Conversation>> {
        page.data
            .into_iter()
            .map(|conversation| self.normalize(conversation))
            .collect()
    }

    /// Names the conversation after the first sender that isn't the page
    /// owner, and dates the subscription at the last message (in payload
    /// order) mentioning the subscription keyword.
    pub fn normalize(&self, conversation: GraphConversation) -> Result<Conversation> {
        let raw_messages = conversation.messages.unwrap_or_default().data;

        let mut name = None;
        let mut subscription_start = None;
        let mut messages = Vec::with_capacity(raw_messages.len());

        for raw in raw_messages {
            let created_at = timestamp::parse(&raw.created_time).with_context(|| {
                format!("Invalid created_time in conversation {}", conversation.id)
            })?;
            let text = raw.message.unwrap_or_default();

            if name.is_none() && raw.from.name != self.page_owner {
                name = Some(raw.from.name.clone());
            }
            if !self.subscription_keyword.is_empty()
                && text.to_lowercase().contains(&self.subscription_keyword)
            {
                subscription_start = Some(created_at);
            }

            messages.push(Message {
                sender: raw.from.name,
                text,
                created_at,
                user_id: Some(raw.from.id),
            });
        }

        Ok(Conversation {
            id: conversation.id,
            name: name.unwrap_or_else(|| UNKNOWN_CONVERSATION_NAME.to_string()),
            subscription_start,
            messages,
        })
    }
}
