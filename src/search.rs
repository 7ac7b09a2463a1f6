use serde::Serialize;

use crate::models::{Conversation, Message};

/// A matching message annotated with the conversation it came from.
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct SearchResult {
    #[serde(flatten)]
    pub message: Message,
    pub conversation_name: String,
    pub conversation_id: String,
}

/// Case-insensitive substring search over message text and sender names.
///
/// A blank query matches nothing. Results follow conversation order, then
/// message order within each conversation; there is no ranking.
pub fn search_messages(conversations: &[Conversation], query: &str) -> Vec<SearchResult> {
    if query.trim().is_empty() {
        return Vec::new();
    }

    let needle = query.to_lowercase();
    conversations
        .iter()
        .flat_map(|conversation| {
            conversation
                .messages
                .iter()
                .filter(|message| matches(message, &needle))
                .map(move |message| SearchResult {
                    message: message.clone(),
                    conversation_name: conversation.name.clone(),
                    conversation_id: conversation.id.clone(),
                })
        })
        .collect()
}

fn matches(message: &Message, needle: &str) -> bool {
    message.text.to_lowercase().contains(needle) || message.sender.to_lowercase().contains(needle)
}
