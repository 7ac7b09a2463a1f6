use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::renewal::RenewalWindow;

// A single message inside a conversation. Field names follow the backend payload.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Message {
    pub sender: String,
    #[serde(rename = "message", default)]
    pub text: String,
    #[serde(rename = "created_time", with = "timestamp")]
    pub created_at: DateTime<Utc>,
    // Not every source reports the sender id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

// A subscriber conversation. Messages are ordered most-recent-first.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Conversation {
    #[serde(rename = "conversation_id")]
    pub id: String,
    #[serde(rename = "conversation_name")]
    pub name: String,
    // Absent (or null) means the subscriber never subscribed
    #[serde(rename = "subscription_date", default, with = "timestamp::option")]
    pub subscription_start: Option<DateTime<Utc>>,
    #[serde(default)]
    pub messages: Vec<Message>,
}

impl Conversation {
    pub fn is_subscribed(&self) -> bool {
        self.subscription_start.is_some()
    }

    /// Most recent message, if the conversation has any.
    pub fn last_message(&self) -> Option<&Message> {
        self.messages.first()
    }

    /// Up to `count` of the most recent messages.
    pub fn recent_messages(&self, count: usize) -> &[Message] {
        &self.messages[..count.min(self.messages.len())]
    }

    /// Renewal window relative to `now`, or `None` for unsubscribed conversations.
    pub fn renewal_window(&self, now: DateTime<Utc>) -> Option<RenewalWindow> {
        self.subscription_start
            .map(|start| RenewalWindow::compute(start, now))
    }
}

// Response body of the conversations endpoint
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ConversationsEnvelope {
    pub conversations: Vec<Conversation>,
}

// Body sent to the analysis endpoint
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct AnalysisRequest {
    pub conversation_id: String,
    pub messages: Vec<Message>,
}

impl AnalysisRequest {
    pub fn for_conversation(conversation: &Conversation) -> Self {
        Self {
            conversation_id: conversation.id.clone(),
            messages: conversation.messages.clone(),
        }
    }
}

// Successful analysis response
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct AnalysisResponse {
    pub analysis: String,
}

/// Serde helpers for the timestamp formats seen in conversation payloads.
///
/// Accepts RFC 3339 (`2025-02-20T10:15:30+00:00`, `...Z`), the compact offset
/// form the Graph API emits (`2025-02-20T10:15:30+0000`) and bare dates
/// (taken as midnight UTC). Everything is normalized to UTC and written back
/// as RFC 3339.
pub mod timestamp {
    use chrono::{DateTime, NaiveDate, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    const COMPACT_OFFSET_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%z", "%Y-%m-%dT%H:%M:%S%.f%z"];

    pub fn parse(raw: &str) -> anyhow::Result<DateTime<Utc>> {
        let raw = raw.trim();
        if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
            return Ok(parsed.with_timezone(&Utc));
        }
        for format in COMPACT_OFFSET_FORMATS {
            if let Ok(parsed) = DateTime::parse_from_str(raw, format) {
                return Ok(parsed.with_timezone(&Utc));
            }
        }
        if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
            if let Some(midnight) = date.and_hms_opt(0, 0, 0) {
                return Ok(midnight.and_utc());
            }
        }
        Err(anyhow::anyhow!("Unrecognized timestamp format: '{}'", raw))
    }

    pub fn serialize<S: Serializer>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_rfc3339())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).map_err(serde::de::Error::custom)
    }

    pub mod option {
        use chrono::{DateTime, Utc};
        use serde::{Deserialize, Deserializer, Serializer};

        pub fn serialize<S: Serializer>(
            value: &Option<DateTime<Utc>>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match value {
                Some(value) => super::serialize(value, serializer),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<DateTime<Utc>>, D::Error> {
            match Option::<String>::deserialize(deserializer)? {
                // The backend sometimes sends an empty string instead of null
                Some(raw) if raw.trim().is_empty() => Ok(None),
                Some(raw) => super::parse(&raw).map(Some).map_err(serde::de::Error::custom),
                None => Ok(None),
            }
        }
    }
}
