//! Lifecycle of the "analyze conversation" request.
//!
//! The controller is a plain state machine: it never performs I/O itself.
//! `select` hands back the request to dispatch, and whoever performs the call
//! reports the outcome through `resolve` using the request id it was given.
//! At most one request is in flight; responses carrying any other id are
//! stale and dropped.

use serde::Serialize;
use uuid::Uuid;

use crate::models::{AnalysisRequest, Conversation};

#[derive(Serialize, Clone, Debug, PartialEq, Eq, Default)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AnalysisState {
    #[default]
    Idle,
    Analyzing {
        conversation_id: String,
    },
    Completed {
        conversation_id: String,
        analysis: String,
    },
    Failed {
        conversation_id: String,
        error: String,
    },
}

impl AnalysisState {
    /// Conversation the state refers to, if any.
    pub fn conversation_id(&self) -> Option<&str> {
        match self {
            AnalysisState::Idle => None,
            AnalysisState::Analyzing { conversation_id }
            | AnalysisState::Completed { conversation_id, .. }
            | AnalysisState::Failed { conversation_id, .. } => Some(conversation_id),
        }
    }
}

/// A request the caller must now send to the analysis endpoint.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PendingAnalysis {
    pub request_id: Uuid,
    pub request: AnalysisRequest,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Selection {
    Dispatched(PendingAnalysis),
    /// Another analysis is still running; nothing was dispatched.
    Rejected { in_flight: String },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Resolution {
    Applied,
    Stale,
}

#[derive(Debug, Default)]
pub struct AnalysisController {
    state: AnalysisState,
    in_flight: Option<Uuid>,
}

impl AnalysisController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &AnalysisState {
        &self.state
    }

    pub fn selected_conversation_id(&self) -> Option<&str> {
        self.state.conversation_id()
    }

    pub fn is_busy(&self) -> bool {
        matches!(self.state, AnalysisState::Analyzing { .. })
    }

    /// True while `conversation_id` is the one being analyzed.
    pub fn is_analyzing(&self, conversation_id: &str) -> bool {
        matches!(&self.state, AnalysisState::Analyzing { conversation_id: id } if id == conversation_id)
    }

    pub fn result(&self) -> Option<&str> {
        match &self.state {
            AnalysisState::Completed { analysis, .. } => Some(analysis),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match &self.state {
            AnalysisState::Failed { error, .. } => Some(error),
            _ => None,
        }
    }

    /// Starts analyzing `conversation` unless another analysis is in flight.
    pub fn select(&mut self, conversation: &Conversation) -> Selection {
        if let AnalysisState::Analyzing { conversation_id } = &self.state {
            log::warn!(
                "Ignoring analysis request for {}: {} is still being analyzed",
                conversation.id,
                conversation_id
            );
            return Selection::Rejected {
                in_flight: conversation_id.clone(),
            };
        }

        let request_id = Uuid::new_v4();
        self.in_flight = Some(request_id);
        self.state = AnalysisState::Analyzing {
            conversation_id: conversation.id.clone(),
        };
        log::info!(
            "Analysis {} started for conversation {} ({} messages)",
            request_id,
            conversation.id,
            conversation.messages.len()
        );

        Selection::Dispatched(PendingAnalysis {
            request_id,
            request: AnalysisRequest::for_conversation(conversation),
        })
    }

    /// Applies the outcome of request `request_id`. Outcomes for anything but
    /// the in-flight request leave the state untouched.
    pub fn resolve(&mut self, request_id: Uuid, outcome: Result<String, String>) -> Resolution {
        if self.in_flight != Some(request_id) {
            log::warn!("Discarding stale analysis response {}", request_id);
            return Resolution::Stale;
        }

        let conversation_id = match &self.state {
            AnalysisState::Analyzing { conversation_id } => conversation_id.clone(),
            AnalysisState::Idle | AnalysisState::Completed { .. } | AnalysisState::Failed { .. } => {
                log::error!("Analysis {} resolved outside of the analyzing state", request_id);
                self.in_flight = None;
                return Resolution::Stale;
            }
        };

        self.in_flight = None;
        self.state = match outcome {
            Ok(analysis) => {
                log::info!("Analysis {} completed for conversation {}", request_id, conversation_id);
                AnalysisState::Completed {
                    conversation_id,
                    analysis,
                }
            }
            Err(error) => {
                log::error!(
                    "Analysis {} failed for conversation {}: {}",
                    request_id,
                    conversation_id,
                    error
                );
                AnalysisState::Failed {
                    conversation_id,
                    error,
                }
            }
        };
        Resolution::Applied
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conversation(id: &str) -> Conversation {
        Conversation {
            id: id.to_string(),
            name: id.to_uppercase(),
            subscription_start: None,
            messages: Vec::new(),
        }
    }

    fn dispatched(selection: Selection) -> PendingAnalysis {
        match selection {
            Selection::Dispatched(pending) => pending,
            Selection::Rejected { in_flight } => panic!("unexpectedly rejected, {} in flight", in_flight),
        }
    }

    #[test]
    fn starts_idle() {
        let controller = AnalysisController::new();
        assert_eq!(controller.state(), &AnalysisState::Idle);
        assert!(!controller.is_busy());
        assert!(controller.selected_conversation_id().is_none());
    }

    #[test]
    fn select_dispatches_request_for_conversation() {
        let mut controller = AnalysisController::new();
        let pending = dispatched(controller.select(&conversation("x")));

        assert_eq!(pending.request.conversation_id, "x");
        assert!(controller.is_analyzing("x"));
        assert!(!controller.is_analyzing("y"));
        assert_eq!(controller.selected_conversation_id(), Some("x"));
    }

    #[test]
    fn success_completes() {
        let mut controller = AnalysisController::new();
        let pending = dispatched(controller.select(&conversation("x")));

        let resolution = controller.resolve(pending.request_id, Ok("buy more".to_string()));
        assert_eq!(resolution, Resolution::Applied);
        assert_eq!(
            controller.state(),
            &AnalysisState::Completed {
                conversation_id: "x".to_string(),
                analysis: "buy more".to_string(),
            }
        );
        assert_eq!(controller.result(), Some("buy more"));
        assert!(controller.error().is_none());
    }

    #[test]
    fn failure_is_scoped_to_selection() {
        let mut controller = AnalysisController::new();
        let pending = dispatched(controller.select(&conversation("x")));

        controller.resolve(pending.request_id, Err("Analysis failed".to_string()));
        assert_eq!(controller.error(), Some("Analysis failed"));
        assert_eq!(controller.selected_conversation_id(), Some("x"));
        assert!(!controller.is_busy());
    }

    #[test]
    fn selection_while_analyzing_is_rejected() {
        let mut controller = AnalysisController::new();
        dispatched(controller.select(&conversation("y")));

        assert_eq!(
            controller.select(&conversation("x")),
            Selection::Rejected {
                in_flight: "y".to_string()
            }
        );
        // Re-selecting the same conversation is rejected too
        assert_eq!(
            controller.select(&conversation("y")),
            Selection::Rejected {
                in_flight: "y".to_string()
            }
        );
        assert!(controller.is_analyzing("y"));
    }

    #[test]
    fn new_selection_after_failure_clears_error() {
        let mut controller = AnalysisController::new();
        let first = dispatched(controller.select(&conversation("x")));
        controller.resolve(first.request_id, Err("boom".to_string()));

        let retry = dispatched(controller.select(&conversation("x")));
        assert_ne!(retry.request_id, first.request_id);
        assert!(controller.error().is_none());
        assert!(controller.is_analyzing("x"));
    }

    #[test]
    fn late_duplicate_response_does_not_override_newer_selection() {
        let mut controller = AnalysisController::new();
        let first = dispatched(controller.select(&conversation("y")));
        controller.resolve(first.request_id, Ok("about y".to_string()));
        dispatched(controller.select(&conversation("x")));

        let resolution = controller.resolve(first.request_id, Ok("about y again".to_string()));
        assert_eq!(resolution, Resolution::Stale);
        assert!(controller.is_analyzing("x"));
    }

    #[test]
    fn superseded_request_is_discarded_when_guard_is_bypassed() {
        let mut controller = AnalysisController::new();
        let stale = dispatched(controller.select(&conversation("y")));

        // Force a second dispatch as a front end ignoring the guard would
        controller.state = AnalysisState::Idle;
        let current = dispatched(controller.select(&conversation("x")));

        assert_eq!(
            controller.resolve(stale.request_id, Ok("about y".to_string())),
            Resolution::Stale
        );
        assert!(controller.is_analyzing("x"));

        controller.resolve(current.request_id, Ok("about x".to_string()));
        assert_eq!(
            controller.state(),
            &AnalysisState::Completed {
                conversation_id: "x".to_string(),
                analysis: "about x".to_string(),
            }
        );
    }

    #[test]
    fn state_serializes_with_status_tag() {
        let state = AnalysisState::Failed {
            conversation_id: "x".to_string(),
            error: "Analysis failed".to_string(),
        };
        let value = serde_json::to_value(&state).unwrap();
        assert_eq!(value["status"], "failed");
        assert_eq!(value["conversation_id"], "x");
    }
}
