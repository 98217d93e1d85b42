use chrono::NaiveDateTime;

use crate::services::dialog::BookingFlow;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversationState {
    Idle,
    Booking,
}

impl ConversationState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConversationState::Idle => "idle",
            ConversationState::Booking => "booking",
        }
    }
}

/// Dialog-scoped state for one conversation. The in-flight booking flow, if
/// any, is owned here and dropped on confirmation, decline or cancellation.
#[derive(Debug)]
pub struct Conversation {
    pub id: String,
    pub flow: Option<BookingFlow>,
    pub last_activity: NaiveDateTime,
}

impl Conversation {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            flow: None,
            last_activity: chrono::Utc::now().naive_utc(),
        }
    }

    pub fn state(&self) -> ConversationState {
        if self.flow.is_some() {
            ConversationState::Booking
        } else {
            ConversationState::Idle
        }
    }
}
