use std::sync::Arc;

use crate::models::{AuditEvent, AuditKind, BookingRecord, Conversation, Intent};
use crate::services::ai::recognizer::IntentRecognizer;
use crate::services::audit::{self, AuditSink};

use super::engine::{BookingFlow, FlowOutcome, FlowStatus, SlotFillingEngine};
use super::interrupt::{Interruption, HELP_TEXT};

pub const GREETING: &str = "What can I help you with today?";
pub const NO_RECOGNIZER_NOTE: &str = "NOTE: No language recognizer is configured. To enable all capabilities, \
set LLM_PROVIDER to 'ollama' or 'groq' and restart the service.";
pub const FAREWELL: &str = "See you soon!";
pub const ACKNOWLEDGE: &str = "Good!";
pub const OFF_TOPIC: &str = "Sorry, I'm programmed to book flights. Please try to express your intent clearly.";
pub const NOT_UNDERSTOOD: &str = "Sorry, I didn't get that. Please try asking in a different way";
pub const SAVE_FAILED: &str =
    "Sorry, I couldn't save your booking just now. Please confirm it again in a moment.";

/// Replies produced by one turn, plus the record when the turn confirmed a
/// booking.
#[derive(Debug, Default, PartialEq)]
pub struct TurnOutcome {
    pub replies: Vec<String>,
    pub booking: Option<BookingRecord>,
}

pub fn confirmed_message(record: &BookingRecord) -> String {
    format!(
        "Your flight is confirmed for {} adult(s) and {} child(ren), from {} to {}, on {} and return on {}. \
         All of the booking details will be sent to you via email. Have a good flight!",
        record.adult_count.unwrap_or_default(),
        record.child_count.unwrap_or_default(),
        record.origin_city.as_deref().unwrap_or_default(),
        record.destination_city.as_deref().unwrap_or_default(),
        record.departure_date.as_deref().unwrap_or_default(),
        record.return_date.as_deref().unwrap_or_default(),
    )
}

pub fn unsupported_airports_warning(airports: &[String]) -> String {
    format!(
        "Sorry but the following airports are not supported: {}",
        airports.join(", ")
    )
}

/// Entry point for every user turn. Idle conversations are classified once;
/// a conversation with a booking in flight feeds the engine directly.
pub struct IntentRouter {
    recognizer: Option<Arc<dyn IntentRecognizer>>,
    engine: SlotFillingEngine,
    audit: Arc<dyn AuditSink>,
}

impl IntentRouter {
    pub fn new(
        recognizer: Option<Arc<dyn IntentRecognizer>>,
        engine: SlotFillingEngine,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            recognizer,
            engine,
            audit,
        }
    }

    pub fn has_recognizer(&self) -> bool {
        self.recognizer.is_some()
    }

    pub fn greet(&self) -> Vec<String> {
        let mut replies = Vec::new();
        if self.recognizer.is_none() {
            replies.push(NO_RECOGNIZER_NOTE.to_string());
        }
        replies.push(GREETING.to_string());
        replies
    }

    /// Puts a confirmed record back in front of the user after it failed
    /// to persist, so the next "yes" retries the save.
    pub fn reconfirm(&self, conversation: &mut Conversation, record: BookingRecord) -> Vec<String> {
        let mut replies = vec![SAVE_FAILED.to_string()];
        let flow = self.engine.reconfirm(&conversation.id, record, &mut replies);
        conversation.flow = Some(flow);
        replies
    }

    pub async fn route(&self, conversation: &mut Conversation, text: &str) -> TurnOutcome {
        conversation.last_activity = chrono::Utc::now().naive_utc();
        let mut replies = Vec::new();

        let booking = match conversation.flow.take() {
            Some(flow) => self.continue_flow(conversation, flow, text, &mut replies).await,
            None => self.dispatch(conversation, text, &mut replies).await,
        };

        TurnOutcome { replies, booking }
    }

    async fn dispatch(
        &self,
        conversation: &mut Conversation,
        text: &str,
        replies: &mut Vec<String>,
    ) -> Option<BookingRecord> {
        let Some(recognizer) = &self.recognizer else {
            return self
                .start_booking(conversation, BookingRecord::default(), replies)
                .await;
        };

        let recognition = match recognizer.classify(text).await {
            Ok(recognition) => recognition,
            Err(e) => {
                tracing::warn!(conversation_id = %conversation.id, error = %e, "intent recognition failed");
                replies.push(NOT_UNDERSTOOD.to_string());
                return None;
            }
        };

        tracing::info!(
            conversation_id = %conversation.id,
            intent = recognition.intent.as_str(),
            "intent recognized"
        );

        match recognition.intent {
            Intent::BookFlight => {
                if !recognition.slots.unsupported_airports.is_empty() {
                    replies.push(unsupported_airports_warning(
                        &recognition.slots.unsupported_airports,
                    ));
                }
                self.start_booking(conversation, recognition.slots, replies)
                    .await
            }
            Intent::Cancel => {
                replies.push(FAREWELL.to_string());
                None
            }
            Intent::Confirm => {
                replies.push(ACKNOWLEDGE.to_string());
                None
            }
            Intent::NoneIntent => {
                replies.push(OFF_TOPIC.to_string());
                None
            }
            Intent::Unknown => {
                replies.push(NOT_UNDERSTOOD.to_string());
                None
            }
        }
    }

    async fn start_booking(
        &self,
        conversation: &mut Conversation,
        record: BookingRecord,
        replies: &mut Vec<String>,
    ) -> Option<BookingRecord> {
        tracing::info!(conversation_id = %conversation.id, prefilled = !record.is_empty(), "booking started");
        let mut flow = self.engine.start(&conversation.id, record);
        let status = self.engine.advance(&mut flow, None, replies).await;
        self.settle(conversation, flow, status, replies)
    }

    async fn continue_flow(
        &self,
        conversation: &mut Conversation,
        mut flow: BookingFlow,
        text: &str,
        replies: &mut Vec<String>,
    ) -> Option<BookingRecord> {
        let status = match Interruption::detect(text) {
            Some(Interruption::Cancel) => {
                let step = flow.current_slot().map(|s| s.name()).unwrap_or("confirmation");
                tracing::info!(conversation_id = %conversation.id, step, "booking cancelled");
                audit::emit(
                    self.audit.as_ref(),
                    AuditEvent::new(&conversation.id, AuditKind::Cancelled).field("slot", step),
                );
                replies.push(FAREWELL.to_string());
                return None;
            }
            Some(Interruption::Help) => {
                replies.push(HELP_TEXT.to_string());
                self.engine.advance(&mut flow, None, replies).await
            }
            None => self.engine.advance(&mut flow, Some(text), replies).await,
        };
        self.settle(conversation, flow, status, replies)
    }

    fn settle(
        &self,
        conversation: &mut Conversation,
        flow: BookingFlow,
        status: FlowStatus,
        replies: &mut Vec<String>,
    ) -> Option<BookingRecord> {
        match status {
            FlowStatus::Waiting => {
                conversation.flow = Some(flow);
                None
            }
            FlowStatus::Finished(FlowOutcome::Confirmed(record)) => {
                replies.push(confirmed_message(&record));
                Some(record)
            }
            FlowStatus::Finished(outcome) => {
                tracing::info!(conversation_id = %conversation.id, ?outcome, "booking ended without a record");
                None
            }
        }
    }
}
