use std::sync::Arc;

use crate::models::{AuditEvent, AuditKind, BookingRecord, Intent};
use crate::services::ai::recognizer::IntentRecognizer;
use crate::services::audit::{self, AuditSink};

use super::slots::SLOTS;

pub const REBOOK_TEXT: &str =
    "Alright, I won't book this trip. Whenever you're ready, tell me where you'd like to fly and we can start again.";

const YES_WORDS: [&str; 11] = [
    "yes", "y", "yeah", "yep", "sure", "ok", "okay", "correct", "right", "confirm", "1",
];
const NO_WORDS: [&str; 7] = ["no", "n", "nope", "nah", "wrong", "incorrect", "2"];
const NEGATORS: [&str; 10] = [
    "not", "don't", "dont", "isn't", "isnt", "doesn't", "doesnt", "wasn't", "never", "hardly",
];
const HEDGES: [&str; 1] = ["sure"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmationPrompt {
    pub prompt: String,
    pub attempts: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Answer {
    Yes,
    No,
    Unclear(ConfirmationPrompt),
}

/// Builds the itinerary summary. The wording is fixed so that transcripts
/// stay comparable across conversations.
pub fn summary(record: &BookingRecord) -> String {
    format!(
        "Just confirming, you are traveling from {} to {} from {} to {} with {} adult(s) and {} child(ren), and a budget of {}. Does this sound correct? (1) Yes or (2) No",
        record.origin_city.as_deref().unwrap_or_default(),
        record.destination_city.as_deref().unwrap_or_default(),
        record.departure_date.as_deref().unwrap_or_default(),
        record.return_date.as_deref().unwrap_or_default(),
        record.adult_count.unwrap_or_default(),
        record.child_count.unwrap_or_default(),
        record.budget.as_deref().unwrap_or_default(),
    )
}

/// Reads a yes/no answer. A negator before a yes-word turns it into a no
/// ("not correct"), except for hedges like "not sure" which stay unclear.
/// A negated no-word ("not wrong") is unclear too.
pub fn parse_yes_no(text: &str) -> Option<bool> {
    let lower = text.to_lowercase().replace('\u{2019}', "'");
    let mut negated = false;

    for token in lower
        .split_whitespace()
        .map(|t| t.trim_matches(|c: char| !c.is_alphanumeric()))
    {
        if NEGATORS.iter().any(|w| *w == token) {
            negated = true;
        } else if YES_WORDS.iter().any(|w| *w == token) {
            return match (negated, HEDGES.iter().any(|w| *w == token)) {
                (false, _) => Some(true),
                (true, true) => None,
                (true, false) => Some(false),
            };
        } else if NO_WORDS.iter().any(|w| *w == token) {
            return if negated { None } else { Some(false) };
        }
    }
    None
}

pub struct ConfirmationStage {
    recognizer: Option<Arc<dyn IntentRecognizer>>,
    audit: Arc<dyn AuditSink>,
}

impl ConfirmationStage {
    pub fn new(recognizer: Option<Arc<dyn IntentRecognizer>>, audit: Arc<dyn AuditSink>) -> Self {
        Self { recognizer, audit }
    }

    pub fn ask(&self, record: &BookingRecord) -> ConfirmationPrompt {
        ConfirmationPrompt {
            prompt: summary(record),
            attempts: 0,
        }
    }

    pub async fn answer(
        &self,
        conversation_id: &str,
        record: &BookingRecord,
        pending: ConfirmationPrompt,
        reply: &str,
    ) -> Answer {
        let decision = match parse_yes_no(reply) {
            Some(decision) => Some(decision),
            None => self.recognize_confirmation(reply).await,
        };

        match decision {
            Some(true) => {
                let event = SLOTS.iter().fold(
                    AuditEvent::new(conversation_id, AuditKind::Success),
                    |event, spec| {
                        let value = spec
                            .slot
                            .value(record)
                            .map(|v| v.to_string())
                            .unwrap_or_default();
                        event.field(spec.slot.name(), value)
                    },
                );
                audit::emit(self.audit.as_ref(), event);
                tracing::info!(conversation_id, "booking confirmed");
                Answer::Yes
            }
            Some(false) => {
                audit::emit(
                    self.audit.as_ref(),
                    AuditEvent::new(conversation_id, AuditKind::Fail).field("summary", pending.prompt),
                );
                tracing::info!(conversation_id, "booking declined");
                Answer::No
            }
            None => Answer::Unclear(ConfirmationPrompt {
                prompt: pending.prompt,
                attempts: pending.attempts + 1,
            }),
        }
    }

    async fn recognize_confirmation(&self, reply: &str) -> Option<bool> {
        let recognizer = self.recognizer.as_ref()?;
        match recognizer.classify(reply).await {
            Ok(recognition) => match recognition.intent {
                Intent::Confirm => Some(true),
                Intent::Cancel => Some(false),
                _ => None,
            },
            Err(e) => {
                tracing::warn!(error = %e, "recognizer failed on confirmation reply");
                None
            }
        }
    }
}
