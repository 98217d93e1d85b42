use std::sync::Arc;

use crate::models::{AuditEvent, AuditKind, BookingRecord};
use crate::services::ai::recognizer::IntentRecognizer;
use crate::services::audit::{self, AuditSink};

use super::confirmation::{Answer, ConfirmationPrompt, ConfirmationStage, REBOOK_TEXT};
use super::date_resolver::{AmbiguousDateResolver, DateResolution, DateRole, Resolve};
use super::dates::{definite_date, DateParser};
use super::slots::{
    city_from_text, parse_count, parse_money, title_case, Slot, SlotKind, SlotSpec, SlotValue,
    SLOTS,
};

pub const ABANDON_TEXT: &str =
    "I'm sorry, I'm having trouble understanding. Let's stop here, just tell me when you'd like to start a new booking.";

/// What the flow is waiting on while suspended.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Pending {
    Slot { prompt: String, attempts: u32 },
    Date(DateResolution),
    Confirm(ConfirmationPrompt),
}

impl Pending {
    fn prompt(&self) -> &str {
        match self {
            Pending::Slot { prompt, .. } => prompt,
            Pending::Date(state) => &state.prompt,
            Pending::Confirm(p) => &p.prompt,
        }
    }

    fn attempts(&self) -> u32 {
        match self {
            Pending::Slot { attempts, .. } => *attempts,
            Pending::Date(state) => state.attempts,
            Pending::Confirm(p) => p.attempts,
        }
    }
}

/// A booking in progress: the record being filled, the index of the current
/// slot in [`SLOTS`] (one past the end means confirmation) and the prompt
/// the user still owes an answer to.
#[derive(Debug)]
pub struct BookingFlow {
    conversation_id: String,
    record: BookingRecord,
    position: usize,
    pending: Option<Pending>,
}

impl BookingFlow {
    pub fn record(&self) -> &BookingRecord {
        &self.record
    }

    pub fn current_slot(&self) -> Option<Slot> {
        SLOTS.get(self.position).map(|spec| spec.slot)
    }

    pub fn is_confirming(&self) -> bool {
        self.position >= SLOTS.len()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FlowOutcome {
    Confirmed(BookingRecord),
    Declined,
    Abandoned,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FlowStatus {
    Waiting,
    Finished(FlowOutcome),
}

enum Step {
    Filled {
        value: SlotValue,
        prompt: String,
        response: String,
    },
    Ask(Pending),
}

pub struct SlotFillingEngine {
    recognizer: Option<Arc<dyn IntentRecognizer>>,
    departure: AmbiguousDateResolver,
    return_trip: AmbiguousDateResolver,
    confirmation: ConfirmationStage,
    audit: Arc<dyn AuditSink>,
    max_retries: Option<u32>,
}

impl SlotFillingEngine {
    pub fn new(
        recognizer: Option<Arc<dyn IntentRecognizer>>,
        date_parser: Arc<dyn DateParser>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            departure: AmbiguousDateResolver::new(DateRole::Departure, Arc::clone(&date_parser)),
            return_trip: AmbiguousDateResolver::new(DateRole::Return, date_parser),
            confirmation: ConfirmationStage::new(recognizer.clone(), Arc::clone(&audit)),
            recognizer,
            audit,
            max_retries: None,
        }
    }

    /// Abandons the booking once a single prompt has been re-asked more
    /// than `max` times. `None` retries forever.
    pub fn with_max_retries(mut self, max: Option<u32>) -> Self {
        self.max_retries = max;
        self
    }

    pub fn start(&self, conversation_id: &str, record: BookingRecord) -> BookingFlow {
        BookingFlow {
            conversation_id: conversation_id.to_string(),
            record,
            position: 0,
            pending: None,
        }
    }

    /// A flow parked at confirmation for a record that was confirmed but
    /// could not be saved. The summary is appended to `replies`.
    pub fn reconfirm(
        &self,
        conversation_id: &str,
        record: BookingRecord,
        replies: &mut Vec<String>,
    ) -> BookingFlow {
        let prompt = self.confirmation.ask(&record);
        replies.push(prompt.prompt.clone());
        BookingFlow {
            conversation_id: conversation_id.to_string(),
            record,
            position: SLOTS.len(),
            pending: Some(Pending::Confirm(prompt)),
        }
    }

    /// Runs the flow forward until it needs user input or finishes.
    ///
    /// `input` answers the outstanding prompt, if there is one. Slots that
    /// already hold a valid value are captured without prompting. Prompts
    /// to send are appended to `replies`.
    pub async fn advance(
        &self,
        flow: &mut BookingFlow,
        input: Option<&str>,
        replies: &mut Vec<String>,
    ) -> FlowStatus {
        let mut input = input;

        loop {
            let Some(spec) = SLOTS.get(flow.position) else {
                return self.confirm(flow, input, replies).await;
            };

            let step = match flow.pending.take() {
                Some(pending) => match input.take() {
                    Some(text) => self.answer(spec, &flow.record, pending, text).await,
                    None => Step::Ask(pending),
                },
                None => self.evaluate(spec, &flow.record),
            };

            match step {
                Step::Filled {
                    value,
                    prompt,
                    response,
                } => {
                    tracing::debug!(
                        conversation_id = %flow.conversation_id,
                        slot = spec.slot.name(),
                        value = %value,
                        "slot filled"
                    );
                    audit::emit(
                        self.audit.as_ref(),
                        AuditEvent::new(&flow.conversation_id, AuditKind::SlotFilled)
                            .field("slot", spec.slot.name())
                            .field("prompt", prompt)
                            .field("user_response", response)
                            .field("value", value.to_string()),
                    );
                    spec.slot.assign(&mut flow.record, value);
                    flow.position += 1;
                }
                Step::Ask(pending) => return self.suspend(flow, pending, replies),
            }
        }
    }

    fn resolver(&self, role: DateRole) -> &AmbiguousDateResolver {
        match role {
            DateRole::Departure => &self.departure,
            DateRole::Return => &self.return_trip,
        }
    }

    fn suspend(&self, flow: &mut BookingFlow, pending: Pending, replies: &mut Vec<String>) -> FlowStatus {
        if let Some(max) = self.max_retries {
            if pending.attempts() > max {
                let step = flow.current_slot().map(|s| s.name()).unwrap_or("confirmation");
                tracing::warn!(
                    conversation_id = %flow.conversation_id,
                    step,
                    attempts = pending.attempts(),
                    "retry limit reached, abandoning booking"
                );
                audit::emit(
                    self.audit.as_ref(),
                    AuditEvent::new(&flow.conversation_id, AuditKind::Abandoned)
                        .field("slot", step)
                        .field("attempts", pending.attempts().to_string()),
                );
                replies.push(ABANDON_TEXT.to_string());
                return FlowStatus::Finished(FlowOutcome::Abandoned);
            }
        }

        replies.push(pending.prompt().to_string());
        flow.pending = Some(pending);
        FlowStatus::Waiting
    }

    /// Looks at a slot nobody has been asked about yet.
    fn evaluate(&self, spec: &SlotSpec, record: &BookingRecord) -> Step {
        if let SlotKind::Date(role) = spec.kind {
            let current = spec.slot.value(record).map(|v| v.to_string());
            return match self.resolver(role).resolve(current.as_deref()) {
                Resolve::Resolved(timex) => {
                    self.check_date_order(role, record, timex, String::new(), String::new(), None)
                }
                Resolve::Ask(state) => Step::Ask(Pending::Date(state)),
            };
        }

        match spec.slot.value(record).and_then(|v| prefilled(spec.kind, v)) {
            Some(value) => Step::Filled {
                value,
                prompt: String::new(),
                response: String::new(),
            },
            None => Step::Ask(Pending::Slot {
                prompt: spec.prompt.unwrap_or_default().to_string(),
                attempts: 0,
            }),
        }
    }

    /// Handles the user's reply to the outstanding prompt.
    async fn answer(&self, spec: &SlotSpec, record: &BookingRecord, pending: Pending, text: &str) -> Step {
        match (spec.kind, pending) {
            (SlotKind::Date(role), Pending::Date(state)) => {
                let prompt = state.prompt.clone();
                match self.resolver(role).resume(state.clone(), text) {
                    Resolve::Resolved(timex) => {
                        self.check_date_order(role, record, timex, prompt, text.to_string(), Some(state))
                    }
                    Resolve::Ask(next) => Step::Ask(Pending::Date(next)),
                }
            }
            (kind, Pending::Slot { prompt, attempts }) if !matches!(kind, SlotKind::Date(_)) => {
                match self.capture(spec.slot, kind, text).await {
                    Some(value) => Step::Filled {
                        value,
                        prompt,
                        response: text.to_string(),
                    },
                    None => {
                        tracing::debug!(slot = spec.slot.name(), "slot input rejected");
                        Step::Ask(Pending::Slot {
                            prompt: spec.retry_prompt.or(spec.prompt).unwrap_or_default().to_string(),
                            attempts: attempts + 1,
                        })
                    }
                }
            }
            (_, pending) => {
                tracing::warn!(slot = spec.slot.name(), ?pending, "pending step does not match slot, re-evaluating");
                self.evaluate(spec, record)
            }
        }
    }

    /// A return date before the departure date sends the user back to the
    /// return date resolver.
    fn check_date_order(
        &self,
        role: DateRole,
        record: &BookingRecord,
        timex: String,
        prompt: String,
        response: String,
        state: Option<DateResolution>,
    ) -> Step {
        if role == DateRole::Return {
            let departure = record.departure_date.as_deref().and_then(definite_date);
            if let (Some(departure), Some(back)) = (departure, definite_date(&timex)) {
                if back < departure {
                    let message = format!(
                        "Your return date must be on or after your departure date ({departure}). On what date would you like to come back?"
                    );
                    let next = match state {
                        Some(state) => self.return_trip.reask(state, &message),
                        None => Resolve::Ask(DateResolution {
                            dialog_id: self.return_trip.dialog_id(),
                            prompt: message,
                            attempts: 0,
                        }),
                    };
                    if let Resolve::Ask(next) = next {
                        return Step::Ask(Pending::Date(next));
                    }
                }
            }
        }

        Step::Filled {
            value: SlotValue::Text(timex),
            prompt,
            response,
        }
    }

    async fn capture(&self, slot: Slot, kind: SlotKind, text: &str) -> Option<SlotValue> {
        match kind {
            SlotKind::City => {
                if let Some(slots) = self.extract(text).await {
                    let (own, other) = match slot {
                        Slot::OriginCity => (slots.origin_city, slots.destination_city),
                        _ => (slots.destination_city, slots.origin_city),
                    };
                    if let Some(city) = own.or(other).filter(|c| !c.trim().is_empty()) {
                        return Some(SlotValue::Text(title_case(&city)));
                    }
                }
                city_from_text(text).map(SlotValue::Text)
            }
            SlotKind::Money => {
                if let Some(amount) = parse_money(text) {
                    return Some(SlotValue::Text(amount));
                }
                self.extract(text)
                    .await
                    .and_then(|slots| slots.budget)
                    .and_then(|budget| parse_money(&budget))
                    .map(SlotValue::Text)
            }
            SlotKind::Count => {
                if let Some(n) = parse_count(text) {
                    return Some(SlotValue::Count(n));
                }
                let slots = self.extract(text).await?;
                match slot {
                    Slot::AdultCount => slots.adult_count,
                    _ => slots.child_count,
                }
                .map(SlotValue::Count)
            }
            SlotKind::Date(_) => None,
        }
    }

    /// Entity lookup through the recognizer; the intent is irrelevant here.
    async fn extract(&self, text: &str) -> Option<BookingRecord> {
        let recognizer = self.recognizer.as_ref()?;
        match recognizer.classify(text).await {
            Ok(recognition) => Some(recognition.slots),
            Err(e) => {
                tracing::warn!(error = %e, "entity lookup failed, falling back to plain text");
                None
            }
        }
    }

    async fn confirm(&self, flow: &mut BookingFlow, input: Option<&str>, replies: &mut Vec<String>) -> FlowStatus {
        let pending = match flow.pending.take() {
            Some(Pending::Confirm(p)) => p,
            _ => {
                let prompt = self.confirmation.ask(&flow.record);
                return self.suspend(flow, Pending::Confirm(prompt), replies);
            }
        };

        let Some(text) = input else {
            return self.suspend(flow, Pending::Confirm(pending), replies);
        };

        match self
            .confirmation
            .answer(&flow.conversation_id, &flow.record, pending, text)
            .await
        {
            Answer::Yes => FlowStatus::Finished(FlowOutcome::Confirmed(std::mem::take(&mut flow.record))),
            Answer::No => {
                replies.push(REBOOK_TEXT.to_string());
                FlowStatus::Finished(FlowOutcome::Declined)
            }
            Answer::Unclear(prompt) => self.suspend(flow, Pending::Confirm(prompt), replies),
        }
    }
}

fn prefilled(kind: SlotKind, value: SlotValue) -> Option<SlotValue> {
    match (kind, value) {
        (SlotKind::City, SlotValue::Text(city)) if !city.trim().is_empty() => {
            Some(SlotValue::Text(title_case(&city)))
        }
        (SlotKind::Money, SlotValue::Text(budget)) => parse_money(&budget).map(SlotValue::Text),
        (SlotKind::Count, SlotValue::Count(n)) => Some(SlotValue::Count(n)),
        _ => None,
    }
}
