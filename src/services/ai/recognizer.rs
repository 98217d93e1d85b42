use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use crate::models::{BookingRecord, Intent, Recognition};
use crate::services::ai::{LlmProvider, Message};
use crate::services::dialog::slots::{parse_count, title_case};

const SYSTEM_PROMPT: &str = r#"You are the language understanding engine of a flight booking assistant. Analyze the traveler's message.

Return ONLY valid JSON (no markdown, no explanation) with this exact structure:
{
  "intent": "book_flight|cancel|confirm|none",
  "destination_city": "city the traveler wants to fly to, or null",
  "origin_city": "city the traveler flies from, or null",
  "departure_date": "departure date as TIMEX, or null",
  "return_date": "return date as TIMEX, or null",
  "budget": "amount with currency like 800$, or null",
  "adult_count": 2,
  "child_count": 0,
  "unsupported_airports": ["places mentioned as origin or destination that have no airport"]
}

Intent rules:
- "book_flight": the traveler wants to book a trip or mentions travel plans
- "cancel": the traveler wants to stop, quit or cancel
- "confirm": the traveler agrees (yes, ok, sounds good)
- "none": anything unrelated to booking flights

Date rules:
- Write dates as TIMEX: 2023-03-01 for a full date, XXXX-03-01 when the year is unknown,
  XXXX-03 for a month, XXXX-WXX-5 for a weekday (1 = Monday)
- A date range such as "from march 1st to march 15th 2023" may be returned in departure_date
  as "(2023-03-01,2023-03-15)"

Use null for anything the traveler did not say. Never guess counts or budget.
"#;

/// Classifies one utterance into an intent and whatever booking slots it
/// mentions.
#[async_trait]
pub trait IntentRecognizer: Send + Sync {
    async fn classify(&self, text: &str) -> anyhow::Result<Recognition>;
}

pub struct LlmRecognizer {
    llm: Box<dyn LlmProvider>,
}

impl LlmRecognizer {
    pub fn new(llm: Box<dyn LlmProvider>) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl IntentRecognizer for LlmRecognizer {
    async fn classify(&self, text: &str) -> anyhow::Result<Recognition> {
        let response = self.llm.chat(SYSTEM_PROMPT, &[Message::user(text)]).await?;
        let recognition = parse_recognition(&response);
        tracing::debug!(intent = recognition.intent.as_str(), "utterance classified");
        Ok(recognition)
    }
}

/// Wire shape of the model's answer. Models are loose with types, so counts
/// and budget may come back as numbers or strings.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawRecognition {
    intent: Option<Intent>,
    destination_city: Option<String>,
    origin_city: Option<String>,
    departure_date: Option<String>,
    return_date: Option<String>,
    budget: Option<Value>,
    adult_count: Option<Value>,
    child_count: Option<Value>,
    unsupported_airports: Option<Vec<String>>,
}

impl RawRecognition {
    fn into_recognition(self) -> Recognition {
        let mut departure_date = non_empty(self.departure_date);
        let mut return_date = non_empty(self.return_date);

        // "(start,end)" in the departure field carries both dates.
        if let Some((start, end)) = departure_date.as_deref().and_then(split_range) {
            if return_date.is_none() {
                return_date = end;
            }
            departure_date = start;
        }

        let slots = BookingRecord {
            destination_city: non_empty(self.destination_city).map(|c| title_case(&c)),
            origin_city: non_empty(self.origin_city).map(|c| title_case(&c)),
            departure_date,
            return_date,
            budget: self.budget.and_then(budget_text),
            adult_count: self.adult_count.and_then(count),
            child_count: self.child_count.and_then(count),
            unsupported_airports: self
                .unsupported_airports
                .unwrap_or_default()
                .iter()
                .filter(|a| !a.trim().is_empty())
                .map(|a| title_case(a))
                .collect(),
        };

        Recognition {
            intent: self.intent.unwrap_or(Intent::Unknown),
            slots,
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty() && !v.eq_ignore_ascii_case("null"))
}

fn split_range(value: &str) -> Option<(Option<String>, Option<String>)> {
    let inner = value.strip_prefix('(')?.strip_suffix(')')?;
    let mut parts = inner.split(',').map(|p| p.trim().to_string());
    let start = parts.next().filter(|p| !p.is_empty());
    let end = parts.next().filter(|p| !p.is_empty());
    Some((start, end))
}

fn budget_text(value: Value) -> Option<String> {
    match value {
        Value::String(s) => non_empty(Some(s)),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn count(value: Value) -> Option<u32> {
    match value {
        Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        Value::String(s) => parse_count(&s),
        _ => None,
    }
}

fn parse_raw(text: &str) -> Option<RawRecognition> {
    serde_json::from_str::<RawRecognition>(text).ok()
}

fn parse_recognition(response: &str) -> Recognition {
    if let Some(raw) = parse_raw(response) {
        return raw.into_recognition();
    }

    // Strip markdown code fences
    let trimmed = response.trim();
    let cleaned = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    let cleaned = cleaned.strip_suffix("```").unwrap_or(cleaned).trim();

    if let Some(raw) = parse_raw(cleaned) {
        return raw.into_recognition();
    }

    // JSON buried in prose
    if let (Some(start), Some(end)) = (cleaned.find('{'), cleaned.rfind('}')) {
        if start < end {
            if let Some(raw) = parse_raw(&cleaned[start..=end]) {
                return raw.into_recognition();
            }
        }
    }

    tracing::warn!("failed to parse LLM response as recognition JSON, treating as unknown");
    Recognition::unknown()
}
