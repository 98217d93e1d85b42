use anyhow::Context;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Slot values collected during a booking conversation.
///
/// Every slot stays `None` until it is filled. Dates are kept as TIMEX strings
/// (`2023-03-01`, `XXXX-03-01`, ...) so that partially specified values coming
/// out of the recognizer survive until the date resolver disambiguates them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BookingRecord {
    pub destination_city: Option<String>,
    pub origin_city: Option<String>,
    pub departure_date: Option<String>,
    pub return_date: Option<String>,
    pub budget: Option<String>,
    pub adult_count: Option<u32>,
    pub child_count: Option<u32>,
    #[serde(default)]
    pub unsupported_airports: Vec<String>,
}

impl BookingRecord {
    pub fn is_empty(&self) -> bool {
        self.destination_city.is_none()
            && self.origin_city.is_none()
            && self.departure_date.is_none()
            && self.return_date.is_none()
            && self.budget.is_none()
            && self.adult_count.is_none()
            && self.child_count.is_none()
    }
}

/// A confirmed booking as persisted once the traveler says yes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FlightBooking {
    pub id: String,
    pub conversation_id: String,
    pub destination_city: String,
    pub origin_city: String,
    pub departure_date: String,
    pub return_date: String,
    pub budget: String,
    pub adult_count: u32,
    pub child_count: u32,
    pub created_at: NaiveDateTime,
}

impl FlightBooking {
    pub fn from_record(conversation_id: &str, record: &BookingRecord) -> anyhow::Result<Self> {
        fn required<T: Clone>(value: &Option<T>, slot: &str) -> anyhow::Result<T> {
            value
                .clone()
                .with_context(|| format!("confirmed booking is missing {slot}"))
        }

        Ok(Self {
            id: uuid::Uuid::new_v4().to_string(),
            conversation_id: conversation_id.to_string(),
            destination_city: required(&record.destination_city, "destination_city")?,
            origin_city: required(&record.origin_city, "origin_city")?,
            departure_date: required(&record.departure_date, "departure_date")?,
            return_date: required(&record.return_date, "return_date")?,
            budget: required(&record.budget, "budget")?,
            adult_count: required(&record.adult_count, "adult_count")?,
            child_count: required(&record.child_count, "child_count")?,
            created_at: chrono::Utc::now().naive_utc(),
        })
    }
}
