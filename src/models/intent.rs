use serde::{Deserialize, Serialize};

use super::BookingRecord;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    BookFlight,
    Cancel,
    Confirm,
    #[serde(rename = "none")]
    NoneIntent,
    #[serde(other)]
    Unknown,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::BookFlight => "book_flight",
            Intent::Cancel => "cancel",
            Intent::Confirm => "confirm",
            Intent::NoneIntent => "none",
            Intent::Unknown => "unknown",
        }
    }
}

/// What the recognizer made of one utterance: the top intent plus whatever
/// slot values it could pull out. Cities it saw but could not map to an
/// airport end up in `slots.unsupported_airports`.
#[derive(Debug, Clone, PartialEq)]
pub struct Recognition {
    pub intent: Intent,
    pub slots: BookingRecord,
}

impl Recognition {
    pub fn unknown() -> Self {
        Self {
            intent: Intent::Unknown,
            slots: BookingRecord::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intent_labels() {
        let parsed: Intent = serde_json::from_str("\"book_flight\"").unwrap();
        assert_eq!(parsed, Intent::BookFlight);
        let parsed: Intent = serde_json::from_str("\"none\"").unwrap();
        assert_eq!(parsed, Intent::NoneIntent);
        let parsed: Intent = serde_json::from_str("\"get_weather\"").unwrap();
        assert_eq!(parsed, Intent::Unknown);
    }
}
