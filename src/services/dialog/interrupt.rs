pub const HELP_TEXT: &str = "Show Help... I can book a flight for you: tell me where you want to go, \
where from, your travel dates, your budget and how many people are traveling. Say \"cancel\" at any time to stop.";

/// Commands honored at any point of a booking, before the current step
/// sees the input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interruption {
    Cancel,
    Help,
}

impl Interruption {
    pub fn detect(text: &str) -> Option<Self> {
        let normalized = text.trim().trim_end_matches(['.', '!']).trim().to_lowercase();
        match normalized.as_str() {
            "cancel" | "quit" | "stop" | "cancel booking" => Some(Interruption::Cancel),
            "help" | "?" => Some(Interruption::Help),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect() {
        assert_eq!(Interruption::detect("Cancel"), Some(Interruption::Cancel));
        assert_eq!(Interruption::detect(" quit! "), Some(Interruption::Cancel));
        assert_eq!(Interruption::detect("help"), Some(Interruption::Help));
        assert_eq!(Interruption::detect("?"), Some(Interruption::Help));
        assert_eq!(Interruption::detect("I want to cancel my trip to Paris"), None);
        assert_eq!(Interruption::detect("Paris"), None);
    }
}
