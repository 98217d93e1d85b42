use std::fmt;

use crate::models::BookingRecord;

use super::date_resolver::DateRole;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    DestinationCity,
    OriginCity,
    DepartureDate,
    ReturnDate,
    Budget,
    AdultCount,
    ChildCount,
}

impl Slot {
    pub fn name(&self) -> &'static str {
        match self {
            Slot::DestinationCity => "destination_city",
            Slot::OriginCity => "origin_city",
            Slot::DepartureDate => "departure_date",
            Slot::ReturnDate => "return_date",
            Slot::Budget => "budget",
            Slot::AdultCount => "adult_count",
            Slot::ChildCount => "child_count",
        }
    }

    pub fn value(&self, record: &BookingRecord) -> Option<SlotValue> {
        let text = |v: &Option<String>| v.clone().map(SlotValue::Text);
        match self {
            Slot::DestinationCity => text(&record.destination_city),
            Slot::OriginCity => text(&record.origin_city),
            Slot::DepartureDate => text(&record.departure_date),
            Slot::ReturnDate => text(&record.return_date),
            Slot::Budget => text(&record.budget),
            Slot::AdultCount => record.adult_count.map(SlotValue::Count),
            Slot::ChildCount => record.child_count.map(SlotValue::Count),
        }
    }

    pub fn assign(&self, record: &mut BookingRecord, value: SlotValue) {
        match (self, value) {
            (Slot::DestinationCity, SlotValue::Text(v)) => record.destination_city = Some(v),
            (Slot::OriginCity, SlotValue::Text(v)) => record.origin_city = Some(v),
            (Slot::DepartureDate, SlotValue::Text(v)) => record.departure_date = Some(v),
            (Slot::ReturnDate, SlotValue::Text(v)) => record.return_date = Some(v),
            (Slot::Budget, SlotValue::Text(v)) => record.budget = Some(v),
            (Slot::AdultCount, SlotValue::Count(n)) => record.adult_count = Some(n),
            (Slot::ChildCount, SlotValue::Count(n)) => record.child_count = Some(n),
            (slot, value) => {
                tracing::error!(slot = slot.name(), value = %value, "slot value of the wrong kind ignored");
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotValue {
    Text(String),
    Count(u32),
}

impl fmt::Display for SlotValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SlotValue::Text(v) => f.write_str(v),
            SlotValue::Count(n) => write!(f, "{n}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotKind {
    City,
    Date(DateRole),
    Money,
    Count,
}

#[derive(Debug, Clone, Copy)]
pub struct SlotSpec {
    pub slot: Slot,
    pub kind: SlotKind,
    /// `None` for slots whose prompting is delegated to the date resolver.
    pub prompt: Option<&'static str>,
    pub retry_prompt: Option<&'static str>,
}

/// Collection order. Confirmation follows the last entry.
pub static SLOTS: [SlotSpec; 7] = [
    SlotSpec {
        slot: Slot::DestinationCity,
        kind: SlotKind::City,
        prompt: Some("To what city would you like to travel?"),
        retry_prompt: Some("Sorry, I didn't catch the city. To what city would you like to travel?"),
    },
    SlotSpec {
        slot: Slot::OriginCity,
        kind: SlotKind::City,
        prompt: Some("From what city will you be travelling?"),
        retry_prompt: Some("Sorry, I didn't catch the city. From what city will you be travelling?"),
    },
    SlotSpec {
        slot: Slot::DepartureDate,
        kind: SlotKind::Date(DateRole::Departure),
        prompt: None,
        retry_prompt: None,
    },
    SlotSpec {
        slot: Slot::ReturnDate,
        kind: SlotKind::Date(DateRole::Return),
        prompt: None,
        retry_prompt: None,
    },
    SlotSpec {
        slot: Slot::Budget,
        kind: SlotKind::Money,
        prompt: Some("What is your budget?"),
        retry_prompt: Some("Please give your budget as an amount, for example 800$."),
    },
    SlotSpec {
        slot: Slot::AdultCount,
        kind: SlotKind::Count,
        prompt: Some("For how many adult(s)?"),
        retry_prompt: Some("Please tell me the number of adults, for example 2."),
    },
    SlotSpec {
        slot: Slot::ChildCount,
        kind: SlotKind::Count,
        prompt: Some("And how many child(ren)?"),
        retry_prompt: Some("Please tell me the number of children, for example 0."),
    },
];

/// Capitalizes every word: "new york" becomes "New York".
pub fn title_case(s: &str) -> String {
    s.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                None => String::new(),
                Some(first) => first.to_uppercase().to_string() + &chars.as_str().to_lowercase(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Best-effort city extraction from a bare answer such as "Paris" or
/// "from new york". Sentences are left to the recognizer.
pub fn city_from_text(text: &str) -> Option<String> {
    let trimmed = text.trim().trim_end_matches(['.', '!', '?']).trim();
    let lower = trimmed.to_lowercase();
    let name = ["to ", "from "]
        .iter()
        .find_map(|prefix| lower.strip_prefix(prefix))
        .unwrap_or(&lower)
        .trim();

    let words: Vec<&str> = name.split_whitespace().collect();
    let looks_like_name = !words.is_empty()
        && words.len() <= 3
        && words
            .iter()
            .all(|w| w.chars().all(|c| c.is_alphabetic() || c == '-' || c == '\'' || c == '.'));

    looks_like_name.then(|| title_case(name))
}

const CURRENCIES: [(&str, &str); 11] = [
    ("$", "$"),
    ("usd", "$"),
    ("dollar", "$"),
    ("dollars", "$"),
    ("€", "€"),
    ("eur", "€"),
    ("euro", "€"),
    ("euros", "€"),
    ("£", "£"),
    ("gbp", "£"),
    ("pounds", "£"),
];

fn currency_symbol(s: &str) -> Option<&'static str> {
    let lower = s.to_lowercase();
    CURRENCIES
        .iter()
        .find_map(|(name, symbol)| (*name == lower).then_some(*symbol))
}

/// Splits a token like "$1,500" or "800$" into its amount and currency.
fn split_amount(token: &str) -> Option<(String, Option<&'static str>)> {
    let start = token.find(|c: char| c.is_ascii_digit())?;
    let end = token
        .rfind(|c: char| c.is_ascii_digit())
        .map(|i| i + 1)
        .unwrap_or(token.len());
    let (prefix, number, suffix) = (&token[..start], &token[start..end], &token[end..]);

    if prefix.ends_with('-') || !number.chars().all(|c| c.is_ascii_digit() || c == ',' || c == '.') {
        return None;
    }
    let amount: String = number.chars().filter(|c| *c != ',').collect();
    if amount.parse::<f64>().is_err() {
        return None;
    }

    let currency = currency_symbol(prefix).or_else(|| currency_symbol(suffix));
    if currency.is_none() && !(prefix.is_empty() && suffix.is_empty()) {
        return None;
    }
    Some((amount, currency))
}

/// Finds a monetary amount and normalizes it to "<amount><symbol>", e.g.
/// "a budget of 1,500 dollars" becomes "1500$". Bare numbers are accepted
/// without a symbol.
pub fn parse_money(text: &str) -> Option<String> {
    let tokens: Vec<&str> = text
        .split_whitespace()
        .map(|t| t.trim_end_matches([',', '!', '?', ';']).trim_end_matches('.'))
        .filter(|t| !t.is_empty())
        .collect();

    let mut bare = None;
    for (i, token) in tokens.iter().enumerate() {
        let Some((amount, currency)) = split_amount(token) else {
            continue;
        };
        let currency = currency
            .or_else(|| tokens.get(i + 1).and_then(|t| currency_symbol(t)))
            .or_else(|| i.checked_sub(1).and_then(|p| currency_symbol(tokens[p])));
        match currency {
            Some(symbol) => return Some(format!("{amount}{symbol}")),
            None if bare.is_none() => bare = Some(amount),
            None => {}
        }
    }
    bare
}

const NUMBER_WORDS: [(&str, u32); 15] = [
    ("none", 0),
    ("zero", 0),
    ("one", 1),
    ("a", 1),
    ("two", 2),
    ("three", 3),
    ("four", 4),
    ("five", 5),
    ("six", 6),
    ("seven", 7),
    ("eight", 8),
    ("nine", 9),
    ("ten", 10),
    ("eleven", 11),
    ("twelve", 12),
];

const TRAVELER_WORDS: [&str; 8] = [
    "adult", "adults", "child", "children", "kid", "kids", "baby", "babies",
];

/// Reads a traveler count from "2", "we are two adults" or "no children".
/// Negative numbers are rejected.
pub fn parse_count(text: &str) -> Option<u32> {
    let lower = text.to_lowercase();
    let tokens: Vec<&str> = lower
        .split(|c: char| c.is_whitespace() || c == ',')
        .map(|t| t.trim_end_matches(['.', '!', '?']))
        .filter(|t| !t.is_empty())
        .collect();

    if tokens
        .iter()
        .any(|t| t.starts_with('-') && t[1..].starts_with(|c: char| c.is_ascii_digit()))
    {
        return None;
    }

    // Digits win over words so that "a family of 4" reads as 4.
    if let Some(n) = tokens.iter().find_map(|t| t.parse::<u32>().ok()) {
        return Some(n);
    }
    // "no" is a count only on its own or in front of a traveler noun.
    if let Some(i) = tokens.iter().position(|t| *t == "no") {
        let counted = tokens
            .get(i + 1)
            .is_some_and(|next| TRAVELER_WORDS.iter().any(|w| w == next));
        if tokens.len() == 1 || counted {
            return Some(0);
        }
    }
    if tokens.len() == 1 {
        if let Some(n) = word_number(tokens[0]) {
            return Some(n);
        }
    }
    tokens
        .iter()
        .filter(|t| **t != "a")
        .find_map(|t| word_number(t))
}

fn word_number(token: &str) -> Option<u32> {
    NUMBER_WORDS
        .iter()
        .find_map(|(word, n)| (*word == token).then_some(*n))
}
