use std::fmt;

use chrono::{Datelike, Duration, NaiveDate, Weekday};

const MONTHS: [(&str, u32); 12] = [
    ("january", 1),
    ("february", 2),
    ("march", 3),
    ("april", 4),
    ("may", 5),
    ("june", 6),
    ("july", 7),
    ("august", 8),
    ("september", 9),
    ("october", 10),
    ("november", 11),
    ("december", 12),
];

const SUBJECTS: [&str; 8] = ["i", "we", "you", "they", "he", "she", "it", "who"];

const WEEKDAYS: [(&str, Weekday); 7] = [
    ("monday", Weekday::Mon),
    ("tuesday", Weekday::Tue),
    ("wednesday", Weekday::Wed),
    ("thursday", Weekday::Thu),
    ("friday", Weekday::Fri),
    ("saturday", Weekday::Sat),
    ("sunday", Weekday::Sun),
];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DateParseError {
    #[error("no date found in {0:?}")]
    NoDate(String),

    #[error("not a valid calendar date: {0:?}")]
    InvalidDate(String),

    #[error("unrecognized date expression: {0:?}")]
    Unrecognized(String),
}

/// A possibly partial date, rendered as a TIMEX string.
///
/// Only [`DateExpression::Definite`] pins down a single calendar day; every
/// other form is ambiguous and has to go through the date resolver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DateExpression {
    Definite(NaiveDate),
    /// `XXXX-03-01`: day and month without a year.
    MonthDay { month: u32, day: u32 },
    /// `2023-03` or `XXXX-03`.
    Month { year: Option<i32>, month: u32 },
    /// `XXXX-WXX-1`: any Monday.
    Weekday(Weekday),
    /// `(start,end)`, or `(start,)` when open-ended.
    Range {
        start: Box<DateExpression>,
        end: Option<Box<DateExpression>>,
    },
}

impl DateExpression {
    pub fn is_definite(&self) -> bool {
        matches!(self, DateExpression::Definite(_))
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            DateExpression::Definite(date) => Some(*date),
            _ => None,
        }
    }

    pub fn from_timex(timex: &str) -> Result<Self, DateParseError> {
        let timex = timex.trim();

        if let Some(inner) = timex.strip_prefix('(').and_then(|s| s.strip_suffix(')')) {
            let mut parts = inner.split(',').map(str::trim);
            let start = parts
                .next()
                .filter(|s| !s.is_empty())
                .ok_or_else(|| DateParseError::Unrecognized(timex.to_string()))?;
            // A trailing duration such as `P14D` is not an end date.
            let end = parts.next().filter(|s| !s.is_empty() && !s.starts_with('P'));
            return Ok(DateExpression::Range {
                start: Box::new(Self::from_timex(start)?),
                end: match end {
                    Some(end) => Some(Box::new(Self::from_timex(end)?)),
                    None => None,
                },
            });
        }

        // Only the date part matters.
        let date_part = timex.split('T').next().unwrap_or(timex);

        if let Ok(date) = NaiveDate::parse_from_str(date_part, "%Y-%m-%d") {
            return Ok(DateExpression::Definite(date));
        }

        let parts: Vec<&str> = date_part.split('-').collect();
        match parts.as_slice() {
            ["XXXX", "WXX", day] => {
                let index: usize = day
                    .parse()
                    .map_err(|_| DateParseError::Unrecognized(timex.to_string()))?;
                match index {
                    1..=7 => Ok(DateExpression::Weekday(WEEKDAYS[index - 1].1)),
                    _ => Err(DateParseError::InvalidDate(timex.to_string())),
                }
            }
            ["XXXX", month, day] => {
                let month = parse_component(month, timex)?;
                let day = parse_component(day, timex)?;
                month_day(month, day).ok_or_else(|| DateParseError::InvalidDate(timex.to_string()))
            }
            [year, month] => {
                let month = parse_component(month, timex)?;
                if !(1..=12).contains(&month) {
                    return Err(DateParseError::InvalidDate(timex.to_string()));
                }
                let year = match *year {
                    "XXXX" => None,
                    y => Some(
                        y.parse::<i32>()
                            .map_err(|_| DateParseError::Unrecognized(timex.to_string()))?,
                    ),
                };
                Ok(DateExpression::Month { year, month })
            }
            [_, _, _] => Err(DateParseError::InvalidDate(timex.to_string())),
            _ => Err(DateParseError::Unrecognized(timex.to_string())),
        }
    }
}

impl fmt::Display for DateExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DateExpression::Definite(date) => write!(f, "{}", date.format("%Y-%m-%d")),
            DateExpression::MonthDay { month, day } => write!(f, "XXXX-{month:02}-{day:02}"),
            DateExpression::Month { year: Some(year), month } => write!(f, "{year:04}-{month:02}"),
            DateExpression::Month { year: None, month } => write!(f, "XXXX-{month:02}"),
            DateExpression::Weekday(weekday) => {
                write!(f, "XXXX-WXX-{}", weekday.number_from_monday())
            }
            DateExpression::Range { start, end: Some(end) } => write!(f, "({start},{end})"),
            DateExpression::Range { start, end: None } => write!(f, "({start},)"),
        }
    }
}

/// True unless `timex` names exactly one calendar day. Unparseable input
/// counts as ambiguous.
pub fn is_ambiguous(timex: &str) -> bool {
    DateExpression::from_timex(timex)
        .map(|expr| !expr.is_definite())
        .unwrap_or(true)
}

/// The calendar day a TIMEX string denotes, if it is definite.
pub fn definite_date(timex: &str) -> Option<NaiveDate> {
    DateExpression::from_timex(timex)
        .ok()
        .and_then(|expr| expr.as_date())
}

pub trait DateParser: Send + Sync {
    fn parse(&self, text: &str) -> Result<DateExpression, DateParseError>;
}

/// Parses English date phrases such as "the 1st of march, 2023",
/// "march 15", "on friday" or "tomorrow", and numeric dates like
/// "03/10/2023" (month first).
#[derive(Debug, Clone, Default)]
pub struct NaturalDateParser {
    today: Option<NaiveDate>,
}

impl NaturalDateParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pins the reference date used for "today" and "tomorrow".
    pub fn with_today(today: NaiveDate) -> Self {
        Self { today: Some(today) }
    }

    fn today(&self) -> NaiveDate {
        self.today
            .unwrap_or_else(|| chrono::Utc::now().date_naive())
    }

    fn parse_single(&self, text: &str) -> Result<DateExpression, DateParseError> {
        for word in text.split_whitespace() {
            if let Some((y, m, d)) = numeric_date(word.trim_matches(|c: char| !c.is_ascii_digit())) {
                return NaiveDate::from_ymd_opt(y, m, d)
                    .map(DateExpression::Definite)
                    .ok_or_else(|| DateParseError::InvalidDate(text.to_string()));
            }
        }

        let tokens = tokenize(text);

        if tokens.iter().any(|t| t == "today") {
            return Ok(DateExpression::Definite(self.today()));
        }
        if tokens.iter().any(|t| t == "tomorrow") {
            return Ok(DateExpression::Definite(self.today() + Duration::days(1)));
        }

        let month = pick_month(&tokens);
        let mut year = None;
        let mut day = None;
        let mut weekday = None;

        for token in &tokens {
            if month_from_word(token).is_some() {
                continue;
            }
            if weekday.is_none() {
                if let Some(w) = weekday_from_word(token) {
                    weekday = Some(w);
                    continue;
                }
            }
            if let Some(n) = strip_ordinal(token).and_then(|d| d.parse::<u32>().ok()) {
                if (1000..=9999).contains(&n) && year.is_none() {
                    year = Some(n as i32);
                } else if (1..=31).contains(&n) && day.is_none() {
                    day = Some(n);
                }
            }
        }

        match (year, month, day) {
            (Some(y), Some(m), Some(d)) => NaiveDate::from_ymd_opt(y, m, d)
                .map(DateExpression::Definite)
                .ok_or_else(|| DateParseError::InvalidDate(text.to_string())),
            (None, Some(m), Some(d)) => {
                month_day(m, d).ok_or_else(|| DateParseError::InvalidDate(text.to_string()))
            }
            (y, Some(m), None) => Ok(DateExpression::Month { year: y, month: m }),
            _ => match weekday {
                Some(w) => Ok(DateExpression::Weekday(w)),
                None => Err(DateParseError::NoDate(text.to_string())),
            },
        }
    }
}

impl DateParser for NaturalDateParser {
    fn parse(&self, text: &str) -> Result<DateExpression, DateParseError> {
        let trimmed = text.trim();
        if let Ok(expr) = DateExpression::from_timex(trimmed) {
            return Ok(expr);
        }

        let lower = trimmed.to_lowercase();

        for separator in [" to ", " until ", " till "] {
            if let Some((left, right)) = lower.split_once(separator) {
                if let (Ok(start), Ok(end)) = (self.parse_single(left), self.parse_single(right)) {
                    return Ok(DateExpression::Range {
                        start: Box::new(start),
                        end: Some(Box::new(end)),
                    });
                }
            }
        }

        for marker in ["after ", "since "] {
            if let Some((_, rest)) = lower.split_once(marker) {
                if let Ok(start) = self.parse_single(rest) {
                    return Ok(DateExpression::Range {
                        start: Box::new(start),
                        end: None,
                    });
                }
            }
        }

        self.parse_single(&lower)
    }
}

fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| c.is_whitespace() || c == ',' || c == '/')
        .map(|t| t.trim_matches(|c: char| !c.is_alphanumeric() && c != '-'))
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Reads `m/d/yyyy`, or `d/m/yyyy` when the first number cannot be a month,
/// or `yyyy/m/d`. `-` and `.` work as separators too.
fn numeric_date(word: &str) -> Option<(i32, u32, u32)> {
    let parts: Vec<&str> = word.split(|c: char| matches!(c, '/' | '-' | '.')).collect();
    let [first, second, third] = parts.as_slice() else {
        return None;
    };
    if !parts
        .iter()
        .all(|p| !p.is_empty() && p.chars().all(|ch| ch.is_ascii_digit()))
    {
        return None;
    }
    let (a, b, c): (u32, u32, u32) = (first.parse().ok()?, second.parse().ok()?, third.parse().ok()?);

    match (first.len(), third.len()) {
        (4, 1..=2) => Some((a as i32, b, c)),
        (1..=2, 4) if a > 12 => Some((c as i32, b, a)),
        (1..=2, 4) => Some((c as i32, a, b)),
        _ => None,
    }
}

/// The month named in the text. "may" after a subject pronoun is the verb,
/// and any other month word outranks a bare "may".
fn pick_month(tokens: &[String]) -> Option<u32> {
    let mut fallback = None;
    for (i, token) in tokens.iter().enumerate() {
        let Some(month) = month_from_word(token) else {
            continue;
        };
        if token != "may" {
            return Some(month);
        }
        let modal = i
            .checked_sub(1)
            .is_some_and(|p| SUBJECTS.iter().any(|s| *s == tokens[p]));
        if !modal && fallback.is_none() {
            fallback = Some(month);
        }
    }
    fallback
}

fn parse_component(value: &str, timex: &str) -> Result<u32, DateParseError> {
    value
        .parse()
        .map_err(|_| DateParseError::Unrecognized(timex.to_string()))
}

fn month_day(month: u32, day: u32) -> Option<DateExpression> {
    // 2000 is a leap year, so 29 February is accepted.
    NaiveDate::from_ymd_opt(2000, month, day).map(|d| DateExpression::MonthDay {
        month: d.month(),
        day: d.day(),
    })
}

fn month_from_word(token: &str) -> Option<u32> {
    if token.len() < 3 {
        return None;
    }
    MONTHS.iter().find_map(|(name, number)| {
        let abbreviation = token.len() <= 4 && name.starts_with(token);
        (*name == token || abbreviation).then_some(*number)
    })
}

fn weekday_from_word(token: &str) -> Option<Weekday> {
    WEEKDAYS.iter().find_map(|(name, weekday)| {
        let abbreviation = token.len() == 3 && name.starts_with(token);
        (*name == token || *name == token.trim_end_matches('s') || abbreviation)
            .then_some(*weekday)
    })
}

fn strip_ordinal(token: &str) -> Option<&str> {
    let digits = ["st", "nd", "rd", "th"]
        .iter()
        .find_map(|suffix| token.strip_suffix(suffix))
        .unwrap_or(token);
    (!digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit())).then_some(digits)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parser() -> NaturalDateParser {
        NaturalDateParser::with_today(NaiveDate::from_ymd_opt(2023, 2, 10).unwrap())
    }

    fn ymd(y: i32, m: u32, d: u32) -> DateExpression {
        DateExpression::Definite(NaiveDate::from_ymd_opt(y, m, d).unwrap())
    }

    #[test]
    fn test_timex_forms() {
        assert_eq!(DateExpression::from_timex("2023-03-01").unwrap(), ymd(2023, 3, 1));
        assert_eq!(
            DateExpression::from_timex("XXXX-03-01").unwrap(),
            DateExpression::MonthDay { month: 3, day: 1 }
        );
        assert_eq!(
            DateExpression::from_timex("XXXX-03").unwrap(),
            DateExpression::Month { year: None, month: 3 }
        );
        assert_eq!(
            DateExpression::from_timex("XXXX-WXX-5").unwrap(),
            DateExpression::Weekday(Weekday::Fri)
        );
        assert_eq!(
            DateExpression::from_timex("2023-03-01T10:00").unwrap(),
            ymd(2023, 3, 1)
        );
    }

    #[test]
    fn test_timex_display_matches_input() {
        for timex in ["2023-03-01", "XXXX-03-01", "2023-03", "XXXX-WXX-1", "(2023-03-01,2023-03-15)"] {
            assert_eq!(DateExpression::from_timex(timex).unwrap().to_string(), timex);
        }
    }

    #[test]
    fn test_timex_range_with_duration() {
        let expr = DateExpression::from_timex("(2023-03-01,2023-03-15,P14D)").unwrap();
        assert!(!expr.is_definite());
        assert_eq!(expr.to_string(), "(2023-03-01,2023-03-15)");
    }

    #[test]
    fn test_invalid_timex() {
        assert!(matches!(
            DateExpression::from_timex("2023-02-30"),
            Err(DateParseError::InvalidDate(_))
        ));
        assert!(DateExpression::from_timex("soon").is_err());
    }

    #[test]
    fn test_ambiguity() {
        assert!(!is_ambiguous("2023-03-01"));
        assert!(is_ambiguous("XXXX-03-01"));
        assert!(is_ambiguous("XXXX-03"));
        assert!(is_ambiguous("XXXX-WXX-1"));
        assert!(is_ambiguous("(2023-03-01,)"));
        assert!(is_ambiguous("next week-ish"));
    }

    #[test]
    fn test_natural_full_dates() {
        let p = parser();
        assert_eq!(p.parse("1st of march 2023").unwrap(), ymd(2023, 3, 1));
        assert_eq!(
            p.parse("I want to go the 1st of march, 2023").unwrap(),
            ymd(2023, 3, 1)
        );
        assert_eq!(
            p.parse("I would like to return the 15th of march, 2023").unwrap(),
            ymd(2023, 3, 15)
        );
        assert_eq!(p.parse("August 10th, 2023").unwrap(), ymd(2023, 8, 10));
        assert_eq!(p.parse("on 2023-08-15 please").unwrap(), ymd(2023, 8, 15));
    }

    #[test]
    fn test_natural_partial_dates() {
        let p = parser();
        assert_eq!(
            p.parse("march 1st").unwrap(),
            DateExpression::MonthDay { month: 3, day: 1 }
        );
        assert_eq!(
            p.parse("sometime in march").unwrap(),
            DateExpression::Month { year: None, month: 3 }
        );
        assert_eq!(
            p.parse("sept 2023").unwrap(),
            DateExpression::Month { year: Some(2023), month: 9 }
        );
        assert_eq!(p.parse("on friday").unwrap(), DateExpression::Weekday(Weekday::Fri));
    }

    #[test]
    fn test_natural_relative_dates() {
        let p = parser();
        assert_eq!(p.parse("today").unwrap(), ymd(2023, 2, 10));
        assert_eq!(p.parse("Tomorrow!").unwrap(), ymd(2023, 2, 11));
    }

    #[test]
    fn test_natural_ranges() {
        let p = parser();
        let closed = p.parse("march 1 2023 to march 15 2023").unwrap();
        assert_eq!(closed.to_string(), "(2023-03-01,2023-03-15)");
        let open = p.parse("any day after march 3").unwrap();
        assert_eq!(open.to_string(), "(XXXX-03-03,)");
        // "to" inside a sentence is not a range separator on its own.
        assert_eq!(p.parse("I want to go on 1 may 2023").unwrap(), ymd(2023, 5, 1));
    }

    #[test]
    fn test_modal_may_is_not_a_month() {
        let p = parser();
        assert_eq!(
            p.parse("I may leave on the 3rd of june 2023").unwrap(),
            ymd(2023, 6, 3)
        );
        assert_eq!(p.parse("we may fly on the 3rd of may 2023").unwrap(), ymd(2023, 5, 3));
        assert!(matches!(
            p.parse("I may leave on the 3rd"),
            Err(DateParseError::NoDate(_))
        ));
        assert_eq!(
            p.parse("early may").unwrap(),
            DateExpression::Month { year: None, month: 5 }
        );
    }

    #[test]
    fn test_numeric_dates() {
        let p = parser();
        assert_eq!(p.parse("03/10/2023").unwrap(), ymd(2023, 3, 10));
        assert_eq!(p.parse("on 25/03/2023, please").unwrap(), ymd(2023, 3, 25));
        assert_eq!(p.parse("3-10-2023").unwrap(), ymd(2023, 3, 10));
        assert_eq!(p.parse("03.10.2023").unwrap(), ymd(2023, 3, 10));
        assert_eq!(p.parse("2023/8/15").unwrap(), ymd(2023, 8, 15));
        assert_eq!(
            p.parse("03/10/2023 to 03/15/2023").unwrap().to_string(),
            "(2023-03-10,2023-03-15)"
        );
        assert!(matches!(
            p.parse("13/13/2023"),
            Err(DateParseError::InvalidDate(_))
        ));
    }

    #[test]
    fn test_natural_failures() {
        let p = parser();
        assert!(matches!(p.parse("whenever"), Err(DateParseError::NoDate(_))));
        assert!(matches!(
            p.parse("30th of february 2023"),
            Err(DateParseError::InvalidDate(_))
        ));
    }
}
