use std::sync::Arc;

use super::dates::{is_ambiguous, DateParser};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateRole {
    Departure,
    Return,
}

impl DateRole {
    pub fn dialog_id(&self) -> &'static str {
        match self {
            DateRole::Departure => "departure_date_resolver",
            DateRole::Return => "return_date_resolver",
        }
    }

    fn prompt(&self) -> &'static str {
        match self {
            DateRole::Departure => "On what date would you like to travel?",
            DateRole::Return => "On what date would you like to come back?",
        }
    }

    fn retry_prompt(&self) -> &'static str {
        match self {
            DateRole::Departure => {
                "I'm sorry, for best results, please enter your travel date including the month, day and year."
            }
            DateRole::Return => {
                "I'm sorry, for best results, please enter your return date including the month, day and year."
            }
        }
    }
}

/// State of a date sub-dialog waiting for the user's reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateResolution {
    pub dialog_id: &'static str,
    pub prompt: String,
    pub attempts: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolve {
    Resolved(String),
    Ask(DateResolution),
}

/// Turns a possibly ambiguous date into a definite one, asking the user as
/// many times as it takes.
pub struct AmbiguousDateResolver {
    role: DateRole,
    parser: Arc<dyn DateParser>,
}

impl AmbiguousDateResolver {
    pub fn new(role: DateRole, parser: Arc<dyn DateParser>) -> Self {
        Self { role, parser }
    }

    pub fn dialog_id(&self) -> &'static str {
        self.role.dialog_id()
    }

    pub fn resolve(&self, raw: Option<&str>) -> Resolve {
        match raw {
            Some(timex) if !is_ambiguous(timex) => Resolve::Resolved(timex.to_string()),
            _ => Resolve::Ask(DateResolution {
                dialog_id: self.dialog_id(),
                prompt: self.role.prompt().to_string(),
                attempts: 0,
            }),
        }
    }

    pub fn resume(&self, state: DateResolution, reply: &str) -> Resolve {
        if state.dialog_id != self.dialog_id() {
            tracing::warn!(
                expected = self.dialog_id(),
                got = state.dialog_id,
                "date resolution handed to the wrong resolver, restarting"
            );
            return self.resolve(None);
        }

        match self.parser.parse(reply) {
            Ok(expr) if expr.is_definite() => Resolve::Resolved(expr.to_string()),
            Ok(expr) => {
                tracing::debug!(dialog = self.dialog_id(), timex = %expr, "date still ambiguous");
                self.reask(state, self.role.retry_prompt())
            }
            Err(e) => {
                tracing::debug!(dialog = self.dialog_id(), error = %e, "could not parse date");
                self.reask(state, self.role.retry_prompt())
            }
        }
    }

    /// Asks again with a specific prompt, counting the failed attempt.
    pub fn reask(&self, state: DateResolution, prompt: &str) -> Resolve {
        Resolve::Ask(DateResolution {
            dialog_id: self.dialog_id(),
            prompt: prompt.to_string(),
            attempts: state.attempts + 1,
        })
    }
}
