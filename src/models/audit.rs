use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum AuditKind {
    SlotFilled,
    Success,
    Fail,
    Cancelled,
    Abandoned,
}

impl AuditKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditKind::SlotFilled => "SlotFilled",
            AuditKind::Success => "Success",
            AuditKind::Fail => "Fail",
            AuditKind::Cancelled => "Cancelled",
            AuditKind::Abandoned => "Abandoned",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "SlotFilled" => Some(AuditKind::SlotFilled),
            "Success" => Some(AuditKind::Success),
            "Fail" => Some(AuditKind::Fail),
            "Cancelled" => Some(AuditKind::Cancelled),
            "Abandoned" => Some(AuditKind::Abandoned),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuditEvent {
    pub conversation_id: String,
    pub kind: AuditKind,
    pub fields: BTreeMap<String, String>,
    pub created_at: NaiveDateTime,
}

impl AuditEvent {
    pub fn new(conversation_id: &str, kind: AuditKind) -> Self {
        Self {
            conversation_id: conversation_id.to_string(),
            kind,
            fields: BTreeMap::new(),
            created_at: chrono::Utc::now().naive_utc(),
        }
    }

    pub fn field(mut self, key: &str, value: impl Into<String>) -> Self {
        self.fields.insert(key.to_string(), value.into());
        self
    }
}
