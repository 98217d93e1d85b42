use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{Duration, NaiveDateTime, Utc};
use serde::Serialize;

use crate::db::queries;
use crate::models::{BookingRecord, Conversation, FlightBooking};
use crate::state::AppState;

struct Entry {
    conversation: Arc<tokio::sync::Mutex<Conversation>>,
    expires_at: NaiveDateTime,
}

/// Live conversations keyed by id. Each conversation sits behind its own
/// async lock so turns for one conversation run one at a time while
/// different conversations proceed independently.
pub struct ConversationStore {
    entries: Mutex<HashMap<String, Entry>>,
    ttl: Duration,
}

impl ConversationStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    fn lock(&self) -> anyhow::Result<MutexGuard<'_, HashMap<String, Entry>>> {
        self.entries
            .lock()
            .map_err(|_| anyhow::anyhow!("conversation store lock poisoned"))
    }

    pub fn create(&self) -> anyhow::Result<String> {
        let id = uuid::Uuid::new_v4().to_string();
        let entry = Entry {
            conversation: Arc::new(tokio::sync::Mutex::new(Conversation::new(&id))),
            expires_at: Utc::now().naive_utc() + self.ttl,
        };
        self.lock()?.insert(id.clone(), entry);
        Ok(id)
    }

    /// Returns the conversation and pushes its expiry out, or `None` when
    /// the id is unknown or has gone idle for too long.
    pub fn get(&self, id: &str) -> anyhow::Result<Option<Arc<tokio::sync::Mutex<Conversation>>>> {
        let now = Utc::now().naive_utc();
        let mut entries = self.lock()?;

        match entries.get_mut(id) {
            Some(entry) if entry.expires_at > now => {
                entry.expires_at = now + self.ttl;
                Ok(Some(Arc::clone(&entry.conversation)))
            }
            Some(_) => {
                entries.remove(id);
                tracing::info!(conversation_id = id, "conversation expired");
                Ok(None)
            }
            None => Ok(None),
        }
    }

    pub fn expire_idle(&self) -> anyhow::Result<usize> {
        let now = Utc::now().naive_utc();
        let mut entries = self.lock()?;
        let before = entries.len();
        entries.retain(|_, entry| entry.expires_at > now);
        Ok(before - entries.len())
    }

    pub fn len(&self) -> usize {
        self.lock().map(|entries| entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Serialize)]
pub struct ConversationStarted {
    pub conversation_id: String,
    pub replies: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct TurnReply {
    pub replies: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub booking: Option<FlightBooking>,
}

pub fn start_conversation(state: &Arc<AppState>) -> anyhow::Result<ConversationStarted> {
    let conversation_id = state.conversations.create()?;
    tracing::info!(conversation_id = %conversation_id, "conversation started");
    Ok(ConversationStarted {
        conversation_id,
        replies: state.router.greet(),
    })
}

/// Runs one user turn. `Ok(None)` means the conversation does not exist.
pub async fn process_message(
    state: &Arc<AppState>,
    conversation_id: &str,
    text: &str,
) -> anyhow::Result<Option<TurnReply>> {
    let Some(handle) = state.conversations.get(conversation_id)? else {
        return Ok(None);
    };
    let mut conversation = handle.lock().await;

    let outcome = state.router.route(&mut conversation, text).await;

    tracing::info!(
        conversation_id,
        state = conversation.state().as_str(),
        replies = outcome.replies.len(),
        "turn processed"
    );

    let Some(record) = outcome.booking else {
        return Ok(Some(TurnReply {
            replies: outcome.replies,
            booking: None,
        }));
    };

    match save_booking(state, conversation_id, &record) {
        Ok(booking) => {
            tracing::info!(conversation_id, booking_id = %booking.id, "booking saved");
            Ok(Some(TurnReply {
                replies: outcome.replies,
                booking: Some(booking),
            }))
        }
        Err(e) => {
            tracing::error!(conversation_id, error = %e, "failed to save booking");
            Ok(Some(TurnReply {
                replies: state.router.reconfirm(&mut conversation, record),
                booking: None,
            }))
        }
    }
}

fn save_booking(
    state: &AppState,
    conversation_id: &str,
    record: &BookingRecord,
) -> anyhow::Result<FlightBooking> {
    let booking = FlightBooking::from_record(conversation_id, record)?;
    let db = state
        .db
        .lock()
        .map_err(|_| anyhow::anyhow!("database lock poisoned"))?;
    queries::create_booking(&db, &booking)?;
    Ok(booking)
}

/// Periodically drops conversations that have been idle past their TTL.
pub fn spawn_expiry_task(state: Arc<AppState>) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(60));
        loop {
            interval.tick().await;
            match state.conversations.expire_idle() {
                Ok(0) => {}
                Ok(n) => tracing::info!(expired = n, "expired idle conversations"),
                Err(e) => tracing::error!(error = %e, "failed to expire conversations"),
            }
        }
    });
}
