use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;

use crate::errors::AppError;
use crate::services::conversation::{self, ConversationStarted, TurnReply};
use crate::state::AppState;

// POST /api/conversations
pub async fn start(State(state): State<Arc<AppState>>) -> Result<Json<ConversationStarted>, AppError> {
    Ok(Json(conversation::start_conversation(&state)?))
}

#[derive(Deserialize)]
pub struct UserMessage {
    pub text: String,
}

// POST /api/conversations/:id/messages
pub async fn send_message(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(payload): Json<UserMessage>,
) -> Result<Json<TurnReply>, AppError> {
    let text = payload.text.trim();
    if text.is_empty() {
        return Err(AppError::BadRequest("message text is empty".to_string()));
    }

    match conversation::process_message(&state, &id, text).await? {
        Some(reply) => Ok(Json(reply)),
        None => Err(AppError::NotFound(format!("conversation {id}"))),
    }
}
