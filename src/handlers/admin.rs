use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::db::queries;
use crate::errors::AppError;
use crate::state::AppState;

fn check_auth(headers: &HeaderMap, expected_token: &str) -> Result<(), AppError> {
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    let token = auth.strip_prefix("Bearer ").unwrap_or("");
    if expected_token.is_empty() || token != expected_token {
        return Err(AppError::Unauthorized);
    }
    Ok(())
}

fn clamp_limit(limit: Option<i64>) -> i64 {
    limit.unwrap_or(50).clamp(1, 500)
}

// GET /api/admin/bookings
#[derive(Deserialize)]
pub struct BookingsQuery {
    pub limit: Option<i64>,
}

#[derive(Serialize)]
pub struct BookingResponse {
    id: String,
    conversation_id: String,
    destination_city: String,
    origin_city: String,
    departure_date: String,
    return_date: String,
    budget: String,
    adult_count: u32,
    child_count: u32,
    created_at: String,
}

pub async fn get_bookings(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<BookingsQuery>,
) -> Result<Json<Vec<BookingResponse>>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let bookings = {
        let db = state
            .db
            .lock()
            .map_err(|_| anyhow::anyhow!("database lock poisoned"))?;
        queries::get_bookings(&db, clamp_limit(query.limit))?
    };

    let response = bookings
        .into_iter()
        .map(|b| BookingResponse {
            id: b.id,
            conversation_id: b.conversation_id,
            destination_city: b.destination_city,
            origin_city: b.origin_city,
            departure_date: b.departure_date,
            return_date: b.return_date,
            budget: b.budget,
            adult_count: b.adult_count,
            child_count: b.child_count,
            created_at: b.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
        })
        .collect();

    Ok(Json(response))
}

// GET /api/admin/audit
#[derive(Deserialize)]
pub struct AuditQuery {
    pub conversation_id: Option<String>,
    pub limit: Option<i64>,
}

#[derive(Serialize)]
pub struct AuditResponse {
    conversation_id: String,
    kind: String,
    fields: serde_json::Value,
    created_at: String,
}

pub async fn get_audit(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<AuditQuery>,
) -> Result<Json<Vec<AuditResponse>>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let events = {
        let db = state
            .db
            .lock()
            .map_err(|_| anyhow::anyhow!("database lock poisoned"))?;
        queries::get_audit_events(&db, query.conversation_id.as_deref(), clamp_limit(query.limit))?
    };

    let response = events
        .into_iter()
        .map(|e| AuditResponse {
            conversation_id: e.conversation_id,
            kind: e.kind.as_str().to_string(),
            fields: serde_json::json!(e.fields),
            created_at: e.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
        })
        .collect();

    Ok(Json(response))
}
