use std::collections::BTreeMap;

use chrono::{NaiveDateTime, Utc};
use rusqlite::{params, Connection};

use crate::models::{AuditEvent, AuditKind, FlightBooking};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

fn parse_timestamp(value: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(value, TIMESTAMP_FORMAT).unwrap_or_else(|_| Utc::now().naive_utc())
}

// ── Bookings ──

pub fn create_booking(conn: &Connection, booking: &FlightBooking) -> anyhow::Result<()> {
    let created_at = booking.created_at.format(TIMESTAMP_FORMAT).to_string();

    conn.execute(
        "INSERT INTO bookings (id, conversation_id, destination_city, origin_city, departure_date, return_date, budget, adult_count, child_count, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            booking.id,
            booking.conversation_id,
            booking.destination_city,
            booking.origin_city,
            booking.departure_date,
            booking.return_date,
            booking.budget,
            booking.adult_count,
            booking.child_count,
            created_at,
        ],
    )?;
    Ok(())
}

pub fn get_bookings(conn: &Connection, limit: i64) -> anyhow::Result<Vec<FlightBooking>> {
    let mut stmt = conn.prepare(
        "SELECT id, conversation_id, destination_city, origin_city, departure_date, return_date, budget, adult_count, child_count, created_at
         FROM bookings ORDER BY created_at DESC, rowid DESC LIMIT ?1",
    )?;

    let rows = stmt.query_map(params![limit], |row| {
        let created_at: String = row.get(9)?;
        Ok(FlightBooking {
            id: row.get(0)?,
            conversation_id: row.get(1)?,
            destination_city: row.get(2)?,
            origin_city: row.get(3)?,
            departure_date: row.get(4)?,
            return_date: row.get(5)?,
            budget: row.get(6)?,
            adult_count: row.get(7)?,
            child_count: row.get(8)?,
            created_at: parse_timestamp(&created_at),
        })
    })?;

    let mut bookings = vec![];
    for row in rows {
        bookings.push(row?);
    }
    Ok(bookings)
}

// ── Audit ──

pub fn insert_audit_event(conn: &Connection, event: &AuditEvent) -> anyhow::Result<i64> {
    let fields = serde_json::to_string(&event.fields)?;
    let created_at = event.created_at.format(TIMESTAMP_FORMAT).to_string();

    conn.execute(
        "INSERT INTO audit_events (conversation_id, kind, fields, created_at) VALUES (?1, ?2, ?3, ?4)",
        params![event.conversation_id, event.kind.as_str(), fields, created_at],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Most recent events first, optionally for a single conversation.
pub fn get_audit_events(
    conn: &Connection,
    conversation_id: Option<&str>,
    limit: i64,
) -> anyhow::Result<Vec<AuditEvent>> {
    let mut stmt = conn.prepare(
        "SELECT conversation_id, kind, fields, created_at FROM audit_events
         WHERE ?1 IS NULL OR conversation_id = ?1
         ORDER BY id DESC LIMIT ?2",
    )?;

    let rows = stmt.query_map(params![conversation_id, limit], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, String>(3)?,
        ))
    })?;

    let mut events = vec![];
    for row in rows {
        let (conversation_id, kind, fields, created_at) = row?;
        let Some(kind) = AuditKind::parse(&kind) else {
            tracing::warn!(kind = %kind, "skipping audit event of unknown kind");
            continue;
        };
        let fields: BTreeMap<String, String> = serde_json::from_str(&fields).unwrap_or_default();
        events.push(AuditEvent {
            conversation_id,
            kind,
            fields,
            created_at: parse_timestamp(&created_at),
        });
    }
    Ok(events)
}
