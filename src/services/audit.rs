use std::sync::{Arc, Mutex};

use rusqlite::Connection;
use tokio::sync::mpsc;

use crate::db::queries;
use crate::models::AuditEvent;

/// Destination for audit events. Recording must not block the dialog.
pub trait AuditSink: Send + Sync {
    fn record(&self, event: AuditEvent) -> anyhow::Result<()>;
}

/// Records an event, logging instead of propagating failures.
pub fn emit(sink: &dyn AuditSink, event: AuditEvent) {
    let kind = event.kind.as_str();
    let conversation_id = event.conversation_id.clone();
    if let Err(e) = sink.record(event) {
        tracing::warn!(conversation_id = %conversation_id, kind, error = %e, "failed to record audit event");
    }
}

/// Queues events for a background task that writes them to SQLite.
pub struct SqliteAuditSink {
    tx: mpsc::UnboundedSender<AuditEvent>,
}

impl SqliteAuditSink {
    /// Starts the writer task. Must be called inside a tokio runtime.
    pub fn spawn(db: Arc<Mutex<Connection>>) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<AuditEvent>();

        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                let result = match db.lock() {
                    Ok(conn) => queries::insert_audit_event(&conn, &event),
                    Err(_) => Err(anyhow::anyhow!("database lock poisoned")),
                };
                if let Err(e) = result {
                    tracing::error!(
                        conversation_id = %event.conversation_id,
                        kind = event.kind.as_str(),
                        error = %e,
                        "failed to write audit event"
                    );
                }
            }
            tracing::debug!("audit writer stopped");
        });

        Self { tx }
    }
}

impl AuditSink for SqliteAuditSink {
    fn record(&self, event: AuditEvent) -> anyhow::Result<()> {
        self.tx
            .send(event)
            .map_err(|_| anyhow::anyhow!("audit writer is not running"))
    }
}


#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::db::migrations::run_migrations;
    use crate::models::AuditKind;

    #[tokio::test]
    async fn test_sqlite_sink_writes_in_background() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        let db = Arc::new(Mutex::new(conn));
        let sink = SqliteAuditSink::spawn(db.clone());

        emit(&sink, AuditEvent::new("conv-1", AuditKind::Cancelled).field("slot", "budget"));

        let mut stored = vec![];
        for _ in 0..50 {
            stored = queries::get_audit_events(&db.lock().unwrap(), None, 10).unwrap();
            if !stored.is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].kind, AuditKind::Cancelled);
        assert_eq!(stored[0].fields["slot"], "budget");
    }
}
