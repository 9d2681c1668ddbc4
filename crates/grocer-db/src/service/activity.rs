//! # Activity Sinks
//!
//! Where the audit trail goes after a checkout or refund commits.
//!
//! ```text
//! checkout/refund ── commit ──► sink.record(entry) ──► (returns immediately)
//!                                    │
//!                                    ├── DbActivitySink      spawn → INSERT activity_logs
//!                                    └── TracingActivitySink info! only
//! ```
//!
//! Recording never fails the caller. A lost audit row is logged with
//! `warn!` and the committed sale stands.

use std::sync::Arc;

use tracing::{info, warn};

use crate::repository::activity::ActivityRepository;
use grocer_core::ActivityEntry;

/// Fire-and-forget receiver of audit entries.
pub trait ActivitySink: Send + Sync {
    fn record(&self, entry: ActivityEntry);
}

impl<T: ActivitySink + ?Sized> ActivitySink for Arc<T> {
    fn record(&self, entry: ActivityEntry) {
        (**self).record(entry)
    }
}

/// Writes entries to `activity_logs` on a background task.
#[derive(Debug, Clone)]
pub struct DbActivitySink {
    repo: ActivityRepository,
}

impl DbActivitySink {
    pub fn new(repo: ActivityRepository) -> Self {
        DbActivitySink { repo }
    }
}

impl ActivitySink for DbActivitySink {
    fn record(&self, entry: ActivityEntry) {
        let handle = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                warn!(entity_id = entry.entity_id, "No runtime for activity log, entry dropped");
                return;
            }
        };

        let repo = self.repo.clone();
        handle.spawn(async move {
            if let Err(e) = repo.insert(&entry).await {
                warn!(
                    error = %e,
                    entity_type = %entry.entity_type,
                    entity_id = entry.entity_id,
                    "Failed to write activity log"
                );
            }
        });
    }
}

/// Logs entries through `tracing` only.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingActivitySink;

impl ActivitySink for TracingActivitySink {
    fn record(&self, entry: ActivityEntry) {
        info!(
            actor_id = entry.actor_id,
            action = ?entry.action,
            entity_type = %entry.entity_type,
            entity_id = entry.entity_id,
            details = %entry.details,
            "activity"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use grocer_core::ActivityAction;
    use std::time::Duration;

    #[tokio::test]
    async fn test_db_sink_writes_in_background() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let sink = DbActivitySink::new(db.activity());

        sink.record(ActivityEntry {
            actor_id: 1,
            action: ActivityAction::Create,
            entity_type: "sale".to_string(),
            entity_id: 42,
            details: "{}".to_string(),
        });

        let mut logs = Vec::new();
        for _ in 0..50 {
            logs = db.activity().list_for("sale", 42).await.unwrap();
            if !logs.is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].actor_id, 1);
    }

    #[test]
    fn test_db_sink_without_runtime_drops_quietly() {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let db = rt.block_on(Database::new(DbConfig::in_memory())).unwrap();
        let sink = DbActivitySink::new(db.activity());

        // Outside block_on there is no current runtime
        sink.record(ActivityEntry {
            actor_id: 1,
            action: ActivityAction::Refund,
            entity_type: "sale".to_string(),
            entity_id: 1,
            details: String::new(),
        });
    }
}
