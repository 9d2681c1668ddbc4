//! # Activity Repository
//!
//! Audit trail rows written after checkouts and refunds commit.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::DbResult;
use grocer_core::{ActivityAction, ActivityEntry};

/// A stored audit row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct ActivityLog {
    pub id: i64,
    pub actor_id: i64,
    pub action: ActivityAction,
    pub entity_type: String,
    pub entity_id: i64,
    pub details: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct ActivityRepository {
    pool: SqlitePool,
}

impl ActivityRepository {
    pub fn new(pool: SqlitePool) -> Self {
        ActivityRepository { pool }
    }

    pub async fn insert(&self, entry: &ActivityEntry) -> DbResult<i64> {
        debug!(
            actor_id = entry.actor_id,
            action = ?entry.action,
            entity_type = %entry.entity_type,
            entity_id = entry.entity_id,
            "Writing activity log"
        );

        let id: i64 = sqlx::query_scalar(
            "INSERT INTO activity_logs (actor_id, action, entity_type, entity_id, details, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6) \
             RETURNING id",
        )
        .bind(entry.actor_id)
        .bind(entry.action)
        .bind(&entry.entity_type)
        .bind(entry.entity_id)
        .bind(&entry.details)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        Ok(id)
    }

    /// Entries about one entity, oldest first.
    pub async fn list_for(&self, entity_type: &str, entity_id: i64) -> DbResult<Vec<ActivityLog>> {
        let logs = sqlx::query_as::<_, ActivityLog>(
            "SELECT id, actor_id, action, entity_type, entity_id, details, created_at \
             FROM activity_logs \
             WHERE entity_type = ?1 AND entity_id = ?2 \
             ORDER BY id",
        )
        .bind(entity_type)
        .bind(entity_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(logs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};

    #[tokio::test]
    async fn test_insert_and_list() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.activity();

        repo.insert(&ActivityEntry {
            actor_id: 2,
            action: ActivityAction::Refund,
            entity_type: "sale".to_string(),
            entity_id: 5,
            details: "Refund of sale #4".to_string(),
        })
        .await
        .unwrap();

        let logs = repo.list_for("sale", 5).await.unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].action, ActivityAction::Refund);
        assert!(repo.list_for("sale", 4).await.unwrap().is_empty());
    }
}
