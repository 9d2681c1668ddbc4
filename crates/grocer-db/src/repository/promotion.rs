//! # Promotion Repository
//!
//! Promotions are plain rows. Whether one applies is decided by
//! `grocer_core::promotion::evaluate` at pricing time, never stored.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::DbResult;
use grocer_core::validation::validate_name;
use grocer_core::{CoreError, Promotion, PromotionDraft, PromotionKind, ValidationError};

const PROMOTION_COLUMNS: &str =
    "id, name, kind, value, min_purchase_cents, valid_from, valid_to, active, created_at";

#[derive(Debug, Clone)]
pub struct PromotionRepository {
    pool: SqlitePool,
}

impl PromotionRepository {
    pub fn new(pool: SqlitePool) -> Self {
        PromotionRepository { pool }
    }

    /// Inserts a promotion after checking its value and window.
    pub async fn insert(&self, draft: &PromotionDraft) -> DbResult<Promotion> {
        validate_promotion(draft)?;

        debug!(name = %draft.name, kind = ?draft.kind, value = draft.value, "Inserting promotion");

        let promotion = sqlx::query_as::<_, Promotion>(&format!(
            "INSERT INTO promotions \
                (name, kind, value, min_purchase_cents, valid_from, valid_to, active, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8) \
             RETURNING {PROMOTION_COLUMNS}"
        ))
        .bind(draft.name.trim())
        .bind(draft.kind)
        .bind(draft.value)
        .bind(draft.min_purchase.map(|m| m.cents()))
        .bind(draft.valid_from)
        .bind(draft.valid_to)
        .bind(draft.active)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        Ok(promotion)
    }

    pub async fn get_by_id(&self, id: i64) -> DbResult<Option<Promotion>> {
        let promotion = sqlx::query_as::<_, Promotion>(&format!(
            "SELECT {PROMOTION_COLUMNS} FROM promotions WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(promotion)
    }

    /// Promotions that are active and inside their window at `now`.
    pub async fn list_active(&self, now: DateTime<Utc>) -> DbResult<Vec<Promotion>> {
        let candidates = sqlx::query_as::<_, Promotion>(&format!(
            "SELECT {PROMOTION_COLUMNS} FROM promotions WHERE active = 1 ORDER BY name, id"
        ))
        .fetch_all(&self.pool)
        .await?;

        // Window check on parsed timestamps; TEXT comparison is format-sensitive
        Ok(candidates
            .into_iter()
            .filter(|p| p.is_valid_at(now))
            .collect())
    }

    /// Turns a promotion on or off.
    pub async fn set_active(&self, id: i64, active: bool) -> DbResult<()> {
        debug!(id = id, active = active, "Setting promotion active flag");

        let result = sqlx::query("UPDATE promotions SET active = ?2 WHERE id = ?1")
            .bind(id)
            .bind(active)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(CoreError::PromotionNotFound(id).into());
        }

        Ok(())
    }
}

fn validate_promotion(draft: &PromotionDraft) -> Result<(), ValidationError> {
    validate_name("promotion name", &draft.name)?;

    match draft.kind {
        PromotionKind::Percentage if !(0..=10_000).contains(&draft.value) => {
            return Err(ValidationError::OutOfRange {
                field: "value".to_string(),
                min: 0,
                max: 10_000,
            });
        }
        PromotionKind::Fixed if draft.value < 0 => {
            return Err(ValidationError::OutOfRange {
                field: "value".to_string(),
                min: 0,
                max: i64::MAX,
            });
        }
        _ => {}
    }

    if matches!(draft.min_purchase, Some(m) if m.is_negative()) {
        return Err(ValidationError::OutOfRange {
            field: "min_purchase".to_string(),
            min: 0,
            max: i64::MAX,
        });
    }

    if let (Some(from), Some(to)) = (draft.valid_from, draft.valid_to) {
        if from > to {
            return Err(ValidationError::InvalidFormat {
                field: "valid_to".to_string(),
                reason: "must not be before valid_from".to_string(),
            });
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use chrono::Duration;
    use grocer_core::Money;

    #[tokio::test]
    async fn test_insert_and_get() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.promotions();

        let promo = repo
            .insert(&PromotionDraft::fixed("Five Off", Money::from_cents(500)).min_purchase(Money::from_cents(5000)))
            .await
            .unwrap();

        let loaded = repo.get_by_id(promo.id).await.unwrap().unwrap();
        assert_eq!(loaded.kind, PromotionKind::Fixed);
        assert_eq!(loaded.value, 500);
        assert_eq!(loaded.min_purchase_cents, Some(5000));
        assert!(loaded.active);
    }

    #[tokio::test]
    async fn test_list_active_filters_window_and_flag() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.promotions();
        let now = Utc::now();

        let current = repo
            .insert(&PromotionDraft::percentage("Current", "10").unwrap()
                .window(Some(now - Duration::days(1)), Some(now + Duration::days(1))))
            .await
            .unwrap();
        repo.insert(&PromotionDraft::percentage("Future", "10").unwrap()
            .window(Some(now + Duration::days(1)), None))
            .await
            .unwrap();
        repo.insert(&PromotionDraft::percentage("Past", "10").unwrap()
            .window(None, Some(now - Duration::days(1))))
            .await
            .unwrap();
        repo.insert(&PromotionDraft::percentage("Off", "10").unwrap().inactive())
            .await
            .unwrap();

        let active = repo.list_active(now).await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, current.id);

        repo.set_active(current.id, false).await.unwrap();
        assert!(repo.list_active(now).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_promotions_rejected() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.promotions();

        let too_big = PromotionDraft::percentage("Too Much", "150").unwrap();
        assert_eq!(repo.insert(&too_big).await.unwrap_err().code(), "VALIDATION_ERROR");

        let now = Utc::now();
        let backwards = PromotionDraft::fixed("Backwards", Money::from_cents(100))
            .window(Some(now), Some(now - Duration::hours(1)));
        assert!(repo.insert(&backwards).await.is_err());

        assert_eq!(repo.set_active(77, true).await.unwrap_err().code(), "PROMOTION_NOT_FOUND");
    }
}
