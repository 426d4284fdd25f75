use anyhow::Context;
use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::model::{MedicationRecord, RecordChanges, ValidMedication};
use crate::adherence::period::Period;

const RECORD_COLUMNS: &str = "id, user_id, name, dosage, scheduled_date, scheduled_time, \
                              taken, taken_at, photo_ref, created_at";

/// Owner-scoped access to medication records.
///
/// Every call takes the owner; implementations must never touch another
/// owner's rows. `get`/`update` return `None` and `delete` returns `false`
/// when the id does not resolve for that owner.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Records ordered by scheduled date, then scheduled time.
    async fn list(&self, owner: Uuid, range: Option<Period>) -> anyhow::Result<Vec<MedicationRecord>>;
    async fn get(&self, owner: Uuid, id: Uuid) -> anyhow::Result<Option<MedicationRecord>>;
    async fn insert(&self, owner: Uuid, draft: &ValidMedication) -> anyhow::Result<MedicationRecord>;
    /// Blind overwrite of the given columns; no version check.
    async fn update(
        &self,
        owner: Uuid,
        id: Uuid,
        changes: &RecordChanges,
    ) -> anyhow::Result<Option<MedicationRecord>>;
    async fn delete(&self, owner: Uuid, id: Uuid) -> anyhow::Result<bool>;
}

#[derive(Clone)]
pub struct PgRecordStore {
    db: PgPool,
}

impl PgRecordStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl RecordStore for PgRecordStore {
    async fn list(&self, owner: Uuid, range: Option<Period>) -> anyhow::Result<Vec<MedicationRecord>> {
        let (from, to) = match range {
            Some(p) => (Some(p.start), Some(p.end)),
            None => (None, None),
        };
        let rows = sqlx::query_as::<_, MedicationRecord>(&format!(
            r#"
            SELECT {RECORD_COLUMNS}
            FROM medications
            WHERE user_id = $1
              AND ($2::date IS NULL OR scheduled_date >= $2)
              AND ($3::date IS NULL OR scheduled_date <= $3)
            ORDER BY scheduled_date ASC, scheduled_time ASC
            "#
        ))
        .bind(owner)
        .bind(from)
        .bind(to)
        .fetch_all(&self.db)
        .await
        .context("list medications")?;
        Ok(rows)
    }

    async fn get(&self, owner: Uuid, id: Uuid) -> anyhow::Result<Option<MedicationRecord>> {
        let row = sqlx::query_as::<_, MedicationRecord>(&format!(
            r#"
            SELECT {RECORD_COLUMNS}
            FROM medications
            WHERE id = $1 AND user_id = $2
            "#
        ))
        .bind(id)
        .bind(owner)
        .fetch_optional(&self.db)
        .await
        .context("get medication")?;
        Ok(row)
    }

    async fn insert(&self, owner: Uuid, draft: &ValidMedication) -> anyhow::Result<MedicationRecord> {
        let row = sqlx::query_as::<_, MedicationRecord>(&format!(
            r#"
            INSERT INTO medications (id, user_id, name, dosage, scheduled_date, scheduled_time, taken)
            VALUES ($1, $2, $3, $4, $5, $6, FALSE)
            RETURNING {RECORD_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(owner)
        .bind(&draft.name)
        .bind(&draft.dosage)
        .bind(draft.scheduled_date)
        .bind(&draft.scheduled_time)
        .fetch_one(&self.db)
        .await
        .context("insert medication")?;
        Ok(row)
    }

    async fn update(
        &self,
        owner: Uuid,
        id: Uuid,
        changes: &RecordChanges,
    ) -> anyhow::Result<Option<MedicationRecord>> {
        // Nullable columns carry an explicit "write this column" flag so that
        // NULL can be stored deliberately.
        let row = sqlx::query_as::<_, MedicationRecord>(&format!(
            r#"
            UPDATE medications SET
                name           = COALESCE($3, name),
                dosage         = COALESCE($4, dosage),
                scheduled_date = COALESCE($5, scheduled_date),
                scheduled_time = COALESCE($6, scheduled_time),
                taken          = COALESCE($7, taken),
                taken_at       = CASE WHEN $8 THEN $9 ELSE taken_at END,
                photo_ref      = CASE WHEN $10 THEN $11 ELSE photo_ref END
            WHERE id = $1 AND user_id = $2
            RETURNING {RECORD_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(owner)
        .bind(changes.name.as_deref())
        .bind(changes.dosage.as_deref())
        .bind(changes.scheduled_date)
        .bind(changes.scheduled_time.as_deref())
        .bind(changes.taken)
        .bind(changes.taken_at.is_some())
        .bind(changes.taken_at.flatten())
        .bind(changes.photo_ref.is_some())
        .bind(changes.photo_ref.clone().flatten())
        .fetch_optional(&self.db)
        .await
        .context("update medication")?;
        Ok(row)
    }

    async fn delete(&self, owner: Uuid, id: Uuid) -> anyhow::Result<bool> {
        let res = sqlx::query("DELETE FROM medications WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(owner)
            .execute(&self.db)
            .await
            .context("delete medication")?;
        Ok(res.rows_affected() > 0)
    }
}
