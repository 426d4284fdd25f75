//! Intake mutation workflow.
//!
//! Marking a dose taken is two sequential, non-transactional steps: an
//! optional evidence upload followed by the record update. A failed upload
//! leaves the record untouched. A failed update after a successful upload
//! leaves the blob orphaned; nothing deletes it, the key is logged instead.
//!
//! Toggling is last-writer-wins on the caller-supplied current state.

use std::sync::Arc;

use bytes::Bytes;
use time::OffsetDateTime;
use tracing::{info, warn};
use uuid::Uuid;

use super::model::{MedicationPatch, MedicationRecord, NewMedication, RecordChanges};
use super::repo::RecordStore;
use crate::adherence::period::Period;
use crate::error::{AppError, AppResult};
use crate::storage::{ext_from_mime, StorageClient};

/// Photo attached as proof of intake.
pub struct Evidence {
    pub body: Bytes,
    pub content_type: String,
}

#[derive(Clone)]
pub struct IntakeService {
    records: Arc<dyn RecordStore>,
    storage: Arc<dyn StorageClient>,
}

impl IntakeService {
    pub fn new(records: Arc<dyn RecordStore>, storage: Arc<dyn StorageClient>) -> Self {
        Self { records, storage }
    }

    pub async fn list(&self, owner: Uuid, range: Option<Period>) -> AppResult<Vec<MedicationRecord>> {
        Ok(self.records.list(owner, range).await?)
    }

    pub async fn insert(&self, owner: Uuid, draft: NewMedication) -> AppResult<MedicationRecord> {
        let draft = draft.validate()?;
        let record = self.records.insert(owner, &draft).await?;
        info!(%owner, id = %record.id, date = %record.scheduled_date, "medication added");
        Ok(record)
    }

    pub async fn update(
        &self,
        owner: Uuid,
        id: Uuid,
        patch: MedicationPatch,
    ) -> AppResult<MedicationRecord> {
        let changes = patch.validate()?;
        self.records
            .update(owner, id, &changes)
            .await?
            .ok_or(AppError::NotFound(id))
    }

    pub async fn delete(&self, owner: Uuid, id: Uuid) -> AppResult<()> {
        if !self.records.delete(owner, id).await? {
            return Err(AppError::NotFound(id));
        }
        info!(%owner, %id, "medication deleted");
        Ok(())
    }

    pub async fn mark_taken(
        &self,
        owner: Uuid,
        id: Uuid,
        evidence: Option<Evidence>,
    ) -> AppResult<MedicationRecord> {
        // Resolve first so an unknown id never produces an upload.
        if self.records.get(owner, id).await?.is_none() {
            return Err(AppError::NotFound(id));
        }

        let now = OffsetDateTime::now_utc();
        let photo_ref = match evidence {
            Some(ev) => {
                let key = evidence_key(owner, id, now, &ev.content_type);
                self.storage
                    .put_object(&key, ev.body, &ev.content_type)
                    .await
                    .map_err(AppError::Upload)?;
                Some(key)
            }
            None => None,
        };

        let changes = RecordChanges::mark_taken(now, photo_ref.clone());
        let updated = match self.records.update(owner, id, &changes).await {
            Ok(Some(r)) => r,
            Ok(None) => {
                if let Some(key) = &photo_ref {
                    warn!(%owner, %id, %key, "record vanished after upload; evidence blob orphaned");
                }
                return Err(AppError::NotFound(id));
            }
            Err(e) => {
                if let Some(key) = &photo_ref {
                    warn!(%owner, %id, %key, error = %e, "update failed after upload; evidence blob orphaned");
                }
                return Err(e.into());
            }
        };

        info!(%owner, %id, with_photo = photo_ref.is_some(), "medication marked taken");
        Ok(updated)
    }

    /// Flips `taken` relative to `current_taken` without reading the stored value.
    pub async fn toggle_taken(
        &self,
        owner: Uuid,
        id: Uuid,
        current_taken: bool,
    ) -> AppResult<MedicationRecord> {
        let changes = RecordChanges::toggle(current_taken, OffsetDateTime::now_utc());
        let updated = self
            .records
            .update(owner, id, &changes)
            .await?
            .ok_or(AppError::NotFound(id))?;
        info!(%owner, %id, taken = updated.taken, "medication toggled");
        Ok(updated)
    }

    /// Time-limited URL for the record's evidence photo.
    pub async fn photo_url(&self, owner: Uuid, id: Uuid, ttl_secs: u64) -> AppResult<String> {
        let key = self
            .records
            .get(owner, id)
            .await?
            .and_then(|r| r.photo_ref)
            .ok_or(AppError::NotFound(id))?;
        Ok(self.storage.presign_get(&key, ttl_secs).await?)
    }
}

fn evidence_key(owner: Uuid, id: Uuid, at: OffsetDateTime, content_type: &str) -> String {
    let millis = at.unix_timestamp_nanos() / 1_000_000;
    let ext = ext_from_mime(content_type).unwrap_or("bin");
    format!("evidence/{}/{}-{}.{}", owner, id, millis, ext)
}
