// Activity service - keeps the record store and the image store consistent

use chrono::Utc;

use crate::activity::domain::*;
use crate::activity::repository::DynActivityRepository;
use crate::auth::session::Session;
use crate::error::{AppError, AppResult};
use crate::identity::UserId;
use crate::images::{generate_object_name, image_extension, DynObjectStore, ImageUpload};

/// Limits applied to every activity write.
#[derive(Debug, Clone, Copy)]
pub struct ActivityPolicy {
    pub rules: ActivityRules,
    pub max_image_bytes: usize,
}

impl Default for ActivityPolicy {
    fn default() -> Self {
        Self {
            rules: ActivityRules::default(),
            max_image_bytes: 10 * 1024 * 1024,
        }
    }
}

/// An image that passed validation but is not stored yet.
struct PendingImage {
    name: String,
    upload: ImageUpload,
}

/// An image that has been written to the object store.
struct StoredImage {
    name: String,
    reference: String,
}

pub struct ActivityService {
    activities: DynActivityRepository,
    images: DynObjectStore,
    policy: ActivityPolicy,
}

impl ActivityService {
    pub fn new(
        activities: DynActivityRepository,
        images: DynObjectStore,
        policy: ActivityPolicy,
    ) -> Self {
        Self {
            activities,
            images,
            policy,
        }
    }

    pub async fn create_activity(
        &self,
        session: &Session,
        draft: ActivityDraft,
        image: Option<ImageUpload>,
    ) -> AppResult<Activity> {
        let owner = session.user.user_id.clone();
        let mut record =
            draft.validate(ActivityId::generate(), owner, Utc::now(), self.policy.rules)?;
        let pending = self.check_image(image)?;

        let stored = match pending {
            Some(p) => Some(self.upload(p).await?),
            None => None,
        };
        record.image_url = stored.as_ref().map(|s| s.reference.clone());

        if let Err(e) = self.activities.insert(&record).await {
            return Err(self.compensate(stored, e.into()).await);
        }

        tracing::info!(
            activity_id = %record.id,
            user_id = %record.owner,
            has_image = record.image_url.is_some(),
            "Activity created"
        );
        Ok(record.into_activity(session.user.label()))
    }

    pub async fn update_activity(
        &self,
        session: &Session,
        id: &ActivityId,
        patch: ActivityPatch,
        image: Option<ImageUpload>,
    ) -> AppResult<Activity> {
        let current = self.owned(session, id).await?.ok_or(AppError::NotFound)?;

        let mut record = current.apply_patch(&patch, Utc::now(), self.policy.rules)?;
        let pending = self.check_image(image)?;

        let stored = match pending {
            Some(p) => Some(self.upload(p).await?),
            None => None,
        };
        if let Some(s) = &stored {
            record.image_url = Some(s.reference.clone());
        }

        match self.activities.update(&record).await {
            Ok(true) => {}
            Ok(false) => return Err(self.compensate(stored, AppError::NotFound).await),
            Err(e) => return Err(self.compensate(stored, e.into()).await),
        }

        if let Some(old) = current.image_url.as_deref() {
            if record.image_url.as_deref() != Some(old) {
                self.release_image(old).await;
            }
        }

        tracing::info!(activity_id = %record.id, user_id = %record.owner, "Activity updated");
        Ok(record.into_activity(&current.owner_label))
    }

    /// Delete an owned activity and release its image. Unknown or foreign
    /// ids succeed without doing anything.
    pub async fn delete_activity(&self, session: &Session, id: &ActivityId) -> AppResult<()> {
        let Some(current) = self.owned(session, id).await? else {
            tracing::debug!(activity_id = %id, "Delete of missing or foreign activity ignored");
            return Ok(());
        };

        let removed = self
            .activities
            .delete(id, &session.user.user_id)
            .await?;

        if removed {
            tracing::info!(activity_id = %id, user_id = %session.user.user_id, "Activity deleted");
            if let Some(reference) = current.image_url.as_deref() {
                self.release_image(reference).await;
            }
        }
        Ok(())
    }

    pub async fn get_activity(&self, _session: &Session, id: &ActivityId) -> AppResult<Activity> {
        self.activities.find(id).await?.ok_or(AppError::NotFound)
    }

    /// Activities newest first; `None` lists every user's.
    pub async fn list_activities(&self, owner: Option<&UserId>) -> AppResult<Vec<Activity>> {
        Ok(self.activities.list(owner).await?)
    }

    async fn owned(&self, session: &Session, id: &ActivityId) -> AppResult<Option<Activity>> {
        let found = self.activities.find(id).await?;
        Ok(found.filter(|a| a.owner == session.user.user_id))
    }

    fn check_image(&self, image: Option<ImageUpload>) -> AppResult<Option<PendingImage>> {
        let Some(upload) = image else {
            return Ok(None);
        };
        if upload.data.is_empty() {
            return Err(AppError::Validation("Uploaded image is empty".into()));
        }
        if upload.data.len() > self.policy.max_image_bytes {
            return Err(AppError::Validation(format!(
                "Image must be {} bytes or less",
                self.policy.max_image_bytes
            )));
        }
        let ext = image_extension(upload.file_name.as_deref(), upload.content_type.as_deref())
            .ok_or_else(|| {
                AppError::Validation("Only JPG and PNG images are supported".into())
            })?;

        Ok(Some(PendingImage {
            name: generate_object_name(ext),
            upload,
        }))
    }

    async fn upload(&self, pending: PendingImage) -> AppResult<StoredImage> {
        let reference = self
            .images
            .put(&pending.name, pending.upload.data)
            .await
            .map_err(|e| AppError::UpstreamUnavailable(format!("Image upload failed: {}", e)))?;
        Ok(StoredImage {
            name: pending.name,
            reference,
        })
    }

    /// Undo an upload whose record write failed. Returns the error to report.
    async fn compensate(&self, stored: Option<StoredImage>, cause: AppError) -> AppError {
        let Some(stored) = stored else {
            return cause;
        };
        match self.images.delete(&stored.name).await {
            Ok(()) => {
                tracing::info!(object = %stored.name, "Removed image after failed write");
                cause
            }
            Err(e) => {
                tracing::error!(
                    object = %stored.name,
                    error = %e,
                    cause = %cause,
                    "Image left behind after failed write"
                );
                AppError::PartialWriteRisk(format!(
                    "record write failed ({}) and image {} could not be removed: {}",
                    cause, stored.name, e
                ))
            }
        }
    }

    /// Best-effort removal of an image that is no longer referenced.
    async fn release_image(&self, reference: &str) {
        let Some(name) = self.images.name_from_ref(reference) else {
            tracing::warn!(reference = %reference, "Image reference not issued by this store");
            return;
        };
        if let Err(e) = self.images.delete(&name).await {
            tracing::warn!(object = %name, error = %e, "Failed to delete old image");
        }
    }
}
