use crate::error::ServiceError;
use crate::object_storage::{is_allowed_extension, ObjectStore};
use crate::record_store::{PhotoRecord, PhotoRepo};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Upload, list and delete photos in the chronological memory film.
///
/// Validates file types, delegates binary storage to the object store and
/// persists the resulting record.
#[derive(Clone)]
pub struct PhotoService {
    storage: Arc<dyn ObjectStore>,
    repo: Arc<dyn PhotoRepo>,
}

impl PhotoService {
    pub fn new(storage: Arc<dyn ObjectStore>, repo: Arc<dyn PhotoRepo>) -> Self {
        Self { storage, repo }
    }

    /// Upload a photo and persist its record.
    ///
    /// A disallowed extension is a validation error and leaves no partial
    /// state behind.
    pub async fn save(&self, filename: &str, data: Vec<u8>) -> Result<PhotoRecord, ServiceError> {
        if !is_allowed_extension(filename) {
            warn!(filename = %filename, "Unsupported format");
            return Err(ServiceError::UnsupportedFile(filename.to_string()));
        }

        debug!(filename = %filename, "Saving photo");
        let stored = self.storage.upload(filename, data).await?;
        let record = self.repo.insert(&stored.object_key, &stored.url).await?;

        info!(id = record.id, "Photo record created");
        metrics::counter!("memoir.photos.uploaded").increment(1);

        Ok(record)
    }

    /// All photos, oldest first
    pub async fn list(&self) -> Result<Vec<PhotoRecord>, ServiceError> {
        self.repo.list().await
    }

    /// Number of photos in the memory film
    pub async fn count(&self) -> Result<i64, ServiceError> {
        self.repo.count().await
    }

    /// Delete a photo record and its backing object.
    ///
    /// Returns false when the id does not exist. A storage delete failure is
    /// logged and swallowed; the record is removed regardless, favoring
    /// record-store consistency.
    pub async fn delete(&self, id: i64) -> Result<bool, ServiceError> {
        let record = match self.repo.find(id).await? {
            Some(record) => record,
            None => {
                warn!(id = id, "Photo id not found");
                return Ok(false);
            }
        };

        if let Err(e) = self.storage.delete(&record.object_key).await {
            error!(
                error = %e,
                id = id,
                object_key = %record.object_key,
                "Error deleting image from storage, removing record anyway"
            );
        }

        let removed = self.repo.delete(id).await?;
        if removed {
            info!(id = id, "Photo record deleted");
            metrics::counter!("memoir.photos.deleted").increment(1);
        }

        Ok(removed)
    }
}
