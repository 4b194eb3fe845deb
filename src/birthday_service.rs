use crate::config::BirthdayConfig;
use crate::error::ServiceError;
use crate::object_storage::{is_allowed_extension, ObjectStore};
use crate::record_store::{BirthdayRecord, BirthdayRepo};
use chrono::{Datelike, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Aggregate figures for the birthday album
#[derive(Debug, Clone, Serialize)]
pub struct BirthdayStats {
    pub total_photos: i64,
    pub years_count: i64,
    /// None when the album is empty
    pub latest_year: Option<i32>,
}

/// Upload, list and delete photos in the birthday album, plus the pure
/// age/label derivations over loaded records.
///
/// The MM-DD birth-date map is injected at construction so age derivation is
/// configuration, not a hard-coded constant.
#[derive(Clone)]
pub struct BirthdayService {
    storage: Arc<dyn ObjectStore>,
    repo: Arc<dyn BirthdayRepo>,
    birth_dates: HashMap<String, i32>,
}

impl BirthdayService {
    pub fn new(
        storage: Arc<dyn ObjectStore>,
        repo: Arc<dyn BirthdayRepo>,
        config: BirthdayConfig,
    ) -> Self {
        Self {
            storage,
            repo,
            birth_dates: config.birth_dates,
        }
    }

    /// Upload a birthday photo and persist its record.
    ///
    /// The year defaults to the current year. The date tag is required and
    /// must be one of the configured birth dates; an unknown tag is a
    /// validation error rather than a silent fallback.
    pub async fn save(
        &self,
        filename: &str,
        data: Vec<u8>,
        birthday_year: Option<i32>,
        birthday_date: &str,
        description: Option<String>,
    ) -> Result<BirthdayRecord, ServiceError> {
        if !is_allowed_extension(filename) {
            warn!(filename = %filename, "Unsupported format");
            return Err(ServiceError::UnsupportedFile(filename.to_string()));
        }

        if !self.birth_dates.contains_key(birthday_date) {
            warn!(birthday_date = %birthday_date, "Unknown birthday date tag");
            return Err(ServiceError::UnknownBirthdayDate(birthday_date.to_string()));
        }

        let year = birthday_year.unwrap_or_else(|| Utc::now().year());

        debug!(filename = %filename, year = year, "Saving birthday photo");
        let stored = self.storage.upload(filename, data).await?;
        let record = self
            .repo
            .insert(
                &stored.object_key,
                &stored.url,
                year,
                birthday_date,
                description,
            )
            .await?;

        info!(id = record.id, year = year, "Birthday photo record created");
        metrics::counter!("memoir.birthday_photos.uploaded").increment(1);

        Ok(record)
    }

    /// All birthday photos, newest year first, newest upload first within a year
    pub async fn list_all(&self) -> Result<Vec<BirthdayRecord>, ServiceError> {
        self.repo.list_all().await
    }

    /// Photos for a single year, newest upload first
    pub async fn list_by_year(&self, year: i32) -> Result<Vec<BirthdayRecord>, ServiceError> {
        self.repo.list_by_year(year).await
    }

    /// Years that have at least one photo, descending
    pub async fn distinct_years(&self) -> Result<Vec<i32>, ServiceError> {
        self.repo.distinct_years().await
    }

    /// Album statistics; latest_year is None when there are no photos
    pub async fn stats(&self) -> Result<BirthdayStats, ServiceError> {
        let total_photos = self.repo.count().await?;
        let years = self.repo.distinct_years().await?;

        Ok(BirthdayStats {
            total_photos,
            years_count: years.len() as i64,
            latest_year: years.first().copied(),
        })
    }

    /// Delete a birthday photo with the same swallow-storage-failure policy
    /// as the photo service
    pub async fn delete(&self, id: i64) -> Result<bool, ServiceError> {
        let record = match self.repo.find(id).await? {
            Some(record) => record,
            None => {
                warn!(id = id, "Birthday photo id not found");
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
            info!(id = id, "Birthday photo record deleted");
            metrics::counter!("memoir.birthday_photos.deleted").increment(1);
        }

        Ok(removed)
    }

    /// Age the photo depicts: birthday_year minus the configured birth year
    /// for its date tag. None for an unknown tag.
    pub fn age_for(&self, record: &BirthdayRecord) -> Option<i32> {
        self.birth_dates
            .get(&record.birthday_date)
            .map(|birth_year| record.birthday_year - birth_year)
    }

    /// Short age label, e.g. "22 years old"
    pub fn age_label(&self, record: &BirthdayRecord) -> Option<String> {
        self.age_for(record).map(|age| format!("{age} years old"))
    }

    /// Combined year + occasion + age label for display
    pub fn display_label(&self, record: &BirthdayRecord) -> String {
        match self.age_for(record) {
            Some(age) => format!(
                "{} birthday on {}, turning {}",
                record.birthday_year, record.birthday_date, age
            ),
            None => format!("{} birthday", record.birthday_year),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object_storage::{MockObjectStore, StoredObject};
    use crate::record_store::MockBirthdayRepo;

    fn test_config() -> BirthdayConfig {
        BirthdayConfig {
            birth_dates: HashMap::from([
                ("01-01".to_string(), 2003),
                ("06-26".to_string(), 2003),
            ]),
        }
    }

    fn record(id: i64, year: i32, date: &str) -> BirthdayRecord {
        BirthdayRecord {
            id,
            object_key: format!("key-{id}.jpg"),
            url: format!("https://bucket.example/key-{id}.jpg"),
            birthday_year: year,
            birthday_date: date.to_string(),
            description: None,
            uploaded_at: Utc::now(),
        }
    }

    fn service(storage: MockObjectStore, repo: MockBirthdayRepo) -> BirthdayService {
        BirthdayService::new(Arc::new(storage), Arc::new(repo), test_config())
    }

    #[test]
    fn test_age_derivation() {
        let svc = service(MockObjectStore::new(), MockBirthdayRepo::new());
        let rec = record(1, 2025, "01-01");
        assert_eq!(svc.age_for(&rec), Some(22));
        assert_eq!(svc.age_label(&rec), Some("22 years old".to_string()));
    }

    #[test]
    fn test_age_undefined_for_unknown_date() {
        let svc = service(MockObjectStore::new(), MockBirthdayRepo::new());
        let rec = record(1, 2025, "12-25");
        assert_eq!(svc.age_for(&rec), None);
        assert_eq!(svc.age_label(&rec), None);
        assert_eq!(svc.display_label(&rec), "2025 birthday");
    }

    #[test]
    fn test_display_label_combines_year_date_age() {
        let svc = service(MockObjectStore::new(), MockBirthdayRepo::new());
        let rec = record(1, 2024, "06-26");
        assert_eq!(svc.display_label(&rec), "2024 birthday on 06-26, turning 21");
    }

    #[tokio::test]
    async fn test_save_rejects_unknown_date_before_upload() {
        // Storage mock has no expectations: an upload attempt would panic
        let svc = service(MockObjectStore::new(), MockBirthdayRepo::new());

        let err = svc
            .save("cake.jpg", vec![1], Some(2025), "03-15", None)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::UnknownBirthdayDate(_)));
        assert!(err.is_validation());
    }

    #[tokio::test]
    async fn test_save_rejects_bad_extension() {
        let svc = service(MockObjectStore::new(), MockBirthdayRepo::new());

        let err = svc
            .save("cake.pdf", vec![1], Some(2025), "01-01", None)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::UnsupportedFile(_)));
    }

    #[tokio::test]
    async fn test_save_defaults_to_current_year() {
        let current_year = Utc::now().year();

        let mut storage = MockObjectStore::new();
        storage.expect_upload().returning(|_, _| {
            Ok(StoredObject {
                object_key: "k.jpg".to_string(),
                url: "https://bucket.example/k.jpg".to_string(),
            })
        });

        let mut repo = MockBirthdayRepo::new();
        repo.expect_insert()
            .withf(move |_, _, year, date, _| *year == current_year && date == "06-26")
            .times(1)
            .returning(|key, url, year, date, _| {
                Ok(BirthdayRecord {
                    id: 1,
                    object_key: key.to_string(),
                    url: url.to_string(),
                    birthday_year: year,
                    birthday_date: date.to_string(),
                    description: None,
                    uploaded_at: Utc::now(),
                })
            });

        let svc = service(storage, repo);
        let saved = svc
            .save("cake.jpg", vec![1], None, "06-26", None)
            .await
            .unwrap();
        assert_eq!(saved.birthday_year, current_year);
    }

    #[tokio::test]
    async fn test_stats_empty_album() {
        let mut repo = MockBirthdayRepo::new();
        repo.expect_count().returning(|| Ok(0));
        repo.expect_distinct_years().returning(|| Ok(vec![]));

        let svc = service(MockObjectStore::new(), repo);
        let stats = svc.stats().await.unwrap();

        assert_eq!(stats.total_photos, 0);
        assert_eq!(stats.years_count, 0);
        assert_eq!(stats.latest_year, None);
    }

    #[tokio::test]
    async fn test_stats_latest_year_is_max() {
        let mut repo = MockBirthdayRepo::new();
        repo.expect_count().returning(|| Ok(5));
        repo.expect_distinct_years()
            .returning(|| Ok(vec![2025, 2024, 2022]));

        let svc = service(MockObjectStore::new(), repo);
        let stats = svc.stats().await.unwrap();

        assert_eq!(stats.total_photos, 5);
        assert_eq!(stats.years_count, 3);
        assert_eq!(stats.latest_year, Some(2025));
    }

    #[tokio::test]
    async fn test_delete_swallows_storage_failure() {
        let mut storage = MockObjectStore::new();
        storage
            .expect_delete()
            .times(1)
            .returning(|_| Err(ServiceError::Storage("delete_object failed".to_string())));

        let mut repo = MockBirthdayRepo::new();
        repo.expect_find()
            .returning(|id| Ok(Some(record(id, 2024, "01-01"))));
        repo.expect_delete().times(1).returning(|_| Ok(true));

        let svc = service(storage, repo);
        assert!(svc.delete(8).await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_missing_returns_false() {
        let mut repo = MockBirthdayRepo::new();
        repo.expect_find().returning(|_| Ok(None));

        let svc = service(MockObjectStore::new(), repo);
        assert!(!svc.delete(404).await.unwrap());
    }
}
