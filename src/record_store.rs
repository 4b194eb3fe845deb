use crate::config::DatabaseConfig;
use crate::error::ServiceError;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::FromRow;
use std::time::Duration;
use tracing::{debug, info};

/// A photo in the chronological memory film
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct PhotoRecord {
    pub id: i64,
    /// Key of the backing object in the bucket
    pub object_key: String,
    /// Retrieval URL, usually presigned and time-limited
    pub url: String,
    pub uploaded_at: DateTime<Utc>,
}

/// A photo in the year-tagged birthday album
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct BirthdayRecord {
    pub id: i64,
    pub object_key: String,
    pub url: String,
    /// Calendar year the photo depicts
    pub birthday_year: i32,
    /// "MM-DD" tag identifying which configured birth date this belongs to
    pub birthday_date: String,
    pub description: Option<String>,
    pub uploaded_at: DateTime<Utc>,
}

/// Persistence port for memory-film photos
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PhotoRepo: Send + Sync {
    async fn insert(&self, object_key: &str, url: &str) -> Result<PhotoRecord, ServiceError>;

    /// All photos ordered by upload time ascending (oldest first)
    async fn list(&self) -> Result<Vec<PhotoRecord>, ServiceError>;

    async fn find(&self, id: i64) -> Result<Option<PhotoRecord>, ServiceError>;

    /// Returns true when a row was removed
    async fn delete(&self, id: i64) -> Result<bool, ServiceError>;

    async fn count(&self) -> Result<i64, ServiceError>;
}

/// Persistence port for birthday-album photos
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BirthdayRepo: Send + Sync {
    async fn insert(
        &self,
        object_key: &str,
        url: &str,
        birthday_year: i32,
        birthday_date: &str,
        description: Option<String>,
    ) -> Result<BirthdayRecord, ServiceError>;

    /// All photos ordered by (birthday_year desc, uploaded_at desc)
    async fn list_all(&self) -> Result<Vec<BirthdayRecord>, ServiceError>;

    /// Photos for one year ordered by uploaded_at desc
    async fn list_by_year(&self, year: i32) -> Result<Vec<BirthdayRecord>, ServiceError>;

    /// Years with at least one photo, descending, no duplicates
    async fn distinct_years(&self) -> Result<Vec<i32>, ServiceError>;

    async fn find(&self, id: i64) -> Result<Option<BirthdayRecord>, ServiceError>;

    async fn delete(&self, id: i64) -> Result<bool, ServiceError>;

    async fn count(&self) -> Result<i64, ServiceError>;
}

/// Record store backed by a PostgreSQL connection pool
#[derive(Clone)]
pub struct RecordStore {
    pool: PgPool,
}

impl RecordStore {
    /// Connect to PostgreSQL with pooling per configuration
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
            .connect(&config.url)
            .await
            .context("Failed to connect to PostgreSQL")?;

        info!("Connected to PostgreSQL database");

        Ok(Self { pool })
    }

    /// Run database migrations
    pub async fn run_migrations(&self) -> Result<()> {
        info!("Running database migrations");

        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .context("Failed to run migrations")?;

        info!("Database migrations completed");
        Ok(())
    }

    pub fn photos(&self) -> PgPhotoRepo {
        PgPhotoRepo {
            pool: self.pool.clone(),
        }
    }

    pub fn birthdays(&self) -> PgBirthdayRepo {
        PgBirthdayRepo {
            pool: self.pool.clone(),
        }
    }

    /// Connection pool handle (for readiness checks)
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// PostgreSQL implementation of [`PhotoRepo`]
#[derive(Clone)]
pub struct PgPhotoRepo {
    pool: PgPool,
}

#[async_trait]
impl PhotoRepo for PgPhotoRepo {
    async fn insert(&self, object_key: &str, url: &str) -> Result<PhotoRecord, ServiceError> {
        let record = sqlx::query_as::<_, PhotoRecord>(
            r#"
            INSERT INTO photos (object_key, url)
            VALUES ($1, $2)
            RETURNING id, object_key, url, uploaded_at
            "#,
        )
        .bind(object_key)
        .bind(url)
        .fetch_one(&self.pool)
        .await?;

        debug!(id = record.id, object_key = %object_key, "Photo record created");
        Ok(record)
    }

    async fn list(&self) -> Result<Vec<PhotoRecord>, ServiceError> {
        let records = sqlx::query_as::<_, PhotoRecord>(
            r#"
            SELECT id, object_key, url, uploaded_at
            FROM photos
            ORDER BY uploaded_at ASC, id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }

    async fn find(&self, id: i64) -> Result<Option<PhotoRecord>, ServiceError> {
        let record = sqlx::query_as::<_, PhotoRecord>(
            r#"
            SELECT id, object_key, url, uploaded_at
            FROM photos
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    async fn delete(&self, id: i64) -> Result<bool, ServiceError> {
        let result = sqlx::query("DELETE FROM photos WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn count(&self) -> Result<i64, ServiceError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM photos")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

/// PostgreSQL implementation of [`BirthdayRepo`]
#[derive(Clone)]
pub struct PgBirthdayRepo {
    pool: PgPool,
}

#[async_trait]
impl BirthdayRepo for PgBirthdayRepo {
    async fn insert(
        &self,
        object_key: &str,
        url: &str,
        birthday_year: i32,
        birthday_date: &str,
        description: Option<String>,
    ) -> Result<BirthdayRecord, ServiceError> {
        let record = sqlx::query_as::<_, BirthdayRecord>(
            r#"
            INSERT INTO birthday_photos (object_key, url, birthday_year, birthday_date, description)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, object_key, url, birthday_year, birthday_date, description, uploaded_at
            "#,
        )
        .bind(object_key)
        .bind(url)
        .bind(birthday_year)
        .bind(birthday_date)
        .bind(description)
        .fetch_one(&self.pool)
        .await?;

        debug!(id = record.id, object_key = %object_key, "Birthday photo record created");
        Ok(record)
    }

    async fn list_all(&self) -> Result<Vec<BirthdayRecord>, ServiceError> {
        let records = sqlx::query_as::<_, BirthdayRecord>(
            r#"
            SELECT id, object_key, url, birthday_year, birthday_date, description, uploaded_at
            FROM birthday_photos
            ORDER BY birthday_year DESC, uploaded_at DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }

    async fn list_by_year(&self, year: i32) -> Result<Vec<BirthdayRecord>, ServiceError> {
        let records = sqlx::query_as::<_, BirthdayRecord>(
            r#"
            SELECT id, object_key, url, birthday_year, birthday_date, description, uploaded_at
            FROM birthday_photos
            WHERE birthday_year = $1
            ORDER BY uploaded_at DESC
            "#,
        )
        .bind(year)
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }

    async fn distinct_years(&self) -> Result<Vec<i32>, ServiceError> {
        let years: Vec<i32> = sqlx::query_scalar(
            r#"
            SELECT DISTINCT birthday_year
            FROM birthday_photos
            ORDER BY birthday_year DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(years)
    }

    async fn find(&self, id: i64) -> Result<Option<BirthdayRecord>, ServiceError> {
        let record = sqlx::query_as::<_, BirthdayRecord>(
            r#"
            SELECT id, object_key, url, birthday_year, birthday_date, description, uploaded_at
            FROM birthday_photos
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    async fn delete(&self, id: i64) -> Result<bool, ServiceError> {
        let result = sqlx::query("DELETE FROM birthday_photos WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn count(&self) -> Result<i64, ServiceError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM birthday_photos")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration as ChronoDuration, TimeZone};

    // Upload timestamps default to NOW(); pin them so ordering assertions
    // are deterministic.
    async fn set_uploaded_at(pool: &PgPool, table: &str, id: i64, at: DateTime<Utc>) {
        sqlx::query(&format!("UPDATE {table} SET uploaded_at = $1 WHERE id = $2"))
            .bind(at)
            .bind(id)
            .execute(pool)
            .await
            .unwrap();
    }

    fn base_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    #[sqlx::test]
    async fn test_photo_list_orders_by_upload_time_ascending(pool: PgPool) {
        let repo = PgPhotoRepo { pool: pool.clone() };

        let a = repo.insert("a.jpg", "https://bucket.example/a.jpg").await.unwrap();
        let b = repo.insert("b.jpg", "https://bucket.example/b.jpg").await.unwrap();
        let c = repo.insert("c.jpg", "https://bucket.example/c.jpg").await.unwrap();

        // Insertion order is a, b, c but upload times say b, c, a
        set_uploaded_at(&pool, "photos", a.id, base_time() + ChronoDuration::hours(2)).await;
        set_uploaded_at(&pool, "photos", b.id, base_time()).await;
        set_uploaded_at(&pool, "photos", c.id, base_time() + ChronoDuration::hours(1)).await;

        let ids: Vec<i64> = repo.list().await.unwrap().iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![b.id, c.id, a.id]);
    }

    #[sqlx::test]
    async fn test_photo_delete_removes_row(pool: PgPool) {
        let repo = PgPhotoRepo { pool };

        let photo = repo.insert("k.png", "https://bucket.example/k.png").await.unwrap();
        assert_eq!(repo.count().await.unwrap(), 1);

        assert!(repo.delete(photo.id).await.unwrap());
        assert!(!repo.delete(photo.id).await.unwrap());
        assert_eq!(repo.count().await.unwrap(), 0);
        assert!(repo.find(photo.id).await.unwrap().is_none());
    }

    #[sqlx::test]
    async fn test_distinct_years_descending_without_duplicates(pool: PgPool) {
        let repo = PgBirthdayRepo { pool };

        for (key, year) in [("a", 2024), ("b", 2025), ("c", 2024), ("d", 2022)] {
            repo.insert(
                &format!("{key}.jpg"),
                "https://bucket.example/x.jpg",
                year,
                "06-26",
                None,
            )
            .await
            .unwrap();
        }

        assert_eq!(repo.distinct_years().await.unwrap(), vec![2025, 2024, 2022]);
    }

    #[sqlx::test]
    async fn test_birthday_list_all_year_desc_then_newest_first(pool: PgPool) {
        let repo = PgBirthdayRepo { pool: pool.clone() };

        let old_2024 = repo
            .insert("o24.jpg", "https://bucket.example/o24.jpg", 2024, "01-01", None)
            .await
            .unwrap();
        let new_2024 = repo
            .insert("n24.jpg", "https://bucket.example/n24.jpg", 2024, "01-01", None)
            .await
            .unwrap();
        let only_2025 = repo
            .insert("o25.jpg", "https://bucket.example/o25.jpg", 2025, "06-26", None)
            .await
            .unwrap();

        set_uploaded_at(&pool, "birthday_photos", old_2024.id, base_time()).await;
        set_uploaded_at(
            &pool,
            "birthday_photos",
            new_2024.id,
            base_time() + ChronoDuration::hours(1),
        )
        .await;
        set_uploaded_at(&pool, "birthday_photos", only_2025.id, base_time()).await;

        let ids: Vec<i64> = repo.list_all().await.unwrap().iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![only_2025.id, new_2024.id, old_2024.id]);
    }

    #[sqlx::test]
    async fn test_birthday_list_by_year_newest_first(pool: PgPool) {
        let repo = PgBirthdayRepo { pool: pool.clone() };

        let first = repo
            .insert("f.jpg", "https://bucket.example/f.jpg", 2024, "01-01", None)
            .await
            .unwrap();
        let second = repo
            .insert("s.jpg", "https://bucket.example/s.jpg", 2024, "01-01", None)
            .await
            .unwrap();
        let other_year = repo
            .insert("y.jpg", "https://bucket.example/y.jpg", 2023, "01-01", None)
            .await
            .unwrap();

        set_uploaded_at(&pool, "birthday_photos", first.id, base_time()).await;
        set_uploaded_at(
            &pool,
            "birthday_photos",
            second.id,
            base_time() + ChronoDuration::hours(3),
        )
        .await;

        let ids: Vec<i64> = repo
            .list_by_year(2024)
            .await
            .unwrap()
            .iter()
            .map(|p| p.id)
            .collect();
        assert_eq!(ids, vec![second.id, first.id]);
        assert!(!ids.contains(&other_year.id));
    }
}
