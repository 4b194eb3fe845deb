use crate::birthday_service::BirthdayService;
use crate::error::ServiceError;
use crate::photo_service::PhotoService;
use chrono::Utc;
use serde::Serialize;

/// Home-page navigation tile for one feature area.
///
/// Built fresh on every home render from a fixed list merged with live
/// counts; never persisted.
#[derive(Debug, Clone, Serialize)]
pub struct Bookmark {
    pub id: String,
    pub title: String,
    pub icon: String,
    pub color: String,
    pub route: String,
    pub description: String,
    pub enabled: bool,
    pub date: String,
}

/// Fixed-order feature tiles with live-computed descriptions
pub async fn list_bookmarks(
    photos: &PhotoService,
    birthdays: &BirthdayService,
) -> Result<Vec<Bookmark>, ServiceError> {
    let photo_count = photos.count().await?;
    let stats = birthdays.stats().await?;

    let memory_description = if photo_count > 0 {
        format!("{photo_count} treasured memories")
    } else {
        "Waiting for your first memory".to_string()
    };

    let birthday_description = if stats.total_photos == 0 {
        "Every year's birthday".to_string()
    } else if stats.years_count > 1 {
        format!(
            "{} photos across {} birthdays",
            stats.total_photos, stats.years_count
        )
    } else {
        format!("{} photos from one birthday", stats.total_photos)
    };

    Ok(vec![
        Bookmark {
            id: "memory_film".to_string(),
            title: "Memory Film".to_string(),
            icon: "🎞️".to_string(),
            color: "#FF6B6B".to_string(),
            route: "/memory/".to_string(),
            description: memory_description,
            enabled: true,
            date: "2024.06".to_string(),
        },
        Bookmark {
            id: "birthday".to_string(),
            title: "Birthday".to_string(),
            icon: "🎂".to_string(),
            color: "#4ECDC4".to_string(),
            route: "/birthday/".to_string(),
            description: birthday_description,
            enabled: true,
            date: "xxxx.06.26".to_string(),
        },
        Bookmark {
            id: "anniversary".to_string(),
            title: "In Progress".to_string(),
            icon: "🗺️".to_string(),
            color: "#45B7D1".to_string(),
            route: "/anniversary/".to_string(),
            description: String::new(),
            enabled: false,
            date: Utc::now().format("%Y.%m").to_string(),
        },
    ])
}

/// Only the tiles that should appear in navigation
pub fn enabled_only(bookmarks: Vec<Bookmark>) -> Vec<Bookmark> {
    bookmarks.into_iter().filter(|b| b.enabled).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BirthdayConfig;
    use crate::object_storage::MockObjectStore;
    use crate::record_store::{MockBirthdayRepo, MockPhotoRepo};
    use std::sync::Arc;

    fn photo_service(count: i64) -> PhotoService {
        let mut repo = MockPhotoRepo::new();
        repo.expect_count().returning(move || Ok(count));
        PhotoService::new(Arc::new(MockObjectStore::new()), Arc::new(repo))
    }

    fn birthday_service(total: i64, years: Vec<i32>) -> BirthdayService {
        let mut repo = MockBirthdayRepo::new();
        repo.expect_count().returning(move || Ok(total));
        repo.expect_distinct_years()
            .returning(move || Ok(years.clone()));
        BirthdayService::new(
            Arc::new(MockObjectStore::new()),
            Arc::new(repo),
            BirthdayConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_bookmarks_fixed_order() {
        let bookmarks = list_bookmarks(&photo_service(0), &birthday_service(0, vec![]))
            .await
            .unwrap();

        let ids: Vec<&str> = bookmarks.iter().map(|b| b.id.as_str()).collect();
        assert_eq!(ids, vec!["memory_film", "birthday", "anniversary"]);
    }

    #[tokio::test]
    async fn test_memory_description_reflects_count() {
        let bookmarks = list_bookmarks(&photo_service(12), &birthday_service(0, vec![]))
            .await
            .unwrap();
        assert_eq!(bookmarks[0].description, "12 treasured memories");

        let bookmarks = list_bookmarks(&photo_service(0), &birthday_service(0, vec![]))
            .await
            .unwrap();
        assert_eq!(bookmarks[0].description, "Waiting for your first memory");
    }

    #[tokio::test]
    async fn test_birthday_description_pluralized_by_years() {
        let bookmarks = list_bookmarks(&photo_service(0), &birthday_service(9, vec![2025, 2024]))
            .await
            .unwrap();
        assert_eq!(bookmarks[1].description, "9 photos across 2 birthdays");

        let bookmarks = list_bookmarks(&photo_service(0), &birthday_service(4, vec![2025]))
            .await
            .unwrap();
        assert_eq!(bookmarks[1].description, "4 photos from one birthday");
    }

    #[tokio::test]
    async fn test_enabled_only_filters_disabled_tiles() {
        let bookmarks = list_bookmarks(&photo_service(1), &birthday_service(1, vec![2025]))
            .await
            .unwrap();

        let enabled = enabled_only(bookmarks);
        assert_eq!(enabled.len(), 2);
        assert!(enabled.iter().all(|b| b.enabled));
        assert!(!enabled.iter().any(|b| b.id == "anniversary"));
    }
}
