//! Duplicate detection on the mobile number

use chrono::{DateTime, Duration, Utc};
use tracing::info;

use crate::enquiry::Enquiry;
use crate::error::Result;
use crate::repository::EnquiryRepository;

/// Flags an enquiry whose mobile number was already seen inside a sliding
/// window. Both ends of the window are inclusive.
#[derive(Debug, Clone)]
pub struct DuplicateDetector {
    window: Duration,
}

impl DuplicateDetector {
    pub fn new(window: Duration) -> Self {
        Self { window }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Earliest non-duplicate enquiry with `mobile` created in
    /// `[now - window, now]`, ties broken by id
    pub async fn find_original(
        &self,
        repository: &dyn EnquiryRepository,
        mobile: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Enquiry>> {
        let since = now - self.window;
        let matches = repository.find_by_mobile_within(mobile, since, now).await?;

        let original = matches
            .into_iter()
            .filter(|e| !e.is_duplicate)
            .min_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));

        if let Some(original) = &original {
            info!(
                "🔁 Mobile {} already enquired at {} (enquiry {})",
                mobile, original.created_at, original.id
            );
        }

        Ok(original)
    }
}

impl Default for DuplicateDetector {
    fn default() -> Self {
        Self::new(Duration::days(7))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enquiry::tests_support;
    use crate::repository::MemoryStore;

    #[tokio::test]
    async fn test_window_edges_are_inclusive() {
        let store = MemoryStore::new();
        let now = Utc::now();

        let mut earlier = tests_support::enquiry();
        earlier.created_at = now - Duration::days(7);
        store.insert(&earlier, &[]).await.unwrap();

        let detector = DuplicateDetector::default();
        let found = detector.find_original(&store, "9876543210", now).await.unwrap();
        assert_eq!(found.map(|e| e.id), Some(earlier.id));

        let later = now + Duration::seconds(1);
        assert!(detector.find_original(&store, "9876543210", later).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_earliest_match_wins() {
        let store = MemoryStore::new();
        let now = Utc::now();

        let mut first = tests_support::enquiry();
        first.created_at = now - Duration::days(3);
        let mut second = tests_support::enquiry();
        second.created_at = now - Duration::days(1);
        store.insert(&second, &[]).await.unwrap();
        store.insert(&first, &[]).await.unwrap();

        let found = DuplicateDetector::default()
            .find_original(&store, "9876543210", now)
            .await
            .unwrap();
        assert_eq!(found.map(|e| e.id), Some(first.id));
    }

    #[tokio::test]
    async fn test_other_numbers_ignored() {
        let store = MemoryStore::new();
        store.insert(&tests_support::enquiry(), &[]).await.unwrap();

        let found = DuplicateDetector::default()
            .find_original(&store, "9123456780", Utc::now())
            .await
            .unwrap();
        assert!(found.is_none());
    }
}
