//! Per-app stopword ledger.

use std::sync::Arc;

use diary_store::DiaryStore;
use entities::{App, AppDraft, AppId, CourseId, ReconcileReport, Stopword};

use crate::AccessResult;

/// The versioned exclusion list of each app.
///
/// Rows are keyed by (app, word) and carry an enabled flag. Nothing is ever
/// removed, so an older analytics run can always be explained by the rows
/// that were enabled at the time.
pub struct StopwordLedger<S: DiaryStore + ?Sized> {
    store: Arc<S>,
}

impl<S: DiaryStore + ?Sized> Clone for StopwordLedger<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
        }
    }
}

impl<S: DiaryStore + ?Sized> StopwordLedger<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Moves the app's enabled set to `desired` in one transaction.
    pub async fn reconcile(&self, app_id: AppId, desired: &[String]) -> AccessResult<ReconcileReport> {
        let report = self.store.reconcile_stopwords(app_id, desired).await?;
        log_report(app_id, &report);
        Ok(report)
    }

    /// Creates an app whose ledger starts at `desired`. Either both land or
    /// neither does.
    pub async fn create_app(
        &self,
        course_id: CourseId,
        draft: AppDraft,
        desired: &[String],
    ) -> AccessResult<(App, ReconcileReport)> {
        let (app, report) = self
            .store
            .create_app_with_stopwords(course_id, draft, desired)
            .await?;
        log_report(app.id, &report);
        Ok((app, report))
    }

    /// Edits an app and moves its enabled set to `desired` in one transaction.
    pub async fn update_app(
        &self,
        app_id: AppId,
        draft: AppDraft,
        desired: &[String],
    ) -> AccessResult<(App, ReconcileReport)> {
        let (app, report) = self
            .store
            .update_app_with_stopwords(app_id, draft, desired)
            .await?;
        log_report(app_id, &report);
        Ok((app, report))
    }

    /// All rows of the app, disabled ones included.
    pub async fn history(&self, app_id: AppId) -> AccessResult<Vec<Stopword>> {
        Ok(self.store.list_stopwords(app_id).await?)
    }

    /// The words currently excluded from the app's analytics.
    pub async fn enabled_words(&self, app_id: AppId) -> AccessResult<Vec<String>> {
        Ok(self
            .history(app_id)
            .await?
            .into_iter()
            .filter(|s| s.enabled)
            .map(|s| s.word)
            .collect())
    }
}

fn log_report(app_id: AppId, report: &ReconcileReport) {
    if !report.is_noop() {
        tracing::info!(
            app_id,
            inserted = report.inserted,
            reenabled = report.reenabled,
            disabled = report.disabled,
            "Reconciled stopwords"
        );
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use diary_store::MemoryDiaryStore;
    use entities::{AppDraft, CourseDraft, NewUser, Role};

    use super::*;

    async fn ledger_with_app() -> (StopwordLedger<MemoryDiaryStore>, AppId) {
        let store = Arc::new(MemoryDiaryStore::new());
        let professor = store
            .create_user(NewUser::new("Pat", "Prof", "p@example.edu", Role::Professor))
            .await
            .unwrap();
        let course = store
            .create_course(CourseDraft::new("Diaries", "PSY 101"), professor.id)
            .await
            .unwrap();
        let app = store.create_app(course.id, draft("A1")).await.unwrap();
        (StopwordLedger::new(store), app.id)
    }

    fn draft(name: &str) -> AppDraft {
        let start = Utc::now();
        AppDraft {
            name: name.to_string(),
            intro: String::new(),
            start_time: start,
            end_time: start + Duration::days(7),
            num_entries: 3,
            max_students: 5,
            template_link: None,
        }
    }

    fn words(list: &[&str]) -> Vec<String> {
        list.iter().map(|w| w.to_string()).collect()
    }

    #[tokio::test]
    async fn test_reconcile_never_removes_rows() {
        let (ledger, app_id) = ledger_with_app().await;

        ledger.reconcile(app_id, &words(&["the", "a"])).await.unwrap();
        ledger.reconcile(app_id, &words(&["a"])).await.unwrap();
        ledger.reconcile(app_id, &[]).await.unwrap();

        let history = ledger.history(app_id).await.unwrap();
        assert_eq!(history.len(), 2);
        assert!(history.iter().all(|s| !s.enabled));
        assert!(ledger.enabled_words(app_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_reconcile_twice_gives_same_enabled_set() {
        let (ledger, app_id) = ledger_with_app().await;
        let desired = words(&["um", "like"]);

        ledger.reconcile(app_id, &desired).await.unwrap();
        let first = ledger.enabled_words(app_id).await.unwrap();
        let report = ledger.reconcile(app_id, &desired).await.unwrap();
        let second = ledger.enabled_words(app_id).await.unwrap();

        assert!(report.is_noop());
        assert_eq!(first, second);
        assert_eq!(ledger.history(app_id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_update_app_moves_fields_and_words_together() {
        let (ledger, app_id) = ledger_with_app().await;
        ledger.reconcile(app_id, &words(&["the"])).await.unwrap();

        let (app, report) = ledger
            .update_app(app_id, draft("Renamed"), &words(&["um"]))
            .await
            .unwrap();

        assert_eq!(app.name, "Renamed");
        assert_eq!((report.inserted, report.disabled), (1, 1));
        assert_eq!(ledger.enabled_words(app_id).await.unwrap(), vec!["um"]);
    }

    #[tokio::test]
    async fn test_failed_app_write_leaves_words_untouched() {
        let (ledger, app_id) = ledger_with_app().await;
        ledger.reconcile(app_id, &words(&["the"])).await.unwrap();

        let missing = ledger.update_app(app_id + 100, draft("Ghost"), &words(&["um"])).await;
        assert!(missing.is_err());
        let orphan = ledger.create_app(999, draft("Orphan"), &words(&["um"])).await;
        assert!(orphan.is_err());

        assert_eq!(ledger.enabled_words(app_id).await.unwrap(), vec!["the"]);
        assert_eq!(ledger.history(app_id).await.unwrap().len(), 1);
    }
}
