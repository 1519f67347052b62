//! Status reconciliation.
//!
//! A crash mid-run can leave a repository stuck at `generating` (or
//! `not_started`) even though its documents were committed. Every status
//! query cross-checks the document store and upgrades such rows to
//! `complete`. The correction is idempotent and never demotes.

use tracing::info;

use docsmith_core::{DocStatus, StatusRecord};
use docsmith_store::Database;

pub struct StatusReconciler {
    db: Database,
}

impl StatusReconciler {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// The authoritative status for `repo_name`: the stored value, upgraded
    /// to `complete` when documents prove the work finished.
    pub async fn reconciled_status(&self, repo_name: &str) -> StatusRecord {
        let stored = self.db.status_for(repo_name).await;
        if stored.status == DocStatus::Complete {
            return stored;
        }

        let has_docs = self.db.documents_exist(repo_name).await.unwrap_or(false);
        if !has_docs {
            return stored;
        }

        info!(
            repo = repo_name,
            stale_status = %stored.status,
            "documents exist; upgrading stale status to complete"
        );
        let corrected = StatusRecord::complete();
        self.db
            .set_status(
                repo_name,
                corrected.status,
                corrected.progress as i64,
                &corrected.message,
            )
            .await;
        corrected
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docsmith_core::status::READY_MESSAGE;

    #[tokio::test]
    async fn upgrades_stale_generating_status_when_documents_exist() {
        let db = Database::open_in_memory().unwrap();
        db.set_status("demo", DocStatus::Generating, 55, "Generating…").await;
        db.upsert_document("demo", "a.md", "# A").await.unwrap();
        db.upsert_document("demo", "b.md", "# B").await.unwrap();
        db.upsert_document("demo", "c.md", "# C").await.unwrap();

        let reconciler = StatusReconciler::new(db.clone());
        let record = reconciler.reconciled_status("demo").await;
        assert_eq!(record.status, DocStatus::Complete);
        assert_eq!(record.progress, 100);
        assert_eq!(record.message, READY_MESSAGE);

        // The correction is persisted, not just reported.
        let stored = db.status_for("demo").await;
        assert_eq!(stored.status, DocStatus::Complete);
        assert_eq!(stored.progress, 100);
    }

    #[tokio::test]
    async fn reconciliation_is_idempotent() {
        let db = Database::open_in_memory().unwrap();
        db.set_status("demo", DocStatus::NotStarted, 0, "pending").await;
        db.upsert_document("demo", "a.md", "# A").await.unwrap();

        let reconciler = StatusReconciler::new(db.clone());
        let first = reconciler.reconciled_status("demo").await;
        let second = reconciler.reconciled_status("demo").await;
        assert_eq!(first.status, second.status);
        assert_eq!(first.progress, second.progress);
        assert_eq!(first.message, second.message);
    }

    #[tokio::test]
    async fn never_upgrades_without_documents() {
        let db = Database::open_in_memory().unwrap();
        db.set_status("demo", DocStatus::Generating, 40, "Working").await;

        let reconciler = StatusReconciler::new(db.clone());
        let record = reconciler.reconciled_status("demo").await;
        assert_eq!(record.status, DocStatus::Generating);
        assert_eq!(record.progress, 40);
    }

    #[tokio::test]
    async fn never_demotes_an_error_status_without_documents() {
        let db = Database::open_in_memory().unwrap();
        db.set_status("demo", DocStatus::Error, 35, "analyzer failed").await;

        let reconciler = StatusReconciler::new(db.clone());
        let record = reconciler.reconciled_status("demo").await;
        assert_eq!(record.status, DocStatus::Error);
    }

    #[tokio::test]
    async fn unknown_repositories_report_not_started() {
        let db = Database::open_in_memory().unwrap();
        let reconciler = StatusReconciler::new(db);
        let record = reconciler.reconciled_status("ghost").await;
        assert_eq!(record.status, DocStatus::NotStarted);
        assert_eq!(record.progress, 0);
    }
}
