use super::mappers::{image_from_row, photo_proof_to_json, submission_from_row};
use super::rows::{ImageRow, SubmissionRow};
use crate::application::ports::SubmissionStore;
use crate::domain::entities::{ImageBlob, Submission};
use crate::domain::value_objects::{
    FailureKind, ImageId, PhotoRef, SubmissionId, SyncStatus, UserId,
};
use crate::infrastructure::database::ConnectionPool;
use crate::shared::config::DatabaseConfig;
use crate::shared::error::AppError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::Row;

const SUBMISSION_COLUMNS: &str = r#"
    id, campaign_id, location_id, community_group_id, community_group_type,
    participant_count, key_issues, photo_proof, status, sync_status, submitted_by,
    submitted_at, created_at, updated_at, attempt_count, last_attempt_at,
    last_error, last_error_kind
"#;

/// SQLite-backed offline queue. Each instance owns its own pool.
pub struct SqliteSubmissionStore {
    pool: ConnectionPool,
    max_pending: u32,
}

impl SqliteSubmissionStore {
    pub async fn open(config: &DatabaseConfig, max_pending: u32) -> Result<Self, AppError> {
        let pool = ConnectionPool::new(config).await?;
        Self::from_pool(pool, max_pending).await
    }

    pub async fn open_in_memory(max_pending: u32) -> Result<Self, AppError> {
        let pool = ConnectionPool::from_memory().await?;
        Self::from_pool(pool, max_pending).await
    }

    /// Runs pending migrations against `pool` before handing out the store.
    pub async fn from_pool(pool: ConnectionPool, max_pending: u32) -> Result<Self, AppError> {
        pool.migrate().await?;
        Ok(Self { pool, max_pending })
    }

    pub fn max_pending(&self) -> u32 {
        self.max_pending
    }

    async fn fetch_submissions(
        &self,
        filter: &str,
        value: &str,
    ) -> Result<Vec<Submission>, AppError> {
        let sql = format!(
            "SELECT {SUBMISSION_COLUMNS} FROM submissions WHERE {filter} = ?1 ORDER BY queue_seq ASC"
        );
        let rows = sqlx::query_as::<_, SubmissionRow>(&sql)
            .bind(value)
            .fetch_all(self.pool.get_pool())
            .await?;

        rows.into_iter().map(submission_from_row).collect()
    }
}

#[async_trait]
impl SubmissionStore for SqliteSubmissionStore {
    async fn put(&self, submission: &Submission) -> Result<(), AppError> {
        let photo_proof = photo_proof_to_json(&submission.photo_proof)?;

        // One statement so the queue bound and the write are atomic. The SELECT
        // yields no row when a new local id would exceed the bound. An overwrite
        // is an edit, so it restarts the retry schedule.
        let result = sqlx::query(
            r#"
            INSERT INTO submissions (
                id, campaign_id, location_id, community_group_id, community_group_type,
                participant_count, key_issues, photo_proof, status, sync_status,
                submitted_by, submitted_at, created_at, updated_at, attempt_count,
                last_attempt_at, last_error, last_error_kind
            )
            SELECT ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18
            WHERE ?10 <> 'local'
               OR EXISTS (SELECT 1 FROM submissions WHERE id = ?1)
               OR (SELECT COUNT(*) FROM submissions WHERE sync_status = 'local') < ?19
            ON CONFLICT(id) DO UPDATE SET
                campaign_id = excluded.campaign_id,
                location_id = excluded.location_id,
                community_group_id = excluded.community_group_id,
                community_group_type = excluded.community_group_type,
                participant_count = excluded.participant_count,
                key_issues = excluded.key_issues,
                photo_proof = excluded.photo_proof,
                status = excluded.status,
                sync_status = CASE
                    WHEN submissions.sync_status = 'synced' THEN 'synced'
                    ELSE excluded.sync_status
                END,
                submitted_by = excluded.submitted_by,
                submitted_at = excluded.submitted_at,
                updated_at = excluded.updated_at,
                attempt_count = 0,
                last_attempt_at = NULL,
                last_error = NULL,
                last_error_kind = NULL
            "#,
        )
        .bind(submission.id.as_str())
        .bind(&submission.campaign_id)
        .bind(&submission.location_id)
        .bind(&submission.community_group_id)
        .bind(&submission.community_group_type)
        .bind(i64::from(submission.participant_count))
        .bind(&submission.key_issues)
        .bind(&photo_proof)
        .bind(submission.status.as_str())
        .bind(submission.sync_status.as_str())
        .bind(submission.submitted_by.as_str())
        .bind(submission.submitted_at.timestamp_millis())
        .bind(submission.created_at.timestamp_millis())
        .bind(submission.updated_at.timestamp_millis())
        .bind(i64::from(submission.attempt.attempt_count))
        .bind(submission.attempt.last_attempt_at.map(|at| at.timestamp_millis()))
        .bind(&submission.attempt.last_error)
        .bind(submission.attempt.last_error_kind.map(|kind| kind.as_str()))
        .bind(i64::from(self.max_pending))
        .execute(self.pool.get_pool())
        .await?;

        if result.rows_affected() == 0 {
            tracing::warn!(
                target: "sync::store",
                submission_id = %submission.id,
                limit = self.max_pending,
                "queue is full; refusing new submission"
            );
            return Err(AppError::QueueFull {
                limit: self.max_pending,
            });
        }
        Ok(())
    }

    async fn get(&self, id: &SubmissionId) -> Result<Submission, AppError> {
        let sql = format!("SELECT {SUBMISSION_COLUMNS} FROM submissions WHERE id = ?1");
        let row = sqlx::query_as::<_, SubmissionRow>(&sql)
            .bind(id.as_str())
            .fetch_optional(self.pool.get_pool())
            .await?
            .ok_or_else(|| AppError::NotFound(format!("submission {id}")))?;
        submission_from_row(row)
    }

    async fn get_all_by_status(&self, status: SyncStatus) -> Result<Vec<Submission>, AppError> {
        self.fetch_submissions("sync_status", status.as_str()).await
    }

    async fn get_all_by_user(&self, user_id: &UserId) -> Result<Vec<Submission>, AppError> {
        self.fetch_submissions("submitted_by", user_id.as_str())
            .await
    }

    async fn count_by_status(&self, status: SyncStatus) -> Result<u32, AppError> {
        let count: i64 =
            sqlx::query("SELECT COUNT(*) AS count FROM submissions WHERE sync_status = ?1")
                .bind(status.as_str())
                .fetch_one(self.pool.get_pool())
                .await?
                .try_get("count")?;
        Ok(u32::try_from(count).unwrap_or(u32::MAX))
    }

    async fn update_status(&self, id: &SubmissionId, status: SyncStatus) -> Result<(), AppError> {
        // The guard refuses synced -> local; a successful sync clears the failure bookkeeping.
        let result = sqlx::query(
            r#"
            UPDATE submissions
            SET sync_status = ?1,
                updated_at = ?2,
                attempt_count = CASE WHEN ?1 = 'synced' THEN 0 ELSE attempt_count END,
                last_attempt_at = CASE WHEN ?1 = 'synced' THEN NULL ELSE last_attempt_at END,
                last_error = CASE WHEN ?1 = 'synced' THEN NULL ELSE last_error END,
                last_error_kind = CASE WHEN ?1 = 'synced' THEN NULL ELSE last_error_kind END
            WHERE id = ?3
              AND NOT (sync_status = 'synced' AND ?1 = 'local')
            "#,
        )
        .bind(status.as_str())
        .bind(Utc::now().timestamp_millis())
        .bind(id.as_str())
        .execute(self.pool.get_pool())
        .await?;

        if result.rows_affected() > 0 {
            return Ok(());
        }

        let current = self.get(id).await?;
        Err(AppError::InvalidStateTransition(format!(
            "submission {id} cannot move from {} to {status}",
            current.sync_status
        )))
    }

    async fn mark_synced_if_unchanged(&self, pushed: &Submission) -> Result<bool, AppError> {
        let photo_proof = photo_proof_to_json(&pushed.photo_proof)?;
        let result = sqlx::query(
            r#"
            UPDATE submissions
            SET sync_status = 'synced',
                updated_at = ?1,
                attempt_count = 0,
                last_attempt_at = NULL,
                last_error = NULL,
                last_error_kind = NULL
            WHERE id = ?2
              AND sync_status = 'local'
              AND campaign_id IS ?3
              AND location_id IS ?4
              AND community_group_id IS ?5
              AND community_group_type = ?6
              AND participant_count = ?7
              AND key_issues = ?8
              AND photo_proof = ?9
              AND status = ?10
              AND submitted_by = ?11
              AND updated_at = ?12
            "#,
        )
        .bind(Utc::now().timestamp_millis())
        .bind(pushed.id.as_str())
        .bind(&pushed.campaign_id)
        .bind(&pushed.location_id)
        .bind(&pushed.community_group_id)
        .bind(&pushed.community_group_type)
        .bind(i64::from(pushed.participant_count))
        .bind(&pushed.key_issues)
        .bind(&photo_proof)
        .bind(pushed.status.as_str())
        .bind(pushed.submitted_by.as_str())
        .bind(pushed.updated_at.timestamp_millis())
        .execute(self.pool.get_pool())
        .await?;

        if result.rows_affected() > 0 {
            return Ok(true);
        }
        // Surfaces NotFound for a removed row.
        self.get(&pushed.id).await?;
        Ok(false)
    }

    async fn replace_photo_proof(
        &self,
        id: &SubmissionId,
        expected: &[PhotoRef],
        replacement: &[PhotoRef],
    ) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE submissions
            SET photo_proof = ?1
            WHERE id = ?2 AND sync_status = 'local' AND photo_proof = ?3
            "#,
        )
        .bind(photo_proof_to_json(replacement)?)
        .bind(id.as_str())
        .bind(photo_proof_to_json(expected)?)
        .execute(self.pool.get_pool())
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn record_attempt_failure(
        &self,
        id: &SubmissionId,
        kind: FailureKind,
        reason: &str,
    ) -> Result<(), AppError> {
        let result = sqlx::query(
            r#"
            UPDATE submissions
            SET attempt_count = attempt_count + 1,
                last_attempt_at = ?1,
                last_error = ?2,
                last_error_kind = ?3
            WHERE id = ?4
            "#,
        )
        .bind(Utc::now().timestamp_millis())
        .bind(reason)
        .bind(kind.as_str())
        .bind(id.as_str())
        .execute(self.pool.get_pool())
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("submission {id}")));
        }
        Ok(())
    }

    async fn remove(&self, id: &SubmissionId) -> Result<(), AppError> {
        sqlx::query("DELETE FROM submissions WHERE id = ?1")
            .bind(id.as_str())
            .execute(self.pool.get_pool())
            .await?;
        Ok(())
    }

    async fn put_image(&self, blob: &ImageBlob) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO submission_images (id, data, content_type, byte_len, sha256, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(id) DO UPDATE SET
                data = excluded.data,
                content_type = excluded.content_type,
                byte_len = excluded.byte_len,
                sha256 = excluded.sha256
            "#,
        )
        .bind(blob.id.as_str())
        .bind(&blob.bytes)
        .bind(&blob.content_type)
        .bind(blob.byte_len() as i64)
        .bind(&blob.sha256)
        .bind(blob.created_at.timestamp_millis())
        .execute(self.pool.get_pool())
        .await?;
        Ok(())
    }

    async fn get_image(&self, id: &ImageId) -> Result<ImageBlob, AppError> {
        let row = sqlx::query_as::<_, ImageRow>(
            r#"
            SELECT id, data, content_type, byte_len, sha256, created_at
            FROM submission_images
            WHERE id = ?1
            "#,
        )
        .bind(id.as_str())
        .fetch_optional(self.pool.get_pool())
        .await?
        .ok_or_else(|| AppError::NotFound(format!("image {id}")))?;
        image_from_row(row)
    }

    async fn remove_image(&self, id: &ImageId) -> Result<(), AppError> {
        sqlx::query("DELETE FROM submission_images WHERE id = ?1")
            .bind(id.as_str())
            .execute(self.pool.get_pool())
            .await?;
        Ok(())
    }

    async fn purge_synced(&self, older_than: DateTime<Utc>) -> Result<u64, AppError> {
        let result = sqlx::query(
            "DELETE FROM submissions WHERE sync_status = 'synced' AND updated_at < ?1",
        )
        .bind(older_than.timestamp_millis())
        .execute(self.pool.get_pool())
        .await?;
        Ok(result.rows_affected())
    }

    async fn close(&self) {
        self.pool.close().await;
        tracing::debug!(target: "sync::store", "submission store closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::{SubmissionDraft, SyncAttempt};
    use crate::domain::value_objects::SubmissionStatus;

    fn submission(user: &str, issues: &str) -> Submission {
        Submission::from_draft(
            SubmissionDraft {
                campaign_id: Some("camp-1".into()),
                location_id: None,
                community_group_id: Some("grp-3".into()),
                community_group_type: "elders".into(),
                participant_count: 7,
                key_issues: issues.into(),
                photo_proof: vec![
                    "https://cdn.example.org/a.jpg".parse().unwrap(),
                    "local:img-1".parse().unwrap(),
                ],
                status: SubmissionStatus::Submitted,
                submitted_by: UserId::new(user.into()).unwrap(),
            },
            Utc::now(),
        )
    }

    async fn store(max_pending: u32) -> SqliteSubmissionStore {
        SqliteSubmissionStore::open_in_memory(max_pending)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_put_and_get_roundtrip_fields() {
        let store = store(10).await;
        let original = submission("u-1", "flooding");
        store.put(&original).await.unwrap();

        let loaded = store.get(&original.id).await.unwrap();
        assert_eq!(loaded.id, original.id);
        assert_eq!(loaded.photo_proof, original.photo_proof);
        assert_eq!(loaded.community_group_id.as_deref(), Some("grp-3"));
        assert_eq!(loaded.sync_status, SyncStatus::Local);
        assert_eq!(
            loaded.created_at.timestamp_millis(),
            original.created_at.timestamp_millis()
        );
    }

    #[tokio::test]
    async fn test_overwrite_keeps_insertion_order() {
        let store = store(10).await;
        let first = submission("u-1", "one");
        let second = submission("u-1", "two");
        store.put(&first).await.unwrap();
        store.put(&second).await.unwrap();

        let mut edited = first.clone();
        edited.key_issues = "one, revised".into();
        store.put(&edited).await.unwrap();

        let local = store.get_all_by_status(SyncStatus::Local).await.unwrap();
        let ids: Vec<_> = local.iter().map(|s| s.id.clone()).collect();
        assert_eq!(ids, vec![first.id.clone(), second.id.clone()]);
        assert_eq!(local[0].key_issues, "one, revised");
    }

    #[tokio::test]
    async fn test_synced_is_never_downgraded() {
        let store = store(10).await;
        let item = submission("u-1", "roads");
        store.put(&item).await.unwrap();
        store
            .update_status(&item.id, SyncStatus::Synced)
            .await
            .unwrap();

        // A stale local copy written back must not resurrect the item.
        store.put(&item).await.unwrap();
        assert_eq!(
            store.get(&item.id).await.unwrap().sync_status,
            SyncStatus::Synced
        );

        let err = store
            .update_status(&item.id, SyncStatus::Local)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidStateTransition(_)));
        assert_eq!(store.count_by_status(SyncStatus::Local).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_update_status_of_missing_id_is_not_found() {
        let store = store(10).await;
        let err = store
            .update_status(&SubmissionId::generate(), SyncStatus::Synced)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_attempt_failures_accumulate_and_clear_on_sync() {
        let store = store(10).await;
        let item = submission("u-1", "schools");
        store.put(&item).await.unwrap();

        store
            .record_attempt_failure(&item.id, FailureKind::Transient, "timeout")
            .await
            .unwrap();
        store
            .record_attempt_failure(&item.id, FailureKind::Rejected, "bad group type")
            .await
            .unwrap();

        let loaded = store.get(&item.id).await.unwrap();
        assert_eq!(loaded.attempt.attempt_count, 2);
        assert_eq!(loaded.attempt.last_error.as_deref(), Some("bad group type"));
        assert_eq!(loaded.attempt.last_error_kind, Some(FailureKind::Rejected));
        assert!(loaded.attempt.last_attempt_at.is_some());

        store
            .update_status(&item.id, SyncStatus::Synced)
            .await
            .unwrap();
        let synced = store.get(&item.id).await.unwrap();
        assert_eq!(synced.attempt.attempt_count, 0);
        assert!(synced.attempt.last_error.is_none());
    }

    #[tokio::test]
    async fn test_overwrite_clears_attempt_bookkeeping() {
        let store = store(10).await;
        let item = submission("u-1", "clinic");
        store.put(&item).await.unwrap();
        store
            .record_attempt_failure(&item.id, FailureKind::Rejected, "participant_count missing")
            .await
            .unwrap();

        let mut corrected = store.get(&item.id).await.unwrap();
        assert_eq!(corrected.attempt.attempt_count, 1);
        corrected.participant_count = 12;
        store.put(&corrected).await.unwrap();

        let loaded = store.get(&item.id).await.unwrap();
        assert_eq!(loaded.participant_count, 12);
        assert_eq!(loaded.attempt, SyncAttempt::default());
    }

    #[tokio::test]
    async fn test_mark_synced_only_when_row_matches_push() {
        let store = store(10).await;
        let item = submission("u-1", "market access");
        store.put(&item).await.unwrap();
        let pushed = store.get(&item.id).await.unwrap();

        let mut edited = pushed.clone();
        edited.key_issues = "market access, bridge out".into();
        store.put(&edited).await.unwrap();

        assert!(!store.mark_synced_if_unchanged(&pushed).await.unwrap());
        assert_eq!(
            store.get(&item.id).await.unwrap().sync_status,
            SyncStatus::Local
        );

        let current = store.get(&item.id).await.unwrap();
        assert!(store.mark_synced_if_unchanged(&current).await.unwrap());
        let synced = store.get(&item.id).await.unwrap();
        assert_eq!(synced.sync_status, SyncStatus::Synced);
        assert!(!store.mark_synced_if_unchanged(&current).await.unwrap());

        store.remove(&item.id).await.unwrap();
        assert!(matches!(
            store.mark_synced_if_unchanged(&current).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_replace_photo_proof_requires_expected_list() {
        let store = store(10).await;
        let item = submission("u-1", "latrines");
        store.put(&item).await.unwrap();
        let uploaded = vec![
            PhotoRef::Remote("https://cdn.example.org/a.jpg".into()),
            PhotoRef::Remote("https://cdn.example.org/img-1".into()),
        ];

        assert!(!store
            .replace_photo_proof(&item.id, &[], &uploaded)
            .await
            .unwrap());
        assert!(store
            .replace_photo_proof(&item.id, &item.photo_proof, &uploaded)
            .await
            .unwrap());
        assert_eq!(store.get(&item.id).await.unwrap().photo_proof, uploaded);
    }

    #[tokio::test]
    async fn test_queue_bound_applies_to_new_ids_only() {
        let store = store(2).await;
        let a = submission("u-1", "a");
        let b = submission("u-1", "b");
        store.put(&a).await.unwrap();
        store.put(&b).await.unwrap();

        let err = store.put(&submission("u-1", "c")).await.unwrap_err();
        assert_eq!(err, AppError::QueueFull { limit: 2 });

        let mut edited = a.clone();
        edited.participant_count = 40;
        store.put(&edited).await.unwrap();

        store.update_status(&b.id, SyncStatus::Synced).await.unwrap();
        store.put(&submission("u-1", "c")).await.unwrap();
    }

    #[tokio::test]
    async fn test_get_all_by_user_spans_statuses() {
        let store = store(10).await;
        let mine = submission("u-1", "mine");
        let theirs = submission("u-2", "theirs");
        let mine_synced = submission("u-1", "mine too");
        for item in [&mine, &theirs, &mine_synced] {
            store.put(item).await.unwrap();
        }
        store
            .update_status(&mine_synced.id, SyncStatus::Synced)
            .await
            .unwrap();

        let user = UserId::new("u-1".into()).unwrap();
        let listed = store.get_all_by_user(&user).await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, mine.id);
        assert_eq!(listed[1].sync_status, SyncStatus::Synced);
    }

    #[tokio::test]
    async fn test_remove_is_idempotent() {
        let store = store(10).await;
        let item = submission("u-1", "x");
        store.put(&item).await.unwrap();
        store.remove(&item.id).await.unwrap();
        store.remove(&item.id).await.unwrap();
        assert!(matches!(store.get(&item.id).await, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_images_roundtrip_and_missing_is_not_found() {
        let store = store(10).await;
        let blob = ImageBlob::new(ImageId::new("img-1".into()).unwrap(), vec![9; 64], "image/jpeg");
        store.put_image(&blob).await.unwrap();

        let loaded = store.get_image(&blob.id).await.unwrap();
        assert_eq!(loaded.bytes, blob.bytes);
        assert_eq!(loaded.sha256, blob.sha256);

        store.remove_image(&blob.id).await.unwrap();
        store.remove_image(&blob.id).await.unwrap();
        assert!(matches!(
            store.get_image(&blob.id).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_purge_synced_respects_cutoff() {
        let store = store(10).await;
        let old = submission("u-1", "old");
        let pending = submission("u-1", "pending");
        store.put(&old).await.unwrap();
        store.put(&pending).await.unwrap();
        store.update_status(&old.id, SyncStatus::Synced).await.unwrap();

        let none = store
            .purge_synced(Utc::now() - chrono::Duration::hours(1))
            .await
            .unwrap();
        assert_eq!(none, 0);

        let removed = store
            .purge_synced(Utc::now() + chrono::Duration::seconds(1))
            .await
            .unwrap();
        assert_eq!(removed, 1);
        assert_eq!(store.count_by_status(SyncStatus::Local).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_stores_are_isolated() {
        let one = store(10).await;
        let two = store(10).await;
        one.put(&submission("u-1", "only here")).await.unwrap();
        assert_eq!(two.count_by_status(SyncStatus::Local).await.unwrap(), 0);
        one.close().await;
    }
}
