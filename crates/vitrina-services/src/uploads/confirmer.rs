use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use vitrina_core::models::VerifiedObject;
use vitrina_core::validation::normalize_etag;
use vitrina_core::{AppError, UploadPolicy, UploadRecord, UploadStatus};
use vitrina_db::{FailedAttempt, UploadRecordStore};
use vitrina_storage::{ObjectMetadata, ObjectStorage};

use super::bounded;

/// Compare-and-swap attempts before giving up on a hot record
const MAX_CAS_ATTEMPTS: usize = 3;

/// Object metadata the client observed after its PUT
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientReportedMetadata {
    pub etag: String,
    pub size: u64,
    pub last_modified: Option<DateTime<Utc>>,
}

/// Verifies client-reported uploads against object storage and settles record status.
///
/// Outcomes:
/// - `Ok(record)` with `Confirmed` status (first confirmation or an idempotent repeat)
/// - `Err(VerificationMismatch)` for a counted (or identical, uncounted) failed verification
/// - `Err(UploadGone)` for `Orphaned`, exhausted `Failed`, or a deadline that just passed
/// - `Err(TransientStorage)` when the HEAD lookup fails or times out; nothing is counted
pub struct UploadConfirmer {
    store: Arc<dyn UploadRecordStore>,
    storage: Arc<dyn ObjectStorage>,
    policy: UploadPolicy,
}

impl UploadConfirmer {
    pub fn new(
        store: Arc<dyn UploadRecordStore>,
        storage: Arc<dyn ObjectStorage>,
        policy: UploadPolicy,
    ) -> Self {
        Self {
            store,
            storage,
            policy,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.policy.max_confirm_attempts
    }

    pub async fn confirm(
        &self,
        upload_token: &str,
        reported: &ClientReportedMetadata,
    ) -> Result<UploadRecord, AppError> {
        self.confirm_at(upload_token, reported, Utc::now()).await
    }

    #[tracing::instrument(
        skip(self, upload_token, reported),
        fields(token = %vitrina_core::models::token_hint(upload_token), reported_size = reported.size)
    )]
    pub async fn confirm_at(
        &self,
        upload_token: &str,
        reported: &ClientReportedMetadata,
        now: DateTime<Utc>,
    ) -> Result<UploadRecord, AppError> {
        let mut record = self
            .store
            .find_by_token(upload_token)
            .await?
            .ok_or_else(|| AppError::NotFound("Upload token not found".to_string()))?;

        for _ in 0..MAX_CAS_ATTEMPTS {
            match record.status {
                UploadStatus::Confirmed => return self.repeat_confirmation(record, reported),
                UploadStatus::Failed | UploadStatus::Orphaned => return Err(self.gone(&record)),
                UploadStatus::Pending => {}
            }

            if record.expires_at <= now {
                match self
                    .store
                    .mark_orphaned(record.id, record.revision, now)
                    .await?
                {
                    Some(orphaned) => {
                        tracing::info!(
                            record_id = %orphaned.id,
                            expires_at = %orphaned.expires_at,
                            "Confirmation arrived after deadline, upload orphaned"
                        );
                        return Err(self.gone(&orphaned));
                    }
                    None => {
                        record = self.reload(&record).await?;
                        continue;
                    }
                }
            }

            let observed = bounded(
                self.policy.storage_timeout,
                "head",
                self.storage.head(&record.storage_key),
            )
            .await?;

            let settled = match verify(&record, reported, observed.as_ref()) {
                Ok(verified) => {
                    self.store
                        .mark_confirmed(record.id, record.revision, &verified, now)
                        .await?
                        .map(|confirmed| {
                            tracing::info!(
                                record_id = %confirmed.id,
                                size_bytes = verified.size_bytes,
                                "Upload confirmed"
                            );
                            Ok(confirmed)
                        })
                }
                Err(reason) => {
                    let fingerprint = failure_fingerprint(reported, observed.as_ref());
                    if record.last_failure_fingerprint.as_deref() == Some(fingerprint.as_str()) {
                        tracing::debug!(
                            record_id = %record.id,
                            "Identical failed confirmation retried, not counted again"
                        );
                        return Err(self.mismatch(&record, reason));
                    }

                    let failure = FailedAttempt {
                        fingerprint,
                        reason: reason.clone(),
                    };
                    self.store
                        .record_failed_attempt(
                            record.id,
                            record.revision,
                            &failure,
                            self.policy.max_confirm_attempts,
                            now,
                        )
                        .await?
                        .map(|counted| {
                            tracing::warn!(
                                record_id = %counted.id,
                                failed_attempts = counted.failed_attempts,
                                status = %counted.status,
                                reason = %reason,
                                "Upload verification failed"
                            );
                            Err(self.mismatch(&counted, reason))
                        })
                }
            };

            match settled {
                Some(outcome) => return outcome,
                None => {
                    tracing::debug!(record_id = %record.id, "Lost compare-and-swap, re-reading");
                    record = self.reload(&record).await?;
                }
            }
        }

        Err(AppError::VersionConflict(
            "Upload is being confirmed concurrently, retry the request".to_string(),
        ))
    }

    /// A repeat confirmation of a settled upload succeeds only for the same object.
    fn repeat_confirmation(
        &self,
        record: UploadRecord,
        reported: &ClientReportedMetadata,
    ) -> Result<UploadRecord, AppError> {
        let stored = record.etag.as_deref().map(normalize_etag);
        if stored.as_deref() == Some(normalize_etag(&reported.etag).as_str()) {
            Ok(record)
        } else {
            Err(AppError::Conflict(
                "Upload was already confirmed with a different ETag".to_string(),
            ))
        }
    }

    fn gone(&self, record: &UploadRecord) -> AppError {
        AppError::UploadGone {
            status: record.status,
            attempts_remaining: record.attempts_remaining(self.policy.max_confirm_attempts),
        }
    }

    fn mismatch(&self, record: &UploadRecord, reason: String) -> AppError {
        AppError::VerificationMismatch {
            attempts_remaining: record.attempts_remaining(self.policy.max_confirm_attempts),
            terminal: record.status == UploadStatus::Failed,
            reason,
        }
    }

    async fn reload(&self, record: &UploadRecord) -> Result<UploadRecord, AppError> {
        self.store
            .find_by_id(record.id)
            .await?
            .ok_or_else(|| AppError::NotFound("Upload record disappeared".to_string()))
    }
}

/// Compare the stored object with what was declared at issuance and what the client reports.
fn verify(
    record: &UploadRecord,
    reported: &ClientReportedMetadata,
    observed: Option<&ObjectMetadata>,
) -> Result<VerifiedObject, String> {
    let observed = observed.ok_or_else(|| "object not found in storage".to_string())?;

    let declared = record.declared_size_bytes.max(0) as u64;
    if observed.size != declared {
        return Err(format!(
            "stored size {} does not match declared size {}",
            observed.size, declared
        ));
    }
    if reported.size != observed.size {
        return Err(format!(
            "reported size {} does not match stored size {}",
            reported.size, observed.size
        ));
    }

    let reported_etag = normalize_etag(&reported.etag);
    let etag = match observed.e_tag.as_deref().map(normalize_etag) {
        Some(stored) if stored != reported_etag => {
            return Err(format!(
                "reported etag {} does not match stored etag {}",
                reported_etag, stored
            ));
        }
        Some(stored) => stored,
        // Some S3-compatible providers omit ETags on HEAD; size already matched
        None => reported_etag,
    };

    Ok(VerifiedObject {
        size_bytes: observed.size as i64,
        etag,
        last_modified: Some(observed.last_modified),
    })
}

/// Digest of reported and observed state; two failures with equal digests are one attempt.
fn failure_fingerprint(
    reported: &ClientReportedMetadata,
    observed: Option<&ObjectMetadata>,
) -> String {
    let observed_part = match observed {
        Some(meta) => format!(
            "{}:{}",
            meta.e_tag.as_deref().map(normalize_etag).unwrap_or_default(),
            meta.size
        ),
        None => "absent".to_string(),
    };
    let mut hasher = Sha256::new();
    hasher.update(normalize_etag(&reported.etag).as_bytes());
    hasher.update(b"|");
    hasher.update(reported.size.to_string().as_bytes());
    hasher.update(b"|");
    hasher.update(observed_part.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{intent, reported, UploadHarness};
    use chrono::Duration as ChronoDuration;
    use std::time::Duration;

    #[tokio::test]
    async fn test_scenario_confirm_then_repeat() {
        let harness = UploadHarness::new();
        let issued = harness
            .issuer
            .issue(intent("commerce", 42, "ID_CARD", "cedula.pdf", "application/pdf", 204_800))
            .await
            .unwrap();
        harness
            .storage
            .put_object(&issued.record.storage_key, 204_800, "abc123");

        let token = &issued.record.upload_token;
        let first = harness
            .confirmer
            .confirm(token, &reported("abc123", 204_800))
            .await
            .unwrap();
        assert_eq!(first.status, UploadStatus::Confirmed);
        assert_eq!(first.actual_size_bytes, Some(204_800));
        assert_eq!(first.etag.as_deref(), Some("abc123"));
        assert!(first.uploaded_at.is_some());

        let head_calls = harness.storage.head_calls();
        let second = harness
            .confirmer
            .confirm(token, &reported("\"abc123\"", 204_800))
            .await
            .unwrap();
        assert_eq!(second.status, UploadStatus::Confirmed);
        assert_eq!(second.revision, first.revision);
        // Settled uploads are not re-verified
        assert_eq!(harness.storage.head_calls(), head_calls);
    }

    #[tokio::test]
    async fn test_confirmed_with_different_etag_conflicts() {
        let harness = UploadHarness::new();
        let record = harness.issue_and_confirm("commerce", 42, "ID_CARD").await;
        let err = harness
            .confirmer
            .confirm(&record.upload_token, &reported("other", 1024))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_unknown_token() {
        let harness = UploadHarness::new();
        let err = harness
            .confirmer
            .confirm("deadbeef", &reported("abc", 1))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_scenario_size_mismatch_until_failed() {
        let harness = UploadHarness::new();
        let issued = harness
            .issuer
            .issue(intent("commerce", 42, "ID_CARD", "cedula.pdf", "application/pdf", 204_800))
            .await
            .unwrap();
        let token = issued.record.upload_token.clone();
        let key = issued.record.storage_key.clone();

        // Five distinct wrong uploads (the client re-PUTs each time, new ETag each time)
        for attempt in 1..=5u32 {
            let etag = format!("etag-{}", attempt);
            harness.storage.put_object(&key, 190_000, &etag);
            let err = harness
                .confirmer
                .confirm(&token, &reported(&etag, 190_000))
                .await
                .unwrap_err();
            match err {
                AppError::VerificationMismatch {
                    attempts_remaining,
                    terminal,
                    ..
                } => {
                    assert_eq!(attempts_remaining, 5 - attempt);
                    assert_eq!(terminal, attempt == 5);
                }
                other => panic!("unexpected error: {:?}", other),
            }
        }

        let record = harness.store.get(issued.record.id).unwrap();
        assert_eq!(record.status, UploadStatus::Failed);
        assert_eq!(record.failed_attempts, 5);

        let err = harness
            .confirmer
            .confirm(&token, &reported("etag-6", 190_000))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AppError::UploadGone {
                status: UploadStatus::Failed,
                attempts_remaining: 0
            }
        ));
    }

    #[tokio::test]
    async fn test_oversized_attempt_ceiling_never_fails_the_record() {
        let mut policy = vitrina_core::UploadPolicy::default();
        policy.max_confirm_attempts = u32::MAX;
        let harness = UploadHarness::with_policy(policy);
        let issued = harness
            .issuer
            .issue(intent("commerce", 42, "ID_CARD", "cedula.pdf", "application/pdf", 204_800))
            .await
            .unwrap();
        harness
            .storage
            .put_object(&issued.record.storage_key, 190_000, "short");

        let err = harness
            .confirmer
            .confirm(&issued.record.upload_token, &reported("short", 190_000))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Internal(_)));
        let record = harness.store.get(issued.record.id).unwrap();
        assert_eq!(record.status, UploadStatus::Pending);
        assert_eq!(record.failed_attempts, 0);
    }

    #[tokio::test]
    async fn test_identical_failed_retry_is_counted_once() {
        let harness = UploadHarness::new();
        let issued = harness
            .issuer
            .issue(intent("commerce", 42, "ID_CARD", "cedula.pdf", "application/pdf", 204_800))
            .await
            .unwrap();
        harness
            .storage
            .put_object(&issued.record.storage_key, 190_000, "short");

        let token = &issued.record.upload_token;
        let metadata = reported("short", 190_000);
        for _ in 0..3 {
            let err = harness.confirmer.confirm(token, &metadata).await.unwrap_err();
            assert!(matches!(
                err,
                AppError::VerificationMismatch {
                    attempts_remaining: 4,
                    terminal: false,
                    ..
                }
            ));
        }
        let record = harness.store.get(issued.record.id).unwrap();
        assert_eq!(record.failed_attempts, 1);
        assert_eq!(record.status, UploadStatus::Pending);
    }

    #[tokio::test]
    async fn test_missing_object_is_counted_then_recovers() {
        let harness = UploadHarness::new();
        let issued = harness
            .issuer
            .issue(intent("product", 5, "PRODUCT_PHOTO", "shoe.webp", "image/webp", 2048))
            .await
            .unwrap();
        let token = &issued.record.upload_token;

        let err = harness
            .confirmer
            .confirm(token, &reported("e1", 2048))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::VerificationMismatch { .. }));

        harness.storage.put_object(&issued.record.storage_key, 2048, "e1");
        let confirmed = harness
            .confirmer
            .confirm(token, &reported("e1", 2048))
            .await
            .unwrap();
        assert_eq!(confirmed.status, UploadStatus::Confirmed);
        assert_eq!(confirmed.failed_attempts, 1);
    }

    #[tokio::test]
    async fn test_reported_etag_mismatch() {
        let harness = UploadHarness::new();
        let issued = harness
            .issuer
            .issue(intent("commerce", 42, "TAX_REGISTRATION", "rut.pdf", "application/pdf", 500))
            .await
            .unwrap();
        harness.storage.put_object(&issued.record.storage_key, 500, "real");
        let err = harness
            .confirmer
            .confirm(&issued.record.upload_token, &reported("forged", 500))
            .await
            .unwrap_err();
        match err {
            AppError::VerificationMismatch { reason, .. } => assert!(reason.contains("etag")),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_storage_failure_is_transient_and_not_counted() {
        let harness = UploadHarness::new();
        let issued = harness
            .issuer
            .issue(intent("commerce", 42, "ID_CARD", "cedula.pdf", "application/pdf", 100))
            .await
            .unwrap();
        harness.storage.put_object(&issued.record.storage_key, 100, "ok");

        harness.storage.set_fail_head(true);
        let err = harness
            .confirmer
            .confirm(&issued.record.upload_token, &reported("ok", 100))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::TransientStorage(_)));
        assert_eq!(harness.store.get(issued.record.id).unwrap().failed_attempts, 0);

        harness.storage.set_fail_head(false);
        let confirmed = harness
            .confirmer
            .confirm(&issued.record.upload_token, &reported("ok", 100))
            .await
            .unwrap();
        assert_eq!(confirmed.status, UploadStatus::Confirmed);
    }

    #[tokio::test]
    async fn test_head_timeout_is_transient() {
        let mut policy = vitrina_core::UploadPolicy::default();
        policy.storage_timeout = Duration::from_millis(20);
        let harness = UploadHarness::with_policy(policy);
        let issued = harness
            .issuer
            .issue(intent("commerce", 42, "ID_CARD", "cedula.pdf", "application/pdf", 100))
            .await
            .unwrap();
        harness.storage.put_object(&issued.record.storage_key, 100, "ok");
        harness.storage.set_head_delay(Some(Duration::from_millis(500)));

        let err = harness
            .confirmer
            .confirm(&issued.record.upload_token, &reported("ok", 100))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::TransientStorage(_)));
        let record = harness.store.get(issued.record.id).unwrap();
        assert_eq!(record.status, UploadStatus::Pending);
        assert_eq!(record.failed_attempts, 0);
    }

    #[tokio::test]
    async fn test_expired_pending_becomes_orphaned() {
        let harness = UploadHarness::new();
        let issued = harness
            .issuer
            .issue(intent("commerce", 42, "ID_CARD", "cedula.pdf", "application/pdf", 100))
            .await
            .unwrap();
        harness.storage.put_object(&issued.record.storage_key, 100, "ok");

        let later = issued.record.expires_at + ChronoDuration::seconds(1);
        let err = harness
            .confirmer
            .confirm_at(&issued.record.upload_token, &reported("ok", 100), later)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AppError::UploadGone {
                status: UploadStatus::Orphaned,
                ..
            }
        ));
        assert_eq!(
            harness.store.get(issued.record.id).unwrap().status,
            UploadStatus::Orphaned
        );
        // No HEAD once the deadline has passed
        assert_eq!(harness.storage.head_calls(), 0);

        let err = harness
            .confirmer
            .confirm(&issued.record.upload_token, &reported("ok", 100))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::UploadGone { .. }));
    }

    #[tokio::test]
    async fn test_concurrent_identical_confirms_settle_once() {
        let harness = UploadHarness::new();
        let issued = harness
            .issuer
            .issue(intent("commerce", 42, "ID_CARD", "cedula.pdf", "application/pdf", 4096))
            .await
            .unwrap();
        harness.storage.put_object(&issued.record.storage_key, 4096, "same");

        let mut handles = Vec::new();
        for _ in 0..8 {
            let confirmer = harness.confirmer.clone();
            let token = issued.record.upload_token.clone();
            handles.push(tokio::spawn(async move {
                confirmer.confirm(&token, &reported("same", 4096)).await
            }));
        }
        for handle in handles {
            let record = handle.await.unwrap().unwrap();
            assert_eq!(record.status, UploadStatus::Confirmed);
        }
        let record = harness.store.get(issued.record.id).unwrap();
        assert_eq!(record.status, UploadStatus::Confirmed);
        assert_eq!(record.failed_attempts, 0);
    }

    #[tokio::test]
    async fn test_concurrent_identical_mismatches_count_once() {
        let harness = UploadHarness::new();
        let issued = harness
            .issuer
            .issue(intent("commerce", 42, "ID_CARD", "cedula.pdf", "application/pdf", 4096))
            .await
            .unwrap();
        harness.storage.put_object(&issued.record.storage_key, 1000, "short");

        let mut handles = Vec::new();
        for _ in 0..6 {
            let confirmer = harness.confirmer.clone();
            let token = issued.record.upload_token.clone();
            handles.push(tokio::spawn(async move {
                confirmer.confirm(&token, &reported("short", 1000)).await
            }));
        }
        for handle in handles {
            let err = handle.await.unwrap().unwrap_err();
            assert!(matches!(err, AppError::VerificationMismatch { .. }));
        }
        assert_eq!(harness.store.get(issued.record.id).unwrap().failed_attempts, 1);
    }

    #[test]
    fn test_fingerprint_ignores_etag_quoting() {
        let observed = ObjectMetadata {
            size: 10,
            e_tag: Some("\"abc\"".to_string()),
            last_modified: Utc::now(),
        };
        let a = failure_fingerprint(&reported("\"abc\"", 9), Some(&observed));
        let b = failure_fingerprint(&reported("abc", 9), Some(&observed));
        let c = failure_fingerprint(&reported("abc", 8), Some(&observed));
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, failure_fingerprint(&reported("abc", 9), None));
    }
}
