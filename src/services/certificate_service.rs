use chrono::{Duration, Utc};
use std::sync::Arc;
use uuid::Uuid;

use crate::dto::exam_dto::{CertificateQuery, Paginated};
use crate::error::{Error, Result};
use crate::models::certificate::Certificate;
use crate::models::exam_attempt::{AttemptStatus, ExamAttempt};
use crate::services::notification_service::{notify_best_effort, ExamEvent, Notifier};
use crate::store::{AttemptFilter, Datastore, Pagination};
use crate::utils::token::random_code;

const CERTIFICATE_STATUS_EARNED: &str = "EARNED";

pub fn certificate_number(issued_at_millis: i64) -> String {
    let suffix = random_code(&mut rand::thread_rng(), 9);
    format!("CERT-{}-{}", issued_at_millis, suffix)
}

#[derive(Clone)]
pub struct CertificateService {
    store: Arc<dyn Datastore>,
    notifier: Arc<dyn Notifier>,
    validity_days: i64,
}

impl CertificateService {
    pub fn new(store: Arc<dyn Datastore>, notifier: Arc<dyn Notifier>, validity_days: i64) -> Self {
        Self {
            store,
            notifier,
            validity_days,
        }
    }

    pub async fn generate_certificate(&self, attempt_id: Uuid, user_id: Uuid) -> Result<Certificate> {
        let attempt = self
            .store
            .find_attempt(attempt_id)
            .await?
            .ok_or(Error::AttemptNotFound(attempt_id))?;
        attempt.ensure_owned_by(user_id)?;
        self.issue(&attempt).await
    }

    async fn issue(&self, attempt: &ExamAttempt) -> Result<Certificate> {
        if attempt.status != AttemptStatus::Completed {
            return Err(Error::CertificateNotEligible(
                "exam attempt has not been completed".to_string(),
            ));
        }
        if attempt.is_passed != Some(true) {
            return Err(Error::CertificateNotEligible(
                "exam attempt was not passed".to_string(),
            ));
        }
        if self
            .store
            .find_certificate_by_attempt(attempt.id)
            .await?
            .is_some()
        {
            return Err(Error::CertificateExists(attempt.id));
        }

        let issued_at = Utc::now();
        let certificate = self
            .store
            .insert_certificate(Certificate {
                id: Uuid::new_v4(),
                user_id: attempt.user_id,
                exam_id: attempt.exam_id,
                attempt_id: attempt.id,
                certificate_number: certificate_number(issued_at.timestamp_millis()),
                status: CERTIFICATE_STATUS_EARNED.to_string(),
                is_active: true,
                issued_at,
                expires_at: issued_at + Duration::days(self.validity_days),
            })
            .await?;

        tracing::info!(
            certificate_id = %certificate.id,
            certificate_number = %certificate.certificate_number,
            attempt_id = %attempt.id,
            user_id = %attempt.user_id,
            "Certificate issued"
        );

        notify_best_effort(
            self.notifier.as_ref(),
            ExamEvent::CertificateIssued {
                certificate_id: certificate.id,
                certificate_number: certificate.certificate_number.clone(),
                user_id: certificate.user_id,
                exam_id: certificate.exam_id,
                attempt_id: certificate.attempt_id,
            },
        )
        .await;

        Ok(certificate)
    }

    /// Issues certificates for every passed attempt of the user that has none.
    pub async fn auto_generate_certificates(&self, user_id: Uuid) -> Result<usize> {
        let filter = AttemptFilter {
            user_id: Some(user_id),
            status: Some(AttemptStatus::Completed),
            is_passed: Some(true),
            ..Default::default()
        };
        let (attempts, _) = self.store.list_attempts(&filter, None).await?;

        let mut generated = 0;
        for attempt in &attempts {
            if self.store.find_certificate_by_attempt(attempt.id).await?.is_some() {
                continue;
            }
            match self.issue(attempt).await {
                Ok(_) => generated += 1,
                Err(e) => tracing::warn!(
                    attempt_id = %attempt.id,
                    user_id = %user_id,
                    error = %e,
                    "Skipping certificate backfill for attempt"
                ),
            }
        }
        tracing::info!(user_id = %user_id, generated, "Certificate backfill finished");
        Ok(generated)
    }

    pub async fn list_user_certificates(
        &self,
        user_id: Uuid,
        query: &CertificateQuery,
    ) -> Result<Paginated<Certificate>> {
        let pagination = Pagination::new(query.page.unwrap_or(1), query.limit.unwrap_or(10));
        let (items, total) = self
            .store
            .list_certificates(user_id, query.exam_id, Some(pagination))
            .await?;
        Ok(Paginated::new(items, pagination, total))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::exam_attempt::AttemptScore;
    use crate::services::notification_service::MockNotifier;
    use crate::store::{AttemptSlot, AttemptStore, InMemoryStore};
    use rust_decimal::Decimal;

    async fn attempt(store: &InMemoryStore, user_id: Uuid, passed: Option<bool>) -> ExamAttempt {
        let attempt = ExamAttempt::new(Uuid::new_v4(), user_id, Utc::now());
        let AttemptSlot::Created(attempt) = store.create_attempt_within_limit(attempt, 1).await.unwrap() else {
            panic!("attempt limit reached");
        };
        if let Some(is_passed) = passed {
            let score = AttemptScore {
                total_marks: 2,
                obtained_marks: if is_passed { 2 } else { 0 },
                percentage: Decimal::new(if is_passed { 100 } else { 0 }, 0),
                is_passed,
                completed_at: Utc::now(),
            };
            return store.complete_attempt(attempt.id, &score).await.unwrap().unwrap();
        }
        attempt
    }

    fn service(store: Arc<InMemoryStore>) -> CertificateService {
        let mut notifier = MockNotifier::new();
        notifier
            .expect_notify()
            .withf(|e| matches!(e, ExamEvent::CertificateIssued { .. }))
            .returning(|_| Ok(()));
        CertificateService::new(store, Arc::new(notifier), 365)
    }

    #[test]
    fn number_format() {
        let number = certificate_number(1_700_000_000_000);
        let parts: Vec<&str> = number.split('-').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "CERT");
        assert_eq!(parts[1], "1700000000000");
        assert_eq!(parts[2].len(), 9);
        assert!(parts[2].chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[tokio::test]
    async fn issues_once_for_passed_attempt() {
        let store = Arc::new(InMemoryStore::new());
        let user_id = Uuid::new_v4();
        let passed = attempt(&store, user_id, Some(true)).await;
        let service = service(store);

        let cert = service.generate_certificate(passed.id, user_id).await.unwrap();
        assert_eq!(cert.attempt_id, passed.id);
        assert_eq!((cert.expires_at - cert.issued_at).num_days(), 365);
        assert!(matches!(
            service.generate_certificate(passed.id, user_id).await,
            Err(Error::CertificateExists(id)) if id == passed.id
        ));
    }

    #[tokio::test]
    async fn rejects_ineligible_attempts() {
        let store = Arc::new(InMemoryStore::new());
        let user_id = Uuid::new_v4();
        let failed = attempt(&store, user_id, Some(false)).await;
        let open = attempt(&store, user_id, None).await;
        let service = service(store);

        assert!(matches!(
            service.generate_certificate(failed.id, user_id).await,
            Err(Error::CertificateNotEligible(_))
        ));
        assert!(matches!(
            service.generate_certificate(open.id, user_id).await,
            Err(Error::CertificateNotEligible(_))
        ));
        assert!(matches!(
            service.generate_certificate(failed.id, Uuid::new_v4()).await,
            Err(Error::Unauthorized(_))
        ));
        assert!(matches!(
            service.generate_certificate(Uuid::new_v4(), user_id).await,
            Err(Error::AttemptNotFound(_))
        ));
    }

    #[tokio::test]
    async fn backfill_covers_only_missing_passed_attempts() {
        let store = Arc::new(InMemoryStore::new());
        let user_id = Uuid::new_v4();
        let first = attempt(&store, user_id, Some(true)).await;
        attempt(&store, user_id, Some(true)).await;
        attempt(&store, user_id, Some(false)).await;
        let service = service(store);

        service.generate_certificate(first.id, user_id).await.unwrap();
        assert_eq!(service.auto_generate_certificates(user_id).await.unwrap(), 1);
        assert_eq!(service.auto_generate_certificates(user_id).await.unwrap(), 0);

        let page = service
            .list_user_certificates(user_id, &CertificateQuery::default())
            .await
            .unwrap();
        assert_eq!(page.pagination.total, 2);
    }
}
