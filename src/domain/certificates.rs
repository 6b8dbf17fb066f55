//! Certificate lifecycle as pure transitions.
//!
//! Every mutation of a [`Certificate`] goes through one of the functions below. Each
//! returns the next value together with the commands the caller must execute; nothing
//! here touches storage or queues.

use std::time::Duration;

use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::codes;
use crate::domain::types::CertificateStatus;

/// Automatic and manual redelivery stop once this many attempts have failed.
pub const MAX_SEND_ATTEMPTS: i32 = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Certificate {
    pub id: Uuid,
    pub event_id: i64,
    pub participant_id: i64,
    pub validation_code: String,
    pub status: CertificateStatus,
    pub document_ref: Option<String>,
    pub generated_at: Option<OffsetDateTime>,
    pub sent: bool,
    pub sent_at: Option<OffsetDateTime>,
    pub recipient_email: Option<String>,
    pub send_attempts: i32,
    pub last_attempt_at: Option<OffsetDateTime>,
    pub error_log: Option<String>,
    pub event_name: String,
    pub participant_name: String,
    pub participant_email: String,
    pub validation_count: i64,
    pub last_validated_at: Option<OffsetDateTime>,
    /// Bumped by every lifecycle write; guards compare-and-set updates.
    pub version: i64,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// Display fields copied once from upstream services when the pair is first processed.
#[derive(Debug, Clone)]
pub struct NewCertificate {
    pub event_id: i64,
    pub participant_id: i64,
    pub event_name: String,
    pub participant_name: String,
    pub participant_email: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Create the row; fails if the (event, participant) pair already exists.
    Insert,
    /// Compare-and-set update; fails unless the stored row is still at `expected`
    /// status and `version`.
    Update {
        expected: CertificateStatus,
        version: i64,
    },
    EnqueueDelivery {
        certificate_id: Uuid,
        recipient_override: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub certificate: Certificate,
    pub commands: Vec<Command>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("certificate generation is already in progress")]
    InProgress,
    #[error("certificate cannot move from `{from}` to `{to}`")]
    Illegal {
        from: CertificateStatus,
        to: CertificateStatus,
    },
    #[error("certificate has no stored document")]
    MissingDocument,
    #[error("certificate delivery gave up after {attempts} attempts")]
    AttemptsExhausted { attempts: i32 },
}

impl Certificate {
    /// First pickup of a pair: the row is created directly in `generating`.
    pub fn start(new: NewCertificate, now: OffsetDateTime) -> Transition {
        let validation_code =
            codes::generate_validation_code(new.event_id, new.participant_id, now);
        let certificate = Certificate {
            id: Uuid::new_v4(),
            event_id: new.event_id,
            participant_id: new.participant_id,
            validation_code,
            status: CertificateStatus::Generating,
            document_ref: None,
            generated_at: None,
            sent: false,
            sent_at: None,
            recipient_email: None,
            send_attempts: 0,
            last_attempt_at: None,
            error_log: None,
            event_name: new.event_name,
            participant_name: new.participant_name,
            participant_email: new.participant_email,
            validation_count: 0,
            last_validated_at: None,
            version: 0,
            created_at: now,
            updated_at: now,
        };

        Transition {
            certificate,
            commands: vec![Command::Insert],
        }
    }

    /// Restart the cycle for an existing row.
    ///
    /// A fresh document starts a fresh delivery cycle, so delivery state and attempt
    /// counters are reset. The validation code and cached display fields are kept.
    pub fn begin_regeneration(
        &self,
        now: OffsetDateTime,
        stale_after: Duration,
    ) -> Result<Transition, TransitionError> {
        if self.status == CertificateStatus::Generating && !self.is_stale(now, stale_after) {
            return Err(TransitionError::InProgress);
        }

        let certificate = Certificate {
            status: CertificateStatus::Generating,
            document_ref: None,
            generated_at: None,
            sent: false,
            sent_at: None,
            recipient_email: None,
            send_attempts: 0,
            last_attempt_at: None,
            version: self.version + 1,
            updated_at: now,
            ..self.clone()
        };

        Ok(Transition {
            certificate,
            commands: vec![self.update_command()],
        })
    }

    pub fn complete_generation(
        &self,
        document_ref: String,
        now: OffsetDateTime,
        deliver: bool,
    ) -> Result<Transition, TransitionError> {
        self.require(CertificateStatus::Generating, CertificateStatus::Generated)?;

        let certificate = Certificate {
            status: CertificateStatus::Generated,
            document_ref: Some(document_ref),
            generated_at: Some(now),
            error_log: None,
            version: self.version + 1,
            updated_at: now,
            ..self.clone()
        };

        let mut commands = vec![self.update_command()];
        if deliver {
            commands.push(Command::EnqueueDelivery {
                certificate_id: self.id,
                recipient_override: None,
            });
        }

        Ok(Transition {
            certificate,
            commands,
        })
    }

    pub fn fail_generation(
        &self,
        detail: impl Into<String>,
        now: OffsetDateTime,
    ) -> Result<Transition, TransitionError> {
        self.require(CertificateStatus::Generating, CertificateStatus::Error)?;

        let certificate = Certificate {
            status: CertificateStatus::Error,
            error_log: Some(detail.into()),
            last_attempt_at: Some(now),
            version: self.version + 1,
            updated_at: now,
            ..self.clone()
        };

        Ok(Transition {
            certificate,
            commands: vec![self.update_command()],
        })
    }

    /// Record that a delivery attempt is under way.
    ///
    /// The write claims the current version, so of two workers holding the same read
    /// only one gets to send.
    pub fn begin_delivery(&self, now: OffsetDateTime) -> Result<Transition, TransitionError> {
        self.require_deliverable(CertificateStatus::Sent)?;
        if self.send_attempts >= MAX_SEND_ATTEMPTS {
            return Err(TransitionError::AttemptsExhausted {
                attempts: self.send_attempts,
            });
        }

        let certificate = Certificate {
            last_attempt_at: Some(now),
            version: self.version + 1,
            updated_at: now,
            ..self.clone()
        };

        Ok(Transition {
            certificate,
            commands: vec![self.update_command()],
        })
    }

    pub fn mark_sent(
        &self,
        recipient: impl Into<String>,
        now: OffsetDateTime,
    ) -> Result<Transition, TransitionError> {
        self.require_deliverable(CertificateStatus::Sent)?;

        let certificate = Certificate {
            status: CertificateStatus::Sent,
            sent: true,
            sent_at: Some(now),
            recipient_email: Some(recipient.into()),
            version: self.version + 1,
            updated_at: now,
            ..self.clone()
        };

        Ok(Transition {
            certificate,
            commands: vec![self.update_command()],
        })
    }

    pub fn fail_delivery(
        &self,
        detail: impl Into<String>,
        now: OffsetDateTime,
    ) -> Result<Transition, TransitionError> {
        self.require_deliverable(CertificateStatus::Error)?;

        let certificate = Certificate {
            status: CertificateStatus::Error,
            send_attempts: self.send_attempts.saturating_add(1),
            last_attempt_at: Some(now),
            error_log: Some(detail.into()),
            version: self.version + 1,
            updated_at: now,
            ..self.clone()
        };

        Ok(Transition {
            certificate,
            commands: vec![self.update_command()],
        })
    }

    /// Manual reissue is only offered for generated, not yet delivered certificates.
    pub fn can_resend(&self) -> bool {
        self.status == CertificateStatus::Generated && self.send_attempts < MAX_SEND_ATTEMPTS
    }

    /// Whether the reprocessing sweep may pick this certificate up again.
    pub fn retry_eligible(&self) -> bool {
        self.status == CertificateStatus::Error && self.send_attempts < MAX_SEND_ATTEMPTS
    }

    /// A `generating` row untouched for longer than `threshold` is treated as abandoned.
    pub fn is_stale(&self, now: OffsetDateTime, threshold: Duration) -> bool {
        self.status == CertificateStatus::Generating && now - self.updated_at > threshold
    }

    pub fn file_name(&self) -> String {
        codes::build_file_name(
            &self.event_name,
            &self.participant_name,
            &self.validation_code,
        )
    }

    fn update_command(&self) -> Command {
        Command::Update {
            expected: self.status,
            version: self.version,
        }
    }

    fn require(
        &self,
        from: CertificateStatus,
        to: CertificateStatus,
    ) -> Result<(), TransitionError> {
        if self.status == from {
            Ok(())
        } else {
            Err(TransitionError::Illegal {
                from: self.status,
                to,
            })
        }
    }

    /// Deliveries start from `generated`, or from `error` when a document survived.
    fn require_deliverable(&self, to: CertificateStatus) -> Result<(), TransitionError> {
        match self.status {
            CertificateStatus::Generated | CertificateStatus::Error => {
                if self.document_ref.is_some() {
                    Ok(())
                } else {
                    Err(TransitionError::MissingDocument)
                }
            }
            from => Err(TransitionError::Illegal { from, to }),
        }
    }
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;

    const STALE: Duration = Duration::from_secs(15 * 60);

    fn started() -> Certificate {
        Certificate::start(
            NewCertificate {
                event_id: 10,
                participant_id: 20,
                event_name: "RustConf".to_string(),
                participant_name: "Ana Lima".to_string(),
                participant_email: "ana@example.com".to_string(),
            },
            datetime!(2025-06-01 12:00 UTC),
        )
        .certificate
    }

    fn generated() -> Certificate {
        started()
            .complete_generation(
                "2025/06/doc.pdf".to_string(),
                datetime!(2025-06-01 12:01 UTC),
                false,
            )
            .expect("generated")
            .certificate
    }

    #[test]
    fn start_inserts_generating_row() {
        let transition = Certificate::start(
            NewCertificate {
                event_id: 1,
                participant_id: 2,
                event_name: "E".to_string(),
                participant_name: "P".to_string(),
                participant_email: "p@example.com".to_string(),
            },
            datetime!(2025-06-01 12:00 UTC),
        );
        assert_eq!(transition.commands, vec![Command::Insert]);
        assert_eq!(transition.certificate.status, CertificateStatus::Generating);
        assert_eq!(transition.certificate.validation_code.len(), 16);
    }

    #[test]
    fn completion_sets_document_and_requests_delivery() {
        let cert = started();
        let now = datetime!(2025-06-01 12:05 UTC);
        let transition = cert
            .complete_generation("doc.pdf".to_string(), now, true)
            .expect("transition");

        assert_eq!(transition.certificate.status, CertificateStatus::Generated);
        assert_eq!(transition.certificate.generated_at, Some(now));
        assert_eq!(transition.certificate.document_ref.as_deref(), Some("doc.pdf"));
        assert_eq!(
            transition.commands,
            vec![
                Command::Update {
                    expected: CertificateStatus::Generating,
                    version: 0
                },
                Command::EnqueueDelivery {
                    certificate_id: cert.id,
                    recipient_override: None
                }
            ]
        );
    }

    #[test]
    fn completion_requires_generating() {
        let err = generated()
            .complete_generation("again.pdf".to_string(), datetime!(2025-06-02 0:00 UTC), false)
            .expect_err("illegal");
        assert_eq!(
            err,
            TransitionError::Illegal {
                from: CertificateStatus::Generated,
                to: CertificateStatus::Generated
            }
        );
    }

    #[test]
    fn fresh_generating_row_cannot_be_reclaimed() {
        let cert = started();
        let err = cert
            .begin_regeneration(datetime!(2025-06-01 12:05 UTC), STALE)
            .expect_err("in progress");
        assert_eq!(err, TransitionError::InProgress);
    }

    #[test]
    fn stale_generating_row_is_reclaimed() {
        let cert = started();
        let later = datetime!(2025-06-01 13:00 UTC);
        assert!(cert.is_stale(later, STALE));
        let transition = cert.begin_regeneration(later, STALE).expect("reclaim");
        assert_eq!(
            transition.commands,
            vec![Command::Update {
                expected: CertificateStatus::Generating,
                version: 0
            }]
        );
    }

    #[test]
    fn sent_never_returns_to_generating_implicitly() {
        let sent = generated()
            .mark_sent("ana@example.com", datetime!(2025-06-01 12:10 UTC))
            .expect("sent")
            .certificate;

        assert!(matches!(
            sent.complete_generation("x".to_string(), datetime!(2025-06-01 12:11 UTC), false),
            Err(TransitionError::Illegal { .. })
        ));
        assert!(matches!(
            sent.mark_sent("again@example.com", datetime!(2025-06-01 12:11 UTC)),
            Err(TransitionError::Illegal { .. })
        ));
    }

    #[test]
    fn forced_regeneration_resets_delivery_cycle() {
        let mut failed = generated();
        for minute in 0..3 {
            failed = failed
                .fail_delivery("smtp down", datetime!(2025-06-01 13:00 UTC) + time::Duration::minutes(minute))
                .expect("failure")
                .certificate;
        }
        assert_eq!(failed.send_attempts, 3);

        let transition = failed
            .begin_regeneration(datetime!(2025-06-02 0:00 UTC), STALE)
            .expect("regenerate");
        let cert = transition.certificate;
        assert_eq!(cert.status, CertificateStatus::Generating);
        assert_eq!(cert.send_attempts, 0);
        assert_eq!(cert.document_ref, None);
        assert_eq!(cert.generated_at, None);
        assert!(!cert.sent);
        assert_eq!(cert.validation_code, failed.validation_code);
        assert_eq!(
            transition.commands,
            vec![Command::Update {
                expected: CertificateStatus::Error,
                version: 4
            }]
        );
    }

    #[test]
    fn five_delivery_failures_exhaust_resend() {
        let mut cert = generated();
        assert!(cert.can_resend());

        for attempt in 1..=5 {
            cert = cert
                .fail_delivery(format!("attempt {attempt}"), datetime!(2025-06-01 14:00 UTC))
                .expect("failure")
                .certificate;
        }

        assert_eq!(cert.status, CertificateStatus::Error);
        assert_eq!(cert.send_attempts, MAX_SEND_ATTEMPTS);
        assert!(!cert.can_resend());
        assert!(!cert.retry_eligible());
    }

    #[test]
    fn delivery_requires_document() {
        let failed = started()
            .fail_generation("render failed", datetime!(2025-06-01 12:02 UTC))
            .expect("failed")
            .certificate;
        assert_eq!(failed.error_log.as_deref(), Some("render failed"));
        assert_eq!(
            failed.mark_sent("ana@example.com", datetime!(2025-06-01 12:03 UTC)),
            Err(TransitionError::MissingDocument)
        );
    }

    #[test]
    fn delivery_claim_stops_at_attempt_ceiling() {
        let mut cert = generated();
        let claim = cert
            .begin_delivery(datetime!(2025-06-01 13:00 UTC))
            .expect("claim");
        assert_eq!(claim.certificate.status, CertificateStatus::Generated);
        assert_eq!(claim.certificate.version, cert.version + 1);
        assert_eq!(
            claim.certificate.last_attempt_at,
            Some(datetime!(2025-06-01 13:00 UTC))
        );

        for _ in 0..MAX_SEND_ATTEMPTS {
            cert = cert
                .fail_delivery("smtp down", datetime!(2025-06-01 13:00 UTC))
                .expect("failure")
                .certificate;
        }
        assert_eq!(
            cert.begin_delivery(datetime!(2025-06-01 15:00 UTC)),
            Err(TransitionError::AttemptsExhausted {
                attempts: MAX_SEND_ATTEMPTS
            })
        );
    }

    #[test]
    fn every_write_expects_the_version_it_read() {
        let cert = generated();
        assert_eq!(cert.version, 1);

        let first = cert
            .fail_delivery("smtp down", datetime!(2025-06-01 13:00 UTC))
            .expect("first failure");
        let second = cert
            .fail_delivery("smtp down", datetime!(2025-06-01 13:00 UTC))
            .expect("second failure");

        assert_eq!(first.certificate.version, 2);
        assert_eq!(first.commands, second.commands);
        assert_eq!(
            first.commands,
            vec![Command::Update {
                expected: CertificateStatus::Generated,
                version: 1
            }]
        );
    }

    #[test]
    fn successful_regeneration_clears_error_log() {
        let failed = started()
            .fail_generation("render failed", datetime!(2025-06-01 12:02 UTC))
            .expect("failed")
            .certificate;
        let retried = failed
            .begin_regeneration(datetime!(2025-06-01 12:30 UTC), STALE)
            .expect("restart")
            .certificate;
        assert_eq!(retried.error_log.as_deref(), Some("render failed"));

        let done = retried
            .complete_generation("doc.pdf".to_string(), datetime!(2025-06-01 12:31 UTC), false)
            .expect("done")
            .certificate;
        assert_eq!(done.error_log, None);
    }
}
