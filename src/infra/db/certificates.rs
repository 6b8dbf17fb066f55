use async_trait::async_trait;
use sqlx::{Postgres, QueryBuilder};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::repos::{CertificateFilter, CertificatesRepo, PageRequest, RepoError};
use crate::domain::{
    certificates::{Certificate, MAX_SEND_ATTEMPTS},
    entities::CertificateStats,
    types::CertificateStatus,
};

use super::{PostgresRepositories, map_sqlx_error};

const CERTIFICATE_COLUMNS: &str = "id, event_id, participant_id, validation_code, status, \
    document_ref, generated_at, sent, sent_at, recipient_email, send_attempts, \
    last_attempt_at, error_log, event_name, participant_name, participant_email, \
    validation_count, last_validated_at, version, created_at, updated_at";

#[derive(Debug, sqlx::FromRow)]
struct CertificateRow {
    id: Uuid,
    event_id: i64,
    participant_id: i64,
    validation_code: String,
    status: CertificateStatus,
    document_ref: Option<String>,
    generated_at: Option<OffsetDateTime>,
    sent: bool,
    sent_at: Option<OffsetDateTime>,
    recipient_email: Option<String>,
    send_attempts: i32,
    last_attempt_at: Option<OffsetDateTime>,
    error_log: Option<String>,
    event_name: String,
    participant_name: String,
    participant_email: String,
    validation_count: i64,
    last_validated_at: Option<OffsetDateTime>,
    version: i64,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl From<CertificateRow> for Certificate {
    fn from(row: CertificateRow) -> Self {
        Certificate {
            id: row.id,
            event_id: row.event_id,
            participant_id: row.participant_id,
            validation_code: row.validation_code,
            status: row.status,
            document_ref: row.document_ref,
            generated_at: row.generated_at,
            sent: row.sent,
            sent_at: row.sent_at,
            recipient_email: row.recipient_email,
            send_attempts: row.send_attempts,
            last_attempt_at: row.last_attempt_at,
            error_log: row.error_log,
            event_name: row.event_name,
            participant_name: row.participant_name,
            participant_email: row.participant_email,
            validation_count: row.validation_count,
            last_validated_at: row.last_validated_at,
            version: row.version,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct StatsRow {
    total: i64,
    pending: i64,
    generating: i64,
    generated: i64,
    sent: i64,
    error: i64,
    delivered: i64,
}

impl PostgresRepositories {
    fn select_where(predicate: &str) -> String {
        format!("SELECT {CERTIFICATE_COLUMNS} FROM certificates WHERE {predicate}")
    }

    fn push_filter(qb: &mut QueryBuilder<'_, Postgres>, filter: &CertificateFilter) {
        qb.push(" WHERE 1=1");
        if let Some(event_id) = filter.event_id {
            qb.push(" AND event_id = ");
            qb.push_bind(event_id);
        }
        if let Some(participant_id) = filter.participant_id {
            qb.push(" AND participant_id = ");
            qb.push_bind(participant_id);
        }
        if let Some(status) = filter.status {
            qb.push(" AND status = ");
            qb.push_bind(status);
        }
    }

    async fn list_by_status_before(
        &self,
        status: CertificateStatus,
        predicate: &str,
        before: OffsetDateTime,
        limit: u32,
    ) -> Result<Vec<Certificate>, RepoError> {
        let sql = format!(
            "{} ORDER BY updated_at ASC LIMIT $3",
            Self::select_where(&format!("status = $1 AND {predicate}"))
        );
        let rows = sqlx::query_as::<_, CertificateRow>(&sql)
            .bind(status)
            .bind(before)
            .bind(i64::from(limit))
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        Ok(rows.into_iter().map(Certificate::from).collect())
    }
}

#[async_trait]
impl CertificatesRepo for PostgresRepositories {
    async fn insert_certificate(&self, certificate: &Certificate) -> Result<(), RepoError> {
        sqlx::query(
            r#"
            INSERT INTO certificates (
                id, event_id, participant_id, validation_code, status, document_ref,
                generated_at, sent, sent_at, recipient_email, send_attempts, last_attempt_at,
                error_log, event_name, participant_name, participant_email,
                validation_count, last_validated_at, version, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16,
                    $17, $18, $19, $20, $21)
            "#,
        )
        .bind(certificate.id)
        .bind(certificate.event_id)
        .bind(certificate.participant_id)
        .bind(&certificate.validation_code)
        .bind(certificate.status)
        .bind(&certificate.document_ref)
        .bind(certificate.generated_at)
        .bind(certificate.sent)
        .bind(certificate.sent_at)
        .bind(&certificate.recipient_email)
        .bind(certificate.send_attempts)
        .bind(certificate.last_attempt_at)
        .bind(&certificate.error_log)
        .bind(&certificate.event_name)
        .bind(&certificate.participant_name)
        .bind(&certificate.participant_email)
        .bind(certificate.validation_count)
        .bind(certificate.last_validated_at)
        .bind(certificate.version)
        .bind(certificate.created_at)
        .bind(certificate.updated_at)
        .execute(self.pool())
        .await
        .map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn update_certificate(
        &self,
        certificate: &Certificate,
        expected: CertificateStatus,
        version: i64,
    ) -> Result<(), RepoError> {
        let result = sqlx::query(
            r#"
            UPDATE certificates
               SET status = $3,
                   document_ref = $4,
                   generated_at = $5,
                   sent = $6,
                   sent_at = $7,
                   recipient_email = $8,
                   send_attempts = $9,
                   last_attempt_at = $10,
                   error_log = $11,
                   updated_at = $12,
                   version = $13
             WHERE id = $1 AND status = $2 AND version = $14
            "#,
        )
        .bind(certificate.id)
        .bind(expected)
        .bind(certificate.status)
        .bind(&certificate.document_ref)
        .bind(certificate.generated_at)
        .bind(certificate.sent)
        .bind(certificate.sent_at)
        .bind(&certificate.recipient_email)
        .bind(certificate.send_attempts)
        .bind(certificate.last_attempt_at)
        .bind(&certificate.error_log)
        .bind(certificate.updated_at)
        .bind(certificate.version)
        .bind(version)
        .execute(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(RepoError::StaleWrite);
        }
        Ok(())
    }

    async fn find_certificate(&self, id: Uuid) -> Result<Option<Certificate>, RepoError> {
        let sql = Self::select_where("id = $1");
        let row = sqlx::query_as::<_, CertificateRow>(&sql)
            .bind(id)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        Ok(row.map(Certificate::from))
    }

    async fn find_by_pair(
        &self,
        event_id: i64,
        participant_id: i64,
    ) -> Result<Option<Certificate>, RepoError> {
        let sql = Self::select_where("event_id = $1 AND participant_id = $2");
        let row = sqlx::query_as::<_, CertificateRow>(&sql)
            .bind(event_id)
            .bind(participant_id)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        Ok(row.map(Certificate::from))
    }

    async fn find_by_code(&self, code: &str) -> Result<Option<Certificate>, RepoError> {
        let sql = Self::select_where("validation_code = $1");
        let row = sqlx::query_as::<_, CertificateRow>(&sql)
            .bind(code)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        Ok(row.map(Certificate::from))
    }

    async fn record_validation(&self, id: Uuid, at: OffsetDateTime) -> Result<(), RepoError> {
        sqlx::query(
            r#"
            UPDATE certificates
               SET validation_count = validation_count + 1,
                   last_validated_at = $2
             WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(at)
        .execute(self.pool())
        .await
        .map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn list_certificates(
        &self,
        filter: &CertificateFilter,
        page: PageRequest,
    ) -> Result<Vec<Certificate>, RepoError> {
        let mut qb = QueryBuilder::new(format!("SELECT {CERTIFICATE_COLUMNS} FROM certificates"));
        Self::push_filter(&mut qb, filter);
        qb.push(" ORDER BY created_at DESC, id DESC LIMIT ");
        qb.push_bind(i64::from(page.limit));
        qb.push(" OFFSET ");
        qb.push_bind(i64::from(page.offset));

        let rows = qb
            .build_query_as::<CertificateRow>()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        Ok(rows.into_iter().map(Certificate::from).collect())
    }

    async fn count_certificates(&self, filter: &CertificateFilter) -> Result<u64, RepoError> {
        let mut qb = QueryBuilder::new("SELECT COUNT(*) FROM certificates");
        Self::push_filter(&mut qb, filter);
        let count: i64 = qb
            .build_query_scalar()
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        Self::convert_count(count)
    }

    async fn certificate_stats(&self) -> Result<CertificateStats, RepoError> {
        let row = sqlx::query_as::<_, StatsRow>(
            r#"
            SELECT COUNT(*) AS total,
                   COUNT(*) FILTER (WHERE status = 'pending') AS pending,
                   COUNT(*) FILTER (WHERE status = 'generating') AS generating,
                   COUNT(*) FILTER (WHERE status = 'generated') AS generated,
                   COUNT(*) FILTER (WHERE status = 'sent') AS sent,
                   COUNT(*) FILTER (WHERE status = 'error') AS error,
                   COUNT(*) FILTER (WHERE sent) AS delivered
              FROM certificates
            "#,
        )
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(CertificateStats {
            total: Self::convert_count(row.total)?,
            pending: Self::convert_count(row.pending)?,
            generating: Self::convert_count(row.generating)?,
            generated: Self::convert_count(row.generated)?,
            sent: Self::convert_count(row.sent)?,
            error: Self::convert_count(row.error)?,
            delivered: Self::convert_count(row.delivered)?,
        })
    }

    async fn list_retry_candidates(
        &self,
        cutoff: OffsetDateTime,
        limit: u32,
    ) -> Result<Vec<Certificate>, RepoError> {
        let predicate = format!(
            "send_attempts < {MAX_SEND_ATTEMPTS} \
             AND COALESCE(last_attempt_at, updated_at) < $2"
        );
        self.list_by_status_before(CertificateStatus::Error, &predicate, cutoff, limit)
            .await
    }

    async fn list_stale_generating(
        &self,
        updated_before: OffsetDateTime,
        limit: u32,
    ) -> Result<Vec<Certificate>, RepoError> {
        self.list_by_status_before(
            CertificateStatus::Generating,
            "updated_at < $2",
            updated_before,
            limit,
        )
        .await
    }

    async fn delete_expired(&self, cutoff: OffsetDateTime) -> Result<u64, RepoError> {
        let result = sqlx::query(
            r#"
            DELETE FROM certificates
             WHERE created_at < $1
               AND status IN ('error', 'pending')
            "#,
        )
        .bind(cutoff)
        .execute(self.pool())
        .await
        .map_err(map_sqlx_error)?;
        Ok(result.rows_affected())
    }
}
