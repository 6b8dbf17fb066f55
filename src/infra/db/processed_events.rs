use async_trait::async_trait;
use time::OffsetDateTime;

use crate::application::repos::{PageRequest, ProcessedEventsRepo, RepoError};
use crate::domain::entities::{EventStats, ProcessedEvent};

use super::{PostgresRepositories, map_sqlx_error};

const PROCESSED_EVENT_COLUMNS: &str = "event_id, event_name, total_certificates, \
    generated_count, sent_count, created_at, updated_at";

/// Counter recomputation shared by the single and bulk refresh.
const REFRESH_COUNTERS: &str = r#"
    UPDATE processed_events pe
       SET total_certificates = counts.total,
           generated_count = counts.generated,
           sent_count = counts.sent,
           updated_at = now()
      FROM (
            SELECT pe2.event_id,
                   COUNT(c.id) AS total,
                   COUNT(c.id) FILTER (WHERE c.status IN ('generated', 'sent')) AS generated,
                   COUNT(c.id) FILTER (WHERE c.sent) AS sent
              FROM processed_events pe2
              LEFT JOIN certificates c ON c.event_id = pe2.event_id
             GROUP BY pe2.event_id
           ) counts
     WHERE pe.event_id = counts.event_id
"#;

#[derive(Debug, sqlx::FromRow)]
struct ProcessedEventRow {
    event_id: i64,
    event_name: String,
    total_certificates: i64,
    generated_count: i64,
    sent_count: i64,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl From<ProcessedEventRow> for ProcessedEvent {
    fn from(row: ProcessedEventRow) -> Self {
        ProcessedEvent {
            event_id: row.event_id,
            event_name: row.event_name,
            total_certificates: row.total_certificates,
            generated_count: row.generated_count,
            sent_count: row.sent_count,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct EventStatsRow {
    processed_events: i64,
    complete_events: i64,
    certificates_generated: i64,
}

#[async_trait]
impl ProcessedEventsRepo for PostgresRepositories {
    async fn claim_event(&self, event_id: i64, event_name: &str) -> Result<bool, RepoError> {
        let result = sqlx::query(
            r#"
            INSERT INTO processed_events (event_id, event_name)
            VALUES ($1, $2)
            ON CONFLICT (event_id) DO NOTHING
            "#,
        )
        .bind(event_id)
        .bind(event_name)
        .execute(self.pool())
        .await
        .map_err(map_sqlx_error)?;
        Ok(result.rows_affected() == 1)
    }

    async fn release_claim(&self, event_id: i64) -> Result<(), RepoError> {
        sqlx::query(
            r#"
            DELETE FROM processed_events pe
             WHERE pe.event_id = $1
               AND NOT EXISTS (SELECT 1 FROM certificates c WHERE c.event_id = pe.event_id)
            "#,
        )
        .bind(event_id)
        .execute(self.pool())
        .await
        .map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn upsert_event(&self, event_id: i64, event_name: &str) -> Result<(), RepoError> {
        sqlx::query(
            r#"
            INSERT INTO processed_events (event_id, event_name)
            VALUES ($1, $2)
            ON CONFLICT (event_id)
            DO UPDATE SET event_name = EXCLUDED.event_name, updated_at = now()
            "#,
        )
        .bind(event_id)
        .bind(event_name)
        .execute(self.pool())
        .await
        .map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn refresh_counters(
        &self,
        event_id: i64,
    ) -> Result<Option<ProcessedEvent>, RepoError> {
        let sql = format!("{REFRESH_COUNTERS} AND pe.event_id = $1");
        sqlx::query(&sql)
            .bind(event_id)
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        self.find_processed_event(event_id).await
    }

    async fn refresh_all_counters(&self) -> Result<u64, RepoError> {
        let result = sqlx::query(REFRESH_COUNTERS)
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        Ok(result.rows_affected())
    }

    async fn find_processed_event(
        &self,
        event_id: i64,
    ) -> Result<Option<ProcessedEvent>, RepoError> {
        let sql = format!("SELECT {PROCESSED_EVENT_COLUMNS} FROM processed_events WHERE event_id = $1");
        let row = sqlx::query_as::<_, ProcessedEventRow>(&sql)
            .bind(event_id)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        Ok(row.map(ProcessedEvent::from))
    }

    async fn list_processed_events(
        &self,
        page: PageRequest,
    ) -> Result<Vec<ProcessedEvent>, RepoError> {
        let sql = format!(
            "SELECT {PROCESSED_EVENT_COLUMNS} FROM processed_events \
             ORDER BY created_at DESC, event_id DESC LIMIT $1 OFFSET $2"
        );
        let rows = sqlx::query_as::<_, ProcessedEventRow>(&sql)
            .bind(i64::from(page.limit))
            .bind(i64::from(page.offset))
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        Ok(rows.into_iter().map(ProcessedEvent::from).collect())
    }

    async fn count_processed_events(&self) -> Result<u64, RepoError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM processed_events")
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        Self::convert_count(count)
    }

    async fn event_stats(&self) -> Result<EventStats, RepoError> {
        let row = sqlx::query_as::<_, EventStatsRow>(
            r#"
            SELECT COUNT(*) AS processed_events,
                   COUNT(*) FILTER (
                       WHERE total_certificates > 0 AND sent_count = total_certificates
                   ) AS complete_events,
                   COALESCE(SUM(generated_count), 0)::BIGINT AS certificates_generated
              FROM processed_events
            "#,
        )
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(EventStats {
            processed_events: Self::convert_count(row.processed_events)?,
            complete_events: Self::convert_count(row.complete_events)?,
            certificates_generated: Self::convert_count(row.certificates_generated)?,
        })
    }
}
