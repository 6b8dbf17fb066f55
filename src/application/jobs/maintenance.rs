//! Cron-driven maintenance sweeps. Failures are logged; the next tick tries again.

use apalis::prelude::{Data, Error as ApalisError};
use tracing::warn;

use super::context::JobWorkerContext;

/// Must implement `From<chrono::DateTime<chrono::Utc>>` for apalis-cron compatibility.
#[derive(Default, Debug, Clone)]
pub struct ReprocessTick;

#[derive(Default, Debug, Clone)]
pub struct RefreshCountersTick;

#[derive(Default, Debug, Clone)]
pub struct CleanupTick;

impl From<chrono::DateTime<chrono::Utc>> for ReprocessTick {
    fn from(_: chrono::DateTime<chrono::Utc>) -> Self {
        Self
    }
}

impl From<chrono::DateTime<chrono::Utc>> for RefreshCountersTick {
    fn from(_: chrono::DateTime<chrono::Utc>) -> Self {
        Self
    }
}

impl From<chrono::DateTime<chrono::Utc>> for CleanupTick {
    fn from(_: chrono::DateTime<chrono::Utc>) -> Self {
        Self
    }
}

pub async fn process_reprocess_tick(
    _tick: ReprocessTick,
    ctx: Data<JobWorkerContext>,
) -> Result<(), ApalisError> {
    if let Err(err) = ctx.maintenance.reprocess_failed().await {
        warn!(
            target = "certifier::jobs::maintenance",
            error = %err,
            "Reprocess sweep failed"
        );
    }
    Ok(())
}

pub async fn process_refresh_counters_tick(
    _tick: RefreshCountersTick,
    ctx: Data<JobWorkerContext>,
) -> Result<(), ApalisError> {
    if let Err(err) = ctx.maintenance.refresh_counters().await {
        warn!(
            target = "certifier::jobs::maintenance",
            error = %err,
            "Counter refresh failed"
        );
    }
    Ok(())
}

pub async fn process_cleanup_tick(
    _tick: CleanupTick,
    ctx: Data<JobWorkerContext>,
) -> Result<(), ApalisError> {
    if let Err(err) = ctx.maintenance.cleanup().await {
        warn!(
            target = "certifier::jobs::maintenance",
            error = %err,
            "Retention cleanup failed"
        );
    }
    Ok(())
}
