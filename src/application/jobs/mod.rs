mod context;
mod deliver;
mod generate;
mod maintenance;
mod queue;
mod retry;
mod scan;

pub use context::{JobWorkerContext, job_failed};
pub use deliver::{DeliverCertificateJobPayload, enqueue_delivery_job, process_deliver_job};
pub use generate::{
    GenerateEventJobPayload, GenerateParticipantJobPayload, enqueue_event_generation_job,
    enqueue_participant_generation_job, process_generate_event_job,
    process_generate_participant_job,
};
pub use maintenance::{
    CleanupTick, RefreshCountersTick, ReprocessTick, process_cleanup_tick,
    process_refresh_counters_tick, process_reprocess_tick,
};
pub use queue::enqueue_job;
pub use retry::{
    JobFailure, RetryDecision, RetryPolicy, handle_failure, is_transient, with_timeout,
};
pub use scan::{
    ScanFinishedEventsPayload, ScanTick, enqueue_scan_job, process_scan_job, process_scan_tick,
};
