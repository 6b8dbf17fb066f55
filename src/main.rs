use std::{process, sync::Arc};

use apalis::{
    layers::WorkerBuilderExt,
    prelude::{Monitor, WorkerBuilder, WorkerFactoryFn},
};
use apalis_cron::CronStream;
use apalis_sql::{Config as ApalisSqlConfig, postgres::PostgresStorage};
use certifier::{
    application::{
        auth::ApiTokenVerifier,
        certificates::CertificateService,
        delivery::{DeliveryService, Mailer},
        documents::DocumentStore,
        error::AppError,
        generation::{GenerationRequest, GenerationService, GenerationSettings},
        jobs::{
            JobWorkerContext, process_cleanup_tick, process_deliver_job,
            process_generate_event_job, process_generate_participant_job,
            process_refresh_counters_tick, process_reprocess_tick, process_scan_job,
            process_scan_tick,
        },
        ledger::CertificateLedger,
        maintenance::MaintenanceService,
        processed_events::ProcessedEventsService,
        remote::{AttendanceClient, EventsClient, RegistrationsClient},
        render::{DocumentRenderer, Issuer, PdfEngine},
        repos::{CertificatesRepo, JobsRepo, ProcessedEventsRepo},
        scan::FinishedEventScanner,
    },
    config,
    domain::types::JobType,
    infra::{
        db::PostgresRepositories,
        documents::FsDocumentStore,
        error::InfraError,
        http::{self, ApiState, HttpState, RouterState},
        mailer::HttpMailer,
        pdf::CommandPdfEngine,
        remote::{HttpAttendanceClient, HttpEventsClient, HttpRegistrationsClient},
        telemetry,
    },
};
use serde::Serialize;
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::Worker(_) => run_worker(settings).await,
        config::Command::Scan(_) => run_scan_once(settings).await,
        config::Command::Generate(args) => run_generate(settings, args).await,
        config::Command::Maintenance(args) => run_maintenance(settings, args.task).await,
    }
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let (http_repositories, job_repositories) = init_repositories(&settings).await?;
    let app = build_application_context(http_repositories, job_repositories.clone(), &settings)?;

    if app.api_state.verifier.is_empty() {
        warn!(
            target = "certifier::startup",
            "No API tokens configured; authenticated endpoints will reject every request"
        );
    }

    let monitor_handle = spawn_job_monitor(job_repositories, app.job_context.clone(), &settings);

    let result = serve_http(&settings, app.http_state, app.api_state).await;

    monitor_handle.abort();
    let _ = monitor_handle.await;

    result
}

async fn run_worker(settings: config::Settings) -> Result<(), AppError> {
    let (http_repositories, job_repositories) = init_repositories(&settings).await?;
    let app = build_application_context(http_repositories, job_repositories.clone(), &settings)?;

    let monitor_handle = spawn_job_monitor(job_repositories, app.job_context, &settings);
    info!(target = "certifier::worker", "Workers started");

    shutdown_signal().await;
    info!(target = "certifier::worker", "Shutdown requested");
    monitor_handle.abort();
    let _ = monitor_handle.await;
    Ok(())
}

async fn run_scan_once(settings: config::Settings) -> Result<(), AppError> {
    let (http_repositories, job_repositories) = init_repositories(&settings).await?;
    let app = build_application_context(http_repositories, job_repositories, &settings)?;

    let report = app
        .job_context
        .scanner
        .scan()
        .await
        .map_err(|err| AppError::unexpected(format!("scan failed: {err}")))?;
    print_report(&report)
}

async fn run_generate(
    settings: config::Settings,
    args: config::GenerateArgs,
) -> Result<(), AppError> {
    let (http_repositories, job_repositories) = init_repositories(&settings).await?;
    let app = build_application_context(http_repositories, job_repositories, &settings)?;

    info!(
        target = "certifier::generate",
        event_id = args.event_id,
        force = args.force,
        send_email = !args.no_email,
        "Starting inline generation"
    );

    let report = app
        .job_context
        .generation
        .generate_for_event(GenerationRequest {
            event_id: args.event_id,
            force: args.force,
            send_email: !args.no_email,
        })
        .await
        .map_err(|err| {
            AppError::unexpected(format!(
                "generation for event {} failed: {err}",
                args.event_id
            ))
        })?;
    print_report(&report)
}

async fn run_maintenance(
    settings: config::Settings,
    task: config::MaintenanceTask,
) -> Result<(), AppError> {
    let (http_repositories, job_repositories) = init_repositories(&settings).await?;
    let app = build_application_context(http_repositories, job_repositories, &settings)?;
    let maintenance = &app.job_context.maintenance;

    let sweep_failed =
        |err: certifier::application::repos::RepoError| AppError::unexpected(err.to_string());
    match task {
        config::MaintenanceTask::Reprocess => {
            let report = maintenance.reprocess_failed().await.map_err(sweep_failed)?;
            print_report(&report)
        }
        config::MaintenanceTask::RefreshCounters => {
            let refreshed = maintenance.refresh_counters().await.map_err(sweep_failed)?;
            info!(
                target = "certifier::maintenance",
                refreshed, "Counters refreshed"
            );
            Ok(())
        }
        config::MaintenanceTask::Cleanup => {
            let deleted = maintenance.cleanup().await.map_err(sweep_failed)?;
            info!(
                target = "certifier::maintenance",
                deleted, "Expired certificates removed"
            );
            Ok(())
        }
    }
}

fn print_report<T: Serialize>(report: &T) -> Result<(), AppError> {
    let rendered = serde_json::to_string_pretty(report)
        .map_err(|err| AppError::unexpected(format!("failed to encode report: {err}")))?;
    println!("{rendered}");
    Ok(())
}

struct ApplicationContext {
    http_state: HttpState,
    api_state: ApiState,
    job_context: JobWorkerContext,
}

async fn init_repositories(
    settings: &config::Settings,
) -> Result<(Arc<PostgresRepositories>, Arc<PostgresRepositories>), AppError> {
    let database_url = settings
        .database
        .url
        .as_ref()
        .ok_or_else(|| InfraError::configuration("database url is not configured"))
        .map_err(AppError::from)?;

    let http_pool =
        PostgresRepositories::connect(database_url, settings.database.http_max_connections.get())
            .await
            .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    PostgresRepositories::run_migrations(&http_pool)
        .await
        .map_err(|err| AppError::from(InfraError::migration(err.to_string())))?;

    let jobs_pool =
        PostgresRepositories::connect(database_url, settings.database.jobs_max_connections.get())
            .await
            .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    Ok((
        Arc::new(PostgresRepositories::new(http_pool)),
        Arc::new(PostgresRepositories::new(jobs_pool)),
    ))
}

fn build_application_context(
    http_repositories: Arc<PostgresRepositories>,
    job_repositories: Arc<PostgresRepositories>,
    settings: &config::Settings,
) -> Result<ApplicationContext, AppError> {
    let services = &settings.services;
    let events: Arc<dyn EventsClient> = Arc::new(
        HttpEventsClient::new(services.events_url.as_str(), services.request_timeout)
            .map_err(AppError::from)?,
    );
    let attendance: Arc<dyn AttendanceClient> = Arc::new(
        HttpAttendanceClient::new(services.attendance_url.as_str(), services.request_timeout)
            .map_err(AppError::from)?,
    );
    let registrations: Arc<dyn RegistrationsClient> = Arc::new(
        HttpRegistrationsClient::new(
            services.registrations_url.as_str(),
            services.request_timeout,
        )
        .map_err(AppError::from)?,
    );
    let mailer: Arc<dyn Mailer> = Arc::new(
        HttpMailer::new(
            settings.mail.endpoint.as_str(),
            settings.mail.sender.clone(),
            settings.mail.token.clone(),
            services.request_timeout,
        )
        .map_err(AppError::from)?,
    );
    let documents: Arc<dyn DocumentStore> = Arc::new(
        FsDocumentStore::new(settings.storage.documents_dir.clone())
            .map_err(|err| AppError::from(InfraError::Io(err)))?,
    );
    let pdf_engine: Arc<dyn PdfEngine> = Arc::new(CommandPdfEngine::new(
        settings.render.pdf_engine_path.clone(),
        settings.render.pdf_engine_args.clone(),
    ));
    let issuer = Issuer {
        system_name: settings.public.system_name.clone(),
        public_base_url: settings.public.base_url.as_str().to_string(),
    };

    // Workers write through the jobs pool; API requests use the HTTP pool.
    let worker_certificates: Arc<dyn CertificatesRepo> = job_repositories.clone();
    let worker_processed: Arc<dyn ProcessedEventsRepo> = job_repositories.clone();
    let worker_jobs: Arc<dyn JobsRepo> = job_repositories;
    let http_certificates: Arc<dyn CertificatesRepo> = http_repositories.clone();
    let http_processed: Arc<dyn ProcessedEventsRepo> = http_repositories.clone();
    let http_jobs: Arc<dyn JobsRepo> = http_repositories.clone();

    let ledger = CertificateLedger::new(worker_certificates.clone(), worker_jobs.clone());
    let generation = GenerationService::new(
        events.clone(),
        attendance,
        registrations,
        worker_processed.clone(),
        ledger.clone(),
        DocumentRenderer::new(pdf_engine, settings.render.default_template_path.clone()),
        documents.clone(),
        issuer.clone(),
        GenerationSettings {
            concurrency: settings.jobs.generation_parallelism.get() as usize,
            stale_after: settings.jobs.stale_generating_after,
            ..GenerationSettings::default()
        },
    );
    let delivery = DeliveryService::new(ledger, documents.clone(), mailer, issuer.clone());
    let scanner = FinishedEventScanner::new(events, worker_processed.clone(), worker_jobs.clone());
    let maintenance = MaintenanceService::new(
        worker_certificates,
        worker_processed,
        worker_jobs.clone(),
        settings.jobs.stale_generating_after,
    );

    let job_context = JobWorkerContext {
        scanner: Arc::new(scanner),
        generation: Arc::new(generation),
        delivery: Arc::new(delivery),
        maintenance: Arc::new(maintenance),
        jobs: worker_jobs,
        job_timeout: settings.jobs.job_timeout,
    };

    let api_state = ApiState {
        certificates: Arc::new(CertificateService::new(
            http_certificates,
            documents,
            http_jobs.clone(),
        )),
        processed_events: Arc::new(ProcessedEventsService::new(
            http_processed,
            http_jobs.clone(),
        )),
        jobs: http_jobs,
        verifier: Arc::new(ApiTokenVerifier::new(&settings.auth.api_tokens)),
        issuer,
    };

    let http_state = HttpState {
        db: http_repositories,
    };

    Ok(ApplicationContext {
        http_state,
        api_state,
        job_context,
    })
}

fn spawn_job_monitor(
    repositories: Arc<PostgresRepositories>,
    context: JobWorkerContext,
    settings: &config::Settings,
) -> tokio::task::JoinHandle<()> {
    let jobs = &settings.jobs;
    let scheduler = &settings.scheduler;
    let scan_storage = PostgresStorage::new_with_config(
        repositories.pool().clone(),
        ApalisSqlConfig::new(JobType::ScanFinishedEvents.as_str()),
    );
    let generate_event_storage = PostgresStorage::new_with_config(
        repositories.pool().clone(),
        ApalisSqlConfig::new(JobType::GenerateEventCertificates.as_str()),
    );
    let generate_participant_storage = PostgresStorage::new_with_config(
        repositories.pool().clone(),
        ApalisSqlConfig::new(JobType::GenerateParticipantCertificate.as_str()),
    );
    let deliver_storage = PostgresStorage::new_with_config(
        repositories.pool().clone(),
        ApalisSqlConfig::new(JobType::DeliverCertificate.as_str()),
    );

    let scan_worker = WorkerBuilder::new("scan-worker")
        .concurrency(jobs.scan_concurrency.get() as usize)
        .data(context.clone())
        .backend(scan_storage)
        .build_fn(process_scan_job);
    let generate_event_worker = WorkerBuilder::new("generate-event-worker")
        .concurrency(jobs.generate_event_concurrency.get() as usize)
        .data(context.clone())
        .backend(generate_event_storage)
        .build_fn(process_generate_event_job);
    let generate_participant_worker = WorkerBuilder::new("generate-participant-worker")
        .concurrency(jobs.generate_participant_concurrency.get() as usize)
        .data(context.clone())
        .backend(generate_participant_storage)
        .build_fn(process_generate_participant_job);
    let deliver_worker = WorkerBuilder::new("deliver-worker")
        .concurrency(jobs.deliver_concurrency.get() as usize)
        .data(context.clone())
        .backend(deliver_storage)
        .build_fn(process_deliver_job);

    let scan_cron_worker = WorkerBuilder::new("scan-cron-worker")
        .data(context.clone())
        .backend(CronStream::new(scheduler.scan.clone()))
        .build_fn(process_scan_tick);
    let reprocess_cron_worker = WorkerBuilder::new("reprocess-cron-worker")
        .data(context.clone())
        .backend(CronStream::new(scheduler.reprocess.clone()))
        .build_fn(process_reprocess_tick);
    let refresh_counters_cron_worker = WorkerBuilder::new("refresh-counters-cron-worker")
        .data(context.clone())
        .backend(CronStream::new(scheduler.refresh_counters.clone()))
        .build_fn(process_refresh_counters_tick);
    let cleanup_cron_worker = WorkerBuilder::new("cleanup-cron-worker")
        .data(context)
        .backend(CronStream::new(scheduler.cleanup.clone()))
        .build_fn(process_cleanup_tick);

    let monitor = Monitor::new()
        .register(scan_worker)
        .register(generate_event_worker)
        .register(generate_participant_worker)
        .register(deliver_worker)
        .register(scan_cron_worker)
        .register(reprocess_cron_worker)
        .register(refresh_counters_cron_worker)
        .register(cleanup_cron_worker);

    tokio::spawn(async move {
        if let Err(err) = monitor.run().await {
            error!(error = %err, "job monitor stopped");
        }
    })
}

async fn serve_http(
    settings: &config::Settings,
    http_state: HttpState,
    api_state: ApiState,
) -> Result<(), AppError> {
    let router = http::build_router(RouterState {
        http: http_state,
        api: api_state,
    });

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;
    info!(
        target = "certifier::http",
        addr = %settings.server.addr,
        "HTTP server listening"
    );

    let grace = settings.server.graceful_shutdown;
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
    let server = axum::serve(listener, router.into_make_service()).with_graceful_shutdown(
        async move {
            shutdown_signal().await;
            let _ = shutdown_tx.send(());
        },
    );

    // In-flight requests get `grace` to drain once shutdown starts.
    tokio::select! {
        result = server => {
            result.map_err(|err| AppError::unexpected(format!("server error: {err}")))?;
        }
        _ = async {
            let _ = shutdown_rx.await;
            tokio::time::sleep(grace).await;
        } => {
            warn!(
                target = "certifier::http",
                grace_secs = grace.as_secs(),
                "Graceful shutdown timed out; dropping open connections"
            );
        }
    }

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
