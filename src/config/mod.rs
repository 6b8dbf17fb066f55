//! Configuration layer: typed settings with layered precedence (file → env → CLI).

mod cli;

pub use cli::*;

use std::{net::SocketAddr, num::NonZeroU32, path::PathBuf, str::FromStr, time::Duration};

use apalis_cron::Schedule;
use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;
use url::Url;

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "certifier";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_GRACEFUL_SHUTDOWN_SECS: u64 = 30;
const DEFAULT_DB_HTTP_MAX_CONNECTIONS: u32 = 8;
const DEFAULT_DB_JOBS_MAX_CONNECTIONS: u32 = 8;
const DEFAULT_JOB_SCAN_CONCURRENCY: u32 = 1;
const DEFAULT_JOB_GENERATE_EVENT_CONCURRENCY: u32 = 2;
const DEFAULT_JOB_GENERATE_PARTICIPANT_CONCURRENCY: u32 = 4;
const DEFAULT_JOB_DELIVER_CONCURRENCY: u32 = 4;
const DEFAULT_JOB_TIMEOUT_SECS: u64 = 600;
const DEFAULT_STALE_GENERATING_SECS: u64 = 900;
const DEFAULT_GENERATION_PARALLELISM: u32 = 4;
const DEFAULT_SCAN_SCHEDULE: &str = "0 */10 * * * *";
const DEFAULT_REPROCESS_SCHEDULE: &str = "0 30 * * * *";
const DEFAULT_REFRESH_COUNTERS_SCHEDULE: &str = "0 */15 * * * *";
const DEFAULT_CLEANUP_SCHEDULE: &str = "0 0 3 * * *";
const DEFAULT_SERVICE_TIMEOUT_SECS: u64 = 10;
const DEFAULT_EVENTS_URL: &str = "http://localhost:8001";
const DEFAULT_REGISTRATIONS_URL: &str = "http://localhost:8002";
const DEFAULT_ATTENDANCE_URL: &str = "http://localhost:8003";
const DEFAULT_MAIL_ENDPOINT: &str = "http://localhost:8004/api/emails";
const DEFAULT_MAIL_SENDER: &str = "certificados@localhost";
const DEFAULT_PDF_ENGINE: &str = "wkhtmltopdf";
const DEFAULT_TEMPLATE_PATH: &str = "templates/certificates/default.html";
const DEFAULT_DOCUMENTS_DIR: &str = "media";
const DEFAULT_PUBLIC_BASE_URL: &str = "http://localhost:3000";
const DEFAULT_SYSTEM_NAME: &str = "Portal de Eventos";

/// Fully-resolved deployment settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub database: DatabaseSettings,
    pub jobs: JobsSettings,
    pub scheduler: SchedulerSettings,
    pub services: ServicesSettings,
    pub mail: MailSettings,
    pub render: RenderSettings,
    pub storage: StorageSettings,
    pub auth: AuthSettings,
    pub public: PublicSettings,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub addr: SocketAddr,
    pub graceful_shutdown: Duration,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct DatabaseSettings {
    pub url: Option<String>,
    pub http_max_connections: NonZeroU32,
    pub jobs_max_connections: NonZeroU32,
}

#[derive(Debug, Clone)]
pub struct JobsSettings {
    pub scan_concurrency: NonZeroU32,
    pub generate_event_concurrency: NonZeroU32,
    pub generate_participant_concurrency: NonZeroU32,
    pub deliver_concurrency: NonZeroU32,
    /// Participants rendered in parallel inside one event batch.
    pub generation_parallelism: NonZeroU32,
    pub job_timeout: Duration,
    pub stale_generating_after: Duration,
}

#[derive(Debug, Clone)]
pub struct SchedulerSettings {
    pub scan: Schedule,
    pub reprocess: Schedule,
    pub refresh_counters: Schedule,
    pub cleanup: Schedule,
}

#[derive(Debug, Clone)]
pub struct ServicesSettings {
    pub events_url: Url,
    pub registrations_url: Url,
    pub attendance_url: Url,
    pub request_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct MailSettings {
    pub endpoint: Url,
    pub sender: String,
    pub token: Option<String>,
}

#[derive(Debug, Clone)]
pub struct RenderSettings {
    pub pdf_engine_path: PathBuf,
    pub pdf_engine_args: Vec<String>,
    pub default_template_path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct StorageSettings {
    pub documents_dir: PathBuf,
}

#[derive(Clone)]
pub struct AuthSettings {
    pub api_tokens: Vec<String>,
}

impl std::fmt::Debug for AuthSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthSettings")
            .field("api_tokens", &format_args!("[{} redacted]", self.api_tokens.len()))
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct PublicSettings {
    pub base_url: Url,
    pub system_name: String,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(
        Environment::with_prefix("CERTIFIER")
            .separator("__")
            .list_separator(",")
            .with_list_parse_key("auth.api_tokens")
            .with_list_parse_key("render.pdf_engine_args")
            .try_parsing(true),
    );

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    match cli.command.as_ref() {
        Some(Command::Serve(args)) => raw.apply_serve_overrides(&args.overrides),
        Some(Command::Worker(args)) => {
            raw.apply_database_override(&args.database);
            raw.apply_logging_overrides(&args.logging);
            raw.apply_jobs_overrides(&args.jobs);
        }
        Some(Command::Scan(args)) => raw.apply_one_shot_overrides(args),
        Some(Command::Generate(args)) => raw.apply_one_shot_overrides(&args.common),
        Some(Command::Maintenance(args)) => raw.apply_one_shot_overrides(&args.common),
        None => raw.apply_serve_overrides(&ServeOverrides::default()),
    }

    Settings::from_raw(raw)
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    server: RawServerSettings,
    logging: RawLoggingSettings,
    database: RawDatabaseSettings,
    jobs: RawJobsSettings,
    scheduler: RawSchedulerSettings,
    services: RawServicesSettings,
    mail: RawMailSettings,
    render: RawRenderSettings,
    storage: RawStorageSettings,
    auth: RawAuthSettings,
    public: RawPublicSettings,
}

impl RawSettings {
    fn apply_serve_overrides(&mut self, overrides: &ServeOverrides) {
        if let Some(host) = overrides.server_host.as_ref() {
            self.server.host = Some(host.clone());
        }
        if let Some(port) = overrides.server_port {
            self.server.port = Some(port);
        }
        if let Some(seconds) = overrides.server_graceful_shutdown_seconds {
            self.server.graceful_shutdown_seconds = Some(seconds);
        }
        self.apply_database_override(&overrides.database);
        self.apply_logging_overrides(&overrides.logging);
        self.apply_jobs_overrides(&overrides.jobs);
    }

    fn apply_one_shot_overrides(&mut self, args: &OneShotArgs) {
        self.apply_database_override(&args.database);
        self.apply_logging_overrides(&args.logging);
    }

    fn apply_database_override(&mut self, overrides: &DatabaseOverride) {
        if let Some(url) = overrides.database_url.as_ref() {
            self.database.url = Some(url.clone());
        }
    }

    fn apply_logging_overrides(&mut self, overrides: &LoggingOverrides) {
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
    }

    fn apply_jobs_overrides(&mut self, overrides: &JobsOverrides) {
        if let Some(value) = overrides.jobs_scan_concurrency {
            self.jobs.scan_concurrency = Some(value);
        }
        if let Some(value) = overrides.jobs_generate_event_concurrency {
            self.jobs.generate_event_concurrency = Some(value);
        }
        if let Some(value) = overrides.jobs_generate_participant_concurrency {
            self.jobs.generate_participant_concurrency = Some(value);
        }
        if let Some(value) = overrides.jobs_deliver_concurrency {
            self.jobs.deliver_concurrency = Some(value);
        }
        if let Some(value) = overrides.jobs_timeout_seconds {
            self.jobs.timeout_seconds = Some(value);
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            server,
            logging,
            database,
            jobs,
            scheduler,
            services,
            mail,
            render,
            storage,
            auth,
            public,
        } = raw;

        Ok(Self {
            server: build_server_settings(server)?,
            logging: build_logging_settings(logging)?,
            database: build_database_settings(database)?,
            jobs: build_jobs_settings(jobs)?,
            scheduler: build_scheduler_settings(scheduler)?,
            services: build_services_settings(services)?,
            mail: build_mail_settings(mail)?,
            render: build_render_settings(render)?,
            storage: build_storage_settings(storage)?,
            auth: build_auth_settings(auth),
            public: build_public_settings(public)?,
        })
    }
}

fn build_server_settings(server: RawServerSettings) -> Result<ServerSettings, LoadError> {
    let host = server.host.unwrap_or_else(|| DEFAULT_HOST.to_string());
    let port = server.port.unwrap_or(DEFAULT_PORT);
    if port == 0 {
        return Err(LoadError::invalid(
            "server.port",
            "port must be greater than zero",
        ));
    }
    let addr = parse_socket_addr(&host, port)
        .map_err(|reason| LoadError::invalid("server.addr", reason))?;

    let graceful_secs = server
        .graceful_shutdown_seconds
        .unwrap_or(DEFAULT_GRACEFUL_SHUTDOWN_SECS);
    let graceful_shutdown = positive_seconds(graceful_secs, "server.graceful_shutdown_seconds")?;

    Ok(ServerSettings {
        addr,
        graceful_shutdown,
    })
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_database_settings(database: RawDatabaseSettings) -> Result<DatabaseSettings, LoadError> {
    let url = database.url.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    });

    let http_value = database
        .http_max_connections
        .unwrap_or(DEFAULT_DB_HTTP_MAX_CONNECTIONS);
    let jobs_value = database
        .jobs_max_connections
        .unwrap_or(DEFAULT_DB_JOBS_MAX_CONNECTIONS);

    Ok(DatabaseSettings {
        url,
        http_max_connections: non_zero_u32(http_value.into(), "database.http_max_connections")?,
        jobs_max_connections: non_zero_u32(jobs_value.into(), "database.jobs_max_connections")?,
    })
}

fn build_jobs_settings(jobs: RawJobsSettings) -> Result<JobsSettings, LoadError> {
    let scan = jobs.scan_concurrency.unwrap_or(DEFAULT_JOB_SCAN_CONCURRENCY);
    let generate_event = jobs
        .generate_event_concurrency
        .unwrap_or(DEFAULT_JOB_GENERATE_EVENT_CONCURRENCY);
    let generate_participant = jobs
        .generate_participant_concurrency
        .unwrap_or(DEFAULT_JOB_GENERATE_PARTICIPANT_CONCURRENCY);
    let deliver = jobs
        .deliver_concurrency
        .unwrap_or(DEFAULT_JOB_DELIVER_CONCURRENCY);
    let parallelism = jobs
        .generation_parallelism
        .unwrap_or(DEFAULT_GENERATION_PARALLELISM);

    let job_timeout = positive_seconds(
        jobs.timeout_seconds.unwrap_or(DEFAULT_JOB_TIMEOUT_SECS),
        "jobs.timeout_seconds",
    )?;
    let stale_generating_after = positive_seconds(
        jobs.stale_generating_after_seconds
            .unwrap_or(DEFAULT_STALE_GENERATING_SECS),
        "jobs.stale_generating_after_seconds",
    )?;
    // A generation still inside its job timeout must never be reclaimed as abandoned.
    if stale_generating_after < job_timeout {
        return Err(LoadError::invalid(
            "jobs.stale_generating_after_seconds",
            "must not be shorter than jobs.timeout_seconds",
        ));
    }

    Ok(JobsSettings {
        scan_concurrency: non_zero_u32(scan.into(), "jobs.scan_concurrency")?,
        generate_event_concurrency: non_zero_u32(
            generate_event.into(),
            "jobs.generate_event_concurrency",
        )?,
        generate_participant_concurrency: non_zero_u32(
            generate_participant.into(),
            "jobs.generate_participant_concurrency",
        )?,
        deliver_concurrency: non_zero_u32(deliver.into(), "jobs.deliver_concurrency")?,
        generation_parallelism: non_zero_u32(parallelism.into(), "jobs.generation_parallelism")?,
        job_timeout,
        stale_generating_after,
    })
}

fn build_scheduler_settings(
    scheduler: RawSchedulerSettings,
) -> Result<SchedulerSettings, LoadError> {
    Ok(SchedulerSettings {
        scan: parse_schedule(
            scheduler.scan.as_deref().unwrap_or(DEFAULT_SCAN_SCHEDULE),
            "scheduler.scan",
        )?,
        reprocess: parse_schedule(
            scheduler
                .reprocess
                .as_deref()
                .unwrap_or(DEFAULT_REPROCESS_SCHEDULE),
            "scheduler.reprocess",
        )?,
        refresh_counters: parse_schedule(
            scheduler
                .refresh_counters
                .as_deref()
                .unwrap_or(DEFAULT_REFRESH_COUNTERS_SCHEDULE),
            "scheduler.refresh_counters",
        )?,
        cleanup: parse_schedule(
            scheduler.cleanup.as_deref().unwrap_or(DEFAULT_CLEANUP_SCHEDULE),
            "scheduler.cleanup",
        )?,
    })
}

fn build_services_settings(services: RawServicesSettings) -> Result<ServicesSettings, LoadError> {
    Ok(ServicesSettings {
        events_url: parse_url(
            services.events_url.as_deref().unwrap_or(DEFAULT_EVENTS_URL),
            "services.events_url",
        )?,
        registrations_url: parse_url(
            services
                .registrations_url
                .as_deref()
                .unwrap_or(DEFAULT_REGISTRATIONS_URL),
            "services.registrations_url",
        )?,
        attendance_url: parse_url(
            services
                .attendance_url
                .as_deref()
                .unwrap_or(DEFAULT_ATTENDANCE_URL),
            "services.attendance_url",
        )?,
        request_timeout: positive_seconds(
            services
                .request_timeout_seconds
                .unwrap_or(DEFAULT_SERVICE_TIMEOUT_SECS),
            "services.request_timeout_seconds",
        )?,
    })
}

fn build_mail_settings(mail: RawMailSettings) -> Result<MailSettings, LoadError> {
    let endpoint = parse_url(
        mail.endpoint.as_deref().unwrap_or(DEFAULT_MAIL_ENDPOINT),
        "mail.endpoint",
    )?;
    let sender = mail
        .sender
        .map(|value| value.trim().to_string())
        .unwrap_or_else(|| DEFAULT_MAIL_SENDER.to_string());
    if !sender.contains('@') {
        return Err(LoadError::invalid(
            "mail.sender",
            "sender must be an email address",
        ));
    }
    let token = mail.token.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    });

    Ok(MailSettings {
        endpoint,
        sender,
        token,
    })
}

fn build_render_settings(render: RawRenderSettings) -> Result<RenderSettings, LoadError> {
    let pdf_engine_path = render
        .pdf_engine_path
        .unwrap_or_else(|| PathBuf::from(DEFAULT_PDF_ENGINE));
    if pdf_engine_path.as_os_str().is_empty() {
        return Err(LoadError::invalid(
            "render.pdf_engine_path",
            "path must not be empty",
        ));
    }

    // wkhtmltopdf reads stdin and writes stdout when given `-` for both.
    let pdf_engine_args = render
        .pdf_engine_args
        .unwrap_or_else(|| vec!["--quiet".to_string(), "-".to_string(), "-".to_string()]);

    let default_template_path = render
        .default_template_path
        .unwrap_or_else(|| PathBuf::from(DEFAULT_TEMPLATE_PATH));
    if default_template_path.as_os_str().is_empty() {
        return Err(LoadError::invalid(
            "render.default_template_path",
            "path must not be empty",
        ));
    }

    Ok(RenderSettings {
        pdf_engine_path,
        pdf_engine_args,
        default_template_path,
    })
}

fn build_storage_settings(storage: RawStorageSettings) -> Result<StorageSettings, LoadError> {
    let documents_dir = storage
        .documents_dir
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DOCUMENTS_DIR));
    if documents_dir.as_os_str().is_empty() {
        return Err(LoadError::invalid(
            "storage.documents_dir",
            "path must not be empty",
        ));
    }
    Ok(StorageSettings { documents_dir })
}

fn build_auth_settings(auth: RawAuthSettings) -> AuthSettings {
    let api_tokens = auth
        .api_tokens
        .unwrap_or_default()
        .into_iter()
        .map(|token| token.trim().to_string())
        .filter(|token| !token.is_empty())
        .collect();
    AuthSettings { api_tokens }
}

fn build_public_settings(public: RawPublicSettings) -> Result<PublicSettings, LoadError> {
    let base_url = parse_url(
        public.base_url.as_deref().unwrap_or(DEFAULT_PUBLIC_BASE_URL),
        "public.base_url",
    )?;
    let system_name = public
        .system_name
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| DEFAULT_SYSTEM_NAME.to_string());
    Ok(PublicSettings {
        base_url,
        system_name,
    })
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServerSettings {
    host: Option<String>,
    port: Option<u16>,
    graceful_shutdown_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawDatabaseSettings {
    url: Option<String>,
    http_max_connections: Option<u32>,
    jobs_max_connections: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawJobsSettings {
    scan_concurrency: Option<u32>,
    generate_event_concurrency: Option<u32>,
    generate_participant_concurrency: Option<u32>,
    deliver_concurrency: Option<u32>,
    generation_parallelism: Option<u32>,
    timeout_seconds: Option<u64>,
    stale_generating_after_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSchedulerSettings {
    scan: Option<String>,
    reprocess: Option<String>,
    refresh_counters: Option<String>,
    cleanup: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServicesSettings {
    events_url: Option<String>,
    registrations_url: Option<String>,
    attendance_url: Option<String>,
    request_timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawMailSettings {
    endpoint: Option<String>,
    sender: Option<String>,
    token: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawRenderSettings {
    pdf_engine_path: Option<PathBuf>,
    pdf_engine_args: Option<Vec<String>>,
    default_template_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawStorageSettings {
    documents_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawAuthSettings {
    api_tokens: Option<Vec<String>>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawPublicSettings {
    base_url: Option<String>,
    system_name: Option<String>,
}

fn parse_socket_addr(host: &str, port: u16) -> Result<SocketAddr, String> {
    let candidate = format!("{host}:{port}");
    candidate
        .parse()
        .map_err(|err| format!("invalid address `{candidate}`: {err}"))
}

fn parse_schedule(expression: &str, key: &'static str) -> Result<Schedule, LoadError> {
    Schedule::from_str(expression.trim())
        .map_err(|err| LoadError::invalid(key, format!("invalid cron expression: {err}")))
}

fn parse_url(value: &str, key: &'static str) -> Result<Url, LoadError> {
    let url = Url::parse(value.trim())
        .map_err(|err| LoadError::invalid(key, format!("invalid url: {err}")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(LoadError::invalid(key, "url must use http or https"));
    }
    Ok(url)
}

fn positive_seconds(value: u64, key: &'static str) -> Result<Duration, LoadError> {
    if value == 0 {
        return Err(LoadError::invalid(key, "must be greater than zero"));
    }
    Ok(Duration::from_secs(value))
}

fn non_zero_u32(value: u64, key: &'static str) -> Result<NonZeroU32, LoadError> {
    if value == 0 {
        return Err(LoadError::invalid(key, "must be greater than zero"));
    }
    let value_u32: u32 = value
        .try_into()
        .map_err(|_| LoadError::invalid(key, "value exceeds supported range for u32"))?;
    NonZeroU32::new(value_u32).ok_or_else(|| LoadError::invalid(key, "must be greater than zero"))
}
