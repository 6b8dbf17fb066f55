use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, builder::BoolishValueParser};

/// Command-line arguments for the certifier binary.
#[derive(Debug, Parser)]
#[command(
    name = "certifier",
    version,
    about = "Participation certificate service"
)]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "CERTIFIER_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the HTTP API, the job workers, and the periodic schedules.
    Serve(Box<ServeArgs>),
    /// Run the job workers and periodic schedules without the HTTP API.
    Worker(WorkerArgs),
    /// Scan for finished events once and exit.
    Scan(OneShotArgs),
    /// Generate certificates for one event inline and print the report.
    Generate(GenerateArgs),
    /// Run one maintenance sweep inline.
    Maintenance(MaintenanceArgs),
}

#[derive(Debug, Args, Default, Clone)]
pub struct DatabaseOverride {
    /// Override the database connection URL.
    #[arg(long = "database-url", value_name = "URL")]
    pub database_url: Option<String>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct LoggingOverrides {
    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub log_json: Option<bool>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct JobsOverrides {
    /// Override the scan worker concurrency.
    #[arg(long = "jobs-scan-concurrency", value_name = "COUNT")]
    pub jobs_scan_concurrency: Option<u32>,

    /// Override the per-event generation worker concurrency.
    #[arg(long = "jobs-generate-event-concurrency", value_name = "COUNT")]
    pub jobs_generate_event_concurrency: Option<u32>,

    /// Override the per-participant generation worker concurrency.
    #[arg(long = "jobs-generate-participant-concurrency", value_name = "COUNT")]
    pub jobs_generate_participant_concurrency: Option<u32>,

    /// Override the delivery worker concurrency.
    #[arg(long = "jobs-deliver-concurrency", value_name = "COUNT")]
    pub jobs_deliver_concurrency: Option<u32>,

    /// Override the per-job timeout.
    #[arg(long = "jobs-timeout-seconds", value_name = "SECONDS")]
    pub jobs_timeout_seconds: Option<u64>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub overrides: ServeOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeOverrides {
    #[command(flatten)]
    pub database: DatabaseOverride,

    #[command(flatten)]
    pub logging: LoggingOverrides,

    #[command(flatten)]
    pub jobs: JobsOverrides,

    /// Override the listener host.
    #[arg(long = "server-host", value_name = "HOST")]
    pub server_host: Option<String>,

    /// Override the listener port.
    #[arg(long = "server-port", value_name = "PORT")]
    pub server_port: Option<u16>,

    /// Override the graceful shutdown timeout.
    #[arg(long = "server-graceful-shutdown-seconds", value_name = "SECONDS")]
    pub server_graceful_shutdown_seconds: Option<u64>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct WorkerArgs {
    #[command(flatten)]
    pub database: DatabaseOverride,

    #[command(flatten)]
    pub logging: LoggingOverrides,

    #[command(flatten)]
    pub jobs: JobsOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct OneShotArgs {
    #[command(flatten)]
    pub database: DatabaseOverride,

    #[command(flatten)]
    pub logging: LoggingOverrides,
}

#[derive(Debug, Args, Clone)]
pub struct GenerateArgs {
    #[command(flatten)]
    pub common: OneShotArgs,

    /// Event whose attendees receive certificates.
    #[arg(long = "event-id", value_name = "ID")]
    pub event_id: i64,

    /// Regenerate certificates that already have a document.
    #[arg(long, action = clap::ArgAction::SetTrue)]
    pub force: bool,

    /// Skip queuing delivery emails.
    #[arg(long = "no-email", action = clap::ArgAction::SetTrue)]
    pub no_email: bool,
}

#[derive(Debug, Args, Clone)]
pub struct MaintenanceArgs {
    #[command(flatten)]
    pub common: OneShotArgs,

    #[command(subcommand)]
    pub task: MaintenanceTask,
}

#[derive(Debug, Subcommand, Clone, Copy, PartialEq, Eq)]
pub enum MaintenanceTask {
    /// Re-enqueue failed certificates and abandoned generations.
    Reprocess,
    /// Recompute processed-event counters.
    RefreshCounters,
    /// Delete expired pending and error certificates.
    Cleanup,
}
