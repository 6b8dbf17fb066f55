//! Infrastructure adapters and runtime bootstrap.

pub mod db;
pub mod documents;
pub mod error;
pub mod http;
pub mod mailer;
pub mod pdf;
pub mod remote;
pub mod telemetry;
