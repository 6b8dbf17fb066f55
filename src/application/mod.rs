//! Application services, ports, and job handlers.

pub mod auth;
pub mod certificates;
pub mod delivery;
pub mod documents;
pub mod error;
pub mod generation;
pub mod jobs;
pub mod ledger;
pub mod maintenance;
pub mod processed_events;
pub mod remote;
pub mod render;
pub mod repos;
pub mod scan;
