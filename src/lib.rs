//! Participation certificate service: scans finished events, issues certificate
//! documents, delivers them by email, and answers public validation lookups.

pub mod application;
pub mod config;
pub mod domain;
pub mod infra;
pub mod presentation;
