//! Askama-backed presentation for outgoing messages.

pub mod email;
