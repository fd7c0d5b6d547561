//! `docflow`: a multi-tenant HTTP document-processing service. See
//! `docflowd` (`src/bin/docflowd.rs`) for the process entrypoint; this
//! crate exposes the pieces it wires together as a library so tests can
//! exercise them directly.

pub mod auth;
pub mod cleanup;
pub mod config;
pub mod db;
pub mod error;
pub mod http;
pub mod jobs;
pub mod metrics;
pub mod processors;
pub mod scheduler;
pub mod storage;
pub mod tenant;
