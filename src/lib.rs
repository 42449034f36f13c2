//! itrack - IT asset and process tracker
//!
//! Records systems, scripts, workflows, kanban boards and planning entities
//! in SQLite and serves them as a JSON API. The two pieces with real logic
//! are the downstream impact analysis over `depends_on` relationships
//! ([`impact`]) and the versioned workflow designer graph ([`designer`]).

pub mod api;
pub mod catalog;
pub mod cli;
pub mod config;
pub mod designer;
pub mod error;
pub mod impact;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod server;
pub mod store;
