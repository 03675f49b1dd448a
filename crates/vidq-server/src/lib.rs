//! Natural-language analytics over the video statistics dataset
//!
//! A question goes through three stages:
//! 1. a [`vidq_nl::Translator`] turns it into one read-only SQL query
//! 2. a [`vidq_duck::QueryExecutor`] checks and runs it
//! 3. [`format::normalize`] renders the result as a short string
//!
//! [`pipeline::Analyst`] ties the stages together; `http` exposes it.

pub mod config;
pub mod format;
pub mod http;
pub mod logging;
pub mod pipeline;

pub use config::{Config, ConfigError};
pub use format::{normalize, FormatError, NO_DATA};
pub use pipeline::{build_translator, Analyst, AnswerError};
