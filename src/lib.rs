//! Wake Scheduler - Core library
//!
//! Weekly turn on/off rules, conflict checks, and resolution of the next
//! turn on rule into a validated rtcwake request.

pub mod commands;
pub mod conflicts;
pub mod error;
pub mod models;
pub mod rules;
pub mod scheduler;
pub mod scheduler_runner;
pub mod settings;
pub mod storage;
pub mod validation;

pub use error::{Error, Result};
pub use models::*;
