//! Client for the Bluree person-blurring service.
//!
//! The backend holds the workflow state; this crate walks a user through it,
//! either interactively (`tui`) or unattended (`orchestrator::drive`).

pub mod backend;
pub mod cli;
pub mod error;
pub mod logging;
pub mod model;
pub mod orchestrator;
pub mod storage;
pub mod text_summary;
#[cfg(feature = "tui")]
pub mod tui;
pub mod workflow;

pub use error::WorkflowError;
