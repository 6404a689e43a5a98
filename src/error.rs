use crate::workflow::{Step, Transition};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum WorkflowError {
    #[error("network failure: {0}")]
    Network(#[from] reqwest::Error),

    #[error("server rejected request ({status}): {body}")]
    ServerRejected { status: u16, body: String },

    #[error("cannot {transition} while {step}")]
    InvalidTransition { step: Step, transition: Transition },

    #[error("no processed image while {0}")]
    ResultUnavailable(Step),

    #[error("malformed response: {0}")]
    Decode(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
impl WorkflowError {
    /// Whether the backend was reached and answered with a non-2xx status.
    pub fn is_rejection(&self) -> bool {
        matches!(self, WorkflowError::ServerRejected { .. })
    }
}
