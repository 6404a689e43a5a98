//! Client-side workflow: the step machine, the controller that drives it
//! against a [`Backend`](crate::backend::Backend), and score presentation.

mod controller;
mod machine;
pub mod score;

pub use controller::{FailureNotice, WorkflowController, STATE_FETCH_FAILED};
pub use machine::{next_step, Step, Transition};
pub use score::{format_score, tier, ScoreTier};
