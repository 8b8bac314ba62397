#![forbid(unsafe_code)]

pub mod error;
pub mod sessions;

pub use activity_core::Clock;

pub use error::{BootstrapError, FeedbackError, RunnerError, TelemetryError};
pub use sessions::{
    AnswerFeedback, AnswerOutcome, RunnerEvent, RunnerOptions, RunnerState, SessionProgress,
    SessionRequest, SessionRunner,
};
