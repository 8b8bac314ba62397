mod bootstrap;
mod feedback;
mod finalize;
mod progress;
mod runner;
mod telemetry;
mod timing;

// Public API of the session subsystem.
pub use bootstrap::{SessionBootstrapper, SessionRequest};
pub use feedback::{DEFAULT_RATING, FeedbackForm, FeedbackStatus};
pub use finalize::SessionFinalizer;
pub use progress::SessionProgress;
pub use runner::{
    AnswerFeedback, AnswerOutcome, DEFAULT_DEVICE_TYPE, RunnerOptions, RunnerState, SessionRunner,
};
pub use telemetry::{BestEffort, TelemetryEmitter, normalize_response, response_record};
pub use timing::{CountdownTick, ExamCountdown, ItemStopwatch, RunnerEvent};
