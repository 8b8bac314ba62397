mod activity;
mod answer;
mod ids;
mod item;
mod session;

pub use activity::{ActivityKind, SessionMode, UnknownActivityKind};
pub use answer::{AnswerRecord, Submission};
pub use ids::{
    ActivityKindId, ContentScopeId, ItemId, ParseIdError, SessionId, StudentId, SubjectId, TermId,
};
pub use item::{Item, ItemKind, ItemPayload, MalformedItem, MatchPair};
pub use session::{
    Advance, AnswerStatus, ItemPhase, Session, SessionError, SessionScope, SessionSummary,
    SubmitOutcome, SummaryRow, TerminalReason,
};
