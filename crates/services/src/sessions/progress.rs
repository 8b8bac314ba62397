use activity_core::model::Session;

/// Aggregated view of session progress, useful for UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionProgress {
    pub total: usize,
    pub answered: usize,
    pub remaining: usize,
    /// 1-based position of the item on screen; equals `total` once finished.
    pub position: usize,
    pub score: u32,
    pub is_complete: bool,
    /// Whole seconds left on the exam countdown, if one is running.
    pub remaining_secs: Option<u64>,
}

impl SessionProgress {
    #[must_use]
    pub fn of(session: &Session, remaining_secs: Option<u64>) -> Self {
        let total = session.item_count();
        let answered = session.answered_count();
        Self {
            total,
            answered,
            remaining: total.saturating_sub(answered),
            position: (session.cursor() + 1).min(total),
            score: session.score(),
            is_complete: session.is_terminal(),
            remaining_secs,
        }
    }
}
