use log::{info, warn};

use activity_core::model::Session;
use backend::{ActivityBackend, FeedbackRecord};

use crate::error::FeedbackError;

pub const DEFAULT_RATING: u8 = 5;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum FeedbackStatus {
    #[default]
    Idle,
    Submitted,
    /// Last attempt failed; the form keeps its contents for a retry.
    Failed(String),
}

/// Optional post-session rating and comment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedbackForm {
    rating: u8,
    text: String,
    status: FeedbackStatus,
}

impl Default for FeedbackForm {
    fn default() -> Self {
        Self {
            rating: DEFAULT_RATING,
            text: String::new(),
            status: FeedbackStatus::Idle,
        }
    }
}

impl FeedbackForm {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn rating(&self) -> u8 {
        self.rating
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    #[must_use]
    pub fn status(&self) -> &FeedbackStatus {
        &self.status
    }

    #[must_use]
    pub fn is_submitted(&self) -> bool {
        self.status == FeedbackStatus::Submitted
    }

    /// # Errors
    ///
    /// Returns `FeedbackError::InvalidRating` outside `1..=5`.
    pub fn set_rating(&mut self, rating: u8) -> Result<(), FeedbackError> {
        if !(1..=5).contains(&rating) {
            return Err(FeedbackError::InvalidRating(rating));
        }
        self.rating = rating;
        Ok(())
    }

    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
    }

    /// Wire form; the text goes out as entered and empty text as absent.
    #[must_use]
    pub fn record(&self) -> FeedbackRecord {
        FeedbackRecord {
            rating: self.rating,
            text: (!self.text.is_empty()).then(|| self.text.clone()),
        }
    }

    /// Send the form for a finished session. A form that was already sent is
    /// not sent again.
    ///
    /// # Errors
    ///
    /// Returns `FeedbackError::SessionNotFinished` while the session is running
    /// and `FeedbackError::SubmissionFailed` if the backend call fails; the
    /// form keeps its rating and text in that case.
    pub async fn submit(
        &mut self,
        backend: &dyn ActivityBackend,
        session: &Session,
    ) -> Result<(), FeedbackError> {
        if self.is_submitted() {
            return Ok(());
        }
        if !session.is_terminal() {
            return Err(FeedbackError::SessionNotFinished);
        }

        match backend.submit_feedback(session.id(), &self.record()).await {
            Ok(()) => {
                info!("feedback sent for session {}", session.id());
                self.status = FeedbackStatus::Submitted;
                Ok(())
            }
            Err(err) => {
                warn!("feedback for session {} failed: {err}", session.id());
                let message = err.detail().map_or_else(|| err.to_string(), str::to_string);
                self.status = FeedbackStatus::Failed(message.clone());
                Err(FeedbackError::SubmissionFailed(message))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_top_rating_without_text() {
        let form = FeedbackForm::new();
        assert_eq!(form.rating(), 5);
        assert_eq!(
            form.record(),
            FeedbackRecord {
                rating: 5,
                text: None
            }
        );
    }

    #[test]
    fn rejects_out_of_range_ratings() {
        let mut form = FeedbackForm::new();
        assert_eq!(form.set_rating(0), Err(FeedbackError::InvalidRating(0)));
        assert_eq!(form.set_rating(6), Err(FeedbackError::InvalidRating(6)));
        form.set_rating(3).unwrap();
        assert_eq!(form.rating(), 3);
    }

    #[test]
    fn empty_text_is_sent_as_absent() {
        let mut form = FeedbackForm::new();
        form.set_text("");
        assert_eq!(form.record().text, None);
        form.set_text(" too fast ");
        assert_eq!(form.record().text.as_deref(), Some(" too fast "));
    }
}
