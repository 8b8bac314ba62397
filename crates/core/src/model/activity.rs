use std::fmt;
use std::str::FromStr;

use chrono::Duration;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown activity kind code: {0}")]
pub struct UnknownActivityKind(pub String);

//
// ─── ACTIVITY KIND ─────────────────────────────────────────────────────────────
//

/// Kind of learning activity a session runs.
///
/// The backend catalog keys activity kinds by these codes; the catalog id is
/// resolved at bootstrap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActivityKind {
    Quiz,
    ExamStyle,
    Match,
    Cloze,
    Review,
}

impl ActivityKind {
    pub const ALL: [ActivityKind; 5] = [
        ActivityKind::Quiz,
        ActivityKind::ExamStyle,
        ActivityKind::Match,
        ActivityKind::Cloze,
        ActivityKind::Review,
    ];

    /// Catalog code used by the backend.
    #[must_use]
    pub fn code(self) -> &'static str {
        match self {
            ActivityKind::Quiz => "QUIZ",
            ActivityKind::ExamStyle => "EXAM_STYLE",
            ActivityKind::Match => "MATCH",
            ActivityKind::Cloze => "CLOZE",
            ActivityKind::Review => "REVIEW",
        }
    }

    /// Number of items requested when the caller does not ask for a specific count.
    #[must_use]
    pub fn default_item_count(self) -> u32 {
        match self {
            ActivityKind::Match => 5,
            _ => 10,
        }
    }
}

impl fmt::Display for ActivityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for ActivityKind {
    type Err = UnknownActivityKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let code = s.trim();
        Self::ALL
            .into_iter()
            .find(|kind| kind.code().eq_ignore_ascii_case(code))
            .ok_or_else(|| UnknownActivityKind(s.to_string()))
    }
}

//
// ─── SESSION MODE ──────────────────────────────────────────────────────────────
//

/// Practice sessions pause after every answer to show feedback; exam sessions
/// move on immediately and may carry a hard wall-clock limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionMode {
    #[default]
    Practice,
    Exam { time_limit: Option<Duration> },
}

impl SessionMode {
    /// Exam mode with a limit in whole seconds. Zero means no countdown.
    #[must_use]
    pub fn exam_with_limit_secs(secs: u32) -> Self {
        let time_limit = (secs > 0).then(|| Duration::seconds(i64::from(secs)));
        SessionMode::Exam { time_limit }
    }

    #[must_use]
    pub fn is_exam(self) -> bool {
        matches!(self, SessionMode::Exam { .. })
    }

    /// The countdown length, only for exam mode with a positive limit.
    #[must_use]
    pub fn countdown(self) -> Option<Duration> {
        match self {
            SessionMode::Exam {
                time_limit: Some(limit),
            } if limit > Duration::zero() => Some(limit),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_parse_case_insensitively() {
        assert_eq!("exam_style".parse::<ActivityKind>(), Ok(ActivityKind::ExamStyle));
        assert_eq!(" MATCH ".parse::<ActivityKind>(), Ok(ActivityKind::Match));
        assert!("POKER".parse::<ActivityKind>().is_err());
    }

    #[test]
    fn every_kind_round_trips_through_its_code() {
        for kind in ActivityKind::ALL {
            assert_eq!(kind.code().parse::<ActivityKind>(), Ok(kind));
        }
    }

    #[test]
    fn countdown_requires_exam_and_positive_limit() {
        assert_eq!(SessionMode::Practice.countdown(), None);
        assert_eq!(SessionMode::Exam { time_limit: None }.countdown(), None);
        assert_eq!(SessionMode::exam_with_limit_secs(0).countdown(), None);
        assert_eq!(
            SessionMode::Exam {
                time_limit: Some(Duration::seconds(-5))
            }
            .countdown(),
            None
        );
        assert_eq!(
            SessionMode::exam_with_limit_secs(600).countdown(),
            Some(Duration::seconds(600))
        );
    }
}
