use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::{LessonId, QuizResultId};

/// Minimum percentage for a quiz attempt to count as passing.
pub const PASSING_PERCENTAGE: f64 = 70.0;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuizError {
    #[error("score {score} exceeds total questions {total_questions}")]
    ScoreExceedsTotal { score: u32, total_questions: u32 },
}

//
// ─── QUIZ RESULT ───────────────────────────────────────────────────────────────
//

/// Immutable record of one quiz attempt for a lesson.
///
/// `time_spent` is kept to whole milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "QuizResultRepr")]
pub struct QuizResult {
    id: QuizResultId,
    lesson_id: LessonId,
    score: u32,
    total_questions: u32,
    completed_at: DateTime<Utc>,
    time_spent: Duration,
}

impl QuizResult {
    /// Records a new quiz attempt with a freshly generated id.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::ScoreExceedsTotal` when `score > total_questions`.
    pub fn new(
        lesson_id: LessonId,
        score: u32,
        total_questions: u32,
        completed_at: DateTime<Utc>,
        time_spent: Duration,
    ) -> Result<Self, QuizError> {
        Self::from_persisted(
            QuizResultId::generate(),
            lesson_id,
            score,
            total_questions,
            completed_at,
            time_spent,
        )
    }

    /// Rehydrates a quiz result with a known id.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::ScoreExceedsTotal` when `score > total_questions`.
    pub fn from_persisted(
        id: QuizResultId,
        lesson_id: LessonId,
        score: u32,
        total_questions: u32,
        completed_at: DateTime<Utc>,
        time_spent: Duration,
    ) -> Result<Self, QuizError> {
        if score > total_questions {
            return Err(QuizError::ScoreExceedsTotal {
                score,
                total_questions,
            });
        }
        Ok(Self {
            id,
            lesson_id,
            score,
            total_questions,
            completed_at,
            time_spent: whole_millis(time_spent),
        })
    }

    // Accessors
    #[must_use]
    pub fn id(&self) -> &QuizResultId {
        &self.id
    }

    #[must_use]
    pub fn lesson_id(&self) -> &LessonId {
        &self.lesson_id
    }

    #[must_use]
    pub fn score(&self) -> u32 {
        self.score
    }

    #[must_use]
    pub fn total_questions(&self) -> u32 {
        self.total_questions
    }

    #[must_use]
    pub fn completed_at(&self) -> DateTime<Utc> {
        self.completed_at
    }

    #[must_use]
    pub fn time_spent(&self) -> Duration {
        self.time_spent
    }

    /// Score as a percentage of total questions; exactly 0 for an empty quiz.
    #[must_use]
    pub fn percentage(&self) -> f64 {
        if self.total_questions == 0 {
            return 0.0;
        }
        f64::from(self.score) * 100.0 / f64::from(self.total_questions)
    }

    #[must_use]
    pub fn is_passing(&self) -> bool {
        self.percentage() >= PASSING_PERCENTAGE
    }
}

fn whole_millis(duration: Duration) -> Duration {
    duration - Duration::from_nanos(u64::from(duration.subsec_nanos() % 1_000_000))
}

/// Wire shape of a `QuizResult`; converted through `from_persisted`.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuizResultRepr {
    id: QuizResultId,
    lesson_id: LessonId,
    score: u32,
    total_questions: u32,
    completed_at: DateTime<Utc>,
    time_spent: Duration,
}

impl TryFrom<QuizResultRepr> for QuizResult {
    type Error = QuizError;

    fn try_from(repr: QuizResultRepr) -> Result<Self, Self::Error> {
        Self::from_persisted(
            repr.id,
            repr.lesson_id,
            repr.score,
            repr.total_questions,
            repr.completed_at,
            repr.time_spent,
        )
    }
}
