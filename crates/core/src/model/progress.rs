use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::ids::{LessonId, ProgressKey, SportId, UserId};
use crate::model::quiz::QuizResult;

/// XP needed to advance one level.
pub const XP_PER_LEVEL: u64 = 100;

const LEVEL_TITLES: [&str; 8] = [
    "Rookie",
    "Amateur",
    "Enthusiast",
    "Competitor",
    "Pro",
    "Expert",
    "Master",
    "Legend",
];

/// Level derived from accumulated XP: `floor(total_xp / 100) + 1`.
#[must_use]
pub fn level_for_xp(total_xp: u64) -> u64 {
    total_xp / XP_PER_LEVEL + 1
}

/// Display title for a level; everything past the last title stays "Legend".
#[must_use]
pub fn level_title(level: u64) -> &'static str {
    let last = LEVEL_TITLES.len() - 1;
    let index = usize::try_from(level.saturating_sub(1)).map_or(last, |i| i.min(last));
    LEVEL_TITLES[index]
}

/// A learner's progress through one sport.
///
/// Fields are only changed through `engine` functions, which keep `level` in
/// step with `total_xp` and never shrink `completed_lessons` or `quiz_scores`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "ProgressRepr")]
pub struct Progress {
    key: ProgressKey,
    pub(crate) completed_lessons: Vec<LessonId>,
    pub(crate) current_module: u32,
    pub(crate) total_xp: u64,
    pub(crate) level: u64,
    pub(crate) streak: u32,
    pub(crate) last_activity_at: Option<DateTime<Utc>>,
    pub(crate) quiz_scores: Vec<QuizResult>,
}

impl Progress {
    /// Fresh aggregate for a (user, sport) pair with no activity yet.
    #[must_use]
    pub fn new(key: ProgressKey) -> Self {
        Self {
            key,
            completed_lessons: Vec::new(),
            current_module: 0,
            total_xp: 0,
            level: 1,
            streak: 0,
            last_activity_at: None,
            quiz_scores: Vec::new(),
        }
    }

    /// Rehydrate an aggregate from storage.
    ///
    /// Duplicate lesson ids are dropped (first occurrence kept) and the level is
    /// recomputed from `total_xp` rather than trusted.
    #[must_use]
    pub fn from_persisted(
        key: ProgressKey,
        completed_lessons: Vec<LessonId>,
        current_module: u32,
        total_xp: u64,
        streak: u32,
        last_activity_at: Option<DateTime<Utc>>,
        quiz_scores: Vec<QuizResult>,
    ) -> Self {
        let mut unique: Vec<LessonId> = Vec::with_capacity(completed_lessons.len());
        for lesson in completed_lessons {
            if !unique.contains(&lesson) {
                unique.push(lesson);
            }
        }
        Self {
            key,
            completed_lessons: unique,
            current_module,
            total_xp,
            level: level_for_xp(total_xp),
            streak,
            last_activity_at,
            quiz_scores,
        }
    }

    // Accessors
    #[must_use]
    pub fn key(&self) -> &ProgressKey {
        &self.key
    }

    #[must_use]
    pub fn user_id(&self) -> &UserId {
        self.key.user_id()
    }

    #[must_use]
    pub fn sport_id(&self) -> &SportId {
        self.key.sport_id()
    }

    /// Completed lessons in completion order.
    #[must_use]
    pub fn completed_lessons(&self) -> &[LessonId] {
        &self.completed_lessons
    }

    #[must_use]
    pub fn has_completed(&self, lesson_id: &LessonId) -> bool {
        self.completed_lessons.contains(lesson_id)
    }

    #[must_use]
    pub fn current_module(&self) -> u32 {
        self.current_module
    }

    #[must_use]
    pub fn total_xp(&self) -> u64 {
        self.total_xp
    }

    #[must_use]
    pub fn level(&self) -> u64 {
        self.level
    }

    #[must_use]
    pub fn streak(&self) -> u32 {
        self.streak
    }

    #[must_use]
    pub fn last_activity_at(&self) -> Option<DateTime<Utc>> {
        self.last_activity_at
    }

    #[must_use]
    pub fn quiz_scores(&self) -> &[QuizResult] {
        &self.quiz_scores
    }

    /// XP threshold at which the next level starts.
    #[must_use]
    pub fn xp_for_next_level(&self) -> u64 {
        self.level * XP_PER_LEVEL
    }

    #[must_use]
    pub fn xp_progress_in_level(&self) -> u64 {
        self.total_xp % XP_PER_LEVEL
    }

    /// Fraction (0.0..1.0) of the current level already earned.
    #[must_use]
    pub fn progress_fraction_in_level(&self) -> f64 {
        #[allow(clippy::cast_precision_loss)]
        let earned = self.xp_progress_in_level() as f64;
        earned / 100.0
    }

    #[must_use]
    pub fn level_title(&self) -> &'static str {
        level_title(self.level)
    }
}

/// Wire shape of a `Progress`. A serialized `level` is ignored and recomputed.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProgressRepr {
    key: ProgressKey,
    #[serde(default)]
    completed_lessons: Vec<LessonId>,
    #[serde(default)]
    current_module: u32,
    #[serde(default)]
    total_xp: u64,
    #[serde(default)]
    streak: u32,
    #[serde(default)]
    last_activity_at: Option<DateTime<Utc>>,
    #[serde(default)]
    quiz_scores: Vec<QuizResult>,
}

impl From<ProgressRepr> for Progress {
    fn from(repr: ProgressRepr) -> Self {
        Self::from_persisted(
            repr.key,
            repr.completed_lessons,
            repr.current_module,
            repr.total_xp,
            repr.streak,
            repr.last_activity_at,
            repr.quiz_scores,
        )
    }
}
