//! Pure progress transitions.
//!
//! Every function takes the current `Progress` by reference and returns a new
//! value. Nothing here performs I/O or reads the system clock; "now" and the
//! day-boundary calendar are always passed in.
//!
//! Callers own two preconditions: XP rewards are unsigned, so a negative reward
//! cannot be expressed, and lesson ids are expected to exist in the catalog
//! (the services layer checks this before emitting an event).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::catalog::{CurriculumCatalog, LockState};
use crate::model::{Lesson, LessonId, Progress, QuizResult, level_for_xp};
use crate::time::Calendar;

//
// ─── EVENTS ────────────────────────────────────────────────────────────────────
//

/// A change requested against one progress aggregate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProgressEvent {
    LessonCompleted {
        lesson_id: LessonId,
        xp_reward: u32,
        /// Index of the lesson's module within its sport, when known.
        module_position: Option<u32>,
    },
    QuizRecorded(QuizResult),
}

impl ProgressEvent {
    #[must_use]
    pub fn lesson_completed(lesson_id: LessonId, xp_reward: u32) -> Self {
        Self::LessonCompleted {
            lesson_id,
            xp_reward,
            module_position: None,
        }
    }

    /// Short label for logs.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            ProgressEvent::LessonCompleted { .. } => "lesson_completed",
            ProgressEvent::QuizRecorded(_) => "quiz_recorded",
        }
    }
}

/// Apply any event to a progress snapshot.
#[must_use]
pub fn apply_event(
    progress: &Progress,
    event: &ProgressEvent,
    now: DateTime<Utc>,
    calendar: &Calendar,
) -> Progress {
    match event {
        ProgressEvent::LessonCompleted {
            lesson_id,
            xp_reward,
            module_position,
        } => {
            let next = complete_lesson(progress, lesson_id, *xp_reward, now, calendar);
            match module_position {
                Some(position) if next != *progress => advance_module(&next, *position),
                _ => next,
            }
        }
        ProgressEvent::QuizRecorded(result) => record_quiz_result(progress, result.clone()),
    }
}

//
// ─── COMPLETION / XP / STREAK ──────────────────────────────────────────────────
//

/// Mark a lesson complete, award its XP and update the streak.
///
/// Completing an already-completed lesson returns the input unchanged.
#[must_use]
pub fn complete_lesson(
    progress: &Progress,
    lesson_id: &LessonId,
    xp_reward: u32,
    now: DateTime<Utc>,
    calendar: &Calendar,
) -> Progress {
    if progress.has_completed(lesson_id) {
        return progress.clone();
    }

    let mut next = progress.clone();
    next.completed_lessons.push(lesson_id.clone());
    next.total_xp = next.total_xp.saturating_add(u64::from(xp_reward));
    next.level = level_for_xp(next.total_xp);
    next.streak = next_streak(progress.streak, progress.last_activity_at, now, calendar);
    next.last_activity_at = Some(now);
    next
}

/// Streak after a completion at `now`.
///
/// Same calendar day keeps the streak, the following day extends it, anything
/// else (no prior activity, a gap, or a last activity dated after `now`)
/// starts over at 1.
#[must_use]
pub fn next_streak(
    streak: u32,
    last_activity_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    calendar: &Calendar,
) -> u32 {
    match last_activity_at.map(|last| calendar.days_between(last, now)) {
        Some(0) => streak,
        Some(1) => streak.saturating_add(1),
        _ => 1,
    }
}

fn advance_module(progress: &Progress, position: u32) -> Progress {
    let mut next = progress.clone();
    next.current_module = next.current_module.max(position);
    next
}

//
// ─── QUIZZES ───────────────────────────────────────────────────────────────────
//

/// Append a quiz result. XP, level, streak and last activity are untouched.
#[must_use]
pub fn record_quiz_result(progress: &Progress, result: QuizResult) -> Progress {
    let mut next = progress.clone();
    next.quiz_scores.push(result);
    next
}

/// Mean percentage over every recorded quiz; 0 with no quizzes.
#[must_use]
pub fn average_quiz_score(progress: &Progress) -> f64 {
    let scores = progress.quiz_scores();
    if scores.is_empty() {
        return 0.0;
    }
    let total: f64 = scores.iter().map(QuizResult::percentage).sum();

    #[allow(clippy::cast_precision_loss)]
    let count = scores.len() as f64;
    total / count
}

//
// ─── LOCKS ─────────────────────────────────────────────────────────────────────
//

#[must_use]
pub fn resolve_lock_state(
    catalog: &CurriculumCatalog,
    progress: &Progress,
    lesson_id: &LessonId,
) -> LockState {
    catalog.lock_state(lesson_id, progress.completed_lessons())
}

/// Every lesson of the progress' sport, in curriculum order, with its lock state.
#[must_use]
pub fn lesson_states<'a>(
    catalog: &'a CurriculumCatalog,
    progress: &Progress,
) -> Vec<(&'a Lesson, LockState)> {
    catalog
        .lessons_of_sport(progress.sport_id())
        .map(|lesson| {
            let state = resolve_lock_state(catalog, progress, &lesson.id);
            (lesson, state)
        })
        .collect()
}

/// First lesson in curriculum order that is unlocked and not yet completed.
#[must_use]
pub fn next_lesson<'a>(catalog: &'a CurriculumCatalog, progress: &Progress) -> Option<&'a Lesson> {
    catalog
        .lessons_of_sport(progress.sport_id())
        .find(|lesson| {
            !progress.has_completed(&lesson.id)
                && resolve_lock_state(catalog, progress, &lesson.id).is_unlocked()
        })
}

#[cfg(test)]
mod tests {
    use std::time::Duration as StdDuration;

    use chrono::Duration;

    use super::*;
    use crate::catalog::{CurriculumDraft, SportDraft};
    use crate::model::{
        Difficulty, Module, ModuleId, ProgressKey, Sport, SportCategory, SportId, UserId,
    };
    use crate::time::fixed_now;

    fn fresh() -> Progress {
        let key = ProgressKey::new(UserId::new("u1"), SportId::new("basketball"));
        Progress::new(key)
    }

    fn complete(p: &Progress, id: &str, xp: u32, at: DateTime<Utc>) -> Progress {
        complete_lesson(p, &LessonId::new(id), xp, at, &Calendar::utc())
    }

    fn quiz(score: u32, total: u32) -> QuizResult {
        QuizResult::new(
            LessonId::new("l1"),
            score,
            total,
            fixed_now(),
            StdDuration::from_secs(60),
        )
        .unwrap()
    }

    #[test]
    fn completing_twice_is_a_no_op() {
        let day1 = fixed_now();
        let once = complete(&fresh(), "l1", 30, day1);
        let twice = complete(&once, "l1", 30, day1 + Duration::days(1));
        assert_eq!(once, twice);
    }

    #[test]
    fn level_tracks_total_xp() {
        let mut p = fresh();
        let rewards = [0, 45, 55, 99, 1, 250, 7];
        for (i, xp) in rewards.iter().enumerate() {
            let before = p.total_xp();
            p = complete(&p, &format!("l{i}"), *xp, fixed_now());
            assert!(p.total_xp() >= before);
            assert_eq!(p.level(), p.total_xp() / 100 + 1);
        }
        assert_eq!(p.total_xp(), 457);
        assert_eq!(p.level(), 5);
    }

    #[test]
    fn same_day_keeps_streak() {
        let morning = fixed_now() - Duration::hours(10);
        let p = complete(&fresh(), "l1", 10, morning);
        assert_eq!(p.streak(), 1);
        let p = complete(&p, "l2", 10, fixed_now());
        assert_eq!(p.streak(), 1);
        assert_eq!(p.last_activity_at(), Some(fixed_now()));
    }

    #[test]
    fn consecutive_days_extend_streak() {
        let mut p = fresh();
        for day in 0..4 {
            let at = fixed_now() + Duration::days(day);
            p = complete(&p, &format!("l{day}"), 10, at);
            assert_eq!(i64::from(p.streak()), day + 1);
        }
    }

    #[test]
    fn gap_resets_streak() {
        let p = Progress::from_persisted(
            fresh().key().clone(),
            Vec::new(),
            0,
            0,
            5,
            Some(fixed_now() - Duration::days(3)),
            Vec::new(),
        );
        let p = complete(&p, "l1", 10, fixed_now());
        assert_eq!(p.streak(), 1);
    }

    #[test]
    fn streak_respects_injected_calendar() {
        // 22:13 UTC and 00:13 UTC the next morning fall on the same day at UTC-5.
        let cal = Calendar::from_offset_minutes(-300).unwrap();
        let p = complete_lesson(&fresh(), &LessonId::new("a"), 10, fixed_now(), &cal);
        let later = fixed_now() + Duration::hours(2);
        let p = complete_lesson(&p, &LessonId::new("b"), 10, later, &cal);
        assert_eq!(p.streak(), 1);

        let utc = complete(&complete(&fresh(), "a", 10, fixed_now()), "b", 10, later);
        assert_eq!(utc.streak(), 2);
    }

    #[test]
    fn activity_dated_after_now_restarts_streak() {
        let last = fixed_now() + Duration::days(2);
        assert_eq!(next_streak(4, Some(last), fixed_now(), &Calendar::utc()), 1);
    }

    #[test]
    fn quiz_does_not_touch_xp_or_streak() {
        let p = complete(&fresh(), "l1", 30, fixed_now());
        let after = record_quiz_result(&p, quiz(8, 10));
        assert_eq!(after.total_xp(), p.total_xp());
        assert_eq!(after.level(), p.level());
        assert_eq!(after.streak(), p.streak());
        assert_eq!(after.last_activity_at(), p.last_activity_at());
        assert_eq!(after.quiz_scores().len(), 1);
    }

    #[test]
    fn average_quiz_score_handles_empty_history() {
        assert_eq!(average_quiz_score(&fresh()), 0.0);
        let p = record_quiz_result(&record_quiz_result(&fresh(), quiz(8, 10)), quiz(0, 0));
        assert!((average_quiz_score(&p) - 40.0).abs() < f64::EPSILON);
    }

    #[test]
    fn two_day_scenario() {
        let day1 = fixed_now();
        let day2 = day1 + Duration::days(1);

        let p = complete(&fresh(), "L1", 30, day1);
        assert_eq!((p.total_xp(), p.level(), p.streak()), (30, 1, 1));

        let p = complete(&p, "L2", 80, day2);
        assert_eq!((p.total_xp(), p.level(), p.streak()), (110, 2, 2));

        let result = quiz(8, 10);
        assert!((result.percentage() - 80.0).abs() < f64::EPSILON);
        assert!(result.is_passing());
        let p = record_quiz_result(&p, result);
        assert_eq!(p.total_xp(), 110);
    }

    #[test]
    fn apply_event_advances_current_module_only_on_fresh_completion() {
        let event = ProgressEvent::LessonCompleted {
            lesson_id: LessonId::new("l9"),
            xp_reward: 10,
            module_position: Some(2),
        };
        let p = apply_event(&fresh(), &event, fixed_now(), &Calendar::utc());
        assert_eq!(p.current_module(), 2);

        let lower = ProgressEvent::LessonCompleted {
            lesson_id: LessonId::new("l1"),
            xp_reward: 10,
            module_position: Some(0),
        };
        let p = apply_event(&p, &lower, fixed_now(), &Calendar::utc());
        assert_eq!(p.current_module(), 2);

        let again = apply_event(&p, &event, fixed_now(), &Calendar::utc());
        assert_eq!(again, p);
    }

    fn catalog() -> CurriculumCatalog {
        let lesson = |id: &str, order: u32, prereqs: &[&str]| Lesson {
            id: LessonId::new(id),
            sport_id: SportId::new("basketball"),
            module_id: ModuleId::new("basics"),
            order,
            title: id.into(),
            description: String::new(),
            content: Vec::new(),
            estimated_minutes: 5,
            xp_reward: 10,
            prerequisites: prereqs.iter().map(|p| LessonId::new(*p)).collect(),
            is_locked: false,
        };
        CurriculumCatalog::load(CurriculumDraft {
            sports: vec![SportDraft {
                sport: Sport {
                    id: SportId::new("basketball"),
                    name: "Basketball".into(),
                    emoji: String::new(),
                    description: String::new(),
                    total_modules: 1,
                    total_lessons: 3,
                    difficulty: Difficulty::Beginner,
                    category: SportCategory::TeamSport,
                    is_premium: false,
                    is_available: true,
                },
                modules: vec![Module {
                    id: ModuleId::new("basics"),
                    sport_id: SportId::new("basketball"),
                    order: 0,
                    title: "Basics".into(),
                    description: String::new(),
                    lessons: vec![
                        lesson("A", 0, &[]),
                        lesson("B", 1, &[]),
                        lesson("C", 2, &["A", "B"]),
                    ],
                }],
            }],
        })
        .unwrap()
    }

    #[test]
    fn resolve_lock_state_follows_prerequisites() {
        let catalog = catalog();
        let c = LessonId::new("C");

        let p = complete(&fresh(), "A", 10, fixed_now());
        assert_eq!(resolve_lock_state(&catalog, &p, &c), LockState::Locked);

        let p = complete(&p, "B", 10, fixed_now());
        assert_eq!(resolve_lock_state(&catalog, &p, &c), LockState::Unlocked);
    }

    #[test]
    fn next_lesson_skips_completed_and_locked() {
        let catalog = catalog();
        let p = complete(&fresh(), "A", 10, fixed_now());
        assert_eq!(next_lesson(&catalog, &p).map(|l| l.id.as_str()), Some("B"));

        let p = complete(&p, "B", 10, fixed_now());
        assert_eq!(next_lesson(&catalog, &p).map(|l| l.id.as_str()), Some("C"));

        let p = complete(&p, "C", 10, fixed_now());
        assert!(next_lesson(&catalog, &p).is_none());

        let states = lesson_states(&catalog, &fresh());
        let locked: Vec<&str> = states
            .iter()
            .filter(|(_, s)| *s == LockState::Locked)
            .map(|(l, _)| l.id.as_str())
            .collect();
        assert_eq!(locked, vec!["C"]);
    }

    #[test]
    fn quiz_events_with_invalid_scores_do_not_deserialize() {
        let event = serde_json::json!({
            "kind": "quiz_recorded",
            "id": "q-1",
            "lessonId": "l1",
            "score": 50,
            "totalQuestions": 10,
            "completedAt": "2023-11-14T22:13:20Z",
            "timeSpent": { "secs": 5, "nanos": 0 },
        });
        assert!(serde_json::from_value::<ProgressEvent>(event).is_err());

        let valid = ProgressEvent::QuizRecorded(quiz(5, 10));
        let json = serde_json::to_value(&valid).unwrap();
        assert_eq!(
            serde_json::from_value::<ProgressEvent>(json).unwrap(),
            valid
        );
    }
}
