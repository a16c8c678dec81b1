use std::time::Duration;

use sporty_core::model::{
    Difficulty, Lesson, LessonId, LessonSection, ModuleId, QuizResult, QuizResultId, Sport,
    SportCategory, SportId,
};
use sqlx::Row;
use sqlx::error::ErrorKind;
use sqlx::sqlite::SqliteRow;

use crate::repository::StorageError;

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

/// Classify a database failure: constraint violations and decode failures
/// are terminal, everything else is treated as a transient connection issue.
pub(crate) fn db(e: sqlx::Error) -> StorageError {
    match &e {
        sqlx::Error::Database(d)
            if matches!(
                d.kind(),
                ErrorKind::UniqueViolation
                    | ErrorKind::ForeignKeyViolation
                    | ErrorKind::NotNullViolation
                    | ErrorKind::CheckViolation
            ) =>
        {
            StorageError::Constraint(e.to_string())
        }
        sqlx::Error::ColumnDecode { .. }
        | sqlx::Error::ColumnNotFound(_)
        | sqlx::Error::Decode(_) => StorageError::Serialization(e.to_string()),
        _ => StorageError::Connection(e.to_string()),
    }
}

pub(crate) fn to_i64(field: &'static str, v: u64) -> Result<i64, StorageError> {
    i64::try_from(v).map_err(|_| ser(format!("{field} overflow")))
}

pub(crate) fn to_u64(field: &'static str, v: i64) -> Result<u64, StorageError> {
    u64::try_from(v).map_err(|_| ser(format!("{field} sign overflow")))
}

pub(crate) fn to_u32(field: &'static str, v: i64) -> Result<u32, StorageError> {
    u32::try_from(v).map_err(|_| ser(format!("invalid {field}: {v}")))
}

pub(crate) fn difficulty_to_str(d: Difficulty) -> &'static str {
    match d {
        Difficulty::Beginner => "beginner",
        Difficulty::Intermediate => "intermediate",
        Difficulty::Advanced => "advanced",
    }
}

pub(crate) fn parse_difficulty(s: &str) -> Result<Difficulty, StorageError> {
    match s {
        "beginner" => Ok(Difficulty::Beginner),
        "intermediate" => Ok(Difficulty::Intermediate),
        "advanced" => Ok(Difficulty::Advanced),
        _ => Err(ser(format!("invalid difficulty: {s}"))),
    }
}

pub(crate) fn category_to_str(c: SportCategory) -> &'static str {
    match c {
        SportCategory::TeamSport => "team_sport",
        SportCategory::IndividualSport => "individual_sport",
        SportCategory::RacketSport => "racket_sport",
        SportCategory::Motorsport => "motorsport",
    }
}

pub(crate) fn parse_category(s: &str) -> Result<SportCategory, StorageError> {
    match s {
        "team_sport" => Ok(SportCategory::TeamSport),
        "individual_sport" => Ok(SportCategory::IndividualSport),
        "racket_sport" => Ok(SportCategory::RacketSport),
        "motorsport" => Ok(SportCategory::Motorsport),
        _ => Err(ser(format!("invalid category: {s}"))),
    }
}

pub(crate) fn map_sport_row(row: &SqliteRow) -> Result<Sport, StorageError> {
    let difficulty: String = row.try_get("difficulty").map_err(ser)?;
    let category: String = row.try_get("category").map_err(ser)?;
    Ok(Sport {
        id: SportId::new(row.try_get::<String, _>("id").map_err(ser)?),
        name: row.try_get("name").map_err(ser)?,
        emoji: row.try_get("emoji").map_err(ser)?,
        description: row.try_get("description").map_err(ser)?,
        total_modules: to_u32("total_modules", row.try_get("total_modules").map_err(ser)?)?,
        total_lessons: to_u32("total_lessons", row.try_get("total_lessons").map_err(ser)?)?,
        difficulty: parse_difficulty(&difficulty)?,
        category: parse_category(&category)?,
        is_premium: row.try_get::<i64, _>("is_premium").map_err(ser)? != 0,
        is_available: row.try_get::<i64, _>("is_available").map_err(ser)? != 0,
    })
}

/// Maps a lesson row; prerequisites are attached by the caller.
pub(crate) fn map_lesson_row(row: &SqliteRow) -> Result<Lesson, StorageError> {
    let sections: String = row.try_get("sections").map_err(ser)?;
    let content: Vec<LessonSection> = serde_json::from_str(&sections).map_err(ser)?;
    Ok(Lesson {
        id: LessonId::new(row.try_get::<String, _>("id").map_err(ser)?),
        sport_id: SportId::new(row.try_get::<String, _>("sport_id").map_err(ser)?),
        module_id: ModuleId::new(row.try_get::<String, _>("module_id").map_err(ser)?),
        order: to_u32("sort_order", row.try_get("sort_order").map_err(ser)?)?,
        title: row.try_get("title").map_err(ser)?,
        description: row.try_get("description").map_err(ser)?,
        content,
        estimated_minutes: to_u32(
            "estimated_minutes",
            row.try_get("estimated_minutes").map_err(ser)?,
        )?,
        xp_reward: to_u32("xp_reward", row.try_get("xp_reward").map_err(ser)?)?,
        prerequisites: Vec::new(),
        is_locked: row.try_get::<i64, _>("is_locked").map_err(ser)? != 0,
    })
}

pub(crate) fn map_quiz_row(row: &SqliteRow) -> Result<QuizResult, StorageError> {
    let time_spent_ms = to_u64("time_spent_ms", row.try_get("time_spent_ms").map_err(ser)?)?;
    QuizResult::from_persisted(
        QuizResultId::new(row.try_get::<String, _>("id").map_err(ser)?),
        LessonId::new(row.try_get::<String, _>("lesson_id").map_err(ser)?),
        to_u32("score", row.try_get("score").map_err(ser)?)?,
        to_u32(
            "total_questions",
            row.try_get("total_questions").map_err(ser)?,
        )?,
        row.try_get("completed_at").map_err(ser)?,
        Duration::from_millis(time_spent_ms),
    )
    .map_err(ser)
}

/// Milliseconds for storage; durations past `i64::MAX` ms saturate.
pub(crate) fn duration_to_ms(d: Duration) -> i64 {
    i64::try_from(d.as_millis()).unwrap_or(i64::MAX)
}
