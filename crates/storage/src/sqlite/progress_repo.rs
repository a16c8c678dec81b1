use chrono::{DateTime, Utc};
use sporty_core::model::{LessonId, Progress, ProgressKey};
use sqlx::Row;
use tracing::debug;

use super::SqliteRepository;
use super::mapping::{db, duration_to_ms, map_quiz_row, ser, to_i64, to_u32, to_u64};
use crate::repository::{ProgressRepository, StorageError, Version, Versioned};

#[async_trait::async_trait]
impl ProgressRepository for SqliteRepository {
    async fn load_progress(
        &self,
        key: &ProgressKey,
    ) -> Result<Option<Versioned<Progress>>, StorageError> {
        let user_id = key.user_id().as_str();
        let sport_id = key.sport_id().as_str();

        // One read transaction so the aggregate and its child rows match.
        let mut tx = self.pool.begin().await.map_err(db)?;

        let row = sqlx::query(
            r"
            SELECT version, current_module, total_xp, streak, last_activity_at
            FROM progress
            WHERE user_id = ?1 AND sport_id = ?2
            ",
        )
        .bind(user_id)
        .bind(sport_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(db)?;

        let Some(row) = row else {
            return Ok(None);
        };

        let lessons = sqlx::query(
            r"
            SELECT lesson_id FROM progress_lessons
            WHERE user_id = ?1 AND sport_id = ?2
            ORDER BY position ASC
            ",
        )
        .bind(user_id)
        .bind(sport_id)
        .fetch_all(&mut *tx)
        .await
        .map_err(db)?;

        let mut completed = Vec::with_capacity(lessons.len());
        for lesson in lessons {
            completed.push(LessonId::new(
                lesson.try_get::<String, _>("lesson_id").map_err(ser)?,
            ));
        }

        let quiz_rows = sqlx::query(
            r"
            SELECT id, lesson_id, score, total_questions, completed_at, time_spent_ms
            FROM quiz_results
            WHERE user_id = ?1 AND sport_id = ?2
            ORDER BY position ASC
            ",
        )
        .bind(user_id)
        .bind(sport_id)
        .fetch_all(&mut *tx)
        .await
        .map_err(db)?;

        tx.commit().await.map_err(db)?;

        let mut quiz_scores = Vec::with_capacity(quiz_rows.len());
        for quiz in &quiz_rows {
            quiz_scores.push(map_quiz_row(quiz)?);
        }

        let version = Version::new(to_u64("version", row.try_get("version").map_err(ser)?)?);
        let last_active: Option<DateTime<Utc>> = row.try_get("last_activity_at").map_err(ser)?;
        let progress = Progress::from_persisted(
            key.clone(),
            completed,
            to_u32(
                "current_module",
                row.try_get("current_module").map_err(ser)?,
            )?,
            to_u64("total_xp", row.try_get("total_xp").map_err(ser)?)?,
            to_u32("streak", row.try_get("streak").map_err(ser)?)?,
            last_active,
            quiz_scores,
        );

        debug!(%key, %version, "loaded progress");
        Ok(Some(Versioned {
            value: progress,
            version,
        }))
    }

    async fn save_progress(
        &self,
        progress: &Progress,
        expected: Option<Version>,
    ) -> Result<Version, StorageError> {
        let user_id = progress.user_id().as_str();
        let sport_id = progress.sport_id().as_str();
        let next = expected.map_or(Version::INITIAL, Version::next);
        let next_i64 = to_i64("version", next.value())?;
        let total_xp = to_i64("total_xp", progress.total_xp())?;

        let mut tx = self.pool.begin().await.map_err(db)?;

        let res = match expected {
            None => sqlx::query(
                r"
                INSERT INTO progress (user_id, sport_id, version, current_module, total_xp, streak, last_activity_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                ON CONFLICT(user_id, sport_id) DO NOTHING
                ",
            )
            .bind(user_id)
            .bind(sport_id)
            .bind(next_i64)
            .bind(i64::from(progress.current_module()))
            .bind(total_xp)
            .bind(i64::from(progress.streak()))
            .bind(progress.last_activity_at())
            .execute(&mut *tx)
            .await
            .map_err(db)?,
            Some(current) => sqlx::query(
                r"
                UPDATE progress SET
                    version = ?3,
                    current_module = ?4,
                    total_xp = ?5,
                    streak = ?6,
                    last_activity_at = ?7
                WHERE user_id = ?1 AND sport_id = ?2 AND version = ?8
                ",
            )
            .bind(user_id)
            .bind(sport_id)
            .bind(next_i64)
            .bind(i64::from(progress.current_module()))
            .bind(total_xp)
            .bind(i64::from(progress.streak()))
            .bind(progress.last_activity_at())
            .bind(to_i64("version", current.value())?)
            .execute(&mut *tx)
            .await
            .map_err(db)?,
        };

        if res.rows_affected() == 0 {
            tx.rollback().await.map_err(db)?;
            debug!(key = %progress.key(), ?expected, "version conflict");
            return Err(StorageError::Conflict);
        }

        sqlx::query(
            r"
            DELETE FROM progress_lessons
            WHERE user_id = ?1 AND sport_id = ?2
            ",
        )
            .bind(user_id)
            .bind(sport_id)
            .execute(&mut *tx)
            .await
            .map_err(db)?;

        for (position, lesson_id) in progress.completed_lessons().iter().enumerate() {
            sqlx::query(
                r"
                INSERT INTO progress_lessons (user_id, sport_id, lesson_id, position)
                VALUES (?1, ?2, ?3, ?4)
                ",
            )
            .bind(user_id)
            .bind(sport_id)
            .bind(lesson_id.as_str())
            .bind(i64::try_from(position).map_err(ser)?)
            .execute(&mut *tx)
            .await
            .map_err(db)?;
        }

        sqlx::query(
            r"
            DELETE FROM quiz_results
            WHERE user_id = ?1 AND sport_id = ?2
            ",
        )
            .bind(user_id)
            .bind(sport_id)
            .execute(&mut *tx)
            .await
            .map_err(db)?;

        for (position, quiz) in progress.quiz_scores().iter().enumerate() {
            sqlx::query(
                r"
                INSERT INTO quiz_results (
                    id, user_id, sport_id, position, lesson_id,
                    score, total_questions, completed_at, time_spent_ms
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                ",
            )
            .bind(quiz.id().as_str())
            .bind(user_id)
            .bind(sport_id)
            .bind(i64::try_from(position).map_err(ser)?)
            .bind(quiz.lesson_id().as_str())
            .bind(i64::from(quiz.score()))
            .bind(i64::from(quiz.total_questions()))
            .bind(quiz.completed_at())
            .bind(duration_to_ms(quiz.time_spent()))
            .execute(&mut *tx)
            .await
            .map_err(db)?;
        }

        tx.commit().await.map_err(db)?;
        debug!(key = %progress.key(), version = %next, "saved progress");
        Ok(next)
    }
}
