use chrono::Utc;
use sqlx::SqlitePool;

use super::SqliteInitError;

/// Runs a single, consolidated migration for the current schema.
///
/// Creates the curriculum tables (sports, modules, lessons, prerequisites) and
/// the progress tables (aggregates, completed lessons, quiz results).
#[allow(clippy::too_many_lines)]
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), SqliteInitError> {
    async fn is_applied(pool: &SqlitePool, version: i64) -> Result<bool, sqlx::Error> {
        let row = sqlx::query("SELECT 1 FROM schema_migrations WHERE version = ?1")
            .bind(version)
            .fetch_optional(pool)
            .await?;
        Ok(row.is_some())
    }

    sqlx::query(
        r"
            CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            );
            ",
    )
    .execute(pool)
    .await?;

    // Version 1: full schema.
    if !is_applied(pool, 1).await? {
        let mut tx = pool.begin().await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS sports (
                    id TEXT PRIMARY KEY,
                    position INTEGER NOT NULL,
                    name TEXT NOT NULL,
                    emoji TEXT NOT NULL,
                    description TEXT NOT NULL,
                    total_modules INTEGER NOT NULL CHECK (total_modules >= 0),
                    total_lessons INTEGER NOT NULL CHECK (total_lessons >= 0),
                    difficulty TEXT NOT NULL,
                    category TEXT NOT NULL,
                    is_premium INTEGER NOT NULL,
                    is_available INTEGER NOT NULL
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS modules (
                    id TEXT PRIMARY KEY,
                    sport_id TEXT NOT NULL,
                    sort_order INTEGER NOT NULL,
                    title TEXT NOT NULL,
                    description TEXT NOT NULL,
                    FOREIGN KEY (sport_id) REFERENCES sports(id) ON DELETE CASCADE
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS lessons (
                    id TEXT PRIMARY KEY,
                    sport_id TEXT NOT NULL,
                    module_id TEXT NOT NULL,
                    sort_order INTEGER NOT NULL,
                    title TEXT NOT NULL,
                    description TEXT NOT NULL,
                    sections TEXT NOT NULL,
                    estimated_minutes INTEGER NOT NULL CHECK (estimated_minutes >= 0),
                    xp_reward INTEGER NOT NULL CHECK (xp_reward >= 0),
                    is_locked INTEGER NOT NULL,
                    FOREIGN KEY (module_id) REFERENCES modules(id) ON DELETE CASCADE
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS lesson_prerequisites (
                    lesson_id TEXT NOT NULL,
                    prerequisite_id TEXT NOT NULL,
                    position INTEGER NOT NULL,
                    PRIMARY KEY (lesson_id, prerequisite_id),
                    FOREIGN KEY (lesson_id) REFERENCES lessons(id) ON DELETE CASCADE
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS progress (
                    user_id TEXT NOT NULL,
                    sport_id TEXT NOT NULL,
                    version INTEGER NOT NULL CHECK (version >= 1),
                    current_module INTEGER NOT NULL CHECK (current_module >= 0),
                    total_xp INTEGER NOT NULL CHECK (total_xp >= 0),
                    streak INTEGER NOT NULL CHECK (streak >= 0),
                    last_activity_at TEXT,
                    PRIMARY KEY (user_id, sport_id)
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS progress_lessons (
                    user_id TEXT NOT NULL,
                    sport_id TEXT NOT NULL,
                    lesson_id TEXT NOT NULL,
                    position INTEGER NOT NULL,
                    PRIMARY KEY (user_id, sport_id, lesson_id),
                    FOREIGN KEY (user_id, sport_id)
                        REFERENCES progress(user_id, sport_id) ON DELETE CASCADE
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS quiz_results (
                    id TEXT NOT NULL,
                    user_id TEXT NOT NULL,
                    sport_id TEXT NOT NULL,
                    position INTEGER NOT NULL,
                    lesson_id TEXT NOT NULL,
                    score INTEGER NOT NULL CHECK (score >= 0),
                    total_questions INTEGER NOT NULL CHECK (total_questions >= score),
                    completed_at TEXT NOT NULL,
                    time_spent_ms INTEGER NOT NULL CHECK (time_spent_ms >= 0),
                    PRIMARY KEY (user_id, sport_id, position),
                    FOREIGN KEY (user_id, sport_id)
                        REFERENCES progress(user_id, sport_id) ON DELETE CASCADE
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE INDEX IF NOT EXISTS idx_modules_sport_order
                    ON modules(sport_id, sort_order);
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE INDEX IF NOT EXISTS idx_lessons_module_order
                    ON lessons(module_id, sort_order);
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                INSERT INTO schema_migrations (version, applied_at)
                VALUES (?1, ?2)
                ON CONFLICT(version) DO NOTHING
            ",
        )
        .bind(1_i64)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
    }

    Ok(())
}
